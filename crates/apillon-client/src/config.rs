//! Client configuration

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::time::Duration;

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "APILLON_API_KEY";
/// Environment variable overriding the API endpoint
pub const API_URL_ENV: &str = "APILLON_API_URL";
/// Production API origin
pub const DEFAULT_ENDPOINT: &str = "https://api.apillon.io";

/// Opaque API credential sent in the `Authorization` header.
///
/// Set once when the client is built and never changed afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap an already encoded credential
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Encode an API key and secret as a basic credential
    pub fn from_key_pair(key: &str, secret: &str) -> Self {
        Self(STANDARD.encode(format!("{}:{}", key, secret)))
    }

    /// Read the credential from `APILLON_API_KEY`
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self)
    }

    /// Raw header value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Bounded retry with linear backoff
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before retry `n` is `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// API origin
    pub endpoint: String,
    /// API credential; falls back to the environment when absent
    pub credential: Option<Credential>,
    /// Timeout for GET and DELETE calls
    pub read_timeout: Duration,
    /// Timeout for POST calls
    pub write_timeout: Duration,
    /// Timeout for establishing any connection, API or signed URL
    pub connect_timeout: Duration,
    /// Timeout for signed URL uploads; `None` leaves only the connect bound
    pub upload_timeout: Option<Duration>,
    /// User agent string
    pub user_agent: String,
    /// Retry policy for API calls
    pub retry: RetryPolicy,
    /// Pause between receiving signed URLs and the first upload
    pub settle_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: None,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            upload_timeout: Some(Duration::from_secs(300)),
            user_agent: format!("apillon-client/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
            // Signed URLs are not always writable the instant they are issued.
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Build a config from `APILLON_API_KEY` and `APILLON_API_URL`
    pub fn from_env() -> Self {
        let endpoint = std::env::var(API_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Self {
            endpoint,
            credential: Credential::from_env(),
            ..Default::default()
        }
    }

    /// Set the credential
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(credential));
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the signed URL settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set read and write timeouts
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    /// Set the signed URL upload timeout
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The explicit credential, or the environment one
    pub fn resolve_credential(&self) -> Option<Credential> {
        self.resolve_credential_with(Credential::from_env)
    }

    /// The explicit credential, or whatever `fallback` yields when it is
    /// absent or empty
    pub fn resolve_credential_with<F>(&self, fallback: F) -> Option<Credential>
    where
        F: FnOnce() -> Option<Credential>,
    {
        self.credential
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(fallback)
    }
}
