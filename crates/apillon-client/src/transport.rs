//! Single-shot HTTP transport

use crate::{routes::parse_endpoint, ClientError, Config, Credential, Result, Route};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::{self, HeaderValue},
    Client, Method,
};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// One API call, built fresh per request
#[derive(Clone, Debug)]
pub struct RequestSpec {
    pub method: Method,
    pub route: Route,
    pub query: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl RequestSpec {
    pub fn new(method: Method, route: Route, timeout: Duration) -> Self {
        Self {
            method,
            route,
            query: HashMap::new(),
            body: None,
            timeout,
        }
    }

    /// Add a query parameter, replacing any previous value for `key`
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add every parameter from `params`
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Serialize `body` as the JSON payload
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Write operations carry a JSON content type
    pub fn is_write(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// Executes exactly one network call per invocation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticated API call; returns the raw body of a successful response
    async fn send(&self, request: &RequestSpec) -> Result<Bytes>;

    /// Unauthenticated raw PUT to a pre-signed storage URL
    async fn put_signed(&self, url: &str, content: Bytes) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: &RequestSpec) -> Result<Bytes> {
        (**self).send(request).await
    }

    async fn put_signed(&self, url: &str, content: Bytes) -> Result<()> {
        (**self).put_signed(url, content).await
    }
}

/// Classify a completed response.
///
/// Status below 400 is success with the raw body. Anything else is an
/// [`ClientError::Api`] when the body is a `{status, message}` envelope and an
/// [`ClientError::UnexpectedStatus`] otherwise.
pub fn classify_response(status: u16, body: Bytes) -> Result<Bytes> {
    if status < 400 {
        Ok(body)
    } else {
        Err(ClientError::from_error_body(status, &body))
    }
}

/// reqwest-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    authorization: HeaderValue,
    upload_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Build from configuration; bad endpoint or missing credential fail here
    pub fn new(config: &Config) -> Result<Self> {
        Self::build(config, config.resolve_credential())
    }

    fn build(config: &Config, credential: Option<Credential>) -> Result<Self> {
        let base_url = parse_endpoint(&config.endpoint)?;
        let credential = credential.ok_or_else(|| {
            ClientError::Config(format!(
                "no API credential configured; set one explicitly or via {}",
                crate::config::API_KEY_ENV
            ))
        })?;

        let mut authorization = HeaderValue::from_str(&format!("Basic {}", credential.expose()))
            .map_err(|_| {
                ClientError::Config("API credential is not a valid header value".to_string())
            })?;
        authorization.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| ClientError::Config("invalid user agent".to_string()))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            base_url,
            authorization,
            upload_timeout: config.upload_timeout,
        })
    }

    /// API origin requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestSpec) -> Result<Bytes> {
        let url = request.route.url(&self.base_url)?;

        let mut req = self
            .http
            .request(request.method.clone(), url)
            .timeout(request.timeout)
            .header(header::AUTHORIZATION, self.authorization.clone());

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if request.is_write() {
            req = req.header(header::CONTENT_TYPE, "application/json");
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        debug!(method = %request.method, path = %request.route.path(), "Sending request");
        let response = req.send().await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        classify_response(status, body)
    }

    async fn put_signed(&self, url: &str, content: Bytes) -> Result<()> {
        if url.is_empty() {
            return Err(ClientError::InvalidInput(
                "signed URL cannot be empty".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(ClientError::InvalidInput(
                "file content cannot be empty".to_string(),
            ));
        }
        let url = Url::parse(url)
            .map_err(|e| ClientError::Protocol(format!("invalid signed URL: {}", e)))?;

        let size = content.len();
        let mut req = self.http.put(url).body(content);
        if let Some(timeout) = self.upload_timeout {
            req = req.timeout(timeout);
        }

        debug!(size, "Uploading to signed URL");
        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::SignedUrlRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
