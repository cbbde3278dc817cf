//! Bounded retry around a [`Transport`]

use crate::{ClientError, RequestSpec, Result, RetryPolicy, Transport};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    RetryableFailure(ClientError),
    TerminalFailure(ClientError),
}

impl<T> From<Result<T>> for Attempt<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) if e.is_retryable() => Self::RetryableFailure(e),
            Err(e) => Self::TerminalFailure(e),
        }
    }
}

/// Runs API calls with linear backoff.
///
/// Only transport-class failures are retried. Application errors and
/// cancellation end the loop immediately.
#[derive(Clone, Debug)]
pub struct RetryExecutor<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryExecutor<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `request`, retrying transport failures.
    ///
    /// `cancel` is checked before every attempt and raced against both the
    /// call itself and the backoff sleep.
    pub async fn execute(&self, request: &RequestSpec, cancel: &CancellationToken) -> Result<Bytes> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = self.transport.send(request) => Attempt::from(result),
            };

            let error = match outcome {
                Attempt::Success(body) => return Ok(body),
                Attempt::TerminalFailure(e) => return Err(e),
                Attempt::RetryableFailure(e) => e,
            };

            if attempt >= max_attempts {
                return Err(ClientError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                path = %request.route.path(),
                attempt,
                max_attempts,
                ?delay,
                error = %error,
                "Request failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
            debug!(attempt, "Retrying request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Route;
    use async_trait::async_trait;
    use reqwest::Method;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Transport replaying a fixed script; the last entry repeats
    struct ScriptedTransport {
        script: Vec<fn() -> Result<Bytes>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<fn() -> Result<Bytes>>) -> Self {
            Self {
                script,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &RequestSpec) -> Result<Bytes> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let step = self.script[n.min(self.script.len() - 1)];
            step()
        }

        async fn put_signed(&self, _url: &str, _content: Bytes) -> Result<()> {
            unreachable!("retry executor never uploads")
        }
    }

    fn connection_refused() -> Result<Bytes> {
        Err(ClientError::UnexpectedStatus {
            status: 503,
            body: "connection refused".into(),
        })
    }

    fn not_found() -> Result<Bytes> {
        Err(ClientError::Api {
            status: 404,
            message: "x".into(),
        })
    }

    fn ok() -> Result<Bytes> {
        Ok(Bytes::from_static(br#"{"ok":true}"#))
    }

    fn request() -> RequestSpec {
        RequestSpec::new(Method::GET, Route::Buckets, Duration::from_secs(30))
    }

    fn executor(transport: Arc<ScriptedTransport>) -> RetryExecutor<Arc<ScriptedTransport>> {
        RetryExecutor::new(transport, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound() {
        let transport = Arc::new(ScriptedTransport::new(vec![connection_refused]));
        let started = Instant::now();

        let err = executor(transport.clone())
            .execute(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 3);
        match err {
            ClientError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ClientError::UnexpectedStatus { status: 503, .. }));
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
        // 1s after the first failure, 2s after the second, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_application_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![not_found]));

        let err = executor(transport.clone())
            .execute(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, ClientError::Api { status: 404, ref message } if message == "x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let transport = Arc::new(ScriptedTransport::new(vec![connection_refused, ok]));

        let body = executor(transport.clone())
            .execute(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(&body[..], br#"{"ok":true}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let transport = Arc::new(ScriptedTransport::new(vec![connection_refused]));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                // First backoff runs from t=0 to t=1s
                tokio::time::sleep(Duration::from_millis(500)).await;
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let err = executor(transport.clone())
            .execute(&request(), &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(transport.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor(transport.clone())
            .execute(&request(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_attempt_classification() {
        assert!(matches!(Attempt::from(ok()), Attempt::Success(_)));
        assert!(matches!(Attempt::from(connection_refused()), Attempt::RetryableFailure(_)));
        assert!(matches!(Attempt::from(not_found()), Attempt::TerminalFailure(_)));
        assert!(matches!(
            Attempt::<Bytes>::from(Err(ClientError::Cancelled)),
            Attempt::TerminalFailure(_)
        ));
    }
}
