use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::time::{Instant, sleep, sleep_until};

use crate::config::FetchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transient,
    Permanent,
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Transient => write!(f, "Transient"),
            FetchErrorKind::Permanent => write!(f, "Permanent"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failure fetching {url} after {attempts} attempt(s): {reason}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub reason: String,
    pub attempts: u32,
}

impl FetchError {
    pub fn transient(url: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Transient,
            url: url.to_string(),
            reason: reason.into(),
            attempts: 1,
        }
    }

    pub fn permanent(url: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Permanent,
            url: url.to_string(),
            reason: reason.into(),
            attempts: 1,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }

    fn from_status(url: &str, status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Self::transient(url, format!("HTTP {}", status))
        } else {
            Self::permanent(url, format!("HTTP {}", status))
        }
    }

    fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(url, status);
        }
        if err.is_builder() {
            Self::permanent(url, err.to_string())
        } else {
            Self::transient(url, err.to_string())
        }
    }
}

/// A single GET against the target site. `Fetcher` layers pacing and retries on top.
pub trait Transport {
    fn get(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url, status));
        }

        response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))
            .map_err(|e| FetchError::from_reqwest(url, &e))
    }
}

#[derive(Debug)]
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    config: FetchConfig,
    last_request: Option<Instant>,
}

impl Fetcher<HttpTransport> {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(transport: T, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            last_request: None,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches `url`, retrying transient failures up to `max_retries` times.
    pub async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.pace().await;
            log::debug!("GET {} (attempt {})", url, attempt);

            match self.transport.get(url).await {
                Ok(body) => return Ok(body),
                Err(mut err) => {
                    err.attempts = attempt;
                    if !err.is_transient() || attempt > self.config.max_retries {
                        return Err(err);
                    }
                    let wait = self.backoff(attempt);
                    log::warn!(
                        "{} (retry {}/{} in {:?})",
                        err,
                        attempt,
                        self.config.max_retries,
                        wait
                    );
                    sleep(wait).await;
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config
            .backoff_base
            .saturating_mul(factor)
            .min(self.config.backoff_max)
    }

    async fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let jitter = if self.config.jitter.is_zero() {
                Duration::ZERO
            } else {
                Duration::from_millis(fastrand::u64(0..self.config.jitter.as_millis().max(1) as u64))
            };
            sleep_until(last + self.config.request_delay + jitter).await;
        }
        self.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Serves canned responses per URL. A URL with several queued responses
    /// yields them in order, then repeats the last one.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn page(self, url: &str, body: &str) -> Self {
            self.push(url, Ok(body.to_string()))
        }

        pub(crate) fn push(self, url: &str, response: Result<String, FetchError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(response);
            self
        }

        pub(crate) fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(FetchError::permanent(url, "HTTP 404 Not Found"))),
                None => Err(FetchError::permanent(url, "HTTP 404 Not Found")),
            }
        }
    }

    fn fetcher(transport: ScriptedTransport, max_retries: u32) -> Fetcher<ScriptedTransport> {
        let config = FetchConfig {
            max_retries,
            ..FetchConfig::immediate()
        };
        Fetcher::with_transport(transport, config)
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let url = "http://test.local/game/a/";
        let transport = ScriptedTransport::default()
            .push(url, Err(FetchError::transient(url, "HTTP 503")))
            .push(url, Err(FetchError::transient(url, "timed out")))
            .page(url, "<html>ok</html>");
        let mut fetcher = fetcher(transport, 3);

        let body = fetcher.fetch(url).await.expect("third attempt succeeds");
        assert_eq!(body, "<html>ok</html>");
        assert_eq!(fetcher.transport().calls_to(url), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_retry_budget() {
        let url = "http://test.local/game/b/";
        let transport =
            ScriptedTransport::default().push(url, Err(FetchError::transient(url, "HTTP 429")));
        let mut fetcher = fetcher(transport, 2);

        let err = fetcher.fetch(url).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.attempts, 3);
        assert_eq!(fetcher.transport().calls_to(url), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let url = "http://test.local/game/gone/";
        let transport =
            ScriptedTransport::default().push(url, Err(FetchError::permanent(url, "HTTP 410")));
        let mut fetcher = fetcher(transport, 5);

        let err = fetcher.fetch(url).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Permanent);
        assert_eq!(fetcher.transport().calls_to(url), 1);
    }

    #[test]
    fn test_status_classification() {
        let url = "http://test.local/";
        let kind = |s: StatusCode| FetchError::from_status(url, s).kind;
        assert_eq!(kind(StatusCode::NOT_FOUND), FetchErrorKind::Permanent);
        assert_eq!(kind(StatusCode::GONE), FetchErrorKind::Permanent);
        assert_eq!(kind(StatusCode::FORBIDDEN), FetchErrorKind::Permanent);
        assert_eq!(kind(StatusCode::TOO_MANY_REQUESTS), FetchErrorKind::Transient);
        assert_eq!(kind(StatusCode::BAD_GATEWAY), FetchErrorKind::Transient);
        assert_eq!(kind(StatusCode::SERVICE_UNAVAILABLE), FetchErrorKind::Transient);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = FetchConfig {
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(5),
            ..FetchConfig::default()
        };
        let fetcher = Fetcher::with_transport(ScriptedTransport::default(), config);
        assert_eq!(fetcher.backoff(1), Duration::from_secs(1));
        assert_eq!(fetcher.backoff(2), Duration::from_secs(2));
        assert_eq!(fetcher.backoff(3), Duration::from_secs(4));
        assert_eq!(fetcher.backoff(4), Duration::from_secs(5));
    }
}
