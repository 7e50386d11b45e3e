use std::time::Duration;

use uuid::Uuid;

use crate::error::{Result, TermsError};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Client configuration shared by the backend and the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Root URL of the graph service, without a trailing slash.
    pub base_url: String,
    /// Value of the `user_id` cookie the feedback endpoint requires.
    pub user_id: String,
    /// Overall per-request timeout. `None` leaves long generations unbounded.
    pub request_timeout: Option<Duration>,
    /// How long the final message stays up after a completion.
    pub reset_delay: Duration,
    /// Interval of the loading-dots animation.
    pub loading_tick: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            user_id: Uuid::new_v4().to_string(),
            request_timeout: None,
            reset_delay: Duration::from_millis(500),
            loading_tick: Duration::from_millis(300),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `TERMSAI_BASE_URL`, `TERMSAI_USER_ID` and
    /// `TERMSAI_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("TERMSAI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(user_id) = lookup("TERMSAI_USER_ID") {
            config = config.with_user_id(user_id);
        }
        if let Some(secs) = lookup("TERMSAI_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                TermsError::Config(format!("TERMSAI_TIMEOUT_SECS must be an integer, got '{secs}'"))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if config.base_url.is_empty() {
            return Err(TermsError::Config("TERMSAI_BASE_URL must not be empty".into()));
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    pub fn with_loading_tick(mut self, tick: Duration) -> Self {
        self.loading_tick = tick;
        self
    }

    /// Absolute URL for an endpoint path such as `/generate_stream`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.reset_delay, Duration::from_millis(500));
        assert_eq!(config.loading_tick, Duration::from_millis(300));
        assert!(config.request_timeout.is_none());
        assert!(Uuid::parse_str(&config.user_id).is_ok());
    }

    #[test]
    fn user_ids_are_unique() {
        assert_ne!(ClientConfig::new().user_id, ClientConfig::new().user_id);
    }

    #[test]
    fn builder_methods() {
        let config = ClientConfig::new()
            .with_base_url("https://terms.example/")
            .with_user_id("u-1")
            .with_request_timeout(Duration::from_secs(30))
            .with_reset_delay(Duration::ZERO);
        assert_eq!(config.base_url, "https://terms.example");
        assert_eq!(config.endpoint("/check_filter"), "https://terms.example/check_filter");
        assert_eq!(config.user_id, "u-1");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.reset_delay, Duration::ZERO);
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let vars = HashMap::from([
            ("TERMSAI_BASE_URL", "http://localhost:8080"),
            ("TERMSAI_USER_ID", "abc"),
            ("TERMSAI_TIMEOUT_SECS", "12"),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.user_id, "abc");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(12)));
    }

    #[test]
    fn from_lookup_rejects_bad_timeout() {
        let err = ClientConfig::from_lookup(|k| {
            (k == "TERMSAI_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, TermsError::Config(_)));
    }

    #[test]
    fn from_lookup_rejects_empty_url() {
        let err =
            ClientConfig::from_lookup(|k| (k == "TERMSAI_BASE_URL").then(String::new)).unwrap_err();
        assert!(matches!(err, TermsError::Config(_)));
    }
}
