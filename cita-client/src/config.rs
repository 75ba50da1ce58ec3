//! Client configuration

use std::time::Duration;

use crate::availability::BucketPolicy;

/// Default API endpoint for local development
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client configuration for talking to the booking API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL (e.g., "http://localhost:8000")
    pub base_url: String,

    /// Upper bound for a single request, including reading the body
    pub request_timeout: Duration,

    /// How slots are grouped for display
    pub bucket_policy: BucketPolicy,

    /// Days covered by an availability query without a date.
    /// The server owns the window; this only labels it.
    pub availability_window_days: u32,

    /// Login entry point published when the session is invalidated
    pub login_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            bucket_policy: BucketPolicy::default(),
            availability_window_days: 7,
            login_path: "/login".to_string(),
        }
    }

    /// Read configuration from environment variables
    ///
    /// - `CITA_API_URL` (default `http://localhost:8000`)
    /// - `CITA_REQUEST_TIMEOUT_MS` (default 30000)
    /// - `CITA_BUCKET_POLICY`: `fixed` or `dynamic` (default `dynamic`)
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("CITA_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
        );

        if let Some(ms) = std::env::var("CITA_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_millis(ms);
        }

        if let Ok(raw) = std::env::var("CITA_BUCKET_POLICY") {
            match raw.parse::<BucketPolicy>() {
                Ok(policy) => config.bucket_policy = policy,
                Err(e) => tracing::warn!(value = %raw, "Ignoring CITA_BUCKET_POLICY: {}", e),
            }
        }

        config
    }

    /// Set the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the slot bucketing policy
    pub fn with_bucket_policy(mut self, policy: BucketPolicy) -> Self {
        self.bucket_policy = policy;
        self
    }

    /// Set the default availability window label
    pub fn with_availability_window_days(mut self, days: u32) -> Self {
        self.availability_window_days = days;
        self
    }

    /// Set the login entry point
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Base URL without trailing slash
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Label for queries without a date, e.g. "next 7 days"
    pub fn window_label(&self) -> String {
        match self.availability_window_days {
            1 => "next day".to_string(),
            n => format!("next {} days", n),
        }
    }
}
