use std::time::Duration;

use reqwest::Url;

use crate::error::ClientError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Where the backend lives and how patient to be with it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .map_err(|e| ClientError::Config(format!("invalid API URL {:?}: {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "API URL must be http or https, got {}",
                base_url.scheme()
            )));
        }

        Ok(Self {
            base_url,
            timeout: None,
        })
    }

    /// `PMAP_API_URL` (default `http://localhost:8080/api`) and optional
    /// `PMAP_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        let url = std::env::var("PMAP_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&url)?;

        if let Ok(raw) = std::env::var("PMAP_API_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|_| ClientError::Config(format!("PMAP_API_TIMEOUT_SECS is not a number: {}", raw)))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Full URL of an API route, e.g. `endpoint("/markers")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Turn a server-relative asset path (`/uploads/..`) into an absolute URL.
    /// Absolute `http(s)` and `data:` URLs pass through unchanged.
    pub fn resolve_asset(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("data:") {
            return path.to_string();
        }

        let rooted = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        match self.base_url.join(&rooted) {
            Ok(url) => url.to_string(),
            Err(_) => rooted,
        }
    }
}
