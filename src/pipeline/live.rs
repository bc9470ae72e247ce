//! Live limits: the configuration the engine is actually running with

use std::time::Duration;
use tracing::debug;

use crate::config::LimitsDocument;
use crate::error::{LimitsError, LimitsResult};

/// Read-only view of the engine's active limits
pub trait LiveLimits {
    fn fetch(&self) -> LimitsResult<LimitsDocument>;
}

/// HTTP GET against the engine's limits query (`/Tractor/queue?q=limits`)
#[derive(Debug, Clone)]
pub struct HttpLiveLimits {
    url: String,
    timeout: Duration,
}

impl HttpLiveLimits {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    fn error(&self, message: impl Into<String>) -> LimitsError {
        LimitsError::Live {
            url: self.url.clone(),
            message: message.into(),
        }
    }
}

impl LiveLimits for HttpLiveLimits {
    fn fetch(&self) -> LimitsResult<LimitsDocument> {
        debug!(url = %self.url, "Fetching live limits");
        let response = ureq::get(&self.url)
            .timeout(self.timeout)
            .call()
            .map_err(|err| self.error(err.to_string()))?;
        let body = response
            .into_string()
            .map_err(|err| self.error(format!("failed to read body: {err}")))?;
        serde_json::from_str(&body)
            .map(LimitsDocument::from_value)
            .map_err(|err| self.error(format!("invalid JSON: {err}")))
    }
}
