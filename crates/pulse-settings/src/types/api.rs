//! CRM connection and pacing settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// CRM connection settings. The access token is not stored here; it comes
/// from the `PULSE_ACCESS_TOKEN` environment variable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// API host.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: pulse_crm::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    /// Timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fixed delay after every remote call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PacingSettings {
    /// Milliseconds to sleep after each call.
    pub delay_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        // Ten requests per second is the private-app burst budget.
        Self { delay_ms: 110 }
    }
}
