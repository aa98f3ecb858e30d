//! Settings types.
//!
//! Every struct deserialises from camelCase JSON with `#[serde(default)]`, so a
//! settings file only needs the keys it wants to change.

mod api;
mod contacts;
mod feeds;
mod logging;

pub use api::{ApiSettings, PacingSettings};
pub use contacts::{AssociationSettings, ContactSettings, DetailSettings};
pub use feeds::{EngagementSettings, FeatureFlags, SubmissionSettings};
pub use logging::LoggingSettings;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    /// CRM connection.
    pub api: ApiSettings,
    /// Inter-call pacing.
    pub pacing: PacingSettings,
    /// Contact search.
    pub contacts: ContactSettings,
    /// Relationship types and association batching.
    pub associations: AssociationSettings,
    /// Related-object detail batching.
    pub details: DetailSettings,
    /// Per-feed switches.
    pub features: FeatureFlags,
    /// Form-submission cache.
    pub submissions: SubmissionSettings,
    /// Event-log engagement counting.
    pub engagement: EngagementSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl PulseSettings {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("contacts.pageSize", self.contacts.page_size),
            ("associations.batchSize", self.associations.batch_size),
            ("details.batchSize", self.details.batch_size),
            ("submissions.concurrency", self.submissions.concurrency),
            ("submissions.pageSize", self.submissions.page_size),
            ("engagement.pageSize", self.engagement.page_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(SettingsError::InvalidValue {
                    key,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if self.associations.types.iter().any(|t| t.name.is_empty() || t.remote_type.is_empty()) {
            return Err(SettingsError::InvalidValue {
                key: "associations.types",
                reason: "entries need a name and a remoteType".to_string(),
            });
        }
        Ok(())
    }
}
