//! Feature switches and per-feed limits.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which optional feeds run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    /// Fetch deal details and stage labels.
    pub deals: bool,
    /// Fetch email details.
    pub emails: bool,
    /// Maintain the form-submission cache.
    pub form_submissions: bool,
    /// Count email opens/clicks from the event log.
    pub engagement: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            deals: true,
            emails: true,
            form_submissions: true,
            engagement: true,
        }
    }
}

/// Form-submission cache settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionSettings {
    /// Depth of the first full fetch, per form.
    pub max_per_form: usize,
    /// Only the first N forms are read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_forms: Option<usize>,
    /// Ignore submissions older than this many months.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_months: Option<u32>,
    /// Forms fetched concurrently during a full fetch.
    pub concurrency: usize,
    /// Cache file location; a leading `~/` expands to `$HOME`.
    pub cache_path: String,
    /// Submissions per export page (capped at 50 by the CRM).
    pub page_size: usize,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            max_per_form: 1000,
            max_forms: None,
            max_age_months: None,
            concurrency: 4,
            cache_path: "~/.pulse/cache/form-submissions.json".to_string(),
            page_size: 50,
        }
    }
}

impl SubmissionSettings {
    /// Cache path with `~/` expanded.
    pub fn resolved_cache_path(&self) -> PathBuf {
        expand_home(&self.cache_path)
    }
}

/// Event-log engagement settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementSettings {
    /// Event type name for "email opened"; auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_event_type: Option<String>,
    /// Event type name for "email clicked"; auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_event_type: Option<String>,
    /// Events per page.
    pub page_size: usize,
    /// Stop scanning a contact's log after this many events.
    pub max_events_per_contact: usize,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            open_event_type: None,
            click_event_type: None,
            page_size: 100,
            max_events_per_contact: 1000,
        }
    }
}

pub(crate) fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}
