//! Incremental form-submission cache.
//!
//! With a cache file on disk, a run only reads the newest page of every form
//! and merges it in by (form, conversion id). Without one, every form is read
//! to its configured depth once and the result becomes the baseline.
//!
//! The incremental path assumes the export is newest-first and that fewer
//! submissions arrived since the last run than fit on one page. It does not
//! repair a violation; [`detect_gaps`] only reports forms where one looks
//! likely.

pub mod cache;
pub mod fetch;
pub mod merge;

use std::path::PathBuf;

use chrono::{DateTime, Months, Utc};
use tracing::{info, warn};

use pulse_core::Throttle;
use pulse_core::models::SubmissionCache;
use pulse_crm::CrmApi;
use pulse_settings::SubmissionSettings;

use crate::error::PipelineResult;

pub use fetch::{FormDelta, FormSubmissions, SubmissionFetcher};
pub use merge::{MergeStats, merge};

/// Inputs to one refresh.
#[derive(Clone, Debug)]
pub struct RefreshOptions {
    /// Cache file.
    pub cache_path: PathBuf,
    /// Depth of a full fetch, per form.
    pub max_per_form: usize,
    /// Only the first N forms are read.
    pub max_forms: Option<usize>,
    /// Oldest submission to keep (epoch ms).
    pub cutoff: Option<i64>,
    /// Forms fetched at once during a full fetch.
    pub concurrency: usize,
    /// Export page size.
    pub page_size: usize,
    /// Ignore an existing cache and rebuild it.
    pub full_refresh: bool,
}

impl RefreshOptions {
    /// Options from settings, with the age cutoff anchored at `now`.
    pub fn from_settings(settings: &SubmissionSettings, now: DateTime<Utc>) -> Self {
        Self {
            cache_path: settings.resolved_cache_path(),
            max_per_form: settings.max_per_form,
            max_forms: settings.max_forms,
            cutoff: cutoff_millis(now, settings.max_age_months),
            concurrency: settings.concurrency,
            page_size: settings.page_size,
            full_refresh: false,
        }
    }
}

/// Which path a refresh took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
    /// Newest page per form merged into the existing cache.
    Incremental,
    /// Every form read to depth; cache rebuilt.
    Full,
}

/// Result of a refresh.
#[derive(Clone, Debug)]
pub struct RefreshOutcome {
    /// The cache as saved.
    pub cache: SubmissionCache,
    /// Path taken.
    pub mode: RefreshMode,
    /// Forms read.
    pub forms: usize,
    /// Merge counts (a full fetch reports everything as added).
    pub stats: MergeStats,
    /// Forms whose delta may have missed submissions.
    pub gaps: Vec<String>,
}

/// Bring the cache up to date and save it.
pub async fn refresh<A: CrmApi + ?Sized>(
    api: &A,
    options: &RefreshOptions,
    throttle: Throttle,
    now: DateTime<Utc>,
) -> PipelineResult<RefreshOutcome> {
    let existing = if options.full_refresh {
        info!("full refresh requested, ignoring existing submission cache");
        None
    } else {
        cache::load(&options.cache_path)?
    };

    let listed = api.list_forms().await;
    throttle.wait().await;
    let mut forms = listed?;
    if let Some(max) = options.max_forms {
        forms.truncate(max);
    }

    let fetcher = SubmissionFetcher::new(api, options.page_size, throttle);
    let outcome = match existing {
        Some(mut cached) => {
            let (delta, deltas) = fetcher.fetch_delta(&forms, options.cutoff).await?;
            let gaps = detect_gaps(&deltas, cached.fetched_at);
            for form in &gaps {
                warn!(
                    form = %form,
                    since = cached.fetched_at,
                    "full delta page newer than last refresh, submissions may be missing"
                );
            }
            let stats = merge(&mut cached.by_email, delta);
            cached.fetched_at = now.timestamp_millis();
            RefreshOutcome {
                cache: cached,
                mode: RefreshMode::Incremental,
                forms: forms.len(),
                stats,
                gaps,
            }
        }
        None => {
            let by_email = fetcher
                .fetch_full(&forms, options.max_per_form, options.cutoff, options.concurrency)
                .await?;
            let cache = SubmissionCache {
                fetched_at: now.timestamp_millis(),
                by_email,
            };
            let stats = MergeStats {
                added: cache.entry_count(),
                updated: 0,
            };
            RefreshOutcome {
                cache,
                mode: RefreshMode::Full,
                forms: forms.len(),
                stats,
                gaps: Vec::new(),
            }
        }
    };

    cache::save(&options.cache_path, &outcome.cache)?;
    info!(
        mode = ?outcome.mode,
        forms = outcome.forms,
        added = outcome.stats.added,
        updated = outcome.stats.updated,
        emails = outcome.cache.by_email.len(),
        "submission cache refreshed"
    );
    Ok(outcome)
}

/// Forms whose newest page was full and still newer than `since`: older
/// submissions behind that page were never seen.
pub fn detect_gaps(deltas: &[FormDelta], since: i64) -> Vec<String> {
    deltas
        .iter()
        .filter(|d| d.page_full && d.oldest.is_some_and(|oldest| oldest > since))
        .map(|d| d.form_guid.clone())
        .collect()
}

/// `now` minus `months`, in epoch milliseconds.
pub fn cutoff_millis(now: DateTime<Utc>, months: Option<u32>) -> Option<i64> {
    let months = months?;
    now.checked_sub_months(Months::new(months))
        .map(|t| t.timestamp_millis())
}
