//! One pass over every contact page.
//!
//! Stage labels, the submission cache and engagement event types are settled
//! once up front. Then each contact page is resolved (associations, details,
//! submissions, engagement) and handed to a [`ReportSink`] before the next
//! page is fetched.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use pulse_core::Throttle;
use pulse_core::field::Detail;
use pulse_core::models::{AssociationType, Contact, EngagementCount, FormSubmissionEntry};
use pulse_crm::CrmApi;
use pulse_settings::PulseSettings;

use crate::associations::{AssociationAggregator, ContactPage, ContactSearch};
use crate::details::{DetailEnricher, DetailSpec, StageLabels};
use crate::engagement::{ContactEngagement, CountStatus, EngagementCounter};
use crate::error::PipelineResult;
use crate::submissions::{self, RefreshMode, RefreshOptions, RefreshOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Objects of one relationship type for one contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedObjects {
    /// Configured relationship name.
    pub relationship: String,
    /// Remote object type.
    pub object_type: String,
    /// Related ids in upstream order.
    pub ids: Vec<String>,
    /// Details in the same order, when the type has a detail spec.
    pub details: Option<Vec<Detail>>,
}

/// Everything gathered for one contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactReport {
    /// The contact as returned by search.
    pub contact: Contact,
    /// One entry per configured relationship type.
    pub related: Vec<RelatedObjects>,
    /// Cached form submissions for the contact's email.
    pub submissions: Vec<FormSubmissionEntry>,
    /// Opens and clicks, when engagement is enabled.
    pub engagement: Option<ContactEngagement>,
}

impl ContactReport {
    /// Related objects for `relationship`.
    pub fn related(&self, relationship: &str) -> Option<&RelatedObjects> {
        self.related.iter().find(|r| r.relationship == relationship)
    }
}

/// One contact page, fully resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageReport {
    /// 1-based page number.
    pub number: usize,
    /// Contacts in search order.
    pub contacts: Vec<ContactReport>,
}

/// Receives each page as soon as it is resolved.
pub trait ReportSink {
    /// Handle one page. `labels` maps deal stage ids to labels.
    fn on_page(&mut self, page: &PageReport, labels: &StageLabels);
}

impl ReportSink for Vec<PageReport> {
    fn on_page(&mut self, page: &PageReport, _labels: &StageLabels) {
        self.push(page.clone());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

/// Submission cache outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionSummary {
    /// Path taken.
    pub mode: RefreshMode,
    /// Forms read.
    pub forms: usize,
    /// Emails in the cache.
    pub emails: usize,
    /// Entries in the cache.
    pub entries: usize,
    /// Entries appended this run.
    pub added: usize,
    /// Entries overwritten this run.
    pub updated: usize,
    /// Forms whose delta may have missed submissions.
    pub gaps: Vec<String>,
}

impl SubmissionSummary {
    fn from_outcome(outcome: &RefreshOutcome) -> Self {
        Self {
            mode: outcome.mode,
            forms: outcome.forms,
            emails: outcome.cache.by_email.len(),
            entries: outcome.cache.entry_count(),
            added: outcome.stats.added,
            updated: outcome.stats.updated,
            gaps: outcome.gaps.clone(),
        }
    }
}

/// Engagement outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngagementSummary {
    /// Whether engagement ran at all.
    pub enabled: bool,
    /// Whether any event type was resolved.
    pub resolved: bool,
    /// Contacts whose log was read.
    pub counted: usize,
    /// Contacts skipped because the event log is not licensed.
    pub tier_unavailable: usize,
    /// Contacts whose read failed otherwise.
    pub failed: usize,
    /// Total opens and clicks.
    pub totals: EngagementCount,
}

impl EngagementSummary {
    fn record(&mut self, result: ContactEngagement) {
        match result.status {
            CountStatus::Counted => self.counted += 1,
            CountStatus::TierUnavailable => self.tier_unavailable += 1,
            CountStatus::Failed => self.failed += 1,
            CountStatus::Unresolved => {}
        }
        self.totals.opens += result.counts.opens;
        self.totals.clicks += result.counts.clicks;
    }
}

/// What a run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Contacts processed.
    pub contacts: usize,
    /// Contact pages processed.
    pub pages: usize,
    /// relationship name → related ids across all contacts.
    pub related: BTreeMap<String, usize>,
    /// Related objects the CRM no longer returns.
    pub unknown_objects: usize,
    /// Submission cache outcome, when enabled.
    pub submissions: Option<SubmissionSummary>,
    /// Contacts with at least one cached submission.
    pub contacts_with_submissions: usize,
    /// Engagement outcome.
    pub engagement: EngagementSummary,
}

impl RunSummary {
    fn record(&mut self, report: &ContactReport) {
        self.contacts += 1;
        for group in &report.related {
            *self.related.entry(group.relationship.clone()).or_default() += group.ids.len();
            self.unknown_objects += group
                .details
                .iter()
                .flatten()
                .filter(|d| !d.is_known())
                .count();
        }
        if !report.submissions.is_empty() {
            self.contacts_with_submissions += 1;
        }
        if let Some(result) = report.engagement {
            self.engagement.record(result);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// One aggregation run against a CRM.
pub struct Pipeline<'a, A: CrmApi + ?Sized> {
    api: &'a A,
    settings: &'a PulseSettings,
    full_refresh: bool,
    now: DateTime<Utc>,
}

impl<'a, A: CrmApi + ?Sized> Pipeline<'a, A> {
    /// Pipeline over `api` configured by `settings`.
    pub fn new(api: &'a A, settings: &'a PulseSettings) -> Self {
        Self {
            api,
            settings,
            full_refresh: false,
            now: Utc::now(),
        }
    }

    /// Rebuild the submission cache instead of merging into it.
    #[must_use]
    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    /// Clock used for the cache timestamp and the age cutoff.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Relationship types left after feature switches.
    fn active_types(&self) -> Vec<AssociationType> {
        let features = &self.settings.features;
        self.settings
            .associations
            .types
            .iter()
            .filter(|t| match t.remote_type.as_str() {
                "deals" => features.deals,
                "emails" => features.emails,
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// Run to completion, streaming each page to `sink`.
    #[instrument(skip_all)]
    pub async fn run<S: ReportSink + ?Sized>(&self, sink: &mut S) -> PipelineResult<RunSummary> {
        let settings = self.settings;
        let throttle = Throttle::from_millis(settings.pacing.delay_ms);
        let types = self.active_types();
        let specs: HashMap<String, DetailSpec> = types
            .iter()
            .filter_map(|t| detail_spec(&t.remote_type).map(|s| (t.remote_type.clone(), s)))
            .collect();
        let mut summary = RunSummary::default();

        let labels = if specs.contains_key("deals") {
            StageLabels::load(self.api, throttle).await?
        } else {
            StageLabels::default()
        };

        let submissions = if settings.features.form_submissions {
            let options = RefreshOptions {
                full_refresh: self.full_refresh,
                ..RefreshOptions::from_settings(&settings.submissions, self.now)
            };
            let outcome = submissions::refresh(self.api, &options, throttle, self.now).await?;
            summary.submissions = Some(SubmissionSummary::from_outcome(&outcome));
            Some(outcome.cache)
        } else {
            None
        };

        let engagement = if settings.features.engagement {
            let counter =
                EngagementCounter::resolve(self.api, &settings.engagement, throttle).await;
            summary.engagement.enabled = true;
            summary.engagement.resolved = counter.types().is_resolved();
            Some(counter)
        } else {
            None
        };

        let search = ContactSearch::new(
            self.api,
            settings.contacts.query(),
            settings.contacts.page_size,
        );
        let mut aggregator = AssociationAggregator::new(
            self.api,
            search,
            settings.contacts.max_contacts,
            types.clone(),
            settings.associations.batch_size,
            throttle,
        );
        let enricher = DetailEnricher::new(self.api, settings.details.batch_size, throttle);
        let mut known: HashMap<String, BTreeMap<String, Detail>> = HashMap::new();

        while let Some(page) = aggregator.next_page().await? {
            for relationship in &types {
                if let Some(spec) = specs.get(&relationship.remote_type) {
                    let cached = known.entry(relationship.remote_type.clone()).or_default();
                    let ids = page.associations.all_ids(&relationship.name);
                    fetch_missing(&enricher, spec, ids, cached).await?;
                }
            }

            let ContactPage {
                number,
                contacts,
                associations,
            } = page;
            let mut reports = Vec::with_capacity(contacts.len());
            for contact in contacts {
                let related: Vec<RelatedObjects> = types
                    .iter()
                    .map(|relationship| {
                        let ids = associations.get(&contact.id, &relationship.name).to_vec();
                        let details = specs
                            .contains_key(&relationship.remote_type)
                            .then(|| lookup(known.get(&relationship.remote_type), &ids));
                        RelatedObjects {
                            relationship: relationship.name.clone(),
                            object_type: relationship.remote_type.clone(),
                            ids,
                            details,
                        }
                    })
                    .collect();

                let submitted = match (&submissions, contact.email()) {
                    (Some(cache), Some(email)) => cache.entries_for(&email).to_vec(),
                    _ => Vec::new(),
                };

                let counted = match &engagement {
                    Some(counter) => Some(counter.count(&contact.id).await),
                    None => None,
                };

                let report = ContactReport {
                    contact,
                    related,
                    submissions: submitted,
                    engagement: counted,
                };
                summary.record(&report);
                reports.push(report);
            }

            summary.pages += 1;
            sink.on_page(
                &PageReport {
                    number,
                    contacts: reports,
                },
                &labels,
            );
        }

        info!(
            contacts = summary.contacts,
            pages = summary.pages,
            unknown_objects = summary.unknown_objects,
            "run complete"
        );
        Ok(summary)
    }
}

/// Fetch details for the ids not already in `cached`.
async fn fetch_missing<A: CrmApi + ?Sized>(
    enricher: &DetailEnricher<'_, A>,
    spec: &DetailSpec,
    ids: Vec<String>,
    cached: &mut BTreeMap<String, Detail>,
) -> PipelineResult<()> {
    let missing: Vec<String> = ids
        .into_iter()
        .filter(|id| !cached.contains_key(id))
        .collect();
    cached.extend(enricher.fetch(spec, &missing).await?);
    Ok(())
}

/// Details for `ids` in order; anything never fetched is unknown.
fn lookup(cached: Option<&BTreeMap<String, Detail>>, ids: &[String]) -> Vec<Detail> {
    ids.iter()
        .map(|id| {
            cached
                .and_then(|c| c.get(id))
                .cloned()
                .unwrap_or_else(|| Detail::Unknown { id: id.clone() })
        })
        .collect()
}

fn detail_spec(remote_type: &str) -> Option<DetailSpec> {
    match remote_type {
        "deals" => Some(DetailSpec::deals()),
        "emails" => Some(DetailSpec::emails()),
        _ => None,
    }
}
