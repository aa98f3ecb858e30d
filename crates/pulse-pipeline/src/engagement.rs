//! Email opens and clicks from the contact event log.
//!
//! Engagement is best-effort: nothing in here returns an error. A missing
//! tier, an unknown event type or a failed read all degrade to zero counts.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use pulse_core::models::{EngagementCount, EventRecord};
use pulse_core::{Page, PageSource, Paginator, Throttle};
use pulse_crm::api::EVENTS_MAX_PAGE;
use pulse_crm::{CrmApi, CrmError};
use pulse_settings::EngagementSettings;

/// One contact's event log.
pub struct ContactEvents<'a, A: ?Sized> {
    api: &'a A,
    contact_id: String,
    page_size: usize,
}

impl<'a, A: CrmApi + ?Sized> ContactEvents<'a, A> {
    /// Page through `contact_id`'s events.
    pub fn new(api: &'a A, contact_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            api,
            contact_id: contact_id.into(),
            page_size: page_size.clamp(1, EVENTS_MAX_PAGE),
        }
    }
}

#[async_trait]
impl<'a, A: CrmApi + ?Sized> PageSource for ContactEvents<'a, A> {
    type Item = EventRecord;
    type Error = CrmError;

    async fn fetch(&mut self, after: Option<String>) -> Result<Page<EventRecord>, CrmError> {
        self.api
            .contact_events(&self.contact_id, after, self.page_size)
            .await
    }
}

/// Event type names to count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventTypeNames {
    /// "Email opened" event type.
    pub open: Option<String>,
    /// "Email clicked" event type.
    pub click: Option<String>,
}

impl EventTypeNames {
    /// Whether at least one type is known.
    pub fn is_resolved(&self) -> bool {
        self.open.is_some() || self.click.is_some()
    }

    /// Fill unset names by matching `known` case-insensitively: the first name
    /// containing "email" and "open" (or "click").
    pub fn resolve(open: Option<String>, click: Option<String>, known: &[String]) -> Self {
        let find = |needle: &str| {
            known
                .iter()
                .find(|name| {
                    let lower = name.to_lowercase();
                    lower.contains("email") && lower.contains(needle)
                })
                .cloned()
        };
        Self {
            open: open.or_else(|| find("open")),
            click: click.or_else(|| find("click")),
        }
    }
}

/// How one contact's count came out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountStatus {
    /// The log was read.
    Counted,
    /// The event log is not licensed on this account (403/404).
    TierUnavailable,
    /// Another failure; counts forced to zero.
    Failed,
    /// No event type could be resolved; nothing was read.
    Unresolved,
}

/// Counts for one contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEngagement {
    /// Tallies (zero unless `status` is `Counted`).
    pub counts: EngagementCount,
    /// How the tallies were obtained.
    pub status: CountStatus,
}

impl ContactEngagement {
    fn zero(status: CountStatus) -> Self {
        Self {
            counts: EngagementCount::default(),
            status,
        }
    }
}

/// Tallies email opens and clicks per contact.
pub struct EngagementCounter<'a, A: CrmApi + ?Sized> {
    api: &'a A,
    types: EventTypeNames,
    page_size: usize,
    max_events: usize,
    throttle: Throttle,
}

impl<'a, A: CrmApi + ?Sized> EngagementCounter<'a, A> {
    /// Resolve event type names once for the run.
    ///
    /// The event-type listing is only called when an override is missing; a
    /// failure there leaves the missing names unresolved.
    pub async fn resolve(api: &'a A, settings: &EngagementSettings, throttle: Throttle) -> Self {
        let open = settings.open_event_type.clone();
        let click = settings.click_event_type.clone();
        let known = if open.is_some() && click.is_some() {
            Vec::new()
        } else {
            let listed = api.event_types().await;
            throttle.wait().await;
            listed.unwrap_or_else(|e| {
                warn!(error = %e, kind = e.error_kind(), "event types unavailable");
                Vec::new()
            })
        };

        let types = EventTypeNames::resolve(open, click, &known);
        if types.is_resolved() {
            info!(open = ?types.open, click = ?types.click, "engagement event types resolved");
        } else {
            warn!("no email open/click event types found, engagement counts will be zero");
        }
        Self::with_types(api, types, settings, throttle)
    }

    /// Counter with already-known event type names.
    pub fn with_types(
        api: &'a A,
        types: EventTypeNames,
        settings: &EngagementSettings,
        throttle: Throttle,
    ) -> Self {
        Self {
            api,
            types,
            page_size: settings.page_size,
            max_events: settings.max_events_per_contact,
            throttle,
        }
    }

    /// Resolved event type names.
    pub fn types(&self) -> &EventTypeNames {
        &self.types
    }

    /// Count one contact's opens and clicks. Never fails.
    #[instrument(skip(self))]
    pub async fn count(&self, contact_id: &str) -> ContactEngagement {
        if !self.types.is_resolved() {
            return ContactEngagement::zero(CountStatus::Unresolved);
        }

        let source = ContactEvents::new(self.api, contact_id, self.page_size);
        let mut pages = Paginator::new(source)
            .with_max_items(self.max_events)
            .with_throttle(self.throttle);
        let mut counts = EngagementCount::default();
        loop {
            match pages.next_page().await {
                Ok(Some(events)) => self.tally(&mut counts, &events),
                Ok(None) => break,
                Err(e) if e.is_tier_unavailable() => {
                    debug!(status = ?e.status(), "event log not available on this tier");
                    return ContactEngagement::zero(CountStatus::TierUnavailable);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        kind = e.error_kind(),
                        "event log read failed, counting zero"
                    );
                    return ContactEngagement::zero(CountStatus::Failed);
                }
            }
        }
        ContactEngagement {
            counts,
            status: CountStatus::Counted,
        }
    }

    fn tally(&self, counts: &mut EngagementCount, events: &[EventRecord]) {
        let hit = |name: &Option<String>, event: &EventRecord| {
            name.as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(&event.event_type))
        };
        for event in events {
            if hit(&self.types.open, event) {
                counts.opens += 1;
            } else if hit(&self.types.click, event) {
                counts.clicks += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pulse_crm::{MockCall, MockCrm};

    use super::*;

    const OPEN: &str = "e_email_opened";
    const CLICK: &str = "e_email_clicked";

    fn settings() -> EngagementSettings {
        EngagementSettings::default()
    }

    async fn counter(api: &MockCrm) -> EngagementCounter<'_, MockCrm> {
        EngagementCounter::resolve(api, &settings(), Throttle::disabled()).await
    }

    #[test]
    fn substring_resolution_is_case_insensitive() {
        let known = vec![
            "e_visited_page".to_string(),
            "E_EMAIL_OPENED".to_string(),
            "e_email_link_Clicked".to_string(),
        ];
        let names = EventTypeNames::resolve(None, None, &known);
        assert_eq!(names.open.as_deref(), Some("E_EMAIL_OPENED"));
        assert_eq!(names.click.as_deref(), Some("e_email_link_Clicked"));
    }

    #[test]
    fn overrides_win_over_matching() {
        let known = vec![OPEN.to_string()];
        let names = EventTypeNames::resolve(Some("custom_open".into()), None, &known);
        assert_eq!(names.open.as_deref(), Some("custom_open"));
        assert_eq!(names.click, None);
        assert!(names.is_resolved());
    }

    #[tokio::test]
    async fn counts_opens_and_clicks() {
        let api = MockCrm::new()
            .with_event_types(&[OPEN, CLICK, "e_form_submitted"])
            .with_events("1", &[OPEN, CLICK, OPEN, "e_form_submitted", OPEN]);
        let result = counter(&api).await.count("1").await;
        assert_eq!(result.status, CountStatus::Counted);
        assert_eq!(result.counts, EngagementCount { opens: 3, clicks: 1 });
    }

    #[tokio::test]
    async fn forbidden_log_degrades_to_zero() {
        let api = MockCrm::new()
            .with_event_types(&[OPEN, CLICK])
            .with_events("1", &[OPEN])
            .with_event_error("2", 403);
        let counter = counter(&api).await;

        let degraded = counter.count("2").await;
        assert_eq!(degraded.status, CountStatus::TierUnavailable);
        assert_eq!(degraded.counts, EngagementCount { opens: 0, clicks: 0 });
        // Later contacts are still tried.
        assert_eq!(counter.count("1").await.counts.opens, 1);
    }

    #[tokio::test]
    async fn server_error_degrades_to_zero() {
        let api = MockCrm::new()
            .with_event_types(&[OPEN])
            .with_event_error("1", 502);
        let result = counter(&api).await.count("1").await;
        assert_eq!(result.status, CountStatus::Failed);
        assert_eq!(result.counts, EngagementCount::default());
    }

    #[tokio::test]
    async fn unavailable_event_types_mean_zero_without_reads() {
        let api = MockCrm::new().with_events("1", &[OPEN]);
        let counter = counter(&api).await;
        assert!(!counter.types().is_resolved());

        let result = counter.count("1").await;
        assert_eq!(result.status, CountStatus::Unresolved);
        assert_eq!(
            api.count_calls(|c| matches!(c, MockCall::ContactEvents { .. })),
            0
        );
    }

    #[tokio::test]
    async fn both_overrides_skip_the_listing() {
        let api = MockCrm::new().with_events("1", &["my_open"]);
        let settings = EngagementSettings {
            open_event_type: Some("my_open".into()),
            click_event_type: Some("my_click".into()),
            ..settings()
        };
        let counter = EngagementCounter::resolve(&api, &settings, Throttle::disabled()).await;
        assert_eq!(counter.count("1").await.counts.opens, 1);
        assert_eq!(api.count_calls(|c| matches!(c, MockCall::EventTypes)), 0);
    }

    #[tokio::test]
    async fn event_budget_caps_the_scan() {
        let api = MockCrm::new()
            .with_event_types(&[OPEN])
            .with_events("1", &[OPEN; 7]);
        let settings = EngagementSettings {
            page_size: 2,
            max_events_per_contact: 5,
            ..settings()
        };
        let counter = EngagementCounter::resolve(&api, &settings, Throttle::disabled()).await;
        assert_eq!(counter.count("1").await.counts.opens, 5);
        assert_eq!(
            api.count_calls(|c| matches!(c, MockCall::ContactEvents { .. })),
            3
        );
    }
}
