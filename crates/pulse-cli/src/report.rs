//! Plain-text rendering of pages and the run summary.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Utc};
use pulse_core::field::{Detail, UNKNOWN_OBJECT};
use pulse_core::models::SubmissionCache;
use pulse_pipeline::details::StageLabels;
use pulse_pipeline::engagement::CountStatus;
use pulse_pipeline::submissions::RefreshMode;
use pulse_pipeline::{ContactReport, PageReport, ReportSink, RunSummary};

/// Contact properties shown in the header line, in order.
const NAME_PROPERTIES: [&str; 2] = ["firstname", "lastname"];

/// Writes each page to `out` as it arrives.
pub struct TextReport<W: Write> {
    out: W,
    failed_writes: usize,
}

impl<W: Write> TextReport<W> {
    /// Report into `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            failed_writes: 0,
        }
    }

    /// Pages that could not be written.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes
    }
}

impl<W: Write> ReportSink for TextReport<W> {
    fn on_page(&mut self, page: &PageReport, labels: &StageLabels) {
        let text = render_page(page, labels);
        if self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .is_err()
        {
            self.failed_writes += 1;
        }
    }
}

/// Render one page.
pub fn render_page(page: &PageReport, labels: &StageLabels) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "── page {} ({} contacts) ──", page.number, page.contacts.len());
    for report in &page.contacts {
        render_contact(&mut text, report, labels);
    }
    text
}

fn render_contact(text: &mut String, report: &ContactReport, labels: &StageLabels) {
    let contact = &report.contact;
    let name: Vec<&str> = NAME_PROPERTIES
        .iter()
        .filter_map(|p| contact.property(p))
        .filter(|v| !v.is_empty())
        .collect();
    let name = if name.is_empty() {
        "(no name)".to_string()
    } else {
        name.join(" ")
    };
    let email = contact.email().unwrap_or_else(|| "(no email)".to_string());
    let _ = writeln!(text, "\n{name} <{email}> [{}]", contact.id);
    if let Some(company) = contact.property("company").filter(|c| !c.is_empty()) {
        let _ = writeln!(text, "  company: {company}");
    }

    for group in &report.related {
        let _ = writeln!(text, "  {}: {}", group.relationship, group.ids.len());
        match &group.details {
            Some(details) => {
                for detail in details {
                    let line = describe(detail, &group.object_type, labels);
                    let _ = writeln!(text, "    - {line}");
                }
            }
            None => {
                for id in &group.ids {
                    let _ = writeln!(text, "    - {id}");
                }
            }
        }
    }

    if !report.submissions.is_empty() {
        let _ = writeln!(text, "  form submissions: {}", report.submissions.len());
        for entry in &report.submissions {
            let when = entry
                .submitted_at
                .map_or_else(|| "(no date)".to_string(), format_millis);
            let _ = writeln!(text, "    - {} at {when}", entry.form_name);
        }
    }

    if let Some(engagement) = report.engagement {
        let note = match engagement.status {
            CountStatus::Counted => "",
            CountStatus::TierUnavailable => " (event log not available)",
            CountStatus::Failed => " (event log read failed)",
            CountStatus::Unresolved => " (event types unknown)",
        };
        let _ = writeln!(
            text,
            "  email opens: {}, clicks: {}{note}",
            engagement.counts.opens, engagement.counts.clicks
        );
    }
}

/// One line for a related object.
fn describe(detail: &Detail, object_type: &str, labels: &StageLabels) -> String {
    if !detail.is_known() {
        return format!("{} {UNKNOWN_OBJECT}", detail.id());
    }
    match object_type {
        "deals" => {
            let stage = detail.field("dealstage");
            let stage = stage.value().map_or(stage.display(), |id| labels.label(id));
            format!(
                "{} | {} | {} | closes {}",
                detail.field("dealname"),
                stage,
                detail.field("amount"),
                detail.field("closedate"),
            )
        }
        "emails" => format!(
            "{} | {} | {}",
            detail.field("hs_email_subject"),
            detail.field("hs_email_direction"),
            detail.field("hs_timestamp"),
        ),
        _ => detail.id().to_string(),
    }
}

/// Render the end-of-run summary.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "\n══ summary ══");
    let _ = writeln!(
        text,
        "contacts: {} in {} page(s)",
        summary.contacts, summary.pages
    );
    for (relationship, count) in &summary.related {
        let _ = writeln!(text, "{relationship}: {count}");
    }
    if summary.unknown_objects > 0 {
        let _ = writeln!(text, "unknown related objects: {}", summary.unknown_objects);
    }

    match &summary.submissions {
        Some(subs) => {
            let mode = match subs.mode {
                RefreshMode::Incremental => "incremental",
                RefreshMode::Full => "full",
            };
            let _ = writeln!(
                text,
                "form submissions ({mode}): {} forms, {} emails, {} entries (+{} new, {} updated)",
                subs.forms, subs.emails, subs.entries, subs.added, subs.updated
            );
            let _ = writeln!(
                text,
                "contacts with submissions: {}",
                summary.contacts_with_submissions
            );
            if !subs.gaps.is_empty() {
                let _ = writeln!(text, "possible gaps in forms: {}", subs.gaps.join(", "));
            }
        }
        None => {
            let _ = writeln!(text, "form submissions: disabled");
        }
    }

    let engagement = &summary.engagement;
    if !engagement.enabled {
        let _ = writeln!(text, "engagement: disabled");
    } else if !engagement.resolved {
        let _ = writeln!(text, "engagement: event types not found, counts are zero");
    } else {
        let _ = writeln!(
            text,
            "engagement: {} opens, {} clicks ({} counted, {} unavailable, {} failed)",
            engagement.totals.opens,
            engagement.totals.clicks,
            engagement.counted,
            engagement.tier_unavailable,
            engagement.failed
        );
    }
    text
}

/// Render `cache-stats` output.
pub fn render_cache_stats(path: &str, cache: Option<&SubmissionCache>) -> String {
    match cache {
        None => format!("no submission cache at {path}\n"),
        Some(cache) => format!(
            "cache: {path}\nfetched at: {}\nemails: {}\nentries: {}\n",
            format_millis(cache.fetched_at),
            cache.by_email.len(),
            cache.entry_count()
        ),
    }
}

fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pulse_core::field::Field;
    use pulse_core::models::{Contact, DealPipeline, EngagementCount, FormSubmissionEntry};
    use pulse_pipeline::engagement::ContactEngagement;
    use pulse_pipeline::{EngagementSummary, RelatedObjects, SubmissionSummary};

    use super::*;

    fn contact() -> Contact {
        let mut properties = BTreeMap::new();
        let _ = properties.insert("firstname".into(), Some("Ada".into()));
        let _ = properties.insert("lastname".into(), Some("Lovelace".into()));
        let _ = properties.insert("email".into(), Some("Ada@X.com".into()));
        Contact {
            id: "1".into(),
            properties,
        }
    }

    fn deal(id: &str, name: &str, stage: &str) -> Detail {
        let mut fields = BTreeMap::new();
        let _ = fields.insert("dealname".into(), Field::Present(name.into()));
        let _ = fields.insert("dealstage".into(), Field::Present(stage.into()));
        let _ = fields.insert("amount".into(), Field::Absent("(no amount)"));
        let _ = fields.insert("closedate".into(), Field::Absent("(no close date)"));
        Detail::Known {
            id: id.into(),
            fields,
        }
    }

    fn labels() -> StageLabels {
        StageLabels::from_pipelines(&[DealPipeline {
            id: "default".into(),
            label: "Sales".into(),
            stages: vec![("closedwon".into(), "Closed Won".into())],
        }])
    }

    #[test]
    fn page_lists_deals_with_stage_labels_and_placeholders() {
        let page = PageReport {
            number: 1,
            contacts: vec![ContactReport {
                contact: contact(),
                related: vec![RelatedObjects {
                    relationship: "deals".into(),
                    object_type: "deals".into(),
                    ids: vec!["d1".into(), "d2".into()],
                    details: Some(vec![
                        deal("d1", "Acme", "closedwon"),
                        Detail::Unknown { id: "d2".into() },
                    ]),
                }],
                submissions: vec![FormSubmissionEntry {
                    form_name: "Contact us".into(),
                    form_guid: "F1".into(),
                    submitted_at: Some(0),
                    page_url: None,
                    conversion_id: None,
                    values: Vec::new(),
                }],
                engagement: Some(ContactEngagement {
                    counts: EngagementCount { opens: 0, clicks: 0 },
                    status: CountStatus::TierUnavailable,
                }),
            }],
        };
        let text = render_page(&page, &labels());

        assert!(text.contains("Ada Lovelace <ada@x.com> [1]"));
        assert!(text.contains("deals: 2"));
        assert!(text.contains("Acme | Closed Won | (no amount) | closes (no close date)"));
        assert!(text.contains("d2 (unknown)"));
        assert!(text.contains("Contact us at 1970-01-01 00:00 UTC"));
        assert!(text.contains("email opens: 0, clicks: 0 (event log not available)"));
    }

    #[test]
    fn summary_mentions_disabled_features() {
        let summary = RunSummary {
            contacts: 3,
            pages: 1,
            ..Default::default()
        };
        let text = render_summary(&summary);
        assert!(text.contains("contacts: 3 in 1 page(s)"));
        assert!(text.contains("form submissions: disabled"));
        assert!(text.contains("engagement: disabled"));
    }

    #[test]
    fn summary_reports_cache_and_gaps() {
        let summary = RunSummary {
            submissions: Some(SubmissionSummary {
                mode: RefreshMode::Incremental,
                forms: 2,
                emails: 5,
                entries: 9,
                added: 1,
                updated: 2,
                gaps: vec!["F1".into()],
            }),
            engagement: EngagementSummary {
                enabled: true,
                resolved: true,
                counted: 2,
                tier_unavailable: 1,
                failed: 0,
                totals: EngagementCount { opens: 4, clicks: 1 },
            },
            ..Default::default()
        };
        let text = render_summary(&summary);
        assert!(text.contains(
            "form submissions (incremental): 2 forms, 5 emails, 9 entries (+1 new, 2 updated)"
        ));
        assert!(text.contains("possible gaps in forms: F1"));
        assert!(
            text.contains("engagement: 4 opens, 1 clicks (2 counted, 1 unavailable, 0 failed)")
        );
    }

    #[test]
    fn text_report_writes_each_page() {
        let mut sink = TextReport::new(Vec::new());
        let page = PageReport {
            number: 7,
            contacts: Vec::new(),
        };
        sink.on_page(&page, &StageLabels::default());
        assert_eq!(sink.failed_writes(), 0);
        let written = String::from_utf8(sink.out).unwrap();
        assert!(written.starts_with("── page 7 (0 contacts) ──"));
    }

    #[test]
    fn cache_stats_without_cache() {
        assert_eq!(
            render_cache_stats("/tmp/c.json", None),
            "no submission cache at /tmp/c.json\n"
        );
        let cache = SubmissionCache::default();
        assert!(render_cache_stats("/tmp/c.json", Some(&cache)).contains("emails: 0"));
    }
}
