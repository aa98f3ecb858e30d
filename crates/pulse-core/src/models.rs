//! Domain types shared by the CRM client and the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Contacts and associations
// ─────────────────────────────────────────────────────────────────────────────

/// A contact snapshot as returned by one search page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Opaque CRM id.
    pub id: String,
    /// Requested property values; `None` when the CRM returned null.
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
}

impl Contact {
    /// Property value, treating null and missing alike.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_deref())
    }

    /// Lowercased, trimmed email address if the contact has one.
    pub fn email(&self) -> Option<String> {
        self.property("email")
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// A configured relationship: local name plus the CRM's object type name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationType {
    /// Name used in reports (e.g. `deals`).
    pub name: String,
    /// Remote object type (e.g. `deals`, `emails`, `0-3`).
    pub remote_type: String,
}

impl AssociationType {
    /// Shorthand constructor.
    pub fn new(name: impl Into<String>, remote_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_type: remote_type.into(),
        }
    }
}

/// One row of an association batch read: a source id and its targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationRow {
    /// Contact id the row belongs to.
    pub from_id: String,
    /// Related object ids in response order.
    pub to_ids: Vec<String>,
}

/// contact id → relationship name → related ids (response order).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssociationSet {
    by_contact: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl AssociationSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `contact_id` has an entry for `relationship`, even if empty.
    pub fn ensure(&mut self, contact_id: &str, relationship: &str) {
        let _ = self
            .by_contact
            .entry(contact_id.to_string())
            .or_default()
            .entry(relationship.to_string())
            .or_default();
    }

    /// Append ids for a contact/relationship, preserving order.
    pub fn extend(&mut self, contact_id: &str, relationship: &str, ids: Vec<String>) {
        self.by_contact
            .entry(contact_id.to_string())
            .or_default()
            .entry(relationship.to_string())
            .or_default()
            .extend(ids);
    }

    /// Related ids for a contact; empty when nothing was associated.
    pub fn get(&self, contact_id: &str, relationship: &str) -> &[String] {
        self.by_contact
            .get(contact_id)
            .and_then(|m| m.get(relationship))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether an entry (possibly empty) exists.
    pub fn contains(&self, contact_id: &str, relationship: &str) -> bool {
        self.by_contact
            .get(contact_id)
            .is_some_and(|m| m.contains_key(relationship))
    }

    /// All ids of one relationship across every contact, ordered by contact id
    /// and then by upstream order within a contact.
    pub fn all_ids(&self, relationship: &str) -> Vec<String> {
        self.by_contact
            .values()
            .filter_map(|m| m.get(relationship))
            .flatten()
            .cloned()
            .collect()
    }

    /// Number of contacts with at least one entry.
    pub fn len(&self) -> usize {
        self.by_contact.len()
    }

    /// Whether no contact has been recorded.
    pub fn is_empty(&self) -> bool {
        self.by_contact.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch-read objects
// ─────────────────────────────────────────────────────────────────────────────

/// A generic CRM object returned by a batch read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrmObject {
    /// Object id.
    pub id: String,
    /// Requested properties; `None` for null.
    pub properties: BTreeMap<String, Option<String>>,
}

/// A deal pipeline with its stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DealPipeline {
    /// Pipeline id.
    pub id: String,
    /// Pipeline label.
    pub label: String,
    /// Stages as (id, label).
    pub stages: Vec<(String, String)>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Forms
// ─────────────────────────────────────────────────────────────────────────────

/// A legacy form known to the account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormInfo {
    /// Form identifier.
    pub guid: String,
    /// Display name.
    pub name: String,
}

/// One submitted field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionValue {
    /// Field name.
    pub name: String,
    /// Submitted value.
    pub value: String,
}

/// A submission as returned by the per-form export, before it is keyed by email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSubmission {
    /// Epoch milliseconds.
    pub submitted_at: Option<i64>,
    /// Page the form was submitted from.
    pub page_url: Option<String>,
    /// Provider-assigned conversion id.
    pub conversion_id: Option<String>,
    /// Submitted fields in form order.
    pub values: Vec<SubmissionValue>,
}

impl RawSubmission {
    /// Lowercased submitter email taken from the `email` field.
    pub fn email(&self) -> Option<String> {
        self.values
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case("email"))
            .map(|v| v.value.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// A cached submission entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmissionEntry {
    /// Form display name.
    pub form_name: String,
    /// Form identifier.
    pub form_guid: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub submitted_at: Option<i64>,
    /// Page the form was submitted from.
    #[serde(default)]
    pub page_url: Option<String>,
    /// Provider-assigned conversion id.
    #[serde(default)]
    pub conversion_id: Option<String>,
    /// Submitted fields in form order.
    #[serde(default)]
    pub values: Vec<SubmissionValue>,
}

impl FormSubmissionEntry {
    /// Build an entry for `form` from a raw submission.
    pub fn from_raw(form: &FormInfo, raw: RawSubmission) -> Self {
        Self {
            form_name: form.name.clone(),
            form_guid: form.guid.clone(),
            submitted_at: raw.submitted_at,
            page_url: raw.page_url,
            conversion_id: raw.conversion_id,
            values: raw.values,
        }
    }

    /// Dedup key within one email's list.
    pub fn key(&self) -> (&str, Option<&str>) {
        (&self.form_guid, self.conversion_id.as_deref())
    }
}

/// lowercased email → submissions in first-seen order.
pub type SubmissionsByEmail = BTreeMap<String, Vec<FormSubmissionEntry>>;

/// The persisted form-submission cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCache {
    /// When the cache was last refreshed (epoch ms).
    pub fetched_at: i64,
    /// Entries keyed by lowercased email.
    #[serde(default)]
    pub by_email: SubmissionsByEmail,
}

impl SubmissionCache {
    /// Entries for an email (case-insensitive).
    pub fn entries_for(&self, email: &str) -> &[FormSubmissionEntry] {
        self.by_email
            .get(&email.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total entries across every email.
    pub fn entry_count(&self) -> usize {
        self.by_email.values().map(Vec::len).sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engagement
// ─────────────────────────────────────────────────────────────────────────────

/// One event-log record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Event type name as reported by the CRM.
    pub event_type: String,
    /// When it happened, as sent by the CRM.
    pub occurred_at: Option<String>,
}

/// Email engagement tallies for one contact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCount {
    /// Email opens.
    pub opens: u64,
    /// Email clicks.
    pub clicks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, email: Option<&str>) -> Contact {
        let mut properties = BTreeMap::new();
        let _ = properties.insert("email".to_string(), email.map(String::from));
        Contact {
            id: id.into(),
            properties,
        }
    }

    #[test]
    fn contact_email_is_normalised() {
        assert_eq!(
            contact("1", Some("  A@X.com ")).email().as_deref(),
            Some("a@x.com")
        );
        assert_eq!(contact("2", None).email(), None);
        assert_eq!(contact("3", Some("   ")).email(), None);
    }

    #[test]
    fn association_set_missing_is_empty() {
        let mut set = AssociationSet::new();
        set.ensure("c1", "deals");
        assert!(set.contains("c1", "deals"));
        assert!(set.get("c1", "deals").is_empty());
        assert!(set.get("c9", "deals").is_empty());
        assert!(!set.contains("c9", "deals"));
    }

    #[test]
    fn association_set_preserves_order_and_duplicates() {
        let mut set = AssociationSet::new();
        set.extend("c1", "deals", vec!["d2".into(), "d1".into()]);
        set.extend("c1", "deals", vec!["d2".into()]);
        assert_eq!(set.get("c1", "deals"), ["d2", "d1", "d2"]);
        assert_eq!(set.all_ids("deals").len(), 3);
    }

    #[test]
    fn all_ids_follow_contact_id_order() {
        let mut set = AssociationSet::new();
        set.extend("c2", "deals", vec!["d9".into(), "d3".into()]);
        set.extend("c1", "deals", vec!["d5".into()]);
        set.extend("c1", "emails", vec!["e1".into()]);
        assert_eq!(set.all_ids("deals"), ["d5", "d9", "d3"]);
    }

    #[test]
    fn raw_submission_email_lookup() {
        let raw = RawSubmission {
            submitted_at: Some(1),
            page_url: None,
            conversion_id: None,
            values: vec![
                SubmissionValue {
                    name: "firstname".into(),
                    value: "Ann".into(),
                },
                SubmissionValue {
                    name: "Email".into(),
                    value: "Ann@Example.COM".into(),
                },
            ],
        };
        assert_eq!(raw.email().as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn cache_serialises_with_camel_case_keys() {
        let mut cache = SubmissionCache {
            fetched_at: 42,
            by_email: BTreeMap::new(),
        };
        let _ = cache.by_email.insert(
            "a@x.com".into(),
            vec![FormSubmissionEntry {
                form_name: "Demo".into(),
                form_guid: "F1".into(),
                submitted_at: Some(100),
                page_url: Some("https://x.com".into()),
                conversion_id: Some("C1".into()),
                values: vec![],
            }],
        );
        let json = serde_json::to_value(&cache).unwrap();
        assert_eq!(json["fetchedAt"], 42);
        let entry = &json["byEmail"]["a@x.com"][0];
        assert_eq!(entry["formGuid"], "F1");
        assert_eq!(entry["conversionId"], "C1");
        assert_eq!(entry["submittedAt"], 100);
        assert_eq!(cache.entries_for("A@X.COM").len(), 1);
        assert_eq!(cache.entry_count(), 1);
    }
}
