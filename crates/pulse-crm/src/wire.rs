//! Request and response bodies of the CRM REST API.
//!
//! Only the fields the pipeline reads are modelled; everything else is
//! ignored on deserialisation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pulse_core::models::{
    AssociationRow, Contact, CrmObject, DealPipeline, EventRecord, FormInfo, RawSubmission,
    SubmissionValue,
};

use crate::api::{SearchFilter, SearchSort};

// ─────────────────────────────────────────────────────────────────────────────
// Shared pieces
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextPage {
    #[serde(default)]
    pub after: Option<Value>,
}

/// Continuation token; some endpoints send it as a number.
pub(crate) fn next_cursor(paging: Option<Paging>) -> Option<String> {
    paging
        .and_then(|p| p.next)
        .and_then(|n| n.after)
        .and_then(|v| scalar_to_string(&v))
}

/// Strings pass through, numbers and booleans are stringified, null and
/// structured values are dropped.
pub(crate) fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn properties_map(raw: BTreeMap<String, Value>) -> BTreeMap<String, Option<String>> {
    raw.into_iter()
        .map(|(k, v)| {
            let value = scalar_to_string(&v);
            (k, value)
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct IdInput<'a> {
    pub id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectWire {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl From<ObjectWire> for Contact {
    fn from(w: ObjectWire) -> Self {
        Contact {
            id: w.id,
            properties: properties_map(w.properties),
        }
    }
}

impl From<ObjectWire> for CrmObject {
    fn from(w: ObjectWire) -> Self {
        CrmObject {
            id: w.id,
            properties: properties_map(w.properties),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Contact search
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchRequest<'a> {
    pub filter_groups: Vec<FilterGroup<'a>>,
    pub sorts: &'a [SearchSort],
    pub properties: &'a [String],
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FilterGroup<'a> {
    pub filters: &'a [SearchFilter],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectListResponse {
    #[serde(default)]
    pub results: Vec<ObjectWire>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Associations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct BatchIdsRequest<'a> {
    pub inputs: Vec<IdInput<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchReadRequest<'a> {
    pub inputs: Vec<IdInput<'a>>,
    pub properties: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssociationResponse {
    #[serde(default)]
    pub results: Vec<AssociationResultWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssociationResultWire {
    pub from: FromWire,
    #[serde(default)]
    pub to: Vec<ToWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FromWire {
    pub id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToWire {
    pub to_object_id: Value,
}

impl AssociationResultWire {
    pub(crate) fn into_row(self) -> Option<AssociationRow> {
        let from_id = scalar_to_string(&self.from.id)?;
        let to_ids = self
            .to
            .iter()
            .filter_map(|t| scalar_to_string(&t.to_object_id))
            .collect();
        Some(AssociationRow { from_id, to_ids })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipelines
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PipelinesResponse {
    #[serde(default)]
    pub results: Vec<PipelineWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PipelineWire {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub stages: Vec<StageWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StageWire {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl From<PipelineWire> for DealPipeline {
    fn from(w: PipelineWire) -> Self {
        DealPipeline {
            id: w.id,
            label: w.label,
            stages: w.stages.into_iter().map(|s| (s.id, s.label)).collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forms
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct FormWire {
    pub guid: String,
    #[serde(default)]
    pub name: String,
}

impl From<FormWire> for FormInfo {
    fn from(w: FormWire) -> Self {
        FormInfo {
            guid: w.guid,
            name: w.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionsResponse {
    #[serde(default)]
    pub results: Vec<SubmissionWire>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionWire {
    #[serde(default)]
    pub submitted_at: Option<i64>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub conversion_id: Option<String>,
    #[serde(default)]
    pub values: Vec<SubmissionValueWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionValueWire {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl From<SubmissionWire> for RawSubmission {
    fn from(w: SubmissionWire) -> Self {
        RawSubmission {
            submitted_at: w.submitted_at,
            page_url: w.page_url,
            conversion_id: w.conversion_id,
            values: w
                .values
                .into_iter()
                .map(|v| SubmissionValue {
                    value: scalar_to_string(&v.value).unwrap_or_default(),
                    name: v.name,
                })
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventTypesResponse {
    #[serde(default)]
    pub event_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsResponse {
    #[serde(default)]
    pub results: Vec<EventWire>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventWire {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub occurred_at: Option<String>,
}

impl From<EventWire> for EventRecord {
    fn from(w: EventWire) -> Self {
        EventRecord {
            event_type: w.event_type,
            occurred_at: w.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_cursor_accepts_string_and_number() {
        let p: Paging =
            serde_json::from_value(serde_json::json!({"next": {"after": "abc"}})).unwrap();
        assert_eq!(next_cursor(Some(p)).as_deref(), Some("abc"));
        let p: Paging =
            serde_json::from_value(serde_json::json!({"next": {"after": 200}})).unwrap();
        assert_eq!(next_cursor(Some(p)).as_deref(), Some("200"));
        let p: Paging = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(next_cursor(Some(p)), None);
        assert_eq!(next_cursor(None), None);
    }

    #[test]
    fn object_properties_keep_nulls_as_none() {
        let w: ObjectWire = serde_json::from_value(serde_json::json!({
            "id": "7",
            "properties": {"email": "a@x.com", "firstname": null, "num_notes": 3}
        }))
        .unwrap();
        let c = Contact::from(w);
        assert_eq!(c.property("email"), Some("a@x.com"));
        assert_eq!(c.properties["firstname"], None);
        assert_eq!(c.property("num_notes"), Some("3"));
    }

    #[test]
    fn association_row_stringifies_numeric_ids() {
        let w: AssociationResultWire = serde_json::from_value(serde_json::json!({
            "from": {"id": "101"},
            "to": [{"toObjectId": 5001, "associationTypes": []}, {"toObjectId": "5002"}]
        }))
        .unwrap();
        let row = w.into_row().unwrap();
        assert_eq!(row.from_id, "101");
        assert_eq!(row.to_ids, vec!["5001", "5002"]);
    }

    #[test]
    fn submission_values_tolerate_non_string() {
        let w: SubmissionWire = serde_json::from_value(serde_json::json!({
            "submittedAt": 1_700_000_000_000_i64,
            "values": [{"name": "email", "value": "a@x.com"}, {"name": "employees", "value": 12}]
        }))
        .unwrap();
        let raw = RawSubmission::from(w);
        assert_eq!(raw.values[1].value, "12");
        assert_eq!(raw.conversion_id, None);
        assert_eq!(raw.email().as_deref(), Some("a@x.com"));
    }
}
