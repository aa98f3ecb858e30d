//! The CRM operations the pipeline depends on.
//!
//! Implemented by [`CrmClient`](crate::client::CrmClient) against the live REST
//! API and by the scripted `MockCrm` for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pulse_core::models::{
    AssociationRow, Contact, CrmObject, DealPipeline, EventRecord, FormInfo, RawSubmission,
};
use pulse_core::paging::Page;

use crate::error::CrmResult;

/// Largest page the contact search endpoint accepts.
pub const CONTACT_SEARCH_MAX_PAGE: usize = 100;
/// Largest page the legacy submissions export accepts.
pub const FORM_SUBMISSIONS_MAX_PAGE: usize = 50;
/// Largest page the event log accepts.
pub const EVENTS_MAX_PAGE: usize = 100;

/// One search filter (`propertyName operator value`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    /// Property to filter on.
    pub property_name: String,
    /// CRM operator (`EQ`, `GT`, `HAS_PROPERTY`, ...).
    pub operator: String,
    /// Comparison value; omitted for unary operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Sort order for contact search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSort {
    /// Property to sort on.
    pub property_name: String,
    /// `ASCENDING` or `DESCENDING`.
    pub direction: String,
}

/// What to search for and which properties to return.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactQuery {
    /// Filters combined with AND.
    pub filters: Vec<SearchFilter>,
    /// Sort order.
    pub sorts: Vec<SearchSort>,
    /// Properties to return.
    pub properties: Vec<String>,
}

/// Remote CRM operations.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// One page of contact search results.
    async fn search_contacts(
        &self,
        query: &ContactQuery,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<Contact>>;

    /// Association batch read from contacts to `to_type`.
    ///
    /// Contacts with no associations may be absent from the result.
    async fn batch_associations(
        &self,
        to_type: &str,
        contact_ids: &[String],
    ) -> CrmResult<Vec<AssociationRow>>;

    /// Batch read of objects by id. Unknown ids are simply missing.
    async fn batch_read_objects(
        &self,
        object_type: &str,
        ids: &[String],
        properties: &[String],
    ) -> CrmResult<Vec<CrmObject>>;

    /// All deal pipelines with their stages.
    async fn deal_pipelines(&self) -> CrmResult<Vec<DealPipeline>>;

    /// All legacy forms.
    async fn list_forms(&self) -> CrmResult<Vec<FormInfo>>;

    /// One page of a form's submissions, newest first.
    async fn form_submissions(
        &self,
        form_guid: &str,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<RawSubmission>>;

    /// Names of every event type known to the account.
    async fn event_types(&self) -> CrmResult<Vec<String>>;

    /// One page of a contact's event log.
    async fn contact_events(
        &self,
        contact_id: &str,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<EventRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_serialises_camel_case_and_skips_missing_value() {
        let f = SearchFilter {
            property_name: "email".into(),
            operator: "HAS_PROPERTY".into(),
            value: None,
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json, serde_json::json!({"propertyName": "email", "operator": "HAS_PROPERTY"}));
    }
}
