//! Scripted in-memory [`CrmApi`] for deterministic tests without network access.
//!
//! Responses are programmed up front with the `with_*` builders; every call is
//! recorded so tests can assert on batch sizes, cursors and call counts.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use pulse_core::models::{
    AssociationRow, Contact, CrmObject, DealPipeline, EventRecord, FormInfo, RawSubmission,
};
use pulse_core::paging::Page;

use crate::api::{ContactQuery, CrmApi};
use crate::error::{CrmError, CrmResult};

/// A recorded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    /// `search_contacts`.
    SearchContacts {
        /// Cursor passed in.
        after: Option<String>,
        /// Page size requested.
        limit: usize,
    },
    /// `batch_associations`.
    BatchAssociations {
        /// Target type.
        to_type: String,
        /// Ids in the window.
        ids: Vec<String>,
    },
    /// `batch_read_objects`.
    BatchRead {
        /// Object type.
        object_type: String,
        /// Ids in the window.
        ids: Vec<String>,
    },
    /// `deal_pipelines`.
    DealPipelines,
    /// `list_forms`.
    ListForms,
    /// `form_submissions`.
    FormSubmissions {
        /// Form id.
        form_guid: String,
        /// Cursor passed in.
        after: Option<String>,
    },
    /// `event_types`.
    EventTypes,
    /// `contact_events`.
    ContactEvents {
        /// Contact id.
        contact_id: String,
        /// Cursor passed in.
        after: Option<String>,
    },
}

/// Pre-programmed CRM.
#[derive(Default)]
pub struct MockCrm {
    contact_pages: Vec<Vec<Contact>>,
    associations: HashMap<String, HashMap<String, Vec<String>>>,
    failing_association_types: HashSet<String>,
    objects: HashMap<String, HashMap<String, BTreeMap<String, Option<String>>>>,
    pipelines: Vec<DealPipeline>,
    forms: Vec<FormInfo>,
    submissions: HashMap<String, Vec<RawSubmission>>,
    failing_forms: HashSet<String>,
    event_types: Option<Vec<String>>,
    events: HashMap<String, Vec<EventRecord>>,
    event_errors: HashMap<String, u16>,
    calls: Mutex<Vec<MockCall>>,
}

fn api_error(status: u16, body: &str) -> CrmError {
    CrmError::Api {
        status,
        body: body.to_string(),
    }
}

/// Slice `items` at an offset cursor.
fn offset_page<T: Clone>(items: &[T], after: Option<&str>, limit: usize) -> CrmResult<Page<T>> {
    let start = match after {
        Some(cursor) => cursor
            .parse::<usize>()
            .map_err(|_| api_error(400, "bad cursor"))?,
        None => 0,
    };
    let end = (start + limit.max(1)).min(items.len());
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    Ok(Page::new(page, next))
}

impl MockCrm {
    /// Empty CRM: no contacts, no forms, event types unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contact search pages, served in order.
    #[must_use]
    pub fn with_contact_pages(mut self, pages: Vec<Vec<Contact>>) -> Self {
        self.contact_pages = pages;
        self
    }

    /// Associations from `contact_id` to `to_type` objects.
    #[must_use]
    pub fn with_associations(mut self, to_type: &str, contact_id: &str, ids: &[&str]) -> Self {
        let _ = self
            .associations
            .entry(to_type.to_string())
            .or_default()
            .insert(
                contact_id.to_string(),
                ids.iter().map(ToString::to_string).collect(),
            );
        self
    }

    /// Every association batch read for `to_type` fails with a 500.
    #[must_use]
    pub fn failing_associations(mut self, to_type: &str) -> Self {
        let _ = self.failing_association_types.insert(to_type.to_string());
        self
    }

    /// An object returned by batch reads.
    #[must_use]
    pub fn with_object(
        mut self,
        object_type: &str,
        id: &str,
        properties: &[(&str, Option<&str>)],
    ) -> Self {
        let props = properties
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.map(ToString::to_string)))
            .collect();
        let _ = self
            .objects
            .entry(object_type.to_string())
            .or_default()
            .insert(id.to_string(), props);
        self
    }

    /// A deal pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: DealPipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// A form and its submissions, newest first.
    #[must_use]
    pub fn with_form(mut self, guid: &str, name: &str, submissions: Vec<RawSubmission>) -> Self {
        self.forms.push(FormInfo {
            guid: guid.to_string(),
            name: name.to_string(),
        });
        let _ = self.submissions.insert(guid.to_string(), submissions);
        self
    }

    /// Submission reads for `guid` fail with a 500.
    #[must_use]
    pub fn failing_form(mut self, guid: &str) -> Self {
        let _ = self.failing_forms.insert(guid.to_string());
        self
    }

    /// Known event type names. Without this, the call answers 403.
    #[must_use]
    pub fn with_event_types(mut self, types: &[&str]) -> Self {
        self.event_types = Some(types.iter().map(ToString::to_string).collect());
        self
    }

    /// Event log of one contact.
    #[must_use]
    pub fn with_events(mut self, contact_id: &str, event_types: &[&str]) -> Self {
        let events = event_types
            .iter()
            .map(|t| EventRecord {
                event_type: (*t).to_string(),
                occurred_at: None,
            })
            .collect();
        let _ = self.events.insert(contact_id.to_string(), events);
        self
    }

    /// Event log reads for `contact_id` fail with `status`.
    #[must_use]
    pub fn with_event_error(mut self, contact_id: &str, status: u16) -> Self {
        let _ = self.event_errors.insert(contact_id.to_string(), status);
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl CrmApi for MockCrm {
    async fn search_contacts(
        &self,
        _query: &ContactQuery,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<Contact>> {
        self.record(MockCall::SearchContacts {
            after: after.clone(),
            limit,
        });
        let idx = match after {
            Some(c) => c.parse::<usize>().map_err(|_| api_error(400, "bad cursor"))?,
            None => 0,
        };
        let items = self.contact_pages.get(idx).cloned().unwrap_or_default();
        let next = (idx + 1 < self.contact_pages.len()).then(|| (idx + 1).to_string());
        Ok(Page::new(items, next))
    }

    async fn batch_associations(
        &self,
        to_type: &str,
        contact_ids: &[String],
    ) -> CrmResult<Vec<AssociationRow>> {
        self.record(MockCall::BatchAssociations {
            to_type: to_type.to_string(),
            ids: contact_ids.to_vec(),
        });
        if self.failing_association_types.contains(to_type) {
            return Err(api_error(500, "association batch failed"));
        }
        let table = self.associations.get(to_type);
        Ok(contact_ids
            .iter()
            .filter_map(|id| {
                table.and_then(|t| t.get(id)).map(|to_ids| AssociationRow {
                    from_id: id.clone(),
                    to_ids: to_ids.clone(),
                })
            })
            .collect())
    }

    async fn batch_read_objects(
        &self,
        object_type: &str,
        ids: &[String],
        _properties: &[String],
    ) -> CrmResult<Vec<CrmObject>> {
        self.record(MockCall::BatchRead {
            object_type: object_type.to_string(),
            ids: ids.to_vec(),
        });
        let table = self.objects.get(object_type);
        Ok(ids
            .iter()
            .filter_map(|id| {
                table.and_then(|t| t.get(id)).map(|props| CrmObject {
                    id: id.clone(),
                    properties: props.clone(),
                })
            })
            .collect())
    }

    async fn deal_pipelines(&self) -> CrmResult<Vec<DealPipeline>> {
        self.record(MockCall::DealPipelines);
        Ok(self.pipelines.clone())
    }

    async fn list_forms(&self) -> CrmResult<Vec<FormInfo>> {
        self.record(MockCall::ListForms);
        Ok(self.forms.clone())
    }

    async fn form_submissions(
        &self,
        form_guid: &str,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<RawSubmission>> {
        self.record(MockCall::FormSubmissions {
            form_guid: form_guid.to_string(),
            after: after.clone(),
        });
        if self.failing_forms.contains(form_guid) {
            return Err(api_error(500, "submission export failed"));
        }
        let items = self.submissions.get(form_guid).map_or(&[][..], Vec::as_slice);
        offset_page(items, after.as_deref(), limit)
    }

    async fn event_types(&self) -> CrmResult<Vec<String>> {
        self.record(MockCall::EventTypes);
        self.event_types
            .clone()
            .ok_or_else(|| api_error(403, "event types require a higher tier"))
    }

    async fn contact_events(
        &self,
        contact_id: &str,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<EventRecord>> {
        self.record(MockCall::ContactEvents {
            contact_id: contact_id.to_string(),
            after: after.clone(),
        });
        if let Some(status) = self.event_errors.get(contact_id) {
            return Err(api_error(*status, "event log unavailable"));
        }
        let items = self.events.get(contact_id).map_or(&[][..], Vec::as_slice);
        offset_page(items, after.as_deref(), limit)
    }
}
