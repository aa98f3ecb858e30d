//! [`CrmApi`] over the live REST API.
//!
//! Every call is a single request; pacing and pagination are the caller's
//! concern. Non-success responses become [`CrmError::Api`] with the status
//! and raw body so the operator sees exactly what the CRM said.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use pulse_core::models::{
    AssociationRow, Contact, CrmObject, DealPipeline, EventRecord, FormInfo, RawSubmission,
};
use pulse_core::paging::Page;

use crate::api::{
    CONTACT_SEARCH_MAX_PAGE, ContactQuery, CrmApi, EVENTS_MAX_PAGE, FORM_SUBMISSIONS_MAX_PAGE,
};
use crate::error::{CrmError, CrmResult};
use crate::wire::{
    AssociationResponse, BatchIdsRequest, BatchReadRequest, EventTypesResponse, EventsResponse,
    FilterGroup, FormWire, IdInput, ObjectListResponse, PipelinesResponse, SearchRequest,
    SubmissionsResponse, next_cursor,
};

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`CrmClient`].
#[derive(Clone, Debug)]
pub struct CrmClientConfig {
    /// API host, without trailing slash.
    pub base_url: String,
    /// Bearer token (private app token).
    pub access_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl CrmClientConfig {
    /// Config for the default host.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// reqwest-backed CRM client.
#[derive(Clone, Debug)]
pub struct CrmClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl CrmClient {
    /// Build a client. Fails when the token is empty or the HTTP client
    /// cannot be constructed.
    pub fn new(config: CrmClientConfig) -> CrmResult<Self> {
        if config.access_token.trim().is_empty() {
            return Err(CrmError::MissingCredential);
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> CrmResult<T> {
        let response = req.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl CrmApi for CrmClient {
    #[instrument(level = "debug", skip(self, query))]
    async fn search_contacts(
        &self,
        query: &ContactQuery,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<Contact>> {
        let filter_groups = if query.filters.is_empty() {
            Vec::new()
        } else {
            vec![FilterGroup {
                filters: &query.filters,
            }]
        };
        let body = SearchRequest {
            filter_groups,
            sorts: &query.sorts,
            properties: &query.properties,
            limit: limit.clamp(1, CONTACT_SEARCH_MAX_PAGE),
            after,
        };
        let resp: ObjectListResponse = self
            .send(
                self.http
                    .post(self.url("/crm/v3/objects/contacts/search"))
                    .json(&body),
            )
            .await?;
        let next = next_cursor(resp.paging);
        debug!(count = resp.results.len(), has_next = next.is_some(), "contact search page");
        Ok(Page::new(
            resp.results.into_iter().map(Contact::from).collect(),
            next,
        ))
    }

    #[instrument(level = "debug", skip(self, contact_ids), fields(count = contact_ids.len()))]
    async fn batch_associations(
        &self,
        to_type: &str,
        contact_ids: &[String],
    ) -> CrmResult<Vec<AssociationRow>> {
        let body = BatchIdsRequest {
            inputs: contact_ids.iter().map(|id| IdInput { id }).collect(),
        };
        let resp: AssociationResponse = self
            .send(
                self.http
                    .post(self.url(&format!(
                        "/crm/v4/associations/contacts/{to_type}/batch/read"
                    )))
                    .json(&body),
            )
            .await?;
        Ok(resp
            .results
            .into_iter()
            .filter_map(|r| r.into_row())
            .collect())
    }

    #[instrument(level = "debug", skip(self, ids, properties), fields(count = ids.len()))]
    async fn batch_read_objects(
        &self,
        object_type: &str,
        ids: &[String],
        properties: &[String],
    ) -> CrmResult<Vec<CrmObject>> {
        let body = BatchReadRequest {
            inputs: ids.iter().map(|id| IdInput { id }).collect(),
            properties,
        };
        let resp: ObjectListResponse = self
            .send(
                self.http
                    .post(self.url(&format!("/crm/v3/objects/{object_type}/batch/read")))
                    .json(&body),
            )
            .await?;
        Ok(resp.results.into_iter().map(CrmObject::from).collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn deal_pipelines(&self) -> CrmResult<Vec<DealPipeline>> {
        let resp: PipelinesResponse = self
            .send(self.http.get(self.url("/crm/v3/pipelines/deals")))
            .await?;
        Ok(resp.results.into_iter().map(DealPipeline::from).collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_forms(&self) -> CrmResult<Vec<FormInfo>> {
        let forms: Vec<FormWire> = self.send(self.http.get(self.url("/forms/v2/forms"))).await?;
        Ok(forms.into_iter().map(FormInfo::from).collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn form_submissions(
        &self,
        form_guid: &str,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<RawSubmission>> {
        let limit = limit.clamp(1, FORM_SUBMISSIONS_MAX_PAGE).to_string();
        let mut query = vec![("limit", limit)];
        if let Some(after) = after {
            query.push(("after", after));
        }
        let resp: SubmissionsResponse = self
            .send(
                self.http
                    .get(self.url(&format!(
                        "/form-integrations/v1/submissions/forms/{form_guid}"
                    )))
                    .query(&query),
            )
            .await?;
        Ok(Page::new(
            resp.results.into_iter().map(RawSubmission::from).collect(),
            next_cursor(resp.paging),
        ))
    }

    #[instrument(level = "debug", skip(self))]
    async fn event_types(&self) -> CrmResult<Vec<String>> {
        let resp: EventTypesResponse = self
            .send(self.http.get(self.url("/events/v3/events/event-types")))
            .await?;
        Ok(resp.event_types)
    }

    #[instrument(level = "debug", skip(self))]
    async fn contact_events(
        &self,
        contact_id: &str,
        after: Option<String>,
        limit: usize,
    ) -> CrmResult<Page<EventRecord>> {
        let mut query = vec![
            ("objectType", "contact".to_string()),
            ("objectId", contact_id.to_string()),
            ("limit", limit.clamp(1, EVENTS_MAX_PAGE).to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after));
        }
        let resp: EventsResponse = self
            .send(self.http.get(self.url("/events/v3/events")).query(&query))
            .await?;
        Ok(Page::new(
            resp.results.into_iter().map(EventRecord::from).collect(),
            next_cursor(resp.paging),
        ))
    }
}
