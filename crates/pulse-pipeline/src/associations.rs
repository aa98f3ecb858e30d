//! Contact pages with their associations resolved.
//!
//! One contact-search page at a time: for every configured relationship type
//! the page's contact ids are sent through the association batch endpoint in
//! fixed-size windows. A contact the endpoint says nothing about ends up with
//! an empty list; a failed window fails the page.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, instrument};

use pulse_core::models::{AssociationRow, AssociationSet, AssociationType, Contact};
use pulse_core::{BatchChunker, MergePolicy, Page, PageSource, Paginator, Throttle, merge_keyed};
use pulse_crm::{ContactQuery, CrmApi, CrmError};

use crate::error::{PipelineError, PipelineResult};

/// Contact search as a [`PageSource`].
pub struct ContactSearch<'a, A: ?Sized> {
    api: &'a A,
    query: ContactQuery,
    page_size: usize,
}

impl<'a, A: CrmApi + ?Sized> ContactSearch<'a, A> {
    /// Search `query` with pages of `page_size`.
    pub fn new(api: &'a A, query: ContactQuery, page_size: usize) -> Self {
        Self {
            api,
            query,
            page_size,
        }
    }
}

#[async_trait]
impl<'a, A: CrmApi + ?Sized> PageSource for ContactSearch<'a, A> {
    type Item = Contact;
    type Error = CrmError;

    async fn fetch(&mut self, after: Option<String>) -> Result<Page<Contact>, CrmError> {
        self.api
            .search_contacts(&self.query, after, self.page_size)
            .await
    }
}

/// One page of contacts and their related ids.
#[derive(Clone, Debug)]
pub struct ContactPage {
    /// 1-based page number.
    pub number: usize,
    /// Contacts in search order.
    pub contacts: Vec<Contact>,
    /// contact id → relationship → related ids. Every contact has an entry
    /// for every configured relationship.
    pub associations: AssociationSet,
}

/// Walks contact pages and resolves their associations.
pub struct AssociationAggregator<'a, A: CrmApi + ?Sized> {
    api: &'a A,
    paginator: Paginator<ContactSearch<'a, A>>,
    types: Vec<AssociationType>,
    chunker: BatchChunker,
    pages: usize,
}

impl<'a, A: CrmApi + ?Sized> AssociationAggregator<'a, A> {
    /// Build an aggregator.
    ///
    /// `throttle` paces both the search and the association windows.
    pub fn new(
        api: &'a A,
        search: ContactSearch<'a, A>,
        max_contacts: Option<usize>,
        types: Vec<AssociationType>,
        batch_size: usize,
        throttle: Throttle,
    ) -> Self {
        let paginator = Paginator::new(search)
            .with_max_items_opt(max_contacts)
            .with_throttle(throttle);
        Self {
            api,
            paginator,
            types,
            chunker: BatchChunker::new(batch_size, throttle),
            pages: 0,
        }
    }

    /// Contacts yielded so far.
    pub fn contacts_seen(&self) -> usize {
        self.paginator.yielded()
    }

    /// Next contact page with associations, or `None` when the search is exhausted.
    pub async fn next_page(&mut self) -> PipelineResult<Option<ContactPage>> {
        let Some(contacts) = self.paginator.next_page().await? else {
            return Ok(None);
        };
        self.pages += 1;
        let ids: Vec<String> = contacts.iter().map(|c| c.id.clone()).collect();

        let mut associations = AssociationSet::new();
        for relationship in &self.types {
            let mut related = self.fetch_relationship(relationship, &ids).await?;
            for id in &ids {
                associations.ensure(id, &relationship.name);
                if let Some(to_ids) = related.remove(id) {
                    associations.extend(id, &relationship.name, to_ids);
                }
            }
        }

        debug!(
            page = self.pages,
            contacts = contacts.len(),
            relationships = self.types.len(),
            "resolved contact page"
        );
        Ok(Some(ContactPage {
            number: self.pages,
            contacts,
            associations,
        }))
    }

    #[instrument(skip_all, fields(relationship = %relationship.name, contacts = ids.len()))]
    async fn fetch_relationship(
        &self,
        relationship: &AssociationType,
        ids: &[String],
    ) -> PipelineResult<BTreeMap<String, Vec<String>>> {
        let api = self.api;
        let remote = relationship.remote_type.as_str();
        self.chunker
            .run(
                ids,
                BTreeMap::new(),
                |window: Vec<String>| async move { api.batch_associations(remote, &window).await },
                |acc, rows: Vec<AssociationRow>| {
                    merge_keyed(
                        acc,
                        rows.into_iter().map(|row| (row.from_id, row.to_ids)),
                        MergePolicy::Append,
                    );
                },
            )
            .await
            .map_err(|source| PipelineError::Association {
                relationship: relationship.name.clone(),
                source,
            })
    }
}
