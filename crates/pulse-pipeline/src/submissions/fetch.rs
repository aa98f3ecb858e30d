//! Reading submissions from the legacy per-form export.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};

use pulse_core::models::{FormInfo, FormSubmissionEntry, RawSubmission, SubmissionsByEmail};
use pulse_core::{Page, PageSource, Paginator, Throttle};
use pulse_crm::api::FORM_SUBMISSIONS_MAX_PAGE;
use pulse_crm::{CrmApi, CrmError};

use crate::error::PipelineResult;
use crate::submissions::merge::merge;

/// One form's submissions, newest first.
pub struct FormSubmissions<'a, A: ?Sized> {
    api: &'a A,
    form_guid: String,
    page_size: usize,
}

impl<'a, A: CrmApi + ?Sized> FormSubmissions<'a, A> {
    /// Page through `form_guid` with pages of `page_size` (capped by the export).
    pub fn new(api: &'a A, form_guid: impl Into<String>, page_size: usize) -> Self {
        Self {
            api,
            form_guid: form_guid.into(),
            page_size: page_size.clamp(1, FORM_SUBMISSIONS_MAX_PAGE),
        }
    }
}

#[async_trait]
impl<'a, A: CrmApi + ?Sized> PageSource for FormSubmissions<'a, A> {
    type Item = RawSubmission;
    type Error = CrmError;

    async fn fetch(&mut self, after: Option<String>) -> Result<Page<RawSubmission>, CrmError> {
        self.api
            .form_submissions(&self.form_guid, after, self.page_size)
            .await
    }
}

/// What the newest page of one form looked like.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormDelta {
    /// Form identifier.
    pub form_guid: String,
    /// Submissions kept from the page.
    pub fetched: usize,
    /// Whether the page came back full (more may exist behind it).
    pub page_full: bool,
    /// Oldest timestamp among the kept submissions.
    pub oldest: Option<i64>,
}

/// Reads form submissions and keys them by submitter email.
pub struct SubmissionFetcher<'a, A: CrmApi + ?Sized> {
    api: &'a A,
    page_size: usize,
    throttle: Throttle,
}

impl<'a, A: CrmApi + ?Sized> SubmissionFetcher<'a, A> {
    /// Fetch with pages of `page_size`, pausing `throttle` after each call.
    pub fn new(api: &'a A, page_size: usize, throttle: Throttle) -> Self {
        Self {
            api,
            page_size: page_size.clamp(1, FORM_SUBMISSIONS_MAX_PAGE),
            throttle,
        }
    }

    /// Page size in use.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Newest page of every form, stopping at `cutoff` (epoch ms).
    ///
    /// Forms are read one after another; historical limits do not apply.
    #[instrument(skip_all, fields(forms = forms.len()))]
    pub async fn fetch_delta(
        &self,
        forms: &[FormInfo],
        cutoff: Option<i64>,
    ) -> PipelineResult<(SubmissionsByEmail, Vec<FormDelta>)> {
        let mut by_email = SubmissionsByEmail::new();
        let mut deltas = Vec::with_capacity(forms.len());
        for form in forms {
            let mut paginator = self.paginator(form, cutoff).with_max_items(self.page_size);
            let page = paginator.next_page().await?.unwrap_or_default();
            let delta = FormDelta {
                form_guid: form.guid.clone(),
                fetched: page.len(),
                page_full: page.len() >= self.page_size,
                oldest: page.iter().filter_map(|s| s.submitted_at).min(),
            };
            debug!(form = %form.guid, fetched = delta.fetched, "form delta fetched");
            deltas.push(delta);
            let _ = merge(&mut by_email, key_by_email(form, page));
        }
        Ok((by_email, deltas))
    }

    /// Every form walked to `per_form_limit` submissions, `concurrency` forms
    /// at a time. Each form accumulates privately and is folded in when done;
    /// the first failure aborts the fetch.
    #[instrument(skip_all, fields(forms = forms.len(), per_form_limit, concurrency))]
    pub async fn fetch_full(
        &self,
        forms: &[FormInfo],
        per_form_limit: usize,
        cutoff: Option<i64>,
        concurrency: usize,
    ) -> PipelineResult<SubmissionsByEmail> {
        let mut results = stream::iter(forms)
            .map(|form| self.fetch_form(form, per_form_limit, cutoff))
            .buffer_unordered(concurrency.max(1));

        let mut by_email = SubmissionsByEmail::new();
        while let Some(result) = results.next().await {
            let (form_guid, partial) = result?;
            let stats = merge(&mut by_email, partial);
            debug!(form = %form_guid, added = stats.added, "form fetched");
        }
        info!(emails = by_email.len(), "full submission fetch complete");
        Ok(by_email)
    }

    async fn fetch_form(
        &self,
        form: &FormInfo,
        limit: usize,
        cutoff: Option<i64>,
    ) -> PipelineResult<(String, SubmissionsByEmail)> {
        let submissions = self
            .paginator(form, cutoff)
            .with_max_items(limit)
            .collect_all()
            .await?;
        Ok((form.guid.clone(), key_by_email(form, submissions)))
    }

    fn paginator(&self, form: &FormInfo, cutoff: Option<i64>) -> Paginator<FormSubmissions<'a, A>> {
        let source = FormSubmissions::new(self.api, form.guid.as_str(), self.page_size);
        let paginator = Paginator::new(source).with_throttle(self.throttle);
        match cutoff {
            Some(cutoff) => paginator.stop_when(move |s: &RawSubmission| is_older(s, cutoff)),
            None => paginator,
        }
    }
}

/// Submissions without a timestamp never trigger the cutoff.
fn is_older(submission: &RawSubmission, cutoff: i64) -> bool {
    submission.submitted_at.is_some_and(|ts| ts < cutoff)
}

/// Group a form's submissions by lowercased email, dropping anonymous ones.
fn key_by_email(form: &FormInfo, submissions: Vec<RawSubmission>) -> SubmissionsByEmail {
    let mut by_email = SubmissionsByEmail::new();
    let mut anonymous = 0_usize;
    for raw in submissions {
        match raw.email() {
            Some(email) => by_email
                .entry(email)
                .or_default()
                .push(FormSubmissionEntry::from_raw(form, raw)),
            None => anonymous += 1,
        }
    }
    if anonymous > 0 {
        debug!(form = %form.guid, anonymous, "skipped submissions without an email");
    }
    by_email
}
