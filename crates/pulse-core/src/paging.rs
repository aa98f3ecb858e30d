//! Cursor pagination.
//!
//! Every paged CRM endpoint is wrapped in a [`PageSource`]: one call per page,
//! forwarding the previous page's continuation token. [`Paginator`] owns the
//! termination rules so each endpoint only has to describe how to fetch.
//!
//! A paginator stops when:
//! - a page comes back empty,
//! - no continuation token is returned,
//! - the configured item budget is reached (the last page is truncated),
//! - the stop predicate fires on an item (that item and everything after it
//!   is discarded, including later pages).
//!
//! The stop predicate assumes newest-first ordering upstream; it is how
//! time-windowed reads ("nothing older than the cutoff") are expressed.

use async_trait::async_trait;
use tracing::debug;

use crate::throttle::Throttle;

/// One page of results plus the token for the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in upstream order.
    pub items: Vec<T>,
    /// Opaque continuation token; `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// Build a page.
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self { items, next }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Something that can fetch one page given the previous continuation token.
#[async_trait]
pub trait PageSource: Send {
    /// Item type produced by the endpoint.
    type Item: Send;
    /// Error type of a failed fetch.
    type Error: Send;

    /// Fetch the page after `after` (`None` for the first page).
    async fn fetch(&mut self, after: Option<String>) -> Result<Page<Self::Item>, Self::Error>;
}

type StopPredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Lazy, finite, non-restartable walk over a [`PageSource`].
pub struct Paginator<S: PageSource> {
    source: S,
    cursor: Option<String>,
    max_items: Option<usize>,
    stop_when: Option<StopPredicate<S::Item>>,
    throttle: Throttle,
    yielded: usize,
    pages: usize,
    done: bool,
}

impl<S: PageSource> Paginator<S> {
    /// Walk `source` until it runs out.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cursor: None,
            max_items: None,
            stop_when: None,
            throttle: Throttle::disabled(),
            yielded: 0,
            pages: 0,
            done: false,
        }
    }

    /// Never yield more than `max` items in total.
    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Optional variant of [`with_max_items`](Self::with_max_items).
    #[must_use]
    pub fn with_max_items_opt(mut self, max: Option<usize>) -> Self {
        self.max_items = max;
        self
    }

    /// Stop at the first item for which `predicate` returns true.
    #[must_use]
    pub fn stop_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&S::Item) -> bool + Send + Sync + 'static,
    {
        self.stop_when = Some(Box::new(predicate));
        self
    }

    /// Sleep after every fetch, successful or not.
    #[must_use]
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Items yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Whether the walk has terminated.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next non-empty page, or `None` once the walk is over.
    ///
    /// A fetch error terminates the walk; later calls return `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>, S::Error> {
        if self.done {
            return Ok(None);
        }
        let remaining = self.max_items.map(|max| max.saturating_sub(self.yielded));
        if remaining == Some(0) {
            self.done = true;
            return Ok(None);
        }

        let result = self.source.fetch(self.cursor.take()).await;
        self.throttle.wait().await;
        let Page { mut items, next } = match result {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        self.pages += 1;

        if items.is_empty() {
            debug!(pages = self.pages, "empty page, pagination finished");
            self.done = true;
            return Ok(None);
        }

        if let Some(stop) = &self.stop_when {
            if let Some(pos) = items.iter().position(|item| stop(item)) {
                debug!(kept = pos, dropped = items.len() - pos, "stop predicate fired");
                items.truncate(pos);
                self.done = true;
            }
        }

        if let Some(remaining) = remaining {
            if items.len() >= remaining {
                items.truncate(remaining);
                self.done = true;
            }
        }

        match next.filter(|token| !token.is_empty()) {
            Some(token) if !self.done => self.cursor = Some(token),
            _ => self.done = true,
        }

        self.yielded += items.len();
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(items))
    }

    /// Drain every remaining page into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>, S::Error> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Serves pre-programmed pages; the cursor is the index of the next page.
    struct ScriptedPages {
        pages: Vec<Vec<i64>>,
        fail_at: Option<usize>,
        calls: Arc<AtomicUsize>,
        seen_cursors: Vec<Option<String>>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Vec<i64>>) -> Self {
            Self {
                pages,
                fail_at: None,
                calls: Arc::new(AtomicUsize::new(0)),
                seen_cursors: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPages {
        type Item = i64;
        type Error = String;

        async fn fetch(&mut self, after: Option<String>) -> Result<Page<i64>, String> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_cursors.push(after.clone());
            let idx: usize = after.map_or(0, |c| c.parse().unwrap());
            if self.fail_at == Some(idx) {
                return Err(format!("boom at {idx}"));
            }
            let items = self.pages.get(idx).cloned().unwrap_or_default();
            let next = (idx + 1 < self.pages.len()).then(|| (idx + 1).to_string());
            Ok(Page::new(items, next))
        }
    }

    #[tokio::test]
    async fn yields_concatenation_of_all_pages() {
        let source = ScriptedPages::new(vec![vec![1, 2], vec![3], vec![4, 5, 6]]);
        let all = Paginator::new(source).collect_all().await.unwrap();
        assert_eq!(all, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn forwards_continuation_tokens() {
        let mut paginator = Paginator::new(ScriptedPages::new(vec![vec![1], vec![2], vec![3]]));
        while paginator.next_page().await.unwrap().is_some() {}
        assert_eq!(paginator.pages_fetched(), 3);
        assert_eq!(
            paginator.source.seen_cursors,
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[tokio::test]
    async fn max_truncates_final_page() {
        let source = ScriptedPages::new(vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        let calls = source.calls.clone();
        let all = Paginator::new(source)
            .with_max_items(5)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn max_exactly_on_page_boundary_stops_fetching() {
        let source = ScriptedPages::new(vec![vec![1, 2], vec![3, 4], vec![5]]);
        let calls = source.calls.clone();
        let all = Paginator::new(source)
            .with_max_items(4)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(all, vec![1, 2, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn max_never_exceeded_for_any_budget() {
        let pages = vec![vec![1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]];
        for max in 0..12 {
            let all = Paginator::new(ScriptedPages::new(pages.clone()))
                .with_max_items(max)
                .collect_all()
                .await
                .unwrap();
            assert_eq!(all.len(), max.min(9), "budget {max}");
            assert_eq!(all, (1..=9).take(max).collect::<Vec<i64>>());
        }
    }

    #[tokio::test]
    async fn zero_budget_fetches_nothing() {
        let source = ScriptedPages::new(vec![vec![1]]);
        let calls = source.calls.clone();
        let all = Paginator::new(source)
            .with_max_items(0)
            .collect_all()
            .await
            .unwrap();
        assert!(all.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_page_terminates_even_with_token() {
        let source = ScriptedPages::new(vec![vec![1], vec![], vec![3]]);
        let calls = source.calls.clone();
        let all = Paginator::new(source).collect_all().await.unwrap();
        assert_eq!(all, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cutoff_keeps_items_at_or_after_boundary() {
        // Newest first, timestamps decreasing; cutoff falls between 300 and 200.
        let pages = vec![vec![500, 400], vec![300, 200, 100], vec![50]];
        let source = ScriptedPages::new(pages);
        let calls = source.calls.clone();
        let cutoff = 250;
        let all = Paginator::new(source)
            .stop_when(move |ts| *ts < cutoff)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(all, vec![500, 400, 300]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cutoff_item_equal_to_boundary_is_kept() {
        let source = ScriptedPages::new(vec![vec![300, 250, 249]]);
        let all = Paginator::new(source)
            .stop_when(|ts| *ts < 250)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(all, vec![300, 250]);
    }

    #[tokio::test]
    async fn cutoff_on_first_item_of_page_ends_walk() {
        let mut paginator = Paginator::new(ScriptedPages::new(vec![vec![5, 4], vec![1, 0]]))
            .stop_when(|ts| *ts < 3);
        assert_eq!(paginator.next_page().await.unwrap(), Some(vec![5, 4]));
        assert_eq!(paginator.next_page().await.unwrap(), None);
        assert!(paginator.is_done());
        assert_eq!(paginator.yielded(), 2);
    }

    #[tokio::test]
    async fn error_propagates_and_ends_walk() {
        let mut source = ScriptedPages::new(vec![vec![1], vec![2]]);
        source.fail_at = Some(1);
        let mut paginator = Paginator::new(source);
        assert_eq!(paginator.next_page().await.unwrap(), Some(vec![1]));
        assert_eq!(paginator.next_page().await.unwrap_err(), "boom at 1");
        assert_eq!(paginator.next_page().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_after_every_fetch() {
        let source = ScriptedPages::new(vec![vec![1], vec![2], vec![3]]);
        let start = tokio::time::Instant::now();
        let all = Paginator::new(source)
            .with_throttle(Throttle::from_millis(100))
            .collect_all()
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(start.elapsed(), std::time::Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_is_still_paced() {
        let mut source = ScriptedPages::new(vec![vec![1], vec![2], vec![3]]);
        source.fail_at = Some(1);
        let start = tokio::time::Instant::now();
        let result = Paginator::new(source)
            .with_throttle(Throttle::from_millis(100))
            .collect_all()
            .await;
        assert_eq!(result.unwrap_err(), "boom at 1");
        assert_eq!(start.elapsed(), std::time::Duration::from_millis(200));
    }
}
