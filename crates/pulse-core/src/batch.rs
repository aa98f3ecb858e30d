//! Fixed-size id windows for batch endpoints.
//!
//! Batch-read endpoints cap how many ids one request may carry. The chunker
//! splits an ordered id list into contiguous windows no larger than that cap,
//! fetches each window and folds the partial result into an accumulator.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::debug;

use crate::throttle::Throttle;

/// How a keyed partial result is folded into the accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// Extend the existing list for the key.
    Append,
    /// Replace the existing list for the key.
    Replace,
}

/// Fold `partial` into `acc` according to `policy`.
pub fn merge_keyed<V>(
    acc: &mut BTreeMap<String, Vec<V>>,
    partial: impl IntoIterator<Item = (String, Vec<V>)>,
    policy: MergePolicy,
) {
    for (key, values) in partial {
        match policy {
            MergePolicy::Append => acc.entry(key).or_default().extend(values),
            MergePolicy::Replace => {
                let _ = acc.insert(key, values);
            }
        }
    }
}

/// Splits id lists into windows of at most `batch_size`.
#[derive(Clone, Copy, Debug)]
pub struct BatchChunker {
    batch_size: usize,
    throttle: Throttle,
}

impl BatchChunker {
    /// Create a chunker. A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize, throttle: Throttle) -> Self {
        Self {
            batch_size: batch_size.max(1),
            throttle,
        }
    }

    /// Window size in use.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of windows `len` ids will be split into.
    pub fn window_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }

    /// Fetch every window of `ids` and fold the results into `acc`.
    ///
    /// `fetch` receives each window in order; `merge` folds its output into
    /// the accumulator. The throttle runs after every fetch, including a
    /// failed one. The first error aborts the remaining windows.
    pub async fn run<I, A, P, E, F, Fut, M>(
        &self,
        ids: &[I],
        mut acc: A,
        mut fetch: F,
        mut merge: M,
    ) -> Result<A, E>
    where
        I: Clone,
        F: FnMut(Vec<I>) -> Fut,
        Fut: Future<Output = Result<P, E>>,
        M: FnMut(&mut A, P),
    {
        if ids.is_empty() {
            return Ok(acc);
        }
        let windows = self.window_count(ids.len());
        for (index, window) in ids.chunks(self.batch_size).enumerate() {
            debug!(window = index + 1, windows, size = window.len(), "fetching batch window");
            let result = fetch(window.to_vec()).await;
            self.throttle.wait().await;
            merge(&mut acc, result?);
        }
        Ok(acc)
    }
}
