//! # pulse-core
//!
//! Shared building blocks for the crm-pulse pipeline:
//!
//! - [`models`]: contacts, association sets, related-object details, form submissions
//! - [`field`]: present-or-placeholder values for display attributes
//! - [`paging`]: the [`PageSource`](paging::PageSource) contract and the cursor [`Paginator`]
//! - [`batch`]: fixed-size id windows with per-window fetch and merge
//! - [`throttle`]: static pacing between remote calls

#![deny(unsafe_code)]

pub mod batch;
pub mod field;
pub mod models;
pub mod paging;
pub mod throttle;

pub use batch::{BatchChunker, MergePolicy, merge_keyed};
pub use field::{Detail, Field};
pub use paging::{Page, PageSource, Paginator};
pub use throttle::Throttle;
