//! # pulse-pipeline
//!
//! The aggregation run, built from the `pulse-core` primitives:
//!
//! - [`associations`]: contact search pages with related ids per relationship type
//! - [`details`]: deduplicated batch reads of related objects, deal stage labels
//! - [`submissions`]: the incremental form-submission cache
//! - [`engagement`]: tolerant email open/click counting
//! - [`run`]: the [`Pipeline`] tying them together

#![deny(unsafe_code)]

pub mod associations;
pub mod details;
pub mod engagement;
pub mod error;
pub mod run;
pub mod submissions;

pub use error::{CacheError, PipelineError, PipelineResult};
pub use run::{
    ContactReport, EngagementSummary, PageReport, Pipeline, RelatedObjects, ReportSink,
    RunSummary, SubmissionSummary,
};
