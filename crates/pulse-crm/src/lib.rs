//! # pulse-crm
//!
//! Access to the remote CRM: the [`CrmApi`] trait the pipeline is written
//! against, the reqwest-backed [`CrmClient`], and, behind the
//! `test-util` feature, a scripted `MockCrm`.

#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod wire;

pub use api::{ContactQuery, CrmApi, SearchFilter, SearchSort};
pub use client::{CrmClient, CrmClientConfig, DEFAULT_BASE_URL};
pub use error::{CrmError, CrmResult};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockCrm};
