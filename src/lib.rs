//! Client for the NCI Genomic Data Commons (GDC) API.
//!
//! [`query::FileQuery`] searches the file catalog and returns a
//! [`table::ResultTable`]; [`bulk::BulkRetriever`] downloads the files behind
//! a list of identifiers, skipping those already present locally.

pub mod api;
pub mod bulk;
pub mod config;
pub mod domain;
pub mod error;
pub mod filters;
pub mod fs_util;
pub mod manifest;
pub mod output;
pub mod query;
pub mod retry;
pub mod table;
