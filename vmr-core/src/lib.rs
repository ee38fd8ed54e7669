//! VMR client library
//!
//! Programmatic access to the Vascular Model Repository
//! (vascularmodel.com): catalog listing with a local cache, filtered
//! search, model metadata, and bundle downloads.

pub mod catalog;
pub mod client;
pub mod download;
pub mod error;

pub use client::{ClientConfig, VmrClient};
pub use error::{Result, VmrError};
