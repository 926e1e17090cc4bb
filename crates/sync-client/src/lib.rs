//! HTTP client for the metric aggregation service.
//!
//! Implements the core crate's delivery and reachability seams on top of
//! `reqwest`.

mod client;
mod error;
mod types;

pub use client::*;
pub use error::*;
pub use types::*;
