//! Core domain logic for the hydromon health-tracking client.
//!
//! This crate owns the offline-resilient sync pipeline: the durable-queue
//! contracts, the drain engine, the hydration streak reconciler, and the
//! connectivity monitor. Storage and HTTP transport are reached through
//! traits so the UI-facing service stays free of I/O details.

pub mod connectivity;
pub mod errors;
pub mod hydration;
pub mod metrics;
pub mod service;
pub mod sync;

pub use errors::{Error, Result};
pub use service::HydromonService;
