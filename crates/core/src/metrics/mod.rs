//! Typed metric payloads and the ingest surface the UI calls.

mod ingest;
mod payload;

pub use ingest::*;
pub use payload::*;
