//! SQLite persistence for the hydromon client.
//!
//! One database file per device holds the durable outbound queue, the
//! hydration streak snapshot, the applied-event ledger, and the sync engine
//! state. All writes funnel through a single writer thread; reads go
//! through an r2d2 pool.

pub mod db;
pub mod errors;
pub mod hydration;
pub mod schema;
pub mod sync;

pub use db::{create_pool, get_connection, run_migrations, DbPool, WriteHandle};
pub use hydration::StreakRepository;
pub use sync::SyncRepository;
