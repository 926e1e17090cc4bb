//! Daily hydration goal and streak domain.

mod reconciler;
mod streak_model;

pub use reconciler::*;
pub use streak_model::*;
