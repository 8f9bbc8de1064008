//! Repository layer: entity-scoped database operations.
//!
//! The reminder engine only needs two groups of tables: the schedule catalog
//! it reads at rebuild time and the learner history it seeds from and
//! writes back to.

mod history;
mod schedule;

pub use history::*;
pub use schedule::*;
