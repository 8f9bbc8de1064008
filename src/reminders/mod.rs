//! Reminder scheduling & escalation engine.
//!
//! Decides when each medicine reminder fires next, re-notifies with rising
//! urgency until the user acts, honours snoozes without disturbing the
//! regular schedule, and learns the user's snooze and delay habits.
//!
//! ## Architecture
//!
//! ```text
//! CatalogSource ─▶ ReminderScheduler ─▶ TimerFacility
//!                    │      │     ▲            │
//!                    │      │     └── EngineEvent (ReminderRuntime)
//!                    ▼      ▼
//!          recurrence   EscalationMachine ─▶ NotificationSink / OutcomeSink
//!                           │
//!                           ▼
//!                     PatternLearner ─▶ HistoryStore
//! ```
//!
//! - `recurrence`: pure next-trigger arithmetic.
//! - `learner`: bounded snooze/delay histories and suggestions.
//! - `escalation`: per-occurrence state machine, returns effects.
//! - `scheduler`: owns the timer registry and per-slot locks; applies effects.
//! - `runtime` / `timer`: tokio dispatch loop and timer facility.
//!
//! Everything that touches one (medicine, time of day) slot runs under that
//! slot's lock. Different medicines never contend beyond brief map lookups.

pub mod catalog;
pub mod error;
pub mod escalation;
pub mod learner;
pub mod recurrence;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod sinks;
pub mod store;
pub mod timer;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{SqliteCatalog, StaticCatalog};
pub use error::{ReminderError, ScheduleError, TimerError};
pub use escalation::{urgency_for, ActiveOccurrence, EscalationMachine};
pub use learner::{PatternLearner, ShiftSuggestion, SnoozeSuggestion, SuggestionBasis, Suggestions};
pub use recurrence::{next_trigger, upcoming_triggers, validate_schedule};
pub use runtime::{channel, EngineEvent, EngineHandle, ReminderRuntime, SystemClock};
pub use scheduler::{RebuildReport, ReminderScheduler};
pub use sinks::{ChannelNotificationSink, ChannelOutcomeSink, TracingNotificationSink, TracingOutcomeSink};
pub use store::{MemoryHistoryStore, SqliteHistoryStore};
pub use timer::TokioTimerFacility;
pub use traits::*;
pub use types::*;
