//! Single owning dispatch loop for the engine.
//!
//! Timer callbacks, user actions and rebuild requests all arrive as
//! `EngineEvent`s on one channel and are handed to the scheduler with the
//! current wall-clock time, one at a time.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::error::ReminderError;
use super::scheduler::ReminderScheduler;
use super::traits::{CatalogSource, Clock};
use super::types::{TimerPayload, UserAction};
use crate::models::TimeOfDay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    TimerFired(TimerPayload),
    UserAction {
        medicine_id: Uuid,
        time_of_day: TimeOfDay,
        occurrence: Option<NaiveDateTime>,
        action: UserAction,
    },
    /// Re-read the catalog and re-derive every regular timer.
    Rebuild,
    CancelAll(Uuid),
    Shutdown,
}

/// Cloneable sender side of the engine channel.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

pub fn channel() -> (EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EngineHandle { tx }, rx)
}

impl EngineHandle {
    pub fn send(&self, event: EngineEvent) -> Result<(), ReminderError> {
        self.tx.send(event).map_err(|_| ReminderError::ChannelClosed)
    }

    /// Raw sender, for components that post events themselves.
    pub fn sender(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.tx.clone()
    }

    pub fn rebuild(&self) -> Result<(), ReminderError> {
        self.send(EngineEvent::Rebuild)
    }

    pub fn cancel_all(&self, medicine_id: Uuid) -> Result<(), ReminderError> {
        self.send(EngineEvent::CancelAll(medicine_id))
    }

    pub fn taken(&self, medicine_id: Uuid, time_of_day: TimeOfDay) -> Result<(), ReminderError> {
        self.act(medicine_id, time_of_day, UserAction::Taken)
    }

    pub fn skip(&self, medicine_id: Uuid, time_of_day: TimeOfDay) -> Result<(), ReminderError> {
        self.act(medicine_id, time_of_day, UserAction::Skipped)
    }

    pub fn snooze(
        &self,
        medicine_id: Uuid,
        time_of_day: TimeOfDay,
        minutes: u32,
    ) -> Result<(), ReminderError> {
        self.act(medicine_id, time_of_day, UserAction::Snooze { minutes })
    }

    pub fn shutdown(&self) -> Result<(), ReminderError> {
        self.send(EngineEvent::Shutdown)
    }

    fn act(&self, medicine_id: Uuid, time_of_day: TimeOfDay, action: UserAction) -> Result<(), ReminderError> {
        self.send(EngineEvent::UserAction {
            medicine_id,
            time_of_day,
            occurrence: None,
            action,
        })
    }
}

/// Local system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

pub struct ReminderRuntime {
    scheduler: Arc<ReminderScheduler>,
    catalog: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl ReminderRuntime {
    pub fn new(
        scheduler: Arc<ReminderScheduler>,
        catalog: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        rx: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> Self {
        Self {
            scheduler,
            catalog,
            clock,
            rx,
        }
    }

    /// Process events until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self) {
        tracing::info!("Reminder engine started");
        while let Some(event) = self.rx.recv().await {
            if event == EngineEvent::Shutdown {
                break;
            }
            if let Err(e) = self.dispatch(event) {
                tracing::warn!(error = %e, "Engine event failed");
            }
        }
        tracing::info!("Reminder engine stopped");
    }

    pub fn dispatch(&self, event: EngineEvent) -> Result<(), ReminderError> {
        let now = self.clock.now();
        match event {
            EngineEvent::TimerFired(payload) => self.scheduler.handle_timer(payload, now),
            EngineEvent::UserAction {
                medicine_id,
                time_of_day,
                occurrence,
                action,
            } => self
                .scheduler
                .on_user_action(medicine_id, time_of_day, occurrence, action, now),
            EngineEvent::Rebuild => self
                .scheduler
                .rebuild_all(self.catalog.as_ref(), now)
                .map(|_| ()),
            EngineEvent::CancelAll(medicine_id) => self.scheduler.cancel_all(&medicine_id).map(|_| ()),
            EngineEvent::Shutdown => Ok(()),
        }
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }
}
