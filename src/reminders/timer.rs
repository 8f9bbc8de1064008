//! Timer facility backed by tokio tasks.
//!
//! One task per key: it sleeps until the wall-clock instant and posts a
//! `TimerFired` event into the engine channel. Replacing or cancelling a key
//! aborts its task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::TimerError;
use super::runtime::EngineEvent;
use super::traits::{Clock, TimerFacility};
use super::types::{TimerKey, TimerPayload};

pub struct TokioTimerFacility {
    events: mpsc::UnboundedSender<EngineEvent>,
    clock: Arc<dyn Clock>,
    tasks: Mutex<HashMap<TimerKey, JoinHandle<()>>>,
}

impl TokioTimerFacility {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events,
            clock,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys with a task that has not finished.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.values().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }
}

impl TimerFacility for TokioTimerFacility {
    fn register(
        &self,
        key: &TimerKey,
        at: NaiveDateTime,
        payload: TimerPayload,
    ) -> Result<(), TimerError> {
        let runtime = Handle::try_current().map_err(|e| TimerError::Unavailable(e.to_string()))?;
        if self.events.is_closed() {
            return Err(TimerError::Closed);
        }

        let delay = (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        let events = self.events.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(EngineEvent::TimerFired(payload));
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| TimerError::Unavailable("timer table lock poisoned".into()))?;
        if let Some(previous) = tasks.insert(*key, task) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self, key: &TimerKey) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(key) {
                task.abort();
            }
        }
    }
}

impl Drop for TokioTimerFacility {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::runtime::channel;
    use crate::reminders::testing::{dt, tod, PausedClock};
    use crate::reminders::types::{SlotKey, TimerPurpose};
    use uuid::Uuid;

    fn payload(key: TimerKey, generation: u64) -> TimerPayload {
        TimerPayload {
            key,
            occurrence: dt("2026-01-10 08:00"),
            generation,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_at_wall_clock_instant() {
        let (handle, mut rx) = channel();
        let clock = Arc::new(PausedClock::starting_at(dt("2026-01-10 07:58")));
        let timers = TokioTimerFacility::new(handle.sender(), clock.clone());
        let key = SlotKey::new(Uuid::new_v4(), tod(8, 0)).timer(TimerPurpose::Regular);

        timers.register(&key, dt("2026-01-10 08:00"), payload(key, 1)).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, EngineEvent::TimerFired(payload(key, 1)));
        assert!(clock.now() >= dt("2026-01-10 08:00"));
        assert!(clock.now() < dt("2026-01-10 08:01"));
    }

    #[tokio::test(start_paused = true)]
    async fn replace_keeps_only_latest() {
        let (handle, mut rx) = channel();
        let clock = Arc::new(PausedClock::starting_at(dt("2026-01-10 07:00")));
        let timers = TokioTimerFacility::new(handle.sender(), clock);
        let key = SlotKey::new(Uuid::new_v4(), tod(8, 0)).timer(TimerPurpose::Regular);

        timers.register(&key, dt("2026-01-10 08:00"), payload(key, 1)).unwrap();
        timers.register(&key, dt("2026-01-10 08:00"), payload(key, 2)).unwrap();

        assert_eq!(rx.recv().await.unwrap(), EngineEvent::TimerFired(payload(key, 2)));
        let nothing = tokio::time::timeout(Duration::from_secs(24 * 3600), rx.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (handle, mut rx) = channel();
        let clock = Arc::new(PausedClock::starting_at(dt("2026-01-10 07:00")));
        let timers = TokioTimerFacility::new(handle.sender(), clock);
        let key = SlotKey::new(Uuid::new_v4(), tod(8, 0)).timer(TimerPurpose::Snooze);

        timers.register(&key, dt("2026-01-10 08:00"), payload(key, 1)).unwrap();
        timers.cancel(&key);
        timers.cancel(&key);

        let nothing = tokio::time::timeout(Duration::from_secs(24 * 3600), rx.recv()).await;
        assert!(nothing.is_err());
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn past_instant_fires_immediately() {
        let (handle, mut rx) = channel();
        let clock = Arc::new(PausedClock::starting_at(dt("2026-01-10 09:00")));
        let timers = TokioTimerFacility::new(handle.sender(), clock);
        let key = SlotKey::new(Uuid::new_v4(), tod(8, 0)).timer(TimerPurpose::Regular);

        timers.register(&key, dt("2026-01-10 08:00"), payload(key, 1)).unwrap();
        assert!(rx.recv().await.is_some());
    }

    #[test]
    fn register_outside_runtime_is_unavailable() {
        let (handle, _rx) = channel();
        let timers = TokioTimerFacility::new(
            handle.sender(),
            Arc::new(crate::reminders::runtime::SystemClock),
        );
        let key = SlotKey::new(Uuid::new_v4(), tod(8, 0)).timer(TimerPurpose::Regular);
        assert!(matches!(
            timers.register(&key, dt("2026-01-10 08:00"), payload(key, 1)),
            Err(TimerError::Unavailable(_))
        ));
    }
}
