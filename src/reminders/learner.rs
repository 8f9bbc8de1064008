//! Pattern learner: bounded per-medicine snooze and delay histories.
//!
//! Each medicine owns two append-and-evict buffers. Writers for one medicine
//! serialize on that medicine's mutex; different medicines never contend past
//! the brief map lookup. Every record is mirrored to the optional history
//! store; a store failure is logged and the in-memory buffer stays the source
//! of truth until the next successful write.
//!
//! With a background writer, store I/O runs on tokio's blocking pool in
//! submission order and never on the thread that made the scheduling call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::error::ReminderError;
use super::traits::HistoryStore;
use super::types::ReminderConfig;
use crate::models::{HistoryKind, HistoryRecord, TimeOfDay};

// ═══════════════════════════════════════════
// Bounded buffer
// ═══════════════════════════════════════════

/// Circular buffer of positive minute values, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedHistory {
    capacity: usize,
    values: VecDeque<u32>,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, minutes: u32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(minutes);
    }

    pub fn values(&self) -> Vec<u32> {
        self.values.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most frequent value, ties going to the most recently recorded one.
    /// Only meaningful when some value repeats.
    pub fn mode(&self) -> Option<u32> {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for v in &self.values {
            *counts.entry(*v).or_default() += 1;
        }
        let max = counts.values().copied().max()?;
        if max < 2 {
            return None;
        }
        self.values
            .iter()
            .rev()
            .find(|v| counts.get(*v) == Some(&max))
            .copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: u64 = self.values.iter().map(|v| u64::from(*v)).sum();
        Some(sum as f64 / self.values.len() as f64)
    }
}

// ═══════════════════════════════════════════
// Suggestions
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionBasis {
    Mode,
    Mean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeSuggestion {
    pub minutes: u32,
    pub basis: SuggestionBasis,
    pub sample_size: usize,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSuggestion {
    pub current: TimeOfDay,
    pub suggested: TimeOfDay,
    pub shift_minutes: i64,
    pub rationale: String,
}

/// Both suggestions for one slot, for display next to a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub snooze: Option<SnoozeSuggestion>,
    pub shift: Option<ShiftSuggestion>,
}

// ═══════════════════════════════════════════
// Learner
// ═══════════════════════════════════════════

#[derive(Debug)]
struct MedicineHistory {
    snoozes: BoundedHistory,
    delays: BoundedHistory,
}

impl MedicineHistory {
    fn new(capacity: usize) -> Self {
        Self {
            snoozes: BoundedHistory::new(capacity),
            delays: BoundedHistory::new(capacity),
        }
    }

    fn buffer(&self, kind: HistoryKind) -> &BoundedHistory {
        match kind {
            HistoryKind::Snooze => &self.snoozes,
            HistoryKind::Delay => &self.delays,
        }
    }

    fn buffer_mut(&mut self, kind: HistoryKind) -> &mut BoundedHistory {
        match kind {
            HistoryKind::Snooze => &mut self.snoozes,
            HistoryKind::Delay => &mut self.delays,
        }
    }
}

// ═══════════════════════════════════════════
// History writer
// ═══════════════════════════════════════════

enum StoreOp {
    Persist(HistoryRecord),
    Remove(Uuid),
    Flush(oneshot::Sender<()>),
}

enum HistoryWriter {
    /// Writes on the caller's thread.
    Inline(Arc<dyn HistoryStore>),
    /// Queues writes for the background task.
    Background(mpsc::UnboundedSender<StoreOp>),
}

fn apply_store_op(store: &dyn HistoryStore, op: StoreOp) {
    match op {
        StoreOp::Persist(record) => {
            if let Err(e) = store.persist(std::slice::from_ref(&record)) {
                tracing::warn!(
                    medicine_id = %record.medicine_id,
                    kind = record.kind.as_str(),
                    error = %e,
                    "Failed to persist history"
                );
            }
        }
        StoreOp::Remove(medicine_id) => {
            if let Err(e) = store.remove(&medicine_id) {
                tracing::warn!(medicine_id = %medicine_id, error = %e, "Failed to remove stored history");
            }
        }
        StoreOp::Flush(done) => {
            let _ = done.send(());
        }
    }
}

async fn write_history(store: Arc<dyn HistoryStore>, mut ops: mpsc::UnboundedReceiver<StoreOp>) {
    while let Some(op) = ops.recv().await {
        let store = Arc::clone(&store);
        // One op at a time keeps the last snapshot of a buffer the one stored
        if let Err(e) = tokio::task::spawn_blocking(move || apply_store_op(store.as_ref(), op)).await {
            tracing::error!(error = %e, "History write task failed");
        }
    }
    tracing::debug!("History writer stopped");
}

// ═══════════════════════════════════════════
// Learner
// ═══════════════════════════════════════════

pub struct PatternLearner {
    capacity: usize,
    shift_threshold_minutes: u32,
    histories: RwLock<HashMap<Uuid, Arc<Mutex<MedicineHistory>>>>,
    store: Option<Arc<dyn HistoryStore>>,
    writer: Option<HistoryWriter>,
}

impl PatternLearner {
    pub fn new(config: &ReminderConfig) -> Self {
        Self {
            capacity: config.history_capacity,
            shift_threshold_minutes: config.shift_threshold_minutes,
            histories: RwLock::new(HashMap::new()),
            store: None,
            writer: None,
        }
    }

    /// Mirror every record to `store` synchronously, on the recording thread.
    pub fn with_store(config: &ReminderConfig, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            writer: Some(HistoryWriter::Inline(Arc::clone(&store))),
            store: Some(store),
            ..Self::new(config)
        }
    }

    /// Mirror every record to `store` from a background task on the current
    /// tokio runtime. Fails outside a runtime.
    pub fn with_background_store(
        config: &ReminderConfig,
        store: Arc<dyn HistoryStore>,
    ) -> Result<Self, ReminderError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReminderError::Config(format!("History writer needs a tokio runtime: {e}")))?;
        let (ops, rx) = mpsc::unbounded_channel();
        runtime.spawn(write_history(Arc::clone(&store), rx));
        Ok(Self {
            writer: Some(HistoryWriter::Background(ops)),
            store: Some(store),
            ..Self::new(config)
        })
    }

    /// Wait until every write queued so far has reached the store.
    pub async fn flush(&self) {
        if let Some(HistoryWriter::Background(ops)) = &self.writer {
            let (done, wait) = oneshot::channel();
            if ops.send(StoreOp::Flush(done)).is_ok() {
                let _ = wait.await;
            }
        }
    }

    fn submit(&self, op: StoreOp) {
        match &self.writer {
            None => {}
            Some(HistoryWriter::Inline(store)) => apply_store_op(store.as_ref(), op),
            Some(HistoryWriter::Background(ops)) => {
                if ops.send(op).is_err() {
                    tracing::warn!("History writer stopped, write dropped");
                }
            }
        }
    }

    /// Load buffers from the history store. Returns the number of records read.
    pub fn load_from_store(&self) -> Result<usize, ReminderError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let records = store.load_all()?;
        let count = records.len();
        self.seed(records)?;
        tracing::info!(records = count, "Seeded pattern learner from history store");
        Ok(count)
    }

    /// Replace in-memory buffers with stored copies. Only the newest
    /// `capacity` positive values of each record are kept.
    pub fn seed(&self, records: Vec<HistoryRecord>) -> Result<(), ReminderError> {
        for record in records {
            let entry = self.entry(record.medicine_id)?;
            let mut history = entry.lock().map_err(|_| ReminderError::LockPoisoned)?;
            let mut buffer = BoundedHistory::new(self.capacity);
            for v in record.values.into_iter().filter(|v| *v > 0) {
                buffer.push(v);
            }
            *history.buffer_mut(record.kind) = buffer;
        }
        Ok(())
    }

    /// Record a snooze duration. Non-positive values are ignored.
    pub fn record_snooze(&self, medicine_id: Uuid, minutes: i64) -> Result<bool, ReminderError> {
        self.record(medicine_id, HistoryKind::Snooze, minutes)
    }

    /// Record how late a dose was acknowledged. Non-positive values are ignored.
    pub fn record_delay(&self, medicine_id: Uuid, minutes: i64) -> Result<bool, ReminderError> {
        self.record(medicine_id, HistoryKind::Delay, minutes)
    }

    fn record(&self, medicine_id: Uuid, kind: HistoryKind, minutes: i64) -> Result<bool, ReminderError> {
        if minutes <= 0 {
            return Ok(false);
        }
        let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);

        let entry = self.entry(medicine_id)?;
        let mut history = entry.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let buffer = history.buffer_mut(kind);
        buffer.push(minutes);

        // Submitted under the medicine's lock so snapshots queue in order
        if self.writer.is_some() {
            self.submit(StoreOp::Persist(HistoryRecord {
                medicine_id,
                kind,
                values: buffer.values(),
            }));
        }

        tracing::debug!(medicine_id = %medicine_id, kind = kind.as_str(), minutes, "Recorded history sample");
        Ok(true)
    }

    /// Mode of the snooze buffer, falling back to the rounded mean.
    pub fn suggest_snooze(&self, medicine_id: &Uuid) -> Result<Option<SnoozeSuggestion>, ReminderError> {
        let Some(snoozes) = self.buffer_copy(medicine_id, HistoryKind::Snooze)? else {
            return Ok(None);
        };
        let sample_size = snoozes.len();

        if let Some(minutes) = snoozes.mode() {
            return Ok(Some(SnoozeSuggestion {
                minutes,
                basis: SuggestionBasis::Mode,
                sample_size,
                rationale: format!(
                    "You usually snooze for {minutes} minutes (last {sample_size} snoozes)"
                ),
            }));
        }

        Ok(snoozes.mean().map(|mean| {
            let minutes = mean.round() as u32;
            SnoozeSuggestion {
                minutes,
                basis: SuggestionBasis::Mean,
                sample_size,
                rationale: format!(
                    "Your snoozes average {minutes} minutes (last {sample_size} snoozes)"
                ),
            }
        }))
    }

    /// Suggest moving a slot later when doses are taken late on average by at
    /// least the shift threshold.
    pub fn suggest_schedule_shift(
        &self,
        medicine_id: &Uuid,
        current: TimeOfDay,
    ) -> Result<Option<ShiftSuggestion>, ReminderError> {
        let Some(delays) = self.buffer_copy(medicine_id, HistoryKind::Delay)? else {
            return Ok(None);
        };
        let Some(mean) = delays.mean() else {
            return Ok(None);
        };
        if mean < f64::from(self.shift_threshold_minutes) {
            return Ok(None);
        }

        let shift_minutes = mean.round() as i64;
        let suggested = current.shifted_by(shift_minutes);
        Ok(Some(ShiftSuggestion {
            current,
            suggested,
            shift_minutes,
            rationale: format!(
                "You take this dose about {shift_minutes} minutes late; consider {suggested} instead of {current}"
            ),
        }))
    }

    pub fn suggestions(&self, medicine_id: &Uuid, time_of_day: TimeOfDay) -> Result<Suggestions, ReminderError> {
        Ok(Suggestions {
            snooze: self.suggest_snooze(medicine_id)?,
            shift: self.suggest_schedule_shift(medicine_id, time_of_day)?,
        })
    }

    pub fn snooze_history(&self, medicine_id: &Uuid) -> Result<Vec<u32>, ReminderError> {
        Ok(self
            .buffer_copy(medicine_id, HistoryKind::Snooze)?
            .map(|b| b.values())
            .unwrap_or_default())
    }

    pub fn delay_history(&self, medicine_id: &Uuid) -> Result<Vec<u32>, ReminderError> {
        Ok(self
            .buffer_copy(medicine_id, HistoryKind::Delay)?
            .map(|b| b.values())
            .unwrap_or_default())
    }

    /// Drop a medicine's buffers, in memory and in the store.
    pub fn forget(&self, medicine_id: &Uuid) -> Result<(), ReminderError> {
        self.histories
            .write()
            .map_err(|_| ReminderError::LockPoisoned)?
            .remove(medicine_id);
        self.submit(StoreOp::Remove(*medicine_id));
        Ok(())
    }

    fn entry(&self, medicine_id: Uuid) -> Result<Arc<Mutex<MedicineHistory>>, ReminderError> {
        {
            let map = self.histories.read().map_err(|_| ReminderError::LockPoisoned)?;
            if let Some(entry) = map.get(&medicine_id) {
                return Ok(Arc::clone(entry));
            }
        }
        let mut map = self.histories.write().map_err(|_| ReminderError::LockPoisoned)?;
        let capacity = self.capacity;
        Ok(Arc::clone(
            map.entry(medicine_id)
                .or_insert_with(|| Arc::new(Mutex::new(MedicineHistory::new(capacity)))),
        ))
    }

    fn buffer_copy(
        &self,
        medicine_id: &Uuid,
        kind: HistoryKind,
    ) -> Result<Option<BoundedHistory>, ReminderError> {
        let entry = {
            let map = self.histories.read().map_err(|_| ReminderError::LockPoisoned)?;
            match map.get(medicine_id) {
                Some(entry) => Arc::clone(entry),
                None => return Ok(None),
            }
        };
        let history = entry.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let buffer = history.buffer(kind);
        Ok((!buffer.is_empty()).then(|| buffer.clone()))
    }
}
