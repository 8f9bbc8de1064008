//! Notification and outcome sinks.
//!
//! Rendering belongs to whoever consumes these: the tracing sinks log, the
//! channel sinks forward into a tokio channel for a UI or a streak tracker.

use tokio::sync::mpsc;

use super::traits::{NotificationSink, OutcomeSink};
use super::types::{OutcomeEvent, ReminderNotification};

/// Logs every delivery. Used by the headless binary.
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn deliver(&self, n: &ReminderNotification) {
        tracing::info!(
            medicine = %n.medicine_name,
            time_of_day = %n.time_of_day,
            occurrence = %n.occurrence,
            level = n.level,
            channel = ?n.urgency.channel,
            bypass_dnd = n.urgency.bypass_dnd,
            "Reminder"
        );
    }
}

#[derive(Debug, Default)]
pub struct TracingOutcomeSink;

impl OutcomeSink for TracingOutcomeSink {
    fn emit(&self, event: &OutcomeEvent) {
        match event {
            OutcomeEvent::Acknowledged {
                medicine_id,
                time_of_day,
                outcome,
                ..
            } => tracing::info!(medicine_id = %medicine_id, time_of_day = %time_of_day, outcome = %outcome, "Dose acknowledged"),
            OutcomeEvent::Expired {
                medicine_id,
                time_of_day,
                ..
            } => tracing::info!(medicine_id = %medicine_id, time_of_day = %time_of_day, "Dose missed"),
        }
    }
}

pub struct ChannelNotificationSink {
    tx: mpsc::UnboundedSender<ReminderNotification>,
}

impl ChannelNotificationSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReminderNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn deliver(&self, notification: &ReminderNotification) {
        if self.tx.send(notification.clone()).is_err() {
            tracing::warn!(medicine_id = %notification.medicine_id, "Notification receiver dropped");
        }
    }
}

pub struct ChannelOutcomeSink {
    tx: mpsc::UnboundedSender<OutcomeEvent>,
}

impl ChannelOutcomeSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutcomeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutcomeSink for ChannelOutcomeSink {
    fn emit(&self, event: &OutcomeEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::warn!(medicine_id = %event.occurrence().medicine_id, "Outcome receiver dropped");
        }
    }
}
