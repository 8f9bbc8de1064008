use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::HistoryKind;

/// Durable copy of one medicine's buffer of one kind, oldest value first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub medicine_id: Uuid,
    pub kind: HistoryKind,
    pub values: Vec<u32>,
}
