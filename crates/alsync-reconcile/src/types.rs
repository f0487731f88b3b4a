use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Record key carrying the alarm identifier.
pub const KEY_ID: &str = "id";

/// Record key carrying the ISO-8601 ring time. Absent means "deleted".
pub const KEY_RING_TIME: &str = "ring_time";

/// Variant value stored under one key of a snapshot entry.
///
/// Settings stores hand out loosely typed maps; only `id` and `ring_time` are
/// interpreted, every other key is carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RecordValue>),
    Map(BTreeMap<String, RecordValue>),
}

impl RecordValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecordValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RecordValue::Null => "null",
            RecordValue::Bool(_) => "bool",
            RecordValue::Int(_) => "int",
            RecordValue::Float(_) => "float",
            RecordValue::Str(_) => "string",
            RecordValue::List(_) => "list",
            RecordValue::Map(_) => "map",
        }
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::Str(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::Str(s)
    }
}

impl From<i64> for RecordValue {
    fn from(v: i64) -> Self {
        RecordValue::Int(v)
    }
}

impl From<bool> for RecordValue {
    fn from(v: bool) -> Self {
        RecordValue::Bool(v)
    }
}

/// One snapshot entry exactly as the settings store delivered it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAlarmRecord(pub BTreeMap<String, RecordValue>);

impl RawAlarmRecord {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.0.get(key)
    }
}

/// Complete ordered alarm list read from the settings store at one point in time.
pub type Snapshot = Vec<RawAlarmRecord>;

/// Parsed view of a snapshot entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlarmRecord {
    pub id: String,
    /// `None` means the alarm was deleted.
    pub ring_time: Option<String>,
}

impl AlarmRecord {
    pub fn new(id: impl Into<String>, ring_time: Option<&str>) -> Self {
        Self {
            id: id.into(),
            ring_time: ring_time.map(str::to_string),
        }
    }

    /// Extract `id` and `ring_time` from a raw entry.
    ///
    /// - `id` missing, empty, or not a string => [`SkipReason::MissingId`]
    /// - `ring_time` missing or null => deleted (`None`)
    /// - `ring_time` any string, blank included => present; parsed only on add
    /// - `ring_time` of any other type => [`SkipReason::MalformedRingTime`]
    pub fn from_raw(raw: &RawAlarmRecord) -> Result<Self, SkipReason> {
        let id = match raw.get(KEY_ID).and_then(RecordValue::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(SkipReason::MissingId),
        };

        let ring_time = match raw.get(KEY_RING_TIME) {
            None | Some(RecordValue::Null) => None,
            Some(RecordValue::Str(s)) => Some(s.clone()),
            Some(other) => {
                return Err(SkipReason::MalformedRingTime {
                    id,
                    value: format!("{other:?}"),
                    error: format!("expected string, got {}", other.type_name()),
                })
            }
        };

        Ok(Self { id, ring_time })
    }
}

/// Why a record produced no decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    MalformedRingTime {
        id: String,
        value: String,
        error: String,
    },
}

/// Outcome of processing one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// unknown -> known; `add_alarm` was issued.
    Added { id: String, epoch_seconds: i64 },
    /// known -> unknown; `remove_alarm` was issued.
    Removed { id: String },
    /// Known id with a ring time. The time is not compared.
    AlreadyKnown { id: String },
    /// Unknown id without a ring time.
    NotKnown { id: String },
    Skipped(SkipReason),
}

impl Transition {
    /// `true` when the scheduler was called for this record.
    pub fn notified(&self) -> bool {
        matches!(self, Transition::Added { .. } | Transition::Removed { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Transition::Added { id, .. }
            | Transition::Removed { id }
            | Transition::AlreadyKnown { id }
            | Transition::NotKnown { id } => Some(id),
            Transition::Skipped(SkipReason::MalformedRingTime { id, .. }) => Some(id),
            Transition::Skipped(SkipReason::MissingId) => None,
        }
    }
}

/// Every transition of one snapshot pass, in record order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub transitions: Vec<Transition>,
}

impl ReconcileReport {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when no scheduler call was made during the pass.
    pub fn is_noop(&self) -> bool {
        !self.transitions.iter().any(Transition::notified)
    }

    pub fn added_ids(&self) -> Vec<&str> {
        self.transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Added { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn removed_ids(&self) -> Vec<&str> {
        self.transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Removed { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<&SkipReason> {
        self.transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Skipped(reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> ReconcileSummary {
        let mut s = ReconcileSummary {
            records: self.transitions.len(),
            ..ReconcileSummary::default()
        };
        for t in &self.transitions {
            match t {
                Transition::Added { .. } => s.added += 1,
                Transition::Removed { .. } => s.removed += 1,
                Transition::AlreadyKnown { .. } | Transition::NotKnown { .. } => s.unchanged += 1,
                Transition::Skipped(_) => s.skipped += 1,
            }
        }
        s
    }
}

/// Counters for one pass, suitable for status surfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub records: usize,
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}
