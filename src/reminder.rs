use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::clock::ClockMinute;

/// Naive date-time layouts the task store is known to send, interpreted as local time.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Task status string the server uses for finished tasks
const STATUS_COMPLETED: &str = "Completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    MainTask,
    Subtask,
}

impl CandidateKind {
    fn namespace(&self) -> &'static str {
        match self {
            CandidateKind::MainTask => "task",
            CandidateKind::Subtask => "subtask",
        }
    }
}

/// An entity that can raise a time-triggered alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderCandidate {
    pub id: String,
    pub kind: CandidateKind,
    #[serde(default)]
    pub title: String,
    /// Full date-time for task reminders, `HH:MM` for subtask timings
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    /// Owning task's title, for subtask messages
    #[serde(default)]
    pub parent_title: Option<String>,
}

impl ReminderCandidate {
    pub fn main_task(id: impl Into<String>, title: impl Into<String>, scheduled_time: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind: CandidateKind::MainTask,
            title: title.into(),
            scheduled_time,
            is_completed: false,
            parent_title: None,
        }
    }

    pub fn subtask(id: impl Into<String>, title: impl Into<String>, timing: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind: CandidateKind::Subtask,
            title: title.into(),
            scheduled_time: timing,
            is_completed: false,
            parent_title: None,
        }
    }

    pub fn with_parent(mut self, parent_title: impl Into<String>) -> Self {
        self.parent_title = Some(parent_title.into());
        self
    }

    pub fn completed(mut self, is_completed: bool) -> Self {
        self.is_completed = is_completed;
        self
    }

    pub fn key(&self) -> FiredKey {
        FiredKey::new(self.kind, self.id.clone())
    }

    /// Minute this candidate triggers at, or `None` when the schedule is
    /// missing or unreadable.
    pub fn trigger_minute(&self) -> Option<ClockMinute> {
        self.scheduled_time.as_deref().and_then(parse_trigger_minute)
    }

    /// Whether this candidate is due at `now`. Completion is checked before time.
    pub fn is_due_at(&self, now: ClockMinute) -> bool {
        if self.is_completed {
            return false;
        }
        self.trigger_minute() == Some(now)
    }
}

/// Reduce a schedule string to the local minute it names.
///
/// RFC 3339 values are converted into local time; naive date-times are taken
/// as local already; a bare `HH:MM` is used as is.
pub fn parse_trigger_minute(raw: &str) -> Option<ClockMinute> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(ClockMinute::from_time(&dt.with_timezone(&Local)));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ClockMinute::from_time(&naive));
        }
    }

    raw.parse().ok()
}

/// Dedup key for a fired candidate: one per (kind, id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiredKey {
    pub kind: CandidateKind,
    pub id: String,
}

impl FiredKey {
    pub fn new(kind: CandidateKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for FiredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.namespace(), self.id)
    }
}

/// Keys that have already produced a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiredSet {
    keys: BTreeSet<FiredKey>,
}

impl FiredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &FiredKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns true if the key was not present before.
    pub fn insert(&mut self, key: FiredKey) -> bool {
        self.keys.insert(key)
    }

    pub fn remove(&mut self, key: &FiredKey) -> bool {
        self.keys.remove(key)
    }

    pub fn merge(&mut self, other: &FiredSet) {
        self.keys.extend(other.keys.iter().cloned());
    }

    pub fn retain<F: FnMut(&FiredKey) -> bool>(&mut self, keep: F) {
        self.keys.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FiredKey> {
        self.keys.iter()
    }
}

impl FromIterator<FiredKey> for FiredSet {
    fn from_iter<I: IntoIterator<Item = FiredKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// A task as the task store returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reminder: Option<bool>,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskSnapshot>,
}

impl TaskSnapshot {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(STATUS_COMPLETED)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskSnapshot {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// `HH:MM`; free text like "15 mins" never matches
    #[serde(default)]
    pub timing: Option<String>,
}

/// Flatten task-store records into reminder candidates.
///
/// A task contributes a main candidate only when its reminder flag is on.
/// Subtasks of a completed task count as completed.
pub fn candidates_from_tasks(tasks: &[TaskSnapshot]) -> Vec<ReminderCandidate> {
    let mut candidates = Vec::new();

    for task in tasks {
        let task_done = task.is_completed();

        if task.reminder.unwrap_or(false) {
            candidates.push(
                ReminderCandidate::main_task(&task.id, &task.title, task.reminder_time.clone()).completed(task_done),
            );
        }

        for subtask in &task.subtasks {
            candidates.push(
                ReminderCandidate::subtask(&subtask.id, &subtask.title, subtask.timing.clone())
                    .with_parent(&task.title)
                    .completed(subtask.completed || task_done),
            );
        }
    }

    candidates
}
