//! Reminder matching.
//!
//! [`Matcher::evaluate`] is a pure function of (candidates, fired-set, now):
//! the same inputs always give the same events and the same updated set.
//! Within one call every main task is considered before any subtask, because
//! a fired main task suppresses the subtask alert for that cycle.

use std::collections::HashMap;

use tracing::debug;

use crate::clock::ClockMinute;
use crate::config::DEFAULT_USER_NAME;
use crate::notification::NotificationEvent;
use crate::reminder::{CandidateKind, FiredKey, FiredSet, ReminderCandidate};

pub const TASK_REMINDER_TITLE: &str = "Task Reminder! 🔔";
pub const SUBTASK_REMINDER_TITLE: &str = "Time Up! ⏰";

/// Result of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub events: Vec<NotificationEvent>,
    pub fired: FiredSet,
}

impl Evaluation {
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    user_name: String,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_NAME)
    }
}

impl Matcher {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }

    pub fn evaluate(&self, candidates: &[ReminderCandidate], fired: &FiredSet, now: ClockMinute) -> Evaluation {
        let mut next = fired.clone();
        let mut events = Vec::new();

        for candidate in candidates.iter().filter(|c| c.kind == CandidateKind::MainTask) {
            if candidate.is_due_at(now) && next.insert(candidate.key()) {
                events.push(self.task_event(candidate));
            }
        }

        let mut batch: Vec<&ReminderCandidate> = Vec::new();
        for candidate in candidates.iter().filter(|c| c.kind == CandidateKind::Subtask) {
            if candidate.is_due_at(now) && next.insert(candidate.key()) {
                batch.push(candidate);
            }
        }

        let task_hits = events.len();
        if task_hits == 0 {
            match batch.as_slice() {
                [] => {}
                [only] => events.push(single_subtask_event(only)),
                many => events.push(subtask_batch_event(many.len())),
            }
        }

        debug!(
            now = %now,
            task_hits,
            subtask_hits = batch.len(),
            events = events.len(),
            "Evaluated reminder candidates"
        );

        Evaluation { events, fired: next }
    }

    fn task_event(&self, candidate: &ReminderCandidate) -> NotificationEvent {
        NotificationEvent::info(
            TASK_REMINDER_TITLE,
            format!("{}, your task \"{}\" is coming closer!", self.user_name, candidate.title),
        )
    }
}

fn single_subtask_event(candidate: &ReminderCandidate) -> NotificationEvent {
    let message = match &candidate.parent_title {
        Some(parent) => format!(
            "It is time for your subtask: \"{}\" (from task \"{}\")",
            candidate.title, parent
        ),
        None => format!("It is time for your subtask: \"{}\"", candidate.title),
    };
    NotificationEvent::info(SUBTASK_REMINDER_TITLE, message)
}

fn subtask_batch_event(count: usize) -> NotificationEvent {
    NotificationEvent::info(
        SUBTASK_REMINDER_TITLE,
        format!("It is time for {} of your scheduled subtasks!", count),
    )
}

/// Drop fired keys whose entity was deleted or rescheduled between two
/// snapshots. Keys for entities that appear in neither snapshot are kept,
/// so a persisted set survives until the first real snapshot arrives.
pub fn invalidate(fired: &FiredSet, previous: &[ReminderCandidate], current: &[ReminderCandidate]) -> FiredSet {
    let schedules = |list: &[ReminderCandidate]| -> HashMap<FiredKey, Option<String>> {
        list.iter().map(|c| (c.key(), c.scheduled_time.clone())).collect()
    };
    let before = schedules(previous);
    let after = schedules(current);

    let mut next = fired.clone();
    next.retain(|key| match (before.get(key), after.get(key)) {
        (Some(old), Some(new)) => old == new,
        (Some(_), None) => false,
        (None, _) => true,
    });

    let dropped = fired.len() - next.len();
    if dropped > 0 {
        debug!(dropped, "Cleared fired keys for deleted or rescheduled reminders");
    }
    next
}
