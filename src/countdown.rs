//! Per-workout countdowns driven by a shared one-second tick.
//!
//! State per id: absent = idle, `> 0` = running, `0` = finished. Finished is
//! terminal until the countdown is stopped or restarted.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::notification::NotificationEvent;

pub const WORKOUT_FINISHED_TITLE: &str = "Workout Finished! 🎉";

const FALLBACK_WORKOUT_NAME: &str = "your workout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStatus {
    Idle,
    Running(u32),
    Finished,
}

/// Remaining seconds keyed by workout id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountdownState {
    remaining: BTreeMap<String, u32>,
}

impl CountdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown of `duration_minutes`. A running countdown is left
    /// alone; returns whether anything was (re)armed.
    pub fn start(&mut self, id: &str, duration_minutes: u32) -> bool {
        if self.is_running(id) {
            return false;
        }
        self.remaining
            .insert(id.to_string(), duration_minutes.saturating_mul(60));
        true
    }

    /// Start from the full duration no matter what state the id is in.
    pub fn restart(&mut self, id: &str, duration_minutes: u32) {
        self.remaining.remove(id);
        self.start(id, duration_minutes);
    }

    /// Back to idle. Returns the seconds that were left, if any entry existed.
    pub fn stop(&mut self, id: &str) -> Option<u32> {
        self.remaining.remove(id)
    }

    /// Decrement every running countdown by one second and return the ids that
    /// reached zero on this tick.
    pub fn tick(&mut self) -> BTreeSet<String> {
        let mut finished = BTreeSet::new();
        for (id, secs) in self.remaining.iter_mut() {
            if *secs == 0 {
                continue;
            }
            *secs -= 1;
            if *secs == 0 {
                finished.insert(id.clone());
            }
        }
        finished
    }

    pub fn status(&self, id: &str) -> CountdownStatus {
        match self.remaining.get(id) {
            None => CountdownStatus::Idle,
            Some(0) => CountdownStatus::Finished,
            Some(&secs) => CountdownStatus::Running(secs),
        }
    }

    pub fn remaining(&self, id: &str) -> Option<u32> {
        self.remaining.get(id).copied()
    }

    pub fn is_running(&self, id: &str) -> bool {
        matches!(self.status(id), CountdownStatus::Running(_))
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.remaining.iter().map(|(id, secs)| (id.as_str(), *secs))
    }
}

/// Render seconds as `m:ss`.
pub fn format_remaining(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// A workout record as the task store returns it. `duration` is in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub duration: u32,
}

/// Countdown state plus the workout names needed for completion alerts.
#[derive(Debug, Clone, Default)]
pub struct CountdownManager {
    state: CountdownState,
    workouts: HashMap<String, Workout>,
}

impl CountdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known workouts. Running countdowns are kept even if their
    /// workout disappears; their alert falls back to a generic name.
    pub fn set_workouts(&mut self, workouts: Vec<Workout>) {
        self.workouts = workouts.into_iter().map(|w| (w.id.clone(), w)).collect();
    }

    pub fn start(&mut self, id: &str, duration_minutes: u32) -> bool {
        let started = self.state.start(id, duration_minutes);
        if started {
            info!(workout = id, duration_minutes, "Countdown started");
        } else {
            debug!(workout = id, "Countdown already running, start ignored");
        }
        started
    }

    /// Start using the registered workout's own duration.
    pub fn start_workout(&mut self, id: &str) -> bool {
        match self.workouts.get(id).map(|w| w.duration) {
            Some(minutes) => self.start(id, minutes),
            None => {
                debug!(workout = id, "Unknown workout, start ignored");
                false
            }
        }
    }

    pub fn restart(&mut self, id: &str, duration_minutes: u32) {
        self.state.restart(id, duration_minutes);
        info!(workout = id, duration_minutes, "Countdown restarted");
    }

    pub fn stop(&mut self, id: &str) -> Option<u32> {
        let left = self.state.stop(id);
        if let Some(secs) = left {
            info!(workout = id, remaining = %format_remaining(secs), "Countdown stopped");
        }
        left
    }

    /// One second passes. Returns one completion alert per countdown that
    /// finished on this tick.
    pub fn tick(&mut self) -> Vec<NotificationEvent> {
        self.state
            .tick()
            .into_iter()
            .map(|id| {
                info!(workout = %id, "Countdown finished");
                let name = self
                    .workouts
                    .get(&id)
                    .map(|w| w.name.as_str())
                    .unwrap_or(FALLBACK_WORKOUT_NAME);
                NotificationEvent::success(WORKOUT_FINISHED_TITLE, format!("Time is up for \"{}\"!", name))
            })
            .collect()
    }

    pub fn state(&self) -> &CountdownState {
        &self.state
    }
}
