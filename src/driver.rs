//! Background driver for a [`Scheduler`].
//!
//! One tokio task wakes every second, calls `Scheduler::advance` and hands
//! the resulting alerts to a [`Notifier`]. Candidate snapshots arrive on a
//! `watch` channel, countdown controls on an mpsc channel. Everything runs in
//! that one task, so no locking is needed. Dropping the [`EngineHandle`]
//! closes the channels and ends the loop, which is how a screen tears its
//! engine down when it goes away.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::SECOND_INTERVAL_SECS;
use crate::countdown::Workout;
use crate::engine::Scheduler;
use crate::error::{AppError, AppResult};
use crate::notification::Notifier;
use crate::reminder::{candidates_from_tasks, FiredKey, ReminderCandidate, TaskSnapshot};

#[derive(Debug)]
enum Command {
    StartCountdown { id: String, minutes: u32 },
    RestartCountdown { id: String, minutes: u32 },
    StopCountdown { id: String },
    SetWorkouts(Vec<Workout>),
    ClearFired(FiredKey),
}

/// Control surface for a running engine.
pub struct EngineHandle<C> {
    candidates_tx: watch::Sender<Vec<ReminderCandidate>>,
    command_tx: mpsc::UnboundedSender<Command>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Scheduler<C>>,
}

impl<C> std::fmt::Debug for EngineHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

/// Start driving `scheduler` on the current tokio runtime.
pub fn spawn<C, N>(scheduler: Scheduler<C>, notifier: N) -> EngineHandle<C>
where
    C: Clock + Send + 'static,
    N: Notifier + Send + 'static,
{
    let (candidates_tx, candidates_rx) = watch::channel(scheduler.reminders().candidates().to_vec());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run(scheduler, notifier, candidates_rx, command_rx, stop_rx));
    info!("Reminder engine started");

    EngineHandle {
        candidates_tx,
        command_tx,
        stop_tx,
        task,
    }
}

async fn run<C, N>(
    mut scheduler: Scheduler<C>,
    mut notifier: N,
    mut candidates_rx: watch::Receiver<Vec<ReminderCandidate>>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    mut stop_rx: watch::Receiver<bool>,
) -> Scheduler<C>
where
    C: Clock,
    N: Notifier,
{
    let mut interval = time::interval(Duration::from_secs(SECOND_INTERVAL_SECS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for event in scheduler.advance(Instant::now().into_std()) {
                    notifier.notify(event);
                }
            }
            changed = candidates_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let candidates = candidates_rx.borrow_and_update().clone();
                scheduler.reminders_mut().set_candidates(candidates);
            }
            Some(command) = command_rx.recv() => {
                apply(&mut scheduler, command);
            }
            _ = stop_rx.changed() => {
                break;
            }
        }
    }

    info!("Reminder engine stopped");
    scheduler
}

fn apply<C: Clock>(scheduler: &mut Scheduler<C>, command: Command) {
    debug!(?command, "Applying engine command");
    match command {
        Command::StartCountdown { id, minutes } => {
            scheduler.countdowns_mut().start(&id, minutes);
        }
        Command::RestartCountdown { id, minutes } => {
            scheduler.countdowns_mut().restart(&id, minutes);
        }
        Command::StopCountdown { id } => {
            scheduler.countdowns_mut().stop(&id);
        }
        Command::SetWorkouts(workouts) => scheduler.countdowns_mut().set_workouts(workouts),
        Command::ClearFired(key) => {
            scheduler.reminders_mut().clear(&key);
        }
    }
}

impl<C> EngineHandle<C> {
    /// Publish a fresh candidate snapshot.
    pub fn update_candidates(&self, candidates: Vec<ReminderCandidate>) -> AppResult<()> {
        self.candidates_tx
            .send(candidates)
            .map_err(|_| AppError::engine("engine task is not running"))
    }

    /// Publish task-store records, flattened into candidates.
    pub fn update_tasks(&self, tasks: &[TaskSnapshot]) -> AppResult<()> {
        self.update_candidates(candidates_from_tasks(tasks))
    }

    pub fn start_countdown(&self, id: impl Into<String>, minutes: u32) -> AppResult<()> {
        self.send(Command::StartCountdown { id: id.into(), minutes })
    }

    pub fn restart_countdown(&self, id: impl Into<String>, minutes: u32) -> AppResult<()> {
        self.send(Command::RestartCountdown { id: id.into(), minutes })
    }

    pub fn stop_countdown(&self, id: impl Into<String>) -> AppResult<()> {
        self.send(Command::StopCountdown { id: id.into() })
    }

    pub fn set_workouts(&self, workouts: Vec<Workout>) -> AppResult<()> {
        self.send(Command::SetWorkouts(workouts))
    }

    pub fn clear_fired(&self, key: FiredKey) -> AppResult<()> {
        self.send(Command::ClearFired(key))
    }

    /// Stop the loop and take the scheduler back, with its fired-set and
    /// countdown state intact.
    pub async fn shutdown(self) -> AppResult<Scheduler<C>> {
        let _ = self.stop_tx.send(true);
        self.task.await.map_err(|e| AppError::engine(e.to_string()))
    }

    fn send(&self, command: Command) -> AppResult<()> {
        self.command_tx
            .send(command)
            .map_err(|_| AppError::engine("engine task is not running"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::EngineConfig;
    use crate::countdown::{CountdownStatus, WORKOUT_FINISHED_TITLE};
    use crate::engine::ReminderEngine;
    use crate::matcher::TASK_REMINDER_TITLE;
    use crate::notification::NotificationEvent;
    use crate::reminder::CandidateKind;
    use crate::storage::MemoryStore;
    use chrono::{Local, TimeZone};

    fn scheduler_at(h: u32, m: u32) -> Scheduler<FixedClock> {
        let config = EngineConfig::default();
        let clock = FixedClock(Local.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap());
        let reminders = ReminderEngine::new(&config, Box::new(MemoryStore::new())).unwrap();
        Scheduler::new(clock, &config, reminders, Instant::now().into_std()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_delivered_through_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        let handle = spawn(scheduler_at(9, 30), tx);

        handle
            .update_candidates(vec![ReminderCandidate::main_task(
                "t1",
                "Report",
                Some("2024-01-01T09:30".into()),
            )])
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.title, TASK_REMINDER_TITLE);

        let scheduler = handle.shutdown().await.unwrap();
        assert!(scheduler
            .reminders()
            .fired()
            .contains(&FiredKey::new(CandidateKind::MainTask, "t1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_finishes_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        let handle = spawn(scheduler_at(7, 0), tx);

        handle
            .set_workouts(vec![Workout {
                id: "w1".into(),
                name: "Rowing".into(),
                duration: 1,
            }])
            .unwrap();
        handle.start_countdown("w1", 1).unwrap();

        let started = Instant::now();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.title, WORKOUT_FINISHED_TITLE);
        assert_eq!(event.message, "Time is up for \"Rowing\"!");
        assert!(started.elapsed() >= Duration::from_secs(59));

        let scheduler = handle.shutdown().await.unwrap();
        assert_eq!(scheduler.countdowns().state().status("w1"), CountdownStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_countdown_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        let handle = spawn(scheduler_at(7, 0), tx);

        handle.start_countdown("w1", 1).unwrap();
        time::sleep(Duration::from_secs(10)).await;
        handle.stop_countdown("w1").unwrap();
        time::sleep(Duration::from_secs(120)).await;

        let scheduler = handle.shutdown().await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(scheduler.countdowns().state().status("w1"), CountdownStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_ends_loop() {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        let handle = spawn(scheduler_at(7, 0), tx);
        drop(handle);

        // The notifier is dropped with the task, closing the channel.
        assert!(rx.recv().await.is_none());
    }
}
