//! Time-triggered reminder and countdown notifications.
//!
//! The engine samples the local clock, matches task and subtask schedules at
//! minute resolution, and fires each (kind, id) at most once. Workout
//! countdowns tick once per second and alert exactly once when they reach
//! zero. Fetching entities and rendering alerts belong to the host; it feeds
//! candidate snapshots in and receives [`NotificationEvent`]s out.
//!
//! ```no_run
//! use reminder_engine::{EngineConfig, LogNotifier};
//!
//! # async fn demo() -> reminder_engine::AppResult<()> {
//! let handle = reminder_engine::start(&EngineConfig::from_env()?, LogNotifier)?;
//! handle.start_countdown("w1", 20)?;
//! let _scheduler = handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod countdown;
pub mod driver;
pub mod engine;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod notification;
pub mod reminder;
pub mod storage;

pub use clock::{Clock, ClockMinute, ClockSampler, FixedClock, SystemClock, Ticker};
pub use config::EngineConfig;
pub use countdown::{format_remaining, CountdownManager, CountdownState, CountdownStatus, Workout};
pub use driver::EngineHandle;
pub use engine::{ReminderEngine, Scheduler};
pub use error::{AppError, AppResult};
pub use matcher::{Evaluation, Matcher};
pub use notification::{LogNotifier, NotificationEvent, Notifier, Severity, SoundCue};
pub use reminder::{
    candidates_from_tasks, CandidateKind, FiredKey, FiredSet, ReminderCandidate, SubtaskSnapshot, TaskSnapshot,
};
pub use storage::{FiredSetStore, JsonFileStore, MemoryStore};

/// Build a scheduler on the system clock from `config` and start driving it.
///
/// Must be called from inside a tokio runtime.
pub fn start<N>(config: &EngineConfig, notifier: N) -> AppResult<EngineHandle<SystemClock>>
where
    N: Notifier + Send + 'static,
{
    tokio::runtime::Handle::try_current().map_err(|e| AppError::engine(e.to_string()))?;

    let reminders = ReminderEngine::from_config(config)?;
    let scheduler = Scheduler::new(SystemClock, config, reminders, std::time::Instant::now())?;
    Ok(driver::spawn(scheduler, notifier))
}
