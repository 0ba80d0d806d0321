//! Stateful wrappers around the pure matcher and countdown logic.
//!
//! [`ReminderEngine`] owns the fired-set and the latest candidate snapshot.
//! [`Scheduler`] adds clock sampling and countdowns behind one explicit
//! `advance(now)` step that the async driver (or a test) calls.
//!
//! Store saves run synchronously inside that step, so with a
//! [`JsonFileStore`] the driver task does a small blocking file write
//! whenever the fired-set changes. That only happens when a reminder fires
//! or a snapshot invalidates keys. Hosts that need non-blocking persistence
//! can pass their own [`FiredSetStore`].

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::{Clock, ClockMinute, ClockSampler, Ticker};
use crate::config::{EngineConfig, SECOND_INTERVAL_SECS};
use crate::countdown::CountdownManager;
use crate::error::AppResult;
use crate::matcher::{invalidate, Matcher};
use crate::notification::NotificationEvent;
use crate::reminder::{FiredKey, FiredSet, ReminderCandidate};
use crate::storage::{FiredSetStore, JsonFileStore, MemoryStore};

pub type BoxedStore = Box<dyn FiredSetStore + Send>;

pub struct ReminderEngine {
    matcher: Matcher,
    fired: FiredSet,
    store: BoxedStore,
    candidates: Vec<ReminderCandidate>,
    invalidate_on_reschedule: bool,
}

impl ReminderEngine {
    /// Build an engine whose fired-set starts from whatever `store` holds.
    pub fn new(config: &EngineConfig, store: BoxedStore) -> AppResult<Self> {
        let fired = store.load()?;
        if !fired.is_empty() {
            info!(count = fired.len(), "Restored fired reminder keys");
        }
        Ok(Self {
            matcher: Matcher::new(config.display_name()),
            fired,
            store,
            candidates: Vec::new(),
            invalidate_on_reschedule: config.invalidate_on_reschedule,
        })
    }

    /// Pick the store from the config: on disk when `persist_fired_set` is set,
    /// otherwise session memory.
    pub fn from_config(config: &EngineConfig) -> AppResult<Self> {
        let store: BoxedStore = if config.persist_fired_set {
            Box::new(JsonFileStore::new()?)
        } else {
            Box::new(MemoryStore::new())
        };
        Self::new(config, store)
    }

    /// Replace the candidate snapshot with a fresh one from the task store.
    pub fn set_candidates(&mut self, candidates: Vec<ReminderCandidate>) {
        if self.invalidate_on_reschedule {
            let next = invalidate(&self.fired, &self.candidates, &candidates);
            if next != self.fired {
                self.fired = next;
                self.persist();
            }
        }
        debug!(count = candidates.len(), "Reminder candidates updated");
        self.candidates = candidates;
    }

    /// Run one matching cycle for `now` and merge the result back.
    pub fn evaluate_at(&mut self, now: ClockMinute) -> Vec<NotificationEvent> {
        let evaluation = self.matcher.evaluate(&self.candidates, &self.fired, now);
        if evaluation.fired != self.fired {
            self.fired.merge(&evaluation.fired);
            self.persist();
        }
        for event in &evaluation.events {
            info!(now = %now, title = %event.title, "Reminder fired");
        }
        evaluation.events
    }

    /// Forget one key so its entity can fire again.
    pub fn clear(&mut self, key: &FiredKey) -> bool {
        let removed = self.fired.remove(key);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn fired(&self) -> &FiredSet {
        &self.fired
    }

    pub fn candidates(&self) -> &[ReminderCandidate] {
        &self.candidates
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.fired) {
            warn!(error = %e, "Failed to save fired reminder keys");
        }
    }
}

impl std::fmt::Debug for ReminderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderEngine")
            .field("fired", &self.fired)
            .field("candidates", &self.candidates.len())
            .field("invalidate_on_reschedule", &self.invalidate_on_reschedule)
            .finish()
    }
}

/// Minute sampling for reminders and second ticks for countdowns.
#[derive(Debug)]
pub struct Scheduler<C> {
    sampler: ClockSampler<C>,
    minute_ticker: Ticker,
    second_ticker: Ticker,
    reminders: ReminderEngine,
    countdowns: CountdownManager,
}

impl<C: Clock> Scheduler<C> {
    /// `start` anchors the second tick: the first countdown decrement happens
    /// one full second after it. Reminders are sampled on the first advance.
    pub fn new(clock: C, config: &EngineConfig, reminders: ReminderEngine, start: Instant) -> AppResult<Self> {
        config.validate()?;
        let sampler = ClockSampler::new(clock)?;
        let second = Duration::from_secs(SECOND_INTERVAL_SECS);

        Ok(Self {
            sampler,
            minute_ticker: Ticker::new(Duration::from_secs(config.minute_interval_secs)),
            second_ticker: Ticker::starting_at(second, start + second),
            reminders,
            countdowns: CountdownManager::new(),
        })
    }

    /// Everything that came due at `now`: at most one reminder evaluation,
    /// plus one countdown tick per elapsed second.
    pub fn advance(&mut self, now: Instant) -> Vec<NotificationEvent> {
        let mut events = Vec::new();

        if self.minute_ticker.advance(now) > 0 {
            let minute = self.sampler.sample_minute();
            events.extend(self.reminders.evaluate_at(minute));
        }

        for _ in 0..self.second_ticker.advance(now) {
            self.sampler.sample_second();
            events.extend(self.countdowns.tick());
        }

        events
    }

    pub fn reminders(&self) -> &ReminderEngine {
        &self.reminders
    }

    pub fn reminders_mut(&mut self) -> &mut ReminderEngine {
        &mut self.reminders
    }

    pub fn countdowns(&self) -> &CountdownManager {
        &self.countdowns
    }

    pub fn countdowns_mut(&mut self) -> &mut CountdownManager {
        &mut self.countdowns
    }

    /// Seconds ticked since the scheduler started.
    pub fn elapsed_ticks(&self) -> u64 {
        self.sampler.seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::countdown::CountdownStatus;
    use crate::error::AppError;
    use crate::reminder::CandidateKind;
    use chrono::{DateTime, Local, TimeZone};
    use std::cell::Cell;
    use std::rc::Rc;

    fn at(h: u32, m: u32) -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2024, 1, 1, h, m, 15).unwrap())
    }

    fn engine() -> ReminderEngine {
        ReminderEngine::new(&EngineConfig::default(), Box::new(MemoryStore::new())).unwrap()
    }

    fn report() -> ReminderCandidate {
        ReminderCandidate::main_task("t1", "Report", Some("2024-01-01T09:30".into()))
    }

    /// Wall clock the test moves by hand.
    #[derive(Clone)]
    struct SteppedClock(Rc<Cell<DateTime<Local>>>);

    impl Clock for SteppedClock {
        fn now(&self) -> DateTime<Local> {
            self.0.get()
        }
    }

    /// Store that refuses every save.
    struct ReadOnlyStore;

    impl FiredSetStore for ReadOnlyStore {
        fn load(&self) -> AppResult<FiredSet> {
            Ok(FiredSet::new())
        }

        fn save(&mut self, _fired: &FiredSet) -> AppResult<()> {
            Err(AppError::storage("read-only"))
        }
    }

    #[test]
    fn test_engine_fires_once_per_key() {
        let mut engine = engine();
        engine.set_candidates(vec![report()]);

        let now: ClockMinute = "09:30".parse().unwrap();
        assert_eq!(engine.evaluate_at(now).len(), 1);
        assert!(engine.evaluate_at(now).is_empty());
        assert!(engine.fired().contains(&FiredKey::new(CandidateKind::MainTask, "t1")));
    }

    #[test]
    fn test_reschedule_allows_second_fire() {
        let mut engine = engine();
        engine.set_candidates(vec![report()]);
        engine.evaluate_at("09:30".parse().unwrap());

        let moved = ReminderCandidate::main_task("t1", "Report", Some("2024-01-01T09:45".into()));
        engine.set_candidates(vec![moved]);
        assert!(engine.fired().is_empty());
        assert_eq!(engine.evaluate_at("09:45".parse().unwrap()).len(), 1);
    }

    #[test]
    fn test_reschedule_kept_when_invalidation_disabled() {
        let config = EngineConfig {
            invalidate_on_reschedule: false,
            ..EngineConfig::default()
        };
        let mut engine = ReminderEngine::new(&config, Box::new(MemoryStore::new())).unwrap();
        engine.set_candidates(vec![report()]);
        engine.evaluate_at("09:30".parse().unwrap());

        engine.set_candidates(vec![ReminderCandidate::main_task("t1", "Report", Some("09:45".into()))]);
        assert!(engine.evaluate_at("09:45".parse().unwrap()).is_empty());
    }

    #[test]
    fn test_clear_lets_key_fire_again() {
        let mut engine = engine();
        engine.set_candidates(vec![report()]);
        let now: ClockMinute = "09:30".parse().unwrap();
        engine.evaluate_at(now);

        assert!(engine.clear(&FiredKey::new(CandidateKind::MainTask, "t1")));
        assert_eq!(engine.evaluate_at(now).len(), 1);
    }

    #[test]
    fn test_restores_from_persisted_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::in_dir(dir.path()).unwrap();
            let mut engine = ReminderEngine::new(&EngineConfig::default(), Box::new(store)).unwrap();
            engine.set_candidates(vec![report()]);
            engine.evaluate_at("09:30".parse().unwrap());
        }

        let store = JsonFileStore::in_dir(dir.path()).unwrap();
        let mut engine = ReminderEngine::new(&EngineConfig::default(), Box::new(store)).unwrap();
        engine.set_candidates(vec![report()]);
        assert!(engine.evaluate_at("09:30".parse().unwrap()).is_empty());
    }

    #[test]
    fn test_store_failure_does_not_stop_matching() {
        let mut engine = ReminderEngine::new(&EngineConfig::default(), Box::new(ReadOnlyStore)).unwrap();
        engine.set_candidates(vec![report()]);
        let now: ClockMinute = "09:30".parse().unwrap();
        assert_eq!(engine.evaluate_at(now).len(), 1);
        assert!(engine.evaluate_at(now).is_empty());
    }

    #[test]
    fn test_user_name_from_config() {
        let config = EngineConfig {
            user_name: Some("Kim".into()),
            ..EngineConfig::default()
        };
        let mut engine = ReminderEngine::new(&config, Box::new(MemoryStore::new())).unwrap();
        engine.set_candidates(vec![report()]);
        let events = engine.evaluate_at("09:30".parse().unwrap());
        assert!(events[0].message.starts_with("Kim, "));
    }

    #[test]
    fn test_scheduler_samples_reminders_on_cadence() {
        let start = Instant::now();
        let config = EngineConfig::default();
        let mut scheduler = Scheduler::new(at(9, 30), &config, engine(), start).unwrap();
        scheduler.reminders_mut().set_candidates(vec![report()]);

        assert_eq!(scheduler.advance(start).len(), 1);
        assert!(scheduler.advance(start + Duration::from_secs(30)).is_empty());
        assert_eq!(scheduler.elapsed_ticks(), 30);
    }

    #[test]
    fn test_late_samples_never_skip_a_minute() {
        let wall = Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 59).unwrap() + chrono::Duration::milliseconds(500);
        let clock = SteppedClock(Rc::new(Cell::new(wall)));
        let config = EngineConfig {
            minute_interval_secs: 30,
            ..EngineConfig::default()
        };
        let start = Instant::now();
        let mut scheduler = Scheduler::new(clock.clone(), &config, engine(), start).unwrap();
        let subtasks = (1..=5)
            .map(|m| ReminderCandidate::subtask(format!("s{}", m), format!("At 10:0{}", m), Some(format!("10:0{}", m))))
            .collect();
        scheduler.reminders_mut().set_candidates(subtasks);

        // Every sample after the first lands 900ms behind its due time.
        let mut events = scheduler.advance(start);
        for k in 1..=11u64 {
            let offset = Duration::from_millis(k * 30_000 + 900);
            clock.0.set(wall + chrono::Duration::from_std(offset).unwrap());
            events.extend(scheduler.advance(start + offset));
        }

        assert_eq!(events.len(), 5);
        for m in 1..=5 {
            assert!(events.iter().any(|e| e.message.contains(&format!("\"At 10:0{}\"", m))));
        }
    }

    #[test]
    fn test_scheduler_runs_countdown_to_completion() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(at(7, 0), &EngineConfig::default(), engine(), start).unwrap();
        scheduler.countdowns_mut().start("w1", 1);

        assert!(scheduler.advance(start + Duration::from_secs(59)).is_empty());
        assert_eq!(scheduler.countdowns().state().remaining("w1"), Some(1));

        let events = scheduler.advance(start + Duration::from_secs(60));
        assert_eq!(events.len(), 1);
        assert_eq!(scheduler.countdowns().state().status("w1"), CountdownStatus::Finished);

        assert!(scheduler.advance(start + Duration::from_secs(120)).is_empty());
    }

    #[test]
    fn test_scheduler_rejects_invalid_config() {
        let config = EngineConfig {
            minute_interval_secs: 120,
            ..EngineConfig::default()
        };
        let err = Scheduler::new(at(7, 0), &config, engine(), Instant::now()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
