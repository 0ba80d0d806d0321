mod local;

use crate::error::AppResult;
use crate::reminder::FiredSet;

pub use local::JsonFileStore;

/// Where the fired-set lives between evaluations. The lifetime policy of
/// "already notified" is whatever store the host plugs in.
pub trait FiredSetStore {
    fn load(&self) -> AppResult<FiredSet>;
    fn save(&mut self, fired: &FiredSet) -> AppResult<()>;
}

/// Session-scoped store: starts empty and is gone when the engine is dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    fired: FiredSet,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with keys carried over from another screen.
    pub fn with_fired(fired: FiredSet) -> Self {
        Self { fired }
    }
}

impl FiredSetStore for MemoryStore {
    fn load(&self) -> AppResult<FiredSet> {
        Ok(self.fired.clone())
    }

    fn save(&mut self, fired: &FiredSet) -> AppResult<()> {
        self.fired = fired.clone();
        Ok(())
    }
}

impl<S: FiredSetStore + ?Sized> FiredSetStore for Box<S> {
    fn load(&self) -> AppResult<FiredSet> {
        (**self).load()
    }

    fn save(&mut self, fired: &FiredSet) -> AppResult<()> {
        (**self).save(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::{CandidateKind, FiredKey};

    #[test]
    fn test_memory_store_starts_empty() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_keeps_last_save() {
        let mut store = MemoryStore::new();
        let fired: FiredSet = [FiredKey::new(CandidateKind::Subtask, "s1")].into_iter().collect();
        store.save(&fired).unwrap();
        assert_eq!(store.load().unwrap(), fired);
    }

    #[test]
    fn test_seeded_memory_store() {
        let fired: FiredSet = [FiredKey::new(CandidateKind::MainTask, "t1")].into_iter().collect();
        let store = MemoryStore::with_fired(fired.clone());
        assert_eq!(store.load().unwrap(), fired);
    }
}
