//! Persistence layer.
//!
//! Saves and loads the learning aggregate (`BobMemory`) to/from a JSON
//! file. Writes go to a sibling temp file which is synced and then renamed
//! over the target, so a crash mid-save never leaves a torn memory file.
//!
//! `MemoryManager` owns the in-process aggregate. A failed read or write
//! switches it to memory-only mode for the rest of the run instead of
//! surfacing errors into the decision path.

pub mod bounded;
pub mod export;
pub mod memory;

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::learning::experience::LearnedAdjustment;
use crate::types::{BobError, SessionResult};
pub use memory::{BobMemory, LearningEffectiveness, StrategyAdjustment};

/// Default memory file path.
pub const DEFAULT_MEMORY_FILE: &str = "bob_memory.json";

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Durable backing store for the memory aggregate.
#[cfg_attr(test, mockall::automock)]
pub trait MemoryStore: Send + Sync {
    /// Load the saved memory. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> Result<Option<BobMemory>>;

    /// Persist the full aggregate atomically.
    fn save(&self, memory: &BobMemory) -> Result<()>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// JSON file store with write-then-rename saves.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_MEMORY_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Delete the memory file (for testing or reset).
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete memory file {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl MemoryStore for JsonFileStore {
    fn load(&self) -> Result<Option<BobMemory>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved memory found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read memory from {}", self.path.display()))?;
        let memory: BobMemory = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse memory from {}", self.path.display()))?;
        if !memory::is_compatible(&memory.version) {
            return Err(BobError::Storage(format!(
                "memory file {} has unsupported version {}",
                self.path.display(),
                memory.version
            ))
            .into());
        }

        info!(
            path = %self.path.display(),
            version = %memory.version,
            sessions = memory.counters.total_sessions,
            opponents = memory.opponents.len(),
            hands = memory.experience.hands().len(),
            "Memory loaded from disk"
        );
        Ok(Some(memory))
    }

    fn save(&self, memory: &BobMemory) -> Result<()> {
        let json = serde_json::to_string_pretty(memory).context("Failed to serialise memory")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)
                .with_context(|| format!("Failed to create temp file {}", tmp.display()))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("Failed to write temp file {}", tmp.display()))?;
            file.sync_all()
                .with_context(|| format!("Failed to sync temp file {}", tmp.display()))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Memory saved");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Exclusive owner of the learning aggregate and its persistence.
pub struct MemoryManager {
    store: Box<dyn MemoryStore>,
    memory: BobMemory,
    memory_only: bool,
}

impl MemoryManager {
    /// Load from the store. A missing file yields fresh memory; an unreadable
    /// one yields fresh memory in memory-only mode so the bad file is left
    /// untouched for inspection.
    pub fn open(store: Box<dyn MemoryStore>) -> Self {
        let (memory, memory_only) = match store.load() {
            Ok(Some(memory)) => (memory, false),
            Ok(None) => (BobMemory::new(), false),
            Err(e) => {
                error!(
                    location = %store.location(),
                    error = %format!("{e:#}"),
                    "Failed to load memory, continuing in memory-only mode"
                );
                (BobMemory::new(), true)
            }
        };
        Self { store, memory, memory_only }
    }

    /// In-memory manager that never touches disk.
    pub fn ephemeral() -> Self {
        Self {
            store: Box::new(NullStore),
            memory: BobMemory::new(),
            memory_only: true,
        }
    }

    pub fn memory(&self) -> &BobMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut BobMemory {
        &mut self.memory
    }

    pub fn is_memory_only(&self) -> bool {
        self.memory_only
    }

    /// Save now, propagating any error. Skipped in memory-only mode.
    pub fn save(&mut self) -> Result<()> {
        if self.memory_only {
            debug!("Memory-only mode, skipping save");
            return Ok(());
        }
        self.memory.counters.last_updated = Utc::now();
        self.store.save(&self.memory)
    }

    /// Save, logging and degrading to memory-only mode on failure.
    /// Returns whether the memory is durably stored.
    pub fn persist(&mut self) -> bool {
        if self.memory_only {
            return false;
        }
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                error!(
                    location = %self.store.location(),
                    error = %format!("{e:#}"),
                    "Failed to save memory, continuing in memory-only mode"
                );
                self.memory_only = true;
                false
            }
        }
    }

    /// Fold a completed session into counters and performance history.
    pub fn record_session_metrics(&mut self, session: &SessionResult, rolling_win_rate: f64) {
        let c = &mut self.memory.counters;
        c.total_sessions += 1;
        c.total_hands += u64::from(session.hands_played);
        if session.is_win() {
            c.sessions_won += 1;
        }
        c.total_profit += session.net_profit;
        self.memory.performance.record(session, rolling_win_rate);
    }

    /// Append derived adjustments to the capped audit log.
    pub fn log_adjustments(&mut self, session_id: &str, adjustments: &[LearnedAdjustment]) {
        let now = Utc::now();
        for learned in adjustments {
            self.memory.strategy_adjustments.push(StrategyAdjustment {
                timestamp: now,
                session_id: session_id.to_string(),
                learned: learned.clone(),
            });
        }
        if !adjustments.is_empty() {
            debug!(count = adjustments.len(), session_id, "Strategy adjustments logged");
        }
    }

    pub fn learning_effectiveness(&self) -> Option<LearningEffectiveness> {
        self.memory.learning_effectiveness()
    }
}

/// Store used by ephemeral managers, which are memory-only and never save.
struct NullStore;

impl MemoryStore for NullStore {
    fn load(&self) -> Result<Option<BobMemory>> {
        Ok(None)
    }

    fn save(&self, _memory: &BobMemory) -> Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ActionCounts, OpponentSessionData, PatternObservations};

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("bob_test_memory_{}.json", uuid::Uuid::new_v4()));
        p
    }

    fn make_session(rank: u32, profit: f64) -> SessionResult {
        SessionResult {
            session_id: uuid::Uuid::new_v4().to_string(),
            final_rank: rank,
            total_players: 3,
            final_chips: 1000.0 + profit,
            hands_won: 3,
            hands_played: 8,
            net_profit: profit,
            payout: 0.0,
            opponents: vec![OpponentSessionData {
                wallet: "0xfeed".into(),
                final_rank: 2,
                final_chips: 700.0,
                avg_bet: 30.0,
                hands_played: 8,
                actions: ActionCounts { hits: 3, stands: 3, doubles: 1, splits: 1 },
                patterns: PatternObservations::default(),
            }],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let store = JsonFileStore::new(&path);
        let mut memory = BobMemory::new();
        memory.counters.total_sessions = 42;
        memory.opponents.update_from_session(&make_session(1, 10.0));

        store.save(&memory).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.counters.total_sessions, 42);
        assert_eq!(loaded.opponents.len(), 1);
        assert!(!store.temp_path().exists());

        store.delete().unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let store = JsonFileStore::new(temp_path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_file_errors() {
        let path = temp_path();
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.load().is_err());
        store.delete().unwrap();
    }

    #[test]
    fn test_load_rejects_future_version() {
        let path = temp_path();
        let store = JsonFileStore::new(&path);
        let mut memory = BobMemory::new();
        memory.version = "2.0".to_string();
        store.save(&memory).unwrap();
        let err = store.load().unwrap_err();
        assert!(format!("{err:#}").contains("unsupported version"));
        store.delete().unwrap();
    }

    #[test]
    fn test_save_overwrites_existing() {
        let path = temp_path();
        let store = JsonFileStore::new(&path);
        let mut memory = BobMemory::new();
        store.save(&memory).unwrap();
        memory.counters.total_hands = 99;
        store.save(&memory).unwrap();
        assert_eq!(store.load().unwrap().unwrap().counters.total_hands, 99);
        store.delete().unwrap();
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        assert!(JsonFileStore::new(temp_path()).delete().is_ok());
    }

    #[test]
    fn test_manager_fresh_when_missing() {
        let mut store = MockMemoryStore::new();
        store.expect_load().times(1).returning(|| Ok(None));
        store.expect_save().times(1).returning(|_| Ok(()));
        let mut manager = MemoryManager::open(Box::new(store));
        assert!(!manager.is_memory_only());
        assert_eq!(manager.memory().counters.total_sessions, 0);
        assert!(manager.persist());
    }

    #[test]
    fn test_manager_load_failure_goes_memory_only() {
        let mut store = MockMemoryStore::new();
        store.expect_load().returning(|| Err(anyhow::anyhow!("disk on fire")));
        store.expect_location().returning(|| "mock".to_string());
        store.expect_save().never();
        let mut manager = MemoryManager::open(Box::new(store));
        assert!(manager.is_memory_only());
        assert!(!manager.persist());
        assert!(manager.save().is_ok());
    }

    #[test]
    fn test_manager_save_failure_degrades_once() {
        let mut store = MockMemoryStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_location().returning(|| "mock".to_string());
        store
            .expect_save()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("read-only filesystem")));
        let mut manager = MemoryManager::open(Box::new(store));

        assert!(!manager.persist());
        assert!(manager.is_memory_only());
        // Subsequent saves are skipped, the mock would panic on a second call
        assert!(!manager.persist());
    }

    #[test]
    fn test_ephemeral_manager_never_saves() {
        let mut manager = MemoryManager::ephemeral();
        assert!(manager.is_memory_only());
        assert!(!manager.persist());
        assert!(manager.save().is_ok());
        assert_eq!(manager.memory().counters.total_sessions, 0);
    }

    #[test]
    fn test_manager_records_session_metrics() {
        let mut manager = MemoryManager::ephemeral();
        manager.record_session_metrics(&make_session(1, 120.0), 1.0);
        manager.record_session_metrics(&make_session(3, -40.0), 0.5);

        let c = &manager.memory().counters;
        assert_eq!(c.total_sessions, 2);
        assert_eq!(c.total_hands, 16);
        assert_eq!(c.sessions_won, 1);
        assert!((c.total_profit - 80.0).abs() < 1e-9);
        assert_eq!(manager.memory().performance.len(), 2);
    }

    #[test]
    fn test_adjustment_log_capped() {
        let mut manager = MemoryManager::ephemeral();
        let learned = LearnedAdjustment {
            player_total: 12,
            dealer_upcard: 2,
            action: Action::Stand,
            adjustment: -0.1,
            samples: 8,
        };
        for i in 0..60 {
            manager.log_adjustments(&format!("s{i}"), std::slice::from_ref(&learned));
        }
        let log = &manager.memory().strategy_adjustments;
        assert_eq!(log.len(), memory::MAX_STRATEGY_ADJUSTMENTS);
        assert_eq!(log.iter().next().unwrap().session_id, "s10");
    }
}
