//! Save/load persistence
//!
//! Features:
//! - Single JSON record under one key
//! - Default-merge on load: fields missing from older saves take baseline values
//! - Partial progress patches that never lower the high score
//! - Failures are logged and swallowed; a lost save never stops the game

mod storage;

pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Storage key used when settings do not override it
pub const DEFAULT_SAVE_KEY: &str = "wave_arena_save";

/// Persisted progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveRecord {
    pub current_level: u32,
    pub high_score: u64,
    pub player_level: u32,
    pub gun_key: String,
    pub gun_damage_mul: f32,
    pub gun_fire_rate_mul: f32,
    pub gun_range_mul: f32,
    pub evolve_misses: u32,
    pub dual_wield: bool,
    pub weapon_damage: f32,
    pub weapon_range: f32,
    pub weapon_rotation_speed: f32,
    pub weapon_count: u32,
}

impl Default for SaveRecord {
    fn default() -> Self {
        Self {
            current_level: 1,
            high_score: 0,
            player_level: 1,
            gun_key: "pistol".to_string(),
            gun_damage_mul: 1.0,
            gun_fire_rate_mul: 1.0,
            gun_range_mul: 1.0,
            evolve_misses: 0,
            dual_wield: false,
            weapon_damage: ORBIT_BASE_DAMAGE,
            weapon_range: ORBIT_BASE_RANGE,
            weapon_rotation_speed: ORBIT_BASE_ROTATION_SPEED,
            weapon_count: 1,
        }
    }
}

/// Partial update applied on top of the stored record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPatch {
    pub current_level: Option<u32>,
    /// Run score; raises `high_score` if larger
    pub score: Option<u64>,
    pub player_level: Option<u32>,
    pub gun_key: Option<String>,
    pub gun_damage_mul: Option<f32>,
    pub gun_fire_rate_mul: Option<f32>,
    pub gun_range_mul: Option<f32>,
    pub evolve_misses: Option<u32>,
    pub dual_wield: Option<bool>,
    pub weapon_damage: Option<f32>,
    pub weapon_range: Option<f32>,
    pub weapon_rotation_speed: Option<f32>,
    pub weapon_count: Option<u32>,
}

impl SaveRecord {
    /// Overlay the fields a patch carries; everything else is kept
    pub fn merge(&mut self, patch: &ProgressPatch) {
        if let Some(v) = patch.current_level {
            self.current_level = v;
        }
        if let Some(score) = patch.score {
            self.high_score = self.high_score.max(score);
        }
        if let Some(v) = patch.player_level {
            self.player_level = v;
        }
        if let Some(v) = &patch.gun_key {
            self.gun_key = v.clone();
        }
        if let Some(v) = patch.gun_damage_mul {
            self.gun_damage_mul = v;
        }
        if let Some(v) = patch.gun_fire_rate_mul {
            self.gun_fire_rate_mul = v;
        }
        if let Some(v) = patch.gun_range_mul {
            self.gun_range_mul = v;
        }
        if let Some(v) = patch.evolve_misses {
            self.evolve_misses = v;
        }
        if let Some(v) = patch.dual_wield {
            self.dual_wield = v;
        }
        if let Some(v) = patch.weapon_damage {
            self.weapon_damage = v;
        }
        if let Some(v) = patch.weapon_range {
            self.weapon_range = v;
        }
        if let Some(v) = patch.weapon_rotation_speed {
            self.weapon_rotation_speed = v;
        }
        if let Some(v) = patch.weapon_count {
            self.weapon_count = v;
        }
    }

    /// Clamp values a hand-edited or stale save could get wrong
    pub fn sanitized(mut self) -> Self {
        self.current_level = self.current_level.clamp(1, FINAL_LEVEL);
        self.player_level = self.player_level.max(1);
        self.weapon_count = self.weapon_count.clamp(1, MAX_WEAPON_COUNT);
        self
    }
}

/// Save record bound to a storage backend and key
pub struct SaveStore {
    storage: Box<dyn Storage>,
    key: String,
}

impl std::fmt::Debug for SaveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveStore").field("key", &self.key).finish()
    }
}

impl SaveStore {
    pub fn new(storage: Box<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()), DEFAULT_SAVE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn try_load(&self) -> Result<Option<SaveRecord>, StorageError> {
        match self.storage.read(&self.key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Load the record, falling back to the baseline on any failure
    pub fn load(&self) -> SaveRecord {
        match self.try_load() {
            Ok(Some(record)) => {
                log::info!("Loaded save '{}' (level {})", self.key, record.current_level);
                record.sanitized()
            }
            Ok(None) => {
                log::info!("No save found under '{}', starting fresh", self.key);
                SaveRecord::default()
            }
            Err(e) => {
                log::warn!("Failed to load save '{}': {}; using defaults", self.key, e);
                SaveRecord::default()
            }
        }
    }

    pub fn try_save(&mut self, record: &SaveRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)?;
        self.storage.write(&self.key, &json)
    }

    /// Overwrite the stored record; failures are logged and dropped
    pub fn save(&mut self, record: &SaveRecord) {
        match self.try_save(record) {
            Ok(()) => log::debug!("Saved '{}'", self.key),
            Err(e) => log::warn!("Failed to save '{}': {}", self.key, e),
        }
    }

    /// Merge a patch into the stored record and write it back. An unreadable
    /// record is left alone so its high score and player power survive;
    /// returns the written record, or `None` when the write was skipped.
    pub fn save_progress(&mut self, patch: &ProgressPatch) -> Option<SaveRecord> {
        let mut record = match self.try_load() {
            Ok(Some(record)) => record.sanitized(),
            Ok(None) => SaveRecord::default(),
            Err(e) => {
                log::warn!("Skipping progress save for '{}': {}", self.key, e);
                return None;
            }
        };
        record.merge(patch);
        self.save(&record);
        Some(record)
    }
}
