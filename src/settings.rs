//! Host configuration
//!
//! Loaded once at startup from JSON. Missing fields take defaults, and a
//! missing or broken file means all defaults.

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::persistence::{DEFAULT_SAVE_KEY, SaveStore};
use crate::tuning::Tuning;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Viewport ===
    /// Visible area in world pixels; drives spawn edges and gun range
    pub viewport_width: f32,
    pub viewport_height: f32,

    // === Run ===
    /// RNG seed for spawning and weapon spread
    pub seed: u64,
    /// Honor `SkipLevel` and `KillAllEnemies`
    pub debug_commands: bool,

    // === Storage ===
    pub save_key: String,
    /// Directory for file saves (native). `None` keeps saves in memory.
    pub save_dir: Option<PathBuf>,

    // === Balance ===
    pub tuning: Tuning,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            viewport_width: 1280.0,
            viewport_height: 720.0,
            seed: 0x5eed,
            debug_commands: true,
            save_key: DEFAULT_SAVE_KEY.to_string(),
            save_dir: None,
            tuning: Tuning::default(),
        }
    }
}

impl Settings {
    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.viewport_width.max(1.0), self.viewport_height.max(1.0))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                log::info!("No settings at {} ({}), using defaults", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_json(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Invalid settings in {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save store for this configuration
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_store(&self) -> SaveStore {
        use crate::persistence::{FileStorage, MemoryStorage};

        match &self.save_dir {
            Some(dir) => SaveStore::new(Box::new(FileStorage::new(dir)), self.save_key.clone()),
            None => SaveStore::new(Box::new(MemoryStorage::new()), self.save_key.clone()),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn save_store(&self) -> SaveStore {
        use crate::persistence::LocalStorage;

        SaveStore::new(Box::new(LocalStorage), self.save_key.clone())
    }
}
