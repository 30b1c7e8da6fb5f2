//! Data-driven game balance
//!
//! Every curve here is a pure function of the level number (1-based).
//! Values are loaded as part of [`crate::Settings`], so a JSON file can
//! retune a run without touching code.

use serde::{Deserialize, Serialize};

/// Relative spawn weights for the three enemy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyWeights {
    pub melee: u32,
    pub shooter: u32,
    pub thrower: u32,
}

impl EnemyWeights {
    pub fn total(&self) -> u32 {
        self.melee + self.shooter + self.thrower
    }
}

/// Balance constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Level-1 enemy hit points
    pub base_enemy_hp: f64,
    /// Multiplicative HP growth per level
    pub enemy_hp_growth: f64,
    /// Boss HP as a multiple of the same level's enemy HP
    pub boss_hp_factor: u32,

    /// Level-1 enemy speed (pixels per 60 Hz frame)
    pub base_enemy_speed: f32,
    /// Additive speed growth per level
    pub enemy_speed_growth: f32,
    /// Enemy speed ceiling
    pub max_enemy_speed: f32,

    /// Level-1 delay between spawns (ms)
    pub base_spawn_interval_ms: u32,
    /// Interval reduction per level (ms)
    pub spawn_interval_decay_ms: u32,
    /// Interval floor (ms)
    pub min_spawn_interval_ms: u32,

    /// Level-1 type weights; shooters/throwers gain weight each level
    pub base_weights: EnemyWeights,
    pub melee_weight_decay: u32,
    pub min_melee_weight: u32,
    pub shooter_weight_growth: u32,
    pub thrower_weight_growth: u32,

    /// First level with the companion pet active
    pub pet_unlock_level: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_enemy_hp: 30.0,
            enemy_hp_growth: 1.15,
            boss_hp_factor: 8,

            base_enemy_speed: 1.2,
            enemy_speed_growth: 0.25,
            max_enemy_speed: 3.5,

            base_spawn_interval_ms: 1400,
            spawn_interval_decay_ms: 110,
            min_spawn_interval_ms: 450,

            base_weights: EnemyWeights {
                melee: 70,
                shooter: 20,
                thrower: 10,
            },
            melee_weight_decay: 5,
            min_melee_weight: 25,
            shooter_weight_growth: 3,
            thrower_weight_growth: 2,

            pet_unlock_level: 2,
        }
    }
}

impl Tuning {
    /// Enemy hit points for a level, rounded
    pub fn enemy_hp(&self, level: u32) -> u32 {
        let steps = level.max(1) - 1;
        (self.base_enemy_hp * self.enemy_hp_growth.powi(steps as i32))
            .round()
            .max(1.0) as u32
    }

    /// Boss hit points for a level
    pub fn boss_hp(&self, level: u32) -> u32 {
        self.enemy_hp(level) * self.boss_hp_factor
    }

    /// Enemy speed in pixels per 60 Hz frame, clamped to the ceiling
    pub fn enemy_speed(&self, level: u32) -> f32 {
        let steps = (level.max(1) - 1) as f32;
        (self.base_enemy_speed + self.enemy_speed_growth * steps).min(self.max_enemy_speed)
    }

    /// Delay between spawns in milliseconds, clamped to the floor
    pub fn spawn_interval_ms(&self, level: u32) -> u32 {
        let steps = level.max(1) - 1;
        self.base_spawn_interval_ms
            .saturating_sub(self.spawn_interval_decay_ms.saturating_mul(steps))
            .max(self.min_spawn_interval_ms)
    }

    /// Weights for {melee, shooter, thrower}; never sums to zero
    pub fn enemy_type_weights(&self, level: u32) -> EnemyWeights {
        let steps = level.max(1) - 1;
        let base = self.base_weights;
        let melee = base
            .melee
            .saturating_sub(self.melee_weight_decay * steps)
            .max(self.min_melee_weight);
        let weights = EnemyWeights {
            melee,
            shooter: base.shooter + self.shooter_weight_growth * steps,
            thrower: base.thrower + self.thrower_weight_growth * steps,
        };
        if weights.total() == 0 {
            // A zeroed config still has to produce something
            EnemyWeights {
                melee: 1,
                shooter: 0,
                thrower: 0,
            }
        } else {
            weights
        }
    }
}
