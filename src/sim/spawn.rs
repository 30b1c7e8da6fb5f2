//! Spawn director: paces enemy creation for one level
//!
//! `Idle -> Spawning -> Complete`. One enemy appears as soon as spawning
//! starts, then one per interval until the level's kill target worth of
//! enemies exists. Completion only says "everything has been spawned"; the
//! boss is gated on kills, not on this.

use std::rc::Rc;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::entity::{Enemy, EnemyKind};
use super::state::IdAllocator;
use crate::clamp_to_world;
use crate::consts::*;
use crate::tuning::{EnemyWeights, Tuning};

/// Returns true when a world point is not walkable
pub type ObstructionFn = Rc<dyn Fn(f32, f32) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPhase {
    Idle,
    Spawning,
    Complete,
}

/// Everything the director touches while spawning
pub struct SpawnEnv<'a> {
    pub tuning: &'a Tuning,
    /// Centre of the active viewport (follows the player)
    pub view_center: Vec2,
    pub viewport: Vec2,
    pub rng: &'a mut Pcg32,
    pub ids: &'a mut IdAllocator,
    pub enemies: &'a mut Vec<Enemy>,
}

pub struct SpawnDirector {
    phase: SpawnPhase,
    level: u32,
    spawned: u32,
    kill_target: u32,
    /// Seconds between spawns for the current level
    interval: f32,
    /// Seconds accumulated toward the next spawn
    timer: f32,
    obstruction: Option<ObstructionFn>,
}

impl std::fmt::Debug for SpawnDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnDirector")
            .field("phase", &self.phase)
            .field("level", &self.level)
            .field("spawned", &self.spawned)
            .field("interval", &self.interval)
            .field("timer", &self.timer)
            .finish()
    }
}

impl Default for SpawnDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl SpawnDirector {
    pub fn new() -> Self {
        Self {
            phase: SpawnPhase::Idle,
            level: 1,
            spawned: 0,
            kill_target: KILL_TARGET,
            interval: 0.0,
            timer: 0.0,
            obstruction: None,
        }
    }

    /// Install or clear the walkability check used during placement
    pub fn set_obstruction(&mut self, obstruction: Option<ObstructionFn>) {
        self.obstruction = obstruction;
    }

    pub fn phase(&self) -> SpawnPhase {
        self.phase
    }

    pub fn spawned_count(&self) -> u32 {
        self.spawned
    }

    pub fn is_spawning(&self) -> bool {
        self.phase == SpawnPhase::Spawning
    }

    pub fn is_spawn_complete(&self) -> bool {
        self.phase == SpawnPhase::Complete
    }

    /// Reset for `level` and spawn the first enemy right away.
    /// Returns true if that already completed the level's quota.
    pub fn start_spawning(&mut self, level: u32, env: &mut SpawnEnv<'_>) -> bool {
        self.level = level.max(1);
        self.spawned = 0;
        self.timer = 0.0;
        self.interval = env.tuning.spawn_interval_ms(self.level) as f32 / 1000.0;
        self.phase = SpawnPhase::Spawning;
        log::debug!(
            "Spawning level {} every {:.2}s (target {})",
            self.level,
            self.interval,
            self.kill_target
        );
        self.spawn_one(env)
    }

    /// Stop the timer. Safe to call repeatedly.
    pub fn stop_spawning(&mut self) {
        if self.phase == SpawnPhase::Spawning {
            self.phase = SpawnPhase::Idle;
        }
        self.timer = 0.0;
    }

    /// Drop all progress, including a completed quota
    pub fn reset(&mut self) {
        self.phase = SpawnPhase::Idle;
        self.spawned = 0;
        self.timer = 0.0;
    }

    /// Advance the spawn timer. Returns true on the frame spawning completes.
    pub fn update(&mut self, dt: f32, env: &mut SpawnEnv<'_>) -> bool {
        if self.phase != SpawnPhase::Spawning || self.interval <= 0.0 {
            return false;
        }
        self.timer += dt;
        while self.timer >= self.interval {
            self.timer -= self.interval;
            if self.spawn_one(env) {
                return true;
            }
        }
        false
    }

    fn spawn_one(&mut self, env: &mut SpawnEnv<'_>) -> bool {
        if self.spawned >= self.kill_target {
            return self.complete();
        }
        let weights = env.tuning.enemy_type_weights(self.level);
        let Some(kind) = sample_kind(&weights, env.rng) else {
            log::warn!("Empty enemy weight table at level {}, skipping spawn", self.level);
            return false;
        };
        let pos = self.place(env);
        let hp = env.tuning.enemy_hp(self.level) as f32;
        let speed = env.tuning.enemy_speed(self.level) * REFERENCE_FPS;
        env.enemies
            .push(Enemy::new(env.ids.next_id(), kind, pos, hp, speed));
        self.spawned += 1;

        if self.spawned >= self.kill_target {
            self.complete()
        } else {
            false
        }
    }

    fn complete(&mut self) -> bool {
        let newly = self.phase != SpawnPhase::Complete;
        self.phase = SpawnPhase::Complete;
        self.timer = 0.0;
        if newly {
            log::debug!("Level {} spawn quota reached ({})", self.level, self.spawned);
        }
        newly
    }

    /// Pick a point just outside a random viewport edge. Retries while the
    /// obstruction check rejects it, then settles for the last attempt.
    fn place(&self, env: &mut SpawnEnv<'_>) -> Vec2 {
        let mut candidate = edge_point(env.view_center, env.viewport, env.rng);
        let Some(blocked) = &self.obstruction else {
            return candidate;
        };
        for attempt in 1..=SPAWN_PLACEMENT_ATTEMPTS {
            if !blocked(candidate.x, candidate.y) {
                return candidate;
            }
            if attempt < SPAWN_PLACEMENT_ATTEMPTS {
                candidate = edge_point(env.view_center, env.viewport, env.rng);
            }
        }
        candidate
    }
}

fn edge_point(center: Vec2, viewport: Vec2, rng: &mut Pcg32) -> Vec2 {
    let half = viewport * 0.5;
    let along_x = rng.random_range(-half.x..=half.x);
    let along_y = rng.random_range(-half.y..=half.y);
    let raw = match rng.random_range(0..4u8) {
        0 => Vec2::new(center.x + along_x, center.y - half.y - SPAWN_EDGE_MARGIN),
        1 => Vec2::new(center.x + along_x, center.y + half.y + SPAWN_EDGE_MARGIN),
        2 => Vec2::new(center.x - half.x - SPAWN_EDGE_MARGIN, center.y + along_y),
        _ => Vec2::new(center.x + half.x + SPAWN_EDGE_MARGIN, center.y + along_y),
    };
    clamp_to_world(raw, ENEMY_RADIUS)
}

/// Weighted pick over the three variants; `None` for an all-zero table
pub fn sample_kind(weights: &EnemyWeights, rng: &mut Pcg32) -> Option<EnemyKind> {
    let total = weights.total();
    if total == 0 {
        return None;
    }
    let mut roll = rng.random_range(0..total);
    for (kind, weight) in [
        (EnemyKind::Melee, weights.melee),
        (EnemyKind::Shooter, weights.shooter),
        (EnemyKind::Thrower, weights.thrower),
    ] {
        if roll < weight {
            return Some(kind);
        }
        roll -= weight;
    }
    None
}
