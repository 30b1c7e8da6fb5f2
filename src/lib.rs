//! Wave Arena - top-down wave survival simulation
//!
//! Core modules:
//! - `sim`: Simulation core (entities, spawning, weapons, collisions, progression)
//! - `persistence`: Save record with default-merge loading
//! - `settings`: Host configuration (viewport, seed, storage)
//! - `tuning`: Data-driven game balance

pub mod persistence;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use persistence::{ProgressPatch, SaveRecord, SaveStore};
pub use settings::Settings;
pub use sim::{Command, GameEvent, Simulation, Snapshot, TickInput};
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// World dimensions (pixels)
    pub const WORLD_WIDTH: f32 = 3200.0;
    pub const WORLD_HEIGHT: f32 = 3200.0;

    /// Reference frame rate that per-frame speeds are expressed in
    pub const REFERENCE_FPS: f32 = 60.0;
    /// Longest single integration step (seconds)
    pub const MAX_STEP_DT: f32 = 1.0 / 30.0;
    /// Cap on steps per host tick; longer frames lose the excess time
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Player defaults
    pub const PLAYER_RADIUS: f32 = 16.0;
    pub const PLAYER_MAX_HP: f32 = 100.0;
    /// Player movement speed (pixels/s)
    pub const PLAYER_SPEED: f32 = 220.0;

    /// Enemy collision radius
    pub const ENEMY_RADIUS: f32 = 14.0;
    /// Boss collision radius
    pub const BOSS_RADIUS: f32 = 40.0;

    /// Contact rules
    pub const ENEMY_CONTACT_DAMAGE: f32 = 5.0;
    pub const BOSS_CONTACT_DAMAGE: f32 = 25.0;
    /// Seconds between two boss contact hits on the player
    pub const BOSS_CONTACT_COOLDOWN: f32 = 0.65;
    /// Distance the player is pushed away from the boss on contact
    pub const BOSS_KNOCKBACK: f32 = 40.0;
    /// Per-target weapon hit cooldown (seconds), shared by all melee weapons
    pub const HIT_COOLDOWN: f32 = 0.1;

    /// Progression rules
    pub const KILL_TARGET: u32 = 100;
    pub const KILLS_PER_UPGRADE: u32 = 5;
    pub const FINAL_LEVEL: u32 = 10;
    pub const ENEMY_KILL_SCORE: u64 = 10;
    pub const BOSS_KILL_BONUS: u64 = 100;

    /// Orbit weapon defaults and cap
    pub const MAX_WEAPON_COUNT: u32 = 6;
    pub const ORBIT_BASE_DAMAGE: f32 = 12.0;
    pub const ORBIT_BASE_RANGE: f32 = 70.0;
    /// Radians per second
    pub const ORBIT_BASE_ROTATION_SPEED: f32 = 3.0;
    pub const ORBIT_WEAPON_WIDTH: f32 = 10.0;

    /// Spawn placement
    pub const SPAWN_PLACEMENT_ATTEMPTS: u32 = 12;
    /// Distance outside the viewport edge at which enemies appear
    pub const SPAWN_EDGE_MARGIN: f32 = 48.0;

    /// Boss appears this far above the player
    pub const BOSS_SPAWN_OFFSET: f32 = 260.0;

    /// Projectiles beyond the world bounds by this margin are removed
    pub const WORLD_EXIT_MARGIN: f32 = 64.0;
    /// Maximum live player projectiles (gun + pet)
    pub const MAX_PLAYER_PROJECTILES: usize = 96;

    /// Residual field must overlap the player by this slack to tick
    pub const FIELD_TOUCH_SLACK: f32 = 1.0;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Clamp a point into the world rectangle, keeping `radius` clear of the edges
#[inline]
pub fn clamp_to_world(pos: Vec2, radius: f32) -> Vec2 {
    Vec2::new(
        pos.x.clamp(radius, consts::WORLD_WIDTH - radius),
        pos.y.clamp(radius, consts::WORLD_HEIGHT - radius),
    )
}

/// True when `pos` lies outside the world rectangle by more than `margin`
#[inline]
pub fn outside_world(pos: Vec2, margin: f32) -> bool {
    pos.x < -margin
        || pos.y < -margin
        || pos.x > consts::WORLD_WIDTH + margin
        || pos.y > consts::WORLD_HEIGHT + margin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_to_world() {
        let p = clamp_to_world(Vec2::new(-50.0, consts::WORLD_HEIGHT + 10.0), 16.0);
        assert_eq!(p, Vec2::new(16.0, consts::WORLD_HEIGHT - 16.0));
    }

    #[test]
    fn test_outside_world_margin() {
        assert!(!outside_world(Vec2::new(-10.0, 5.0), 64.0));
        assert!(outside_world(Vec2::new(-65.0, 5.0), 64.0));
    }
}
