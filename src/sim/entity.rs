//! Combat entities: player, enemies, boss
//!
//! Entities own their attributes and damage/death transitions. They never
//! hold references to each other; cross-entity effects are resolved by the
//! collision and progression stages.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::weapons::GunKind;
use crate::clamp_to_world;
use crate::consts::*;

/// Stable identity handed out by the world's id allocator.
/// Used as the key for per-target hit cooldowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Hit points with the `0 <= current <= max` invariant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage, clamping at zero. Returns true only on the hit that
    /// takes a living owner to zero, so a death is reported exactly once.
    pub fn damage(&mut self, amount: f32) -> bool {
        if amount <= 0.0 || self.is_depleted() {
            return false;
        }
        self.current = (self.current - amount).max(0.0);
        debug_assert!(self.current >= 0.0 && self.current <= self.max);
        self.is_depleted()
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    pub fn restore(&mut self) {
        self.current = self.max;
    }
}

/// The player character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub radius: f32,
    pub health: Health,
    /// Movement speed (pixels/s)
    pub speed: f32,
    /// Equipped ranged weapon
    pub gun: GunKind,
    pub dual_wield: bool,
    pub gun_damage_mul: f32,
    pub gun_fire_rate_mul: f32,
    pub gun_range_mul: f32,
    /// Consecutive failed evolution rolls
    pub evolve_misses: u32,
    /// Seconds until the boss can hurt the player again
    pub boss_contact_cooldown: f32,
}

impl Player {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            radius: PLAYER_RADIUS,
            health: Health::full(PLAYER_MAX_HP),
            speed: PLAYER_SPEED,
            gun: GunKind::default(),
            dual_wield: false,
            gun_damage_mul: 1.0,
            gun_fire_rate_mul: 1.0,
            gun_range_mul: 1.0,
            evolve_misses: 0,
            boss_contact_cooldown: 0.0,
        }
    }

    /// Move along a movement vector (magnitude 0 or 1) and stay in bounds
    pub fn move_by(&mut self, movement: Vec2, dt: f32) {
        let dir = if movement.length_squared() > 1.0 {
            movement.normalize_or_zero()
        } else {
            movement
        };
        if dir == Vec2::ZERO {
            return;
        }
        self.pos = clamp_to_world(self.pos + dir * self.speed * dt, self.radius);
    }

    pub fn tick_cooldowns(&mut self, dt: f32) {
        self.boss_contact_cooldown = (self.boss_contact_cooldown - dt).max(0.0);
    }

    pub fn is_dead(&self) -> bool {
        self.health.is_depleted()
    }
}

/// Enemy variant. Purely cosmetic plus spawn weighting: every variant
/// chases the player and deals contact damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Melee,
    Shooter,
    Thrower,
}

/// A chasing enemy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub radius: f32,
    pub health: Health,
    /// Pixels/s
    pub speed: f32,
    pub alive: bool,
}

impl Enemy {
    pub fn new(id: EntityId, kind: EnemyKind, pos: Vec2, hp: f32, speed: f32) -> Self {
        Self {
            id,
            kind,
            pos,
            radius: ENEMY_RADIUS,
            health: Health::full(hp),
            speed,
            alive: true,
        }
    }

    /// Step toward the target
    pub fn chase(&mut self, target: Vec2, dt: f32) {
        let to_target = target - self.pos;
        let dist = to_target.length();
        if dist <= f32::EPSILON {
            return;
        }
        let step = (self.speed * dt).min(dist);
        self.pos += to_target / dist * step;
    }

    /// Mark dead. Returns false if it was already dead.
    pub fn kill(&mut self) -> bool {
        if self.alive {
            self.alive = false;
            true
        } else {
            false
        }
    }
}

/// Boss bullet tuning
pub const BOSS_SHOOT_INTERVAL: f32 = 1.6;
pub const BOSS_BULLET_SPEED: f32 = 260.0;
pub const BOSS_BULLET_DAMAGE: f32 = 10.0;
pub const BOSS_BULLET_RANGE: f32 = 900.0;
pub const BOSS_BULLET_RADIUS: f32 = 6.0;
/// Every n-th boss shot is a thrown impact projectile
pub const BOSS_THROW_EVERY: u32 = 3;
pub const BOSS_THROW_SPEED: f32 = 200.0;
pub const BOSS_THROW_DAMAGE: f32 = 8.0;
pub const BOSS_THROW_RADIUS: f32 = 8.0;
/// Boss moves at this fraction of the level's enemy speed
pub const BOSS_SPEED_FACTOR: f32 = 0.6;
/// Seconds between cosmetic taunts
pub const BOSS_TAUNT_INTERVAL: f32 = 6.0;

/// What the boss decided to do this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BossAttack {
    /// Straight bullet along `dir`
    Shoot { dir: Vec2 },
    /// Lobbed projectile landing at `target`
    Throw { target: Vec2 },
}

/// The level boss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boss {
    pub id: EntityId,
    pub level: u32,
    pub pos: Vec2,
    pub radius: f32,
    pub health: Health,
    /// Pixels/s
    pub speed: f32,
    pub shoot_cooldown: f32,
    pub shots_fired: u32,
    pub taunt_timer: f32,
}

impl Boss {
    pub fn new(id: EntityId, level: u32, pos: Vec2, hp: f32, speed: f32) -> Self {
        Self {
            id,
            level,
            pos: clamp_to_world(pos, BOSS_RADIUS),
            radius: BOSS_RADIUS,
            health: Health::full(hp),
            speed,
            shoot_cooldown: BOSS_SHOOT_INTERVAL,
            shots_fired: 0,
            taunt_timer: BOSS_TAUNT_INTERVAL,
        }
    }

    /// Chase the player, run timers, and pick an attack when the shot is ready.
    /// Returns the attack (if any) and whether a taunt fired.
    pub fn update(&mut self, player_pos: Vec2, dt: f32) -> (Option<BossAttack>, bool) {
        let to_player = player_pos - self.pos;
        let dist = to_player.length();
        if dist > f32::EPSILON {
            let step = (self.speed * dt).min(dist);
            self.pos = clamp_to_world(self.pos + to_player / dist * step, self.radius);
        }

        self.taunt_timer = (self.taunt_timer - dt).max(0.0);
        let taunt = self.taunt_timer <= 0.0;
        if taunt {
            self.taunt_timer = BOSS_TAUNT_INTERVAL;
        }

        self.shoot_cooldown = (self.shoot_cooldown - dt).max(0.0);
        if self.shoot_cooldown > 0.0 || dist <= f32::EPSILON {
            return (None, taunt);
        }
        self.shoot_cooldown = BOSS_SHOOT_INTERVAL;
        self.shots_fired += 1;
        let attack = if self.shots_fired % BOSS_THROW_EVERY == 0 {
            BossAttack::Throw { target: player_pos }
        } else {
            BossAttack::Shoot {
                dir: to_player / dist,
            }
        };
        (Some(attack), taunt)
    }

    pub fn is_dead(&self) -> bool {
        self.health.is_depleted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_reports_death_once() {
        let mut h = Health::full(10.0);
        assert!(!h.damage(4.0));
        assert!(h.damage(20.0));
        assert_eq!(h.current, 0.0);
        // Already dead: no second death report, no negative HP
        assert!(!h.damage(5.0));
        assert_eq!(h.current, 0.0);
    }

    #[test]
    fn test_player_diagonal_input_is_normalized() {
        let mut p = Player::new(Vec2::new(500.0, 500.0));
        p.move_by(Vec2::new(1.0, 1.0), 1.0);
        let moved = (p.pos - Vec2::new(500.0, 500.0)).length();
        assert!((moved - PLAYER_SPEED).abs() < 0.01);
    }

    #[test]
    fn test_player_clamped_to_world() {
        let mut p = Player::new(Vec2::new(20.0, 20.0));
        p.move_by(Vec2::new(-1.0, 0.0), 1.0);
        assert_eq!(p.pos.x, PLAYER_RADIUS);
    }

    #[test]
    fn test_enemy_chase_does_not_overshoot() {
        let mut e = Enemy::new(EntityId(1), EnemyKind::Melee, Vec2::ZERO, 30.0, 1000.0);
        e.chase(Vec2::new(10.0, 0.0), 1.0);
        assert_eq!(e.pos, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_enemy_kill_once() {
        let mut e = Enemy::new(EntityId(1), EnemyKind::Thrower, Vec2::ZERO, 30.0, 10.0);
        assert!(e.kill());
        assert!(!e.kill());
    }

    #[test]
    fn test_boss_every_third_shot_is_thrown() {
        let mut boss = Boss::new(EntityId(7), 1, Vec2::new(500.0, 500.0), 240.0, 0.0);
        let player = Vec2::new(500.0, 800.0);
        let mut attacks = Vec::new();
        for _ in 0..3 {
            let (attack, _) = boss.update(player, BOSS_SHOOT_INTERVAL);
            attacks.push(attack.unwrap());
        }
        assert!(matches!(attacks[0], BossAttack::Shoot { .. }));
        assert!(matches!(attacks[1], BossAttack::Shoot { .. }));
        assert_eq!(attacks[2], BossAttack::Throw { target: player });
    }
}
