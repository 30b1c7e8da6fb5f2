//! Projectiles and residual damage fields

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::WORLD_EXIT_MARGIN;
use crate::outside_world;

/// Residual field left by a thrown projectile
pub const FIELD_RADIUS: f32 = 48.0;
pub const FIELD_LIFETIME: f32 = 3.0;
pub const FIELD_TICK_INTERVAL: f32 = 0.5;
pub const FIELD_TICK_DAMAGE: f32 = 4.0;

/// Projectile variants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Gun bullet fired by the player
    PlayerBullet,
    /// Explosive shell (pet and heavy gun shot), splashes on contact
    PlayerExplosive { blast_radius: f32 },
    /// Straight boss bullet
    BossBullet,
    /// Lobbed boss projectile; leaves a residual field on impact
    Thrown,
}

impl ProjectileKind {
    /// Hostile projectiles hurt the player; the rest hurt enemies and the boss
    pub fn is_hostile(&self) -> bool {
        matches!(self, ProjectileKind::BossBullet | ProjectileKind::Thrown)
    }
}

/// A moving projectile with a range measured from its spawn point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub pos: Vec2,
    /// Spawn point, for range checks
    pub origin: Vec2,
    /// Unit direction
    pub dir: Vec2,
    /// Pixels/s
    pub speed: f32,
    pub damage: f32,
    /// Maximum travel distance from `origin`
    pub range: f32,
    pub radius: f32,
    pub alive: bool,
}

impl Projectile {
    pub fn new(
        kind: ProjectileKind,
        origin: Vec2,
        dir: Vec2,
        speed: f32,
        damage: f32,
        range: f32,
        radius: f32,
    ) -> Self {
        Self {
            kind,
            pos: origin,
            origin,
            dir,
            speed,
            damage,
            range,
            radius,
            alive: true,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.pos += self.dir * self.speed * dt;
    }

    pub fn out_of_range(&self) -> bool {
        self.pos.distance_squared(self.origin) > self.range * self.range
    }

    pub fn out_of_world(&self) -> bool {
        outside_world(self.pos, WORLD_EXIT_MARGIN)
    }

    /// Where a thrown projectile comes down when it runs out of range
    pub fn landing_point(&self) -> Vec2 {
        self.origin + self.dir * self.range
    }
}

/// Move every projectile and retire the ones that left their range or the
/// world. Thrown projectiles that run out of range land and return their
/// impact point so the caller can place a residual field.
pub fn advance_projectiles(projectiles: &mut Vec<Projectile>, dt: f32) -> Vec<Vec2> {
    let mut impacts = Vec::new();
    for p in projectiles.iter_mut().filter(|p| p.alive) {
        p.advance(dt);
        if p.out_of_range() {
            p.alive = false;
            if p.kind == ProjectileKind::Thrown {
                impacts.push(p.landing_point());
            }
        } else if p.out_of_world() {
            p.alive = false;
        }
    }
    projectiles.retain(|p| p.alive);
    impacts
}

/// Timed area that periodically damages the player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualField {
    pub center: Vec2,
    pub radius: f32,
    /// Seconds left before the field disappears
    pub remaining: f32,
    pub tick_interval: f32,
    /// Seconds until the next damage tick
    pub tick_timer: f32,
    pub tick_damage: f32,
}

impl ResidualField {
    pub fn new(center: Vec2) -> Self {
        Self {
            center,
            radius: FIELD_RADIUS,
            remaining: FIELD_LIFETIME,
            tick_interval: FIELD_TICK_INTERVAL,
            tick_timer: FIELD_TICK_INTERVAL,
            tick_damage: FIELD_TICK_DAMAGE,
        }
    }

    /// Advance timers; returns how many damage ticks elapsed this frame
    pub fn update(&mut self, dt: f32) -> u32 {
        let live = dt.min(self.remaining);
        self.remaining = (self.remaining - dt).max(0.0);
        self.tick_timer -= live;
        let mut ticks = 0;
        while self.tick_timer <= 0.0 && self.tick_interval > 0.0 {
            ticks += 1;
            self.tick_timer += self.tick_interval;
        }
        self.tick_timer = self.tick_timer.max(0.0);
        ticks
    }

    pub fn expired(&self) -> bool {
        self.remaining <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(origin: Vec2, range: f32) -> Projectile {
        Projectile::new(
            ProjectileKind::PlayerBullet,
            origin,
            Vec2::X,
            100.0,
            5.0,
            range,
            4.0,
        )
    }

    #[test]
    fn test_projectile_removed_past_range() {
        let mut list = vec![bullet(Vec2::new(500.0, 500.0), 150.0)];
        advance_projectiles(&mut list, 1.0);
        assert_eq!(list.len(), 1);
        advance_projectiles(&mut list, 1.0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_projectile_removed_outside_world() {
        let mut list = vec![bullet(Vec2::new(crate::consts::WORLD_WIDTH, 500.0), 10_000.0)];
        advance_projectiles(&mut list, 1.0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_thrown_projectile_lands_at_range() {
        let mut p = bullet(Vec2::new(100.0, 100.0), 50.0);
        p.kind = ProjectileKind::Thrown;
        let mut list = vec![p];
        let impacts = advance_projectiles(&mut list, 1.0);
        assert!(list.is_empty());
        assert_eq!(impacts, vec![Vec2::new(150.0, 100.0)]);
    }

    #[test]
    fn test_field_ticks_and_expires() {
        let mut f = ResidualField::new(Vec2::ZERO);
        assert_eq!(f.update(0.25), 0);
        assert_eq!(f.update(0.25), 1);
        let mut total = 1;
        for _ in 0..10 {
            total += f.update(0.25);
        }
        assert!(f.expired());
        // 3 s lifetime at 0.5 s per tick
        assert_eq!(total, 6);
    }
}
