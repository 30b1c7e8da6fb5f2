//! Auto-combat systems: orbiting melee weapons, the auto-aim gun, and the
//! companion pet.
//!
//! None of these own entities. They read a per-frame list of [`Target`]s and
//! either return hit lists (orbit) or push projectiles (gun, pet).

use std::f32::consts::TAU;
use std::rc::Rc;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, Player};
use super::projectile::{Projectile, ProjectileKind};
use crate::consts::*;
use crate::polar_to_cartesian;

/// Anything a player weapon can damage this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub id: EntityId,
    pub pos: Vec2,
    pub radius: f32,
}

/// Nearest target to `from`, optionally limited to `max_range`
pub fn nearest_target(from: Vec2, targets: &[Target], max_range: Option<f32>) -> Option<Target> {
    let limit_sq = max_range.map(|r| r * r).unwrap_or(f32::INFINITY);
    targets
        .iter()
        .map(|t| (t, t.pos.distance_squared(from)))
        .filter(|(_, d)| *d <= limit_sq)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(t, _)| *t)
}

/// Gun targeting radius, scaled to what the player can see
pub fn max_targeting_range(viewport: Vec2) -> f32 {
    viewport.x.max(viewport.y) * 0.55
}

/// Projectiles the player currently has in flight
pub fn live_player_projectiles(projectiles: &[Projectile]) -> usize {
    projectiles.iter().filter(|p| !p.kind.is_hostile()).count()
}

// --- Orbit weapons ---

/// Melee weapons circling the player at a fixed range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitWeapons {
    pub count: u32,
    pub damage: f32,
    pub range: f32,
    /// Radians per second
    pub rotation_speed: f32,
    pub width: f32,
    /// Angle of the first weapon; the rest are spaced evenly
    pub angle: f32,
}

impl Default for OrbitWeapons {
    fn default() -> Self {
        Self {
            count: 1,
            damage: ORBIT_BASE_DAMAGE,
            range: ORBIT_BASE_RANGE,
            rotation_speed: ORBIT_BASE_ROTATION_SPEED,
            width: ORBIT_WEAPON_WIDTH,
            angle: 0.0,
        }
    }
}

impl OrbitWeapons {
    pub fn update(&mut self, dt: f32) {
        self.angle = (self.angle + self.rotation_speed * dt).rem_euclid(TAU);
    }

    /// Add one weapon; false when already at the cap
    pub fn add_weapon(&mut self) -> bool {
        if self.count >= MAX_WEAPON_COUNT {
            return false;
        }
        self.count += 1;
        true
    }

    /// Outer tip of each weapon
    pub fn endpoints(&self, center: Vec2) -> impl Iterator<Item = Vec2> + '_ {
        let count = self.count.min(MAX_WEAPON_COUNT);
        (0..count).map(move |i| {
            let theta = self.angle + i as f32 * TAU / count as f32;
            center + polar_to_cartesian(self.range, theta)
        })
    }

    /// Targets touched by any weapon tip this frame, each listed once
    pub fn collect_hits(&self, center: Vec2, targets: &[Target]) -> Vec<EntityId> {
        let mut hits: Vec<EntityId> = Vec::new();
        for tip in self.endpoints(center) {
            for t in targets {
                let reach = self.width * 1.5 + t.radius;
                if tip.distance_squared(t.pos) <= reach * reach && !hits.contains(&t.id) {
                    hits.push(t.id);
                }
            }
        }
        hits
    }
}

// --- Gun ---

/// Secondary explosive shot of the heavy gun tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeavyShot {
    /// Seconds between heavy shots
    pub interval: f32,
    pub damage: f32,
    pub blast_radius: f32,
    pub speed: f32,
    pub radius: f32,
}

/// Base stats of a gun before runtime multipliers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GunProfile {
    pub damage: f32,
    /// Seconds between shots
    pub fire_interval: f32,
    pub range: f32,
    /// Half-angle of the uniform spread (radians)
    pub spread: f32,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub heavy: Option<HeavyShot>,
}

/// Gun tiers, in evolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GunKind {
    #[default]
    Pistol,
    Smg,
    Rifle,
    Cannon,
}

impl GunKind {
    pub const ALL: [GunKind; 4] = [GunKind::Pistol, GunKind::Smg, GunKind::Rifle, GunKind::Cannon];

    pub fn key(&self) -> &'static str {
        match self {
            GunKind::Pistol => "pistol",
            GunKind::Smg => "smg",
            GunKind::Rifle => "rifle",
            GunKind::Cannon => "cannon",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.key() == key)
    }

    /// Next evolution tier, `None` at the top
    pub fn next(&self) -> Option<Self> {
        match self {
            GunKind::Pistol => Some(GunKind::Smg),
            GunKind::Smg => Some(GunKind::Rifle),
            GunKind::Rifle => Some(GunKind::Cannon),
            GunKind::Cannon => None,
        }
    }

    pub fn profile(&self) -> GunProfile {
        match self {
            GunKind::Pistol => GunProfile {
                damage: 10.0,
                fire_interval: 0.45,
                range: 520.0,
                spread: 0.06,
                projectile_speed: 620.0,
                projectile_radius: 4.0,
                heavy: None,
            },
            GunKind::Smg => GunProfile {
                damage: 6.0,
                fire_interval: 0.16,
                range: 460.0,
                spread: 0.14,
                projectile_speed: 680.0,
                projectile_radius: 3.0,
                heavy: None,
            },
            GunKind::Rifle => GunProfile {
                damage: 22.0,
                fire_interval: 0.7,
                range: 760.0,
                spread: 0.02,
                projectile_speed: 900.0,
                projectile_radius: 4.0,
                heavy: None,
            },
            GunKind::Cannon => GunProfile {
                damage: 14.0,
                fire_interval: 0.38,
                range: 600.0,
                spread: 0.05,
                projectile_speed: 640.0,
                projectile_radius: 5.0,
                heavy: Some(HeavyShot {
                    interval: 2.2,
                    damage: 40.0,
                    blast_radius: 70.0,
                    speed: 420.0,
                    radius: 9.0,
                }),
            },
        }
    }
}

/// Chance that a gun evolution roll succeeds after `misses` failures
pub fn evolve_chance(misses: u32) -> f32 {
    (0.35 + 0.15 * misses as f32).min(1.0)
}

/// Muzzle position given the player position and aim angle
pub type MuzzleFn = Rc<dyn Fn(Vec2, f32) -> Vec2>;

/// Distance from the player centre to the default muzzle
const MUZZLE_LENGTH: f32 = 22.0;
/// Sideways offset between the two barrels when dual-wielding
const DUAL_WIELD_OFFSET: f32 = 8.0;

/// Auto-aiming ranged weapon system
#[derive(Clone, Default)]
pub struct Gunner {
    /// Current aim, kept in sync even when not firing
    pub aim_angle: f32,
    pub cooldown: f32,
    pub heavy_cooldown: f32,
    muzzle: Option<MuzzleFn>,
}

impl std::fmt::Debug for Gunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gunner")
            .field("aim_angle", &self.aim_angle)
            .field("cooldown", &self.cooldown)
            .field("heavy_cooldown", &self.heavy_cooldown)
            .field("custom_muzzle", &self.muzzle.is_some())
            .finish()
    }
}

impl Gunner {
    pub fn set_muzzle(&mut self, muzzle: Option<MuzzleFn>) {
        self.muzzle = muzzle;
    }

    fn muzzle_pos(&self, player_pos: Vec2) -> Vec2 {
        match &self.muzzle {
            Some(f) => f(player_pos, self.aim_angle),
            None => player_pos + polar_to_cartesian(MUZZLE_LENGTH, self.aim_angle),
        }
    }

    /// Aim at the nearest target in range and fire when ready.
    /// Returns the number of projectiles spawned.
    pub fn update(
        &mut self,
        dt: f32,
        player: &Player,
        targets: &[Target],
        max_range: f32,
        projectiles: &mut Vec<Projectile>,
        rng: &mut Pcg32,
    ) -> u32 {
        self.cooldown = (self.cooldown - dt).max(0.0);
        self.heavy_cooldown = (self.heavy_cooldown - dt).max(0.0);

        let Some(target) = nearest_target(player.pos, targets, Some(max_range)) else {
            return 0;
        };
        let to_target = target.pos - player.pos;
        if to_target.length_squared() <= f32::EPSILON {
            return 0;
        }
        self.aim_angle = to_target.y.atan2(to_target.x);

        let profile = player.gun.profile();
        let range = profile.range * player.gun_range_mul;
        let mut fired = 0;

        let barrels: &[f32] = if player.dual_wield {
            &[-DUAL_WIELD_OFFSET, DUAL_WIELD_OFFSET]
        } else {
            &[0.0]
        };
        if self.cooldown <= 0.0
            && live_player_projectiles(projectiles) + barrels.len() <= MAX_PLAYER_PROJECTILES
        {
            let damage = profile.damage * player.gun_damage_mul;
            let muzzle = self.muzzle_pos(player.pos);
            let side = polar_to_cartesian(1.0, self.aim_angle).perp();
            for &offset in barrels {
                let jitter = if profile.spread > 0.0 {
                    rng.random_range(-profile.spread..=profile.spread)
                } else {
                    0.0
                };
                let dir = polar_to_cartesian(1.0, self.aim_angle + jitter);
                projectiles.push(Projectile::new(
                    ProjectileKind::PlayerBullet,
                    muzzle + side * offset,
                    dir,
                    profile.projectile_speed,
                    damage,
                    range,
                    profile.projectile_radius,
                ));
                fired += 1;
            }
            self.cooldown = profile.fire_interval / player.gun_fire_rate_mul.max(0.01);
        }

        if let Some(heavy) = profile.heavy {
            if self.heavy_cooldown <= 0.0
                && live_player_projectiles(projectiles) < MAX_PLAYER_PROJECTILES
            {
                projectiles.push(Projectile::new(
                    ProjectileKind::PlayerExplosive {
                        blast_radius: heavy.blast_radius,
                    },
                    self.muzzle_pos(player.pos),
                    polar_to_cartesian(1.0, self.aim_angle),
                    heavy.speed,
                    heavy.damage * player.gun_damage_mul,
                    range,
                    heavy.radius,
                ));
                self.heavy_cooldown = heavy.interval;
                fired += 1;
            }
        }

        fired
    }
}

// --- Companion pet ---

/// Where the pet hovers relative to the player
pub const PET_OFFSET: Vec2 = Vec2::new(-36.0, -28.0);
/// Follow smoothing rate (1/s)
pub const PET_FOLLOW_RATE: f32 = 6.0;
pub const PET_FIRE_INTERVAL: f32 = 1.4;
const PET_MOUNT_LENGTH: f32 = 14.0;
const PET_SHELL_DAMAGE: f32 = 18.0;
const PET_SHELL_BLAST: f32 = 56.0;
const PET_SHELL_SPEED: f32 = 380.0;
const PET_SHELL_RANGE: f32 = 650.0;
const PET_SHELL_RADIUS: f32 = 7.0;

/// Companion that trails the player and lobs explosive shells
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub active: bool,
    pub pos: Vec2,
    pub cooldown: f32,
    /// Orientation of the launcher mount
    pub mount_angle: f32,
}

impl Pet {
    pub fn new(player_pos: Vec2) -> Self {
        Self {
            active: false,
            pos: player_pos + PET_OFFSET,
            cooldown: PET_FIRE_INTERVAL,
            mount_angle: 0.0,
        }
    }

    /// Follow the player, turn toward the nearest target, fire when ready.
    /// Returns true if a shell was launched.
    pub fn update(
        &mut self,
        dt: f32,
        player_pos: Vec2,
        targets: &[Target],
        projectiles: &mut Vec<Projectile>,
    ) -> bool {
        if !self.active {
            return false;
        }
        let goal = player_pos + PET_OFFSET;
        let blend = 1.0 - (-PET_FOLLOW_RATE * dt).exp();
        self.pos = self.pos.lerp(goal, blend);
        self.cooldown = (self.cooldown - dt).max(0.0);

        let Some(target) = nearest_target(self.pos, targets, None) else {
            return false;
        };
        let to_target = target.pos - self.pos;
        if to_target.length_squared() <= f32::EPSILON {
            return false;
        }
        self.mount_angle = to_target.y.atan2(to_target.x);
        if self.cooldown > 0.0 || live_player_projectiles(projectiles) >= MAX_PLAYER_PROJECTILES {
            return false;
        }

        let dir = to_target.normalize();
        projectiles.push(Projectile::new(
            ProjectileKind::PlayerExplosive {
                blast_radius: PET_SHELL_BLAST,
            },
            self.pos + dir * PET_MOUNT_LENGTH,
            dir,
            PET_SHELL_SPEED,
            PET_SHELL_DAMAGE,
            PET_SHELL_RANGE,
            PET_SHELL_RADIUS,
        ));
        self.cooldown = PET_FIRE_INTERVAL;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn target(id: u32, x: f32, y: f32) -> Target {
        Target {
            id: EntityId(id),
            pos: Vec2::new(x, y),
            radius: ENEMY_RADIUS,
        }
    }

    #[test]
    fn test_nearest_target_respects_range() {
        let targets = [target(1, 300.0, 0.0), target(2, 100.0, 0.0)];
        assert_eq!(nearest_target(Vec2::ZERO, &targets, None).unwrap().id, EntityId(2));
        assert!(nearest_target(Vec2::ZERO, &targets, Some(50.0)).is_none());
    }

    #[test]
    fn test_orbit_hits_are_deduplicated() {
        let orbit = OrbitWeapons {
            count: 6,
            range: 10.0,
            ..OrbitWeapons::default()
        };
        // Close enough that every tip touches it
        let targets = [target(1, 0.0, 0.0)];
        assert_eq!(orbit.collect_hits(Vec2::ZERO, &targets), vec![EntityId(1)]);
    }

    #[test]
    fn test_orbit_tip_reach() {
        let orbit = OrbitWeapons::default();
        let reach = orbit.range + orbit.width * 1.5 + ENEMY_RADIUS;
        let near = [target(1, reach - 1.0, 0.0)];
        let far = [target(1, reach + 1.0, 0.0)];
        assert_eq!(orbit.collect_hits(Vec2::ZERO, &near).len(), 1);
        assert!(orbit.collect_hits(Vec2::ZERO, &far).is_empty());
    }

    #[test]
    fn test_orbit_weapon_cap() {
        let mut orbit = OrbitWeapons::default();
        while orbit.add_weapon() {}
        assert_eq!(orbit.count, MAX_WEAPON_COUNT);
    }

    #[test]
    fn test_gun_fires_and_respects_cooldown() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut gunner = Gunner::default();
        let player = Player::new(Vec2::new(500.0, 500.0));
        let targets = [target(1, 700.0, 500.0)];
        let mut projectiles = Vec::new();

        assert_eq!(gunner.update(0.016, &player, &targets, 600.0, &mut projectiles, &mut rng), 1);
        assert_eq!(gunner.update(0.016, &player, &targets, 600.0, &mut projectiles, &mut rng), 0);
        assert!(gunner.aim_angle.abs() < 1e-5);
        let p = &projectiles[0];
        assert!(p.dir.y.atan2(p.dir.x).abs() <= 0.06 + 1e-4);
    }

    #[test]
    fn test_gun_idle_without_target_in_range() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut gunner = Gunner {
            cooldown: 0.2,
            ..Gunner::default()
        };
        let player = Player::new(Vec2::new(500.0, 500.0));
        let targets = [target(1, 1500.0, 500.0)];
        let mut projectiles = Vec::new();
        assert_eq!(gunner.update(0.1, &player, &targets, 600.0, &mut projectiles, &mut rng), 0);
        assert!(projectiles.is_empty());
        assert!((gunner.cooldown - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_gun_skips_target_at_zero_distance() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut gunner = Gunner::default();
        let player = Player::new(Vec2::new(500.0, 500.0));
        let targets = [target(1, 500.0, 500.0)];
        let mut projectiles = Vec::new();
        assert_eq!(gunner.update(0.1, &player, &targets, 600.0, &mut projectiles, &mut rng), 0);
    }

    #[test]
    fn test_dual_wield_and_multipliers() {
        let mut rng = Pcg32::seed_from_u64(9);
        let mut gunner = Gunner::default();
        let mut player = Player::new(Vec2::new(500.0, 500.0));
        player.dual_wield = true;
        player.gun_damage_mul = 1.5;
        player.gun_range_mul = 2.0;
        let targets = [target(1, 500.0, 300.0)];
        let mut projectiles = Vec::new();
        assert_eq!(gunner.update(0.0, &player, &targets, 600.0, &mut projectiles, &mut rng), 2);
        for p in &projectiles {
            assert_eq!(p.damage, 15.0);
            assert_eq!(p.range, 1040.0);
        }
    }

    #[test]
    fn test_dual_wield_respects_projectile_cap() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut gunner = Gunner::default();
        let mut player = Player::new(Vec2::new(500.0, 500.0));
        player.dual_wield = true;
        let targets = [target(1, 500.0, 300.0)];
        let in_flight = Projectile::new(
            ProjectileKind::PlayerBullet,
            Vec2::ZERO,
            Vec2::X,
            100.0,
            1.0,
            100.0,
            2.0,
        );
        // One slot left: a two-barrel volley must wait
        let mut projectiles = vec![in_flight.clone(); MAX_PLAYER_PROJECTILES - 1];
        assert_eq!(gunner.update(0.0, &player, &targets, 600.0, &mut projectiles, &mut rng), 0);
        assert_eq!(projectiles.len(), MAX_PLAYER_PROJECTILES - 1);

        projectiles.pop();
        assert_eq!(gunner.update(0.0, &player, &targets, 600.0, &mut projectiles, &mut rng), 2);
        assert_eq!(projectiles.len(), MAX_PLAYER_PROJECTILES);
    }

    #[test]
    fn test_cannon_heavy_shot() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut gunner = Gunner::default();
        let mut player = Player::new(Vec2::new(500.0, 500.0));
        player.gun = GunKind::Cannon;
        let targets = [target(1, 800.0, 500.0)];
        let mut projectiles = Vec::new();
        assert_eq!(gunner.update(0.0, &player, &targets, 600.0, &mut projectiles, &mut rng), 2);
        assert!(matches!(
            projectiles[1].kind,
            ProjectileKind::PlayerExplosive { .. }
        ));
        assert!(gunner.heavy_cooldown > 0.0);
    }

    #[test]
    fn test_custom_muzzle_is_used() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut gunner = Gunner::default();
        gunner.set_muzzle(Some(Rc::new(|pos, _| pos + Vec2::new(0.0, -5.0))));
        let player = Player::new(Vec2::new(500.0, 500.0));
        let targets = [target(1, 800.0, 500.0)];
        let mut projectiles = Vec::new();
        gunner.update(0.0, &player, &targets, 600.0, &mut projectiles, &mut rng);
        assert_eq!(projectiles[0].origin, Vec2::new(500.0, 495.0));
    }

    #[test]
    fn test_gun_keys_round_trip() {
        for gun in GunKind::ALL {
            assert_eq!(GunKind::from_key(gun.key()), Some(gun));
        }
        assert_eq!(GunKind::from_key("bazooka"), None);
        assert_eq!(GunKind::Cannon.next(), None);
    }

    #[test]
    fn test_evolve_chance_grows_with_misses() {
        assert!((evolve_chance(0) - 0.35).abs() < 1e-6);
        assert!(evolve_chance(2) > evolve_chance(1));
        assert_eq!(evolve_chance(10), 1.0);
    }

    #[test]
    fn test_pet_follows_and_fires() {
        let mut pet = Pet::new(Vec2::new(100.0, 100.0));
        pet.active = true;
        pet.cooldown = 0.0;
        let player = Vec2::new(400.0, 400.0);
        let targets = [target(1, 900.0, 900.0)];
        let mut projectiles = Vec::new();
        let before = pet.pos.distance(player + PET_OFFSET);
        assert!(pet.update(0.1, player, &targets, &mut projectiles));
        assert!(pet.pos.distance(player + PET_OFFSET) < before);
        assert_eq!(projectiles.len(), 1);
        assert!(!pet.update(0.1, player, &targets, &mut projectiles));
    }

    #[test]
    fn test_inactive_pet_does_nothing() {
        let mut pet = Pet::new(Vec2::ZERO);
        pet.cooldown = 0.0;
        let mut projectiles = Vec::new();
        assert!(!pet.update(1.0, Vec2::ZERO, &[target(1, 10.0, 0.0)], &mut projectiles));
    }
}
