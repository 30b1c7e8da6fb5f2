//! World state: the simulation root
//!
//! Owns every live entity and every system. Systems see the collections
//! through the world handle; nothing holds its own copy.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;

use super::collision::HitCooldowns;
use super::entity::{Boss, Enemy, EntityId, Player};
use super::progression::{GamePhase, Progression, UpgradeKind};
use super::projectile::{Projectile, ResidualField};
use super::spawn::{SpawnDirector, SpawnEnv};
use super::weapons::{GunKind, Gunner, OrbitWeapons, PET_FIRE_INTERVAL, Pet, Target};
use crate::consts::*;
use crate::persistence::{ProgressPatch, SaveRecord};
use crate::settings::Settings;
use crate::tuning::Tuning;

/// Hands out entity ids; never reuses one within a run
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn next_id(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }
}

/// One-shot signals for the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    LevelStarted { level: u32 },
    /// Every enemy of the level has been spawned
    SpawnComplete { level: u32 },
    NeedUpgrade { options: Vec<UpgradeKind>, pending: u32 },
    GunEvolved { gun: GunKind },
    DualWieldUnlocked,
    PetUnlocked,
    BossSpawned { level: u32, hp: f32 },
    BossTaunt { level: u32 },
    BossDefeated { level: u32 },
    PlayerDead { score: u64, level: u32 },
    Victory { score: u64 },
}

/// Complete simulation state for one run
#[derive(Debug)]
pub struct World {
    pub tuning: Tuning,
    /// Active viewport size; drives spawn edges and targeting range
    pub viewport: Vec2,
    pub rng: Pcg32,
    pub ids: IdAllocator,
    pub player: Player,
    /// Live enemies, in spawn order
    pub enemies: Vec<Enemy>,
    pub boss: Option<Boss>,
    pub projectiles: Vec<Projectile>,
    pub fields: Vec<ResidualField>,
    pub orbit: OrbitWeapons,
    pub gunner: Gunner,
    pub pet: Pet,
    pub spawner: SpawnDirector,
    pub hit_cooldowns: HitCooldowns,
    pub progress: Progression,
    /// Movement vector for the current frame
    pub movement: Vec2,
    /// Outbox, drained by the host
    pub events: Vec<GameEvent>,
    /// Save requests, flushed to storage after the frame
    pub saves: Vec<ProgressPatch>,
}

impl World {
    /// Build a run from settings and a loaded save record, then start its level
    pub fn new(settings: &Settings, record: &SaveRecord) -> Self {
        let mut world = Self::build(settings, record);
        let level = world.progress.level;
        world.start_level(level);
        world
    }

    /// Build a run without starting its level, so collaborators can be
    /// installed before the first spawn
    pub fn build(settings: &Settings, record: &SaveRecord) -> Self {
        let center = Vec2::new(WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0);

        let mut player = Player::new(center);
        player.gun = GunKind::from_key(&record.gun_key).unwrap_or_else(|| {
            log::warn!("Unknown gun '{}' in save, using default", record.gun_key);
            GunKind::default()
        });
        player.dual_wield = record.dual_wield;
        player.gun_damage_mul = record.gun_damage_mul;
        player.gun_fire_rate_mul = record.gun_fire_rate_mul;
        player.gun_range_mul = record.gun_range_mul;
        player.evolve_misses = record.evolve_misses;

        let orbit = OrbitWeapons {
            count: record.weapon_count.clamp(1, MAX_WEAPON_COUNT),
            damage: record.weapon_damage,
            range: record.weapon_range,
            rotation_speed: record.weapon_rotation_speed,
            ..OrbitWeapons::default()
        };

        Self {
            tuning: settings.tuning.clone(),
            viewport: settings.viewport(),
            rng: Pcg32::seed_from_u64(settings.seed),
            ids: IdAllocator::default(),
            pet: Pet::new(center),
            player,
            enemies: Vec::new(),
            boss: None,
            projectiles: Vec::new(),
            fields: Vec::new(),
            orbit,
            gunner: Gunner::default(),
            spawner: SpawnDirector::new(),
            hit_cooldowns: HitCooldowns::default(),
            progress: Progression::new(record.current_level, record.player_level),
            movement: Vec2::ZERO,
            events: Vec::new(),
            saves: Vec::new(),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.progress.phase
    }

    /// Everything weapons may aim at: live enemies, then the boss
    pub fn targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self
            .enemies
            .iter()
            .filter(|e| e.alive)
            .map(|e| Target {
                id: e.id,
                pos: e.pos,
                radius: e.radius,
            })
            .collect();
        if let Some(boss) = self.boss.as_ref().filter(|b| !b.is_dead()) {
            targets.push(Target {
                id: boss.id,
                pos: boss.pos,
                radius: boss.radius,
            });
        }
        targets
    }

    /// Reset per-level state and begin spawning for `level`
    pub fn start_level(&mut self, level: u32) {
        self.progress.begin_level(level);
        let level = self.progress.level;

        self.enemies.clear();
        self.boss = None;
        self.projectiles.clear();
        self.fields.clear();
        self.hit_cooldowns.clear();
        self.player.health.restore();
        self.player.boss_contact_cooldown = 0.0;
        self.gunner.cooldown = 0.0;
        self.gunner.heavy_cooldown = 0.0;

        let pet_active = level >= self.tuning.pet_unlock_level;
        if pet_active && !self.pet.active {
            self.pet = Pet::new(self.player.pos);
            self.events.push(GameEvent::PetUnlocked);
        }
        self.pet.active = pet_active;
        self.pet.cooldown = PET_FIRE_INTERVAL;

        self.spawner.reset();
        log::info!("Level {} started", level);
        self.events.push(GameEvent::LevelStarted { level });
        if self.start_spawner(level) {
            self.events.push(GameEvent::SpawnComplete { level });
        }
    }

    fn start_spawner(&mut self, level: u32) -> bool {
        let mut env = SpawnEnv {
            tuning: &self.tuning,
            view_center: self.player.pos,
            viewport: self.viewport,
            rng: &mut self.rng,
            ids: &mut self.ids,
            enemies: &mut self.enemies,
        };
        self.spawner.start_spawning(level, &mut env)
    }

    /// Advance the spawn timer. Returns true on the frame the quota completes.
    pub fn update_spawner(&mut self, dt: f32) -> bool {
        let mut env = SpawnEnv {
            tuning: &self.tuning,
            view_center: self.player.pos,
            viewport: self.viewport,
            rng: &mut self.rng,
            ids: &mut self.ids,
            enemies: &mut self.enemies,
        };
        self.spawner.update(dt, &mut env)
    }

    /// Kill the enemy at `idx` and count it once. The enemy stays in the
    /// list until the next sweep.
    pub fn kill_enemy(&mut self, idx: usize, award_score: bool) -> bool {
        let Some(enemy) = self.enemies.get_mut(idx) else {
            return false;
        };
        if !enemy.kill() {
            return false;
        }
        let score = if award_score { ENEMY_KILL_SCORE } else { 0 };
        self.progress.record_kill(score);
        true
    }

    /// Queue a save of the current progress. `full` also stores player power.
    pub fn request_save(&mut self, full: bool) {
        let patch = self.progress_patch(full);
        self.saves.push(patch);
    }

    pub fn progress_patch(&self, full: bool) -> ProgressPatch {
        let mut patch = ProgressPatch {
            current_level: Some(self.progress.level),
            score: Some(self.progress.score),
            ..ProgressPatch::default()
        };
        if full {
            patch.player_level = Some(self.progress.player_level);
            patch.gun_key = Some(self.player.gun.key().to_string());
            patch.gun_damage_mul = Some(self.player.gun_damage_mul);
            patch.gun_fire_rate_mul = Some(self.player.gun_fire_rate_mul);
            patch.gun_range_mul = Some(self.player.gun_range_mul);
            patch.evolve_misses = Some(self.player.evolve_misses);
            patch.dual_wield = Some(self.player.dual_wield);
            patch.weapon_damage = Some(self.orbit.damage);
            patch.weapon_range = Some(self.orbit.range);
            patch.weapon_rotation_speed = Some(self.orbit.rotation_speed);
            patch.weapon_count = Some(self.orbit.count);
        }
        patch
    }
}
