//! Progression state machine
//!
//! Tracks score, kills, player power, and pending upgrades, and drives
//! `Playing -> Upgrading -> Playing`, `Playing -> Dead`, `Playing -> Victory`.
//! The counters live in [`Progression`]; the transitions that touch entities
//! (boss spawn, level change) are free functions over the [`World`].

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{BOSS_SPEED_FACTOR, Boss, Player};
use super::state::{GameEvent, World};
use super::weapons::{GunKind, OrbitWeapons, evolve_chance};
use crate::consts::*;

/// Top-level game state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    /// Simulation running
    Playing,
    /// Waiting for the operator to pick upgrades; physics frozen
    Upgrading,
    /// Player died (terminal)
    Dead,
    /// Final boss defeated (terminal)
    Victory,
}

impl GamePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GamePhase::Dead | GamePhase::Victory)
    }
}

/// Upgrade choices offered every few kills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    Damage,
    Range,
    Speed,
    Weapon,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 4] = [
        UpgradeKind::Damage,
        UpgradeKind::Range,
        UpgradeKind::Speed,
        UpgradeKind::Weapon,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            UpgradeKind::Damage => "damage",
            UpgradeKind::Range => "range",
            UpgradeKind::Speed => "speed",
            UpgradeKind::Weapon => "weapon",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.key() == key)
    }
}

/// Orbit/gun increments per upgrade
pub const ORBIT_DAMAGE_STEP: f32 = 5.0;
pub const ORBIT_RANGE_STEP: f32 = 10.0;
pub const ORBIT_ROTATION_STEP: f32 = 0.5;
pub const GUN_MULTIPLIER_STEP: f32 = 0.1;

/// What an applied upgrade actually changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpgradeEffect {
    StatRaised,
    WeaponAdded { count: u32 },
    GunEvolved { gun: GunKind },
    EvolveMissed { misses: u32 },
    DualWieldUnlocked,
    /// Nothing left to improve for this kind
    Maxed,
}

/// Apply one upgrade to the orbit weapons and the player's gun
pub fn apply_upgrade_effect(
    kind: UpgradeKind,
    orbit: &mut OrbitWeapons,
    player: &mut Player,
    rng: &mut Pcg32,
) -> UpgradeEffect {
    match kind {
        UpgradeKind::Damage => {
            orbit.damage += ORBIT_DAMAGE_STEP;
            player.gun_damage_mul += GUN_MULTIPLIER_STEP;
            UpgradeEffect::StatRaised
        }
        UpgradeKind::Range => {
            orbit.range += ORBIT_RANGE_STEP;
            player.gun_range_mul += GUN_MULTIPLIER_STEP;
            UpgradeEffect::StatRaised
        }
        UpgradeKind::Speed => {
            orbit.rotation_speed += ORBIT_ROTATION_STEP;
            player.gun_fire_rate_mul += GUN_MULTIPLIER_STEP;
            UpgradeEffect::StatRaised
        }
        UpgradeKind::Weapon => {
            if orbit.add_weapon() {
                return UpgradeEffect::WeaponAdded { count: orbit.count };
            }
            match player.gun.next() {
                Some(next) => {
                    if rng.random::<f32>() < evolve_chance(player.evolve_misses) {
                        player.gun = next;
                        player.evolve_misses = 0;
                        UpgradeEffect::GunEvolved { gun: next }
                    } else {
                        player.evolve_misses += 1;
                        UpgradeEffect::EvolveMissed {
                            misses: player.evolve_misses,
                        }
                    }
                }
                None if !player.dual_wield => {
                    player.dual_wield = true;
                    UpgradeEffect::DualWieldUnlocked
                }
                None => UpgradeEffect::Maxed,
            }
        }
    }
}

/// Whether a weapon upgrade can still change anything
pub fn weapon_upgrade_available(orbit: &OrbitWeapons, player: &Player) -> bool {
    orbit.count < MAX_WEAPON_COUNT || player.gun.next().is_some() || !player.dual_wield
}

/// Score, kill, and upgrade counters for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub phase: GamePhase,
    pub level: u32,
    pub score: u64,
    pub total_kills: u32,
    pub kills_this_level: u32,
    pub player_level: u32,
    pub pending_upgrades: u32,
    pub boss_spawned_this_level: bool,
    /// Player levels carried in from a save; not backed by this run's kills
    pub carried_levels: u32,
}

impl Progression {
    pub fn new(level: u32, player_level: u32) -> Self {
        let player_level = player_level.max(1);
        Self {
            phase: GamePhase::Playing,
            level: level.clamp(1, FINAL_LEVEL),
            score: 0,
            total_kills: 0,
            kills_this_level: 0,
            player_level,
            pending_upgrades: 0,
            boss_spawned_this_level: false,
            carried_levels: player_level - 1,
        }
    }

    pub fn record_kill(&mut self, score: u64) {
        self.total_kills += 1;
        self.kills_this_level += 1;
        self.score += score;
    }

    /// Upgrades this run's kills have paid for so far
    pub fn earned_upgrades(&self) -> u32 {
        self.total_kills / KILLS_PER_UPGRADE
    }

    /// Upgrades already granted or queued in this run
    pub fn accounted_upgrades(&self) -> u32 {
        (self.player_level - 1 - self.carried_levels) + self.pending_upgrades
    }

    /// Queue newly earned upgrades. Enters `Upgrading` from `Playing`.
    /// Returns how many were added.
    pub fn accrue_upgrades(&mut self) -> u32 {
        let earned = self.earned_upgrades();
        let accounted = self.accounted_upgrades();
        if earned <= accounted {
            return 0;
        }
        let added = earned - accounted;
        self.pending_upgrades += added;
        if self.phase == GamePhase::Playing {
            self.phase = GamePhase::Upgrading;
        }
        added
    }

    /// Spend one pending upgrade. Returns true when this resumed play.
    pub fn consume_upgrade(&mut self) -> bool {
        if self.pending_upgrades == 0 {
            return false;
        }
        self.pending_upgrades -= 1;
        self.player_level += 1;
        if self.pending_upgrades == 0 && self.phase == GamePhase::Upgrading {
            self.phase = GamePhase::Playing;
            return true;
        }
        false
    }

    pub fn boss_spawn_ready(&self, boss_present: bool) -> bool {
        self.phase == GamePhase::Playing
            && !boss_present
            && !self.boss_spawned_this_level
            && self.kills_this_level >= KILL_TARGET
            && self.pending_upgrades == 0
    }

    pub fn begin_level(&mut self, level: u32) {
        self.level = level.clamp(1, FINAL_LEVEL);
        self.kills_this_level = 0;
        self.boss_spawned_this_level = false;
    }

    pub fn is_final_level(&self) -> bool {
        self.level >= FINAL_LEVEL
    }
}

// --- World-level transitions ---

/// Progression stage of the frame pipeline: death, boss defeat, upgrades,
/// then the boss-spawn check.
pub fn update_progression(world: &mut World) {
    if world.progress.phase.is_terminal() {
        return;
    }

    if world.player.is_dead() {
        on_player_dead(world);
        return;
    }

    if world.boss.as_ref().is_some_and(|b| b.is_dead()) {
        on_boss_defeated(world);
        if world.progress.phase.is_terminal() {
            return;
        }
    }

    check_upgrades(world);
    try_spawn_boss(world);
}

fn on_player_dead(world: &mut World) {
    world.progress.phase = GamePhase::Dead;
    world.spawner.stop_spawning();
    log::info!(
        "Player died on level {} with score {}",
        world.progress.level,
        world.progress.score
    );
    world.request_save(false);
    world.events.push(GameEvent::PlayerDead {
        score: world.progress.score,
        level: world.progress.level,
    });
}

/// Queue earned upgrades and ask the host for a choice
pub fn check_upgrades(world: &mut World) {
    let was_playing = world.progress.phase == GamePhase::Playing;
    let added = world.progress.accrue_upgrades();
    if added > 0 && was_playing {
        log::debug!(
            "{} upgrade(s) pending after {} kills",
            world.progress.pending_upgrades,
            world.progress.total_kills
        );
        world.events.push(GameEvent::NeedUpgrade {
            options: upgrade_options(world),
            pending: world.progress.pending_upgrades,
        });
    }
}

pub fn upgrade_options(world: &World) -> Vec<UpgradeKind> {
    UpgradeKind::ALL
        .into_iter()
        .filter(|k| {
            *k != UpgradeKind::Weapon || weapon_upgrade_available(&world.orbit, &world.player)
        })
        .collect()
}

/// Operator picked an upgrade. Ignored unless upgrades are pending.
pub fn apply_upgrade(world: &mut World, kind: UpgradeKind) -> bool {
    if world.progress.phase != GamePhase::Upgrading || world.progress.pending_upgrades == 0 {
        log::warn!(
            "Ignoring {:?} upgrade in phase {:?} with {} pending",
            kind,
            world.progress.phase,
            world.progress.pending_upgrades
        );
        return false;
    }

    let effect = apply_upgrade_effect(kind, &mut world.orbit, &mut world.player, &mut world.rng);
    log::debug!("Applied {:?} upgrade: {:?}", kind, effect);
    match effect {
        UpgradeEffect::GunEvolved { gun } => world.events.push(GameEvent::GunEvolved { gun }),
        UpgradeEffect::DualWieldUnlocked => world.events.push(GameEvent::DualWieldUnlocked),
        _ => {}
    }

    if world.progress.consume_upgrade() {
        // A boss check skipped while the menu was open must run now
        try_spawn_boss(world);
    } else if world.progress.pending_upgrades > 0 {
        world.events.push(GameEvent::NeedUpgrade {
            options: upgrade_options(world),
            pending: world.progress.pending_upgrades,
        });
    }
    debug_assert!(world.progress.accounted_upgrades() <= world.progress.earned_upgrades());
    true
}

/// Spawn the level boss when every gate is open
pub fn try_spawn_boss(world: &mut World) -> bool {
    if !world.progress.boss_spawn_ready(world.boss.is_some()) {
        return false;
    }
    let level = world.progress.level;
    world.spawner.stop_spawning();
    world.enemies.clear();

    let hp = world.tuning.boss_hp(level) as f32;
    let speed = world.tuning.enemy_speed(level) * REFERENCE_FPS * BOSS_SPEED_FACTOR;
    let pos = world.player.pos - Vec2::new(0.0, BOSS_SPAWN_OFFSET);
    let boss = Boss::new(world.ids.next_id(), level, pos, hp, speed);
    log::info!("Boss spawned on level {} with {} HP", level, hp);

    world.boss = Some(boss);
    world.progress.boss_spawned_this_level = true;
    world.events.push(GameEvent::BossSpawned { level, hp });
    true
}

fn on_boss_defeated(world: &mut World) {
    let level = world.progress.level;
    world.boss = None;
    world.hit_cooldowns.clear();
    world.progress.score += BOSS_KILL_BONUS;
    log::info!("Boss defeated on level {}", level);
    world.events.push(GameEvent::BossDefeated { level });

    if world.progress.is_final_level() {
        enter_victory(world);
    } else {
        advance_level(world, level + 1);
    }
}

fn enter_victory(world: &mut World) {
    world.progress.phase = GamePhase::Victory;
    world.spawner.stop_spawning();
    world.enemies.clear();
    world.projectiles.clear();
    world.fields.clear();
    log::info!("Victory with score {}", world.progress.score);
    world.request_save(false);
    world.events.push(GameEvent::Victory {
        score: world.progress.score,
    });
}

/// Move to `next`, persist, and restart the spawn cycle
fn advance_level(world: &mut World, next: u32) {
    debug_assert!(next <= FINAL_LEVEL);
    world.progress.level = next.min(FINAL_LEVEL);
    world.request_save(true);
    world.start_level(next);
}

/// Debug: jump past the current level. On the final level this wins.
pub fn skip_level(world: &mut World) {
    if world.progress.phase.is_terminal() {
        return;
    }
    world.boss = None;
    if world.progress.is_final_level() {
        enter_victory(world);
    } else {
        let next = world.progress.level + 1;
        log::info!("Skipping to level {}", next);
        advance_level(world, next);
    }
}

/// Debug: kill every live enemy, counting kills and score normally
pub fn kill_all_enemies(world: &mut World) -> u32 {
    if world.progress.phase.is_terminal() {
        return 0;
    }
    let mut killed = 0;
    for i in 0..world.enemies.len() {
        if world.kill_enemy(i, true) {
            killed += 1;
        }
    }
    world.enemies.retain(|e| e.alive);
    killed
}
