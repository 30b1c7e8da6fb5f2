//! Simulation tick
//!
//! The host calls [`Simulation::tick`] once per frame with the elapsed time,
//! a movement vector, and any queued commands. Commands are handled first,
//! then the frame runs through the fixed stage pipeline in substeps, then
//! queued saves are flushed. Events and snapshots are pulled by the host.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{CollisionReport, resolve_collisions};
use super::entity::{
    BOSS_BULLET_DAMAGE, BOSS_BULLET_RADIUS, BOSS_BULLET_RANGE, BOSS_BULLET_SPEED,
    BOSS_THROW_DAMAGE, BOSS_THROW_RADIUS, BOSS_THROW_SPEED, BossAttack,
};
use super::progression::{
    GamePhase, UpgradeKind, apply_upgrade, kill_all_enemies, skip_level, update_progression,
};
use super::projectile::{Projectile, ProjectileKind, ResidualField, advance_projectiles};
use super::spawn::ObstructionFn;
use super::state::{GameEvent, World};
use super::weapons::{GunKind, MuzzleFn, max_targeting_range};
use crate::consts::*;
use crate::persistence::SaveStore;
use crate::settings::Settings;

/// Discrete operator commands, drained at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "kind", rename_all = "snake_case")]
pub enum Command {
    ApplyUpgrade(UpgradeKind),
    Pause,
    Resume,
    Restart,
    /// Debug
    SkipLevel,
    /// Debug
    KillAllEnemies,
}

/// Input for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Normalized movement (magnitude 0 or 1)
    pub movement: Vec2,
    pub commands: Vec<Command>,
}

impl TickInput {
    pub fn moving(movement: Vec2) -> Self {
        Self {
            movement,
            commands: Vec::new(),
        }
    }

    pub fn command(command: Command) -> Self {
        Self {
            movement: Vec2::ZERO,
            commands: vec![command],
        }
    }
}

/// Read-only view of the run for HUDs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub hp: f32,
    pub max_hp: f32,
    pub score: u64,
    /// Kills on the current level
    pub kills: u32,
    pub level: u32,
    pub kills_needed: u32,
    pub boss_hp: Option<f32>,
    pub boss_max_hp: Option<f32>,
    pub game_state: GamePhase,
    pub player_level: u32,
    pub weapon_damage: f32,
    pub weapon_range: f32,
    pub weapon_rotation_speed: f32,
    pub weapon_count: u32,
    pub total_kills: u32,
    pub pending_upgrades: u32,
    pub paused: bool,
    pub gun: GunKind,
}

type Stage = fn(&mut World, f32);

/// Frame stages, in order. Movement and AI first, then collisions, then
/// the state machine, so progression only ever sees applied damage.
const PIPELINE: [(&str, Stage); 3] = [
    ("movement", movement_stage),
    ("collision", collision_stage),
    ("progression", progression_stage),
];

fn run_pipeline(world: &mut World, dt: f32) {
    for (name, stage) in PIPELINE {
        log::trace!("stage {} dt={:.4}", name, dt);
        stage(world, dt);
    }
}

fn movement_stage(world: &mut World, dt: f32) {
    let movement = world.movement;
    world.player.move_by(movement, dt);
    world.player.tick_cooldowns(dt);

    if world.update_spawner(dt) {
        let level = world.progress.level;
        world.events.push(GameEvent::SpawnComplete { level });
    }

    let target = world.player.pos;
    for enemy in world.enemies.iter_mut().filter(|e| e.alive) {
        enemy.chase(target, dt);
    }

    if let Some(boss) = world.boss.as_mut().filter(|b| !b.is_dead()) {
        let (attack, taunt) = boss.update(target, dt);
        match attack {
            Some(BossAttack::Shoot { dir }) => world.projectiles.push(Projectile::new(
                ProjectileKind::BossBullet,
                boss.pos,
                dir,
                BOSS_BULLET_SPEED,
                BOSS_BULLET_DAMAGE,
                BOSS_BULLET_RANGE,
                BOSS_BULLET_RADIUS,
            )),
            Some(BossAttack::Throw { target }) => {
                let to_target = target - boss.pos;
                if let Some(dir) = to_target.try_normalize() {
                    // Lands where the player stood when it was thrown
                    world.projectiles.push(Projectile::new(
                        ProjectileKind::Thrown,
                        boss.pos,
                        dir,
                        BOSS_THROW_SPEED,
                        BOSS_THROW_DAMAGE,
                        to_target.length(),
                        BOSS_THROW_RADIUS,
                    ));
                }
            }
            None => {}
        }
        if taunt {
            world.events.push(GameEvent::BossTaunt { level: boss.level });
        }
    }

    world.orbit.update(dt);

    // Sweep spent projectiles before anything fires
    for impact in advance_projectiles(&mut world.projectiles, dt) {
        world.fields.push(ResidualField::new(impact));
    }

    let targets = world.targets();
    let max_range = max_targeting_range(world.viewport);
    world.gunner.update(
        dt,
        &world.player,
        &targets,
        max_range,
        &mut world.projectiles,
        &mut world.rng,
    );
    world
        .pet
        .update(dt, world.player.pos, &targets, &mut world.projectiles);
}

fn collision_stage(world: &mut World, dt: f32) {
    let report = resolve_collisions(world, dt);
    if report != CollisionReport::default() {
        log::trace!("collisions: {:?}", report);
    }
}

fn progression_stage(world: &mut World, _dt: f32) {
    update_progression(world);
}

/// One run: the world plus its save store and injected collaborators
pub struct Simulation {
    world: World,
    store: SaveStore,
    settings: Settings,
    paused: bool,
    obstruction: Option<ObstructionFn>,
    muzzle: Option<MuzzleFn>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("world", &self.world)
            .field("store", &self.store)
            .field("paused", &self.paused)
            .finish()
    }
}

impl Simulation {
    /// Start a run from whatever the store holds
    pub fn new(settings: Settings, store: SaveStore) -> Self {
        let record = store.load();
        let world = World::new(&settings, &record);
        log::info!("Run started at level {}", world.progress.level);
        Self {
            world,
            store,
            settings,
            paused: false,
            obstruction: None,
            muzzle: None,
        }
    }

    /// Start a run using the settings' own save backend
    pub fn from_settings(settings: Settings) -> Self {
        let store = settings.save_store();
        Self::new(settings, store)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn store(&self) -> &SaveStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> GamePhase {
        self.world.progress.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Spawn placement check; kept across restarts
    pub fn set_obstruction(&mut self, obstruction: Option<ObstructionFn>) {
        self.world.spawner.set_obstruction(obstruction.clone());
        self.obstruction = obstruction;
    }

    /// Gun muzzle position provider; kept across restarts
    pub fn set_muzzle(&mut self, muzzle: Option<MuzzleFn>) {
        self.world.gunner.set_muzzle(muzzle.clone());
        self.muzzle = muzzle;
    }

    /// Advance by `dt` seconds
    pub fn tick(&mut self, input: &TickInput, dt: f32) {
        for command in &input.commands {
            self.handle_command(*command);
        }
        self.world.movement = input.movement;

        if !self.paused && dt.is_finite() && dt > 0.0 {
            let steps = ((dt / MAX_STEP_DT).ceil() as u32).clamp(1, MAX_SUBSTEPS);
            let step = (dt / steps as f32).min(MAX_STEP_DT);
            for _ in 0..steps {
                if self.world.progress.phase != GamePhase::Playing {
                    break;
                }
                run_pipeline(&mut self.world, step);
            }
        }

        self.flush_saves();
    }

    fn handle_command(&mut self, command: Command) {
        log::debug!("command {:?}", command);
        match command {
            Command::ApplyUpgrade(kind) => {
                apply_upgrade(&mut self.world, kind);
            }
            Command::Pause => self.paused = true,
            Command::Resume => self.paused = false,
            Command::Restart => self.restart(),
            Command::SkipLevel | Command::KillAllEnemies if !self.settings.debug_commands => {
                log::warn!("Debug command {:?} ignored", command);
            }
            Command::SkipLevel => skip_level(&mut self.world),
            Command::KillAllEnemies => {
                let killed = kill_all_enemies(&mut self.world);
                log::debug!("Killed {} enemies", killed);
                update_progression(&mut self.world);
            }
        }
    }

    /// Rebuild the run from the persisted record. All timers start over.
    pub fn restart(&mut self) {
        let record = self.store.load();
        log::info!("Restarting at level {}", record.current_level);
        self.world = World::build(&self.settings, &record);
        self.world.spawner.set_obstruction(self.obstruction.clone());
        self.world.gunner.set_muzzle(self.muzzle.clone());
        let level = self.world.progress.level;
        self.world.start_level(level);
        self.paused = false;
    }

    fn flush_saves(&mut self) {
        let saves = std::mem::take(&mut self.world.saves);
        for patch in &saves {
            self.store.save_progress(patch);
        }
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.world.events)
    }

    pub fn snapshot(&self) -> Snapshot {
        let world = &self.world;
        let boss = world.boss.as_ref();
        Snapshot {
            hp: world.player.health.current,
            max_hp: world.player.health.max,
            score: world.progress.score,
            kills: world.progress.kills_this_level,
            level: world.progress.level,
            kills_needed: KILL_TARGET,
            boss_hp: boss.map(|b| b.health.current),
            boss_max_hp: boss.map(|b| b.health.max),
            game_state: world.progress.phase,
            player_level: world.progress.player_level,
            weapon_damage: world.orbit.damage,
            weapon_range: world.orbit.range,
            weapon_rotation_speed: world.orbit.rotation_speed,
            weapon_count: world.orbit.count,
            total_kills: world.progress.total_kills,
            pending_upgrades: world.progress.pending_upgrades,
            paused: self.paused,
            gun: world.player.gun,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStorage, SaveRecord};
    use crate::sim::entity::{Enemy, EnemyKind};
    use std::cell::Cell;
    use std::rc::Rc;

    const FRAME: f32 = 1.0 / 60.0;

    fn sim_with(record: SaveRecord) -> Simulation {
        let mut store = SaveStore::in_memory();
        store.save(&record);
        Simulation::new(Settings::default(), store)
    }

    fn quiet_sim(level: u32) -> Simulation {
        let mut sim = sim_with(SaveRecord {
            current_level: level,
            ..SaveRecord::default()
        });
        let world = sim.world_mut();
        world.spawner.stop_spawning();
        world.enemies.clear();
        sim.drain_events();
        sim
    }

    fn upgrade_commands(sim: &Simulation) -> TickInput {
        let pending = sim.world().progress.pending_upgrades as usize;
        TickInput {
            movement: Vec2::ZERO,
            commands: vec![Command::ApplyUpgrade(UpgradeKind::Damage); pending],
        }
    }

    #[test]
    fn test_hundred_kills_spawn_first_boss() {
        let mut sim = quiet_sim(1);
        for _ in 0..KILL_TARGET {
            let input = upgrade_commands(&sim);
            let world = sim.world_mut();
            world.projectiles.clear();
            let id = world.ids.next_id();
            world
                .enemies
                .push(Enemy::new(id, EnemyKind::Melee, Vec2::new(100.0, 100.0), 30.0, 0.0));
            assert!(world.kill_enemy(0, true));
            world.enemies.clear();
            sim.tick(&input, FRAME);
        }
        assert_eq!(sim.world().progress.kills_this_level, KILL_TARGET);

        // The 100th kill earned an upgrade, which holds the boss back
        assert_eq!(sim.phase(), GamePhase::Upgrading);
        assert!(sim.world().boss.is_none());

        let input = upgrade_commands(&sim);
        sim.tick(&input, FRAME);
        let boss = sim.world().boss.as_ref().expect("boss after upgrades cleared");
        assert_eq!(boss.health.max, 240.0);
        assert_eq!(sim.snapshot().boss_max_hp, Some(240.0));
        assert_eq!(sim.world().progress.player_level, 1 + KILL_TARGET / KILLS_PER_UPGRADE);
        assert!(!sim.world().spawner.is_spawning());
    }

    #[test]
    fn test_final_boss_gives_victory() {
        let mut sim = quiet_sim(FINAL_LEVEL);
        {
            let world = sim.world_mut();
            world.progress.kills_this_level = KILL_TARGET;
            update_progression(world);
            let boss = world.boss.as_mut().expect("boss spawned");
            boss.health.damage(f32::MAX);
        }
        sim.tick(&TickInput::default(), FRAME);

        assert_eq!(sim.phase(), GamePhase::Victory);
        assert_eq!(sim.world().progress.level, FINAL_LEVEL);
        let events = sim.drain_events();
        assert!(events.contains(&GameEvent::Victory { score: BOSS_KILL_BONUS }));
        assert_eq!(sim.store().load().high_score, BOSS_KILL_BONUS);
        assert_eq!(sim.store().load().current_level, FINAL_LEVEL);

        // Terminal: further ticks change nothing
        sim.tick(&TickInput::command(Command::SkipLevel), FRAME);
        assert_eq!(sim.phase(), GamePhase::Victory);
    }

    #[test]
    fn test_boss_defeat_advances_and_saves() {
        let mut sim = quiet_sim(4);
        {
            let world = sim.world_mut();
            world.progress.kills_this_level = KILL_TARGET;
            update_progression(world);
            world.boss.as_mut().expect("boss").health.damage(f32::MAX);
        }
        sim.tick(&TickInput::default(), FRAME);
        assert_eq!(sim.phase(), GamePhase::Playing);
        assert_eq!(sim.world().progress.level, 5);
        assert_eq!(sim.world().progress.kills_this_level, 0);
        assert!(sim.world().spawner.is_spawning());
        assert_eq!(sim.store().load().current_level, 5);
        let events = sim.drain_events();
        assert!(events.contains(&GameEvent::BossDefeated { level: 4 }));
        assert!(events.contains(&GameEvent::LevelStarted { level: 5 }));
    }

    #[test]
    fn test_upgrade_menu_freezes_world() {
        let mut sim = quiet_sim(1);
        {
            let world = sim.world_mut();
            for _ in 0..KILLS_PER_UPGRADE {
                world.progress.record_kill(ENEMY_KILL_SCORE);
            }
            let id = world.ids.next_id();
            world
                .enemies
                .push(Enemy::new(id, EnemyKind::Shooter, Vec2::new(100.0, 100.0), 30.0, 80.0));
        }
        sim.tick(&TickInput::default(), FRAME);
        assert_eq!(sim.phase(), GamePhase::Upgrading);
        let events = sim.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::NeedUpgrade { pending: 1, .. })));

        let frozen = sim.world().enemies[0].pos;
        sim.tick(&TickInput::default(), 0.5);
        assert_eq!(sim.world().enemies[0].pos, frozen);

        sim.tick(&TickInput::command(Command::ApplyUpgrade(UpgradeKind::Range)), FRAME);
        assert_eq!(sim.phase(), GamePhase::Playing);
        assert_ne!(sim.world().enemies[0].pos, frozen);
        assert_eq!(sim.snapshot().weapon_range, ORBIT_BASE_RANGE + 10.0);
    }

    #[test]
    fn test_upgrade_outside_menu_is_ignored() {
        let mut sim = quiet_sim(1);
        sim.tick(&TickInput::command(Command::ApplyUpgrade(UpgradeKind::Damage)), FRAME);
        assert_eq!(sim.world().progress.player_level, 1);
        assert_eq!(sim.snapshot().weapon_damage, ORBIT_BASE_DAMAGE);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut sim = quiet_sim(1);
        let start = sim.world().player.pos;
        sim.tick(&TickInput::command(Command::Pause), FRAME);
        assert!(sim.snapshot().paused);
        sim.tick(&TickInput::moving(Vec2::X), 0.5);
        assert_eq!(sim.world().player.pos, start);

        sim.tick(&TickInput::command(Command::Resume), FRAME);
        sim.tick(&TickInput::moving(Vec2::X), 0.1);
        assert!((sim.world().player.pos.x - (start.x + PLAYER_SPEED * 0.1)).abs() < 1e-2);
    }

    #[test]
    fn test_long_frames_are_capped() {
        let mut sim = quiet_sim(1);
        let start = sim.world().player.pos;
        sim.tick(&TickInput::moving(Vec2::X), 5.0);
        let moved = sim.world().player.pos.x - start.x;
        let cap = PLAYER_SPEED * MAX_STEP_DT * MAX_SUBSTEPS as f32;
        assert!((moved - cap).abs() < 1e-2);
    }

    #[test]
    fn test_skip_level_saves_and_restart_restores() {
        let mut sim = quiet_sim(1);
        sim.tick(&TickInput::command(Command::SkipLevel), FRAME);
        sim.tick(&TickInput::command(Command::SkipLevel), FRAME);
        assert_eq!(sim.world().progress.level, 3);
        assert_eq!(sim.store().load().current_level, 3);

        sim.world_mut().player.health.damage(50.0);
        sim.tick(&TickInput::command(Command::Restart), FRAME);
        assert_eq!(sim.world().progress.level, 3);
        assert_eq!(sim.world().progress.score, 0);
        assert_eq!(sim.snapshot().hp, PLAYER_MAX_HP);
        assert!(sim.world().pet.active);
    }

    #[test]
    fn test_skip_on_final_level_is_victory() {
        let mut sim = quiet_sim(FINAL_LEVEL);
        sim.tick(&TickInput::command(Command::SkipLevel), FRAME);
        assert_eq!(sim.phase(), GamePhase::Victory);
        assert_eq!(sim.world().progress.level, FINAL_LEVEL);
    }

    #[test]
    fn test_debug_commands_can_be_disabled() {
        let settings = Settings {
            debug_commands: false,
            ..Settings::default()
        };
        let mut sim = Simulation::new(settings, SaveStore::in_memory());
        sim.tick(&TickInput::command(Command::SkipLevel), FRAME);
        sim.tick(&TickInput::command(Command::KillAllEnemies), FRAME);
        assert_eq!(sim.world().progress.level, 1);
        assert_eq!(sim.world().progress.total_kills, 0);
    }

    #[test]
    fn test_kill_all_enemies_counts_kills() {
        let mut sim = quiet_sim(1);
        {
            let world = sim.world_mut();
            for i in 0..3 {
                let id = world.ids.next_id();
                world.enemies.push(Enemy::new(
                    id,
                    EnemyKind::Thrower,
                    Vec2::new(100.0 + i as f32 * 50.0, 100.0),
                    30.0,
                    0.0,
                ));
            }
        }
        sim.tick(&TickInput::command(Command::KillAllEnemies), 0.0);
        let snap = sim.snapshot();
        assert_eq!(snap.kills, 3);
        assert_eq!(snap.score, 3 * ENEMY_KILL_SCORE);
        assert!(sim.world().enemies.is_empty());
    }

    #[test]
    fn test_death_persists_high_score() {
        let mut sim = quiet_sim(2);
        sim.world_mut().progress.score = 777;
        sim.world_mut().player.health.damage(PLAYER_MAX_HP);
        sim.tick(&TickInput::default(), FRAME);
        assert_eq!(sim.phase(), GamePhase::Dead);
        assert!(sim.drain_events().contains(&GameEvent::PlayerDead { score: 777, level: 2 }));
        assert_eq!(sim.store().load().high_score, 777);
    }

    #[test]
    fn test_obstruction_survives_restart() {
        let mut sim = Simulation::new(
            Settings::default(),
            SaveStore::new(Box::new(MemoryStorage::new()), "k"),
        );
        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&calls);
        sim.set_obstruction(Some(Rc::new(move |_x, _y| {
            seen.set(seen.get() + 1);
            false
        })));
        sim.tick(&TickInput::command(Command::Restart), FRAME);
        // The restarted level's first spawn goes through the check
        assert_eq!(calls.get(), 1);
        assert_eq!(sim.world().enemies.len(), 1);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let sim = quiet_sim(1);
        let json = serde_json::to_value(sim.snapshot()).unwrap();
        assert_eq!(json["maxHp"], 100.0);
        assert_eq!(json["killsNeeded"], KILL_TARGET);
        assert_eq!(json["gameState"], "playing");
        assert!(json["bossHp"].is_null());
        assert_eq!(json["gun"], "pistol");
    }

    #[test]
    fn test_commands_deserialize() {
        let cmd: Command =
            serde_json::from_str(r#"{"command": "apply_upgrade", "kind": "weapon"}"#).unwrap();
        assert_eq!(cmd, Command::ApplyUpgrade(UpgradeKind::Weapon));
        let cmd: Command = serde_json::from_str(r#"{"command": "pause"}"#).unwrap();
        assert_eq!(cmd, Command::Pause);
    }
}
