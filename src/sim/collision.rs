//! Collision detection and damage resolution
//!
//! Everything is a circle. Resolution runs in a fixed order each frame:
//! 1. enemy contact with the player
//! 2. boss contact with the player
//! 3. hostile projectiles against the player
//! 4. orbit weapons and player projectiles against enemies and the boss
//! 5. residual fields against the player
//!
//! Deaths found here only flip flags and bump counters. The progression
//! stage reacts to them afterwards.

use std::collections::HashMap;

use glam::Vec2;

use super::entity::EntityId;
use super::projectile::{ProjectileKind, ResidualField};
use super::state::World;
use crate::clamp_to_world;
use crate::consts::*;

/// Circle-circle overlap on squared distances (touching counts)
#[inline]
pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    let reach = radius_a + radius_b;
    a.distance_squared(b) <= reach * reach
}

/// Per-target melee hit cooldown, shared by every orbit weapon
#[derive(Debug, Clone, Default)]
pub struct HitCooldowns {
    remaining: HashMap<EntityId, f32>,
}

impl HitCooldowns {
    /// Count down and forget targets whose window has closed
    pub fn tick(&mut self, dt: f32) {
        for t in self.remaining.values_mut() {
            *t = (*t - dt).max(0.0);
        }
        self.remaining.retain(|_, t| *t > 0.0);
    }

    /// Claim a hit on `id`. False while its window is still open.
    pub fn try_hit(&mut self, id: EntityId) -> bool {
        if self.is_cooling(id) {
            return false;
        }
        self.remaining.insert(id, HIT_COOLDOWN);
        true
    }

    pub fn is_cooling(&self, id: EntityId) -> bool {
        self.remaining.get(&id).is_some_and(|t| *t > 0.0)
    }

    pub fn clear(&mut self) {
        self.remaining.clear();
    }
}

/// What one collision pass did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionReport {
    /// Enemies destroyed by touching the player
    pub contact_kills: u32,
    /// Enemies destroyed by weapons
    pub weapon_kills: u32,
    pub player_damage: f32,
    pub boss_damage: f32,
}

/// Collision stage of the frame pipeline
pub fn resolve_collisions(world: &mut World, dt: f32) -> CollisionReport {
    let mut report = CollisionReport::default();
    world.hit_cooldowns.tick(dt);

    enemy_contacts(world, &mut report);
    boss_contact(world, &mut report);
    hostile_projectiles(world, &mut report);
    orbit_hits(world, &mut report);
    player_projectiles(world, &mut report);
    residual_fields(world, dt, &mut report);

    world.enemies.retain(|e| e.alive);
    world.projectiles.retain(|p| p.alive);
    report
}

fn hurt_player(world: &mut World, amount: f32, report: &mut CollisionReport) {
    if world.player.is_dead() {
        return;
    }
    world.player.health.damage(amount);
    report.player_damage += amount;
}

/// Enemies are single-use: touching the player kills them
fn enemy_contacts(world: &mut World, report: &mut CollisionReport) {
    for i in 0..world.enemies.len() {
        let enemy = &world.enemies[i];
        if !enemy.alive
            || !circles_overlap(enemy.pos, enemy.radius, world.player.pos, world.player.radius)
        {
            continue;
        }
        hurt_player(world, ENEMY_CONTACT_DAMAGE, report);
        if world.kill_enemy(i, false) {
            report.contact_kills += 1;
        }
    }
}

fn boss_contact(world: &mut World, report: &mut CollisionReport) {
    let Some(boss) = world.boss.as_ref().filter(|b| !b.is_dead()) else {
        return;
    };
    if world.player.boss_contact_cooldown > 0.0
        || !circles_overlap(boss.pos, boss.radius, world.player.pos, world.player.radius)
    {
        return;
    }
    let away = (world.player.pos - boss.pos)
        .try_normalize()
        .unwrap_or(Vec2::NEG_Y);

    hurt_player(world, BOSS_CONTACT_DAMAGE, report);
    world.player.boss_contact_cooldown = BOSS_CONTACT_COOLDOWN;
    world.player.pos = clamp_to_world(
        world.player.pos + away * BOSS_KNOCKBACK,
        world.player.radius,
    );
}

fn hostile_projectiles(world: &mut World, report: &mut CollisionReport) {
    for i in 0..world.projectiles.len() {
        let p = &world.projectiles[i];
        if !p.alive
            || !p.kind.is_hostile()
            || !circles_overlap(p.pos, p.radius, world.player.pos, world.player.radius)
        {
            continue;
        }
        let (damage, kind, pos) = (p.damage, p.kind, p.pos);
        world.projectiles[i].alive = false;
        hurt_player(world, damage, report);
        if kind == ProjectileKind::Thrown {
            world.fields.push(ResidualField::new(pos));
        }
    }
}

/// Apply damage to an enemy or the boss by id. Returns true when this hit
/// killed it.
fn damage_target(world: &mut World, id: EntityId, amount: f32, report: &mut CollisionReport) -> bool {
    if let Some(idx) = world.enemies.iter().position(|e| e.alive && e.id == id) {
        if !world.enemies[idx].health.damage(amount) {
            return false;
        }
        let killed = world.kill_enemy(idx, true);
        if killed {
            report.weapon_kills += 1;
        }
        return killed;
    }
    if let Some(boss) = world.boss.as_mut().filter(|b| b.id == id && !b.is_dead()) {
        report.boss_damage += amount.min(boss.health.current);
        return boss.health.damage(amount);
    }
    false
}

fn orbit_hits(world: &mut World, report: &mut CollisionReport) {
    let targets = world.targets();
    let hits = world.orbit.collect_hits(world.player.pos, &targets);
    let damage = world.orbit.damage;
    for id in hits {
        if world.hit_cooldowns.try_hit(id) {
            damage_target(world, id, damage, report);
        }
    }
}

/// First live enemy (then boss) a circle touches
fn first_contact(world: &World, pos: Vec2, radius: f32) -> Option<EntityId> {
    world
        .enemies
        .iter()
        .find(|e| e.alive && circles_overlap(e.pos, e.radius, pos, radius))
        .map(|e| e.id)
        .or_else(|| {
            world
                .boss
                .as_ref()
                .filter(|b| !b.is_dead() && circles_overlap(b.pos, b.radius, pos, radius))
                .map(|b| b.id)
        })
}

fn player_projectiles(world: &mut World, report: &mut CollisionReport) {
    for i in 0..world.projectiles.len() {
        let p = &world.projectiles[i];
        if !p.alive || p.kind.is_hostile() {
            continue;
        }
        let (kind, pos, radius, damage) = (p.kind, p.pos, p.radius, p.damage);
        let Some(hit) = first_contact(world, pos, radius) else {
            continue;
        };
        world.projectiles[i].alive = false;

        match kind {
            ProjectileKind::PlayerExplosive { blast_radius } => {
                let caught: Vec<EntityId> = world
                    .targets()
                    .into_iter()
                    .filter(|t| circles_overlap(t.pos, t.radius, pos, blast_radius))
                    .map(|t| t.id)
                    .collect();
                for id in caught {
                    damage_target(world, id, damage, report);
                }
            }
            _ => {
                damage_target(world, hit, damage, report);
            }
        }
    }
}

fn residual_fields(world: &mut World, dt: f32, report: &mut CollisionReport) {
    for i in 0..world.fields.len() {
        let ticks = world.fields[i].update(dt);
        if ticks == 0 {
            continue;
        }
        let field = &world.fields[i];
        let reach = field.radius + FIELD_TOUCH_SLACK;
        if world.player.pos.distance_squared(field.center) <= reach * reach {
            let damage = field.tick_damage * ticks as f32;
            hurt_player(world, damage, report);
        }
    }
    world.fields.retain(|f| !f.expired());
}
