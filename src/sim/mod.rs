//! Simulation module
//!
//! All gameplay logic lives here, with no rendering, audio, or input code:
//! - Single owner: the [`World`] holds every entity and system
//! - Seeded RNG only
//! - Fixed stage order per frame: movement, collision, progression

pub mod collision;
pub mod entity;
pub mod progression;
pub mod projectile;
pub mod spawn;
pub mod state;
pub mod tick;
pub mod weapons;

pub use collision::{CollisionReport, HitCooldowns, circles_overlap, resolve_collisions};
pub use entity::{Boss, Enemy, EnemyKind, EntityId, Health, Player};
pub use progression::{GamePhase, Progression, UpgradeKind};
pub use projectile::{Projectile, ProjectileKind, ResidualField};
pub use spawn::{ObstructionFn, SpawnDirector, SpawnPhase};
pub use state::{GameEvent, IdAllocator, World};
pub use tick::{Command, Simulation, Snapshot, TickInput};
pub use weapons::{GunKind, Gunner, MuzzleFn, OrbitWeapons, Pet, Target};
