//! Messages emitted by the weapon simulation.
//!
//! Note: In Bevy 0.18, buffered events use the `Message` trait instead of `Event`.
//! Presentation messages are written on every peer; [`DamageEvent`] and
//! [`AmmoDropRequest`] only on the authoritative side.

use bevy::ecs::message::Message;
use bevy::prelude::*;

use crate::resources::WeaponId;
use crate::types::{AmmoType, HitEffectType, HitGroup, SurfaceKind};

/// A primary shot left the weapon.
///
/// # Fields
/// * `weapon` - Weapon entity that fired
/// * `shooter` - Owner of the weapon
/// * `origin` - Eye position the pellets were traced from
/// * `direction` - Aim direction before spread
/// * `pellets` - Number of pellets traced
/// * `tick` - Simulation tick of the shot
#[derive(Message, Clone, Debug)]
pub struct WeaponFired {
    pub weapon: Entity,
    pub shooter: Entity,
    pub origin: Vec3,
    pub direction: Vec3,
    pub pellets: u32,
    pub tick: u64,
}

/// The primary trigger was pulled on an empty clip.
#[derive(Message, Clone, Debug)]
pub struct DryFired {
    pub weapon: Entity,
    pub shooter: Entity,
}

/// The secondary trigger fired. No built-in behaviour; games attach their own.
#[derive(Message, Clone, Debug)]
pub struct SecondaryFired {
    pub weapon: Entity,
    pub shooter: Entity,
}

/// A reload began.
#[derive(Message, Clone, Debug)]
pub struct ReloadStarted {
    pub weapon: Entity,
    pub shooter: Entity,
}

/// A reload completed.
///
/// # Fields
/// * `rounds_loaded` - Rounds moved into the clip; may be zero if the
///   source ran dry during the reload
#[derive(Message, Clone, Debug)]
pub struct ReloadFinished {
    pub weapon: Entity,
    pub shooter: Entity,
    pub rounds_loaded: u32,
}

/// A bullet trace segment finished.
///
/// Written for every trace record on every peer, so clients can play
/// impacts and tracers for their predicted shots.
///
/// # Fields
/// * `start` / `end` - Segment endpoints
/// * `normal` - Surface normal at `end`
/// * `surface` - Surface classification
/// * `effect` - Effect to play for that surface
/// * `entity` - Struck entity, if any
/// * `hit` - The segment ended on geometry; false for a miss at full range
/// * `tracer` - Segment is long enough to draw a tracer
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_gunplay::events::BulletImpact;
/// use bevy_gunplay::types::{HitEffectType, SurfaceKind};
///
/// let impact = BulletImpact {
///     weapon: Entity::PLACEHOLDER,
///     start: Vec3::ZERO,
///     end: Vec3::new(0.0, 0.0, -12.0),
///     normal: Vec3::Z,
///     surface: SurfaceKind::Concrete,
///     effect: HitEffectType::Dust,
///     entity: None,
///     hit: true,
///     tracer: true,
/// };
/// assert_eq!(impact.length(), 12.0);
/// ```
#[derive(Message, Clone, Debug)]
pub struct BulletImpact {
    pub weapon: Entity,
    pub start: Vec3,
    pub end: Vec3,
    pub normal: Vec3,
    pub surface: SurfaceKind,
    pub effect: HitEffectType,
    pub entity: Option<Entity>,
    pub hit: bool,
    pub tracer: bool,
}

impl BulletImpact {
    /// Segment length (meters).
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Damage dealt by one pellet to one entity. Consumed by the game's health
/// system.
///
/// # Fields
/// * `target` - Entity that was hit
/// * `attacker` - Owner of the weapon
/// * `weapon` - Weapon entity
/// * `weapon_id` - Catalog id of the weapon
/// * `amount` - Damage after falloff and headshot multiplier
/// * `base_damage` - Definition damage before falloff and multiplier
/// * `position` - Hit position
/// * `direction` - Pellet direction
/// * `force` - Impulse to apply to the target
/// * `origin` - Where the pellet was traced from
/// * `hit_group` - Hit zone
/// * `distance` - Travel distance of the pellet (meters)
/// * `attacker_distance` - Distance between attacker and target origins (meters)
#[derive(Message, Clone, Debug)]
pub struct DamageEvent {
    pub target: Entity,
    pub attacker: Entity,
    pub weapon: Entity,
    pub weapon_id: WeaponId,
    pub amount: f32,
    pub base_damage: f32,
    pub position: Vec3,
    pub direction: Vec3,
    pub force: Vec3,
    pub origin: Vec3,
    pub hit_group: HitGroup,
    pub distance: f32,
    pub attacker_distance: f32,
}

impl DamageEvent {
    pub fn is_headshot(&self) -> bool {
        self.hit_group == HitGroup::Head
    }
}

/// Request to put dropped ammo into the world.
///
/// The default spawner turns this into an [`crate::components::AmmoPickup`];
/// games can disable it through [`crate::resources::CombatConfig`] and
/// spawn their own.
#[derive(Message, Clone, Debug)]
pub struct AmmoDropRequest {
    pub dropper: Entity,
    pub ammo_type: AmmoType,
    pub amount: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
}

/// Makes `weapon` the active weapon of `shooter`.
///
/// Written by the inventory layer; the simulation resets the weapon's
/// deploy and reload timers.
#[derive(Message, Clone, Debug)]
pub struct EquipWeapon {
    pub shooter: Entity,
    pub weapon: Entity,
}
