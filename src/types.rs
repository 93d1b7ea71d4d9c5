//! Common types and enums for the weapon simulation.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "dim3")]
use avian3d::prelude::PhysicsLayer;

/// Trigger policy for the primary fire button.
///
/// Decides whether holding the trigger produces repeated shots or whether
/// each shot needs its own press.
///
/// # Variants
/// * `Automatic` - Fires every eligible tick while the trigger is held
/// * `Semi` - Fires once per released-to-pressed transition
/// * `Burst` - A press arms `shots` rounds that fire at the rate gate
///
/// # Example
/// ```
/// use bevy_gunplay::types::FireMode;
///
/// let mode = FireMode::Burst { shots: 3 };
/// assert!(mode.is_burst());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum FireMode {
    #[default]
    /// Hold to keep firing
    Automatic,
    /// One shot per press
    Semi,
    /// Fixed-length burst per press
    Burst {
        /// Rounds fired per press
        shots: u32,
    },
}

impl FireMode {
    /// Returns true for the burst variant.
    pub fn is_burst(&self) -> bool {
        matches!(self, FireMode::Burst { .. })
    }
}

/// Ammunition family a weapon consumes.
///
/// `None` marks a self-contained weapon: it carries its own reserve counter
/// and never draws from (or drops into) the owner's shared pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum AmmoType {
    #[default]
    /// Self-contained reserve on the weapon itself
    None,
    /// Pistol and SMG rounds
    PistolSmg,
    /// Shotgun shells
    Shotgun,
    /// Sniper rounds
    Sniper,
    /// Magnum rounds
    Magnum,
    /// Rifle rounds
    Rifle,
}

impl AmmoType {
    /// Number of ammo types, including `None`.
    pub const COUNT: usize = 6;

    /// Stable slot index used by [`crate::components::AmmoPool`].
    pub fn index(self) -> usize {
        match self {
            AmmoType::None => 0,
            AmmoType::PistolSmg => 1,
            AmmoType::Shotgun => 2,
            AmmoType::Sniper => 3,
            AmmoType::Magnum => 4,
            AmmoType::Rifle => 5,
        }
    }

    /// True when the weapon keeps its own reserve instead of using a pool.
    pub fn is_self_contained(self) -> bool {
        self == AmmoType::None
    }
}

/// Which part of a damageable body a trace struck.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum HitGroup {
    #[default]
    /// World geometry or anything without hit zones
    Generic,
    /// Head sphere of a [`crate::components::Hitbox`]
    Head,
    /// Body box of a [`crate::components::Hitbox`]
    Body,
}

/// Surface classification reported with every impact.
///
/// # Variants
/// * `Default` - Unclassified geometry
/// * `Concrete` - Concrete, stone, brick
/// * `Metal` - Metal plates and props
/// * `Wood` - Wooden props and structures
/// * `Dirt` - Terrain
/// * `Glass` - Windows
/// * `Water` - Liquid volumes
/// * `Flesh` - Characters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum SurfaceKind {
    #[default]
    Default,
    Concrete,
    Metal,
    Wood,
    Dirt,
    Glass,
    Water,
    Flesh,
}

impl SurfaceKind {
    /// Effect the presentation layer should play for an impact on this surface.
    pub fn impact_effect(self) -> HitEffectType {
        match self {
            SurfaceKind::Default | SurfaceKind::Concrete | SurfaceKind::Dirt => HitEffectType::Dust,
            SurfaceKind::Metal => HitEffectType::Sparks,
            SurfaceKind::Wood => HitEffectType::WoodChips,
            SurfaceKind::Glass => HitEffectType::Glass,
            SurfaceKind::Water => HitEffectType::Water,
            SurfaceKind::Flesh => HitEffectType::Blood,
        }
    }
}

/// Types of visual effects on hit.
///
/// # Example
/// ```
/// use bevy_gunplay::types::{HitEffectType, SurfaceKind};
///
/// assert_eq!(SurfaceKind::Metal.impact_effect(), HitEffectType::Sparks);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Reflect)]
pub enum HitEffectType {
    #[default]
    /// Metallic sparks for metal surfaces
    Sparks,
    /// Dust clouds for concrete, stone, or earth
    Dust,
    /// Blood splatter for characters
    Blood,
    /// Wood fragments for wooden surfaces
    WoodChips,
    /// Splash effects for liquid surfaces
    Water,
    /// Shattered glass fragments for glass surfaces
    Glass,
}

/// Which side of the network this peer simulates.
///
/// Only authoritative peers submit damage, decrement shared ammo pools and
/// spawn dropped ammo. Every peer runs the rest of the simulation.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq, Default, Reflect)]
#[reflect(Resource)]
pub enum NetRole {
    /// Single process that is its own authority (listen server, offline)
    #[default]
    Standalone,
    /// Dedicated authoritative server
    Server,
    /// Predicting client
    Client,
}

impl NetRole {
    /// True for peers whose results are the source of truth.
    pub fn is_authoritative(self) -> bool {
        matches!(self, NetRole::Standalone | NetRole::Server)
    }
}

/// Collision layers the bullet traces care about.
///
/// Characters are skipped by physics traces because their damageable volumes
/// are [`crate::components::Hitbox`] components, which lag compensation can
/// rewind.
#[cfg(feature = "dim3")]
#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum CombatLayer {
    #[default]
    Default,
    Water,
    Debris,
    Character,
}

/// Parameters of a single thick bullet trace.
///
/// # Fields
/// * `origin` - World-space start of the trace
/// * `direction` - Normalized travel direction
/// * `max_distance` - Trace length in meters
/// * `radius` - Bullet thickness; zero casts an infinitely thin ray
/// * `include_water` - Whether the water layer stops the trace
/// * `exclude` - Entities the trace passes through (owner, weapon)
#[derive(Clone, Debug)]
pub struct TraceQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
    pub radius: f32,
    pub include_water: bool,
    pub exclude: Vec<Entity>,
}

impl TraceQuery {
    /// True when `entity` must be ignored by this trace.
    pub fn excludes(&self, entity: Entity) -> bool {
        self.exclude.contains(&entity)
    }
}

/// Hit result from a trace.
///
/// # Fields
/// * `entity` - The entity that was hit
/// * `point` - World-space coordinates of the hit point
/// * `normal` - Surface normal at the hit point
/// * `distance` - Distance from the trace origin to the hit point
/// * `surface` - Surface classification of the struck collider
/// * `hit_group` - Hit zone when a hitbox was struck
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_gunplay::types::{HitGroup, HitResult, SurfaceKind};
///
/// let hit = HitResult {
///     entity: Entity::PLACEHOLDER,
///     point: Vec3::ZERO,
///     normal: Vec3::Y,
///     distance: 10.0,
///     surface: SurfaceKind::Concrete,
///     hit_group: HitGroup::Generic,
/// };
/// assert_eq!(hit.distance, 10.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HitResult {
    pub entity: Entity,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub surface: SurfaceKind,
    pub hit_group: HitGroup,
}

/// World query surface used by the ballistic resolver.
///
/// Implemented by the avian3d-backed physics geometry, by the analytic
/// hitbox set, and by the combination of both the simulation hands to the
/// resolver. Tests implement it directly.
pub trait SpatialQueryExt {
    /// Cast a thick ray and return the closest hit, if any.
    fn cast_bullet(&self, query: &TraceQuery) -> Option<HitResult>;

    /// Whether `point` lies inside a water volume.
    fn is_point_in_water(&self, point: Vec3) -> bool;
}
