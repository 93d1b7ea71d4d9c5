//! Core components for the weapon simulation.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::resources::{WeaponDefinition, WeaponId};
use crate::types::{AmmoType, SurfaceKind};

/// A weapon instance in the world.
///
/// The definition lives in [`crate::resources::WeaponCatalog`]; the entity
/// only stores the id it was created from.
///
/// # Fields
/// * `id` - Catalog entry this weapon was built from
/// * `owner` - Shooter currently carrying the weapon, if any
/// * `net_id` - Stable identifier shared by every peer, used to salt spread
///
/// # Example
/// ```
/// use bevy_gunplay::components::Weapon;
/// use bevy_gunplay::resources::WeaponId;
///
/// let weapon = Weapon::new(WeaponId(0), 42);
/// assert!(weapon.owner.is_none());
/// ```
#[derive(Component, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct Weapon {
    /// Catalog id
    pub id: WeaponId,
    /// Owning shooter
    pub owner: Option<Entity>,
    /// Network-stable id
    pub net_id: u64,
}

impl Weapon {
    /// Creates an unowned weapon.
    pub fn new(id: WeaponId, net_id: u64) -> Self {
        Self {
            id,
            owner: None,
            net_id,
        }
    }

    /// Builder pattern: set owner
    pub fn with_owner(mut self, owner: Entity) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Mutable per-instance weapon state.
///
/// Timers count seconds since the corresponding action and start at
/// infinity, so a freshly spawned weapon is ready to fire.
///
/// # Fields
/// * `ammo_in_clip` - Rounds that can be fired without reloading
/// * `reserve_ammo` - Self-contained reserve (only used by `AmmoType::None`)
/// * `is_reloading` - Reload in progress
/// * `time_since_primary_fire` - Seconds since the primary trigger last fired
/// * `time_since_secondary_fire` - Seconds since the secondary trigger last fired
/// * `time_since_reload_start` - Seconds since the current reload began
/// * `time_since_deployed` - Seconds since the weapon was equipped
/// * `accumulated_recoil` - Pending aim displacement, radians per second (x yaw, y pitch)
/// * `unlimited_ammo` - Reloads are free and never drain a source
/// * `burst_remaining` - Rounds left in the current burst
#[derive(Component, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
pub struct WeaponState {
    pub ammo_in_clip: u32,
    pub reserve_ammo: u32,
    pub is_reloading: bool,
    pub time_since_primary_fire: f32,
    pub time_since_secondary_fire: f32,
    pub time_since_reload_start: f32,
    pub time_since_deployed: f32,
    pub accumulated_recoil: Vec2,
    pub unlimited_ammo: bool,
    pub burst_remaining: u32,
}

impl Default for WeaponState {
    fn default() -> Self {
        Self {
            ammo_in_clip: 0,
            reserve_ammo: 0,
            is_reloading: false,
            time_since_primary_fire: f32::INFINITY,
            time_since_secondary_fire: f32::INFINITY,
            time_since_reload_start: 0.0,
            time_since_deployed: f32::INFINITY,
            accumulated_recoil: Vec2::ZERO,
            unlimited_ammo: false,
            burst_remaining: 0,
        }
    }
}

impl WeaponState {
    /// Fresh state for a newly spawned weapon: full clip, and the
    /// definition's reserve when the weapon is self-contained.
    pub fn new(definition: &WeaponDefinition) -> Self {
        let reserve_ammo = if definition.ammo_type.is_self_contained() {
            definition.reserve_ammo
        } else {
            0
        };
        Self {
            ammo_in_clip: definition.clip_size,
            reserve_ammo,
            ..Default::default()
        }
    }

    /// Rounds currently in the clip.
    pub fn clip(&self) -> u32 {
        self.ammo_in_clip
    }

    /// Self-contained reserve rounds.
    pub fn reserve(&self) -> u32 {
        self.reserve_ammo
    }

    pub fn set_unlimited_ammo(&mut self, unlimited: bool) {
        self.unlimited_ammo = unlimited;
    }

    /// Resets transient state when the weapon becomes the active item.
    pub fn on_equip(&mut self) {
        self.is_reloading = false;
        self.time_since_reload_start = 0.0;
        self.time_since_deployed = 0.0;
        self.burst_remaining = 0;
    }
}

/// Something that carries and fires weapons.
///
/// The eye position is the entity's translation raised by `eye_height`.
#[derive(Component, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct Shooter {
    /// Eye height above the entity origin (meters)
    pub eye_height: f32,
    /// Current velocity, inherited by dropped ammo (m/s)
    pub velocity: Vec3,
    /// Weapon currently held
    pub active_weapon: Option<Entity>,
}

impl Default for Shooter {
    fn default() -> Self {
        Self {
            eye_height: 1.6,
            velocity: Vec3::ZERO,
            active_weapon: None,
        }
    }
}

/// Aim orientation in radians. Positive pitch looks up, positive yaw turns
/// left around +Y. Zero looks down -Z.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_gunplay::components::ViewAngles;
///
/// let forward = ViewAngles::default().forward();
/// assert!(forward.abs_diff_eq(Vec3::NEG_Z, 1e-6));
/// ```
#[derive(Component, Reflect, Clone, Copy, Debug, Default, PartialEq)]
#[reflect(Component)]
pub struct ViewAngles {
    pub pitch: f32,
    pub yaw: f32,
}

impl ViewAngles {
    /// Pitch limit applied whenever the aim is displaced.
    pub const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }

    /// Aim as a rotation.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Unit aim direction.
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }
}

/// State of one button for the current tick.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    /// Went down this tick
    pub pressed: bool,
    /// Is down this tick
    pub held: bool,
}

impl ButtonState {
    /// Feeds the raw button level for a new tick and derives the press edge.
    pub fn update(&mut self, down: bool) {
        self.pressed = down && !self.held;
        self.held = down;
    }
}

/// Per-tick input for a weapon, written by the input layer (or the network
/// server) before the simulation runs.
///
/// # Fields
/// * `primary` / `secondary` / `reload` / `drop` - Button states
/// * `drop_modifier` - Must be held for the drop button to act
/// * `input_tick` - Tick the client saw when it produced this input; it seeds
///   the shot and the authoritative side rewinds hitboxes to it
/// * `remote_aim` - The owner's `ViewAngles` were received from the client
///   and already carry its recoil
#[derive(Component, Reflect, Clone, Debug, Default, PartialEq)]
#[reflect(Component)]
pub struct WeaponInput {
    pub primary: ButtonState,
    pub secondary: ButtonState,
    pub reload: ButtonState,
    pub drop: ButtonState,
    pub drop_modifier: bool,
    pub input_tick: Option<u64>,
    pub remote_aim: bool,
}

impl WeaponInput {
    /// Clears press edges once a tick has consumed them.
    pub fn clear_edges(&mut self) {
        self.primary.pressed = false;
        self.secondary.pressed = false;
        self.reload.pressed = false;
        self.drop.pressed = false;
    }

    /// Lets go of every button and forgets the input tick, for a tick on
    /// which the driving client sent nothing.
    pub fn release(&mut self) {
        self.clear_edges();
        self.primary.held = false;
        self.secondary.held = false;
        self.reload.held = false;
        self.drop.held = false;
        self.drop_modifier = false;
        self.input_tick = None;
    }
}

/// Shared ammunition carried by a shooter, one counter per [`AmmoType`].
///
/// # Example
/// ```
/// use bevy_gunplay::components::AmmoPool;
/// use bevy_gunplay::types::AmmoType;
///
/// let mut pool = AmmoPool::default().with(AmmoType::Rifle, 90);
/// assert_eq!(pool.take(AmmoType::Rifle, 30), 30);
/// assert_eq!(pool.count(AmmoType::Rifle), 60);
/// ```
#[derive(Component, Reflect, Clone, Debug, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct AmmoPool {
    counts: [u32; AmmoType::COUNT],
}

impl AmmoPool {
    /// Builder pattern: set the count of one ammo type
    pub fn with(mut self, ammo_type: AmmoType, amount: u32) -> Self {
        self.counts[ammo_type.index()] = amount;
        self
    }

    pub fn count(&self, ammo_type: AmmoType) -> u32 {
        self.counts[ammo_type.index()]
    }

    /// Removes up to `amount` rounds and returns how many were removed.
    pub fn take(&mut self, ammo_type: AmmoType, amount: u32) -> u32 {
        let slot = &mut self.counts[ammo_type.index()];
        let taken = amount.min(*slot);
        *slot -= taken;
        taken
    }

    pub fn give(&mut self, ammo_type: AmmoType, amount: u32) {
        let slot = &mut self.counts[ammo_type.index()];
        *slot = slot.saturating_add(amount);
    }
}

/// Damageable volume of a character: a head sphere on top of a body box.
///
/// Offsets are relative to the entity translation; the body box is axis
/// aligned. Hitboxes are traced analytically so they can be rewound.
#[derive(Component, Reflect, Clone, Debug, PartialEq)]
#[reflect(Component)]
pub struct Hitbox {
    /// Head sphere center offset
    pub head_offset: Vec3,
    /// Head sphere radius (meters)
    pub head_radius: f32,
    /// Body box center offset
    pub body_offset: Vec3,
    /// Body box half extents (meters)
    pub body_half_extents: Vec3,
}

impl Default for Hitbox {
    /// Roughly human sized: 1.8 m tall standing on the entity origin.
    fn default() -> Self {
        Self {
            head_offset: Vec3::new(0.0, 1.65, 0.0),
            head_radius: 0.15,
            body_offset: Vec3::new(0.0, 0.75, 0.0),
            body_half_extents: Vec3::new(0.25, 0.75, 0.2),
        }
    }
}

/// Surface classification of a world collider.
#[derive(Component, Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct Surface(pub SurfaceKind);

/// Ammunition lying in the world, spawned from an [`crate::events::AmmoDropRequest`].
#[derive(Component, Reflect, Clone, Debug, PartialEq)]
#[reflect(Component)]
pub struct AmmoPickup {
    pub ammo_type: AmmoType,
    pub amount: u32,
    /// Shooter that dropped it
    pub dropper: Option<Entity>,
}
