//! Global resources for the weapon simulation.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{GunplayError, GunplayResult};
use crate::types::{AmmoType, FireMode};

pub use crate::systems::lag_compensation::HitboxHistory;

/// Index of a definition inside the [`WeaponCatalog`].
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponId(pub u16);

/// Immutable description of a weapon kind.
///
/// Loaded once into the [`WeaponCatalog`] and shared by every instance of
/// that kind. Missing fields take the defaults listed on [`Default`].
///
/// # Fields
/// * `name` - Unique catalog name
/// * `ammo_type` - Ammo family; `None` means a self-contained reserve
/// * `fire_mode` - Trigger policy
/// * `bullets_per_fire` - Pellets per shot
/// * `clip_size` - Clip capacity
/// * `damage` - Base damage per pellet
/// * `damage_falloff_start` / `damage_falloff_end` - Falloff distances (meters)
/// * `headshot_multiplier` - Multiplier for head hits
/// * `spread` - Spread cone scale
/// * `primary_rate` / `secondary_rate` - Shots per second; zero or less means no limit
/// * `reserve_ammo` - Reserve a self-contained weapon spawns with
/// * `reload_time` - Reload duration (seconds)
/// * `vertical_recoil` - Pitch kick per shot (rad/s of pending displacement)
/// * `horizontal_recoil_range` - Yaw kick is uniform in `[-range, range]`
/// * `recoil_recovery_scale` - How much of the applied displacement is paid back
/// * `deploy_time` - Seconds after equip before the weapon reacts
///
/// # Example
/// ```
/// use bevy_gunplay::resources::WeaponDefinition;
/// use bevy_gunplay::types::FireMode;
///
/// let shotgun = WeaponDefinition {
///     name: "shotgun".to_string(),
///     fire_mode: FireMode::Semi,
///     bullets_per_fire: 8,
///     clip_size: 6,
///     damage: 12.0,
///     spread: 0.2,
///     ..Default::default()
/// };
/// assert!(shotgun.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponDefinition {
    pub name: String,
    pub ammo_type: AmmoType,
    pub fire_mode: FireMode,
    pub bullets_per_fire: u32,
    pub clip_size: u32,
    pub damage: f32,
    pub damage_falloff_start: f32,
    pub damage_falloff_end: f32,
    pub headshot_multiplier: f32,
    pub spread: f32,
    pub primary_rate: f32,
    pub secondary_rate: f32,
    pub reserve_ammo: u32,
    pub reload_time: f32,
    pub vertical_recoil: f32,
    pub horizontal_recoil_range: f32,
    pub recoil_recovery_scale: f32,
    pub deploy_time: f32,
}

impl Default for WeaponDefinition {
    /// Default values:
    /// - Self-contained ammo, automatic fire
    /// - One pellet, 30 round clip, 20 damage
    /// - No falloff, no spread, no recoil, no rate limit
    /// - 2 second reload
    fn default() -> Self {
        Self {
            name: String::from("weapon"),
            ammo_type: AmmoType::None,
            fire_mode: FireMode::Automatic,
            bullets_per_fire: 1,
            clip_size: 30,
            damage: 20.0,
            damage_falloff_start: 0.0,
            damage_falloff_end: 0.0,
            headshot_multiplier: 1.0,
            spread: 0.0,
            primary_rate: 0.0,
            secondary_rate: 0.0,
            reserve_ammo: 0,
            reload_time: 2.0,
            vertical_recoil: 0.0,
            horizontal_recoil_range: 0.0,
            recoil_recovery_scale: 0.0,
            deploy_time: 0.0,
        }
    }
}

impl WeaponDefinition {
    /// Checks the values the simulation relies on.
    pub fn validate(&self) -> GunplayResult<()> {
        let invalid = |reason: &str| {
            Err(GunplayError::InvalidDefinition {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        if self.name.is_empty() {
            return invalid("name is empty");
        }
        if self.clip_size == 0 {
            return invalid("clip_size must be at least 1");
        }
        if self.bullets_per_fire == 0 {
            return invalid("bullets_per_fire must be at least 1");
        }
        if let FireMode::Burst { shots: 0 } = self.fire_mode {
            return invalid("burst must fire at least one shot");
        }
        let non_negative = [
            ("damage", self.damage),
            ("headshot_multiplier", self.headshot_multiplier),
            ("spread", self.spread),
            ("reload_time", self.reload_time),
            ("horizontal_recoil_range", self.horizontal_recoil_range),
            ("recoil_recovery_scale", self.recoil_recovery_scale),
            ("deploy_time", self.deploy_time),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return invalid(&format!("{field} must be finite and non-negative"));
            }
        }
        let finite = [
            ("damage_falloff_start", self.damage_falloff_start),
            ("damage_falloff_end", self.damage_falloff_end),
            ("primary_rate", self.primary_rate),
            ("secondary_rate", self.secondary_rate),
            ("vertical_recoil", self.vertical_recoil),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return invalid(&format!("{field} must be finite"));
            }
        }
        Ok(())
    }
}

/// All weapon definitions known to this peer, indexed by [`WeaponId`].
///
/// Every peer must build the catalog in the same order so ids agree.
///
/// # Example
/// ```
/// use bevy_gunplay::resources::WeaponCatalog;
///
/// let catalog = WeaponCatalog::from_ron(r#"[
///     (name: "pistol", fire_mode: Semi, clip_size: 12, damage: 25.0),
///     (name: "rifle", ammo_type: Rifle, primary_rate: 10.0),
/// ]"#).unwrap();
/// let rifle = catalog.id_of("rifle").unwrap();
/// assert_eq!(catalog.get(rifle).unwrap().damage, 20.0);
/// ```
#[derive(Resource, Clone, Debug, Default)]
pub struct WeaponCatalog {
    definitions: Vec<WeaponDefinition>,
}

impl WeaponCatalog {
    /// Parses a RON list of definitions.
    pub fn from_ron(text: &str) -> GunplayResult<Self> {
        let definitions: Vec<WeaponDefinition> = ron::from_str(text)?;
        let mut catalog = Self::default();
        for definition in definitions {
            catalog.register(definition)?;
        }
        Ok(catalog)
    }

    /// Validates and appends a definition, returning its id.
    pub fn register(&mut self, definition: WeaponDefinition) -> GunplayResult<WeaponId> {
        definition.validate()?;
        if self.id_of(&definition.name).is_some() {
            return Err(GunplayError::DuplicateWeapon(definition.name));
        }
        let id = u16::try_from(self.definitions.len()).map_err(|_| GunplayError::CatalogFull)?;
        self.definitions.push(definition);
        Ok(WeaponId(id))
    }

    pub fn get(&self, id: WeaponId) -> Option<&WeaponDefinition> {
        self.definitions.get(id.0 as usize)
    }

    /// Like [`Self::get`] but reports unknown ids as an error.
    pub fn try_get(&self, id: WeaponId) -> GunplayResult<&WeaponDefinition> {
        self.get(id).ok_or(GunplayError::UnknownWeapon(id))
    }

    pub fn id_of(&self, name: &str) -> Option<WeaponId> {
        self.definitions
            .iter()
            .position(|definition| definition.name == name)
            .map(|index| WeaponId(index as u16))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Global configuration for the weapon simulation.
///
/// # Fields
/// * `max_trace_distance` - Bullet range (meters)
/// * `bullet_radius` - Thickness of every bullet trace (meters)
/// * `impact_force` - Force scale; the reported force is `direction * 100 * impact_force`
/// * `tracer_min_distance` - Impacts farther than this get a tracer
/// * `drop_distance` - How far ahead of the eye dropped ammo appears
/// * `drop_speed` - Throw speed added to the owner velocity for dropped ammo
/// * `per_weapon_spread_seed` - Salt spread with the weapon network id
/// * `history_ticks` - How many ticks of hitbox history the server keeps
/// * `spawn_ammo_pickups` - Run the default spawner for ammo drop requests
/// * `debug_draw` - Draw recent traces with gizmos
#[derive(Resource, Reflect, Clone, Debug)]
#[reflect(Resource)]
pub struct CombatConfig {
    pub max_trace_distance: f32,
    pub bullet_radius: f32,
    pub impact_force: f32,
    pub tracer_min_distance: f32,
    pub drop_distance: f32,
    pub drop_speed: f32,
    pub per_weapon_spread_seed: bool,
    pub history_ticks: usize,
    pub spawn_ammo_pickups: bool,
    pub debug_draw: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_trace_distance: 500.0,
            bullet_radius: 0.075,
            impact_force: 1.5,
            tracer_min_distance: 5.0,
            drop_distance: 1.0,
            drop_speed: 7.5,
            per_weapon_spread_seed: true,
            history_ticks: 32,
            spawn_ammo_pickups: true,
            debug_draw: false,
        }
    }
}

/// Discrete fixed-tick counter. Advanced once per `FixedUpdate` before any
/// weapon runs; seeds all per-shot randomness.
#[derive(Resource, Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[reflect(Resource)]
pub struct SimulationTick(pub u64);
