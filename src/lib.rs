//! # Bevy Gunplay
//!
//! Authoritative-with-prediction weapon combat simulation for Bevy 0.18.
//!
//! ## Features
//! - Fire-control gate for automatic, semi-automatic and burst weapons
//! - Clip/reserve ammo with timed reloads and shared ammo pools
//! - Recoil that kicks the aim and recovers over time
//! - Tick-seeded spread so predicted and authoritative shots match
//! - Distance falloff, headshots and damage messages
//! - Lag compensation of hitboxes on the authoritative peer
//! - Client-server glue behind the `netcode` feature
//!
//! ## Quick Start
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_gunplay::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(GunplayPluginGroup)
//!         .run();
//! }
//! ```

pub mod components;
pub mod error;
pub mod events;
pub mod resources;
pub mod systems;
pub mod types;

#[cfg(feature = "netcode")]
pub mod network;

pub mod prelude {
    pub use crate::components::*;
    pub use crate::error::{GunplayError, GunplayResult};
    pub use crate::events::*;
    pub use crate::resources::*;
    pub use crate::systems::simulation::{simulate_weapon_tick, ShooterView, TickContext, TickOutcome};
    pub use crate::types::*;
    pub use crate::GunplayPluginGroup;
    pub use crate::{GunplayCorePlugin, GunplayDebugPlugin, GunplaySet, LagCompensationPlugin};
}

use bevy::prelude::*;

/// Main plugin group that includes all gunplay subsystems.
///
/// # Example
/// ```no_run
/// use bevy::prelude::*;
/// use bevy_gunplay::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(DefaultPlugins)
///         .add_plugins(GunplayPluginGroup)
///         .run();
/// }
/// ```
#[derive(Default)]
pub struct GunplayPluginGroup;

impl PluginGroup for GunplayPluginGroup {
    fn build(self) -> bevy::app::PluginGroupBuilder {
        bevy::app::PluginGroupBuilder::start::<Self>()
            .add(GunplayCorePlugin)
            .add(LagCompensationPlugin)
            .add(GunplayDebugPlugin)
    }
}

/// Ordering of the gunplay systems inside `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GunplaySet {
    /// Tick counter and equip requests
    Prepare,
    /// Hitbox history snapshot
    Record,
    /// Per-weapon state machine
    Simulate,
    /// Edge reset and pickup spawning
    Cleanup,
}

/// Core weapon simulation plugin.
///
/// This plugin handles the per-tick weapon state machine:
/// - Fire-control gate, ammo and reload bookkeeping
/// - Recoil application to [`components::ViewAngles`]
/// - Tick-seeded bullet traces and damage messages
/// - Default spawning of dropped ammo
///
/// # Systems
/// - `advance_simulation_tick` - Advances the shared tick counter
/// - `apply_equip_requests` - Makes requested weapons active
/// - `simulate_weapons` - Runs every active weapon for one tick
/// - `clear_input_edges` - Consumes press edges
/// - `spawn_dropped_ammo` - Turns drop requests into pickups
pub struct GunplayCorePlugin;

impl Plugin for GunplayCorePlugin {
    /// Registers components with reflection, initializes resources and
    /// messages, and schedules the core systems.
    ///
    /// # Arguments
    /// * `app` - Mutable reference to the Bevy App
    fn build(&self, app: &mut App) {
        app.register_type::<components::Weapon>()
            .register_type::<components::WeaponState>()
            .register_type::<components::Shooter>()
            .register_type::<components::ViewAngles>()
            .register_type::<components::WeaponInput>()
            .register_type::<components::AmmoPool>()
            .register_type::<components::Hitbox>()
            .register_type::<components::Surface>()
            .register_type::<components::AmmoPickup>()
            .register_type::<resources::CombatConfig>()
            .register_type::<resources::SimulationTick>()
            .register_type::<types::NetRole>()
            .init_resource::<resources::CombatConfig>()
            .init_resource::<resources::WeaponCatalog>()
            .init_resource::<resources::SimulationTick>()
            .init_resource::<types::NetRole>()
            .add_message::<events::WeaponFired>()
            .add_message::<events::DryFired>()
            .add_message::<events::SecondaryFired>()
            .add_message::<events::ReloadStarted>()
            .add_message::<events::ReloadFinished>()
            .add_message::<events::BulletImpact>()
            .add_message::<events::DamageEvent>()
            .add_message::<events::AmmoDropRequest>()
            .add_message::<events::EquipWeapon>()
            .configure_sets(
                FixedUpdate,
                (
                    GunplaySet::Prepare,
                    GunplaySet::Record,
                    GunplaySet::Simulate,
                    GunplaySet::Cleanup,
                )
                    .chain(),
            )
            .add_systems(
                FixedUpdate,
                (
                    systems::simulation::advance_simulation_tick,
                    systems::simulation::apply_equip_requests,
                )
                    .chain()
                    .in_set(GunplaySet::Prepare),
            )
            .add_systems(
                FixedUpdate,
                (
                    systems::simulation::clear_input_edges,
                    systems::simulation::spawn_dropped_ammo,
                )
                    .in_set(GunplaySet::Cleanup),
            );

        // Physics-backed traces when avian3d is running, hitboxes only otherwise.
        #[cfg(feature = "dim3")]
        {
            use avian3d::prelude::SpatialQueryPipeline;
            app.add_systems(
                FixedUpdate,
                (
                    systems::simulation::simulate_weapons_with_physics
                        .run_if(resource_exists::<SpatialQueryPipeline>),
                    systems::simulation::simulate_weapons
                        .run_if(not(resource_exists::<SpatialQueryPipeline>)),
                )
                    .in_set(GunplaySet::Simulate),
            );
        }

        #[cfg(not(feature = "dim3"))]
        app.add_systems(
            FixedUpdate,
            systems::simulation::simulate_weapons.in_set(GunplaySet::Simulate),
        );
    }
}

/// Lag compensation plugin.
///
/// Records hitbox poses every tick on the authoritative peer so shots can be
/// resolved against what the firing client saw.
pub struct LagCompensationPlugin;

impl Plugin for LagCompensationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<resources::HitboxHistory>().add_systems(
            FixedUpdate,
            systems::lag_compensation::record_hitbox_history.in_set(GunplaySet::Record),
        );
    }
}

/// Debug plugin for trace visualization.
pub struct GunplayDebugPlugin;

impl Plugin for GunplayDebugPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<systems::debug::DebugTraces>().add_systems(
            Update,
            (
                systems::debug::collect_trace_debug,
                systems::debug::draw_trace_debug,
            )
                .chain(),
        );
    }
}
