//! Ammo and reload state machine.
//!
//! A weapon is either idle or reloading. Reloads draw from the weapon's own
//! reserve when its ammo type is `None`, otherwise from the owner's
//! [`AmmoPool`]. Only the authoritative peer drains the pool; clients
//! compute the same transfer and wait for replication to correct the pool.

use bevy::prelude::*;

use crate::components::{AmmoPool, ButtonState, WeaponState};
use crate::events::AmmoDropRequest;
use crate::resources::{CombatConfig, WeaponDefinition};

/// Rounds the reload source currently holds.
pub fn available_ammo(
    definition: &WeaponDefinition,
    state: &WeaponState,
    pool: Option<&AmmoPool>,
) -> u32 {
    if definition.ammo_type.is_self_contained() {
        state.reserve_ammo
    } else {
        pool.map_or(0, |pool| pool.count(definition.ammo_type))
    }
}

/// Idle to reloading is allowed when the clip has room, there is ammo to
/// load (or ammo is unlimited), reload was just pressed and no reload is
/// already running.
pub fn can_reload(
    definition: &WeaponDefinition,
    state: &WeaponState,
    reload: ButtonState,
    available: u32,
) -> bool {
    if state.is_reloading {
        return false;
    }
    if state.ammo_in_clip >= definition.clip_size {
        return false;
    }
    if !state.unlimited_ammo && available == 0 {
        return false;
    }
    reload.pressed
}

/// Enters the reloading state. Returns false if a reload was already running.
pub fn start_reload(state: &mut WeaponState) -> bool {
    if state.is_reloading {
        return false;
    }
    state.is_reloading = true;
    state.time_since_reload_start = 0.0;
    state.burst_remaining = 0;
    true
}

/// Removes up to `wanted` rounds from the reload source and returns how many
/// were granted.
pub fn take_ammo(
    definition: &WeaponDefinition,
    state: &mut WeaponState,
    pool: Option<&mut AmmoPool>,
    wanted: u32,
    authoritative: bool,
) -> u32 {
    if state.unlimited_ammo {
        return wanted;
    }

    if definition.ammo_type.is_self_contained() {
        let granted = wanted.min(state.reserve_ammo);
        state.reserve_ammo -= granted;
        return granted;
    }

    let Some(pool) = pool else {
        return 0;
    };
    let granted = wanted.min(pool.count(definition.ammo_type));
    if authoritative {
        pool.take(definition.ammo_type, granted);
    }
    granted
}

/// Leaves the reloading state and tops up the clip. Returns the number of
/// rounds loaded.
pub fn finish_reload(
    definition: &WeaponDefinition,
    state: &mut WeaponState,
    pool: Option<&mut AmmoPool>,
    authoritative: bool,
) -> u32 {
    state.is_reloading = false;
    let deficit = definition.clip_size.saturating_sub(state.ammo_in_clip);
    let loaded = take_ammo(definition, state, pool, deficit, authoritative);
    state.ammo_in_clip += loaded;
    loaded
}

/// Where and how a dropped clip leaves the shooter.
#[derive(Clone, Copy, Debug)]
pub struct DropOrigin {
    pub dropper: Entity,
    pub eye: Vec3,
    pub aim: Quat,
    pub velocity: Vec3,
}

/// Throws the clip's contents into the world.
///
/// Self-contained weapons and empty clips do nothing. Otherwise the clip is
/// emptied on every peer and the authoritative peer gets a spawn request.
pub fn drop_ammo(
    definition: &WeaponDefinition,
    state: &mut WeaponState,
    origin: DropOrigin,
    config: &CombatConfig,
    authoritative: bool,
) -> Option<AmmoDropRequest> {
    if definition.ammo_type.is_self_contained() || state.ammo_in_clip == 0 {
        return None;
    }

    let forward = origin.aim * Vec3::NEG_Z;
    let request = authoritative.then(|| AmmoDropRequest {
        dropper: origin.dropper,
        ammo_type: definition.ammo_type,
        amount: state.ammo_in_clip,
        position: origin.eye + forward * config.drop_distance,
        rotation: origin.aim,
        velocity: origin.velocity + forward * config.drop_speed,
    });

    state.ammo_in_clip = 0;
    request
}
