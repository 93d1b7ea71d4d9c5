//! Client-server glue for the weapon simulation.
//!
//! This module is only available with the `netcode` feature flag. Clients
//! predict their own weapons and send one [`protocol::WeaponCommand`] per
//! fixed tick; the server applies commands, simulates authoritatively and
//! broadcasts [`protocol::WeaponStateSnapshot`]s that clients reconcile to.

use bevy::prelude::*;

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{
    reconcile_acknowledged, reconcile_weapon_state, PredictedChanges, WeaponNetClientPlugin,
};
pub use server::{AcknowledgedInputs, WeaponNetServerPlugin};

/// Marks a shooter on the server that is driven by a remote client.
#[derive(Component, Reflect, Clone, Copy, Debug, PartialEq, Eq)]
#[reflect(Component)]
pub struct RemoteShooter {
    pub client_id: u64,
}

/// Marks the shooter controlled by this client.
#[derive(Component, Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct LocalShooter;
