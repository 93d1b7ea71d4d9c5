use bevy::ecs::message::MessageReader;
use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy_renet2::netcode::NetcodeServerPlugin;
use bevy_renet2::prelude::*;

use crate::components::{ViewAngles, Weapon, WeaponInput, WeaponState};
use crate::network::protocol::{
    decode, encode, Channel, ClientMessage, ServerMessage, WeaponCommand, WeaponStateSnapshot,
};
use crate::network::RemoteShooter;
use crate::resources::SimulationTick;
use crate::types::NetRole;
use crate::GunplaySet;

/// Authoritative side of the weapon netcode.
///
/// # Systems
/// - `server_connection_events` - Logs connects and disconnects
/// - `server_receive_commands` - Feeds client commands into `WeaponInput`
/// - `server_broadcast_snapshots` - Sends authoritative weapon state
pub struct WeaponNetServerPlugin;

impl Plugin for WeaponNetServerPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RenetServerPlugin);
        app.add_plugins(NetcodeServerPlugin);
        app.insert_resource(NetRole::Server);
        app.init_resource::<AcknowledgedInputs>();
        app.register_type::<RemoteShooter>();

        app.add_systems(Update, server_connection_events).add_systems(
            FixedUpdate,
            (
                server_receive_commands.before(GunplaySet::Simulate),
                server_broadcast_snapshots.after(GunplaySet::Simulate),
            )
                .run_if(resource_exists::<RenetServer>),
        );
    }
}

/// Newest client input tick applied to each weapon, keyed by network id.
#[derive(Resource, Debug, Default)]
pub struct AcknowledgedInputs {
    newest: HashMap<u64, u64>,
}

impl AcknowledgedInputs {
    pub fn acknowledge(&mut self, weapon: u64, input_tick: u64) {
        let newest = self.newest.entry(weapon).or_insert(input_tick);
        *newest = (*newest).max(input_tick);
    }

    pub fn get(&self, weapon: u64) -> Option<u64> {
        self.newest.get(&weapon).copied()
    }
}

fn server_connection_events(mut server_events: MessageReader<ServerEvent>) {
    for event in server_events.read() {
        match event {
            ServerEvent::ClientConnected { client_id } => {
                info!("Client {client_id} connected");
            }
            ServerEvent::ClientDisconnected { client_id, reason } => {
                info!("Client {client_id} disconnected: {reason}");
            }
        }
    }
}

/// Applies `command` if the weapon's owner is driven by `client_id`.
fn apply_command(
    client_id: u64,
    command: &WeaponCommand,
    weapons: &mut Query<(&Weapon, &mut WeaponInput)>,
    shooters: &mut Query<(&RemoteShooter, &mut ViewAngles)>,
) -> bool {
    let Some((weapon, mut input)) = weapons
        .iter_mut()
        .find(|(weapon, _)| weapon.net_id == command.weapon)
    else {
        return false;
    };
    let Some(owner) = weapon.owner else {
        return false;
    };
    let Ok((remote, mut view)) = shooters.get_mut(owner) else {
        return false;
    };
    if remote.client_id != client_id {
        return false;
    }

    if !command.pitch.is_finite() || !command.yaw.is_finite() {
        return false;
    }
    let pitch = command.pitch.clamp(-ViewAngles::PITCH_LIMIT, ViewAngles::PITCH_LIMIT);
    *view = ViewAngles::new(pitch, command.yaw);
    command.apply_to(&mut input);
    true
}

/// Releases remote-driven weapons that no command reached this tick, so a
/// silent client stops firing and stops rewinding to its last input tick.
fn release_silent_weapons(
    driven: &[u64],
    weapons: &mut Query<(&Weapon, &mut WeaponInput)>,
    shooters: &Query<(&RemoteShooter, &mut ViewAngles)>,
) {
    for (weapon, mut input) in weapons.iter_mut() {
        let remote = weapon.owner.is_some_and(|owner| shooters.contains(owner));
        if remote && !driven.contains(&weapon.net_id) {
            input.release();
        }
    }
}

fn server_receive_commands(
    mut server: ResMut<RenetServer>,
    mut acks: ResMut<AcknowledgedInputs>,
    mut weapons: Query<(&Weapon, &mut WeaponInput)>,
    mut shooters: Query<(&RemoteShooter, &mut ViewAngles)>,
) {
    let mut driven = Vec::new();
    for client_id in server.clients_id() {
        while let Some(message) = server.receive_message(client_id, Channel::ReliableOrdered.id()) {
            let command = match decode::<ClientMessage>(&message) {
                Ok(ClientMessage::Command(command)) => command,
                Err(error) => {
                    warn!("Dropping message from client {client_id}: {error}");
                    continue;
                }
            };
            if apply_command(client_id, &command, &mut weapons, &mut shooters) {
                acks.acknowledge(command.weapon, command.input_tick);
                driven.push(command.weapon);
            } else {
                debug!(
                    "Client {client_id} sent a command for weapon {} it does not hold",
                    command.weapon
                );
            }
        }
    }
    release_silent_weapons(&driven, &mut weapons, &shooters);
}

fn server_broadcast_snapshots(
    mut server: ResMut<RenetServer>,
    tick: Res<SimulationTick>,
    acks: Res<AcknowledgedInputs>,
    weapons: Query<(&Weapon, &WeaponState)>,
) {
    let weapons = weapons
        .iter()
        .map(|(weapon, state)| {
            WeaponStateSnapshot::capture(weapon.net_id, tick.0, acks.get(weapon.net_id), state)
        })
        .collect();

    match encode(&ServerMessage::Snapshot {
        tick: tick.0,
        weapons,
    }) {
        Ok(bytes) => server.broadcast_message(Channel::Unreliable.id(), bytes),
        Err(error) => warn!("Failed to encode snapshot: {error}"),
    }
}
