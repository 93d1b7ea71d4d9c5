use bevy::ecs::message::MessageReader;
use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy_renet2::netcode::NetcodeClientPlugin;
use bevy_renet2::prelude::*;

use crate::components::{Shooter, ViewAngles, Weapon, WeaponInput, WeaponState};
use crate::events::{AmmoDropRequest, ReloadFinished, ReloadStarted, WeaponFired};
use crate::network::protocol::{
    decode, encode, Channel, ClientMessage, ServerMessage, WeaponCommand, WeaponStateSnapshot,
};
use crate::network::LocalShooter;
use crate::resources::SimulationTick;
use crate::systems::simulation::shot_tick;
use crate::types::NetRole;
use crate::GunplaySet;

/// Predicting side of the weapon netcode.
///
/// # Systems
/// - `client_receive_snapshots` - Reconciles predicted weapons
/// - `client_track_predictions` - Remembers the input tick of each predicted
///   ammo or reload change
/// - `client_send_commands` - Sends this tick's input for local weapons
pub struct WeaponNetClientPlugin;

impl Plugin for WeaponNetClientPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RenetClientPlugin);
        app.add_plugins(NetcodeClientPlugin);
        app.insert_resource(NetRole::Client);
        app.init_resource::<PredictedChanges>();
        app.register_type::<LocalShooter>();

        app.add_systems(
            FixedUpdate,
            (
                client_receive_snapshots.before(GunplaySet::Prepare),
                (client_track_predictions, client_send_commands)
                    .after(GunplaySet::Simulate)
                    .before(GunplaySet::Cleanup),
            )
                .run_if(resource_exists::<RenetClient>),
        );
    }
}

/// Overwrites predicted state with the server's view of it.
///
/// Ammo counts and the reload flag are authoritative; timers and recoil
/// stay local so the aim does not snap.
pub fn reconcile_weapon_state(state: &mut WeaponState, snapshot: &WeaponStateSnapshot) {
    if state.is_reloading && !snapshot.is_reloading {
        state.burst_remaining = 0;
    }
    if !state.is_reloading && snapshot.is_reloading {
        state.time_since_reload_start = 0.0;
    }
    state.ammo_in_clip = snapshot.ammo_in_clip;
    state.reserve_ammo = snapshot.reserve_ammo;
    state.is_reloading = snapshot.is_reloading;
    state.unlimited_ammo = snapshot.unlimited_ammo;
}

/// Input tick of the newest predicted ammo or reload change per weapon,
/// keyed by network id.
#[derive(Resource, Debug, Default)]
pub struct PredictedChanges {
    newest: HashMap<u64, u64>,
}

impl PredictedChanges {
    pub fn record(&mut self, weapon: u64, input_tick: u64) {
        let newest = self.newest.entry(weapon).or_insert(input_tick);
        *newest = (*newest).max(input_tick);
    }

    pub fn get(&self, weapon: u64) -> Option<u64> {
        self.newest.get(&weapon).copied()
    }
}

/// Reconciles only once the server has applied the input behind the newest
/// predicted change, so an older snapshot cannot refill a fired round or
/// cancel a predicted reload. Returns whether `state` was overwritten.
pub fn reconcile_acknowledged(
    state: &mut WeaponState,
    snapshot: &WeaponStateSnapshot,
    predicted: Option<u64>,
) -> bool {
    let covered = match predicted {
        None => true,
        Some(tick) => snapshot.acked_input_tick.is_some_and(|acked| acked >= tick),
    };
    if covered {
        reconcile_weapon_state(state, snapshot);
    }
    covered
}

fn client_receive_snapshots(
    mut client: ResMut<RenetClient>,
    mut tick: ResMut<SimulationTick>,
    mut newest: Local<Option<u64>>,
    predictions: Res<PredictedChanges>,
    mut weapons: Query<(&Weapon, &mut WeaponState)>,
) {
    if !client.is_connected() {
        return;
    }

    while let Some(message) = client.receive_message(Channel::Unreliable.id()) {
        let (server_tick, snapshots) = match decode::<ServerMessage>(&message) {
            Ok(ServerMessage::Snapshot { tick, weapons }) => (tick, weapons),
            Err(error) => {
                warn!("Dropping server message: {error}");
                continue;
            }
        };
        // Unreliable channel: ignore anything older than what was applied.
        if newest.is_some_and(|newest| server_tick <= newest) {
            continue;
        }
        *newest = Some(server_tick);

        // The client never simulates behind the server.
        if tick.0 < server_tick {
            tick.0 = server_tick;
        }

        for (weapon, mut state) in weapons.iter_mut() {
            if let Some(snapshot) = snapshots.iter().find(|s| s.weapon == weapon.net_id) {
                reconcile_acknowledged(&mut state, snapshot, predictions.get(weapon.net_id));
            }
        }
    }
}

fn client_track_predictions(
    tick: Res<SimulationTick>,
    mut predictions: ResMut<PredictedChanges>,
    mut fired: MessageReader<WeaponFired>,
    mut reload_started: MessageReader<ReloadStarted>,
    mut reload_finished: MessageReader<ReloadFinished>,
    mut drops: MessageReader<AmmoDropRequest>,
    shooters: Query<&Shooter>,
    weapons: Query<(&Weapon, &WeaponInput)>,
) {
    let changed = fired
        .read()
        .map(|message| message.weapon)
        .chain(reload_started.read().map(|message| message.weapon))
        .chain(reload_finished.read().map(|message| message.weapon))
        .chain(drops.read().filter_map(|message| {
            shooters
                .get(message.dropper)
                .ok()
                .and_then(|shooter| shooter.active_weapon)
        }));

    for entity in changed {
        if let Ok((weapon, input)) = weapons.get(entity) {
            predictions.record(weapon.net_id, shot_tick(input.input_tick, tick.0));
        }
    }
}

fn client_send_commands(
    mut client: ResMut<RenetClient>,
    tick: Res<SimulationTick>,
    weapons: Query<(&Weapon, &WeaponInput)>,
    shooters: Query<&ViewAngles, With<LocalShooter>>,
) {
    if !client.is_connected() {
        return;
    }

    for (weapon, input) in weapons.iter() {
        let Some(view) = weapon.owner.and_then(|owner| shooters.get(owner).ok()) else {
            continue;
        };
        let input_tick = shot_tick(input.input_tick, tick.0);
        let command =
            WeaponCommand::from_input(weapon.net_id, input_tick, input, view.pitch, view.yaw);
        match encode(&ClientMessage::Command(command)) {
            Ok(bytes) => client.send_message(Channel::ReliableOrdered.id(), bytes),
            Err(error) => warn!("Failed to encode command: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec2;

    fn snapshot(ammo_in_clip: u32, is_reloading: bool) -> WeaponStateSnapshot {
        WeaponStateSnapshot {
            weapon: 1,
            tick: 10,
            acked_input_tick: Some(8),
            ammo_in_clip,
            reserve_ammo: 4,
            is_reloading,
            unlimited_ammo: false,
        }
    }

    #[test]
    fn test_server_counts_win_recoil_stays() {
        let mut state = WeaponState {
            ammo_in_clip: 12,
            reserve_ammo: 9,
            accumulated_recoil: Vec2::new(0.1, 0.4),
            ..Default::default()
        };
        reconcile_weapon_state(&mut state, &snapshot(14, false));
        assert_eq!(state.clip(), 14);
        assert_eq!(state.reserve(), 4);
        assert_eq!(state.accumulated_recoil, Vec2::new(0.1, 0.4));
    }

    #[test]
    fn test_server_started_reload_restarts_local_timer() {
        let mut state = WeaponState {
            time_since_reload_start: 3.0,
            ..Default::default()
        };
        reconcile_weapon_state(&mut state, &snapshot(0, true));
        assert!(state.is_reloading);
        assert_eq!(state.time_since_reload_start, 0.0);
    }

    #[test]
    fn test_older_snapshot_keeps_predicted_shot() {
        let mut predictions = PredictedChanges::default();
        let mut state = WeaponState {
            ammo_in_clip: 13,
            ..Default::default()
        };
        // The shot from input tick 9 left 13 rounds; the server has only
        // applied up to tick 8 and still reports 14.
        predictions.record(1, 9);
        let applied = reconcile_acknowledged(&mut state, &snapshot(14, false), predictions.get(1));
        assert!(!applied);
        assert_eq!(state.clip(), 13);

        let caught_up = WeaponStateSnapshot {
            acked_input_tick: Some(9),
            ..snapshot(13, false)
        };
        assert!(reconcile_acknowledged(&mut state, &caught_up, predictions.get(1)));
        assert_eq!(state.clip(), 13);
        assert_eq!(state.reserve(), 4);
    }

    #[test]
    fn test_older_snapshot_keeps_predicted_reload_running() {
        let mut predictions = PredictedChanges::default();
        let mut state = WeaponState {
            ammo_in_clip: 3,
            is_reloading: true,
            time_since_reload_start: 0.2,
            ..Default::default()
        };
        predictions.record(1, 9);

        assert!(!reconcile_acknowledged(&mut state, &snapshot(3, false), predictions.get(1)));
        assert!(state.is_reloading);
        assert_eq!(state.time_since_reload_start, 0.2);

        let caught_up = WeaponStateSnapshot {
            acked_input_tick: Some(10),
            ..snapshot(3, true)
        };
        assert!(reconcile_acknowledged(&mut state, &caught_up, predictions.get(1)));
        assert_eq!(state.time_since_reload_start, 0.2);
    }

    #[test]
    fn test_unpredicted_weapon_always_reconciles() {
        let mut state = WeaponState::default();
        let unacked = WeaponStateSnapshot {
            acked_input_tick: None,
            ..snapshot(7, false)
        };
        assert!(reconcile_acknowledged(&mut state, &unacked, None));
        assert_eq!(state.clip(), 7);
    }

    #[test]
    fn test_prediction_record_keeps_newest_tick() {
        let mut predictions = PredictedChanges::default();
        predictions.record(1, 20);
        predictions.record(1, 18);
        assert_eq!(predictions.get(1), Some(20));
        assert_eq!(predictions.get(2), None);
    }
}
