//! Client and server weapon simulation in one process.
//!
//! The client predicts its rifle and sends one command per fixed tick; the
//! server replays the commands authoritatively, applies damage and sends
//! snapshots back. The two apps are joined by renet's in-memory client, so
//! no sockets are opened.
//!
//! This example requires the `netcode` feature flag.
//!
//! Run with: `cargo run --example multiplayer --features netcode`

use bevy::ecs::message::MessageReader;
use bevy::prelude::*;
use bevy_gunplay::network::protocol::Channel;
use bevy_gunplay::network::{
    LocalShooter, RemoteShooter, WeaponNetClientPlugin, WeaponNetServerPlugin,
};
use bevy_gunplay::prelude::*;
use bevy_renet2::prelude::{RenetClient, RenetServer};
use renet2::ConnectionConfig;

const CLIENT_ID: u64 = 1;
const WEAPON_NET_ID: u64 = 7;
const RUN_TICKS: u64 = 128;

fn main() {
    println!("Starting in-process client/server weapon simulation...");

    let mut server = build_app(WeaponNetServerPlugin);
    let mut client = build_app(WeaponNetClientPlugin);
    server.add_systems(FixedUpdate, report_damage.after(GunplaySet::Cleanup));

    let mut renet_server = RenetServer::new(connection_config());
    let renet_client = renet_server.new_local_client(CLIENT_ID);
    server.insert_resource(renet_server);
    client.insert_resource(renet_client);

    let Some(server_weapon) = spawn_player(&mut server, RemoteShooter { client_id: CLIENT_ID })
    else {
        return;
    };
    let Some(client_weapon) = spawn_player(&mut client, LocalShooter) else {
        return;
    };

    for tick in 1..=RUN_TICKS {
        if let Some(mut input) = client.world_mut().get_mut::<WeaponInput>(client_weapon) {
            input.primary.update(tick <= 40);
            input.reload.update(tick == 60);
        }

        client.world_mut().run_schedule(FixedUpdate);
        exchange(&mut server, &mut client);
        server.world_mut().run_schedule(FixedUpdate);
        exchange(&mut server, &mut client);
    }

    let clip = |app: &App, weapon: Entity| {
        app.world()
            .get::<WeaponState>(weapon)
            .map(WeaponState::clip)
    };
    println!(
        "[FINISHED] server clip {:?}, predicted clip {:?}",
        clip(&server, server_weapon),
        clip(&client, client_weapon)
    );
}

fn connection_config() -> ConnectionConfig {
    ConnectionConfig {
        server_channels_config: Channel::config(),
        client_channels_config: Channel::config(),
        ..default()
    }
}

fn build_app(net: impl Plugin) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins((GunplayCorePlugin, LagCompensationPlugin))
        .add_plugins(net);
    app
}

fn rifle() -> WeaponDefinition {
    WeaponDefinition {
        name: "rifle".to_string(),
        ammo_type: AmmoType::Rifle,
        clip_size: 30,
        damage: 20.0,
        primary_rate: 10.0,
        reload_time: 0.5,
        spread: 0.02,
        horizontal_recoil_range: 0.3,
        vertical_recoil: 0.5,
        recoil_recovery_scale: 0.5,
        ..default()
    }
}

/// Spawns a shooter carrying the rifle plus a target, returns the weapon.
fn spawn_player(app: &mut App, marker: impl Bundle) -> Option<Entity> {
    let definition = rifle();
    let world = app.world_mut();
    let rifle_id = match world
        .resource_mut::<WeaponCatalog>()
        .register(definition.clone())
    {
        Ok(id) => id,
        Err(error) => {
            println!("[FAIL] Could not register rifle: {error}");
            return None;
        }
    };

    let shooter = world
        .spawn((
            Transform::default(),
            ViewAngles::default(),
            AmmoPool::default().with(AmmoType::Rifle, 60),
            marker,
        ))
        .id();
    let weapon = world
        .spawn((
            Weapon::new(rifle_id, WEAPON_NET_ID).with_owner(shooter),
            WeaponState::new(&definition),
            WeaponInput::default(),
        ))
        .id();
    world.entity_mut(shooter).insert(Shooter {
        active_weapon: Some(weapon),
        ..default()
    });

    world.spawn((Transform::from_xyz(0.0, 0.0, -12.0), Hitbox::default()));
    Some(weapon)
}

/// Moves queued packets both ways between the server and its local client.
fn exchange(server: &mut App, client: &mut App) {
    let mut renet_client = client.world_mut().resource_mut::<RenetClient>();
    let mut renet_server = server.world_mut().resource_mut::<RenetServer>();
    if let Err(error) = renet_server.process_local_client(CLIENT_ID, &mut renet_client) {
        println!("[FAIL] Local client vanished: {error:?}");
    }
}

fn report_damage(tick: Res<SimulationTick>, mut damage: MessageReader<DamageEvent>) {
    for hit in damage.read() {
        println!(
            "[SERVER] tick {} {:?} hit for {:.1}",
            tick.0, hit.hit_group, hit.amount
        );
    }
}
