//! Headless weapon simulation: one shooter, one target, no window and no
//! physics. Fires a burst, reloads, drops the clip and picks it back up.
//!
//! Run with: `cargo run --example headless_simulation`

use bevy::app::ScheduleRunnerPlugin;
use bevy::ecs::message::{MessageReader, MessageWriter};
use bevy::prelude::*;
use bevy_gunplay::prelude::*;
use std::time::Duration;

const RUN_TICKS: u64 = 192;
const PICKUP_RADIUS: f32 = 2.5;

fn main() {
    println!("Starting headless weapon simulation...");
    println!("Runs for {RUN_TICKS} fixed ticks at 64 Hz (3 seconds)...");

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / 64.0,
        ))))
        .add_plugins((GunplayCorePlugin, LagCompensationPlugin))
        .insert_resource(Time::<Fixed>::from_hz(64.0))
        .add_systems(Startup, setup_simulation)
        .add_systems(
            FixedUpdate,
            drive_input
                .after(GunplaySet::Prepare)
                .before(GunplaySet::Simulate),
        )
        .add_systems(
            FixedUpdate,
            (report_combat, collect_pickups, finish_run).after(GunplaySet::Cleanup),
        )
        .run();
}

#[derive(Component)]
struct Player;

fn rifle() -> WeaponDefinition {
    WeaponDefinition {
        name: "rifle".to_string(),
        ammo_type: AmmoType::Rifle,
        clip_size: 30,
        damage: 25.0,
        primary_rate: 10.0,
        reload_time: 0.5,
        spread: 0.01,
        vertical_recoil: 0.4,
        recoil_recovery_scale: 0.5,
        ..default()
    }
}

fn setup_simulation(mut commands: Commands, mut catalog: ResMut<WeaponCatalog>) {
    println!("\n[SETUP] Registering rifle and spawning shooter and target...");

    let definition = rifle();
    let rifle_id = match catalog.register(definition.clone()) {
        Ok(id) => id,
        Err(error) => {
            println!("[FAIL] Could not register rifle: {error}");
            return;
        }
    };

    let shooter = commands
        .spawn((
            Name::new("Player"),
            Transform::default(),
            ViewAngles::default(),
            AmmoPool::default().with(AmmoType::Rifle, 30),
            Hitbox::default(),
            Player,
        ))
        .id();
    let weapon = commands
        .spawn((
            Weapon::new(rifle_id, 1).with_owner(shooter),
            WeaponState::new(&definition),
            WeaponInput::default(),
        ))
        .id();
    commands.entity(shooter).insert(Shooter {
        active_weapon: Some(weapon),
        ..default()
    });

    commands.spawn((
        Name::new("Target"),
        Transform::from_xyz(0.0, 0.0, -15.0),
        Hitbox::default(),
    ));
}

/// Scripted input: hold the trigger, reload, then drop the clip.
fn drive_input(tick: Res<SimulationTick>, mut inputs: Query<&mut WeaponInput>) {
    for mut input in inputs.iter_mut() {
        input.primary.update(tick.0 <= 80);
        input.reload.update(tick.0 == 100);
        input.drop_modifier = tick.0 == 150;
        input.drop.update(tick.0 == 150);
    }
}

fn report_combat(
    mut fired: MessageReader<WeaponFired>,
    mut dry: MessageReader<DryFired>,
    mut damage: MessageReader<DamageEvent>,
    mut reload_started: MessageReader<ReloadStarted>,
    mut reload_finished: MessageReader<ReloadFinished>,
    names: Query<&Name>,
) {
    for shot in fired.read() {
        println!("[FIRE] tick {} direction {:?}", shot.tick, shot.direction);
    }
    if dry.read().count() > 0 {
        println!("[DRY] click");
    }
    for hit in damage.read() {
        let target = names.get(hit.target).map(Name::as_str).unwrap_or("?");
        println!(
            "[HIT] {target} {:?} for {:.1} at {:.1}m",
            hit.hit_group, hit.amount, hit.attacker_distance
        );
    }
    for _ in reload_started.read() {
        println!("[RELOAD] started");
    }
    for finished in reload_finished.read() {
        println!("[RELOAD] loaded {} rounds", finished.rounds_loaded);
    }
}

fn collect_pickups(
    mut commands: Commands,
    pickups: Query<(Entity, &Transform, &AmmoPickup)>,
    mut players: Query<(&Transform, &mut AmmoPool), With<Player>>,
) {
    for (entity, pickup_transform, pickup) in pickups.iter() {
        for (player_transform, mut pool) in players.iter_mut() {
            if player_transform
                .translation
                .distance(pickup_transform.translation)
                > PICKUP_RADIUS
            {
                continue;
            }
            pool.give(pickup.ammo_type, pickup.amount);
            commands.entity(entity).despawn();
            println!(
                "[PICKUP] {} {:?} rounds, pool now {}",
                pickup.amount,
                pickup.ammo_type,
                pool.count(pickup.ammo_type)
            );
            break;
        }
    }
}

fn finish_run(
    tick: Res<SimulationTick>,
    weapons: Query<&WeaponState>,
    mut exit: MessageWriter<AppExit>,
) {
    if tick.0 < RUN_TICKS {
        return;
    }
    for state in weapons.iter() {
        println!(
            "[FINISHED] clip {} reloading {}",
            state.clip(),
            state.is_reloading
        );
    }
    exit.write(AppExit::Success);
}
