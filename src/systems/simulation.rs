//! Simulation driver - per-tick weapon orchestration.
//!
//! [`simulate_weapon_tick`] is the whole per-tick state machine as a pure
//! function over explicit state. The systems below gather that state from
//! the ECS, run it for every active weapon and publish the outcome as
//! messages.
//!
//! Order within a tick: timers, recoil, deploy gate, reload start, primary
//! fire, secondary fire, ammo drop. Reload completion is only checked while
//! a reload is running.

use bevy::ecs::message::{MessageReader, MessageWriter};
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::components::{
    AmmoPickup, AmmoPool, Hitbox, Shooter, ViewAngles, Weapon, WeaponInput, WeaponState,
};
use crate::events::{
    AmmoDropRequest, BulletImpact, DamageEvent, DryFired, EquipWeapon, ReloadFinished,
    ReloadStarted, SecondaryFired, WeaponFired,
};
use crate::resources::{CombatConfig, SimulationTick, WeaponCatalog, WeaponDefinition, WeaponId};
use crate::systems::ammo::{
    available_ammo, can_reload, drop_ammo, finish_reload, start_reload, DropOrigin,
};
use crate::systems::ballistics::{spread_pattern, trace_bullet, HitboxPose, HitboxSet, ShotSeed};
use crate::systems::damage::{build_damage_event, DamageSource};
use crate::systems::fire_control::{can_primary_fire, can_secondary_fire};
use crate::systems::lag_compensation::{
    HitboxHistory, LagCompensation, LagCompensationScope, RewindableHitboxes,
};
use crate::systems::recoil::{apply_recoil, sample_recoil_impulse};
use crate::types::{FireMode, HitResult, NetRole, SpatialQueryExt, TraceQuery};

/// The weapon's owner as seen by one tick.
///
/// # Fields
/// * `entity` - Owner entity, excluded from its own traces
/// * `position` - Owner origin
/// * `eye` - Trace origin
/// * `velocity` - Owner velocity, inherited by dropped ammo
/// * `view` - Aim, displaced by recoil
pub struct ShooterView<'a> {
    pub entity: Entity,
    pub position: Vec3,
    pub eye: Vec3,
    pub velocity: Vec3,
    pub view: &'a mut ViewAngles,
}

/// Everything about the current tick that is not weapon state.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    pub tick: u64,
    pub dt: f32,
    pub role: NetRole,
    pub weapon: Entity,
    pub weapon_id: WeaponId,
    /// Mixed into the shot seed next to the tick
    pub spread_salt: u64,
    pub config: &'a CombatConfig,
}

/// What one tick of one weapon produced.
#[derive(Clone, Debug, Default)]
pub struct TickOutcome {
    pub fired: Option<WeaponFired>,
    pub dry_fired: bool,
    pub secondary_fired: bool,
    pub reload_started: bool,
    /// Rounds loaded by a reload that completed this tick
    pub reload_finished: Option<u32>,
    pub impacts: Vec<BulletImpact>,
    pub damage: Vec<DamageEvent>,
    pub ammo_drop: Option<AmmoDropRequest>,
}

/// Tick a shot belongs to: the tick its input was sampled on when known.
///
/// Seeds spread and recoil, so a client's prediction and the server's later
/// replay of the same input draw identical pellets.
pub fn shot_tick(input_tick: Option<u64>, tick: u64) -> u64 {
    input_tick.unwrap_or(tick)
}

/// Tick the authoritative side rewinds to for a shot, if any.
pub fn rewind_tick(role: NetRole, input_tick: Option<u64>, tick: u64) -> Option<u64> {
    if !role.is_authoritative() {
        return None;
    }
    input_tick.filter(|input_tick| *input_tick < tick)
}

/// Runs one fixed tick of one weapon.
///
/// With no `shooter` the timers still advance but nothing else happens.
/// `pool` is the owner's shared ammo; pass `None` when it has none.
pub fn simulate_weapon_tick<W>(
    definition: &WeaponDefinition,
    state: &mut WeaponState,
    input: &WeaponInput,
    shooter: Option<ShooterView<'_>>,
    pool: Option<&mut AmmoPool>,
    world: &mut W,
    ctx: &TickContext<'_>,
) -> TickOutcome
where
    W: SpatialQueryExt + LagCompensation + ?Sized,
{
    let mut outcome = TickOutcome::default();
    let dt = ctx.dt;
    let authoritative = ctx.role.is_authoritative();

    state.time_since_primary_fire += dt;
    state.time_since_secondary_fire += dt;
    state.time_since_reload_start += dt;
    state.time_since_deployed += dt;

    let Some(shooter) = shooter else {
        return outcome;
    };

    // A remote aim already carries the client's recoil; only recover it here.
    let mut aim = *shooter.view;
    apply_recoil(
        &mut aim,
        &mut state.accumulated_recoil,
        definition.recoil_recovery_scale,
        dt,
    );
    if !input.remote_aim {
        *shooter.view = aim;
    }

    if state.time_since_deployed < definition.deploy_time {
        return outcome;
    }

    let available = available_ammo(definition, state, pool.as_deref());
    if can_reload(definition, state, input.reload, available) {
        outcome.reload_started = start_reload(state);
        return outcome;
    }

    if state.is_reloading {
        if state.time_since_reload_start > definition.reload_time {
            let loaded = finish_reload(definition, state, pool, authoritative);
            outcome.reload_finished = Some(loaded);
        }
        return outcome;
    }

    if can_primary_fire(
        definition.fire_mode,
        input.primary,
        state.time_since_primary_fire,
        definition.primary_rate,
        state.burst_remaining,
    ) {
        let rewind = rewind_tick(ctx.role, input.input_tick, ctx.tick);
        let mut scope = LagCompensationScope::begin(world, rewind, &[shooter.entity]);
        state.time_since_primary_fire = 0.0;
        attack_primary(definition, state, input, &shooter, &mut *scope, ctx, &mut outcome);
    }

    if can_secondary_fire(
        input.secondary,
        state.time_since_secondary_fire,
        definition.secondary_rate,
    ) {
        state.time_since_secondary_fire = 0.0;
        outcome.secondary_fired = true;
    }

    if input.drop_modifier && input.drop.pressed {
        let origin = DropOrigin {
            dropper: shooter.entity,
            eye: shooter.eye,
            aim: shooter.view.rotation(),
            velocity: shooter.velocity,
        };
        outcome.ammo_drop = drop_ammo(definition, state, origin, ctx.config, authoritative);
    }

    outcome
}

fn attack_primary<W>(
    definition: &WeaponDefinition,
    state: &mut WeaponState,
    input: &WeaponInput,
    shooter: &ShooterView<'_>,
    world: &mut W,
    ctx: &TickContext<'_>,
    outcome: &mut TickOutcome,
) where
    W: SpatialQueryExt + LagCompensation + ?Sized,
{
    if state.ammo_in_clip == 0 {
        state.burst_remaining = 0;
        outcome.dry_fired = true;
        return;
    }

    state.time_since_primary_fire = 0.0;
    state.time_since_secondary_fire = 0.0;
    state.ammo_in_clip -= 1;

    if let FireMode::Burst { shots } = definition.fire_mode {
        state.burst_remaining = if input.primary.pressed && state.burst_remaining == 0 {
            shots.saturating_sub(1)
        } else {
            state.burst_remaining.saturating_sub(1)
        };
    }

    let tick = shot_tick(input.input_tick, ctx.tick);
    let seed = ShotSeed::new(tick, ctx.spread_salt);
    state.accumulated_recoil += sample_recoil_impulse(definition, seed);

    let config = ctx.config;
    let forward = shooter.view.forward();
    let exclude = vec![shooter.entity, ctx.weapon];
    let source = DamageSource {
        attacker: shooter.entity,
        attacker_position: shooter.position,
        weapon: ctx.weapon,
        weapon_id: ctx.weapon_id,
    };

    let directions = spread_pattern(forward, definition.spread, seed, definition.bullets_per_fire);
    for direction in directions {
        let trace = trace_bullet(
            &*world,
            shooter.eye,
            direction,
            config.max_trace_distance,
            config.bullet_radius,
            exclude.clone(),
        );
        for hit in trace {
            outcome.impacts.push(BulletImpact {
                weapon: ctx.weapon,
                start: hit.start,
                end: hit.end,
                normal: hit.normal,
                surface: hit.surface,
                effect: hit.surface.impact_effect(),
                entity: hit.entity,
                hit: hit.hit,
                tracer: hit.distance > config.tracer_min_distance,
            });

            if !ctx.role.is_authoritative() {
                continue;
            }
            let target_origin = hit.entity.and_then(|entity| world.rewound_origin(entity));
            if let Some(event) = build_damage_event(definition, source, &hit, target_origin, config) {
                outcome.damage.push(event);
            }
        }
    }

    outcome.fired = Some(WeaponFired {
        weapon: ctx.weapon,
        shooter: shooter.entity,
        origin: shooter.eye,
        direction: forward,
        pellets: definition.bullets_per_fire,
        tick,
    });
}

/// World geometry and damageable hitboxes traced together.
pub struct CombatWorld<'g, 'h> {
    geometry: Option<&'g dyn SpatialQueryExt>,
    hitboxes: RewindableHitboxes<'h>,
}

impl<'g, 'h> CombatWorld<'g, 'h> {
    pub fn new(
        geometry: Option<&'g dyn SpatialQueryExt>,
        hitboxes: HitboxSet,
        history: Option<&'h HitboxHistory>,
    ) -> Self {
        Self {
            geometry,
            hitboxes: RewindableHitboxes::new(hitboxes, history),
        }
    }
}

impl SpatialQueryExt for CombatWorld<'_, '_> {
    fn cast_bullet(&self, query: &TraceQuery) -> Option<HitResult> {
        let world_hit = self.geometry.and_then(|geometry| geometry.cast_bullet(query));
        let body_hit = self.hitboxes.cast_bullet(query);
        match (world_hit, body_hit) {
            (Some(w), Some(b)) => Some(if b.distance <= w.distance { b } else { w }),
            (w, b) => w.or(b),
        }
    }

    fn is_point_in_water(&self, point: Vec3) -> bool {
        self.geometry
            .is_some_and(|geometry| geometry.is_point_in_water(point))
    }
}

impl LagCompensation for CombatWorld<'_, '_> {
    fn rewind(&mut self, tick: u64, exclude: &[Entity]) {
        self.hitboxes.rewind(tick, exclude);
    }

    fn restore(&mut self) {
        self.hitboxes.restore();
    }

    fn rewound_origin(&self, entity: Entity) -> Option<Vec3> {
        self.hitboxes.rewound_origin(entity)
    }
}

/// Messages the simulation writes.
#[derive(SystemParam)]
pub struct SimulationWriters<'w> {
    fired: MessageWriter<'w, WeaponFired>,
    dry_fired: MessageWriter<'w, DryFired>,
    secondary: MessageWriter<'w, SecondaryFired>,
    reload_started: MessageWriter<'w, ReloadStarted>,
    reload_finished: MessageWriter<'w, ReloadFinished>,
    impacts: MessageWriter<'w, BulletImpact>,
    damage: MessageWriter<'w, DamageEvent>,
    drops: MessageWriter<'w, AmmoDropRequest>,
}

impl SimulationWriters<'_> {
    fn publish(&mut self, weapon: Entity, shooter: Entity, outcome: TickOutcome) {
        if outcome.reload_started {
            self.reload_started.write(ReloadStarted { weapon, shooter });
        }
        if let Some(rounds_loaded) = outcome.reload_finished {
            self.reload_finished.write(ReloadFinished {
                weapon,
                shooter,
                rounds_loaded,
            });
        }
        if outcome.dry_fired {
            self.dry_fired.write(DryFired { weapon, shooter });
        }
        if let Some(fired) = outcome.fired {
            self.fired.write(fired);
        }
        if outcome.secondary_fired {
            self.secondary.write(SecondaryFired { weapon, shooter });
        }
        for impact in outcome.impacts {
            self.impacts.write(impact);
        }
        for damage in outcome.damage {
            self.damage.write(damage);
        }
        if let Some(drop) = outcome.ammo_drop {
            self.drops.write(drop);
        }
    }
}

/// ECS state the weapon systems read and write.
#[derive(SystemParam)]
pub struct WeaponSimParams<'w, 's> {
    role: Res<'w, NetRole>,
    tick: Res<'w, SimulationTick>,
    time: Res<'w, Time<Fixed>>,
    config: Res<'w, CombatConfig>,
    catalog: Res<'w, WeaponCatalog>,
    history: Option<Res<'w, HitboxHistory>>,
    weapons: Query<
        'w,
        's,
        (
            Entity,
            &'static Weapon,
            &'static mut WeaponState,
            &'static WeaponInput,
        ),
    >,
    shooters: Query<
        'w,
        's,
        (
            &'static Transform,
            &'static Shooter,
            &'static mut ViewAngles,
            Option<&'static mut AmmoPool>,
        ),
    >,
    hitboxes: Query<'w, 's, (Entity, &'static Transform, &'static Hitbox)>,
    writers: SimulationWriters<'w>,
}

fn run_weapons(params: &mut WeaponSimParams, geometry: Option<&dyn SpatialQueryExt>) {
    let WeaponSimParams {
        role,
        tick,
        time,
        config,
        catalog,
        history,
        weapons,
        shooters,
        hitboxes,
        writers,
    } = params;

    let mut current = HitboxSet::default();
    for (entity, transform, hitbox) in hitboxes.iter() {
        current.push(entity, HitboxPose::new(transform.translation, hitbox));
    }
    let mut world = CombatWorld::new(geometry, current, history.as_deref());
    let dt = time.timestep().as_secs_f32();
    let config: &CombatConfig = config;

    for (weapon_entity, weapon, mut state, input) in weapons.iter_mut() {
        let Some(owner) = weapon.owner else {
            continue;
        };
        let definition = match catalog.try_get(weapon.id) {
            Ok(definition) => definition,
            Err(error) => {
                warn!("Skipping weapon {weapon_entity}: {error}");
                continue;
            }
        };

        let ctx = TickContext {
            tick: tick.0,
            dt,
            role: **role,
            weapon: weapon_entity,
            weapon_id: weapon.id,
            spread_salt: if config.per_weapon_spread_seed {
                weapon.net_id
            } else {
                0
            },
            config,
        };

        let outcome = match shooters.get_mut(owner) {
            Ok((transform, shooter, mut view, mut pool)) => {
                if shooter.active_weapon != Some(weapon_entity) {
                    continue;
                }
                let view = ShooterView {
                    entity: owner,
                    position: transform.translation,
                    eye: transform.translation + Vec3::Y * shooter.eye_height,
                    velocity: shooter.velocity,
                    view: &mut view,
                };
                simulate_weapon_tick(
                    definition,
                    &mut state,
                    input,
                    Some(view),
                    pool.as_deref_mut(),
                    &mut world,
                    &ctx,
                )
            }
            Err(_) => simulate_weapon_tick(
                definition,
                &mut state,
                input,
                None,
                None,
                &mut world,
                &ctx,
            ),
        };

        writers.publish(weapon_entity, owner, outcome);
    }
}

/// Advances [`SimulationTick`] once per fixed step.
pub fn advance_simulation_tick(mut tick: ResMut<SimulationTick>) {
    tick.0 += 1;
}

/// Simulates weapons against hitboxes only, for apps without physics.
pub fn simulate_weapons(mut params: WeaponSimParams) {
    run_weapons(&mut params, None);
}

/// Simulates weapons against avian3d geometry and hitboxes.
#[cfg(feature = "dim3")]
pub fn simulate_weapons_with_physics(
    mut params: WeaponSimParams,
    geometry: crate::systems::ballistics::PhysicsGeometry,
) {
    run_weapons(&mut params, Some(&geometry));
}

/// Applies [`EquipWeapon`] requests from the inventory layer.
pub fn apply_equip_requests(
    mut requests: MessageReader<EquipWeapon>,
    mut shooters: Query<&mut Shooter>,
    mut weapons: Query<(&mut Weapon, &mut WeaponState)>,
) {
    for request in requests.read() {
        let Ok(mut shooter) = shooters.get_mut(request.shooter) else {
            continue;
        };
        let Ok((mut weapon, mut state)) = weapons.get_mut(request.weapon) else {
            continue;
        };
        if weapon.owner.is_some_and(|owner| owner != request.shooter) {
            debug!(
                "Weapon {} already owned by {:?}, ignoring equip by {}",
                request.weapon, weapon.owner, request.shooter
            );
            continue;
        }
        weapon.owner = Some(request.shooter);
        shooter.active_weapon = Some(request.weapon);
        state.on_equip();
        debug!("{} equipped {}", request.shooter, request.weapon);
    }
}

/// Consumes the press edges once every weapon has seen them.
pub fn clear_input_edges(mut inputs: Query<&mut WeaponInput>) {
    for mut input in inputs.iter_mut() {
        input.clear_edges();
    }
}

/// Default spawner for dropped ammo on the authoritative peer.
pub fn spawn_dropped_ammo(
    mut commands: Commands,
    role: Res<NetRole>,
    config: Res<CombatConfig>,
    mut requests: MessageReader<AmmoDropRequest>,
) {
    if !role.is_authoritative() || !config.spawn_ammo_pickups {
        requests.clear();
        return;
    }

    for request in requests.read() {
        let pickup = commands
            .spawn((
                AmmoPickup {
                    ammo_type: request.ammo_type,
                    amount: request.amount,
                    dropper: Some(request.dropper),
                },
                Transform::from_translation(request.position).with_rotation(request.rotation),
                pickup_physics(request),
            ))
            .id();

        debug!(
            "Spawned {:?} x{} dropped by {} as {}",
            request.ammo_type, request.amount, request.dropper, pickup
        );
    }
}

#[cfg(feature = "dim3")]
fn pickup_physics(request: &AmmoDropRequest) -> impl Bundle {
    use avian3d::prelude::{Collider, CollisionLayers, LayerMask, LinearVelocity, RigidBody};
    (
        RigidBody::Dynamic,
        Collider::cuboid(0.3, 0.15, 0.2),
        CollisionLayers::new(crate::types::CombatLayer::Debris, LayerMask::ALL),
        LinearVelocity(request.velocity),
    )
}

#[cfg(not(feature = "dim3"))]
fn pickup_physics(_request: &AmmoDropRequest) -> impl Bundle {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AmmoType, HitGroup};

    fn rifle() -> WeaponDefinition {
        WeaponDefinition {
            name: "rifle".to_string(),
            ammo_type: AmmoType::Rifle,
            clip_size: 30,
            damage: 20.0,
            primary_rate: 10.0,
            ..Default::default()
        }
    }

    struct Scene {
        shooter: Entity,
        weapon: Entity,
        target: Entity,
        hitboxes: HitboxSet,
        config: CombatConfig,
    }

    impl Scene {
        fn new() -> Self {
            let mut world = World::new();
            let shooter = world.spawn_empty().id();
            let weapon = world.spawn_empty().id();
            let target = world.spawn_empty().id();
            let mut hitboxes = HitboxSet::default();
            // Body box spans y 0..1.5 at z = -10, eye height is 1.0.
            hitboxes.push(target, HitboxPose::new(Vec3::new(0.0, 0.0, -10.0), &Hitbox::default()));
            Self {
                shooter,
                weapon,
                target,
                hitboxes,
                config: CombatConfig::default(),
            }
        }

        fn ctx(&self, tick: u64, role: NetRole) -> TickContext<'_> {
            TickContext {
                tick,
                dt: 1.0 / 64.0,
                role,
                weapon: self.weapon,
                weapon_id: WeaponId(0),
                spread_salt: 0,
                config: &self.config,
            }
        }

        fn tick(
            &self,
            definition: &WeaponDefinition,
            state: &mut WeaponState,
            input: &WeaponInput,
            view: &mut ViewAngles,
            pool: Option<&mut AmmoPool>,
            ctx: &TickContext,
        ) -> TickOutcome {
            let mut world = CombatWorld::new(None, self.hitboxes.clone(), None);
            let shooter = ShooterView {
                entity: self.shooter,
                position: Vec3::ZERO,
                eye: Vec3::new(0.0, 1.0, 0.0),
                velocity: Vec3::ZERO,
                view,
            };
            simulate_weapon_tick(definition, state, input, Some(shooter), pool, &mut world, ctx)
        }
    }

    fn pull_trigger() -> WeaponInput {
        let mut input = WeaponInput::default();
        input.primary.update(true);
        input
    }

    #[test]
    fn test_single_shot_hits_target() {
        let scene = Scene::new();
        let def = rifle();
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();

        let outcome = scene.tick(
            &def,
            &mut state,
            &pull_trigger(),
            &mut view,
            None,
            &scene.ctx(1, NetRole::Server),
        );

        assert_eq!(state.clip(), 29);
        assert!(outcome.fired.is_some());
        assert_eq!(outcome.impacts.len(), 1);
        assert_eq!(outcome.damage.len(), 1);
        let damage = &outcome.damage[0];
        assert_eq!(damage.target, scene.target);
        assert_eq!(damage.amount, 20.0);
        assert_eq!(damage.hit_group, HitGroup::Body);
        assert_eq!(damage.attacker_distance, 10.0);
    }

    #[test]
    fn test_client_predicts_without_damage() {
        let scene = Scene::new();
        let def = rifle();
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();

        let outcome = scene.tick(
            &def,
            &mut state,
            &pull_trigger(),
            &mut view,
            None,
            &scene.ctx(1, NetRole::Client),
        );

        assert_eq!(state.clip(), 29);
        assert_eq!(outcome.impacts.len(), 1);
        assert!(outcome.damage.is_empty());
    }

    #[test]
    fn test_empty_clip_dry_fires() {
        let scene = Scene::new();
        let def = rifle();
        let mut state = WeaponState::new(&def);
        state.ammo_in_clip = 0;
        let mut view = ViewAngles::default();

        let outcome = scene.tick(
            &def,
            &mut state,
            &pull_trigger(),
            &mut view,
            None,
            &scene.ctx(1, NetRole::Server),
        );

        assert!(outcome.dry_fired);
        assert!(outcome.fired.is_none());
        assert!(outcome.damage.is_empty());
        assert!(outcome.impacts.is_empty());
        assert_eq!(state.clip(), 0);
        assert_eq!(state.time_since_primary_fire, 0.0);
    }

    #[test]
    fn test_rate_gate_between_shots() {
        let scene = Scene::new();
        let def = rifle();
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();
        let mut input = pull_trigger();

        let mut shots = 0;
        for tick in 1..=64 {
            let outcome = scene.tick(
                &def,
                &mut state,
                &input,
                &mut view,
                None,
                &scene.ctx(tick, NetRole::Server),
            );
            shots += usize::from(outcome.fired.is_some());
            input.primary.update(true);
        }
        // 10 rounds per second over one second of 64 Hz ticks, each shot
        // waiting strictly longer than 0.1 s.
        assert_eq!(shots, 10);
        assert_eq!(state.clip(), 20);
    }

    #[test]
    fn test_semi_fires_once_per_press() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            fire_mode: FireMode::Semi,
            ..rifle()
        };
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();
        let mut input = pull_trigger();

        let mut shots = 0;
        for tick in 1..=40 {
            let outcome = scene.tick(
                &def,
                &mut state,
                &input,
                &mut view,
                None,
                &scene.ctx(tick, NetRole::Server),
            );
            shots += usize::from(outcome.fired.is_some());
            input.primary.update(true);
        }
        assert_eq!(shots, 1);
    }

    #[test]
    fn test_burst_fires_armed_rounds() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            fire_mode: FireMode::Burst { shots: 3 },
            ..rifle()
        };
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();
        let mut input = pull_trigger();

        let mut shots = 0;
        for tick in 1..=64 {
            let outcome = scene.tick(
                &def,
                &mut state,
                &input,
                &mut view,
                None,
                &scene.ctx(tick, NetRole::Server),
            );
            shots += usize::from(outcome.fired.is_some());
            input.primary.update(false);
        }
        assert_eq!(shots, 3);
        assert_eq!(state.burst_remaining, 0);
    }

    #[test]
    fn test_reload_cycle() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            reload_time: 0.5,
            ..rifle()
        };
        let mut state = WeaponState::new(&def);
        state.ammo_in_clip = 5;
        let mut view = ViewAngles::default();
        let mut pool = AmmoPool::default().with(AmmoType::Rifle, 100);

        let mut input = WeaponInput::default();
        input.reload.update(true);
        input.primary.update(true);
        let outcome = scene.tick(
            &def,
            &mut state,
            &input,
            &mut view,
            Some(&mut pool),
            &scene.ctx(1, NetRole::Server),
        );
        assert!(outcome.reload_started);
        assert!(outcome.fired.is_none());
        assert!(state.is_reloading);

        input.reload.update(true);
        let mut finished = None;
        let mut ticks = 0;
        while finished.is_none() {
            ticks += 1;
            let outcome = scene.tick(
                &def,
                &mut state,
                &input,
                &mut view,
                Some(&mut pool),
                &scene.ctx(1 + ticks, NetRole::Server),
            );
            assert!(outcome.fired.is_none());
            finished = outcome.reload_finished;
        }
        // 0.5 s at 64 Hz: elapsed equals the reload time after 32 ticks and
        // exceeds it on the 33rd.
        assert_eq!(ticks, 33);
        assert_eq!(finished, Some(25));
        assert_eq!(state.clip(), 30);
        assert_eq!(pool.count(AmmoType::Rifle), 75);
    }

    #[test]
    fn test_deploy_time_blocks_everything() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            deploy_time: 0.5,
            ..rifle()
        };
        let mut state = WeaponState::new(&def);
        state.on_equip();
        let mut view = ViewAngles::default();

        let outcome = scene.tick(
            &def,
            &mut state,
            &pull_trigger(),
            &mut view,
            None,
            &scene.ctx(1, NetRole::Server),
        );
        assert!(outcome.fired.is_none());
        assert_eq!(state.clip(), 30);
    }

    #[test]
    fn test_recoil_kicks_aim_on_following_ticks() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            vertical_recoil: 1.0,
            recoil_recovery_scale: 0.5,
            ..rifle()
        };
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();

        scene.tick(
            &def,
            &mut state,
            &pull_trigger(),
            &mut view,
            None,
            &scene.ctx(1, NetRole::Client),
        );
        assert_eq!(state.accumulated_recoil.y, 1.0);
        assert_eq!(view.pitch, 0.0);

        scene.tick(
            &def,
            &mut state,
            &WeaponInput::default(),
            &mut view,
            None,
            &scene.ctx(2, NetRole::Client),
        );
        assert!(view.pitch > 0.0);
        assert!(state.accumulated_recoil.y < 1.0);
    }

    #[test]
    fn test_client_and_server_trace_identically() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            bullets_per_fire: 8,
            spread: 0.2,
            ..rifle()
        };

        let mut results = Vec::new();
        for role in [NetRole::Client, NetRole::Server] {
            let mut state = WeaponState::new(&def);
            let mut view = ViewAngles::default();
            let outcome = scene.tick(
                &def,
                &mut state,
                &pull_trigger(),
                &mut view,
                None,
                &scene.ctx(77, role),
            );
            let ends: Vec<[u32; 3]> = outcome
                .impacts
                .iter()
                .map(|impact| impact.end.to_array().map(f32::to_bits))
                .collect();
            results.push(ends);
        }
        assert_eq!(results[0].len(), 8);
        assert_eq!(results[0], results[1]);
    }

    fn impact_bits(outcome: &TickOutcome) -> Vec<[u32; 3]> {
        outcome
            .impacts
            .iter()
            .map(|impact| impact.end.to_array().map(f32::to_bits))
            .collect()
    }

    #[test]
    fn test_server_replay_of_client_input_matches_prediction() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            bullets_per_fire: 8,
            spread: 0.2,
            vertical_recoil: 1.0,
            horizontal_recoil_range: 0.5,
            ..rifle()
        };

        // The client predicts on its own tick 3.
        let mut client_state = WeaponState::new(&def);
        let mut client_view = ViewAngles::default();
        let client = scene.tick(
            &def,
            &mut client_state,
            &pull_trigger(),
            &mut client_view,
            None,
            &scene.ctx(3, NetRole::Client),
        );

        // The server applies the same input three ticks later.
        let mut input = pull_trigger();
        input.input_tick = Some(3);
        input.remote_aim = true;
        let mut server_state = WeaponState::new(&def);
        let mut server_view = client_view;
        let server = scene.tick(
            &def,
            &mut server_state,
            &input,
            &mut server_view,
            None,
            &scene.ctx(6, NetRole::Server),
        );

        assert_eq!(impact_bits(&client).len(), 8);
        assert_eq!(impact_bits(&client), impact_bits(&server));
        assert_eq!(client_state.accumulated_recoil, server_state.accumulated_recoil);
        assert_eq!(client.fired.map(|fired| fired.tick), Some(3));
        assert_eq!(server.fired.map(|fired| fired.tick), Some(3));
    }

    #[test]
    fn test_remote_aim_is_not_kicked_twice() {
        let scene = Scene::new();
        let def = WeaponDefinition {
            vertical_recoil: 1.0,
            recoil_recovery_scale: 0.5,
            primary_rate: 0.0,
            ..rifle()
        };
        let mut client_state = WeaponState::new(&def);
        let mut server_state = WeaponState::new(&def);
        let mut client_view = ViewAngles::default();
        let mut client_input = pull_trigger();
        let mut server_input = pull_trigger();
        server_input.remote_aim = true;

        for tick in 1..=4 {
            let client = scene.tick(
                &def,
                &mut client_state,
                &client_input,
                &mut client_view,
                None,
                &scene.ctx(tick, NetRole::Client),
            );

            // The command carries the aim the client fired with.
            let mut server_view = client_view;
            server_input.input_tick = Some(tick);
            let server = scene.tick(
                &def,
                &mut server_state,
                &server_input,
                &mut server_view,
                None,
                &scene.ctx(tick + 2, NetRole::Server),
            );

            let direction = |outcome: &TickOutcome| {
                outcome
                    .fired
                    .as_ref()
                    .map(|fired| fired.direction.to_array().map(f32::to_bits))
            };
            assert!(client.fired.is_some());
            assert_eq!(direction(&client), direction(&server));
            assert_eq!(server_view, client_view);

            client_input.primary.update(true);
            server_input.primary.update(true);
        }
        assert!(client_view.pitch > 0.0);
    }

    #[test]
    fn test_shot_tick_prefers_input_tick() {
        assert_eq!(shot_tick(Some(3), 6), 3);
        assert_eq!(shot_tick(None, 6), 6);
    }

    #[test]
    fn test_drop_needs_modifier() {
        let scene = Scene::new();
        let def = rifle();
        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();

        let mut input = WeaponInput::default();
        input.drop.update(true);
        let outcome = scene.tick(
            &def,
            &mut state,
            &input,
            &mut view,
            None,
            &scene.ctx(1, NetRole::Server),
        );
        assert!(outcome.ammo_drop.is_none());
        assert_eq!(state.clip(), 30);

        input.drop_modifier = true;
        input.drop = Default::default();
        input.drop.update(true);
        let outcome = scene.tick(
            &def,
            &mut state,
            &input,
            &mut view,
            None,
            &scene.ctx(2, NetRole::Server),
        );
        assert_eq!(outcome.ammo_drop.map(|drop| drop.amount), Some(30));
        assert_eq!(state.clip(), 0);
    }

    #[test]
    fn test_missing_owner_only_advances_timers() {
        let scene = Scene::new();
        let def = rifle();
        let mut state = WeaponState::new(&def);
        state.time_since_reload_start = 0.0;
        let mut world = CombatWorld::new(None, scene.hitboxes.clone(), None);
        let outcome = simulate_weapon_tick(
            &def,
            &mut state,
            &pull_trigger(),
            None,
            None,
            &mut world,
            &scene.ctx(1, NetRole::Server),
        );
        assert!(outcome.fired.is_none());
        assert_eq!(state.clip(), 30);
        assert!(state.time_since_reload_start > 0.0);
    }

    #[test]
    fn test_lag_compensated_shot_hits_old_position() {
        let mut scene = Scene::new();
        let target = scene.target;
        let mut history = HitboxHistory::with_capacity(8);
        history.record(3, vec![(target, HitboxPose::new(Vec3::new(0.0, 0.0, -10.0), &Hitbox::default()))]);

        // The target has since stepped out of the line of fire.
        scene.hitboxes = HitboxSet::default();
        scene
            .hitboxes
            .push(target, HitboxPose::new(Vec3::new(4.0, 0.0, -10.0), &Hitbox::default()));

        let def = rifle();
        let mut input = pull_trigger();
        input.input_tick = Some(3);

        let mut state = WeaponState::new(&def);
        let mut view = ViewAngles::default();
        let mut world = CombatWorld::new(None, scene.hitboxes.clone(), Some(&history));
        let shooter = ShooterView {
            entity: scene.shooter,
            position: Vec3::ZERO,
            eye: Vec3::new(0.0, 1.0, 0.0),
            velocity: Vec3::ZERO,
            view: &mut view,
        };
        let outcome = simulate_weapon_tick(
            &def,
            &mut state,
            &input,
            Some(shooter),
            None,
            &mut world,
            &scene.ctx(6, NetRole::Server),
        );
        assert_eq!(outcome.damage.len(), 1);
        assert_eq!(outcome.damage[0].target, target);

        // Restored once the shot is resolved.
        let straight_ahead = TraceQuery {
            origin: Vec3::new(0.0, 1.0, 0.0),
            direction: Vec3::NEG_Z,
            max_distance: 100.0,
            radius: 0.0,
            include_water: false,
            exclude: vec![],
        };
        assert!(world.cast_bullet(&straight_ahead).is_none());
    }

    #[test]
    fn test_rewind_only_for_older_authoritative_input() {
        assert_eq!(rewind_tick(NetRole::Server, Some(3), 6), Some(3));
        assert_eq!(rewind_tick(NetRole::Server, Some(6), 6), None);
        assert_eq!(rewind_tick(NetRole::Client, Some(3), 6), None);
        assert_eq!(rewind_tick(NetRole::Standalone, None, 6), None);
    }
}
