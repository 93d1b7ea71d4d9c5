//! Lag compensation - hitbox history and rewind/restore scoping.
//!
//! The authoritative peer records every hitbox pose each tick. When a shot
//! arrives from a client that saw an older tick, hitboxes are moved back to
//! that tick for the duration of the shot and restored afterwards.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use bevy::prelude::*;

use crate::components::Hitbox;
use crate::resources::{CombatConfig, SimulationTick};
use crate::systems::ballistics::{HitboxPose, HitboxSet};
use crate::types::{HitResult, NetRole, SpatialQueryExt, TraceQuery};

/// Poses of all hitboxes at one tick.
#[derive(Clone, Debug, Default)]
pub struct HitboxFrame {
    pub tick: u64,
    pub poses: Vec<(Entity, HitboxPose)>,
}

impl HitboxFrame {
    pub fn pose(&self, entity: Entity) -> Option<HitboxPose> {
        self.poses
            .iter()
            .find(|(e, _)| *e == entity)
            .map(|(_, pose)| *pose)
    }
}

/// Ring buffer of recent [`HitboxFrame`]s, oldest first.
#[derive(Resource, Clone, Debug)]
pub struct HitboxHistory {
    frames: VecDeque<HitboxFrame>,
    capacity: usize,
}

impl Default for HitboxHistory {
    fn default() -> Self {
        Self::with_capacity(CombatConfig::default().history_ticks)
    }
}

impl HitboxHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// Stores the poses for `tick`, replacing a frame already recorded for
    /// the same tick and dropping the oldest frame when full.
    pub fn record(&mut self, tick: u64, poses: Vec<(Entity, HitboxPose)>) {
        if let Some(last) = self.frames.back_mut() {
            if last.tick == tick {
                last.poses = poses;
                return;
            }
            if last.tick > tick {
                // Tick went backwards; history no longer describes the past.
                self.frames.clear();
            }
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(HitboxFrame { tick, poses });
    }

    /// Newest frame at or before `tick`. Requests older than the history
    /// clamp to the oldest frame.
    pub fn frame_at(&self, tick: u64) -> Option<&HitboxFrame> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.tick <= tick)
            .or_else(|| self.frames.front())
    }

    pub fn oldest_tick(&self) -> Option<u64> {
        self.frames.front().map(|frame| frame.tick)
    }

    pub fn newest_tick(&self) -> Option<u64> {
        self.frames.back().map(|frame| frame.tick)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Something whose collision state can be moved back in time.
pub trait LagCompensation {
    /// Moves everything except `exclude` to its state at `tick`.
    fn rewind(&mut self, tick: u64, exclude: &[Entity]);

    /// Undoes the last [`Self::rewind`]. Must be harmless when nothing was
    /// rewound.
    fn restore(&mut self);

    /// Origin of `entity` in the current, possibly rewound, state.
    fn rewound_origin(&self, _entity: Entity) -> Option<Vec3> {
        None
    }
}

/// Guard that keeps a world rewound while it lives and restores it on drop,
/// whichever way the scope is left.
pub struct LagCompensationScope<'a, W: LagCompensation + ?Sized> {
    world: &'a mut W,
    active: bool,
}

impl<'a, W: LagCompensation + ?Sized> LagCompensationScope<'a, W> {
    /// Rewinds to `tick` when one is given; otherwise the scope is inert.
    pub fn begin(world: &'a mut W, tick: Option<u64>, exclude: &[Entity]) -> Self {
        let active = match tick {
            Some(tick) => {
                world.rewind(tick, exclude);
                true
            }
            None => false,
        };
        Self { world, active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl<W: LagCompensation + ?Sized> Deref for LagCompensationScope<'_, W> {
    type Target = W;

    fn deref(&self) -> &W {
        self.world
    }
}

impl<W: LagCompensation + ?Sized> DerefMut for LagCompensationScope<'_, W> {
    fn deref_mut(&mut self) -> &mut W {
        self.world
    }
}

impl<W: LagCompensation + ?Sized> Drop for LagCompensationScope<'_, W> {
    fn drop(&mut self) {
        if self.active {
            self.world.restore();
        }
    }
}

/// Current hitboxes plus the history needed to rewind them.
#[derive(Clone, Debug, Default)]
pub struct RewindableHitboxes<'h> {
    pub current: HitboxSet,
    history: Option<&'h HitboxHistory>,
    saved: Option<HitboxSet>,
}

impl<'h> RewindableHitboxes<'h> {
    pub fn new(current: HitboxSet, history: Option<&'h HitboxHistory>) -> Self {
        Self {
            current,
            history,
            saved: None,
        }
    }

    pub fn is_rewound(&self) -> bool {
        self.saved.is_some()
    }
}

impl LagCompensation for RewindableHitboxes<'_> {
    fn rewind(&mut self, tick: u64, exclude: &[Entity]) {
        let Some(frame) = self.history.and_then(|history| history.frame_at(tick)) else {
            return;
        };
        if self.saved.is_none() {
            self.saved = Some(self.current.clone());
        }
        for entry in &mut self.current.entries {
            if exclude.contains(&entry.entity) {
                continue;
            }
            if let Some(pose) = frame.pose(entry.entity) {
                entry.pose = pose;
            }
        }
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.current = saved;
        }
    }

    fn rewound_origin(&self, entity: Entity) -> Option<Vec3> {
        self.current.pose(entity).map(|pose| pose.origin)
    }
}

impl SpatialQueryExt for RewindableHitboxes<'_> {
    fn cast_bullet(&self, query: &TraceQuery) -> Option<HitResult> {
        self.current.cast_bullet(query)
    }

    fn is_point_in_water(&self, point: Vec3) -> bool {
        self.current.is_point_in_water(point)
    }
}

/// Snapshots this tick's hitbox poses on the authoritative peer.
pub fn record_hitbox_history(
    role: Res<NetRole>,
    tick: Res<SimulationTick>,
    config: Res<CombatConfig>,
    mut history: ResMut<HitboxHistory>,
    hitboxes: Query<(Entity, &Transform, &Hitbox)>,
) {
    if !role.is_authoritative() {
        return;
    }
    if history.capacity != config.history_ticks.max(1) {
        history.set_capacity(config.history_ticks);
    }
    let poses = hitboxes
        .iter()
        .map(|(entity, transform, hitbox)| (entity, HitboxPose::new(transform.translation, hitbox)))
        .collect();
    history.record(tick.0, poses);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HitGroup;

    fn pose_at_z(z: f32) -> HitboxPose {
        HitboxPose::new(Vec3::new(0.0, 0.0, z), &Hitbox::default())
    }

    fn pose_at_x(x: f32) -> HitboxPose {
        HitboxPose::new(Vec3::new(x, 0.0, -10.0), &Hitbox::default())
    }

    fn body_shot() -> TraceQuery {
        TraceQuery {
            origin: Vec3::new(0.0, 1.0, 0.0),
            direction: Vec3::NEG_Z,
            max_distance: 100.0,
            radius: 0.0,
            include_water: false,
            exclude: vec![],
        }
    }

    #[test]
    fn test_history_ring_drops_oldest() {
        let mut world = World::new();
        let target = world.spawn_empty().id();
        let mut history = HitboxHistory::with_capacity(3);
        for tick in 0..5 {
            history.record(tick, vec![(target, pose_at_z(tick as f32))]);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest_tick(), Some(2));
        assert_eq!(history.newest_tick(), Some(4));
    }

    #[test]
    fn test_frame_lookup_clamps() {
        let mut world = World::new();
        let target = world.spawn_empty().id();
        let mut history = HitboxHistory::with_capacity(8);
        for tick in [10, 11, 13] {
            history.record(tick, vec![(target, pose_at_z(tick as f32))]);
        }
        assert_eq!(history.frame_at(11).unwrap().tick, 11);
        assert_eq!(history.frame_at(12).unwrap().tick, 11);
        assert_eq!(history.frame_at(99).unwrap().tick, 13);
        assert_eq!(history.frame_at(2).unwrap().tick, 10);
    }

    #[test]
    fn test_same_tick_replaces_frame() {
        let mut world = World::new();
        let target = world.spawn_empty().id();
        let mut history = HitboxHistory::with_capacity(4);
        history.record(5, vec![(target, pose_at_z(1.0))]);
        history.record(5, vec![(target, pose_at_z(2.0))]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.frame_at(5).unwrap().pose(target), Some(pose_at_z(2.0)));
    }

    #[test]
    fn test_rewind_hits_past_position_and_restores() {
        let mut world = World::new();
        let target = world.spawn_empty().id();

        // The target stood in the line of fire at tick 1 and has since moved.
        let mut history = HitboxHistory::with_capacity(8);
        history.record(1, vec![(target, pose_at_x(0.0))]);
        history.record(2, vec![(target, pose_at_x(5.0))]);

        let mut current = HitboxSet::default();
        current.push(target, pose_at_x(5.0));
        let mut hitboxes = RewindableHitboxes::new(current, Some(&history));
        assert!(hitboxes.cast_bullet(&body_shot()).is_none());

        {
            let scope = LagCompensationScope::begin(&mut hitboxes, Some(1), &[]);
            assert!(scope.is_active());
            let hit = scope.cast_bullet(&body_shot()).unwrap();
            assert_eq!(hit.entity, target);
            assert_eq!(hit.hit_group, HitGroup::Body);
        }

        assert!(!hitboxes.is_rewound());
        assert!(hitboxes.cast_bullet(&body_shot()).is_none());
    }

    #[test]
    fn test_excluded_entities_stay_put() {
        let mut world = World::new();
        let target = world.spawn_empty().id();
        let mut history = HitboxHistory::with_capacity(8);
        history.record(1, vec![(target, pose_at_x(0.0))]);

        let mut current = HitboxSet::default();
        current.push(target, pose_at_x(5.0));
        let mut hitboxes = RewindableHitboxes::new(current, Some(&history));

        let scope = LagCompensationScope::begin(&mut hitboxes, Some(1), &[target]);
        assert!(scope.cast_bullet(&body_shot()).is_none());
    }

    #[test]
    fn test_inert_scope_without_tick() {
        let mut hitboxes = RewindableHitboxes::new(HitboxSet::default(), None);
        let scope = LagCompensationScope::begin(&mut hitboxes, None, &[]);
        assert!(!scope.is_active());
    }

    #[test]
    fn test_restore_runs_on_early_exit() {
        fn shoot(hitboxes: &mut RewindableHitboxes, fail: bool) -> Result<(), ()> {
            let _scope = LagCompensationScope::begin(hitboxes, Some(1), &[]);
            if fail {
                return Err(());
            }
            Ok(())
        }

        let mut world = World::new();
        let target = world.spawn_empty().id();
        let mut history = HitboxHistory::with_capacity(8);
        history.record(1, vec![(target, pose_at_x(0.0))]);
        let mut current = HitboxSet::default();
        current.push(target, pose_at_x(5.0));
        let mut hitboxes = RewindableHitboxes::new(current, Some(&history));

        assert!(shoot(&mut hitboxes, true).is_err());
        assert!(!hitboxes.is_rewound());
        assert_eq!(hitboxes.current.pose(target), Some(&pose_at_x(5.0)));
    }
}
