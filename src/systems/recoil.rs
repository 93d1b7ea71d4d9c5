//! Recoil model - per-shot impulse and continuous recovery.
//!
//! `accumulated_recoil` is a pending aim velocity: each tick the aim moves
//! by `recoil * dt` and the pending recoil is paid back by the distance the
//! aim actually moved, scaled by the recovery factor.

use bevy::prelude::*;
use rand::Rng;

use crate::components::ViewAngles;
use crate::resources::WeaponDefinition;
use crate::systems::ballistics::{ShotSeed, RECOIL_STREAM};

/// Impulse added by one shot: `x` yaw, `y` pitch.
///
/// The horizontal component is uniform in `[-range, range]` and drawn from
/// the shot's own recoil stream, so every peer gets the same kick.
pub fn sample_recoil_impulse(definition: &WeaponDefinition, seed: ShotSeed) -> Vec2 {
    let range = definition.horizontal_recoil_range;
    let horizontal = if range > 0.0 {
        seed.rng(RECOIL_STREAM).random_range(-range..=range)
    } else {
        0.0
    };
    Vec2::new(horizontal, definition.vertical_recoil)
}

/// Displaces the aim by the pending recoil and recovers it.
///
/// Pitch is clamped to [`ViewAngles::PITCH_LIMIT`]; recovery only counts the
/// displacement that was applied. Each component shrinks toward zero and
/// never crosses it.
pub fn apply_recoil(view: &mut ViewAngles, recoil: &mut Vec2, recovery_scale: f32, dt: f32) {
    if *recoil == Vec2::ZERO {
        return;
    }

    let old = *view;
    view.pitch = (view.pitch + recoil.y * dt).clamp(-ViewAngles::PITCH_LIMIT, ViewAngles::PITCH_LIMIT);
    view.yaw += recoil.x * dt;

    let moved = Vec2::new(view.yaw - old.yaw, view.pitch - old.pitch);
    recoil.x = recover(recoil.x, moved.x * recovery_scale);
    recoil.y = recover(recoil.y, moved.y * recovery_scale);
}

fn recover(value: f32, paid: f32) -> f32 {
    let next = value - paid;
    if next.signum() != value.signum() {
        0.0
    } else {
        next
    }
}
