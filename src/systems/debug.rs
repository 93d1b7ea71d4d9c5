use bevy::ecs::message::MessageReader;
use bevy::prelude::*;

use crate::events::BulletImpact;
use crate::resources::CombatConfig;
use crate::types::HitEffectType;

/// Seconds a traced segment stays on screen.
const TRACE_LIFETIME: f32 = 1.0;

/// Traces drawn recently, oldest first.
#[derive(Resource, Default)]
pub struct DebugTraces {
    traces: Vec<(BulletImpact, f32)>,
}

/// Collects [`BulletImpact`]s so they outlive the tick that produced them.
pub fn collect_trace_debug(
    time: Res<Time>,
    config: Res<CombatConfig>,
    mut traces: ResMut<DebugTraces>,
    mut impacts: MessageReader<BulletImpact>,
) {
    if !config.debug_draw {
        impacts.clear();
        traces.traces.clear();
        return;
    }

    let dt = time.delta_secs();
    traces.traces.retain_mut(|(_, age)| {
        *age += dt;
        *age < TRACE_LIFETIME
    });
    traces
        .traces
        .extend(impacts.read().map(|impact| (impact.clone(), 0.0)));
}

/// Draw debug gizmos for bullet traces.
///
/// Misses are grey, world hits are colored by impact effect and flesh hits
/// get a marker at the hit point.
pub fn draw_trace_debug(mut gizmos: Gizmos, config: Res<CombatConfig>, traces: Res<DebugTraces>) {
    if !config.debug_draw {
        return;
    }

    for (impact, _) in &traces.traces {
        if !impact.hit {
            gizmos.line(impact.start, impact.end, Color::srgb(0.5, 0.5, 0.5));
            continue;
        }

        let color = match impact.effect {
            HitEffectType::Blood => Color::srgb(1.0, 0.0, 0.0),
            HitEffectType::Sparks => Color::srgb(1.0, 0.7, 0.2),
            HitEffectType::Water => Color::srgb(0.2, 0.4, 1.0),
            _ => Color::srgb(0.0, 1.0, 0.0),
        };
        gizmos.line(impact.start, impact.end, color);
        gizmos.line(impact.end, impact.end + impact.normal * 0.25, Color::WHITE);

        if impact.effect == HitEffectType::Blood {
            gizmos.sphere(impact.end, 0.05, color);
        }
    }
}
