//! Damage model - distance falloff and damage event construction.

use bevy::prelude::*;

use crate::events::DamageEvent;
use crate::resources::{CombatConfig, WeaponDefinition, WeaponId};
use crate::systems::ballistics::BallisticHit;
use crate::types::HitGroup;

/// Damage after distance falloff.
///
/// * `end <= 0` - no falloff
/// * `start > 0` - full damage before `start`, then linear to zero at `end`
/// * `start <= 0` - linear from full damage at zero to zero at `end`
///
/// A curve with `end <= start` cuts off to zero at `start`.
///
/// # Example
/// ```
/// use bevy_gunplay::systems::damage::damage_falloff;
///
/// assert_eq!(damage_falloff(5.0, 100.0, 10.0, 20.0), 100.0);
/// assert_eq!(damage_falloff(15.0, 100.0, 10.0, 20.0), 50.0);
/// assert_eq!(damage_falloff(25.0, 100.0, 10.0, 20.0), 0.0);
/// ```
pub fn damage_falloff(distance: f32, damage: f32, start: f32, end: f32) -> f32 {
    if end <= 0.0 {
        return damage;
    }

    if start > 0.0 {
        if distance < start {
            return damage;
        }
        let range = end - start;
        if range <= 0.0 {
            return 0.0;
        }
        return (damage - damage / range * (distance - start)).max(0.0);
    }

    (damage - damage / end * distance).max(0.0)
}

/// Damage one pellet deals for a hit at `distance` in `hit_group`.
pub fn hit_damage(definition: &WeaponDefinition, distance: f32, hit_group: HitGroup) -> f32 {
    let damage = damage_falloff(
        distance,
        definition.damage,
        definition.damage_falloff_start,
        definition.damage_falloff_end,
    );
    match hit_group {
        HitGroup::Head => damage * definition.headshot_multiplier,
        HitGroup::Body | HitGroup::Generic => damage,
    }
}

/// Who fired the pellet being resolved.
#[derive(Clone, Copy, Debug)]
pub struct DamageSource {
    pub attacker: Entity,
    pub attacker_position: Vec3,
    pub weapon: Entity,
    pub weapon_id: WeaponId,
}

/// Builds the damage event for a pellet that struck an entity. Returns
/// `None` for segments that did not hit anything.
///
/// `target_position` is the victim's origin, used for the reported
/// attacker distance; the hit point stands in when it is unknown.
pub fn build_damage_event(
    definition: &WeaponDefinition,
    source: DamageSource,
    hit: &BallisticHit,
    target_position: Option<Vec3>,
    config: &CombatConfig,
) -> Option<DamageEvent> {
    let target = hit.entity.filter(|_| hit.hit)?;
    let victim = target_position.unwrap_or(hit.end);

    Some(DamageEvent {
        target,
        attacker: source.attacker,
        weapon: source.weapon,
        weapon_id: source.weapon_id,
        amount: hit_damage(definition, hit.distance, hit.hit_group),
        base_damage: definition.damage,
        position: hit.end,
        direction: hit.direction,
        force: hit.direction * 100.0 * config.impact_force,
        origin: hit.start,
        hit_group: hit.hit_group,
        distance: hit.distance,
        attacker_distance: source.attacker_position.distance(victim),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SurfaceKind;

    #[test]
    fn test_no_falloff_when_end_is_zero() {
        for distance in [0.0, 10.0, 1000.0, 1.0e6] {
            assert_eq!(damage_falloff(distance, 42.0, 0.0, 0.0), 42.0);
            assert_eq!(damage_falloff(distance, 42.0, 50.0, 0.0), 42.0);
        }
    }

    #[test]
    fn test_falloff_with_start() {
        assert_eq!(damage_falloff(5.0, 100.0, 10.0, 20.0), 100.0);
        assert_eq!(damage_falloff(10.0, 100.0, 10.0, 20.0), 100.0);
        assert_eq!(damage_falloff(15.0, 100.0, 10.0, 20.0), 50.0);
        assert_eq!(damage_falloff(20.0, 100.0, 10.0, 20.0), 0.0);
        assert_eq!(damage_falloff(25.0, 100.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_falloff_from_origin() {
        assert_eq!(damage_falloff(0.0, 80.0, 0.0, 40.0), 80.0);
        assert_eq!(damage_falloff(10.0, 80.0, 0.0, 40.0), 60.0);
        assert_eq!(damage_falloff(50.0, 80.0, 0.0, 40.0), 0.0);
    }

    #[test]
    fn test_inverted_range_cuts_off() {
        assert_eq!(damage_falloff(5.0, 100.0, 10.0, 8.0), 100.0);
        assert_eq!(damage_falloff(10.0, 100.0, 10.0, 8.0), 0.0);
    }

    #[test]
    fn test_headshot_multiplier() {
        let def = WeaponDefinition {
            damage: 30.0,
            headshot_multiplier: 2.5,
            ..Default::default()
        };
        assert_eq!(hit_damage(&def, 10.0, HitGroup::Head), 75.0);
        assert_eq!(hit_damage(&def, 10.0, HitGroup::Body), 30.0);
    }

    #[test]
    fn test_build_damage_event() {
        let mut world = World::new();
        let target = world.spawn_empty().id();
        let attacker = world.spawn_empty().id();
        let weapon = world.spawn_empty().id();

        let def = WeaponDefinition::default();
        let hit = BallisticHit {
            start: Vec3::new(0.0, 1.6, 0.0),
            end: Vec3::new(0.0, 1.6, -10.0),
            direction: Vec3::NEG_Z,
            distance: 10.0,
            hit: true,
            entity: Some(target),
            surface: SurfaceKind::Flesh,
            normal: Vec3::Z,
            hit_group: HitGroup::Body,
        };
        let source = DamageSource {
            attacker,
            attacker_position: Vec3::ZERO,
            weapon,
            weapon_id: WeaponId(0),
        };
        let config = CombatConfig::default();

        let event = build_damage_event(&def, source, &hit, Some(Vec3::new(0.0, 0.0, -10.0)), &config)
            .unwrap();
        assert_eq!(event.target, target);
        assert_eq!(event.amount, 20.0);
        assert_eq!(event.base_damage, 20.0);
        assert_eq!(event.attacker_distance, 10.0);
        assert!(event.force.abs_diff_eq(Vec3::NEG_Z * 150.0, 1e-4));

        let miss = BallisticHit {
            hit: false,
            entity: None,
            ..hit
        };
        assert!(build_damage_event(&def, source, &miss, None, &config).is_none());
    }
}
