//! Ballistic resolver - seeded spread sampling and bullet traces.
//!
//! Every random draw of a shot comes from a generator seeded by the
//! simulation tick, so a predicting client and the server trace the same
//! pellets for the same input.

use std::iter::FusedIterator;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, UnitSphere};

#[cfg(feature = "dim3")]
use avian3d::prelude::*;
#[cfg(feature = "dim3")]
use bevy::ecs::system::SystemParam;

use crate::components::Hitbox;
#[cfg(feature = "dim3")]
use crate::components::Surface;
#[cfg(feature = "dim3")]
use crate::types::CombatLayer;
use crate::types::{HitGroup, HitResult, SpatialQueryExt, SurfaceKind, TraceQuery};

/// Generator stream used for pellet spread.
pub const SPREAD_STREAM: u64 = 0;
/// Generator stream used for horizontal recoil.
pub const RECOIL_STREAM: u64 = 1;

/// Seed for all randomness of one shot.
///
/// # Fields
/// * `tick` - Simulation tick the shot happens on
/// * `salt` - Extra input separating weapons that fire on the same tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShotSeed {
    pub tick: u64,
    pub salt: u64,
}

impl ShotSeed {
    pub fn new(tick: u64, salt: u64) -> Self {
        Self { tick, salt }
    }

    fn mixed(&self) -> u64 {
        splitmix64(self.tick ^ splitmix64(self.salt))
    }

    /// Portable generator for one purpose of this shot.
    pub fn rng(&self, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.mixed());
        rng.set_stream(stream);
        rng
    }
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Perturbs `forward` by the sum of four random unit vectors scaled by
/// `spread * 0.25`.
///
/// The sum of four samples is center weighted, so most pellets land near
/// the aim point.
pub fn pellet_direction<R: Rng + ?Sized>(forward: Vec3, spread: f32, rng: &mut R) -> Vec3 {
    let mut offset = Vec3::ZERO;
    for _ in 0..4 {
        let sample: [f32; 3] = UnitSphere.sample(rng);
        offset += Vec3::from_array(sample);
    }
    (forward + offset * spread * 0.25).normalize_or(forward)
}

/// Directions of all pellets of one shot, in firing order.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_gunplay::systems::ballistics::{spread_pattern, ShotSeed};
///
/// let a = spread_pattern(Vec3::NEG_Z, 0.1, ShotSeed::new(64, 7), 8);
/// let b = spread_pattern(Vec3::NEG_Z, 0.1, ShotSeed::new(64, 7), 8);
/// assert_eq!(a, b);
/// ```
pub fn spread_pattern(forward: Vec3, spread: f32, seed: ShotSeed, pellets: u32) -> Vec<Vec3> {
    let mut rng = seed.rng(SPREAD_STREAM);
    (0..pellets)
        .map(|_| pellet_direction(forward, spread, &mut rng))
        .collect()
}

/// One segment of a bullet's path.
///
/// # Fields
/// * `start` / `end` - Segment endpoints
/// * `direction` - Travel direction of the segment
/// * `distance` - Length of the segment (meters)
/// * `hit` - Whether the segment ended on something
/// * `entity` - Struck entity
/// * `surface` - Surface classification at `end`
/// * `normal` - Surface normal at `end`
/// * `hit_group` - Hit zone on a hitbox
#[derive(Clone, Debug, PartialEq)]
pub struct BallisticHit {
    pub start: Vec3,
    pub end: Vec3,
    pub direction: Vec3,
    pub distance: f32,
    pub hit: bool,
    pub entity: Option<Entity>,
    pub surface: SurfaceKind,
    pub normal: Vec3,
    pub hit_group: HitGroup,
}

/// Lazy sequence of segments for one pellet.
///
/// Produces the first segment on the first call to `next` and nothing
/// after it. Penetration or ricochet would add segments here.
pub struct BulletTrace<'w, W: SpatialQueryExt + ?Sized> {
    world: &'w W,
    pending: Option<TraceQuery>,
}

impl<'w, W: SpatialQueryExt + ?Sized> BulletTrace<'w, W> {
    pub fn new(world: &'w W, query: TraceQuery) -> Self {
        Self {
            world,
            pending: Some(query),
        }
    }
}

impl<W: SpatialQueryExt + ?Sized> Iterator for BulletTrace<'_, W> {
    type Item = BallisticHit;

    fn next(&mut self) -> Option<BallisticHit> {
        let query = self.pending.take()?;
        let record = match self.world.cast_bullet(&query) {
            Some(hit) => BallisticHit {
                start: query.origin,
                end: query.origin + query.direction * hit.distance,
                direction: query.direction,
                distance: hit.distance,
                hit: true,
                entity: Some(hit.entity),
                surface: hit.surface,
                normal: hit.normal,
                hit_group: hit.hit_group,
            },
            None => BallisticHit {
                start: query.origin,
                end: query.origin + query.direction * query.max_distance,
                direction: query.direction,
                distance: query.max_distance,
                hit: false,
                entity: None,
                surface: SurfaceKind::Default,
                normal: -query.direction,
                hit_group: HitGroup::Generic,
            },
        };
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.pending.is_some());
        (remaining, Some(remaining))
    }
}

impl<W: SpatialQueryExt + ?Sized> FusedIterator for BulletTrace<'_, W> {}

/// Traces a pellet from `origin` along `direction`. Water stops the bullet
/// only when `origin` is itself in water.
pub fn trace_bullet<'w, W: SpatialQueryExt + ?Sized>(
    world: &'w W,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    radius: f32,
    exclude: Vec<Entity>,
) -> BulletTrace<'w, W> {
    let include_water = world.is_point_in_water(origin);
    BulletTrace::new(
        world,
        TraceQuery {
            origin,
            direction,
            max_distance,
            radius,
            include_water,
            exclude,
        },
    )
}

/// World-space placement of a [`Hitbox`] at one moment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitboxPose {
    /// Entity translation the offsets were applied to
    pub origin: Vec3,
    pub head_center: Vec3,
    pub head_radius: f32,
    pub body_center: Vec3,
    pub body_half_extents: Vec3,
}

impl HitboxPose {
    pub fn new(translation: Vec3, hitbox: &Hitbox) -> Self {
        Self {
            origin: translation,
            head_center: translation + hitbox.head_offset,
            head_radius: hitbox.head_radius,
            body_center: translation + hitbox.body_offset,
            body_half_extents: hitbox.body_half_extents,
        }
    }

    /// Closest intersection of a ray inflated by `radius`, as
    /// `(distance, normal, group)`.
    pub fn intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        radius: f32,
    ) -> Option<(f32, Vec3, HitGroup)> {
        let head = ray_sphere(origin, direction, self.head_center, self.head_radius + radius)
            .filter(|t| *t <= max_distance)
            .map(|t| {
                let normal = (origin + direction * t - self.head_center).normalize_or(-direction);
                (t, normal, HitGroup::Head)
            });
        let body = ray_aabb(
            origin,
            direction,
            self.body_center,
            self.body_half_extents + Vec3::splat(radius),
        )
        .filter(|(t, _)| *t <= max_distance)
        .map(|(t, normal)| (t, normal, HitGroup::Body));

        match (head, body) {
            (Some(h), Some(b)) => Some(if b.0 < h.0 { b } else { h }),
            (head, body) => head.or(body),
        }
    }
}

fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let offset = origin - center;
    let b = offset.dot(direction);
    let c = offset.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some((-b - discriminant.sqrt()).max(0.0))
}

fn ray_aabb(origin: Vec3, direction: Vec3, center: Vec3, half_extents: Vec3) -> Option<(f32, Vec3)> {
    let min = center - half_extents;
    let max = center + half_extents;
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = -direction;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < f32::EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (min[axis] - o) * inv;
        let mut t1 = (max[axis] - o) * inv;
        let mut face = -1.0;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            face = 1.0;
        }
        if t0 > t_enter {
            t_enter = t0;
            normal = Vec3::ZERO;
            normal[axis] = face;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_exit < 0.0 {
        return None;
    }
    Some((t_enter.max(0.0), normal))
}

/// One damageable body in a [`HitboxSet`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitboxEntry {
    pub entity: Entity,
    pub pose: HitboxPose,
}

/// Analytic hitbox geometry traced by bullets.
///
/// Kept separate from the physics world so lag compensation can swap poses
/// without touching colliders.
#[derive(Clone, Debug, Default)]
pub struct HitboxSet {
    pub entries: Vec<HitboxEntry>,
}

impl HitboxSet {
    pub fn push(&mut self, entity: Entity, pose: HitboxPose) {
        self.entries.push(HitboxEntry { entity, pose });
    }

    pub fn pose(&self, entity: Entity) -> Option<&HitboxPose> {
        self.entries
            .iter()
            .find(|entry| entry.entity == entity)
            .map(|entry| &entry.pose)
    }

    pub fn pose_mut(&mut self, entity: Entity) -> Option<&mut HitboxPose> {
        self.entries
            .iter_mut()
            .find(|entry| entry.entity == entity)
            .map(|entry| &mut entry.pose)
    }
}

impl SpatialQueryExt for HitboxSet {
    fn cast_bullet(&self, query: &TraceQuery) -> Option<HitResult> {
        self.entries
            .iter()
            .filter(|entry| !query.excludes(entry.entity))
            .filter_map(|entry| {
                entry
                    .pose
                    .intersect(query.origin, query.direction, query.max_distance, query.radius)
                    .map(|(distance, normal, hit_group)| HitResult {
                        entity: entry.entity,
                        point: query.origin + query.direction * distance,
                        normal,
                        distance,
                        surface: SurfaceKind::Flesh,
                        hit_group,
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn is_point_in_water(&self, _point: Vec3) -> bool {
        false
    }
}

/// World geometry backed by the avian3d spatial query pipeline.
///
/// Character colliders are skipped; their damageable volume is traced
/// through [`HitboxSet`].
#[cfg(feature = "dim3")]
#[derive(SystemParam)]
pub struct PhysicsGeometry<'w, 's> {
    spatial: SpatialQuery<'w, 's>,
    surfaces: Query<'w, 's, &'static Surface>,
}

#[cfg(feature = "dim3")]
impl SpatialQueryExt for PhysicsGeometry<'_, '_> {
    fn cast_bullet(&self, query: &TraceQuery) -> Option<HitResult> {
        let direction = Dir3::new(query.direction).ok()?;
        let mask: LayerMask = if query.include_water {
            [CombatLayer::Default, CombatLayer::Water, CombatLayer::Debris].into()
        } else {
            [CombatLayer::Default, CombatLayer::Debris].into()
        };
        let filter = SpatialQueryFilter::from_mask(mask)
            .with_excluded_entities(query.exclude.iter().copied());

        let (entity, distance, normal) = if query.radius > 0.0 {
            let hit = self.spatial.cast_shape(
                &Collider::sphere(query.radius),
                query.origin,
                Quat::IDENTITY,
                direction,
                &ShapeCastConfig::from_max_distance(query.max_distance),
                &filter,
            )?;
            (hit.entity, hit.distance, hit.normal1)
        } else {
            let hit = self.spatial.cast_ray(
                query.origin,
                direction,
                query.max_distance,
                true,
                &filter,
            )?;
            (hit.entity, hit.distance, hit.normal)
        };

        let surface = self
            .surfaces
            .get(entity)
            .map(|surface| surface.0)
            .unwrap_or_default();

        Some(HitResult {
            entity,
            point: query.origin + *direction * distance,
            normal,
            distance,
            surface,
            hit_group: HitGroup::Generic,
        })
    }

    fn is_point_in_water(&self, point: Vec3) -> bool {
        let filter = SpatialQueryFilter::from_mask(CombatLayer::Water);
        !self.spatial.point_intersections(point, &filter).is_empty()
    }
}
