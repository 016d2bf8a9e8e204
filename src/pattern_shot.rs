//! Declarative multi-shot firing.
//!
//! A [`PatternShot`] describes a way x stack grid of shots. Firing expands it into
//! [`ShotSpawn`]s, stack outer and way inner, and compiles its transform list into
//! scheduled pattern commands for every spawned shot.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::movement::{AngleSpec, PatternOp};
use crate::stage::{ObjectId, ObjectState, ObjectType, OwnerType};

pub const PATTERN_BASEPOINT_RESET: f32 = -65536.0;
pub const NO_CHANGE: f64 = -65536.0;
pub const TOPLAYER_CHANGE: f64 = -65537.0;

/// Axis ratio of the ellipse pattern.
const ELLIPSE_MINOR: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternType {
    Fan,
    FanAimed,
    Ring,
    RingAimed,
    Arrow,
    ArrowAimed,
    Polygon,
    PolygonAimed,
    Ellipse,
    EllipseAimed,
    ScatterAngle,
    ScatterSpeed,
    Scatter,
}

impl PatternType {
    const TABLE: [PatternType; 13] = [
        PatternType::Fan,
        PatternType::FanAimed,
        PatternType::Ring,
        PatternType::RingAimed,
        PatternType::Arrow,
        PatternType::ArrowAimed,
        PatternType::Polygon,
        PatternType::PolygonAimed,
        PatternType::Ellipse,
        PatternType::EllipseAimed,
        PatternType::ScatterAngle,
        PatternType::ScatterSpeed,
        PatternType::Scatter,
    ];

    pub fn from_script(raw: i64) -> Option<PatternType> {
        usize::try_from(raw).ok().and_then(|index| Self::TABLE.get(index).copied())
    }

    pub fn to_script(self) -> i64 {
        Self::TABLE.iter().position(|ty| *ty == self).map_or(0, |index| index as i64)
    }

    pub fn is_aimed(self) -> bool {
        matches!(
            self,
            PatternType::FanAimed
                | PatternType::RingAimed
                | PatternType::ArrowAimed
                | PatternType::PolygonAimed
                | PatternType::EllipseAimed
        )
    }
}

/// Angle parameter of a transform that may keep the current angle or aim at the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngleChange {
    Keep,
    ToPlayer,
    Radians(f32),
}

impl AngleChange {
    fn from_script(degrees: f64) -> AngleChange {
        if degrees == NO_CHANGE {
            AngleChange::Keep
        } else if degrees == TOPLAYER_CHANGE {
            AngleChange::ToPlayer
        } else {
            AngleChange::Radians((degrees as f32).to_radians())
        }
    }

    fn absolute(self) -> Option<PatternOp> {
        match self {
            AngleChange::Keep => None,
            AngleChange::ToPlayer => Some(PatternOp::Angle(AngleSpec::ToPlayer(0.0))),
            AngleChange::Radians(angle) => Some(PatternOp::Angle(AngleSpec::Radians(angle))),
        }
    }

    fn relative(self) -> Option<PatternOp> {
        match self {
            AngleChange::Keep => None,
            AngleChange::ToPlayer => Some(PatternOp::Angle(AngleSpec::ToPlayer(0.0))),
            AngleChange::Radians(delta) => Some(PatternOp::AddAngle(delta)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Wait(u32),
    AddSpeedAngle { frames: u32, acceleration: f32, angular_velocity: f32, max_speed: f32 },
    AngularMove { frames: u32, angular_velocity: f32 },
    NDecelChange { frames: u32, count: u32, speed: f32, angle: AngleChange },
    GraphicChange(i64),
    BlendChange(i64),
    ToSpeedAngle { frame: u32, speed: Option<f32>, angle: AngleChange },
    AddPatternA1 { frame: u32, speed: Option<f32>, angle: AngleChange },
    AddPatternA2 { frame: u32, acceleration: f32, angular_velocity: f32, max_speed: f32 },
}

impl Transform {
    /// Builds a transform from its script form: three integer and three real parameters.
    /// Angles arrive in degrees.
    pub fn from_script(act: i64, s: [i64; 3], d: [f64; 3]) -> Option<Transform> {
        let frames = |raw: i64| u32::try_from(raw.max(0)).unwrap_or(u32::MAX);
        let speed = |raw: f64| (raw != NO_CHANGE).then_some(raw as f32);
        let degrees = |raw: f64| (raw as f32).to_radians();
        Some(match act {
            0 => Transform::Wait(frames(s[0])),
            1 => Transform::AddSpeedAngle {
                frames: frames(s[0]),
                acceleration: d[0] as f32,
                angular_velocity: degrees(d[1]),
                max_speed: d[2] as f32,
            },
            2 => Transform::AngularMove { frames: frames(s[0]), angular_velocity: degrees(d[0]) },
            3 => Transform::NDecelChange {
                frames: frames(s[0]),
                count: frames(s[1]),
                speed: d[0] as f32,
                angle: AngleChange::from_script(d[1]),
            },
            4 => Transform::GraphicChange(s[0]),
            5 => Transform::BlendChange(s[0]),
            6 => Transform::ToSpeedAngle { frame: frames(s[0]), speed: speed(d[0]), angle: AngleChange::from_script(d[1]) },
            7 => Transform::AddPatternA1 { frame: frames(s[0]), speed: speed(d[0]), angle: AngleChange::from_script(d[1]) },
            8 => Transform::AddPatternA2 {
                frame: frames(s[0]),
                acceleration: d[0] as f32,
                angular_velocity: degrees(d[1]),
                max_speed: d[2] as f32,
            },
            _ => return None,
        })
    }
}

/// Turns a transform list into `(delay, ops)` batches for one shot that starts at `speed`.
pub fn compile_transforms(transforms: &[Transform], speed: f32) -> Vec<(u32, Vec<PatternOp>)> {
    let mut out: Vec<(u32, Vec<PatternOp>)> = Vec::new();
    let mut cursor = 0u32;
    let mut speed = speed;
    let mut at = |delay: u32, ops: Vec<PatternOp>| {
        if !ops.is_empty() {
            out.push((delay, ops));
        }
    };
    for transform in transforms {
        match *transform {
            Transform::Wait(frames) => cursor = cursor.saturating_add(frames),
            Transform::AddSpeedAngle { frames, acceleration, angular_velocity, max_speed } => {
                at(
                    cursor,
                    vec![
                        PatternOp::Acceleration(acceleration),
                        PatternOp::AngularVelocity(angular_velocity),
                        PatternOp::MaxSpeed(max_speed),
                    ],
                );
                cursor = cursor.saturating_add(frames);
                at(cursor, vec![PatternOp::Acceleration(0.0), PatternOp::AngularVelocity(0.0)]);
            }
            Transform::AngularMove { frames, angular_velocity } => {
                at(cursor, vec![PatternOp::AngularVelocity(angular_velocity)]);
                cursor = cursor.saturating_add(frames);
                at(cursor, vec![PatternOp::AngularVelocity(0.0)]);
            }
            Transform::NDecelChange { frames, count, speed: next, angle } => {
                let frames = frames.max(1);
                for _ in 0..count {
                    at(cursor, vec![PatternOp::Acceleration(-speed / frames as f32), PatternOp::MaxSpeed(0.0)]);
                    cursor = cursor.saturating_add(frames);
                    let mut ops = vec![PatternOp::Zero, PatternOp::Speed(next)];
                    ops.extend(angle.relative());
                    at(cursor, ops);
                    speed = next;
                }
            }
            Transform::GraphicChange(graphic) => at(cursor, vec![PatternOp::Graphic(graphic)]),
            Transform::BlendChange(blend) => at(cursor, vec![PatternOp::Blend(blend)]),
            Transform::ToSpeedAngle { frame, speed: next, angle } => {
                let mut ops = vec![PatternOp::ToAngle, PatternOp::Zero];
                ops.extend(next.map(PatternOp::Speed));
                ops.extend(angle.absolute());
                at(cursor.saturating_add(frame), ops);
                if let Some(next) = next {
                    speed = next;
                }
            }
            Transform::AddPatternA1 { frame, speed: next, angle } => {
                let mut ops = vec![PatternOp::ToAngle];
                ops.extend(next.map(PatternOp::Speed));
                ops.extend(angle.absolute());
                at(cursor.saturating_add(frame), ops);
            }
            Transform::AddPatternA2 { frame, acceleration, angular_velocity, max_speed } => at(
                cursor.saturating_add(frame),
                vec![
                    PatternOp::Acceleration(acceleration),
                    PatternOp::AngularVelocity(angular_velocity),
                    PatternOp::MaxSpeed(max_speed),
                ],
            ),
        }
    }
    out
}

/// One concrete shot of a fired pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotSpawn {
    pub position: Vec2,
    pub speed: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternShot {
    pub id: ObjectId,
    pub state: ObjectState,
    pub owner: OwnerType,
    pub parent: Option<ObjectId>,
    pub pattern: PatternType,
    pub shot_type: ObjectType,
    pub blend: i64,
    pub way: usize,
    pub stack: usize,
    pub speed_base: f32,
    pub speed_arg: f32,
    pub angle_base: f32,
    pub angle_arg: f32,
    pub base_point: Vec2,
    pub offset: Vec2,
    pub radius: f32,
    pub delay: u32,
    /// Fired shots move during their delay.
    pub delay_motion: bool,
    pub graphic: i64,
    pub laser_width: f32,
    pub laser_length: f32,
    pub transforms: Vec<Transform>,
}

impl PatternShot {
    pub fn new(id: ObjectId, owner: OwnerType) -> Self {
        Self {
            id,
            state: ObjectState::Active,
            owner,
            parent: None,
            pattern: PatternType::Fan,
            shot_type: ObjectType::Shot,
            blend: 0,
            way: 1,
            stack: 1,
            speed_base: 1.0,
            speed_arg: 1.0,
            angle_base: 0.0,
            angle_arg: 0.0,
            base_point: Vec2::splat(PATTERN_BASEPOINT_RESET),
            offset: Vec2::ZERO,
            radius: 0.0,
            delay: 0,
            delay_motion: false,
            graphic: 0,
            laser_width: 16.0,
            laser_length: 64.0,
            transforms: Vec::new(),
        }
    }

    /// Copies every setting of `other` except identity and the parent object.
    pub fn copy_settings(&mut self, other: &PatternShot) {
        let (id, state, parent) = (self.id, self.state, self.parent);
        *self = other.clone();
        self.id = id;
        self.state = state;
        self.parent = parent;
    }

    /// Replaces transform `slot`, padding with waits of zero frames when the list is shorter.
    pub fn set_transform(&mut self, slot: usize, transform: Transform) {
        if self.transforms.len() <= slot {
            self.transforms.resize(slot + 1, Transform::Wait(0));
        }
        self.transforms[slot] = transform;
    }

    /// Fire point: the base point (falling back to the parent position on reset
    /// components) plus the base point offset.
    pub fn fire_point(&self, parent: Option<Vec2>) -> Vec2 {
        let anchor = parent.unwrap_or(Vec2::ZERO);
        let x = if self.base_point.x == PATTERN_BASEPOINT_RESET { anchor.x } else { self.base_point.x };
        let y = if self.base_point.y == PATTERN_BASEPOINT_RESET { anchor.y } else { self.base_point.y };
        Vec2::new(x, y) + self.offset
    }

    fn stack_speed(&self, s: usize) -> f32 {
        if self.stack > 1 {
            self.speed_base + (self.speed_arg - self.speed_base) * s as f32 / (self.stack - 1) as f32
        } else {
            self.speed_base
        }
    }

    fn fan_angle(&self, base: f32, w: usize) -> f32 {
        base + (w as f32 - (self.way as f32 - 1.0) * 0.5) * self.angle_arg
    }

    /// Expands the grid into at most `limit` concrete spawns, stack outer and way inner.
    pub fn expand(&self, parent: Option<Vec2>, player: Option<Vec2>, rng: &mut impl Rng, limit: usize) -> Vec<ShotSpawn> {
        let origin = self.fire_point(parent);
        let mut base = self.angle_base;
        if self.pattern.is_aimed() {
            if let Some(player) = player {
                let delta = player - origin;
                base += delta.y.atan2(delta.x);
            }
        }
        let way = self.way;
        let total = way.saturating_mul(self.stack).min(limit);
        let mut spawns = Vec::with_capacity(total);
        if total == 0 {
            return spawns;
        }
        for s in 0..self.stack {
            let stack_speed = self.stack_speed(s);
            for w in 0..way {
                if spawns.len() == total {
                    return spawns;
                }
                let ring = w as f32 * TAU / way.max(1) as f32;
                let (speed, angle) = match self.pattern {
                    PatternType::Fan | PatternType::FanAimed => (stack_speed, self.fan_angle(base, w)),
                    PatternType::Ring | PatternType::RingAimed => (stack_speed, base + ring + s as f32 * self.angle_arg),
                    PatternType::Arrow | PatternType::ArrowAimed => {
                        let center = (way as f32 - 1.0) * 0.5;
                        let falloff = 1.0 - (w as f32 - center).abs() / way as f32;
                        (stack_speed * falloff, self.fan_angle(base, w))
                    }
                    PatternType::Polygon | PatternType::PolygonAimed => {
                        let sides = self.angle_arg.to_degrees().round().max(3.0);
                        let sector = TAU / sides;
                        let local = ring.rem_euclid(sector) - sector * 0.5;
                        let extent = (sector * 0.5).cos() / local.cos();
                        (stack_speed * extent, base + ring)
                    }
                    PatternType::Ellipse | PatternType::EllipseAimed => {
                        let point = Vec2::from_angle(self.angle_arg).rotate(Vec2::new(ring.cos(), ELLIPSE_MINOR * ring.sin()));
                        (stack_speed * point.length(), base + point.y.atan2(point.x))
                    }
                    PatternType::ScatterAngle => (stack_speed, base + spread(rng, self.angle_arg)),
                    PatternType::ScatterSpeed => {
                        (between(rng, self.speed_base, self.speed_arg), self.fan_angle(base, w))
                    }
                    PatternType::Scatter => {
                        (between(rng, self.speed_base, self.speed_arg), base + spread(rng, self.angle_arg))
                    }
                };
                let position = origin + Vec2::from_angle(angle) * self.radius;
                spawns.push(ShotSpawn { position, speed, angle });
            }
        }
        spawns
    }
}

fn between(rng: &mut impl Rng, a: f32, b: f32) -> f32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi - lo <= f32::EPSILON {
        lo
    } else {
        rng.gen_range(lo..hi)
    }
}

fn spread(rng: &mut impl Rng, width: f32) -> f32 {
    between(rng, -width, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPSILON: f32 = 1e-4;

    fn pattern(ty: PatternType, way: usize, stack: usize) -> PatternShot {
        let mut shot = PatternShot::new(ObjectId(1), OwnerType::Enemy);
        shot.pattern = ty;
        shot.way = way;
        shot.stack = stack;
        shot.base_point = Vec2::new(100.0, 100.0);
        shot
    }

    #[test]
    fn fan_centres_ways_on_the_base_angle() {
        let mut fan = pattern(PatternType::Fan, 3, 2);
        fan.angle_arg = 10f32.to_radians();
        fan.speed_base = 1.0;
        fan.speed_arg = 3.0;
        let spawns = fan.expand(None, None, &mut StdRng::seed_from_u64(1), usize::MAX);
        let degrees: Vec<f32> = spawns.iter().map(|s| s.angle.to_degrees().round()).collect();
        assert_eq!(degrees, vec![-10.0, 0.0, 10.0, -10.0, 0.0, 10.0]);
        assert_eq!(spawns[0].speed, 1.0);
        assert_eq!(spawns[3].speed, 3.0);
    }

    #[test]
    fn aimed_ring_starts_at_the_player() {
        let ring = pattern(PatternType::RingAimed, 4, 1);
        let spawns = ring.expand(None, Some(Vec2::new(100.0, 200.0)), &mut StdRng::seed_from_u64(1), usize::MAX);
        assert!((spawns[0].angle - std::f32::consts::FRAC_PI_2).abs() < EPSILON);
        assert!((spawns[1].angle - std::f32::consts::PI).abs() < EPSILON);
    }

    #[test]
    fn base_point_reset_follows_the_parent_and_radius_pushes_out() {
        let mut ring = pattern(PatternType::Ring, 1, 1);
        ring.base_point = Vec2::splat(PATTERN_BASEPOINT_RESET);
        ring.offset = Vec2::new(5.0, 0.0);
        ring.radius = 10.0;
        let spawns = ring.expand(Some(Vec2::new(50.0, 60.0)), None, &mut StdRng::seed_from_u64(1), usize::MAX);
        assert!((spawns[0].position - Vec2::new(65.0, 60.0)).length() < EPSILON);
    }

    #[test]
    fn polygon_corners_outrun_edge_midpoints() {
        let mut square = pattern(PatternType::Polygon, 8, 1);
        square.angle_arg = 4f32.to_radians();
        let spawns = square.expand(None, None, &mut StdRng::seed_from_u64(1), usize::MAX);
        assert!(spawns[0].speed > spawns[1].speed);
        assert!((spawns[0].speed - 1.0).abs() < EPSILON);
        assert!((spawns[1].speed - std::f32::consts::FRAC_1_SQRT_2).abs() < EPSILON);
    }

    #[test]
    fn scatter_is_reproducible_with_the_same_seed() {
        let mut scatter = pattern(PatternType::Scatter, 5, 1);
        scatter.speed_base = 1.0;
        scatter.speed_arg = 4.0;
        scatter.angle_arg = 0.5;
        let a = scatter.expand(None, None, &mut StdRng::seed_from_u64(7), usize::MAX);
        let b = scatter.expand(None, None, &mut StdRng::seed_from_u64(7), usize::MAX);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (1.0..4.0).contains(&s.speed) && s.angle.abs() <= 0.5));
    }

    #[test]
    fn transforms_compile_onto_a_frame_cursor() {
        let transforms = [
            Transform::Wait(10),
            Transform::AngularMove { frames: 5, angular_velocity: 0.1 },
            Transform::GraphicChange(3),
            Transform::AddPatternA1 { frame: 2, speed: Some(4.0), angle: AngleChange::Keep },
        ];
        let compiled = compile_transforms(&transforms, 2.0);
        let delays: Vec<u32> = compiled.iter().map(|(delay, _)| *delay).collect();
        assert_eq!(delays, vec![10, 15, 15, 17]);
        assert_eq!(compiled[2].1, vec![PatternOp::Graphic(3)]);
        assert_eq!(compiled[3].1, vec![PatternOp::ToAngle, PatternOp::Speed(4.0)]);
    }

    #[test]
    fn oversized_grids_stop_at_the_limit() {
        let huge = pattern(PatternType::Fan, usize::MAX, usize::MAX);
        let spawns = huge.expand(None, None, &mut StdRng::seed_from_u64(1), 5);
        assert_eq!(spawns.len(), 5);
        assert!(pattern(PatternType::Ring, 0, usize::MAX).expand(None, None, &mut StdRng::seed_from_u64(1), 5).is_empty());
        assert!(pattern(PatternType::Ring, 4, 4).expand(None, None, &mut StdRng::seed_from_u64(1), 0).is_empty());
    }

    #[test]
    fn script_transforms_read_sentinel_angles() {
        let t = Transform::from_script(6, [30, 0, 0], [2.0, TOPLAYER_CHANGE, 0.0]).expect("known transform");
        assert_eq!(t, Transform::ToSpeedAngle { frame: 30, speed: Some(2.0), angle: AngleChange::ToPlayer });
        assert!(Transform::from_script(42, [0; 3], [0.0; 3]).is_none());
    }

    #[test]
    fn copy_settings_keeps_identity_and_parent() {
        let mut source = pattern(PatternType::Ring, 12, 3);
        source.parent = Some(ObjectId(40));
        let mut target = PatternShot::new(ObjectId(2), OwnerType::Enemy);
        target.copy_settings(&source);
        assert_eq!(target.id, ObjectId(2));
        assert_eq!(target.parent, None);
        assert_eq!(target.way, 12);
        assert_eq!(target.pattern, PatternType::Ring);
    }
}
