//! Per-object motion strategies and their scheduled command queues.
//!
//! A [`MoveObject`] owns exactly one [`MovePattern`]. The pattern's motion variant can be
//! replaced at any time, but every replacement that must keep velocity continuous goes
//! through [`switch_motion`], so all callers share one seeding rule.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::stage::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    Angle,
    Xy,
    Line,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleMotion {
    pub speed: f32,
    pub angle: f32,
    pub acceleration: f32,
    pub angular_velocity: f32,
    pub max_speed: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XyMotion {
    pub speed_x: f32,
    pub speed_y: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub max_speed_x: Option<f32>,
    pub max_speed_y: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrivalPolicy {
    /// Constant speed; frames = distance / speed.
    Speed(f32),
    /// Linear interpolation over a fixed frame count.
    Frames(u32),
    /// Each frame covers `1/weight` of the remaining distance, clamped to `max_speed`.
    /// Snaps to the destination once within `epsilon`.
    Weight { weight: f32, max_speed: f32, epsilon: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMotion {
    pub start: Vec2,
    pub target: Vec2,
    pub policy: ArrivalPolicy,
    frame: u32,
    total_frames: Option<u32>,
    speed: f32,
    angle: f32,
    arrived: bool,
}

impl LineMotion {
    pub fn new(start: Vec2, target: Vec2, policy: ArrivalPolicy) -> Self {
        let delta = target - start;
        let distance = delta.length();
        let total_frames = match policy {
            ArrivalPolicy::Speed(speed) if speed > 0.0 => Some((distance / speed).ceil() as u32),
            ArrivalPolicy::Speed(_) => Some(0),
            ArrivalPolicy::Frames(frames) => Some(frames),
            ArrivalPolicy::Weight { .. } => None,
        };
        let angle = if distance > 0.0 { delta.y.atan2(delta.x) } else { 0.0 };
        let speed = match (policy, total_frames) {
            (ArrivalPolicy::Speed(speed), _) => speed.max(0.0),
            (_, Some(frames)) if frames > 0 => distance / frames as f32,
            _ => 0.0,
        };
        Self { start, target, policy, frame: 0, total_frames, speed, angle, arrived: false }
    }

    pub fn arrived(&self) -> bool {
        self.arrived
    }

    fn step(&mut self, position: Vec2) -> Vec2 {
        if self.arrived {
            self.speed = 0.0;
            return position;
        }
        self.frame += 1;
        let next = match (self.policy, self.total_frames) {
            (ArrivalPolicy::Weight { weight, max_speed, epsilon }, _) => {
                let remaining = self.target - position;
                let mut step = remaining / weight.max(1.0);
                if max_speed > 0.0 && step.length() > max_speed {
                    step = step.normalize_or_zero() * max_speed;
                }
                let next = position + step;
                if self.target.distance(next) <= epsilon.max(0.0) {
                    self.target
                } else {
                    next
                }
            }
            (_, Some(total)) if self.frame >= total => self.target,
            (_, Some(total)) => self.start.lerp(self.target, self.frame as f32 / total as f32),
            (_, None) => self.target,
        };
        let delta = next - position;
        self.speed = delta.length();
        if self.speed > 0.0 {
            self.angle = delta.y.atan2(delta.x);
        }
        if next == self.target {
            self.arrived = true;
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemMoveKind {
    /// Glides to the move-to point, then falls.
    ToPosition,
    Down,
    ToPlayer,
    /// Floats upward; used by score pop-ups.
    Score,
}

const ITEM_FALL_ACCEL: f32 = 0.05;
const ITEM_FALL_MAX: f32 = 2.5;
const ITEM_GLIDE_FRAMES: u32 = 60;
const ITEM_GLIDE_WEIGHT: f32 = 16.0;
const ITEM_SCORE_RISE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemMotion {
    pub kind: ItemMoveKind,
    pub target: Vec2,
    pub collect_speed: f32,
    frame: u32,
    speed: f32,
    angle: f32,
}

impl ItemMotion {
    pub fn new(kind: ItemMoveKind, target: Vec2, collect_speed: f32) -> Self {
        let speed = if kind == ItemMoveKind::Down { -1.5 } else { 0.0 };
        Self { kind, target, collect_speed, frame: 0, speed, angle: std::f32::consts::FRAC_PI_2 }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    fn step(&mut self, position: Vec2, player: Option<Vec2>) -> Vec2 {
        self.frame += 1;
        match self.kind {
            ItemMoveKind::ToPosition => {
                let step = (self.target - position) / ITEM_GLIDE_WEIGHT;
                self.speed = step.length();
                if self.speed > 0.0 {
                    self.angle = step.y.atan2(step.x);
                }
                if self.frame >= ITEM_GLIDE_FRAMES {
                    self.kind = ItemMoveKind::Down;
                    self.speed = 0.0;
                    self.angle = std::f32::consts::FRAC_PI_2;
                }
                position + step
            }
            ItemMoveKind::Down => {
                self.speed = (self.speed + ITEM_FALL_ACCEL).min(ITEM_FALL_MAX);
                self.angle = std::f32::consts::FRAC_PI_2;
                position + Vec2::new(0.0, self.speed)
            }
            ItemMoveKind::ToPlayer => {
                let Some(player) = player else {
                    self.kind = ItemMoveKind::Down;
                    self.speed = 0.0;
                    return position;
                };
                let delta = player - position;
                let distance = delta.length();
                self.speed = self.collect_speed.min(distance);
                if distance > 0.0 {
                    self.angle = delta.y.atan2(delta.x);
                }
                position + delta.normalize_or_zero() * self.speed
            }
            ItemMoveKind::Score => {
                self.speed = ITEM_SCORE_RISE;
                self.angle = -std::f32::consts::FRAC_PI_2;
                position - Vec2::new(0.0, ITEM_SCORE_RISE)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Angle(AngleMotion),
    Xy(XyMotion),
    Line(LineMotion),
    Item(ItemMotion),
}

impl Default for Motion {
    fn default() -> Self {
        Motion::Angle(AngleMotion::default())
    }
}

impl Motion {
    pub fn kind(&self) -> PatternKind {
        match self {
            Motion::Angle(_) => PatternKind::Angle,
            Motion::Xy(_) => PatternKind::Xy,
            Motion::Line(_) => PatternKind::Line,
            Motion::Item(_) => PatternKind::Item,
        }
    }

    pub fn speed(&self) -> f32 {
        match self {
            Motion::Angle(m) => m.speed,
            Motion::Xy(m) => m.speed_x.hypot(m.speed_y),
            Motion::Line(m) => m.speed,
            Motion::Item(m) => m.speed,
        }
    }

    /// Direction of travel in radians.
    pub fn angle(&self) -> f32 {
        match self {
            Motion::Angle(m) => m.angle,
            Motion::Xy(m) => m.speed_y.atan2(m.speed_x),
            Motion::Line(m) => m.angle,
            Motion::Item(m) => m.angle,
        }
    }

    pub fn speed_x(&self) -> f32 {
        match self {
            Motion::Xy(m) => m.speed_x,
            other => other.speed() * other.angle().cos(),
        }
    }

    pub fn speed_y(&self) -> f32 {
        match self {
            Motion::Xy(m) => m.speed_y,
            other => other.speed() * other.angle().sin(),
        }
    }

    fn step(&mut self, position: Vec2, player: Option<Vec2>) -> Vec2 {
        match self {
            Motion::Angle(m) => {
                if m.acceleration != 0.0 {
                    m.speed += m.acceleration;
                    if let Some(max) = m.max_speed {
                        m.speed = if m.acceleration > 0.0 { m.speed.min(max) } else { m.speed.max(max) };
                    }
                }
                m.angle = crate::wrap_angle(m.angle + m.angular_velocity);
                position + Vec2::new(m.angle.cos(), m.angle.sin()) * m.speed
            }
            Motion::Xy(m) => {
                m.speed_x = accelerate(m.speed_x, m.accel_x, m.max_speed_x);
                m.speed_y = accelerate(m.speed_y, m.accel_y, m.max_speed_y);
                position + Vec2::new(m.speed_x, m.speed_y)
            }
            Motion::Line(m) => m.step(position),
            Motion::Item(m) => m.step(position, player),
        }
    }
}

fn accelerate(speed: f32, accel: f32, max: Option<f32>) -> f32 {
    if accel == 0.0 {
        return speed;
    }
    let next = speed + accel;
    match max {
        Some(max) if accel > 0.0 => next.min(max),
        Some(max) => next.max(max),
        None => next,
    }
}

/// Builds the motion `to` from `old`, carrying the visible velocity across.
///
/// Switching into Angle or XY seeds the new variant with the old variant's derived
/// speed and direction when that speed is nonzero, and starts from zero state
/// otherwise. Switching to the variant already in use returns it untouched.
pub fn switch_motion(old: Motion, to: PatternKind) -> Motion {
    if old.kind() == to {
        return old;
    }
    let speed = old.speed();
    let angle = old.angle();
    match to {
        PatternKind::Angle => {
            if speed != 0.0 {
                Motion::Angle(AngleMotion { speed, angle, ..AngleMotion::default() })
            } else {
                Motion::Angle(AngleMotion::default())
            }
        }
        PatternKind::Xy => {
            if speed != 0.0 {
                Motion::Xy(XyMotion {
                    speed_x: speed * angle.cos(),
                    speed_y: speed * angle.sin(),
                    ..XyMotion::default()
                })
            } else {
                Motion::Xy(XyMotion::default())
            }
        }
        // Line and item motion carry explicit destinations; callers build those directly.
        PatternKind::Line | PatternKind::Item => old,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngleSpec {
    Radians(f32),
    /// Angle toward the player plus an offset.
    ToPlayer(f32),
    /// Angle toward another object plus an offset.
    TowardObject(ObjectId, f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternOp {
    /// Replace the motion with an Angle motion through the seeding factory.
    ToAngle,
    ToXy,
    /// Clears acceleration, angular velocity and speed caps of the current motion.
    Zero,
    Speed(f32),
    AddSpeed(f32),
    Angle(AngleSpec),
    AddAngle(f32),
    Acceleration(f32),
    AngularVelocity(f32),
    MaxSpeed(f32),
    SpeedX(f32),
    SpeedY(f32),
    AccelX(f32),
    AccelY(f32),
    MaxSpeedX(f32),
    MaxSpeedY(f32),
    Graphic(i64),
    Blend(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledCommand {
    pub due: u64,
    pub op: PatternOp,
}

/// Side effects of one step that the owning object applies to itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepEffects {
    pub graphic: Option<i64>,
    pub blend: Option<i64>,
}

/// Read-only world state a step may consult.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepEnv<'a> {
    pub player: Option<Vec2>,
    pub anchors: Option<&'a HashMap<ObjectId, Vec2>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MovePattern {
    motion: Motion,
    schedule: Vec<ScheduledCommand>,
    clock: u64,
}

impl MovePattern {
    pub fn new(motion: Motion) -> Self {
        Self { motion, schedule: Vec::new(), clock: 0 }
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut Motion {
        &mut self.motion
    }

    pub fn kind(&self) -> PatternKind {
        self.motion.kind()
    }

    /// Replaces the motion outright. The command queue stays with the pattern.
    pub fn replace_motion(&mut self, motion: Motion) {
        self.motion = motion;
    }

    pub fn switch_to(&mut self, kind: PatternKind) {
        self.motion = switch_motion(self.motion, kind);
    }

    /// Queues `ops` to run together `delay` steps from now.
    pub fn schedule(&mut self, delay: u32, ops: impl IntoIterator<Item = PatternOp>) {
        let due = self.clock + u64::from(delay.max(1));
        self.schedule.extend(ops.into_iter().map(|op| ScheduledCommand { due, op }));
    }

    pub fn pending_commands(&self) -> usize {
        self.schedule.len()
    }

    pub fn step(&mut self, position: Vec2, env: StepEnv<'_>) -> (Vec2, StepEffects) {
        self.clock += 1;
        let mut effects = StepEffects::default();
        if self.schedule.iter().any(|cmd| cmd.due <= self.clock) {
            let clock = self.clock;
            let (ready, waiting): (Vec<_>, Vec<_>) = self.schedule.drain(..).partition(|cmd| cmd.due <= clock);
            self.schedule = waiting;
            for cmd in ready {
                self.apply(cmd.op, position, env, &mut effects);
            }
        }
        (self.motion.step(position, env.player), effects)
    }

    pub fn apply(&mut self, op: PatternOp, position: Vec2, env: StepEnv<'_>, effects: &mut StepEffects) {
        match op {
            PatternOp::ToAngle => self.switch_to(PatternKind::Angle),
            PatternOp::ToXy => self.switch_to(PatternKind::Xy),
            PatternOp::Zero => match &mut self.motion {
                Motion::Angle(m) => {
                    m.acceleration = 0.0;
                    m.angular_velocity = 0.0;
                    m.max_speed = None;
                }
                Motion::Xy(m) => {
                    m.accel_x = 0.0;
                    m.accel_y = 0.0;
                    m.max_speed_x = None;
                    m.max_speed_y = None;
                }
                Motion::Line(_) | Motion::Item(_) => {}
            },
            PatternOp::Speed(v) => self.update_angle(|m| m.speed = v),
            PatternOp::AddSpeed(v) => self.update_angle(|m| m.speed += v),
            PatternOp::Angle(spec) => {
                let angle = resolve_angle(spec, position, env);
                self.update_angle(|m| m.angle = angle);
            }
            PatternOp::AddAngle(v) => self.update_angle(|m| m.angle += v),
            PatternOp::Acceleration(v) => self.update_angle(|m| m.acceleration = v),
            PatternOp::AngularVelocity(v) => self.update_angle(|m| m.angular_velocity = v),
            PatternOp::MaxSpeed(v) => self.update_angle(|m| m.max_speed = Some(v)),
            PatternOp::SpeedX(v) => self.update_xy(|m| m.speed_x = v),
            PatternOp::SpeedY(v) => self.update_xy(|m| m.speed_y = v),
            PatternOp::AccelX(v) => self.update_xy(|m| m.accel_x = v),
            PatternOp::AccelY(v) => self.update_xy(|m| m.accel_y = v),
            PatternOp::MaxSpeedX(v) => self.update_xy(|m| m.max_speed_x = Some(v)),
            PatternOp::MaxSpeedY(v) => self.update_xy(|m| m.max_speed_y = Some(v)),
            PatternOp::Graphic(id) => effects.graphic = Some(id),
            PatternOp::Blend(mode) => effects.blend = Some(mode),
        }
    }

    /// Edits the Angle motion of this pattern, switching through the factory first
    /// when another variant is active.
    pub fn update_angle(&mut self, edit: impl FnOnce(&mut AngleMotion)) {
        let mut motion = match switch_motion(self.motion, PatternKind::Angle) {
            Motion::Angle(m) => m,
            _ => AngleMotion::default(),
        };
        edit(&mut motion);
        self.motion = Motion::Angle(motion);
    }

    pub fn update_xy(&mut self, edit: impl FnOnce(&mut XyMotion)) {
        let mut motion = match switch_motion(self.motion, PatternKind::Xy) {
            Motion::Xy(m) => m,
            _ => XyMotion::default(),
        };
        edit(&mut motion);
        self.motion = Motion::Xy(motion);
    }
}

fn resolve_angle(spec: AngleSpec, position: Vec2, env: StepEnv<'_>) -> f32 {
    let toward = |target: Vec2| {
        let delta = target - position;
        delta.y.atan2(delta.x)
    };
    match spec {
        AngleSpec::Radians(angle) => angle,
        AngleSpec::ToPlayer(offset) => env.player.map_or(offset, |player| toward(player) + offset),
        AngleSpec::TowardObject(id, offset) => env
            .anchors
            .and_then(|anchors| anchors.get(&id))
            .map_or(offset, |target| toward(*target) + offset),
    }
}

/// Position plus motion pattern, composed into every movable stage object.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveObject {
    pub position: Vec2,
    pub pattern: MovePattern,
    pub process_movement: bool,
}

impl Default for MoveObject {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}

impl MoveObject {
    pub fn at(position: Vec2) -> Self {
        Self { position, pattern: MovePattern::default(), process_movement: true }
    }

    pub fn with_angle(position: Vec2, speed: f32, angle: f32) -> Self {
        let motion = AngleMotion { speed, angle, ..AngleMotion::default() };
        Self { position, pattern: MovePattern::new(Motion::Angle(motion)), process_movement: true }
    }

    pub fn with_xy(position: Vec2, speed_x: f32, speed_y: f32) -> Self {
        let motion = XyMotion { speed_x, speed_y, ..XyMotion::default() };
        Self { position, pattern: MovePattern::new(Motion::Xy(motion)), process_movement: true }
    }

    pub fn step(&mut self, env: StepEnv<'_>) -> StepEffects {
        if !self.process_movement {
            return StepEffects::default();
        }
        let (next, effects) = self.pattern.step(self.position, env);
        self.position = next;
        effects
    }

    pub fn speed(&self) -> f32 {
        self.pattern.motion().speed()
    }

    pub fn angle(&self) -> f32 {
        self.pattern.motion().angle()
    }

    pub fn speed_x(&self) -> f32 {
        self.pattern.motion().speed_x()
    }

    pub fn speed_y(&self) -> f32 {
        self.pattern.motion().speed_y()
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.pattern.update_angle(|m| m.speed = speed);
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.pattern.update_angle(|m| m.angle = angle);
    }

    pub fn set_acceleration(&mut self, accel: f32) {
        self.pattern.update_angle(|m| m.acceleration = accel);
    }

    pub fn set_max_speed(&mut self, max: f32) {
        self.pattern.update_angle(|m| m.max_speed = Some(max));
    }

    pub fn set_angular_velocity(&mut self, omega: f32) {
        self.pattern.update_angle(|m| m.angular_velocity = omega);
    }

    /// Sets the horizontal velocity. An Angle motion stays Angle and re-derives
    /// speed and direction from the new component pair.
    pub fn set_speed_x(&mut self, speed_x: f32) {
        let speed_y = self.speed_y();
        self.set_speed_xy(speed_x, speed_y);
    }

    pub fn set_speed_y(&mut self, speed_y: f32) {
        let speed_x = self.speed_x();
        self.set_speed_xy(speed_x, speed_y);
    }

    pub fn set_speed_xy(&mut self, speed_x: f32, speed_y: f32) {
        match self.pattern.motion_mut() {
            Motion::Angle(m) => {
                m.speed = speed_x.hypot(speed_y);
                m.angle = speed_y.atan2(speed_x);
            }
            _ => self.pattern.update_xy(|m| {
                m.speed_x = speed_x;
                m.speed_y = speed_y;
            }),
        }
    }

    pub fn set_destination(&mut self, target: Vec2, policy: ArrivalPolicy) {
        self.pattern.replace_motion(Motion::Line(LineMotion::new(self.position, target, policy)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn angle_acceleration_clamps_to_max_speed() {
        let mut obj = MoveObject::with_angle(Vec2::ZERO, 1.0, 0.0);
        obj.set_acceleration(0.5);
        obj.set_max_speed(2.0);
        for _ in 0..5 {
            obj.step(StepEnv::default());
        }
        assert!((obj.speed() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn deceleration_stops_at_the_floor() {
        let mut obj = MoveObject::with_angle(Vec2::ZERO, 3.0, 0.0);
        obj.set_acceleration(-1.0);
        obj.set_max_speed(0.5);
        for _ in 0..10 {
            obj.step(StepEnv::default());
        }
        assert!((obj.speed() - 0.5).abs() < EPSILON);
    }

    #[test]
    fn switching_zero_speed_motion_starts_fresh() {
        let motion = switch_motion(Motion::Xy(XyMotion::default()), PatternKind::Angle);
        assert_eq!(motion, Motion::Angle(AngleMotion::default()));
    }

    #[test]
    fn set_speed_x_on_angle_motion_keeps_the_variant() {
        let mut obj = MoveObject::with_angle(Vec2::ZERO, 2.0, 0.0);
        obj.set_speed_y(2.0);
        assert_eq!(obj.pattern.kind(), PatternKind::Angle);
        assert!((obj.speed() - 8.0f32.sqrt()).abs() < EPSILON);
        assert!((obj.angle() - std::f32::consts::FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn frame_policy_lands_exactly_on_target() {
        let mut obj = MoveObject::at(Vec2::ZERO);
        obj.set_destination(Vec2::new(30.0, 40.0), ArrivalPolicy::Frames(7));
        for _ in 0..7 {
            obj.step(StepEnv::default());
        }
        assert_eq!(obj.position, Vec2::new(30.0, 40.0));
        obj.step(StepEnv::default());
        assert_eq!(obj.position, Vec2::new(30.0, 40.0));
        assert_eq!(obj.speed(), 0.0);
    }

    #[test]
    fn weighted_policy_snaps_inside_epsilon() {
        let mut obj = MoveObject::at(Vec2::ZERO);
        let policy = ArrivalPolicy::Weight { weight: 4.0, max_speed: 100.0, epsilon: 0.5 };
        obj.set_destination(Vec2::new(100.0, 0.0), policy);
        let mut steps = 0;
        while obj.position != Vec2::new(100.0, 0.0) {
            obj.step(StepEnv::default());
            steps += 1;
            assert!(steps < 100, "weighted arrival should terminate");
        }
        assert!(steps > 5);
    }

    #[test]
    fn disabled_processing_freezes_commands_too() {
        let mut obj = MoveObject::with_angle(Vec2::ZERO, 1.0, 0.0);
        obj.pattern.schedule(1, [PatternOp::Speed(5.0)]);
        obj.process_movement = false;
        obj.step(StepEnv::default());
        assert_eq!(obj.position, Vec2::ZERO);
        assert_eq!(obj.pattern.pending_commands(), 1);
    }
}
