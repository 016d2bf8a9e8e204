use std::collections::VecDeque;

use glam::Vec2;

use crate::geometry::{Circle, Shape, WidthLine};
use crate::intersection::TargetOwner;
use crate::movement::MoveObject;

use super::types::{ObjectId, ObjectState, ObjectType, OwnerType, LIFE_SPELL_REGIST, LIFE_SPELL_UNREGIST};

/// Collision radius used when a shot's graphic has no data entry.
pub const FALLBACK_SHOT_RADIUS: f32 = 4.0;

/// Default number of nodes a curve laser keeps when created without a length.
const DEFAULT_CURVE_NODES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LerpMode {
    #[default]
    Linear,
    Smooth,
    Smoother,
    Accelerate,
    Decelerate,
}

impl LerpMode {
    pub fn from_script(raw: i64) -> LerpMode {
        match raw {
            1 => LerpMode::Smooth,
            2 => LerpMode::Smoother,
            3 => LerpMode::Accelerate,
            4 => LerpMode::Decelerate,
            _ => LerpMode::Linear,
        }
    }

    /// Maps a script lerp constant onto the curve the delay effect actually uses.
    /// The accelerate and decelerate constants select each other's curve.
    pub fn for_delay(raw: i64) -> LerpMode {
        match LerpMode::from_script(raw) {
            LerpMode::Accelerate => LerpMode::Decelerate,
            LerpMode::Decelerate => LerpMode::Accelerate,
            other => other,
        }
    }

    pub fn ease(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            LerpMode::Linear => t,
            LerpMode::Smooth => t * t * (3.0 - 2.0 * t),
            LerpMode::Smoother => t * t * t * (t * (t * 6.0 - 15.0) + 10.0),
            LerpMode::Accelerate => t * t,
            LerpMode::Decelerate => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayMode {
    #[default]
    Default,
    Lerp,
}

/// `[start, end, frames]` ramp used for the delay effect's scale and alpha.
pub type DelayRamp = [f32; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct DelayParams {
    pub mode: DelayMode,
    pub graphic: Option<i64>,
    pub scale: DelayRamp,
    pub alpha: DelayRamp,
    pub scale_lerp: LerpMode,
    pub alpha_lerp: LerpMode,
    pub color: u32,
    pub coloring: bool,
    pub motion: bool,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            mode: DelayMode::Default,
            graphic: None,
            scale: [2.0, 1.0, 15.0],
            alpha: [0.0, 1.0, 15.0],
            scale_lerp: LerpMode::Linear,
            alpha_lerp: LerpMode::Linear,
            color: 0xffff_ffff,
            coloring: false,
            motion: false,
        }
    }
}

/// Visual state of a shot still in its delay phase, handed to the renderer as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayVisual {
    pub scale: f32,
    pub alpha: f32,
    pub graphic: i64,
    pub color: Option<u32>,
}

impl DelayParams {
    fn sample(&self, elapsed: u32, total: u32) -> (f32, f32) {
        let ramp = |values: DelayRamp, lerp: LerpMode| {
            let t = match self.mode {
                DelayMode::Lerp if values[2] > 0.0 => elapsed as f32 / values[2],
                _ if total > 0 => elapsed as f32 / total as f32,
                _ => 1.0,
            };
            let k = match self.mode {
                DelayMode::Lerp => lerp.ease(t),
                DelayMode::Default => t.clamp(0.0, 1.0),
            };
            values[0] + (values[1] - values[0]) * k
        };
        (ramp(self.scale, self.scale_lerp), ramp(self.alpha, self.alpha_lerp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrazeState {
    /// Frames a shot must wait after a graze before it can graze again. Zero means once.
    pub invalid_frames: u32,
    /// Frames left before the next graze counts.
    pub cooldown: u32,
    pub grazed: bool,
}

impl GrazeState {
    pub fn is_valid(&self) -> bool {
        self.cooldown == 0 && (!self.grazed || self.invalid_frames > 0)
    }

    pub fn register(&mut self) {
        self.grazed = true;
        self.cooldown = self.invalid_frames;
    }

    fn tick(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserParams {
    pub length: f32,
    pub render_width: f32,
    /// Full thickness of the hit segment.
    pub intersection_width: f32,
    /// Fractions of the length at the tail and head that do not collide.
    pub invalid_length: (f32, f32),
    pub item_distance: f32,
    explicit_intersection: bool,
}

impl Default for LaserParams {
    fn default() -> Self {
        Self {
            length: 0.0,
            render_width: 0.0,
            intersection_width: 0.0,
            invalid_length: (0.1, 0.1),
            item_distance: 24.0,
            explicit_intersection: false,
        }
    }
}

impl LaserParams {
    /// Sets the drawn width. Until a hit width is set explicitly it follows at a quarter.
    pub fn set_render_width(&mut self, width: f32) {
        self.render_width = width;
        if !self.explicit_intersection {
            self.intersection_width = width / 4.0;
        }
    }

    pub fn set_intersection_width(&mut self, width: f32) {
        self.intersection_width = width;
        self.explicit_intersection = true;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LooseLaser {
    /// Current drawn length; grows with speed until it reaches the configured length.
    pub extent: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StraightLaser {
    pub angle: f32,
    pub source: bool,
    pub end: bool,
    pub end_graphic: Option<i64>,
    pub delay_scale: (f32, f32),
    pub permit_expand: bool,
    /// Width multiplier, ramps to 1 once the delay ends.
    pub expand: f32,
}

impl Default for StraightLaser {
    fn default() -> Self {
        Self {
            angle: 0.0,
            source: true,
            end: false,
            end_graphic: None,
            delay_scale: (0.1, 0.1),
            permit_expand: true,
            expand: 0.0,
        }
    }
}

/// One ribbon node. `vert_offset` holds the two corner offsets from `position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserNode {
    pub handle: u64,
    pub position: Vec2,
    pub vert_offset: [Vec2; 2],
    pub color: u32,
}

impl LaserNode {
    /// Ribbon direction in radians, recovered from the corner offset.
    pub fn angle(&self) -> f32 {
        let v = self.vert_offset[0];
        v.y.atan2(v.x) + std::f32::consts::FRAC_PI_2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurveLaser {
    nodes: VecDeque<LaserNode>,
    next_handle: u64,
    pub max_nodes: usize,
    pub tip_decrement: f32,
}

impl Default for CurveLaser {
    fn default() -> Self {
        Self { nodes: VecDeque::new(), next_handle: 1, max_nodes: DEFAULT_CURVE_NODES, tip_decrement: 0.0 }
    }
}

impl CurveLaser {
    pub fn nodes(&self) -> impl Iterator<Item = &LaserNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds a node whose corners sit half the render width to either side of `angle`.
    pub fn make_node(position: Vec2, angle: f32, half_width: f32, color: u32) -> (Vec2, [Vec2; 2], u32) {
        let side = Vec2::new(angle.sin(), -angle.cos()) * half_width;
        (position, [side, -side], color)
    }

    /// Appends a node at the head and trims the tail to `max_nodes`. Returns its handle.
    pub fn push(&mut self, position: Vec2, angle: f32, half_width: f32, color: u32) -> u64 {
        let (position, vert_offset, color) = Self::make_node(position, angle, half_width, color);
        let handle = self.next_handle;
        self.next_handle += 1;
        self.nodes.push_front(LaserNode { handle, position, vert_offset, color });
        while self.nodes.len() > self.max_nodes.max(1) {
            self.nodes.pop_back();
        }
        handle
    }

    /// Handle of the node at `index` counted from the head.
    pub fn handle_at(&self, index: usize) -> Option<u64> {
        self.nodes.get(index).map(|node| node.handle)
    }

    pub fn handles(&self) -> Vec<u64> {
        self.nodes.iter().map(|node| node.handle).collect()
    }

    pub fn node(&self, handle: u64) -> Option<&LaserNode> {
        self.nodes.iter().find(|node| node.handle == handle)
    }

    pub fn node_mut(&mut self, handle: u64) -> Option<&mut LaserNode> {
        self.nodes.iter_mut().find(|node| node.handle == handle)
    }

    /// Node alpha after the tip decrement fades the ribbon toward its tail.
    pub fn node_alpha(&self, index: usize) -> f32 {
        if self.nodes.len() < 2 || self.tip_decrement <= 0.0 {
            return 1.0;
        }
        let t = index as f32 / (self.nodes.len() - 1) as f32;
        (1.0 - t * self.tip_decrement.clamp(0.0, 1.0)).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShotKind {
    Normal,
    Loose(LooseLaser),
    Straight(StraightLaser),
    Curve(CurveLaser),
}

impl ShotKind {
    pub fn for_type(ty: ObjectType) -> Option<ShotKind> {
        match ty {
            ObjectType::Shot => Some(ShotKind::Normal),
            ObjectType::LooseLaser => Some(ShotKind::Loose(LooseLaser::default())),
            ObjectType::StraightLaser => Some(ShotKind::Straight(StraightLaser::default())),
            ObjectType::CurveLaser => Some(ShotKind::Curve(CurveLaser::default())),
            _ => None,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ShotKind::Normal => ObjectType::Shot,
            ShotKind::Loose(_) => ObjectType::LooseLaser,
            ShotKind::Straight(_) => ObjectType::StraightLaser,
            ShotKind::Curve(_) => ObjectType::CurveLaser,
        }
    }
}

/// What a frame of movement did to a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShotTick {
    pub expired: bool,
    pub faded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShotObject {
    pub id: ObjectId,
    pub state: ObjectState,
    pub owner: OwnerType,
    pub motion: MoveObject,
    pub kind: ShotKind,
    pub laser: LaserParams,
    pub damage: f64,
    /// Penetration count. Spell resistance is encoded with the reserved life sentinels.
    pub life: f64,
    pub delay: u32,
    delay_total: u32,
    pub delete_frame: Option<u32>,
    pub auto_delete: bool,
    fade: Option<(u32, u32)>,
    pub graphic: i64,
    pub blend: i64,
    pub erase_shot: bool,
    pub spell_factor: bool,
    pub item_change: bool,
    pub intersection_enable: bool,
    pub intersection_scale: Vec2,
    /// Set once a script submitted its own hitbox; the automatic hitbox stays off afterwards.
    pub user_intersection: bool,
    pub position_rounding: bool,
    pub delay_params: DelayParams,
    pub graze: GrazeState,
    pub child: bool,
    pub render_priority: i32,
    pub age: u32,
    pub(crate) owner_slot: Option<TargetOwner>,
}

impl ShotObject {
    pub fn new(id: ObjectId, kind: ShotKind, owner: OwnerType, render_priority: i32) -> Self {
        Self {
            id,
            state: ObjectState::Inactive,
            owner,
            motion: MoveObject::default(),
            kind,
            laser: LaserParams::default(),
            damage: 1.0,
            life: 1.0,
            delay: 0,
            delay_total: 0,
            delete_frame: None,
            auto_delete: true,
            fade: None,
            graphic: -1,
            blend: 0,
            erase_shot: false,
            spell_factor: false,
            item_change: true,
            intersection_enable: true,
            intersection_scale: Vec2::ONE,
            user_intersection: false,
            position_rounding: false,
            delay_params: DelayParams::default(),
            graze: GrazeState::default(),
            child: false,
            render_priority,
            age: 0,
            owner_slot: None,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    pub fn is_laser(&self) -> bool {
        !matches!(self.kind, ShotKind::Normal)
    }

    pub fn position(&self) -> Vec2 {
        self.motion.position
    }

    pub fn set_delay(&mut self, frames: u32) {
        self.delay = frames;
        self.delay_total = frames;
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Starts the fade-out. Fading shots no longer collide.
    pub fn start_fade(&mut self, frames: u32) {
        if self.fade.is_none() {
            self.fade = Some((frames.max(1), frames.max(1)));
        }
    }

    pub fn fade_alpha(&self) -> f32 {
        self.fade.map_or(1.0, |(left, total)| left as f32 / total as f32)
    }

    pub fn is_spell_resist(&self) -> bool {
        self.life == LIFE_SPELL_REGIST
    }

    pub fn set_spell_resist(&mut self, resist: bool) {
        if resist {
            self.life = LIFE_SPELL_REGIST;
        } else if self.life >= LIFE_SPELL_UNREGIST {
            self.life = LIFE_SPELL_UNREGIST;
        }
    }

    pub fn collides(&self) -> bool {
        self.state == ObjectState::Active && self.delay == 0 && self.intersection_enable && self.fade.is_none()
    }

    pub fn delay_visual(&self) -> Option<DelayVisual> {
        if self.delay == 0 {
            return None;
        }
        let elapsed = self.delay_total.saturating_sub(self.delay);
        let (scale, alpha) = self.delay_params.sample(elapsed, self.delay_total);
        Some(DelayVisual {
            scale,
            alpha,
            graphic: self.delay_params.graphic.unwrap_or(self.graphic),
            color: self.delay_params.coloring.then_some(self.delay_params.color),
        })
    }

    /// Advances one frame of movement and lifetime bookkeeping.
    pub fn tick(&mut self, env: crate::movement::StepEnv<'_>) -> ShotTick {
        let mut out = ShotTick::default();
        self.age += 1;
        self.graze.tick();
        if let Some((left, total)) = self.fade {
            let left = left.saturating_sub(1);
            self.fade = Some((left, total));
            if left == 0 {
                out.faded = true;
                return out;
            }
        }
        let delayed = self.delay > 0;
        if delayed {
            self.delay -= 1;
        }
        if !delayed || self.delay_params.motion {
            let effects = self.motion.step(env);
            if let Some(graphic) = effects.graphic {
                self.graphic = graphic;
            }
            if let Some(blend) = effects.blend {
                self.blend = blend;
            }
        }
        let half_width = self.laser.render_width * 0.5;
        let speed = self.motion.speed();
        let position = self.motion.position;
        let angle = self.motion.angle();
        match &mut self.kind {
            ShotKind::Normal => {}
            ShotKind::Loose(loose) => {
                if !delayed {
                    loose.extent = (loose.extent + speed.abs()).min(self.laser.length);
                }
            }
            ShotKind::Straight(straight) => {
                if self.delay == 0 {
                    straight.expand = if straight.permit_expand { (straight.expand + 0.1).min(1.0) } else { 1.0 };
                }
            }
            ShotKind::Curve(curve) => {
                if !delayed && self.motion.process_movement {
                    curve.push(position, angle, half_width, 0xffff_ffff);
                }
            }
        }
        if !delayed {
            if let Some(frames) = self.delete_frame.as_mut() {
                *frames = frames.saturating_sub(1);
                if *frames == 0 {
                    out.expired = true;
                }
            }
        }
        out
    }

    /// Whether the shot's body reaches into `region`. Normal shots test their
    /// position, lasers their hit segment or nodes.
    pub fn touches_circle(&self, region: &Circle) -> bool {
        match (&self.kind, self.hit_segment()) {
            (_, Some((start, end))) => {
                crate::geometry::point_segment_distance_squared(region.center, start, end)
                    <= region.radius * region.radius
            }
            (ShotKind::Curve(curve), None) if !curve.is_empty() => {
                curve.nodes().any(|node| region.contains_point(node.position))
            }
            _ => region.contains_point(self.position()),
        }
    }

    /// Points along the shot at which converted items spawn, at most `limit` of them.
    /// Long lasers spread the limited points over their whole length.
    pub fn item_points(&self, limit: usize) -> Vec<Vec2> {
        let spacing = self.laser.item_distance.max(1.0);
        match self.hit_segment() {
            Some((start, end)) => {
                let steps = (start.distance(end) / spacing).floor();
                // Non-finite lengths fail the comparison and fall back to the limit.
                let count = if steps < limit as f32 { steps as usize + 1 } else { limit }.min(limit);
                (0..count)
                    .map(|i| start.lerp(end, if count > 1 { i as f32 / (count - 1) as f32 } else { 0.0 }))
                    .filter(|point| point.is_finite())
                    .collect()
            }
            None => match &self.kind {
                ShotKind::Curve(curve) => curve.nodes().step_by(2).map(|node| node.position).take(limit).collect(),
                _ => std::iter::once(self.position()).take(limit).collect(),
            },
        }
    }

    /// Tail-to-head segment of a loose or straight laser, without the invalid ends.
    fn hit_segment(&self) -> Option<(Vec2, Vec2)> {
        let head = self.position();
        let (tail, tip) = match &self.kind {
            ShotKind::Loose(loose) => {
                let dir = Vec2::from_angle(self.motion.angle());
                (head - dir * loose.extent, head)
            }
            ShotKind::Straight(straight) => {
                let dir = Vec2::from_angle(straight.angle);
                (head, head + dir * self.laser.length)
            }
            _ => return None,
        };
        let (cut_tail, cut_head) = self.laser.invalid_length;
        let span = tip - tail;
        Some((tail + span * cut_tail.clamp(0.0, 1.0), tip - span * cut_head.clamp(0.0, 1.0)))
    }

    /// Hit shapes of the automatic hitbox for this frame. `circles` are the graphic's
    /// collision circles as `(radius, offset)`.
    pub fn hit_shapes(&self, circles: &[(f32, Vec2)]) -> Vec<Shape> {
        let mut position = self.position();
        if self.position_rounding {
            position = position.round();
        }
        match &self.kind {
            ShotKind::Normal => {
                let scale = self.intersection_scale;
                let radius_scale = scale.x.max(scale.y);
                if circles.is_empty() {
                    return vec![Shape::Circle(Circle { center: position, radius: FALLBACK_SHOT_RADIUS * radius_scale })];
                }
                let rotation = Vec2::from_angle(self.motion.angle() + std::f32::consts::FRAC_PI_2);
                circles
                    .iter()
                    .map(|(radius, offset)| {
                        let local = rotation.rotate(*offset * scale);
                        Shape::Circle(Circle { center: position + local, radius: radius * radius_scale })
                    })
                    .collect()
            }
            ShotKind::Loose(_) | ShotKind::Straight(_) => {
                let width = match &self.kind {
                    ShotKind::Straight(straight) => self.laser.intersection_width * straight.expand,
                    _ => self.laser.intersection_width,
                };
                self.hit_segment()
                    .map(|(start, end)| vec![Shape::Line(WidthLine { start, end, width })])
                    .unwrap_or_default()
            }
            ShotKind::Curve(curve) => {
                let width = self.laser.intersection_width;
                let nodes: Vec<Vec2> = curve.nodes().map(|node| node.position).collect();
                let len = nodes.len();
                let head_cut = ((len as f32) * self.laser.invalid_length.1).floor() as usize;
                let end = len.saturating_sub(((len as f32) * self.laser.invalid_length.0).floor() as usize);
                if head_cut >= end {
                    return Vec::new();
                }
                nodes[head_cut..end]
                    .windows(2)
                    .map(|pair| Shape::Line(WidthLine { start: pair[0], end: pair[1], width }))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::StepEnv;

    #[test]
    fn delay_mode_swaps_accelerate_and_decelerate() {
        assert_eq!(LerpMode::for_delay(3), LerpMode::Decelerate);
        assert_eq!(LerpMode::for_delay(4), LerpMode::Accelerate);
        assert_eq!(LerpMode::for_delay(1), LerpMode::Smooth);
        assert_eq!(LerpMode::for_delay(99), LerpMode::Linear);
    }

    #[test]
    fn spell_resist_uses_life_sentinels() {
        let mut shot = ShotObject::new(ObjectId(1), ShotKind::Normal, OwnerType::Enemy, 50);
        shot.set_spell_resist(true);
        assert!(shot.is_spell_resist());
        shot.set_spell_resist(false);
        assert_eq!(shot.life, LIFE_SPELL_UNREGIST);
        shot.life = 3.0;
        shot.set_spell_resist(false);
        assert_eq!(shot.life, 3.0);
    }

    #[test]
    fn delayed_shots_hold_still_and_do_not_collide() {
        let mut shot = ShotObject::new(ObjectId(1), ShotKind::Normal, OwnerType::Enemy, 50);
        shot.state = ObjectState::Active;
        shot.motion = MoveObject::with_angle(Vec2::ZERO, 2.0, 0.0);
        shot.set_delay(2);
        assert!(!shot.collides());
        shot.tick(StepEnv::default());
        assert_eq!(shot.position(), Vec2::ZERO);
        assert!(shot.delay_visual().is_some());
        shot.tick(StepEnv::default());
        shot.tick(StepEnv::default());
        assert!(shot.collides());
        assert_eq!(shot.position(), Vec2::new(2.0, 0.0));
    }

    #[test]
    fn curve_laser_trims_to_max_nodes_and_keeps_handles_unique() {
        let mut curve = CurveLaser { max_nodes: 3, ..CurveLaser::default() };
        let handles: Vec<u64> = (0..5).map(|i| curve.push(Vec2::new(i as f32, 0.0), 0.0, 4.0, 0xffff_ffff)).collect();
        assert_eq!(curve.len(), 3);
        assert_eq!(curve.handles(), vec![handles[4], handles[3], handles[2]]);
        assert!(curve.node(handles[0]).is_none());
        let node = curve.node(handles[4]).expect("head node");
        assert!((node.angle() - 0.0).abs() < 1e-5);
    }

    #[test]
    fn item_points_are_bounded_by_the_limit() {
        let mut laser = ShotObject::new(ObjectId(1), ShotKind::Straight(StraightLaser::default()), OwnerType::Enemy, 50);
        laser.laser.invalid_length = (0.0, 0.0);
        laser.laser.length = 48.0;
        assert_eq!(laser.item_points(10).len(), 3);
        assert_eq!(laser.item_points(2).len(), 2);

        laser.laser.length = 1e30;
        let points = laser.item_points(5);
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|point| point.is_finite()));
        laser.laser.length = f32::INFINITY;
        assert!(laser.item_points(4).len() <= 4);
        assert!(laser.item_points(0).is_empty());

        let normal = ShotObject::new(ObjectId(2), ShotKind::Normal, OwnerType::Enemy, 50);
        assert_eq!(normal.item_points(1).len(), 1);
        assert!(normal.item_points(0).is_empty());
    }

    #[test]
    fn graze_rearms_only_with_invalid_frames() {
        let mut graze = GrazeState::default();
        assert!(graze.is_valid());
        graze.register();
        assert!(!graze.is_valid());

        let mut repeat = GrazeState { invalid_frames: 2, ..GrazeState::default() };
        repeat.register();
        repeat.tick();
        assert!(!repeat.is_valid());
        repeat.tick();
        assert!(repeat.is_valid());
    }
}
