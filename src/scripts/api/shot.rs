//! Shot creation and bulk control, plus `ObjShot_*`, `ObjLaser_*`, `ObjStLaser_*` and
//! `ObjCrLaser_*`.

use glam::Vec2;
use tracing::debug;

use crate::assets::DataSlot;
use crate::config::ClipMargins;
use crate::events::ShotDeleteMode;
use crate::geometry::{Circle, Shape, WidthLine};
use crate::intersection::{IntersectionTarget, TargetCategory};
use crate::movement::MoveObject;
use crate::scripts::constants::*;
use crate::scripts::table::{Args, FunctionTable, ScriptCall, SHOT_SCRIPT_RUNNING};
use crate::scripts::{ScriptError, ScriptKind, ScriptValue};
use crate::stage::shot::{CurveLaser, DelayMode, LaserNode, LerpMode, StraightLaser};
use crate::stage::shot_manager::ClipRect;
use crate::stage::{DeleteTarget, ObjectId, ObjectType, OwnerFilter, OwnerType, ShotKind, ShotObject};

use super::{ok, void, CallResult};

pub(crate) fn delete_target(raw: i64) -> DeleteTarget {
    match raw {
        TYPE_SHOT => DeleteTarget::Shot,
        TYPE_CHILD => DeleteTarget::Child,
        _ => DeleteTarget::All,
    }
}

pub(crate) fn delete_mode(raw: i64) -> ShotDeleteMode {
    match raw {
        TYPE_FADE => ShotDeleteMode::Fade,
        TYPE_ITEM => ShotDeleteMode::ToItem,
        _ => ShotDeleteMode::Immediate,
    }
}

/// Owner filter selected by a `TARGET_*` constant.
pub(crate) fn target_filter(raw: i64) -> OwnerFilter {
    match raw {
        TARGET_PLAYER => OwnerFilter::Only(OwnerType::Player),
        TARGET_ENEMY => OwnerFilter::Only(OwnerType::Enemy),
        _ => OwnerFilter::All,
    }
}

fn shot_category(kind: ScriptKind) -> TargetCategory {
    match kind {
        ScriptKind::Player => TargetCategory::PlayerShot,
        _ => TargetCategory::EnemyShot,
    }
}

fn edit(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut ShotObject)) -> CallResult {
    if let Some(shot) = call.stage.shots.get_mut(id) {
        apply(shot);
    }
    void()
}

fn read<T: Into<ScriptValue>>(call: &ScriptCall<'_>, id: ObjectId, default: T, get: impl FnOnce(&ShotObject) -> T) -> CallResult {
    ok(call.stage.shots.get(id).map_or(default, get))
}

fn edit_straight(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut StraightLaser)) -> CallResult {
    edit(call, id, |shot| {
        if let ShotKind::Straight(laser) = &mut shot.kind {
            apply(laser);
        }
    })
}

fn straight<'a>(call: &'a ScriptCall<'_>, id: ObjectId) -> Option<&'a StraightLaser> {
    match &call.stage.shots.get(id)?.kind {
        ShotKind::Straight(laser) => Some(laser),
        _ => None,
    }
}

fn curve<'a>(call: &'a ScriptCall<'_>, id: ObjectId) -> Option<&'a CurveLaser> {
    match &call.stage.shots.get(id)?.kind {
        ShotKind::Curve(laser) => Some(laser),
        _ => None,
    }
}

/// Curve laser and the half of its render width that node corners sit at.
fn curve_mut<'a>(call: &'a mut ScriptCall<'_>, id: ObjectId) -> Option<(&'a mut CurveLaser, f32)> {
    let shot = call.stage.shots.get_mut(id)?;
    let half_width = shot.laser.render_width * 0.5;
    match &mut shot.kind {
        ShotKind::Curve(laser) => Some((laser, half_width)),
        _ => None,
    }
}

fn node_handle(args: &Args<'_>, index: usize) -> Result<Option<u64>, ScriptError> {
    Ok(u64::try_from(args.int(index)?).ok())
}

fn node(call: &ScriptCall<'_>, args: &Args<'_>) -> Result<Option<LaserNode>, ScriptError> {
    let handle = node_handle(args, 1)?;
    Ok(curve(call, args.id(0)?).zip(handle).and_then(|(laser, handle)| laser.node(handle).copied()))
}

/// Splits `0xAARRGGBB` into `[r, g, b, a]`.
fn color_components(color: u32) -> ScriptValue {
    let [a, r, g, b] = color.to_be_bytes();
    ScriptValue::real_array([r, g, b, a].map(f64::from))
}

fn opaque(color: i64) -> u32 {
    0xff00_0000 | (color as u32 & 0x00ff_ffff)
}

fn spawned(call: &mut ScriptCall<'_>, ty: ObjectType, motion: MoveObject, graphic: i64, delay: u32) -> Option<ObjectId> {
    let owner = call.owner();
    let id = call.stage.spawn_shot(ty, owner, motion, graphic, delay);
    if id.is_none() {
        debug!(target: "scripts", ?ty, max = call.stage.shots.max(), "shot cap reached");
    }
    id
}

fn created(id: Option<ObjectId>) -> CallResult {
    ok(id.unwrap_or(ObjectId::INVALID))
}

fn configure(call: &mut ScriptCall<'_>, id: Option<ObjectId>, apply: impl FnOnce(&mut ShotObject)) -> CallResult {
    if let Some(shot) = id.and_then(|id| call.stage.shots.get_mut(id)) {
        apply(shot);
    }
    created(id)
}

fn shot_data_info(call: &ScriptCall<'_>, graphic: i64, target: i64, info: i64) -> ScriptValue {
    let slot = if target == TARGET_PLAYER { DataSlot::PlayerShot } else { DataSlot::EnemyShot };
    let data = call.stage.data.shot_data(slot, graphic);
    match (info, data) {
        (INFO_EXISTS, data) => data.is_some().into(),
        (INFO_PATH, _) => call
            .stage
            .data
            .shot_table(slot)
            .and_then(|table| table.texture_of(graphic))
            .unwrap_or_default()
            .into(),
        (INFO_RECT, Some(data)) => ScriptValue::real_array(data.rect.map(f64::from)),
        (INFO_RECT, None) => ScriptValue::real_array([0.0; 4]),
        (INFO_DELAY_COLOR, Some(data)) => ScriptValue::real_array(data.delay_color.map(f64::from)),
        (INFO_DELAY_COLOR, None) => ScriptValue::real_array([255.0; 3]),
        (INFO_BLEND, data) => data.map_or(0, |data| data.blend).into(),
        (INFO_COLLISION, data) => data.and_then(|data| data.collision.first()).map_or(0.0, |c| c.radius).into(),
        (INFO_COLLISION_LIST, Some(data)) => ScriptValue::Array(
            data.collision.iter().map(|c| ScriptValue::real_array([c.radius, c.x, c.y].map(f64::from))).collect(),
        ),
        (INFO_COLLISION_LIST, None) => ScriptValue::Array(vec![ScriptValue::real_array([0.0; 3])]),
        (INFO_IS_FIXED_ANGLE, data) => data.map_or(true, |data| data.fixed_angle).into(),
        _ => ScriptValue::Void,
    }
}

pub(crate) fn register(table: &mut FunctionTable) {
    register_global(table);
    register_creation(table);
    register_obj_shot(table);
    register_lasers(table);
}

fn register_global(table: &mut FunctionTable) {
    table.native("LoadEnemyShotData", 1, |call, args| {
        ok(call.stage.load_data(DataSlot::EnemyShot, &args.string(0)?, false))
    });
    table.native("ReloadEnemyShotData", 1, |call, args| {
        ok(call.stage.load_data(DataSlot::EnemyShot, &args.string(0)?, true))
    });
    table.native("DeleteShotAll", 2, |call, args| {
        call.stage.delete_shots(delete_target(args.int(0)?), delete_mode(args.int(1)?), None);
        void()
    });
    table.native("DeleteShotInCircle", 5, |call, args| {
        let region = Circle::new(args.float(2)?, args.float(3)?, args.float(4)?);
        call.stage.delete_shots(delete_target(args.int(0)?), delete_mode(args.int(1)?), Some(region));
        void()
    });
    table.native("SetShotIntersectionCircle", 3, |call, args| {
        let shape = Shape::Circle(Circle::new(args.float(0)?, args.float(1)?, args.float(2)?));
        let category = shot_category(call.script.kind);
        call.stage.intersection.add_target(IntersectionTarget::new(shape, category));
        void()
    });
    table.native("SetShotIntersectionLine", 5, |call, args| {
        let line = WidthLine::new(args.float(0)?, args.float(1)?, args.float(2)?, args.float(3)?, args.float(4)?);
        let category = shot_category(call.script.kind);
        call.stage.intersection.add_target(IntersectionTarget::new(Shape::Line(line), category));
        void()
    });
    table.native("GetShotIdInCircleA1", 3, |call, args| {
        let region = Circle::new(args.float(0)?, args.float(1)?, args.float(2)?);
        let opposite = match call.owner() {
            OwnerType::Player => OwnerType::Enemy,
            _ => OwnerType::Player,
        };
        ok(ScriptValue::id_array(call.stage.shots.ids_in_circle(&region, OwnerFilter::Only(opposite))))
    });
    table.native("GetShotIdInCircleA2", 4, |call, args| {
        let region = Circle::new(args.float(0)?, args.float(1)?, args.float(2)?);
        ok(ScriptValue::id_array(call.stage.shots.ids_in_circle(&region, target_filter(args.int(3)?))))
    });
    table.native("GetShotCount", 1, |call, args| ok(call.stage.shots.count(target_filter(args.int(0)?))));
    table.native("SetShotAutoDeleteClip", 4, |call, args| {
        let margins =
            ClipMargins { left: args.float(0)?, top: args.float(1)?, right: args.float(2)?, bottom: args.float(3)? };
        let clip = ClipRect::around(&call.stage.config.field, &margins);
        call.stage.shots.set_clip(clip);
        void()
    });
    table.native("GetShotDataInfoA1", 3, |call, args| {
        Ok(shot_data_info(call, args.int(0)?, args.int(1)?, args.int(2)?))
    });
    table.native("StartShotScript", 1, |call, args| {
        if call.stage.start_shot_script(&args.string(0)?) {
            void()
        } else {
            Err(ScriptError::fatal(SHOT_SCRIPT_RUNNING))
        }
    });
}

fn register_creation(table: &mut FunctionTable) {
    table.native("CreateShotA1", 6, |call, args| {
        let motion = MoveObject::with_angle(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.radians(3)?);
        let id = spawned(call, ObjectType::Shot, motion, args.int(4)?, args.frames(5)?);
        created(id)
    });
    table.native("CreateShotA2", 8, |call, args| {
        let mut motion =
            MoveObject::with_angle(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.radians(3)?);
        motion.set_acceleration(args.float(4)?);
        motion.set_max_speed(args.float(5)?);
        let id = spawned(call, ObjectType::Shot, motion, args.int(6)?, args.frames(7)?);
        created(id)
    });
    table.native("CreateShotOA1", 5, |call, args| {
        let Some(origin) = call.stage.object_position(args.id(0)?) else { return created(None) };
        let motion = MoveObject::with_angle(origin, args.float(1)?, args.radians(2)?);
        let id = spawned(call, ObjectType::Shot, motion, args.int(3)?, args.frames(4)?);
        created(id)
    });
    table.native("CreateShotB1", 6, |call, args| {
        let motion = MoveObject::with_xy(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.float(3)?);
        let id = spawned(call, ObjectType::Shot, motion, args.int(4)?, args.frames(5)?);
        created(id)
    });
    table.native("CreateShotB2", 10, |call, args| {
        let mut motion = MoveObject::with_xy(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.float(3)?);
        let (accel_x, accel_y, max_x, max_y) = (args.float(4)?, args.float(5)?, args.float(6)?, args.float(7)?);
        motion.pattern.update_xy(|m| {
            m.accel_x = accel_x;
            m.accel_y = accel_y;
            m.max_speed_x = Some(max_x);
            m.max_speed_y = Some(max_y);
        });
        let id = spawned(call, ObjectType::Shot, motion, args.int(8)?, args.frames(9)?);
        created(id)
    });
    table.native("CreateShotOB1", 5, |call, args| {
        let Some(origin) = call.stage.object_position(args.id(0)?) else { return created(None) };
        let motion = MoveObject::with_xy(origin, args.float(1)?, args.float(2)?);
        let id = spawned(call, ObjectType::Shot, motion, args.int(3)?, args.frames(4)?);
        created(id)
    });
    table.native("CreateLooseLaserA1", 8, |call, args| {
        let motion = MoveObject::with_angle(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.radians(3)?);
        let (length, width) = (args.float(4)?, args.float(5)?);
        let id = spawned(call, ObjectType::LooseLaser, motion, args.int(6)?, args.frames(7)?);
        configure(call, id, |shot| {
            shot.laser.length = length;
            shot.laser.set_render_width(width);
        })
    });
    table.native("CreateStraightLaserA1", 8, |call, args| {
        let motion = MoveObject::with_angle(Vec2::new(args.float(0)?, args.float(1)?), 0.0, args.radians(2)?);
        let (length, width, delete_frame) = (args.float(3)?, args.float(4)?, args.frames(5)?);
        let id = spawned(call, ObjectType::StraightLaser, motion, args.int(6)?, args.frames(7)?);
        configure(call, id, |shot| {
            shot.laser.length = length;
            shot.laser.set_render_width(width);
            shot.delete_frame = Some(delete_frame);
        })
    });
    table.native("CreateCurveLaserA1", 8, |call, args| {
        let motion = MoveObject::with_angle(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.radians(3)?);
        let (length, width) = (args.float(4)?, args.float(5)?);
        let id = spawned(call, ObjectType::CurveLaser, motion, args.int(6)?, args.frames(7)?);
        configure(call, id, |shot| {
            shot.laser.length = length;
            shot.laser.set_render_width(width);
            if let ShotKind::Curve(laser) = &mut shot.kind {
                laser.max_nodes = length.max(1.0) as usize;
            }
        })
    });
}

fn register_obj_shot(table: &mut FunctionTable) {
    table.native("ObjShot_Create", 1, |call, args| {
        call.require_main_thread()?;
        let owner = call.owner();
        let id = ObjectType::from_script(args.int(0)?).and_then(|ty| call.stage.create_shot(ty, owner));
        created(id)
    });
    table.native("ObjShot_Regist", 1, |call, args| {
        call.stage.regist_shot(args.id(0)?);
        void()
    });
    table.native("ObjShot_SetOwnerType", 2, |call, args| {
        let owner = OwnerType::from_script(args.int(1)?);
        edit(call, args.id(0)?, |shot| shot.owner = owner)
    });
    table.native("ObjShot_SetAutoDelete", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.auto_delete = enabled)
    });
    table.native("ObjShot_FadeDelete", 1, |call, args| {
        call.stage.delete_shot(args.id(0)?, ShotDeleteMode::Fade);
        void()
    });
    table.native("ObjShot_SetDeleteFrame", 2, |call, args| {
        let frames = args.frames(1)?;
        edit(call, args.id(0)?, |shot| shot.delete_frame = Some(frames))
    });
    table.native("ObjShot_SetDelay", 2, |call, args| {
        let frames = args.frames(1)?;
        edit(call, args.id(0)?, |shot| shot.set_delay(frames))
    });
    table.native("ObjShot_SetSpellResist", 2, |call, args| {
        let resist = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.set_spell_resist(resist))
    });
    table.native("ObjShot_SetGraphic", 2, |call, args| {
        let graphic = args.int(1)?;
        edit(call, args.id(0)?, |shot| shot.graphic = graphic)
    });
    table.native("ObjShot_SetSourceBlendType", 2, |call, args| {
        let blend = args.int(1)?;
        edit(call, args.id(0)?, |shot| shot.blend = blend)
    });
    table.native("ObjShot_SetDamage", 2, |call, args| {
        let damage = args.real(1)?;
        edit(call, args.id(0)?, |shot| shot.damage = damage)
    });
    table.native("ObjShot_SetPenetration", 2, |call, args| {
        let life = args.real(1)?;
        edit(call, args.id(0)?, |shot| shot.life = life)
    });
    table.native("ObjShot_SetEraseShot", 2, |call, args| {
        let erase = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.erase_shot = erase)
    });
    table.native("ObjShot_SetSpellFactor", 2, |call, args| {
        let factor = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.spell_factor = factor)
    });
    table.native("ObjShot_ToItem", 1, |call, args| {
        call.stage.convert_shot_to_item(args.id(0)?);
        void()
    });
    table.native("ObjShot_SetIntersectionCircleA1", 2, |call, args| {
        let id = args.id(0)?;
        let Some(center) = call.stage.shots.get(id).map(ShotObject::position) else { return void() };
        call.stage.add_shot_intersection(id, Shape::Circle(Circle { center, radius: args.float(1)? }));
        void()
    });
    table.native("ObjShot_SetIntersectionCircleA2", 4, |call, args| {
        let shape = Shape::Circle(Circle::new(args.float(1)?, args.float(2)?, args.float(3)?));
        call.stage.add_shot_intersection(args.id(0)?, shape);
        void()
    });
    table.native("ObjShot_SetIntersectionLine", 6, |call, args| {
        let line = WidthLine::new(args.float(1)?, args.float(2)?, args.float(3)?, args.float(4)?, args.float(5)?);
        call.stage.add_shot_intersection(args.id(0)?, Shape::Line(line));
        void()
    });
    table.native("ObjShot_SetIntersectionEnable", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.intersection_enable = enabled)
    });
    table.native("ObjShot_GetIntersectionEnable", 1, |call, args| {
        read(call, args.id(0)?, false, |shot| shot.intersection_enable)
    });
    table.native("ObjShot_SetItemChange", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.item_change = enabled)
    });
    table.native("ObjShot_GetDelay", 1, |call, args| read(call, args.id(0)?, 0, |shot| shot.delay));
    table.native("ObjShot_GetDamage", 1, |call, args| read(call, args.id(0)?, 0.0, |shot| shot.damage));
    table.native("ObjShot_GetPenetration", 1, |call, args| read(call, args.id(0)?, 0.0, |shot| shot.life));
    table.native("ObjShot_IsSpellResist", 1, |call, args| {
        read(call, args.id(0)?, false, ShotObject::is_spell_resist)
    });
    table.native("ObjShot_GetImageID", 1, |call, args| read(call, args.id(0)?, -1, |shot| shot.graphic));
    table.native("ObjShot_SetIntersectionScaleX", 2, |call, args| {
        let scale = args.float(1)?;
        edit(call, args.id(0)?, |shot| shot.intersection_scale.x = scale)
    });
    table.native("ObjShot_SetIntersectionScaleY", 2, |call, args| {
        let scale = args.float(1)?;
        edit(call, args.id(0)?, |shot| shot.intersection_scale.y = scale)
    });
    table.native("ObjShot_SetIntersectionScaleXY", 3, |call, args| {
        let scale = Vec2::new(args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |shot| shot.intersection_scale = scale)
    });
    table.native("ObjShot_SetPositionRounding", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.position_rounding = enabled)
    });
    table.native("ObjShot_SetDelayMotionEnable", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.delay_params.motion = enabled)
    });
    table.native("ObjShot_SetDelayGraphic", 2, |call, args| {
        let graphic = args.int(1)?;
        edit(call, args.id(0)?, |shot| shot.delay_params.graphic = Some(graphic))
    });
    table.native("ObjShot_SetDelayScaleParameter", 4, |call, args| {
        let ramp = [args.float(1)?, args.float(2)?, args.float(3)?];
        edit(call, args.id(0)?, |shot| shot.delay_params.scale = ramp)
    });
    table.native("ObjShot_SetDelayAlphaParameter", 4, |call, args| {
        let ramp = [args.float(1)?, args.float(2)?, args.float(3)?];
        edit(call, args.id(0)?, |shot| shot.delay_params.alpha = ramp)
    });
    table.native("ObjShot_SetDelayMode", 4, |call, args| {
        let mode = if args.int(1)? == 1 { DelayMode::Lerp } else { DelayMode::Default };
        let (scale_lerp, alpha_lerp) = (LerpMode::for_delay(args.int(2)?), LerpMode::for_delay(args.int(3)?));
        edit(call, args.id(0)?, |shot| {
            shot.delay_params.mode = mode;
            shot.delay_params.scale_lerp = scale_lerp;
            shot.delay_params.alpha_lerp = alpha_lerp;
        })
    });
    table.native("ObjShot_SetDelayColor", 2, |call, args| {
        let color = opaque(args.int(1)?);
        edit(call, args.id(0)?, |shot| shot.delay_params.color = color)
    });
    table.native("ObjShot_SetDelayColoringEnable", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |shot| shot.delay_params.coloring = enabled)
    });
    table.native("ObjShot_SetGrazeInvalidFrame", 2, |call, args| {
        let frames = args.frames(1)?;
        edit(call, args.id(0)?, |shot| shot.graze.invalid_frames = frames)
    });
    table.native("ObjShot_SetGrazeFrame", 2, |call, args| {
        let frames = args.frames(1)?;
        edit(call, args.id(0)?, |shot| shot.graze.cooldown = frames)
    });
    table.native("ObjShot_IsValidGraze", 1, |call, args| read(call, args.id(0)?, false, |shot| shot.graze.is_valid()));
}

fn register_lasers(table: &mut FunctionTable) {
    table.native("ObjLaser_SetLength", 2, |call, args| {
        let length = args.float(1)?;
        edit(call, args.id(0)?, |shot| shot.laser.length = length)
    });
    table.native("ObjLaser_SetRenderWidth", 2, |call, args| {
        let width = args.float(1)?;
        edit(call, args.id(0)?, |shot| shot.laser.set_render_width(width))
    });
    table.native("ObjLaser_SetIntersectionWidth", 2, |call, args| {
        let width = args.float(1)?;
        edit(call, args.id(0)?, |shot| shot.laser.set_intersection_width(width))
    });
    table.native("ObjLaser_SetInvalidLength", 3, |call, args| {
        let (tail, head) = (args.float(1)? / 100.0, args.float(2)? / 100.0);
        edit(call, args.id(0)?, |shot| shot.laser.invalid_length = (tail.clamp(0.0, 1.0), head.clamp(0.0, 1.0)))
    });
    table.native("ObjLaser_SetItemDistance", 2, |call, args| {
        let distance = args.float(1)?.max(0.1);
        edit(call, args.id(0)?, |shot| shot.laser.item_distance = distance)
    });
    table.native("ObjLaser_GetLength", 1, |call, args| read(call, args.id(0)?, 0.0, |shot| shot.laser.length));
    table.native("ObjLaser_GetRenderWidth", 1, |call, args| {
        read(call, args.id(0)?, 0.0, |shot| shot.laser.render_width)
    });
    table.native("ObjLaser_GetIntersectionWidth", 1, |call, args| {
        read(call, args.id(0)?, 0.0, |shot| shot.laser.intersection_width)
    });

    table.native("ObjStLaser_SetAngle", 2, |call, args| {
        let angle = args.radians(1)?;
        edit_straight(call, args.id(0)?, |laser| laser.angle = angle)
    });
    table.native("ObjStLaser_GetAngle", 1, |call, args| {
        ok(straight(call, args.id(0)?).map_or(0.0, |laser| crate::radians_to_degrees(laser.angle)))
    });
    table.native("ObjStLaser_SetSource", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit_straight(call, args.id(0)?, |laser| laser.source = enabled)
    });
    table.native("ObjStLaser_SetEnd", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit_straight(call, args.id(0)?, |laser| laser.end = enabled)
    });
    table.native("ObjStLaser_SetEndGraphic", 2, |call, args| {
        let graphic = args.int(1)?;
        edit_straight(call, args.id(0)?, |laser| laser.end_graphic = Some(graphic))
    });
    table.native("ObjStLaser_SetDelayScale", 3, |call, args| {
        let scale = (args.float(1)?, args.float(2)?);
        edit_straight(call, args.id(0)?, |laser| laser.delay_scale = scale)
    });
    table.native("ObjStLaser_SetPermitExpand", 2, |call, args| {
        let permit = args.boolean(1)?;
        edit_straight(call, args.id(0)?, |laser| laser.permit_expand = permit)
    });
    table.native("ObjStLaser_GetPermitExpand", 1, |call, args| {
        ok(straight(call, args.id(0)?).is_some_and(|laser| laser.permit_expand))
    });

    table.native("ObjCrLaser_SetTipDecrement", 2, |call, args| {
        let decrement = args.float(1)?.clamp(0.0, 1.0);
        if let Some((laser, _)) = curve_mut(call, args.id(0)?) {
            laser.tip_decrement = decrement;
        }
        void()
    });
    table.native("ObjCrLaser_GetNodePointer", 2, |call, args| {
        let index = usize::try_from(args.int(1)?).ok();
        let handle = curve(call, args.id(0)?).zip(index).and_then(|(laser, index)| laser.handle_at(index));
        ok(handle.map_or(-1.0, |handle| handle as f64))
    });
    table.native("ObjCrLaser_GetNodePointerList", 1, |call, args| {
        let handles = curve(call, args.id(0)?).map(CurveLaser::handles).unwrap_or_default();
        ok(ScriptValue::real_array(handles.into_iter().map(|handle| handle as f64)))
    });
    table.native("ObjCrLaser_GetNodePosition", 2, |call, args| {
        Ok(node(call, &args)?.map_or_else(|| ScriptValue::Array(Vec::new()), |node| node.position.into()))
    });
    table.native("ObjCrLaser_GetNodeAngle", 2, |call, args| {
        ok(node(call, &args)?.map_or(0.0, |node| crate::radians_to_degrees(node.angle())))
    });
    table.native("ObjCrLaser_GetNodeColor", 2, |call, args| {
        Ok(node(call, &args)?.map_or_else(|| ScriptValue::Array(Vec::new()), |node| color_components(node.color)))
    });
    table.native("ObjCrLaser_SetNode", 6, |call, args| {
        let handle = node_handle(&args, 1)?;
        let (position, angle, color) = (Vec2::new(args.float(2)?, args.float(3)?), args.radians(4)?, opaque(args.int(5)?));
        if let (Some((laser, half_width)), Some(handle)) = (curve_mut(call, args.id(0)?), handle) {
            if let Some(node) = laser.node_mut(handle) {
                let (position, vert_offset, color) = CurveLaser::make_node(position, angle, half_width, color);
                node.position = position;
                node.vert_offset = vert_offset;
                node.color = color;
            }
        }
        void()
    });
    table.native("ObjCrLaser_SetNodePosition", 4, |call, args| {
        let handle = node_handle(&args, 1)?;
        let position = Vec2::new(args.float(2)?, args.float(3)?);
        if let (Some((laser, _)), Some(handle)) = (curve_mut(call, args.id(0)?), handle) {
            if let Some(node) = laser.node_mut(handle) {
                node.position = position;
            }
        }
        void()
    });
    table.native("ObjCrLaser_SetNodeAngle", 3, |call, args| {
        let handle = node_handle(&args, 1)?;
        let angle = args.radians(2)?;
        if let (Some((laser, half_width)), Some(handle)) = (curve_mut(call, args.id(0)?), handle) {
            if let Some(node) = laser.node_mut(handle) {
                node.vert_offset = CurveLaser::make_node(node.position, angle, half_width, node.color).1;
            }
        }
        void()
    });
    table.native("ObjCrLaser_SetNodeColor", 3, |call, args| {
        let handle = node_handle(&args, 1)?;
        let color = opaque(args.int(2)?);
        if let (Some((laser, _)), Some(handle)) = (curve_mut(call, args.id(0)?), handle) {
            if let Some(node) = laser.node_mut(handle) {
                node.color = color;
            }
        }
        void()
    });
    table.native("ObjCrLaser_AddNode", 5, |call, args| {
        let (position, angle, color) = (Vec2::new(args.float(1)?, args.float(2)?), args.radians(3)?, opaque(args.int(4)?));
        let handle = curve_mut(call, args.id(0)?).map(|(laser, half_width)| laser.push(position, angle, half_width, color));
        ok(handle.map_or(-1.0, |handle| handle as f64))
    });
}

/// Functions only shot scripts see.
pub(crate) fn register_shot_script(table: &mut FunctionTable) {
    table.native("SetShotDeleteEventEnable", 2, |call, args| {
        if let Some(mode) = ShotDeleteMode::from_event_code(args.int(0)?) {
            call.stage.shots.set_delete_event_enabled(mode, args.boolean(1)?);
        }
        void()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_colors_split_into_rgba() {
        assert_eq!(color_components(0x80ff_4020), ScriptValue::real_array([255.0, 64.0, 32.0, 128.0]));
        assert_eq!(opaque(0x12_3456), 0xff12_3456);
    }

    #[test]
    fn script_constants_select_delete_modes() {
        assert_eq!(delete_target(TYPE_CHILD), DeleteTarget::Child);
        assert_eq!(delete_mode(TYPE_ITEM), ShotDeleteMode::ToItem);
        assert_eq!(delete_mode(TYPE_IMMEDIATE), ShotDeleteMode::Immediate);
        assert_eq!(target_filter(TARGET_ENEMY), OwnerFilter::Only(OwnerType::Enemy));
    }
}
