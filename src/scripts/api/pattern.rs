//! `ObjPatternShot_*`.

use glam::Vec2;

use crate::pattern_shot::{PatternShot, PatternType, Transform};
use crate::scripts::table::{Args, FunctionTable, ScriptCall};
use crate::scripts::{ScriptError, ScriptValue};
use crate::stage::{ObjectId, ObjectType};

use super::{ok, void, CallResult};

fn edit(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut PatternShot)) -> CallResult {
    if let Some(pattern) = call.stage.patterns.get_mut(&id) {
        apply(pattern);
    }
    void()
}

/// `(act, s0, s1, s2, d0, d1, d2)` starting at `first`.
fn transform(args: &Args<'_>, first: usize) -> Result<Option<Transform>, ScriptError> {
    let act = args.int(first)?;
    let s = [args.int(first + 1)?, args.int(first + 2)?, args.int(first + 3)?];
    let d = [args.real(first + 4)?, args.real(first + 5)?, args.real(first + 6)?];
    Ok(Transform::from_script(act, s, d))
}

fn count(args: &Args<'_>, index: usize) -> Result<usize, ScriptError> {
    Ok(usize::try_from(args.int(index)?).unwrap_or(0))
}

pub(crate) fn register(table: &mut FunctionTable) {
    table.native("ObjPatternShot_Create", 0, |call, _| {
        let owner = call.owner();
        ok(call.stage.create_pattern(owner))
    });
    table.native("ObjPatternShot_Fire", 1, |call, args| {
        call.stage.fire_pattern(args.id(0)?);
        void()
    });
    table.native("ObjPatternShot_FireReturn", 1, |call, args| {
        ok(ScriptValue::id_array(call.stage.fire_pattern(args.id(0)?)))
    });
    table.native("ObjPatternShot_SetParentObject", 2, |call, args| {
        let parent = Some(args.id(1)?).filter(|id| id.is_valid());
        edit(call, args.id(0)?, |pattern| pattern.parent = parent)
    });
    table.native("ObjPatternShot_SetPatternType", 2, |call, args| {
        let Some(kind) = PatternType::from_script(args.int(1)?) else { return void() };
        edit(call, args.id(0)?, |pattern| pattern.pattern = kind)
    });
    table.native("ObjPatternShot_SetShotType", 2, |call, args| {
        let Some(ty) = ObjectType::from_script(args.int(1)?).filter(|ty| ty.is_shot()) else { return void() };
        edit(call, args.id(0)?, |pattern| pattern.shot_type = ty)
    });
    table.native("ObjPatternShot_SetInitialBlendMode", 2, |call, args| {
        let blend = args.int(1)?;
        edit(call, args.id(0)?, |pattern| pattern.blend = blend)
    });
    table.native("ObjPatternShot_SetShotCount", 3, |call, args| {
        let (way, stack) = (count(&args, 1)?, count(&args, 2)?);
        edit(call, args.id(0)?, |pattern| {
            pattern.way = way;
            pattern.stack = stack;
        })
    });
    table.native("ObjPatternShot_SetSpeed", 3, |call, args| {
        let (base, arg) = (args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |pattern| {
            pattern.speed_base = base;
            pattern.speed_arg = arg;
        })
    });
    table.native("ObjPatternShot_SetAngle", 3, |call, args| {
        let (base, arg) = (args.radians(1)?, args.radians(2)?);
        edit(call, args.id(0)?, |pattern| {
            pattern.angle_base = base;
            pattern.angle_arg = arg;
        })
    });
    table.native("ObjPatternShot_SetBasePoint", 3, |call, args| {
        let point = Vec2::new(args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |pattern| pattern.base_point = point)
    });
    table.native("ObjPatternShot_SetBasePointOffset", 3, |call, args| {
        let offset = Vec2::new(args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |pattern| pattern.offset = offset)
    });
    table.native("ObjPatternShot_SetBasePointOffsetCircle", 3, |call, args| {
        let offset = Vec2::from_angle(args.radians(1)?) * args.float(2)?;
        edit(call, args.id(0)?, |pattern| pattern.offset = offset)
    });
    table.native("ObjPatternShot_SetShootRadius", 2, |call, args| {
        let radius = args.float(1)?;
        edit(call, args.id(0)?, |pattern| pattern.radius = radius)
    });
    table.native("ObjPatternShot_SetDelay", 2, |call, args| {
        let delay = args.frames(1)?;
        edit(call, args.id(0)?, |pattern| pattern.delay = delay)
    });
    table.native("ObjPatternShot_SetDelayMotion", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |pattern| pattern.delay_motion = enabled)
    });
    table.native("ObjPatternShot_SetGraphic", 2, |call, args| {
        let graphic = args.int(1)?;
        edit(call, args.id(0)?, |pattern| pattern.graphic = graphic)
    });
    table.native("ObjPatternShot_SetLaserParameter", 3, |call, args| {
        let (width, length) = (args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |pattern| {
            pattern.laser_width = width;
            pattern.laser_length = length;
        })
    });
    table.native("ObjPatternShot_CopySettings", 2, |call, args| {
        let Some(source) = call.stage.patterns.get(&args.id(1)?).cloned() else { return void() };
        edit(call, args.id(0)?, |pattern| pattern.copy_settings(&source))
    });
    table.native("ObjPatternShot_AddTransform", 8, |call, args| {
        let Some(transform) = transform(&args, 1)? else { return void() };
        edit(call, args.id(0)?, |pattern| pattern.transforms.push(transform))
    });
    table.native("ObjPatternShot_SetTransform", 9, |call, args| {
        let slot = count(&args, 1)?;
        let Some(transform) = transform(&args, 2)? else { return void() };
        edit(call, args.id(0)?, |pattern| pattern.set_transform(slot, transform))
    });
}
