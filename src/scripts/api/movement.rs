//! `ObjMove_*`: position, velocity and scheduled pattern changes of any movable object.

use glam::Vec2;

use crate::movement::{AngleSpec, ArrivalPolicy, MoveObject, PatternOp};
use crate::pattern_shot::NO_CHANGE;
use crate::scripts::table::{Args, FunctionTable, ScriptCall};
use crate::scripts::ScriptError;
use crate::stage::ObjectId;

use super::{ok, void, CallResult};

fn edit(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut MoveObject)) -> CallResult {
    if let Some(motion) = call.stage.move_object_mut(id) {
        apply(motion);
    }
    void()
}

fn read(call: &ScriptCall<'_>, id: ObjectId, get: impl FnOnce(&MoveObject) -> f32) -> CallResult {
    ok(call.stage.move_object(id).map_or(0.0, get))
}

/// `Some(value)` unless the script passed `NO_CHANGE`.
fn changed(args: &Args<'_>, index: usize) -> Result<Option<f64>, ScriptError> {
    let value = args.real(index)?;
    Ok((value != NO_CHANGE).then_some(value))
}

fn schedule(call: &mut ScriptCall<'_>, id: ObjectId, frame: u32, ops: Vec<PatternOp>) -> CallResult {
    edit(call, id, |motion| motion.pattern.schedule(frame, ops))
}

/// Speed and angle part shared by the `AddPatternA*` family: `(frame, speed, angle)` at 1..=3.
fn angle_ops(args: &Args<'_>, relative_to: Option<ObjectId>) -> Result<Vec<PatternOp>, ScriptError> {
    let mut ops = vec![PatternOp::ToAngle];
    if let Some(speed) = changed(args, 2)? {
        ops.push(PatternOp::Speed(speed as f32));
    }
    let angle = changed(args, 3)?.map(crate::degrees_to_radians);
    match (relative_to, angle) {
        (Some(target), angle) => ops.push(PatternOp::Angle(AngleSpec::TowardObject(target, angle.unwrap_or(0.0)))),
        (None, Some(angle)) => ops.push(PatternOp::Angle(AngleSpec::Radians(angle))),
        (None, None) => {}
    }
    Ok(ops)
}

/// Acceleration, angular velocity (degrees) and max speed at 4..=6.
fn angle_dynamics(args: &Args<'_>, ops: &mut Vec<PatternOp>) -> Result<(), ScriptError> {
    ops.push(PatternOp::Acceleration(args.float(4)?));
    ops.push(PatternOp::AngularVelocity(args.radians(5)?));
    ops.push(PatternOp::MaxSpeed(args.float(6)?));
    Ok(())
}

fn xy_ops(args: &Args<'_>) -> Result<Vec<PatternOp>, ScriptError> {
    let mut ops = vec![PatternOp::ToXy];
    if let Some(speed_x) = changed(args, 2)? {
        ops.push(PatternOp::SpeedX(speed_x as f32));
    }
    if let Some(speed_y) = changed(args, 3)? {
        ops.push(PatternOp::SpeedY(speed_y as f32));
    }
    Ok(ops)
}

fn xy_dynamics(args: &Args<'_>, ops: &mut Vec<PatternOp>) -> Result<(), ScriptError> {
    ops.push(PatternOp::AccelX(args.float(4)?));
    ops.push(PatternOp::AccelY(args.float(5)?));
    ops.push(PatternOp::MaxSpeedX(args.float(6)?));
    ops.push(PatternOp::MaxSpeedY(args.float(7)?));
    Ok(())
}

fn graphic(args: &Args<'_>, index: usize, ops: &mut Vec<PatternOp>) -> Result<(), ScriptError> {
    if let Some(graphic) = changed(args, index)? {
        ops.push(PatternOp::Graphic(graphic as i64));
    }
    Ok(())
}

pub(crate) fn register(table: &mut FunctionTable) {
    table.native("ObjMove_SetX", 2, |call, args| {
        let x = args.float(1)?;
        edit(call, args.id(0)?, |m| m.position.x = x)
    });
    table.native("ObjMove_SetY", 2, |call, args| {
        let y = args.float(1)?;
        edit(call, args.id(0)?, |m| m.position.y = y)
    });
    table.native("ObjMove_SetPosition", 3, |call, args| {
        let position = Vec2::new(args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |m| m.position = position)
    });
    table.native("ObjMove_SetSpeed", 2, |call, args| {
        let speed = args.float(1)?;
        edit(call, args.id(0)?, |m| m.set_speed(speed))
    });
    table.native("ObjMove_SetAngle", 2, |call, args| {
        let angle = args.radians(1)?;
        edit(call, args.id(0)?, |m| m.set_angle(angle))
    });
    table.native("ObjMove_SetAcceleration", 2, |call, args| {
        let accel = args.float(1)?;
        edit(call, args.id(0)?, |m| m.set_acceleration(accel))
    });
    table.native("ObjMove_SetMaxSpeed", 2, |call, args| {
        let max = args.float(1)?;
        edit(call, args.id(0)?, |m| m.set_max_speed(max))
    });
    table.native("ObjMove_SetAngularVelocity", 2, |call, args| {
        let omega = args.radians(1)?;
        edit(call, args.id(0)?, |m| m.set_angular_velocity(omega))
    });

    table.native("ObjMove_SetDestAtSpeed", 4, |call, args| {
        let target = Vec2::new(args.float(1)?, args.float(2)?);
        let policy = ArrivalPolicy::Speed(args.float(3)?);
        edit(call, args.id(0)?, |m| m.set_destination(target, policy))
    });
    table.native("ObjMove_SetDestAtFrame", 4, |call, args| {
        let target = Vec2::new(args.float(1)?, args.float(2)?);
        let policy = ArrivalPolicy::Frames(args.frames(3)?);
        edit(call, args.id(0)?, |m| m.set_destination(target, policy))
    });
    table.native("ObjMove_SetDestAtWeight", 5, |call, args| {
        let target = Vec2::new(args.float(1)?, args.float(2)?);
        let epsilon = call.stage.config.intersection.weighted_arrival_epsilon;
        let policy = ArrivalPolicy::Weight { weight: args.float(3)?, max_speed: args.float(4)?, epsilon };
        edit(call, args.id(0)?, |m| m.set_destination(target, policy))
    });

    table.native("ObjMove_AddPatternA1", 4, |call, args| {
        let mut ops = angle_ops(&args, None)?;
        ops.insert(1, PatternOp::Zero);
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });
    table.native("ObjMove_AddPatternA2", 7, |call, args| {
        let mut ops = angle_ops(&args, None)?;
        angle_dynamics(&args, &mut ops)?;
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });
    table.native("ObjMove_AddPatternA3", 8, |call, args| {
        let mut ops = angle_ops(&args, None)?;
        angle_dynamics(&args, &mut ops)?;
        graphic(&args, 7, &mut ops)?;
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });
    table.native("ObjMove_AddPatternA4", 9, |call, args| {
        let relative = changed(&args, 7)?.map(ObjectId::from_script).filter(|id| id.is_valid());
        let mut ops = angle_ops(&args, relative)?;
        angle_dynamics(&args, &mut ops)?;
        graphic(&args, 8, &mut ops)?;
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });
    table.native("ObjMove_AddPatternB1", 4, |call, args| {
        let mut ops = xy_ops(&args)?;
        ops.insert(1, PatternOp::Zero);
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });
    table.native("ObjMove_AddPatternB2", 8, |call, args| {
        let mut ops = xy_ops(&args)?;
        xy_dynamics(&args, &mut ops)?;
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });
    table.native("ObjMove_AddPatternB3", 9, |call, args| {
        let mut ops = xy_ops(&args)?;
        xy_dynamics(&args, &mut ops)?;
        graphic(&args, 8, &mut ops)?;
        schedule(call, args.id(0)?, args.frames(1)?, ops)
    });

    table.native("ObjMove_GetX", 1, |call, args| read(call, args.id(0)?, |m| m.position.x));
    table.native("ObjMove_GetY", 1, |call, args| read(call, args.id(0)?, |m| m.position.y));
    table.native("ObjMove_GetSpeed", 1, |call, args| read(call, args.id(0)?, MoveObject::speed));
    table.native("ObjMove_GetAngle", 1, |call, args| {
        ok(call.stage.move_object(args.id(0)?).map_or(0.0, |m| crate::radians_to_degrees(m.angle())))
    });
    table.native("ObjMove_SetSpeedX", 2, |call, args| {
        let speed_x = args.float(1)?;
        edit(call, args.id(0)?, |m| m.set_speed_x(speed_x))
    });
    table.native("ObjMove_GetSpeedX", 1, |call, args| read(call, args.id(0)?, MoveObject::speed_x));
    table.native("ObjMove_SetSpeedY", 2, |call, args| {
        let speed_y = args.float(1)?;
        edit(call, args.id(0)?, |m| m.set_speed_y(speed_y))
    });
    table.native("ObjMove_GetSpeedY", 1, |call, args| read(call, args.id(0)?, MoveObject::speed_y));
    table.native("ObjMove_SetSpeedXY", 3, |call, args| {
        let (speed_x, speed_y) = (args.float(1)?, args.float(2)?);
        edit(call, args.id(0)?, |m| m.set_speed_xy(speed_x, speed_y))
    });
    table.native("ObjMove_SetProcessMovement", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |m| m.process_movement = enabled)
    });
    table.native("ObjMove_GetProcessMovement", 1, |call, args| {
        ok(call.stage.move_object(args.id(0)?).map_or(true, |m| m.process_movement))
    });
}
