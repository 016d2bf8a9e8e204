//! Native stage functions, grouped the way scripts use them.
//!
//! Every function follows one policy: a stale or mistyped id reads as a neutral value and
//! turns mutators into no-ops. Only structural misuse returns [`ScriptError::Fatal`].

pub mod common;
pub mod enemy;
pub mod item;
pub mod movement;
pub mod pattern;
pub mod player;
pub mod shot;

use glam::Vec2;

use super::table::FunctionTable;
use super::value::ScriptValue;
use super::{ScriptError, ScriptKind};

pub type CallResult = Result<ScriptValue, ScriptError>;

pub(crate) fn register(table: &mut FunctionTable, kind: ScriptKind) {
    common::register(table);
    movement::register(table);
    shot::register(table);
    enemy::register(table);
    item::register(table);
    pattern::register(table);
    player::register(table);
    match kind {
        ScriptKind::Stage | ScriptKind::Item => {}
        ScriptKind::Shot => shot::register_shot_script(table),
        ScriptKind::Player => player::register_player_script(table),
    }
}

pub(crate) fn void() -> CallResult {
    Ok(ScriptValue::Void)
}

pub(crate) fn ok(value: impl Into<ScriptValue>) -> CallResult {
    Ok(value.into())
}

/// `[x, y]` pairs as a script array of arrays.
pub(crate) fn point_list(points: impl IntoIterator<Item = Vec2>) -> ScriptValue {
    ScriptValue::Array(points.into_iter().map(ScriptValue::from).collect())
}

/// Angle in degrees from `from` toward `to`.
pub(crate) fn degrees_toward(from: Vec2, to: Vec2) -> f64 {
    let delta = to - from;
    crate::radians_to_degrees(delta.y.atan2(delta.x))
}
