//! Named constants scripts read as zero-arity functions.

use crate::events::*;
use crate::pattern_shot::{NO_CHANGE, PATTERN_BASEPOINT_RESET, TOPLAYER_CHANGE};
use crate::stage::item::{
    ITEM_1UP, ITEM_1UP_S, ITEM_MOVE_DOWN, ITEM_MOVE_SCORE, ITEM_MOVE_TOPLAYER, ITEM_POINT, ITEM_POINT_S, ITEM_POWER,
    ITEM_POWER_S, ITEM_SPELL, ITEM_SPELL_S, ITEM_USER,
};
use crate::stage::{ObjectType, PlayerState};

use super::table::FunctionTable;
use super::ScriptKind;

pub const TYPE_ALL: i64 = 0;
pub const TYPE_SHOT: i64 = 1;
pub const TYPE_CHILD: i64 = 2;
pub const TYPE_IMMEDIATE: i64 = 3;
pub const TYPE_FADE: i64 = 4;
pub const TYPE_ITEM: i64 = 5;

pub const OWNER_PLAYER: i64 = 0;
pub const OWNER_ENEMY: i64 = 1;

pub const TARGET_ALL: i64 = 0;
pub const TARGET_ENEMY: i64 = 1;
pub const TARGET_PLAYER: i64 = 2;

pub const REBIRTH_DEFAULT: i64 = -1;
pub const ID_INVALID: i64 = -1;

pub const SCREEN_WIDTH: i64 = 640;
pub const SCREEN_HEIGHT: i64 = 480;

pub const INFO_LIFE: i64 = 0;
pub const INFO_DAMAGE_RATE_SHOT: i64 = 1;
pub const INFO_DAMAGE_RATE_SPELL: i64 = 2;
pub const INFO_SHOT_HIT_COUNT: i64 = 3;
pub const INFO_TIMER: i64 = 4;
pub const INFO_TIMERF: i64 = 5;
pub const INFO_ORGTIMERF: i64 = 6;
pub const INFO_IS_SPELL: i64 = 7;
pub const INFO_IS_LAST_SPELL: i64 = 8;
pub const INFO_IS_DURABLE_SPELL: i64 = 9;
pub const INFO_SPELL_SCORE: i64 = 10;
pub const INFO_REMAIN_STEP_COUNT: i64 = 11;
pub const INFO_ACTIVE_STEP_LIFE_COUNT: i64 = 12;
pub const INFO_ACTIVE_STEP_TOTAL_MAX_LIFE: i64 = 13;
pub const INFO_ACTIVE_STEP_TOTAL_LIFE: i64 = 14;
pub const INFO_ACTIVE_STEP_LIFE_RATE_LIST: i64 = 15;
pub const INFO_IS_LAST_STEP: i64 = 16;
pub const INFO_PLAYER_SHOOTDOWN_COUNT: i64 = 17;
pub const INFO_PLAYER_SPELL_COUNT: i64 = 18;
pub const INFO_CURRENT_LIFE: i64 = 19;
pub const INFO_CURRENT_LIFE_MAX: i64 = 20;
pub const INFO_ITEM_SCORE: i64 = 21;
pub const INFO_EXISTS: i64 = 22;
pub const INFO_PATH: i64 = 23;
pub const INFO_RECT: i64 = 24;
pub const INFO_DELAY_COLOR: i64 = 25;
pub const INFO_BLEND: i64 = 26;
pub const INFO_COLLISION: i64 = 27;
pub const INFO_COLLISION_LIST: i64 = 28;
pub const INFO_IS_FIXED_ANGLE: i64 = 29;

const INFO: [(&str, i64); 30] = [
    ("INFO_LIFE", INFO_LIFE),
    ("INFO_DAMAGE_RATE_SHOT", INFO_DAMAGE_RATE_SHOT),
    ("INFO_DAMAGE_RATE_SPELL", INFO_DAMAGE_RATE_SPELL),
    ("INFO_SHOT_HIT_COUNT", INFO_SHOT_HIT_COUNT),
    ("INFO_TIMER", INFO_TIMER),
    ("INFO_TIMERF", INFO_TIMERF),
    ("INFO_ORGTIMERF", INFO_ORGTIMERF),
    ("INFO_IS_SPELL", INFO_IS_SPELL),
    ("INFO_IS_LAST_SPELL", INFO_IS_LAST_SPELL),
    ("INFO_IS_DURABLE_SPELL", INFO_IS_DURABLE_SPELL),
    ("INFO_SPELL_SCORE", INFO_SPELL_SCORE),
    ("INFO_REMAIN_STEP_COUNT", INFO_REMAIN_STEP_COUNT),
    ("INFO_ACTIVE_STEP_LIFE_COUNT", INFO_ACTIVE_STEP_LIFE_COUNT),
    ("INFO_ACTIVE_STEP_TOTAL_MAX_LIFE", INFO_ACTIVE_STEP_TOTAL_MAX_LIFE),
    ("INFO_ACTIVE_STEP_TOTAL_LIFE", INFO_ACTIVE_STEP_TOTAL_LIFE),
    ("INFO_ACTIVE_STEP_LIFE_RATE_LIST", INFO_ACTIVE_STEP_LIFE_RATE_LIST),
    ("INFO_IS_LAST_STEP", INFO_IS_LAST_STEP),
    ("INFO_PLAYER_SHOOTDOWN_COUNT", INFO_PLAYER_SHOOTDOWN_COUNT),
    ("INFO_PLAYER_SPELL_COUNT", INFO_PLAYER_SPELL_COUNT),
    ("INFO_CURRENT_LIFE", INFO_CURRENT_LIFE),
    ("INFO_CURRENT_LIFE_MAX", INFO_CURRENT_LIFE_MAX),
    ("INFO_ITEM_SCORE", INFO_ITEM_SCORE),
    ("INFO_EXISTS", INFO_EXISTS),
    ("INFO_PATH", INFO_PATH),
    ("INFO_RECT", INFO_RECT),
    ("INFO_DELAY_COLOR", INFO_DELAY_COLOR),
    ("INFO_BLEND", INFO_BLEND),
    ("INFO_COLLISION", INFO_COLLISION),
    ("INFO_COLLISION_LIST", INFO_COLLISION_LIST),
    ("INFO_IS_FIXED_ANGLE", INFO_IS_FIXED_ANGLE),
];

const STAGE_EVENTS: [(&str, i64); 17] = [
    ("EV_REQUEST_LIFE", EV_REQUEST_LIFE),
    ("EV_REQUEST_TIMER", EV_REQUEST_TIMER),
    ("EV_REQUEST_IS_SPELL", EV_REQUEST_IS_SPELL),
    ("EV_REQUEST_IS_LAST_SPELL", EV_REQUEST_IS_LAST_SPELL),
    ("EV_REQUEST_IS_DURABLE_SPELL", EV_REQUEST_IS_DURABLE_SPELL),
    ("EV_REQUEST_REQUIRE_ALL_DOWN", EV_REQUEST_REQUIRE_ALL_DOWN),
    ("EV_REQUEST_SPELL_SCORE", EV_REQUEST_SPELL_SCORE),
    ("EV_REQUEST_REPLAY_TARGET_COMMON_AREA", EV_REQUEST_REPLAY_TARGET_COMMON_AREA),
    ("EV_TIMEOUT", EV_TIMEOUT),
    ("EV_START_BOSS_SPELL", EV_START_BOSS_SPELL),
    ("EV_END_BOSS_SPELL", EV_END_BOSS_SPELL),
    ("EV_GAIN_SPELL", EV_GAIN_SPELL),
    ("EV_START_BOSS_STEP", EV_START_BOSS_STEP),
    ("EV_END_BOSS_STEP", EV_END_BOSS_STEP),
    ("EV_PLAYER_SHOOTDOWN", EV_PLAYER_SHOOTDOWN),
    ("EV_PLAYER_SPELL", EV_PLAYER_SPELL),
    ("EV_PLAYER_REBIRTH", EV_PLAYER_REBIRTH),
];

const DELETE_SHOT_EVENTS: [(&str, i64); 3] = [
    ("EV_DELETE_SHOT_IMMEDIATE", EV_DELETE_SHOT_IMMEDIATE),
    ("EV_DELETE_SHOT_TO_ITEM", EV_DELETE_SHOT_TO_ITEM),
    ("EV_DELETE_SHOT_FADE", EV_DELETE_SHOT_FADE),
];

/// In `PatternType` script order.
const PATTERNS: [&str; 13] = [
    "PATTERN_FAN",
    "PATTERN_FAN_AIMED",
    "PATTERN_RING",
    "PATTERN_RING_AIMED",
    "PATTERN_ARROW",
    "PATTERN_ARROW_AIMED",
    "PATTERN_POLYGON",
    "PATTERN_POLYGON_AIMED",
    "PATTERN_ELLIPSE",
    "PATTERN_ELLIPSE_AIMED",
    "PATTERN_SCATTER_ANGLE",
    "PATTERN_SCATTER_SPEED",
    "PATTERN_SCATTER",
];

const TRANSFORMS: [&str; 9] = [
    "TRANSFORM_WAIT",
    "TRANSFORM_ADD_SPEED_ANGLE",
    "TRANSFORM_ANGULAR_MOVE",
    "TRANSFORM_N_DECEL_CHANGE",
    "TRANSFORM_GRAPHIC_CHANGE",
    "TRANSFORM_BLEND_CHANGE",
    "TRANSFORM_TO_SPEED_ANGLE",
    "TRANSFORM_ADDPATTERNA1",
    "TRANSFORM_ADDPATTERNA2",
];

fn object_type_name(ty: ObjectType) -> &'static str {
    match ty {
        ObjectType::Player => "OBJ_PLAYER",
        ObjectType::SpellManage => "OBJ_SPELL_MANAGE",
        ObjectType::Spell => "OBJ_SPELL",
        ObjectType::Enemy => "OBJ_ENEMY",
        ObjectType::EnemyBoss => "OBJ_ENEMY_BOSS",
        ObjectType::EnemyBossScene => "OBJ_ENEMY_BOSS_SCENE",
        ObjectType::Shot => "OBJ_SHOT",
        ObjectType::LooseLaser => "OBJ_LOOSE_LASER",
        ObjectType::StraightLaser => "OBJ_STRAIGHT_LASER",
        ObjectType::CurveLaser => "OBJ_CURVE_LASER",
        ObjectType::Item => "OBJ_ITEM",
        ObjectType::PatternShot => "OBJ_PATTERN_SHOT",
    }
}

fn ints(table: &mut FunctionTable, entries: &[(&'static str, i64)]) {
    for (name, value) in entries {
        table.constant(*name, *value as f64);
    }
}

pub(crate) fn register(table: &mut FunctionTable, kind: ScriptKind) {
    ints(
        table,
        &[
            ("TYPE_ALL", TYPE_ALL),
            ("TYPE_SHOT", TYPE_SHOT),
            ("TYPE_CHILD", TYPE_CHILD),
            ("TYPE_IMMEDIATE", TYPE_IMMEDIATE),
            ("TYPE_FADE", TYPE_FADE),
            ("TYPE_ITEM", TYPE_ITEM),
            ("OWNER_PLAYER", OWNER_PLAYER),
            ("OWNER_ENEMY", OWNER_ENEMY),
            ("TARGET_ALL", TARGET_ALL),
            ("TARGET_ENEMY", TARGET_ENEMY),
            ("TARGET_PLAYER", TARGET_PLAYER),
            ("DELAY_DEFAULT", 0),
            ("DELAY_LERP", 1),
            ("LERP_LINEAR", 0),
            ("LERP_SMOOTH", 1),
            ("LERP_SMOOTHER", 2),
            ("LERP_ACCELERATE", 3),
            ("LERP_DECELERATE", 4),
            ("STATE_NORMAL", PlayerState::Normal.to_script()),
            ("STATE_HIT", PlayerState::Hit.to_script()),
            ("STATE_DOWN", PlayerState::Down.to_script()),
            ("STATE_END", PlayerState::End.to_script()),
            ("ITEM_1UP", ITEM_1UP),
            ("ITEM_1UP_S", ITEM_1UP_S),
            ("ITEM_SPELL", ITEM_SPELL),
            ("ITEM_SPELL_S", ITEM_SPELL_S),
            ("ITEM_POWER", ITEM_POWER),
            ("ITEM_POWER_S", ITEM_POWER_S),
            ("ITEM_POINT", ITEM_POINT),
            ("ITEM_POINT_S", ITEM_POINT_S),
            ("ITEM_USER", ITEM_USER),
            ("ITEM_MOVE_DOWN", ITEM_MOVE_DOWN),
            ("ITEM_MOVE_TOPLAYER", ITEM_MOVE_TOPLAYER),
            ("ITEM_MOVE_SCORE", ITEM_MOVE_SCORE),
            ("REBIRTH_DEFAULT", REBIRTH_DEFAULT),
            ("SCREEN_WIDTH", SCREEN_WIDTH),
            ("SCREEN_HEIGHT", SCREEN_HEIGHT),
            ("ID_INVALID", ID_INVALID),
        ],
    );
    table.constant("NO_CHANGE", NO_CHANGE);
    table.constant("TOPLAYER_CHANGE", TOPLAYER_CHANGE);
    table.constant("PATTERN_BASEPOINT_RESET", f64::from(PATTERN_BASEPOINT_RESET));
    for (index, name) in PATTERNS.iter().enumerate() {
        table.constant(*name, index as f64);
    }
    for (index, name) in TRANSFORMS.iter().enumerate() {
        table.constant(*name, index as f64);
    }
    for ty in ObjectType::ALL {
        table.constant(object_type_name(ty), ty.to_script() as f64);
    }
    ints(table, &INFO);
    ints(table, &STAGE_EVENTS);

    match kind {
        ScriptKind::Stage => {}
        ScriptKind::Shot => ints(table, &DELETE_SHOT_EVENTS),
        ScriptKind::Item => {
            ints(table, &DELETE_SHOT_EVENTS);
            ints(table, &[("EV_GET_ITEM", EV_GET_ITEM), ("EV_GRAZE", EV_GRAZE)]);
        }
        ScriptKind::Player => ints(
            table,
            &[
                ("EV_REQUEST_SPELL", EV_REQUEST_SPELL),
                ("EV_GRAZE", EV_GRAZE),
                ("EV_HIT", EV_HIT),
                ("EV_DELETE_SHOT_PLAYER", EV_DELETE_SHOT_PLAYER),
            ],
        ),
    }
}
