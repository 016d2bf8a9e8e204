//! Enemy queries, `ObjEnemy_*` and `ObjEnemyBossScene_*`.

use glam::Vec2;
use tracing::debug;

use crate::events::StageEvent;
use crate::geometry::Circle;
use crate::intersection::nearest_points;
use crate::scripts::constants::*;
use crate::scripts::table::{FunctionTable, ScriptCall, NO_BOSS_SCENE};
use crate::scripts::{ScriptError, ScriptValue};
use crate::stage::{BossScene, EnemyObject, ObjectId, ObjectType};

use super::{ok, point_list, void, CallResult};

fn edit(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut EnemyObject)) -> CallResult {
    if let Some(enemy) = call.stage.enemies.get_mut(id) {
        apply(enemy);
    }
    void()
}

/// Fetchable hitbox positions owned by `id`, in registration order.
fn enemy_points(call: &ScriptCall<'_>, id: ObjectId) -> Vec<Vec2> {
    call.stage
        .intersection
        .enemy_target_points()
        .into_iter()
        .filter(|point| point.owner == Some(id))
        .map(|point| point.position)
        .collect()
}

fn circle_list(circles: Vec<[f32; 3]>) -> ScriptValue {
    ScriptValue::Array(circles.into_iter().map(|c| ScriptValue::real_array(c.map(f64::from))).collect())
}

fn enemy_info(enemy: Option<&EnemyObject>, info: i64) -> ScriptValue {
    let Some(enemy) = enemy else {
        return match info {
            INFO_LIFE | INFO_DAMAGE_RATE_SHOT | INFO_DAMAGE_RATE_SPELL | INFO_SHOT_HIT_COUNT => 0.0.into(),
            _ => ScriptValue::Void,
        };
    };
    match info {
        INFO_LIFE => enemy.life.into(),
        INFO_DAMAGE_RATE_SHOT => enemy.rate_shot.into(),
        INFO_DAMAGE_RATE_SPELL => enemy.rate_spell.into(),
        INFO_SHOT_HIT_COUNT => enemy.hit_count.into(),
        _ => ScriptValue::Void,
    }
}

fn scene_info(call: &ScriptCall<'_>, scene: Option<&BossScene>, info: i64) -> ScriptValue {
    let Some(scene) = scene else {
        return match info {
            INFO_IS_SPELL | INFO_IS_LAST_SPELL | INFO_IS_DURABLE_SPELL | INFO_IS_LAST_STEP => false.into(),
            INFO_ACTIVE_STEP_LIFE_RATE_LIST => ScriptValue::Array(Vec::new()),
            INFO_TIMER..=INFO_CURRENT_LIFE_MAX => 0.0.into(),
            _ => ScriptValue::Void,
        };
    };
    let enemies = &call.stage.enemies;
    let data = scene.active_data();
    let description = data.and_then(|data| data.description.as_ref());
    match info {
        INFO_IS_SPELL => description.is_some_and(|d| d.spell).into(),
        INFO_IS_LAST_SPELL => description.is_some_and(|d| d.last_spell).into(),
        INFO_IS_DURABLE_SPELL => description.is_some_and(|d| d.durable_spell).into(),
        INFO_TIMER => data.map_or(0, |_| scene.timer_seconds()).into(),
        INFO_TIMERF => data.map_or(0, |data| data.timer).into(),
        INFO_ORGTIMERF => data.map_or(0, |data| data.original_timer).into(),
        INFO_SPELL_SCORE => description.map_or(0, |d| d.spell_score).into(),
        INFO_REMAIN_STEP_COUNT => scene.remain_step_count().into(),
        INFO_ACTIVE_STEP_LIFE_COUNT => scene.active_step_life_count().into(),
        INFO_ACTIVE_STEP_TOTAL_MAX_LIFE => scene.active_step_total_max_life().into(),
        INFO_ACTIVE_STEP_TOTAL_LIFE => scene.active_step_total_life(enemies).into(),
        INFO_ACTIVE_STEP_LIFE_RATE_LIST => ScriptValue::real_array(scene.active_step_life_rates(enemies)),
        INFO_IS_LAST_STEP => scene.is_last_step().into(),
        INFO_PLAYER_SHOOTDOWN_COUNT => data.map_or(0, |data| data.shootdown_count).into(),
        INFO_PLAYER_SPELL_COUNT => data.map_or(0, |data| data.spell_count).into(),
        INFO_CURRENT_LIFE => data.map_or(0.0, |data| data.current_life(enemies)).into(),
        INFO_CURRENT_LIFE_MAX => data.map_or(0.0, |data| data.max_life()).into(),
        _ => ScriptValue::Void,
    }
}

/// Flips the active data of `scene` into or out of a spell and tells every script.
fn set_spell(call: &mut ScriptCall<'_>, scene: ObjectId, spell: bool) -> CallResult {
    let changed = call.stage.bosses.get_mut(scene).is_some_and(|boss| boss.set_spell_card(spell));
    if changed {
        let event = if spell { StageEvent::StartBossSpell { scene } } else { StageEvent::EndBossSpell { scene } };
        call.stage.events.push(event);
    }
    void()
}

pub(crate) fn register(table: &mut FunctionTable) {
    register_queries(table);
    register_obj_enemy(table);
    register_boss_scene(table);
}

fn register_queries(table: &mut FunctionTable) {
    table.native("GetEnemyBossSceneObjectID", 0, |call, _| {
        ok(call.stage.bosses.active_id().unwrap_or(ObjectId::INVALID))
    });
    table.native("GetEnemyBossObjectID", 0, |call, _| {
        let enemies = &call.stage.enemies;
        let ids = call
            .stage
            .bosses
            .active()
            .and_then(BossScene::active_data)
            .map(|data| data.enemies.iter().copied().filter(|id| enemies.get(*id).is_some()).collect::<Vec<_>>())
            .unwrap_or_default();
        ok(ScriptValue::id_array(ids))
    });
    table.native("GetAllEnemyID", 0, |call, _| ok(ScriptValue::id_array(call.stage.enemies.live_ids())));
    table.native("GetIntersectionRegistedEnemyID", 0, |call, _| {
        ok(ScriptValue::id_array(call.stage.intersection.registered_enemy_ids()))
    });
    table.native("GetAllEnemyIntersectionPosition", 0, |call, _| {
        ok(point_list(call.stage.intersection.enemy_target_points().into_iter().map(|point| point.position)))
    });
    table.native("GetEnemyIntersectionPosition", 3, |call, args| {
        let center = Vec2::new(args.float(0)?, args.float(1)?);
        let count = usize::try_from(args.int(2)?).unwrap_or(0);
        ok(point_list(call.stage.intersection.nearest_enemy_points(center, count)))
    });
    table.native("GetEnemyIntersectionPositionByIdA1", 1, |call, args| ok(point_list(enemy_points(call, args.id(0)?))));
    table.native("GetEnemyIntersectionPositionByIdA2", 3, |call, args| {
        let center = Vec2::new(args.float(1)?, args.float(2)?);
        let points = enemy_points(call, args.id(0)?);
        ok(point_list(nearest_points(points, center, usize::MAX)))
    });
}

fn register_obj_enemy(table: &mut FunctionTable) {
    table.native("ObjEnemy_Create", 1, |call, args| {
        let id = match ObjectType::from_script(args.int(0)?) {
            Some(ObjectType::Enemy) => call.stage.create_enemy(),
            Some(ObjectType::EnemyBoss) => match call.stage.next_boss_enemy() {
                Some(id) => id,
                None => return Err(ScriptError::fatal(NO_BOSS_SCENE)),
            },
            _ => ObjectId::INVALID,
        };
        ok(id)
    });
    table.native("ObjEnemy_Regist", 1, |call, args| {
        call.stage.regist_enemy(args.id(0)?);
        void()
    });
    table.native("ObjEnemy_GetInfo", 2, |call, args| {
        Ok(enemy_info(call.stage.enemies.get(args.id(0)?), args.int(1)?))
    });
    table.native("ObjEnemy_SetLife", 2, |call, args| {
        let life = args.real(1)?.max(0.0);
        edit(call, args.id(0)?, |enemy| enemy.life = life)
    });
    table.native("ObjEnemy_AddLife", 2, |call, args| {
        let delta = args.real(1)?;
        edit(call, args.id(0)?, |enemy| enemy.life = (enemy.life + delta).max(0.0))
    });
    table.native("ObjEnemy_SetDamageRate", 3, |call, args| {
        let (shot, spell) = (args.real(1)?, args.real(2)?);
        edit(call, args.id(0)?, |enemy| {
            enemy.rate_shot = shot;
            enemy.rate_spell = spell;
        })
    });
    table.native("ObjEnemy_AddIntersectionCircleA", 4, |call, args| {
        let (offset, radius) = (Vec2::new(args.float(1)?, args.float(2)?), args.float(3)?);
        let stage = &mut *call.stage;
        if let Some(enemy) = stage.enemies.get_mut(args.id(0)?) {
            enemy.add_relative_hitbox(&mut stage.intersection, offset, radius);
        }
        void()
    });
    table.native("ObjEnemy_SetIntersectionCircleToShot", 4, |call, args| {
        let circle = Circle::new(args.float(1)?, args.float(2)?, args.float(3)?);
        let stage = &mut *call.stage;
        if let Some(enemy) = stage.enemies.get_mut(args.id(0)?) {
            enemy.add_frame_circle(&mut stage.intersection, circle, false);
        }
        void()
    });
    table.native("ObjEnemy_SetIntersectionCircleToPlayer", 4, |call, args| {
        let circle = Circle::new(args.float(1)?, args.float(2)?, args.float(3)?);
        let stage = &mut *call.stage;
        if let Some(enemy) = stage.enemies.get_mut(args.id(0)?) {
            enemy.add_frame_circle(&mut stage.intersection, circle, true);
        }
        void()
    });
    table.native("ObjEnemy_GetIntersectionCircleListToShot", 1, |call, args| {
        let circles = call.stage.enemies.get(args.id(0)?).map(|e| e.circles(&call.stage.intersection, false));
        ok(circle_list(circles.unwrap_or_default()))
    });
    table.native("ObjEnemy_GetIntersectionCircleListToPlayer", 1, |call, args| {
        let circles = call.stage.enemies.get(args.id(0)?).map(|e| e.circles(&call.stage.intersection, true));
        ok(circle_list(circles.unwrap_or_default()))
    });
    table.native("ObjEnemy_SetEnableIntersectionPositionFetching", 2, |call, args| {
        let enabled = args.boolean(1)?;
        let stage = &mut *call.stage;
        if let Some(enemy) = stage.enemies.get_mut(args.id(0)?) {
            enemy.set_fetch_position(&mut stage.intersection, enabled);
        }
        void()
    });
}

fn register_boss_scene(table: &mut FunctionTable) {
    table.native("ObjEnemyBossScene_Create", 0, |call, _| {
        call.require_main_thread()?;
        ok(call.stage.create_boss_scene())
    });
    table.native("ObjEnemyBossScene_Regist", 1, |call, args| {
        call.stage.regist_boss_scene(args.id(0)?);
        void()
    });
    table.native("ObjEnemyBossScene_Add", 3, |call, args| {
        let (step, path) = (usize::try_from(args.int(1)?).unwrap_or(0), args.string(2)?);
        if let Some(scene) = call.stage.bosses.get_mut(args.id(0)?) {
            scene.add(step, &path);
        }
        void()
    });
    table.native("ObjEnemyBossScene_LoadInThread", 1, |call, args| {
        let id = args.id(0)?;
        if let Some(scene) = call.stage.bosses.get_mut(id) {
            scene.loaded = true;
            debug!(target: "scripts", scene = %id, steps = scene.step_count(), "boss scene marked loaded");
        }
        void()
    });
    table.native("ObjEnemyBossScene_GetInfo", 2, |call, args| {
        let scene = call.stage.bosses.get(args.id(0)?);
        Ok(scene_info(call, scene, args.int(1)?))
    });
    table.native("ObjEnemyBossScene_SetSpellTimer", 2, |call, args| {
        let seconds = args.real(1)?;
        if let Some(scene) = call.stage.bosses.get_mut(args.id(0)?) {
            scene.set_spell_timer(seconds);
        }
        void()
    });
    table.native("ObjEnemyBossScene_StartSpell", 1, |call, args| set_spell(call, args.id(0)?, true));
    table.native("ObjEnemyBossScene_EndSpell", 1, |call, args| set_spell(call, args.id(0)?, false));
}
