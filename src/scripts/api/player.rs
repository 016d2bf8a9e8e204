//! Player state, `ObjPlayer_*` and `ObjCol_*`, plus the player-script-only spell functions.

use glam::Vec2;

use crate::assets::DataSlot;
use crate::geometry::{Circle, WidthLine};
use crate::movement::MoveObject;
use crate::scripts::constants::{OWNER_ENEMY, OWNER_PLAYER, REBIRTH_DEFAULT};
use crate::scripts::table::{FunctionTable, ScriptCall};
use crate::scripts::ScriptValue;
use crate::stage::player::PlayerClip;
use crate::stage::{ObjectId, ObjectType, OwnerType, PlayerObject, SpellObject};

use super::{degrees_toward, ok, void, CallResult};

fn edit(call: &mut ScriptCall<'_>, apply: impl FnOnce(&mut PlayerObject)) -> CallResult {
    if let Some(player) = call.stage.players.player_mut() {
        apply(player);
    }
    void()
}

fn read<T: Into<ScriptValue>>(call: &ScriptCall<'_>, default: T, get: impl FnOnce(&PlayerObject) -> T) -> CallResult {
    ok(call.stage.players.player().map_or(default, get))
}

fn edit_spell(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut SpellObject)) -> CallResult {
    if let Some(spell) = call.stage.players.spell_mut(id) {
        apply(spell);
    }
    void()
}

/// Ids `id` collided with last frame, narrowed by `keep`.
fn intersected(call: &ScriptCall<'_>, id: ObjectId, keep: impl Fn(ObjectId) -> bool) -> ScriptValue {
    ScriptValue::id_array(call.stage.intersection.intersected_with(id).iter().copied().filter(|other| keep(*other)))
}

pub(crate) fn register(table: &mut FunctionTable) {
    register_player_state(table);
    register_obj_player(table);
    register_obj_col(table);
}

fn register_player_state(table: &mut FunctionTable) {
    table.native("GetPlayerObjectID", 0, |call, _| ok(call.stage.players.player_id().unwrap_or(ObjectId::INVALID)));
    table.native("GetPlayerScriptID", 0, |call, _| ok(call.stage.scripts.player_script.unwrap_or(-1)));
    table.native("SetPlayerSpeed", 2, |call, args| {
        let (fast, slow) = (args.float(0)?, args.float(1)?);
        edit(call, |player| {
            player.speed_fast = fast;
            player.speed_slow = slow;
        })
    });
    table.native("SetPlayerClip", 4, |call, args| {
        let clip = PlayerClip { left: args.float(0)?, top: args.float(1)?, right: args.float(2)?, bottom: args.float(3)? };
        edit(call, |player| player.clip = clip)
    });
    table.native("SetPlayerLife", 1, |call, args| {
        let life = args.real(0)?;
        edit(call, |player| player.life = life)
    });
    table.native("SetPlayerSpell", 1, |call, args| {
        let spell = args.real(0)?;
        edit(call, |player| player.spell = spell)
    });
    table.native("SetPlayerPower", 1, |call, args| {
        let power = args.real(0)?;
        edit(call, |player| player.power = power)
    });
    table.native("SetPlayerInvincibilityFrame", 1, |call, args| {
        let frames = args.frames(0)?;
        edit(call, |player| player.invincibility = frames)
    });
    table.native("SetPlayerDownStateFrame", 1, |call, args| {
        let frames = args.frames(0)?;
        edit(call, |player| player.down_state_frames = frames)
    });
    table.native("SetPlayerRebirthFrame", 1, |call, args| {
        let frames = args.frames(0)?;
        edit(call, |player| player.rebirth_frames = frames)
    });
    table.native("SetPlayerRebirthLossFrame", 1, |call, args| {
        let frames = args.frames(0)?;
        edit(call, |player| player.rebirth_loss_frames = frames)
    });
    table.native("SetPlayerAutoItemCollectLine", 1, |call, args| {
        let line = args.float(0)?;
        edit(call, |player| player.item_collect_line = line)
    });
    table.native("SetPlayerItemScope", 1, |call, args| {
        let scope = args.float(0)?.max(0.0);
        edit(call, |player| player.item_scope = scope)
    });
    table.native("SetPlayerRebirthPosition", 2, |call, args| {
        let (x, y) = (args.real(0)?, args.real(1)?);
        let default = REBIRTH_DEFAULT as f64;
        let position = (x != default || y != default).then(|| Vec2::new(x as f32, y as f32));
        edit(call, |player| player.rebirth_position = position)
    });
    table.native("GetPlayerSpeed", 0, |call, _| {
        Ok(call.stage.players.player().map_or_else(
            || ScriptValue::real_array([0.0; 2]),
            |p| ScriptValue::real_array([p.speed_fast, p.speed_slow].map(f64::from)),
        ))
    });
    table.native("GetPlayerClip", 0, |call, _| {
        Ok(call.stage.players.player().map_or_else(
            || ScriptValue::real_array([0.0; 4]),
            |p| ScriptValue::real_array([p.clip.left, p.clip.top, p.clip.right, p.clip.bottom].map(f64::from)),
        ))
    });
    table.native("GetAngleToPlayer", 1, |call, args| {
        let from = call.stage.object_position(args.id(0)?);
        ok(from.zip(call.stage.players.position()).map_or(0.0, |(from, to)| degrees_toward(from, to)))
    });
    table.native("IsPermitPlayerShot", 0, |call, _| read(call, false, PlayerObject::permits_shot));
    table.native("IsPermitPlayerSpell", 0, |call, _| ok(call.stage.players.permits_spell()));
    table.native("IsPlayerLastSpellWait", 0, |call, _| read(call, false, PlayerObject::is_last_spell_wait));
    table.native("IsPlayerSpellActive", 0, |call, _| ok(call.stage.players.is_spell_active()));
}

fn register_obj_player(table: &mut FunctionTable) {
    table.native("ObjPlayer_AddIntersectionCircleA1", 5, |call, args| {
        let (offset, hit, graze) = (Vec2::new(args.float(1)?, args.float(2)?), args.float(3)?, args.float(4)?);
        let id = args.id(0)?;
        let stage = &mut *call.stage;
        if let Some(player) = stage.players.player_mut().filter(|player| player.id == id) {
            player.add_hit_circle(&mut stage.intersection, offset, hit, graze);
        }
        void()
    });
    table.native("ObjPlayer_AddIntersectionCircleA2", 4, |call, args| {
        let (offset, radius) = (Vec2::new(args.float(1)?, args.float(2)?), args.float(3)?);
        let id = args.id(0)?;
        let stage = &mut *call.stage;
        if let Some(player) = stage.players.player_mut().filter(|player| player.id == id) {
            player.add_graze_circle(&mut stage.intersection, offset, radius);
        }
        void()
    });
    table.native("ObjPlayer_ClearIntersection", 1, |call, args| {
        let id = args.id(0)?;
        let stage = &mut *call.stage;
        if let Some(player) = stage.players.player_mut().filter(|player| player.id == id) {
            player.clear_hitboxes(&mut stage.intersection);
        }
        void()
    });
}

fn register_obj_col(table: &mut FunctionTable) {
    table.native("ObjCol_IsIntersected", 1, |call, args| {
        ok(!call.stage.intersection.intersected_with(args.id(0)?).is_empty())
    });
    table.native("ObjCol_GetListOfIntersectedEnemyID", 1, |call, args| {
        let stage = &*call.stage;
        Ok(intersected(call, args.id(0)?, |other| {
            matches!(stage.object_type(other), Some(ObjectType::Enemy | ObjectType::EnemyBoss))
        }))
    });
    table.native("ObjCol_GetListOfIntersectedShotID", 2, |call, args| {
        let owner = match args.int(1)? {
            raw @ (OWNER_PLAYER | OWNER_ENEMY) => Some(OwnerType::from_script(raw)),
            _ => None,
        };
        let shots = &call.stage.shots;
        Ok(intersected(call, args.id(0)?, |other| {
            shots.get(other).is_some_and(|shot| owner.map_or(true, |owner| shot.owner == owner))
        }))
    });
    table.native("ObjCol_GetIntersectedCount", 1, |call, args| {
        ok(call.stage.intersection.intersected_with(args.id(0)?).len())
    });
}

/// Functions only player scripts see.
pub(crate) fn register_player_script(table: &mut FunctionTable) {
    table.native("CreatePlayerShotA1", 7, |call, args| {
        let motion = MoveObject::with_angle(Vec2::new(args.float(0)?, args.float(1)?), args.float(2)?, args.radians(3)?);
        let (damage, penetration) = (args.real(4)?, args.real(5)?);
        let id = call.stage.spawn_shot(ObjectType::Shot, OwnerType::Player, motion, args.int(6)?, 0);
        if let Some(shot) = id.and_then(|id| call.stage.shots.get_mut(id)) {
            shot.damage = damage;
            shot.life = penetration;
        }
        ok(id.unwrap_or(ObjectId::INVALID))
    });
    table.native("CallSpell", 0, |call, _| {
        call.stage.call_spell();
        void()
    });
    table.native("LoadPlayerShotData", 1, |call, args| {
        ok(call.stage.load_data(DataSlot::PlayerShot, &args.string(0)?, false))
    });
    table.native("ReloadPlayerShotData", 1, |call, args| {
        ok(call.stage.load_data(DataSlot::PlayerShot, &args.string(0)?, true))
    });
    table.native("GetSpellManageObject", 0, |call, _| {
        ok(call.stage.players.spell_manage().unwrap_or(ObjectId::INVALID))
    });
    table.native("KillPlayer", 0, |call, _| {
        call.stage.kill_player();
        void()
    });

    table.native("ObjSpell_Create", 0, |call, _| {
        call.require_main_thread()?;
        ok(call.stage.create_spell())
    });
    table.native("ObjSpell_Regist", 1, |call, args| {
        call.stage.players.activate_spell(args.id(0)?);
        void()
    });
    table.native("ObjSpell_SetDamage", 2, |call, args| {
        let damage = args.real(1)?;
        edit_spell(call, args.id(0)?, |spell| spell.damage = damage)
    });
    table.native("ObjSpell_SetPenetration", 2, |call, args| {
        let penetration = args.real(1)?;
        edit_spell(call, args.id(0)?, |spell| spell.penetration = penetration)
    });
    table.native("ObjSpell_SetEraseShot", 2, |call, args| {
        let erase = args.boolean(1)?;
        edit_spell(call, args.id(0)?, |spell| spell.erase_shot = erase)
    });
    table.native("ObjSpell_SetIntersectionCircle", 4, |call, args| {
        let circle = Circle::new(args.float(1)?, args.float(2)?, args.float(3)?);
        let stage = &mut *call.stage;
        if let Some(spell) = stage.players.spell(args.id(0)?) {
            spell.add_circle(&mut stage.intersection, circle);
        }
        void()
    });
    table.native("ObjSpell_SetIntersectionLine", 6, |call, args| {
        let line = WidthLine::new(args.float(1)?, args.float(2)?, args.float(3)?, args.float(4)?, args.float(5)?);
        let stage = &mut *call.stage;
        if let Some(spell) = stage.players.spell(args.id(0)?) {
            spell.add_line(&mut stage.intersection, line);
        }
        void()
    });
}
