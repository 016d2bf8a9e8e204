//! Item creation, bulk collection and `ObjItem_*`.

use glam::Vec2;

use crate::assets::DataSlot;
use crate::geometry::Circle;
use crate::scripts::table::{FunctionTable, ScriptCall, ITEM_SCRIPT_RUNNING};
use crate::scripts::ScriptError;
use crate::stage::item::{move_kind_from_script, CollectRequest, ITEM_SCORE, ITEM_USER};
use crate::stage::{ItemObject, ObjectId};

use super::{ok, void, CallResult};

/// Vertical distance an `A1` item rises before it starts falling.
const ITEM_RISE: f32 = 128.0;

fn edit(call: &mut ScriptCall<'_>, id: ObjectId, apply: impl FnOnce(&mut ItemObject)) -> CallResult {
    if let Some(item) = call.stage.items.get_mut(id) {
        apply(item);
    }
    void()
}

/// Spawns a data-driven item whose graphic is the item data id.
fn spawn_user_item(call: &mut ScriptCall<'_>, data_id: i64, position: Vec2, target: Vec2, score: i64) -> CallResult {
    let id = call.stage.spawn_item(ITEM_USER, position, target, score);
    if let Some(item) = id.and_then(|id| call.stage.items.get_mut(id)) {
        item.graphic = data_id;
    }
    ok(id.unwrap_or(ObjectId::INVALID))
}

pub(crate) fn register(table: &mut FunctionTable) {
    table.native("CreateItemA1", 4, |call, args| {
        let position = Vec2::new(args.float(1)?, args.float(2)?);
        let id = call.stage.spawn_item(args.int(0)?, position, position - Vec2::new(0.0, ITEM_RISE), args.int(3)?);
        ok(id.unwrap_or(ObjectId::INVALID))
    });
    table.native("CreateItemA2", 6, |call, args| {
        let position = Vec2::new(args.float(1)?, args.float(2)?);
        let target = Vec2::new(args.float(3)?, args.float(4)?);
        let id = call.stage.spawn_item(args.int(0)?, position, target, args.int(5)?);
        ok(id.unwrap_or(ObjectId::INVALID))
    });
    table.native("CreateItemU1", 4, |call, args| {
        let position = Vec2::new(args.float(1)?, args.float(2)?);
        spawn_user_item(call, args.int(0)?, position, position - Vec2::new(0.0, ITEM_RISE), args.int(3)?)
    });
    table.native("CreateItemU2", 6, |call, args| {
        let position = Vec2::new(args.float(1)?, args.float(2)?);
        let target = Vec2::new(args.float(3)?, args.float(4)?);
        spawn_user_item(call, args.int(0)?, position, target, args.int(5)?)
    });
    table.native("CreateItemScore", 3, |call, args| {
        let position = Vec2::new(args.float(1)?, args.float(2)?);
        let id = call.stage.spawn_item(ITEM_SCORE, position, position, args.int(0)?);
        ok(id.unwrap_or(ObjectId::INVALID))
    });

    table.native("CollectAllItems", 0, |call, _| {
        call.stage.items.request(CollectRequest::All);
        void()
    });
    table.native("CollectItemsByType", 1, |call, args| {
        call.stage.items.request(CollectRequest::ByType(args.int(0)?));
        void()
    });
    table.native("CollectItemsInCircle", 3, |call, args| {
        let region = Circle::new(args.float(0)?, args.float(1)?, args.float(2)?);
        call.stage.items.request(CollectRequest::InCircle(region));
        void()
    });
    table.native("CancelCollectItems", 0, |call, _| {
        call.stage.items.cancel_collection();
        void()
    });

    table.native("StartItemScript", 1, |call, args| {
        if call.stage.start_item_script(&args.string(0)?) {
            void()
        } else {
            Err(ScriptError::fatal(ITEM_SCRIPT_RUNNING))
        }
    });
    table.native("SetDefaultBonusItemEnable", 1, |call, args| {
        call.stage.items.default_bonus = args.boolean(0)?;
        void()
    });
    table.native("LoadItemData", 1, |call, args| ok(call.stage.load_data(DataSlot::Item, &args.string(0)?, false)));
    table.native("ReloadItemData", 1, |call, args| ok(call.stage.load_data(DataSlot::Item, &args.string(0)?, true)));
    table.native("SetItemIntersectionRadius", 1, |call, args| {
        call.stage.items.intersection_radius = args.float(0)?.max(0.0);
        void()
    });

    table.native("ObjItem_Create", 1, |call, args| {
        call.require_main_thread()?;
        ok(call.stage.create_item(args.int(0)?).unwrap_or(ObjectId::INVALID))
    });
    table.native("ObjItem_Regist", 1, |call, args| {
        call.stage.regist_item(args.id(0)?);
        void()
    });
    table.native("ObjItem_SetItemID", 2, |call, args| {
        let data_id = args.int(1)?;
        edit(call, args.id(0)?, |item| item.graphic = data_id)
    });
    table.native("ObjItem_SetRenderScoreEnable", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |item| item.render_score = enabled)
    });
    table.native("ObjItem_SetAutoCollectEnable", 2, |call, args| {
        let enabled = args.boolean(1)?;
        edit(call, args.id(0)?, |item| item.auto_collect = enabled)
    });
    table.native("ObjItem_SetDefinedMovePatternA1", 2, |call, args| {
        let Some(kind) = move_kind_from_script(args.int(1)?) else { return void() };
        let speed = call.stage.items.collect_speed;
        edit(call, args.id(0)?, |item| {
            let target = item.position();
            item.set_move(kind, target, speed);
        })
    });
}
