//! Stage-wide functions: replay common data, paths, the stage frame, render priorities,
//! generic object access, slow motion and object-object intersection.

use std::path::Path;

use tracing::debug;

use crate::intersection::IntersectionManager;
use crate::scripts::table::{FunctionTable, ScriptCall, OUTSIDE_REPLAY_ONLY, REPLAY_ONLY};
use crate::scripts::ScriptError;
use crate::stage::{ObjectId, StgFrame};
use crate::time::SlowTarget;

use super::{ok, void, CallResult};

fn save_common_data(call: &mut ScriptCall<'_>, area: &str) -> CallResult {
    if call.stage.in_replay {
        return Err(ScriptError::fatal(OUTSIDE_REPLAY_ONLY));
    }
    match call.stage.save_common_data_to_replay(area) {
        Ok(saved) => ok(saved),
        Err(err) => {
            debug!(target: "scripts", area, error = ?err, "common data save failed");
            ok(false)
        }
    }
}

fn load_common_data(call: &mut ScriptCall<'_>, area: &str) -> CallResult {
    if !call.stage.in_replay {
        return Err(ScriptError::fatal(REPLAY_ONLY));
    }
    match call.stage.load_common_data_from_replay(area) {
        Ok(loaded) => ok(loaded),
        Err(err) => {
            debug!(target: "scripts", area, error = ?err, "common data load failed");
            ok(false)
        }
    }
}

/// Directory of the main script with a trailing separator, or empty.
fn script_directory(path: Option<&str>) -> String {
    let Some(parent) = path.and_then(|path| Path::new(path).parent()) else { return String::new() };
    let dir = parent.to_string_lossy().replace('\\', "/");
    if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    }
}

/// True when some hitbox of `a` overlaps some hitbox of `b`. With `all`, every pair must overlap.
fn objects_intersect(call: &ScriptCall<'_>, a: ObjectId, b: ObjectId, all: bool) -> bool {
    let intersection = &call.stage.intersection;
    let (left, right) = (intersection.targets_of(a), intersection.targets_of(b));
    if left.is_empty() || right.is_empty() {
        return false;
    }
    let mut pairs = left.iter().flat_map(|ta| right.iter().map(move |tb| IntersectionManager::is_intersected(ta, tb)));
    if all {
        pairs.all(|hit| hit)
    } else {
        pairs.any(|hit| hit)
    }
}

pub(crate) fn register(table: &mut FunctionTable) {
    table.native("SaveCommonDataAreaToReplayFile", 1, |call, args| save_common_data(call, &args.string(0)?));
    table.native("LoadCommonDataAreaFromReplayFile", 1, |call, args| load_common_data(call, &args.string(0)?));
    table.native("CreateCommonDataArea", 1, |call, args| {
        call.stage.common_data.create_area(&args.string(0)?);
        void()
    });
    table.native("IsCommonDataAreaExists", 1, |call, args| ok(call.stage.common_data.area_exists(&args.string(0)?)));
    table.native("SetAreaCommonData", 3, |call, args| {
        let value = args.value(2)?.clone();
        call.stage.common_data.set(&args.string(0)?, &args.string(1)?, value);
        void()
    });
    table.native("GetAreaCommonData", 3, |call, args| {
        let stored = call.stage.common_data.get(&args.string(0)?, &args.string(1)?).cloned();
        match stored {
            Some(value) => Ok(value),
            None => Ok(args.value(2)?.clone()),
        }
    });

    table.native("GetMainStgScriptPath", 0, |call, _| {
        ok(call.stage.scripts.main_path.clone().unwrap_or_default())
    });
    table.native("GetMainStgScriptDirectory", 0, |call, _| {
        ok(script_directory(call.stage.scripts.main_path.as_deref()))
    });
    table.native("SetStgFrame", 6, |call, args| {
        let (min, max) = (args.int(4)? as i32, args.int(5)? as i32);
        call.stage.stg_frame = StgFrame {
            left: args.float(0)?,
            top: args.float(1)?,
            right: args.float(2)?,
            bottom: args.float(3)?,
            priority_min: min.min(max),
            priority_max: max.max(min),
        };
        void()
    });
    table.native("SetItemRenderPriorityI", 1, |call, args| {
        call.stage.item_priority = args.int(0)? as i32;
        void()
    });
    table.native("SetShotRenderPriorityI", 1, |call, args| {
        call.stage.shot_priority = args.int(0)? as i32;
        void()
    });
    table.native("GetStgFrameRenderPriorityMinI", 0, |call, _| ok(i64::from(call.stage.stg_frame.priority_min)));
    table.native("GetStgFrameRenderPriorityMaxI", 0, |call, _| ok(i64::from(call.stage.stg_frame.priority_max)));
    table.native("GetItemRenderPriorityI", 0, |call, _| ok(i64::from(call.stage.item_priority)));
    table.native("GetShotRenderPriorityI", 0, |call, _| ok(i64::from(call.stage.shot_priority)));
    table.native("GetPlayerRenderPriorityI", 0, |call, _| {
        let priority = call.stage.players.player().map_or(call.stage.config.render.player, |p| p.render_priority);
        ok(i64::from(priority))
    });
    table.native("GetCameraFocusPermitPriorityI", 0, |call, _| {
        ok(i64::from(call.stage.config.render.camera_focus_permit))
    });

    table.native("CloseStgScene", 0, |call, _| {
        call.stage.closed = true;
        debug!(target: "scripts", script = call.script.id, "stage scene closed");
        void()
    });
    table.native("GetReplayFps", 0, |call, _| ok(call.stage.clock.fps(SlowTarget::All)));

    table.native("Obj_Delete", 1, |call, args| {
        call.stage.delete_object(args.id(0)?);
        void()
    });
    table.native("Obj_IsDeleted", 1, |call, args| ok(call.stage.is_deleted(args.id(0)?)));
    table.native("Obj_GetType", 1, |call, args| {
        ok(call.stage.object_type(args.id(0)?).map_or(-1, |ty| ty.to_script()))
    });
    table.native("Obj_SetRenderPriorityI", 2, |call, args| {
        call.stage.set_render_priority(args.id(0)?, args.int(1)? as i32);
        void()
    });

    table.native("StartSlow", 2, |call, args| {
        let owner = call.script.kind.slow_owner();
        call.stage.clock.start_slow(owner, SlowTarget::from_script(args.int(0)?), args.int(1)?);
        void()
    });
    table.native("StopSlow", 1, |call, args| {
        let owner = call.script.kind.slow_owner();
        call.stage.clock.stop_slow(owner, SlowTarget::from_script(args.int(0)?));
        void()
    });
    table.native("IsIntersected_Obj_Obj", 2, |call, args| {
        ok(objects_intersect(call, args.id(0)?, args.id(1)?, false))
    });
    table.native("IsIntersected_Obj_Obj_All", 2, |call, args| {
        ok(objects_intersect(call, args.id(0)?, args.id(1)?, true))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_directory_keeps_a_trailing_separator() {
        assert_eq!(script_directory(Some("stages/one/main.rhai")), "stages/one/");
        assert_eq!(script_directory(Some("main.rhai")), "");
        assert_eq!(script_directory(None), "");
    }
}
