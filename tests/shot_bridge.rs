use kestrel_stage::config::StageConfig;
use kestrel_stage::events::{ShotDeleteMode, StageEvent, EV_DELETE_SHOT_TO_ITEM};
use kestrel_stage::scripts::constants::{TARGET_ALL, TARGET_ENEMY, TYPE_ALL, TYPE_IMMEDIATE, TYPE_ITEM, TYPE_SHOT};
use kestrel_stage::scripts::{FunctionTable, ScriptCall, ScriptError, ScriptInstance, ScriptKind, ScriptValue};
use kestrel_stage::stage::{ObjectId, StageContext};

const EPSILON: f64 = 1e-4;

fn assert_near(actual: f64, expected: f64) {
    assert!((actual - expected).abs() <= EPSILON, "expected {expected}, got {actual}");
}

struct Bench {
    stage: StageContext,
    script: ScriptInstance,
    table: FunctionTable,
}

impl Bench {
    fn new(kind: ScriptKind, config: StageConfig) -> Self {
        Self {
            stage: StageContext::new(config),
            script: ScriptInstance::new(1, kind, "bench.txt"),
            table: FunctionTable::for_kind(kind),
        }
    }

    fn stage_script() -> Self {
        let mut config = StageConfig::default();
        config.seed = Some(11);
        Self::new(ScriptKind::Stage, config)
    }

    fn try_call(&mut self, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        let mut call = ScriptCall::new(&mut self.stage, &self.script);
        self.table.call(&mut call, name, args)
    }

    fn call(&mut self, name: &str, args: &[ScriptValue]) -> ScriptValue {
        self.try_call(name, args).expect(name)
    }

    fn shot_a1(&mut self, x: f64, y: f64) -> ObjectId {
        self.call("CreateShotA1", &[x.into(), y.into(), 2.0.into(), 90.0.into(), 1.0.into(), 0.0.into()]).as_id()
    }
}

#[test]
fn shot_cap_hands_out_invalid_ids() {
    let mut config = StageConfig::default();
    config.caps.shot_max = 2;
    let mut bench = Bench::new(ScriptKind::Stage, config);
    assert!(bench.shot_a1(10.0, 10.0).is_valid());
    assert!(bench.shot_a1(20.0, 10.0).is_valid());
    assert_eq!(bench.shot_a1(30.0, 10.0), ObjectId::INVALID);
    assert_near(bench.call("GetShotCount", &[(TARGET_ALL as f64).into()]).as_real(), 2.0);
}

#[test]
fn created_shots_take_the_script_angle_in_degrees() {
    let mut bench = Bench::stage_script();
    let shot = bench.shot_a1(100.0, 120.0);
    assert_near(bench.call("ObjMove_GetAngle", &[shot.into()]).as_real(), 90.0);
    assert_near(bench.call("ObjMove_GetSpeed", &[shot.into()]).as_real(), 2.0);
    assert_near(bench.call("ObjMove_GetX", &[shot.into()]).as_real(), 100.0);
}

#[test]
fn delete_all_to_item_turns_enemy_shots_into_items() {
    let mut bench = Bench::stage_script();
    for x in [40.0, 80.0, 120.0] {
        bench.shot_a1(x, 60.0);
    }
    bench.stage.shots.set_delete_event_enabled(ShotDeleteMode::ToItem, true);
    bench.call("DeleteShotAll", &[(TYPE_ALL as f64).into(), (TYPE_ITEM as f64).into()]);

    assert_near(bench.call("GetShotCount", &[(TARGET_ENEMY as f64).into()]).as_real(), 0.0);
    assert_eq!(bench.stage.items.active_count(), 3);
    let deletes = bench
        .stage
        .events
        .drain()
        .into_iter()
        .filter(|event| matches!(event, StageEvent::DeleteShot { .. }))
        .count();
    assert_eq!(deletes, 3);
}

#[test]
fn delete_in_circle_only_touches_shots_inside() {
    let mut bench = Bench::stage_script();
    let near = bench.shot_a1(100.0, 100.0);
    let far = bench.shot_a1(300.0, 300.0);
    bench.call(
        "DeleteShotInCircle",
        &[(TYPE_ALL as f64).into(), (TYPE_IMMEDIATE as f64).into(), 100.0.into(), 100.0.into(), 16.0.into()],
    );
    assert!(bench.call("Obj_IsDeleted", &[near.into()]).as_bool());
    assert!(!bench.call("Obj_IsDeleted", &[far.into()]).as_bool());
    assert!(bench.stage.events.drain().is_empty(), "delete events stay off until enabled");
}

#[test]
fn to_item_on_a_stale_id_does_nothing() {
    let mut bench = Bench::stage_script();
    let shot = bench.shot_a1(50.0, 50.0);
    bench.call("ObjShot_ToItem", &[shot.into()]);
    assert_eq!(bench.stage.items.active_count(), 1);
    bench.call("ObjShot_ToItem", &[shot.into()]);
    bench.call("ObjShot_ToItem", &[ObjectId(9999).into()]);
    assert_eq!(bench.stage.items.active_count(), 1);
}

#[test]
fn player_shots_are_player_script_only() {
    let mut stage_bench = Bench::stage_script();
    let err = stage_bench.try_call("CreatePlayerShotA1", &vec![ScriptValue::Real(0.0); 7]).unwrap_err();
    assert!(matches!(err, ScriptError::UnknownFunction(_)));

    let mut player = Bench::new(ScriptKind::Player, StageConfig::default());
    let args: Vec<ScriptValue> =
        vec![200.0.into(), 400.0.into(), 10.0.into(), (-90.0).into(), 2.5.into(), 3.0.into(), 1.0.into()];
    let shot = player.call("CreatePlayerShotA1", &args).as_id();
    assert!(shot.is_valid());
    assert_near(player.call("ObjShot_GetDamage", &[shot.into()]).as_real(), 2.5);
    assert_near(player.call("ObjShot_GetPenetration", &[shot.into()]).as_real(), 3.0);
}

#[test]
fn delete_event_switch_is_shot_script_only() {
    let mut bench = Bench::stage_script();
    let args: [ScriptValue; 2] = [(EV_DELETE_SHOT_TO_ITEM as f64).into(), true.into()];
    assert!(matches!(bench.try_call("SetShotDeleteEventEnable", &args), Err(ScriptError::UnknownFunction(_))));

    let mut shot_script = Bench::new(ScriptKind::Shot, StageConfig::default());
    shot_script.call("SetShotDeleteEventEnable", &args);
    assert!(shot_script.stage.shots.delete_event_enabled(ShotDeleteMode::ToItem));
}

#[test]
fn arity_mismatches_are_reported_not_fatal() {
    let mut bench = Bench::stage_script();
    let err = bench.try_call("DeleteShotAll", &[0.0.into()]).unwrap_err();
    assert!(matches!(err, ScriptError::Arity { expected: 2, found: 1, .. }));
    assert!(!err.is_fatal());
}

#[test]
fn delete_in_circle_by_shot_type_spares_children_and_outsiders() {
    let mut bench = Bench::stage_script();
    let parent = bench.shot_a1(300.0, 300.0);
    let near = bench.shot_a1(100.0, 100.0);
    let far = bench.shot_a1(200.0, 200.0);

    let pattern = bench.call("ObjPatternShot_Create", &[]).as_id();
    bench.call("ObjPatternShot_SetParentObject", &[pattern.into(), parent.into()]);
    bench.call("ObjPatternShot_SetShotCount", &[pattern.into(), 1.0.into(), 1.0.into()]);
    bench.call("ObjPatternShot_SetBasePoint", &[pattern.into(), 100.0.into(), 100.0.into()]);
    let fired = bench.call("ObjPatternShot_FireReturn", &[pattern.into()]);
    assert_eq!(fired.as_array().len(), 1);
    let child = fired.as_array()[0].as_id();

    bench.call(
        "DeleteShotInCircle",
        &[(TYPE_SHOT as f64).into(), (TYPE_IMMEDIATE as f64).into(), 100.0.into(), 100.0.into(), 16.0.into()],
    );
    assert!(bench.call("Obj_IsDeleted", &[near.into()]).as_bool());
    for kept in [child, far, parent] {
        assert!(!bench.call("Obj_IsDeleted", &[kept.into()]).as_bool(), "{kept} should survive");
    }
}

#[test]
fn item_cap_hands_out_invalid_ids() {
    let mut config = StageConfig::default();
    config.caps.item_max = 2;
    let mut bench = Bench::new(ScriptKind::Stage, config);
    let point = bench.call("ITEM_POINT", &[]);
    let create = |bench: &mut Bench, x: f64| {
        bench.call("CreateItemA1", &[point.clone(), x.into(), 100.0.into(), 10.0.into()]).as_id()
    };
    assert!(create(&mut bench, 40.0).is_valid());
    assert!(create(&mut bench, 80.0).is_valid());
    let before: Vec<ObjectId> = bench.stage.items.iter().map(|item| item.id).collect();

    assert_eq!(create(&mut bench, 120.0), ObjectId::INVALID);
    let after: Vec<ObjectId> = bench.stage.items.iter().map(|item| item.id).collect();
    assert_eq!(before, after);
}

#[test]
fn long_lasers_convert_into_at_most_the_item_room() {
    let mut config = StageConfig::default();
    config.caps.item_max = 5;
    let mut bench = Bench::new(ScriptKind::Stage, config);
    let args: Vec<ScriptValue> =
        vec![100.0.into(), 100.0.into(), 90.0.into(), 1e30.into(), 16.0.into(), 60.0.into(), 1.0.into(), 0.0.into()];
    let laser = bench.call("CreateStraightLaserA1", &args).as_id();
    assert!(laser.is_valid());

    bench.call("DeleteShotAll", &[(TYPE_ALL as f64).into(), (TYPE_ITEM as f64).into()]);
    assert!(bench.call("Obj_IsDeleted", &[laser.into()]).as_bool());
    assert!(bench.stage.items.active_count() <= 5);
}

#[test]
fn laser_accessors_follow_the_laser_kind() {
    let mut bench = Bench::stage_script();
    let straight_args: Vec<ScriptValue> =
        vec![100.0.into(), 100.0.into(), 45.0.into(), 200.0.into(), 16.0.into(), 60.0.into(), 1.0.into(), 0.0.into()];
    let straight = bench.call("CreateStraightLaserA1", &straight_args).as_id();
    assert_near(bench.call("ObjStLaser_GetAngle", &[straight.into()]).as_real(), 45.0);
    bench.call("ObjStLaser_SetAngle", &[straight.into(), 30.0.into()]);
    assert_near(bench.call("ObjStLaser_GetAngle", &[straight.into()]).as_real(), 30.0);

    let curve_args: Vec<ScriptValue> =
        vec![100.0.into(), 100.0.into(), 2.0.into(), 90.0.into(), 10.0.into(), 8.0.into(), 1.0.into(), 0.0.into()];
    let curve = bench.call("CreateCurveLaserA1", &curve_args).as_id();
    let handle = bench.call("ObjCrLaser_AddNode", &[curve.into(), 10.0.into(), 20.0.into(), 0.0.into(), 0.0.into()]);
    assert!(handle.as_real() >= 0.0);
    let handles = bench.call("ObjCrLaser_GetNodePointerList", &[curve.into()]);
    assert!(handles.as_array().contains(&handle));

    assert_near(bench.call("ObjStLaser_GetAngle", &[curve.into()]).as_real(), 0.0);
    assert_eq!(bench.call("ObjCrLaser_GetNodePointerList", &[straight.into()]), ScriptValue::Array(Vec::new()));
}
