use kestrel_stage::config::StageConfig;
use kestrel_stage::scripts::constants::{INFO_LIFE, INFO_SHOT_HIT_COUNT};
use kestrel_stage::scripts::table::{
    ITEM_SCRIPT_RUNNING, MAIN_THREAD_ONLY, NO_BOSS_SCENE, SHOT_SCRIPT_RUNNING,
};
use kestrel_stage::scripts::{FunctionTable, ScriptCall, ScriptError, ScriptInstance, ScriptKind, ScriptValue};
use kestrel_stage::stage::context::UNREGISTERED_GRACE_FRAMES;
use kestrel_stage::stage::{ObjectId, ObjectType, StageContext};

struct Bench {
    stage: StageContext,
    script: ScriptInstance,
    table: FunctionTable,
}

impl Bench {
    fn new(script: ScriptInstance) -> Self {
        let mut config = StageConfig::default();
        config.seed = Some(5);
        let table = FunctionTable::for_kind(script.kind);
        Self { stage: StageContext::new(config), script, table }
    }

    fn stage_script() -> Self {
        Self::new(ScriptInstance::new(1, ScriptKind::Stage, "stage.txt"))
    }

    fn try_call(&mut self, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        let mut call = ScriptCall::new(&mut self.stage, &self.script);
        self.table.call(&mut call, name, args)
    }

    fn call(&mut self, name: &str, args: &[ScriptValue]) -> ScriptValue {
        self.try_call(name, args).expect(name)
    }
}

fn fatal_message(result: Result<ScriptValue, ScriptError>) -> String {
    match result {
        Err(ScriptError::Fatal(message)) => message,
        other => panic!("expected a fatal error, got {other:?}"),
    }
}

#[test]
fn second_shot_script_is_fatal() {
    let mut bench = Bench::stage_script();
    bench.call("StartShotScript", &["shot.txt".into()]);
    assert_eq!(bench.stage.scripts.shot_script.as_deref(), Some("shot.txt"));
    let message = fatal_message(bench.try_call("StartShotScript", &["other.txt".into()]));
    assert_eq!(message, SHOT_SCRIPT_RUNNING);
    assert_eq!(bench.stage.scripts.shot_script.as_deref(), Some("shot.txt"));
}

#[test]
fn second_item_script_is_fatal() {
    let mut bench = Bench::stage_script();
    bench.call("StartItemScript", &["item.txt".into()]);
    let message = fatal_message(bench.try_call("StartItemScript", &["item.txt".into()]));
    assert_eq!(message, ITEM_SCRIPT_RUNNING);
}

#[test]
fn boss_enemy_without_a_scene_is_fatal() {
    let mut bench = Bench::stage_script();
    let boss = ScriptValue::from(ObjectType::EnemyBoss.to_script());
    let message = fatal_message(bench.try_call("ObjEnemy_Create", &[boss]));
    assert_eq!(message, NO_BOSS_SCENE);

    let plain = bench.call("ObjEnemy_Create", &[ObjectType::Enemy.to_script().into()]).as_id();
    assert!(plain.is_valid());
}

#[test]
fn loader_thread_scripts_cannot_create_objects() {
    let mut bench = Bench::new(ScriptInstance::new(2, ScriptKind::Stage, "loader.txt").off_main_thread());
    let message = fatal_message(bench.try_call("ObjEnemyBossScene_Create", &[]));
    assert_eq!(message, MAIN_THREAD_ONLY);
    let message = fatal_message(bench.try_call("ObjShot_Create", &[ObjectType::Shot.to_script().into()]));
    assert_eq!(message, MAIN_THREAD_ONLY);
    let message = fatal_message(bench.try_call("ObjItem_Create", &[1.0.into()]));
    assert_eq!(message, MAIN_THREAD_ONLY);
    assert!(bench.try_call("GetShotCount", &[0.0.into()]).is_ok(), "queries stay available");
}

#[test]
fn stale_ids_read_as_defaults() {
    let mut bench = Bench::stage_script();
    let enemy = bench.call("ObjEnemy_Create", &[ObjectType::Enemy.to_script().into()]).as_id();
    bench.call("ObjEnemy_Regist", &[enemy.into()]);
    bench.call("ObjEnemy_SetLife", &[enemy.into(), 300.0.into()]);
    assert_eq!(bench.call("ObjEnemy_GetInfo", &[enemy.into(), INFO_LIFE.into()]), ScriptValue::Real(300.0));

    bench.call("Obj_Delete", &[enemy.into()]);
    bench.stage.advance_frame();
    assert!(bench.call("Obj_IsDeleted", &[enemy.into()]).as_bool());
    assert_eq!(bench.call("ObjEnemy_GetInfo", &[enemy.into(), INFO_LIFE.into()]), ScriptValue::Real(0.0));
    assert_eq!(bench.call("ObjEnemy_GetInfo", &[enemy.into(), INFO_SHOT_HIT_COUNT.into()]), ScriptValue::Real(0.0));
    assert_eq!(bench.call("ObjMove_GetX", &[enemy.into()]), ScriptValue::Real(0.0));
    assert_eq!(bench.call("Obj_GetType", &[enemy.into()]), ScriptValue::Real(-1.0));

    bench.call("ObjEnemy_SetLife", &[enemy.into(), 10.0.into()]);
    bench.call("ObjMove_SetPosition", &[ObjectId(4242).into(), 1.0.into(), 2.0.into()]);
}

#[test]
fn constants_read_like_zero_argument_functions() {
    let mut bench = Bench::stage_script();
    assert_eq!(bench.call("OBJ_ENEMY_BOSS", &[]), ScriptValue::Real(ObjectType::EnemyBoss.to_script() as f64));
    assert_eq!(bench.call("ID_INVALID", &[]), ScriptValue::Real(-1.0));
}

#[test]
fn unknown_functions_are_not_fatal() {
    let mut bench = Bench::stage_script();
    let err = bench.try_call("NoSuchFunction", &[]).unwrap_err();
    assert_eq!(err, ScriptError::UnknownFunction("NoSuchFunction".to_string()));
    assert!(!err.is_fatal());
}

#[test]
fn close_stage_marks_the_stage_closed() {
    let mut bench = Bench::stage_script();
    assert!(!bench.stage.closed);
    bench.call("CloseStgScene", &[]);
    assert!(bench.stage.closed);
}

#[test]
fn unregistered_objects_are_discarded_after_the_grace_period() {
    let mut bench = Bench::stage_script();
    let forgotten = bench.call("ObjEnemy_Create", &[ObjectType::Enemy.to_script().into()]).as_id();
    let late = bench.call("ObjEnemy_Create", &[ObjectType::Enemy.to_script().into()]).as_id();
    let stray_shot = bench.call("ObjShot_Create", &[ObjectType::Shot.to_script().into()]).as_id();
    assert!(stray_shot.is_valid());

    for _ in 0..UNREGISTERED_GRACE_FRAMES - 1 {
        bench.stage.advance_frame();
    }
    assert!(!bench.call("Obj_IsDeleted", &[forgotten.into()]).as_bool());
    bench.call("ObjEnemy_Regist", &[late.into()]);

    bench.stage.advance_frame();
    assert!(bench.call("Obj_IsDeleted", &[forgotten.into()]).as_bool());
    assert!(bench.call("Obj_IsDeleted", &[stray_shot.into()]).as_bool());
    assert!(!bench.call("Obj_IsDeleted", &[late.into()]).as_bool());
    assert_eq!(bench.stage.enemies.active_count(), 1);
}
