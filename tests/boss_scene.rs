use kestrel_stage::config::StageConfig;
use kestrel_stage::events::StageEvent;
use kestrel_stage::scripts::constants::{
    INFO_ACTIVE_STEP_LIFE_COUNT, INFO_ACTIVE_STEP_LIFE_RATE_LIST, INFO_ACTIVE_STEP_TOTAL_LIFE,
    INFO_ACTIVE_STEP_TOTAL_MAX_LIFE, INFO_IS_LAST_STEP, INFO_IS_SPELL, INFO_REMAIN_STEP_COUNT, INFO_SPELL_SCORE,
    INFO_TIMER, INFO_TIMERF,
};
use kestrel_stage::scripts::{FunctionTable, ScriptCall, ScriptError, ScriptInstance, ScriptKind, ScriptValue};
use kestrel_stage::stage::{ObjectId, ObjectType, SceneDataSource, SceneDescription, StageContext};

const EPSILON: f64 = 1e-9;

fn assert_near(actual: f64, expected: f64) {
    assert!((actual - expected).abs() <= EPSILON, "expected {expected}, got {actual}");
}

/// Describes every data path from a fixed table; unknown paths get no bosses.
struct Descriptions(Vec<(&'static str, SceneDescription)>);

impl SceneDataSource for Descriptions {
    fn describe(&mut self, path: &str) -> SceneDescription {
        self.0.iter().find(|(p, _)| *p == path).map(|(_, d)| d.clone()).unwrap_or_default()
    }
}

struct Bench {
    stage: StageContext,
    script: ScriptInstance,
    table: FunctionTable,
}

impl Bench {
    fn new() -> Self {
        Self {
            stage: StageContext::new(StageConfig::default()),
            script: ScriptInstance::new(1, ScriptKind::Stage, "stage.txt"),
            table: FunctionTable::for_kind(ScriptKind::Stage),
        }
    }

    fn try_call(&mut self, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        let mut call = ScriptCall::new(&mut self.stage, &self.script);
        self.table.call(&mut call, name, args)
    }

    fn call(&mut self, name: &str, args: &[ScriptValue]) -> ScriptValue {
        self.try_call(name, args).expect(name)
    }

    fn info(&mut self, scene: ObjectId, info: i64) -> ScriptValue {
        self.call("ObjEnemyBossScene_GetInfo", &[scene.into(), info.into()])
    }

    /// Two steps: a timed spell with two bosses, then a plain data.
    fn two_step_scene(&mut self) -> ObjectId {
        let scene = self.call("ObjEnemyBossScene_Create", &[]).as_id();
        self.call("ObjEnemyBossScene_Add", &[scene.into(), 0.0.into(), "spell1.txt".into()]);
        self.call("ObjEnemyBossScene_Add", &[scene.into(), 1.0.into(), "final.txt".into()]);
        self.call("ObjEnemyBossScene_Regist", &[scene.into()]);
        let mut source = Descriptions(vec![(
            "spell1.txt",
            SceneDescription {
                life: vec![600.0, 400.0],
                timer_seconds: Some(30.0),
                spell: true,
                spell_score: 5000,
                ..SceneDescription::default()
            },
        )]);
        assert!(self.stage.resolve_boss_scene(&mut source));
        scene
    }

    fn boss(&mut self) -> ObjectId {
        self.call("ObjEnemy_Create", &[ObjectType::EnemyBoss.to_script().into()]).as_id()
    }
}

#[test]
fn bosses_are_handed_out_once_each() {
    let mut bench = Bench::new();
    bench.two_step_scene();
    let first = bench.boss();
    let second = bench.boss();
    assert!(first.is_valid() && second.is_valid());
    assert_ne!(first, second);
    assert_eq!(bench.boss(), ObjectId::INVALID);
    assert_eq!(bench.call("Obj_GetType", &[first.into()]), ScriptValue::Real(ObjectType::EnemyBoss.to_script() as f64));
}

#[test]
fn scene_info_tracks_the_active_step() {
    let mut bench = Bench::new();
    let scene = bench.two_step_scene();
    let first = bench.boss();
    bench.boss();

    assert_eq!(bench.info(scene, INFO_REMAIN_STEP_COUNT), ScriptValue::Real(1.0));
    assert_eq!(bench.info(scene, INFO_ACTIVE_STEP_LIFE_COUNT), ScriptValue::Real(1.0));
    assert_eq!(bench.info(scene, INFO_IS_SPELL), ScriptValue::Bool(true));
    assert_eq!(bench.info(scene, INFO_IS_LAST_STEP), ScriptValue::Bool(false));
    assert_eq!(bench.info(scene, INFO_SPELL_SCORE), ScriptValue::Real(5000.0));
    assert_eq!(bench.info(scene, INFO_TIMER), ScriptValue::Real(30.0));
    assert_eq!(bench.info(scene, INFO_TIMERF), ScriptValue::Real(1800.0));
    assert_near(bench.info(scene, INFO_ACTIVE_STEP_TOTAL_MAX_LIFE).as_real(), 1000.0);

    bench.call("ObjEnemy_SetLife", &[first.into(), 300.0.into()]);
    assert_near(bench.info(scene, INFO_ACTIVE_STEP_TOTAL_LIFE).as_real(), 700.0);
    let rates = bench.info(scene, INFO_ACTIVE_STEP_LIFE_RATE_LIST);
    assert_eq!(rates.as_array().len(), 1);
    assert_near(rates.as_array()[0].as_real(), 0.7);
}

#[test]
fn missing_scene_reads_as_defaults() {
    let mut bench = Bench::new();
    let stale = ObjectId(777);
    assert_eq!(bench.info(stale, INFO_IS_SPELL), ScriptValue::Bool(false));
    assert_eq!(bench.info(stale, INFO_REMAIN_STEP_COUNT), ScriptValue::Real(0.0));
    assert_eq!(bench.info(stale, INFO_ACTIVE_STEP_LIFE_RATE_LIST), ScriptValue::Array(Vec::new()));
}

#[test]
fn only_one_scene_runs_at_a_time() {
    let mut bench = Bench::new();
    let scene = bench.two_step_scene();
    let other = bench.call("ObjEnemyBossScene_Create", &[]).as_id();
    bench.call("ObjEnemyBossScene_Add", &[other.into(), 0.0.into(), "other.txt".into()]);
    bench.call("ObjEnemyBossScene_Regist", &[other.into()]);
    assert_eq!(bench.call("GetEnemyBossSceneObjectID", &[]).as_id(), scene);
}

#[test]
fn resolving_announces_the_step_and_spell() {
    let mut bench = Bench::new();
    let scene = bench.two_step_scene();
    let events = bench.stage.events.drain();
    assert_eq!(events, vec![StageEvent::StartBossStep { scene }, StageEvent::StartBossSpell { scene }]);
}
