use kestrel_stage::config::StageConfig;
use kestrel_stage::scripts::{FunctionTable, ScriptCall, ScriptInstance, ScriptKind, ScriptValue};
use kestrel_stage::stage::{ObjectId, OwnerType, StageContext};

const EPSILON: f64 = 1e-3;

fn assert_near(actual: f64, expected: f64) {
    assert!((actual - expected).abs() <= EPSILON, "expected {expected}, got {actual}");
}

struct Bench {
    stage: StageContext,
    script: ScriptInstance,
    table: FunctionTable,
}

impl Bench {
    fn new(shot_max: usize) -> Self {
        let mut config = StageConfig::default();
        config.caps.shot_max = shot_max;
        config.seed = Some(3);
        Self {
            stage: StageContext::new(config),
            script: ScriptInstance::new(1, ScriptKind::Stage, "stage.txt"),
            table: FunctionTable::for_kind(ScriptKind::Stage),
        }
    }

    fn call(&mut self, name: &str, args: &[ScriptValue]) -> ScriptValue {
        let mut call = ScriptCall::new(&mut self.stage, &self.script);
        self.table.call(&mut call, name, args).expect(name)
    }

    /// Three-way fan, two stacks, speeds 1 to 3, centred on 90 degrees with 10 degree spacing.
    fn fan(&mut self) -> ObjectId {
        let pattern = self.call("ObjPatternShot_Create", &[]).as_id();
        let p = ScriptValue::from(pattern);
        let fan = self.call("PATTERN_FAN", &[]);
        self.call("ObjPatternShot_SetPatternType", &[p.clone(), fan]);
        self.call("ObjPatternShot_SetShotCount", &[p.clone(), 3.0.into(), 2.0.into()]);
        self.call("ObjPatternShot_SetSpeed", &[p.clone(), 1.0.into(), 3.0.into()]);
        self.call("ObjPatternShot_SetAngle", &[p.clone(), 90.0.into(), 10.0.into()]);
        self.call("ObjPatternShot_SetBasePoint", &[p.clone(), 200.0.into(), 100.0.into()]);
        self.call("ObjPatternShot_SetGraphic", &[p, 4.0.into()]);
        pattern
    }

    fn fire(&mut self, pattern: ObjectId) -> Vec<ObjectId> {
        self.call("ObjPatternShot_FireReturn", &[pattern.into()]).as_array().iter().map(ScriptValue::as_id).collect()
    }
}

#[test]
fn fire_return_lists_stack_outer_way_inner() {
    let mut bench = Bench::new(64);
    let pattern = bench.fan();
    let shots = bench.fire(pattern);
    assert_eq!(shots.len(), 6);

    let expected = [(1.0, 80.0), (1.0, 90.0), (1.0, 100.0), (3.0, 80.0), (3.0, 90.0), (3.0, 100.0)];
    for (shot, (speed, angle)) in shots.iter().zip(expected) {
        assert_near(bench.call("ObjMove_GetSpeed", &[(*shot).into()]).as_real(), speed);
        assert_near(bench.call("ObjMove_GetAngle", &[(*shot).into()]).as_real(), angle);
        assert_near(bench.call("ObjMove_GetX", &[(*shot).into()]).as_real(), 200.0);
        assert_eq!(bench.call("ObjShot_GetImageID", &[(*shot).into()]), ScriptValue::Real(4.0));
    }
    assert!(shots.iter().all(|id| bench.stage.shots.get(*id).is_some_and(|s| s.owner == OwnerType::Enemy)));
}

#[test]
fn firing_stops_at_the_shot_cap() {
    let mut bench = Bench::new(4);
    let pattern = bench.fan();
    let shots = bench.fire(pattern);
    assert_eq!(shots.len(), 4);
    assert_eq!(bench.stage.shots.active_count(), 4);
    assert!(bench.fire(pattern).is_empty());
}

#[test]
fn deleted_patterns_fire_nothing() {
    let mut bench = Bench::new(64);
    let pattern = bench.fan();
    bench.call("Obj_Delete", &[pattern.into()]);
    assert!(bench.fire(pattern).is_empty());
    assert_eq!(bench.stage.shots.active_count(), 0);
}

#[test]
fn copied_settings_fire_the_same_grid() {
    let mut bench = Bench::new(64);
    let source = bench.fan();
    let copy = bench.call("ObjPatternShot_Create", &[]).as_id();
    bench.call("ObjPatternShot_CopySettings", &[copy.into(), source.into()]);
    let shots = bench.fire(copy);
    assert_eq!(shots.len(), 6);
    assert_near(bench.call("ObjMove_GetAngle", &[shots[0].into()]).as_real(), 80.0);
}

#[test]
fn huge_shot_counts_fire_only_up_to_the_cap() {
    let mut bench = Bench::new(4);
    let pattern = bench.fan();
    let huge = 4_294_967_296.0;
    bench.call("ObjPatternShot_SetShotCount", &[pattern.into(), huge.into(), huge.into()]);
    assert_eq!(bench.fire(pattern).len(), 4);

    bench.call("ObjPatternShot_SetShotCount", &[pattern.into(), (-3.0).into(), 2.0.into()]);
    bench.call("ObjPatternShot_Fire", &[pattern.into()]);
    assert_eq!(bench.stage.shots.active_count(), 4);
}
