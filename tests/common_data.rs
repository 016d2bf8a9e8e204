use std::cell::RefCell;
use std::rc::Rc;

use kestrel_stage::common_data::{MemoryReplayStore, ReplayStore};
use kestrel_stage::config::StageConfig;
use kestrel_stage::scripts::table::{OUTSIDE_REPLAY_ONLY, REPLAY_ONLY};
use kestrel_stage::scripts::{FunctionTable, ScriptCall, ScriptError, ScriptInstance, ScriptKind, ScriptValue};
use kestrel_stage::stage::StageContext;

/// Lets a recording stage and a playback stage share one replay.
#[derive(Clone, Default)]
struct SharedReplay(Rc<RefCell<MemoryReplayStore>>);

impl ReplayStore for SharedReplay {
    fn save_area(&mut self, area: &str, bytes: Vec<u8>) {
        self.0.borrow_mut().save_area(area, bytes);
    }

    fn load_area(&self, area: &str) -> Option<Vec<u8>> {
        self.0.borrow().load_area(area)
    }
}

struct Bench {
    stage: StageContext,
    script: ScriptInstance,
    table: FunctionTable,
}

impl Bench {
    fn with_replay(replay: &SharedReplay, in_replay: bool) -> Self {
        let stage = StageContext::new(StageConfig::default()).with_replay(Box::new(replay.clone()), in_replay);
        Self {
            stage,
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
}

#[test]
fn area_values_fall_back_to_the_default() {
    let mut bench = Bench::with_replay(&SharedReplay::default(), false);
    assert_eq!(bench.call("IsCommonDataAreaExists", &["run".into()]), ScriptValue::Bool(false));
    let fallback = bench.call("GetAreaCommonData", &["run".into(), "score".into(), 7.0.into()]);
    assert_eq!(fallback, ScriptValue::Real(7.0));

    bench.call("CreateCommonDataArea", &["run".into()]);
    bench.call("SetAreaCommonData", &["run".into(), "score".into(), 1200.0.into()]);
    assert_eq!(bench.call("IsCommonDataAreaExists", &["run".into()]), ScriptValue::Bool(true));
    let stored = bench.call("GetAreaCommonData", &["run".into(), "score".into(), 7.0.into()]);
    assert_eq!(stored, ScriptValue::Real(1200.0));
}

#[test]
fn recorded_areas_come_back_during_playback() {
    let replay = SharedReplay::default();
    let mut recording = Bench::with_replay(&replay, false);
    recording.call("CreateCommonDataArea", &["run".into()]);
    recording.call("SetAreaCommonData", &["run".into(), "rank".into(), "lunatic".into()]);
    recording.call("SetAreaCommonData", &["run".into(), "graze".into(), 340.0.into()]);
    assert_eq!(recording.call("SaveCommonDataAreaToReplayFile", &["run".into()]), ScriptValue::Bool(true));
    assert_eq!(recording.call("SaveCommonDataAreaToReplayFile", &["missing".into()]), ScriptValue::Bool(false));
    assert_eq!(replay.0.borrow().len(), 1);

    let mut playback = Bench::with_replay(&replay, true);
    assert_eq!(playback.call("LoadCommonDataAreaFromReplayFile", &["run".into()]), ScriptValue::Bool(true));
    let rank = playback.call("GetAreaCommonData", &["run".into(), "rank".into(), "easy".into()]);
    assert_eq!(rank, ScriptValue::from("lunatic"));
    let graze = playback.call("GetAreaCommonData", &["run".into(), "graze".into(), 0.0.into()]);
    assert_eq!(graze, ScriptValue::Real(340.0));
    assert_eq!(playback.call("LoadCommonDataAreaFromReplayFile", &["missing".into()]), ScriptValue::Bool(false));
}

#[test]
fn replay_functions_are_fatal_on_the_wrong_side() {
    let replay = SharedReplay::default();
    let mut recording = Bench::with_replay(&replay, false);
    let err = recording.try_call("LoadCommonDataAreaFromReplayFile", &["run".into()]).unwrap_err();
    assert_eq!(err, ScriptError::Fatal(REPLAY_ONLY.to_string()));

    let mut playback = Bench::with_replay(&replay, true);
    let err = playback.try_call("SaveCommonDataAreaToReplayFile", &["run".into()]).unwrap_err();
    assert_eq!(err, ScriptError::Fatal(OUTSIDE_REPLAY_ONLY.to_string()));
}
