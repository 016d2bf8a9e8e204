use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use kestrel_stage::config::StageConfig;
use kestrel_stage::events::StageEvent;
use kestrel_stage::scripts::{ScriptInstance, ScriptKind, ScriptValue, StageScriptHost};
use kestrel_stage::stage::{ObjectId, StageContext};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).expect("write script");
    path
}

fn shared_stage() -> Rc<RefCell<StageContext>> {
    let mut config = StageConfig::default();
    config.seed = Some(9);
    Rc::new(RefCell::new(StageContext::new(config)))
}

fn host(stage: &Rc<RefCell<StageContext>>, kind: ScriptKind, path: &Path) -> StageScriptHost {
    StageScriptHost::new(Rc::clone(stage), ScriptInstance::new(1, kind, path.display().to_string()))
}

fn stored(stage: &Rc<RefCell<StageContext>>, area: &str, key: &str) -> Option<ScriptValue> {
    stage.borrow().common_data.get(area, key).cloned()
}

const COUNTER: &str = r#"
fn initialize() {
    this.count = 0;
    CreateCommonDataArea("state");
}

fn main_loop() {
    this.count += 1;
    SetAreaCommonData("state", "count", this.count);
    CreateShotA1(100.0, 100.0, 1.0, 90.0, 1, 0);
}
"#;

#[test]
fn initialize_runs_once_and_state_survives_between_frames() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_script(dir.path(), "counter.rhai", COUNTER);
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);

    for _ in 0..3 {
        host.main_loop();
    }
    assert_eq!(host.last_error(), None);
    assert_eq!(stored(&stage, "state", "count"), Some(ScriptValue::Real(3.0)));
    assert_eq!(stage.borrow().shots.active_count(), 3);
    assert_eq!(host.native_calls(), 1 + 3 * 2);
}

#[test]
fn forced_reload_starts_over() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_script(dir.path(), "counter.rhai", COUNTER);
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);
    host.main_loop();
    host.main_loop();
    host.force_reload().expect("reload");
    host.main_loop();
    assert_eq!(stored(&stage, "state", "count"), Some(ScriptValue::Real(1.0)));
}

#[test]
fn scripts_without_callbacks_are_fine() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_script(dir.path(), "empty.rhai", "let unused = TYPE_ALL;\n");
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);
    host.main_loop();
    host.event(&StageEvent::StartBossStep { scene: ObjectId(3) });
    assert_eq!(host.last_error(), None);
    assert!(!host.is_terminated());
}

#[test]
fn fatal_bridge_errors_terminate_the_script() {
    let dir = TempDir::new().expect("temp dir");
    let source = r#"
fn main_loop() {
    StartShotScript("shot.rhai");
}
"#;
    let path = write_script(dir.path(), "starter.rhai", source);
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);

    host.main_loop();
    assert!(!host.is_terminated());
    host.main_loop();
    assert!(host.is_terminated());
    assert!(host.last_error().is_some());
    host.main_loop();
    assert_eq!(host.native_calls(), 2);
    assert_eq!(stage.borrow().scripts.shot_script.as_deref(), Some("shot.rhai"));
}

#[test]
fn fatal_errors_cannot_be_caught_by_the_script() {
    let dir = TempDir::new().expect("temp dir");
    let source = r#"
fn main_loop() {
    try {
        StartShotScript("a.rhai");
        StartShotScript("b.rhai");
    } catch (err) {
    }
    CreateCommonDataArea("after");
    SetAreaCommonData("after", "ran", 1);
}
"#;
    let path = write_script(dir.path(), "catcher.rhai", source);
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);

    host.main_loop();
    assert!(host.is_terminated());
    assert!(host.last_error().is_some_and(|err| err.contains("shot script")));
    assert_eq!(stored(&stage, "after", "ran"), None);
    assert_eq!(host.native_calls(), 2);
}

#[test]
fn non_fatal_errors_keep_the_script_running() {
    let dir = TempDir::new().expect("temp dir");
    let source = r#"
fn main_loop() {
    DeleteShotAll(0);
}
"#;
    let path = write_script(dir.path(), "arity.rhai", source);
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);
    host.main_loop();
    assert!(host.last_error().is_some());
    assert!(!host.is_terminated());
}

#[test]
fn events_reach_scripts_that_accept_them() {
    let dir = TempDir::new().expect("temp dir");
    let source = r#"
fn event(kind, args) {
    CreateCommonDataArea("log");
    SetAreaCommonData("log", "kind", kind);
    SetAreaCommonData("log", "first", args[0]);
}
"#;
    let path = write_script(dir.path(), "events.rhai", source);
    let stage = shared_stage();
    let mut host = host(&stage, ScriptKind::Stage, &path);

    let item = StageEvent::GetItem { item_type: 1, item: ObjectId(40), position: glam::Vec2::new(1.0, 2.0) };
    assert!(!host.accepts(&item));
    host.event(&item);
    assert_eq!(stored(&stage, "log", "kind"), None);

    let step = StageEvent::StartBossStep { scene: ObjectId(12) };
    assert!(host.accepts(&step));
    host.event(&step);
    assert_eq!(stored(&stage, "log", "kind"), Some(ScriptValue::Real(step.code() as f64)));
    assert_eq!(stored(&stage, "log", "first"), Some(ScriptValue::Real(12.0)));
}

#[test]
fn missing_and_broken_files_report_errors() {
    let dir = TempDir::new().expect("temp dir");
    let stage = shared_stage();
    let mut missing = host(&stage, ScriptKind::Stage, &dir.path().join("nope.rhai"));
    missing.main_loop();
    assert!(missing.last_error().is_some_and(|err| err.contains("not accessible")));

    let path = write_script(dir.path(), "broken.rhai", "fn main_loop( {\n");
    let mut broken = host(&stage, ScriptKind::Stage, &path);
    broken.main_loop();
    assert!(broken.last_error().is_some());
    assert!(!broken.is_terminated());
}
