use std::fs;
use std::path::Path;

use kestrel_stage::config::StageConfigOverrides;
use kestrel_stage::script_harness::{load_fixture, run_fixture_in, HarnessOutput};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture file");
}

const STAGE: &str = r#"
fn initialize() {
    StartShotScript("shot.rhai");
}

fn main_loop() {
    CreateShotA1(120.0, 80.0, 0.5, 90.0, 1, 0);
}
"#;

const SHOT: &str = r#"
fn initialize() {
    CreateCommonDataArea("shot");
}

fn main_loop() {
    SetAreaCommonData("shot", "seen", GetShotCount(0));
}
"#;

fn run(dir: &Path, fixture: &str, overrides: StageConfigOverrides) -> HarnessOutput {
    write(dir, "fixture.json", fixture);
    let (mut fixture, base) = load_fixture(dir.join("fixture.json")).expect("load fixture");
    fixture.merge_overrides(&overrides);
    run_fixture_in(&fixture, &base).expect("run fixture")
}

#[test]
fn stage_script_spawns_shots_up_to_the_cap() {
    let dir = TempDir::new().expect("temp dir");
    write(dir.path(), "stage.rhai", STAGE);
    write(dir.path(), "shot.rhai", SHOT);
    let fixture = r#"{ "frames": 4, "seed": 2, "scripts": [ { "kind": "stage", "path": "stage.rhai" } ] }"#;
    let overrides = StageConfigOverrides { shot_max: Some(2), item_max: None, seed: None };
    let output = run(dir.path(), fixture, overrides);

    assert_eq!(output.frames, 4);
    assert_eq!(output.seed, Some(2));
    let shots: Vec<usize> = output.results.iter().map(|frame| frame.shots).collect();
    assert_eq!(shots, vec![1, 2, 2, 2]);
    assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
    assert_eq!(output.scripts.len(), 2, "the requested shot script joins the run");
    assert!(output.scripts[1].ends_with("shot.rhai"));
}

#[test]
fn fatal_errors_are_recorded_once() {
    let dir = TempDir::new().expect("temp dir");
    let source = r#"
fn main_loop() {
    StartItemScript("item.rhai");
}
"#;
    write(dir.path(), "stage.rhai", source);
    let fixture = r#"{ "frames": 3, "scripts": [ { "kind": "stage", "path": "stage.rhai" } ] }"#;
    let output = run(dir.path(), fixture, StageConfigOverrides::default());

    assert_eq!(output.errors.len(), 1);
    let error = &output.errors[0];
    assert_eq!(error.frame, 1);
    assert!(error.terminated);
    assert!(error.script.ends_with("stage.rhai"));
}

#[test]
fn closing_the_stage_ends_the_run_early() {
    let dir = TempDir::new().expect("temp dir");
    let source = r#"
fn main_loop() {
    CloseStgScene();
}
"#;
    write(dir.path(), "stage.rhai", source);
    let fixture = r#"{ "frames": 30, "scripts": [ { "kind": "stage", "path": "stage.rhai" } ] }"#;
    let output = run(dir.path(), fixture, StageConfigOverrides::default());
    assert_eq!(output.frames, 1);
    assert_eq!(output.results.len(), 1);
}

#[test]
fn fixture_config_is_read_relative_to_the_fixture() {
    let dir = TempDir::new().expect("temp dir");
    write(dir.path(), "stage.rhai", STAGE);
    write(dir.path(), "shot.rhai", SHOT);
    write(dir.path(), "stage_config.json", r#"{ "caps": { "shot_max": 1 } }"#);
    let fixture = r#"{
        "config": "stage_config.json",
        "frames": 3,
        "scripts": [ { "kind": "stage", "path": "stage.rhai" } ]
    }"#;
    let output = run(dir.path(), fixture, StageConfigOverrides::default());
    assert!(output.results.iter().all(|frame| frame.shots <= 1));
}
