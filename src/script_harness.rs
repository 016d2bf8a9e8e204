use std::cell::RefCell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assets::FsAssetSource;
use crate::config::{StageConfig, StageConfigOverrides};
use crate::scripts::{ScriptInstance, ScriptKind, StageScriptHost};
use crate::stage::StageContext;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessFixture {
    /// Optional stage config JSON; defaults otherwise.
    #[serde(default)]
    pub config: Option<String>,
    /// Root for shot/item data paths. Defaults to the fixture's directory.
    #[serde(default)]
    pub assets_root: Option<String>,
    #[serde(default = "default_frames")]
    pub frames: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub shot_max: Option<usize>,
    #[serde(default)]
    pub item_max: Option<usize>,
    #[serde(default)]
    pub scripts: Vec<FixtureScript>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixtureScript {
    pub kind: ScriptKind,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessOutput {
    pub frames: u64,
    pub seed: Option<u64>,
    pub scripts: Vec<String>,
    pub results: Vec<FrameResult>,
    pub errors: Vec<ScriptErrorSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameResult {
    pub frame: u64,
    pub shots: usize,
    pub items: usize,
    pub enemies: usize,
    pub contacts: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptErrorSummary {
    pub frame: u64,
    pub script: String,
    pub message: String,
    pub terminated: bool,
}

const fn default_frames() -> u64 {
    60
}

impl HarnessFixture {
    pub fn overrides(&self) -> StageConfigOverrides {
        StageConfigOverrides { shot_max: self.shot_max, item_max: self.item_max, seed: self.seed }
    }

    /// Command-line values win over the fixture's own.
    pub fn merge_overrides(&mut self, overrides: &StageConfigOverrides) {
        self.shot_max = overrides.shot_max.or(self.shot_max);
        self.item_max = overrides.item_max.or(self.item_max);
        self.seed = overrides.seed.or(self.seed);
    }

    fn stage_config(&self, base: &Path) -> Result<StageConfig> {
        let mut config = match &self.config {
            Some(path) => StageConfig::load(resolve(base, path))?,
            None => StageConfig::default(),
        };
        let overrides = self.overrides();
        if !overrides.is_empty() {
            info!(target: "harness", fields = ?overrides.applied_fields(), "config overrides applied");
        }
        config.apply_overrides(&overrides);
        Ok(config)
    }
}

struct RunningScript {
    host: StageScriptHost,
    last_error: Option<String>,
}

impl RunningScript {
    fn record_error(&mut self, frame: u64, errors: &mut Vec<ScriptErrorSummary>) {
        let current = self.host.last_error().map(str::to_string);
        if current.is_some() && current != self.last_error {
            errors.push(ScriptErrorSummary {
                frame,
                script: self.host.script_path().display().to_string(),
                message: current.clone().unwrap_or_default(),
                terminated: self.host.is_terminated(),
            });
        }
        self.last_error = current;
    }
}

/// Runs scripts started with `StartShotScript`/`StartItemScript` from the frame after the call.
fn start_requested_scripts(
    stage: &Rc<RefCell<StageContext>>,
    running: &mut Vec<RunningScript>,
    base: &Path,
    next_id: &mut i64,
) {
    let requested = {
        let stage = stage.borrow();
        [(ScriptKind::Shot, stage.scripts.shot_script.clone()), (ScriptKind::Item, stage.scripts.item_script.clone())]
    };
    for (kind, path) in requested {
        let Some(path) = path else { continue };
        if running.iter().any(|script| script.host.script().kind == kind) {
            continue;
        }
        let resolved = resolve(base, &path);
        debug!(target: "harness", ?kind, path = %resolved.display(), "starting requested script");
        let instance = ScriptInstance::new(*next_id, kind, resolved.display().to_string());
        *next_id += 1;
        running.push(RunningScript { host: StageScriptHost::new(Rc::clone(stage), instance), last_error: None });
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn run_fixture(fixture: &HarnessFixture) -> Result<HarnessOutput> {
    run_fixture_in(fixture, Path::new("."))
}

/// Runs `fixture` with relative paths resolved against `base`.
pub fn run_fixture_in(fixture: &HarnessFixture, base: &Path) -> Result<HarnessOutput> {
    let config = fixture.stage_config(base).with_context(|| "building stage config")?;
    let assets_root = fixture.assets_root.as_deref().map_or_else(|| base.to_path_buf(), |root| resolve(base, root));
    let mut context = StageContext::new(config).with_assets(Box::new(FsAssetSource::new(&assets_root)));

    let mut next_id = 1;
    let mut instances = Vec::with_capacity(fixture.scripts.len());
    for script in &fixture.scripts {
        let path = resolve(base, &script.path).display().to_string();
        match script.kind {
            ScriptKind::Stage if context.scripts.main_path.is_none() => context.scripts.main_path = Some(path.clone()),
            ScriptKind::Player => context.scripts.player_script = Some(next_id),
            ScriptKind::Shot => context.scripts.shot_script = Some(path.clone()),
            ScriptKind::Item => context.scripts.item_script = Some(path.clone()),
            ScriptKind::Stage => {}
        }
        instances.push(ScriptInstance::new(next_id, script.kind, path));
        next_id += 1;
    }

    let stage = Rc::new(RefCell::new(context));
    let mut running: Vec<RunningScript> = instances
        .into_iter()
        .map(|instance| RunningScript { host: StageScriptHost::new(Rc::clone(&stage), instance), last_error: None })
        .collect();
    let script_dir = stage
        .borrow()
        .scripts
        .main_path
        .as_deref()
        .and_then(|path| Path::new(path).parent().map(Path::to_path_buf))
        .unwrap_or_else(|| base.to_path_buf());

    let mut results = Vec::with_capacity(fixture.frames as usize);
    let mut errors = Vec::new();
    for _ in 0..fixture.frames {
        let frame = stage.borrow().frame();
        for script in &mut running {
            script.host.main_loop();
            script.record_error(frame, &mut errors);
        }
        start_requested_scripts(&stage, &mut running, &script_dir, &mut next_id);

        let (report, events) = {
            let mut stage = stage.borrow_mut();
            let report = stage.advance_frame();
            (report, stage.events.drain())
        };
        for event in &events {
            for script in &mut running {
                script.host.event(event);
                script.record_error(frame, &mut errors);
            }
        }
        results.push(FrameResult {
            frame: report.frame,
            shots: report.shots,
            items: report.items,
            enemies: report.enemies,
            contacts: report.contacts,
            events: events.iter().map(ToString::to_string).collect(),
        });
        if stage.borrow().closed {
            info!(target: "harness", frame = report.frame, "stage closed by script");
            break;
        }
    }

    let scripts = running.iter().map(|script| script.host.script_path().display().to_string()).collect();
    Ok(HarnessOutput { frames: results.len() as u64, seed: fixture.seed, scripts, results, errors })
}

/// Loads a fixture and resolves its relative paths against the fixture's directory.
pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<(HarnessFixture, PathBuf)> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening fixture '{}'", path.display()))?;
    let fixture = serde_json::from_reader(file).with_context(|| "parsing fixture JSON")?;
    let base = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok((fixture, base))
}
