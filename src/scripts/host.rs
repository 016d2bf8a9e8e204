//! rhai binding of the function table.
//!
//! A script may define `initialize()`, `main_loop()` and `event(type, args)`; each is
//! optional. Callbacks run with `this` bound to a per-script object map, so state that
//! must survive between frames lives in `this.*`. Named constants are also pushed into
//! the top-level scope.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use rhai::{Array, CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Position, Scope, AST, INT};
use tracing::{debug, warn};

use crate::events::StageEvent;
use crate::stage::{ObjectId, StageContext};

use super::table::{EntryBody, FunctionTable, ScriptCall};
use super::value::ScriptValue;
use super::ScriptInstance;

pub fn to_dynamic(value: ScriptValue) -> Dynamic {
    match value {
        ScriptValue::Void => Dynamic::UNIT,
        ScriptValue::Real(v) => Dynamic::from_float(v),
        ScriptValue::Bool(b) => Dynamic::from_bool(b),
        ScriptValue::String(s) => Dynamic::from(s),
        ScriptValue::Array(items) => Dynamic::from_array(items.into_iter().map(to_dynamic).collect()),
    }
}

/// Integers widen to reals; values with no script counterpart become `Void`.
pub fn from_dynamic(value: Dynamic) -> ScriptValue {
    if value.is_unit() {
        return ScriptValue::Void;
    }
    if let Ok(v) = value.as_float() {
        return ScriptValue::Real(v);
    }
    if let Ok(v) = value.as_int() {
        return ScriptValue::Real(v as f64);
    }
    if let Ok(b) = value.as_bool() {
        return ScriptValue::Bool(b);
    }
    if let Ok(c) = value.as_char() {
        return ScriptValue::String(c.to_string());
    }
    if value.is_string() {
        return value.into_string().map_or(ScriptValue::Void, ScriptValue::String);
    }
    if value.is_array() {
        return value
            .into_array()
            .map_or(ScriptValue::Void, |items| ScriptValue::Array(items.into_iter().map(from_dynamic).collect()));
    }
    ScriptValue::Void
}

/// Arguments handed to `event(type, args)`.
pub fn event_args(event: &StageEvent) -> Vec<ScriptValue> {
    let id = |id: &ObjectId| ScriptValue::from(*id);
    match event {
        StageEvent::Timeout { scene }
        | StageEvent::StartBossSpell { scene }
        | StageEvent::EndBossSpell { scene }
        | StageEvent::StartBossStep { scene }
        | StageEvent::EndBossStep { scene } => vec![id(scene)],
        StageEvent::GainSpell { scene, score } => vec![id(scene), (*score).into()],
        StageEvent::PlayerShootdown { player }
        | StageEvent::PlayerSpell { player }
        | StageEvent::PlayerRebirth { player }
        | StageEvent::RequestSpell { player } => vec![id(player)],
        StageEvent::Hit { player, source } => vec![id(player), source.unwrap_or(ObjectId::INVALID).into()],
        StageEvent::Graze { player, count, shot } => vec![id(player), (*count).into(), ScriptValue::id_array([*shot])],
        StageEvent::GetItem { item_type, item, position } => vec![(*item_type).into(), id(item), (*position).into()],
        StageEvent::DeleteShot { shot, position, graphic, .. }
        | StageEvent::DeletePlayerShot { shot, position, graphic } => {
            vec![id(shot), (*position).into(), (*graphic).into()]
        }
    }
}

/// What every registered rhai function closes over.
#[derive(Clone)]
struct Bridge {
    stage: Rc<RefCell<StageContext>>,
    table: Rc<FunctionTable>,
    script: Rc<ScriptInstance>,
    fatal: Rc<RefCell<Option<String>>>,
    calls: Rc<Cell<u64>>,
}

/// Rhai's `try`/`catch` cannot intercept a termination, so a fatal error always
/// unwinds the whole callback.
fn terminated(message: String) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorTerminated(message.into(), Position::NONE))
}

impl Bridge {
    fn invoke(&self, name: &'static str, args: Vec<ScriptValue>) -> Result<Dynamic, Box<EvalAltResult>> {
        if let Some(fatal) = self.fatal.borrow().clone() {
            return Err(terminated(fatal));
        }
        self.calls.set(self.calls.get() + 1);
        let mut stage = self.stage.try_borrow_mut().map_err(|_| format!("{name}: stage is already in use"))?;
        let mut call = ScriptCall::new(&mut stage, &self.script);
        match self.table.call(&mut call, name, &args) {
            Ok(value) => Ok(to_dynamic(value)),
            Err(err) if err.is_fatal() => {
                let message = err.to_string();
                self.fatal.replace(Some(message.clone()));
                Err(terminated(message))
            }
            Err(err) => Err(err.to_string().into()),
        }
    }
}

macro_rules! bind_by_arity {
    ($engine:expr, $bridge:expr, $name:expr, $arity:expr; $($n:literal => ($($arg:ident),*)),+ $(,)?) => {
        match $arity {
            $($n => {
                let bridge = $bridge.clone();
                let name: &'static str = $name;
                $engine.register_fn(name, move |$($arg: Dynamic),*| {
                    bridge.invoke(name, vec![$(from_dynamic($arg)),*])
                });
                true
            })+
            _ => false,
        }
    };
}

fn register_table(engine: &mut Engine, bridge: &Bridge) {
    for entry in bridge.table.iter() {
        let bound = bind_by_arity!(engine, bridge, entry.name, entry.arity;
            0 => (),
            1 => (a),
            2 => (a, b),
            3 => (a, b, c),
            4 => (a, b, c, d),
            5 => (a, b, c, d, e),
            6 => (a, b, c, d, e, f),
            7 => (a, b, c, d, e, f, g),
            8 => (a, b, c, d, e, f, g, h),
            9 => (a, b, c, d, e, f, g, h, i),
            10 => (a, b, c, d, e, f, g, h, i, j),
        );
        if !bound {
            warn!(target: "scripts", name = entry.name, arity = entry.arity, "function arity not bindable");
        }
    }
}

pub struct StageScriptHost {
    engine: Engine,
    ast: Option<AST>,
    scope: Scope<'static>,
    state: Dynamic,
    bridge: Bridge,
    script_path: PathBuf,
    last_modified: Option<SystemTime>,
    error: Option<String>,
    enabled: bool,
    initialized: bool,
    terminated: bool,
}

impl StageScriptHost {
    pub fn new(stage: Rc<RefCell<StageContext>>, script: ScriptInstance) -> Self {
        let table = FunctionTable::for_kind(script.kind);
        let script_path = PathBuf::from(&script.path);
        let bridge = Bridge {
            stage,
            table: Rc::new(table),
            script: Rc::new(script),
            fatal: Rc::new(RefCell::new(None)),
            calls: Rc::new(Cell::new(0)),
        };
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        register_table(&mut engine, &bridge);
        Self {
            engine,
            ast: None,
            scope: Scope::new(),
            state: Dynamic::from_map(Map::new()),
            bridge,
            script_path,
            last_modified: None,
            error: None,
            enabled: true,
            initialized: false,
            terminated: false,
        }
    }

    pub fn script(&self) -> &ScriptInstance {
        &self.bridge.script
    }

    pub fn table(&self) -> &FunctionTable {
        &self.bridge.table
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enable: bool) {
        self.enabled = enable;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// True once a fatal bridge error stopped this script for good.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Native calls made so far.
    pub fn native_calls(&self) -> u64 {
        self.bridge.calls.get()
    }

    pub fn force_reload(&mut self) -> Result<()> {
        self.load_script()
    }

    /// Whether this script's kind subscribes to `event`.
    pub fn accepts(&self, event: &StageEvent) -> bool {
        self.bridge.table.contains(event.name())
    }

    /// Runs `initialize` once per load and then `main_loop`.
    pub fn main_loop(&mut self) {
        if !self.ready() {
            return;
        }
        if !self.initialized {
            self.initialized = true;
            if !self.call("initialize", ()) {
                return;
            }
        }
        self.call("main_loop", ());
    }

    pub fn event(&mut self, event: &StageEvent) {
        if !self.ready() || !self.accepts(event) {
            return;
        }
        let args: Array = event_args(event).into_iter().map(to_dynamic).collect();
        self.call("event", (event.code() as INT, args));
    }

    fn ready(&mut self) -> bool {
        if self.terminated || !self.enabled {
            return false;
        }
        if let Err(err) = self.reload_if_needed() {
            self.error = Some(format!("{err:#}"));
            return false;
        }
        self.ast.is_some()
    }

    /// Calls an optional callback. False when it failed.
    fn call(&mut self, callback: &str, args: impl FuncArgs) -> bool {
        let Some(ast) = &self.ast else { return false };
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut self.state);
        let result = self.engine.call_fn_with_options::<Dynamic>(options, &mut self.scope, ast, callback, args);
        if self.take_fatal() {
            return false;
        }
        match result {
            Ok(_) => {
                self.error = None;
                true
            }
            Err(err) => {
                if let EvalAltResult::ErrorFunctionNotFound(signature, _) = err.as_ref() {
                    if signature.starts_with(callback) {
                        return true;
                    }
                }
                self.fail(err.to_string());
                false
            }
        }
    }

    /// Terminates the script if a bridge call raised a fatal error, whatever the
    /// callback itself returned.
    fn take_fatal(&mut self) -> bool {
        let Some(fatal) = self.bridge.fatal.borrow_mut().take() else { return false };
        self.terminated = true;
        warn!(target: "scripts", script = self.bridge.script.id, path = %self.script_path.display(), %fatal, "script terminated");
        self.error = Some(fatal);
        true
    }

    fn fail(&mut self, message: String) {
        if !self.take_fatal() {
            self.error = Some(message);
        }
    }

    fn reload_if_needed(&mut self) -> Result<()> {
        let metadata = match fs::metadata(&self.script_path) {
            Ok(meta) => meta,
            Err(err) => {
                return Err(anyhow!("Script file not accessible: {err}"));
            }
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if self.ast.is_none() || self.last_modified.map_or(true, |prev| modified > prev) {
            self.load_script()?;
        }
        Ok(())
    }

    fn load_script(&mut self) -> Result<()> {
        let source = fs::read_to_string(&self.script_path)
            .with_context(|| format!("Reading {}", self.script_path.display()))?;
        let ast = self.engine.compile(source).with_context(|| "Compiling Rhai script")?;
        self.scope = Scope::new();
        for entry in self.bridge.table.iter() {
            if let EntryBody::Constant(value) = entry.body {
                self.scope.push_constant(entry.name, value);
            }
        }
        self.state = Dynamic::from_map(Map::new());
        self.last_modified = fs::metadata(&self.script_path).ok().and_then(|meta| meta.modified().ok());
        self.initialized = false;
        self.error = None;
        if let Err(err) = self.engine.run_ast_with_scope(&mut self.scope, &ast) {
            self.fail(err.to_string());
            return Err(anyhow!("Running top-level statements: {err}"));
        }
        debug!(target: "scripts", script = self.bridge.script.id, path = %self.script_path.display(), "script loaded");
        self.ast = Some(ast);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_values_convert_both_ways() {
        assert_eq!(from_dynamic(Dynamic::from(3 as INT)), ScriptValue::Real(3.0));
        assert_eq!(from_dynamic(Dynamic::from("abc")), ScriptValue::from("abc"));
        assert_eq!(from_dynamic(Dynamic::UNIT), ScriptValue::Void);
        let nested = ScriptValue::Array(vec![ScriptValue::Real(1.5), ScriptValue::Bool(true)]);
        assert_eq!(from_dynamic(to_dynamic(nested.clone())), nested);
    }

    #[test]
    fn graze_events_carry_the_shot_list() {
        let event = StageEvent::Graze { player: ObjectId(1), count: 2, shot: ObjectId(9) };
        let args = event_args(&event);
        assert_eq!(args[1], ScriptValue::Real(2.0));
        assert_eq!(args[2], ScriptValue::id_array([ObjectId(9)]));
    }
}
