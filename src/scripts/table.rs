use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::stage::{ObjectId, OwnerType, StageContext};

use super::value::ScriptValue;
use super::{api, constants, ScriptInstance, ScriptKind};

/// Failure visible to the calling script. Silent-default paths never produce one.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Structural misuse; terminates the calling script.
    Fatal(String),
    Arity { name: String, expected: usize, found: usize },
    UnknownFunction(String),
    Type { name: String, index: usize, expected: &'static str },
}

impl ScriptError {
    pub fn fatal(message: impl Into<String>) -> Self {
        ScriptError::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScriptError::Fatal(_))
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Fatal(message) => f.write_str(message),
            ScriptError::Arity { name, expected, found } => {
                write!(f, "{name} expects {expected} argument(s), got {found}")
            }
            ScriptError::UnknownFunction(name) => write!(f, "unknown function '{name}'"),
            ScriptError::Type { name, index, expected } => {
                write!(f, "{name}: argument {index} must be {expected}")
            }
        }
    }
}

impl std::error::Error for ScriptError {}

pub const SHOT_SCRIPT_RUNNING: &str = "A shot script was already started.";
pub const ITEM_SCRIPT_RUNNING: &str = "An item script was already started.";
pub const NO_BOSS_SCENE: &str = "Cannot create a boss enemy as there is no active enemy boss scene object.";
pub const OUTSIDE_REPLAY_ONLY: &str = "This function can only be called outside of replays.";
pub const REPLAY_ONLY: &str = "This function can only be called during replays.";
pub const MAIN_THREAD_ONLY: &str = "This function can only be called in the main thread.";

/// One native call: the stage and the script that made it.
pub struct ScriptCall<'a> {
    pub stage: &'a mut StageContext,
    pub script: &'a ScriptInstance,
}

impl<'a> ScriptCall<'a> {
    pub fn new(stage: &'a mut StageContext, script: &'a ScriptInstance) -> Self {
        Self { stage, script }
    }

    pub fn owner(&self) -> OwnerType {
        self.script.kind.owner()
    }

    pub fn require_main_thread(&self) -> Result<(), ScriptError> {
        if self.script.main_thread {
            Ok(())
        } else {
            Err(ScriptError::fatal(MAIN_THREAD_ONLY))
        }
    }
}

/// Arguments of one call, already checked against the entry's arity.
#[derive(Clone, Copy)]
pub struct Args<'a> {
    name: &'static str,
    values: &'a [ScriptValue],
}

impl<'a> Args<'a> {
    pub fn new(name: &'static str, values: &'a [ScriptValue]) -> Self {
        Self { name, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&'a ScriptValue, ScriptError> {
        self.values.get(index).ok_or_else(|| ScriptError::Arity {
            name: self.name.to_string(),
            expected: index + 1,
            found: self.values.len(),
        })
    }

    fn type_error(&self, index: usize, expected: &'static str) -> ScriptError {
        ScriptError::Type { name: self.name.to_string(), index, expected }
    }

    /// Numeric argument. Arrays are refused; every scalar converts.
    pub fn real(&self, index: usize) -> Result<f64, ScriptError> {
        match self.value(index)? {
            ScriptValue::Array(_) => Err(self.type_error(index, "a number")),
            value => Ok(value.as_real()),
        }
    }

    pub fn float(&self, index: usize) -> Result<f32, ScriptError> {
        self.real(index).map(|v| v as f32)
    }

    /// Angle argument given in degrees, returned in radians.
    pub fn radians(&self, index: usize) -> Result<f32, ScriptError> {
        self.real(index).map(crate::degrees_to_radians)
    }

    pub fn int(&self, index: usize) -> Result<i64, ScriptError> {
        self.real(index).map(|v| v as i64)
    }

    /// Frame count; negative values clamp to zero.
    pub fn frames(&self, index: usize) -> Result<u32, ScriptError> {
        self.int(index).map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
    }

    pub fn id(&self, index: usize) -> Result<ObjectId, ScriptError> {
        self.real(index).map(ObjectId::from_script)
    }

    pub fn boolean(&self, index: usize) -> Result<bool, ScriptError> {
        Ok(self.value(index)?.as_bool())
    }

    pub fn string(&self, index: usize) -> Result<String, ScriptError> {
        match self.value(index)? {
            ScriptValue::String(s) => Ok(s.clone()),
            ScriptValue::Array(items) if items.iter().all(|item| matches!(item, ScriptValue::String(_))) => {
                Ok(items.iter().map(ScriptValue::as_string).collect())
            }
            ScriptValue::Array(_) => Err(self.type_error(index, "a string")),
            value => Ok(value.as_string()),
        }
    }
}

pub type NativeFn = fn(&mut ScriptCall<'_>, Args<'_>) -> Result<ScriptValue, ScriptError>;

#[derive(Clone, Copy)]
pub enum EntryBody {
    Native(NativeFn),
    Constant(f64),
}

#[derive(Clone, Copy)]
pub struct FunctionEntry {
    pub name: &'static str,
    pub arity: usize,
    pub body: EntryBody,
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.body {
            EntryBody::Native(_) => "native".to_string(),
            EntryBody::Constant(value) => value.to_string(),
        };
        f.debug_struct("FunctionEntry").field("name", &self.name).field("arity", &self.arity).field("body", &body).finish()
    }
}

/// Every function and constant a script of one kind can call, keyed by name.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    kind: ScriptKind,
    entries: BTreeMap<&'static str, FunctionEntry>,
}

impl FunctionTable {
    pub fn empty(kind: ScriptKind) -> Self {
        Self { kind, entries: BTreeMap::new() }
    }

    pub fn for_kind(kind: ScriptKind) -> Self {
        let mut table = Self::empty(kind);
        api::register(&mut table, kind);
        constants::register(&mut table, kind);
        table
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn native(&mut self, name: &'static str, arity: usize, body: NativeFn) {
        self.entries.insert(name, FunctionEntry { name, arity, body: EntryBody::Native(body) });
    }

    pub fn constant(&mut self, name: &'static str, value: f64) {
        self.entries.insert(name, FunctionEntry { name, arity: 0, body: EntryBody::Constant(value) });
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.values()
    }

    /// Looks up `name`, checks the arity, and runs it. Fatal errors are logged here once.
    pub fn call(&self, call: &mut ScriptCall<'_>, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        let entry = self.get(name).ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;
        if args.len() != entry.arity {
            return Err(ScriptError::Arity { name: name.to_string(), expected: entry.arity, found: args.len() });
        }
        match entry.body {
            EntryBody::Constant(value) => Ok(ScriptValue::Real(value)),
            EntryBody::Native(body) => {
                let result = body(call, Args::new(entry.name, args));
                if let Err(ScriptError::Fatal(message)) = &result {
                    warn!(target: "scripts", script = call.script.id, path = %call.script.path, function = name, %message, "script fatal error");
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;

    #[test]
    fn arity_and_unknown_names_are_reported() {
        let table = FunctionTable::for_kind(ScriptKind::Stage);
        let mut stage = StageContext::new(StageConfig::default());
        let script = ScriptInstance::new(1, ScriptKind::Stage, "stage.rhai");
        let mut call = ScriptCall::new(&mut stage, &script);
        let err = table.call(&mut call, "ObjMove_SetX", &[ScriptValue::Real(1.0)]).expect_err("arity");
        assert_eq!(err, ScriptError::Arity { name: "ObjMove_SetX".into(), expected: 2, found: 1 });
        let err = table.call(&mut call, "NoSuchFunction", &[]).expect_err("unknown");
        assert_eq!(err, ScriptError::UnknownFunction("NoSuchFunction".into()));
    }

    #[test]
    fn array_given_for_a_number_is_a_type_error() {
        let table = FunctionTable::for_kind(ScriptKind::Stage);
        let mut stage = StageContext::new(StageConfig::default());
        let script = ScriptInstance::new(1, ScriptKind::Stage, "stage.rhai");
        let mut call = ScriptCall::new(&mut stage, &script);
        let args = [ScriptValue::real_array([1.0]), ScriptValue::Real(2.0)];
        let err = table.call(&mut call, "ObjMove_SetX", &args).expect_err("type");
        assert!(matches!(err, ScriptError::Type { index: 0, .. }));
    }

    #[test]
    fn kind_specific_functions_only_appear_for_their_kind() {
        let stage = FunctionTable::for_kind(ScriptKind::Stage);
        let player = FunctionTable::for_kind(ScriptKind::Player);
        let shot = FunctionTable::for_kind(ScriptKind::Shot);
        assert!(!stage.contains("CreatePlayerShotA1"));
        assert!(player.contains("CreatePlayerShotA1"));
        assert!(shot.contains("SetShotDeleteEventEnable"));
        assert!(!stage.contains("SetShotDeleteEventEnable"));
        assert!(stage.contains("CreateShotA1") && player.contains("CreateShotA1"));
        assert_eq!(stage.get("OBJ_SHOT").map(|entry| entry.arity), Some(0));
    }
}
