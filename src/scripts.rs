//! Bridge between stage scripts and the simulation.
//!
//! Scripts see a flat namespace of fixed-arity functions ([`FunctionTable`]) taking and
//! returning [`ScriptValue`]s. Each call receives a [`ScriptCall`] holding the stage and
//! the calling [`ScriptInstance`]; nothing is reached through globals. [`StageScriptHost`]
//! binds the table into a rhai engine.

pub mod api;
pub mod constants;
pub mod host;
pub mod table;
pub mod value;

use serde::{Deserialize, Serialize};

use crate::stage::OwnerType;
use crate::time::SlowOwner;

pub use host::StageScriptHost;
pub use table::{Args, EntryBody, FunctionEntry, FunctionTable, NativeFn, ScriptCall, ScriptError};
pub use value::ScriptValue;

/// Which function groups a script sees on top of the common stage functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Stage,
    Shot,
    Item,
    Player,
}

impl ScriptKind {
    /// Owner of the shots and hitboxes this script creates.
    pub fn owner(self) -> OwnerType {
        match self {
            ScriptKind::Player => OwnerType::Player,
            _ => OwnerType::Enemy,
        }
    }

    pub fn slow_owner(self) -> SlowOwner {
        match self {
            ScriptKind::Player => SlowOwner::Player,
            _ => SlowOwner::Enemy,
        }
    }
}

/// Per-script state the bridge recovers on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInstance {
    pub id: i64,
    pub kind: ScriptKind,
    /// False for scripts compiled and run by a loader thread.
    pub main_thread: bool,
    pub path: String,
}

impl ScriptInstance {
    pub fn new(id: i64, kind: ScriptKind, path: impl Into<String>) -> Self {
        Self { id, kind, main_thread: true, path: path.into() }
    }

    pub fn off_main_thread(mut self) -> Self {
        self.main_thread = false;
        self
    }
}
