//! Named common-data areas shared between scripts, and the replay store they can be
//! copied into and out of.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use tracing::debug;

use crate::scripts::ScriptValue;

pub type CommonDataArea = BTreeMap<String, ScriptValue>;

/// Default area every stage starts with.
pub const DEFAULT_AREA: &str = "";

#[derive(Debug, Clone, PartialEq)]
pub struct CommonDataStore {
    areas: BTreeMap<String, CommonDataArea>,
}

impl Default for CommonDataStore {
    fn default() -> Self {
        let mut areas = BTreeMap::new();
        areas.insert(DEFAULT_AREA.to_string(), CommonDataArea::new());
        Self { areas }
    }
}

impl CommonDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty area. An existing area is cleared.
    pub fn create_area(&mut self, area: &str) {
        self.areas.insert(area.to_string(), CommonDataArea::new());
    }

    pub fn area_exists(&self, area: &str) -> bool {
        self.areas.contains_key(area)
    }

    pub fn area(&self, area: &str) -> Option<&CommonDataArea> {
        self.areas.get(area)
    }

    /// Stores `value` under `key`. Returns false when the area does not exist.
    pub fn set(&mut self, area: &str, key: &str, value: ScriptValue) -> bool {
        match self.areas.get_mut(area) {
            Some(entries) => {
                entries.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, area: &str, key: &str) -> Option<&ScriptValue> {
        self.areas.get(area).and_then(|entries| entries.get(key))
    }

    pub fn area_names(&self) -> impl Iterator<Item = &str> {
        self.areas.keys().map(String::as_str)
    }

    /// Encodes one area, or `None` when it does not exist.
    pub fn snapshot(&self, area: &str) -> Result<Option<Vec<u8>>> {
        let Some(entries) = self.areas.get(area) else { return Ok(None) };
        let bytes = bincode::serialize(entries).with_context(|| format!("Encoding common data area '{area}'"))?;
        Ok(Some(bytes))
    }

    /// Replaces `area` with a previously taken snapshot.
    pub fn restore(&mut self, area: &str, bytes: &[u8]) -> Result<()> {
        let entries: CommonDataArea =
            bincode::deserialize(bytes).with_context(|| format!("Decoding common data area '{area}'"))?;
        debug!(target: "stage", area, keys = entries.len(), "common data area restored");
        self.areas.insert(area.to_string(), entries);
        Ok(())
    }
}

/// Keeps common-data snapshots for a replay, keyed by area name.
pub trait ReplayStore {
    fn save_area(&mut self, area: &str, bytes: Vec<u8>);
    fn load_area(&self, area: &str) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryReplayStore {
    areas: HashMap<String, Vec<u8>>,
}

impl MemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

impl ReplayStore for MemoryReplayStore {
    fn save_area(&mut self, area: &str, bytes: Vec<u8>) {
        self.areas.insert(area.to_string(), bytes);
    }

    fn load_area(&self, area: &str) -> Option<Vec<u8>> {
        self.areas.get(area).cloned()
    }
}

/// Copies `area` into the replay. Returns false when the area does not exist.
pub fn save_area_to_replay(store: &CommonDataStore, replay: &mut dyn ReplayStore, area: &str) -> Result<bool> {
    match store.snapshot(area)? {
        Some(bytes) => {
            replay.save_area(area, bytes);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Copies `area` back out of the replay. Returns false when the replay never saved it.
pub fn load_area_from_replay(store: &mut CommonDataStore, replay: &dyn ReplayStore, area: &str) -> Result<bool> {
    match replay.load_area(area) {
        Some(bytes) => {
            store.restore(area, &bytes)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
