use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves script-provided paths to bytes. Path resolution rules belong to the host.
pub trait AssetSource {
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Reads from the filesystem, resolving relative paths against `root`.
#[derive(Debug, Clone, Default)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
}

impl AssetSource for FsAssetSource {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let candidate = Path::new(path);
        let resolved = if candidate.is_absolute() { candidate.to_path_buf() } else { self.root.join(candidate) };
        fs::read(&resolved).with_context(|| format!("Failed to read asset {}", resolved.display()))
    }
}

/// One collision circle of a shot graphic, relative to the shot position.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CollisionCircle {
    pub radius: f32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShotData {
    pub id: i64,
    #[serde(default)]
    pub rect: [i32; 4],
    #[serde(default = "ShotData::default_delay_color")]
    pub delay_color: [u8; 3],
    #[serde(default)]
    pub blend: i64,
    #[serde(default)]
    pub collision: Vec<CollisionCircle>,
    #[serde(default)]
    pub fixed_angle: bool,
    #[serde(default)]
    pub angular_velocity: f32,
}

impl ShotData {
    fn default_delay_color() -> [u8; 3] {
        [255, 255, 255]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemData {
    pub id: i64,
    #[serde(default)]
    pub rect: [i32; 4],
    #[serde(default)]
    pub blend: i64,
}

#[derive(Debug, Deserialize)]
struct ShotDataFile {
    #[serde(default)]
    texture: String,
    shots: Vec<ShotData>,
}

#[derive(Debug, Deserialize)]
struct ItemDataFile {
    #[serde(default)]
    texture: String,
    items: Vec<ItemData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSlot {
    PlayerShot,
    EnemyShot,
    Item,
}

#[derive(Debug, Clone, Default)]
pub struct ShotDataTable {
    entries: HashMap<i64, ShotData>,
    textures: HashMap<i64, String>,
}

impl ShotDataTable {
    pub fn get(&self, id: i64) -> Option<&ShotData> {
        self.entries.get(&id)
    }

    pub fn texture_of(&self, id: i64) -> Option<&str> {
        self.textures.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shot and item data tables indexed by graphic id. Loading a path twice is a
/// no-op; reloading re-parses it and overwrites the ids it defines.
#[derive(Default)]
pub struct DataLibrary {
    player_shots: ShotDataTable,
    enemy_shots: ShotDataTable,
    items: HashMap<i64, ItemData>,
    sources: HashMap<DataSlot, Vec<String>>,
}

impl DataLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shot_table(&self, slot: DataSlot) -> Option<&ShotDataTable> {
        match slot {
            DataSlot::PlayerShot => Some(&self.player_shots),
            DataSlot::EnemyShot => Some(&self.enemy_shots),
            DataSlot::Item => None,
        }
    }

    pub fn shot_data(&self, slot: DataSlot, id: i64) -> Option<&ShotData> {
        self.shot_table(slot).and_then(|table| table.get(id))
    }

    pub fn item_data(&self, id: i64) -> Option<&ItemData> {
        self.items.get(&id)
    }

    pub fn is_loaded(&self, slot: DataSlot, path: &str) -> bool {
        self.sources.get(&slot).is_some_and(|paths| paths.iter().any(|p| p == path))
    }

    pub fn sources(&self, slot: DataSlot) -> &[String] {
        self.sources.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn load(&mut self, source: &dyn AssetSource, slot: DataSlot, path: &str) -> Result<()> {
        if self.is_loaded(slot, path) {
            return Ok(());
        }
        self.parse_into(source, slot, path)?;
        self.sources.entry(slot).or_default().push(path.to_string());
        Ok(())
    }

    pub fn reload(&mut self, source: &dyn AssetSource, slot: DataSlot, path: &str) -> Result<()> {
        self.parse_into(source, slot, path)?;
        let paths = self.sources.entry(slot).or_default();
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
        Ok(())
    }

    fn parse_into(&mut self, source: &dyn AssetSource, slot: DataSlot, path: &str) -> Result<()> {
        let bytes = source.read(path)?;
        match slot {
            DataSlot::Item => {
                let file: ItemDataFile = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to parse item data {path}"))?;
                debug!(target: "assets", path, texture = %file.texture, count = file.items.len(), "item data loaded");
                for item in file.items {
                    self.items.insert(item.id, item);
                }
            }
            DataSlot::PlayerShot | DataSlot::EnemyShot => {
                let file: ShotDataFile = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to parse shot data {path}"))?;
                if let Some(dup) = first_duplicate(file.shots.iter().map(|s| s.id)) {
                    return Err(anyhow!("Shot data {path} defines id {dup} more than once"));
                }
                debug!(target: "assets", path, texture = %file.texture, count = file.shots.len(), "shot data loaded");
                let table = match slot {
                    DataSlot::PlayerShot => &mut self.player_shots,
                    _ => &mut self.enemy_shots,
                };
                for shot in file.shots {
                    table.textures.insert(shot.id, file.texture.clone());
                    table.entries.insert(shot.id, shot);
                }
            }
        }
        Ok(())
    }
}

fn first_duplicate(ids: impl Iterator<Item = i64>) -> Option<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOTS: &str = r#"{
        "texture": "shots.png",
        "shots": [
            { "id": 1, "rect": [0, 0, 16, 16], "collision": [{ "radius": 3.0 }] },
            { "id": 2, "delay_color": [255, 0, 0], "blend": 1 }
        ]
    }"#;

    #[test]
    fn loading_same_path_twice_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("shots.json"), SHOTS).expect("write shots");
        let source = FsAssetSource::new(dir.path());
        let mut library = DataLibrary::new();
        library.load(&source, DataSlot::EnemyShot, "shots.json").expect("load");
        library.load(&source, DataSlot::EnemyShot, "shots.json").expect("second load");
        assert_eq!(library.sources(DataSlot::EnemyShot).len(), 1);
        let data = library.shot_data(DataSlot::EnemyShot, 1).expect("shot 1");
        assert_eq!(data.collision[0].radius, 3.0);
        assert_eq!(library.shot_data(DataSlot::EnemyShot, 2).map(|d| d.delay_color), Some([255, 0, 0]));
        assert!(library.shot_data(DataSlot::PlayerShot, 1).is_none());
    }

    #[test]
    fn reload_picks_up_changes_under_the_same_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("shots.json");
        fs::write(&path, SHOTS).expect("write shots");
        let source = FsAssetSource::new(dir.path());
        let mut library = DataLibrary::new();
        library.load(&source, DataSlot::EnemyShot, "shots.json").expect("load");
        fs::write(&path, r#"{ "shots": [{ "id": 1, "collision": [{ "radius": 9.0 }] }] }"#).expect("rewrite");
        library.reload(&source, DataSlot::EnemyShot, "shots.json").expect("reload");
        assert_eq!(library.shot_data(DataSlot::EnemyShot, 1).map(|d| d.collision[0].radius), Some(9.0));
        assert!(library.shot_data(DataSlot::EnemyShot, 2).is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("dup.json"), r#"{ "shots": [{ "id": 4 }, { "id": 4 }] }"#).expect("write");
        let mut library = DataLibrary::new();
        let err = library.load(&FsAssetSource::new(dir.path()), DataSlot::PlayerShot, "dup.json").unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
