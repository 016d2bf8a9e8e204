use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    #[serde(default = "FieldConfig::default_width")]
    pub width: f32,
    #[serde(default = "FieldConfig::default_height")]
    pub height: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapsConfig {
    #[serde(default = "CapsConfig::default_shot_max")]
    pub shot_max: usize,
    #[serde(default = "CapsConfig::default_item_max")]
    pub item_max: usize,
}

/// Margins around the field; auto-delete shots outside them are removed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClipMargins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntersectionConfig {
    #[serde(default = "IntersectionConfig::default_grid_cell")]
    pub grid_cell: f32,
    #[serde(default = "IntersectionConfig::default_weighted_epsilon")]
    pub weighted_arrival_epsilon: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "PlayerConfig::default_speed_fast")]
    pub speed_fast: f32,
    #[serde(default = "PlayerConfig::default_speed_slow")]
    pub speed_slow: f32,
    #[serde(default = "PlayerConfig::default_life")]
    pub life: f64,
    #[serde(default = "PlayerConfig::default_spell")]
    pub spell: f64,
    #[serde(default = "PlayerConfig::default_power")]
    pub power: f64,
    #[serde(default)]
    pub invincibility_frames: u32,
    #[serde(default = "PlayerConfig::default_down_state_frames")]
    pub down_state_frames: u32,
    #[serde(default = "PlayerConfig::default_rebirth_frames")]
    pub rebirth_frames: u32,
    #[serde(default = "PlayerConfig::default_item_collect_line")]
    pub item_collect_line: f32,
    #[serde(default = "PlayerConfig::default_item_scope")]
    pub item_scope: f32,
    #[serde(default = "PlayerConfig::default_start")]
    pub start: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    #[serde(default = "ItemConfig::default_intersection_radius")]
    pub intersection_radius: f32,
    #[serde(default = "ItemConfig::default_bonus")]
    pub default_bonus: bool,
    #[serde(default = "ItemConfig::default_collect_speed")]
    pub collect_speed: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "RenderConfig::default_player")]
    pub player: i32,
    #[serde(default = "RenderConfig::default_enemy")]
    pub enemy: i32,
    #[serde(default = "RenderConfig::default_shot")]
    pub shot: i32,
    #[serde(default = "RenderConfig::default_item")]
    pub item: i32,
    #[serde(default = "RenderConfig::default_frame_min")]
    pub frame_min: i32,
    #[serde(default = "RenderConfig::default_frame_max")]
    pub frame_max: i32,
    #[serde(default = "RenderConfig::default_camera_focus_permit")]
    pub camera_focus_permit: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default)]
    pub field: FieldConfig,
    #[serde(default)]
    pub caps: CapsConfig,
    #[serde(default)]
    pub shot_auto_delete_clip: ClipMargins,
    #[serde(default)]
    pub intersection: IntersectionConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub items: ItemConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default = "StageConfig::default_shot_fade_frames")]
    pub shot_fade_frames: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StageConfigOverrides {
    pub shot_max: Option<usize>,
    pub item_max: Option<usize>,
    pub seed: Option<u64>,
}

impl FieldConfig {
    const fn default_width() -> f32 {
        384.0
    }

    const fn default_height() -> f32 {
        448.0
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self { width: Self::default_width(), height: Self::default_height() }
    }
}

impl CapsConfig {
    const fn default_shot_max() -> usize {
        10_000
    }

    const fn default_item_max() -> usize {
        10_000
    }
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self { shot_max: Self::default_shot_max(), item_max: Self::default_item_max() }
    }
}

impl Default for ClipMargins {
    fn default() -> Self {
        Self { left: 64.0, top: 64.0, right: 64.0, bottom: 64.0 }
    }
}

impl IntersectionConfig {
    const fn default_grid_cell() -> f32 {
        32.0
    }

    const fn default_weighted_epsilon() -> f32 {
        0.5
    }
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            grid_cell: Self::default_grid_cell(),
            weighted_arrival_epsilon: Self::default_weighted_epsilon(),
        }
    }
}

impl PlayerConfig {
    const fn default_speed_fast() -> f32 {
        4.0
    }

    const fn default_speed_slow() -> f32 {
        1.6
    }

    const fn default_life() -> f64 {
        2.0
    }

    const fn default_spell() -> f64 {
        3.0
    }

    const fn default_power() -> f64 {
        1.0
    }

    const fn default_down_state_frames() -> u32 {
        120
    }

    const fn default_rebirth_frames() -> u32 {
        15
    }

    const fn default_item_collect_line() -> f32 {
        160.0
    }

    const fn default_item_scope() -> f32 {
        24.0
    }

    const fn default_start() -> [f32; 2] {
        [192.0, 384.0]
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed_fast: Self::default_speed_fast(),
            speed_slow: Self::default_speed_slow(),
            life: Self::default_life(),
            spell: Self::default_spell(),
            power: Self::default_power(),
            invincibility_frames: 0,
            down_state_frames: Self::default_down_state_frames(),
            rebirth_frames: Self::default_rebirth_frames(),
            item_collect_line: Self::default_item_collect_line(),
            item_scope: Self::default_item_scope(),
            start: Self::default_start(),
        }
    }
}

impl ItemConfig {
    const fn default_intersection_radius() -> f32 {
        16.0
    }

    const fn default_bonus() -> bool {
        true
    }

    const fn default_collect_speed() -> f32 {
        8.0
    }
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            intersection_radius: Self::default_intersection_radius(),
            default_bonus: Self::default_bonus(),
            collect_speed: Self::default_collect_speed(),
        }
    }
}

impl RenderConfig {
    const fn default_player() -> i32 {
        30
    }

    const fn default_enemy() -> i32 {
        40
    }

    const fn default_shot() -> i32 {
        50
    }

    const fn default_item() -> i32 {
        60
    }

    const fn default_frame_min() -> i32 {
        20
    }

    const fn default_frame_max() -> i32 {
        80
    }

    const fn default_camera_focus_permit() -> i32 {
        69
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            player: Self::default_player(),
            enemy: Self::default_enemy(),
            shot: Self::default_shot(),
            item: Self::default_item(),
            frame_min: Self::default_frame_min(),
            frame_max: Self::default_frame_max(),
            camera_focus_permit: Self::default_camera_focus_permit(),
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            caps: CapsConfig::default(),
            shot_auto_delete_clip: ClipMargins::default(),
            intersection: IntersectionConfig::default(),
            player: PlayerConfig::default(),
            items: ItemConfig::default(),
            render: RenderConfig::default(),
            shot_fade_frames: Self::default_shot_fade_frames(),
            seed: None,
        }
    }
}

impl StageConfig {
    const fn default_shot_fade_frames() -> u32 {
        30
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read stage config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse stage config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(target: "config", error = ?err, "stage config load failed; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &StageConfigOverrides) {
        if let Some(shot_max) = overrides.shot_max {
            self.caps.shot_max = shot_max;
        }
        if let Some(item_max) = overrides.item_max {
            self.caps.item_max = item_max;
        }
        if let Some(seed) = overrides.seed {
            self.seed = Some(seed);
        }
    }
}

impl StageConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.shot_max.is_none() && self.item_max.is_none() && self.seed.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.shot_max.is_some() {
            fields.push("shot_max");
        }
        if self.item_max.is_some() {
            fields.push("item_max");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(file, r#"{{ "caps": {{ "shot_max": 16 }}, "player": {{ "life": 5 }} }}"#).expect("write config");
        let cfg = StageConfig::load(file.path()).expect("load config");
        assert_eq!(cfg.caps.shot_max, 16);
        assert_eq!(cfg.caps.item_max, 10_000);
        assert_eq!(cfg.player.life, 5.0);
        assert_eq!(cfg.player.spell, 3.0);
        assert_eq!(cfg.shot_fade_frames, 30);
        assert_eq!(cfg.render.shot, 50);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = StageConfig::load_or_default(dir.path().join("missing.json"));
        assert_eq!(cfg.field.width, 384.0);
        assert_eq!(cfg.intersection.grid_cell, 32.0);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut cfg = StageConfig::default();
        let overrides = StageConfigOverrides { shot_max: Some(4), item_max: None, seed: Some(9) };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.caps.shot_max, 4);
        assert_eq!(cfg.caps.item_max, 10_000);
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(overrides.applied_fields(), vec!["shot_max", "seed"]);
        assert!(StageConfigOverrides::default().is_empty());
    }
}
