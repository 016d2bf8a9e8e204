//! Headless danmaku stage runtime: stage objects, their movement and collision, and the
//! script-facing function table that drives them.

pub mod assets;
pub mod cli;
pub mod common_data;
pub mod config;
pub mod events;
pub mod geometry;
pub mod intersection;
pub mod movement;
pub mod pattern_shot;
pub mod script_harness;
pub mod scripts;
pub mod stage;
pub mod time;

pub use config::{StageConfig, StageConfigOverrides};
pub use scripts::{ScriptInstance, ScriptKind, StageScriptHost};
pub use stage::StageContext;

/// Normalizes an angle into `(-PI, PI]`.
pub fn wrap_angle(radians: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (radians + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Script angles are degrees; internal state is radians.
pub fn degrees_to_radians(degrees: f64) -> f32 {
    degrees.to_radians() as f32
}

pub fn radians_to_degrees(radians: f32) -> f64 {
    f64::from(radians).to_degrees()
}
