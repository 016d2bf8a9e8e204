use std::collections::BTreeMap;

use tracing::debug;

use crate::stage::STANDARD_FPS;

/// Who asked for the slowdown. Player and enemy requests are tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlowOwner {
    Player,
    Enemy,
}

/// Which part of the stage a slowdown applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlowTarget {
    All,
    Enemy,
    Player,
}

impl SlowTarget {
    pub fn from_script(raw: i64) -> SlowTarget {
        match raw {
            1 => SlowTarget::Enemy,
            2 => SlowTarget::Player,
            _ => SlowTarget::All,
        }
    }
}

/// Frame counter of the stage plus the active slow-motion requests.
#[derive(Debug, Clone, Default)]
pub struct StageClock {
    frame: u64,
    requests: BTreeMap<(SlowOwner, SlowTarget), u32>,
}

impl StageClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) {
        self.frame += 1;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds of game time at the standard rate.
    pub fn elapsed_seconds(&self) -> f64 {
        self.frame as f64 / STANDARD_FPS as f64
    }

    /// Replaces the owner's request for `target`. The rate is clamped into `1..=60`.
    pub fn start_slow(&mut self, owner: SlowOwner, target: SlowTarget, fps: i64) {
        let fps = fps.clamp(1, STANDARD_FPS) as u32;
        debug!(target: "stage", ?owner, ?target, fps, "slow requested");
        self.requests.insert((owner, target), fps);
    }

    pub fn stop_slow(&mut self, owner: SlowOwner, target: SlowTarget) {
        self.requests.remove(&(owner, target));
    }

    /// Effective rate for `target`: the slowest request that covers it.
    pub fn fps(&self, target: SlowTarget) -> u32 {
        self.requests
            .iter()
            .filter(|((_, requested), _)| *requested == SlowTarget::All || *requested == target || target == SlowTarget::All)
            .map(|(_, fps)| *fps)
            .min()
            .unwrap_or(STANDARD_FPS as u32)
    }

    pub fn is_slowed(&self) -> bool {
        !self.requests.is_empty()
    }
}
