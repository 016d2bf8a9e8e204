//! Boss encounters as a stack of steps, each step a list of scene data.
//!
//! Every scene data names a sub-script. Its life pool, timer and spell-card flags are
//! requested from that script when the data becomes active; the answers arrive through
//! a [`SceneDataSource`] so the stage never calls into scripts while borrowed.

use std::collections::BTreeMap;

use tracing::debug;

use super::enemy::EnemyManager;
use super::types::{ObjectId, ObjectState, STANDARD_FPS};

/// Shown for the timer of scene data that has none.
pub const NO_TIMER_SECONDS: i64 = 99;

/// Answers of a scene sub-script to the stage's requests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneDescription {
    /// One entry per boss enemy.
    pub life: Vec<f64>,
    pub timer_seconds: Option<f64>,
    pub spell: bool,
    pub last_spell: bool,
    pub durable_spell: bool,
    pub require_all_down: bool,
    pub spell_score: i64,
}

pub trait SceneDataSource {
    fn describe(&mut self, path: &str) -> SceneDescription;
}

/// Answers every request with the defaults: no life, no timer, not a spell.
pub struct DefaultSceneSource;

impl SceneDataSource for DefaultSceneSource {
    fn describe(&mut self, _path: &str) -> SceneDescription {
        SceneDescription::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneData {
    pub path: String,
    pub description: Option<SceneDescription>,
    pub enemies: Vec<ObjectId>,
    next_enemy: usize,
    /// Remaining frames, negative when untimed.
    pub timer: i64,
    pub original_timer: i64,
    pub timed_out: bool,
    pub spell_started: bool,
    pub shootdown_count: u32,
    pub spell_count: u32,
}

impl SceneData {
    fn new(path: String) -> Self {
        Self {
            path,
            description: None,
            enemies: Vec::new(),
            next_enemy: 0,
            timer: -1,
            original_timer: -1,
            timed_out: false,
            spell_started: false,
            shootdown_count: 0,
            spell_count: 0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.description.is_some()
    }

    pub fn max_life(&self) -> f64 {
        self.description.as_ref().map_or(0.0, |desc| desc.life.iter().sum())
    }

    fn is_spell(&self) -> bool {
        self.description.as_ref().is_some_and(|desc| desc.spell)
    }

    pub fn current_life(&self, enemies: &EnemyManager) -> f64 {
        self.enemies.iter().filter_map(|id| enemies.get(*id)).map(|enemy| enemy.life.max(0.0)).sum()
    }

    /// The data is over once its bosses are down: all of them when it requires all down,
    /// any of them otherwise. Created but unregistered bosses hold the data open.
    pub fn is_finished(&self, enemies: &EnemyManager) -> bool {
        let Some(desc) = &self.description else { return false };
        if self.enemies.is_empty() {
            return true;
        }
        let mut down = self.enemies.iter().map(|id| match enemies.get(*id) {
            None => Some(true),
            Some(enemy) if enemy.state == ObjectState::Inactive => None,
            Some(enemy) => Some(enemy.life <= 0.0),
        });
        if desc.require_all_down {
            down.all(|state| state == Some(true))
        } else {
            let states: Vec<Option<bool>> = down.collect();
            states.iter().all(Option::is_some) && states.iter().any(|state| *state == Some(true))
        }
    }

    /// Spell bonus is earned without shootdowns or bombs, and without a timeout
    /// unless the spell is a durable one.
    pub fn earns_bonus(&self) -> Option<i64> {
        let desc = self.description.as_ref()?;
        let clean = self.shootdown_count == 0 && self.spell_count == 0;
        (desc.spell && clean && (!self.timed_out || desc.durable_spell)).then_some(desc.spell_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossScene {
    pub id: ObjectId,
    pub state: ObjectState,
    steps: Vec<Vec<SceneData>>,
    step: usize,
    index: usize,
    pub loaded: bool,
}

/// How one frame of bookkeeping changed the active scene data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneProgress {
    pub timed_out: bool,
    /// Finished data: its bosses and its spell bonus, if earned.
    pub finished: Option<(Vec<ObjectId>, Option<i64>, bool)>,
    pub scene_over: bool,
}

impl BossScene {
    pub fn new(id: ObjectId) -> Self {
        Self { id, state: ObjectState::Inactive, steps: Vec::new(), step: 0, index: 0, loaded: false }
    }

    /// Appends scene data to `step`, growing the step list as needed.
    pub fn add(&mut self, step: usize, path: &str) {
        if self.steps.len() <= step {
            self.steps.resize_with(step + 1, Vec::new);
        }
        self.steps[step].push(SceneData::new(path.to_string()));
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().flatten().map(|data| data.path.as_str())
    }

    /// Points at the first data of the first non-empty step.
    pub fn begin(&mut self) -> bool {
        self.step = 0;
        self.index = 0;
        self.skip_empty_steps()
    }

    fn skip_empty_steps(&mut self) -> bool {
        while self.step < self.steps.len() && self.index >= self.steps[self.step].len() {
            self.step += 1;
            self.index = 0;
        }
        self.step < self.steps.len()
    }

    pub fn active_data(&self) -> Option<&SceneData> {
        if self.state != ObjectState::Active {
            return None;
        }
        self.steps.get(self.step).and_then(|datas| datas.get(self.index))
    }

    pub fn active_data_mut(&mut self) -> Option<&mut SceneData> {
        if self.state != ObjectState::Active {
            return None;
        }
        self.steps.get_mut(self.step).and_then(|datas| datas.get_mut(self.index))
    }

    /// Path of the active data while it still waits for its description.
    pub fn pending_path(&self) -> Option<&str> {
        self.active_data().filter(|data| !data.is_resolved()).map(|data| data.path.as_str())
    }

    /// Installs the description of the active data along with the boss enemies created for it.
    pub fn resolve(&mut self, description: SceneDescription, enemies: Vec<ObjectId>) {
        let Some(data) = self.active_data_mut() else { return };
        let timer = description.timer_seconds.map_or(-1, |seconds| (seconds * STANDARD_FPS as f64) as i64);
        data.timer = timer;
        data.original_timer = timer;
        data.enemies = enemies;
        data.next_enemy = 0;
        data.description = Some(description);
    }

    /// Hands out the active data's boss enemies in order, one per call.
    pub fn next_boss_enemy(&mut self) -> Option<ObjectId> {
        let data = self.active_data_mut()?;
        let id = data.enemies.get(data.next_enemy).copied()?;
        data.next_enemy += 1;
        Some(id)
    }

    pub fn set_spell_timer(&mut self, seconds: f64) {
        if let Some(data) = self.active_data_mut() {
            let frames = (seconds * STANDARD_FPS as f64) as i64;
            data.timer = frames;
            data.original_timer = frames;
        }
    }

    /// Turns the active data into a spell card or back. False without active data.
    pub fn set_spell_card(&mut self, spell: bool) -> bool {
        let Some(data) = self.active_data_mut() else { return false };
        data.spell_started = spell;
        if let Some(description) = data.description.as_mut() {
            description.spell = spell;
        }
        true
    }

    pub fn remain_step_count(&self) -> usize {
        self.steps.len().saturating_sub(self.step + 1)
    }

    fn active_step(&self) -> &[SceneData] {
        match self.steps.get(self.step) {
            Some(datas) if self.state == ObjectState::Active => &datas[self.index.min(datas.len())..],
            _ => &[],
        }
    }

    pub fn active_step_life_count(&self) -> usize {
        self.active_step().len()
    }

    pub fn active_step_total_max_life(&self) -> f64 {
        self.active_step().iter().map(SceneData::max_life).sum()
    }

    /// Life left in the current data plus the full pools of the data after it.
    pub fn active_step_total_life(&self, enemies: &EnemyManager) -> f64 {
        self.active_step()
            .iter()
            .enumerate()
            .map(|(i, data)| if i == 0 { data.current_life(enemies) } else { data.max_life() })
            .sum()
    }

    /// Fill ratio of each remaining data in the active step.
    pub fn active_step_life_rates(&self, enemies: &EnemyManager) -> Vec<f64> {
        self.active_step()
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let max = data.max_life();
                match (i, max > 0.0) {
                    (_, false) => 0.0,
                    (0, true) => data.current_life(enemies) / max,
                    (_, true) => 1.0,
                }
            })
            .collect()
    }

    pub fn is_last_step(&self) -> bool {
        self.state == ObjectState::Active && self.step + 1 >= self.steps.len()
    }

    /// Timer in whole seconds, or [`NO_TIMER_SECONDS`] when untimed.
    pub fn timer_seconds(&self) -> i64 {
        match self.active_data() {
            Some(data) if data.timer >= 0 => data.timer / STANDARD_FPS,
            _ => NO_TIMER_SECONDS,
        }
    }

    /// Counts the timer down and reports whether it just ran out.
    pub fn tick_timer(&mut self) -> bool {
        let Some(data) = self.active_data_mut() else { return false };
        if !data.is_resolved() || data.timer <= 0 {
            return false;
        }
        data.timer -= 1;
        if data.timer == 0 {
            data.timed_out = true;
            return true;
        }
        false
    }

    /// Moves past the active data. Returns false once no data is left.
    pub fn advance(&mut self) -> bool {
        self.index += 1;
        self.skip_empty_steps()
    }

    pub fn record_shootdown(&mut self) {
        if let Some(data) = self.active_data_mut() {
            data.shootdown_count += 1;
        }
    }

    pub fn record_spell(&mut self) {
        if let Some(data) = self.active_data_mut() {
            data.spell_count += 1;
        }
    }

    /// One frame of timer and step bookkeeping against the live enemy table.
    pub fn progress(&mut self, enemies: &EnemyManager) -> SceneProgress {
        let mut progress = SceneProgress { timed_out: self.tick_timer(), ..SceneProgress::default() };
        let Some(data) = self.active_data() else { return progress };
        if !data.is_finished(enemies) && !progress.timed_out {
            return progress;
        }
        progress.finished = Some((data.enemies.clone(), data.earns_bonus(), data.is_spell() || data.spell_started));
        debug!(target: "stage", scene = %self.id, step = self.step, index = self.index, "boss scene data finished");
        if !self.advance() {
            self.state = ObjectState::Deleted;
            progress.scene_over = true;
        }
        progress
    }
}

#[derive(Default)]
pub struct BossSceneManager {
    scenes: BTreeMap<ObjectId, BossScene>,
    active: Option<ObjectId>,
}

impl BossSceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scene: BossScene) {
        self.scenes.insert(scene.id, scene);
    }

    pub fn get(&self, id: ObjectId) -> Option<&BossScene> {
        self.scenes.get(&id).filter(|scene| scene.state != ObjectState::Deleted)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut BossScene> {
        self.scenes.get_mut(&id).filter(|scene| scene.state != ObjectState::Deleted)
    }

    /// Activates a scene. Only one scene runs at a time; a second registration is refused.
    pub fn activate(&mut self, id: ObjectId) -> bool {
        if self.active().is_some() {
            return false;
        }
        match self.scenes.get_mut(&id) {
            Some(scene) if scene.state == ObjectState::Inactive => {
                scene.state = ObjectState::Active;
                if !scene.begin() {
                    scene.state = ObjectState::Deleted;
                    return false;
                }
                self.active = Some(id);
                true
            }
            _ => false,
        }
    }

    pub fn active_id(&self) -> Option<ObjectId> {
        self.active().map(|scene| scene.id)
    }

    pub fn active(&self) -> Option<&BossScene> {
        self.active.and_then(|id| self.scenes.get(&id)).filter(|scene| scene.state == ObjectState::Active)
    }

    pub fn active_mut(&mut self) -> Option<&mut BossScene> {
        let id = self.active?;
        self.scenes.get_mut(&id).filter(|scene| scene.state == ObjectState::Active)
    }

    /// Active data paths that still wait for their description.
    pub fn pending_activation(&self) -> Vec<String> {
        self.active().and_then(BossScene::pending_path).map(str::to_string).into_iter().collect()
    }

    pub fn mark_deleted(&mut self, id: ObjectId) -> bool {
        match self.scenes.get_mut(&id) {
            Some(scene) if scene.state != ObjectState::Deleted => {
                scene.state = ObjectState::Deleted;
                true
            }
            _ => false,
        }
    }

    pub fn remove_deleted(&mut self) -> Vec<BossScene> {
        let doomed: Vec<ObjectId> = self
            .scenes
            .iter()
            .filter(|(_, scene)| scene.state == ObjectState::Deleted)
            .map(|(id, _)| *id)
            .collect();
        if self.active.is_some_and(|id| doomed.contains(&id)) {
            self.active = None;
        }
        doomed.into_iter().filter_map(|id| self.scenes.remove(&id)).collect()
    }
}
