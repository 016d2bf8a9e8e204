use std::collections::BTreeMap;

use glam::Vec2;
use tracing::debug;

use crate::config::PlayerConfig;
use crate::geometry::{Circle, Shape, WidthLine};
use crate::intersection::{
    IntersectionManager, IntersectionTarget, TargetCategory, TargetFlags, TargetHandle, TargetOwner,
};
use crate::movement::{MoveObject, StepEnv};

use super::types::{ObjectId, ObjectState};

/// Penetration of a spell object that never set one.
const DEFAULT_SPELL_PENETRATION: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Normal,
    /// Hit and waiting out the deathbomb window.
    Hit,
    Down,
    End,
}

impl PlayerState {
    pub fn to_script(self) -> i64 {
        match self {
            PlayerState::Normal => 0,
            PlayerState::Hit => 1,
            PlayerState::Down => 2,
            PlayerState::End => 3,
        }
    }
}

/// What a player state change means for the rest of the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTransition {
    Shootdown,
    Rebirth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlayerHitbox {
    offset: Vec2,
    radius: f32,
    handle: TargetHandle,
}

/// Rectangle the player position is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerClip {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerObject {
    pub id: ObjectId,
    pub state: PlayerState,
    pub motion: MoveObject,
    pub speed_fast: f32,
    pub speed_slow: f32,
    pub clip: PlayerClip,
    pub life: f64,
    pub spell: f64,
    pub power: f64,
    pub invincibility: u32,
    pub down_state_frames: u32,
    pub rebirth_frames: u32,
    pub rebirth_loss_frames: u32,
    counter: u32,
    pub start: Vec2,
    pub rebirth_position: Option<Vec2>,
    pub item_collect_line: f32,
    pub item_scope: f32,
    pub graze_count: u32,
    pub forbid_shot: bool,
    pub forbid_spell: bool,
    pub shootdown_event: bool,
    /// When off, running out of lives keeps cycling through rebirth instead of ending.
    pub state_end_enabled: bool,
    pub invincible_graze: bool,
    pub erase_shot_on_hit: bool,
    pub render_priority: i32,
    hitboxes: Vec<PlayerHitbox>,
    pub(crate) owner_slot: Option<TargetOwner>,
}

impl PlayerObject {
    pub fn new(id: ObjectId, config: &PlayerConfig, field: Vec2, render_priority: i32) -> Self {
        let start = Vec2::from(config.start);
        Self {
            id,
            state: PlayerState::Normal,
            motion: MoveObject::at(start),
            speed_fast: config.speed_fast,
            speed_slow: config.speed_slow,
            clip: PlayerClip { left: 0.0, top: 0.0, right: field.x, bottom: field.y },
            life: config.life,
            spell: config.spell,
            power: config.power,
            invincibility: config.invincibility_frames,
            down_state_frames: config.down_state_frames,
            rebirth_frames: config.rebirth_frames,
            rebirth_loss_frames: 0,
            counter: 0,
            start,
            rebirth_position: None,
            item_collect_line: config.item_collect_line,
            item_scope: config.item_scope,
            graze_count: 0,
            forbid_shot: false,
            forbid_spell: false,
            shootdown_event: true,
            state_end_enabled: true,
            invincible_graze: false,
            erase_shot_on_hit: false,
            render_priority,
            hitboxes: Vec::new(),
            owner_slot: None,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.motion.position
    }

    pub fn is_normal(&self) -> bool {
        self.state == PlayerState::Normal
    }

    /// Hits only count in the normal state and outside invincibility.
    pub fn is_vulnerable(&self) -> bool {
        self.is_normal() && self.invincibility == 0
    }

    pub fn can_graze(&self) -> bool {
        self.is_normal() && (self.invincibility == 0 || self.invincible_graze)
    }

    pub fn permits_shot(&self) -> bool {
        !self.forbid_shot && self.is_normal()
    }

    pub fn permits_spell(&self) -> bool {
        !self.forbid_spell && matches!(self.state, PlayerState::Normal | PlayerState::Hit)
    }

    pub fn is_last_spell_wait(&self) -> bool {
        self.state == PlayerState::Hit
    }

    /// Starts the deathbomb window. Returns false when the hit does not count.
    pub fn hit(&mut self) -> bool {
        if !self.is_vulnerable() {
            return false;
        }
        self.state = PlayerState::Hit;
        self.counter = self.rebirth_frames;
        if self.counter == 0 {
            self.counter = 1;
        }
        true
    }

    /// Script-requested death: enters the deathbomb window even while invincible.
    pub fn kill(&mut self) -> bool {
        if !self.is_normal() {
            return false;
        }
        self.state = PlayerState::Hit;
        self.counter = self.rebirth_frames.max(1);
        true
    }

    /// A spell cast during the deathbomb window cancels the pending shootdown.
    pub fn cancel_hit(&mut self) {
        if self.state == PlayerState::Hit {
            self.state = PlayerState::Normal;
            self.counter = 0;
        }
    }

    /// Loses a life at once. The player falls into the down state, or ends when out of lives.
    pub fn shoot_down(&mut self) -> PlayerTransition {
        self.life -= 1.0;
        self.rebirth_frames = self.rebirth_frames.saturating_sub(self.rebirth_loss_frames);
        if self.life < 0.0 && self.state_end_enabled {
            self.state = PlayerState::End;
        } else {
            self.state = PlayerState::Down;
            self.counter = self.down_state_frames.max(1);
        }
        debug!(target: "stage", player = %self.id, life = self.life, state = ?self.state, "player shot down");
        PlayerTransition::Shootdown
    }

    fn rebirth(&mut self) -> PlayerTransition {
        self.state = PlayerState::Normal;
        self.motion.position = self.rebirth_position.unwrap_or(self.start);
        self.invincibility = self.invincibility.max(self.down_state_frames);
        PlayerTransition::Rebirth
    }

    /// One frame of movement and state countdowns.
    pub fn step(&mut self, env: StepEnv<'_>) -> Option<PlayerTransition> {
        self.invincibility = self.invincibility.saturating_sub(1);
        if matches!(self.state, PlayerState::Normal | PlayerState::Hit) {
            self.motion.step(env);
            let p = self.motion.position;
            self.motion.position =
                Vec2::new(p.x.clamp(self.clip.left, self.clip.right), p.y.clamp(self.clip.top, self.clip.bottom));
        }
        match self.state {
            PlayerState::Hit => {
                self.counter = self.counter.saturating_sub(1);
                (self.counter == 0).then(|| self.shoot_down())
            }
            PlayerState::Down => {
                self.counter = self.counter.saturating_sub(1);
                (self.counter == 0).then(|| self.rebirth())
            }
            PlayerState::Normal | PlayerState::End => None,
        }
    }

    /// Adds a hit circle of `hit_radius` and a graze circle reaching `graze_radius` further.
    pub fn add_hit_circle(&mut self, intersection: &mut IntersectionManager, offset: Vec2, hit_radius: f32, graze_radius: f32) {
        self.add_circle(intersection, offset, hit_radius, TargetCategory::Player);
        self.add_graze_circle(intersection, offset, hit_radius + graze_radius);
    }

    pub fn add_graze_circle(&mut self, intersection: &mut IntersectionManager, offset: Vec2, radius: f32) {
        self.add_circle(intersection, offset, radius, TargetCategory::PlayerGraze);
    }

    fn add_circle(&mut self, intersection: &mut IntersectionManager, offset: Vec2, radius: f32, category: TargetCategory) {
        let Some(owner) = self.owner_slot else { return };
        let shape = Shape::Circle(Circle { center: self.position() + offset, radius });
        let target = IntersectionTarget::new(shape, category).with_owner(owner);
        if let Some(handle) = intersection.add_persistent_target(target) {
            self.hitboxes.push(PlayerHitbox { offset, radius, handle });
        }
    }

    pub fn clear_hitboxes(&mut self, intersection: &mut IntersectionManager) {
        for hitbox in self.hitboxes.drain(..) {
            intersection.remove_target(hitbox.handle);
        }
    }

    pub fn sync_hitboxes(&self, intersection: &mut IntersectionManager) {
        for hitbox in &self.hitboxes {
            let shape = Shape::Circle(Circle { center: self.position() + hitbox.offset, radius: hitbox.radius });
            intersection.set_target_shape(hitbox.handle, shape);
        }
    }

    pub fn hitbox_count(&self) -> usize {
        self.hitboxes.len()
    }
}

/// Player-side bomb hitbox owner. Its shapes are resubmitted every frame by the spell script.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellObject {
    pub id: ObjectId,
    pub state: ObjectState,
    pub damage: f64,
    pub penetration: f64,
    pub erase_shot: bool,
    pub render_priority: i32,
    pub(crate) owner_slot: Option<TargetOwner>,
}

impl SpellObject {
    pub fn new(id: ObjectId, render_priority: i32) -> Self {
        Self {
            id,
            state: ObjectState::Inactive,
            damage: 0.0,
            penetration: DEFAULT_SPELL_PENETRATION,
            erase_shot: true,
            render_priority,
            owner_slot: None,
        }
    }

    fn submit(&self, intersection: &mut IntersectionManager, shape: Shape) {
        let Some(owner) = self.owner_slot else { return };
        if self.state != ObjectState::Active {
            return;
        }
        let flags = if self.erase_shot { TargetFlags::ERASE_SHOT } else { TargetFlags::empty() };
        let target = IntersectionTarget::new(shape, TargetCategory::PlayerSpell).with_owner(owner).with_flags(flags);
        intersection.add_target(target);
    }

    pub fn add_circle(&self, intersection: &mut IntersectionManager, circle: Circle) {
        self.submit(intersection, Shape::Circle(circle));
    }

    pub fn add_line(&self, intersection: &mut IntersectionManager, line: WidthLine) {
        self.submit(intersection, Shape::Line(line));
    }
}

/// The player, its spell-manage object and the spell hitbox objects.
#[derive(Default)]
pub struct PlayerManager {
    player: Option<PlayerObject>,
    spell_manage: Option<ObjectId>,
    spells: BTreeMap<ObjectId, SpellObject>,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, player: PlayerObject) {
        self.player = Some(player);
    }

    pub fn player(&self) -> Option<&PlayerObject> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerObject> {
        self.player.as_mut()
    }

    pub fn player_id(&self) -> Option<ObjectId> {
        self.player.as_ref().map(|player| player.id)
    }

    pub fn position(&self) -> Option<Vec2> {
        self.player.as_ref().filter(|player| player.state != PlayerState::End).map(PlayerObject::position)
    }

    pub fn spell_manage(&self) -> Option<ObjectId> {
        self.spell_manage
    }

    pub fn is_spell_active(&self) -> bool {
        self.spell_manage.is_some()
    }

    pub fn permits_spell(&self) -> bool {
        !self.is_spell_active() && self.player.as_ref().is_some_and(PlayerObject::permits_spell)
    }

    /// Starts a spell under `manage`. Refused while another spell runs or the player may not cast.
    pub fn begin_spell(&mut self, manage: ObjectId) -> bool {
        if !self.permits_spell() {
            return false;
        }
        if let Some(player) = self.player.as_mut() {
            player.cancel_hit();
        }
        self.spell_manage = Some(manage);
        true
    }

    pub fn end_spell(&mut self, manage: ObjectId) -> bool {
        if self.spell_manage == Some(manage) {
            self.spell_manage = None;
            return true;
        }
        false
    }

    pub fn insert_spell(&mut self, spell: SpellObject) {
        self.spells.insert(spell.id, spell);
    }

    pub fn spell(&self, id: ObjectId) -> Option<&SpellObject> {
        self.spells.get(&id).filter(|spell| spell.state != ObjectState::Deleted)
    }

    pub fn spell_mut(&mut self, id: ObjectId) -> Option<&mut SpellObject> {
        self.spells.get_mut(&id).filter(|spell| spell.state != ObjectState::Deleted)
    }

    pub fn activate_spell(&mut self, id: ObjectId) -> bool {
        match self.spells.get_mut(&id) {
            Some(spell) if spell.state == ObjectState::Inactive => {
                spell.state = ObjectState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn mark_spell_deleted(&mut self, id: ObjectId) -> bool {
        match self.spells.get_mut(&id) {
            Some(spell) if spell.state != ObjectState::Deleted => {
                spell.state = ObjectState::Deleted;
                true
            }
            _ => false,
        }
    }

    pub fn remove_deleted_spells(&mut self) -> Vec<SpellObject> {
        let doomed: Vec<ObjectId> = self
            .spells
            .iter()
            .filter(|(_, spell)| spell.state == ObjectState::Deleted)
            .map(|(id, _)| *id)
            .collect();
        doomed.into_iter().filter_map(|id| self.spells.remove(&id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerObject {
        let config = PlayerConfig { rebirth_frames: 3, down_state_frames: 4, life: 1.0, ..PlayerConfig::default() };
        PlayerObject::new(ObjectId(0), &config, Vec2::new(384.0, 448.0), 30)
    }

    #[test]
    fn hit_runs_through_down_and_rebirth() {
        let mut player = player();
        player.rebirth_position = Some(Vec2::new(10.0, 20.0));
        assert!(player.hit());
        assert!(!player.hit());
        assert_eq!(player.step(StepEnv::default()), None);
        assert_eq!(player.step(StepEnv::default()), None);
        assert_eq!(player.step(StepEnv::default()), Some(PlayerTransition::Shootdown));
        assert_eq!(player.state, PlayerState::Down);
        assert_eq!(player.life, 0.0);
        for _ in 0..3 {
            assert_eq!(player.step(StepEnv::default()), None);
        }
        assert_eq!(player.step(StepEnv::default()), Some(PlayerTransition::Rebirth));
        assert!(player.is_normal());
        assert_eq!(player.position(), Vec2::new(10.0, 20.0));
        assert!(!player.is_vulnerable());
    }

    #[test]
    fn deathbomb_cancels_the_shootdown() {
        let mut manager = PlayerManager::new();
        manager.install(player());
        manager.player_mut().expect("player").hit();
        assert!(manager.player().expect("player").is_last_spell_wait());
        assert!(manager.begin_spell(ObjectId(9)));
        assert!(manager.player().expect("player").is_normal());
        assert!(!manager.begin_spell(ObjectId(10)));
        assert!(manager.end_spell(ObjectId(9)));
        assert!(manager.permits_spell());
    }

    #[test]
    fn running_out_of_lives_ends_the_player() {
        let mut player = player();
        player.shoot_down();
        player.state = PlayerState::Normal;
        player.shoot_down();
        assert_eq!(player.state, PlayerState::End);
        assert!(!player.permits_shot());
        assert!(!player.permits_spell());
    }

    #[test]
    fn hit_and_graze_circles_share_the_offset() {
        let mut intersection = IntersectionManager::new(32.0);
        let mut player = player();
        player.owner_slot = Some(intersection.register_owner(player.id));
        player.add_hit_circle(&mut intersection, Vec2::ZERO, 2.0, 16.0);
        assert_eq!(player.hitbox_count(), 2);
        let radii: Vec<f32> = intersection
            .targets_of(player.id)
            .iter()
            .filter_map(|target| match target.shape {
                Shape::Circle(circle) => Some(circle.radius),
                Shape::Line(_) => None,
            })
            .collect();
        assert_eq!(radii, vec![2.0, 18.0]);
        player.clear_hitboxes(&mut intersection);
        assert!(intersection.targets_of(player.id).is_empty());
    }
}
