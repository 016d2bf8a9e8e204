use std::collections::BTreeMap;

use glam::Vec2;

use crate::geometry::{Circle, Shape};
use crate::intersection::{
    IntersectionManager, IntersectionTarget, TargetCategory, TargetFlags, TargetHandle, TargetLifetime, TargetOwner,
};
use crate::movement::{MoveObject, StepEnv};

use super::types::{ObjectId, ObjectState};

/// Hitbox that follows the enemy at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeHitbox {
    pub offset: Vec2,
    pub radius: f32,
    handle: TargetHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyObject {
    pub id: ObjectId,
    pub state: ObjectState,
    pub boss: bool,
    pub motion: MoveObject,
    pub life: f64,
    /// Damage multipliers in percent.
    pub rate_shot: f64,
    pub rate_spell: f64,
    /// Player shots that hit during the latest pass.
    pub hit_count: u32,
    pub fetch_position: bool,
    pub render_priority: i32,
    hitboxes: Vec<RelativeHitbox>,
    to_shot: Vec<TargetHandle>,
    to_player: Vec<TargetHandle>,
    pub(crate) owner_slot: Option<TargetOwner>,
}

impl EnemyObject {
    pub fn new(id: ObjectId, boss: bool, render_priority: i32) -> Self {
        Self {
            id,
            state: ObjectState::Inactive,
            boss,
            motion: MoveObject::default(),
            life: 0.0,
            rate_shot: 100.0,
            rate_spell: 100.0,
            hit_count: 0,
            fetch_position: true,
            render_priority,
            hitboxes: Vec::new(),
            to_shot: Vec::new(),
            to_player: Vec::new(),
            owner_slot: None,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.motion.position
    }

    pub fn is_alive(&self) -> bool {
        self.state == ObjectState::Active && self.life > 0.0
    }

    /// Applies `amount` scaled by the shot or spell rate. Life never drops below zero.
    pub fn take_damage(&mut self, amount: f64, spell: bool) -> f64 {
        let rate = if spell { self.rate_spell } else { self.rate_shot };
        let dealt = amount * rate / 100.0;
        self.life = (self.life - dealt).max(0.0);
        dealt
    }

    pub fn hitboxes(&self) -> &[RelativeHitbox] {
        &self.hitboxes
    }

    fn flags(&self) -> TargetFlags {
        if self.fetch_position {
            TargetFlags::FETCH_POSITION
        } else {
            TargetFlags::empty()
        }
    }

    /// Adds a persistent hitbox checked against both player shots and the player body.
    pub fn add_relative_hitbox(&mut self, intersection: &mut IntersectionManager, offset: Vec2, radius: f32) {
        let Some(owner) = self.owner_slot else { return };
        let shape = Shape::Circle(Circle { center: self.position() + offset, radius });
        let target = IntersectionTarget::new(shape, TargetCategory::Enemy).with_owner(owner).with_flags(self.flags());
        if let Some(handle) = intersection.add_enemy_target_to_shot(target, TargetLifetime::Persistent) {
            intersection.link_enemy_target(handle, TargetFlags::TO_PLAYER);
            self.hitboxes.push(RelativeHitbox { offset, radius, handle });
        }
    }

    /// Registers an absolute circle for this frame only.
    pub fn add_frame_circle(&mut self, intersection: &mut IntersectionManager, circle: Circle, to_player: bool) {
        let Some(owner) = self.owner_slot else { return };
        let frame = intersection.frame();
        let target =
            IntersectionTarget::new(Shape::Circle(circle), TargetCategory::Enemy).with_owner(owner).with_flags(self.flags());
        let handle = if to_player {
            intersection.add_enemy_target_to_player(target, TargetLifetime::Frame(frame))
        } else {
            intersection.add_enemy_target_to_shot(target, TargetLifetime::Frame(frame))
        };
        if let Some(handle) = handle {
            if to_player {
                self.to_player.push(handle);
            } else {
                self.to_shot.push(handle);
            }
        }
    }

    /// `[x, y, r]` of every live hitbox facing shots (or the player), relative ones first.
    pub fn circles(&self, intersection: &IntersectionManager, to_player: bool) -> Vec<[f32; 3]> {
        let frame_handles = if to_player { &self.to_player } else { &self.to_shot };
        self.hitboxes
            .iter()
            .map(|hitbox| hitbox.handle)
            .chain(frame_handles.iter().copied())
            .filter_map(|handle| intersection.target(handle))
            .filter_map(|target| match target.shape {
                Shape::Circle(circle) => Some([circle.center.x, circle.center.y, circle.radius]),
                Shape::Line(_) => None,
            })
            .collect()
    }

    pub fn set_fetch_position(&mut self, intersection: &mut IntersectionManager, enabled: bool) {
        self.fetch_position = enabled;
        for handle in self.hitboxes.iter().map(|h| h.handle).chain(self.to_shot.iter().copied()) {
            intersection.set_target_flag(handle, TargetFlags::FETCH_POSITION, enabled);
        }
    }

    /// Moves relative hitboxes to follow the current position.
    pub fn sync_hitboxes(&self, intersection: &mut IntersectionManager) {
        for hitbox in &self.hitboxes {
            let shape = Shape::Circle(Circle { center: self.position() + hitbox.offset, radius: hitbox.radius });
            intersection.set_target_shape(hitbox.handle, shape);
        }
    }

    /// Forgets frame-only circles once their frame is over.
    pub fn end_frame(&mut self) {
        self.to_shot.clear();
        self.to_player.clear();
    }
}

#[derive(Default)]
pub struct EnemyManager {
    enemies: BTreeMap<ObjectId, EnemyObject>,
}

impl EnemyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, enemy: EnemyObject) {
        self.enemies.insert(enemy.id, enemy);
    }

    pub fn get(&self, id: ObjectId) -> Option<&EnemyObject> {
        self.enemies.get(&id).filter(|enemy| enemy.state != ObjectState::Deleted)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut EnemyObject> {
        self.enemies.get_mut(&id).filter(|enemy| enemy.state != ObjectState::Deleted)
    }

    pub fn activate(&mut self, id: ObjectId) -> bool {
        match self.enemies.get_mut(&id) {
            Some(enemy) if enemy.state == ObjectState::Inactive => {
                enemy.state = ObjectState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnemyObject> {
        self.enemies.values().filter(|enemy| enemy.state == ObjectState::Active)
    }

    /// Every enemy not yet deleted, registered or not, in id order.
    pub fn live_ids(&self) -> Vec<ObjectId> {
        self.enemies.values().filter(|enemy| enemy.state != ObjectState::Deleted).map(|enemy| enemy.id).collect()
    }

    pub fn active_count(&self) -> usize {
        self.iter().count()
    }

    pub fn step(&mut self, env: StepEnv<'_>, intersection: &mut IntersectionManager) {
        for enemy in self.enemies.values_mut().filter(|enemy| enemy.state == ObjectState::Active) {
            enemy.motion.step(env);
            enemy.sync_hitboxes(intersection);
        }
    }

    pub fn reset_hit_counts(&mut self) {
        for enemy in self.enemies.values_mut() {
            enemy.hit_count = 0;
        }
    }

    pub fn end_frame(&mut self) {
        for enemy in self.enemies.values_mut() {
            enemy.end_frame();
        }
    }

    pub fn mark_deleted(&mut self, id: ObjectId) -> bool {
        match self.enemies.get_mut(&id) {
            Some(enemy) if enemy.state != ObjectState::Deleted => {
                enemy.state = ObjectState::Deleted;
                true
            }
            _ => false,
        }
    }

    pub fn remove_deleted(&mut self) -> Vec<EnemyObject> {
        let doomed: Vec<ObjectId> = self
            .enemies
            .iter()
            .filter(|(_, enemy)| enemy.state == ObjectState::Deleted)
            .map(|(id, _)| *id)
            .collect();
        doomed.into_iter().filter_map(|id| self.enemies.remove(&id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(intersection: &mut IntersectionManager, id: i64) -> EnemyObject {
        let mut enemy = EnemyObject::new(ObjectId(id), false, 40);
        enemy.owner_slot = Some(intersection.register_owner(enemy.id));
        enemy.state = ObjectState::Active;
        enemy
    }

    #[test]
    fn damage_is_scaled_by_the_matching_rate() {
        let mut enemy = EnemyObject::new(ObjectId(1), false, 40);
        enemy.life = 100.0;
        enemy.rate_shot = 50.0;
        enemy.rate_spell = 10.0;
        assert_eq!(enemy.take_damage(20.0, false), 10.0);
        assert_eq!(enemy.take_damage(20.0, true), 2.0);
        assert_eq!(enemy.life, 88.0);
        enemy.take_damage(1000.0, false);
        assert_eq!(enemy.life, 0.0);
    }

    #[test]
    fn relative_hitboxes_follow_the_enemy() {
        let mut intersection = IntersectionManager::new(32.0);
        let mut enemy = registered(&mut intersection, 1);
        enemy.motion.position = Vec2::new(100.0, 100.0);
        enemy.add_relative_hitbox(&mut intersection, Vec2::new(0.0, 10.0), 24.0);
        enemy.motion.position = Vec2::new(150.0, 100.0);
        enemy.sync_hitboxes(&mut intersection);
        assert_eq!(enemy.circles(&intersection, false), vec![[150.0, 110.0, 24.0]]);
        assert_eq!(enemy.circles(&intersection, true), vec![[150.0, 110.0, 24.0]]);
        assert_eq!(intersection.nearest_enemy_points(Vec2::ZERO, 4), vec![Vec2::new(150.0, 110.0)]);
        enemy.set_fetch_position(&mut intersection, false);
        assert!(intersection.enemy_target_points().is_empty());
    }

    #[test]
    fn frame_circles_are_listed_per_side() {
        let mut intersection = IntersectionManager::new(32.0);
        let mut enemy = registered(&mut intersection, 1);
        enemy.add_frame_circle(&mut intersection, Circle::new(5.0, 5.0, 8.0), false);
        enemy.add_frame_circle(&mut intersection, Circle::new(6.0, 6.0, 4.0), true);
        assert_eq!(enemy.circles(&intersection, false), vec![[5.0, 5.0, 8.0]]);
        assert_eq!(enemy.circles(&intersection, true), vec![[6.0, 6.0, 4.0]]);
        enemy.end_frame();
        assert!(enemy.circles(&intersection, false).is_empty());
    }
}
