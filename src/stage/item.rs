use std::collections::BTreeMap;

use glam::Vec2;
use tracing::debug;

use crate::geometry::Circle;
use crate::intersection::TargetOwner;
use crate::movement::{ItemMotion, ItemMoveKind, Motion, MoveObject, MovePattern, StepEnv};

use super::types::{ObjectId, ObjectState};

pub const ITEM_1UP: i64 = -65536;
pub const ITEM_1UP_S: i64 = -65535;
pub const ITEM_SPELL: i64 = -65534;
pub const ITEM_SPELL_S: i64 = -65533;
pub const ITEM_POWER: i64 = -65532;
pub const ITEM_POWER_S: i64 = -65531;
pub const ITEM_POINT: i64 = -65530;
pub const ITEM_POINT_S: i64 = -65529;
/// Item drawn from the loaded item data; its graphic is the data id.
pub const ITEM_USER: i64 = 0;
/// Internal type of floating score pop-ups.
pub const ITEM_SCORE: i64 = -65528;

pub const ITEM_MOVE_DOWN: i64 = 2;
pub const ITEM_MOVE_TOPLAYER: i64 = 3;
pub const ITEM_MOVE_SCORE: i64 = 4;

/// Frames a score pop-up floats before it disappears.
const SCORE_POPUP_FRAMES: u32 = 60;
/// Distance below the field at which falling items are dropped.
const FALL_OUT_MARGIN: f32 = 32.0;

pub fn move_kind_from_script(raw: i64) -> Option<ItemMoveKind> {
    match raw {
        ITEM_MOVE_DOWN => Some(ItemMoveKind::Down),
        ITEM_MOVE_TOPLAYER => Some(ItemMoveKind::ToPlayer),
        ITEM_MOVE_SCORE => Some(ItemMoveKind::Score),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemObject {
    pub id: ObjectId,
    pub state: ObjectState,
    pub item_type: i64,
    pub motion: MoveObject,
    pub score: i64,
    /// Item data id for `ITEM_USER` items.
    pub graphic: i64,
    pub render_score: bool,
    pub auto_collect: bool,
    pub render_priority: i32,
    pub(crate) owner_slot: Option<TargetOwner>,
}

impl ItemObject {
    pub fn new(id: ObjectId, item_type: i64, render_priority: i32) -> Self {
        Self {
            id,
            state: ObjectState::Inactive,
            item_type,
            motion: MoveObject::at(Vec2::ZERO),
            score: 0,
            graphic: if item_type == ITEM_USER { 0 } else { item_type },
            render_score: true,
            auto_collect: true,
            render_priority,
            owner_slot: None,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.motion.position
    }

    pub fn move_kind(&self) -> Option<ItemMoveKind> {
        match self.motion.pattern.motion() {
            Motion::Item(item) => Some(item.kind),
            _ => None,
        }
    }

    /// Score pop-ups never collide with the player.
    pub fn is_score_popup(&self) -> bool {
        self.item_type == ITEM_SCORE
    }

    pub fn set_move(&mut self, kind: ItemMoveKind, target: Vec2, collect_speed: f32) {
        self.motion.pattern.replace_motion(Motion::Item(ItemMotion::new(kind, target, collect_speed)));
    }

    fn is_homing(&self) -> bool {
        self.move_kind() == Some(ItemMoveKind::ToPlayer)
    }
}

/// One pending bulk collection request, consumed at the next collection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollectRequest {
    All,
    ByType(i64),
    InCircle(Circle),
}

/// What the collection pass needs to know about the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collector {
    pub position: Vec2,
    /// Items above this line home in on the player. Negative disables it.
    pub collect_line: f32,
    /// Radius within which items start homing.
    pub scope: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectedItem {
    pub id: ObjectId,
    pub item_type: i64,
    pub position: Vec2,
}

pub struct ItemManager {
    items: BTreeMap<ObjectId, ItemObject>,
    max: usize,
    pub intersection_radius: f32,
    pub default_bonus: bool,
    pub collect_speed: f32,
    requests: Vec<CollectRequest>,
    cancel: bool,
}

impl ItemManager {
    pub fn new(max: usize, intersection_radius: f32, default_bonus: bool, collect_speed: f32) -> Self {
        Self {
            items: BTreeMap::new(),
            max,
            intersection_radius,
            default_bonus,
            collect_speed,
            requests: Vec::new(),
            cancel: false,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn active_count(&self) -> usize {
        self.iter().count()
    }

    /// How many more items may become active before the cap.
    pub fn room(&self) -> usize {
        self.max.saturating_sub(self.active_count())
    }

    pub fn has_room(&self) -> bool {
        let room = self.active_count() < self.max;
        if !room {
            debug!(target: "stage", max = self.max, "item cap reached");
        }
        room
    }

    pub fn insert(&mut self, item: ItemObject) {
        self.items.insert(item.id, item);
    }

    pub fn get(&self, id: ObjectId) -> Option<&ItemObject> {
        self.items.get(&id).filter(|item| item.state != ObjectState::Deleted)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ItemObject> {
        self.items.get_mut(&id).filter(|item| item.state != ObjectState::Deleted)
    }

    pub fn activate(&mut self, id: ObjectId) -> bool {
        if !self.has_room() {
            return false;
        }
        match self.items.get_mut(&id) {
            Some(item) if item.state == ObjectState::Inactive => {
                item.state = ObjectState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemObject> {
        self.items.values().filter(|item| item.state == ObjectState::Active)
    }

    pub fn request(&mut self, request: CollectRequest) {
        self.requests.push(request);
    }

    /// Sends homing items back to falling and drops requests not yet served.
    pub fn cancel_collection(&mut self) {
        self.cancel = true;
        self.requests.clear();
    }

    pub fn mark_deleted(&mut self, id: ObjectId) -> bool {
        match self.items.get_mut(&id) {
            Some(item) if item.state != ObjectState::Deleted => {
                item.state = ObjectState::Deleted;
                true
            }
            _ => false,
        }
    }

    /// Moves every active item one frame and drops the ones that left the field.
    pub fn step(&mut self, player: Option<Vec2>, field_height: f32) {
        let env = StepEnv { player, anchors: None };
        for item in self.items.values_mut().filter(|item| item.state == ObjectState::Active) {
            item.motion.step(env);
            let expired = match item.motion.pattern.motion() {
                Motion::Item(motion) if motion.kind == ItemMoveKind::Score => motion.frame() >= SCORE_POPUP_FRAMES,
                _ => false,
            };
            if expired || item.position().y > field_height + FALL_OUT_MARGIN {
                item.state = ObjectState::Deleted;
            }
        }
    }

    /// Applies collection requests and picks up items touching the player.
    /// Returns picked-up items in id order; they are already marked deleted.
    pub fn collect(&mut self, collector: Option<Collector>) -> Vec<CollectedItem> {
        let requests = std::mem::take(&mut self.requests);
        let cancel = std::mem::replace(&mut self.cancel, false);
        let collect_speed = self.collect_speed;
        let radius = self.intersection_radius;
        let mut collected = Vec::new();
        for item in self.items.values_mut().filter(|item| item.state == ObjectState::Active) {
            if item.is_score_popup() {
                continue;
            }
            if cancel && item.is_homing() {
                item.set_move(ItemMoveKind::Down, item.position(), collect_speed);
            }
            let Some(collector) = collector else { continue };
            let requested = item.auto_collect
                && requests.iter().any(|request| match request {
                    CollectRequest::All => true,
                    CollectRequest::ByType(ty) => item.item_type == *ty,
                    CollectRequest::InCircle(circle) => circle.contains_point(item.position()),
                });
            let above_line = item.auto_collect
                && collector.collect_line >= 0.0
                && collector.position.y <= collector.collect_line;
            let in_scope = collector.scope > 0.0 && item.position().distance(collector.position) <= collector.scope;
            if (requested || above_line || in_scope) && !item.is_homing() {
                item.set_move(ItemMoveKind::ToPlayer, collector.position, collect_speed);
            }
            if item.position().distance(collector.position) <= radius {
                item.state = ObjectState::Deleted;
                collected.push(CollectedItem { id: item.id, item_type: item.item_type, position: item.position() });
            }
        }
        collected
    }

    pub fn remove_deleted(&mut self) -> Vec<ItemObject> {
        let doomed: Vec<ObjectId> = self
            .items
            .iter()
            .filter(|(_, item)| item.state == ObjectState::Deleted)
            .map(|(id, _)| *id)
            .collect();
        doomed.into_iter().filter_map(|id| self.items.remove(&id)).collect()
    }

    /// Items spawned by the stage itself start out gliding to a point above where they dropped.
    pub fn spawn_motion(position: Vec2, target: Vec2, collect_speed: f32) -> MoveObject {
        let mut motion = MoveObject::at(position);
        motion.pattern = MovePattern::new(Motion::Item(ItemMotion::new(ItemMoveKind::ToPosition, target, collect_speed)));
        motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ItemManager {
        ItemManager::new(4, 16.0, true, 8.0)
    }

    fn active_item(manager: &mut ItemManager, id: i64, ty: i64, at: Vec2) {
        let mut item = ItemObject::new(ObjectId(id), ty, 60);
        item.motion = ItemManager::spawn_motion(at, at, 8.0);
        manager.insert(item);
        manager.activate(ObjectId(id));
    }

    #[test]
    fn items_touching_the_player_are_picked_up() {
        let mut items = manager();
        active_item(&mut items, 1, ITEM_POINT, Vec2::new(100.0, 100.0));
        active_item(&mut items, 2, ITEM_POWER, Vec2::new(300.0, 300.0));
        let collector = Collector { position: Vec2::new(105.0, 100.0), collect_line: -1.0, scope: 0.0 };
        let got = items.collect(Some(collector));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].item_type, ITEM_POINT);
        assert!(items.get(ObjectId(1)).is_none());
        assert_eq!(items.active_count(), 1);
    }

    #[test]
    fn collect_by_type_only_homes_matching_items() {
        let mut items = manager();
        active_item(&mut items, 1, ITEM_POINT, Vec2::new(0.0, 0.0));
        active_item(&mut items, 2, ITEM_POWER, Vec2::new(50.0, 0.0));
        items.request(CollectRequest::ByType(ITEM_POWER));
        let collector = Collector { position: Vec2::new(200.0, 200.0), collect_line: -1.0, scope: 0.0 };
        items.collect(Some(collector));
        assert_eq!(items.get(ObjectId(2)).and_then(ItemObject::move_kind), Some(ItemMoveKind::ToPlayer));
        assert_eq!(items.get(ObjectId(1)).and_then(ItemObject::move_kind), Some(ItemMoveKind::ToPosition));
        items.cancel_collection();
        items.collect(Some(collector));
        assert_eq!(items.get(ObjectId(2)).and_then(ItemObject::move_kind), Some(ItemMoveKind::Down));
    }

    #[test]
    fn cap_refuses_extra_activations() {
        let mut items = ItemManager::new(1, 16.0, true, 8.0);
        active_item(&mut items, 1, ITEM_POINT, Vec2::ZERO);
        items.insert(ItemObject::new(ObjectId(2), ITEM_POINT, 60));
        assert!(!items.activate(ObjectId(2)));
        assert_eq!(items.active_count(), 1);
    }
}
