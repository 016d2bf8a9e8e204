use std::collections::BTreeMap;

use glam::Vec2;
use tracing::debug;

use crate::config::{ClipMargins, FieldConfig};
use crate::events::ShotDeleteMode;
use crate::geometry::Circle;

use super::shot::ShotObject;
use super::types::{ObjectId, ObjectState, OwnerType};

/// Which shots a bulk delete selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    All,
    /// Shots fired directly, not spawned by a pattern shot parented to another shot.
    Shot,
    Child,
}

impl DeleteTarget {
    pub fn matches(self, shot: &ShotObject) -> bool {
        match self {
            DeleteTarget::All => true,
            DeleteTarget::Shot => !shot.child,
            DeleteTarget::Child => shot.child,
        }
    }
}

/// Owner filter of counting and region queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    All,
    Only(OwnerType),
}

impl OwnerFilter {
    pub fn matches(self, owner: OwnerType) -> bool {
        match self {
            OwnerFilter::All => true,
            OwnerFilter::Only(wanted) => wanted == owner,
        }
    }
}

/// Field rectangle beyond which auto-delete shots are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl ClipRect {
    pub fn around(field: &FieldConfig, margins: &ClipMargins) -> Self {
        Self {
            left: -margins.left,
            top: -margins.top,
            right: field.width + margins.right,
            bottom: field.height + margins.bottom,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }
}

/// Owns every shot and laser of the stage, keyed by id.
///
/// Enumeration and the population cap only consider `Active` shots. Created but
/// unregistered shots sit here as `Inactive` and are invisible to every query.
pub struct ShotManager {
    shots: BTreeMap<ObjectId, ShotObject>,
    max: usize,
    clip: ClipRect,
    delete_events: [bool; 3],
}

impl ShotManager {
    pub fn new(max: usize, clip: ClipRect) -> Self {
        Self { shots: BTreeMap::new(), max, clip, delete_events: [false; 3] }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn set_max(&mut self, max: usize) {
        self.max = max;
    }

    pub fn clip(&self) -> ClipRect {
        self.clip
    }

    pub fn set_clip(&mut self, clip: ClipRect) {
        self.clip = clip;
    }

    pub fn active_count(&self) -> usize {
        self.iter().count()
    }

    /// How many more shots may become active before the cap.
    pub fn room(&self) -> usize {
        self.max.saturating_sub(self.active_count())
    }

    /// Whether one more shot may become active. Creation sites ask before allocating an id.
    pub fn has_room(&self) -> bool {
        let room = self.active_count() < self.max;
        if !room {
            debug!(target: "stage", max = self.max, "shot cap reached");
        }
        room
    }

    pub fn insert(&mut self, shot: ShotObject) {
        self.shots.insert(shot.id, shot);
    }

    pub fn get(&self, id: ObjectId) -> Option<&ShotObject> {
        self.shots.get(&id).filter(|shot| shot.state != ObjectState::Deleted)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ShotObject> {
        self.shots.get_mut(&id).filter(|shot| shot.state != ObjectState::Deleted)
    }

    /// Registers a created shot. Refused when already active or at the cap.
    pub fn activate(&mut self, id: ObjectId) -> bool {
        if !self.has_room() {
            return false;
        }
        match self.shots.get_mut(&id) {
            Some(shot) if shot.state == ObjectState::Inactive => {
                shot.state = ObjectState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShotObject> {
        self.shots.values().filter(|shot| shot.state == ObjectState::Active)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ShotObject> {
        self.shots.values_mut().filter(|shot| shot.state == ObjectState::Active)
    }

    pub fn count(&self, owner: OwnerFilter) -> usize {
        self.iter().filter(|shot| owner.matches(shot.owner)).count()
    }

    /// Active shots whose body reaches into `region`, in id order.
    pub fn ids_in_circle(&self, region: &Circle, owner: OwnerFilter) -> Vec<ObjectId> {
        self.iter()
            .filter(|shot| owner.matches(shot.owner) && shot.touches_circle(region))
            .map(|shot| shot.id)
            .collect()
    }

    /// Enemy shots a bulk delete would remove. `None` selects the whole field.
    pub fn delete_candidates(&self, target: DeleteTarget, region: Option<&Circle>) -> Vec<ObjectId> {
        self.iter()
            .filter(|shot| shot.owner == OwnerType::Enemy && target.matches(shot))
            .filter(|shot| region.map_or(true, |circle| shot.touches_circle(circle)))
            .map(|shot| shot.id)
            .collect()
    }

    pub fn delete_event_enabled(&self, mode: ShotDeleteMode) -> bool {
        self.delete_events[mode.index()]
    }

    pub fn set_delete_event_enabled(&mut self, mode: ShotDeleteMode, enabled: bool) {
        self.delete_events[mode.index()] = enabled;
    }

    /// Marks a shot deleted. Returns false for unknown or already deleted ids.
    pub fn mark_deleted(&mut self, id: ObjectId) -> bool {
        match self.shots.get_mut(&id) {
            Some(shot) if shot.state != ObjectState::Deleted => {
                shot.state = ObjectState::Deleted;
                true
            }
            _ => false,
        }
    }

    /// Drops deleted shots and hands them back so their owner slots can be released.
    pub fn remove_deleted(&mut self) -> Vec<ShotObject> {
        let doomed: Vec<ObjectId> = self
            .shots
            .iter()
            .filter(|(_, shot)| shot.state == ObjectState::Deleted)
            .map(|(id, _)| *id)
            .collect();
        doomed.into_iter().filter_map(|id| self.shots.remove(&id)).collect()
    }

    /// Drops every shot regardless of state; used when the stage closes.
    pub fn clear(&mut self) -> Vec<ShotObject> {
        std::mem::take(&mut self.shots).into_values().collect()
    }
}
