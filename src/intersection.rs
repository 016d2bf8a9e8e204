use std::collections::{HashMap, HashSet};

use bitflags::bitflags;
use glam::Vec2;
use smallvec::SmallVec;
use tracing::trace;

use crate::geometry::{shapes_intersect, Shape};
use crate::stage::ObjectId;

pub mod arena;

pub use arena::{Arena, Handle};

pub type TargetHandle = Handle;

/// Largest number of grid cells a single target may cover before it is kept
/// out of the grid and tested against every query instead.
const MAX_CELL_SPAN: i64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetCategory {
    PlayerShot,
    EnemyShot,
    Enemy,
    Player,
    PlayerSpell,
    PlayerGraze,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetFlags: u8 {
        /// Enemy hitbox checked against player shots and spells.
        const TO_SHOT = 1 << 0;
        /// Enemy hitbox checked against the player body.
        const TO_PLAYER = 1 << 1;
        /// Player shot or spell that erases enemy shots it touches.
        const ERASE_SHOT = 1 << 2;
        /// Enemy hitbox whose position is visible to position queries.
        const FETCH_POSITION = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLifetime {
    /// Dropped at the start of the first pass of a later frame.
    Frame(u64),
    /// Kept until removed explicitly or its owner goes away.
    Persistent,
}

/// Weak reference from a target to the object that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetOwner {
    pub id: ObjectId,
    slot: Handle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionTarget {
    pub shape: Shape,
    pub category: TargetCategory,
    pub flags: TargetFlags,
    owner: Option<TargetOwner>,
    lifetime: TargetLifetime,
}

impl IntersectionTarget {
    pub fn new(shape: Shape, category: TargetCategory) -> Self {
        Self { shape, category, flags: TargetFlags::empty(), owner: None, lifetime: TargetLifetime::Frame(0) }
    }

    pub fn with_owner(mut self, owner: TargetOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_flags(mut self, flags: TargetFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn owner(&self) -> Option<TargetOwner> {
        self.owner
    }

    pub fn owner_id(&self) -> Option<ObjectId> {
        self.owner.map(|owner| owner.id)
    }

    pub fn lifetime(&self) -> TargetLifetime {
        self.lifetime
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    EnemyHitByShot,
    EnemyHitBySpell,
    ShotErased,
    PlayerHit,
    PlayerGraze,
}

/// One overlap found by the pass. `subject` is the object the outcome applies to
/// (enemy taking damage, shot being erased, player being hit or grazing), `source`
/// the object that caused it. Either side is `None` for owner-less script hitboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub kind: ContactKind,
    pub subject: Option<ObjectId>,
    pub source: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyTargetPoint {
    pub position: Vec2,
    pub owner: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub targets: usize,
    pub candidate_pairs: usize,
    pub contacts: usize,
}

#[derive(Clone, Copy)]
enum PairRule {
    EnemyHit,
    ShotErase,
    PlayerHitByShot,
    PlayerHitByEnemy,
    Graze,
}

impl PairRule {
    fn contact(self, a: &IntersectionTarget, b: &IntersectionTarget) -> Contact {
        let (kind, subject, source) = match self {
            PairRule::EnemyHit => {
                let kind = if a.category == TargetCategory::PlayerSpell {
                    ContactKind::EnemyHitBySpell
                } else {
                    ContactKind::EnemyHitByShot
                };
                (kind, b.owner_id(), a.owner_id())
            }
            PairRule::ShotErase => (ContactKind::ShotErased, b.owner_id(), a.owner_id()),
            PairRule::PlayerHitByShot | PairRule::PlayerHitByEnemy => {
                (ContactKind::PlayerHit, b.owner_id(), a.owner_id())
            }
            PairRule::Graze => (ContactKind::PlayerGraze, b.owner_id(), a.owner_id()),
        };
        Contact { kind, subject, source }
    }
}

/// Owns every intersection target of the stage and runs the per-frame overlap pass.
pub struct IntersectionManager {
    targets: Arena<IntersectionTarget>,
    order: Vec<TargetHandle>,
    owners: Arena<ObjectId>,
    frame: u64,
    cell: f32,
    intersected: HashMap<ObjectId, Vec<ObjectId>>,
    last_stats: PassStats,
}

impl IntersectionManager {
    pub fn new(cell: f32) -> Self {
        Self {
            targets: Arena::new(),
            order: Vec::new(),
            owners: Arena::new(),
            frame: 0,
            cell: if cell > 0.0 { cell } else { 32.0 },
            intersected: HashMap::new(),
            last_stats: PassStats::default(),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn last_stats(&self) -> PassStats {
        self.last_stats
    }

    pub fn register_owner(&mut self, id: ObjectId) -> TargetOwner {
        TargetOwner { id, slot: self.owners.insert(id) }
    }

    /// Invalidates every target that points at `owner`. They drop out of the
    /// next pass or query without being touched here.
    pub fn release_owner(&mut self, owner: TargetOwner) {
        self.owners.remove(owner.slot);
    }

    pub fn owner_alive(&self, owner: TargetOwner) -> bool {
        self.owners.get(owner.slot) == Some(&owner.id)
    }

    fn target_alive(&self, target: &IntersectionTarget) -> bool {
        target.owner.map_or(true, |owner| self.owner_alive(owner))
    }

    /// Registers a target for the current frame. Degenerate shapes are ignored.
    pub fn add_target(&mut self, target: IntersectionTarget) -> Option<TargetHandle> {
        self.insert(target, TargetLifetime::Frame(self.frame))
    }

    pub fn add_persistent_target(&mut self, target: IntersectionTarget) -> Option<TargetHandle> {
        self.insert(target, TargetLifetime::Persistent)
    }

    pub fn add_enemy_target_to_shot(
        &mut self,
        target: IntersectionTarget,
        lifetime: TargetLifetime,
    ) -> Option<TargetHandle> {
        let mut target = target.with_flags(TargetFlags::TO_SHOT);
        target.category = TargetCategory::Enemy;
        self.insert(target, lifetime)
    }

    pub fn add_enemy_target_to_player(
        &mut self,
        target: IntersectionTarget,
        lifetime: TargetLifetime,
    ) -> Option<TargetHandle> {
        let mut target = target.with_flags(TargetFlags::TO_PLAYER);
        target.category = TargetCategory::Enemy;
        self.insert(target, lifetime)
    }

    /// Makes an existing enemy target also count against the other side, so one
    /// shape serves both the shot check and the player-body check.
    pub fn link_enemy_target(&mut self, handle: TargetHandle, flags: TargetFlags) -> bool {
        match self.targets.get_mut(handle) {
            Some(target) if target.category == TargetCategory::Enemy => {
                target.flags |= flags & (TargetFlags::TO_SHOT | TargetFlags::TO_PLAYER);
                true
            }
            _ => false,
        }
    }

    fn insert(&mut self, mut target: IntersectionTarget, lifetime: TargetLifetime) -> Option<TargetHandle> {
        if target.shape.is_degenerate() {
            trace!(target: "intersection", category = ?target.category, "degenerate target ignored");
            return None;
        }
        target.lifetime = lifetime;
        let handle = self.targets.insert(target);
        self.order.push(handle);
        Some(handle)
    }

    pub fn target(&self, handle: TargetHandle) -> Option<&IntersectionTarget> {
        self.targets.get(handle).filter(|target| self.target_alive(target))
    }

    pub fn set_target_shape(&mut self, handle: TargetHandle, shape: Shape) -> bool {
        match self.targets.get_mut(handle) {
            Some(target) => {
                target.shape = shape;
                true
            }
            None => false,
        }
    }

    pub fn set_target_flag(&mut self, handle: TargetHandle, flag: TargetFlags, enabled: bool) -> bool {
        match self.targets.get_mut(handle) {
            Some(target) => {
                target.flags.set(flag, enabled);
                true
            }
            None => false,
        }
    }

    pub fn remove_target(&mut self, handle: TargetHandle) -> bool {
        self.targets.remove(handle).is_some()
    }

    pub fn live_target_count(&self) -> usize {
        self.live_handles().count()
    }

    fn live_handles(&self) -> impl Iterator<Item = (TargetHandle, &IntersectionTarget)> + '_ {
        self.order.iter().filter_map(move |handle| {
            self.targets.get(*handle).filter(|target| self.target_alive(target)).map(|target| (*handle, target))
        })
    }

    pub fn is_intersected(a: &IntersectionTarget, b: &IntersectionTarget) -> bool {
        shapes_intersect(&a.shape, &b.shape)
    }

    /// Current live targets owned by `id`, in registration order.
    pub fn targets_of(&self, id: ObjectId) -> Vec<&IntersectionTarget> {
        self.live_handles().filter(|(_, target)| target.owner_id() == Some(id)).map(|(_, t)| t).collect()
    }

    /// Objects that overlapped `id` in the most recent pass.
    pub fn intersected_with(&self, id: ObjectId) -> &[ObjectId] {
        self.intersected.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions of every enemy hitbox registered against shots that allows
    /// position fetching.
    pub fn enemy_target_points(&self) -> Vec<EnemyTargetPoint> {
        self.live_handles()
            .filter(|(_, target)| {
                target.category == TargetCategory::Enemy
                    && target.flags.contains(TargetFlags::TO_SHOT | TargetFlags::FETCH_POSITION)
            })
            .map(|(_, target)| EnemyTargetPoint { position: target.shape.anchor(), owner: target.owner_id() })
            .collect()
    }

    /// Up to `count` fetchable enemy positions ordered by squared distance to
    /// `center`. Equal distances keep registration order.
    pub fn nearest_enemy_points(&self, center: Vec2, count: usize) -> Vec<Vec2> {
        nearest_points(self.enemy_target_points().into_iter().map(|p| p.position), center, count)
    }

    /// Distinct owners of enemy hitboxes registered against shots, in first-seen order.
    pub fn registered_enemy_ids(&self) -> Vec<ObjectId> {
        let mut seen = HashSet::new();
        self.live_handles()
            .filter(|(_, target)| {
                target.category == TargetCategory::Enemy && target.flags.contains(TargetFlags::TO_SHOT)
            })
            .filter_map(|(_, target)| target.owner_id())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Drops targets from earlier frames and targets whose owner is gone.
    pub fn purge(&mut self) {
        let frame = self.frame;
        let mut kept = Vec::with_capacity(self.order.len());
        for handle in self.order.drain(..) {
            let keep = match self.targets.get(handle) {
                Some(target) => {
                    let fresh = match target.lifetime {
                        TargetLifetime::Frame(stamp) => stamp >= frame,
                        TargetLifetime::Persistent => true,
                    };
                    fresh && target.owner.map_or(true, |owner| self.owners.get(owner.slot) == Some(&owner.id))
                }
                None => false,
            };
            if keep {
                kept.push(handle);
            } else {
                self.targets.remove(handle);
            }
        }
        self.order = kept;
    }

    /// Runs the overlap pass for the current frame over complementary categories
    /// and records the per-object intersected lists.
    pub fn run_pass(&mut self) -> Vec<Contact> {
        self.purge();
        self.intersected.clear();

        let mut player_side = Vec::new();
        let mut erasers = Vec::new();
        let mut enemy_shots = Vec::new();
        let mut enemy_to_shot = Vec::new();
        let mut enemy_to_player = Vec::new();
        let mut players = Vec::new();
        let mut grazes = Vec::new();
        for (handle, target) in self.live_handles() {
            match target.category {
                TargetCategory::PlayerShot | TargetCategory::PlayerSpell => {
                    player_side.push(handle);
                    if target.flags.contains(TargetFlags::ERASE_SHOT) {
                        erasers.push(handle);
                    }
                }
                TargetCategory::EnemyShot => enemy_shots.push(handle),
                TargetCategory::Enemy => {
                    if target.flags.contains(TargetFlags::TO_SHOT) {
                        enemy_to_shot.push(handle);
                    }
                    if target.flags.contains(TargetFlags::TO_PLAYER) {
                        enemy_to_player.push(handle);
                    }
                }
                TargetCategory::Player => players.push(handle),
                TargetCategory::PlayerGraze => grazes.push(handle),
            }
        }

        let mut stats = PassStats { targets: self.order.len(), ..PassStats::default() };
        let mut contacts = Vec::new();
        let mut seen = HashSet::new();
        let groups: [(&[TargetHandle], &[TargetHandle], PairRule); 5] = [
            (&player_side, &enemy_to_shot, PairRule::EnemyHit),
            (&erasers, &enemy_shots, PairRule::ShotErase),
            (&enemy_shots, &players, PairRule::PlayerHitByShot),
            (&enemy_to_player, &players, PairRule::PlayerHitByEnemy),
            (&enemy_shots, &grazes, PairRule::Graze),
        ];
        for (left, right, rule) in groups {
            stats.candidate_pairs += self.collide(left, right, rule, &mut contacts, &mut seen);
        }
        stats.contacts = contacts.len();

        for contact in &contacts {
            if let (Some(subject), Some(source)) = (contact.subject, contact.source) {
                push_unique(self.intersected.entry(subject).or_default(), source);
                push_unique(self.intersected.entry(source).or_default(), subject);
            }
        }
        trace!(
            target: "intersection",
            frame = self.frame,
            targets = stats.targets,
            candidates = stats.candidate_pairs,
            contacts = stats.contacts,
            "pass complete"
        );
        self.last_stats = stats;
        contacts
    }

    fn collide(
        &self,
        left: &[TargetHandle],
        right: &[TargetHandle],
        rule: PairRule,
        contacts: &mut Vec<Contact>,
        seen: &mut HashSet<(ContactKind, ObjectId, ObjectId)>,
    ) -> usize {
        if left.is_empty() || right.is_empty() {
            return 0;
        }
        let mut grid = Broadphase::new(self.cell);
        for (slot, handle) in right.iter().enumerate() {
            if let Some(target) = self.targets.get(*handle) {
                let (min, max) = target.shape.bounds();
                grid.insert(slot as u32, min, max);
            }
        }

        let mut candidates_tested = 0;
        let mut candidates: SmallVec<[u32; 16]> = SmallVec::new();
        for handle_a in left {
            let Some(a) = self.targets.get(*handle_a) else { continue };
            let (min, max) = a.shape.bounds();
            grid.query(min, max, &mut candidates);
            for slot in candidates.iter() {
                let handle_b = right[*slot as usize];
                if handle_b == *handle_a {
                    continue;
                }
                let Some(b) = self.targets.get(handle_b) else { continue };
                if a.owner_id().is_some() && a.owner_id() == b.owner_id() {
                    continue;
                }
                candidates_tested += 1;
                if !Self::is_intersected(a, b) {
                    continue;
                }
                let contact = rule.contact(a, b);
                if let (Some(subject), Some(source)) = (contact.subject, contact.source) {
                    if !seen.insert((contact.kind, subject, source)) {
                        continue;
                    }
                }
                contacts.push(contact);
            }
        }
        candidates_tested
    }
}

fn push_unique(list: &mut Vec<ObjectId>, id: ObjectId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Selects the `count` points closest to `center`; ties keep input order.
pub fn nearest_points(points: impl IntoIterator<Item = Vec2>, center: Vec2, count: usize) -> Vec<Vec2> {
    let mut ranked: Vec<(f32, Vec2)> = points.into_iter().map(|p| (p.distance_squared(center), p)).collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.into_iter().take(count).map(|(_, p)| p).collect()
}

/// Uniform grid keyed by floored cell coordinates.
struct Broadphase {
    cell: f32,
    cells: HashMap<(i32, i32), SmallVec<[u32; 8]>>,
    oversized: Vec<u32>,
}

impl Broadphase {
    fn new(cell: f32) -> Self {
        Self { cell, cells: HashMap::new(), oversized: Vec::new() }
    }

    fn key(&self, p: Vec2) -> (i32, i32) {
        ((p.x / self.cell).floor() as i32, (p.y / self.cell).floor() as i32)
    }

    fn span(&self, min: Vec2, max: Vec2) -> Option<((i32, i32), (i32, i32))> {
        let (kx0, ky0) = self.key(min);
        let (kx1, ky1) = self.key(max);
        let cells = (i64::from(kx1) - i64::from(kx0) + 1) * (i64::from(ky1) - i64::from(ky0) + 1);
        (cells <= MAX_CELL_SPAN).then_some(((kx0, ky0), (kx1, ky1)))
    }

    fn insert(&mut self, slot: u32, min: Vec2, max: Vec2) {
        let Some(((kx0, ky0), (kx1, ky1))) = self.span(min, max) else {
            self.oversized.push(slot);
            return;
        };
        for ky in ky0..=ky1 {
            for kx in kx0..=kx1 {
                self.cells.entry((kx, ky)).or_default().push(slot);
            }
        }
    }

    fn query(&self, min: Vec2, max: Vec2, out: &mut SmallVec<[u32; 16]>) {
        out.clear();
        out.extend(self.oversized.iter().copied());
        match self.span(min, max) {
            Some(((kx0, ky0), (kx1, ky1))) => {
                for ky in ky0..=ky1 {
                    for kx in kx0..=kx1 {
                        if let Some(slots) = self.cells.get(&(kx, ky)) {
                            out.extend(slots.iter().copied());
                        }
                    }
                }
            }
            None => {
                for slots in self.cells.values() {
                    out.extend(slots.iter().copied());
                }
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}
