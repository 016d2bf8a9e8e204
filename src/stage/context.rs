//! The stage aggregate.
//!
//! [`StageContext`] owns every manager of one stage and runs the frame loop that ties them
//! together. Scripts reach the simulation only through a `&mut StageContext`; nothing here is
//! global. Multi-manager operations (creation with a cap check, shot-to-item conversion,
//! pattern firing, boss scene resolution) live here so each stays a single call.

use std::collections::{BTreeMap, HashMap, VecDeque};

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::assets::{AssetSource, DataLibrary, DataSlot, FsAssetSource};
use crate::common_data::{self, CommonDataStore, MemoryReplayStore, ReplayStore};
use crate::config::StageConfig;
use crate::events::{EventBus, ShotDeleteMode, StageEvent};
use crate::geometry::{Circle, Shape};
use crate::intersection::{Contact, ContactKind, IntersectionManager, IntersectionTarget, TargetCategory, TargetFlags};
use crate::movement::{ItemMoveKind, MoveObject, StepEnv};
use crate::pattern_shot::{compile_transforms, PatternShot};
use crate::time::StageClock;

use super::boss_scene::{BossScene, BossSceneManager, DefaultSceneSource, SceneDataSource};
use super::enemy::{EnemyManager, EnemyObject};
use super::item::{Collector, ItemManager, ItemObject, ITEM_POINT_S, ITEM_SCORE};
use super::player::{PlayerManager, PlayerObject, PlayerState, PlayerTransition, SpellObject};
use super::shot::{ShotKind, ShotObject};
use super::shot_manager::{ClipRect, DeleteTarget, ShotManager};
use super::types::{IdAllocator, ObjectId, ObjectState, ObjectType, OwnerType, STANDARD_FPS};

/// Frames a shot, item or enemy may stay created but unregistered before it is discarded.
pub const UNREGISTERED_GRACE_FRAMES: u64 = STANDARD_FPS as u64;

/// Playfield rectangle on screen and the render priority band drawn inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StgFrame {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub priority_min: i32,
    pub priority_max: i32,
}

/// Singleton sub-scripts of the stage.
#[derive(Debug, Clone, Default)]
pub struct ScriptSlots {
    pub main_path: Option<String>,
    pub player_script: Option<i64>,
    pub shot_script: Option<String>,
    pub item_script: Option<String>,
}

/// One object handed to the external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderEntry {
    pub priority: i32,
    pub id: ObjectId,
    pub object_type: ObjectType,
}

/// Counts after one simulated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub shots: usize,
    pub items: usize,
    pub enemies: usize,
    pub contacts: usize,
}

pub struct StageContext {
    pub config: StageConfig,
    ids: IdAllocator,
    pub rng: StdRng,
    pub shots: ShotManager,
    pub items: ItemManager,
    pub enemies: EnemyManager,
    pub bosses: BossSceneManager,
    pub players: PlayerManager,
    pub patterns: BTreeMap<ObjectId, PatternShot>,
    pub intersection: IntersectionManager,
    pub events: EventBus,
    pub clock: StageClock,
    pub data: DataLibrary,
    pub assets: Box<dyn AssetSource>,
    pub common_data: CommonDataStore,
    pub replay: Box<dyn ReplayStore>,
    pub in_replay: bool,
    pub stg_frame: StgFrame,
    pub shot_priority: i32,
    pub item_priority: i32,
    pub scripts: ScriptSlots,
    pub closed: bool,
    /// Creation frame of every shot, item and plain enemy, oldest first.
    unregistered: VecDeque<(u64, ObjectId)>,
}

impl StageContext {
    /// Builds an empty stage and installs the player at its configured start point.
    pub fn new(config: StageConfig) -> Self {
        let rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let clip = ClipRect::around(&config.field, &config.shot_auto_delete_clip);
        let items = ItemManager::new(
            config.caps.item_max,
            config.items.intersection_radius,
            config.items.default_bonus,
            config.items.collect_speed,
        );
        let stg_frame = StgFrame {
            left: 32.0,
            top: 16.0,
            right: 32.0 + config.field.width,
            bottom: 16.0 + config.field.height,
            priority_min: config.render.frame_min,
            priority_max: config.render.frame_max,
        };
        let mut ctx = Self {
            ids: IdAllocator::default(),
            rng,
            shots: ShotManager::new(config.caps.shot_max, clip),
            items,
            enemies: EnemyManager::new(),
            bosses: BossSceneManager::new(),
            players: PlayerManager::new(),
            patterns: BTreeMap::new(),
            intersection: IntersectionManager::new(config.intersection.grid_cell),
            events: EventBus::default(),
            clock: StageClock::new(),
            data: DataLibrary::new(),
            assets: Box::new(FsAssetSource::new(".")),
            common_data: CommonDataStore::new(),
            replay: Box::new(MemoryReplayStore::new()),
            in_replay: false,
            stg_frame,
            shot_priority: config.render.shot,
            item_priority: config.render.item,
            scripts: ScriptSlots::default(),
            closed: false,
            unregistered: VecDeque::new(),
            config,
        };
        let id = ctx.ids.allocate();
        let field = Vec2::new(ctx.config.field.width, ctx.config.field.height);
        let mut player = PlayerObject::new(id, &ctx.config.player, field, ctx.config.render.player);
        player.owner_slot = Some(ctx.intersection.register_owner(id));
        ctx.players.install(player);
        info!(
            target: "stage",
            shot_max = ctx.config.caps.shot_max,
            item_max = ctx.config.caps.item_max,
            seed = ?ctx.config.seed,
            "stage created"
        );
        ctx
    }

    pub fn with_assets(mut self, assets: Box<dyn AssetSource>) -> Self {
        self.assets = assets;
        self
    }

    /// Switches the stage into replay playback (or recording) against `store`.
    pub fn with_replay(mut self, store: Box<dyn ReplayStore>, in_replay: bool) -> Self {
        self.replay = store;
        self.in_replay = in_replay;
        self
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    pub fn player_id(&self) -> Option<ObjectId> {
        self.players.player_id()
    }

    // ---- creation -------------------------------------------------------------------

    /// Creates an unregistered shot or laser. `None` at the cap or for non-shot types.
    pub fn create_shot(&mut self, ty: ObjectType, owner: OwnerType) -> Option<ObjectId> {
        let kind = ShotKind::for_type(ty)?;
        if !self.shots.has_room() {
            return None;
        }
        let id = self.ids.allocate();
        let mut shot = ShotObject::new(id, kind, owner, self.shot_priority);
        shot.owner_slot = Some(self.intersection.register_owner(id));
        self.shots.insert(shot);
        self.unregistered.push_back((self.clock.frame(), id));
        trace!(target: "stage", %id, ?ty, ?owner, "shot created");
        Some(id)
    }

    pub fn regist_shot(&mut self, id: ObjectId) -> bool {
        self.shots.activate(id)
    }

    /// Creates and registers a shot in one step, the way every `Create*Shot*` call does.
    pub fn spawn_shot(
        &mut self,
        ty: ObjectType,
        owner: OwnerType,
        motion: MoveObject,
        graphic: i64,
        delay: u32,
    ) -> Option<ObjectId> {
        let id = self.create_shot(ty, owner)?;
        let shot = self.shots.get_mut(id)?;
        shot.motion = motion;
        shot.graphic = graphic;
        shot.set_delay(delay);
        if let ShotKind::Straight(straight) = &mut shot.kind {
            straight.angle = shot.motion.angle();
            shot.motion.set_speed(0.0);
        }
        if !self.shots.activate(id) {
            self.shots.mark_deleted(id);
            return None;
        }
        Some(id)
    }

    pub fn create_item(&mut self, item_type: i64) -> Option<ObjectId> {
        if !self.items.has_room() {
            return None;
        }
        let id = self.ids.allocate();
        let mut item = ItemObject::new(id, item_type, self.item_priority);
        item.owner_slot = Some(self.intersection.register_owner(id));
        self.items.insert(item);
        self.unregistered.push_back((self.clock.frame(), id));
        Some(id)
    }

    pub fn regist_item(&mut self, id: ObjectId) -> bool {
        self.items.activate(id)
    }

    /// Creates an active item at `position` gliding to `target`.
    pub fn spawn_item(&mut self, item_type: i64, position: Vec2, target: Vec2, score: i64) -> Option<ObjectId> {
        let id = self.create_item(item_type)?;
        let speed = self.items.collect_speed;
        let item = self.items.get_mut(id)?;
        item.motion = ItemManager::spawn_motion(position, target, speed);
        item.score = score;
        if item_type == ITEM_SCORE {
            item.set_move(ItemMoveKind::Score, position, speed);
        }
        if !self.items.activate(id) {
            self.items.mark_deleted(id);
            return None;
        }
        Some(id)
    }

    pub fn create_enemy(&mut self) -> ObjectId {
        let id = self.ids.allocate();
        let mut enemy = EnemyObject::new(id, false, self.config.render.enemy);
        enemy.owner_slot = Some(self.intersection.register_owner(id));
        self.enemies.insert(enemy);
        self.unregistered.push_back((self.clock.frame(), id));
        id
    }

    pub fn regist_enemy(&mut self, id: ObjectId) -> bool {
        self.enemies.activate(id)
    }

    /// Next boss enemy of the active scene data. `None` when no boss scene is active,
    /// [`ObjectId::INVALID`] once the data's bosses are all handed out.
    pub fn next_boss_enemy(&mut self) -> Option<ObjectId> {
        let scene = self.bosses.active_mut()?;
        Some(scene.next_boss_enemy().unwrap_or(ObjectId::INVALID))
    }

    pub fn create_boss_scene(&mut self) -> ObjectId {
        let id = self.ids.allocate();
        self.bosses.insert(BossScene::new(id));
        id
    }

    pub fn regist_boss_scene(&mut self, id: ObjectId) -> bool {
        let activated = self.bosses.activate(id);
        if activated {
            debug!(target: "stage", scene = %id, "boss scene registered");
        }
        activated
    }

    pub fn create_spell(&mut self) -> ObjectId {
        let id = self.ids.allocate();
        let mut spell = SpellObject::new(id, self.config.render.player);
        spell.owner_slot = Some(self.intersection.register_owner(id));
        self.players.insert_spell(spell);
        id
    }

    pub fn create_pattern(&mut self, owner: OwnerType) -> ObjectId {
        let id = self.ids.allocate();
        self.patterns.insert(id, PatternShot::new(id, owner));
        id
    }

    // ---- generic object access ----------------------------------------------------------

    pub fn object_type(&self, id: ObjectId) -> Option<ObjectType> {
        if self.players.player_id() == Some(id) {
            return Some(ObjectType::Player);
        }
        if self.players.spell_manage() == Some(id) {
            return Some(ObjectType::SpellManage);
        }
        if self.players.spell(id).is_some() {
            return Some(ObjectType::Spell);
        }
        if let Some(enemy) = self.enemies.get(id) {
            return Some(if enemy.boss { ObjectType::EnemyBoss } else { ObjectType::Enemy });
        }
        if self.bosses.get(id).is_some() {
            return Some(ObjectType::EnemyBossScene);
        }
        if let Some(shot) = self.shots.get(id) {
            return Some(shot.object_type());
        }
        if self.items.get(id).is_some() {
            return Some(ObjectType::Item);
        }
        self.patterns.get(&id).filter(|p| p.state != ObjectState::Deleted).map(|_| ObjectType::PatternShot)
    }

    /// Ids are never reused, so an id that resolves to nothing is deleted (or never existed).
    pub fn is_deleted(&self, id: ObjectId) -> bool {
        self.object_type(id).is_none()
    }

    /// Marks an object deleted. Deleting the spell-manage object ends the running spell.
    pub fn delete_object(&mut self, id: ObjectId) -> bool {
        match self.object_type(id) {
            Some(ObjectType::SpellManage) => self.players.end_spell(id),
            Some(ObjectType::Spell) => self.players.mark_spell_deleted(id),
            Some(ObjectType::Enemy | ObjectType::EnemyBoss) => self.enemies.mark_deleted(id),
            Some(ObjectType::EnemyBossScene) => self.bosses.mark_deleted(id),
            Some(ty) if ty.is_shot() => self.shots.mark_deleted(id),
            Some(ObjectType::Item) => self.items.mark_deleted(id),
            Some(ObjectType::PatternShot) => match self.patterns.get_mut(&id) {
                Some(pattern) => {
                    pattern.state = ObjectState::Deleted;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    pub fn move_object(&self, id: ObjectId) -> Option<&MoveObject> {
        if let Some(player) = self.players.player().filter(|player| player.id == id) {
            return Some(&player.motion);
        }
        if let Some(enemy) = self.enemies.get(id) {
            return Some(&enemy.motion);
        }
        if let Some(shot) = self.shots.get(id) {
            return Some(&shot.motion);
        }
        self.items.get(id).map(|item| &item.motion)
    }

    pub fn move_object_mut(&mut self, id: ObjectId) -> Option<&mut MoveObject> {
        if self.players.player_id() == Some(id) {
            return self.players.player_mut().map(|player| &mut player.motion);
        }
        if self.enemies.get(id).is_some() {
            return self.enemies.get_mut(id).map(|enemy| &mut enemy.motion);
        }
        if self.shots.get(id).is_some() {
            return self.shots.get_mut(id).map(|shot| &mut shot.motion);
        }
        self.items.get_mut(id).map(|item| &mut item.motion)
    }

    pub fn object_position(&self, id: ObjectId) -> Option<Vec2> {
        self.move_object(id).map(|motion| motion.position)
    }

    pub fn render_priority(&self, id: ObjectId) -> Option<i32> {
        match self.object_type(id)? {
            ObjectType::Player => self.players.player().map(|player| player.render_priority),
            ObjectType::Spell => self.players.spell(id).map(|spell| spell.render_priority),
            ObjectType::Enemy | ObjectType::EnemyBoss => self.enemies.get(id).map(|enemy| enemy.render_priority),
            ObjectType::Item => self.items.get(id).map(|item| item.render_priority),
            ty if ty.is_shot() => self.shots.get(id).map(|shot| shot.render_priority),
            _ => None,
        }
    }

    pub fn set_render_priority(&mut self, id: ObjectId, priority: i32) -> bool {
        let updated = match self.object_type(id) {
            Some(ObjectType::Player) => self.players.player_mut().map(|player| player.render_priority = priority),
            Some(ObjectType::Spell) => self.players.spell_mut(id).map(|spell| spell.render_priority = priority),
            Some(ObjectType::Enemy | ObjectType::EnemyBoss) => {
                self.enemies.get_mut(id).map(|enemy| enemy.render_priority = priority)
            }
            Some(ObjectType::Item) => self.items.get_mut(id).map(|item| item.render_priority = priority),
            Some(ty) if ty.is_shot() => self.shots.get_mut(id).map(|shot| shot.render_priority = priority),
            _ => None,
        };
        updated.is_some()
    }

    /// Active objects in draw order: priority, then id.
    pub fn render_queue(&self) -> Vec<RenderEntry> {
        let mut queue: Vec<RenderEntry> = Vec::new();
        if let Some(player) = self.players.player().filter(|player| player.state != PlayerState::End) {
            queue.push(RenderEntry { priority: player.render_priority, id: player.id, object_type: ObjectType::Player });
        }
        queue.extend(self.enemies.iter().map(|enemy| RenderEntry {
            priority: enemy.render_priority,
            id: enemy.id,
            object_type: if enemy.boss { ObjectType::EnemyBoss } else { ObjectType::Enemy },
        }));
        queue.extend(self.shots.iter().map(|shot| RenderEntry {
            priority: shot.render_priority,
            id: shot.id,
            object_type: shot.object_type(),
        }));
        queue.extend(self.items.iter().map(|item| RenderEntry {
            priority: item.render_priority,
            id: item.id,
            object_type: ObjectType::Item,
        }));
        queue.sort_by_key(|entry| (entry.priority, entry.id));
        queue
    }

    // ---- shots --------------------------------------------------------------------------

    fn emit_shot_delete(&mut self, mode: ShotDeleteMode, shot: ObjectId, position: Vec2, graphic: i64) {
        if self.shots.delete_event_enabled(mode) {
            self.events.push(StageEvent::DeleteShot { mode, shot, position, graphic });
        }
    }

    /// Deletes one active shot the way `mode` asks. Shots already fading only accept
    /// an immediate delete.
    pub fn delete_shot(&mut self, id: ObjectId, mode: ShotDeleteMode) -> bool {
        let Some(shot) = self.shots.get(id).filter(|shot| shot.state == ObjectState::Active) else {
            return false;
        };
        if shot.is_fading() && mode != ShotDeleteMode::Immediate {
            return false;
        }
        let (position, graphic, item_change) = (shot.position(), shot.graphic, shot.item_change);
        match mode {
            ShotDeleteMode::Immediate => {
                self.shots.mark_deleted(id);
                self.emit_shot_delete(mode, id, position, graphic);
                true
            }
            ShotDeleteMode::Fade => {
                let frames = self.config.shot_fade_frames;
                if let Some(shot) = self.shots.get_mut(id) {
                    shot.start_fade(frames);
                }
                self.emit_shot_delete(mode, id, position, graphic);
                true
            }
            ShotDeleteMode::ToItem if item_change => self.convert_shot_to_item(id),
            ShotDeleteMode::ToItem => self.delete_shot(id, ShotDeleteMode::Fade),
        }
    }

    /// Replaces a shot by bonus items in one step: the shot leaves the shot enumeration
    /// and the items enter the item enumeration before anything else can observe either.
    pub fn convert_shot_to_item(&mut self, id: ObjectId) -> bool {
        let Some(shot) = self.shots.get(id).filter(|shot| shot.state == ObjectState::Active) else {
            return false;
        };
        let points = shot.item_points(self.items.room());
        let (position, graphic) = (shot.position(), shot.graphic);
        self.shots.mark_deleted(id);
        if self.items.default_bonus {
            let player = self.players.position();
            let speed = self.items.collect_speed;
            for point in points {
                let Some(item_id) = self.spawn_item(ITEM_POINT_S, point, point, 0) else { break };
                if let (Some(item), Some(player)) = (self.items.get_mut(item_id), player) {
                    item.set_move(ItemMoveKind::ToPlayer, player, speed);
                }
            }
        }
        self.emit_shot_delete(ShotDeleteMode::ToItem, id, position, graphic);
        true
    }

    /// Bulk delete of enemy shots, optionally restricted to `region`. Returns how many went.
    pub fn delete_shots(&mut self, target: DeleteTarget, mode: ShotDeleteMode, region: Option<Circle>) -> usize {
        let candidates = self.shots.delete_candidates(target, region.as_ref());
        let deleted = candidates.into_iter().filter(|id| self.delete_shot(*id, mode)).count();
        debug!(target: "stage", ?target, ?mode, deleted, "bulk shot delete");
        deleted
    }

    /// Registers a script-supplied hitbox for a shot this frame. The automatic hitbox
    /// stays off for the shot from now on.
    pub fn add_shot_intersection(&mut self, id: ObjectId, shape: Shape) -> bool {
        let Some(shot) = self.shots.get_mut(id).filter(|shot| shot.state == ObjectState::Active) else {
            return false;
        };
        if shot.delay > 0 {
            return false;
        }
        shot.user_intersection = true;
        let Some(owner) = shot.owner_slot else { return false };
        let Some((category, flags)) = shot_category(shot) else { return false };
        let target = IntersectionTarget::new(shape, category).with_owner(owner).with_flags(flags);
        self.intersection.add_target(target).is_some()
    }

    /// Fires a pattern shot. Returns the new shot ids, stack outer and way inner;
    /// firing stops early at the shot cap.
    pub fn fire_pattern(&mut self, id: ObjectId) -> Vec<ObjectId> {
        let Some(pattern) = self.patterns.get(&id).filter(|p| p.state == ObjectState::Active).cloned() else {
            return Vec::new();
        };
        let parent_position = pattern.parent.and_then(|parent| self.object_position(parent));
        let child = pattern.parent.is_some_and(|parent| self.shots.get(parent).is_some());
        let room = self.shots.room();
        let spawns = pattern.expand(parent_position, self.players.position(), &mut self.rng, room);
        let mut fired = Vec::with_capacity(spawns.len());
        for spawn in spawns {
            let motion = MoveObject::with_angle(spawn.position, spawn.speed, spawn.angle);
            let Some(shot_id) = self.spawn_shot(pattern.shot_type, pattern.owner, motion, pattern.graphic, pattern.delay)
            else {
                break;
            };
            if let Some(shot) = self.shots.get_mut(shot_id) {
                shot.blend = pattern.blend;
                shot.child = child;
                shot.delay_params.motion = pattern.delay_motion;
                if shot.is_laser() {
                    shot.laser.length = pattern.laser_length;
                    shot.laser.set_render_width(pattern.laser_width);
                }
                if let ShotKind::Curve(curve) = &mut shot.kind {
                    curve.max_nodes = pattern.laser_length.max(1.0) as usize;
                }
                for (delay, ops) in compile_transforms(&pattern.transforms, spawn.speed) {
                    shot.motion.pattern.schedule(delay, ops);
                }
            }
            fired.push(shot_id);
        }
        trace!(target: "stage", pattern = %id, fired = fired.len(), "pattern fired");
        fired
    }

    // ---- data -----------------------------------------------------------------------------

    pub fn load_data(&mut self, slot: DataSlot, path: &str, reload: bool) -> bool {
        let result = if reload {
            self.data.reload(self.assets.as_ref(), slot, path)
        } else {
            self.data.load(self.assets.as_ref(), slot, path)
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                debug!(target: "assets", path, ?slot, error = ?err, "data load failed");
                false
            }
        }
    }

    // ---- player ---------------------------------------------------------------------------

    /// Starts a spell for the player. Returns the spell-manage object id.
    pub fn call_spell(&mut self) -> Option<ObjectId> {
        if !self.players.permits_spell() {
            return None;
        }
        let manage = self.ids.allocate();
        if !self.players.begin_spell(manage) {
            return None;
        }
        if let Some(player) = self.players.player_id() {
            self.events.push(StageEvent::PlayerSpell { player });
        }
        if let Some(scene) = self.bosses.active_mut() {
            scene.record_spell();
        }
        debug!(target: "stage", manage = %manage, "spell started");
        Some(manage)
    }

    /// Asks the player script to cast a spell.
    pub fn request_spell(&mut self) -> bool {
        let Some(player) = self.players.player_id() else { return false };
        if !self.players.permits_spell() {
            return false;
        }
        self.events.push(StageEvent::RequestSpell { player });
        true
    }

    pub fn kill_player(&mut self) -> bool {
        let Some(player) = self.players.player_mut() else { return false };
        if !player.kill() {
            return false;
        }
        let id = player.id;
        self.events.push(StageEvent::Hit { player: id, source: None });
        true
    }

    // ---- scripts and replay -------------------------------------------------------------

    /// Claims the shot script slot. False when a shot script already runs.
    pub fn start_shot_script(&mut self, path: &str) -> bool {
        if self.scripts.shot_script.is_some() {
            return false;
        }
        self.scripts.shot_script = Some(path.to_string());
        true
    }

    pub fn start_item_script(&mut self, path: &str) -> bool {
        if self.scripts.item_script.is_some() {
            return false;
        }
        self.scripts.item_script = Some(path.to_string());
        true
    }

    pub fn save_common_data_to_replay(&mut self, area: &str) -> anyhow::Result<bool> {
        common_data::save_area_to_replay(&self.common_data, self.replay.as_mut(), area)
    }

    pub fn load_common_data_from_replay(&mut self, area: &str) -> anyhow::Result<bool> {
        common_data::load_area_from_replay(&mut self.common_data, self.replay.as_ref(), area)
    }

    // ---- boss scenes ----------------------------------------------------------------------

    /// Resolves the active scene data if it still waits for its description: creates one
    /// unregistered boss enemy per life entry and announces the step.
    pub fn resolve_boss_scene(&mut self, source: &mut dyn SceneDataSource) -> bool {
        let Some(path) = self.bosses.active().and_then(BossScene::pending_path).map(str::to_string) else {
            return false;
        };
        let description = source.describe(&path);
        let mut bosses = Vec::with_capacity(description.life.len());
        for life in &description.life {
            let id = self.ids.allocate();
            let mut enemy = EnemyObject::new(id, true, self.config.render.enemy);
            enemy.life = *life;
            enemy.owner_slot = Some(self.intersection.register_owner(id));
            self.enemies.insert(enemy);
            bosses.push(id);
        }
        let spell = description.spell;
        let Some(scene) = self.bosses.active_mut() else { return false };
        let scene_id = scene.id;
        scene.resolve(description, bosses);
        self.events.push(StageEvent::StartBossStep { scene: scene_id });
        if spell {
            self.events.push(StageEvent::StartBossSpell { scene: scene_id });
        }
        debug!(target: "stage", scene = %scene_id, path = %path, spell, "boss scene data resolved");
        true
    }

    // ---- frame loop -----------------------------------------------------------------------

    /// Simulates one frame: movement, hitbox registration, the intersection pass and its
    /// dispatch, item collection, boss bookkeeping, then removal of deleted objects.
    pub fn advance_frame(&mut self) -> FrameReport {
        self.resolve_boss_scene(&mut DefaultSceneSource);
        self.step_objects();
        self.register_shot_hitboxes();

        let contacts = self.intersection.run_pass();
        let contact_count = contacts.len();
        self.enemies.reset_hit_counts();
        self.dispatch(contacts);
        self.collect_items();
        self.progress_bosses();
        self.discard_unregistered();
        self.remove_deleted();

        self.enemies.end_frame();
        self.clock.tick();
        self.intersection.set_frame(self.clock.frame());
        self.intersection.purge();

        let report = FrameReport {
            frame: self.clock.frame(),
            shots: self.shots.active_count(),
            items: self.items.active_count(),
            enemies: self.enemies.active_count(),
            contacts: contact_count,
        };
        trace!(target: "stage", frame = report.frame, shots = report.shots, contacts = report.contacts, "frame advanced");
        report
    }

    fn step_objects(&mut self) {
        let mut anchors: HashMap<ObjectId, Vec2> = self.enemies.iter().map(|e| (e.id, e.position())).collect();
        if let Some(player) = self.players.player() {
            anchors.insert(player.id, player.position());
        }

        let env = StepEnv { player: self.players.position(), anchors: Some(&anchors) };
        let transition = self.players.player_mut().and_then(|player| {
            let transition = player.step(env);
            player.sync_hitboxes(&mut self.intersection);
            transition.map(|t| (player.id, t, player.shootdown_event))
        });
        match transition {
            Some((player, PlayerTransition::Shootdown, announce)) => {
                if announce {
                    self.events.push(StageEvent::PlayerShootdown { player });
                }
                if let Some(scene) = self.bosses.active_mut() {
                    scene.record_shootdown();
                }
            }
            Some((player, PlayerTransition::Rebirth, _)) => self.events.push(StageEvent::PlayerRebirth { player }),
            None => {}
        }

        let env = StepEnv { player: self.players.position(), anchors: Some(&anchors) };
        self.enemies.step(env, &mut self.intersection);

        let clip = self.shots.clip();
        let mut gone = Vec::new();
        for shot in self.shots.iter_mut() {
            let tick = shot.tick(env);
            let clipped = shot.auto_delete
                && !matches!(shot.kind, ShotKind::Straight(_))
                && !clip.contains(shot.position());
            if tick.faded || tick.expired || clipped {
                gone.push(shot.id);
            }
        }
        for id in gone {
            self.shots.mark_deleted(id);
        }

        self.items.step(env.player, self.config.field.height);
    }

    fn register_shot_hitboxes(&mut self) {
        let mut targets = Vec::new();
        for shot in self.shots.iter().filter(|shot| shot.collides() && !shot.user_intersection) {
            let (Some(owner), Some((category, flags))) = (shot.owner_slot, shot_category(shot)) else { continue };
            let slot = if shot.owner == OwnerType::Player { DataSlot::PlayerShot } else { DataSlot::EnemyShot };
            let circles: Vec<(f32, Vec2)> = self
                .data
                .shot_data(slot, shot.graphic)
                .map(|data| data.collision.iter().map(|c| (c.radius, Vec2::new(c.x, c.y))).collect())
                .unwrap_or_default();
            targets.extend(
                shot.hit_shapes(&circles)
                    .into_iter()
                    .map(|shape| IntersectionTarget::new(shape, category).with_owner(owner).with_flags(flags)),
            );
        }
        for target in targets {
            self.intersection.add_target(target);
        }
    }

    fn dispatch(&mut self, contacts: Vec<Contact>) {
        for contact in contacts {
            let Some(subject) = contact.subject else { continue };
            match contact.kind {
                ContactKind::EnemyHitByShot => {
                    let Some(source) = contact.source else { continue };
                    self.enemy_hit_by_shot(subject, source);
                }
                ContactKind::EnemyHitBySpell => {
                    let Some(source) = contact.source else { continue };
                    self.enemy_hit_by_spell(subject, source);
                }
                ContactKind::ShotErased => {
                    let resist = match self.shots.get(subject).filter(|shot| shot.state == ObjectState::Active) {
                        Some(shot) => shot.is_spell_resist(),
                        None => continue,
                    };
                    if !resist {
                        self.delete_shot(subject, ShotDeleteMode::ToItem);
                    }
                }
                ContactKind::PlayerHit => self.player_hit(contact.source),
                ContactKind::PlayerGraze => {
                    let Some(source) = contact.source else { continue };
                    self.player_graze(source);
                }
            }
        }
    }

    fn enemy_hit_by_shot(&mut self, enemy_id: ObjectId, shot_id: ObjectId) {
        let Some(shot) = self.shots.get_mut(shot_id).filter(|shot| shot.state == ObjectState::Active) else { return };
        let Some(enemy) = self.enemies.get_mut(enemy_id).filter(|enemy| enemy.state == ObjectState::Active) else {
            return;
        };
        enemy.take_damage(shot.damage, shot.spell_factor);
        enemy.hit_count += 1;
        if shot.is_spell_resist() {
            return;
        }
        shot.life -= 1.0;
        if shot.life <= 0.0 {
            let (position, graphic) = (shot.position(), shot.graphic);
            self.shots.mark_deleted(shot_id);
            self.events.push(StageEvent::DeletePlayerShot { shot: shot_id, position, graphic });
        }
    }

    fn enemy_hit_by_spell(&mut self, enemy_id: ObjectId, spell_id: ObjectId) {
        let Some(spell) = self.players.spell_mut(spell_id).filter(|spell| spell.state == ObjectState::Active) else {
            return;
        };
        let Some(enemy) = self.enemies.get_mut(enemy_id).filter(|enemy| enemy.state == ObjectState::Active) else {
            return;
        };
        enemy.take_damage(spell.damage, true);
        spell.penetration -= 1.0;
        if spell.penetration <= 0.0 {
            self.players.mark_spell_deleted(spell_id);
        }
    }

    fn player_hit(&mut self, source: Option<ObjectId>) {
        let source_shot = match source {
            None => None,
            Some(id) if self.shots.get(id).is_some_and(|shot| shot.state == ObjectState::Active) => Some(id),
            Some(id) if self.enemies.get(id).is_some_and(|enemy| enemy.state == ObjectState::Active) => None,
            Some(_) => return,
        };
        let Some(player) = self.players.player_mut() else { return };
        if !player.hit() {
            return;
        }
        let (id, erase) = (player.id, player.erase_shot_on_hit);
        self.events.push(StageEvent::Hit { player: id, source });
        if let (true, Some(shot)) = (erase, source_shot) {
            self.delete_shot(shot, ShotDeleteMode::Immediate);
        }
    }

    fn player_graze(&mut self, shot_id: ObjectId) {
        let Some(shot) = self.shots.get_mut(shot_id).filter(|shot| shot.state == ObjectState::Active) else { return };
        let Some(player) = self.players.player_mut() else { return };
        if !shot.graze.is_valid() || !player.can_graze() {
            return;
        }
        shot.graze.register();
        player.graze_count += 1;
        let id = player.id;
        self.events.push(StageEvent::Graze { player: id, count: 1, shot: shot_id });
    }

    fn collect_items(&mut self) {
        let collector = self
            .players
            .player()
            .filter(|player| matches!(player.state, PlayerState::Normal | PlayerState::Hit))
            .map(|player| Collector {
                position: player.position(),
                collect_line: player.item_collect_line,
                scope: player.item_scope,
            });
        for item in self.items.collect(collector) {
            self.events.push(StageEvent::GetItem { item_type: item.item_type, item: item.id, position: item.position });
        }
    }

    fn progress_bosses(&mut self) {
        let Some(scene) = self.bosses.active_mut() else { return };
        let scene_id = scene.id;
        let progress = scene.progress(&self.enemies);
        if progress.timed_out {
            self.events.push(StageEvent::Timeout { scene: scene_id });
        }
        if let Some((bosses, bonus, spell)) = progress.finished {
            if spell {
                self.events.push(StageEvent::EndBossSpell { scene: scene_id });
            }
            if let Some(score) = bonus {
                self.events.push(StageEvent::GainSpell { scene: scene_id, score });
            }
            self.events.push(StageEvent::EndBossStep { scene: scene_id });
            for id in bosses {
                self.enemies.mark_deleted(id);
            }
        }
        if progress.scene_over {
            debug!(target: "stage", scene = %scene_id, "boss scene finished");
        }
    }

    /// Drops objects that were created [`UNREGISTERED_GRACE_FRAMES`] or more frames ago
    /// and never registered. Boss enemies belong to their scene and are not tracked.
    fn discard_unregistered(&mut self) {
        // Counts the frame being finished.
        let elapsed_through = self.clock.frame() + 1;
        while let Some(&(created, id)) = self.unregistered.front() {
            if created + UNREGISTERED_GRACE_FRAMES > elapsed_through {
                break;
            }
            self.unregistered.pop_front();
            let inactive = |state: ObjectState| state == ObjectState::Inactive;
            let discarded = if self.shots.get(id).is_some_and(|shot| inactive(shot.state)) {
                self.shots.mark_deleted(id)
            } else if self.items.get(id).is_some_and(|item| inactive(item.state)) {
                self.items.mark_deleted(id)
            } else if self.enemies.get(id).is_some_and(|enemy| inactive(enemy.state)) {
                self.enemies.mark_deleted(id)
            } else {
                false
            };
            if discarded {
                trace!(target: "stage", %id, "unregistered object discarded");
            }
        }
    }

    fn remove_deleted(&mut self) {
        let mut slots = Vec::new();
        slots.extend(self.shots.remove_deleted().into_iter().filter_map(|shot| shot.owner_slot));
        slots.extend(self.items.remove_deleted().into_iter().filter_map(|item| item.owner_slot));
        slots.extend(self.enemies.remove_deleted().into_iter().filter_map(|enemy| enemy.owner_slot));
        slots.extend(self.players.remove_deleted_spells().into_iter().filter_map(|spell| spell.owner_slot));
        for slot in slots {
            self.intersection.release_owner(slot);
        }
        self.bosses.remove_deleted();
        self.patterns.retain(|_, pattern| pattern.state != ObjectState::Deleted);
    }
}

/// Collision category and flags of a shot's hitboxes. Ownerless shots never collide.
fn shot_category(shot: &ShotObject) -> Option<(TargetCategory, TargetFlags)> {
    match shot.owner {
        OwnerType::Player => {
            let flags = if shot.erase_shot { TargetFlags::ERASE_SHOT } else { TargetFlags::empty() };
            Some((TargetCategory::PlayerShot, flags))
        }
        OwnerType::Enemy => Some((TargetCategory::EnemyShot, TargetFlags::empty())),
        OwnerType::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::boss_scene::SceneDescription;
    use crate::stage::item::ITEM_POINT;

    fn stage() -> StageContext {
        let mut config = StageConfig::default();
        config.seed = Some(7);
        StageContext::new(config)
    }

    fn enemy_shot(ctx: &mut StageContext, x: f32, y: f32) -> ObjectId {
        ctx.spawn_shot(ObjectType::Shot, OwnerType::Enemy, MoveObject::at(Vec2::new(x, y)), 1, 0).expect("shot")
    }

    struct Script(SceneDescription);

    impl SceneDataSource for Script {
        fn describe(&mut self, _path: &str) -> SceneDescription {
            self.0.clone()
        }
    }

    #[test]
    fn shot_cap_refuses_before_allocating() {
        let mut config = StageConfig::default();
        config.caps.shot_max = 2;
        let mut ctx = StageContext::new(config);
        enemy_shot(&mut ctx, 10.0, 10.0);
        enemy_shot(&mut ctx, 20.0, 10.0);
        let before = ctx.ids.peek();
        assert!(ctx.spawn_shot(ObjectType::Shot, OwnerType::Enemy, MoveObject::default(), 1, 0).is_none());
        assert_eq!(ctx.ids.peek(), before);
        assert_eq!(ctx.shots.active_count(), 2);
    }

    #[test]
    fn convert_to_item_swaps_the_shot_for_an_item() {
        let mut ctx = stage();
        let shot = enemy_shot(&mut ctx, 40.0, 50.0);
        assert!(ctx.convert_shot_to_item(shot));
        assert!(ctx.shots.get(shot).is_none());
        let items: Vec<Vec2> = ctx.items.iter().map(ItemObject::position).collect();
        assert_eq!(items, vec![Vec2::new(40.0, 50.0)]);
        assert!(!ctx.convert_shot_to_item(shot));
    }

    #[test]
    fn deleted_objects_report_as_deleted_and_release_hitboxes() {
        let mut ctx = stage();
        let enemy = ctx.create_enemy();
        assert!(ctx.regist_enemy(enemy));
        let (intersection, enemies) = (&mut ctx.intersection, &mut ctx.enemies);
        enemies.get_mut(enemy).expect("enemy").add_relative_hitbox(intersection, Vec2::ZERO, 8.0);
        assert_eq!(ctx.intersection.registered_enemy_ids(), vec![enemy]);
        assert!(ctx.delete_object(enemy));
        ctx.advance_frame();
        assert!(ctx.is_deleted(enemy));
        assert!(ctx.intersection.registered_enemy_ids().is_empty());
    }

    #[test]
    fn player_shot_damages_enemy_and_spends_penetration() {
        let mut ctx = stage();
        let enemy = ctx.create_enemy();
        ctx.regist_enemy(enemy);
        {
            let (intersection, enemies) = (&mut ctx.intersection, &mut ctx.enemies);
            let target = enemies.get_mut(enemy).expect("enemy");
            target.life = 10.0;
            target.motion.position = Vec2::new(100.0, 100.0);
            target.add_relative_hitbox(intersection, Vec2::ZERO, 16.0);
        }
        let shot = ctx
            .spawn_shot(ObjectType::Shot, OwnerType::Player, MoveObject::at(Vec2::new(100.0, 104.0)), 1, 0)
            .expect("player shot");
        ctx.shots.get_mut(shot).expect("shot").damage = 3.0;
        ctx.advance_frame();
        assert_eq!(ctx.enemies.get(enemy).map(|e| e.life), Some(7.0));
        assert!(ctx.shots.get(shot).is_none());
        let events = ctx.events.drain();
        assert!(events.iter().any(|event| matches!(event, StageEvent::DeletePlayerShot { shot: s, .. } if *s == shot)));
    }

    #[test]
    fn boss_scene_resolves_and_finishes_when_bosses_fall() {
        let mut ctx = stage();
        let scene = ctx.create_boss_scene();
        ctx.bosses.get_mut(scene).expect("scene").add(0, "nonspell.dnh");
        assert!(ctx.regist_boss_scene(scene));
        let mut source = Script(SceneDescription { life: vec![50.0], spell: true, spell_score: 1000, ..Default::default() });
        assert!(ctx.resolve_boss_scene(&mut source));
        let boss = ctx.next_boss_enemy().expect("active scene");
        assert!(boss.is_valid());
        assert_eq!(ctx.next_boss_enemy(), Some(ObjectId::INVALID));
        ctx.regist_enemy(boss);
        ctx.enemies.get_mut(boss).expect("boss").life = 0.0;
        ctx.advance_frame();
        let names: Vec<&str> = ctx.events.drain().iter().map(StageEvent::name).collect();
        assert_eq!(
            names,
            vec!["EV_START_BOSS_STEP", "EV_START_BOSS_SPELL", "EV_END_BOSS_SPELL", "EV_GAIN_SPELL", "EV_END_BOSS_STEP"]
        );
        assert!(ctx.bosses.active().is_none());
        assert!(ctx.is_deleted(boss));
    }

    #[test]
    fn bulk_delete_to_item_respects_item_change() {
        let mut ctx = stage();
        let plain = enemy_shot(&mut ctx, 10.0, 10.0);
        let fading = enemy_shot(&mut ctx, 12.0, 10.0);
        ctx.shots.get_mut(fading).expect("shot").item_change = false;
        let deleted = ctx.delete_shots(DeleteTarget::All, ShotDeleteMode::ToItem, None);
        assert_eq!(deleted, 2);
        assert!(ctx.shots.get(plain).is_none());
        assert!(ctx.shots.get(fading).expect("still fading").is_fading());
        assert_eq!(ctx.items.iter().filter(|item| item.item_type == ITEM_POINT_S).count(), 1);
        assert_eq!(ctx.items.iter().filter(|item| item.item_type == ITEM_POINT).count(), 0);
    }
}
