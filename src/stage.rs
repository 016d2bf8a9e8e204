//! Stage object model: typed objects, their managers, and the per-frame aggregate.

pub mod boss_scene;
pub mod context;
pub mod enemy;
pub mod item;
pub mod player;
pub mod shot;
pub mod shot_manager;
pub mod types;

pub use boss_scene::{BossScene, BossSceneManager, DefaultSceneSource, SceneDataSource, SceneDescription};
pub use context::{FrameReport, RenderEntry, ScriptSlots, StageContext, StgFrame};
pub use enemy::{EnemyManager, EnemyObject};
pub use item::{ItemManager, ItemObject};
pub use player::{PlayerManager, PlayerObject, PlayerState, SpellObject};
pub use shot::{ShotKind, ShotObject};
pub use shot_manager::{DeleteTarget, OwnerFilter, ShotManager};
pub use types::{
    IdAllocator, ObjectId, ObjectState, ObjectType, OwnerType, LIFE_SPELL_REGIST, LIFE_SPELL_UNREGIST, STANDARD_FPS,
};
