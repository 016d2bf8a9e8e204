use serde::{Deserialize, Serialize};
use std::fmt;

/// Shot life value marking "registered as spell-resistant".
pub const LIFE_SPELL_REGIST: f64 = 5_000_000.0;
/// Shot life value marking "spell resistance removed".
pub const LIFE_SPELL_UNREGIST: f64 = 4_000_000.0;

pub const STANDARD_FPS: i64 = 60;

/// Stage object identifier. Ids are handed out monotonically and never reused
/// within one stage, so an id refers to at most one object for the stage's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub i64);

impl ObjectId {
    pub const INVALID: ObjectId = ObjectId(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    pub fn from_script(raw: f64) -> ObjectId {
        if raw.is_finite() && raw >= 0.0 {
            ObjectId(raw as i64)
        } else {
            ObjectId::INVALID
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }

    pub fn peek(&self) -> ObjectId {
        ObjectId(self.next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerType {
    Player,
    Enemy,
    Null,
}

impl OwnerType {
    pub fn from_script(raw: i64) -> OwnerType {
        match raw {
            0 => OwnerType::Player,
            1 => OwnerType::Enemy,
            _ => OwnerType::Null,
        }
    }

    pub fn to_script(self) -> i64 {
        match self {
            OwnerType::Player => 0,
            OwnerType::Enemy => 1,
            OwnerType::Null => 2,
        }
    }
}

/// Lifecycle: created objects start `Inactive`, registration makes them `Active`,
/// deletion marks them `Deleted` until the owning manager drops them at frame end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    Inactive,
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Player,
    SpellManage,
    Spell,
    Enemy,
    EnemyBoss,
    EnemyBossScene,
    Shot,
    LooseLaser,
    StraightLaser,
    CurveLaser,
    Item,
    PatternShot,
}

impl ObjectType {
    pub const ALL: [ObjectType; 12] = [
        ObjectType::Player,
        ObjectType::SpellManage,
        ObjectType::Spell,
        ObjectType::Enemy,
        ObjectType::EnemyBoss,
        ObjectType::EnemyBossScene,
        ObjectType::Shot,
        ObjectType::LooseLaser,
        ObjectType::StraightLaser,
        ObjectType::CurveLaser,
        ObjectType::Item,
        ObjectType::PatternShot,
    ];

    pub fn to_script(self) -> i64 {
        match self {
            ObjectType::Player => 100,
            ObjectType::SpellManage => 101,
            ObjectType::Spell => 102,
            ObjectType::Enemy => 103,
            ObjectType::EnemyBoss => 104,
            ObjectType::EnemyBossScene => 105,
            ObjectType::Shot => 106,
            ObjectType::LooseLaser => 107,
            ObjectType::StraightLaser => 108,
            ObjectType::CurveLaser => 109,
            ObjectType::Item => 110,
            ObjectType::PatternShot => 111,
        }
    }

    pub fn from_script(raw: i64) -> Option<ObjectType> {
        Self::ALL.into_iter().find(|ty| ty.to_script() == raw)
    }

    pub fn is_shot(self) -> bool {
        matches!(
            self,
            ObjectType::Shot | ObjectType::LooseLaser | ObjectType::StraightLaser | ObjectType::CurveLaser
        )
    }
}
