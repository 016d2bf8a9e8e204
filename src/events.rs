use glam::Vec2;
use std::fmt;

use crate::stage::ObjectId;

pub const EV_REQUEST_LIFE: i64 = 1;
pub const EV_REQUEST_TIMER: i64 = 2;
pub const EV_REQUEST_IS_SPELL: i64 = 3;
pub const EV_REQUEST_IS_LAST_SPELL: i64 = 4;
pub const EV_REQUEST_IS_DURABLE_SPELL: i64 = 5;
pub const EV_REQUEST_REQUIRE_ALL_DOWN: i64 = 6;
pub const EV_REQUEST_SPELL_SCORE: i64 = 7;
pub const EV_REQUEST_REPLAY_TARGET_COMMON_AREA: i64 = 8;
pub const EV_TIMEOUT: i64 = 10;
pub const EV_START_BOSS_SPELL: i64 = 11;
pub const EV_END_BOSS_SPELL: i64 = 12;
pub const EV_GAIN_SPELL: i64 = 13;
pub const EV_START_BOSS_STEP: i64 = 14;
pub const EV_END_BOSS_STEP: i64 = 15;
pub const EV_PLAYER_SHOOTDOWN: i64 = 20;
pub const EV_PLAYER_SPELL: i64 = 21;
pub const EV_PLAYER_REBIRTH: i64 = 22;
pub const EV_PAUSE_ENTER: i64 = 30;
pub const EV_PAUSE_LEAVE: i64 = 31;
pub const EV_GET_ITEM: i64 = 40;
pub const EV_DELETE_SHOT_IMMEDIATE: i64 = 41;
pub const EV_DELETE_SHOT_TO_ITEM: i64 = 42;
pub const EV_DELETE_SHOT_FADE: i64 = 43;
pub const EV_REQUEST_SPELL: i64 = 50;
pub const EV_GRAZE: i64 = 51;
pub const EV_HIT: i64 = 52;
pub const EV_DELETE_SHOT_PLAYER: i64 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShotDeleteMode {
    Immediate,
    Fade,
    ToItem,
}

impl ShotDeleteMode {
    pub const ALL: [ShotDeleteMode; 3] = [ShotDeleteMode::Immediate, ShotDeleteMode::Fade, ShotDeleteMode::ToItem];

    pub fn index(self) -> usize {
        match self {
            ShotDeleteMode::Immediate => 0,
            ShotDeleteMode::Fade => 1,
            ShotDeleteMode::ToItem => 2,
        }
    }

    /// Mode selected by an `EV_DELETE_SHOT_*` event code.
    pub fn from_event_code(code: i64) -> Option<ShotDeleteMode> {
        match code {
            EV_DELETE_SHOT_IMMEDIATE => Some(ShotDeleteMode::Immediate),
            EV_DELETE_SHOT_TO_ITEM => Some(ShotDeleteMode::ToItem),
            EV_DELETE_SHOT_FADE => Some(ShotDeleteMode::Fade),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Timeout { scene: ObjectId },
    StartBossSpell { scene: ObjectId },
    EndBossSpell { scene: ObjectId },
    GainSpell { scene: ObjectId, score: i64 },
    StartBossStep { scene: ObjectId },
    EndBossStep { scene: ObjectId },
    PlayerShootdown { player: ObjectId },
    PlayerSpell { player: ObjectId },
    PlayerRebirth { player: ObjectId },
    RequestSpell { player: ObjectId },
    Hit { player: ObjectId, source: Option<ObjectId> },
    Graze { player: ObjectId, count: u32, shot: ObjectId },
    GetItem { item_type: i64, item: ObjectId, position: Vec2 },
    DeleteShot { mode: ShotDeleteMode, shot: ObjectId, position: Vec2, graphic: i64 },
    DeletePlayerShot { shot: ObjectId, position: Vec2, graphic: i64 },
}

impl StageEvent {
    /// Script-visible event type.
    pub fn code(&self) -> i64 {
        match self {
            StageEvent::Timeout { .. } => EV_TIMEOUT,
            StageEvent::StartBossSpell { .. } => EV_START_BOSS_SPELL,
            StageEvent::EndBossSpell { .. } => EV_END_BOSS_SPELL,
            StageEvent::GainSpell { .. } => EV_GAIN_SPELL,
            StageEvent::StartBossStep { .. } => EV_START_BOSS_STEP,
            StageEvent::EndBossStep { .. } => EV_END_BOSS_STEP,
            StageEvent::PlayerShootdown { .. } => EV_PLAYER_SHOOTDOWN,
            StageEvent::PlayerSpell { .. } => EV_PLAYER_SPELL,
            StageEvent::PlayerRebirth { .. } => EV_PLAYER_REBIRTH,
            StageEvent::RequestSpell { .. } => EV_REQUEST_SPELL,
            StageEvent::Hit { .. } => EV_HIT,
            StageEvent::Graze { .. } => EV_GRAZE,
            StageEvent::GetItem { .. } => EV_GET_ITEM,
            StageEvent::DeleteShot { mode: ShotDeleteMode::Immediate, .. } => EV_DELETE_SHOT_IMMEDIATE,
            StageEvent::DeleteShot { mode: ShotDeleteMode::Fade, .. } => EV_DELETE_SHOT_FADE,
            StageEvent::DeleteShot { mode: ShotDeleteMode::ToItem, .. } => EV_DELETE_SHOT_TO_ITEM,
            StageEvent::DeletePlayerShot { .. } => EV_DELETE_SHOT_PLAYER,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageEvent::Timeout { .. } => "EV_TIMEOUT",
            StageEvent::StartBossSpell { .. } => "EV_START_BOSS_SPELL",
            StageEvent::EndBossSpell { .. } => "EV_END_BOSS_SPELL",
            StageEvent::GainSpell { .. } => "EV_GAIN_SPELL",
            StageEvent::StartBossStep { .. } => "EV_START_BOSS_STEP",
            StageEvent::EndBossStep { .. } => "EV_END_BOSS_STEP",
            StageEvent::PlayerShootdown { .. } => "EV_PLAYER_SHOOTDOWN",
            StageEvent::PlayerSpell { .. } => "EV_PLAYER_SPELL",
            StageEvent::PlayerRebirth { .. } => "EV_PLAYER_REBIRTH",
            StageEvent::RequestSpell { .. } => "EV_REQUEST_SPELL",
            StageEvent::Hit { .. } => "EV_HIT",
            StageEvent::Graze { .. } => "EV_GRAZE",
            StageEvent::GetItem { .. } => "EV_GET_ITEM",
            StageEvent::DeleteShot { mode: ShotDeleteMode::Immediate, .. } => "EV_DELETE_SHOT_IMMEDIATE",
            StageEvent::DeleteShot { mode: ShotDeleteMode::Fade, .. } => "EV_DELETE_SHOT_FADE",
            StageEvent::DeleteShot { mode: ShotDeleteMode::ToItem, .. } => "EV_DELETE_SHOT_TO_ITEM",
            StageEvent::DeletePlayerShot { .. } => "EV_DELETE_SHOT_PLAYER",
        }
    }
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageEvent::Timeout { scene }
            | StageEvent::StartBossSpell { scene }
            | StageEvent::EndBossSpell { scene }
            | StageEvent::StartBossStep { scene }
            | StageEvent::EndBossStep { scene } => write!(f, "{} scene={scene}", self.name()),
            StageEvent::GainSpell { scene, score } => write!(f, "{} scene={scene} score={score}", self.name()),
            StageEvent::PlayerShootdown { player }
            | StageEvent::PlayerSpell { player }
            | StageEvent::PlayerRebirth { player }
            | StageEvent::RequestSpell { player } => write!(f, "{} player={player}", self.name()),
            StageEvent::Hit { player, source } => match source {
                Some(source) => write!(f, "{} player={player} source={source}", self.name()),
                None => write!(f, "{} player={player}", self.name()),
            },
            StageEvent::Graze { player, count, shot } => {
                write!(f, "{} player={player} count={count} shot={shot}", self.name())
            }
            StageEvent::GetItem { item_type, item, position } => write!(
                f,
                "{} type={item_type} item={item} pos=({:.1},{:.1})",
                self.name(),
                position.x,
                position.y
            ),
            StageEvent::DeleteShot { shot, position, graphic, .. }
            | StageEvent::DeletePlayerShot { shot, position, graphic } => write!(
                f,
                "{} shot={shot} pos=({:.1},{:.1}) graphic={graphic}",
                self.name(),
                position.x,
                position.y
            ),
        }
    }
}

#[derive(Default, Debug)]
pub struct EventBus {
    events: Vec<StageEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<StageEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending(&self) -> &[StageEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
