/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and messages; the
/// engine itself never calls into audio or rendering.

use crate::domain::entity::{EntityId, EntityKind};
use crate::domain::tile::{TileCode, TriggerKind};

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    EnemyKilled { id: EntityId },
    PlayerJumped,
    PlayerDied,
    Shot { owner: EntityKind },
    TriggerFired { kind: TriggerKind, col: i32, row: i32 },
    Collected { code: TileCode },
    PlatformActivated { id: EntityId },
    LevelComplete,
}

/// How the level stands after a step.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Outcome {
    #[default]
    Running,
    LevelComplete,
    PlayerDied,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Running
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    pub outcome: Outcome,
    pub events: Vec<GameEvent>,
}
