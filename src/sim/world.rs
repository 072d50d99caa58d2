/// WorldState: the complete state of a running level.
///
/// ## Tile mutation
///
/// Triggers never write to `map` while entities are being resolved. They
/// queue a `TileMutation` in `pending`; the step applies the queue once
/// every entity has moved, so no entity sees another's same-frame change.
///
/// ## Entities
///
/// The player is held directly; enemies, bullets and platforms live in
/// their own vectors. Removal is flagged during the frame and swept at the
/// end, never while a vector is being iterated.

use crate::config::GameConfig;
use crate::domain::entity::{Entity, EntityId};
use crate::domain::tile::TileCode;
use crate::domain::tilemap::Tilemap;

use super::event::Outcome;

/// A tile write requested this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TileMutation {
    pub col: i32,
    pub row: i32,
    pub code: TileCode,
}

#[derive(Clone, Debug)]
pub struct WorldState {
    // ── Terrain ──
    pub map: Tilemap,
    /// Writes queued by triggers, applied at the end of the frame.
    pub pending: Vec<TileMutation>,

    // ── Entities ──
    pub player: Entity,
    pub enemies: Vec<Entity>,
    pub bullets: Vec<Entity>,
    pub platforms: Vec<Entity>,
    pub next_id: u32,

    // ── Tuning ──
    pub config: GameConfig,

    // ── Meta ──
    pub outcome: Outcome,
    pub score: u32,
    pub tick: u64,
    pub level_name: String,
}

impl WorldState {
    /// A world with just the map and the player. `next_id` continues after
    /// the player's id.
    pub fn new(map: Tilemap, player: Entity, config: GameConfig) -> Self {
        let next_id = player.id.0 + 1;
        WorldState {
            map,
            pending: vec![],
            player,
            enemies: vec![],
            bullets: vec![],
            platforms: vec![],
            next_id,
            config,
            outcome: Outcome::Running,
            score: 0,
            tick: 0,
            level_name: String::new(),
        }
    }

    pub fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    // ── Pending tile writes ──

    pub fn is_pending(&self, col: i32, row: i32) -> bool {
        self.pending.iter().any(|m| m.col == col && m.row == row)
    }

    /// Queue a tile write. A cell already queued this frame keeps its first
    /// write; returns `false` in that case.
    pub fn queue_mutation(&mut self, col: i32, row: i32, code: TileCode) -> bool {
        if self.is_pending(col, row) {
            return false;
        }
        self.pending.push(TileMutation { col, row, code });
        true
    }

    /// Apply and clear the queue. Returns how many writes landed.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        for m in self.pending.drain(..) {
            match self.map.set_tile(m.col, m.row, m.code) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("dropping tile write: {e}"),
            }
        }
        applied
    }

    // ── Lookup ──

    /// Any live entity by id.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        std::iter::once(&self.player)
            .chain(&self.enemies)
            .chain(&self.bullets)
            .chain(&self.platforms)
            .find(|e| e.id == id)
    }

    pub fn platform(&self, id: EntityId) -> Option<&Entity> {
        self.platforms.iter().find(|p| p.id == id)
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_terminal()
    }
}
