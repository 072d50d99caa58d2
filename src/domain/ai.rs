/// Enemy AI: patrol / alert / flee sensing.
///
/// ## States
///
///   Idle    : player far away; patrol, turning at platform edges
///   Alert   : player within the outer radius; patrol and fire
///   Fleeing : player within the inner radius; run away, jump off edges
///
/// ## Transition (pure in distance)
///
///   d ≤ inner          → Fleeing
///   inner < d < outer  → Alert
///   otherwise          → Idle
///
/// `d` is the Manhattan distance in tiles between enemy and player.
/// The only memory carried between frames is `alert_timer`, the fire
/// cadence accumulator, which keeps its remainder after each shot.

use glam::Vec2;

use super::entity::{AiState, Body, EnemyBrain, Entity, Facing};
use super::tilemap::Tilemap;
use crate::config::EnemyConfig;

/// Manhattan distance between the tiles containing two world points.
pub fn tile_distance(map: &Tilemap, a: Vec2, b: Vec2) -> u32 {
    let (ac, ar) = map.world_to_tile(a.x, a.y);
    let (bc, br) = map.world_to_tile(b.x, b.y);
    ac.abs_diff(bc) + ar.abs_diff(br)
}

/// State for a given distance.
pub fn next_state(distance: u32, inner: u32, outer: u32) -> AiState {
    if distance <= inner {
        AiState::Fleeing
    } else if distance < outer {
        AiState::Alert
    } else {
        AiState::Idle
    }
}

/// Result of one sensing pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Sensed {
    pub previous: AiState,
    pub state: AiState,
    /// The fire interval elapsed this frame.
    pub fire: bool,
}

impl Sensed {
    pub fn entered(&self, state: AiState) -> bool {
        self.state == state && self.previous != state
    }
}

/// Update the brain from the current distance.
///
/// The accumulator runs only while Alert and is cleared in the other
/// states. On firing it is reduced by one interval, not reset, so the
/// cadence stays exact across uneven frames.
pub fn sense(brain: &mut EnemyBrain, distance: u32, cfg: &EnemyConfig, elapsed: f32) -> Sensed {
    let previous = brain.state;
    let state = next_state(distance, cfg.inner_radius, cfg.outer_radius);
    brain.state = state;

    let mut fire = false;
    match state {
        AiState::Idle | AiState::Fleeing => brain.alert_timer = 0.0,
        AiState::Alert => {
            brain.alert_timer += elapsed;
            if brain.alert_timer >= cfg.fire_interval {
                brain.alert_timer -= cfg.fire_interval;
                fire = true;
            }
        }
    }
    Sensed { previous, state, fire }
}

/// Point horizontal velocity away from the player. Moving toward the
/// player negates it; already moving away leaves it alone.
pub fn turn_away(e: &mut Entity, player_col: i32, col: i32) {
    let vx = e.body.vel.x;
    if (player_col >= col && vx > 0.0) || (player_col < col && vx < 0.0) {
        e.body.vel.x = -vx;
    }
}

/// Is there no floor just ahead of the leading foot? `ridden` is the
/// platform the enemy stands on, whose top counts as floor.
pub fn edge_ahead(e: &Entity, map: &Tilemap, probe: f32, ridden: Option<&Body>) -> bool {
    let x = match e.facing() {
        Some(Facing::Right) => e.body.right() + probe,
        Some(Facing::Left) => e.body.left() - probe,
        None => return false,
    };
    let y = e.body.bottom() - probe;
    if let Some(p) = ridden {
        if x >= p.left() && x <= p.right() && y >= p.bottom() && y <= p.top() {
            return false;
        }
    }
    !map.classify_world(x, y).is_floor()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EdgeReaction {
    None,
    Reversed,
    Jumped,
}

/// Patrol turns back at edges; fleeing jumps over them. Only a grounded
/// enemy reacts.
pub fn react_to_edge(e: &mut Entity, map: &Tilemap, cfg: &EnemyConfig, ridden: Option<&Body>) -> EdgeReaction {
    if !e.grounded || !edge_ahead(e, map, cfg.edge_probe, ridden) {
        return EdgeReaction::None;
    }
    let state = e.brain().map(|b| b.state).unwrap_or_default();
    match state {
        AiState::Idle | AiState::Alert => {
            e.body.vel.x = -e.body.vel.x;
            EdgeReaction::Reversed
        }
        AiState::Fleeing => {
            e.body.vel.y = cfg.flee_jump;
            e.grounded = false;
            EdgeReaction::Jumped
        }
    }
}

/// What an enemy decided this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Thought {
    pub sensed: Sensed,
    pub edge: EdgeReaction,
}

/// Full per-frame AI pass: sense, reorient on entering Fleeing, then edge
/// handling. Called after the enemy's collision resolution, with the body
/// of the platform it rides, if any.
pub fn think(
    e: &mut Entity,
    player_pos: Vec2,
    map: &Tilemap,
    ridden: Option<&Body>,
    cfg: &EnemyConfig,
    elapsed: f32,
) -> Option<Thought> {
    let distance = tile_distance(map, e.body.pos, player_pos);
    let sensed = sense(e.brain_mut()?, distance, cfg, elapsed);

    if sensed.entered(AiState::Fleeing) {
        let (col, _) = map.world_to_tile(e.body.pos.x, e.body.pos.y);
        let (player_col, _) = map.world_to_tile(player_pos.x, player_pos.y);
        turn_away(e, player_col, col);
    }

    let edge = react_to_edge(e, map, cfg, ridden);
    Some(Thought { sensed, edge })
}
