/// The step function: advances the world by one fixed time slice.
///
/// Processing order:
///   0. Platforms move along their paths
///   a. Player: input, integrate, resolve Y, ride, resolve X, triggers
///   b. Enemies: integrate, resolve, AI sense/edge, fire, touch damage
///   c. Bullets: expire, move, wall hits, damage
///   d. Sweep removed bullets and dead enemies
///   e. Apply queued tile writes and platform activation
///   f. Outcome
///
/// Triggers only queue work during a–c. Nothing touches `world.map`
/// until e.

use crate::domain::ai::{self, EdgeReaction};
use crate::domain::entity::{Entity, EntityId, EntityKind, FrameInput};
use crate::domain::physics::{self, Carrier, TriggerHit};
use crate::domain::tile::{TileClass, TileCode, TriggerKind};
use super::event::{GameEvent, Outcome, StepReport};
use super::world::WorldState;

const COLLECT_SCORE: u32 = 100;
const KILL_SCORE: u32 = 200;

/// Work discovered during a frame and carried to its end.
#[derive(Default)]
struct Frame {
    /// Trigger cells already fired this frame.
    fired: Vec<(i32, i32)>,
    activate_platforms: bool,
    exit_reached: bool,
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: FrameInput, elapsed: f32) -> StepReport {
    if world.outcome.is_terminal() {
        return StepReport { outcome: world.outcome, events: vec![] };
    }

    let mut events: Vec<GameEvent> = Vec::new();
    let mut frame = Frame::default();
    world.tick += 1;

    move_platforms(world, elapsed);
    update_player(world, input, elapsed, &mut frame, &mut events);
    update_enemies(world, elapsed, &mut events);
    update_bullets(world, elapsed, &mut events);
    sweep(world);
    apply_frame_writes(world, &frame, &mut events);
    let outcome = resolve_outcome(world, &frame, &mut events);

    StepReport { outcome, events }
}

fn move_platforms(world: &mut WorldState, elapsed: f32) {
    for p in world.platforms.iter_mut() {
        physics::move_platform(p, elapsed);
    }
}

fn carrier_for(e: &Entity, platforms: &[Entity], input_factor: f32) -> Option<Carrier> {
    let id = e.riding?;
    platforms
        .iter()
        .find(|p| p.id == id)
        .map(|p| Carrier { vx: p.body.vel.x, input_factor })
}

fn kill_player(player: &mut Entity, events: &mut Vec<GameEvent>) {
    if player.alive {
        player.alive = false;
        events.push(GameEvent::PlayerDied);
        log::debug!("player died at ({:.3}, {:.3})", player.body.pos.x, player.body.pos.y);
    }
}

fn kill_enemy(enemy: &mut Entity, events: &mut Vec<GameEvent>) {
    if enemy.alive {
        enemy.alive = false;
        events.push(GameEvent::EnemyKilled { id: enemy.id });
    }
}

// ══════════════════════════════════════════════════════════════
// (a) Player
// ══════════════════════════════════════════════════════════════

fn update_player(
    world: &mut WorldState,
    input: FrameInput,
    elapsed: f32,
    frame: &mut Frame,
    events: &mut Vec<GameEvent>,
) {
    if !world.player.alive {
        return;
    }
    let cfg = &world.config;
    let player = &mut world.player;

    player.body.acc.x = input.movement.map_or(0.0, |f| f.sign() * cfg.player.move_accel);
    if input.jump && player.grounded {
        player.body.vel.y = cfg.player.jump_impulse;
        player.grounded = false;
        events.push(GameEvent::PlayerJumped);
    }

    let carrier = carrier_for(player, &world.platforms, cfg.player.rider_input_factor);
    physics::integrate(player, &cfg.physics, carrier, elapsed);
    let below = physics::advance_y(player, &world.map, &cfg.physics, elapsed);
    physics::ride_platforms(player, &world.platforms, cfg.physics.epsilon);
    let side = physics::advance_x(player, &world.map, &cfg.physics, elapsed);

    for hit in below.triggers.iter().chain(side.triggers.iter()) {
        fire_trigger(world, *hit, frame, events);
    }
    collect_at_centre(world, frame, events);

    if below.hazard || side.hazard || physics::fell_out(&world.player.body, &world.map) {
        kill_player(&mut world.player, events);
        return;
    }

    if input.shoot {
        player_shoot(world, elapsed, events);
    } else if let Some(ps) = world.player.player_state_mut() {
        ps.fire_cooldown = (ps.fire_cooldown - elapsed).max(0.0);
    }
}

fn player_shoot(world: &mut WorldState, elapsed: f32, events: &mut Vec<GameEvent>) {
    let interval = world.config.player.fire_interval;
    let Some(ps) = world.player.player_state_mut() else { return };
    ps.fire_cooldown = (ps.fire_cooldown - elapsed).max(0.0);
    if !ps.armed || ps.fire_cooldown > 0.0 {
        return;
    }
    let id = EntityId(world.next_id);
    if let Some(bullet) = world.player.shoot(id, &world.config.bullet) {
        world.next_id += 1;
        world.bullets.push(bullet);
        if let Some(ps) = world.player.player_state_mut() {
            ps.fire_cooldown = interval;
        }
        events.push(GameEvent::Shot { owner: EntityKind::Player });
    }
}

fn fire_trigger(world: &mut WorldState, hit: TriggerHit, frame: &mut Frame, events: &mut Vec<GameEvent>) {
    let cell = (hit.col, hit.row);
    if frame.fired.contains(&cell) || world.is_pending(hit.col, hit.row) {
        return;
    }
    frame.fired.push(cell);
    log::debug!("trigger {:?} at ({}, {})", hit.kind, hit.col, hit.row);

    match hit.kind {
        TriggerKind::WeaponPickup => {
            if let Some(ps) = world.player.player_state_mut() {
                ps.armed = true;
            }
        }
        TriggerKind::LaunchPad => {
            world.player.body.vel.y = world.config.triggers.launch_boost;
            world.player.grounded = false;
        }
        TriggerKind::Key { door } => {
            for (col, row) in world.map.find_all(door) {
                world.queue_mutation(col, row, TileCode::EMPTY);
            }
        }
        TriggerKind::Switch { .. } => frame.activate_platforms = true,
        TriggerKind::Exit => frame.exit_reached = true,
    }
    if let Some(code) = hit.kind.residue() {
        world.queue_mutation(hit.col, hit.row, code);
    }
    events.push(GameEvent::TriggerFired { kind: hit.kind, col: hit.col, row: hit.row });
}

fn collect_at_centre(world: &mut WorldState, frame: &mut Frame, events: &mut Vec<GameEvent>) {
    let pos = world.player.body.pos;
    let (col, row) = world.map.world_to_tile(pos.x, pos.y);
    if !world.map.in_bounds(col, row) || world.map.classify(col, row) != TileClass::Collectible {
        return;
    }
    if frame.fired.contains(&(col, row)) || world.is_pending(col, row) {
        return;
    }
    frame.fired.push((col, row));
    let code = world.map.code_at(col, row);
    world.queue_mutation(col, row, TileCode::EMPTY);
    world.score += COLLECT_SCORE;
    events.push(GameEvent::Collected { code });
}

// ══════════════════════════════════════════════════════════════
// (b) Enemies
// ══════════════════════════════════════════════════════════════

fn update_enemies(world: &mut WorldState, elapsed: f32, events: &mut Vec<GameEvent>) {
    let mut shooters = vec![];
    let cfg = &world.config;

    for (i, enemy) in world.enemies.iter_mut().enumerate() {
        if enemy.is_gone() {
            continue;
        }
        let carrier = carrier_for(enemy, &world.platforms, 0.0);
        physics::integrate(enemy, &cfg.physics, carrier, elapsed);
        let below = physics::advance_y(enemy, &world.map, &cfg.physics, elapsed);
        physics::ride_platforms(enemy, &world.platforms, cfg.physics.epsilon);
        physics::advance_x(enemy, &world.map, &cfg.physics, elapsed);

        if below.hazard || physics::fell_out(&enemy.body, &world.map) {
            kill_enemy(enemy, events);
            continue;
        }

        let ridden = enemy
            .riding
            .and_then(|id| world.platforms.iter().find(|p| p.id == id))
            .map(|p| &p.body);
        if let Some(thought) = ai::think(enemy, world.player.body.pos, &world.map, ridden, &cfg.enemy, elapsed) {
            if thought.sensed.previous != thought.sensed.state {
                log::trace!("enemy {:?}: {:?} -> {:?}", enemy.id, thought.sensed.previous, thought.sensed.state);
            }
            if thought.edge == EdgeReaction::Jumped {
                log::trace!("enemy {:?} jumped an edge", enemy.id);
            }
            if thought.sensed.fire {
                shooters.push(i);
            }
        }

        if world.player.alive && enemy.body.overlaps(&world.player.body) {
            kill_player(&mut world.player, events);
        }
    }

    for i in shooters {
        let id = EntityId(world.next_id);
        if let Some(bullet) = world.enemies[i].shoot(id, &world.config.bullet) {
            world.next_id += 1;
            world.bullets.push(bullet);
            events.push(GameEvent::Shot { owner: EntityKind::Enemy });
        }
    }
}

// ══════════════════════════════════════════════════════════════
// (c) Bullets
// ══════════════════════════════════════════════════════════════

fn update_bullets(world: &mut WorldState, elapsed: f32, events: &mut Vec<GameEvent>) {
    let phys = &world.config.physics;

    for bullet in world.bullets.iter_mut() {
        if bullet.is_gone() {
            continue;
        }
        let Some(state) = bullet.bullet_mut() else { continue };
        state.ttl -= elapsed;
        let owner = state.owner;
        if state.ttl <= 0.0 {
            bullet.mark_removed();
            continue;
        }

        physics::advance_x(bullet, &world.map, phys, elapsed);
        if bullet.is_removed() {
            continue;
        }

        match owner.kind {
            EntityKind::Player => {
                let hit = world
                    .enemies
                    .iter_mut()
                    .find(|e| !e.is_gone() && e.body.overlaps(&bullet.body));
                if let Some(enemy) = hit {
                    kill_enemy(enemy, events);
                    world.score += KILL_SCORE;
                    bullet.mark_removed();
                }
            }
            _ => {
                if world.player.alive && world.player.body.overlaps(&bullet.body) {
                    kill_player(&mut world.player, events);
                    bullet.mark_removed();
                }
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// (d) Sweep, (e) tile writes, (f) outcome
// ══════════════════════════════════════════════════════════════

fn sweep(world: &mut WorldState) {
    world.bullets.retain(|b| !b.is_gone());
    world.enemies.retain(|e| !e.is_gone());
}

fn apply_frame_writes(world: &mut WorldState, frame: &Frame, events: &mut Vec<GameEvent>) {
    world.apply_pending();
    if frame.activate_platforms {
        for p in world.platforms.iter_mut() {
            if physics::activate_platform(p) {
                log::debug!("platform {:?} activated", p.id);
                events.push(GameEvent::PlatformActivated { id: p.id });
            }
        }
    }
}

fn resolve_outcome(world: &mut WorldState, frame: &Frame, events: &mut Vec<GameEvent>) -> Outcome {
    let outcome = if !world.player.alive {
        Outcome::PlayerDied
    } else if frame.exit_reached {
        events.push(GameEvent::LevelComplete);
        Outcome::LevelComplete
    } else {
        Outcome::Running
    };
    world.outcome = outcome;
    outcome
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
