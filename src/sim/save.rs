/// Save and load mid-level snapshots.
///
/// A snapshot holds everything that changes while a level runs: the tile
/// grid after triggers, every entity's motion state, score and tick.
/// Tile classes and tuning are not saved; they come back from the level
/// and config the snapshot is restored onto.
///
/// ## File format:
///   Key-value lines.
///   ```text
///   level=1
///   tick=420
///   score=300
///   next_id=7
///   width=24
///   height=10
///   tile_row=122,0,0,...
///   player=id,x,y,vx,vy,grounded,armed,cooldown,riding
///   enemy=id,x,y,vx,vy,grounded,state,alert_timer,riding
///   bullet=id,x,y,vx,owner_kind,owner_id,ttl
///   platform=id,x,y,vx,hw,hh,left,right,speed,active
///   ```
///   `riding` is a platform id or `-`.

use std::path::Path;

use glam::Vec2;

use crate::domain::entity::{
    AiState, BulletState, EnemyBrain, Entity, EntityId, EntityKind, Owner, PlatformPath, PlayerState, Role,
};
use crate::domain::tile::TileCode;
use crate::error::{EngineError, EngineResult};
use crate::sim::event::Outcome;
use crate::sim::world::WorldState;

// ══════════════════════════════════════════════════════════════
// Public types
// ══════════════════════════════════════════════════════════════

/// What a save file holds: which level, and its running state.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveData {
    pub level: usize,
    pub snapshot: Snapshot,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub score: u32,
    pub next_id: u32,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Vec<u16>>,
    pub player: SnapshotActor,
    pub enemies: Vec<SnapshotActor>,
    pub bullets: Vec<SnapshotBullet>,
    pub platforms: Vec<SnapshotPlatform>,
}

/// Player or enemy.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotActor {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub grounded: bool,
    pub riding: Option<u32>,
    /// Player: armed. Unused for enemies.
    pub armed: bool,
    /// Player: fire cooldown. Enemy: alert timer.
    pub timer: f32,
    pub ai: AiState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotBullet {
    pub id: u32,
    pub pos: Vec2,
    pub vx: f32,
    pub owner: Owner,
    pub ttl: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotPlatform {
    pub id: u32,
    pub pos: Vec2,
    pub vx: f32,
    pub half: Vec2,
    pub path: PlatformPath,
}

// ══════════════════════════════════════════════════════════════
// Snapshot capture / restore (WorldState ↔ Snapshot)
// ══════════════════════════════════════════════════════════════

fn actor(e: &Entity) -> SnapshotActor {
    let (armed, timer, ai) = match &e.role {
        Role::Player(p) => (p.armed, p.fire_cooldown, AiState::Idle),
        Role::Enemy(b) => (false, b.alert_timer, b.state),
        _ => (false, 0.0, AiState::Idle),
    };
    SnapshotActor {
        id: e.id.0,
        pos: e.body.pos,
        vel: e.body.vel,
        grounded: e.grounded,
        riding: e.riding.map(|id| id.0),
        armed,
        timer,
        ai,
    }
}

/// Capture the running state of a world.
pub fn capture_snapshot(w: &WorldState) -> Snapshot {
    let width = w.map.width();
    Snapshot {
        tick: w.tick,
        score: w.score,
        next_id: w.next_id,
        width,
        height: w.map.height(),
        tiles: w
            .map
            .cells()
            .chunks(width)
            .map(|row| row.iter().map(|c| c.0).collect())
            .collect(),
        player: actor(&w.player),
        enemies: w.enemies.iter().filter(|e| !e.is_gone()).map(actor).collect(),
        bullets: w
            .bullets
            .iter()
            .filter(|b| !b.is_gone())
            .filter_map(|b| {
                let s = b.bullet()?;
                Some(SnapshotBullet { id: b.id.0, pos: b.body.pos, vx: b.body.vel.x, owner: s.owner, ttl: s.ttl })
            })
            .collect(),
        platforms: w
            .platforms
            .iter()
            .filter_map(|p| {
                Some(SnapshotPlatform {
                    id: p.id.0,
                    pos: p.body.pos,
                    vx: p.body.vel.x,
                    half: p.body.half,
                    path: p.path()?.clone(),
                })
            })
            .collect(),
    }
}

fn restore_actor(a: &SnapshotActor, role: Role, half: Vec2) -> EngineResult<Entity> {
    let mut e = Entity::new(EntityId(a.id), role, a.pos, half)?.with_velocity(a.vel);
    e.grounded = a.grounded;
    e.riding = a.riding.map(EntityId);
    Ok(e)
}

/// Overwrite a freshly loaded world with a snapshot of the same level.
pub fn restore_snapshot(w: &mut WorldState, snap: &Snapshot) -> EngineResult<()> {
    if snap.width != w.map.width() || snap.height != w.map.height() {
        return Err(EngineError::SaveFormat(format!(
            "snapshot is {}x{}, level is {}x{}",
            snap.width,
            snap.height,
            w.map.width(),
            w.map.height()
        )));
    }
    let cells: Vec<TileCode> = snap.tiles.iter().flatten().map(|&c| TileCode(c)).collect();
    w.map.restore_cells(cells)?;

    let cfg = &w.config;
    let player_half = Vec2::new(cfg.player.half_width, cfg.player.half_height);
    let enemy_half = Vec2::new(cfg.enemy.half_width, cfg.enemy.half_height);
    let bullet_half = Vec2::new(cfg.bullet.half_width, cfg.bullet.half_height);

    let p = &snap.player;
    let state = PlayerState { armed: p.armed, fire_cooldown: p.timer };
    let player = restore_actor(p, Role::Player(state), player_half)?;

    let enemies = snap
        .enemies
        .iter()
        .map(|a| {
            let brain = EnemyBrain { state: a.ai, alert_timer: a.timer };
            restore_actor(a, Role::Enemy(brain), enemy_half)
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let bullets = snap
        .bullets
        .iter()
        .map(|b| {
            let role = Role::Bullet(BulletState { owner: b.owner, ttl: b.ttl });
            Ok(Entity::new(EntityId(b.id), role, b.pos, bullet_half)?.with_velocity(Vec2::new(b.vx, 0.0)))
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let platforms = snap
        .platforms
        .iter()
        .map(|p| {
            let role = Role::Platform(p.path.clone());
            Ok(Entity::new(EntityId(p.id), role, p.pos, p.half)?.with_velocity(Vec2::new(p.vx, 0.0)))
        })
        .collect::<EngineResult<Vec<_>>>()?;

    w.player = player;
    w.enemies = enemies;
    w.bullets = bullets;
    w.platforms = platforms;
    w.tick = snap.tick;
    w.score = snap.score;
    w.next_id = snap.next_id;
    w.pending.clear();
    w.outcome = Outcome::Running;
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Files
// ══════════════════════════════════════════════════════════════

pub fn save_to(path: &Path, level: usize, snap: &Snapshot) -> EngineResult<()> {
    std::fs::write(path, serialize(level, snap))?;
    log::debug!("saved level {} tick {} to {}", level, snap.tick, path.display());
    Ok(())
}

pub fn load_from(path: &Path) -> EngineResult<SaveData> {
    let content = std::fs::read_to_string(path)?;
    let data = parse(&content)?;
    log::debug!("loaded level {} tick {} from {}", data.level, data.snapshot.tick, path.display());
    Ok(data)
}

// ══════════════════════════════════════════════════════════════
// Serialization
// ══════════════════════════════════════════════════════════════

fn flag(b: bool) -> u8 {
    if b { 1 } else { 0 }
}

fn riding_str(r: Option<u32>) -> String {
    r.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn ai_str(s: AiState) -> &'static str {
    match s {
        AiState::Idle => "I",
        AiState::Alert => "A",
        AiState::Fleeing => "F",
    }
}

fn kind_str(k: EntityKind) -> &'static str {
    match k {
        EntityKind::Player => "P",
        EntityKind::Enemy => "E",
        EntityKind::Bullet => "B",
        EntityKind::Platform => "L",
    }
}

pub fn serialize(level: usize, snap: &Snapshot) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(&format!("level={}\n", level));
    out.push_str(&format!("tick={}\n", snap.tick));
    out.push_str(&format!("score={}\n", snap.score));
    out.push_str(&format!("next_id={}\n", snap.next_id));
    out.push_str(&format!("width={}\n", snap.width));
    out.push_str(&format!("height={}\n", snap.height));

    for row in &snap.tiles {
        let codes: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        out.push_str(&format!("tile_row={}\n", codes.join(",")));
    }

    let p = &snap.player;
    out.push_str(&format!(
        "player={},{},{},{},{},{},{},{},{}\n",
        p.id, p.pos.x, p.pos.y, p.vel.x, p.vel.y,
        flag(p.grounded), flag(p.armed), p.timer, riding_str(p.riding)
    ));

    for e in &snap.enemies {
        out.push_str(&format!(
            "enemy={},{},{},{},{},{},{},{},{}\n",
            e.id, e.pos.x, e.pos.y, e.vel.x, e.vel.y,
            flag(e.grounded), ai_str(e.ai), e.timer, riding_str(e.riding)
        ));
    }

    for b in &snap.bullets {
        out.push_str(&format!(
            "bullet={},{},{},{},{},{},{}\n",
            b.id, b.pos.x, b.pos.y, b.vx, kind_str(b.owner.kind), b.owner.id.0, b.ttl
        ));
    }

    for p in &snap.platforms {
        out.push_str(&format!(
            "platform={},{},{},{},{},{},{},{},{},{}\n",
            p.id, p.pos.x, p.pos.y, p.vx, p.half.x, p.half.y,
            p.path.left, p.path.right, p.path.speed, flag(p.path.active)
        ));
    }

    out
}

// ══════════════════════════════════════════════════════════════
// Parsing
// ══════════════════════════════════════════════════════════════

fn bad(what: &str, val: &str) -> EngineError {
    EngineError::SaveFormat(format!("bad {what} record '{val}'"))
}

/// Split a record into exactly `n` fields.
fn fields<'a>(what: &str, val: &'a str, n: usize) -> EngineResult<Vec<&'a str>> {
    let p: Vec<&str> = val.split(',').map(str::trim).collect();
    if p.len() != n {
        return Err(bad(what, val));
    }
    Ok(p)
}

fn num<T: std::str::FromStr>(what: &str, s: &str) -> EngineResult<T> {
    s.parse().map_err(|_| bad(what, s))
}

fn parse_flag(what: &str, s: &str) -> EngineResult<bool> {
    match s {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(bad(what, s)),
    }
}

fn parse_riding(s: &str) -> EngineResult<Option<u32>> {
    if s == "-" { Ok(None) } else { num("riding", s).map(Some) }
}

fn parse_ai(s: &str) -> EngineResult<AiState> {
    match s {
        "I" => Ok(AiState::Idle),
        "A" => Ok(AiState::Alert),
        "F" => Ok(AiState::Fleeing),
        _ => Err(bad("ai state", s)),
    }
}

fn parse_kind(s: &str) -> EngineResult<EntityKind> {
    match s {
        "P" => Ok(EntityKind::Player),
        "E" => Ok(EntityKind::Enemy),
        "B" => Ok(EntityKind::Bullet),
        "L" => Ok(EntityKind::Platform),
        _ => Err(bad("owner kind", s)),
    }
}

fn parse_player(val: &str) -> EngineResult<SnapshotActor> {
    let p = fields("player", val, 9)?;
    Ok(SnapshotActor {
        id: num("player", p[0])?,
        pos: Vec2::new(num("player", p[1])?, num("player", p[2])?),
        vel: Vec2::new(num("player", p[3])?, num("player", p[4])?),
        grounded: parse_flag("player", p[5])?,
        armed: parse_flag("player", p[6])?,
        timer: num("player", p[7])?,
        riding: parse_riding(p[8])?,
        ai: AiState::Idle,
    })
}

fn parse_enemy(val: &str) -> EngineResult<SnapshotActor> {
    let p = fields("enemy", val, 9)?;
    Ok(SnapshotActor {
        id: num("enemy", p[0])?,
        pos: Vec2::new(num("enemy", p[1])?, num("enemy", p[2])?),
        vel: Vec2::new(num("enemy", p[3])?, num("enemy", p[4])?),
        grounded: parse_flag("enemy", p[5])?,
        ai: parse_ai(p[6])?,
        timer: num("enemy", p[7])?,
        riding: parse_riding(p[8])?,
        armed: false,
    })
}

fn parse_bullet(val: &str) -> EngineResult<SnapshotBullet> {
    let p = fields("bullet", val, 7)?;
    Ok(SnapshotBullet {
        id: num("bullet", p[0])?,
        pos: Vec2::new(num("bullet", p[1])?, num("bullet", p[2])?),
        vx: num("bullet", p[3])?,
        owner: Owner { kind: parse_kind(p[4])?, id: EntityId(num("bullet", p[5])?) },
        ttl: num("bullet", p[6])?,
    })
}

fn parse_platform(val: &str) -> EngineResult<SnapshotPlatform> {
    let p = fields("platform", val, 10)?;
    Ok(SnapshotPlatform {
        id: num("platform", p[0])?,
        pos: Vec2::new(num("platform", p[1])?, num("platform", p[2])?),
        vx: num("platform", p[3])?,
        half: Vec2::new(num("platform", p[4])?, num("platform", p[5])?),
        path: PlatformPath {
            left: num("platform", p[6])?,
            right: num("platform", p[7])?,
            speed: num("platform", p[8])?,
            active: parse_flag("platform", p[9])?,
        },
    })
}

pub fn parse(content: &str) -> EngineResult<SaveData> {
    let mut level = None;
    let mut tick: u64 = 0;
    let mut score: u32 = 0;
    let mut next_id = None;
    let mut width: usize = 0;
    let mut height: usize = 0;
    let mut tiles: Vec<Vec<u16>> = vec![];
    let mut player = None;
    let mut enemies = vec![];
    let mut bullets = vec![];
    let mut platforms = vec![];

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, val)) = line.split_once('=') else {
            return Err(EngineError::SaveFormat(format!("expected key=value, got '{line}'")));
        };
        match key {
            "level" => level = Some(num(key, val)?),
            "tick" => tick = num(key, val)?,
            "score" => score = num(key, val)?,
            "next_id" => next_id = Some(num(key, val)?),
            "width" => width = num(key, val)?,
            "height" => height = num(key, val)?,
            "tile_row" => tiles.push(
                val.split(',')
                    .map(|s| num("tile_row", s.trim()))
                    .collect::<EngineResult<Vec<u16>>>()?,
            ),
            "player" => player = Some(parse_player(val)?),
            "enemy" => enemies.push(parse_enemy(val)?),
            "bullet" => bullets.push(parse_bullet(val)?),
            "platform" => platforms.push(parse_platform(val)?),
            _ => log::debug!("ignoring save key '{key}'"),
        }
    }

    let level = level.ok_or_else(|| EngineError::SaveFormat("missing level".into()))?;
    let player = player.ok_or_else(|| EngineError::SaveFormat("missing player".into()))?;
    if tiles.len() != height || tiles.iter().any(|r| r.len() != width) {
        return Err(EngineError::SaveFormat(format!("tile rows do not match {width}x{height}")));
    }
    let max_id = std::iter::once(player.id)
        .chain(enemies.iter().map(|e| e.id))
        .chain(bullets.iter().map(|b| b.id))
        .chain(platforms.iter().map(|p| p.id))
        .max()
        .unwrap_or(0);
    let next_id = next_id.unwrap_or(max_id + 1).max(max_id + 1);

    Ok(SaveData {
        level,
        snapshot: Snapshot { tick, score, next_id, width, height, tiles, player, enemies, bullets, platforms },
    })
}
