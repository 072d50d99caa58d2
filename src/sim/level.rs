/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (`*.txt`, sorted by file name)
///   2. Built-in embedded levels
///
/// ## Level format (FlareMap-style sections):
///   ```text
///   # comment
///   [header]
///   name=First Steps
///   width=24
///   height=10
///
///   [tiles]              optional; replaces the configured table
///   solid=1,7
///   hazard=2
///   key=6:7              key:door pairs
///   switch=5:1           switch:becomes pairs
///
///   [layer]
///   data=
///   0,0,1,1,
///   ...                  `height` rows of `width` codes
///
///   [entity]
///   type=player|enemy|platform
///   location=col,row[,w,h]   top-left tile; size in tiles
///   range=left,right         platform only, columns
///   active=true|false        platform only
///   ```
///
/// Entities spawn centred on their footprint.

use std::path::Path;

use glam::Vec2;

use crate::config::{GameConfig, TilesConfig};
use crate::domain::entity::{EnemyBrain, Entity, EntityId, PlatformPath, PlayerState, Role};
use crate::domain::tile::TileTable;
use crate::domain::tilemap::Tilemap;
use crate::error::{EngineError, EngineResult};
use crate::sim::world::WorldState;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpawnKind {
    Player,
    Enemy,
    Platform,
}

/// One `[entity]` block.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnDef {
    pub kind: SpawnKind,
    pub col: i32,
    pub row: i32,
    /// Footprint in tiles.
    pub size: (f32, f32),
    /// Platform travel, inclusive columns.
    pub range: Option<(i32, i32)>,
    pub active: bool,
}

/// Parsed level, not yet bound to a config.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelDef {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub rows: Vec<Vec<u16>>,
    pub tiles: Option<TilesConfig>,
    pub spawns: Vec<SpawnDef>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Build a fresh world from a level definition.
pub fn load_level(def: &LevelDef, config: &GameConfig) -> EngineResult<WorldState> {
    let table = TileTable::from_config(def.tiles.as_ref().unwrap_or(&config.tiles))?;
    let map = Tilemap::from_rows(&def.rows, config.physics.tile_size, table)?;

    let spawn = def
        .spawns
        .iter()
        .find(|s| s.kind == SpawnKind::Player)
        .ok_or_else(|| EngineError::MalformedLevel("no player entity".into()))?;
    let state = PlayerState { armed: config.player.starts_armed, fire_cooldown: 0.0 };
    let half = Vec2::new(config.player.half_width, config.player.half_height);
    let player = Entity::new(EntityId(0), Role::Player(state), map.tile_center(spawn.col, spawn.row), half)?;

    let mut world = WorldState::new(map, player, config.clone());
    world.level_name = def.name.clone();

    for s in def.spawns.iter().filter(|s| s.kind != SpawnKind::Player) {
        let id = world.alloc_id();
        match s.kind {
            SpawnKind::Enemy => {
                let half = Vec2::new(config.enemy.half_width, config.enemy.half_height);
                let pos = world.map.tile_center(s.col, s.row);
                let enemy = Entity::new(id, Role::Enemy(EnemyBrain::default()), pos, half)?
                    .with_velocity(Vec2::new(config.enemy.patrol_speed, 0.0));
                world.enemies.push(enemy);
            }
            SpawnKind::Platform => {
                let platform = build_platform(&world.map, s, id, config)?;
                world.platforms.push(platform);
            }
            SpawnKind::Player => {}
        }
    }

    log::debug!(
        "loaded level '{}' ({}x{}, {} enemies, {} platforms)",
        def.name,
        def.width,
        def.height,
        world.enemies.len(),
        world.platforms.len()
    );
    Ok(world)
}

fn build_platform(map: &Tilemap, s: &SpawnDef, id: EntityId, config: &GameConfig) -> EngineResult<Entity> {
    let ts = map.tile_size();
    let half = Vec2::new(s.size.0 * ts * 0.5, s.size.1 * ts * 0.5);
    let pos = Vec2::new(map.col_left(s.col) + half.x, map.row_top(s.row) - half.y);

    let (left, right) = match s.range {
        Some((l, r)) => (map.col_left(l) + half.x, map.col_right(r) - half.x),
        None => (pos.x, pos.x),
    };
    if left > right || pos.x < left || pos.x > right {
        return Err(EngineError::MalformedLevel(format!(
            "platform at ({}, {}) does not fit its range",
            s.col, s.row
        )));
    }

    let speed = config.platform.speed;
    let path = PlatformPath { left, right, speed, active: s.active };
    let vx = if s.active { speed } else { 0.0 };
    Ok(Entity::new(id, Role::Platform(path), pos, half)?.with_velocity(Vec2::new(vx, 0.0)))
}

/// All playable levels: the configured directory, else the built-in set.
pub fn load_levels(config: &GameConfig) -> Vec<LevelDef> {
    let mut levels = load_from_directory(&config.levels_dir);
    if levels.is_empty() {
        levels = embedded_levels();
    }
    levels
}

// ══════════════════════════════════════════════════════════════
// Parsing
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Header,
    Tiles,
    Layer,
    Entity,
}

/// Parse the text of one level.
pub fn parse_level(text: &str) -> EngineResult<LevelDef> {
    let mut name = String::new();
    let mut width = None;
    let mut height = None;
    let mut tiles: Option<TilesConfig> = None;
    let mut rows: Vec<Vec<u16>> = vec![];
    let mut spawns: Vec<SpawnDef> = vec![];
    let mut in_data = false;
    let mut section = Section::None;

    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let lineno = n + 1;
        if line.is_empty() {
            in_data = false;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_data = false;
            section = match &line[1..line.len() - 1] {
                "header" => Section::Header,
                "tiles" => {
                    tiles.get_or_insert_with(empty_tiles);
                    Section::Tiles
                }
                "layer" => Section::Layer,
                "entity" => {
                    spawns.push(SpawnDef {
                        kind: SpawnKind::Enemy,
                        col: -1,
                        row: -1,
                        size: (1.0, 1.0),
                        range: None,
                        active: false,
                    });
                    Section::Entity
                }
                other => return Err(malformed(lineno, format!("unknown section [{other}]"))),
            };
            continue;
        }
        if in_data {
            rows.push(parse_row(line, lineno)?);
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| malformed(lineno, format!("expected key=value, got '{line}'")))?;

        match section {
            Section::Header => match key {
                "name" => name = value.to_string(),
                "width" => width = Some(parse_num::<usize>(value, lineno)?),
                "height" => height = Some(parse_num::<usize>(value, lineno)?),
                _ => {}
            },
            Section::Tiles => {
                if let Some(t) = tiles.as_mut() {
                    parse_tiles_key(t, key, value, lineno)?;
                }
            }
            Section::Layer => {
                if key == "data" {
                    in_data = true;
                    if !value.is_empty() {
                        rows.push(parse_row(value, lineno)?);
                    }
                }
            }
            Section::Entity => {
                if let Some(spawn) = spawns.last_mut() {
                    parse_entity_key(spawn, key, value, lineno)?;
                }
            }
            Section::None => return Err(malformed(lineno, "data outside any section".into())),
        }
    }

    let width = width.ok_or_else(|| EngineError::MalformedLevel("missing header width".into()))?;
    let height = height.ok_or_else(|| EngineError::MalformedLevel("missing header height".into()))?;
    if width == 0 || height == 0 {
        return Err(EngineError::MalformedLevel(format!("grid must be non-empty, got {width}x{height}")));
    }
    if rows.len() != height {
        return Err(EngineError::MalformedLevel(format!("expected {height} rows, got {}", rows.len())));
    }
    if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(EngineError::MalformedLevel(format!(
            "row {i} has {} columns, expected {width}",
            r.len()
        )));
    }
    for s in &spawns {
        if s.col < 0 || s.row < 0 || s.col as usize >= width || s.row as usize >= height {
            return Err(EngineError::MalformedLevel(format!(
                "{:?} at ({}, {}) is outside the grid",
                s.kind, s.col, s.row
            )));
        }
    }
    match spawns.iter().filter(|s| s.kind == SpawnKind::Player).count() {
        1 => {}
        0 => return Err(EngineError::MalformedLevel("no player entity".into())),
        n => return Err(EngineError::MalformedLevel(format!("{n} player entities, expected 1"))),
    }

    Ok(LevelDef { name, width, height, rows, tiles, spawns })
}

fn malformed(lineno: usize, msg: String) -> EngineError {
    EngineError::MalformedLevel(format!("line {lineno}: {msg}"))
}

fn parse_num<T: std::str::FromStr>(value: &str, lineno: usize) -> EngineResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| malformed(lineno, format!("bad number '{value}'")))
}

/// Comma-separated list; a trailing comma is allowed.
fn parse_list<T: std::str::FromStr>(value: &str, lineno: usize) -> EngineResult<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_num(s, lineno))
        .collect()
}

fn parse_row(line: &str, lineno: usize) -> EngineResult<Vec<u16>> {
    parse_list(line, lineno)
}

fn empty_tiles() -> TilesConfig {
    TilesConfig {
        solid: vec![],
        hazard: vec![],
        collectible: vec![],
        weapon: vec![],
        launch: vec![],
        exit: vec![],
        key: vec![],
        switch: vec![],
    }
}

fn parse_tiles_key(t: &mut TilesConfig, key: &str, value: &str, lineno: usize) -> EngineResult<()> {
    let pairs = || -> Vec<String> {
        value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    };
    match key {
        "solid" => t.solid = parse_list(value, lineno)?,
        "hazard" => t.hazard = parse_list(value, lineno)?,
        "collectible" => t.collectible = parse_list(value, lineno)?,
        "weapon" => t.weapon = parse_list(value, lineno)?,
        "launch" => t.launch = parse_list(value, lineno)?,
        "exit" => t.exit = parse_list(value, lineno)?,
        "key" => t.key = pairs(),
        "switch" => t.switch = pairs(),
        other => return Err(malformed(lineno, format!("unknown tile class '{other}'"))),
    }
    Ok(())
}

fn parse_entity_key(s: &mut SpawnDef, key: &str, value: &str, lineno: usize) -> EngineResult<()> {
    match key {
        "type" => {
            s.kind = match value {
                "player" => SpawnKind::Player,
                "enemy" => SpawnKind::Enemy,
                "platform" => SpawnKind::Platform,
                other => return Err(malformed(lineno, format!("unknown entity type '{other}'"))),
            }
        }
        "location" => {
            let parts: Vec<f32> = parse_list(value, lineno)?;
            match parts.as_slice() {
                [c, r] => {
                    s.col = *c as i32;
                    s.row = *r as i32;
                }
                [c, r, w, h] if *w > 0.0 && *h > 0.0 => {
                    s.col = *c as i32;
                    s.row = *r as i32;
                    s.size = (*w, *h);
                }
                _ => return Err(malformed(lineno, format!("bad location '{value}'"))),
            }
        }
        "range" => {
            let parts: Vec<i32> = parse_list(value, lineno)?;
            match parts.as_slice() {
                [l, r] if l <= r => s.range = Some((*l, *r)),
                _ => return Err(malformed(lineno, format!("bad range '{value}'"))),
            }
        }
        "active" => {
            s.active = value
                .parse::<bool>()
                .map_err(|_| malformed(lineno, format!("bad flag '{value}'")))?
        }
        _ => {}
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut found: Vec<(String, LevelDef)> = vec![];
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(false, |e| e == "txt") {
            let filename = path.file_name().unwrap_or_default().to_string_lossy().to_string();
            let parsed = std::fs::read_to_string(&path)
                .map_err(EngineError::from)
                .and_then(|text| parse_level(&text));
            match parsed {
                Ok(mut def) => {
                    if def.name.is_empty() {
                        def.name = filename.trim_end_matches(".txt").to_string();
                    }
                    found.push((filename, def));
                }
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.into_iter().map(|(_, def)| def).collect()
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: &[&str] = &[
    include_str!("../../levels/01-first-steps.txt"),
    include_str!("../../levels/02-switchback.txt"),
];

pub fn embedded_levels() -> Vec<LevelDef> {
    EMBEDDED
        .iter()
        .filter_map(|text| match parse_level(text) {
            Ok(def) => Some(def),
            Err(e) => {
                log::warn!("embedded level rejected: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{TileClass, TileCode, TriggerKind};

    const SMALL: &str = "\
[header]
name=Small
width=4
height=3

[layer]
data=
0,0,0,0,
0,0,0,0,
122,122,70,122,

[entity]
type=player
location=0,1

[entity]
type=enemy
location=3,1
";

    #[test]
    fn parses_header_layer_entities() {
        let def = parse_level(SMALL).unwrap();
        assert_eq!(def.name, "Small");
        assert_eq!((def.width, def.height), (4, 3));
        assert_eq!(def.rows[2], vec![122, 122, 70, 122]);
        assert_eq!(def.spawns.len(), 2);
        assert_eq!(def.spawns[1].kind, SpawnKind::Enemy);
        assert!(def.tiles.is_none());
    }

    #[test]
    fn loads_world_with_config_table() {
        let cfg = GameConfig::default();
        let world = load_level(&parse_level(SMALL).unwrap(), &cfg).unwrap();
        assert_eq!(world.map.classify(0, 2), TileClass::Solid);
        assert_eq!(world.map.classify(2, 2), TileClass::Hazard);
        assert_eq!(world.player.body.pos, world.map.tile_center(0, 1));
        assert_eq!(world.enemies.len(), 1);
        assert_eq!(world.enemies[0].body.vel.x, cfg.enemy.patrol_speed);
        assert_ne!(world.enemies[0].id, world.player.id);
        assert_eq!(world.level_name, "Small");
    }

    #[test]
    fn level_tiles_section_replaces_table() {
        let text = SMALL.replace("[layer]", "[tiles]\nsolid=122\nkey=5:122\n\n[layer]");
        let def = parse_level(&text).unwrap();
        let world = load_level(&def, &GameConfig::default()).unwrap();
        assert_eq!(world.map.classify(2, 2), TileClass::Empty);
        assert_eq!(
            world.map.table().classify(TileCode(5)),
            TileClass::Trigger(TriggerKind::Key { door: TileCode(122) })
        );
    }

    #[test]
    fn platform_range_in_world_units() {
        let text = format!("{SMALL}\n[entity]\ntype=platform\nlocation=1,0,2,1\nrange=0,3\nactive=true\n");
        let world = load_level(&parse_level(&text).unwrap(), &GameConfig::default()).unwrap();
        let p = &world.platforms[0];
        let path = p.path().unwrap();
        assert!(path.active);
        assert_eq!(p.body.half, Vec2::new(0.25, 0.125));
        assert!((path.left - 0.25).abs() < 1e-6);
        assert!((path.right - 0.75).abs() < 1e-6);
        assert!(p.body.vel.x > 0.0);
    }

    #[test]
    fn rejects_wrong_row_count() {
        let text = SMALL.replace("height=3", "height=4");
        assert!(matches!(parse_level(&text), Err(EngineError::MalformedLevel(_))));
    }

    #[test]
    fn rejects_ragged_row() {
        let text = SMALL.replace("0,0,0,0,\n0,0,0,0,", "0,0,0,0,\n0,0,0,");
        assert!(parse_level(&text).is_err());
    }

    #[test]
    fn rejects_missing_player() {
        let text = SMALL.replace("type=player", "type=enemy");
        assert!(parse_level(&text).is_err());
    }

    #[test]
    fn rejects_entity_outside_grid() {
        let text = SMALL.replace("location=3,1", "location=9,1");
        assert!(parse_level(&text).is_err());
    }

    #[test]
    fn rejects_unknown_entity_type() {
        let text = SMALL.replace("type=enemy", "type=dragon");
        assert!(parse_level(&text).is_err());
    }

    #[test]
    fn embedded_levels_all_load() {
        let cfg = GameConfig::default();
        let levels = embedded_levels();
        assert_eq!(levels.len(), EMBEDDED.len());
        for def in &levels {
            load_level(def, &cfg).unwrap();
        }
    }
}
