/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing or incomplete. Defaults
/// reproduce the tuning of the final platformer prototype.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub player: PlayerConfig,
    pub enemy: EnemyConfig,
    pub bullet: BulletConfig,
    pub platform: PlatformConfig,
    pub triggers: TriggerConfig,
    pub tiles: TilesConfig,
    pub levels_dir: PathBuf,
    pub save_file: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    #[serde(default = "default_friction_x")]
    pub friction_x: f32,
    #[serde(default = "default_friction_y")]
    pub friction_y: f32,
    /// Extra push-out beyond the penetration depth.
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
    #[serde(default = "default_fixed_timestep")]
    pub fixed_timestep: f32,
    /// Cap on simulation steps per rendered frame (stall recovery).
    #[serde(default = "default_max_timesteps")]
    pub max_timesteps: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_half_width")]
    pub half_width: f32,
    #[serde(default = "default_half_tile")]
    pub half_height: f32,
    #[serde(default = "default_move_accel")]
    pub move_accel: f32,
    #[serde(default = "default_jump_impulse")]
    pub jump_impulse: f32,
    #[serde(default = "default_player_fire_interval")]
    pub fire_interval: f32,
    /// Share of input acceleration added on top of a ridden platform's speed.
    #[serde(default = "default_rider_input_factor")]
    pub rider_input_factor: f32,
    #[serde(default)]
    pub starts_armed: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EnemyConfig {
    #[serde(default = "default_half_tile")]
    pub half_width: f32,
    #[serde(default = "default_half_tile")]
    pub half_height: f32,
    #[serde(default = "default_patrol_speed")]
    pub patrol_speed: f32,
    /// Manhattan tile distance at or below which enemies flee.
    #[serde(default = "default_inner_radius")]
    pub inner_radius: u32,
    /// Manhattan tile distance below which enemies are alert.
    #[serde(default = "default_outer_radius")]
    pub outer_radius: u32,
    #[serde(default = "default_enemy_fire_interval")]
    pub fire_interval: f32,
    #[serde(default = "default_jump_impulse")]
    pub flee_jump: f32,
    /// How far past the leading foot the edge probe looks.
    #[serde(default = "default_edge_probe")]
    pub edge_probe: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BulletConfig {
    #[serde(default = "default_half_tile")]
    pub half_width: f32,
    #[serde(default = "default_half_tile")]
    pub half_height: f32,
    #[serde(default = "default_bullet_speed")]
    pub speed: f32,
    /// Seconds before an unobstructed bullet expires.
    #[serde(default = "default_bullet_ttl")]
    pub ttl: f32,
    /// Distance from the firer's centre at which bullets appear.
    #[serde(default = "default_half_tile")]
    pub spawn_offset: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_speed")]
    pub speed: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_launch_boost")]
    pub launch_boost: f32,
}

/// Textual tile classification. See `TileTable::from_config`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TilesConfig {
    #[serde(default = "default_solid")]
    pub solid: Vec<u16>,
    #[serde(default = "default_hazard")]
    pub hazard: Vec<u16>,
    #[serde(default)]
    pub collectible: Vec<u16>,
    #[serde(default = "default_weapon")]
    pub weapon: Vec<u16>,
    #[serde(default = "default_launch")]
    pub launch: Vec<u16>,
    #[serde(default = "default_exit")]
    pub exit: Vec<u16>,
    /// `"key:door"` pairs.
    #[serde(default = "default_key")]
    pub key: Vec<String>,
    /// `"switch:becomes"` pairs.
    #[serde(default = "default_switch")]
    pub switch: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    physics: PhysicsConfig,
    #[serde(default)]
    player: PlayerConfig,
    #[serde(default)]
    enemy: EnemyConfig,
    #[serde(default)]
    bullet: BulletConfig,
    #[serde(default)]
    platform: PlatformConfig,
    #[serde(default)]
    triggers: TriggerConfig,
    #[serde(default)]
    tiles: TilesConfig,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_save_file")]
    save_file: String,
}

// ── Defaults ──

const DEFAULT_TILE: f32 = 0.25;

fn default_tile_size() -> f32 { DEFAULT_TILE }
fn default_gravity() -> f32 { 9.8 }
fn default_friction_x() -> f32 { 0.2 }
fn default_friction_y() -> f32 { 0.1 }
fn default_epsilon() -> f32 { 0.001 }
fn default_fixed_timestep() -> f32 { 1.0 / 60.0 }
fn default_max_timesteps() -> u32 { 6 }

fn default_half_tile() -> f32 { DEFAULT_TILE * 0.5 }
fn default_player_half_width() -> f32 { DEFAULT_TILE * 0.75 * 0.5 }
fn default_move_accel() -> f32 { 2.0 }
fn default_jump_impulse() -> f32 { 6.0 }
fn default_player_fire_interval() -> f32 { 0.25 }
fn default_rider_input_factor() -> f32 { 0.5 }

fn default_patrol_speed() -> f32 { 1.0 }
fn default_inner_radius() -> u32 { 5 }
fn default_outer_radius() -> u32 { 15 }
fn default_enemy_fire_interval() -> f32 { 1.0 }
fn default_edge_probe() -> f32 { 0.01 }

fn default_bullet_speed() -> f32 { 1.5 }
fn default_bullet_ttl() -> f32 { 3.0 }
fn default_platform_speed() -> f32 { 2.0 }
fn default_launch_boost() -> f32 { 9.0 }

fn default_solid() -> Vec<u16> { vec![122, 332, 126, 127, 152, 395, 396, 397, 398, 252, 15] }
fn default_hazard() -> Vec<u16> { vec![70] }
fn default_weapon() -> Vec<u16> { vec![130] }
fn default_launch() -> Vec<u16> { vec![284] }
fn default_exit() -> Vec<u16> { vec![310] }
fn default_key() -> Vec<String> { vec!["14:15".into()] }
fn default_switch() -> Vec<String> { vec!["250:252".into()] }

fn default_levels_dir() -> String { "levels".into() }
fn default_save_file() -> String { "tilestep.sav".into() }

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            tile_size: default_tile_size(),
            gravity: default_gravity(),
            friction_x: default_friction_x(),
            friction_y: default_friction_y(),
            epsilon: default_epsilon(),
            fixed_timestep: default_fixed_timestep(),
            max_timesteps: default_max_timesteps(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            half_width: default_player_half_width(),
            half_height: default_half_tile(),
            move_accel: default_move_accel(),
            jump_impulse: default_jump_impulse(),
            fire_interval: default_player_fire_interval(),
            rider_input_factor: default_rider_input_factor(),
            starts_armed: false,
        }
    }
}

impl Default for EnemyConfig {
    fn default() -> Self {
        EnemyConfig {
            half_width: default_half_tile(),
            half_height: default_half_tile(),
            patrol_speed: default_patrol_speed(),
            inner_radius: default_inner_radius(),
            outer_radius: default_outer_radius(),
            fire_interval: default_enemy_fire_interval(),
            flee_jump: default_jump_impulse(),
            edge_probe: default_edge_probe(),
        }
    }
}

impl Default for BulletConfig {
    fn default() -> Self {
        BulletConfig {
            half_width: default_half_tile(),
            half_height: default_half_tile(),
            speed: default_bullet_speed(),
            ttl: default_bullet_ttl(),
            spawn_offset: default_half_tile(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig { speed: default_platform_speed() }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig { launch_boost: default_launch_boost() }
    }
}

impl Default for TilesConfig {
    fn default() -> Self {
        TilesConfig {
            solid: default_solid(),
            hazard: default_hazard(),
            collectible: vec![],
            weapon: default_weapon(),
            launch: default_launch(),
            exit: default_exit(),
            key: default_key(),
            switch: default_switch(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            save_file: default_save_file(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::resolve(TomlConfig::default(), &[])
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::resolve(toml_cfg, &search_dirs)
    }

    /// Parse a config document without touching the filesystem.
    /// Relative paths are kept relative to the CWD.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(GameConfig::resolve(toml_cfg, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir = resolve_dir(&toml_cfg.general.levels_dir, search_dirs);
        GameConfig {
            physics: toml_cfg.physics,
            player: toml_cfg.player,
            enemy: toml_cfg.enemy,
            bullet: toml_cfg.bullet,
            platform: toml_cfg.platform,
            triggers: toml_cfg.triggers,
            tiles: toml_cfg.tiles,
            levels_dir,
            save_file: PathBuf::from(toml_cfg.general.save_file),
        }
    }
}

/// Absolute paths are used as-is; relative ones are looked up in the
/// candidate directories, defaulting to the CWD.
fn resolve_dir(dir: &str, search_dirs: &[PathBuf]) -> PathBuf {
    if Path::new(dir).is_absolute() {
        return PathBuf::from(dir);
    }
    search_dirs
        .iter()
        .map(|d| d.join(dir))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| PathBuf::from(dir))
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => {
                        log::debug!("loaded config from {}", path.display());
                        return cfg;
                    }
                    Err(e) => {
                        log::warn!("config.toml parse error: {e}; using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = GameConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.physics.tile_size, 0.25);
        assert_eq!(cfg.physics.gravity, 9.8);
        assert_eq!(cfg.enemy.inner_radius, 5);
        assert_eq!(cfg.enemy.outer_radius, 15);
        assert_eq!(cfg.tiles, TilesConfig::default());
        assert_eq!(cfg.levels_dir, PathBuf::from("levels"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = GameConfig::from_toml_str(
            "[physics]\ngravity = 20.0\n[enemy]\ninner_radius = 3\n",
        )
        .unwrap();
        assert_eq!(cfg.physics.gravity, 20.0);
        assert_eq!(cfg.physics.friction_x, 0.2);
        assert_eq!(cfg.enemy.inner_radius, 3);
        assert_eq!(cfg.enemy.fire_interval, 1.0);
    }

    #[test]
    fn tiles_section_overrides_table() {
        let cfg = GameConfig::from_toml_str(
            "[tiles]\nsolid = [1, 2]\nkey = [\"5:6\"]\n",
        )
        .unwrap();
        assert_eq!(cfg.tiles.solid, vec![1, 2]);
        assert_eq!(cfg.tiles.key, vec!["5:6".to_string()]);
        assert_eq!(cfg.tiles.hazard, vec![70]);
    }

    #[test]
    fn parse_error_is_reported() {
        let err = GameConfig::from_toml_str("[physics]\ngravity = \"heavy\"\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
