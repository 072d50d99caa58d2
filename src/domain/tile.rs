/// Tile codes and their classification.
///
/// A level stores raw integer codes. What a code *means* (solid, hazard,
/// trigger...) is looked up once through a `TileTable` built from
/// configuration or level metadata, so no call site carries its own list
/// of magic numbers.

use std::collections::HashMap;

use crate::config::TilesConfig;
use crate::error::{EngineError, EngineResult};

/// Raw tile code as stored in the level grid. `0` is always empty.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct TileCode(pub u16);

impl TileCode {
    pub const EMPTY: TileCode = TileCode(0);
}

/// Effect of touching a trigger tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TriggerKind {
    /// Arms the player. Consumed on contact.
    WeaponPickup,
    /// Launches the player upward. Persists.
    LaunchPad,
    /// Opens every tile carrying the `door` code. Consumed on contact.
    Key { door: TileCode },
    /// Blocks like a wall; activates platforms and turns into `becomes`.
    Switch { becomes: TileCode },
    /// Completes the level.
    Exit,
}

impl TriggerKind {
    /// Does this trigger stop movement like a solid tile?
    pub fn blocks(self) -> bool {
        matches!(self, TriggerKind::Switch { .. })
    }

    /// Does this trigger stop horizontal movement? A launch pad is a wall
    /// from the side and only fires when landed on.
    pub fn blocks_side(self) -> bool {
        self.blocks() || self == TriggerKind::LaunchPad
    }

    /// Tile code left behind after firing, if the trigger clears itself.
    pub fn residue(self) -> Option<TileCode> {
        match self {
            TriggerKind::WeaponPickup | TriggerKind::Key { .. } => Some(TileCode::EMPTY),
            TriggerKind::Switch { becomes } => Some(becomes),
            TriggerKind::LaunchPad | TriggerKind::Exit => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TileClass {
    #[default]
    Empty,
    Solid,
    Hazard,
    Trigger(TriggerKind),
    Collectible,
}

impl TileClass {
    /// Does the resolver push entities out of this tile?
    pub fn is_blocking(self) -> bool {
        match self {
            TileClass::Solid => true,
            TileClass::Trigger(kind) => kind.blocks(),
            _ => false,
        }
    }

    /// Does the X resolver push entities out of this tile?
    pub fn is_wall(self) -> bool {
        match self {
            TileClass::Trigger(kind) => kind.blocks_side(),
            _ => self.is_blocking(),
        }
    }

    /// Can an enemy keep walking over this tile? (edge detection)
    pub fn is_floor(self) -> bool {
        self.is_blocking()
    }

    pub fn trigger(self) -> Option<TriggerKind> {
        match self {
            TileClass::Trigger(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Code → class lookup. Codes not present classify as `Empty`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileTable {
    classes: HashMap<TileCode, TileClass>,
}

impl TileTable {
    pub fn new() -> Self {
        TileTable { classes: HashMap::new() }
    }

    pub fn insert(&mut self, code: TileCode, class: TileClass) {
        if code == TileCode::EMPTY {
            log::warn!("tile code 0 is reserved for empty; ignoring {:?}", class);
            return;
        }
        self.classes.insert(code, class);
    }

    pub fn classify(&self, code: TileCode) -> TileClass {
        self.classes.get(&code).copied().unwrap_or(TileClass::Empty)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Build the table from its textual description.
    ///
    /// Later categories win if a code is listed twice; triggers are applied
    /// last so a door code listed as solid stays solid while its key is a
    /// trigger.
    pub fn from_config(cfg: &TilesConfig) -> EngineResult<Self> {
        let mut table = TileTable::new();
        for &c in &cfg.solid { table.insert(TileCode(c), TileClass::Solid); }
        for &c in &cfg.hazard { table.insert(TileCode(c), TileClass::Hazard); }
        for &c in &cfg.collectible { table.insert(TileCode(c), TileClass::Collectible); }
        for &c in &cfg.weapon {
            table.insert(TileCode(c), TileClass::Trigger(TriggerKind::WeaponPickup));
        }
        for &c in &cfg.launch {
            table.insert(TileCode(c), TileClass::Trigger(TriggerKind::LaunchPad));
        }
        for &c in &cfg.exit {
            table.insert(TileCode(c), TileClass::Trigger(TriggerKind::Exit));
        }
        for pair in &cfg.key {
            let (key, door) = parse_code_pair(pair)?;
            table.insert(key, TileClass::Trigger(TriggerKind::Key { door }));
        }
        for pair in &cfg.switch {
            let (switch, becomes) = parse_code_pair(pair)?;
            table.insert(switch, TileClass::Trigger(TriggerKind::Switch { becomes }));
        }
        Ok(table)
    }
}

/// Parse `"a:b"` into two tile codes.
fn parse_code_pair(s: &str) -> EngineResult<(TileCode, TileCode)> {
    let bad = || EngineError::Config(format!("expected `code:code`, got {s:?}"));
    let (a, b) = s.split_once(':').ok_or_else(bad)?;
    let a: u16 = a.trim().parse().map_err(|_| bad())?;
    let b: u16 = b.trim().parse().map_err(|_| bad())?;
    Ok((TileCode(a), TileCode(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TilesConfig {
        TilesConfig {
            solid: vec![1, 2, 15],
            hazard: vec![70],
            collectible: vec![9],
            weapon: vec![130],
            launch: vec![284],
            exit: vec![310],
            key: vec!["14:15".into()],
            switch: vec!["250:2".into()],
        }
    }

    #[test]
    fn classify_known_codes() {
        let t = TileTable::from_config(&cfg()).unwrap();
        assert_eq!(t.classify(TileCode(1)), TileClass::Solid);
        assert_eq!(t.classify(TileCode(70)), TileClass::Hazard);
        assert_eq!(t.classify(TileCode(9)), TileClass::Collectible);
        assert_eq!(
            t.classify(TileCode(14)),
            TileClass::Trigger(TriggerKind::Key { door: TileCode(15) })
        );
        assert_eq!(
            t.classify(TileCode(250)),
            TileClass::Trigger(TriggerKind::Switch { becomes: TileCode(2) })
        );
    }

    #[test]
    fn launch_pad_is_a_wall_but_not_a_floor() {
        let pad = TileClass::Trigger(TriggerKind::LaunchPad);
        assert!(pad.is_wall());
        assert!(!pad.is_blocking());
        assert!(!pad.is_floor());
        let switch = TileClass::Trigger(TriggerKind::Switch { becomes: TileCode(1) });
        assert!(switch.is_wall() && switch.is_blocking());
        assert!(!TileClass::Trigger(TriggerKind::Exit).is_wall());
        assert!(!TileClass::Hazard.is_wall());
    }

    #[test]
    fn unknown_code_is_empty() {
        let t = TileTable::from_config(&cfg()).unwrap();
        assert_eq!(t.classify(TileCode(999)), TileClass::Empty);
        assert_eq!(t.classify(TileCode::EMPTY), TileClass::Empty);
    }

    #[test]
    fn zero_cannot_be_reclassified() {
        let mut t = TileTable::new();
        t.insert(TileCode(0), TileClass::Solid);
        assert!(t.is_empty());
    }

    #[test]
    fn switch_blocks_but_launch_pad_does_not() {
        let t = TileTable::from_config(&cfg()).unwrap();
        assert!(t.classify(TileCode(250)).is_blocking());
        assert!(!t.classify(TileCode(284)).is_blocking());
        assert!(!t.classify(TileCode(70)).is_blocking());
    }

    #[test]
    fn trigger_residue() {
        assert_eq!(TriggerKind::WeaponPickup.residue(), Some(TileCode::EMPTY));
        assert_eq!(TriggerKind::LaunchPad.residue(), None);
        assert_eq!(
            TriggerKind::Switch { becomes: TileCode(7) }.residue(),
            Some(TileCode(7))
        );
    }

    #[test]
    fn bad_pair_is_config_error() {
        let mut c = cfg();
        c.key = vec!["14-15".into()];
        assert!(matches!(TileTable::from_config(&c), Err(EngineError::Config(_))));
    }
}
