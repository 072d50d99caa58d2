/// Pure engine rules: tiles, entities, collision, enemy AI.
/// Nothing here owns a world; `sim` drives it.

pub mod ai;
pub mod entity;
pub mod physics;
pub mod tile;
pub mod tilemap;
