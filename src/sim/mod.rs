/// Stateful orchestration: the world, its per-frame step, level loading
/// and snapshots.

pub mod event;
pub mod level;
pub mod save;
pub mod step;
pub mod world;
