/// Tile-grid physics and patrol-AI engine.
///
/// `domain` holds the rules (tilemap, entities, collision resolver, enemy
/// AI), `sim` runs them frame by frame and reports outcomes and events.
/// Rendering, input and audio stay outside; the terminal front-end in
/// `main.rs` is one such collaborator.

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;

pub use config::GameConfig;
pub use error::{EngineError, EngineResult};
pub use sim::event::{GameEvent, Outcome, StepReport};
pub use sim::step::step;
pub use sim::world::WorldState;
