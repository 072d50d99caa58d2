/// Engine error taxonomy.
///
/// Per-frame failures never reach here: tile queries clamp and degenerate
/// shots are no-ops. Only load-time problems (level text, config, save
/// files) and construction-time validation produce an `EngineError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Checked tile access outside the grid.
    #[error("tile query out of bounds: ({col}, {row})")]
    OutOfBoundsQuery { col: i64, row: i64 },

    /// An entity was built with a non-positive half-size.
    #[error("invalid entity half-size ({hx}, {hy}): both components must be positive")]
    InvalidEntityConfig { hx: f32, hy: f32 },

    #[error("malformed level: {0}")]
    MalformedLevel(String),

    #[error("malformed save data: {0}")]
    SaveFormat(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
