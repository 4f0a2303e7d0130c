//! Errors surfaced by the frame loop and its startup.

use kestrel_core::{ConfigError, EcsError};
use thiserror::Error;

/// Anything that stops the game loop.
#[derive(Error, Debug)]
pub enum LoopError {
    /// Configuration could not be loaded or is out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The ECS core reported a failure; the frame was aborted.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A previous frame failed; the loop no longer steps the world.
    #[error("game loop halted after a failed frame")]
    Halted,

    /// The global log subscriber could not be installed.
    #[error("failed to install logging: {0}")]
    Logging(String),
}
