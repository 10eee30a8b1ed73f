use thiserror::Error;

/// Errors raised by the agent, the blink sequencer, and their persistence layers
#[derive(Debug, Error)]
pub enum Error {
    /// An action index outside `0..num_actions` was passed to the agent
    #[error("action {action} is out of range, the agent has {num_actions} actions")]
    ActionOutOfRange { action: usize, num_actions: usize },

    /// A blink request carried a negative count
    #[error("blink count must be non-negative, got {0}")]
    NegativeBlinkCount(i64),

    /// A reward grid violated its layout invariants
    #[error("invalid reward grid: {0}")]
    InvalidGrid(String),

    /// A decay schedule was constructed with inconsistent parameters
    #[error("invalid decay schedule: {0}")]
    InvalidDecay(String),

    /// A checkpoint decoded fine but its contents are unusable
    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
