//! A tabular Q-learning agent that decides which turn signal to show on an intersection
//! approach, and a blink sequencer that renders the chosen signal over wall-clock time.

/// Implemented RL algorithms
pub mod algo;

/// Saved agent state
pub mod checkpoint;

/// Implementations of strategies for time-decaying hyperparameters
pub mod decay;

/// Environment
pub mod env;

/// Error types
pub mod error;

/// Exploration policies
pub mod exploration;

/// Turn-signal display
pub mod feedback;

/// Testing environments
pub mod gym;

/// Trial logs
pub mod report;

/// Approach states and tags
pub mod state;

mod util;

pub use error::{Error, Result};
