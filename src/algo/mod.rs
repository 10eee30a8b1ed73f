pub mod tabular;

pub use tabular::{QTable, SignalAgent, SignalAgentConfig};
