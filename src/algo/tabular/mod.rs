pub mod q_table;
pub mod signal_agent;

pub use q_table::QTable;
pub use signal_agent::{EpisodeSummary, SignalAgent, SignalAgentConfig};

/// Number of turn-signal actions the agent chooses between
pub const NUM_ACTIONS: usize = 3;

/// Action values of one state, one slot per action
pub type ActionValues = [f32; NUM_ACTIONS];

/// Number of blinks used to signal `action`
pub fn blink_count_for(action: usize) -> u32 {
    action as u32 + 1
}
