use std::time::Duration;

use crate::state::{State, Tag};

/// The driving loop the agent signals into
///
/// Each step the agent displays a turn signal and the environment reports the tag the
/// vehicle produced in response, together with the time it took to get there.
pub trait Environment {
    /// Place the vehicle at the beginning of `start`'s approach
    fn reset(&mut self, start: State);

    /// Respond to the signalled `action`
    ///
    /// **Returns** `(tag, elapsed)`
    fn step(&mut self, action: usize) -> (Tag, Duration);
}
