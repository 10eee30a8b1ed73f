mod color;
mod sequencer;

pub use color::Rgba;
pub use sequencer::{BlinkRequest, BlinkSequencer, Mode, Phase, RestartPolicy, SequencerConfig};

/// A display the sequencer's output is drawn onto
pub trait Surface {
    /// Show the signal in `color`
    fn draw(&mut self, color: Rgba);

    /// Hide the signal
    fn clear(&mut self);
}
