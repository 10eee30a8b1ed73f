use std::{
    num::NonZeroU32,
    time::{Duration, Instant},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Rgba, Surface};

/// A display request for the turn signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlinkRequest {
    /// Stop and hide immediately
    Off,
    /// Show continuously
    Solid(Rgba),
    /// Show `count` on phases separated by off phases
    Blink { count: NonZeroU32, color: Rgba },
}

impl BlinkRequest {
    /// `None` turns the signal off, `Some(0)` shows it solid, `Some(n)` blinks `n` times
    pub fn new(count: Option<u32>, color: Rgba) -> Self {
        match count.map(NonZeroU32::new) {
            None => Self::Off,
            Some(None) => Self::Solid(color),
            Some(Some(count)) => Self::Blink { count, color },
        }
    }

    /// Like [`new`](Self::new) for hosts that hand over signed counts
    pub fn from_signed(count: Option<i64>, color: Rgba) -> Result<Self> {
        match count {
            Some(n) if n < 0 => Err(Error::NegativeBlinkCount(n)),
            // anything past u32::MAX blinks is indistinguishable from forever
            Some(n) => Ok(Self::new(Some(u32::try_from(n).unwrap_or(u32::MAX)), color)),
            None => Ok(Self::Off),
        }
    }
}

/// What to do when a blink request arrives while the same blink count is already running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Every request restarts the sequence from its first on phase
    #[default]
    Always,
    /// A repeated count keeps the running sequence and only takes the new colour
    OnChange,
}

/// Configuration for the [`BlinkSequencer`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// How long the signal stays visible in each blink
    ///
    /// **Default**: 200 ms
    pub on_duration: Duration,
    /// How long the signal stays hidden between blinks
    ///
    /// **Default**: 200 ms
    pub off_duration: Duration,
    /// **Default**: [`RestartPolicy::Always`]
    pub restart: RestartPolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            on_duration: Duration::from_millis(200),
            off_duration: Duration::from_millis(200),
            restart: RestartPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Idle,
    Solid,
    Blinking,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    On,
    Off,
}

/// Turns blink requests into visible and hidden phases over wall-clock time
///
/// There is no timer: the sequence only advances when the host calls [`tick`](Self::tick)
/// or [`query`](Self::query), at most one phase change per call, and each phase is timed
/// from the call that entered it. Correct timing therefore does not depend on the host's
/// frame rate, only on it calling often enough.
#[derive(Debug, Clone)]
pub struct BlinkSequencer {
    config: SequencerConfig,
    mode: Mode,
    color: Rgba,
    phase: Phase,
    phase_start: Option<Instant>,
    cycles_completed: u32,
    total_cycles: u32,
}

impl Default for BlinkSequencer {
    fn default() -> Self {
        Self::new(SequencerConfig::default())
    }
}

impl BlinkSequencer {
    /// Initialize an idle sequencer
    ///
    /// **Panics** if either phase duration is zero
    pub fn new(config: SequencerConfig) -> Self {
        assert!(!config.on_duration.is_zero(), "`on_duration` must be positive");
        assert!(!config.off_duration.is_zero(), "`off_duration` must be positive");
        Self {
            config,
            mode: Mode::Idle,
            color: Rgba::default(),
            phase: Phase::On,
            phase_start: None,
            cycles_completed: 0,
            total_cycles: 0,
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    /// On phases finished in the current blink sequence
    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    /// Blinks requested for the current sequence, `0` outside blinking mode
    pub fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    pub fn is_active(&self) -> bool {
        self.mode != Mode::Idle
    }

    /// Start showing `request` as of `now`
    pub fn request(&mut self, request: BlinkRequest, now: Instant) {
        match request {
            BlinkRequest::Off => self.deactivate(),
            BlinkRequest::Solid(color) => {
                self.mode = Mode::Solid;
                self.color = color;
                self.phase = Phase::On;
                self.phase_start = None;
                self.cycles_completed = 0;
                self.total_cycles = 0;
            }
            BlinkRequest::Blink { count, color } => {
                let count = count.get();
                self.color = color;
                let running = self.mode == Mode::Blinking && self.total_cycles == count;
                if running && self.config.restart == RestartPolicy::OnChange {
                    return;
                }
                self.mode = Mode::Blinking;
                self.phase = Phase::On;
                self.phase_start = Some(now);
                self.cycles_completed = 0;
                self.total_cycles = count;
                debug!("Blinking {count} times");
            }
        }
    }

    /// `None` turns the signal off, `Some(0)` shows it solid, `Some(n)` blinks `n` times
    pub fn activate(&mut self, count: Option<u32>, color: Rgba, now: Instant) {
        self.request(BlinkRequest::new(count, color), now);
    }

    /// Stop and hide the signal, a no-op when already idle
    pub fn deactivate(&mut self) {
        self.mode = Mode::Idle;
        self.phase = Phase::On;
        self.phase_start = None;
        self.cycles_completed = 0;
        self.total_cycles = 0;
    }

    /// Advance the blink sequence to `now`
    pub fn tick(&mut self, now: Instant) {
        let Some(start) = self.phase_start else {
            return;
        };
        if self.mode != Mode::Blinking {
            return;
        }

        let elapsed = now.saturating_duration_since(start);
        match self.phase {
            Phase::On if elapsed >= self.config.on_duration => {
                self.cycles_completed += 1;
                if self.cycles_completed < self.total_cycles {
                    self.phase = Phase::Off;
                    self.phase_start = Some(now);
                } else {
                    debug!("Blink sequence of {} finished", self.total_cycles);
                    self.deactivate();
                }
            }
            Phase::Off if elapsed >= self.config.off_duration => {
                self.phase = Phase::On;
                self.phase_start = Some(now);
            }
            _ => {}
        }
    }

    /// Whether the signal should currently be drawn
    pub fn visible(&self) -> bool {
        match self.mode {
            Mode::Idle => false,
            Mode::Solid => true,
            Mode::Blinking => self.phase == Phase::On,
        }
    }

    /// Advance to `now` and report whether to draw and in which colour
    pub fn query(&mut self, now: Instant) -> (bool, Rgba) {
        self.tick(now);
        (self.visible(), self.color)
    }

    /// Advance to `now` and draw the result onto `surface`
    pub fn render<S: Surface>(&mut self, now: Instant, surface: &mut S) {
        match self.query(now) {
            (true, color) => surface.draw(color),
            (false, _) => surface.clear(),
        }
    }
}
