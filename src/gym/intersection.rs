use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    algo::tabular::NUM_ACTIONS,
    assert_interval,
    env::Environment,
    state::{State, Tag},
};

/// Tag id the simulated detector reports when it misreads the approach
const MISREAD_TAG: u32 = 404;

/// Configuration for the [`Intersection`] environment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionConfig {
    /// Probability that the driver takes the exit the signal announces
    ///
    /// **Default**: `0.9`
    pub compliance: f64,
    /// Probability that a step is misread as an unrecognized tag
    ///
    /// **Default**: `0.0`
    pub noise: f64,
    /// Mean seconds from signal to the detected tag
    ///
    /// **Default**: `2.0`
    pub reaction_mean: f64,
    /// Standard deviation of the reaction time
    ///
    /// **Default**: `0.5`
    pub reaction_std: f64,
    pub seed: Option<u64>,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            compliance: 0.9,
            noise: 0.0,
            reaction_mean: 2.0,
            reaction_std: 0.5,
            seed: None,
        }
    }
}

/// A simulated plus-shaped intersection with a driver reacting to the turn signal
///
/// Signal `i` announces the exit reported by tag id `i`. The driver follows the signal with
/// probability `compliance` and otherwise picks one of the three exits uniformly.
pub struct Intersection {
    compliance: f64,
    noise: f64,
    reaction: Normal<f64>,
    start: State,
    steps: u32,
    rng: StdRng,
}

impl Intersection {
    /// **Panics** if `compliance` or `noise` is not in the interval `[0,1]`, or the reaction
    /// time spread is negative
    pub fn new(config: IntersectionConfig) -> Self {
        let IntersectionConfig {
            compliance,
            noise,
            reaction_mean,
            reaction_std,
            seed,
        } = config;
        assert_interval!(compliance, 0.0, 1.0);
        assert_interval!(noise, 0.0, 1.0);
        let reaction = Normal::new(reaction_mean, reaction_std)
            .expect("reaction time standard deviation must be finite and non-negative");

        Self {
            compliance,
            noise,
            reaction,
            start: State::default(),
            steps: 0,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    /// The state the current approach started in
    pub fn start(&self) -> State {
        self.start
    }

    /// Steps taken since the last reset
    pub fn steps(&self) -> u32 {
        self.steps
    }
}

impl Environment for Intersection {
    fn reset(&mut self, start: State) {
        self.start = start;
        self.steps = 0;
    }

    fn step(&mut self, action: usize) -> (Tag, Duration) {
        assert!(action < NUM_ACTIONS, "Invalid action: {action}");
        self.steps += 1;

        let elapsed = Duration::from_secs_f64(self.reaction.sample(&mut self.rng).max(0.0));
        if self.rng.gen_bool(self.noise) {
            return (Tag::Unrecognized(MISREAD_TAG), elapsed);
        }

        let exit = if self.rng.gen_bool(self.compliance) {
            action
        } else {
            self.rng.gen_range(0..NUM_ACTIONS)
        };
        (Tag::from_id(exit as u32), elapsed)
    }
}
