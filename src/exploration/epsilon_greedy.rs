use crate::{
    assert_interval,
    decay::{Constant, Decay},
    util::max_value,
};

use super::Policy;

/// Epsilon greedy exploration policy with time-decaying epsilon threshold
///
/// With probability epsilon an action is drawn uniformly from all actions, otherwise
/// uniformly from the actions tied for the maximum value. Every tied action therefore
/// receives `epsilon / n + (1 - epsilon) / k` of the mass, where `k` is the size of the tie.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<D: Decay> {
    epsilon: D,
}

impl<D: Decay> EpsilonGreedy<D> {
    /// Initialize epsilon greedy policy with a decay strategy
    ///
    /// Only the starting value is checked. Later values that leave `[0,1]` are clamped, so a
    /// schedule decaying below zero behaves as greedy from the point it crosses zero.
    ///
    /// **Panics** if the schedule starts outside the interval `[0,1]`
    pub fn new(decay: D) -> Self {
        let epsilon = decay.evaluate(0.0);
        assert_interval!(epsilon, 0.0, 1.0);
        Self { epsilon: decay }
    }

    /// Epsilon at time `t`, clamped to `[0,1]`
    pub fn epsilon(&self, t: f32) -> f32 {
        self.epsilon.evaluate(t).clamp(0.0, 1.0)
    }
}

impl EpsilonGreedy<Constant> {
    /// Epsilon greedy policy with a fixed epsilon
    ///
    /// **Panics** if `epsilon` is not in the interval `[0,1]`
    pub fn constant(epsilon: f32) -> Self {
        assert_interval!(epsilon, 0.0, 1.0);
        Self::new(Constant::new(epsilon))
    }
}

impl Default for EpsilonGreedy<Constant> {
    fn default() -> Self {
        Self::constant(0.1)
    }
}

impl<D: Decay> Policy for EpsilonGreedy<D> {
    fn probabilities(&self, t: f32, q_values: &[f32]) -> Vec<f32> {
        let epsilon = self.epsilon(t);
        let n = q_values.len() as f32;
        let best = max_value(q_values);
        let tied = q_values.iter().filter(|&&q| q == best).count() as f32;

        q_values
            .iter()
            .map(|&q| {
                let greedy = if q == best { (1.0 - epsilon) / tied } else { 0.0 };
                epsilon / n + greedy
            })
            .collect()
    }

    fn parameter(&self, t: f32) -> f32 {
        self.epsilon(t)
    }
}
