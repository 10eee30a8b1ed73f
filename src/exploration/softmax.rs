use crate::{decay::Decay, util::max_value};

use super::Policy;

/// Softmax exploration policy (also known as Boltzmann exploration) with time-decaying temperature
#[derive(Debug, Clone)]
pub struct Softmax<D: Decay> {
    temperature: D,
}

impl<D: Decay> Softmax<D> {
    pub fn new(decay: D) -> Self {
        Self { temperature: decay }
    }

    /// Temperature at time `t`, floored at zero
    pub fn temperature(&self, t: f32) -> f32 {
        self.temperature.evaluate(t).max(0.0)
    }
}

impl<D: Decay> Policy for Softmax<D> {
    /// At zero temperature the distribution is the greedy limit: the maximal actions split
    /// the mass evenly.
    fn probabilities(&self, t: f32, q_values: &[f32]) -> Vec<f32> {
        let tau = self.temperature(t);
        let best = max_value(q_values);
        if tau <= 0.0 {
            let ties = q_values.iter().filter(|&&q| q == best).count() as f32;
            return q_values
                .iter()
                .map(|&q| if q == best { 1.0 / ties } else { 0.0 })
                .collect();
        }

        // shift by the max so large values don't overflow
        let exponentials = q_values
            .iter()
            .map(|q| ((q - best) / tau).exp())
            .collect::<Vec<_>>();
        let sum: f32 = exponentials.iter().sum();
        exponentials.into_iter().map(|x| x / sum).collect()
    }

    fn parameter(&self, t: f32) -> f32 {
        self.temperature(t)
    }
}

#[cfg(test)]
mod tests {
    use crate::decay::{Constant, Linear};

    use super::*;

    #[test]
    fn softmax_functional() {
        let policy = Softmax::new(Constant::new(1.0));
        let probs = policy.probabilities(0.0, &[0.0, 0.0, 0.0]);
        assert!(probs.iter().all(|p| (p - 1.0 / 3.0).abs() < 1e-6), "uniform on equal values");

        let probs = policy.probabilities(0.0, &[0.0, 1.0, 0.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "probabilities sum to one");
        assert!(probs[1] > probs[0] && probs[0] == probs[2], "higher value preferred");
    }

    #[test]
    fn cold_temperature_is_nearly_greedy() {
        let policy = Softmax::new(Constant::new(0.01));
        let probs = policy.probabilities(0.0, &[1.0, 0.0, -1.0]);
        assert!(probs[0] > 0.999, "mass concentrates on the best action");
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let policy = Softmax::new(Constant::new(0.0));
        assert_eq!(policy.probabilities(0.0, &[1.0, 0.0, 1.0]), vec![0.5, 0.0, 0.5]);
        assert_eq!(policy.probabilities(0.0, &[-1.0, 2.0, 0.0]), vec![0.0, 1.0, 0.0]);
        assert_eq!(policy.parameter(0.0), 0.0);
    }

    #[test]
    fn temperature_floored_past_decay_horizon() {
        let policy = Softmax::new(Linear::new(0.5, 1.0, 0.0).unwrap());
        assert_eq!(policy.temperature(10.0), 0.0, "schedule ends at zero");
        let probs = policy.probabilities(10.0, &[0.0, 0.5, 0.25]);
        assert!(probs.iter().all(|p| p.is_finite()), "no NaN at zero temperature");
        assert_eq!(probs, vec![0.0, 1.0, 0.0]);
    }
}
