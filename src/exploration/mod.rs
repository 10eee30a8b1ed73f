use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

mod epsilon_greedy;
mod softmax;

pub use epsilon_greedy::EpsilonGreedy;
pub use softmax::Softmax;

/// An exploration policy that turns one row of Q values into a distribution over actions
pub trait Policy {
    /// Probability of choosing each action at time `t` given the action values of a state
    ///
    /// The returned vector has one entry per value in `q_values` and sums to one.
    fn probabilities(&self, t: f32, q_values: &[f32]) -> Vec<f32>;

    /// The policy's scalar exploration parameter at time `t` (epsilon, temperature, ...)
    fn parameter(&self, t: f32) -> f32;
}

/// Draw an action index from a probability vector
///
/// **Panics** if `probabilities` is empty or has no positive mass
pub fn sample<R: Rng + ?Sized>(probabilities: &[f32], rng: &mut R) -> usize {
    let dist = WeightedIndex::new(probabilities).expect("`probabilities` is not empty");
    dist.sample(rng)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn sample_respects_zero_mass() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert_eq!(sample(&[0.0, 1.0, 0.0], &mut rng), 1, "only index with mass");
        }
    }
}
