//! Action selection during rollouts.
use autorl_core::{Env, Prng};
use candle_core::{shape::D, DType, Tensor};
use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Returns the greedy action of each row of action values.
pub fn greedy_actions(q_values: &Tensor) -> Array1<i64> {
    let ixs = q_values
        .argmax(D::Minus1)
        .unwrap()
        .to_dtype(DType::I64)
        .unwrap()
        .to_vec1::<i64>()
        .unwrap();
    Array1::from(ixs)
}

/// Epsilon-greedy explorer over action values.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Probability of acting randomly.
    pub epsilon: f32,
}

impl EpsilonGreedy {
    /// Constructs an epsilon-greedy explorer.
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    /// Takes one action per environment based on action values.
    ///
    /// A single uniform draw decides for the whole batch: below `epsilon`,
    /// every environment acts randomly through the environment's own action
    /// sampler; otherwise every environment acts greedily.
    pub fn action<E: Env>(&self, q_values: &Tensor, env: &E, rng: &mut Prng) -> Array1<i64> {
        let r = rng.gen::<f32>();
        if r < self.epsilon {
            Array1::from(
                (0..env.n_envs())
                    .map(|_| env.sample_action(rng))
                    .collect::<Vec<_>>(),
            )
        } else {
            greedy_actions(q_values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorl_core::dummy::CyclicEnv;
    use candle_core::Device;

    fn env(n_actions: usize) -> CyclicEnv {
        CyclicEnv {
            n_envs: 1,
            obs_dim: 2,
            n_actions,
            rewards: vec![0.],
            episode_len: 4,
        }
    }

    fn q_values() -> Tensor {
        // One row; action 2 has the largest value.
        Tensor::from_slice(&[0.1f32, -0.3, 0.9, 0.2], (1, 4), &Device::Cpu).unwrap()
    }

    #[test]
    fn zero_epsilon_always_acts_greedily() {
        let explorer = EpsilonGreedy::new(0.);
        let env = env(4);
        let mut rng = Prng::seed_from_u64(0);
        for _ in 0..100 {
            let a = explorer.action(&q_values(), &env, &mut rng);
            assert_eq!(a[0], 2);
        }
    }

    #[test]
    fn unit_epsilon_is_statistically_uniform() {
        let explorer = EpsilonGreedy::new(1.);
        let env = env(4);
        let mut rng = Prng::seed_from_u64(42);
        let n = 4000usize;
        let mut counts = [0usize; 4];
        for _ in 0..n {
            let a = explorer.action(&q_values(), &env, &mut rng);
            counts[a[0] as usize] += 1;
        }

        // Chi-square against the uniform distribution; 3 degrees of freedom,
        // critical value 11.34 at the 1% level.
        let expected = n as f64 / 4.;
        let chi2: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        assert!(chi2 < 11.34, "chi2 = {}, counts = {:?}", chi2, counts);
    }
}
