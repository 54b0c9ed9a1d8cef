//! Vectorized policy evaluation.
use crate::{Env, Prng};
use anyhow::Result;
use log::info;
use ndarray::{Array1, Array2};

/// Runs batches of environments to completion and collects episode returns.
///
/// Each batch steps all environments in lockstep until every one of them has
/// reported done. An environment that finishes early keeps being stepped so
/// the batch shape stays fixed, but its rewards no longer accumulate.
pub struct VecEvaluator {
    n_episodes: usize,
}

impl VecEvaluator {
    /// Constructs an evaluator collecting `n_episodes` episode returns.
    pub fn new(n_episodes: usize) -> Self {
        Self { n_episodes }
    }

    /// Evaluates `policy`, returning exactly `n_episodes` episode returns.
    ///
    /// Runs `ceil(n_episodes / n_envs)` batches and truncates the
    /// concatenated returns to the requested count.
    pub fn evaluate<E, F>(&self, env: &E, rng: &mut Prng, mut policy: F) -> Result<Vec<f32>>
    where
        E: Env,
        F: FnMut(&Array2<f32>, &mut Prng) -> Array1<i64>,
    {
        let n_envs = env.n_envs();
        let n_batches = (self.n_episodes + n_envs - 1) / n_envs;
        info!(
            "evaluating {} episodes in {} batches of {} environments",
            self.n_episodes, n_batches, n_envs
        );
        let mut rewards = Vec::with_capacity(n_batches * n_envs);

        for _ in 0..n_batches {
            let mut episode_rng = rng.split();
            let (mut state, mut obs) = env.reset(&mut episode_rng);
            let mut acc = vec![0f32; n_envs];
            let mut done = vec![0i8; n_envs];

            while done.iter().any(|d| *d == 0) {
                let mut action_rng = episode_rng.split();
                let action = policy(&obs, &mut action_rng);
                let mut step_rng = episode_rng.split();
                let (next_state, out) = env.step(state, &action, &mut step_rng);

                // Rewards only count for environments that were not yet done.
                for i in 0..n_envs {
                    if done[i] == 0 {
                        acc[i] += out.reward[i];
                    }
                    done[i] |= out.done[i];
                }

                state = next_state;
                obs = out.obs;
            }

            rewards.extend_from_slice(&acc);
        }

        rewards.truncate(self.n_episodes);
        Ok(rewards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::StaggeredEnv;
    use ndarray::Array1;

    fn zero_policy(obs: &Array2<f32>, _rng: &mut Prng) -> Array1<i64> {
        Array1::zeros(obs.nrows())
    }

    #[test]
    fn finished_env_stops_accumulating() {
        // Env 0 is done after step 2, env 1 after step 4; every step pays 1.
        // Env 0 must not collect the rewards of steps 3 and 4.
        let env = StaggeredEnv {
            n_envs: 2,
            obs_dim: 3,
            n_actions: 2,
            done_at: vec![2, 4],
            reward: 1.,
        };
        let mut rng = Prng::seed_from_u64(0);
        let rewards = VecEvaluator::new(2)
            .evaluate(&env, &mut rng, zero_policy)
            .unwrap();
        assert_eq!(rewards, vec![2., 4.]);
    }

    #[test]
    fn batches_are_concatenated_and_truncated() {
        let env = StaggeredEnv {
            n_envs: 2,
            obs_dim: 1,
            n_actions: 2,
            done_at: vec![1, 3],
            reward: 2.,
        };
        let mut rng = Prng::seed_from_u64(0);
        // 3 episodes with 2 envs: two batches, 4 returns, truncated to 3.
        let rewards = VecEvaluator::new(3)
            .evaluate(&env, &mut rng, zero_policy)
            .unwrap();
        assert_eq!(rewards, vec![2., 6., 2.]);
    }
}
