//! Deterministic stub environments, used by tests.
use crate::{ActionSpace, Env, Prng, StepOutput};
use ndarray::{Array1, Array2};
use rand::Rng;

/// Environment batch that pays a fixed reward sequence and terminates every
/// episode after a fixed number of steps, resetting the episode internally.
///
/// The observation of step `t` is `t` broadcast over all observation
/// dimensions, so rollouts are fully reproducible without any randomness.
pub struct CyclicEnv {
    /// Number of parallel environments.
    pub n_envs: usize,
    /// Observation dimensionality.
    pub obs_dim: usize,
    /// Number of discrete actions.
    pub n_actions: usize,
    /// Reward of step `t` is `rewards[(t - 1) % rewards.len()]`.
    pub rewards: Vec<f32>,
    /// Episodes end on this step.
    pub episode_len: usize,
}

impl CyclicEnv {
    fn observe(&self, counters: &[usize]) -> Array2<f32> {
        Array2::from_shape_fn((self.n_envs, self.obs_dim), |(i, _)| counters[i] as f32)
    }
}

impl Env for CyclicEnv {
    type State = Vec<usize>;

    fn n_envs(&self) -> usize {
        self.n_envs
    }

    fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(self.n_actions)
    }

    fn reset(&self, _rng: &mut Prng) -> (Self::State, Array2<f32>) {
        let counters = vec![0; self.n_envs];
        let obs = self.observe(&counters);
        (counters, obs)
    }

    fn step(
        &self,
        state: Self::State,
        _action: &Array1<i64>,
        _rng: &mut Prng,
    ) -> (Self::State, StepOutput) {
        let mut counters = state;
        let mut reward = Array1::zeros(self.n_envs);
        let mut done = Array1::zeros(self.n_envs);
        for i in 0..self.n_envs {
            let t = counters[i] + 1;
            reward[i] = self.rewards[(t - 1) % self.rewards.len()];
            if t == self.episode_len {
                done[i] = 1;
                counters[i] = 0;
            } else {
                counters[i] = t;
            }
        }
        let obs = self.observe(&counters);
        (counters, StepOutput { obs, reward, done })
    }

    fn sample_action(&self, rng: &mut Prng) -> i64 {
        rng.gen_range(0..self.n_actions as i64)
    }
}

/// Environment batch whose members finish at different steps while rewards
/// keep flowing, for testing reward masking. Does not reset internally.
pub struct StaggeredEnv {
    /// Number of parallel environments.
    pub n_envs: usize,
    /// Observation dimensionality.
    pub obs_dim: usize,
    /// Number of discrete actions.
    pub n_actions: usize,
    /// Environment `i` reports done from step `done_at[i]` on.
    pub done_at: Vec<usize>,
    /// Reward paid by every environment on every step, done or not.
    pub reward: f32,
}

impl Env for StaggeredEnv {
    type State = usize;

    fn n_envs(&self) -> usize {
        self.n_envs
    }

    fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(self.n_actions)
    }

    fn reset(&self, _rng: &mut Prng) -> (Self::State, Array2<f32>) {
        (0, Array2::zeros((self.n_envs, self.obs_dim)))
    }

    fn step(
        &self,
        state: Self::State,
        _action: &Array1<i64>,
        _rng: &mut Prng,
    ) -> (Self::State, StepOutput) {
        let t = state + 1;
        let obs = Array2::from_elem((self.n_envs, self.obs_dim), t as f32);
        let reward = Array1::from_elem(self.n_envs, self.reward);
        let done = Array1::from_shape_fn(self.n_envs, |i| (t >= self.done_at[i]) as i8);
        (t, StepOutput { obs, reward, done })
    }

    fn sample_action(&self, rng: &mut Prng) -> i64 {
        rng.gen_range(0..self.n_actions as i64)
    }
}
