//! Algorithm interface.
use crate::{
    config_space::{Config, ConfigSpace},
    Prng, TimeStep,
};
use anyhow::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Options of a training run that are not tunable hyperparameters.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AlgorithmOptions {
    /// Number of parallel environments.
    pub n_envs: usize,

    /// Total environment steps consumed by one `train` call.
    pub n_total_timesteps: usize,

    /// Episodes of the greedy evaluation run at the end of `train`.
    pub n_eval_episodes: usize,
}

impl Default for AlgorithmOptions {
    fn default() -> Self {
        Self {
            n_envs: 1,
            n_total_timesteps: 100_000,
            n_eval_episodes: 10,
        }
    }
}

impl AlgorithmOptions {
    /// Sets the number of parallel environments.
    pub fn n_envs(mut self, v: usize) -> Self {
        self.n_envs = v;
        self
    }

    /// Sets the total number of environment steps.
    pub fn n_total_timesteps(mut self, v: usize) -> Self {
        self.n_total_timesteps = v;
        self
    }

    /// Sets the number of final evaluation episodes.
    pub fn n_eval_episodes(mut self, v: usize) -> Self {
        self.n_eval_episodes = v;
        self
    }
}

/// Metrics of one outer training iteration, kept when tracking is enabled.
#[derive(Clone, Debug)]
pub struct IterationMetrics {
    /// Scalar regression loss; zero when the update gate was closed.
    pub loss: f32,

    /// Predicted action values of the update batch.
    pub q_pred: Array1<f32>,

    /// TD error of each rollout step, `train_frequency` rows of `n_envs`.
    pub td_error: Array2<f32>,
}

/// Output of a `train` call.
#[derive(Clone, Debug, Default)]
pub struct TrainResult {
    /// Episode returns of the final greedy evaluation.
    pub eval_rewards: Vec<f32>,

    /// Per-iteration metrics, when metric tracking is enabled.
    pub metrics: Option<Vec<IterationMetrics>>,

    /// Raw rollout transitions, when trajectory tracking is enabled.
    pub trajectories: Option<Vec<TimeStep>>,
}

/// A trainable, tunable reinforcement learning algorithm.
///
/// State is threaded, never shared: `init` creates the runner and buffer
/// states, `train` consumes them and returns the successors. An
/// implementation holds only immutable configuration; dropping the returned
/// states discards all training progress.
pub trait Algorithm {
    /// Complete snapshot of training progress.
    type RunnerState;

    /// Replay storage threaded alongside the runner state.
    type BufferState;

    /// The tunable hyperparameter space.
    fn hpo_config_space() -> ConfigSpace;

    /// Default configuration of the hyperparameter space.
    fn default_hpo_config() -> Config;

    /// The architecture search space.
    fn nas_config_space() -> ConfigSpace;

    /// Default configuration of the architecture space.
    fn default_nas_config() -> Config;

    /// Creates the initial runner and buffer states.
    fn init(&self, rng: Prng) -> Result<(Self::RunnerState, Self::BufferState)>;

    /// Runs the configured number of timesteps and returns the new states.
    fn train(
        &self,
        runner_state: Self::RunnerState,
        buffer_state: Self::BufferState,
    ) -> Result<((Self::RunnerState, Self::BufferState), TrainResult)>;

    /// Greedy action selection for a batch of observations.
    fn predict(
        &self,
        runner_state: &Self::RunnerState,
        obs: &Array2<f32>,
        rng: &mut Prng,
    ) -> Array1<i64>;

    /// Runs `n_episodes` greedy evaluation episodes.
    fn eval(
        &self,
        runner_state: &Self::RunnerState,
        n_episodes: usize,
        rng: &mut Prng,
    ) -> Result<Vec<f32>>;
}
