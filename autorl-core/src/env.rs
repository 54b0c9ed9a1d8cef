//! Environment interface.
use crate::{ActionSpace, Prng};
use ndarray::{Array1, Array2};

/// Output of one vectorized environment step.
#[derive(Clone, Debug)]
pub struct StepOutput {
    /// Observations after the step, one row per environment.
    pub obs: Array2<f32>,

    /// Rewards of the step.
    pub reward: Array1<f32>,

    /// Flags denoting if episodes ended on this step.
    pub done: Array1<i8>,
}

/// A batch of environments stepped in lockstep, as a pure function of state.
///
/// Implementations carry no interior mutability: `reset` and `step` take the
/// state by value and return the successor, so the caller owns the only copy
/// of the environment state at all times. Environments are expected to reset
/// an episode internally when it ends, while still reporting `done = 1` for
/// that step.
pub trait Env {
    /// Internal state of the environment batch.
    type State: Clone;

    /// Number of parallel environments.
    fn n_envs(&self) -> usize;

    /// Dimensionality of a single flattened observation.
    fn obs_dim(&self) -> usize;

    /// The action space of a single environment.
    fn action_space(&self) -> ActionSpace;

    /// Resets all environments.
    fn reset(&self, rng: &mut Prng) -> (Self::State, Array2<f32>);

    /// Steps all environments with one action per environment.
    fn step(
        &self,
        state: Self::State,
        action: &Array1<i64>,
        rng: &mut Prng,
    ) -> (Self::State, StepOutput);

    /// Draws a uniformly random action for a single environment.
    fn sample_action(&self, rng: &mut Prng) -> i64;
}
