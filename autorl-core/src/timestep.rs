//! Environment transitions.
use ndarray::{Array1, Array2};

/// One batch of transitions, one row per parallel environment.
///
/// Produced by each environment step and consumed immediately by the replay
/// buffer; never mutated after construction.
#[derive(Clone, Debug)]
pub struct TimeStep {
    /// Observation the action was taken from.
    pub last_obs: Array2<f32>,

    /// Observation after the step.
    pub obs: Array2<f32>,

    /// Index of the taken action.
    pub action: Array1<i64>,

    /// Immediate reward.
    pub reward: Array1<f32>,

    /// Flag denoting if the episode ended on this step.
    pub done: Array1<i8>,
}

impl TimeStep {
    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
