//! Action space classification.
use serde::{Deserialize, Serialize};

/// The action space of a single environment in a batch.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum ActionSpace {
    /// A finite set of `n` actions, indexed `0..n`.
    Discrete(usize),

    /// A continuous box with the given shape.
    Box(Vec<usize>),
}

impl ActionSpace {
    /// Returns the number of actions for discrete spaces.
    pub fn n_actions(&self) -> Option<usize> {
        match self {
            Self::Discrete(n) => Some(*n),
            Self::Box(_) => None,
        }
    }

    /// Returns `true` for discrete spaces.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Discrete(_))
    }
}
