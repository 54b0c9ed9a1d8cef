use crate::{util::OutDim, Activation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    pub(super) activation: Activation,
}

impl MlpConfig {
    /// Creates configuration of an MLP.
    ///
    /// `activation` is applied after every hidden layer; the output layer is
    /// linear.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize, activation: Activation) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation,
        }
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}
