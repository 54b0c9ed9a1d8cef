//! Multilayer perceptron.
mod base;
mod config;
use crate::Activation;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::MlpConfig;

fn mlp_forward(xs: Tensor, layers: &[Linear], activation: Activation) -> Tensor {
    let n_layers = layers.len();
    let mut xs = xs;

    for layer in layers.iter().take(n_layers - 1) {
        xs = activation.forward(&layer.forward(&xs).unwrap());
    }

    layers[n_layers - 1].forward(&xs).unwrap()
}
