use super::{mlp_forward, MlpConfig};
use crate::model::SubModel;
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{linear, Linear, VarBuilder};

/// Returns the linear modules of an [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut in_out_pairs: Vec<(usize, usize)> = (0..config.units.len() - 1)
        .map(|i| (config.units[i], config.units[i + 1]))
        .collect();
    in_out_pairs.insert(0, (config.in_dim, config.units[0]));
    in_out_pairs.push((*config.units.last().unwrap(), config.out_dim));
    let vs = vs.pp(prefix);

    Ok(in_out_pairs
        .iter()
        .enumerate()
        .map(|(i, &(in_dim, out_dim))| linear(in_dim, out_dim, vs.pp(format!("ln{}", i))).unwrap())
        .collect())
}

/// Multilayer perceptron with a configurable hidden activation.
pub struct Mlp {
    config: MlpConfig,
    layers: Vec<Linear>,
}

impl SubModel for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Tensor {
        mlp_forward(xs.clone(), &self.layers, self.config.activation)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        let layers = create_linear_layers("mlp", vs, &config).unwrap();

        Mlp { config, layers }
    }
}
