use crate::{
    mlp::{Mlp, MlpConfig},
    model::SubModel,
    opt::{Optimizer, OptimizerConfig},
    util::polyak_update,
};
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use std::path::Path;

/// Action-value network with its variables and optimizer.
///
/// The online and target parameter sets of the agent are two instances of
/// this struct; [`QModel::clone`] creates a fresh `VarMap` holding a copy of
/// the source variables, which is how the target set is created.
pub struct QModel {
    device: Device,
    varmap: VarMap,
    mlp_config: MlpConfig,
    opt_config: OptimizerConfig,
    q: Mlp,
    opt: Optimizer,
}

impl QModel {
    /// Constructs [`QModel`].
    pub fn build(mlp_config: MlpConfig, opt_config: OptimizerConfig, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Mlp::build(vb, mlp_config.clone())
        };

        Self::_build(device, mlp_config, opt_config, q, varmap, None)
    }

    fn _build(
        device: Device,
        mlp_config: MlpConfig,
        opt_config: OptimizerConfig,
        q: Mlp,
        varmap: VarMap,
        varmap_src: Option<&VarMap>,
    ) -> Result<Self> {
        if let Some(varmap_src) = varmap_src {
            // Hard copy of the source variables into the fresh map.
            polyak_update(&varmap, varmap_src, 1.0)?;
        }

        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            mlp_config,
            opt_config,
            q,
            opt,
        })
    }

    /// Outputs the action values of a batch of observations.
    pub fn forward(&self, obs: &Tensor) -> Tensor {
        self.q.forward(obs)
    }

    /// Computes gradients of `loss` and applies one optimization step.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Applies one optimization step from precomputed gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// The variables of this network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Device the variables live on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Saves the variables to a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save q-model to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the variables from a safetensors file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load q-model from {:?}", path.as_ref());
        Ok(())
    }
}

impl Clone for QModel {
    fn clone(&self) -> Self {
        let device = self.device.clone();
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Mlp::build(vb, self.mlp_config.clone())
        };

        Self::_build(
            device,
            self.mlp_config.clone(),
            self.opt_config.clone(),
            q,
            varmap,
            Some(&self.varmap),
        )
        .unwrap()
    }
}
