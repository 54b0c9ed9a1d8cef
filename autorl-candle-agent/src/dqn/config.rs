use crate::{Activation, Device};
use anyhow::Result;
use autorl_core::{config_space::Config, error::AutorlError};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Dqn`](super::Dqn), extracted once from the
/// hyperparameter and architecture mappings.
pub struct DqnConfig {
    /// Capacity of the replay buffer.
    pub buffer_size: usize,

    /// Size of sampled transition batches.
    pub buffer_batch_size: usize,

    /// Priority-weighted sampling; uniform when `false`.
    pub buffer_prio_sampling: bool,

    /// Exponent of the priority update formula.
    pub buffer_alpha: f32,

    /// Floor added to the absolute TD error before exponentiation.
    pub buffer_epsilon: f32,

    /// Exponent applied to stored priorities when sampling.
    pub priority_exponent: f32,

    /// Learning rate of the optimizer.
    pub lr: f64,

    /// Discount factor.
    pub gamma: f32,

    /// Soft-update factor of the target network; `1.0` is a hard copy.
    pub tau: f64,

    /// Exploration rate of the behavior policy.
    pub epsilon: f32,

    /// Computes bootstrap targets with the target network when `true`,
    /// with the online network otherwise.
    pub use_target_network: bool,

    /// Environment steps per rollout; also the update-gate modulus.
    pub train_frequency: usize,

    /// Steps before any gradient update or target sync is permitted.
    pub learning_starts: usize,

    /// Target-sync gate modulus in environment steps.
    pub target_network_update_freq: usize,

    /// Hidden activation of the value network.
    pub activation: Activation,

    /// Width of the value network's hidden layers.
    pub hidden_size: usize,

    /// Device the networks live on.
    pub device: Device,
}

impl DqnConfig {
    /// Reads the named keys of the hyperparameter and architecture mappings.
    ///
    /// The sampling exponent is taken from `buffer_beta` when present and
    /// defaults to `1.0` otherwise.
    pub fn from_configs(hpo: &Config, nas: &Config) -> Result<Self, AutorlError> {
        let priority_exponent = if hpo.contains("buffer_beta") {
            hpo.float("buffer_beta")? as f32
        } else {
            1.0
        };

        let activation = match nas.str("activation")? {
            "tanh" => Activation::Tanh,
            "relu" => Activation::Relu,
            _ => return Err(AutorlError::BadHyperparameter("activation".into())),
        };

        Ok(Self {
            buffer_size: hpo.int("buffer_size")? as usize,
            buffer_batch_size: hpo.int("buffer_batch_size")? as usize,
            buffer_prio_sampling: hpo.bool("buffer_prio_sampling")?,
            buffer_alpha: hpo.float("buffer_alpha")? as f32,
            buffer_epsilon: hpo.float("buffer_epsilon")? as f32,
            priority_exponent,
            lr: hpo.float("lr")?,
            gamma: hpo.float("gamma")? as f32,
            tau: hpo.float("tau")?,
            epsilon: hpo.float("epsilon")? as f32,
            use_target_network: hpo.bool("use_target_network")?,
            train_frequency: hpo.int("train_frequency")? as usize,
            learning_starts: hpo.int("learning_starts")? as usize,
            target_network_update_freq: hpo.int("target_network_update_freq")? as usize,
            activation,
            hidden_size: nas.int("hidden_size")? as usize,
            device: Device::Cpu,
        })
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Sets the exploration rate.
    pub fn epsilon(mut self, v: f32) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the warm-up threshold.
    pub fn learning_starts(mut self, v: usize) -> Self {
        self.learning_starts = v;
        self
    }

    /// Constructs [`DqnConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
