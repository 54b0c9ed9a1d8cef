//! Configuration of the replay buffer.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`PrioritisedReplayBuffer`](super::PrioritisedReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions. Writes wrap around once full.
    pub capacity: usize,

    /// Number of transitions per sampled batch. Must not exceed `capacity`.
    pub batch_size: usize,

    /// Exponent applied to stored priorities when sampling.
    pub priority_exponent: f32,

    /// If `false`, indices are drawn uniformly instead of by priority.
    pub prio_sampling: bool,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            batch_size: 64,
            priority_exponent: 0.9,
            prio_sampling: true,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the buffer.
    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }

    /// Sets the sampled batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the sampling exponent.
    pub fn priority_exponent(mut self, v: f32) -> Self {
        self.priority_exponent = v;
        self
    }

    /// Enables or disables priority-weighted sampling.
    pub fn prio_sampling(mut self, v: bool) -> Self {
        self.prio_sampling = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
