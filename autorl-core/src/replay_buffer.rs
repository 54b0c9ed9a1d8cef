//! Prioritized replay of environment transitions.
mod base;
mod config;
pub use base::{BufferState, PrioritisedReplayBuffer, SampledBatch};
pub use config::ReplayBufferConfig;
