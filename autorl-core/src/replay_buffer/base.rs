//! Flat circular transition store with per-slot priorities.
use super::ReplayBufferConfig;
use crate::{Prng, TimeStep};
use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

/// Storage and bookkeeping of the circular transition store.
///
/// A value type: every buffer operation consumes a state and returns the
/// successor. The priority array always has `capacity` entries; only the
/// first [`BufferState::len`] slots have been written.
#[derive(Clone, Debug)]
pub struct BufferState {
    last_obs: Array2<f32>,
    obs: Array2<f32>,
    action: Vec<i64>,
    reward: Vec<f32>,
    done: Vec<i8>,
    priority: Vec<f32>,
    current_index: usize,
    size: usize,
}

impl BufferState {
    /// Slot the next write will start at.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Number of slots written so far, saturating at capacity.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` before the first write.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Stored priority of a slot.
    pub fn priority(&self, ix: usize) -> f32 {
        self.priority[ix]
    }

    fn max_priority(&self) -> f32 {
        self.priority[..self.size].iter().fold(1f32, |m, p| m.max(*p))
    }
}

/// A batch drawn from the buffer, paired with the slots it came from.
pub struct SampledBatch {
    /// The sampled transitions.
    pub batch: TimeStep,

    /// Buffer slot of each transition, for priority updates.
    pub indices: Vec<usize>,
}

/// Fixed-capacity prioritized experience replay over flat storage.
///
/// The protocol object itself is stateless; all storage lives in
/// [`BufferState`] values threaded through [`init`](Self::init),
/// [`add`](Self::add), [`sample`](Self::sample) and
/// [`set_priorities`](Self::set_priorities).
pub struct PrioritisedReplayBuffer {
    config: ReplayBufferConfig,
}

impl PrioritisedReplayBuffer {
    /// Constructs the protocol object.
    pub fn new(config: ReplayBufferConfig) -> Self {
        Self { config }
    }

    /// The configuration this buffer was built with.
    pub fn config(&self) -> &ReplayBufferConfig {
        &self.config
    }

    /// Allocates storage, pre-filled by broadcasting the first row of
    /// `timestep`. The returned state has length zero: the pre-fill only
    /// fixes shapes, it is never sampled.
    pub fn init(&self, timestep: &TimeStep) -> BufferState {
        let capacity = self.config.capacity;
        let obs_dim = timestep.obs.ncols();
        let mut last_obs = Array2::zeros((capacity, obs_dim));
        let mut obs = Array2::zeros((capacity, obs_dim));
        for j in 0..capacity {
            last_obs.row_mut(j).assign(&timestep.last_obs.row(0));
            obs.row_mut(j).assign(&timestep.obs.row(0));
        }

        BufferState {
            last_obs,
            obs,
            action: vec![timestep.action[0]; capacity],
            reward: vec![timestep.reward[0]; capacity],
            done: vec![timestep.done[0]; capacity],
            priority: vec![0.; capacity],
            current_index: 0,
            size: 0,
        }
    }

    /// Writes a batch of transitions starting at the current index, wrapping
    /// circularly, and advances the index by the batch length. Newly written
    /// slots get the current maximum priority until
    /// [`set_priorities`](Self::set_priorities) overwrites it.
    pub fn add(&self, mut state: BufferState, timestep: &TimeStep) -> BufferState {
        let capacity = self.config.capacity;
        let len = timestep.len();
        let max_p = state.max_priority();

        let mut j = state.current_index;
        for r in 0..len {
            state.last_obs.row_mut(j).assign(&timestep.last_obs.row(r));
            state.obs.row_mut(j).assign(&timestep.obs.row(r));
            state.action[j] = timestep.action[r];
            state.reward[j] = timestep.reward[r];
            state.done[j] = timestep.done[r];
            state.priority[j] = max_p;
            j += 1;
            if j == capacity {
                j = 0;
            }
        }

        state.current_index = (state.current_index + len) % capacity;
        state.size += len;
        if state.size >= capacity {
            state.size = capacity;
        }

        state
    }

    /// Overwrites the priority of previously written slots.
    pub fn set_priorities(
        &self,
        mut state: BufferState,
        indices: &[usize],
        priorities: &[f32],
    ) -> BufferState {
        for (&ix, &p) in indices.iter().zip(priorities.iter()) {
            state.priority[ix] = p;
        }
        state
    }

    /// Draws `batch_size` transitions, with replacement.
    ///
    /// Indices are drawn with probability proportional to
    /// `priority^priority_exponent` over the written slots, or uniformly when
    /// priority sampling is disabled. The caller must gate on a warm-up
    /// threshold; sampling fewer written slots than the batch size is an
    /// error.
    pub fn sample(&self, state: &BufferState, rng: &mut Prng) -> Result<SampledBatch> {
        let batch_size = self.config.batch_size;
        ensure!(
            state.size >= batch_size,
            "replay buffer holds {} transitions, batch size is {}",
            state.size,
            batch_size
        );

        let ixs = if self.config.prio_sampling {
            let weights = state.priority[..state.size]
                .iter()
                .map(|p| p.powf(self.config.priority_exponent))
                .collect::<Vec<_>>();
            let dist = WeightedIndex::new(&weights)?;
            (0..batch_size).map(|_| dist.sample(rng)).collect::<Vec<_>>()
        } else {
            (0..batch_size)
                .map(|_| rng.gen_range(0..state.size))
                .collect::<Vec<_>>()
        };

        let batch = TimeStep {
            last_obs: state.last_obs.select(Axis(0), &ixs),
            obs: state.obs.select(Axis(0), &ixs),
            action: Array1::from(ixs.iter().map(|&ix| state.action[ix]).collect::<Vec<_>>()),
            reward: Array1::from(ixs.iter().map(|&ix| state.reward[ix]).collect::<Vec<_>>()),
            done: Array1::from(ixs.iter().map(|&ix| state.done[ix]).collect::<Vec<_>>()),
        };

        Ok(SampledBatch { batch, indices: ixs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn timestep(n: usize, base: f32) -> TimeStep {
        let last_obs =
            Array2::from_shape_fn((n, 2), |(i, j)| base + 10. * i as f32 + j as f32);
        let obs = &last_obs + 100.;
        TimeStep {
            last_obs,
            obs,
            action: Array1::from((0..n).map(|i| i as i64).collect::<Vec<_>>()),
            reward: Array1::from((0..n).map(|i| base + i as f32).collect::<Vec<_>>()),
            done: Array1::zeros(n),
        }
    }

    fn buffer(capacity: usize, batch_size: usize, prio: bool) -> PrioritisedReplayBuffer {
        PrioritisedReplayBuffer::new(
            ReplayBufferConfig::default()
                .capacity(capacity)
                .batch_size(batch_size)
                .priority_exponent(1.0)
                .prio_sampling(prio),
        )
    }

    #[test]
    fn init_broadcasts_shapes_and_starts_empty() {
        let buf = buffer(8, 2, true);
        let state = buf.init(&timestep(3, 1.));
        assert_eq!(state.len(), 0);
        assert_eq!(state.current_index(), 0);
        for j in 0..8 {
            assert_eq!(state.last_obs.row(j), arr1(&[1., 2.]));
            assert_eq!(state.obs.row(j), arr1(&[101., 102.]));
        }
    }

    #[test]
    fn add_wraps_circularly() {
        let buf = buffer(4, 2, true);
        let state = buf.init(&timestep(3, 0.));
        let state = buf.add(state, &timestep(3, 0.));
        assert_eq!(state.current_index(), 3);
        assert_eq!(state.len(), 3);

        let state = buf.add(state, &timestep(3, 50.));
        assert_eq!(state.current_index(), 2);
        assert_eq!(state.len(), 4);

        // slot 3 holds row 0 of the second batch, slots 0..2 rows 1 and 2
        assert_eq!(state.reward[3], 50.);
        assert_eq!(state.reward[0], 51.);
        assert_eq!(state.reward[1], 52.);
        assert_eq!(state.obs.row(0), arr1(&[160., 161.]));
    }

    #[test]
    fn set_priorities_overwrites_exact_slots() {
        let buf = buffer(4, 2, true);
        let state = buf.add(buf.init(&timestep(2, 0.)), &timestep(2, 0.));
        let state = buf.set_priorities(state, &[0, 1], &[0.25, 4.0]);
        assert_eq!(state.priority(0), 0.25);
        assert_eq!(state.priority(1), 4.0);
    }

    #[test]
    fn new_slots_inherit_max_priority() {
        let buf = buffer(8, 2, true);
        let state = buf.add(buf.init(&timestep(2, 0.)), &timestep(2, 0.));
        let state = buf.set_priorities(state, &[0, 1], &[0.5, 3.0]);
        let state = buf.add(state, &timestep(2, 0.));
        assert_eq!(state.priority(2), 3.0);
        assert_eq!(state.priority(3), 3.0);
    }

    #[test]
    fn uniform_sample_stays_in_written_slots() {
        let buf = buffer(16, 8, false);
        let state = buf.add(buf.init(&timestep(4, 0.)), &timestep(4, 0.));
        let mut rng = Prng::seed_from_u64(3);
        let sampled = buf.sample(&state, &mut rng).unwrap();
        assert_eq!(sampled.indices.len(), 8);
        assert!(sampled.indices.iter().all(|&ix| ix < 4));
        assert_eq!(sampled.batch.len(), 8);
    }

    #[test]
    fn prioritized_sample_prefers_heavy_slots() {
        let buf = buffer(16, 64, true);
        let state = buf.add(buf.init(&timestep(4, 0.)), &timestep(4, 0.));
        let state = buf.set_priorities(state, &[0, 1, 2, 3], &[1e-6, 1e-6, 1e-6, 1.0]);
        let mut rng = Prng::seed_from_u64(11);
        let sampled = buf.sample(&state, &mut rng).unwrap();
        let heavy = sampled.indices.iter().filter(|&&ix| ix == 3).count();
        assert!(heavy > 56, "heavy slot drawn {} of 64 times", heavy);
    }

    #[test]
    fn sample_rejects_underfilled_buffer() {
        let buf = buffer(16, 8, true);
        let state = buf.add(buf.init(&timestep(4, 0.)), &timestep(4, 0.));
        let mut rng = Prng::seed_from_u64(0);
        assert!(buf.sample(&state, &mut rng).is_err());
    }
}
