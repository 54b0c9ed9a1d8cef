//! DQN learner and its training state machine.
use super::{
    config::DqnConfig,
    explorer::{greedy_actions, EpsilonGreedy},
    model::QModel,
};
use crate::{
    mlp::MlpConfig,
    opt::OptimizerConfig,
    util::{actions_to_tensor, array2_to_tensor, param_vector, polyak_update, seed_varmap,
        vec_to_tensor},
};
use anyhow::Result;
use autorl_core::{
    config_space::{Config, ConfigSpace, Domain, ParamValue},
    error::AutorlError,
    replay_buffer::{BufferState, PrioritisedReplayBuffer, ReplayBufferConfig},
    ActionSpace, Algorithm, AlgorithmOptions, Env, IterationMetrics, Prng, TimeStep,
    TrainResult, VecEvaluator,
};
use candle_core::{backprop::GradStore, shape::D, Device, Tensor};
use candle_nn::loss::mse;
use log::{info, trace};
use ndarray::{Array1, Array2};
use std::{fs, path::Path};

/// Online and target parameter sets with the optimizer state.
///
/// Owned by the runner state and replaced, never shared, on each update.
pub struct DqnTrainState {
    qnet: QModel,
    qnet_tgt: QModel,
    n_updates: usize,
}

impl DqnTrainState {
    /// Number of gradient updates applied so far.
    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    /// Flattened online parameters, in variable-name order.
    pub fn online_params(&self) -> Vec<f32> {
        param_vector(self.qnet.varmap())
    }

    /// Flattened target parameters, in variable-name order.
    pub fn target_params(&self) -> Vec<f32> {
        param_vector(self.qnet_tgt.varmap())
    }
}

/// Complete snapshot of training progress.
///
/// Threaded by value through every call; holding an old snapshot after an
/// operation returned a new one gives stale training progress, not aliasing.
pub struct DqnRunnerState<E: Env> {
    /// Random stream of the run.
    pub rng: Prng,

    /// Parameters and optimizer state.
    pub train_state: DqnTrainState,

    /// State of the vectorized environment.
    pub env_state: E::State,

    /// Observation the next action will be taken from.
    pub last_obs: Array2<f32>,

    /// Environment steps taken so far, summed over parallel environments.
    pub global_step: usize,
}

struct RolloutTrace {
    transitions: Vec<TimeStep>,
}

/// DQN over a vectorized environment with prioritized replay.
///
/// Only discrete action spaces are supported; construction fails on anything
/// else.
pub struct Dqn<E: Env> {
    config: DqnConfig,
    options: AlgorithmOptions,
    env: E,
    buffer: PrioritisedReplayBuffer,
    n_actions: usize,
    track_metrics: bool,
    track_trajectories: bool,
    device: Device,
}

impl<E: Env> Dqn<E> {
    /// Constructs the agent, checking the environment's action space.
    pub fn new(config: DqnConfig, options: AlgorithmOptions, env: E) -> Result<Self> {
        let n_actions = match env.action_space() {
            ActionSpace::Discrete(n) => n,
            space => {
                return Err(AutorlError::UnsupportedActionSpace(format!(
                    "{:?}, only discrete action spaces are supported",
                    space
                ))
                .into())
            }
        };

        let buffer = PrioritisedReplayBuffer::new(
            ReplayBufferConfig::default()
                .capacity(config.buffer_size)
                .batch_size(config.buffer_batch_size)
                .priority_exponent(config.priority_exponent)
                .prio_sampling(config.buffer_prio_sampling),
        );

        let device: Device = config.device.into();

        Ok(Self {
            config,
            options,
            env,
            buffer,
            n_actions,
            track_metrics: false,
            track_trajectories: false,
            device,
        })
    }

    /// Keeps per-iteration loss, TD error and predicted values in the train
    /// output.
    pub fn track_metrics(mut self, v: bool) -> Self {
        self.track_metrics = v;
        self
    }

    /// Keeps raw rollout transitions in the train output.
    pub fn track_trajectories(mut self, v: bool) -> Self {
        self.track_trajectories = v;
        self
    }

    /// The environment this agent trains on.
    pub fn env(&self) -> &E {
        &self.env
    }

    fn mlp_config(&self) -> MlpConfig {
        MlpConfig::new(
            self.env.obs_dim(),
            vec![self.config.hidden_size, self.config.hidden_size],
            self.n_actions,
            self.config.activation,
        )
    }

    fn q_values(&self, qnet: &QModel, obs: &Array2<f32>) -> Result<Tensor> {
        let obs = array2_to_tensor(obs, &self.device)?;
        Ok(qnet.forward(&obs))
    }

    /// Priority of a transition with the given TD error.
    fn priority_weight(&self, td_error: f32) -> f32 {
        (td_error.abs() + self.config.buffer_epsilon).powf(self.config.buffer_alpha)
    }

    /// TD error of a transition batch against the current parameters.
    fn td_errors(
        &self,
        train_state: &DqnTrainState,
        last_obs: &Array2<f32>,
        action: &Array1<i64>,
        out_obs: &Array2<f32>,
        reward: &Array1<f32>,
        done: &Array1<i8>,
    ) -> Result<Vec<f32>> {
        let bootstrap_net = if self.config.use_target_network {
            &train_state.qnet_tgt
        } else {
            &train_state.qnet
        };
        let q_next = self
            .q_values(bootstrap_net, out_obs)?
            .max(D::Minus1)?
            .to_vec1::<f32>()?;
        let q_taken = {
            let q = self.q_values(&train_state.qnet, last_obs)?;
            let act = actions_to_tensor(action, &self.device)?;
            q.gather(&act, D::Minus1)?
                .squeeze(D::Minus1)?
                .to_vec1::<f32>()?
        };

        Ok((0..reward.len())
            .map(|i| {
                reward[i] + (1 - done[i]) as f32 * self.config.gamma * q_next[i] - q_taken[i]
            })
            .collect())
    }

    /// One gradient step on a sampled batch.
    ///
    /// Returns the new train state, the scalar loss, the predicted values of
    /// the batch before the step, and the gradients.
    fn update(
        &self,
        mut train_state: DqnTrainState,
        batch: &TimeStep,
    ) -> Result<(DqnTrainState, f32, Vec<f32>, GradStore)> {
        let bootstrap_net = if self.config.use_target_network {
            &train_state.qnet_tgt
        } else {
            &train_state.qnet
        };
        let q_next = self.q_values(bootstrap_net, &batch.obs)?.max(D::Minus1)?;
        let reward = vec_to_tensor(batch.reward.as_slice().unwrap(), &self.device)?;
        let not_done = {
            let v = batch.done.iter().map(|d| (1 - d) as f32).collect::<Vec<_>>();
            vec_to_tensor(&v, &self.device)?
        };
        let tgt = (reward + (not_done * (q_next * self.config.gamma as f64)?)?)?.detach();

        let pred = {
            let q = self.q_values(&train_state.qnet, &batch.last_obs)?;
            let act = actions_to_tensor(&batch.action, &self.device)?;
            q.gather(&act, D::Minus1)?.squeeze(D::Minus1)?
        };
        let q_pred = pred.to_vec1::<f32>()?;

        let loss = mse(&pred, &tgt)?;
        let grads = loss.backward()?;
        train_state.qnet.step(&grads)?;
        train_state.n_updates += 1;

        let loss = loss.to_scalar::<f32>()?;
        trace!("update {}: loss = {}", train_state.n_updates, loss);

        Ok((train_state, loss, q_pred, grads))
    }

    /// Rolls out `train_frequency` environment steps, writing each transition
    /// and its priority, then evaluates the update and target-sync gates on
    /// the advanced step counter.
    fn update_step(
        &self,
        runner_state: DqnRunnerState<E>,
        buffer_state: BufferState,
    ) -> Result<((DqnRunnerState<E>, BufferState), IterationMetrics, RolloutTrace)> {
        let DqnRunnerState {
            mut rng,
            mut train_state,
            mut env_state,
            mut last_obs,
            mut global_step,
        } = runner_state;
        let mut buffer_state = buffer_state;

        let n_envs = self.env.n_envs();
        let capacity = self.buffer.config().capacity;
        let explorer = EpsilonGreedy::new(self.config.epsilon);
        let mut td_error = Array2::zeros((self.config.train_frequency, n_envs));
        let mut transitions = Vec::new();

        for k in 0..self.config.train_frequency {
            let mut action_rng = rng.split();
            let q = self.q_values(&train_state.qnet, &last_obs)?;
            let action = explorer.action(&q, &self.env, &mut action_rng);

            let mut step_rng = rng.split();
            let (next_env_state, out) = self.env.step(env_state, &action, &mut step_rng);

            let td = self.td_errors(
                &train_state,
                &last_obs,
                &action,
                &out.obs,
                &out.reward,
                &out.done,
            )?;

            let timestep = TimeStep {
                last_obs: last_obs.clone(),
                obs: out.obs.clone(),
                action,
                reward: out.reward,
                done: out.done,
            };
            let write_start = buffer_state.current_index();
            buffer_state = self.buffer.add(buffer_state, &timestep);

            let written = (0..n_envs)
                .map(|j| (write_start + j) % capacity)
                .collect::<Vec<_>>();
            let weights = td.iter().map(|e| self.priority_weight(*e)).collect::<Vec<_>>();
            buffer_state = self.buffer.set_priorities(buffer_state, &written, &weights);

            for (i, e) in td.iter().enumerate() {
                td_error[(k, i)] = *e;
            }
            if self.track_trajectories {
                transitions.push(timestep);
            }

            global_step += n_envs;
            env_state = next_env_state;
            last_obs = out.obs;
        }

        // Both gates look at the step counter after the rollout, and both are
        // computed every iteration.
        let past_warmup = global_step > self.config.learning_starts;
        let do_update = past_warmup && global_step % self.config.train_frequency == 0;
        let do_target_sync =
            past_warmup && global_step % self.config.target_network_update_freq == 0;

        let (train_state, loss, q_pred) = if do_update {
            let mut sample_rng = rng.split();
            let sampled = self.buffer.sample(&buffer_state, &mut sample_rng)?;
            let (train_state, loss, q_pred, _grads) = self.update(train_state, &sampled.batch)?;
            (train_state, loss, q_pred)
        } else {
            let q_pred = vec![1.; self.config.buffer_batch_size];
            (train_state, 0., q_pred)
        };

        if do_target_sync {
            polyak_update(
                train_state.qnet_tgt.varmap(),
                train_state.qnet.varmap(),
                self.config.tau,
            )?;
        }

        let runner_state = DqnRunnerState {
            rng,
            train_state,
            env_state,
            last_obs,
            global_step,
        };
        let metrics = IterationMetrics {
            loss,
            q_pred: Array1::from(q_pred),
            td_error,
        };
        let trace = RolloutTrace { transitions };

        Ok(((runner_state, buffer_state), metrics, trace))
    }
}

impl<E: Env> Algorithm for Dqn<E> {
    type RunnerState = DqnRunnerState<E>;
    type BufferState = BufferState;

    fn hpo_config_space() -> ConfigSpace {
        ConfigSpace::new("DQNConfigSpace")
            .param(
                "buffer_size",
                Domain::IntRange {
                    low: 1,
                    high: 10_000_000,
                },
                ParamValue::Int(1_000_000),
            )
            .param(
                "buffer_batch_size",
                Domain::IntRange { low: 1, high: 1024 },
                ParamValue::Int(64),
            )
            .param(
                "buffer_prio_sampling",
                Domain::Categorical(vec![ParamValue::Bool(true), ParamValue::Bool(false)]),
                ParamValue::Bool(true),
            )
            .param(
                "buffer_alpha",
                Domain::FloatRange { low: 0., high: 1. },
                ParamValue::Float(0.9),
            )
            .param(
                "buffer_beta",
                Domain::FloatRange { low: 0., high: 1. },
                ParamValue::Float(0.9),
            )
            .param(
                "buffer_epsilon",
                Domain::FloatRange {
                    low: 0.,
                    high: 1e-3,
                },
                ParamValue::Float(1e-5),
            )
            .param(
                "lr",
                Domain::FloatRange {
                    low: 1e-5,
                    high: 0.1,
                },
                ParamValue::Float(2.5e-4),
            )
            .param(
                "gamma",
                Domain::FloatRange { low: 0., high: 1. },
                ParamValue::Float(0.99),
            )
            .param(
                "tau",
                Domain::FloatRange { low: 0., high: 1. },
                ParamValue::Float(1.0),
            )
            .param(
                "epsilon",
                Domain::FloatRange { low: 0., high: 1. },
                ParamValue::Float(0.1),
            )
            .param(
                "use_target_network",
                Domain::Categorical(vec![ParamValue::Bool(true), ParamValue::Bool(false)]),
                ParamValue::Bool(true),
            )
            .param(
                "train_frequency",
                Domain::IntRange {
                    low: 1,
                    high: 100_000,
                },
                ParamValue::Int(4),
            )
            .param(
                "learning_starts",
                Domain::IntRange {
                    low: 1024,
                    high: 100_000,
                },
                ParamValue::Int(10_000),
            )
            .param(
                "target_network_update_freq",
                Domain::IntRange {
                    low: 1,
                    high: 100_000,
                },
                ParamValue::Int(100),
            )
    }

    fn default_hpo_config() -> Config {
        Self::hpo_config_space().default_configuration()
    }

    fn nas_config_space() -> ConfigSpace {
        ConfigSpace::new("DQNNASConfigSpace")
            .param(
                "activation",
                Domain::Categorical(vec![
                    ParamValue::Str("tanh".into()),
                    ParamValue::Str("relu".into()),
                ]),
                ParamValue::Str("tanh".into()),
            )
            .param(
                "hidden_size",
                Domain::IntRange { low: 1, high: 1024 },
                ParamValue::Int(64),
            )
    }

    fn default_nas_config() -> Config {
        Self::nas_config_space().default_configuration()
    }

    /// Creates the initial runner and buffer states.
    ///
    /// Performs one throwaway environment interaction with a fixed probe
    /// stream; its only purpose is to size the buffer storage. Network
    /// parameters are drawn from the given stream, and the target set starts
    /// as an exact copy of the online set.
    fn init(&self, mut rng: Prng) -> Result<(Self::RunnerState, Self::BufferState)> {
        let mut reset_rng = rng.split();
        let (env_state, obs) = self.env.reset(&mut reset_rng);

        let buffer_state = {
            let mut action_rng = rng.split();
            let action = Array1::from(
                (0..self.env.n_envs())
                    .map(|_| self.env.sample_action(&mut action_rng))
                    .collect::<Vec<_>>(),
            );
            let mut probe_rng = Prng::seed_from_u64(0);
            let (_, out) = self.env.step(env_state.clone(), &action, &mut probe_rng);
            let timestep = TimeStep {
                last_obs: obs.clone(),
                obs: out.obs,
                action,
                reward: out.reward,
                done: out.done,
            };
            self.buffer.init(&timestep)
        };

        let opt_config = OptimizerConfig::default().learning_rate(self.config.lr);
        let qnet = QModel::build(self.mlp_config(), opt_config, self.device.clone())?;
        let mut net_rng = rng.split();
        seed_varmap(qnet.varmap(), &mut net_rng)?;
        let qnet_tgt = qnet.clone();

        let train_state = DqnTrainState {
            qnet,
            qnet_tgt,
            n_updates: 0,
        };

        let runner_state = DqnRunnerState {
            rng,
            train_state,
            env_state,
            last_obs: obs,
            global_step: 0,
        };

        Ok((runner_state, buffer_state))
    }

    /// Runs the configured number of timesteps, then evaluates greedily.
    fn train(
        &self,
        runner_state: Self::RunnerState,
        buffer_state: Self::BufferState,
    ) -> Result<((Self::RunnerState, Self::BufferState), TrainResult)> {
        let n_iterations = (self.options.n_total_timesteps / self.config.train_frequency)
            / self.options.n_envs;
        info!(
            "training for {} iterations of {} steps over {} environments",
            n_iterations,
            self.config.train_frequency,
            self.options.n_envs
        );

        let mut state = (runner_state, buffer_state);
        let mut metrics = Vec::new();
        let mut trajectories = Vec::new();

        for _ in 0..n_iterations {
            let (next_state, iteration_metrics, trace) = self.update_step(state.0, state.1)?;
            state = next_state;
            if self.track_metrics {
                metrics.push(iteration_metrics);
            }
            if self.track_trajectories {
                trajectories.extend(trace.transitions);
            }
        }

        let (mut runner_state, buffer_state) = state;
        let eval_rewards = {
            let mut eval_rng = runner_state.rng.split();
            self.eval(
                &runner_state,
                self.options.n_eval_episodes,
                &mut eval_rng,
            )?
        };

        let result = TrainResult {
            eval_rewards,
            metrics: if self.track_metrics {
                Some(metrics)
            } else {
                None
            },
            trajectories: if self.track_trajectories {
                Some(trajectories)
            } else {
                None
            },
        };

        Ok(((runner_state, buffer_state), result))
    }

    fn predict(
        &self,
        runner_state: &Self::RunnerState,
        obs: &Array2<f32>,
        _rng: &mut Prng,
    ) -> Array1<i64> {
        let q = self
            .q_values(&runner_state.train_state.qnet, obs)
            .expect("q-network forward failed");
        greedy_actions(&q)
    }

    fn eval(
        &self,
        runner_state: &Self::RunnerState,
        n_episodes: usize,
        rng: &mut Prng,
    ) -> Result<Vec<f32>> {
        VecEvaluator::new(n_episodes).evaluate(&self.env, rng, |obs, action_rng| {
            self.predict(runner_state, obs, action_rng)
        })
    }
}

impl<E: Env> Dqn<E> {
    /// Saves the online and target parameters in the given directory.
    pub fn save_params(&self, train_state: &DqnTrainState, path: impl AsRef<Path>) -> Result<()> {
        fs::create_dir_all(&path)?;
        train_state
            .qnet
            .save(path.as_ref().join("qnet.safetensors"))?;
        train_state
            .qnet_tgt
            .save(path.as_ref().join("qnet_tgt.safetensors"))?;
        Ok(())
    }

    /// Loads the online and target parameters from the given directory.
    pub fn load_params(&self, train_state: &mut DqnTrainState, path: impl AsRef<Path>) -> Result<()> {
        train_state
            .qnet
            .load(path.as_ref().join("qnet.safetensors"))?;
        train_state
            .qnet_tgt
            .load(path.as_ref().join("qnet_tgt.safetensors"))?;
        Ok(())
    }
}
