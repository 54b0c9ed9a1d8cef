use anyhow::Result;
use autorl_candle_agent::{
    dqn::{Dqn, DqnConfig},
    Activation, Device,
};
use autorl_core::{
    dummy::CyclicEnv, error::AutorlError, ActionSpace, Algorithm, AlgorithmOptions, Env, Prng,
    StepOutput,
};
use ndarray::{Array1, Array2};

fn cyclic_env(n_envs: usize) -> CyclicEnv {
    CyclicEnv {
        n_envs,
        obs_dim: 3,
        n_actions: 2,
        rewards: vec![1., 1., 1., 0.],
        episode_len: 4,
    }
}

fn config() -> DqnConfig {
    DqnConfig {
        buffer_size: 128,
        buffer_batch_size: 2,
        buffer_prio_sampling: true,
        buffer_alpha: 0.9,
        buffer_epsilon: 1e-5,
        priority_exponent: 0.9,
        lr: 1e-3,
        gamma: 0.99,
        tau: 1.0,
        epsilon: 0.1,
        use_target_network: true,
        train_frequency: 4,
        learning_starts: 4,
        target_network_update_freq: 100,
        activation: Activation::Tanh,
        hidden_size: 8,
        device: Device::Cpu,
    }
}

fn options(n_envs: usize, n_total_timesteps: usize) -> AlgorithmOptions {
    AlgorithmOptions::default()
        .n_envs(n_envs)
        .n_total_timesteps(n_total_timesteps)
        .n_eval_episodes(2)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn global_step_counts_all_parallel_environments() -> Result<()> {
    init_logger();
    // 4 iterations of 4 steps over 2 environments.
    let dqn = Dqn::new(config(), options(2, 32), cyclic_env(2))?;
    let (runner_state, buffer_state) = dqn.init(Prng::seed_from_u64(0))?;
    let ((runner_state, _), _) = dqn.train(runner_state, buffer_state)?;
    assert_eq!(runner_state.global_step, 32);
    Ok(())
}

#[test]
fn single_iteration_before_warmup_is_a_no_op_update() -> Result<()> {
    // One iteration fills the buffer with one full episode but must not
    // touch the parameters: the update gate needs global_step > 4.
    let dqn = Dqn::new(config(), options(1, 4), cyclic_env(1))?.track_metrics(true);
    let (runner_state, buffer_state) = dqn.init(Prng::seed_from_u64(1))?;
    let online_before = runner_state.train_state.online_params();
    let target_before = runner_state.train_state.target_params();

    let ((runner_state, buffer_state), result) = dqn.train(runner_state, buffer_state)?;

    assert_eq!(runner_state.global_step, 4);
    assert_eq!(buffer_state.len(), 4);
    assert_eq!(runner_state.train_state.n_updates(), 0);
    assert_eq!(runner_state.train_state.online_params(), online_before);
    assert_eq!(runner_state.train_state.target_params(), target_before);

    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].loss, 0.);
    Ok(())
}

#[test]
fn written_priorities_follow_the_td_error_formula() -> Result<()> {
    let cfg = config();
    let (buffer_epsilon, buffer_alpha) = (cfg.buffer_epsilon, cfg.buffer_alpha);
    let dqn = Dqn::new(cfg, options(1, 4), cyclic_env(1))?.track_metrics(true);
    let (runner_state, buffer_state) = dqn.init(Prng::seed_from_u64(2))?;
    let ((_, buffer_state), result) = dqn.train(runner_state, buffer_state)?;

    // One environment, four steps: slots 0..4 in write order.
    let td_error = &result.metrics.unwrap()[0].td_error;
    for k in 0..4 {
        let expected = (td_error[(k, 0)].abs() + buffer_epsilon).powf(buffer_alpha);
        assert_eq!(buffer_state.priority(k), expected);
    }
    Ok(())
}

#[test]
fn scheduler_never_samples_before_learning_starts() -> Result<()> {
    // The batch size exceeds everything written before the warm-up
    // threshold, so any premature sample call would fail.
    let mut cfg = config();
    cfg.buffer_batch_size = 64;
    cfg.learning_starts = 1000;
    let dqn = Dqn::new(cfg, options(1, 16), cyclic_env(1))?.track_metrics(true);
    let (runner_state, buffer_state) = dqn.init(Prng::seed_from_u64(3))?;

    let ((runner_state, buffer_state), result) = dqn.train(runner_state, buffer_state)?;

    assert_eq!(runner_state.global_step, 16);
    assert_eq!(buffer_state.len(), 16);
    assert!(result.metrics.unwrap().iter().all(|m| m.loss == 0.));
    Ok(())
}

#[test]
fn target_syncs_only_when_its_gate_opens() -> Result<()> {
    init_logger();
    let mut cfg = config();
    cfg.train_frequency = 2;
    cfg.learning_starts = 2;
    cfg.target_network_update_freq = 4;
    cfg.buffer_batch_size = 2;
    let dqn = Dqn::new(cfg, options(1, 2), cyclic_env(1))?;
    let (mut runner_state, mut buffer_state) = dqn.init(Prng::seed_from_u64(4))?;

    // Iteration 1, global_step 2: both gates closed.
    let target_0 = runner_state.train_state.target_params();
    let online_0 = runner_state.train_state.online_params();
    let ((rs, bs), _) = dqn.train(runner_state, buffer_state)?;
    runner_state = rs;
    buffer_state = bs;
    assert_eq!(runner_state.global_step, 2);
    assert_eq!(runner_state.train_state.target_params(), target_0);
    assert_eq!(runner_state.train_state.online_params(), online_0);

    // Iteration 2, global_step 4: update and sync; tau = 1 copies online.
    let ((rs, bs), _) = dqn.train(runner_state, buffer_state)?;
    runner_state = rs;
    buffer_state = bs;
    assert_eq!(runner_state.global_step, 4);
    assert_eq!(runner_state.train_state.n_updates(), 1);
    assert_ne!(runner_state.train_state.online_params(), online_0);
    assert_eq!(
        runner_state.train_state.target_params(),
        runner_state.train_state.online_params()
    );

    // Iteration 3, global_step 6: update opens, sync stays closed, so the
    // target is bit-identical to the previous iteration's.
    let target_2 = runner_state.train_state.target_params();
    let ((rs, _), _) = dqn.train(runner_state, buffer_state)?;
    runner_state = rs;
    assert_eq!(runner_state.global_step, 6);
    assert_eq!(runner_state.train_state.n_updates(), 2);
    assert_eq!(runner_state.train_state.target_params(), target_2);
    assert_ne!(runner_state.train_state.online_params(), target_2);
    Ok(())
}

#[test]
fn evaluation_collects_the_requested_episode_count() -> Result<()> {
    let dqn = Dqn::new(config(), options(2, 8), cyclic_env(2))?;
    let (runner_state, _) = dqn.init(Prng::seed_from_u64(5))?;
    let mut rng = Prng::seed_from_u64(6);

    // Every episode pays 1 + 1 + 1 + 0 regardless of the policy.
    let rewards = dqn.eval(&runner_state, 5, &mut rng)?;
    assert_eq!(rewards, vec![3.; 5]);
    Ok(())
}

#[test]
fn default_spaces_match_the_published_configuration() -> Result<()> {
    let hpo = Dqn::<CyclicEnv>::default_hpo_config();
    let nas = Dqn::<CyclicEnv>::default_nas_config();
    let cfg = DqnConfig::from_configs(&hpo, &nas)?;

    assert_eq!(cfg.train_frequency, 4);
    assert_eq!(cfg.learning_starts, 10_000);
    assert_eq!(cfg.target_network_update_freq, 100);
    assert_eq!(cfg.buffer_batch_size, 64);
    // buffer_beta doubles as the sampling exponent when present.
    assert_eq!(cfg.priority_exponent, 0.9);
    assert_eq!(cfg.activation, Activation::Tanh);
    assert_eq!(cfg.hidden_size, 64);
    assert!(cfg.use_target_network);
    Ok(())
}

/// Environment advertising a continuous action space.
struct BoxEnv;

impl Env for BoxEnv {
    type State = ();

    fn n_envs(&self) -> usize {
        1
    }

    fn obs_dim(&self) -> usize {
        3
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Box(vec![3])
    }

    fn reset(&self, _rng: &mut Prng) -> (Self::State, Array2<f32>) {
        ((), Array2::zeros((1, 3)))
    }

    fn step(
        &self,
        _state: Self::State,
        _action: &Array1<i64>,
        _rng: &mut Prng,
    ) -> (Self::State, StepOutput) {
        (
            (),
            StepOutput {
                obs: Array2::zeros((1, 3)),
                reward: Array1::zeros(1),
                done: Array1::ones(1),
            },
        )
    }

    fn sample_action(&self, _rng: &mut Prng) -> i64 {
        0
    }
}

#[test]
fn continuous_action_spaces_are_rejected_at_construction() {
    let err = Dqn::new(config(), options(1, 4), BoxEnv).err().unwrap();
    match err.downcast_ref::<AutorlError>() {
        Some(AutorlError::UnsupportedActionSpace(_)) => {}
        other => panic!("expected UnsupportedActionSpace, got {:?}", other),
    }
}
