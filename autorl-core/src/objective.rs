//! Objective wrappers around a training entry point.
//!
//! An objective decorates a training thunk: it observes the run (wall time,
//! final evaluation rewards) and records a scalar into a caller-supplied
//! results mapping, without altering the wrapped return value. Several
//! objectives compose functionally, in ascending declared rank, so a given
//! selection always nests the same way.
use crate::TrainResult;
use std::{cell::RefCell, collections::HashMap, rc::Rc, time::SystemTime};

/// Results mapping shared between the caller and the wrappers.
pub type ObjectiveResults = Rc<RefCell<HashMap<String, f64>>>;

/// A boxed training thunk.
pub type TrainFn<'a, T> = Box<dyn FnOnce() -> T + 'a>;

/// Direction a recorded value is naturally optimized in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Smaller is better.
    Lower,
    /// Larger is better.
    Upper,
}

/// Training outputs that expose their final evaluation rewards.
pub trait TrainOutcome {
    /// Episode returns of the final greedy evaluation.
    fn eval_rewards(&self) -> &[f32];
}

impl TrainOutcome for TrainResult {
    fn eval_rewards(&self) -> &[f32] {
        &self.eval_rewards
    }
}

/// An instrumentation wrapper for a training thunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Objective {
    /// Wall-clock runtime of the wrapped call, in seconds.
    Runtime,
    /// Mean of the final evaluation rewards.
    RewardMean,
    /// Standard deviation of the final evaluation rewards.
    RewardStd,
}

impl Objective {
    /// Key under which the objective records its value.
    pub fn key(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::RewardMean => "reward_mean",
            Self::RewardStd => "reward_std",
        }
    }

    /// Sorting rank; wrappers are applied in ascending rank.
    pub fn rank(self) -> usize {
        match self {
            Self::Runtime => 0,
            Self::RewardMean | Self::RewardStd => 2,
        }
    }

    /// Natural optimization direction of the recorded value.
    pub fn direction(self) -> Direction {
        match self {
            Self::Runtime | Self::RewardStd => Direction::Lower,
            Self::RewardMean => Direction::Upper,
        }
    }

    /// Wraps `f`, recording this objective into `results`.
    ///
    /// The recorded value is negated when `optimize` disagrees with the
    /// objective's natural direction, so a single-direction optimizer can
    /// consume all objectives uniformly.
    pub fn wrap<'a, T>(
        self,
        f: TrainFn<'a, T>,
        results: ObjectiveResults,
        optimize: Direction,
    ) -> TrainFn<'a, T>
    where
        T: TrainOutcome + 'a,
    {
        Box::new(move || {
            let (out, value) = match self {
                Self::Runtime => {
                    let timer = SystemTime::now();
                    let out = f();
                    let secs = timer
                        .elapsed()
                        .map(|d| d.as_secs_f64())
                        .unwrap_or_default();
                    (out, secs)
                }
                Self::RewardMean => {
                    let out = f();
                    let v = mean(out.eval_rewards());
                    (out, v)
                }
                Self::RewardStd => {
                    let out = f();
                    let v = std(out.eval_rewards());
                    (out, v)
                }
            };
            let value = if optimize == self.direction() {
                value
            } else {
                -value
            };
            results.borrow_mut().insert(self.key().to_string(), value);
            out
        })
    }
}

/// Composes `objectives` around `f`, lowest rank innermost.
pub fn compose<'a, T>(
    objectives: &[Objective],
    f: TrainFn<'a, T>,
    results: &ObjectiveResults,
    optimize: Direction,
) -> TrainFn<'a, T>
where
    T: TrainOutcome + 'a,
{
    let mut sorted = objectives.to_vec();
    sorted.sort_by_key(|o| o.rank());

    let mut wrapped = f;
    for o in sorted {
        wrapped = o.wrap(wrapped, Rc::clone(results), optimize);
    }
    wrapped
}

fn mean(xs: &[f32]) -> f64 {
    if xs.is_empty() {
        return 0.;
    }
    xs.iter().map(|x| *x as f64).sum::<f64>() / xs.len() as f64
}

fn std(xs: &[f32]) -> f64 {
    if xs.is_empty() {
        return 0.;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (*x as f64 - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(rewards: &[f32]) -> TrainResult {
        TrainResult {
            eval_rewards: rewards.to_vec(),
            metrics: None,
            trajectories: None,
        }
    }

    #[test]
    fn records_without_altering_the_return_value() {
        let results: ObjectiveResults = Rc::new(RefCell::new(HashMap::new()));
        let f: TrainFn<TrainResult> = Box::new(|| outcome(&[1., 2., 3.]));
        let wrapped = compose(
            &[Objective::RewardMean, Objective::Runtime],
            f,
            &results,
            Direction::Upper,
        );
        let out = wrapped();
        assert_eq!(out.eval_rewards, vec![1., 2., 3.]);

        let results = results.borrow();
        assert_eq!(results["reward_mean"], 2.0);
        // Runtime optimizes lower, the run optimizes upper: sign flipped.
        assert!(results["runtime"] <= 0.0);
    }

    #[test]
    fn reward_std_of_constant_rewards_is_zero() {
        let results: ObjectiveResults = Rc::new(RefCell::new(HashMap::new()));
        let f: TrainFn<TrainResult> = Box::new(|| outcome(&[5., 5., 5.]));
        let wrapped = Objective::RewardStd.wrap(f, Rc::clone(&results), Direction::Lower);
        wrapped();
        assert_eq!(results.borrow()["reward_std"], 0.0);
    }

    #[test]
    fn sign_flips_when_directions_disagree() {
        let results: ObjectiveResults = Rc::new(RefCell::new(HashMap::new()));
        let f: TrainFn<TrainResult> = Box::new(|| outcome(&[4., 6.]));
        let wrapped = Objective::RewardMean.wrap(f, Rc::clone(&results), Direction::Lower);
        wrapped();
        assert_eq!(results.borrow()["reward_mean"], -5.0);
    }

    #[test]
    fn composition_applies_every_objective() {
        let results: ObjectiveResults = Rc::new(RefCell::new(HashMap::new()));
        let f: TrainFn<TrainResult> = Box::new(|| outcome(&[0., 10.]));
        let wrapped = compose(
            &[
                Objective::RewardStd,
                Objective::Runtime,
                Objective::RewardMean,
            ],
            f,
            &results,
            Direction::Upper,
        );
        wrapped();
        let results = results.borrow();
        assert_eq!(results.len(), 3);
        assert_eq!(results["reward_mean"], 5.0);
        assert_eq!(results["reward_std"], -5.0);
    }
}
