//! Interface of neural networks used in the learners.
use candle_nn::VarBuilder;

/// A neural network module not owning its `VarMap`.
///
/// Parameters are registered in the [`VarBuilder`] passed to
/// [`SubModel::build`], so the owner of the `VarMap` decides how parameter
/// sets are copied, blended and persisted.
pub trait SubModel {
    /// Configuration from which the module is constructed.
    type Config;

    /// Input of the module.
    type Input;

    /// Output of the module.
    type Output;

    /// Builds the module, registering its parameters in `vb`.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Self::Output;
}
