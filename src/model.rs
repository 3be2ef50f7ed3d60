//! Core abstractions for epidemic models.
//!
//! Provides the `EpidemicModel` trait which defines the interface every
//! compartmental model exposes to the replicate runner and to the likelihood
//! evaluator.

use std::ops::Range;

use rand::Rng;
use rand_distr::{BinomialError, GammaError, PoissonError};
use thiserror::Error;

use crate::{params::ModelParams, trajectory::Trajectory};

/// How transitions between compartments are computed.
///
/// The mode is fixed when a model is constructed and stays the same for the
/// lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    /// Draw transition counts from their distributions.
    #[default]
    Stochastic,
    /// Use the expected transition counts.
    Deterministic,
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid binomial transition")]
    Binomial(#[from] BinomialError),
    #[error("Invalid gamma offspring rate")]
    Gamma(#[from] GammaError),
    #[error("Invalid poisson offspring count")]
    Poisson(#[from] PoissonError),
    #[error("Window of {window} steps does not fit a trajectory of {capacity} steps")]
    WindowTooLong { window: usize, capacity: usize },
}

/// A compartmental epidemic model that can advance a [`Trajectory`].
///
/// The trait is thread-safe so that one model instance can be shared by all
/// replicate workers; everything a run mutates lives in the trajectory and
/// the random generator, both owned by the caller.
pub trait EpidemicModel: Send + Sync {
    /// The typed parameters of the model.
    type Params: ModelParams;

    /// Advance `trajectory` through the timesteps in `window`.
    ///
    /// Fills the incidence and coalescent series of the trajectory, indexed
    /// relative to `window.start`, and leaves the compartment state at the
    /// end of the window.
    fn simulate<R: Rng + ?Sized>(
        &self,
        params: &Self::Params,
        trajectory: &mut Trajectory,
        window: Range<usize>,
        step_size: f64,
        rng: &mut R,
    ) -> Result<(), SimulationError>;
}
