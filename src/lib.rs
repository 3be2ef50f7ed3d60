//! Simulate epidemics with superspreading and score them against reported
//! incidence and a pathogen genealogy.
//!
//! A model advances a [`Trajectory`] through a window of discrete timesteps.
//! The resulting incidence and coalescent rate series are scored by
//! [`binomial_loglik`] and [`coalescent_loglik`], either one proposal at a
//! time through [`EpidemicLikelihood`] or as a batch of independent
//! replicates through [`run_replicates`].

pub(crate) mod data;
pub(crate) mod evaluator;
pub(crate) mod likelihood;
pub(crate) mod model;
pub(crate) mod params;
pub(crate) mod replicates;
pub(crate) mod sir;
pub(crate) mod trajectory;

pub use data::{DataError, EventIndex, Genealogy, IncidenceData};
pub use evaluator::{EpidemicLikelihood, IncidenceTarget, LikelihoodError, LikelihoodSettings};
pub use likelihood::{
    binomial_loglik, binomial_loglik_unobserved, coalescent_loglik, ln_binomial_pmf, Scale,
    IMPOSSIBLE,
};
pub use model::{EpidemicModel, SimulationError, SimulationMode};
pub use params::{ModelParams, ParameterError, ParameterSet, SirParams};
pub use replicates::{
    merge_round_robin, run_replicates, worker_replicates, worker_rng, ReplicateOutput,
    ReplicateSettings,
};
pub use sir::{draw_offspring, SirOffspring};
pub use trajectory::{SirCompartment, Trajectory};
