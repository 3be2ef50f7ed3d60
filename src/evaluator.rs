use std::ops::Range;

use rand::Rng;
use thiserror::Error;

use crate::{
    data::{Genealogy, IncidenceData},
    likelihood::{
        binomial_loglik, binomial_loglik_unobserved, coalescent_loglik, Scale, IMPOSSIBLE,
    },
    model::{EpidemicModel, SimulationError},
    params::{ModelParams, ParameterError, ParameterSet},
    trajectory::Trajectory,
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LikelihoodError {
    #[error("Simulation of the epidemic failed")]
    Simulation(#[from] SimulationError),
    #[error("Could not resolve model parameters")]
    Parameters(#[from] ParameterError),
    #[error("Scoring incidence requires a reporting rate")]
    MissingReportingRate,
}

/// Settings for scoring one simulation window.
#[derive(Debug, Clone, Copy)]
pub struct LikelihoodSettings {
    /// First simulation step of the window.
    pub start: usize,
    /// The number of simulation steps in the window.
    pub num_steps: usize,
    /// Length of a simulation step in units of time.
    pub step_size: f64,
    /// Simulation step at which the observed data begins.
    pub data_shift: usize,
}

impl Default for LikelihoodSettings {
    fn default() -> Self {
        Self {
            start: 0,
            num_steps: 100,
            step_size: 1f64,
            data_shift: 0,
        }
    }
}

impl LikelihoodSettings {
    pub fn window(&self) -> Range<usize> {
        self.start..self.start + self.num_steps
    }
}

/// What the simulated incidence is scored against.
#[derive(Debug, Clone, Copy)]
pub enum IncidenceTarget<'a> {
    /// Observed case counts.
    Observed(IncidenceData<'a>),
    /// No data covers the window, every case went unreported.
    Unobserved { num_groups: usize },
    /// Incidence does not contribute to the likelihood.
    Ignored,
}

/// Log likelihood of model parameters given incidence and genealogy data.
///
/// Every evaluation resets the trajectory to its initial state, simulates the
/// window once and adds up the incidence and coalescent log likelihoods. This
/// is the density an outer MCMC sampler consumes, one call per proposal.
pub struct EpidemicLikelihood<'a, M: EpidemicModel, R: Rng> {
    model: M,
    trajectory: Trajectory,
    rng: R,
    settings: LikelihoodSettings,
    incidence: IncidenceTarget<'a>,
    genealogy: Option<&'a Genealogy>,
}

impl<'a, M: EpidemicModel, R: Rng> EpidemicLikelihood<'a, M, R> {
    pub fn new(model: M, mut trajectory: Trajectory, rng: R, settings: LikelihoodSettings) -> Self {
        trajectory.resize(settings.num_steps);
        Self {
            model,
            trajectory,
            rng,
            settings,
            incidence: IncidenceTarget::Ignored,
            genealogy: None,
        }
    }

    pub fn with_incidence(mut self, incidence: IncidenceTarget<'a>) -> Self {
        self.incidence = incidence;
        self
    }

    pub fn with_genealogy(mut self, genealogy: &'a Genealogy) -> Self {
        self.genealogy = Some(genealogy);
        self
    }

    /// The trajectory of the most recent evaluation.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn settings(&self) -> &LikelihoodSettings {
        &self.settings
    }

    /// Resolve named parameters and evaluate them.
    pub fn loglik_parameters(&mut self, parameters: &ParameterSet) -> Result<f64, LikelihoodError> {
        let params = M::Params::from_parameters(parameters)?;
        self.loglik(&params)
    }

    pub fn loglik(&mut self, params: &M::Params) -> Result<f64, LikelihoodError> {
        let window = self.settings.window();
        self.trajectory.reset();
        self.model.simulate(
            params,
            &mut self.trajectory,
            window.clone(),
            self.settings.step_size,
            &mut self.rng,
        )?;

        let incidence = self.incidence_loglik(params)?;
        if incidence == IMPOSSIBLE {
            return Ok(IMPOSSIBLE);
        }
        let genealogy = match self.genealogy {
            Some(genealogy) => coalescent_loglik(
                self.trajectory.coalescent_rates(),
                genealogy,
                window,
                self.settings.data_shift,
                Scale::Log,
            ),
            None => 0f64,
        };
        if genealogy == IMPOSSIBLE {
            return Ok(IMPOSSIBLE);
        }

        let loglik = incidence + genealogy;
        if loglik.is_finite() {
            Ok(loglik)
        } else {
            Ok(IMPOSSIBLE)
        }
    }

    fn incidence_loglik(&self, params: &M::Params) -> Result<f64, LikelihoodError> {
        let total_incidence = self.trajectory.total_incidence(0..self.settings.num_steps);
        let reporting_rate = || {
            params
                .reporting_rate()
                .ok_or(LikelihoodError::MissingReportingRate)
        };
        let loglik = match self.incidence {
            IncidenceTarget::Observed(data) => binomial_loglik(
                reporting_rate()?,
                total_incidence,
                &data,
                self.settings.window(),
                self.settings.data_shift,
                Scale::Log,
            ),
            IncidenceTarget::Unobserved { num_groups } => binomial_loglik_unobserved(
                reporting_rate()?,
                total_incidence,
                num_groups,
                Scale::Log,
            ),
            IncidenceTarget::Ignored => 0f64,
        };
        Ok(loglik)
    }
}
