//! The state of a single simulated epidemic.
//!
//! A [`Trajectory`] holds the current compartment counts together with two
//! per-timestep output series filled by a simulation run:
//!
//! - the incidence series, the number of cases detected in each timestep,
//! - the coalescent series, the pairwise coalescent rate in each timestep.
//!
//! Both series are indexed relative to the start of the window that was last
//! simulated. A trajectory has exactly one writer at a time; it is handed to
//! a model as `&mut` for the duration of a run and is read-only afterwards.

use std::ops::Range;

/// Compartments of the SIR model, in the order they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SirCompartment {
    Susceptible = 0,
    Infectious = 1,
    Recovered = 2,
}

impl SirCompartment {
    pub const COUNT: usize = 3;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    state: Box<[f64]>,
    initial_state: Box<[f64]>,
    incidence: Vec<f64>,
    coalescent: Vec<f64>,
}

impl Trajectory {
    /// Create a trajectory with the given initial compartment counts and room
    /// for `num_steps` timesteps of output.
    pub fn new(initial_state: impl Into<Box<[f64]>>, num_steps: usize) -> Self {
        let initial_state = initial_state.into();
        Self {
            state: initial_state.clone(),
            initial_state,
            incidence: vec![0f64; num_steps],
            coalescent: vec![0f64; num_steps],
        }
    }

    /// Convenience constructor for the SIR compartments.
    pub fn sir(susceptible: f64, infectious: f64, recovered: f64, num_steps: usize) -> Self {
        Self::new([susceptible, infectious, recovered], num_steps)
    }

    /// Restore the initial state and clear both output series.
    pub fn reset(&mut self) {
        self.state.copy_from_slice(&self.initial_state);
        self.incidence.fill(0f64);
        self.coalescent.fill(0f64);
    }

    /// Change the number of timesteps the output series can hold.
    pub fn resize(&mut self, num_steps: usize) {
        self.incidence.resize(num_steps, 0f64);
        self.coalescent.resize(num_steps, 0f64);
    }

    pub fn num_steps(&self) -> usize {
        self.incidence.len()
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut [f64] {
        &mut self.state
    }

    pub fn initial_state(&self) -> &[f64] {
        &self.initial_state
    }

    #[inline]
    pub fn compartment(&self, compartment: SirCompartment) -> f64 {
        self.state[compartment.index()]
    }

    /// Total number of individuals over all compartments.
    pub fn population(&self) -> f64 {
        self.state.iter().sum()
    }

    pub fn initial_population(&self) -> f64 {
        self.initial_state.iter().sum()
    }

    pub fn incidence(&self) -> &[f64] {
        &self.incidence
    }

    pub fn coalescent_rates(&self) -> &[f64] {
        &self.coalescent
    }

    /// Compartment state, incidence and coalescent series at once, for the
    /// model that fills them.
    pub fn parts_mut(&mut self) -> (&mut [f64], &mut [f64], &mut [f64]) {
        (
            &mut self.state[..],
            &mut self.incidence[..],
            &mut self.coalescent[..],
        )
    }

    /// Sum of the incidence series over `steps`.
    pub fn total_incidence(&self, steps: Range<usize>) -> f64 {
        self.incidence[steps].iter().sum()
    }

    /// Incidence aggregated into reporting intervals of `sum_every` steps.
    ///
    /// The last interval is shorter if `sum_every` does not divide the number
    /// of steps.
    pub fn summed_incidence(&self, sum_every: usize) -> Vec<f64> {
        self.incidence
            .chunks(sum_every.max(1))
            .map(|chunk| chunk.iter().sum())
            .collect()
    }
}
