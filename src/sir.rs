use std::ops::Range;

use rand::Rng;
use rand_distr::{Binomial, Distribution, Gamma, Poisson};

use crate::{
    model::{EpidemicModel, SimulationError, SimulationMode},
    params::SirParams,
    trajectory::{SirCompartment, Trajectory},
};

const S: usize = SirCompartment::Susceptible as usize;
const I: usize = SirCompartment::Infectious as usize;
const R: usize = SirCompartment::Recovered as usize;

/// SIR model in discrete time where the number of secondary infections
/// follows a negative binomial distribution.
///
/// Cases are detected when they recover, so the incidence series holds the
/// number of recoveries in each step. The coalescent series holds the
/// pairwise coalescent rate of the pathogen genealogy in each step.
#[derive(Debug, Clone, Copy, Default)]
pub struct SirOffspring {
    mode: SimulationMode,
}

impl SirOffspring {
    pub fn new(mode: SimulationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    fn recoveries<Rn: Rng + ?Sized>(
        &self,
        infected: f64,
        probability: f64,
        rng: &mut Rn,
    ) -> Result<f64, SimulationError> {
        if probability >= 1f64 {
            return Ok(infected);
        }
        match self.mode {
            SimulationMode::Deterministic => Ok(infected * probability),
            SimulationMode::Stochastic => {
                let dist = Binomial::new(infected as u64, probability)?;
                Ok(dist.sample(rng) as f64)
            }
        }
    }
}

/// Number of secondary infections caused by `cases` infectious individuals
/// when each has a negative binomial offspring distribution with mean
/// `reproduction_number` and dispersion `dispersion`.
///
/// The negative binomial is drawn as a gamma-poisson mixture: the sum of the
/// individual gamma distributed rates is itself gamma distributed with shape
/// `dispersion * cases`.
pub fn draw_offspring<Rn: Rng + ?Sized>(
    cases: f64,
    reproduction_number: f64,
    dispersion: f64,
    rng: &mut Rn,
) -> Result<f64, SimulationError> {
    if reproduction_number <= 0f64 || cases <= 0f64 {
        return Ok(0f64);
    }
    let rate = Gamma::new(dispersion * cases, reproduction_number / dispersion)?.sample(rng);
    if rate <= 0f64 {
        return Ok(0f64);
    }
    Ok(Poisson::new(rate)?.sample(rng))
}

impl EpidemicModel for SirOffspring {
    type Params = SirParams;

    fn simulate<Rn: Rng + ?Sized>(
        &self,
        params: &SirParams,
        trajectory: &mut Trajectory,
        window: Range<usize>,
        step_size: f64,
        rng: &mut Rn,
    ) -> Result<(), SimulationError> {
        let num_steps = window.len();
        if num_steps > trajectory.num_steps() {
            return Err(SimulationError::WindowTooLong {
                window: num_steps,
                capacity: trajectory.num_steps(),
            });
        }
        if trajectory.compartment(SirCompartment::Infectious) < 1f64 {
            return Ok(());
        }

        let SirParams {
            reproduction_number,
            dispersion,
            recovery_rate,
            ..
        } = *params;

        let (state, incidence, coalescent) = trajectory.parts_mut();
        let incidence = &mut incidence[..num_steps];
        let coalescent = &mut coalescent[..num_steps];
        incidence.fill(0f64);
        coalescent.fill(0f64);

        let beta = reproduction_number * recovery_rate / state[S];
        let recovery_probability = recovery_rate * step_size;
        let mut current_reproduction = reproduction_number;
        let mut total_recoveries = 0f64;
        let mut total_infections = 0f64;

        for (offset, step) in window.enumerate() {
            let recoveries = if state[I] > 0f64 {
                self.recoveries(state[I], recovery_probability, rng)?
            } else {
                0f64
            };

            if recoveries > 0f64 {
                total_recoveries += recoveries;
                state[R] += recoveries;
                incidence[offset] = recoveries;

                let susceptible = state[S];
                let mut infections = 0f64;
                if susceptible > 0f64 {
                    infections = match self.mode {
                        SimulationMode::Deterministic => {
                            beta * susceptible * state[I] * step_size
                        }
                        SimulationMode::Stochastic => {
                            current_reproduction = beta / recovery_rate * susceptible;
                            draw_offspring(recoveries, current_reproduction, dispersion, rng)?
                        }
                    };
                    if infections > 0f64 {
                        infections = infections.min(susceptible);
                        total_infections += infections;
                        state[S] = susceptible - infections;
                    }
                }
                state[I] += infections - recoveries;
            }

            let infected = state[I];
            if infected > 0f64 {
                coalescent[offset] = infected.recip();
            } else {
                log::trace!("Epidemic went extinct at step {}", step);
                coalescent[offset..].fill(0f64);
                break;
            }
        }

        let empirical_reproduction = if total_infections > 0f64 {
            total_infections / total_recoveries
        } else {
            current_reproduction
        };
        let scale = recovery_rate * (1f64 + dispersion.recip()) * empirical_reproduction;
        coalescent.iter_mut().for_each(|rate| *rate *= scale);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn params(reproduction_number: f64, dispersion: f64, recovery_rate: f64) -> SirParams {
        SirParams {
            reproduction_number,
            dispersion,
            recovery_rate,
            reporting_rate: None,
        }
    }

    #[test]
    fn deterministic_single_step() {
        let model = SirOffspring::new(SimulationMode::Deterministic);
        let mut traj = Trajectory::sir(999., 1., 0., 1);
        let mut rng = StdRng::seed_from_u64(42);

        model
            .simulate(&params(2., 1., 1.), &mut traj, 0..1, 1., &mut rng)
            .unwrap();

        let tol = 1e-12;
        assert_relative_eq!(traj.compartment(SirCompartment::Susceptible), 997., max_relative = tol);
        assert_relative_eq!(traj.compartment(SirCompartment::Infectious), 2., max_relative = tol);
        assert_relative_eq!(traj.compartment(SirCompartment::Recovered), 1., max_relative = tol);
        assert_eq!(traj.incidence(), &[1.]);
        // 1/I = 0.5, scaled by recovery rate 1, (1 + 1/k) = 2 and R_emp = 2
        assert_relative_eq!(traj.coalescent_rates()[0], 2., max_relative = tol);
    }

    #[test]
    fn deterministic_partial_recovery() {
        let model = SirOffspring::new(SimulationMode::Deterministic);
        let mut traj = Trajectory::sir(90., 10., 0., 1);
        let mut rng = StdRng::seed_from_u64(0);

        model
            .simulate(&params(1.5, 0.5, 0.2), &mut traj, 0..1, 1., &mut rng)
            .unwrap();

        // 10 * 0.2 recoveries, beta * S * I new infections
        let beta = 1.5 * 0.2 / 90.;
        let infections = beta * 90. * 10.;
        let tol = 1e-12;
        assert_relative_eq!(traj.incidence()[0], 2., max_relative = tol);
        assert_relative_eq!(
            traj.compartment(SirCompartment::Susceptible),
            90. - infections,
            max_relative = tol
        );
        assert_relative_eq!(
            traj.compartment(SirCompartment::Infectious),
            10. + infections - 2.,
            max_relative = tol
        );
        assert_relative_eq!(traj.population(), 100., max_relative = 1e-12);
    }

    #[test]
    fn deterministic_infections_capped_at_susceptible() {
        let model = SirOffspring::new(SimulationMode::Deterministic);
        let mut traj = Trajectory::sir(1., 100., 0., 6);
        let mut rng = StdRng::seed_from_u64(0);

        // beta * S * I * dt = 100 new infections wanted, one susceptible left
        model
            .simulate(&params(2., 1., 0.5), &mut traj, 0..6, 1., &mut rng)
            .unwrap();

        let tol = 1e-12;
        assert_eq!(traj.compartment(SirCompartment::Susceptible), 0.);
        assert_relative_eq!(traj.population(), 101., max_relative = tol);
        assert_relative_eq!(traj.incidence()[0], 50., max_relative = tol);
        // Without susceptibles, I halves every step
        assert_relative_eq!(traj.incidence()[1], 25.5, max_relative = tol);
        assert_relative_eq!(traj.incidence()[2], 12.75, max_relative = tol);
        assert_relative_eq!(
            traj.compartment(SirCompartment::Recovered),
            traj.total_incidence(0..6),
            max_relative = tol
        );
        assert_relative_eq!(
            traj.compartment(SirCompartment::Infectious),
            51. / 32.,
            max_relative = tol
        );
    }

    #[test]
    fn no_infectious_is_noop() {
        let model = SirOffspring::default();
        let mut traj = Trajectory::sir(100., 0., 5., 10);
        let before = traj.clone();
        let mut rng = StdRng::seed_from_u64(1);

        model
            .simulate(&params(3., 0.1, 0.5), &mut traj, 0..10, 1., &mut rng)
            .unwrap();
        assert_eq!(traj, before);
    }

    #[test]
    fn extinction_zeroes_remaining_steps() {
        for mode in [SimulationMode::Deterministic, SimulationMode::Stochastic] {
            let model = SirOffspring::new(mode);
            let mut traj = Trajectory::sir(50., 4., 0., 6);
            let mut rng = StdRng::seed_from_u64(7);

            // Everyone recovers in the first step and nobody is infected
            model
                .simulate(&params(0., 1., 1.), &mut traj, 0..6, 1., &mut rng)
                .unwrap();

            assert_eq!(traj.state(), &[50., 0., 4.]);
            assert_eq!(traj.incidence(), &[4., 0., 0., 0., 0., 0.]);
            assert_eq!(traj.coalescent_rates(), &[0.; 6]);
        }
    }

    #[test]
    fn window_must_fit() {
        let model = SirOffspring::default();
        let mut traj = Trajectory::sir(50., 4., 0., 3);
        let mut rng = StdRng::seed_from_u64(7);
        let err = model
            .simulate(&params(2., 1., 1.), &mut traj, 2..7, 1., &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::WindowTooLong {
                window: 5,
                capacity: 3
            }
        ));
    }

    #[test]
    fn invalid_dispersion_is_an_error() {
        let model = SirOffspring::new(SimulationMode::Stochastic);
        let mut traj = Trajectory::sir(50., 4., 0., 3);
        let mut rng = StdRng::seed_from_u64(7);
        let err = model
            .simulate(&params(2., -1., 1.), &mut traj, 0..3, 1., &mut rng)
            .unwrap_err();
        assert!(matches!(err, SimulationError::Gamma(_)));
    }

    #[test]
    fn offspring_mean_and_overdispersion() {
        let mut rng = StdRng::seed_from_u64(123);
        let draws: Vec<f64> = (0..20_000)
            .map(|_| draw_offspring(1., 2., 0.5, &mut rng).unwrap())
            .collect();
        let n = draws.len() as f64;
        let mean = draws.iter().sum::<f64>() / n;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.);

        // Negative binomial with mean R has variance R + R^2 / k = 10
        assert!((mean - 2.).abs() < 0.15, "mean {}", mean);
        assert!(var > 6., "variance {}", var);
        assert!(draws.iter().all(|x| x.fract() == 0. && *x >= 0.));
    }

    #[test]
    fn stochastic_is_reproducible() {
        let model = SirOffspring::new(SimulationMode::Stochastic);
        let run = |seed| {
            let mut traj = Trajectory::sir(500., 5., 0., 30);
            let mut rng = StdRng::seed_from_u64(seed);
            model
                .simulate(&params(2.5, 0.3, 0.4), &mut traj, 0..30, 0.5, &mut rng)
                .unwrap();
            traj
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn coalescent_rates_after_extinction_stay_zero() {
        let model = SirOffspring::new(SimulationMode::Stochastic);
        for seed in 0..50 {
            let mut traj = Trajectory::sir(200., 2., 0., 40);
            let mut rng = StdRng::seed_from_u64(seed);
            model
                .simulate(&params(0.8, 0.2, 0.5), &mut traj, 0..40, 1., &mut rng)
                .unwrap();

            if let Some(first_zero) = traj.coalescent_rates().iter().position(|&r| r == 0.) {
                assert_eq!(traj.compartment(SirCompartment::Infectious), 0.);
                assert!(traj.coalescent_rates()[first_zero..].iter().all(|&r| r == 0.));
                assert!(traj.incidence()[first_zero + 1..].iter().all(|&x| x == 0.));
            } else {
                assert!(traj.compartment(SirCompartment::Infectious) > 0.);
            }
        }
    }

    proptest! {
        #[test]
        fn stochastic_steps_conserve_population(
            seed in any::<u64>(),
            susceptible in 0u32..2000,
            infectious in 1u32..50,
            reproduction_number in 0.1f64..5.,
            dispersion in 0.05f64..5.,
            recovery_rate in 0.05f64..1.5,
        ) {
            let model = SirOffspring::new(SimulationMode::Stochastic);
            let mut traj = Trajectory::sir(susceptible as f64, infectious as f64, 0., 1);
            let mut rng = StdRng::seed_from_u64(seed);
            let total = traj.population();
            let p = params(reproduction_number, dispersion, recovery_rate);

            for step in 0..30 {
                let before = traj.state().to_vec();
                model.simulate(&p, &mut traj, step..step + 1, 1., &mut rng).unwrap();
                let after = traj.state();

                prop_assert_eq!(after.iter().sum::<f64>(), total);
                prop_assert!(after.iter().all(|&x| x >= 0. && x.fract() == 0.));
                // Recoveries never exceed I, infections never exceed S
                let recoveries = after[R] - before[R];
                prop_assert!(recoveries <= before[I]);
                prop_assert!(before[S] - after[S] <= before[S]);
                if before[I] >= 1. {
                    prop_assert_eq!(traj.incidence()[0], recoveries);
                }
            }
        }

        #[test]
        fn deterministic_steps_conserve_population(
            susceptible in 0f64..2000.,
            infectious in 1f64..200.,
            reproduction_number in 0.1f64..8.,
            dispersion in 0.05f64..5.,
            recovery_rate in 0.05f64..1.5,
            step_size in 0.1f64..2.,
        ) {
            let model = SirOffspring::new(SimulationMode::Deterministic);
            let mut traj = Trajectory::sir(susceptible, infectious, 0., 1);
            let mut rng = StdRng::seed_from_u64(0);
            let total = traj.population();
            let p = params(reproduction_number, dispersion, recovery_rate);

            for step in 0..30 {
                let before = traj.state().to_vec();
                model.simulate(&p, &mut traj, step..step + 1, step_size, &mut rng).unwrap();
                let after = traj.state();

                assert_relative_eq!(after.iter().sum::<f64>(), total, max_relative = 1e-9);
                prop_assert!(after.iter().all(|&x| x >= 0.));
                let recoveries = after[R] - before[R];
                let infections = before[S] - after[S];
                prop_assert!(recoveries <= before[I] * (1. + 1e-12));
                prop_assert!(infections >= 0. && infections <= before[S]);
            }
        }
    }
}
