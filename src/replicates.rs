use std::{io::Write, iter::StepBy, ops::Range, time::Instant};

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::{prelude::*, ThreadPoolBuilder};

use crate::{model::EpidemicModel, trajectory::Trajectory};

/// Settings for a batch of independent replicate simulations.
#[derive(Debug, Clone, Copy)]
pub struct ReplicateSettings {
    /// The number of replicate simulations.
    pub num_replicates: usize,
    /// The number of worker threads. Worker `w` simulates the replicates
    /// `w, w + num_workers, w + 2 * num_workers, ...`.
    pub num_workers: usize,
    /// The number of simulation steps of every replicate.
    pub num_steps: usize,
    /// Length of a simulation step in units of time.
    pub step_size: f64,
    /// The number of simulation steps in one reporting interval of the output.
    pub sum_every: usize,
    /// Base seed. Each worker draws from its own stream of this seed.
    pub seed: u64,
}

impl Default for ReplicateSettings {
    fn default() -> Self {
        Self {
            num_replicates: 1,
            num_workers: 1,
            num_steps: 100,
            step_size: 1f64,
            sum_every: 1,
            seed: 0,
        }
    }
}

impl ReplicateSettings {
    fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            bail!("At least one worker is required");
        }
        if self.sum_every == 0 {
            bail!("Reporting intervals must span at least one step");
        }
        if !(self.step_size > 0f64) {
            bail!("Step size must be positive, got {}", self.step_size);
        }
        Ok(())
    }

    /// Workers that get at least one replicate.
    fn active_workers(&self) -> usize {
        self.num_workers.min(self.num_replicates)
    }
}

/// The replicate indices simulated by `worker`, in the order it runs them.
pub fn worker_replicates(
    worker: usize,
    num_workers: usize,
    num_replicates: usize,
) -> StepBy<Range<usize>> {
    (worker.min(num_replicates)..num_replicates).step_by(num_workers.max(1))
}

/// The random stream owned by `worker` for its whole lifetime.
pub fn worker_rng(seed: u64, worker: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(worker as u64);
    rng
}

/// Interleave the sequential outputs of all workers back into replicate
/// order. Replicate `i` is taken from worker `i % num_workers`.
pub fn merge_round_robin<T>(per_worker: Vec<Vec<T>>, num_replicates: usize) -> Vec<T> {
    let num_workers = per_worker.len();
    if num_workers == 0 {
        return Vec::new();
    }
    let mut workers = per_worker.into_iter().map(Vec::into_iter).collect_vec();
    (0..num_replicates)
        .map_while(|replicate| workers[replicate % num_workers].next())
        .collect()
}

/// Summed incidence of every replicate, in replicate order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateOutput {
    rows: Vec<Box<[f64]>>,
}

impl ReplicateOutput {
    pub fn rows(&self) -> &[Box<[f64]>] {
        &self.rows
    }

    pub fn num_replicates(&self) -> usize {
        self.rows.len()
    }

    /// Write one line per replicate with the comma separated incidence of
    /// every reporting interval.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for (replicate, row) in self.rows.iter().enumerate() {
            let line = row.iter().map(|&value| format_value(value)).join(",");
            writeln!(writer, "{}", line)
                .with_context(|| format!("Failed to write replicate {}", replicate))?;
        }
        writer.flush().context("Failed to flush replicate output")?;
        Ok(())
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else if value == f64::INFINITY {
        "Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn run_worker<M: EpidemicModel>(
    model: &M,
    params: &M::Params,
    initial: &Trajectory,
    settings: &ReplicateSettings,
    worker: usize,
) -> Result<Vec<Box<[f64]>>> {
    let mut rng = worker_rng(settings.seed, worker);
    let mut trajectory = initial.clone();
    trajectory.resize(settings.num_steps);

    let now = Instant::now();
    let replicates = worker_replicates(worker, settings.num_workers, settings.num_replicates);
    let mut rows = Vec::with_capacity(replicates.len());
    for replicate in replicates {
        trajectory.reset();
        model
            .simulate(
                params,
                &mut trajectory,
                0..settings.num_steps,
                settings.step_size,
                &mut rng,
            )
            .with_context(|| format!("Replicate {} failed on worker {}", replicate, worker))?;
        log::debug!(
            "Worker {} finished replicate {} with {} cases",
            worker,
            replicate,
            trajectory.total_incidence(0..settings.num_steps)
        );
        rows.push(trajectory.summed_incidence(settings.sum_every).into());
    }
    log::debug!(
        "Worker {} finished {} replicates in {:?}",
        worker,
        rows.len(),
        now.elapsed()
    );
    Ok(rows)
}

/// Simulate `settings.num_replicates` independent epidemics from the same
/// initial state and parameters on a pool of worker threads.
///
/// Every worker owns one trajectory and one random stream for all of its
/// replicates, so the output only depends on the settings, never on the
/// order in which workers finish.
pub fn run_replicates<M: EpidemicModel>(
    model: &M,
    params: &M::Params,
    initial: &Trajectory,
    settings: &ReplicateSettings,
) -> Result<ReplicateOutput> {
    settings.validate().context("Invalid replicate settings")?;
    let num_workers = settings.active_workers();
    if num_workers == 0 {
        return Ok(ReplicateOutput { rows: Vec::new() });
    }

    log::info!(
        "Simulating {} replicates of {} steps on {} workers",
        settings.num_replicates,
        settings.num_steps,
        num_workers
    );
    let start = Instant::now();

    let pool = ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("epigen-worker-{}", i))
        .build()
        .context("Could not start thread pool")?;

    let per_worker: Vec<Vec<Box<[f64]>>> = pool.install(|| {
        (0..num_workers)
            .into_par_iter()
            .map(|worker| run_worker(model, params, initial, settings, worker))
            .collect::<Result<_>>()
    })?;

    let rows = merge_round_robin(per_worker, settings.num_replicates);
    log::info!(
        "Finished {} replicates in {:?}",
        rows.len(),
        start.elapsed()
    );
    Ok(ReplicateOutput { rows })
}
