//! Batched parameter sweeps and bifurcation diagram extraction.

use crate::extrema::{local_maxima, local_minima};
use crate::integrate::{integrate_grid, IntegrationSettings, Trajectory};
use crate::lorenz::LorenzSweep;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::Serialize;

/// A batched trajectory of N independent instances, stored in the flat
/// component-block layout documented on [`LorenzSweep`]: column `c * N + i`
/// of the underlying T×3N trajectory is component `c` of instance `i`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchTrajectory {
    pub trajectory: Trajectory,
    pub instances: usize,
}

impl BatchTrajectory {
    pub fn new(trajectory: Trajectory, instances: usize) -> Result<Self> {
        if instances == 0 {
            bail!("Batch must contain at least one instance.");
        }
        if trajectory.dim != 3 * instances {
            bail!(
                "Trajectory dimension {} does not match {} instances of a 3-variable system.",
                trajectory.dim,
                instances
            );
        }
        Ok(Self {
            trajectory,
            instances,
        })
    }

    /// The time series of one component (0 = x, 1 = y, 2 = z) of one instance.
    pub fn component_series(&self, instance: usize, component: usize) -> Vec<f64> {
        self.trajectory.component(component * self.instances + instance)
    }

    /// The (x, y, z) state of one instance at one time step.
    pub fn instance_state(&self, instance: usize, step: usize) -> [f64; 3] {
        LorenzSweep::unpack_state(self.trajectory.row(step), self.instances, instance)
    }
}

/// Integrates every instance of a sweep in one call, starting each from the
/// same initial state.
pub fn integrate_sweep(
    sweep: &LorenzSweep,
    initial: [f64; 3],
    times: &[f64],
    settings: &IntegrationSettings,
) -> Result<BatchTrajectory> {
    let n = sweep.instances();
    let y0 = LorenzSweep::pack_states(&vec![initial; n]);
    let trajectory = integrate_grid(sweep, &y0, times, settings)
        .with_context(|| format!("Failed to integrate sweep of {n} instances."))?;
    BatchTrajectory::new(trajectory, n)
}

/// The long-time z-extrema observed at one swept ρ value.
#[derive(Debug, Clone, Serialize)]
pub struct BifurcationBranch {
    pub rho: f64,
    pub maxima: Vec<f64>,
    pub minima: Vec<f64>,
}

/// Builds bifurcation diagram data: integrates the whole ρ sweep as one
/// batch, discards the first `discard` samples of each z series as
/// transient, and records the values at order-k local extrema.
pub fn bifurcation_scan(
    rho_values: &[f64],
    sigma: f64,
    beta: f64,
    initial: [f64; 3],
    times: &[f64],
    discard: usize,
    order: usize,
    settings: &IntegrationSettings,
) -> Result<Vec<BifurcationBranch>> {
    if discard + 2 * order + 1 > times.len() {
        bail!(
            "Discarding {} of {} samples leaves no room for an order-{} window.",
            discard,
            times.len(),
            order
        );
    }

    let sweep = LorenzSweep::new(rho_values.to_vec(), sigma, beta)?;
    let batch = integrate_sweep(&sweep, initial, times, settings)?;
    debug!(
        "bifurcation scan: {} instances, {} samples each, discarding {}",
        sweep.instances(),
        times.len(),
        discard
    );

    let mut branches = Vec::with_capacity(rho_values.len());
    for (i, &rho) in rho_values.iter().enumerate() {
        let z = batch.component_series(i, 2);
        let settled = &z[discard..];
        let maxima = local_maxima(settled, order)?
            .into_iter()
            .map(|idx| settled[idx])
            .collect();
        let minima = local_minima(settled, order)?
            .into_iter()
            .map(|idx| settled[idx])
            .collect();
        branches.push(BifurcationBranch { rho, maxima, minima });
    }
    Ok(branches)
}
