use crate::solvers::tsit5_tableau as tb;
use crate::traits::DynamicalSystem;
use log::{debug, trace};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the grid integrator. A `SolverFailure` is fatal for
/// the whole call: no partial trajectory is ever returned.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("solver failure at t = {t}: {reason}")]
    SolverFailure { t: f64, reason: String },
}

/// Tolerances and budgets for the adaptive integrator.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntegrationSettings {
    /// Relative tolerance of the embedded error estimate.
    pub rtol: f64,
    /// Absolute tolerance of the embedded error estimate.
    pub atol: f64,
    /// First trial step; derived from the grid spacing when `None`.
    pub initial_step: Option<f64>,
    /// Total internal step budget (accepted and rejected) per call.
    pub max_steps: usize,
    /// Steps below this size abort the run instead of stalling it.
    pub min_step: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-9,
            atol: 1e-12,
            initial_step: None,
            max_steps: 10_000_000,
            min_step: 1e-14,
        }
    }
}

/// Builds the uniform time grid `points` samples long spanning [t0, t1].
pub fn time_grid(t0: f64, t1: f64, points: usize) -> Result<Vec<f64>, IntegrationError> {
    if points < 2 {
        return Err(IntegrationError::InvalidArgument(
            "time grid needs at least two points".into(),
        ));
    }
    if !(t1 > t0) || !t0.is_finite() || !t1.is_finite() {
        return Err(IntegrationError::InvalidArgument(
            "time grid bounds must be finite with t1 > t0".into(),
        ));
    }
    let span = t1 - t0;
    let last = points - 1;
    Ok((0..points)
        .map(|i| {
            if i == last {
                t1
            } else {
                t0 + span * (i as f64 / last as f64)
            }
        })
        .collect())
}

/// A solution sampled on the requested time grid.
///
/// `data` is row-major T×D: `data[t * dim + c]` is component `c` at time
/// step `t`. Row 0 is the initial state verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub dim: usize,
    pub data: Vec<f64>,
    /// Internal adaptive steps taken, accepted and rejected. A solver-effort
    /// diagnostic only; it does not affect the sampled values.
    pub steps: usize,
}

impl Trajectory {
    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The state at time step `t`.
    pub fn row(&self, t: usize) -> &[f64] {
        &self.data[t * self.dim..(t + 1) * self.dim]
    }

    /// The time series of component `c`.
    pub fn component(&self, c: usize) -> Vec<f64> {
        (0..self.len()).map(|t| self.data[t * self.dim + c]).collect()
    }
}

/// Tsitouras 5(4) trial step with FSAL reuse. `k[0]` must hold the
/// derivative at the current (t, y) on entry; after an accepted step the
/// caller promotes `k[6]` into `k[0]`.
struct EmbeddedTsit5 {
    k: [Vec<f64>; 7],
    tmp: Vec<f64>,
    y_next: Vec<f64>,
}

impl EmbeddedTsit5 {
    fn new(dim: usize) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; dim]),
            tmp: vec![0.0; dim],
            y_next: vec![0.0; dim],
        }
    }

    /// Computes the 5th-order update and the weighted RMS norm of the
    /// embedded 4th-order error estimate. Does not modify `y`.
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: f64,
        y: &[f64],
        h: f64,
        rtol: f64,
        atol: f64,
    ) -> f64 {
        let dim = y.len();

        for i in 0..dim {
            self.tmp[i] = y[i] + h * tb::A21 * self.k[0][i];
        }
        system.apply(t + tb::C2 * h, &self.tmp, &mut self.k[1]);

        for i in 0..dim {
            self.tmp[i] = y[i] + h * (tb::A31 * self.k[0][i] + tb::A32 * self.k[1][i]);
        }
        system.apply(t + tb::C3 * h, &self.tmp, &mut self.k[2]);

        for i in 0..dim {
            self.tmp[i] = y[i]
                + h * (tb::A41 * self.k[0][i] + tb::A42 * self.k[1][i] + tb::A43 * self.k[2][i]);
        }
        system.apply(t + tb::C4 * h, &self.tmp, &mut self.k[3]);

        for i in 0..dim {
            self.tmp[i] = y[i]
                + h * (tb::A51 * self.k[0][i]
                    + tb::A52 * self.k[1][i]
                    + tb::A53 * self.k[2][i]
                    + tb::A54 * self.k[3][i]);
        }
        system.apply(t + tb::C5 * h, &self.tmp, &mut self.k[4]);

        for i in 0..dim {
            self.tmp[i] = y[i]
                + h * (tb::A61 * self.k[0][i]
                    + tb::A62 * self.k[1][i]
                    + tb::A63 * self.k[2][i]
                    + tb::A64 * self.k[3][i]
                    + tb::A65 * self.k[4][i]);
        }
        system.apply(t + tb::C6 * h, &self.tmp, &mut self.k[5]);

        for i in 0..dim {
            self.y_next[i] = y[i]
                + h * (tb::B1 * self.k[0][i]
                    + tb::B2 * self.k[1][i]
                    + tb::B3 * self.k[2][i]
                    + tb::B4 * self.k[3][i]
                    + tb::B5 * self.k[4][i]
                    + tb::B6 * self.k[5][i]);
        }
        // FSAL stage at the candidate endpoint.
        system.apply(t + h, &self.y_next, &mut self.k[6]);

        let mut accum = 0.0;
        for i in 0..dim {
            let err = h
                * (tb::E1 * self.k[0][i]
                    + tb::E2 * self.k[1][i]
                    + tb::E3 * self.k[2][i]
                    + tb::E4 * self.k[3][i]
                    + tb::E5 * self.k[4][i]
                    + tb::E6 * self.k[5][i]
                    + tb::E7 * self.k[6][i]);
            let scale = atol + rtol * y[i].abs().max(self.y_next[i].abs());
            let ratio = err / scale;
            accum += ratio * ratio;
        }
        (accum / dim as f64).sqrt()
    }
}

fn validate(
    dim: usize,
    y0: &[f64],
    times: &[f64],
    settings: &IntegrationSettings,
) -> Result<(), IntegrationError> {
    let invalid = |msg: &str| Err(IntegrationError::InvalidArgument(msg.into()));

    if y0.len() != dim {
        return Err(IntegrationError::InvalidArgument(format!(
            "initial state has dimension {}, system expects {}",
            y0.len(),
            dim
        )));
    }
    if y0.iter().any(|v| !v.is_finite()) {
        return invalid("initial state must be finite");
    }
    if times.len() < 2 {
        return invalid("time grid needs at least two points");
    }
    if times.iter().any(|t| !t.is_finite()) {
        return invalid("time grid must be finite");
    }
    if times.windows(2).any(|w| !(w[1] > w[0])) {
        return invalid("time grid must be strictly increasing");
    }
    if !(settings.rtol > 0.0) || !(settings.atol >= 0.0) {
        return invalid("rtol must be positive and atol non-negative");
    }
    if settings.max_steps == 0 {
        return invalid("max_steps must be at least 1");
    }
    if !(settings.min_step > 0.0) {
        return invalid("min_step must be positive");
    }
    if let Some(h0) = settings.initial_step {
        if !(h0 > 0.0) || !h0.is_finite() {
            return invalid("initial_step must be positive and finite");
        }
    }
    Ok(())
}

/// Integrates `system` from `y0` across `times`, returning the solution
/// sampled exactly at the grid points.
///
/// Internally takes adaptive Tsitouras 5(4) steps as fine as the error
/// control demands, clamping each step so it lands on the next requested
/// time; the caller never chooses a step size. Row 0 of the result is the
/// initial state, copied verbatim.
pub fn integrate_grid(
    system: &impl DynamicalSystem<f64>,
    y0: &[f64],
    times: &[f64],
    settings: &IntegrationSettings,
) -> Result<Trajectory, IntegrationError> {
    let dim = system.dimension();
    validate(dim, y0, times, settings)?;

    let mut data = vec![0.0; times.len() * dim];
    data[..dim].copy_from_slice(y0);

    let mut stepper = EmbeddedTsit5::new(dim);
    let mut y = y0.to_vec();
    let mut t = times[0];
    let mut h = settings
        .initial_step
        .unwrap_or(((times[1] - times[0]) / 10.0).max(settings.min_step));
    let mut steps_used = 0usize;
    let mut rejected = 0usize;

    system.apply(t, &y, &mut stepper.k[0]);

    for (row, &t_target) in times.iter().enumerate().skip(1) {
        while t < t_target {
            if steps_used >= settings.max_steps {
                return Err(IntegrationError::SolverFailure {
                    t,
                    reason: format!(
                        "step budget of {} exhausted ({} rejections)",
                        settings.max_steps, rejected
                    ),
                });
            }
            if h < settings.min_step {
                return Err(IntegrationError::SolverFailure {
                    t,
                    reason: format!("step size underflow below {:e}", settings.min_step),
                });
            }

            let clamped = h >= t_target - t;
            let h_trial = if clamped { t_target - t } else { h };

            let err = stepper.try_step(system, t, &y, h_trial, settings.rtol, settings.atol);
            steps_used += 1;

            if !err.is_finite() {
                // State blew up inside the step; retry much smaller.
                rejected += 1;
                trace!("non-finite error estimate at t = {t}, shrinking step");
                h = h_trial * 0.2;
                continue;
            }

            if err <= 1.0 {
                std::mem::swap(&mut y, &mut stepper.y_next);
                t = if clamped { t_target } else { t + h_trial };
                stepper.k.swap(0, 6);
                let factor = if err == 0.0 {
                    5.0
                } else {
                    (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
                };
                // A clamped trial says nothing about the working step size;
                // keep the controller's larger estimate across output points.
                let grown = h_trial * factor;
                h = if clamped { h.max(grown) } else { grown };
            } else {
                rejected += 1;
                trace!("rejected step of size {h_trial:e} at t = {t} (err = {err:.3})");
                h = h_trial * (0.9 * err.powf(-0.2)).clamp(0.2, 1.0);
            }
        }

        data[row * dim..(row + 1) * dim].copy_from_slice(&y);
    }

    debug!(
        "integrated {} output points with {} internal steps ({} rejected)",
        times.len(),
        steps_used,
        rejected
    );

    Ok(Trajectory {
        times: times.to_vec(),
        dim,
        data,
        steps: steps_used,
    })
}
