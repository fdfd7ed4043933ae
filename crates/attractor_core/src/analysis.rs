//! Chaos diagnostics: Lyapunov exponent estimation over the tangent flow,
//! Kaplan-Yorke dimension, and pairwise trajectory divergence.

use crate::integrate::Trajectory;
use crate::solvers::{Tsit5, RK4};
use crate::traits::{DynamicalSystem, Linearized, Steppable};
use anyhow::{anyhow, bail, Result};
use nalgebra::linalg::QR;
use nalgebra::DMatrix;
use serde::Serialize;

/// Fixed-step scheme used to advance the augmented tangent system.
#[derive(Debug, Clone, Copy)]
pub enum TangentStepper {
    Rk4,
    Tsit5,
}

impl TangentStepper {
    fn build(self, dim: usize) -> InternalStepper {
        match self {
            TangentStepper::Rk4 => InternalStepper::Rk4(RK4::new(dim)),
            TangentStepper::Tsit5 => InternalStepper::Tsit5(Tsit5::new(dim)),
        }
    }
}

enum InternalStepper {
    Rk4(RK4<f64>),
    Tsit5(Tsit5<f64>),
}

impl InternalStepper {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) {
        match self {
            InternalStepper::Rk4(s) => s.step(system, t, state, dt),
            InternalStepper::Tsit5(s) => s.step(system, t, state, dt),
        }
    }
}

/// The variational (tangent) flow of a linearized system: the augmented
/// state is `[y, Φ]` with Φ a row-major D×D fundamental matrix, evolving as
/// dy/dt = f(y), dΦ/dt = J(y)·Φ.
pub struct TangentFlow<S> {
    inner: S,
    dim: usize,
}

impl<S: Linearized<f64>> TangentFlow<S> {
    pub fn new(inner: S) -> Self {
        let dim = inner.dimension();
        Self { inner, dim }
    }
}

impl<S: Linearized<f64>> DynamicalSystem<f64> for TangentFlow<S> {
    fn dimension(&self) -> usize {
        self.dim + self.dim * self.dim
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let n = self.dim;
        self.inner.apply(t, &x[..n], &mut out[..n]);

        let mut jacobian = vec![0.0; n * n];
        self.inner.jacobian(t, &x[..n], &mut jacobian);

        // dΦ/dt = J·Φ, all row-major.
        let phi = &x[n..];
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for k in 0..n {
                    sum += jacobian[i * n + k] * phi[k * n + j];
                }
                out[n + i * n + j] = sum;
            }
        }
    }
}

/// Time-averaged Lyapunov exponents, largest first in the QR ordering.
#[derive(Debug, Clone, Serialize)]
pub struct LyapunovSpectrum {
    pub exponents: Vec<f64>,
    pub total_time: f64,
}

/// Estimates the full Lyapunov spectrum by integrating the tangent flow
/// with a fixed-step scheme and re-orthonormalizing the fundamental matrix
/// by QR every `qr_stride` steps, accumulating ln |r_ii|.
pub fn lyapunov_exponents<S: Linearized<f64>>(
    system: S,
    stepper: TangentStepper,
    initial_state: &[f64],
    initial_time: f64,
    steps: usize,
    dt: f64,
    qr_stride: usize,
) -> Result<LyapunovSpectrum> {
    let dim = system.dimension();
    if initial_state.len() != dim {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            dim,
            initial_state.len()
        );
    }
    if steps == 0 {
        bail!("Lyapunov estimation requires at least one integration step.");
    }
    if !(dt > 0.0) {
        bail!("Step size dt must be positive.");
    }
    if qr_stride == 0 {
        bail!("qr_stride must be at least 1.");
    }

    let flow = TangentFlow::new(system);
    let aug_dim = dim + dim * dim;
    let mut state = vec![0.0; aug_dim];
    state[..dim].copy_from_slice(initial_state);
    for i in 0..dim {
        state[dim + i * dim + i] = 1.0;
    }

    let mut internal = stepper.build(aug_dim);
    let mut accum = vec![0.0; dim];
    let mut t = initial_time;
    let mut since_qr = 0usize;

    for step in 1..=steps {
        internal.step(&flow, &mut t, &mut state, dt);
        since_qr += 1;
        if since_qr == qr_stride || step == steps {
            reorthonormalize(&mut state[dim..], dim, &mut accum)?;
            since_qr = 0;
        }
    }

    let total_time = steps as f64 * dt;
    for value in &mut accum {
        *value /= total_time;
    }

    Ok(LyapunovSpectrum {
        exponents: accum,
        total_time,
    })
}

/// QR-factors the row-major fundamental matrix in place, replacing it with
/// the orthonormal factor and adding ln |r_ii| into `accum`.
fn reorthonormalize(phi: &mut [f64], dim: usize, accum: &mut [f64]) -> Result<()> {
    let matrix = DMatrix::from_row_slice(dim, dim, phi);
    let (q, r) = QR::new(matrix).unpack();
    for i in 0..dim {
        let diag = r[(i, i)].abs();
        if diag <= f64::EPSILON {
            return Err(anyhow!(
                "Tangent matrix became near-singular during orthonormalization."
            ));
        }
        accum[i] += diag.ln();
    }
    for i in 0..dim {
        for j in 0..dim {
            phi[i * dim + j] = q[(i, j)];
        }
    }
    Ok(())
}

/// Kaplan-Yorke (Lyapunov) dimension of a spectrum.
pub fn kaplan_yorke(exponents: &[f64]) -> f64 {
    let mut sorted = exponents.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut partial = 0.0;
    for (idx, &lambda) in sorted.iter().enumerate() {
        if partial + lambda < 0.0 {
            if lambda.abs() <= f64::EPSILON {
                return idx as f64;
            }
            return idx as f64 + partial / lambda.abs();
        }
        partial += lambda;
    }
    sorted.len() as f64
}

/// Euclidean distance between two trajectories at every shared time step.
/// Both must be sampled on the same grid with the same dimension.
pub fn trajectory_divergence(a: &Trajectory, b: &Trajectory) -> Result<Vec<f64>> {
    if a.dim != b.dim {
        bail!("Trajectories have mismatched dimensions ({} vs {}).", a.dim, b.dim);
    }
    if a.times != b.times {
        bail!("Trajectories are sampled on different time grids.");
    }
    Ok((0..a.len())
        .map(|t| {
            a.row(t)
                .iter()
                .zip(b.row(t))
                .map(|(p, q)| (p - q) * (p - q))
                .sum::<f64>()
                .sqrt()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{
        kaplan_yorke, lyapunov_exponents, trajectory_divergence, TangentStepper,
    };
    use crate::integrate::{integrate_grid, time_grid, IntegrationSettings};
    use crate::lorenz::{Lorenz, LorenzParams};
    use crate::traits::{DynamicalSystem, Linearized};

    #[derive(Clone, Copy)]
    struct LinearSystem {
        rate: f64,
    }

    impl DynamicalSystem<f64> for LinearSystem {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = self.rate * x[0];
        }
    }

    impl Linearized<f64> for LinearSystem {
        fn jacobian(&self, _t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = self.rate;
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn lyapunov_rejects_invalid_inputs() {
        let system = LinearSystem { rate: 1.0 };
        assert_err_contains(
            lyapunov_exponents(system, TangentStepper::Rk4, &[1.0, 2.0], 0.0, 10, 0.1, 1),
            "dimension mismatch",
        );
        assert_err_contains(
            lyapunov_exponents(system, TangentStepper::Rk4, &[1.0], 0.0, 0, 0.1, 1),
            "at least one integration step",
        );
        assert_err_contains(
            lyapunov_exponents(system, TangentStepper::Rk4, &[1.0], 0.0, 10, 0.0, 1),
            "dt must be positive",
        );
        assert_err_contains(
            lyapunov_exponents(system, TangentStepper::Rk4, &[1.0], 0.0, 10, 0.1, 0),
            "qr_stride",
        );
    }

    #[test]
    fn lyapunov_recovers_a_linear_rate() {
        let system = LinearSystem { rate: -1.0 };
        let spectrum =
            lyapunov_exponents(system, TangentStepper::Rk4, &[1.0], 0.0, 100, 0.05, 1)
                .expect("spectrum should compute");
        assert!((spectrum.exponents[0] + 1.0).abs() < 1e-2);
        assert!((spectrum.total_time - 5.0).abs() < 1e-12);
    }

    #[test]
    fn lorenz_spectrum_matches_known_structure() {
        let system = Lorenz::new(LorenzParams::default());
        let spectrum = lyapunov_exponents(
            system,
            TangentStepper::Tsit5,
            &[1.0, 1.0, 1.0],
            0.0,
            60_000,
            0.005,
            10,
        )
        .expect("spectrum should compute");

        // Reference values at (28, 10, 8/3): roughly (0.906, 0, -14.57).
        assert!(
            spectrum.exponents[0] > 0.7 && spectrum.exponents[0] < 1.1,
            "largest exponent {} out of range",
            spectrum.exponents[0]
        );
        assert!(spectrum.exponents[1].abs() < 0.1);

        // The exponent sum equals the divergence -σ - 1 - β.
        let sum: f64 = spectrum.exponents.iter().sum();
        assert!((sum + 10.0 + 1.0 + 8.0 / 3.0).abs() < 0.5, "sum = {sum}");
    }

    #[test]
    fn kaplan_yorke_matches_hand_computation() {
        assert_eq!(kaplan_yorke(&[]), 0.0);
        let dimension = kaplan_yorke(&[0.9, 0.0, -14.57]);
        assert!((dimension - (2.0 + 0.9 / 14.57)).abs() < 1e-12);
        // A fully contracting spectrum has dimension 0.
        assert_eq!(kaplan_yorke(&[-1.0, -2.0]), 0.0);
    }

    #[test]
    fn nearby_lorenz_trajectories_diverge() {
        let system = Lorenz::new(LorenzParams::default());
        let grid = time_grid(0.0, 50.0, 5000).unwrap();
        let settings = IntegrationSettings::default();
        let a = integrate_grid(&system, &[1.0, 1.0, 1.0], &grid, &settings).unwrap();
        let b = integrate_grid(&system, &[1.001, 1.0, 1.0], &grid, &settings).unwrap();

        let divergence = trajectory_divergence(&a, &b).expect("grids match");
        assert!((divergence[0] - 1e-3).abs() < 1e-12);
        let peak = divergence.iter().cloned().fold(0.0, f64::max);
        assert!(peak > 1.0, "expected macroscopic divergence, got {peak}");
    }

    #[test]
    fn divergence_rejects_mismatched_grids() {
        let system = Lorenz::new(LorenzParams::default());
        let settings = IntegrationSettings::default();
        let a = integrate_grid(
            &system,
            &[1.0, 1.0, 1.0],
            &time_grid(0.0, 1.0, 10).unwrap(),
            &settings,
        )
        .unwrap();
        let b = integrate_grid(
            &system,
            &[1.0, 1.0, 1.0],
            &time_grid(0.0, 1.0, 20).unwrap(),
            &settings,
        )
        .unwrap();
        assert_err_contains(trajectory_divergence(&a, &b), "different time grids");
    }
}
