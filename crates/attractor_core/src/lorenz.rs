use crate::traits::{DynamicalSystem, Linearized, Scalar};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Parameters of the Lorenz system.
///
/// ρ (rho) is the convection parameter, σ (sigma) the Prandtl-like
/// parameter, and β (beta) the geometric parameter. The classic chaotic
/// regime is (ρ, σ, β) = (28, 10, 8/3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LorenzParams {
    pub rho: f64,
    pub sigma: f64,
    pub beta: f64,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            rho: 28.0,
            sigma: 10.0,
            beta: 8.0 / 3.0,
        }
    }
}

impl LorenzParams {
    pub fn new(rho: f64, sigma: f64, beta: f64) -> Self {
        Self { rho, sigma, beta }
    }
}

/// The Lorenz vector field:
///
///   dx/dt = σ(y − x)
///   dy/dt = x(ρ − z) − y
///   dz/dt = xy − βz
///
/// Parameters are held by value and never mutated during a run.
#[derive(Debug, Clone, Copy)]
pub struct Lorenz {
    pub params: LorenzParams,
}

impl Lorenz {
    pub fn new(params: LorenzParams) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for Lorenz {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let rho = T::from_f64(self.params.rho).unwrap();
        let sigma = T::from_f64(self.params.sigma).unwrap();
        let beta = T::from_f64(self.params.beta).unwrap();

        out[0] = sigma * (x[1] - x[0]);
        out[1] = x[0] * (rho - x[2]) - x[1];
        out[2] = x[0] * x[1] - beta * x[2];
    }
}

impl<T: Scalar> Linearized<T> for Lorenz {
    fn jacobian(&self, _t: T, x: &[T], out: &mut [T]) {
        let rho = T::from_f64(self.params.rho).unwrap();
        let sigma = T::from_f64(self.params.sigma).unwrap();
        let beta = T::from_f64(self.params.beta).unwrap();
        let zero = T::from_f64(0.0).unwrap();
        let one = T::from_f64(1.0).unwrap();

        out[0] = -sigma;
        out[1] = sigma;
        out[2] = zero;
        out[3] = rho - x[2];
        out[4] = -one;
        out[5] = -x[0];
        out[6] = x[1];
        out[7] = x[0];
        out[8] = -beta;
    }
}

/// A batch of N independent Lorenz instances sharing σ and β while ρ is
/// swept, solved as one 3N-dimensional system in a single integration.
///
/// State layout contract: the flat state vector is grouped by component,
/// `[x_0 .. x_{N-1}, y_0 .. y_{N-1}, z_0 .. z_{N-1}]`, so elements `i`,
/// `N + i`, `2N + i` together form the state of instance `i`. The derivative
/// is written in the same order. `pack_states` and
/// [`crate::sweep::BatchTrajectory`] are the only places this layout is
/// produced or consumed.
///
/// Instances are mathematically independent; the batch never couples them.
#[derive(Debug, Clone)]
pub struct LorenzSweep {
    rho: Vec<f64>,
    pub sigma: f64,
    pub beta: f64,
}

impl LorenzSweep {
    pub fn new(rho: Vec<f64>, sigma: f64, beta: f64) -> Result<Self> {
        if rho.is_empty() {
            bail!("Parameter sweep must contain at least one instance.");
        }
        Ok(Self { rho, sigma, beta })
    }

    /// Number of instances in the batch.
    pub fn instances(&self) -> usize {
        self.rho.len()
    }

    pub fn rho_values(&self) -> &[f64] {
        &self.rho
    }

    /// Flattens per-instance (x, y, z) triples into the component-block
    /// layout documented on [`LorenzSweep`].
    pub fn pack_states(states: &[[f64; 3]]) -> Vec<f64> {
        let n = states.len();
        let mut flat = vec![0.0; 3 * n];
        for (i, state) in states.iter().enumerate() {
            flat[i] = state[0];
            flat[n + i] = state[1];
            flat[2 * n + i] = state[2];
        }
        flat
    }

    /// Recovers the (x, y, z) triple of instance `i` from a flat batch state.
    pub fn unpack_state(flat: &[f64], instances: usize, i: usize) -> [f64; 3] {
        [flat[i], flat[instances + i], flat[2 * instances + i]]
    }
}

impl<T: Scalar> DynamicalSystem<T> for LorenzSweep {
    fn dimension(&self) -> usize {
        3 * self.rho.len()
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let n = self.rho.len();
        let sigma = T::from_f64(self.sigma).unwrap();
        let beta = T::from_f64(self.beta).unwrap();

        let (xs, rest) = x.split_at(n);
        let (ys, zs) = rest.split_at(n);

        for i in 0..n {
            let rho = T::from_f64(self.rho[i]).unwrap();
            out[i] = sigma * (ys[i] - xs[i]);
            out[n + i] = xs[i] * (rho - zs[i]) - ys[i];
            out[2 * n + i] = xs[i] * ys[i] - beta * zs[i];
        }
    }
}
