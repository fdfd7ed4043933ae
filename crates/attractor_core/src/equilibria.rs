//! Fixed points of the Lorenz flow and their linear stability.
//!
//! For ρ ≤ 1 the origin is the only equilibrium. For ρ > 1 the pitchfork
//! bifurcation adds the two convection states
//! C± = (±√(β(ρ−1)), ±√(β(ρ−1)), ρ−1).

use crate::lorenz::{Lorenz, LorenzParams};
use crate::traits::{DynamicalSystem, Linearized};
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::Serialize;

/// Returns all fixed points of the flow for the given parameters.
pub fn fixed_points(params: &LorenzParams) -> Vec<[f64; 3]> {
    let origin = [0.0, 0.0, 0.0];
    if params.rho <= 1.0 {
        return vec![origin];
    }
    let wing = (params.beta * (params.rho - 1.0)).sqrt();
    vec![
        origin,
        [wing, wing, params.rho - 1.0],
        [-wing, -wing, params.rho - 1.0],
    ]
}

/// Linear stability of one equilibrium.
#[derive(Debug, Clone, Serialize)]
pub struct EquilibriumInfo {
    pub state: [f64; 3],
    pub eigenvalues: Vec<Complex64>,
    /// True when every eigenvalue has a strictly negative real part.
    pub stable: bool,
}

/// Classifies an equilibrium by the eigenvalues of the Jacobian there.
/// Rejects points where the vector field does not actually vanish.
pub fn classify(params: &LorenzParams, state: [f64; 3]) -> Result<EquilibriumInfo> {
    let system = Lorenz::new(*params);

    let mut residual = [0.0; 3];
    system.apply(0.0, &state, &mut residual);
    let residual_norm = residual.iter().map(|v| v * v).sum::<f64>().sqrt();
    if residual_norm > 1e-9 {
        bail!(
            "Point ({}, {}, {}) is not a fixed point (‖f(x)‖ = {:e}).",
            state[0],
            state[1],
            state[2],
            residual_norm
        );
    }

    let mut jacobian = [0.0; 9];
    system.jacobian(0.0, &state, &mut jacobian);
    let matrix = DMatrix::from_row_slice(3, 3, &jacobian);
    let eigenvalues: Vec<Complex64> = matrix.complex_eigenvalues().iter().cloned().collect();
    let stable = eigenvalues.iter().all(|lambda| lambda.re < 0.0);

    Ok(EquilibriumInfo {
        state,
        eigenvalues,
        stable,
    })
}
