pub mod analysis;
pub mod equilibria;
pub mod extrema;
pub mod integrate;
pub mod lorenz;
pub mod solvers;
pub mod sweep;
/// The `attractor_core` crate is the numerical engine for exploring the
/// Lorenz system: derivative evaluation (single and batched over a ρ sweep),
/// adaptive integration onto a requested time grid, local-extremum
/// extraction for bifurcation diagrams, and chaos diagnostics.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem`
///   (vector fields), `Linearized` (closed-form Jacobians), `Steppable`
///   (fixed-step solvers).
/// - **Lorenz**: the 3-variable flow and its 3N-dimensional batched form
///   with the component-block state layout.
/// - **Integrate**: adaptive Tsitouras 5(4) integration sampled exactly on
///   a caller-supplied time grid.
/// - **Sweep / Extrema**: bifurcation scans over swept ρ values.
/// - **Analysis / Equilibria**: Lyapunov spectra, Kaplan-Yorke dimension,
///   trajectory divergence, fixed points and their linear stability.
///
/// Presentation (plotting, image export) is a downstream consumer of the
/// arrays produced here and lives outside this crate.
pub mod traits;
