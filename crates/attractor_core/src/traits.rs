use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our dynamical systems.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A continuous-time dynamical system (vector field).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into (length `dimension()`)
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A system whose Jacobian is available in closed form.
/// Used to build the tangent flow for Lyapunov exponent estimation.
pub trait Linearized<T: Scalar>: DynamicalSystem<T> {
    /// Writes the Jacobian matrix df/dx at (t, x) into `out` in row-major
    /// order (length `dimension() * dimension()`).
    fn jacobian(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for fixed-step solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
