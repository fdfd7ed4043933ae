use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Tsitouras 5(4) tableau (Tsitouras 2011), shared between the fixed-step
/// [`Tsit5`] stepper and the adaptive grid integrator. The seventh stage is
/// FSAL: a7j equals bj, so k7 of an accepted step is k1 of the next.
pub(crate) mod tsit5_tableau {
    pub const C2: f64 = 0.161;
    pub const C3: f64 = 0.327;
    pub const C4: f64 = 0.9;
    pub const C5: f64 = 0.9800255409045097;
    pub const C6: f64 = 1.0;

    pub const A21: f64 = 0.161;

    pub const A31: f64 = -0.008480655492356989;
    pub const A32: f64 = 0.335480655492357;

    pub const A41: f64 = 2.8971530571054935;
    pub const A42: f64 = -6.359448489975075;
    pub const A43: f64 = 4.3622954328695815;

    pub const A51: f64 = 5.325864828439257;
    pub const A52: f64 = -11.748883564062828;
    pub const A53: f64 = 7.4955393428898365;
    pub const A54: f64 = -0.09249506636175525;

    pub const A61: f64 = 5.86145544294642;
    pub const A62: f64 = -12.92096931784711;
    pub const A63: f64 = 8.159367898576159;
    pub const A64: f64 = -0.071584973281401;
    pub const A65: f64 = -0.028269050394068383;

    // 5th-order weights.
    pub const B1: f64 = 0.09646076681806523;
    pub const B2: f64 = 0.01;
    pub const B3: f64 = 0.4798896504144996;
    pub const B4: f64 = 1.379008574103742;
    pub const B5: f64 = -3.290069515436081;
    pub const B6: f64 = 2.324710524099774;

    // Error weights: b - bhat, applied to k1..k7.
    pub const E1: f64 = -0.001780011052225771;
    pub const E2: f64 = -0.0008164344596567469;
    pub const E3: f64 = 0.007880878010261995;
    pub const E4: f64 = -0.1447110071732629;
    pub const E5: f64 = 0.5823571654525552;
    pub const E6: f64 = -0.45808210592918697;
    pub const E7: f64 = 0.015151515151515152;
}

/// Classic Runge-Kutta 4th order fixed-step solver.
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::from_f64(0.0).unwrap();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();
        let t0 = *t;

        system.apply(t0, state, &mut self.k1);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * half * self.k1[i];
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * half * self.k2[i];
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Tsitouras 5/4 solver, fixed-step variant (5th-order update only).
pub struct Tsit5<T: Scalar> {
    k: [Vec<T>; 6],
    tmp: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::from_f64(0.0).unwrap();
        Self {
            k: std::array::from_fn(|_| vec![z; dim]),
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Tsit5<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        use tsit5_tableau as tb;
        let c = |v: f64| T::from_f64(v).unwrap();
        let t0 = *t;

        system.apply(t0, state, &mut self.k[0]);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * c(tb::A21) * self.k[0][i];
        }
        system.apply(t0 + c(tb::C2) * dt, &self.tmp, &mut self.k[1]);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * (c(tb::A31) * self.k[0][i] + c(tb::A32) * self.k[1][i]);
        }
        system.apply(t0 + c(tb::C3) * dt, &self.tmp, &mut self.k[2]);

        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (c(tb::A41) * self.k[0][i]
                    + c(tb::A42) * self.k[1][i]
                    + c(tb::A43) * self.k[2][i]);
        }
        system.apply(t0 + c(tb::C4) * dt, &self.tmp, &mut self.k[3]);

        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (c(tb::A51) * self.k[0][i]
                    + c(tb::A52) * self.k[1][i]
                    + c(tb::A53) * self.k[2][i]
                    + c(tb::A54) * self.k[3][i]);
        }
        system.apply(t0 + c(tb::C5) * dt, &self.tmp, &mut self.k[4]);

        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (c(tb::A61) * self.k[0][i]
                    + c(tb::A62) * self.k[1][i]
                    + c(tb::A63) * self.k[2][i]
                    + c(tb::A64) * self.k[3][i]
                    + c(tb::A65) * self.k[4][i]);
        }
        system.apply(t0 + c(tb::C6) * dt, &self.tmp, &mut self.k[5]);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * (c(tb::B1) * self.k[0][i]
                    + c(tb::B2) * self.k[1][i]
                    + c(tb::B3) * self.k[2][i]
                    + c(tb::B4) * self.k[3][i]
                    + c(tb::B5) * self.k[4][i]
                    + c(tb::B6) * self.k[5][i]);
        }

        *t = t0 + dt;
    }
}

#[cfg(test)]
mod tests {
    use super::{Tsit5, RK4};
    use crate::traits::{DynamicalSystem, Steppable};

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    #[test]
    fn rk4_integrates_exponential_decay() {
        let mut stepper = RK4::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        for _ in 0..100 {
            stepper.step(&Decay, &mut t, &mut state, 0.01);
        }
        assert!((t - 1.0).abs() < 1e-12);
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn tsit5_integrates_exponential_decay() {
        let mut stepper = Tsit5::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        for _ in 0..100 {
            stepper.step(&Decay, &mut t, &mut state, 0.01);
        }
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-11);
    }

    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    #[test]
    fn tsit5_preserves_oscillator_energy_over_one_period() {
        let mut stepper = Tsit5::new(2);
        let mut t = 0.0;
        let mut state = [1.0, 0.0];
        let period = 2.0 * std::f64::consts::PI;
        let steps = 1000;
        for _ in 0..steps {
            stepper.step(&Oscillator, &mut t, &mut state, period / steps as f64);
        }
        assert!((state[0] - 1.0).abs() < 1e-9);
        assert!(state[1].abs() < 1e-9);
    }
}
