use crate::constants;
use ndarray::prelude::*;

pub trait Thermostat {
    /// Scale the velocities and the kinetic energy of the system.
    fn scale_velocities(
        &mut self,
        vel: ArrayView2<f64>,
        kinetic_energy: f64,
    ) -> (Array2<f64>, f64);
    fn get_temperature(&self, kinetic_energy: f64) -> f64;
}

pub struct NullThermostat {
    pub scaling: f64,
    pub n_atoms: usize,
}

impl NullThermostat {
    pub fn new(n_atoms: usize) -> Self {
        NullThermostat {
            scaling: 1.0,
            n_atoms,
        }
    }
}

impl Thermostat for NullThermostat {
    fn scale_velocities(
        &mut self,
        vel: ArrayView2<f64>,
        kinetic_energy: f64,
    ) -> (Array2<f64>, f64) {
        (self.scaling * &vel, kinetic_energy)
    }

    fn get_temperature(&self, kinetic_energy: f64) -> f64 {
        2.0 * kinetic_energy / (self.n_atoms as f64 * 3.0 * constants::K_BOLTZMANN)
    }
}

/// Nose-Hoover chain of length 2. The chain masses are set from the target
/// temperature and a fixed characteristic frequency, the chain velocities
/// start at zero and persist across the steps of the trajectory.
pub struct NoseHooverChain {
    pub q1: f64,
    pub q2: f64,
    pub v1: f64,
    pub v2: f64,
    pub target_temperature: f64,
    pub dt: f64,
    pub n_atoms: usize,
}

impl NoseHooverChain {
    pub fn new(n_atoms: usize, temperature: f64, dt: f64) -> Self {
        let freq: f64 = 1.0 / (constants::NOSE_HOOVER_PERIOD * constants::FS_TO_AU);
        let kbt: f64 = constants::K_BOLTZMANN * temperature;
        NoseHooverChain {
            q1: 3.0 * n_atoms as f64 * kbt / freq.powi(2),
            q2: kbt / freq.powi(2),
            v1: 0.0,
            v2: 0.0,
            target_temperature: temperature,
            dt,
            n_atoms,
        }
    }
}

impl Thermostat for NoseHooverChain {
    /// Time-reversible leapfrog split of the chain propagation around the
    /// velocity scaling factor s = exp(-v1*dt/2).
    fn scale_velocities(
        &mut self,
        vel: ArrayView2<f64>,
        kinetic_energy: f64,
    ) -> (Array2<f64>, f64) {
        let dt: f64 = self.dt;
        let kbt: f64 = constants::K_BOLTZMANN * self.target_temperature;
        // equipartition target 3*N*kB*T
        let target: f64 = 3.0 * self.n_atoms as f64 * kbt;
        let mut ekin: f64 = kinetic_energy;

        let mut g2: f64 = (self.q1 * self.v1.powi(2) - kbt) / self.q2;
        self.v2 += g2 * dt / 4.0;
        self.v1 *= (-self.v2 * dt / 8.0).exp();
        let mut g1: f64 = (2.0 * ekin - target) / self.q1;
        self.v1 += g1 * dt / 4.0;
        self.v1 *= (-self.v2 * dt / 8.0).exp();

        let s: f64 = (-self.v1 * dt / 2.0).exp();
        ekin *= s.powi(2);

        self.v1 *= (-self.v2 * dt / 8.0).exp();
        g1 = (2.0 * ekin - target) / self.q1;
        self.v1 += g1 * dt / 4.0;
        self.v1 *= (-self.v2 * dt / 8.0).exp();
        g2 = (self.q1 * self.v1.powi(2) - kbt) / self.q2;
        self.v2 += g2 * dt / 4.0;

        (s * &vel, ekin)
    }

    fn get_temperature(&self, kinetic_energy: f64) -> f64 {
        2.0 * kinetic_energy / (self.n_atoms as f64 * 3.0 * constants::K_BOLTZMANN)
    }
}
