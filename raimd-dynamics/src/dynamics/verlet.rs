use crate::initialization::Simulation;
use ndarray::prelude::*;

impl Simulation {
    /// Acceleration of the nuclei on a given gradient in atomic units.
    fn get_acceleration(&self, gradient: ArrayView2<f64>) -> Array2<f64> {
        let mut acceleration: Array2<f64> = Array2::zeros(gradient.raw_dim());
        for (idx, mass) in self.masses.iter().enumerate() {
            acceleration
                .slice_mut(s![idx, ..])
                .assign(&(-1.0 * &gradient.slice(s![idx, ..]) / *mass));
        }
        acceleration
    }

    // Velocity Verlet routines
    pub fn get_coord_verlet(&self) -> Array2<f64> {
        let acceleration: Array2<f64> =
            self.get_acceleration(self.gradients.slice(s![self.state, .., ..]));
        let new_coords: Array2<f64> = &self.coordinates
            + &(self.stepsize * &self.velocities + 0.5 * self.stepsize.powi(2) * &acceleration);
        new_coords
    }

    /// Velocity half-step with the gradients of the active state from the
    /// previous and the current step. After a hop both gradients belong to
    /// the new active state.
    pub fn get_velocities_verlet(&self) -> Array2<f64> {
        let old_acceleration: Array2<f64> =
            self.get_acceleration(self.last_gradients.slice(s![self.state, .., ..]));
        let acceleration: Array2<f64> =
            self.get_acceleration(self.gradients.slice(s![self.state, .., ..]));
        let new_velocities: Array2<f64> =
            &self.velocities + &(self.stepsize * 0.5 * &(&old_acceleration + &acceleration));
        new_velocities
    }

    pub fn get_kinetic_energy(&self) -> f64 {
        let mut kinetic: f64 = 0.0;
        for index in 0..self.masses.len() {
            kinetic += self.masses[index]
                * 0.5
                * self
                    .velocities
                    .slice(s![index, ..])
                    .mapv(|val| val.powi(2))
                    .sum();
        }
        kinetic
    }
}
