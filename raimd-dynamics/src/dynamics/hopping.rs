use crate::defaults;
use crate::initialization::settings::{FrustratedHopPolicy, VelocityAdjustment};
use crate::initialization::Simulation;
use log::{info, warn};
use ndarray::prelude::*;
use ndarray_linalg::c64;
use rand::distributions::Standard;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::DivAssign;

/// Outcome of the hop decision of a single dynamics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopEvent {
    /// the active state did not change
    NoHop,
    /// a switch to another electronic state with rescaled velocities
    Hopped,
    /// a selected switch was rejected for lack of kinetic energy
    Frustrated,
}

// tolerated drift of the density matrix trace before renormalization
const TRACE_TOLERANCE: f64 = 1.0e-6;

impl Simulation {
    /// Scalar couplings of the current step, the sum of v * d_ij over all
    /// atoms for every state pair. The matrix is antisymmetric.
    pub fn get_scalar_couplings(&self) -> Array2<f64> {
        let n_states: usize = self.config.nstates;
        let mut scalar: Array2<f64> = Array2::zeros((n_states, n_states));
        let mut pair: usize = 0;
        for i in 0..n_states {
            for j in (i + 1)..n_states {
                let mut value: f64 = 0.0;
                for atom in 0..self.n_atoms {
                    value += self
                        .velocities
                        .slice(s![atom, ..])
                        .dot(&self.couplings.slice(s![pair, atom, ..]));
                }
                scalar[[i, j]] = value;
                scalar[[j, i]] = -value;
                pair += 1;
            }
        }
        scalar
    }

    /// Hopping procedure of a single dynamics step: propagate the electronic
    /// density matrix over the nuclear step, evaluate the fewest-switches
    /// probabilities, possibly switch the active state and rescale the
    /// velocities, and apply the decoherence correction.
    pub fn surface_hopping_step(&mut self) {
        let scalar_new: Array2<f64> = self.get_scalar_couplings();
        // the first step only stores the couplings as the starting point of
        // the interpolation; the density matrix is still the pure initial state
        if self.step <= 1 {
            self.coupling_scalar = scalar_new;
            return;
        }

        let probabilities: Array1<f64> = self.propagate_density(scalar_new.view());
        self.renormalize_density();

        // hops are suppressed once the cap is reached, the trajectory
        // continues on the current state
        let target: Option<usize> = if self.hop_count < self.config.hopping_config.max_hops {
            self.select_hop_target(probabilities.view())
        } else {
            None
        };
        if let Some(target) = target {
            self.execute_hop(target);
        }

        if self.config.hopping_config.decoherence_correction && self.kinetic_energy > 0.0 {
            self.apply_decoherence_correction();
        }
        self.coupling_scalar = scalar_new;
    }

    /// Integrate the Liouville equation over the nuclear step with the
    /// configured number of electronic sub-steps. Energies and scalar
    /// couplings are interpolated linearly between the previous and the
    /// current step. Returns the accumulated hopping probabilities out of
    /// the active state.
    fn propagate_density(&mut self, scalar_new: ArrayView2<f64>) -> Array1<f64> {
        let n_states: usize = self.config.nstates;
        let substeps: usize = if self.config.hopping_config.substeps == 0 {
            ((self.stepsize / defaults::SUBSTEP_SIZE).round() as usize).max(1)
        } else {
            self.config.hopping_config.substeps
        };
        let dt_sub: f64 = self.stepsize / substeps as f64;
        let active: usize = self.state;

        let d_energies: Array1<f64> =
            (&self.energies - &self.last_energies) / substeps as f64;
        let d_scalar: Array2<f64> =
            (&scalar_new.to_owned() - &self.coupling_scalar) / substeps as f64;
        let mut energies: Array1<f64> = self.last_energies.clone();
        let mut scalar: Array2<f64> = self.coupling_scalar.clone();
        let mut probabilities: Array1<f64> = Array1::zeros(n_states);

        for _ in 0..substeps {
            // fewest-switches probability flux out of the active state,
            // evaluated with the density at the beginning of the sub-step;
            // negative fluxes are clamped to zero
            let population: f64 = self.density[[active, active]].re;
            if population > 0.0 {
                for j in 0..n_states {
                    if j != active {
                        let coupling_term: f64 = -scalar[[active, j]];
                        let flux: f64 = -2.0 * (self.density[[active, j]] * coupling_term).re;
                        probabilities[j] += (flux / population * dt_sub).max(0.0);
                    }
                }
            }

            let energies_mid: Array1<f64> = &energies + &(0.5 * &d_energies);
            let energies_end: Array1<f64> = &energies + &d_energies;
            let scalar_mid: Array2<f64> = &scalar + &(0.5 * &d_scalar);
            let scalar_end: Array2<f64> = &scalar + &d_scalar;
            self.density = runge_kutta_step(
                self.density.view(),
                dt_sub,
                energies.view(),
                energies_mid.view(),
                energies_end.view(),
                scalar.view(),
                scalar_mid.view(),
                scalar_end.view(),
            );
            energies = energies_end;
            scalar = scalar_end;
        }
        probabilities
    }

    /// Renormalize the density matrix if its trace drifted. Numerical drift
    /// is recovered locally and never raised as an error.
    fn renormalize_density(&mut self) {
        let trace: f64 = (0..self.config.nstates)
            .map(|i| self.density[[i, i]].re)
            .sum();
        if (trace - 1.0).abs() > TRACE_TOLERANCE && trace > 0.0 {
            warn!(
                "step {}: density matrix trace drifted to {:.10}, renormalizing",
                self.step, trace
            );
            self.density.mapv_inplace(|val| val / trace);
        }
    }

    /// Select the hop target from the accumulated probabilities with a single
    /// uniform random number. The first state whose cumulative probability
    /// interval contains the draw wins; if no interval does, no hop occurs.
    fn select_hop_target(&mut self, probabilities: ArrayView1<f64>) -> Option<usize> {
        let total: f64 = probabilities.sum();
        let scale: f64 = if total > 1.0 {
            warn!(
                "step {}: total hopping probability {:.6} exceeds one, rescaling",
                self.step, total
            );
            1.0 / total
        } else {
            1.0
        };

        let random_number: f64 = self.rng.sample(Standard);
        let mut sum: f64 = 0.0;
        for state in 0..self.config.nstates {
            let probability: f64 = probabilities[state] * scale;
            if probability > 0.0 {
                sum += probability;
                if random_number < sum {
                    return Some(state);
                }
            }
        }
        None
    }

    /// Check the energy feasibility of a selected hop and commit or reject
    /// it. A committed hop conserves total energy through the configured
    /// velocity adjustment; a frustrated hop leaves the active state alone
    /// and applies the configured frustrated-hop policy to the velocities.
    pub fn execute_hop(&mut self, target: usize) {
        let rescaled: Option<Array2<f64>> = match self.config.hopping_config.velocity_adjustment {
            VelocityAdjustment::RescaleIsotropic => self.uniformly_rescaled_velocities(target),
            VelocityAdjustment::RescaleAlongCoupling => self.rescaled_velocities(target),
        };
        match rescaled {
            Some(new_velocities) => {
                let gap: f64 = self.energies[target] - self.energies[self.state];
                info!(
                    "step {}: hop from state {} to state {}, the pot. diff is {:.5} eV",
                    self.step,
                    self.state + 1,
                    target + 1,
                    gap * crate::constants::HARTREE_TO_EV
                );
                self.velocities = new_velocities;
                self.kinetic_energy = self.get_kinetic_energy();
                self.state = target;
                self.hop_count += 1;
                self.hop_event = HopEvent::Hopped;
            }
            None => {
                info!(
                    "step {}: frustrated hop to state {}",
                    self.step,
                    target + 1
                );
                self.hop_event = HopEvent::Frustrated;
                if self.config.hopping_config.frustrated_hops == FrustratedHopPolicy::Reflect {
                    self.velocities = self.reflected_velocities(target);
                    // a reflection does not change the kinetic energy
                }
            }
        }
    }

    /// Uniform rescaling of the velocities after a hop. The hop is rejected
    /// when the kinetic energy cannot cover the potential energy gap.
    pub fn uniformly_rescaled_velocities(&self, target: usize) -> Option<Array2<f64>> {
        let gap: f64 = self.energies[target] - self.energies[self.state];
        if gap > self.kinetic_energy || self.kinetic_energy <= 0.0 {
            return None;
        }
        let vel_scale: f64 = ((self.kinetic_energy - gap) / self.kinetic_energy).sqrt();
        Some(vel_scale * &self.velocities)
    }

    /// Rescaling of the velocity component along the nonadiabatic coupling
    /// vector of the hopping pair. The hop is frustrated when the quadratic
    /// equation for the scaling factor has no real solution.
    pub fn rescaled_velocities(&self, target: usize) -> Option<Array2<f64>> {
        let old_state: usize = self.state;
        let (pair, factor): (usize, f64) = self.hop_direction(old_state, target);
        let coupling: ArrayView2<f64> = self.couplings.slice(s![pair, .., ..]);

        // energy difference between the old and the new state
        let delta_e: f64 = self.energies[old_state] - self.energies[target];

        // mass weighted coupling vector
        let mut mass_weighted: Array2<f64> = factor * &coupling;
        for i in 0..self.n_atoms {
            mass_weighted
                .slice_mut(s![i, ..])
                .div_assign(self.masses[i]);
        }

        // calculate the rescaling factors
        let mut a: f64 = 0.0;
        for i in 0..self.n_atoms {
            a += coupling
                .slice(s![i, ..])
                .dot(&coupling.slice(s![i, ..]))
                / self.masses[i];
        }
        a *= 0.5;
        let mut b: f64 = 0.0;
        for i in 0..self.n_atoms {
            b += self
                .velocities
                .slice(s![i, ..])
                .dot(&(factor * &coupling.slice(s![i, ..])));
        }
        let val: f64 = b.powi(2) + 4.0 * a * delta_e;

        // check frustrated hop
        if val < 0.0 || a <= 0.0 {
            return None;
        }
        let gamma: f64 = if b < 0.0 {
            (b + val.sqrt()) / (2.0 * a)
        } else {
            (b - val.sqrt()) / (2.0 * a)
        };
        Some(&self.velocities - &(gamma * mass_weighted))
    }

    /// Invert the velocity component along the coupling vector of the
    /// frustrated pair.
    pub fn reflected_velocities(&self, target: usize) -> Array2<f64> {
        let (pair, _): (usize, f64) = self.hop_direction(self.state, target);
        let coupling: ArrayView2<f64> = self.couplings.slice(s![pair, .., ..]);
        let norm: f64 = coupling.iter().map(|val| val * val).sum();
        if norm <= 0.0 {
            return self.velocities.clone();
        }
        let mut projection: f64 = 0.0;
        for i in 0..self.n_atoms {
            projection += self
                .velocities
                .slice(s![i, ..])
                .dot(&coupling.slice(s![i, ..]));
        }
        &self.velocities - &(2.0 * projection / norm * &coupling)
    }

    /// Index of the coupling vector of an unordered state pair together with
    /// the direction factor from the source towards the target state.
    fn hop_direction(&self, source: usize, target: usize) -> (usize, f64) {
        let (low, high, factor): (usize, usize, f64) = if target > source {
            (source, target, -1.0)
        } else {
            (target, source, 1.0)
        };
        let mut count: usize = 0;
        for i in 0..self.config.nstates {
            for j in (i + 1)..self.config.nstates {
                if i == low && j == high {
                    return (count, factor);
                }
                count += 1;
            }
        }
        unreachable!("state pair outside of the treated states")
    }

    /// Decoherence correction according to eqn. (17) in
    /// G. Granucci, M. Persico,
    /// "Critical appraisal of the fewest switches algorithm for surface hopping",
    /// J. Chem. Phys. 126, 134114 (2007), applied to the density matrix.
    /// The populations and coherences of the states J != K decay
    /// exponentially with a decay time proportional to the inverse of the
    /// energy gap |E_J-E_K|; the population of the active state K is
    /// renormalized so that the trace stays one.
    pub fn apply_decoherence_correction(&mut self) {
        let active: usize = self.state;
        let n_states: usize = self.config.nstates;
        let constant: f64 = self.config.hopping_config.decoherence_constant;
        let old_population: f64 = self.density[[active, active]].re;
        if old_population <= 0.0 {
            return;
        }

        let mut factors: Array1<f64> = Array1::ones(n_states);
        for j in 0..n_states {
            if j != active {
                let tau: f64 = 1.0 / (self.energies[j] - self.energies[active]).abs()
                    * (1.0 + constant / self.kinetic_energy);
                factors[j] = (-self.stepsize / tau).exp();
            }
        }
        for j in 0..n_states {
            for k in 0..n_states {
                if j != active || k != active {
                    self.density[[j, k]] = self.density[[j, k]] * (factors[j] * factors[k]);
                }
            }
        }

        // restore the trace through the active state population
        let mut other: f64 = 0.0;
        for j in 0..n_states {
            if j != active {
                other += self.density[[j, j]].re;
            }
        }
        let new_population: f64 = 1.0 - other;
        let rescale: f64 = (new_population / old_population).sqrt();
        for j in 0..n_states {
            if j != active {
                self.density[[active, j]] = self.density[[active, j]] * rescale;
                self.density[[j, active]] = self.density[[j, active]] * rescale;
            }
        }
        self.density[[active, active]] = c64::from(new_population);
    }
}

/// Time derivative of the density matrix in the adiabatic basis,
/// dA_kj/dt = -i(E_k - E_j) A_kj - sum_l (C_kl A_lj - A_kl C_lj).
fn liouville_derivative(
    density: ArrayView2<c64>,
    energies: ArrayView1<f64>,
    scalar: ArrayView2<f64>,
) -> Array2<c64> {
    let n_states: usize = density.dim().0;
    let mut derivative: Array2<c64> = Array2::zeros((n_states, n_states));
    for k in 0..n_states {
        for j in 0..n_states {
            let mut value: c64 =
                -c64::new(0.0, 1.0) * (energies[k] - energies[j]) * density[[k, j]];
            for l in 0..n_states {
                value -= scalar[[k, l]] * density[[l, j]] - density[[k, l]] * scalar[[l, j]];
            }
            derivative[[k, j]] = value;
        }
    }
    derivative
}

/// Calculate one step of the 4th order Runge-Kutta method with linearly
/// interpolated energies and couplings.
#[allow(clippy::too_many_arguments)]
fn runge_kutta_step(
    density: ArrayView2<c64>,
    dt: f64,
    energies_0: ArrayView1<f64>,
    energies_mid: ArrayView1<f64>,
    energies_1: ArrayView1<f64>,
    scalar_0: ArrayView2<f64>,
    scalar_mid: ArrayView2<f64>,
    scalar_1: ArrayView2<f64>,
) -> Array2<c64> {
    let mut k_1: Array2<c64> = liouville_derivative(density, energies_0, scalar_0);
    k_1 = k_1 * dt;
    let tmp: Array2<c64> = &density + &(&k_1 * 0.5);

    let mut k_2: Array2<c64> = liouville_derivative(tmp.view(), energies_mid, scalar_mid);
    k_2 = k_2 * dt;
    let tmp: Array2<c64> = &density + &(&k_2 * 0.5);

    let mut k_3: Array2<c64> = liouville_derivative(tmp.view(), energies_mid, scalar_mid);
    k_3 = k_3 * dt;
    let tmp: Array2<c64> = &density + &k_3;

    let mut k_4: Array2<c64> = liouville_derivative(tmp.view(), energies_1, scalar_1);
    k_4 = k_4 * dt;

    &density + &((k_1 + k_2 * 2.0 + k_3 * 2.0 + k_4) * (1.0 / 6.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::{DynamicConfiguration, Simulation, SystemData};

    fn two_state_simulation() -> Simulation {
        let mut config = DynamicConfiguration::default();
        config.use_boltzmann_velocities = false;
        config.phase_config.track_phase = false;
        let coordinates: Array2<f64> = ndarray::array![[0.0, 0.0, 0.0]];
        let system = SystemData::from((vec![1u8], coordinates, config));
        let mut simulation = Simulation::new(&system).unwrap();
        simulation.energies = ndarray::array![0.0, 0.05];
        simulation.last_energies = ndarray::array![0.0, 0.05];
        simulation.velocities = ndarray::array![[1.0e-3, 0.0, 0.0]];
        simulation.kinetic_energy = simulation.get_kinetic_energy();
        simulation
    }

    #[test]
    fn scalar_couplings_are_antisymmetric() {
        let mut simulation = two_state_simulation();
        let mut couplings: Array3<f64> = Array3::zeros((1, 1, 3));
        couplings[[0, 0, 0]] = 0.3;
        couplings[[0, 0, 2]] = -0.1;
        simulation.couplings = couplings;
        let scalar: Array2<f64> = simulation.get_scalar_couplings();
        assert_eq!(scalar[[0, 1]], -scalar[[1, 0]]);
        assert_eq!(scalar[[0, 0]], 0.0);
        assert!((scalar[[0, 1]] - 3.0e-4).abs() < 1.0e-15);
    }

    #[test]
    fn decoherence_correction_conserves_the_trace() {
        let mut simulation = two_state_simulation();
        simulation.state = 0;
        simulation.density = ndarray::array![
            [c64::new(0.7, 0.0), c64::new(0.2, 0.1)],
            [c64::new(0.2, -0.1), c64::new(0.3, 0.0)]
        ];
        simulation.apply_decoherence_correction();
        let trace: f64 = simulation.density[[0, 0]].re + simulation.density[[1, 1]].re;
        assert!((trace - 1.0).abs() < 1.0e-12);
        // the non-active population decayed
        assert!(simulation.density[[1, 1]].re < 0.3);
    }

    #[test]
    fn decoherence_correction_is_idempotent_on_a_pure_state() {
        let mut simulation = two_state_simulation();
        simulation.state = 0;
        simulation.density = ndarray::array![
            [c64::from(1.0), c64::from(0.0)],
            [c64::from(0.0), c64::from(0.0)]
        ];
        simulation.apply_decoherence_correction();
        assert_eq!(simulation.density[[0, 0]], c64::from(1.0));
        assert_eq!(simulation.density[[1, 1]], c64::from(0.0));
    }
}
