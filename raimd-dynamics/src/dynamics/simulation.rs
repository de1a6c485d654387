use crate::dynamics::hopping::HopEvent;
use crate::dynamics::phase;
use crate::initialization::restart::read_restart_parameters;
use crate::initialization::Simulation;
use crate::interface::{OracleError, PropertyOracle, ReferenceHints};
use crate::output::helper::{print_footer_dynamics, print_header_dynamics};
use crate::output::StepRecord;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Reason for stopping a trajectory before the configured number of steps.
/// A halt is an expected condition, not an error; the triggering step is
/// retained in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// an oracle-reported uncertainty exceeded its configured maximum
    UncertaintyExceeded,
}

/// Terminal condition of a trajectory. Callers of an ensemble distinguish
/// "finished", "stopped early by design" and "failed" without unwinding.
#[derive(Debug)]
pub enum TrajectoryOutcome {
    /// the configured number of steps completed
    Finished,
    /// stopped early with the triggering step retained
    Halted(HaltReason),
    /// the property evaluation failed, no partial step was recorded
    Failed(OracleError),
}

impl Simulation {
    /// Velocity-verlet dynamics of the struct [Simulation]. The pipeline of
    /// every step runs in fixed order: position update, property evaluation,
    /// sign reconciliation, velocity update, thermostat, surface hopping,
    /// record. The loop stops on the configured step count, on the error
    /// gate or on a failed property evaluation.
    pub fn verlet_dynamics(&mut self, oracle: &mut dyn PropertyOracle) -> TrajectoryOutcome {
        print_header_dynamics();
        if self.config.restart_flag {
            if let Err(err) = self.restart_trajectory(oracle) {
                warn!("restart failed: {}", err);
                return TrajectoryOutcome::Failed(err);
            }
        }

        for _step in 0..self.config.nstep {
            if let Err(err) = self.verlet_step(oracle) {
                warn!("trajectory failed in step {}: {}", self.step, err);
                return TrajectoryOutcome::Failed(err);
            }
            if let Some(reason) = self.halt {
                info!(
                    "trajectory halted after step {}: uncertainty exceeded",
                    self.step
                );
                print_footer_dynamics(self.actual_time);
                return TrajectoryOutcome::Halted(reason);
            }
        }
        print_footer_dynamics(self.actual_time);
        TrajectoryOutcome::Finished
    }

    /// Calculate a single step of the velocity-verlet dynamics utilizing the
    /// [PropertyOracle] for the calculation of the required properties.
    pub fn verlet_step(&mut self, oracle: &mut dyn PropertyOracle) -> Result<(), OracleError> {
        self.step += 1;
        self.hop_event = HopEvent::NoHop;
        let first: bool = self.step == 1;

        // calculate new coordinates from velocity-verlet; the very first step
        // has no gradient yet and only bootstraps the property evaluation at
        // the initial geometry
        if !first {
            self.coordinates = self.get_coord_verlet();
        }

        // calculate energies, gradients and nonadiabatic couplings
        // for the new geometry
        self.get_properties(oracle)?;

        // calculate new velocities from velocity-verlet
        if !first {
            self.velocities = self.get_velocities_verlet();
        }
        self.kinetic_energy = self.get_kinetic_energy();

        // scale velocities
        let (velocities, kinetic_energy) = self
            .thermostat
            .scale_velocities(self.velocities.view(), self.kinetic_energy);
        self.velocities = velocities;
        self.kinetic_energy = kinetic_energy;

        // surface hopping procedure
        self.old_state = self.state;
        if self.config.hopping_config.use_hopping {
            self.surface_hopping_step();
        }

        self.history.push(StepRecord::new(self));
        self.check_error_gate();

        // update the actual time
        self.actual_time += self.stepsize;
        Ok(())
    }

    /// Calculate the energies, the gradients and the nonadiabatic couplings
    /// using the [PropertyOracle] and resolve their sign against the
    /// signature of the previous step.
    pub fn get_properties(&mut self, oracle: &mut dyn PropertyOracle) -> Result<(), OracleError> {
        oracle.appendix(ReferenceHints {
            reference: self.reference.clone(),
        });
        let mut properties = oracle.evaluate(self.coordinates.view())?;
        properties.validate(self.config.nstates, self.n_atoms)?;

        if self.config.phase_config.track_phase {
            self.reference = Some(phase::reconcile(self.reference.as_ref(), &mut properties)?);
        }

        self.last_energies = std::mem::replace(&mut self.energies, properties.energies);
        self.last_gradients = std::mem::replace(&mut self.gradients, properties.gradients);
        self.couplings = properties.couplings;
        self.uncertainty = properties.uncertainty;
        Ok(())
    }

    /// Restart the trajectory from the restart file and recompute the
    /// properties for the restored geometry.
    pub fn restart_trajectory(&mut self, oracle: &mut dyn PropertyOracle) -> Result<(), OracleError> {
        let (coordinates, velocities, density, state, step, hop_count) = read_restart_parameters();
        self.coordinates = coordinates;
        self.velocities = velocities;
        self.density = density;
        self.state = state;
        self.old_state = state;
        self.step = step;
        self.hop_count = hop_count;
        self.actual_time = step as f64 * self.stepsize;

        self.get_properties(oracle)?;
        self.kinetic_energy = self.get_kinetic_energy();
        Ok(())
    }

    /// Stop the trajectory once an oracle-reported uncertainty exceeds its
    /// configured maximum. The step that tripped the gate stays in the
    /// history.
    fn check_error_gate(&mut self) {
        if !self.config.error_gate_config.use_error_gate {
            return;
        }
        if let Some(uncertainty) = self.uncertainty {
            let gate = &self.config.error_gate_config;
            if uncertainty.energy > gate.max_energy_error
                || uncertainty.gradient > gate.max_gradient_error
                || uncertainty.coupling > gate.max_coupling_error
            {
                warn!(
                    "step {}: uncertainty (e {:.4}, g {:.4}, n {:.4}) above the configured maximum",
                    self.step, uncertainty.energy, uncertainty.gradient, uncertainty.coupling
                );
                self.halt = Some(HaltReason::UncertaintyExceeded);
            }
        }
    }
}
