use crate::constants;
use crate::defaults;
use crate::dynamics::hopping::HopEvent;
use crate::initialization::Simulation;
use crate::interface::Uncertainty;
use ndarray::prelude::*;
use ndarray_linalg::c64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Record of a single completed dynamics step. One record is appended to the
/// trajectory history per step, in step order, and never rewritten. The
/// electronic states carry one-based labels as the quantum chemistry
/// programs print them.
#[derive(Serialize, Deserialize, Clone)]
pub struct StepRecord {
    pub step: usize,
    /// time in fs
    pub time: f64,
    /// coordinates in angstrom
    pub coordinates: Array2<f64>,
    /// velocities in bohr/au
    pub velocities: Array2<f64>,
    /// energies of all states in hartree
    pub energies: Array1<f64>,
    /// gradients of all states in hartree/bohr
    pub gradients: Array3<f64>,
    /// nonadiabatic couplings of all state pairs in 1/bohr
    pub couplings: Array3<f64>,
    pub kinetic_energy: f64,
    pub total_energy: f64,
    pub uncertainty: Option<Uncertainty>,
    pub hop_event: HopEvent,
    pub state: usize,
    pub old_state: usize,
}

impl StepRecord {
    pub fn new(simulation: &Simulation) -> StepRecord {
        StepRecord {
            step: simulation.step,
            time: simulation.step as f64 * simulation.stepsize / constants::FS_TO_AU,
            coordinates: &simulation.coordinates * constants::BOHR_TO_ANGS,
            velocities: simulation.velocities.clone(),
            energies: simulation.energies.clone(),
            gradients: simulation.gradients.clone(),
            couplings: simulation.couplings.clone(),
            kinetic_energy: simulation.kinetic_energy,
            total_energy: simulation.energies[simulation.state] + simulation.kinetic_energy,
            uncertainty: simulation.uncertainty,
            hop_event: simulation.hop_event,
            state: simulation.state + 1,
            old_state: simulation.old_state + 1,
        }
    }
}

/// Append a [StepRecord] to the record file as a single json line.
pub fn write_step(record: &StepRecord, path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, record)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Struct that stores the parameters which are necessary to restart the
/// dynamics simulation. The density matrix is stored as separate real and
/// imaginary parts.
#[derive(Serialize, Deserialize, Clone)]
pub struct RestartOutput {
    pub n_atoms: usize,
    pub step: usize,
    pub state: usize,
    pub hop_count: usize,
    pub coordinates: Array2<f64>,
    pub velocities: Array2<f64>,
    pub density_real: Array2<f64>,
    pub density_imag: Array2<f64>,
}

impl RestartOutput {
    pub fn new(simulation: &Simulation) -> RestartOutput {
        RestartOutput {
            n_atoms: simulation.n_atoms,
            step: simulation.step,
            state: simulation.state,
            hop_count: simulation.hop_count,
            coordinates: simulation.coordinates.clone(),
            velocities: simulation.velocities.clone(),
            density_real: simulation.density.mapv(|val| val.re),
            density_imag: simulation.density.mapv(|val| val.im),
        }
    }

    /// Reassemble the complex density matrix.
    pub fn density(&self) -> Array2<c64> {
        let mut density: Array2<c64> = self.density_real.mapv(|val| c64::from(val));
        density.zip_mut_with(&self.density_imag, |val, im| {
            *val = c64::new(val.re, *im);
        });
        density
    }
}

/// Write the restart file of the dynamics simulation.
pub fn write_restart(restart: &RestartOutput) -> io::Result<()> {
    let restart_string: String =
        serde_yaml::to_string(restart).expect("Unable to serialize the restart parameters");
    fs::write(defaults::RESTART_FILE_NAME, restart_string)
}
