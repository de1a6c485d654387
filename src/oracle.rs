use log::debug;
use ndarray::prelude::*;
use raimd_dynamics::constants::BOHR_TO_ANGS;
use raimd_dynamics::interface::{
    OracleError, Properties, PropertyOracle, ReferenceHints, Uncertainty,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

// name of the geometry file handed to the external program
const GEOMETRY_FILE: &str = "geometry.xyz";
// name of the result file the external program has to produce
const PROPERTIES_FILE: &str = "properties.json";
// reference ci/mo vectors of the previous step for phase-aware programs
const REFERENCE_FILE: &str = "reference.json";

/// Settings of the external evaluation, injected at construction. The
/// external program is configured explicitly instead of through process-wide
/// environment variables.
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// command that evaluates the geometry file and writes the result file
    pub command: String,
    /// working directory of the external program
    pub workdir: PathBuf,
    /// wall-time limit of a single evaluation in seconds
    pub timeout: u64,
}

/// Result file layout of the external program.
#[derive(Deserialize)]
struct RawProperties {
    energy: Vec<f64>,
    gradient: Vec<Vec<[f64; 3]>>,
    nac: Vec<Vec<[f64; 3]>>,
    civec: Option<Vec<Vec<f64>>>,
    movec: Option<Vec<Vec<f64>>>,
    err_e: Option<f64>,
    err_g: Option<f64>,
    err_n: Option<f64>,
}

/// Property oracle that drives an external program out of process: the
/// current geometry is written to the working directory, the configured
/// command is run under the configured wall-time limit and the result file
/// is parsed back. The same geometry always leads to the same invocation;
/// there is no retry with altered settings.
pub struct ExternalOracle {
    settings: OracleSettings,
    atoms: Vec<String>,
    hints: Option<ReferenceHints>,
}

impl ExternalOracle {
    pub fn new(settings: OracleSettings, atoms: Vec<String>) -> Self {
        ExternalOracle {
            settings,
            atoms,
            hints: None,
        }
    }

    fn write_geometry(&self, coordinates: ArrayView2<f64>) -> Result<(), OracleError> {
        let mut xyz: String = format!("{}\n\n", self.atoms.len());
        for (atom, coord) in self.atoms.iter().zip(coordinates.outer_iter()) {
            xyz.push_str(&format!(
                "{} {:20.12} {:20.12} {:20.12}\n",
                atom,
                coord[0] * BOHR_TO_ANGS,
                coord[1] * BOHR_TO_ANGS,
                coord[2] * BOHR_TO_ANGS
            ));
        }
        fs::write(self.settings.workdir.join(GEOMETRY_FILE), xyz)?;
        Ok(())
    }

    /// Pass the ci/mo vectors of the previous step on to the external
    /// program. Phase-aware programs can return sign-consistent output
    /// themselves; the sign correction of the dynamics stays in place
    /// either way.
    fn write_hints(&self) -> Result<(), OracleError> {
        if let Some(ReferenceHints {
            reference: Some(signature),
        }) = &self.hints
        {
            let payload = serde_json::json!({
                "civec": signature
                    .ci_vectors
                    .outer_iter()
                    .map(|row| row.to_vec())
                    .collect::<Vec<_>>(),
                "movec": signature
                    .mo_vectors
                    .outer_iter()
                    .map(|row| row.to_vec())
                    .collect::<Vec<_>>(),
            });
            fs::write(
                self.settings.workdir.join(REFERENCE_FILE),
                payload.to_string(),
            )?;
        }
        Ok(())
    }

    /// Run the external command and wait for it with the configured
    /// wall-time limit. A timeout kills the child and fails the trajectory.
    fn run_command(&self) -> Result<(), OracleError> {
        debug!("running external oracle: {}", self.settings.command);
        let mut child: Child = Command::new("sh")
            .arg("-c")
            .arg(&self.settings.command)
            .current_dir(&self.settings.workdir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| OracleError::Invocation(err.to_string()))?;

        let start: Instant = Instant::now();
        loop {
            match child
                .try_wait()
                .map_err(|err| OracleError::Invocation(err.to_string()))?
            {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(OracleError::Invocation(format!(
                        "external program exited with {}",
                        status
                    )))
                }
                None => {
                    if start.elapsed().as_secs() >= self.settings.timeout {
                        let _ = child.kill();
                        return Err(OracleError::Timeout(self.settings.timeout));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn read_properties(&self) -> Result<Properties, OracleError> {
        let path = self.settings.workdir.join(PROPERTIES_FILE);
        let content: String = fs::read_to_string(&path)?;
        let raw: RawProperties = serde_json::from_str(&content)
            .map_err(|err| OracleError::Malformed(err.to_string()))?;

        let n_states: usize = raw.energy.len();
        let n_atoms: usize = self.atoms.len();
        let n_pairs: usize = n_states * (n_states - 1) / 2;
        if raw.gradient.len() != n_states || raw.nac.len() != n_pairs {
            return Err(OracleError::Malformed(format!(
                "expected {} gradients and {} couplings, got {} and {}",
                n_states,
                n_pairs,
                raw.gradient.len(),
                raw.nac.len()
            )));
        }

        let mut gradients: Array3<f64> = Array3::zeros((n_states, n_atoms, 3));
        for (state, block) in raw.gradient.iter().enumerate() {
            if block.len() != n_atoms {
                return Err(OracleError::Malformed(format!(
                    "gradient of state {} has {} atoms instead of {}",
                    state + 1,
                    block.len(),
                    n_atoms
                )));
            }
            for (atom, row) in block.iter().enumerate() {
                for xyz in 0..3 {
                    gradients[[state, atom, xyz]] = row[xyz];
                }
            }
        }
        let mut couplings: Array3<f64> = Array3::zeros((n_pairs, n_atoms, 3));
        for (pair, block) in raw.nac.iter().enumerate() {
            if block.len() != n_atoms {
                return Err(OracleError::Malformed(format!(
                    "coupling of pair {} has {} atoms instead of {}",
                    pair + 1,
                    block.len(),
                    n_atoms
                )));
            }
            for (atom, row) in block.iter().enumerate() {
                for xyz in 0..3 {
                    couplings[[pair, atom, xyz]] = row[xyz];
                }
            }
        }

        let ci_vectors: Option<Array2<f64>> = raw.civec.map(nested_to_array).transpose()?;
        let mo_vectors: Option<Array2<f64>> = raw.movec.map(nested_to_array).transpose()?;
        let uncertainty: Option<Uncertainty> = match (raw.err_e, raw.err_g, raw.err_n) {
            (Some(energy), Some(gradient), Some(coupling)) => Some(Uncertainty {
                energy,
                gradient,
                coupling,
            }),
            _ => None,
        };

        Ok(Properties {
            energies: Array1::from(raw.energy),
            gradients,
            couplings,
            ci_vectors,
            mo_vectors,
            uncertainty,
        })
    }
}

fn nested_to_array(rows: Vec<Vec<f64>>) -> Result<Array2<f64>, OracleError> {
    let n_rows: usize = rows.len();
    let n_cols: usize = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|err| OracleError::Malformed(err.to_string()))
}

impl PropertyOracle for ExternalOracle {
    fn evaluate(&mut self, coordinates: ArrayView2<f64>) -> Result<Properties, OracleError> {
        self.write_geometry(coordinates)?;
        self.write_hints()?;
        self.run_command()?;
        self.read_properties()
    }

    fn appendix(&mut self, hints: ReferenceHints) {
        self.hints = Some(hints);
    }
}
