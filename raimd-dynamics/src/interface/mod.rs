use ndarray::prelude::*;
use thiserror::Error;

/// Errors of the external property evaluation. All of them are fatal to the
/// trajectory that issued the call.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The external program or model could not be invoked or crashed
    #[error("property evaluation failed: {0}")]
    Invocation(String),
    /// The evaluation did not finish within the configured wall time
    #[error("property evaluation timed out after {0} s")]
    Timeout(u64),
    /// The evaluation returned data with wrong shapes or missing quantities
    #[error("malformed oracle output: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uncertainty estimates of the predicted quantities, as reported by
/// oracle implementations that can estimate them (e.g. model ensembles).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Uncertainty {
    pub energy: f64,
    pub gradient: f64,
    pub coupling: f64,
}

/// Electronic structure signature of a single geometry: the CI coefficients
/// of each state and the active molecular orbital coefficients. The sign of
/// both is arbitrary in each individual calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// CI coefficients, one row per electronic state
    pub ci_vectors: Array2<f64>,
    /// MO coefficients, one row per active orbital
    pub mo_vectors: Array2<f64>,
}

/// Reference data of the previous accepted step that is passed to the oracle
/// ahead of an evaluation. Phase-aware oracle implementations may use it to
/// return sign-consistent output themselves; the sign correction applied by
/// the dynamics remains the correctness guarantee either way.
#[derive(Debug, Clone, Default)]
pub struct ReferenceHints {
    pub reference: Option<Signature>,
}

/// Result of a single property evaluation.
pub struct Properties {
    /// energies of all electronic states in hartree
    pub energies: Array1<f64>,
    /// gradient of every electronic state in hartree/bohr,
    /// shape (n_states, n_atoms, 3)
    pub gradients: Array3<f64>,
    /// nonadiabatic coupling vector of every state pair (i, j) with i < j in
    /// row-major pair order, shape (n_pairs, n_atoms, 3), in 1/bohr
    pub couplings: Array3<f64>,
    pub ci_vectors: Option<Array2<f64>>,
    pub mo_vectors: Option<Array2<f64>>,
    pub uncertainty: Option<Uncertainty>,
}

impl Properties {
    /// Check the shapes of the returned arrays against the dimensions of the
    /// molecular system before any of them is committed to the trajectory.
    pub fn validate(&self, n_states: usize, n_atoms: usize) -> Result<(), OracleError> {
        let n_pairs: usize = n_states * (n_states - 1) / 2;
        if self.energies.len() != n_states {
            return Err(OracleError::Malformed(format!(
                "expected {} energies, got {}",
                n_states,
                self.energies.len()
            )));
        }
        if self.gradients.dim() != (n_states, n_atoms, 3) {
            return Err(OracleError::Malformed(format!(
                "gradient shape {:?} does not match ({}, {}, 3)",
                self.gradients.dim(),
                n_states,
                n_atoms
            )));
        }
        if self.couplings.dim() != (n_pairs, n_atoms, 3) {
            return Err(OracleError::Malformed(format!(
                "coupling shape {:?} does not match ({}, {}, 3)",
                self.couplings.dim(),
                n_pairs,
                n_atoms
            )));
        }
        Ok(())
    }
}

/// Trait that provides an interface to an external source of electronic
/// structure properties, either a quantum chemistry program or a trained
/// model. The implementation is chosen when the trajectory is constructed.
/// A repeated call with the same coordinates must return the same result
/// or fail; implementations must not silently retry with altered settings.
pub trait PropertyOracle {
    /// Compute energies, gradients and nonadiabatic couplings for the given
    /// cartesian coordinates in bohr.
    fn evaluate(&mut self, coordinates: ArrayView2<f64>) -> Result<Properties, OracleError>;

    /// Receive the reference data of the previous step before the next
    /// evaluation. The default implementation ignores it.
    fn appendix(&mut self, _hints: ReferenceHints) {}
}
