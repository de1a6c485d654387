use crate::defaults::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

fn default_nstep() -> usize {
    NSTEP
}
fn default_stepsize() -> f64 {
    STEPSIZE
}
fn default_temperature() -> f64 {
    TEMPERATURE
}
fn default_restart_flag() -> bool {
    RESTARTFLAG
}
fn default_initial_state() -> usize {
    INITIAL_STATE
}
fn default_nstates() -> usize {
    NSTATES
}
fn default_seed() -> u64 {
    SEED
}
fn default_use_boltzmann_velocities() -> bool {
    USE_BOLTZMANN_VELOCITIES
}
fn default_use_hopping() -> bool {
    USE_HOPPING
}
fn default_substeps() -> usize {
    SUBSTEPS
}
fn default_decoherence_correction() -> bool {
    DECOHERENCE_CORRECTION
}
fn default_decoherence_constant() -> f64 {
    DECOHERENCE_CONSTANT
}
fn default_velocity_adjustment() -> VelocityAdjustment {
    VelocityAdjustment::RescaleIsotropic
}
fn default_frustrated_hops() -> FrustratedHopPolicy {
    FrustratedHopPolicy::Ignore
}
fn default_max_hops() -> usize {
    MAX_HOPS
}
fn default_use_thermostat() -> bool {
    USE_THERMOSTAT
}
fn default_track_phase() -> bool {
    TRACK_PHASE
}
fn default_use_error_gate() -> bool {
    USE_ERROR_GATE
}
fn default_max_energy_error() -> f64 {
    MAX_ENERGY_ERROR
}
fn default_max_gradient_error() -> f64 {
    MAX_GRADIENT_ERROR
}
fn default_max_coupling_error() -> f64 {
    MAX_COUPLING_ERROR
}
fn default_print_restart() -> bool {
    PRINT_RESTART
}
fn default_print_coordinates() -> bool {
    PRINT_COORDINATES
}
fn default_print_energies() -> bool {
    PRINT_ENERGIES
}
fn default_print_hopping() -> bool {
    PRINT_HOPPING
}
fn default_hopping_config() -> HoppingConfiguration {
    let hopping_config: HoppingConfiguration = toml::from_str("").unwrap();
    hopping_config
}
fn default_thermostat_config() -> ThermostatConfiguration {
    let thermostat_config: ThermostatConfiguration = toml::from_str("").unwrap();
    thermostat_config
}
fn default_phase_config() -> PhaseConfiguration {
    let phase_config: PhaseConfiguration = toml::from_str("").unwrap();
    phase_config
}
fn default_error_gate_config() -> ErrorGateConfiguration {
    let error_gate_config: ErrorGateConfiguration = toml::from_str("").unwrap();
    error_gate_config
}
fn default_print_config() -> PrintConfiguration {
    let print_config: PrintConfiguration = toml::from_str("").unwrap();
    print_config
}

/// Contradictory or missing settings. All of them are raised before the
/// first step of a trajectory executes.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("the number of steps must be larger than zero")]
    NoSteps,
    #[error("the stepsize must be positive, got {0} fs")]
    InvalidStepsize(f64),
    #[error("surface hopping requires at least 2 electronic states, got {0}")]
    TooFewStates(usize),
    #[error("the initial state {0} is outside of the {1} treated states")]
    InitialStateOutOfRange(usize, usize),
    #[error("the decoherence constant must be positive, got {0}")]
    InvalidDecoherenceConstant(f64),
    #[error("the target temperature must be positive, got {0} K")]
    InvalidTemperature(f64),
    #[error("the error gate threshold for {0} must be positive")]
    InvalidErrorThreshold(&'static str),
}

/// Policy for the velocity adjustment after an accepted hop.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum VelocityAdjustment {
    /// uniform rescaling of all velocities so that total energy is conserved
    RescaleIsotropic,
    /// rescaling along the nonadiabatic coupling vector of the hopping pair
    RescaleAlongCoupling,
}

/// Policy for the velocities after a frustrated hop.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum FrustratedHopPolicy {
    /// leave the velocities unchanged
    Ignore,
    /// invert the velocity component along the coupling vector
    Reflect,
}

/// Struct that loads the configuration of the dynamics from the file
/// "dynamics.toml". It holds the structs [HoppingConfiguration],
/// [ThermostatConfiguration], [PhaseConfiguration] and [ErrorGateConfiguration]
#[derive(Serialize, Deserialize, Clone)]
pub struct DynamicConfiguration {
    #[serde(default = "default_nstep")]
    pub nstep: usize,
    #[serde(default = "default_stepsize")]
    pub stepsize: f64,
    #[serde(default = "default_nstates")]
    pub nstates: usize,
    #[serde(default = "default_initial_state")]
    pub initial_state: usize,
    #[serde(default = "default_restart_flag")]
    pub restart_flag: bool,
    #[serde(default = "default_use_boltzmann_velocities")]
    pub use_boltzmann_velocities: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_hopping_config")]
    pub hopping_config: HoppingConfiguration,
    #[serde(default = "default_thermostat_config")]
    pub thermostat_config: ThermostatConfiguration,
    #[serde(default = "default_phase_config")]
    pub phase_config: PhaseConfiguration,
    #[serde(default = "default_error_gate_config")]
    pub error_gate_config: ErrorGateConfiguration,
    #[serde(default = "default_print_config")]
    pub print_config: PrintConfiguration,
}

impl DynamicConfiguration {
    pub fn new() -> Self {
        // read the configuration file, if it does not exist in the directory
        // the program initializes the default settings and writes a
        // configuration file to the directory
        let config_file_path: &Path = Path::new(CONFIG_FILE_NAME);
        let mut config_string: String = if config_file_path.exists() {
            fs::read_to_string(config_file_path).expect("Unable to read config file")
        } else {
            String::from("")
        };
        // load the configuration settings
        let config: Self = toml::from_str(&config_string).unwrap();
        // save the configuration file if it does not exist already
        if !config_file_path.exists() {
            config_string = toml::to_string(&config).unwrap();
            fs::write(config_file_path, config_string).expect("Unable to write config file");
        }
        config
    }

    /// Check the settings for contradictions before any step executes.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.nstep == 0 {
            return Err(ConfigurationError::NoSteps);
        }
        if self.stepsize <= 0.0 {
            return Err(ConfigurationError::InvalidStepsize(self.stepsize));
        }
        if self.initial_state >= self.nstates {
            return Err(ConfigurationError::InitialStateOutOfRange(
                self.initial_state,
                self.nstates,
            ));
        }
        if self.hopping_config.use_hopping {
            if self.nstates < 2 {
                return Err(ConfigurationError::TooFewStates(self.nstates));
            }
            if self.hopping_config.decoherence_correction
                && self.hopping_config.decoherence_constant <= 0.0
            {
                return Err(ConfigurationError::InvalidDecoherenceConstant(
                    self.hopping_config.decoherence_constant,
                ));
            }
        }
        if self.thermostat_config.use_thermostat && self.thermostat_config.temperature <= 0.0 {
            return Err(ConfigurationError::InvalidTemperature(
                self.thermostat_config.temperature,
            ));
        }
        if self.error_gate_config.use_error_gate {
            if self.error_gate_config.max_energy_error <= 0.0 {
                return Err(ConfigurationError::InvalidErrorThreshold("energies"));
            }
            if self.error_gate_config.max_gradient_error <= 0.0 {
                return Err(ConfigurationError::InvalidErrorThreshold("gradients"));
            }
            if self.error_gate_config.max_coupling_error <= 0.0 {
                return Err(ConfigurationError::InvalidErrorThreshold("couplings"));
            }
        }
        Ok(())
    }
}

impl Default for DynamicConfiguration {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

/// Struct that holds the parameters for the surface hopping routines
#[derive(Serialize, Deserialize, Clone)]
pub struct HoppingConfiguration {
    #[serde(default = "default_use_hopping")]
    pub use_hopping: bool,
    #[serde(default = "default_substeps")]
    pub substeps: usize,
    #[serde(default = "default_decoherence_correction")]
    pub decoherence_correction: bool,
    #[serde(default = "default_decoherence_constant")]
    pub decoherence_constant: f64,
    #[serde(default = "default_velocity_adjustment")]
    pub velocity_adjustment: VelocityAdjustment,
    #[serde(default = "default_frustrated_hops")]
    pub frustrated_hops: FrustratedHopPolicy,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

/// Struct that holds the parameters for the thermostat
#[derive(Serialize, Deserialize, Clone)]
pub struct ThermostatConfiguration {
    #[serde(default = "default_use_thermostat")]
    pub use_thermostat: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

/// Struct that holds the parameters for the sign tracking of the
/// electronic structure output
#[derive(Serialize, Deserialize, Clone)]
pub struct PhaseConfiguration {
    #[serde(default = "default_track_phase")]
    pub track_phase: bool,
}

/// Struct that holds the uncertainty thresholds of the error gate
#[derive(Serialize, Deserialize, Clone)]
pub struct ErrorGateConfiguration {
    #[serde(default = "default_use_error_gate")]
    pub use_error_gate: bool,
    #[serde(default = "default_max_energy_error")]
    pub max_energy_error: f64,
    #[serde(default = "default_max_gradient_error")]
    pub max_gradient_error: f64,
    #[serde(default = "default_max_coupling_error")]
    pub max_coupling_error: f64,
}

/// Struct that controls the output of the simulation
#[derive(Serialize, Deserialize, Clone)]
pub struct PrintConfiguration {
    #[serde(default = "default_print_restart")]
    pub print_restart: bool,
    #[serde(default = "default_print_coordinates")]
    pub print_coordinates: bool,
    #[serde(default = "default_print_energies")]
    pub print_energies: bool,
    #[serde(default = "default_print_hopping")]
    pub print_hopping: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DynamicConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nstates, 2);
        assert!(config.hopping_config.use_hopping);
    }

    #[test]
    fn hopping_with_one_state_fails_fast() {
        let mut config = DynamicConfiguration::default();
        config.nstates = 1;
        config.initial_state = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::TooFewStates(1))
        ));
    }

    #[test]
    fn error_gate_requires_positive_thresholds() {
        let mut config = DynamicConfiguration::default();
        config.error_gate_config.use_error_gate = true;
        config.error_gate_config.max_gradient_error = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidErrorThreshold("gradients"))
        ));
    }
}
