use crate::constants;
use crate::dynamics::hopping::HopEvent;
use crate::dynamics::simulation::HaltReason;
use crate::dynamics::thermostat::{NoseHooverChain, NullThermostat, Thermostat};
use crate::initialization::settings::ConfigurationError;
use crate::initialization::system::SystemData;
use crate::initialization::velocities::initialize_velocities;
use crate::initialization::DynamicConfiguration;
use crate::interface::{Signature, Uncertainty};
use crate::output::StepRecord;
use ndarray::prelude::*;
use ndarray_linalg::c64;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Struct that holds the [DynamicConfiguration] and the complete mutable
/// state of a single trajectory. It is owned by the caller and passed by
/// exclusive reference through the stages of a dynamics step.
pub struct Simulation {
    pub stepsize: f64,
    pub actual_time: f64,
    pub total_mass: f64,
    pub config: DynamicConfiguration,
    pub coordinates: Array2<f64>,
    pub masses: Array1<f64>,
    pub velocities: Array2<f64>,
    pub kinetic_energy: f64,
    pub n_atoms: usize,
    pub atomic_numbers: Vec<u8>,
    /// energies of all electronic states of the current step in hartree
    pub energies: Array1<f64>,
    /// energies of the previous step
    pub last_energies: Array1<f64>,
    /// gradients of all electronic states, shape (n_states, n_atoms, 3)
    pub gradients: Array3<f64>,
    /// gradients of the previous step
    pub last_gradients: Array3<f64>,
    /// nonadiabatic coupling vectors of all state pairs,
    /// shape (n_pairs, n_atoms, 3)
    pub couplings: Array3<f64>,
    /// scalar couplings v * d of the current step
    pub coupling_scalar: Array2<f64>,
    /// electronic density matrix
    pub density: Array2<c64>,
    /// sign reference of the last accepted step
    pub reference: Option<Signature>,
    /// uncertainty estimates of the current step
    pub uncertainty: Option<Uncertainty>,
    pub state: usize,
    pub old_state: usize,
    pub step: usize,
    pub hop_event: HopEvent,
    pub hop_count: usize,
    pub halt: Option<HaltReason>,
    /// per-step records, appended in step order and never rewritten
    pub history: Vec<StepRecord>,
    pub rng: StdRng,
    pub thermostat: Box<dyn Thermostat + Send>,
}

impl Simulation {
    /// Initialize the struct [Simulation] from the [SystemData].
    /// Create all required arrays and initialize the velocities.
    /// The settings are checked for contradictions before anything else.
    pub fn new(system: &SystemData) -> Result<Simulation, ConfigurationError> {
        let config: DynamicConfiguration = system.config.clone();
        config.validate()?;
        let stepsize_au: f64 = config.stepsize * constants::FS_TO_AU;
        let n_states: usize = config.nstates;
        let n_pairs: usize = n_states * (n_states - 1) / 2;

        // initialize the density matrix as the pure initial state
        let mut density: Array2<c64> = Array2::zeros((n_states, n_states));
        density[[config.initial_state, config.initial_state]] = c64::from(1.0);
        // calculate total mass of the system
        let total_mass: f64 = system.masses.sum();

        // initiate parameters
        let gradients: Array3<f64> = Array3::zeros((n_states, system.n_atoms, 3));
        let last_gradients: Array3<f64> = Array3::zeros((n_states, system.n_atoms, 3));
        let couplings: Array3<f64> = Array3::zeros((n_pairs, system.n_atoms, 3));
        let energies: Array1<f64> = Array1::zeros(n_states);
        let last_energies: Array1<f64> = Array1::zeros(n_states);
        let coupling_scalar: Array2<f64> = Array2::zeros((n_states, n_states));

        // the generator is scoped to this trajectory; a trajectory is
        // reproducible from its seed and initial condition
        let mut rng: StdRng = StdRng::seed_from_u64(config.seed);

        // initialize velocities from a boltzmann distribution
        let velocities: Array2<f64> = if config.use_boltzmann_velocities {
            initialize_velocities(system, config.thermostat_config.temperature, &mut rng)
        } else {
            Array2::zeros(system.coordinates.raw_dim())
        };

        let thermostat: Box<dyn Thermostat + Send> = if !config.thermostat_config.use_thermostat {
            Box::new(NullThermostat::new(system.n_atoms))
        } else {
            Box::new(NoseHooverChain::new(
                system.n_atoms,
                config.thermostat_config.temperature,
                stepsize_au,
            ))
        };

        Ok(Simulation {
            state: config.initial_state,
            old_state: config.initial_state,
            actual_time: 0.0,
            stepsize: stepsize_au,
            total_mass,
            config,
            density,
            coordinates: system.coordinates.clone(),
            masses: system.masses.clone(),
            velocities,
            kinetic_energy: 0.0,
            n_atoms: system.n_atoms,
            atomic_numbers: system.atomic_numbers.clone(),
            energies,
            last_energies,
            gradients,
            last_gradients,
            couplings,
            coupling_scalar,
            reference: None,
            uncertainty: None,
            step: 0,
            hop_event: HopEvent::NoHop,
            hop_count: 0,
            halt: None,
            history: Vec::new(),
            rng,
            thermostat,
        })
    }

    /// Number of unordered state pairs.
    pub fn n_pairs(&self) -> usize {
        self.config.nstates * (self.config.nstates - 1) / 2
    }
}
