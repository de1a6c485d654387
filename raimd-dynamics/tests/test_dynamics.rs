use ndarray::prelude::*;
use ndarray_linalg::c64;
use raimd_dynamics::dynamics::ensemble::{run_ensemble, EnsembleMember};
use raimd_dynamics::dynamics::hopping::HopEvent;
use raimd_dynamics::dynamics::simulation::{HaltReason, TrajectoryOutcome};
use raimd_dynamics::initialization::settings::FrustratedHopPolicy;
use raimd_dynamics::initialization::{DynamicConfiguration, Simulation, SystemData};
use raimd_dynamics::interface::{OracleError, Properties, PropertyOracle, Uncertainty};
use raimd_dynamics::output::RestartOutput;

/// Single electronic state on a harmonic potential 0.5*k*r^2 around the
/// origin.
struct HarmonicOracle {
    force_constant: f64,
}

impl PropertyOracle for HarmonicOracle {
    fn evaluate(&mut self, coordinates: ArrayView2<f64>) -> Result<Properties, OracleError> {
        let n_atoms: usize = coordinates.dim().0;
        let energy: f64 =
            0.5 * self.force_constant * coordinates.iter().map(|val| val * val).sum::<f64>();
        let mut gradients: Array3<f64> = Array3::zeros((1, n_atoms, 3));
        gradients
            .slice_mut(s![0, .., ..])
            .assign(&(self.force_constant * &coordinates));
        Ok(Properties {
            energies: array![energy],
            gradients,
            couplings: Array3::zeros((0, n_atoms, 3)),
            ci_vectors: None,
            mo_vectors: None,
            uncertainty: None,
        })
    }
}

/// Two harmonic states separated by a constant gap and coupled by a
/// constant coupling vector along x.
struct TwoStateOracle {
    force_constant: f64,
    gap: f64,
    coupling: f64,
}

impl PropertyOracle for TwoStateOracle {
    fn evaluate(&mut self, coordinates: ArrayView2<f64>) -> Result<Properties, OracleError> {
        let n_atoms: usize = coordinates.dim().0;
        let base: f64 =
            0.5 * self.force_constant * coordinates.iter().map(|val| val * val).sum::<f64>();
        let mut gradients: Array3<f64> = Array3::zeros((2, n_atoms, 3));
        for state in 0..2 {
            gradients
                .slice_mut(s![state, .., ..])
                .assign(&(self.force_constant * &coordinates));
        }
        let mut couplings: Array3<f64> = Array3::zeros((1, n_atoms, 3));
        couplings.slice_mut(s![0, .., 0]).fill(self.coupling);
        Ok(Properties {
            energies: array![base, base + self.gap],
            gradients,
            couplings,
            ci_vectors: None,
            mo_vectors: None,
            uncertainty: None,
        })
    }
}

/// Single-state oracle that reports a large energy uncertainty on one of
/// its calls.
struct UncertainOracle {
    calls: usize,
    trigger_at: usize,
}

impl PropertyOracle for UncertainOracle {
    fn evaluate(&mut self, coordinates: ArrayView2<f64>) -> Result<Properties, OracleError> {
        self.calls += 1;
        let n_atoms: usize = coordinates.dim().0;
        let energy_error: f64 = if self.calls == self.trigger_at {
            0.2
        } else {
            0.001
        };
        Ok(Properties {
            energies: array![0.0],
            gradients: Array3::zeros((1, n_atoms, 3)),
            couplings: Array3::zeros((0, n_atoms, 3)),
            ci_vectors: None,
            mo_vectors: None,
            uncertainty: Some(Uncertainty {
                energy: energy_error,
                gradient: 0.001,
                coupling: 0.0,
            }),
        })
    }
}

fn base_config() -> DynamicConfiguration {
    let mut config = DynamicConfiguration::default();
    config.use_boltzmann_velocities = false;
    config.phase_config.track_phase = false;
    config.thermostat_config.use_thermostat = false;
    config.error_gate_config.use_error_gate = false;
    config
}

fn single_state_config() -> DynamicConfiguration {
    let mut config = base_config();
    config.nstates = 1;
    config.initial_state = 0;
    config.hopping_config.use_hopping = false;
    config
}

fn hydrogen_system(coordinates: Array2<f64>, config: DynamicConfiguration) -> SystemData {
    SystemData::from((vec![1u8], coordinates, config))
}

#[test]
fn total_energy_is_conserved_without_thermostat_and_hopping() {
    let mut config = single_state_config();
    config.nstep = 200;
    config.stepsize = 0.1;
    let system = hydrogen_system(array![[1.0, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();
    let mut oracle = HarmonicOracle {
        force_constant: 0.1,
    };

    let outcome = simulation.verlet_dynamics(&mut oracle);
    assert!(matches!(outcome, TrajectoryOutcome::Finished));
    assert_eq!(simulation.history.len(), 200);

    let first: f64 = simulation.history.first().unwrap().total_energy;
    let last: f64 = simulation.history.last().unwrap().total_energy;
    assert!(
        (last - first).abs() < 2.0e-4,
        "total energy drifted from {} to {}",
        first,
        last
    );
}

#[test]
fn density_trace_stays_normalized_with_decoherence() {
    let mut config = base_config();
    config.nstep = 50;
    config.stepsize = 0.1;
    config.initial_state = 1;
    config.use_boltzmann_velocities = true;
    config.hopping_config.decoherence_correction = true;
    let system = hydrogen_system(array![[0.5, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();
    let mut oracle = TwoStateOracle {
        force_constant: 0.05,
        gap: 0.02,
        coupling: 0.005,
    };

    for _ in 0..50 {
        simulation.verlet_step(&mut oracle).unwrap();
        let trace: f64 = (0..2).map(|i| simulation.density[[i, i]].re).sum();
        assert!(
            (trace - 1.0).abs() < 1.0e-6,
            "trace {} in step {}",
            trace,
            simulation.step
        );
    }
}

#[test]
fn identical_seeds_give_identical_trajectories() {
    let run = |seed: u64| -> Simulation {
        let mut config = base_config();
        config.nstep = 50;
        config.stepsize = 0.1;
        config.initial_state = 1;
        config.seed = seed;
        config.use_boltzmann_velocities = true;
        let system = hydrogen_system(array![[0.5, 0.0, 0.0]], config);
        let mut simulation = Simulation::new(&system).unwrap();
        let mut oracle = TwoStateOracle {
            force_constant: 0.05,
            gap: 0.01,
            coupling: 0.01,
        };
        let outcome = simulation.verlet_dynamics(&mut oracle);
        assert!(matches!(outcome, TrajectoryOutcome::Finished));
        simulation
    };

    let first = run(7);
    let second = run(7);
    assert_eq!(first.density, second.density);
    assert_eq!(first.coordinates, second.coordinates);
    assert_eq!(first.velocities, second.velocities);
    for (a, b) in first.history.iter().zip(second.history.iter()) {
        assert_eq!(a.state, b.state);
        assert_eq!(a.hop_event, b.hop_event);
    }
}

#[test]
fn frustrated_hop_keeps_the_active_state() {
    let mut config = base_config();
    config.initial_state = 0;
    let system = hydrogen_system(array![[0.0, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();

    // upper state out of reach: 1 hartree gap against ~1e-3 hartree of
    // kinetic energy
    simulation.energies = array![0.0, 1.0];
    simulation.last_energies = array![0.0, 1.0];
    simulation.velocities = array![[1.0e-3, 0.0, 0.0]];
    simulation.kinetic_energy = simulation.get_kinetic_energy();
    let mut couplings: Array3<f64> = Array3::zeros((1, 1, 3));
    couplings[[0, 0, 0]] = 1.0;
    simulation.couplings = couplings;
    let velocities_before = simulation.velocities.clone();

    simulation.execute_hop(1);
    assert_eq!(simulation.state, 0);
    assert_eq!(simulation.hop_event, HopEvent::Frustrated);
    // the ignore policy leaves the velocities alone
    assert_eq!(simulation.velocities, velocities_before);
}

#[test]
fn reflected_frustrated_hop_inverts_the_coupling_component() {
    let mut config = base_config();
    config.initial_state = 0;
    config.hopping_config.frustrated_hops = FrustratedHopPolicy::Reflect;
    let system = hydrogen_system(array![[0.0, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();

    simulation.energies = array![0.0, 1.0];
    simulation.last_energies = array![0.0, 1.0];
    simulation.velocities = array![[1.0e-3, 2.0e-3, 0.0]];
    simulation.kinetic_energy = simulation.get_kinetic_energy();
    let mut couplings: Array3<f64> = Array3::zeros((1, 1, 3));
    couplings[[0, 0, 0]] = 1.0;
    simulation.couplings = couplings;
    let kinetic_before: f64 = simulation.kinetic_energy;

    simulation.execute_hop(1);
    assert_eq!(simulation.state, 0);
    assert_eq!(simulation.hop_event, HopEvent::Frustrated);
    // the x component reverses, the y component survives
    assert!((simulation.velocities[[0, 0]] + 1.0e-3).abs() < 1.0e-12);
    assert!((simulation.velocities[[0, 1]] - 2.0e-3).abs() < 1.0e-12);
    assert!((simulation.get_kinetic_energy() - kinetic_before).abs() < 1.0e-12);
}

#[test]
fn surface_hopping_step_never_switches_without_energy() {
    let mut config = base_config();
    config.initial_state = 0;
    config.hopping_config.substeps = 20;
    config.hopping_config.decoherence_correction = false;
    let system = hydrogen_system(array![[0.0, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();

    simulation.step = 2;
    simulation.energies = array![0.0, 1.0];
    simulation.last_energies = array![0.0, 1.0];
    simulation.velocities = array![[1.0e-3, 0.0, 0.0]];
    simulation.kinetic_energy = simulation.get_kinetic_energy();
    let mut couplings: Array3<f64> = Array3::zeros((1, 1, 3));
    couplings[[0, 0, 0]] = 500.0;
    simulation.couplings = couplings;
    simulation.coupling_scalar = simulation.get_scalar_couplings();
    simulation.density = array![
        [c64::from(0.55), c64::from(0.45)],
        [c64::from(0.45), c64::from(0.45)]
    ];

    simulation.surface_hopping_step();
    // whatever the stochastic selection decided, the state cannot change
    assert_eq!(simulation.state, 0);
    assert_ne!(simulation.hop_event, HopEvent::Hopped);
}

#[test]
fn error_gate_halts_after_the_triggering_step() {
    let mut config = single_state_config();
    config.nstep = 10;
    config.error_gate_config.use_error_gate = true;
    let system = hydrogen_system(array![[1.0, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();
    let mut oracle = UncertainOracle {
        calls: 0,
        trigger_at: 3,
    };

    let outcome = simulation.verlet_dynamics(&mut oracle);
    assert!(matches!(
        outcome,
        TrajectoryOutcome::Halted(HaltReason::UncertaintyExceeded)
    ));
    // the triggering step is recorded, a fourth one never runs
    assert_eq!(simulation.history.len(), 3);
    assert_eq!(oracle.calls, 3);
    let last = simulation.history.last().unwrap();
    assert_eq!(last.uncertainty.unwrap().energy, 0.2);
}

#[test]
fn ensemble_members_propagate_independently() {
    let member = |seed: u64| -> EnsembleMember {
        let mut config = base_config();
        config.nstep = 20;
        config.stepsize = 0.1;
        config.initial_state = 1;
        config.seed = seed;
        config.use_boltzmann_velocities = true;
        let system = hydrogen_system(array![[0.5, 0.0, 0.0]], config);
        EnsembleMember {
            simulation: Simulation::new(&system).unwrap(),
            oracle: Box::new(TwoStateOracle {
                force_constant: 0.05,
                gap: 0.01,
                coupling: 0.01,
            }),
        }
    };

    let results = run_ensemble(vec![member(3), member(4), member(3)]);
    assert_eq!(results.len(), 3);
    for (simulation, outcome) in &results {
        assert!(matches!(outcome, TrajectoryOutcome::Finished));
        assert_eq!(simulation.history.len(), 20);
    }
    // equal seeds agree with each other, independent of scheduling
    assert_eq!(results[0].0.coordinates, results[2].0.coordinates);
    assert_eq!(results[0].0.density, results[2].0.density);
}

#[test]
fn restart_parameters_round_trip() {
    let mut config = base_config();
    config.nstep = 5;
    config.stepsize = 0.1;
    config.initial_state = 1;
    config.use_boltzmann_velocities = true;
    let system = hydrogen_system(array![[0.5, 0.0, 0.0]], config);
    let mut simulation = Simulation::new(&system).unwrap();
    let mut oracle = TwoStateOracle {
        force_constant: 0.05,
        gap: 0.02,
        coupling: 0.005,
    };
    let outcome = simulation.verlet_dynamics(&mut oracle);
    assert!(matches!(outcome, TrajectoryOutcome::Finished));

    let restart = RestartOutput::new(&simulation);
    let yaml: String = serde_yaml::to_string(&restart).unwrap();
    let back: RestartOutput = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back.density(), simulation.density);
    assert_eq!(back.coordinates, simulation.coordinates);
    assert_eq!(back.step, simulation.step);
    assert_eq!(back.state, simulation.state);
}
