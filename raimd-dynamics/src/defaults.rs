// config file
pub const CONFIG_FILE_NAME: &str = "dynamics.toml";
// restart file
pub const RESTART_FILE_NAME: &str = "dynamics_restart.out";
// number of nuclear steps
pub const NSTEP: usize = 1000;
// nuclear stepsize in fs
pub const STEPSIZE: f64 = 0.1;
// temperature (K)
pub const TEMPERATURE: f64 = 300.0;
// new trajectory: false or restart dynamics: true
pub const RESTARTFLAG: bool = false;
// initial electronic state (zero-based)
pub const INITIAL_STATE: usize = 1;
// number of electronic states
pub const NSTATES: usize = 2;
// surface hopping between electronic states
pub const USE_HOPPING: bool = true;
// number of electronic sub-steps per nuclear step; 0 derives the count
// from the target sub-step size below
pub const SUBSTEPS: usize = 0;
// target electronic sub-step size in atomic time units
pub const SUBSTEP_SIZE: f64 = 0.2;
// decoherence correction according to
// eqn. (17) in JCP 126, 134114 (2007)
pub const DECOHERENCE_CORRECTION: bool = true;
// constant in hartree
// use the recommended value for C in eqn. (17) of JCP 126, 134114 (2007)
pub const DECOHERENCE_CONSTANT: f64 = 0.1;
// maximum number of hops per trajectory
pub const MAX_HOPS: usize = 10;
// seed of the trajectory random number generator
pub const SEED: u64 = 1;
pub const USE_THERMOSTAT: bool = false;
// sampling of the initial velocities from a Boltzmann distribution
pub const USE_BOLTZMANN_VELOCITIES: bool = true;
// sign tracking of the ci/mo vectors between steps
pub const TRACK_PHASE: bool = true;
// halt the trajectory once an oracle-reported uncertainty exceeds
// the thresholds below
pub const USE_ERROR_GATE: bool = false;
// maximum error of energies in hartree
pub const MAX_ENERGY_ERROR: f64 = 0.05;
// maximum error of gradients in hartree/bohr
pub const MAX_GRADIENT_ERROR: f64 = 0.05;
// maximum error of nonadiabatic couplings in 1/bohr
pub const MAX_COUPLING_ERROR: f64 = 0.05;
pub const PRINT_RESTART: bool = true;
pub const PRINT_COORDINATES: bool = true;
pub const PRINT_ENERGIES: bool = true;
pub const PRINT_HOPPING: bool = false;
