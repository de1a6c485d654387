use crate::dynamics::simulation::TrajectoryOutcome;
use crate::initialization::Simulation;
use crate::interface::PropertyOracle;
use rayon::prelude::*;

/// A trajectory together with its private property oracle. Members of an
/// ensemble share nothing but the read-only configuration they were
/// constructed from.
pub struct EnsembleMember {
    pub simulation: Simulation,
    pub oracle: Box<dyn PropertyOracle + Send>,
}

/// Propagate independent trajectories in parallel. Every trajectory remains
/// strictly sequential internally; there is no ordering guarantee between
/// the members.
pub fn run_ensemble(members: Vec<EnsembleMember>) -> Vec<(Simulation, TrajectoryOutcome)> {
    members
        .into_par_iter()
        .map(|mut member| {
            let outcome: TrajectoryOutcome =
                member.simulation.verlet_dynamics(member.oracle.as_mut());
            (member.simulation, outcome)
        })
        .collect()
}
