use crate::oracle::{ExternalOracle, OracleSettings};
use anyhow::Context;
use clap::{App, Arg};
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use raimd_dynamics::dynamics::simulation::TrajectoryOutcome;
use raimd_dynamics::initialization::{
    read_file_to_frame, DynamicConfiguration, Simulation, SystemData,
};
use raimd_dynamics::output::{write_restart, write_step, RestartOutput};
use std::io::Write;
use std::path::{Path, PathBuf};

mod oracle;

#[macro_use]
extern crate clap;

fn main() -> anyhow::Result<()> {
    // Input.
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about("nonadiabatic molecular dynamics with surface hopping")
        .arg(
            Arg::new("xyz-File")
                .about("Sets the xyz file to use")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("oracle-Command")
                .about("Command that evaluates geometry.xyz and writes properties.json")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("timeout")
                .about("Wall-time limit of a single evaluation in seconds")
                .long("timeout")
                .takes_value(true)
                .default_value("3600"),
        )
        .get_matches();
    let geometry_file = matches.value_of("xyz-File").unwrap();
    let oracle_command = matches.value_of("oracle-Command").unwrap();
    let timeout: u64 = matches
        .value_of("timeout")
        .unwrap()
        .parse()
        .context("the timeout must be a number of seconds")?;

    // Logging.
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, LevelFilter::Info)
        .init();

    // The system is created from the geometry file and the configuration
    // file in the current directory.
    let frame = read_file_to_frame(geometry_file);
    let config: DynamicConfiguration = DynamicConfiguration::new();
    let atoms: Vec<String> = (0..frame.size())
        .map(|i| frame.atom(i).name())
        .collect();
    let system: SystemData = SystemData::from((frame, config));
    let mut simulation: Simulation = Simulation::new(&system)?;

    let mut oracle = ExternalOracle::new(
        OracleSettings {
            command: oracle_command.to_string(),
            workdir: PathBuf::from("."),
            timeout,
        },
        atoms,
    );

    // Propagate the trajectory.
    let outcome: TrajectoryOutcome = simulation.verlet_dynamics(&mut oracle);

    // Persist the per-step records and the restart file.
    let record_path: &Path = Path::new("dynamics.md.json");
    for record in &simulation.history {
        write_step(record, record_path)?;
    }
    if simulation.config.print_config.print_restart {
        write_restart(&RestartOutput::new(&simulation))?;
    }

    match outcome {
        TrajectoryOutcome::Finished => {
            info!("trajectory finished after {} steps", simulation.step);
            Ok(())
        }
        TrajectoryOutcome::Halted(reason) => {
            warn!(
                "trajectory stopped after {} steps: {:?}",
                simulation.step, reason
            );
            Ok(())
        }
        TrajectoryOutcome::Failed(err) => Err(err.into()),
    }
}
