use crate::constants;
use log::warn;

pub fn print_header_dynamics() {
    warn!("{:^90}", "");
    warn!("{: ^90}", "Nonadiabatic Molecular Dynamics");
    warn!("{:-^90}", "");
}

pub fn print_footer_dynamics(time: f64) {
    warn!("{:-<90} ", "");
    warn!(
        "{:>66} {:>10.2} fs",
        "Molecular Dynamics finished after",
        time / constants::FS_TO_AU
    );
}
