use phf::phf_map;

// conversion from femtoseconds to atomic time units
pub const FS_TO_AU: f64 = 41.3413745758;
// conversion from bohr to angstrom
pub const BOHR_TO_ANGS: f64 = 0.52917721067;
// conversion from hartree to eV
pub const HARTREE_TO_EV: f64 = 27.2114;
// Boltzmann constant in hartree/K
pub const K_BOLTZMANN: f64 = 3.16881e-6;
// conversion from unified atomic mass units to electron masses
pub const AMU_TO_AU: f64 = 1822.8852;
// characteristic damping period of the Nose-Hoover chain in fs
pub const NOSE_HOOVER_PERIOD: f64 = 22.0;

/// Atomic masses in unified atomic mass units, indexed by atomic number.
pub static ATOMIC_MASSES: phf::Map<u8, f64> = phf_map! {
    1u8 => 1.00794,
    2u8 => 4.002602,
    3u8 => 6.941,
    4u8 => 9.012182,
    5u8 => 10.811,
    6u8 => 12.0107,
    7u8 => 14.0067,
    8u8 => 15.9994,
    9u8 => 18.9984032,
    10u8 => 20.1797,
    11u8 => 22.98976928,
    12u8 => 24.3050,
    13u8 => 26.9815386,
    14u8 => 28.0855,
    15u8 => 30.973762,
    16u8 => 32.065,
    17u8 => 35.453,
    18u8 => 39.948,
    19u8 => 39.0983,
    20u8 => 40.078,
    21u8 => 44.955912,
    22u8 => 47.867,
    23u8 => 50.9415,
    24u8 => 51.9961,
    25u8 => 54.938045,
    26u8 => 55.845,
    27u8 => 58.933195,
    28u8 => 58.6934,
    29u8 => 63.546,
    30u8 => 65.38,
    31u8 => 69.723,
    32u8 => 72.64,
    33u8 => 74.92160,
    34u8 => 78.96,
    35u8 => 79.904,
    36u8 => 83.798,
    53u8 => 126.90447,
};
