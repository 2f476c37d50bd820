//! Generator for the accumulate-and-reduce modular multiplier.
//!
//! The multiplier is described for a synthesis toolchain, it is not executed
//! here. From a handful of [`Parameters`] this crate builds:
//!
//! - the grid of partial products of the two operands
//! - the accumulation windows ("coefficients") they are summed into
//! - one pass-through, add, or 3:2 compressor tree per window
//! - the chain of lookup tables folding bits above the modulus back into range
//! - a second stage combining table outputs with the in-range bits
//! - a final lookup producing three candidates, and the table write path
//!
//! [`Design::build`] runs all of it once; [`Design::artifacts`] renders the
//! RTL include file and one memory file per table; [`model::Model`] evaluates
//! the same structure on concrete operands.

use thiserror::Error;

pub mod coef;
pub mod combine;

pub mod design;
pub use design::{Artifacts, Design, TableFile};

pub mod finalize;
pub mod grid;
pub mod io;
pub mod model;

pub mod params;
pub use params::Parameters;

pub mod reduce;
pub mod rtl;
pub mod testing;
pub mod timing;
pub mod tree;

pub use fpga;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} must be a positive width")]
    InvalidWidth(&'static str),
    #[error("modulus has {modulus_bits} bits, operands only {bits}")]
    ModulusTooWide { modulus_bits: usize, bits: usize },
    #[error("modulus must be odd")]
    EvenModulus,
    #[error("modulus must be at least 3")]
    ModulusTooSmall,
    #[error("table data bus of {bus} bits is wider than {max} bits")]
    BusTooWide { bus: usize, max: usize },
    #[error("table address width {width} exceeds {max} bits")]
    AddressTooWide { width: usize, max: usize },
    #[error("ultra RAM share of {0}% is above 100%")]
    UramPercent(usize),
    #[error("guard bits requested for an empty term list")]
    EmptyTermList,
    #[error("no bits above the modulus, nothing to reduce")]
    NoReductionTables,
    #[error("second stage sum may need {needed} bits, final lookup covers {available}")]
    FinalOverflow { needed: usize, available: usize },
    #[error("operand has {width} bits, multiplier takes {bits}")]
    OperandTooWide { width: usize, bits: usize },
    #[error("{file}:{line}: not a hex table entry")]
    Parse { file: String, line: usize },
    #[error("table {file} has {found} entries, expected {expected}")]
    TableDepth {
        file: String,
        found: usize,
        expected: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Fpga(#[from] fpga::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
