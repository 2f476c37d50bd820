//! Bit-accurate evaluation of a [`Design`] on concrete operands.
//!
//! The model walks the same summations, table segments and final lookup the
//! RTL is rendered from, truncating every register to its declared width.

use num_bigint::BigUint;
use num_traits::Zero as _;
use tracing::{debug, warn};

use crate::{
    finalize::Candidates,
    tree::{mask, Signal},
    Design, Error, Result,
};

/// Register values of one multiplication, stage by stage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Trace {
    /// `accum_grid_o`
    pub accum: Vec<BigUint>,
    /// address presented to each chained table
    pub addresses: Vec<usize>,
    /// `mod_ram_k_q`
    pub lookups: Vec<BigUint>,
    /// `accum2_grid_o`
    pub accum2: Vec<BigUint>,
    pub res0: BigUint,
    pub candidates: Candidates,
}

pub struct Model<'a> {
    design: &'a Design,
}

impl<'a> Model<'a> {
    pub fn new(design: &'a Design) -> Self {
        Self { design }
    }

    pub fn evaluate(&self, x: &BigUint, y: &BigUint) -> Result<Trace> {
        let design = self.design;
        let params = &design.params;
        for operand in [x, y] {
            let width = operand.bits() as usize;
            if width > params.bits {
                return Err(Error::OperandTooWide {
                    width,
                    bits: params.bits,
                });
            }
        }

        let rows = params.num_row();
        let words = |value: &BigUint, width: usize, count: usize| -> Vec<BigUint> {
            (0..count)
                .map(|k| (value >> (k * width)) & mask(width))
                .collect()
        };
        let a = words(x, params.a_w, params.num_col());
        let b = words(y, params.b_w, rows);
        let products: Vec<BigUint> = design
            .grid
            .iter()
            .map(|term| &a[term.col] * &b[term.row])
            .collect();

        let zero = BigUint::zero();
        let accum: Vec<_> = design
            .accumulators
            .iter()
            .map(|sum| {
                sum.evaluate(|signal| match signal {
                    Signal::Product { col, row } => &products[col * rows + row],
                    _ => &zero,
                })
            })
            .collect();

        let addresses: Vec<_> = design.tables.iter().map(|t| t.address(&accum)).collect();
        let lookups: Vec<_> = design
            .tables
            .iter()
            .zip(&addresses)
            .map(|(table, &address)| table.entry(params, address))
            .collect();

        let accum2: Vec<_> = design
            .combiners
            .iter()
            .map(|sum| {
                sum.evaluate(|signal| match signal {
                    Signal::Table(index) => &lookups[index],
                    Signal::Accum(c) => &accum[c],
                    Signal::Product { .. } => &zero,
                })
            })
            .collect();

        let res0 = design.reducer.sum(params, &accum2);
        let candidates = design.reducer.reduce(params, &res0);

        Ok(Trace {
            accum,
            addresses,
            lookups,
            accum2,
            res0,
            candidates,
        })
    }

    /// `x * y mod M` as the circuit selects it.
    pub fn multiply(&self, x: &BigUint, y: &BigUint) -> Result<Option<BigUint>> {
        let trace = self.evaluate(x, y)?;
        Ok(trace.candidates.select(&self.design.params.modulus))
    }

    /// Number of `pairs` on which the circuit disagrees with `x * y mod M`.
    pub fn check(&self, pairs: &[(BigUint, BigUint)]) -> Result<usize> {
        let modulus = &self.design.params.modulus;
        let mut failures = 0;
        for (x, y) in pairs {
            let expected = (x * y) % modulus;
            match self.multiply(x, y)? {
                Some(result) if result == expected => {}
                result => {
                    warn!(%x, %y, %expected, ?result, "mismatch");
                    failures += 1;
                }
            }
        }
        debug!(samples = pairs.len(), failures, "checked");
        Ok(failures)
    }
}
