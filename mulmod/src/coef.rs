//! Accumulation windows ("coefficients") over the product space.
//!
//! Window `i` covers product bits `[i * grid, (i + 1) * grid)`. Every partial
//! product overlapping it contributes the overlapping slice, placed at its
//! position inside the window. The window register is wide enough for the
//! furthest-reaching slice plus `ceil(log2(n))` guard bits for the carries of
//! `n` slices.

use tracing::debug;

use crate::{
    grid::ProductTerm,
    tree::{Operand, Signal, Stage, Summation},
    Error, Parameters, Result,
};

/// Slice `[lsb, lsb + width)` of a partial product, `shift` bits above the
/// window base.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    pub term: ProductTerm,
    pub lsb: usize,
    pub width: usize,
    pub shift: usize,
}

impl Placement {
    /// Bits from the window base to the top of the slice.
    pub const fn extent(&self) -> usize {
        self.shift + self.width
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Coefficient {
    pub index: usize,
    pub placements: Vec<Placement>,
    /// register width, guard bits included; zero for an empty window
    pub max_bits: usize,
}

impl Coefficient {
    /// Padded operands of the first-stage sum.
    pub fn summation(&self) -> Summation {
        let operands = self
            .placements
            .iter()
            .map(|placement| Operand {
                signal: Signal::Product {
                    col: placement.term.col,
                    row: placement.term.row,
                },
                lsb: placement.lsb,
                width: placement.width,
                shift: placement.shift,
                padded: self.max_bits,
            })
            .collect();
        Summation {
            stage: Stage::Accumulate,
            index: self.index,
            width: self.max_bits,
            operands,
        }
    }
}

/// `ceil(log2(n))`: extra bits that absorb the carries of summing `n` terms.
pub fn guard_bits(n: usize) -> Result<usize> {
    match n {
        0 => Err(Error::EmptyTermList),
        n => Ok((usize::BITS - (n - 1).leading_zeros()) as usize),
    }
}

/// Window `index` of the product space.
pub fn coefficient(params: &Parameters, terms: &[ProductTerm], index: usize) -> Result<Coefficient> {
    let lo = index * params.grid;
    let hi = lo + params.grid;

    let placements: Vec<_> = terms
        .iter()
        .filter_map(|term| {
            let range = term.range(params.res_w());
            let start = range.start.max(lo);
            let end = range.end.min(hi);
            (end > start).then(|| Placement {
                term: *term,
                lsb: start - term.offset,
                width: end - start,
                shift: start - lo,
            })
        })
        .collect();

    let max_bits = match placements.iter().map(Placement::extent).max() {
        Some(extent) => extent + guard_bits(placements.len())?,
        None => 0,
    };

    Ok(Coefficient {
        index,
        placements,
        max_bits,
    })
}

/// Every window of the `2 * bits` product, in order.
pub fn partition(params: &Parameters, terms: &[ProductTerm]) -> Result<Vec<Coefficient>> {
    let coefficients = (0..params.max_coef())
        .map(|index| coefficient(params, terms, index))
        .collect::<Result<Vec<_>>>()?;

    for coef in &coefficients {
        debug!(
            coef = coef.index,
            terms = coef.placements.len(),
            max_bits = coef.max_bits,
            "partitioned"
        );
    }
    Ok(coefficients)
}
