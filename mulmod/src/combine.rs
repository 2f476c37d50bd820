//! Second accumulation stage.
//!
//! Window `c` of the reduced result sums the `c`-th slice of every chained
//! table output with the first-stage bits that were already in range: all of
//! window `c` below the boundary window, only `[0, reduc_bit)` at it. The
//! accumulator arrives twice delayed so it lines up with the table lookup.

use tracing::debug;

use crate::{
    coef::{guard_bits, Coefficient},
    reduce::ReductionTable,
    tree::{Operand, Signal, Stage, Summation},
    Parameters, Result,
};

/// Bits of each table output that window `c` takes.
pub fn ram_bits(params: &Parameters, c: usize) -> usize {
    if c == params.reduc_coef() {
        params.grid.min(params.reduc_bit())
    } else {
        params.grid
    }
}

/// Bits of accumulator `c` that stay below the modulus length.
pub fn in_range_bits(params: &Parameters, coefs: &[Coefficient], c: usize) -> usize {
    if c == params.reduc_coef() {
        params.reduc_bit()
    } else {
        coefs[c].max_bits
    }
}

pub fn combine(
    params: &Parameters,
    coefs: &[Coefficient],
    tables: &[ReductionTable],
) -> Result<Vec<Summation>> {
    // the accumulator slice is one operand beyond the tables, present or not
    let guard = guard_bits(tables.len() + 1)?;

    let combiners: Vec<_> = (0..params.reduced_windows())
        .map(|c| {
            let ram_bits = ram_bits(params, c);
            let accum_bits = in_range_bits(params, coefs, c);
            let width = ram_bits.max(accum_bits) + guard;

            let slices = tables.iter().map(|table| Operand {
                signal: Signal::Table(table.index),
                lsb: c * params.grid,
                width: ram_bits,
                shift: 0,
                padded: width,
            });
            let accum = (accum_bits > 0).then(|| Operand {
                signal: Signal::Accum(c),
                lsb: 0,
                width: accum_bits,
                shift: 0,
                padded: width,
            });

            Summation {
                stage: Stage::Combine,
                index: c,
                width,
                operands: slices.chain(accum).collect(),
            }
        })
        .collect();

    for sum in &combiners {
        debug!(
            window = sum.index,
            operands = sum.operands.len(),
            width = sum.width,
            "second stage"
        );
    }
    Ok(combiners)
}
