//! Chained lookup tables folding accumulated bits at and above the modulus
//! length back into range.
//!
//! The overflow bits of windows `reduc_coef..max_coef` are walked in order
//! and cut into `ram_a_w`-bit addresses. One address may gather bits from any
//! number of windows; each contiguous run is a [`Segment`]. The entry of a
//! table at address `a` is the value those address bits stand for at their
//! true product positions, reduced modulo the modulus.

use core::ops::Range;

use num_bigint::BigUint;
use tracing::debug;

use crate::{coef::Coefficient, tree::mask, Error, Parameters, Result};

/// Bits `[bit, bit + width)` of window `coef`, wired to address bits
/// `[addr_low, addr_low + width)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    pub coef: usize,
    pub bit: usize,
    pub width: usize,
    pub addr_low: usize,
}

impl Segment {
    /// Product bit the segment's lowest address bit stands for.
    pub const fn position(&self, grid: usize) -> usize {
        self.coef * grid + self.bit
    }

    /// Slice of `accum` this segment contributes to the address.
    pub fn address_bits(&self, accum: &BigUint) -> BigUint {
        ((accum >> self.bit) & mask(self.width)) << self.addr_low
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReductionTable {
    pub index: usize,
    pub name: String,
    pub segments: Vec<Segment>,
    /// entry width, the modulus length
    pub data_width: usize,
}

impl ReductionTable {
    pub fn address_width(&self) -> usize {
        self.segments.iter().map(|seg| seg.width).sum()
    }

    pub fn depth(&self) -> usize {
        1 << self.address_width()
    }

    /// Unreduced value of `address`: every segment's bits moved back to their
    /// position in the product.
    pub fn reconstruct(&self, address: usize, grid: usize) -> BigUint {
        let address = BigUint::from(address);
        self.segments
            .iter()
            .map(|seg| ((&address >> seg.addr_low) & mask(seg.width)) << seg.position(grid))
            .sum()
    }

    pub fn entry(&self, params: &Parameters, address: usize) -> BigUint {
        self.reconstruct(address, params.grid) % &params.modulus
    }

    /// Every entry, in address order.
    pub fn contents(&self, params: &Parameters) -> Vec<BigUint> {
        (0..self.depth()).map(|a| self.entry(params, a)).collect()
    }

    /// Address presented to the table by the first-stage accumulators.
    pub fn address(&self, accums: &[BigUint]) -> usize {
        let address: BigUint = self
            .segments
            .iter()
            .map(|seg| seg.address_bits(&accums[seg.coef]))
            .sum();
        // bounded by the address width, never above MAX_RAM_A_W bits
        address.iter_u64_digits().next().unwrap_or_default() as usize
    }
}

/// Table address state carried between window spans.
#[derive(Clone, Debug, Default)]
struct Cursor {
    /// address bits already wired
    filled: usize,
    segments: Vec<Segment>,
}

impl Cursor {
    /// Wire `width` bits of window `coef` from `bit` up to the next free
    /// address bits.
    fn push(self, coef: usize, bit: usize, width: usize) -> Self {
        let mut segments = self.segments;
        segments.push(Segment {
            coef,
            bit,
            width,
            addr_low: self.filled,
        });
        Cursor {
            filled: self.filled + width,
            segments,
        }
    }
}

/// Accumulated bits of each window that the tables take over: everything from
/// `reduc_bit` up in the boundary window, everything in the windows above.
fn overflow_spans<'a>(
    params: &Parameters,
    coefs: &'a [Coefficient],
) -> impl Iterator<Item = (usize, Range<usize>)> + 'a {
    let (reduc_coef, reduc_bit) = (params.reduc_coef(), params.reduc_bit());
    coefs
        .iter()
        .skip(reduc_coef)
        .map(move |coef| {
            let start = if coef.index == reduc_coef { reduc_bit } else { 0 };
            (coef.index, start..coef.max_bits)
        })
        .filter(|(_, bits)| !bits.is_empty())
}

/// Cut the overflow bits into `ram_a_w`-bit table addresses.
pub fn build_tables(params: &Parameters, coefs: &[Coefficient]) -> Result<Vec<ReductionTable>> {
    let ram_a_w = params.ram_a_w;

    let (mut complete, last) = overflow_spans(params, coefs).fold(
        (Vec::new(), Cursor::default()),
        |(mut complete, mut cursor), (coef, mut bits)| {
            while !bits.is_empty() {
                let width = (ram_a_w - cursor.filled).min(bits.len());
                cursor = cursor.push(coef, bits.start, width);
                bits.start += width;
                if cursor.filled == ram_a_w {
                    complete.push(cursor.segments);
                    cursor = Cursor::default();
                }
            }
            (complete, cursor)
        },
    );
    if !last.segments.is_empty() {
        complete.push(last.segments);
    }
    if complete.is_empty() {
        return Err(Error::NoReductionTables);
    }

    let tables: Vec<_> = complete
        .into_iter()
        .enumerate()
        .map(|(index, segments)| ReductionTable {
            index,
            name: format!("mod_ram_{}", index),
            segments,
            data_width: params.modulus_bits(),
        })
        .collect();

    for table in &tables {
        debug!(
            table = %table.name,
            segments = table.segments.len(),
            address_width = table.address_width(),
            "reduction table"
        );
    }
    Ok(tables)
}

/// `value` as one line of a memory file.
pub fn hex_line(value: &BigUint, digits: usize) -> String {
    format!("{:0width$x}", value, width = digits)
}
