//! Registered window sums: pass-through, two-term add, or 3:2 compressor tree.
//!
//! Both accumulation stages are lists of [`Summation`]s over padded
//! [`Operand`]s. The same structure is rendered to RTL and evaluated by the
//! reference model, so the two cannot drift apart.

use num_bigint::BigUint;
use num_traits::{One as _, Zero as _};

/// Source register of an operand.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Signal {
    /// DSP output `mul_grid[col][row]`
    Product { col: usize, row: usize },
    /// output of chained reduction table `k`
    Table(usize),
    /// first-stage accumulator of window `c`, delayed to line up with the tables
    Accum(usize),
}

/// `signal[lsb +: width]`, shifted up by `shift` zero bits and zero-extended
/// to `padded` bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Operand {
    pub signal: Signal,
    pub lsb: usize,
    pub width: usize,
    pub shift: usize,
    pub padded: usize,
}

impl Operand {
    /// Zero bits above the slice.
    pub fn high_padding(&self) -> usize {
        self.padded - self.shift - self.width
    }

    pub fn value(&self, source: &BigUint) -> BigUint {
        ((source >> self.lsb) & mask(self.width)) << self.shift
    }

    /// Largest value the operand can carry.
    pub fn max_value(&self) -> BigUint {
        mask(self.width) << self.shift
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// partial products into `accum_grid_o`
    Accumulate,
    /// table outputs and in-range bits into `accum2_grid_o`
    Combine,
}

/// Parameters of one `compressor_tree_3_to_2` instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CompressionNode {
    pub num_elements: usize,
    pub bit_len: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Policy {
    /// no operands, register tied to zero
    Zero,
    Direct,
    Add,
    Compress(CompressionNode),
}

/// One window register and the operands summed into it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Summation {
    pub stage: Stage,
    pub index: usize,
    pub width: usize,
    pub operands: Vec<Operand>,
}

impl Summation {
    pub fn policy(&self) -> Policy {
        match self.operands.len() {
            0 => Policy::Zero,
            1 => Policy::Direct,
            2 => Policy::Add,
            num_elements => Policy::Compress(CompressionNode {
                num_elements,
                bit_len: self.width,
            }),
        }
    }

    /// Sum of every operand at its maximum.
    pub fn worst_case(&self) -> BigUint {
        self.operands.iter().map(Operand::max_value).sum()
    }

    /// Register value, truncated to `width` bits the way the hardware is.
    pub fn evaluate<'a>(&self, signal: impl Fn(Signal) -> &'a BigUint) -> BigUint {
        let values = self
            .operands
            .iter()
            .map(|operand| operand.value(signal(operand.signal)));
        let sum = match self.policy() {
            Policy::Zero => BigUint::zero(),
            Policy::Direct | Policy::Add => values.sum(),
            Policy::Compress(node) => {
                let (carry, save) = compress(values.collect(), node.bit_len);
                carry + save
            }
        };
        sum & mask(self.width)
    }
}

/// `2^width - 1`
pub fn mask(width: usize) -> BigUint {
    (BigUint::one() << width) - 1u32
}

/// Carry-save reduction of `terms` to two values, modulo `2^width`.
///
/// Each full-adder layer turns three terms into a sum and a carry word until
/// two remain.
pub fn compress(mut terms: Vec<BigUint>, width: usize) -> (BigUint, BigUint) {
    let mask = mask(width);
    while terms.len() > 2 {
        let mut next = Vec::with_capacity(2 * terms.len() / 3 + 2);
        let mut triples = terms.chunks_exact(3);
        for triple in &mut triples {
            let (a, b, c) = (&triple[0], &triple[1], &triple[2]);
            let save = a ^ b ^ c;
            let carry = ((a & b) | (a & c) | (b & c)) << 1;
            next.push(carry & &mask);
            next.push(save & &mask);
        }
        next.extend(triples.remainder().iter().cloned());
        terms = next;
    }

    let mut terms = terms.into_iter();
    let carry = terms.next().unwrap_or_default();
    let save = terms.next().unwrap_or_default();
    (carry, save)
}
