//! Final lookup and the three candidates.
//!
//! The second-stage windows are summed into `res0`. Its bits from the modulus
//! length up address one more table, whose entry is added to the low bits.
//! The result lies below `3M`, so exactly one of `res1`, `res1 - M` and
//! `res1 - 2M` is the reduced product.

use num_bigint::{BigInt, BigUint};
use tracing::debug;

use crate::{
    reduce::{ReductionTable, Segment},
    tree::{mask, Signal, Summation},
    Error, Parameters, Result,
};

pub const FINAL_TABLE: &str = "mod_ram2_0";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FinalReducer {
    /// `(a << modulus_bits) mod M`, addressed by `res0[modulus_bits +: ram_a_w]`
    pub table: ReductionTable,
    /// width of `res0`
    pub sum_width: usize,
}

impl FinalReducer {
    /// Refuses parameters whose worst-case `res0` does not fit the final
    /// lookup.
    pub fn new(
        params: &Parameters,
        tables: &[ReductionTable],
        combiners: &[Summation],
    ) -> Result<Self> {
        let modulus_bits = params.modulus_bits();
        let sum_width = modulus_bits + params.ram_a_w;

        let needed = bound(params, tables, combiners).bits() as usize;
        if needed > sum_width {
            return Err(Error::FinalOverflow {
                needed,
                available: sum_width,
            });
        }
        debug!(needed, available = sum_width, "final lookup");

        let table = ReductionTable {
            index: tables.len(),
            name: FINAL_TABLE.to_string(),
            segments: vec![Segment {
                coef: params.reduc_coef(),
                bit: params.reduc_bit(),
                width: params.ram_a_w,
                addr_low: 0,
            }],
            data_width: modulus_bits,
        };
        Ok(Self { table, sum_width })
    }

    /// `res0` from the registered second-stage windows.
    pub fn sum(&self, params: &Parameters, accum2: &[BigUint]) -> BigUint {
        let res0: BigUint = accum2
            .iter()
            .enumerate()
            .map(|(c, value)| value << (c * params.grid))
            .sum();
        res0 & mask(self.sum_width)
    }

    pub fn reduce(&self, params: &Parameters, res0: &BigUint) -> Candidates {
        let modulus_bits = params.modulus_bits();
        let address = (res0 >> modulus_bits) & mask(params.ram_a_w);
        let address = address.iter_u64_digits().next().unwrap_or_default() as usize;
        let res1 = (res0 & mask(modulus_bits)) + self.table.entry(params, address);
        Candidates::new(res1, &params.modulus)
    }
}

/// Largest possible `res0`: every chained table at `M - 1` plus every
/// in-range accumulator slice at its maximum.
pub fn bound(params: &Parameters, tables: &[ReductionTable], combiners: &[Summation]) -> BigUint {
    let tables_max = (&params.modulus - 1u32) * tables.len();
    combiners
        .iter()
        .flat_map(|sum| {
            sum.operands
                .iter()
                .filter(|op| matches!(op.signal, Signal::Accum(_)))
                .map(move |op| op.max_value() << (sum.index * params.grid))
        })
        .fold(tables_max, |acc, value| acc + value)
}

/// `res1_c`, `res1_m_c` and `res1_m_c_`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidates {
    pub sum: BigInt,
    pub minus_one: BigInt,
    pub minus_two: BigInt,
}

impl Candidates {
    pub fn new(res1: BigUint, modulus: &BigUint) -> Self {
        let sum = BigInt::from(res1);
        let modulus = BigInt::from(modulus.clone());
        Self {
            minus_one: &sum - &modulus,
            minus_two: &sum - &modulus * 2u32,
            sum,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BigInt> {
        [&self.sum, &self.minus_one, &self.minus_two].into_iter()
    }

    /// The candidate in `[0, modulus)`, if any.
    pub fn select(&self, modulus: &BigUint) -> Option<BigUint> {
        self.iter()
            .filter_map(|c| c.to_biguint())
            .find(|c| c < modulus)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        coef::partition, combine::combine, grid::product_grid, reduce::build_tables,
        testing::toy_parameters,
    };
    use num_bigint::Sign;

    fn reducer(params: &Parameters) -> Result<FinalReducer> {
        let coefs = partition(params, &product_grid(params))?;
        let tables = build_tables(params, &coefs)?;
        let combiners = combine(params, &coefs, &tables)?;
        FinalReducer::new(params, &tables, &combiners)
    }

    #[test]
    fn toy_final_table_is_the_first_fold() {
        let params = toy_parameters();
        let reducer = reducer(&params).unwrap();
        assert_eq!(reducer.table.name, "mod_ram2_0");
        assert_eq!(reducer.table.index, 2);
        assert_eq!(reducer.sum_width, 7);
        let values: Vec<_> = reducer.table.contents(&params);
        let expected: Vec<_> = [0u32, 3, 6, 9, 12, 2, 5, 8]
            .iter()
            .map(|&v| BigUint::from(v))
            .collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn toy_bound() {
        let params = toy_parameters();
        let coefs = partition(&params, &product_grid(&params)).unwrap();
        let tables = build_tables(&params, &coefs).unwrap();
        let combiners = combine(&params, &coefs, &tables).unwrap();
        // two tables at 12 plus a six-bit accumulator
        assert_eq!(bound(&params, &tables, &combiners), BigUint::from(87u32));
    }

    #[test]
    fn every_res0_reduces() {
        let params = toy_parameters();
        let reducer = reducer(&params).unwrap();
        let modulus = BigUint::from(13u32);
        for res0 in 0..(1u32 << reducer.sum_width) {
            let res0 = BigUint::from(res0);
            let candidates = reducer.reduce(&params, &res0);
            let in_range = candidates
                .iter()
                .filter(|c| c.sign() != Sign::Minus && c.to_biguint().unwrap() < modulus)
                .count();
            assert_eq!(in_range, 1, "res0 = {}", res0);
            assert_eq!(candidates.select(&modulus), Some(&res0 % &modulus));
        }
    }

    #[test]
    fn narrow_final_lookup_overflows() {
        // a one-bit final address cannot absorb six tables and the accumulator
        let params = Parameters {
            ram_a_w: 1,
            ..toy_parameters()
        };
        assert!(matches!(
            reducer(&params),
            Err(Error::FinalOverflow { available: 5, .. })
        ));
    }

    #[test]
    fn default_parameters_fit() {
        let params = Parameters::default();
        let reducer = reducer(&params).unwrap();
        assert_eq!(reducer.sum_width, 391);
        assert_eq!(reducer.table.segments[0].position(params.grid), 381);
        assert_eq!(reducer.table.depth(), 1024);
    }
}
