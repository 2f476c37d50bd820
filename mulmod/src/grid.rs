//! Partial products of the two-operand multiply.

use core::ops::Range;

use crate::Parameters;

/// Product of word `col` of the first operand and word `row` of the second,
/// placed at its offset in the `2 * bits` product.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ProductTerm {
    pub col: usize,
    pub row: usize,
    pub offset: usize,
}

impl ProductTerm {
    pub const fn range(&self, res_w: usize) -> Range<usize> {
        self.offset..self.offset + res_w
    }
}

/// All partial products, column-major.
pub fn product_grid(params: &Parameters) -> Vec<ProductTerm> {
    let (a_w, b_w, rows) = (params.a_w, params.b_w, params.num_row());
    (0..params.num_col())
        .flat_map(|col| {
            (0..rows).map(move |row| ProductTerm {
                col,
                row,
                offset: col * a_w + row * b_w,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{random_operands, toy_parameters};
    use num_bigint::BigUint;
    use num_traits::One as _;
    use proptest::prelude::*;

    #[test]
    fn toy_grid() {
        let grid = product_grid(&toy_parameters());
        let offsets: Vec<_> = grid.iter().map(|t| (t.col, t.row, t.offset)).collect();
        assert_eq!(offsets, vec![(0, 0, 0), (0, 1, 2), (1, 0, 2), (1, 1, 4)]);
    }

    #[test]
    fn default_grid_size() {
        let params = Parameters::default();
        assert_eq!(product_grid(&params).len(), 15 * 23);
    }

    #[test]
    fn partial_products_sum_to_product() {
        let params = Parameters::default();
        let mask = |w: usize| (BigUint::one() << w) - 1u32;
        for (x, y) in random_operands(params.bits, 8, 7) {
            let sum: BigUint = product_grid(&params)
                .iter()
                .map(|t| {
                    let a = (&x >> (t.col * params.a_w)) & mask(params.a_w);
                    let b = (&y >> (t.row * params.b_w)) & mask(params.b_w);
                    (a * b) << t.offset
                })
                .sum();
            assert_eq!(sum, &x * &y);
        }
    }

    proptest! {
        #[test]
        fn terms_cover_the_product(bits in 1usize..200, a_w in 1usize..40, b_w in 1usize..40) {
            let params = Parameters { bits, a_w, b_w, ..Parameters::default() };
            let grid = product_grid(&params);
            prop_assert_eq!(grid.len(), params.num_col() * params.num_row());

            let mut covered = vec![false; 2 * bits];
            for term in &grid {
                // every term starts on a word boundary of both operands
                prop_assert_eq!(term.offset, term.col * a_w + term.row * b_w);
                prop_assert!(term.offset < 2 * bits);
                for bit in term.range(params.res_w()) {
                    if let Some(slot) = covered.get_mut(bit) {
                        *slot = true;
                    }
                }
            }
            prop_assert!(covered.iter().all(|&c| c));
        }
    }
}
