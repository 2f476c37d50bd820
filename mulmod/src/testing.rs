//! Generate test instances.

use ark_bls12_381::Fq;
use num_bigint::{BigUint, RandBigInt as _};
use rand::prelude::StdRng;
use rand_core::SeedableRng;

use crate::Parameters;

/// `BITS = 4`, `M = 13`, two-bit words, four-bit windows and three-bit table
/// addresses. Small enough to check every table by hand.
pub fn toy_parameters() -> Parameters {
    Parameters {
        bits: 4,
        modulus: BigUint::from(13u32),
        a_w: 2,
        b_w: 2,
        grid: 4,
        ram_a_w: 3,
        ram_d_w: 2,
        uram_percent: 0,
        use_init: true,
    }
}

/// `count` operand pairs below `2^bits`, reproducible from `seed`.
pub fn random_operands(bits: usize, count: usize, seed: u64) -> Vec<(BigUint, BigUint)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (rng.gen_biguint(bits as u64), rng.gen_biguint(bits as u64)))
        .collect()
}

/// Random base field pairs together with their product, computed by `ark-ff`.
pub fn random_fq_pairs(count: usize, seed: u64) -> Vec<(Fq, Fq, Fq)> {
    use ark_std::UniformRand;
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let (x, y) = (Fq::rand(&mut rng), Fq::rand(&mut rng));
            (x, y, x * y)
        })
        .collect()
}

/// Canonical integer of a field element.
pub fn fq_to_biguint(x: &Fq) -> BigUint {
    use ark_ff::PrimeField;
    x.into_bigint().into()
}
