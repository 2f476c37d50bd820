//! Generation parameters.

use ark_ff::PrimeField;
use num_bigint::BigUint;
use num_integer::Integer as _;

use crate::{Error, Result};

/// Largest supported table address width; every table has at most
/// `2^MAX_RAM_A_W` entries.
pub const MAX_RAM_A_W: usize = 20;

/// Widest external table data bus.
pub const MAX_RAM_D_W: usize = 64;

/// Fixed at generation time; nothing here changes once the circuit is built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameters {
    /// operand bit length
    pub bits: usize,
    pub modulus: BigUint,
    /// word width of the first operand (DSP A port)
    pub a_w: usize,
    /// word width of the second operand (DSP B port)
    pub b_w: usize,
    /// width of one accumulation window
    pub grid: usize,
    /// reduction table address width
    pub ram_a_w: usize,
    /// width of the external table write bus
    pub ram_d_w: usize,
    /// share of the reduction tables, in percent, placed in ultra RAM
    pub uram_percent: usize,
    /// emit `$readmemh` initialisation for the tables
    pub use_init: bool,
}

impl Default for Parameters {
    /// 381-bit operands over the BLS12-381 base field.
    fn default() -> Self {
        Self {
            bits: 381,
            modulus: <ark_bls12_381::Fq as PrimeField>::MODULUS.into(),
            a_w: 26,
            b_w: 17,
            grid: 64,
            ram_a_w: 10,
            ram_d_w: 32,
            uram_percent: 0,
            use_init: true,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        for (name, width) in [
            ("bits", self.bits),
            ("a_w", self.a_w),
            ("b_w", self.b_w),
            ("grid", self.grid),
            ("ram_a_w", self.ram_a_w),
            ("ram_d_w", self.ram_d_w),
        ] {
            if width == 0 {
                return Err(Error::InvalidWidth(name));
            }
        }

        if self.modulus.is_even() {
            return Err(Error::EvenModulus);
        }
        if self.modulus < BigUint::from(3u32) {
            return Err(Error::ModulusTooSmall);
        }
        if self.modulus_bits() > self.bits {
            return Err(Error::ModulusTooWide {
                modulus_bits: self.modulus_bits(),
                bits: self.bits,
            });
        }

        if self.ram_a_w > MAX_RAM_A_W {
            return Err(Error::AddressTooWide {
                width: self.ram_a_w,
                max: MAX_RAM_A_W,
            });
        }
        let max_bus = self.modulus_bits().min(MAX_RAM_D_W);
        if self.ram_d_w > max_bus {
            return Err(Error::BusTooWide {
                bus: self.ram_d_w,
                max: max_bus,
            });
        }
        if self.uram_percent > 100 {
            return Err(Error::UramPercent(self.uram_percent));
        }
        Ok(())
    }

    /// Width of one partial product.
    pub const fn res_w(&self) -> usize {
        self.a_w + self.b_w
    }

    /// Words of the first operand.
    pub const fn num_col(&self) -> usize {
        (self.bits + self.a_w - 1) / self.a_w
    }

    /// Words of the second operand.
    pub const fn num_row(&self) -> usize {
        (self.bits + self.b_w - 1) / self.b_w
    }

    /// Accumulation windows tiling the `2 * bits` product.
    pub const fn max_coef(&self) -> usize {
        (2 * self.bits + self.grid - 1) / self.grid
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus.bits() as usize
    }

    /// Hex digits of one table entry.
    pub fn hex_digits(&self) -> usize {
        (self.modulus_bits() + 3) / 4
    }

    /// Window holding the first bit at or above the modulus length.
    pub fn reduc_coef(&self) -> usize {
        self.modulus_bits() / self.grid
    }

    /// Position of that bit inside its window.
    pub fn reduc_bit(&self) -> usize {
        self.modulus_bits() % self.grid
    }

    /// Windows of the reduced result.
    pub fn reduced_windows(&self) -> usize {
        (self.modulus_bits() + self.grid - 1) / self.grid
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BLS12_381_P: &str = "1a0111ea397fe69a4b1ba7b6434bacd764774b84f38512bf6730d2a0f6b0f6241eabfffeb153ffffb9feffffffffaaab";

    #[test]
    fn default_is_bls12_381() {
        let params = Parameters::default();
        params.validate().unwrap();
        assert_eq!(
            params.modulus,
            BigUint::parse_bytes(BLS12_381_P.as_bytes(), 16).unwrap()
        );
        assert_eq!(params.modulus_bits(), 381);
        assert_eq!(params.hex_digits(), 96);
        assert_eq!((params.num_col(), params.num_row()), (15, 23));
        assert_eq!(params.max_coef(), 12);
        assert_eq!((params.reduc_coef(), params.reduc_bit()), (5, 61));
        assert_eq!(params.reduced_windows(), 6);
    }

    #[test]
    fn rejects_inconsistent_parameters() {
        let base = Parameters::default();

        let params = Parameters { grid: 0, ..base.clone() };
        assert!(matches!(params.validate(), Err(Error::InvalidWidth("grid"))));

        let params = Parameters { bits: 380, ..base.clone() };
        assert!(matches!(
            params.validate(),
            Err(Error::ModulusTooWide {
                modulus_bits: 381,
                bits: 380
            })
        ));

        let params = Parameters {
            modulus: BigUint::from(12u32),
            ..base.clone()
        };
        assert!(matches!(params.validate(), Err(Error::EvenModulus)));

        let params = Parameters {
            modulus: BigUint::from(1u32),
            ..base.clone()
        };
        assert!(matches!(params.validate(), Err(Error::ModulusTooSmall)));

        let params = Parameters { ram_d_w: 65, ..base.clone() };
        assert!(matches!(
            params.validate(),
            Err(Error::BusTooWide { bus: 65, max: 64 })
        ));

        let params = Parameters { ram_a_w: 21, ..base.clone() };
        assert!(matches!(params.validate(), Err(Error::AddressTooWide { .. })));

        let params = Parameters {
            uram_percent: 101,
            ..base
        };
        assert!(matches!(params.validate(), Err(Error::UramPercent(101))));
    }
}
