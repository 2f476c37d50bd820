//! The whole generated multiplier, built once from [`Parameters`].

use fpga::WritePipeline;
use num_bigint::BigUint;
use rayon::prelude::*;
use tracing::info;

use crate::{
    coef::{partition, Coefficient},
    combine::combine,
    finalize::FinalReducer,
    grid::{product_grid, ProductTerm},
    reduce::{build_tables, hex_line, ReductionTable},
    rtl::Rtl,
    timing::timed,
    tree::Summation,
    Parameters, Result,
};

#[derive(Clone, Debug)]
pub struct Design {
    pub params: Parameters,
    pub grid: Vec<ProductTerm>,
    pub coefficients: Vec<Coefficient>,
    /// first stage, one per coefficient
    pub accumulators: Vec<Summation>,
    /// chained reduction tables, in address-bit order
    pub tables: Vec<ReductionTable>,
    /// second stage, one per window of the reduced result
    pub combiners: Vec<Summation>,
    pub reducer: FinalReducer,
}

/// One memory initialisation file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableFile {
    pub name: String,
    pub contents: String,
}

impl TableFile {
    pub fn file_name(&self) -> String {
        format!("{}.mem", self.name)
    }
}

/// Everything the synthesis flow reads.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Artifacts {
    pub rtl: String,
    /// chained tables in order, the final table last
    pub tables: Vec<TableFile>,
}

impl Design {
    pub fn build(params: Parameters) -> Result<Self> {
        params.validate()?;

        let grid = product_grid(&params);
        let coefficients = timed("partitioning", || partition(&params, &grid))?;
        let accumulators = coefficients.iter().map(Coefficient::summation).collect();
        let tables = timed("reduction tables", || build_tables(&params, &coefficients))?;
        let combiners = combine(&params, &coefficients, &tables)?;
        let reducer = FinalReducer::new(&params, &tables, &combiners)?;

        info!(
            bits = params.bits,
            products = grid.len(),
            coefficients = coefficients.len(),
            tables = tables.len(),
            windows = combiners.len(),
            "design built"
        );

        Ok(Self {
            params,
            grid,
            coefficients,
            accumulators,
            tables,
            combiners,
            reducer,
        })
    }

    /// Chained tables followed by the final table.
    pub fn all_tables(&self) -> impl Iterator<Item = &ReductionTable> {
        self.tables.iter().chain(Some(&self.reducer.table))
    }

    /// Entries of every table, in [`Design::all_tables`] order.
    pub fn contents(&self) -> Vec<Vec<BigUint>> {
        let tables: Vec<_> = self.all_tables().collect();
        timed("table contents", || {
            tables
                .par_iter()
                .map(|table| table.contents(&self.params))
                .collect()
        })
    }

    /// Stream `contents` into a fresh write pipeline over the `ram_d_w`-bit
    /// bus, the way the host reprograms the tables.
    pub fn program(&self, contents: &[Vec<BigUint>]) -> Result<WritePipeline> {
        let depths: Vec<_> = self.all_tables().map(ReductionTable::depth).collect();
        let (data_width, bus) = (self.params.modulus_bits(), self.params.ram_d_w);
        let mut pipeline = WritePipeline::new(&depths, self.params.ram_a_w, data_width, bus)?;
        let beats = timed("loading tables", || {
            fpga::load(&mut pipeline, contents, data_width, bus)
        })?;
        info!(beats, cycles = pipeline.cycles(), "tables programmed");
        Ok(pipeline)
    }

    pub fn artifacts(&self) -> Artifacts {
        let digits = self.params.hex_digits();
        let tables = self
            .all_tables()
            .zip(self.contents())
            .map(|(table, values)| {
                let contents = values
                    .iter()
                    .map(|value| hex_line(value, digits) + "\n")
                    .collect();
                TableFile {
                    name: table.name.clone(),
                    contents,
                }
            })
            .collect();

        Artifacts {
            rtl: Rtl(self).to_string(),
            tables,
        }
    }
}
