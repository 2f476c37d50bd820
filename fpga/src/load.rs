//! Reprogram every reduction table from one narrow bus.
//!
//! Per address, the table values are concatenated (table 0 least significant)
//! and shifted in most-significant chunk first, so that after the last shift
//! each table's data register holds its own value. One write beat then stores
//! all of them and advances the shared address counter.

use num_bigint::BigUint;
use num_traits::{One as _, ToPrimitive as _, Zero as _};
use tracing::debug;

use crate::{sim::RAM_PIPE, Beat, Error, Flush as _, Result, Stream, Streamable as _, Write};

/// Number of shift beats needed per address.
pub fn shifts_per_address(tables: usize, data_width: usize, bus_width: usize) -> usize {
    (tables * data_width + bus_width - 1) / bus_width
}

/// Bus beats that load `tables` (each value `data_width` bits wide) over a
/// `bus_width`-bit bus, starting from address 0.
///
/// Tables shorter than the deepest one are padded with zeros; the pipeline
/// drops writes past their depth anyway.
pub fn beats(tables: &[Vec<BigUint>], data_width: usize, bus_width: usize) -> Result<Vec<Beat>> {
    if tables.is_empty() {
        return Err(Error::NoTables);
    }
    let max = data_width.min(64);
    if bus_width == 0 || bus_width > max {
        return Err(Error::BusWidth {
            bus: bus_width,
            max,
        });
    }

    let depth = tables.iter().map(Vec::len).max().unwrap_or(0);
    let shifts = shifts_per_address(tables.len(), data_width, bus_width);
    let bus_mask = (BigUint::one() << bus_width) - 1u32;

    let mut beats = Vec::with_capacity(depth * (shifts + 1 + RAM_PIPE));
    for address in 0..depth {
        let mut image = BigUint::zero();
        for (table, values) in tables.iter().enumerate().rev() {
            let value = values.get(address).cloned().unwrap_or_default();
            if value.bits() as usize > data_width {
                return Err(Error::TableShape {
                    table,
                    address,
                    width: data_width,
                });
            }
            image = (image << data_width) | value;
        }

        for chunk in (0..shifts).rev() {
            let word = (&image >> (chunk * bus_width)) & &bus_mask;
            beats.push(Beat::shift(word.to_u64().unwrap_or_default()));
        }
        beats.push(Beat::write());
        // the counter needs RAM_PIPE cycles to reach the write stage
        beats.extend(core::iter::repeat(Beat::IDLE).take(RAM_PIPE));
    }

    debug!(depth, shifts, beats = beats.len(), "table load image");
    Ok(beats)
}

/// Stream the bus image of `tables` into `fpga` and flush.
///
/// Returns the number of beats written.
pub fn load<F: Write<Beat>>(
    fpga: &mut F,
    tables: &[Vec<BigUint>],
    data_width: usize,
    bus_width: usize,
) -> Result<usize> {
    let beats = beats(tables, data_width, bus_width)?;
    let mut stream: Stream<'_, Beat, F> = fpga.stream(0);
    for beat in &beats {
        stream.write(beat);
    }
    stream.flush();
    Ok(stream.offset())
}
