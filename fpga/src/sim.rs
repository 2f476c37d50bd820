//! Cycle model of the reduction-table write/shift pipeline.
//!
//! Mirrors the generated write path: the external `(data, we, se)` tuple runs
//! through [`RAM_PIPE`] delay registers, the address counter has its own delay
//! line, and only the last stage acts on the tables.

use num_bigint::BigUint;
use num_traits::{One as _, Zero as _};

use crate::{Error, Flush, Result, Write};

/// Number of delay registers between the bus and the tables.
pub const RAM_PIPE: usize = 4;

/// One cycle of the external table write bus.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Beat {
    pub data: u64,
    /// write every table at the current address, then advance the address
    pub we: bool,
    /// shift `data` into the table data chain
    pub se: bool,
}

impl Beat {
    pub const IDLE: Beat = Beat {
        data: 0,
        we: false,
        se: false,
    };

    pub const fn shift(data: u64) -> Self {
        Beat {
            data,
            we: false,
            se: true,
        }
    }

    pub const fn write() -> Self {
        Beat {
            data: 0,
            we: true,
            se: false,
        }
    }
}

/// Write/shift pipeline in front of a chain of tables.
pub struct WritePipeline {
    bus_width: usize,
    data_width: usize,
    addr_mask: usize,
    stages: [Beat; RAM_PIPE + 1],
    addr: [usize; RAM_PIPE + 1],
    data: Vec<BigUint>,
    rams: Vec<Vec<BigUint>>,
    cycles: usize,
}

impl WritePipeline {
    /// Pipeline in reset, in front of tables with the given depths.
    ///
    /// `addr_width` is the width of the shared address counter, which wraps.
    pub fn new(
        depths: &[usize],
        addr_width: usize,
        data_width: usize,
        bus_width: usize,
    ) -> Result<Self> {
        if depths.is_empty() {
            return Err(Error::NoTables);
        }
        let max = data_width.min(64);
        if bus_width == 0 || bus_width > max {
            return Err(Error::BusWidth {
                bus: bus_width,
                max,
            });
        }
        Ok(Self {
            bus_width,
            data_width,
            addr_mask: (1usize << addr_width) - 1,
            stages: [Beat::IDLE; RAM_PIPE + 1],
            addr: [0; RAM_PIPE + 1],
            data: vec![BigUint::zero(); depths.len()],
            rams: depths
                .iter()
                .map(|&depth| vec![BigUint::zero(); depth])
                .collect(),
            cycles: 0,
        })
    }

    /// Advance one clock edge with `input` on the bus.
    pub fn clock(&mut self, input: Beat) {
        let last = self.stages[RAM_PIPE];
        let at = self.addr[RAM_PIPE];

        if last.we {
            for (ram, data) in self.rams.iter_mut().zip(&self.data) {
                if let Some(slot) = ram.get_mut(at) {
                    *slot = data.clone();
                }
            }
        }

        if last.se {
            let mask = (BigUint::one() << self.data_width) - 1u32;
            let bus_mask = u64::MAX >> (64 - self.bus_width);
            let mut carry = BigUint::from(last.data & bus_mask);
            for data in self.data.iter_mut() {
                let out = &*data >> (self.data_width - self.bus_width);
                *data = ((&*data << self.bus_width) | carry) & &mask;
                carry = out;
            }
        }

        for i in (1..=RAM_PIPE).rev() {
            self.addr[i] = self.addr[i - 1];
            self.stages[i] = self.stages[i - 1];
        }
        if last.we {
            self.addr[0] = (self.addr[0] + 1) & self.addr_mask;
        }
        self.stages[0] = input;
        self.cycles += 1;
    }

    /// Contents of table `index`.
    pub fn table(&self, index: usize) -> &[BigUint] {
        &self.rams[index]
    }

    pub fn tables(&self) -> &[Vec<BigUint>] {
        &self.rams
    }

    /// Data register in front of table `index`.
    pub fn data(&self, index: usize) -> &BigUint {
        &self.data[index]
    }

    /// Address the next write lands on, once the pipeline is drained.
    pub fn address(&self) -> usize {
        self.addr[0]
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }
}

impl Flush for WritePipeline {
    /// Clock idle beats until everything in flight has reached the tables.
    fn flush(&mut self) {
        for _ in 0..=RAM_PIPE {
            self.clock(Beat::IDLE);
        }
    }
}

impl Write<Beat> for WritePipeline {
    fn write(&mut self, _: usize, beat: &Beat) {
        self.clock(*beat);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn beats_take_ram_pipe_cycles() {
        let mut pipe = WritePipeline::new(&[4], 2, 8, 8).unwrap();
        pipe.clock(Beat::shift(0xab));
        for _ in 0..RAM_PIPE {
            pipe.clock(Beat::IDLE);
            assert!(pipe.data(0).is_zero());
        }
        pipe.clock(Beat::IDLE);
        assert_eq!(pipe.data(0), &BigUint::from(0xabu32));
    }

    #[test]
    fn shift_carries_top_bits_down_the_chain() {
        // 6-bit tables, 4-bit bus
        let mut pipe = WritePipeline::new(&[1, 1], 0, 6, 4).unwrap();
        pipe.clock(Beat::shift(0xf));
        pipe.clock(Beat::shift(0x1));
        pipe.flush();
        // table 0: (0x0f << 4 | 0x1) & 0x3f = 0x31, top 4 bits of 0x0f were 0x3
        assert_eq!(pipe.data(0), &BigUint::from(0x31u32));
        assert_eq!(pipe.data(1), &BigUint::from(0x3u32));
    }

    #[test]
    fn write_advances_the_shared_address() {
        let mut pipe = WritePipeline::new(&[4, 2], 2, 8, 8).unwrap();
        for value in 1..=3u64 {
            pipe.clock(Beat::shift(value));
            pipe.clock(Beat::write());
            pipe.flush();
        }
        assert_eq!(pipe.address(), 3);
        let expected: Vec<_> = [0u32, 1, 2, 3].iter().map(|&v| BigUint::from(v)).collect();
        // shifted once per address, so table 1 holds what table 0 held before
        assert_eq!(pipe.table(0)[..3], expected[1..]);
        assert_eq!(pipe.table(1), &expected[..2]);
    }

    #[test]
    fn rejects_bus_wider_than_data() {
        assert!(matches!(
            WritePipeline::new(&[1], 1, 8, 9),
            Err(Error::BusWidth { bus: 9, max: 8 })
        ));
    }
}
