//! # fpga
//!
//! Host-side plumbing for the accumulate-and-reduce multiplier.
//!
//! - [`sim`]: cycle model of the reduction-table write/shift pipeline
//! - [`load`]: narrow-bus loader that reprograms every table through that pipeline
//! - [`reply`]: length-prefixed reply frames and the reply-kind registry

use core::marker::PhantomData;
use thiserror::Error;

pub mod load;
pub use load::{beats, load};

pub mod null;

pub mod reply;
pub use reply::{frames, Frame, Frames, Registry, Reply};

pub mod sim;
pub use sim::{Beat, WritePipeline, RAM_PIPE};

#[derive(Debug, Error)]
pub enum Error {
    #[error("bus width {bus} must be between 1 and {max} bits")]
    BusWidth { bus: usize, max: usize },
    #[error("no tables to load")]
    NoTables,
    #[error("table {table} holds a value wider than {width} bits at address {address}")]
    TableShape {
        table: usize,
        address: usize,
        width: usize,
    },
    #[error("truncated frame: {needed} bytes needed, {available} available")]
    TruncatedFrame { needed: usize, available: usize },
    #[error("frame length {0} is shorter than its header")]
    BadFrameLength(u32),
    #[error("unknown reply kind {0:#010x}")]
    UnknownReply(u32),
    #[error("reply kind {code:#010x} registered twice ({first}, {second})")]
    DuplicateReplyKind {
        code: u32,
        first: &'static str,
        second: &'static str,
    },
    #[error("{kind}: fields need {needed} bytes, payload has {available}")]
    FieldOverrun {
        kind: &'static str,
        needed: usize,
        available: usize,
    },
}

pub type Result<T> = core::result::Result<T, Error>;

/// Flush communications
pub trait Flush {
    /// flush communications
    fn flush(&mut self);
}

/// Index-based writes to an FPGA.
pub trait Write<V>: Flush {
    /// write value to index
    fn write(&mut self, index: usize, value: &V);
}

/// App-specific backoff mechanism used in streaming.
pub trait Backoff<FPGA> {
    fn backoff(fpga: &mut FPGA, offset: usize);
}

/// Streaming writes to an FPGA.
///
/// The backoff depends on the FPGA app's implementation of streaming.
pub struct Stream<'a, P, FPGA: Write<P>, B = null::Backoff> {
    fpga: &'a mut FPGA,
    offset: usize,
    __: PhantomData<(B, P)>,
}

/// Marker trait for FPGAs supporting streaming writes.
pub trait Streamable<'a, P, B: Backoff<Self> = null::Backoff>: Sized + Write<P> {
    /// initialize new stream
    fn stream(&'a mut self, offset: usize) -> Stream<'a, P, Self, B>;
}

impl<'a, P, FPGA: Write<P>, B: Backoff<FPGA>> Streamable<'a, P, B> for FPGA {
    fn stream(&'a mut self, offset: usize) -> Stream<'a, P, FPGA, B> {
        Stream {
            fpga: self,
            offset,
            __: PhantomData,
        }
    }
}

impl<'a, P, FPGA: Flush + Write<P>, B> Flush for Stream<'a, P, FPGA, B> {
    fn flush(&mut self) {
        self.fpga.flush()
    }
}

impl<'a, P, FPGA: Write<P>, B> Stream<'a, P, FPGA, B> {
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a, P, FPGA: Write<P>, B: Backoff<FPGA>> Stream<'a, P, FPGA, B> {
    #[inline(always)]
    pub fn write(&mut self, packet: &P) {
        self.fpga.write(self.offset, packet);
        self.offset += 1;
        B::backoff(self.fpga, self.offset);
    }
}
