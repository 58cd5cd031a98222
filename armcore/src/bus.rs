//! The memory interface consumed by the processor, and the cycle counts it
//! reports back per instruction.

use std::ops::AddAssign;

use serde::Serialize;

/// The width of a single bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    HalfWord,
    Word,
}

/// One of the cycle types in the CPU that the processor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cycle {
    /// The processor accessed a portion of memory unrelated to the address
    /// used in the preceding cycle.
    NonSeq,
    /// The processor accessed a memory location at the same address to last
    /// cycle, or a halfword or word afterwards.
    Seq,
    /// An internal cycle which does not require a memory transfer.
    Internal,
}

/// Anything the processor can fetch from and transfer to.
///
/// The processor does not interpret addresses: alignment, mirroring and
/// memory-mapped registers are the bus's concern. Reads take `&mut self`
/// so that implementors may model read side effects.
pub trait Bus {
    fn read_byte(&mut self, address: u32) -> u8;
    fn read_half_word(&mut self, address: u32) -> u16;
    fn read_word(&mut self, address: u32) -> u32;
    fn write_byte(&mut self, address: u32, value: u8);
    fn write_half_word(&mut self, address: u32, value: u16);
    fn write_word(&mut self, address: u32, value: u32);

    /// Extra cycles a memory cycle of the given kind costs at `address`.
    fn wait_states(&self, _address: u32, _width: Width, _cycle: Cycle) -> u32 {
        0
    }
}

/// The aggregate cost of executing one instruction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cycles {
    pub non_seq: u32,
    pub seq: u32,
    pub internal: u32,
    pub wait: u32,
}

impl Cycles {
    pub fn total(&self) -> u32 {
        self.non_seq + self.seq + self.internal + self.wait
    }

    pub(crate) fn record(&mut self, cycle: Cycle, count: u32) {
        match cycle {
            Cycle::NonSeq => self.non_seq += count,
            Cycle::Seq => self.seq += count,
            Cycle::Internal => self.internal += count,
        }
    }
}

impl AddAssign for Cycles {
    fn add_assign(&mut self, rhs: Self) {
        self.non_seq += rhs.non_seq;
        self.seq += rhs.seq;
        self.internal += rhs.internal;
        self.wait += rhs.wait;
    }
}

impl std::fmt::Display for Cycles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}N + {}S + {}I + {}W = {}",
            self.non_seq,
            self.seq,
            self.internal,
            self.wait,
            self.total()
        )
    }
}
