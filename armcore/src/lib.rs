//! A model of the ARM7TDMI processor core (ARMv4T), as found in handheld
//! game consoles: banked registers, both instruction sets, exceptions,
//! interrupts and per-instruction cycle counts against a pluggable bus.

pub mod alu;
pub mod bus;
pub mod condition;
pub mod instr;
pub mod memory;
pub mod mode;
pub mod processor;
pub mod psr;
pub mod registers;
pub mod shifter;
pub mod snapshot;
