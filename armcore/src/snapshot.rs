use serde::Serialize;

use crate::{instr::Register, mode::Mode, psr::Psr, registers::Registers};

/// A copy of the architecturally visible state, for debuggers and test
/// harnesses. Taking one never changes the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub mode: Mode,
    /// R0 to R15 as seen from the current mode. R15 is the address of the
    /// next instruction to execute.
    pub registers: [u32; 16],
    /// R0 to R15 of the user bank.
    pub user_registers: [u32; 16],
    pub cpsr: Psr,
    /// The SPSR of the current mode, if it has one.
    pub spsr: Option<Psr>,
}

impl Snapshot {
    pub fn capture(registers: &Registers) -> Self {
        let mode = registers.mode();
        Self {
            mode,
            registers: Register::ALL.map(|register| registers.get(register)),
            user_registers: Register::ALL.map(|register| registers.get_user(register)),
            cpsr: registers.cpsr(),
            spsr: registers.spsr_of(mode),
        }
    }
}
