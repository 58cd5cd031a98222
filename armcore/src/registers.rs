//! Describes the physical registers in the processor's hardware.
//!
//! There are 31 general-purpose registers and 6 status registers. The
//! user/system bank holds R0..R14, FIQ mode banks R8..R14, and the other
//! four exception modes bank R13 and R14. R15 is shared by every mode.
//! Each exception mode also owns one saved program status register.

use std::fmt::Display;

use tracing::{debug, warn};

use crate::{
    instr::Register,
    mode::Mode,
    psr::{Flags, Psr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PhysicalRegister {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    R8Fiq,
    R9Fiq,
    R10Fiq,
    R11Fiq,
    R12Fiq,
    R13Fiq,
    R14Fiq,
    R13Svc,
    R14Svc,
    R13Abt,
    R14Abt,
    R13Irq,
    R14Irq,
    R13Und,
    R14Und,
    Cpsr,
    SpsrFiq,
    SpsrSvc,
    SpsrAbt,
    SpsrIrq,
    SpsrUnd,
}

impl Register {
    pub fn physical(self, mode: Mode) -> PhysicalRegister {
        match (self, mode) {
            (Register::R0, _) => PhysicalRegister::R0,
            (Register::R1, _) => PhysicalRegister::R1,
            (Register::R2, _) => PhysicalRegister::R2,
            (Register::R3, _) => PhysicalRegister::R3,
            (Register::R4, _) => PhysicalRegister::R4,
            (Register::R5, _) => PhysicalRegister::R5,
            (Register::R6, _) => PhysicalRegister::R6,
            (Register::R7, _) => PhysicalRegister::R7,
            (Register::R8, Mode::Fiq) => PhysicalRegister::R8Fiq,
            (Register::R9, Mode::Fiq) => PhysicalRegister::R9Fiq,
            (Register::R10, Mode::Fiq) => PhysicalRegister::R10Fiq,
            (Register::R11, Mode::Fiq) => PhysicalRegister::R11Fiq,
            (Register::R12, Mode::Fiq) => PhysicalRegister::R12Fiq,
            (Register::R8, _) => PhysicalRegister::R8,
            (Register::R9, _) => PhysicalRegister::R9,
            (Register::R10, _) => PhysicalRegister::R10,
            (Register::R11, _) => PhysicalRegister::R11,
            (Register::R12, _) => PhysicalRegister::R12,
            (Register::R13, Mode::Usr | Mode::System) => PhysicalRegister::R13,
            (Register::R13, Mode::Fiq) => PhysicalRegister::R13Fiq,
            (Register::R13, Mode::Supervisor) => PhysicalRegister::R13Svc,
            (Register::R13, Mode::Abort) => PhysicalRegister::R13Abt,
            (Register::R13, Mode::Irq) => PhysicalRegister::R13Irq,
            (Register::R13, Mode::Undefined) => PhysicalRegister::R13Und,
            (Register::R14, Mode::Usr | Mode::System) => PhysicalRegister::R14,
            (Register::R14, Mode::Fiq) => PhysicalRegister::R14Fiq,
            (Register::R14, Mode::Supervisor) => PhysicalRegister::R14Svc,
            (Register::R14, Mode::Abort) => PhysicalRegister::R14Abt,
            (Register::R14, Mode::Irq) => PhysicalRegister::R14Irq,
            (Register::R14, Mode::Undefined) => PhysicalRegister::R14Und,
            (Register::R15, _) => PhysicalRegister::R15,
        }
    }
}

/// Storage private to one exception mode.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bank<const N: usize> {
    regs: [u32; N],
    spsr: Psr,
}

impl<const N: usize> Default for Bank<N> {
    fn default() -> Self {
        Self {
            regs: [0; N],
            spsr: Psr::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    /// Always holds valid mode bits.
    cpsr: Psr,
    pc: u32,
    /// R0..R14 as seen in user and system mode.
    user: [u32; 15],
    /// R8..R14.
    fiq: Bank<7>,
    /// R13 and R14 of the remaining exception modes.
    svc: Bank<2>,
    abt: Bank<2>,
    irq: Bank<2>,
    und: Bank<2>,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            // Supervisor mode, ARM state, with both interrupts disabled.
            cpsr: Psr::from_bits(0b1101_0011),
            pc: 0,
            user: [0; 15],
            fiq: Bank::default(),
            svc: Bank::default(),
            abt: Bank::default(),
            irq: Bank::default(),
            und: Bank::default(),
        }
    }
}

impl Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CPSR {:0>8X}  {}", self.cpsr.bits(), self.cpsr)?;
        for row in Register::ALL.chunks(4) {
            for (i, register) in row.iter().enumerate() {
                if i > 0 {
                    write!(f, "  ")?;
                }
                write!(f, "{:<3} {:0>8X}", register.to_string(), self.get(*register))?;
            }
            writeln!(f)?;
        }
        match self.spsr_of(self.mode()) {
            Some(spsr) => write!(f, "SPSR {:0>8X}  {}", spsr.bits(), spsr),
            None => write!(f, "SPSR --------"),
        }
    }
}

impl Registers {
    pub fn get_physical(&self, register: PhysicalRegister) -> u32 {
        match register {
            PhysicalRegister::Cpsr => self.cpsr.bits(),
            PhysicalRegister::SpsrFiq => self.fiq.spsr.bits(),
            PhysicalRegister::SpsrSvc => self.svc.spsr.bits(),
            PhysicalRegister::SpsrAbt => self.abt.spsr.bits(),
            PhysicalRegister::SpsrIrq => self.irq.spsr.bits(),
            PhysicalRegister::SpsrUnd => self.und.spsr.bits(),
            _ => *self.slot(register),
        }
    }

    /// Resolve a general-purpose physical register to its storage.
    fn slot(&self, register: PhysicalRegister) -> &u32 {
        use PhysicalRegister as P;
        let index = register as usize;
        match register {
            P::R15 => &self.pc,
            _ if register <= P::R14 => &self.user[index],
            _ if register <= P::R14Fiq => &self.fiq.regs[index - P::R8Fiq as usize],
            P::R13Svc | P::R14Svc => &self.svc.regs[index - P::R13Svc as usize],
            P::R13Abt | P::R14Abt => &self.abt.regs[index - P::R13Abt as usize],
            P::R13Irq | P::R14Irq => &self.irq.regs[index - P::R13Irq as usize],
            P::R13Und | P::R14Und => &self.und.regs[index - P::R13Und as usize],
            _ => unreachable!("{register:?} is a status register"),
        }
    }

    fn slot_mut(&mut self, register: PhysicalRegister) -> &mut u32 {
        use PhysicalRegister as P;
        let index = register as usize;
        match register {
            P::R15 => &mut self.pc,
            _ if register <= P::R14 => &mut self.user[index],
            _ if register <= P::R14Fiq => &mut self.fiq.regs[index - P::R8Fiq as usize],
            P::R13Svc | P::R14Svc => &mut self.svc.regs[index - P::R13Svc as usize],
            P::R13Abt | P::R14Abt => &mut self.abt.regs[index - P::R13Abt as usize],
            P::R13Irq | P::R14Irq => &mut self.irq.regs[index - P::R13Irq as usize],
            P::R13Und | P::R14Und => &mut self.und.regs[index - P::R13Und as usize],
            _ => unreachable!("{register:?} is a status register"),
        }
    }

    /// Using the current mode of the processor, obtain the value of the given
    /// virtual register. R15 reads as the address of the current instruction.
    pub fn get(&self, register: Register) -> u32 {
        *self.slot(register.physical(self.mode()))
    }

    /// Get the value of the given register as in `Self::get`.
    /// But if `register` is `R15`, additionally add the given offset.
    pub fn get_pc_offset(&self, register: Register, pc_offset: u32) -> u32 {
        self.get(register)
            .wrapping_add(if register == Register::R15 {
                pc_offset
            } else {
                0
            })
    }

    pub fn set(&mut self, register: Register, value: u32) {
        *self.slot_mut(register.physical(self.mode())) = value;
    }

    /// Read the user bank regardless of the current mode.
    pub fn get_user(&self, register: Register) -> u32 {
        *self.slot(register.physical(Mode::Usr))
    }

    pub fn set_user(&mut self, register: Register, value: u32) {
        *self.slot_mut(register.physical(Mode::Usr)) = value;
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    /// Return the current program status register.
    pub fn cpsr(&self) -> Psr {
        self.cpsr
    }

    /// Replace the CPSR. This also switches the visible register bank.
    /// A value with invalid mode bits keeps the current mode.
    pub fn set_cpsr(&mut self, psr: Psr) {
        let current = self.mode();
        let (psr, mode) = match psr.mode() {
            Some(mode) => (psr, mode),
            None => {
                warn!(bits = psr.bits(), "rejected invalid mode bits written to CPSR");
                (psr.with_mode(current), current)
            }
        };
        if mode != current {
            debug!(from = %current, to = %mode, "mode switch");
        }
        self.cpsr = psr;
    }

    pub fn flags(&self) -> Flags {
        self.cpsr.flags()
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.cpsr = self.cpsr.with_flags(flags);
    }

    /// Get the current mode of the processor.
    pub fn mode(&self) -> Mode {
        match self.cpsr.mode() {
            Some(mode) => mode,
            None => unreachable!("CPSR holds invalid mode bits {:#X}", self.cpsr.bits()),
        }
    }

    /// Change mode, keeping every other bit of the CPSR.
    pub fn switch_mode(&mut self, mode: Mode) {
        self.set_cpsr(self.cpsr.with_mode(mode));
    }

    /// Test the T bit.
    pub fn thumb_state(&self) -> bool {
        self.cpsr.thumb()
    }

    /// The SPSR of the current mode. User and system mode have none,
    /// so there the CPSR itself is returned.
    pub fn spsr(&self) -> Psr {
        self.spsr_of(self.mode()).unwrap_or(self.cpsr)
    }

    pub fn spsr_of(&self, mode: Mode) -> Option<Psr> {
        match mode {
            Mode::Usr | Mode::System => None,
            Mode::Fiq => Some(self.fiq.spsr),
            Mode::Irq => Some(self.irq.spsr),
            Mode::Supervisor => Some(self.svc.spsr),
            Mode::Abort => Some(self.abt.spsr),
            Mode::Undefined => Some(self.und.spsr),
        }
    }

    /// Write the SPSR of the current mode. Ignored in user and system mode.
    pub fn set_spsr(&mut self, psr: Psr) {
        self.set_spsr_of(self.mode(), psr);
    }

    pub fn set_spsr_of(&mut self, mode: Mode, psr: Psr) {
        match mode {
            Mode::Usr | Mode::System => {}
            Mode::Fiq => self.fiq.spsr = psr,
            Mode::Irq => self.irq.spsr = psr,
            Mode::Supervisor => self.svc.spsr = psr,
            Mode::Abort => self.abt.spsr = psr,
            Mode::Undefined => self.und.spsr = psr,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resets_into_supervisor_mode() {
        let registers = Registers::default();
        assert_eq!(registers.mode(), Mode::Supervisor);
        assert_eq!(registers.cpsr().bits(), 0xD3);
        assert!(!registers.thumb_state());
        assert!(Register::ALL.iter().all(|r| registers.get(*r) == 0));
    }

    #[test]
    fn fiq_banks_r8_to_r14() {
        let mut registers = Registers::default();
        registers.switch_mode(Mode::Usr);
        for register in Register::ALL {
            registers.set(register, 100 + register as u32);
        }

        registers.switch_mode(Mode::Fiq);
        registers.set(Register::R13, 0xF13);
        registers.set(Register::R8, 0xF08);
        registers.set(Register::R7, 0x707);
        assert_eq!(registers.get(Register::R12), 0);

        registers.switch_mode(Mode::Usr);
        assert_eq!(registers.get(Register::R13), 113);
        assert_eq!(registers.get(Register::R8), 108);
        // R0..R7 are shared.
        assert_eq!(registers.get(Register::R7), 0x707);

        registers.switch_mode(Mode::Fiq);
        assert_eq!(registers.get(Register::R13), 0xF13);
        assert_eq!(registers.get(Register::R8), 0xF08);
        assert_eq!(registers.get_user(Register::R13), 113);
        assert_eq!(registers.get_physical(PhysicalRegister::R13Fiq), 0xF13);
    }

    #[test]
    fn exception_modes_bank_r13_and_r14_only() {
        let mut registers = Registers::default();
        for (mode, value) in [
            (Mode::Supervisor, 1),
            (Mode::Abort, 2),
            (Mode::Irq, 3),
            (Mode::Undefined, 4),
            (Mode::System, 5),
        ] {
            registers.switch_mode(mode);
            registers.set(Register::R14, value);
            registers.set(Register::R12, value);
        }
        assert_eq!(registers.get_physical(PhysicalRegister::R14Svc), 1);
        assert_eq!(registers.get_physical(PhysicalRegister::R14Abt), 2);
        assert_eq!(registers.get_physical(PhysicalRegister::R14Irq), 3);
        assert_eq!(registers.get_physical(PhysicalRegister::R14Und), 4);
        // System mode shares the user bank.
        assert_eq!(registers.get_user(Register::R14), 5);
        assert_eq!(registers.get_physical(PhysicalRegister::R12), 5);
    }

    #[test]
    fn user_bank_access_bypasses_mode() {
        let mut registers = Registers::default();
        registers.set_user(Register::R14, 0x1234);
        assert_eq!(registers.get(Register::R14), 0);
        assert_eq!(registers.get_user(Register::R14), 0x1234);
        registers.set_user(Register::R15, 0x80);
        assert_eq!(registers.pc(), 0x80);
    }

    #[test]
    fn spsr_reads_cpsr_without_exception_mode() {
        let mut registers = Registers::default();
        registers.set_spsr(Psr::from_bits(0xF000_0010));
        assert_eq!(registers.spsr().bits(), 0xF000_0010);

        registers.switch_mode(Mode::System);
        assert_eq!(registers.spsr(), registers.cpsr());
        registers.set_spsr(Psr::from_bits(0x10));
        assert_eq!(registers.cpsr().bits(), 0xDF);
        assert_eq!(registers.spsr_of(Mode::System), None);
        assert_eq!(registers.spsr_of(Mode::Supervisor).map(Psr::bits), Some(0xF000_0010));
    }

    #[test]
    fn invalid_mode_bits_are_rejected() {
        let mut registers = Registers::default();
        registers.set_cpsr(Psr::from_bits(0xF000_0000));
        assert_eq!(registers.mode(), Mode::Supervisor);
        assert_eq!(registers.cpsr().bits(), 0xF000_0013);
    }

    #[test]
    fn pc_offset_applies_only_to_r15() {
        let mut registers = Registers::default();
        registers.set_pc(0x100);
        registers.set(Register::R0, 0x100);
        assert_eq!(registers.get_pc_offset(Register::R15, 8), 0x108);
        assert_eq!(registers.get_pc_offset(Register::R0, 8), 0x100);
    }
}
