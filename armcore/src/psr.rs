//! Program status registers.
//!
//! ```text
//! 31 30 29 28 27       8 7 6 5 4    0
//!  N  Z  C  V  reserved  I F T  mode
//! ```
//!
//! The same layout is used for the CPSR and for the five SPSRs.

use serde::Serialize;

use crate::mode::Mode;

const NEGATIVE: u32 = 1 << 31;
const ZERO: u32 = 1 << 30;
const CARRY: u32 = 1 << 29;
const OVERFLOW: u32 = 1 << 28;
const IRQ_DISABLE: u32 = 1 << 7;
const FIQ_DISABLE: u32 = 1 << 6;
const THUMB: u32 = 1 << 5;
const MODE_MASK: u32 = 0b11111;

/// A program status register value.
///
/// The mode bits of a `Psr` are not validated: software may store any value
/// in an SPSR. The CPSR held by [`Registers`](crate::registers::Registers)
/// only ever holds valid mode bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Psr(u32);

impl Psr {
    pub const fn from_bits(bits: u32) -> Self {
        Psr(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The mode named by the bottom five bits, if they name one.
    pub fn mode(self) -> Option<Mode> {
        Mode::try_from(self.0).ok()
    }

    pub fn with_mode(self, mode: Mode) -> Self {
        Psr(self.0 & !MODE_MASK | mode.bits())
    }

    pub fn negative(self) -> bool {
        self.0 & NEGATIVE != 0
    }

    pub fn zero(self) -> bool {
        self.0 & ZERO != 0
    }

    pub fn carry(self) -> bool {
        self.0 & CARRY != 0
    }

    pub fn overflow(self) -> bool {
        self.0 & OVERFLOW != 0
    }

    pub fn irq_disable(self) -> bool {
        self.0 & IRQ_DISABLE != 0
    }

    pub fn fiq_disable(self) -> bool {
        self.0 & FIQ_DISABLE != 0
    }

    /// The T bit: set in Thumb state, clear in ARM state.
    pub fn thumb(self) -> bool {
        self.0 & THUMB != 0
    }

    pub fn with_irq_disable(self, set: bool) -> Self {
        self.with_bit(IRQ_DISABLE, set)
    }

    pub fn with_fiq_disable(self, set: bool) -> Self {
        self.with_bit(FIQ_DISABLE, set)
    }

    pub fn with_thumb(self, set: bool) -> Self {
        self.with_bit(THUMB, set)
    }

    pub fn flags(self) -> Flags {
        Flags {
            negative: self.negative(),
            zero: self.zero(),
            carry: self.carry(),
            overflow: self.overflow(),
        }
    }

    pub fn with_flags(self, flags: Flags) -> Self {
        self.with_bit(NEGATIVE, flags.negative)
            .with_bit(ZERO, flags.zero)
            .with_bit(CARRY, flags.carry)
            .with_bit(OVERFLOW, flags.overflow)
    }

    /// Replace the bytes selected by `fields` with those of `value`.
    pub fn with_fields(self, value: u32, fields: PsrFields) -> Self {
        let mask = fields.mask();
        Psr(self.0 & !mask | value & mask)
    }

    fn with_bit(self, bit: u32, set: bool) -> Self {
        if set {
            Psr(self.0 | bit)
        } else {
            Psr(self.0 & !bit)
        }
    }
}

impl std::fmt::Display for Psr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (set, c) in [
            (self.negative(), 'N'),
            (self.zero(), 'Z'),
            (self.carry(), 'C'),
            (self.overflow(), 'V'),
            (self.irq_disable(), 'I'),
            (self.fiq_disable(), 'F'),
            (self.thumb(), 'T'),
        ] {
            write!(f, "{}", if set { c } else { '-' })?;
        }
        match self.mode() {
            Some(mode) => write!(f, " {mode}"),
            None => write!(f, " {:#07b}", self.0 & MODE_MASK),
        }
    }
}

/// The four condition flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Flags {
    pub negative: bool,
    pub zero: bool,
    pub carry: bool,
    pub overflow: bool,
}

impl Flags {
    /// Build flags from their usual bit order, `NZCV`.
    pub fn from_nzcv(nzcv: u8) -> Self {
        Flags {
            negative: nzcv & 0b1000 != 0,
            zero: nzcv & 0b0100 != 0,
            carry: nzcv & 0b0010 != 0,
            overflow: nzcv & 0b0001 != 0,
        }
    }
}

/// The field mask of an MSR instruction (bits 19..16): flags, status,
/// extension and control bytes of the PSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PsrFields(u8);

impl PsrFields {
    pub const CONTROL: PsrFields = PsrFields(0b0001);
    pub const FLAGS: PsrFields = PsrFields(0b1000);
    pub const ALL: PsrFields = PsrFields(0b1111);

    pub fn from_u4(value: u32) -> Self {
        PsrFields((value & 0xF) as u8)
    }

    pub fn mask(self) -> u32 {
        (0..4)
            .filter(|byte| self.0 & (1 << byte) != 0)
            .map(|byte| 0xFF << (byte * 8))
            .fold(0, |acc, m| acc | m)
    }

    /// Restrict to the fields present in both masks.
    pub fn intersect(self, other: PsrFields) -> Self {
        PsrFields(self.0 & other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_live_in_top_nibble() {
        let psr = Psr::from_bits(0).with_flags(Flags::from_nzcv(0b1010));
        assert_eq!(psr.bits(), 0xA000_0000);
        assert!(psr.negative() && !psr.zero() && psr.carry() && !psr.overflow());
        assert_eq!(psr.flags(), Flags::from_nzcv(0b1010));
    }

    #[test]
    fn mode_replacement_keeps_other_bits() {
        let psr = Psr::from_bits(0xF000_00D3).with_mode(Mode::Irq);
        assert_eq!(psr.bits(), 0xF000_00D2);
        assert_eq!(psr.mode(), Some(Mode::Irq));
        assert_eq!(Psr::from_bits(0).mode(), None);
    }

    #[test]
    fn field_masks() {
        assert_eq!(PsrFields::CONTROL.mask(), 0x0000_00FF);
        assert_eq!(PsrFields::FLAGS.mask(), 0xFF00_0000);
        assert_eq!(PsrFields::from_u4(0b1001).mask(), 0xFF00_00FF);
        assert_eq!(PsrFields::ALL.mask(), 0xFFFF_FFFF);
        let psr = Psr::from_bits(0x0000_0010).with_fields(0xF000_001F, PsrFields::FLAGS);
        assert_eq!(psr.bits(), 0xF000_0010);
    }

    #[test]
    fn display_lists_set_bits() {
        let psr = Psr::from_bits(0x6000_00F3);
        assert_eq!(psr.to_string(), "-ZC-IFT svc");
    }
}
