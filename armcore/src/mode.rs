//! The ARM7TDMI supports seven modes of operation.
//! This file describes these modes.

use std::fmt::Display;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde_repr::Serialize_repr;

/// A processor mode, represented by its five-bit encoding in the mode field of a PSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize_repr)]
#[repr(u8)]
pub enum Mode {
    /// The normal ARM program execution state.
    Usr = 0b10000,
    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,
    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,
    /// Protected mode for the operating system.
    Supervisor = 0b10011,
    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,
    /// Entered when an undefined instruction is executed.
    Undefined = 0b11011,
    /// A privileged user mode for the operating system.
    System = 0b11111,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Usr,
        Mode::Fiq,
        Mode::Irq,
        Mode::Supervisor,
        Mode::Abort,
        Mode::Undefined,
        Mode::System,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// User and system mode share a register bank and have no SPSR.
    pub fn has_spsr(self) -> bool {
        !matches!(self, Mode::Usr | Mode::System)
    }

    pub fn is_privileged(self) -> bool {
        self != Mode::Usr
    }
}

impl TryFrom<u32> for Mode {
    type Error = InvalidMode;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Mode::from_u32(bits & 0b11111).ok_or(InvalidMode(bits & 0b11111))
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Usr => write!(f, "usr"),
            Mode::Fiq => write!(f, "fiq"),
            Mode::Irq => write!(f, "irq"),
            Mode::Supervisor => write!(f, "svc"),
            Mode::Abort => write!(f, "abt"),
            Mode::Undefined => write!(f, "und"),
            Mode::System => write!(f, "sys"),
        }
    }
}

/// The five mode bits of a PSR did not name any processor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMode(pub u32);

impl Display for InvalidMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid processor mode bits {:#07b}", self.0)
    }
}

impl std::error::Error for InvalidMode {}
