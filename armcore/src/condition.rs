//! Condition codes gating instruction execution.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde_repr::Serialize_repr;

use crate::psr::Flags;

/// A condition to execute an instruction on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, Serialize_repr,
)]
#[repr(u8)]
pub enum Cond {
    /// Z set (equal)
    EQ,
    /// Z clear (not equal)
    NE,
    /// C set (unsigned higher or same)
    CS,
    /// C clear (unsigned lower)
    CC,
    /// N set (negative)
    MI,
    /// N clear (positive or zero)
    PL,
    /// V set (overflow)
    VS,
    /// V clear (no overflow)
    VC,
    /// C set and Z clear (unsigned higher)
    HI,
    /// C clear or Z set (unsigned lower or same)
    LS,
    /// N equals V (greater or equal)
    GE,
    /// N not equal to V (less than)
    LT,
    /// Z clear AND (N equals V) (greater than)
    GT,
    /// Z set OR (N not equal to V) (less than or equal)
    LE,
    /// (ignored) (always)
    AL,
    /// Reserved from ARMv3 onwards; never executes.
    NV,
}

impl Cond {
    pub fn from_u4(value: u32, offset: usize) -> Cond {
        Cond::from_u32((value >> offset) & 0xF).unwrap()
    }

    /// Returns true if an instruction with this condition executes under `flags`.
    pub fn holds(self, flags: Flags) -> bool {
        let Flags {
            negative: n,
            zero: z,
            carry: c,
            overflow: v,
        } = flags;
        match self {
            Cond::EQ => z,
            Cond::NE => !z,
            Cond::CS => c,
            Cond::CC => !c,
            Cond::MI => n,
            Cond::PL => !n,
            Cond::VS => v,
            Cond::VC => !v,
            Cond::HI => c && !z,
            Cond::LS => !c || z,
            Cond::GE => n == v,
            Cond::LT => n != v,
            Cond::GT => !z && n == v,
            Cond::LE => z || n != v,
            Cond::AL => true,
            Cond::NV => false,
        }
    }
}
