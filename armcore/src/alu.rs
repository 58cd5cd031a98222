//! The sixteen data-processing operations and their effect on the flags.

use num_derive::FromPrimitive;

use crate::psr::Flags;

/// The possible data operations to use in a data-processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
#[repr(u8)]
pub enum DataOp {
    /// Returns op1 bitwise AND op2.
    And,
    /// Returns op1 bitwise XOR op2.
    Eor,
    /// Returns op1 - op2.
    Sub,
    /// Returns op2 - op1.
    Rsb,
    /// Returns op1 + op2.
    Add,
    /// Returns op1 + op2 + carry.
    Adc,
    /// Returns op1 - op2 + carry - 1.
    Sbc,
    /// Returns op2 - op1 + carry - 1.
    Rsc,
    /// As `And`, but result is not written.
    Tst,
    /// As `Eor`, but result is not written.
    Teq,
    /// As `Sub`, but result is not written.
    Cmp,
    /// As `Add`, but result is not written.
    Cmn,
    /// Returns op1 bitwise OR op2.
    Orr,
    /// Returns op2; op1 is ignored.
    Mov,
    /// Returns op1 bitwise AND NOT op2 (bit clear).
    Bic,
    /// Returns bitwise NOT op2; op1 is ignored.
    Mvn,
}

impl DataOp {
    /// Test and compare operations only set flags.
    pub fn writes_result(self) -> bool {
        !matches!(self, DataOp::Tst | DataOp::Teq | DataOp::Cmp | DataOp::Cmn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput {
    pub result: u32,
    /// The flags the operation would commit if the S bit is set.
    pub flags: Flags,
    pub writes_result: bool,
}

/// Execute exactly one data-processing operation.
///
/// `flags` are the current CPSR flags: C feeds the carry-using operations and
/// V passes through the logical ones. `shifter_carry` becomes C for logical
/// operations.
pub fn apply(op: DataOp, op1: u32, op2: u32, flags: Flags, shifter_carry: bool) -> AluOutput {
    let (result, carry, overflow) = match op {
        DataOp::And | DataOp::Tst => (op1 & op2, shifter_carry, flags.overflow),
        DataOp::Eor | DataOp::Teq => (op1 ^ op2, shifter_carry, flags.overflow),
        DataOp::Orr => (op1 | op2, shifter_carry, flags.overflow),
        DataOp::Mov => (op2, shifter_carry, flags.overflow),
        DataOp::Bic => (op1 & !op2, shifter_carry, flags.overflow),
        DataOp::Mvn => (!op2, shifter_carry, flags.overflow),
        DataOp::Sub | DataOp::Cmp => add_with_carry(op1, !op2, true),
        DataOp::Rsb => add_with_carry(op2, !op1, true),
        DataOp::Add | DataOp::Cmn => add_with_carry(op1, op2, false),
        DataOp::Adc => add_with_carry(op1, op2, flags.carry),
        DataOp::Sbc => add_with_carry(op1, !op2, flags.carry),
        DataOp::Rsc => add_with_carry(op2, !op1, flags.carry),
    };
    AluOutput {
        result,
        flags: Flags {
            negative: result & (1 << 31) != 0,
            zero: result == 0,
            carry,
            overflow,
        },
        writes_result: op.writes_result(),
    }
}

/// Returns the 32-bit sum, the unsigned carry out and the signed overflow.
/// Subtraction is expressed as `a + !b + 1`, so the carry is NOT borrow.
fn add_with_carry(a: u32, b: u32, carry: bool) -> (u32, bool, bool) {
    let wide = u64::from(a) + u64::from(b) + u64::from(carry);
    let result = wide as u32;
    // Overflow when both inputs agree in sign and the result does not.
    let overflow = (!(a ^ b) & (a ^ result)) & (1 << 31) != 0;
    (result, wide > u64::from(u32::MAX), overflow)
}
