//! The barrel shifter, which conditions the second operand of data-processing
//! instructions and register offsets of data transfers.
//!
//! Every function returns the shifted value together with the shifter carry
//! out. When no shift takes place the carry out is the incoming carry flag.

use num_derive::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum ShiftType {
    /// Arithmetic left is the same as logical left.
    LogicalLeft,
    LogicalRight,
    ArithmeticRight,
    /// Rotating right by a constant amount 0 is the notation used to encode the
    /// "rotate right extended" procedure, rotating right by one bit position of
    /// the 33-bit quantity obtained by prepending the carry flag of the CPSR
    /// to the register to be shifted.
    RotateRight,
}

/// Shift by an amount read from a register.
/// Only the bottom byte of the register is used, and an amount of zero leaves
/// both the value and the carry untouched.
pub fn shift(value: u32, shift_type: ShiftType, amount: u32, carry_in: bool) -> (u32, bool) {
    let amount = amount & 0xFF;
    if amount == 0 {
        return (value, carry_in);
    }
    match (shift_type, amount) {
        (ShiftType::LogicalLeft, 1..32) => (value << amount, bit(value, 32 - amount)),
        (ShiftType::LogicalLeft, 32) => (0, bit(value, 0)),
        (ShiftType::LogicalLeft, _) => (0, false),
        (ShiftType::LogicalRight, 1..32) => (value >> amount, bit(value, amount - 1)),
        (ShiftType::LogicalRight, 32) => (0, bit(value, 31)),
        (ShiftType::LogicalRight, _) => (0, false),
        (ShiftType::ArithmeticRight, 1..32) => {
            (((value as i32) >> amount) as u32, bit(value, amount - 1))
        }
        (ShiftType::ArithmeticRight, _) => (((value as i32) >> 31) as u32, bit(value, 31)),
        (ShiftType::RotateRight, n) => match n % 32 {
            0 => (value, bit(value, 31)),
            n => (value.rotate_right(n), bit(value, n - 1)),
        },
    }
}

/// Shift by a five-bit constant taken from the instruction.
/// An amount of zero is reinterpreted per shift type: `LSL #0` is the
/// identity, `LSR #0` and `ASR #0` mean a shift by 32, and `ROR #0` means RRX.
pub fn shift_immediate(value: u32, shift_type: ShiftType, amount: u8, carry_in: bool) -> (u32, bool) {
    let amount = u32::from(amount & 0b11111);
    match (shift_type, amount) {
        (ShiftType::LogicalLeft, 0) => (value, carry_in),
        (ShiftType::LogicalRight | ShiftType::ArithmeticRight, 0) => {
            shift(value, shift_type, 32, carry_in)
        }
        (ShiftType::RotateRight, 0) => rotate_right_extended(value, carry_in),
        _ => shift(value, shift_type, amount, carry_in),
    }
}

/// A 33-bit rotate through the carry flag.
pub fn rotate_right_extended(value: u32, carry_in: bool) -> (u32, bool) {
    ((value >> 1) | (u32::from(carry_in) << 31), bit(value, 0))
}

/// The immediate operand form: `value` rotated right by twice `rotate`.
/// A zero rotation leaves the carry untouched; otherwise the carry out is
/// the top bit of the result.
pub fn rotated_immediate(value: u32, rotate: u8, carry_in: bool) -> (u32, bool) {
    if rotate == 0 {
        (value, carry_in)
    } else {
        let result = value.rotate_right(u32::from(rotate & 0xF) * 2);
        (result, bit(result, 31))
    }
}

fn bit(value: u32, n: u32) -> bool {
    value & (1 << n) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_left() {
        assert_eq!(shift_immediate(0x8000_0001, ShiftType::LogicalLeft, 0, true), (0x8000_0001, true));
        assert_eq!(shift_immediate(0x8000_0001, ShiftType::LogicalLeft, 0, false), (0x8000_0001, false));
        assert_eq!(shift_immediate(0x8000_0001, ShiftType::LogicalLeft, 1, false), (0x0000_0002, true));
        assert_eq!(shift_immediate(0x4000_0000, ShiftType::LogicalLeft, 2, false), (0, true));
        assert_eq!(shift(0x0000_0001, ShiftType::LogicalLeft, 32, false), (0, true));
        assert_eq!(shift(0xFFFF_FFFF, ShiftType::LogicalLeft, 33, true), (0, false));
    }

    #[test]
    fn logical_right_zero_means_thirty_two() {
        assert_eq!(shift_immediate(0x8000_0000, ShiftType::LogicalRight, 0, false), (0, true));
        assert_eq!(shift_immediate(0x7FFF_FFFF, ShiftType::LogicalRight, 0, true), (0, false));
        assert_eq!(shift_immediate(0x0000_0003, ShiftType::LogicalRight, 1, false), (1, true));
        assert_eq!(shift(0x8000_0000, ShiftType::LogicalRight, 32, false), (0, true));
        assert_eq!(shift(0x8000_0000, ShiftType::LogicalRight, 40, true), (0, false));
    }

    #[test]
    fn arithmetic_right_zero_means_thirty_two() {
        assert_eq!(
            shift_immediate(0x8000_0000, ShiftType::ArithmeticRight, 0, false),
            (0xFFFF_FFFF, true)
        );
        assert_eq!(shift_immediate(0x7FFF_FFFF, ShiftType::ArithmeticRight, 0, true), (0, false));
        assert_eq!(
            shift_immediate(0x8000_0010, ShiftType::ArithmeticRight, 4, false),
            (0xF800_0001, false)
        );
        assert_eq!(shift(0x8000_0000, ShiftType::ArithmeticRight, 200, false), (0xFFFF_FFFF, true));
    }

    #[test]
    fn rotate_right_zero_means_rrx() {
        assert_eq!(
            shift_immediate(0x0000_0003, ShiftType::RotateRight, 0, true),
            (0x8000_0001, true)
        );
        assert_eq!(shift_immediate(0x0000_0002, ShiftType::RotateRight, 0, false), (1, false));
        assert_eq!(
            shift_immediate(0x0000_00F1, ShiftType::RotateRight, 4, false),
            (0x1000_000F, false)
        );
    }

    #[test]
    fn register_rotations_reduce_modulo_thirty_two() {
        assert_eq!(shift(0x8000_0001, ShiftType::RotateRight, 32, false), (0x8000_0001, true));
        assert_eq!(shift(0x8000_0001, ShiftType::RotateRight, 64, false), (0x8000_0001, true));
        assert_eq!(shift(0x0000_0001, ShiftType::RotateRight, 33, false), (0x8000_0000, true));
        assert_eq!(shift(0x0000_0002, ShiftType::RotateRight, 36, false), (0x2000_0000, false));
    }

    #[test]
    fn register_amount_zero_is_a_no_op() {
        for shift_type in [
            ShiftType::LogicalLeft,
            ShiftType::LogicalRight,
            ShiftType::ArithmeticRight,
            ShiftType::RotateRight,
        ] {
            assert_eq!(shift(0x8000_0001, shift_type, 0, true), (0x8000_0001, true));
            // Only the bottom byte counts, so 256 is also zero.
            assert_eq!(shift(0x8000_0001, shift_type, 256, false), (0x8000_0001, false));
        }
    }

    #[test]
    fn immediate_operand() {
        assert_eq!(rotated_immediate(0xFF, 4, false), (0xFF00_0000, true));
        assert_eq!(rotated_immediate(0xFF, 0, true), (0xFF, true));
        assert_eq!(rotated_immediate(0x01, 1, false), (0x4000_0000, false));
        assert_eq!(rotated_immediate(0x02, 1, false), (0x8000_0000, true));
    }
}
