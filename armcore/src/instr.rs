//! Defines the ARM instruction set.
//!
//! Both ARM and Thumb encodings decode into [`Instr`]; a Thumb instruction
//! becomes the ARM instruction with the same effect.

use std::fmt::Display;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde_repr::Serialize_repr;

use crate::{alu::DataOp, psr::PsrFields, shifter::ShiftType};

pub mod decode;
pub mod thumb;

/// Enumerates the registers that can be directly referenced in code.
/// In reality there are a total of 37 registers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, Serialize_repr,
)]
#[repr(u8)]
pub enum Register {
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
    /// Also used for the stack pointer `SP`.
    R13,
    /// Also used for the link register `LR`.
    R14,
    /// Also used for the program counter `PC`.
    R15,
}

impl Register {
    pub const ALL: [Register; 16] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    /// Read the four-bit register field starting at bit `offset`.
    pub fn from_u4(value: u32, offset: usize) -> Register {
        Register::from_u32((value >> offset) & 0xF).unwrap()
    }

    /// Read a three-bit Thumb register field, which can only name R0..R7.
    pub fn from_u3(value: u32, offset: usize) -> Register {
        Register::from_u32((value >> offset) & 0b111).unwrap()
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Register::R13 => write!(f, "SP"),
            Register::R14 => write!(f, "LR"),
            Register::R15 => write!(f, "PC"),
            _ => write!(f, "R{}", *self as u8),
        }
    }
}

/// The list of instructions implemented in hardware in ARM7TDMI.
/// - This does not include conditions.
/// - Coprocessor operations decode as `Undefined`, since the
///   console has no coprocessors attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Branch and Exchange (BX).
    ///
    /// Copies the contents of a register into the program counter.
    /// Bit 0 of the register selects Thumb state.
    ///
    /// *Timing:* 2S + 1N cycles.
    BranchExchange { operand: Register },
    /// Branch (B), and Branch with Link (BL).
    ///
    /// Sets the program counter to the given byte offset from the PC, which
    /// is already two instructions ahead when this instruction executes.
    ///
    /// If the link flag is set, this also writes the address of the
    /// immediately following instruction into the link register `LR`.
    ///
    /// *Timing:* 2S + 1N cycles.
    Branch { link: bool, offset: i32 },
    /// General data-processing instructions
    /// (AND, EOR, SUB, RSB, ADD, ADC, SBC, RSC, TST, TEQ, CMP, CMN, ORR, MOV, BIC, MVN).
    ///
    /// *Timing:*
    /// - normal: 1S
    /// - register-specified shift in op2: 1S + 1I
    /// - PC written: 2S + 1N
    /// - register-specified shift and PC written: 2S + 1N + 1I
    Data {
        /// Whether the condition codes should be set after executing this instruction.
        set_condition_codes: bool,
        op: DataOp,
        dest: Register,
        op1: Register,
        /// The second operand can either be a constant or a register,
        /// possibly bit-shifted left or right in some way.
        op2: DataOperand,
    },
    /// Move to Register from State (MRS).
    Mrs { psr: PsrSelect, target: Register },
    /// Move to State from Register (MSR).
    Msr {
        psr: PsrSelect,
        /// Which bytes of the PSR are written.
        fields: PsrFields,
        source: MsrSource,
    },
    /// Multiply (MUL) and Multiply-Accumulate (MLA).
    Multiply {
        /// Whether the condition codes should be set after executing this instruction.
        set_condition_codes: bool,
        dest: Register,
        op1: Register,
        /// The multiplier, which controls the cycle count.
        op2: Register,
        /// If this is set, this is a Multiply-Accumulate (MLA) instruction,
        /// and the contents of this register are added to the product of
        /// op1 with op2.
        addend: Option<Register>,
    },
    /// Multiply Long (MULL) and Multiply-Accumulate Long (MLAL).
    MultiplyLong {
        /// Whether the condition codes should be set after executing this instruction.
        set_condition_codes: bool,
        /// Whether to treat all operands as signed 32-bit values and
        /// the result as a signed 64-bit value; otherwise we treat the operands
        /// as unsigned 32-bit values and the result as an unsigned 64-bit value.
        signed: bool,
        /// If this is true, we additionally treat the destination as a 64-bit
        /// operand to be added to the result.
        accumulate: bool,
        /// The high (most significant) 32 bits of the result.
        dest_hi: Register,
        /// The low (least significant) 32 bits of the result.
        dest_lo: Register,
        op1: Register,
        op2: Register,
    },
    /// Single Data Transfer (LDR, STR, LDRB, STRB, LDRH, STRH, LDRSB, LDRSH).
    SingleTransfer {
        kind: TransferKind,
        /// Sign-extended transfers are only valid in loads.
        size: TransferSize,
        /// If this is true, the computed address is
        /// written back into the base register.
        write_back: bool,
        /// If this is true, the offset is considered to be positive.
        /// Otherwise, it is considered to be negative.
        offset_positive: bool,
        /// If this is true, the offset is added before the transfer.
        pre_index: bool,
        /// The register to read from or write to (depending on the transfer kind).
        data_register: Register,
        /// The base register to use for computing the memory location to use.
        base_register: Register,
        offset: TransferOperand,
    },
    /// Block Data Transfer (LDM, STM).
    BlockTransfer {
        kind: TransferKind,
        /// If this is true, the computed address is
        /// written back into the base register.
        write_back: bool,
        /// If this is true, the offset is considered to be positive.
        /// Otherwise, it is considered to be negative.
        offset_positive: bool,
        /// If this is true, the offset is added before the transfer.
        pre_index: bool,
        /// If this is true, load the PSR or force user mode.
        psr: bool,
        /// The base register to use for computing the memory location to use.
        base_register: Register,
        /// A bit field corresponding to the set of registers to use.
        registers: u16,
    },
    /// Single Data Swap (SWP).
    Swap {
        /// If this is true, only swap a byte; otherwise, swap a word.
        byte: bool,
        dest: Register,
        source: Register,
        base: Register,
    },
    /// Software Interrupt (SWI).
    SoftwareInterrupt {
        /// The payload to pass to the software interrupt handler.
        comment: u32,
    },
    /// The second half of a Thumb long branch with link.
    /// The first half has already placed the upper part of the target in LR.
    LongBranchLink { offset: u32 },
    /// Takes the undefined instruction trap.
    Undefined,
}

/// The second operand used in a data-processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOperand {
    /// An 8-bit constant rotated right by twice `rotate`.
    /// Thumb translations use wider constants with a zero rotation.
    Immediate { value: u32, rotate: u8 },
    /// The second operand is contained in a register,
    /// possibly shifted in some way.
    Register(Register, Shift),
}

impl DataOperand {
    pub fn is_register_specified_shift(&self) -> bool {
        matches!(
            self,
            DataOperand::Register(
                _,
                Shift {
                    shift_amount: ShiftAmount::Register(_),
                    ..
                }
            )
        )
    }

    /// A register passed through unchanged.
    pub fn plain(register: Register) -> Self {
        DataOperand::Register(register, Shift::NONE)
    }

    pub fn constant(value: u32) -> Self {
        DataOperand::Immediate { value, rotate: 0 }
    }
}

/// The offset of a single data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOperand {
    Immediate(u32),
    /// Only immediate shift amounts can be encoded here.
    Register(Register, Shift),
}

/// The possible ways to shift the second operand
/// of a data-processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub shift_type: ShiftType,
    pub shift_amount: ShiftAmount,
}

impl Shift {
    pub const NONE: Shift = Shift {
        shift_type: ShiftType::LogicalLeft,
        shift_amount: ShiftAmount::Immediate(0),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAmount {
    /// Shift by the given 5-bit unsigned integer, exactly as encoded.
    /// The barrel shifter reinterprets a zero amount per shift type.
    Immediate(u8),
    /// Shift by the amount specified in the bottom byte of the given register.
    Register(Register),
}

/// Which status register a PSR transfer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsrSelect {
    Cpsr,
    /// The SPSR of the current mode.
    Spsr,
}

/// The source to transfer into a PSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrSource {
    Register(Register),
    /// An 8-bit constant rotated right by twice `rotate`.
    Immediate { value: u32, rotate: u8 },
}

/// Whether a data transfer is a store (0) or a load (1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferKind {
    Store,
    Load,
}

/// How much data is to be transferred by a transfer instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSize {
    Byte,
    Word,
    HalfWord,
    SignExtendedByte,
    SignExtendedHalfWord,
}
