//! Decoding of 32-bit ARM instruction words.
//!
//! Classification is a single ordered table of `(mask, pattern, class)`
//! entries. The first entry with `word & mask == pattern` wins, so the more
//! specific encodings come first: branch-exchange, multiplies, swaps and
//! halfword transfers all live inside the data-processing space, and the PSR
//! transfers reuse the compare opcodes with the S bit clear.

use num_traits::FromPrimitive;

use crate::{
    alu::DataOp,
    condition::Cond,
    instr::{
        DataOperand, Instr, MsrSource, PsrSelect, Register, Shift, ShiftAmount, TransferKind,
        TransferOperand, TransferSize,
    },
    psr::PsrFields,
    shifter::ShiftType,
};

/// One row of a decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeEntry<C> {
    pub mask: u32,
    pub pattern: u32,
    pub class: C,
}

impl<C: Copy> DecodeEntry<C> {
    pub const fn new(mask: u32, pattern: u32, class: C) -> Self {
        Self {
            mask,
            pattern,
            class,
        }
    }

    pub fn matches(&self, word: u32) -> bool {
        word & self.mask == self.pattern
    }
}

/// Find the class of the first matching entry of `table`.
pub fn classify<C: Copy>(table: &[DecodeEntry<C>], word: u32) -> Option<C> {
    table
        .iter()
        .find(|entry| entry.matches(word))
        .map(|entry| entry.class)
}

/// The instruction groups of the ARM instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrClass {
    BranchExchange,
    Multiply,
    MultiplyLong,
    Swap,
    HalfWordRegister,
    HalfWordImmediate,
    Mrs,
    MsrRegister,
    MsrImmediate,
    DataProcessing,
    SingleTransfer,
    BlockTransfer,
    Branch,
    SoftwareInterrupt,
    Coprocessor,
    Undefined,
}

/// The ARM decode table, most specific encodings first.
/// The condition field (bits 31..28) is never part of a mask.
pub const ARM_DECODE_TABLE: [DecodeEntry<InstrClass>; 19] = [
    DecodeEntry::new(0x0FFF_FFF0, 0x012F_FF10, InstrClass::BranchExchange),
    DecodeEntry::new(0x0FC0_00F0, 0x0000_0090, InstrClass::Multiply),
    DecodeEntry::new(0x0F80_00F0, 0x0080_0090, InstrClass::MultiplyLong),
    DecodeEntry::new(0x0FB0_0FF0, 0x0100_0090, InstrClass::Swap),
    // Any other use of the 1001 multiply marker.
    DecodeEntry::new(0x0E00_00F0, 0x0000_0090, InstrClass::Undefined),
    DecodeEntry::new(0x0E40_0F90, 0x0000_0090, InstrClass::HalfWordRegister),
    DecodeEntry::new(0x0E40_0090, 0x0040_0090, InstrClass::HalfWordImmediate),
    DecodeEntry::new(0x0E00_0090, 0x0000_0090, InstrClass::Undefined),
    DecodeEntry::new(0x0FBF_0FFF, 0x010F_0000, InstrClass::Mrs),
    DecodeEntry::new(0x0FB0_FFF0, 0x0120_F000, InstrClass::MsrRegister),
    DecodeEntry::new(0x0FB0_F000, 0x0320_F000, InstrClass::MsrImmediate),
    // TST, TEQ, CMP and CMN without the S bit.
    DecodeEntry::new(0x0D90_0000, 0x0100_0000, InstrClass::Undefined),
    DecodeEntry::new(0x0C00_0000, 0x0000_0000, InstrClass::DataProcessing),
    // A register offset with a register-specified shift.
    DecodeEntry::new(0x0E00_0010, 0x0600_0010, InstrClass::Undefined),
    DecodeEntry::new(0x0C00_0000, 0x0400_0000, InstrClass::SingleTransfer),
    DecodeEntry::new(0x0E00_0000, 0x0800_0000, InstrClass::BlockTransfer),
    DecodeEntry::new(0x0E00_0000, 0x0A00_0000, InstrClass::Branch),
    DecodeEntry::new(0x0F00_0000, 0x0F00_0000, InstrClass::SoftwareInterrupt),
    DecodeEntry::new(0x0C00_0000, 0x0C00_0000, InstrClass::Coprocessor),
];

impl InstrClass {
    pub fn classify(word: u32) -> InstrClass {
        classify(&ARM_DECODE_TABLE, word).unwrap_or(InstrClass::Undefined)
    }
}

impl Instr {
    /// Decode the given 32-bit value as an instruction.
    /// Every word decodes; unallocated encodings become [`Instr::Undefined`].
    pub fn decode(word: u32) -> (Cond, Instr) {
        let cond = Cond::from_u4(word, 28);
        let instr = match InstrClass::classify(word) {
            InstrClass::BranchExchange => Instr::BranchExchange {
                operand: Register::from_u4(word, 0),
            },
            InstrClass::Multiply => Instr::Multiply {
                set_condition_codes: bit(word, 20),
                dest: Register::from_u4(word, 16),
                op1: Register::from_u4(word, 0),
                op2: Register::from_u4(word, 8),
                addend: bit(word, 21).then(|| Register::from_u4(word, 12)),
            },
            InstrClass::MultiplyLong => Instr::MultiplyLong {
                set_condition_codes: bit(word, 20),
                signed: bit(word, 22),
                accumulate: bit(word, 21),
                dest_hi: Register::from_u4(word, 16),
                dest_lo: Register::from_u4(word, 12),
                op1: Register::from_u4(word, 0),
                op2: Register::from_u4(word, 8),
            },
            InstrClass::Swap => Instr::Swap {
                byte: bit(word, 22),
                dest: Register::from_u4(word, 12),
                source: Register::from_u4(word, 0),
                base: Register::from_u4(word, 16),
            },
            InstrClass::HalfWordRegister => Instr::decode_half_word(
                word,
                TransferOperand::Register(Register::from_u4(word, 0), Shift::NONE),
            ),
            InstrClass::HalfWordImmediate => Instr::decode_half_word(
                word,
                TransferOperand::Immediate((word >> 4) & 0xF0 | word & 0xF),
            ),
            InstrClass::Mrs => Instr::Mrs {
                psr: psr_select(word),
                target: Register::from_u4(word, 12),
            },
            InstrClass::MsrRegister => Instr::Msr {
                psr: psr_select(word),
                fields: PsrFields::from_u4(word >> 16),
                source: MsrSource::Register(Register::from_u4(word, 0)),
            },
            InstrClass::MsrImmediate => Instr::Msr {
                psr: psr_select(word),
                fields: PsrFields::from_u4(word >> 16),
                source: MsrSource::Immediate {
                    value: word & 0xFF,
                    rotate: ((word >> 8) & 0xF) as u8,
                },
            },
            InstrClass::DataProcessing => Instr::Data {
                set_condition_codes: bit(word, 20),
                op: DataOp::from_u32((word >> 21) & 0xF).unwrap(),
                dest: Register::from_u4(word, 12),
                op1: Register::from_u4(word, 16),
                op2: if bit(word, 25) {
                    DataOperand::Immediate {
                        value: word & 0xFF,
                        rotate: ((word >> 8) & 0xF) as u8,
                    }
                } else {
                    let (register, shift) = decode_shifted_register(word);
                    DataOperand::Register(register, shift)
                },
            },
            InstrClass::SingleTransfer => Instr::SingleTransfer {
                kind: transfer_kind(word),
                size: if bit(word, 22) {
                    TransferSize::Byte
                } else {
                    TransferSize::Word
                },
                write_back: bit(word, 21),
                offset_positive: bit(word, 23),
                pre_index: bit(word, 24),
                data_register: Register::from_u4(word, 12),
                base_register: Register::from_u4(word, 16),
                offset: if bit(word, 25) {
                    let (register, shift) = decode_shifted_register(word);
                    TransferOperand::Register(register, shift)
                } else {
                    TransferOperand::Immediate(word & 0xFFF)
                },
            },
            InstrClass::BlockTransfer => Instr::BlockTransfer {
                kind: transfer_kind(word),
                write_back: bit(word, 21),
                offset_positive: bit(word, 23),
                pre_index: bit(word, 24),
                psr: bit(word, 22),
                base_register: Register::from_u4(word, 16),
                registers: word as u16,
            },
            InstrClass::Branch => Instr::Branch {
                link: bit(word, 24),
                // Sign-extend the 24-bit word offset and scale it to bytes.
                offset: ((word << 8) as i32) >> 6,
            },
            InstrClass::SoftwareInterrupt => Instr::SoftwareInterrupt {
                comment: word & 0x00FF_FFFF,
            },
            InstrClass::Coprocessor | InstrClass::Undefined => Instr::Undefined,
        };
        (cond, instr)
    }

    /// Halfword and signed transfers. SH = 00 was claimed by the multiply
    /// and swap rows; stores only exist for unsigned halfwords.
    fn decode_half_word(word: u32, offset: TransferOperand) -> Instr {
        let kind = transfer_kind(word);
        let size = match (word >> 5) & 0b11 {
            0b01 => TransferSize::HalfWord,
            0b10 => TransferSize::SignExtendedByte,
            _ => TransferSize::SignExtendedHalfWord,
        };
        if kind == TransferKind::Store && size != TransferSize::HalfWord {
            return Instr::Undefined;
        }
        Instr::SingleTransfer {
            kind,
            size,
            write_back: bit(word, 21),
            offset_positive: bit(word, 23),
            pre_index: bit(word, 24),
            data_register: Register::from_u4(word, 12),
            base_register: Register::from_u4(word, 16),
            offset,
        }
    }
}

/// Decode the shift register data in bits 11..0.
fn decode_shifted_register(word: u32) -> (Register, Shift) {
    let shift_type = ShiftType::from_u32((word >> 5) & 0b11).unwrap();
    let shift_amount = if bit(word, 4) {
        // Shift by a register. Bit 7 is unset.
        ShiftAmount::Register(Register::from_u4(word, 8))
    } else {
        ShiftAmount::Immediate(((word >> 7) & 0b11111) as u8)
    };
    (
        Register::from_u4(word, 0),
        Shift {
            shift_type,
            shift_amount,
        },
    )
}

fn transfer_kind(word: u32) -> TransferKind {
    if bit(word, 20) {
        TransferKind::Load
    } else {
        TransferKind::Store
    }
}

fn psr_select(word: u32) -> PsrSelect {
    if bit(word, 22) {
        PsrSelect::Spsr
    } else {
        PsrSelect::Cpsr
    }
}

fn bit(word: u32, n: u32) -> bool {
    word & (1 << n) != 0
}
