//! Decoding of 16-bit Thumb instructions.
//!
//! Each Thumb format is translated into the ARM instruction that has the
//! same effect, so the processor only executes one instruction set.

use num_traits::FromPrimitive;

use crate::{
    alu::DataOp,
    condition::Cond,
    instr::{
        DataOperand, Instr, Register, Shift, ShiftAmount, TransferKind, TransferOperand,
        TransferSize,
        decode::{DecodeEntry, classify},
    },
    shifter::ShiftType,
};

/// The Thumb instruction formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbClass {
    MoveShifted,
    AddSubtract,
    Immediate,
    Alu,
    HiRegister,
    PcRelativeLoad,
    LoadStoreRegister,
    LoadStoreSignExtended,
    LoadStoreImmediate,
    LoadStoreHalfWord,
    SpRelative,
    LoadAddress,
    AddSp,
    PushPop,
    Multiple,
    SoftwareInterrupt,
    Undefined,
    ConditionalBranch,
    Branch,
    LongBranch,
}

/// The Thumb decode table, most specific encodings first.
pub const THUMB_DECODE_TABLE: [DecodeEntry<ThumbClass>; 20] = [
    DecodeEntry::new(0xF800, 0x1800, ThumbClass::AddSubtract),
    DecodeEntry::new(0xE000, 0x0000, ThumbClass::MoveShifted),
    DecodeEntry::new(0xE000, 0x2000, ThumbClass::Immediate),
    DecodeEntry::new(0xFC00, 0x4000, ThumbClass::Alu),
    DecodeEntry::new(0xFC00, 0x4400, ThumbClass::HiRegister),
    DecodeEntry::new(0xF800, 0x4800, ThumbClass::PcRelativeLoad),
    DecodeEntry::new(0xF200, 0x5000, ThumbClass::LoadStoreRegister),
    DecodeEntry::new(0xF200, 0x5200, ThumbClass::LoadStoreSignExtended),
    DecodeEntry::new(0xE000, 0x6000, ThumbClass::LoadStoreImmediate),
    DecodeEntry::new(0xF000, 0x8000, ThumbClass::LoadStoreHalfWord),
    DecodeEntry::new(0xF000, 0x9000, ThumbClass::SpRelative),
    DecodeEntry::new(0xF000, 0xA000, ThumbClass::LoadAddress),
    DecodeEntry::new(0xFF00, 0xB000, ThumbClass::AddSp),
    DecodeEntry::new(0xF600, 0xB400, ThumbClass::PushPop),
    DecodeEntry::new(0xF000, 0xC000, ThumbClass::Multiple),
    DecodeEntry::new(0xFF00, 0xDF00, ThumbClass::SoftwareInterrupt),
    // Conditional branch with the AL condition.
    DecodeEntry::new(0xFF00, 0xDE00, ThumbClass::Undefined),
    DecodeEntry::new(0xF000, 0xD000, ThumbClass::ConditionalBranch),
    DecodeEntry::new(0xF800, 0xE000, ThumbClass::Branch),
    DecodeEntry::new(0xF000, 0xF000, ThumbClass::LongBranch),
];

impl ThumbClass {
    pub fn classify(halfword: u16) -> ThumbClass {
        classify(&THUMB_DECODE_TABLE, u32::from(halfword)).unwrap_or(ThumbClass::Undefined)
    }
}

impl Instr {
    /// Decode a Thumb instruction fetched from `address`.
    /// The address is needed because PC-relative addressing uses a
    /// word-aligned PC.
    pub fn decode_thumb(halfword: u16, address: u32) -> (Cond, Instr) {
        let word = u32::from(halfword);
        let instr = match ThumbClass::classify(halfword) {
            ThumbClass::MoveShifted => {
                let shift_type = ShiftType::from_u32((word >> 11) & 0b11).unwrap();
                data(
                    true,
                    DataOp::Mov,
                    Register::from_u3(word, 0),
                    Register::R0,
                    DataOperand::Register(
                        Register::from_u3(word, 3),
                        Shift {
                            shift_type,
                            shift_amount: ShiftAmount::Immediate(((word >> 6) & 0b11111) as u8),
                        },
                    ),
                )
            }
            ThumbClass::AddSubtract => {
                let op2 = if bit(word, 10) {
                    DataOperand::constant((word >> 6) & 0b111)
                } else {
                    DataOperand::plain(Register::from_u3(word, 6))
                };
                let op = if bit(word, 9) { DataOp::Sub } else { DataOp::Add };
                data(true, op, Register::from_u3(word, 0), Register::from_u3(word, 3), op2)
            }
            ThumbClass::Immediate => {
                let op = match (word >> 11) & 0b11 {
                    0 => DataOp::Mov,
                    1 => DataOp::Cmp,
                    2 => DataOp::Add,
                    _ => DataOp::Sub,
                };
                let rd = Register::from_u3(word, 8);
                data(true, op, rd, rd, DataOperand::constant(word & 0xFF))
            }
            ThumbClass::Alu => translate_alu(word),
            ThumbClass::HiRegister => {
                let rd = Register::from_u4(word & 0b111 | (word >> 4) & 0b1000, 0);
                let rs = Register::from_u4(word, 3);
                match (word >> 8) & 0b11 {
                    0 => data(false, DataOp::Add, rd, rd, DataOperand::plain(rs)),
                    1 => data(true, DataOp::Cmp, Register::R0, rd, DataOperand::plain(rs)),
                    2 => data(false, DataOp::Mov, rd, Register::R0, DataOperand::plain(rs)),
                    _ => Instr::BranchExchange { operand: rs },
                }
            }
            ThumbClass::PcRelativeLoad => {
                let (offset_positive, offset) = pc_relative((word & 0xFF) << 2, address);
                Instr::SingleTransfer {
                    kind: TransferKind::Load,
                    size: TransferSize::Word,
                    write_back: false,
                    offset_positive,
                    pre_index: true,
                    data_register: Register::from_u3(word, 8),
                    base_register: Register::R15,
                    offset: TransferOperand::Immediate(offset),
                }
            }
            ThumbClass::LoadStoreRegister => {
                let kind = transfer_kind(word, 11);
                let size = if bit(word, 10) {
                    TransferSize::Byte
                } else {
                    TransferSize::Word
                };
                register_offset(word, kind, size)
            }
            ThumbClass::LoadStoreSignExtended => {
                let (kind, size) = match (word >> 10) & 0b11 {
                    0 => (TransferKind::Store, TransferSize::HalfWord),
                    1 => (TransferKind::Load, TransferSize::SignExtendedByte),
                    2 => (TransferKind::Load, TransferSize::HalfWord),
                    _ => (TransferKind::Load, TransferSize::SignExtendedHalfWord),
                };
                register_offset(word, kind, size)
            }
            ThumbClass::LoadStoreImmediate => {
                let offset = (word >> 6) & 0b11111;
                let (size, offset) = if bit(word, 12) {
                    (TransferSize::Byte, offset)
                } else {
                    (TransferSize::Word, offset << 2)
                };
                immediate_offset(
                    transfer_kind(word, 11),
                    size,
                    Register::from_u3(word, 0),
                    Register::from_u3(word, 3),
                    offset,
                )
            }
            ThumbClass::LoadStoreHalfWord => immediate_offset(
                transfer_kind(word, 11),
                TransferSize::HalfWord,
                Register::from_u3(word, 0),
                Register::from_u3(word, 3),
                ((word >> 6) & 0b11111) << 1,
            ),
            ThumbClass::SpRelative => immediate_offset(
                transfer_kind(word, 11),
                TransferSize::Word,
                Register::from_u3(word, 8),
                Register::R13,
                (word & 0xFF) << 2,
            ),
            ThumbClass::LoadAddress => {
                let rd = Register::from_u3(word, 8);
                if bit(word, 11) {
                    data(false, DataOp::Add, rd, Register::R13, DataOperand::constant((word & 0xFF) << 2))
                } else {
                    let (positive, offset) = pc_relative((word & 0xFF) << 2, address);
                    let op = if positive { DataOp::Add } else { DataOp::Sub };
                    data(false, op, rd, Register::R15, DataOperand::constant(offset))
                }
            }
            ThumbClass::AddSp => {
                let op = if bit(word, 7) { DataOp::Sub } else { DataOp::Add };
                let offset = DataOperand::constant((word & 0x7F) << 2);
                data(false, op, Register::R13, Register::R13, offset)
            }
            ThumbClass::PushPop => {
                let load = bit(word, 11);
                let extra = match (load, bit(word, 8)) {
                    (_, false) => 0,
                    (false, true) => 1 << 14,
                    (true, true) => 1 << 15,
                };
                Instr::BlockTransfer {
                    kind: if load {
                        TransferKind::Load
                    } else {
                        TransferKind::Store
                    },
                    write_back: true,
                    // PUSH is STMDB, POP is LDMIA.
                    offset_positive: load,
                    pre_index: !load,
                    psr: false,
                    base_register: Register::R13,
                    registers: (word & 0xFF) as u16 | extra,
                }
            }
            ThumbClass::Multiple => Instr::BlockTransfer {
                kind: transfer_kind(word, 11),
                write_back: true,
                offset_positive: true,
                pre_index: false,
                psr: false,
                base_register: Register::from_u3(word, 8),
                registers: (word & 0xFF) as u16,
            },
            ThumbClass::SoftwareInterrupt => Instr::SoftwareInterrupt {
                comment: word & 0xFF,
            },
            ThumbClass::Undefined => Instr::Undefined,
            ThumbClass::ConditionalBranch => {
                return (
                    Cond::from_u4(word, 8),
                    Instr::Branch {
                        link: false,
                        offset: i32::from(word as u8 as i8) << 1,
                    },
                );
            }
            ThumbClass::Branch => Instr::Branch {
                link: false,
                offset: sign_extend_11(word) << 1,
            },
            ThumbClass::LongBranch if bit(word, 11) => Instr::LongBranchLink {
                offset: (word & 0x7FF) << 1,
            },
            ThumbClass::LongBranch => {
                // LR = PC + (offset << 12), with the PC four bytes ahead.
                let offset = (sign_extend_11(word) << 12) as u32;
                data(false, DataOp::Add, Register::R14, Register::R15, DataOperand::constant(offset))
            }
        };
        (Cond::AL, instr)
    }
}

/// Format 4: operations between two low registers, always setting flags.
fn translate_alu(word: u32) -> Instr {
    let rd = Register::from_u3(word, 0);
    let rs = Register::from_u3(word, 3);
    let by_register = |shift_type| {
        DataOperand::Register(
            rd,
            Shift {
                shift_type,
                shift_amount: ShiftAmount::Register(rs),
            },
        )
    };
    let plain = DataOperand::plain(rs);
    match (word >> 6) & 0xF {
        0x0 => data(true, DataOp::And, rd, rd, plain),
        0x1 => data(true, DataOp::Eor, rd, rd, plain),
        0x2 => data(true, DataOp::Mov, rd, Register::R0, by_register(ShiftType::LogicalLeft)),
        0x3 => data(true, DataOp::Mov, rd, Register::R0, by_register(ShiftType::LogicalRight)),
        0x4 => data(true, DataOp::Mov, rd, Register::R0, by_register(ShiftType::ArithmeticRight)),
        0x5 => data(true, DataOp::Adc, rd, rd, plain),
        0x6 => data(true, DataOp::Sbc, rd, rd, plain),
        0x7 => data(true, DataOp::Mov, rd, Register::R0, by_register(ShiftType::RotateRight)),
        0x8 => data(true, DataOp::Tst, Register::R0, rd, plain),
        // NEG is RSBS Rd, Rs, #0.
        0x9 => data(true, DataOp::Rsb, rd, rs, DataOperand::constant(0)),
        0xA => data(true, DataOp::Cmp, Register::R0, rd, plain),
        0xB => data(true, DataOp::Cmn, Register::R0, rd, plain),
        0xC => data(true, DataOp::Orr, rd, rd, plain),
        0xD => Instr::Multiply {
            set_condition_codes: true,
            dest: rd,
            op1: rs,
            op2: rd,
            addend: None,
        },
        0xE => data(true, DataOp::Bic, rd, rd, plain),
        _ => data(true, DataOp::Mvn, rd, Register::R0, plain),
    }
}

fn data(
    set_condition_codes: bool,
    op: DataOp,
    dest: Register,
    op1: Register,
    op2: DataOperand,
) -> Instr {
    Instr::Data {
        set_condition_codes,
        op,
        dest,
        op1,
        op2,
    }
}

/// Formats 7 and 8: `[Rb, Ro]` addressing.
fn register_offset(word: u32, kind: TransferKind, size: TransferSize) -> Instr {
    Instr::SingleTransfer {
        kind,
        size,
        write_back: false,
        offset_positive: true,
        pre_index: true,
        data_register: Register::from_u3(word, 0),
        base_register: Register::from_u3(word, 3),
        offset: TransferOperand::Register(Register::from_u3(word, 6), Shift::NONE),
    }
}

fn immediate_offset(
    kind: TransferKind,
    size: TransferSize,
    data_register: Register,
    base_register: Register,
    offset: u32,
) -> Instr {
    Instr::SingleTransfer {
        kind,
        size,
        write_back: false,
        offset_positive: true,
        pre_index: true,
        data_register,
        base_register,
        offset: TransferOperand::Immediate(offset),
    }
}

/// PC-relative addressing uses the PC with bit 1 cleared. R15 reads as the
/// instruction address plus four, so compensate in the offset instead.
/// Returns the direction and magnitude of the adjusted offset.
fn pc_relative(offset: u32, address: u32) -> (bool, u32) {
    let adjusted = offset as i32 - (address & 0b10) as i32;
    (adjusted >= 0, adjusted.unsigned_abs())
}

fn transfer_kind(word: u32, n: u32) -> TransferKind {
    if bit(word, n) {
        TransferKind::Load
    } else {
        TransferKind::Store
    }
}

fn sign_extend_11(word: u32) -> i32 {
    ((word << 21) as i32) >> 21
}

fn bit(word: u32, n: u32) -> bool {
    word & (1 << n) != 0
}
