//! Instructions that only touch registers: data processing, PSR transfer,
//! multiplication and branches.

use tracing::debug;

use crate::{
    alu::{self, DataOp},
    bus::{Bus, Cycle},
    instr::{DataOperand, MsrSource, PsrSelect, Register},
    psr::{Flags, PsrFields},
};

use super::Processor;

impl<B: Bus> Processor<B> {
    pub(super) fn execute_data_processing(
        &mut self,
        set_condition_codes: bool,
        op: DataOp,
        dest: Register,
        op1: Register,
        op2: DataOperand,
    ) {
        self.code_cycle(Cycle::Seq);
        // A register-specified shift spends an internal cycle reading the
        // shift register, by which time the PC is a further word ahead.
        let pc_offset = if op2.is_register_specified_shift() {
            self.internal_cycles(1);
            self.pc_offset() + 4
        } else {
            self.pc_offset()
        };

        let op1_value = self.registers.get_pc_offset(op1, pc_offset);
        let (op2_value, shifter_carry) = self.evaluate_operand(op2, pc_offset);
        let output = alu::apply(
            op,
            op1_value,
            op2_value,
            self.registers.flags(),
            shifter_carry,
        );

        if set_condition_codes {
            if dest == Register::R15 {
                self.restore_cpsr();
            } else {
                self.registers.set_flags(output.flags);
            }
        }
        if output.writes_result {
            self.write_register(dest, output.result);
        }
    }

    pub(super) fn execute_mrs(&mut self, psr: PsrSelect, target: Register) {
        self.code_cycle(Cycle::Seq);
        let value = match psr {
            PsrSelect::Cpsr => self.registers.cpsr(),
            PsrSelect::Spsr => self.registers.spsr(),
        };
        if target == Register::R15 {
            debug!("MRS into R15 ignored");
        } else {
            self.registers.set(target, value.bits());
        }
    }

    pub(super) fn execute_msr(&mut self, psr: PsrSelect, fields: PsrFields, source: MsrSource) {
        self.code_cycle(Cycle::Seq);
        let value = match source {
            MsrSource::Register(register) => self.read_register(register),
            MsrSource::Immediate { value, rotate } => value.rotate_right(u32::from(rotate) * 2),
        };
        let mode = self.registers.mode();
        match psr {
            PsrSelect::Cpsr => {
                // User mode may only write the condition flags.
                let fields = if mode.is_privileged() {
                    fields
                } else {
                    fields.intersect(PsrFields::FLAGS)
                };
                let cpsr = self.registers.cpsr();
                // The T bit can only be changed by BX or an exception return.
                let new = cpsr.with_fields(value, fields).with_thumb(cpsr.thumb());
                self.registers.set_cpsr(new);
            }
            PsrSelect::Spsr => match self.registers.spsr_of(mode) {
                Some(spsr) => self
                    .registers
                    .set_spsr_of(mode, spsr.with_fields(value, fields)),
                None => debug!(%mode, "MSR to SPSR ignored in a mode without one"),
            },
        }
    }

    pub(super) fn execute_multiply(
        &mut self,
        set_condition_codes: bool,
        dest: Register,
        op1: Register,
        op2: Register,
        addend: Option<Register>,
    ) {
        self.code_cycle(Cycle::Seq);
        // Every operand is read before the destination is written.
        let multiplicand = self.read_register(op1);
        let multiplier = self.read_register(op2);
        let addend = addend.map(|register| self.read_register(register));
        self.internal_cycles(multiplier_cycles(multiplier, true) + u32::from(addend.is_some()));

        let result = multiplicand
            .wrapping_mul(multiplier)
            .wrapping_add(addend.unwrap_or(0));
        if set_condition_codes {
            // The carry flag is left meaningless by the hardware; it is cleared here.
            let flags = self.registers.flags();
            self.registers.set_flags(Flags {
                negative: result >> 31 != 0,
                zero: result == 0,
                carry: false,
                overflow: flags.overflow,
            });
        }
        self.write_product(dest, result);
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn execute_multiply_long(
        &mut self,
        set_condition_codes: bool,
        signed: bool,
        accumulate: bool,
        dest_hi: Register,
        dest_lo: Register,
        op1: Register,
        op2: Register,
    ) {
        self.code_cycle(Cycle::Seq);
        let multiplicand = self.read_register(op1);
        let multiplier = self.read_register(op2);
        let addend = if accumulate {
            u64::from(self.read_register(dest_hi)) << 32 | u64::from(self.read_register(dest_lo))
        } else {
            0
        };
        self.internal_cycles(
            multiplier_cycles(multiplier, signed) + 1 + u32::from(accumulate),
        );

        let product = if signed {
            (i64::from(multiplicand as i32) * i64::from(multiplier as i32)) as u64
        } else {
            u64::from(multiplicand) * u64::from(multiplier)
        };
        let result = product.wrapping_add(addend);
        if set_condition_codes {
            let flags = self.registers.flags();
            self.registers.set_flags(Flags {
                negative: result >> 63 != 0,
                zero: result == 0,
                carry: false,
                overflow: flags.overflow,
            });
        }
        self.write_product(dest_lo, result as u32);
        self.write_product(dest_hi, (result >> 32) as u32);
    }

    fn write_product(&mut self, dest: Register, value: u32) {
        if dest == Register::R15 {
            debug!("multiply result written to R15 discarded");
        } else {
            self.registers.set(dest, value);
        }
    }

    pub(super) fn execute_branch(&mut self, link: bool, offset: i32) {
        self.code_cycle(Cycle::Seq);
        let target = self.read_register(Register::R15).wrapping_add_signed(offset);
        if link {
            let return_address = self.registers.pc().wrapping_add(self.instruction_width());
            self.registers.set(Register::R14, return_address);
        }
        self.branch_to(target);
    }

    pub(super) fn execute_branch_exchange(&mut self, operand: Register) {
        self.code_cycle(Cycle::Seq);
        let target = self.read_register(operand);
        let thumb = target & 1 != 0;
        if thumb != self.registers.thumb_state() {
            debug!(thumb, target, "state switch");
        }
        let cpsr = self.registers.cpsr().with_thumb(thumb);
        self.registers.set_cpsr(cpsr);
        self.branch_to(target);
    }

    /// The second half of a Thumb BL: jump to LR plus the low offset and
    /// leave the return address, tagged as Thumb code, in LR.
    pub(super) fn execute_long_branch_link(&mut self, offset: u32) {
        self.code_cycle(Cycle::Seq);
        let target = self.registers.get(Register::R14).wrapping_add(offset);
        let return_address = self.registers.pc().wrapping_add(2);
        self.registers.set(Register::R14, return_address | 1);
        self.branch_to(target);
    }
}

/// The number of internal cycles the multiplier array needs,
/// which depends on how many significant bytes `multiplier` has.
/// Signed forms also terminate early on leading one bits.
pub(super) fn multiplier_cycles(multiplier: u32, signed: bool) -> u32 {
    let terminates = |mask: u32| {
        let top = multiplier & mask;
        top == 0 || (signed && top == mask)
    };
    if terminates(0xFFFF_FF00) {
        1
    } else if terminates(0xFFFF_0000) {
        2
    } else if terminates(0xFF00_0000) {
        3
    } else {
        4
    }
}
