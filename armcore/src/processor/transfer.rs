//! Single, block and swap data transfers.

use tracing::debug;

use crate::{
    bus::{Bus, Cycle, Width},
    instr::{Register, TransferKind, TransferOperand, TransferSize},
};

use super::Processor;

impl<B: Bus> Processor<B> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn execute_single_transfer(
        &mut self,
        kind: TransferKind,
        size: TransferSize,
        write_back: bool,
        offset_positive: bool,
        pre_index: bool,
        data_register: Register,
        base_register: Register,
        offset: TransferOperand,
    ) {
        let offset = match offset {
            TransferOperand::Immediate(offset) => offset,
            TransferOperand::Register(register, shift) => {
                let pc_offset = self.pc_offset();
                self.apply_shift(self.read_register(register), shift, pc_offset)
                    .0
            }
        };
        let base = self.read_register(base_register);
        let offset_address = if offset_positive {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };
        let address = if pre_index { offset_address } else { base };
        // Post-indexed transfers always write back.
        let mut write_back = write_back || !pre_index;
        if write_back && base_register == Register::R15 {
            debug!("write-back to R15 suppressed");
            write_back = false;
        }

        match kind {
            TransferKind::Store => {
                // R15 is stored as the address of the instruction plus 12.
                let value = self
                    .registers
                    .get_pc_offset(data_register, self.pc_offset() + 4);
                self.code_cycle(Cycle::NonSeq);
                self.data_cycle(Cycle::NonSeq, address, width_of(size));
                match size {
                    TransferSize::Word => self.bus.write_word(address & !3, value),
                    TransferSize::HalfWord | TransferSize::SignExtendedHalfWord => {
                        self.bus.write_half_word(address & !1, value as u16)
                    }
                    TransferSize::Byte | TransferSize::SignExtendedByte => {
                        self.bus.write_byte(address, value as u8)
                    }
                }
                if write_back {
                    self.registers.set(base_register, offset_address);
                }
            }
            TransferKind::Load => {
                self.code_cycle(Cycle::Seq);
                self.data_cycle(Cycle::NonSeq, address, width_of(size));
                self.internal_cycles(1);
                let value = match size {
                    TransferSize::Word => self.read_rotated_word(address),
                    TransferSize::Byte => u32::from(self.bus.read_byte(address)),
                    TransferSize::HalfWord => u32::from(self.bus.read_half_word(address & !1))
                        .rotate_right((address & 1) * 8),
                    TransferSize::SignExtendedByte => self.bus.read_byte(address) as i8 as u32,
                    // A misaligned signed halfword loads the addressed byte instead.
                    TransferSize::SignExtendedHalfWord if address & 1 != 0 => {
                        self.bus.read_byte(address) as i8 as u32
                    }
                    TransferSize::SignExtendedHalfWord => {
                        self.bus.read_half_word(address) as i16 as u32
                    }
                };
                // The loaded value wins when the data register is also the base.
                if write_back {
                    self.registers.set(base_register, offset_address);
                }
                self.write_register(data_register, value);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn execute_block_transfer(
        &mut self,
        kind: TransferKind,
        write_back: bool,
        offset_positive: bool,
        pre_index: bool,
        psr: bool,
        base_register: Register,
        registers: u16,
    ) {
        // An empty list transfers R15 alone but moves the base as if all
        // sixteen registers were transferred.
        let (list, size) = if registers == 0 {
            (1 << 15, 0x40)
        } else {
            (registers, registers.count_ones() * 4)
        };
        let base = self.read_register(base_register);
        // Registers are always transferred lowest first to the lowest address.
        let (start, final_base) = match (offset_positive, pre_index) {
            (true, false) => (base, base.wrapping_add(size)),
            (true, true) => (base.wrapping_add(4), base.wrapping_add(size)),
            (false, false) => (
                base.wrapping_sub(size).wrapping_add(4),
                base.wrapping_sub(size),
            ),
            (false, true) => (base.wrapping_sub(size), base.wrapping_sub(size)),
        };
        let mut write_back = write_back;
        if write_back && base_register == Register::R15 {
            debug!("write-back to R15 suppressed");
            write_back = false;
        }
        let loads_pc = kind == TransferKind::Load && list & (1 << 15) != 0;
        // With the S bit, transfers use the user bank unless this is an
        // LDM loading R15, which instead returns from an exception.
        let user_bank = psr && !loads_pc;

        let mut address = start;
        match kind {
            TransferKind::Store => {
                self.code_cycle(Cycle::NonSeq);
                for (i, register) in listed_registers(list).enumerate() {
                    let value = if register == base_register && write_back && i > 0 {
                        final_base
                    } else if register == Register::R15 {
                        self.registers.pc().wrapping_add(self.pc_offset() + 4)
                    } else if user_bank {
                        self.registers.get_user(register)
                    } else {
                        self.registers.get(register)
                    };
                    let cycle = if i == 0 { Cycle::NonSeq } else { Cycle::Seq };
                    self.data_cycle(cycle, address, Width::Word);
                    self.bus.write_word(address & !3, value);
                    address = address.wrapping_add(4);
                }
                if write_back {
                    self.registers.set(base_register, final_base);
                }
            }
            TransferKind::Load => {
                self.code_cycle(Cycle::Seq);
                if write_back {
                    self.registers.set(base_register, final_base);
                }
                let mut new_pc = None;
                for (i, register) in listed_registers(list).enumerate() {
                    let cycle = if i == 0 { Cycle::NonSeq } else { Cycle::Seq };
                    self.data_cycle(cycle, address, Width::Word);
                    let value = self.bus.read_word(address & !3);
                    if register == Register::R15 {
                        new_pc = Some(value);
                    } else if user_bank {
                        self.registers.set_user(register, value);
                    } else {
                        self.registers.set(register, value);
                    }
                    address = address.wrapping_add(4);
                }
                self.internal_cycles(1);
                if let Some(value) = new_pc {
                    if psr {
                        self.restore_cpsr();
                    }
                    self.branch_to(value);
                }
            }
        }
    }

    pub(super) fn execute_swap(
        &mut self,
        byte: bool,
        dest: Register,
        source: Register,
        base: Register,
    ) {
        self.code_cycle(Cycle::Seq);
        let address = self.read_register(base);
        let value = self.read_register(source);
        let width = if byte { Width::Byte } else { Width::Word };
        self.data_cycle(Cycle::NonSeq, address, width);
        self.data_cycle(Cycle::NonSeq, address, width);
        self.internal_cycles(1);

        let old = if byte {
            let old = u32::from(self.bus.read_byte(address));
            self.bus.write_byte(address, value as u8);
            old
        } else {
            let old = self.read_rotated_word(address);
            self.bus.write_word(address & !3, value);
            old
        };
        self.write_register(dest, old);
    }

    /// Misaligned word loads rotate the aligned word so that
    /// the addressed byte lands in the bottom of the result.
    fn read_rotated_word(&mut self, address: u32) -> u32 {
        self.bus
            .read_word(address & !3)
            .rotate_right((address & 3) * 8)
    }
}

fn width_of(size: TransferSize) -> Width {
    match size {
        TransferSize::Word => Width::Word,
        TransferSize::HalfWord | TransferSize::SignExtendedHalfWord => Width::HalfWord,
        TransferSize::Byte | TransferSize::SignExtendedByte => Width::Byte,
    }
}

/// The registers named in a register list, in ascending order.
fn listed_registers(list: u16) -> impl Iterator<Item = Register> {
    Register::ALL
        .into_iter()
        .filter(move |register| list & (1 << *register as u16) != 0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        bus::Cycles, instr::Register, memory::Memory, mode::Mode, processor::Processor,
    };

    fn run(words: &[u32], steps: usize) -> Processor<Memory> {
        let mut proc = Processor::new(Memory::new(words));
        for _ in 0..steps {
            proc.step();
        }
        proc
    }

    #[test]
    fn store_then_load_word() {
        // MOV R0, #0x100; MOV R1, #0x2A; STR R1, [R0, #4]!; LDR R2, [R0]
        let proc = run(&[0xE3A0_0C01, 0xE3A0_102A, 0xE5A0_1004, 0xE590_2000], 4);
        assert_eq!(proc.register(Register::R0), 0x104);
        assert_eq!(proc.register(Register::R2), 0x2A);
        assert_eq!(proc.bus().get_word_aligned(0x104), 0x2A);
    }

    #[test]
    fn post_index_writes_back() {
        // MOV R0, #0x100; LDR R1, [R0], #8
        let proc = run(&[0xE3A0_0C01, 0xE490_1008], 2);
        assert_eq!(proc.register(Register::R0), 0x108);
    }

    #[test]
    fn misaligned_load_rotates() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; ADD R0, R0, #1; LDR R1, [R0]
            0xE3A0_0F40,
            0xE280_0001,
            0xE590_1000,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0x4433_2211);
        for _ in 0..3 {
            proc.step();
        }
        assert_eq!(proc.register(Register::R1), 0x1144_3322);
    }

    #[test]
    fn halfword_loads() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; LDRH R1, [R0]; LDRSH R2, [R0, #2]; LDRSB R3, [R0, #1]; LDRSH R4, [R0, #1]
            0xE3A0_0C01,
            0xE1D0_10B0,
            0xE1D0_20F2,
            0xE1D0_30D1,
            0xE1D0_40F1,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0x8001_80FF);
        for _ in 0..5 {
            proc.step();
        }
        assert_eq!(proc.register(Register::R1), 0x80FF);
        assert_eq!(proc.register(Register::R2), 0xFFFF_8001);
        assert_eq!(proc.register(Register::R3), 0xFFFF_FF80);
        assert_eq!(proc.register(Register::R4), 0xFFFF_FF80);
    }

    #[test]
    fn store_pc_adds_twelve() {
        // MOV R0, #0x100; STR PC, [R0]
        let proc = run(&[0xE3A0_0C01, 0xE580_F000], 2);
        assert_eq!(proc.bus().get_word_aligned(0x100), 0x04 + 12);
    }

    #[test]
    fn load_into_pc_branches() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; LDR PC, [R0]
            0xE3A0_0C01,
            0xE590_F000,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0x40);
        proc.step();
        assert_eq!(
            proc.step(),
            Cycles {
                non_seq: 2,
                seq: 2,
                internal: 1,
                wait: 0,
            }
        );
        assert_eq!(proc.register(Register::R15), 0x40);
    }

    #[test]
    fn load_data_register_beats_write_back() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; LDR R0, [R0], #4
            0xE3A0_0C01,
            0xE490_0004,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0x1234);
        proc.step();
        proc.step();
        assert_eq!(proc.register(Register::R0), 0x1234);
    }

    #[test]
    fn push_and_pop() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV SP, #0x200; MOV R1, #1; MOV R2, #2
            0xE3A0_DC02,
            0xE3A0_1001,
            0xE3A0_2002,
            // STMDB SP!, {R1, R2}
            0xE92D_0006,
            // LDMIA SP!, {R3, R4}
            0xE8BD_0018,
        ]));
        for _ in 0..3 {
            proc.step();
        }
        assert_eq!(
            proc.step(),
            Cycles {
                non_seq: 2,
                seq: 1,
                internal: 0,
                wait: 0,
            }
        );
        assert_eq!(proc.register(Register::R13), 0x1F8);
        assert_eq!(proc.bus().get_word_aligned(0x1F8), 1);
        assert_eq!(proc.bus().get_word_aligned(0x1FC), 2);
        assert_eq!(
            proc.step(),
            Cycles {
                non_seq: 1,
                seq: 2,
                internal: 1,
                wait: 0,
            }
        );
        assert_eq!(proc.register(Register::R3), 1);
        assert_eq!(proc.register(Register::R4), 2);
        assert_eq!(proc.register(Register::R13), 0x200);
    }

    #[test]
    fn stm_with_base_in_list() {
        // MOV R0, #0x100; MOV R1, #0x200
        // STMIA R0!, {R0, R1}; STMIA R1!, {R0, R1}
        let proc = run(&[0xE3A0_0C01, 0xE3A0_1C02, 0xE8A0_0003, 0xE8A1_0003], 4);
        // The base is first in the list, so the original value is stored.
        assert_eq!(proc.bus().get_word_aligned(0x100), 0x100);
        // The base is second, so the written-back value is stored.
        assert_eq!(proc.bus().get_word_aligned(0x204), 0x208);
    }

    #[test]
    fn ldm_with_base_in_list() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; LDMIA R0!, {R0, R1}
            0xE3A0_0C01,
            0xE8B0_0003,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0xAA);
        proc.bus_mut().set_word_aligned(0x104, 0xBB);
        proc.step();
        proc.step();
        assert_eq!(proc.register(Register::R0), 0xAA);
        assert_eq!(proc.register(Register::R1), 0xBB);
    }

    #[test]
    fn empty_list_transfers_pc() {
        // MOV R0, #0x100; STMIA R0!, {}
        let proc = run(&[0xE3A0_0C01, 0xE8A0_0000], 2);
        assert_eq!(proc.bus().get_word_aligned(0x100), 0x04 + 12);
        assert_eq!(proc.register(Register::R0), 0x140);
    }

    #[test]
    fn decrement_after_addresses() {
        // MOV R0, #0x100; MOV R1, #1; MOV R2, #2; STMDA R0!, {R1, R2}
        let proc = run(&[0xE3A0_0C01, 0xE3A0_1001, 0xE3A0_2002, 0xE820_0006], 4);
        assert_eq!(proc.bus().get_word_aligned(0xFC), 1);
        assert_eq!(proc.bus().get_word_aligned(0x100), 2);
        assert_eq!(proc.register(Register::R0), 0xF8);
    }

    #[test]
    fn user_bank_store_from_privileged_mode() {
        let proc = run(
            &[
                // MSR CPSR_c, #0xDF; MOV SP, #0x40; MSR CPSR_c, #0xD3; MOV SP, #0x80
                0xE321_F0DF,
                0xE3A0_D040,
                0xE321_F0D3,
                0xE3A0_D080,
                // MOV R0, #0x100; STMIA R0, {SP}^
                0xE3A0_0C01,
                0xE8C0_2000,
            ],
            6,
        );
        assert_eq!(proc.registers().mode(), Mode::Supervisor);
        assert_eq!(proc.bus().get_word_aligned(0x100), 0x40);
    }

    #[test]
    fn ldm_with_pc_and_psr_returns() {
        let mut words = vec![0; 0x50];
        // MSR SPSR_fc, #0x10; MOV R0, #0x100; LDMIA R0, {PC}^
        words[0] = 0xE369_F010;
        words[1] = 0xE3A0_0C01;
        words[2] = 0xE8D0_8000;
        words[0x100 / 4] = 0x20;
        let proc = run(&words, 3);
        assert_eq!(proc.registers().mode(), Mode::Usr);
        assert_eq!(proc.register(Register::R15), 0x20);
    }

    #[test]
    fn pc_base_never_written_back() {
        let mut words = vec![0; 4];
        // LDR R0, [PC, #4]!; STMIA PC!, {R1}
        words[0] = 0xE5BF_0004;
        words[1] = 0xE8AF_0002;
        words[3] = 0x1234;
        let mut proc = Processor::new(Memory::new(&words));
        proc.step();
        assert_eq!(proc.register(Register::R0), 0x1234);
        assert_eq!(proc.register(Register::R15), 0x04);
        proc.step();
        assert_eq!(proc.bus().get_word_aligned(0x0C), 0);
        assert_eq!(proc.register(Register::R15), 0x08);
    }

    #[test]
    fn psr_bit_in_system_mode_uses_current_bank() {
        let mut proc = Processor::new(Memory::new(&[
            // MSR CPSR_c, #0xDF; MOV R0, #0x100; MOV R1, #7
            0xE321_F0DF,
            0xE3A0_0C01,
            0xE3A0_1007,
            // STMIA R0, {R1}^; LDMIA R0, {R2, PC}^
            0xE8C0_0002,
            0xE8D0_8004,
        ]));
        proc.bus_mut().set_word_aligned(0x104, 0x40);
        for _ in 0..5 {
            proc.step();
        }
        assert_eq!(proc.bus().get_word_aligned(0x100), 7);
        assert_eq!(proc.register(Register::R2), 7);
        assert_eq!(proc.register(Register::R15), 0x40);
        // There is no SPSR to restore, so the mode is kept.
        assert_eq!(proc.registers().mode(), Mode::System);
    }

    #[test]
    fn swap_into_pc_branches() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; MOV R1, #0x55; SWP PC, R1, [R0]
            0xE3A0_0C01,
            0xE3A0_1055,
            0xE100_F091,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0x40);
        proc.step();
        proc.step();
        assert_eq!(
            proc.step(),
            Cycles {
                non_seq: 3,
                seq: 2,
                internal: 1,
                wait: 0,
            }
        );
        assert_eq!(proc.register(Register::R15), 0x40);
        assert_eq!(proc.bus().get_word_aligned(0x100), 0x55);
    }

    #[test]
    fn swap_word_and_byte() {
        let mut proc = Processor::new(Memory::new(&[
            // MOV R0, #0x100; MOV R1, #0x55
            0xE3A0_0C01,
            0xE3A0_1055,
            // SWP R2, R1, [R0]; SWPB R3, R1, [R0]
            0xE100_2091,
            0xE140_3091,
        ]));
        proc.bus_mut().set_word_aligned(0x100, 0x1122_3344);
        proc.step();
        proc.step();
        assert_eq!(
            proc.step(),
            Cycles {
                non_seq: 2,
                seq: 1,
                internal: 1,
                wait: 0,
            }
        );
        assert_eq!(proc.register(Register::R2), 0x1122_3344);
        assert_eq!(proc.bus().get_word_aligned(0x100), 0x55);
        proc.step();
        assert_eq!(proc.register(Register::R3), 0x55);
    }
}
