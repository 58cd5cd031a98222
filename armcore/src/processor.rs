//! A model of the ARM7TDMI processor.

use std::mem;

use tracing::{debug, trace};

use crate::{
    bus::{Bus, Cycle, Cycles, Width},
    instr::{DataOperand, Instr, Register, Shift, ShiftAmount},
    mode::Mode,
    psr::Psr,
    registers::Registers,
    shifter,
    snapshot::Snapshot,
};

mod data;
mod transfer;

/// The processor core, executing from the bus it owns.
#[derive(Debug)]
pub struct Processor<B: Bus> {
    registers: Registers,
    bus: B,
    boot_address: u32,
    irq_line: bool,
    fiq_line: bool,
    /// The cost of the instruction in progress.
    cycles: Cycles,
    /// Set once the instruction in progress has written the program counter.
    branched: bool,
}

/// The exceptions an executing program can raise or receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Undefined,
    SoftwareInterrupt,
    Irq,
    Fiq,
}

impl Exception {
    pub fn mode(self) -> Mode {
        match self {
            Exception::Undefined => Mode::Undefined,
            Exception::SoftwareInterrupt => Mode::Supervisor,
            Exception::Irq => Mode::Irq,
            Exception::Fiq => Mode::Fiq,
        }
    }

    pub fn vector(self) -> u32 {
        match self {
            Exception::Undefined => 0x04,
            Exception::SoftwareInterrupt => 0x08,
            Exception::Irq => 0x18,
            Exception::Fiq => 0x1C,
        }
    }
}

impl<B: Bus> Processor<B> {
    /// A processor that boots at address zero.
    pub fn new(bus: B) -> Self {
        Self::with_boot_address(bus, 0)
    }

    /// A processor in supervisor mode and ARM state, with both interrupts
    /// disabled, about to execute the instruction at `address`.
    pub fn with_boot_address(bus: B, address: u32) -> Self {
        let mut registers = Registers::default();
        registers.set_pc(address);
        Self {
            registers,
            bus,
            boot_address: address,
            irq_line: false,
            fiq_line: false,
            cycles: Cycles::default(),
            branched: false,
        }
    }

    /// Start executing Thumb code at the boot address rather than ARM code.
    pub fn with_thumb_state(mut self, thumb: bool) -> Self {
        let cpsr = self.registers.cpsr().with_thumb(thumb);
        self.registers.set_cpsr(cpsr);
        self
    }

    /// Reinitialise every register bank, every SPSR and the CPSR,
    /// and restart at the boot address.
    pub fn reset(&mut self) {
        debug!(boot_address = self.boot_address, "reset");
        self.registers = Registers::default();
        self.registers.set_pc(self.boot_address);
        self.cycles = Cycles::default();
        self.branched = false;
    }

    /// Drive the interrupt request line. The line is level-triggered and
    /// sampled once per [`Processor::step`].
    pub fn request_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Drive the fast interrupt request line.
    pub fn request_fiq(&mut self, asserted: bool) {
        self.fiq_line = asserted;
    }

    /// Execute exactly one instruction, or enter a pending interrupt,
    /// and return what it cost.
    pub fn step(&mut self) -> Cycles {
        let pc = self.registers.pc();
        let width = self.instruction_width();
        let (word, (cond, instr)) = if self.registers.thumb_state() {
            let halfword = self.bus.read_half_word(pc);
            (u32::from(halfword), Instr::decode_thumb(halfword, pc))
        } else {
            let word = self.bus.read_word(pc);
            (word, Instr::decode(word))
        };

        // The fetched instruction is discarded when an interrupt is taken.
        if let Some(exception) = self.pending_interrupt() {
            self.code_cycle(Cycle::Seq);
            self.enter_exception(exception, pc.wrapping_add(4));
            return self.finish(pc.wrapping_add(width));
        }

        trace!(pc, word, ?cond, ?instr, "execute");
        if cond.holds(self.registers.flags()) {
            self.execute(instr);
        } else {
            // Unexecuted instructions take one S-cycle.
            self.code_cycle(Cycle::Seq);
        }
        self.finish(pc.wrapping_add(width))
    }

    /// Fall through to `next` unless the instruction branched.
    fn finish(&mut self, next: u32) -> Cycles {
        if !mem::take(&mut self.branched) {
            self.registers.set_pc(next);
        }
        mem::take(&mut self.cycles)
    }

    /// FIQ takes priority over IRQ.
    fn pending_interrupt(&self) -> Option<Exception> {
        let cpsr = self.registers.cpsr();
        if self.fiq_line && !cpsr.fiq_disable() {
            Some(Exception::Fiq)
        } else if self.irq_line && !cpsr.irq_disable() {
            Some(Exception::Irq)
        } else {
            None
        }
    }

    fn execute(&mut self, instr: Instr) {
        match instr {
            Instr::BranchExchange { operand } => self.execute_branch_exchange(operand),
            Instr::Branch { link, offset } => self.execute_branch(link, offset),
            Instr::Data {
                set_condition_codes,
                op,
                dest,
                op1,
                op2,
            } => self.execute_data_processing(set_condition_codes, op, dest, op1, op2),
            Instr::Mrs { psr, target } => self.execute_mrs(psr, target),
            Instr::Msr {
                psr,
                fields,
                source,
            } => self.execute_msr(psr, fields, source),
            Instr::Multiply {
                set_condition_codes,
                dest,
                op1,
                op2,
                addend,
            } => self.execute_multiply(set_condition_codes, dest, op1, op2, addend),
            Instr::MultiplyLong {
                set_condition_codes,
                signed,
                accumulate,
                dest_hi,
                dest_lo,
                op1,
                op2,
            } => self.execute_multiply_long(
                set_condition_codes,
                signed,
                accumulate,
                dest_hi,
                dest_lo,
                op1,
                op2,
            ),
            Instr::SingleTransfer {
                kind,
                size,
                write_back,
                offset_positive,
                pre_index,
                data_register,
                base_register,
                offset,
            } => self.execute_single_transfer(
                kind,
                size,
                write_back,
                offset_positive,
                pre_index,
                data_register,
                base_register,
                offset,
            ),
            Instr::BlockTransfer {
                kind,
                write_back,
                offset_positive,
                pre_index,
                psr,
                base_register,
                registers,
            } => self.execute_block_transfer(
                kind,
                write_back,
                offset_positive,
                pre_index,
                psr,
                base_register,
                registers,
            ),
            Instr::Swap {
                byte,
                dest,
                source,
                base,
            } => self.execute_swap(byte, dest, source, base),
            Instr::SoftwareInterrupt { comment } => {
                debug!(comment, "software interrupt");
                self.code_cycle(Cycle::Seq);
                let return_address = self.registers.pc().wrapping_add(self.instruction_width());
                self.enter_exception(Exception::SoftwareInterrupt, return_address);
            }
            Instr::LongBranchLink { offset } => self.execute_long_branch_link(offset),
            Instr::Undefined => {
                self.code_cycle(Cycle::Seq);
                self.internal_cycles(1);
                let return_address = self.registers.pc().wrapping_add(self.instruction_width());
                self.enter_exception(Exception::Undefined, return_address);
            }
        }
    }

    /// Save the CPSR into the SPSR of the exception's mode, switch mode in
    /// ARM state with interrupts masked, set the link register of the new
    /// bank and jump to the vector.
    fn enter_exception(&mut self, exception: Exception, return_address: u32) {
        let old = self.registers.cpsr();
        let new = old
            .with_mode(exception.mode())
            .with_thumb(false)
            .with_irq_disable(true)
            .with_fiq_disable(old.fiq_disable() || exception == Exception::Fiq);
        self.registers.set_cpsr(new);
        self.registers.set_spsr(old);
        self.registers.set(Register::R14, return_address);
        debug!(
            ?exception,
            return_address,
            vector = exception.vector(),
            "exception entry"
        );
        self.branch_to(exception.vector());
    }

    /// Copy the SPSR of the current mode into the CPSR.
    /// User and system mode have no SPSR, so nothing changes there.
    fn restore_cpsr(&mut self) {
        if let Some(spsr) = self.registers.spsr_of(self.registers.mode()) {
            debug!(spsr = spsr.bits(), "exception return");
            self.registers.set_cpsr(spsr);
        }
    }

    /// Write the program counter, aligned for the current state,
    /// and pay for refilling the pipeline.
    fn branch_to(&mut self, address: u32) {
        let address = if self.registers.thumb_state() {
            address & !1
        } else {
            address & !3
        };
        self.registers.set_pc(address);
        self.branched = true;
        let width = self.fetch_width();
        self.data_cycle(Cycle::NonSeq, address, width);
        self.data_cycle(
            Cycle::Seq,
            address.wrapping_add(self.instruction_width()),
            width,
        );
    }

    /// How far ahead of the executing instruction R15 reads.
    fn pc_offset(&self) -> u32 {
        if self.registers.thumb_state() { 4 } else { 8 }
    }

    fn instruction_width(&self) -> u32 {
        if self.registers.thumb_state() { 2 } else { 4 }
    }

    fn fetch_width(&self) -> Width {
        if self.registers.thumb_state() {
            Width::HalfWord
        } else {
            Width::Word
        }
    }

    fn read_register(&self, register: Register) -> u32 {
        self.registers.get_pc_offset(register, self.pc_offset())
    }

    /// Writes to R15 branch.
    fn write_register(&mut self, register: Register, value: u32) {
        if register == Register::R15 {
            self.branch_to(value);
        } else {
            self.registers.set(register, value);
        }
    }

    /// A memory cycle on the code bus at the executing instruction.
    fn code_cycle(&mut self, cycle: Cycle) {
        let address = self.registers.pc();
        let width = self.fetch_width();
        self.data_cycle(cycle, address, width);
    }

    fn data_cycle(&mut self, cycle: Cycle, address: u32, width: Width) {
        self.cycles.record(cycle, 1);
        self.cycles.wait += self.bus.wait_states(address, width, cycle);
    }

    fn internal_cycles(&mut self, count: u32) {
        self.cycles.record(Cycle::Internal, count);
    }

    /// Evaluate the given operand to a data processing instruction.
    /// The output is given together with a carry out bit from the barrel shifter.
    /// If no shift operation was needed, this is the current value of the
    /// carry flag in the CPSR.
    fn evaluate_operand(&self, operand: DataOperand, pc_offset: u32) -> (u32, bool) {
        match operand {
            DataOperand::Immediate { value, rotate } => {
                shifter::rotated_immediate(value, rotate, self.registers.flags().carry)
            }
            DataOperand::Register(register, shift) => self.apply_shift(
                self.registers.get_pc_offset(register, pc_offset),
                shift,
                pc_offset,
            ),
        }
    }

    /// Perform the action of the barrel shifter.
    fn apply_shift(&self, value: u32, shift: Shift, pc_offset: u32) -> (u32, bool) {
        let carry = self.registers.flags().carry;
        match shift.shift_amount {
            ShiftAmount::Immediate(amount) => {
                shifter::shift_immediate(value, shift.shift_type, amount, carry)
            }
            ShiftAmount::Register(register) => shifter::shift(
                value,
                shift.shift_type,
                self.registers.get_pc_offset(register, pc_offset),
                carry,
            ),
        }
    }

    /// The value of a register in the current mode. R15 is the address of
    /// the next instruction to execute, without any prefetch offset.
    pub fn register(&self, register: Register) -> u32 {
        self.registers.get(register)
    }

    /// The value of a register in the user bank, whatever the current mode.
    pub fn user_register(&self, register: Register) -> u32 {
        self.registers.get_user(register)
    }

    pub fn cpsr(&self) -> Psr {
        self.registers.cpsr()
    }

    /// The SPSR of `mode`, which user and system mode do not have.
    pub fn spsr(&self, mode: Mode) -> Option<Psr> {
        self.registers.spsr_of(mode)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.registers)
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[cfg(test)]
    pub(crate) fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{memory::Memory, registers::PhysicalRegister};

    fn processor(words: &[u32]) -> Processor<Memory> {
        Processor::new(Memory::new(words))
    }

    fn run(words: &[u32], steps: usize) -> Processor<Memory> {
        let mut proc = processor(words);
        for _ in 0..steps {
            proc.step();
        }
        proc
    }

    fn cycles(non_seq: u32, seq: u32, internal: u32) -> Cycles {
        Cycles {
            non_seq,
            seq,
            internal,
            wait: 0,
        }
    }

    #[test]
    fn add_sets_overflow() {
        // MVN R0, #0x80000000; MOV R1, #1; ADDS R2, R0, R1
        let proc = run(&[0xE3E0_0102, 0xE3A0_1001, 0xE090_2001], 3);
        assert_eq!(proc.register(Register::R2), 0x8000_0000);
        assert_eq!(proc.cpsr().bits(), 0x9000_00D3);
    }

    #[test]
    fn sub_borrows() {
        // MOV R0, #5; MOV R1, #10; SUBS R2, R0, R1
        let proc = run(&[0xE3A0_0005, 0xE3A0_100A, 0xE050_2001], 3);
        assert_eq!(proc.register(Register::R2), 0xFFFF_FFFB);
        assert_eq!(proc.cpsr().bits(), 0x8000_00D3);
    }

    #[test]
    fn mov_rotated_immediate_sets_carry() {
        // MOVS R0, #0xFF000000
        let proc = run(&[0xE3B0_04FF], 1);
        assert_eq!(proc.register(Register::R0), 0xFF00_0000);
        assert_eq!(proc.cpsr().bits(), 0xA000_00D3);
    }

    #[test]
    fn cmp_leaves_registers() {
        // MOV R0, #0x10; MOV R1, #0x10; CMP R0, R1
        let proc = run(&[0xE3A0_0010, 0xE3A0_1010, 0xE150_0001], 3);
        assert_eq!(proc.register(Register::R0), 0x10);
        assert_eq!(proc.register(Register::R1), 0x10);
        assert_eq!(proc.cpsr().bits(), 0x6000_00D3);
    }

    #[test]
    fn irq_preempts_the_fetched_instruction() {
        // MSR CPSR_c, #0x1F enables interrupts in system mode.
        let mut proc = processor(&[0xE321_F01F, 0xE3A0_0001]);
        proc.step();
        proc.request_irq(true);
        let cost = proc.step();

        assert_eq!(cost, cycles(1, 2, 0));
        assert_eq!(proc.register(Register::R0), 0);
        assert_eq!(proc.registers().mode(), Mode::Irq);
        assert!(proc.cpsr().irq_disable());
        assert!(!proc.cpsr().fiq_disable());
        assert_eq!(proc.register(Register::R15), 0x18);
        assert_eq!(proc.register(Register::R14), 0x08);
        assert_eq!(proc.spsr(Mode::Irq), Some(Psr::from_bits(0x1F)));

        // Masked now, so the line being held changes nothing.
        proc.step();
        assert_eq!(proc.register(Register::R15), 0x1C);
    }

    #[test]
    fn irq_round_trip_restores_cpsr() {
        let mut words = vec![0; 0x20];
        // SUBS PC, LR, #4 at the IRQ vector.
        words[0x18 / 4] = 0xE25E_F004;
        // MSR CPSR_fc, R1 with R1 = 0x6000_0010 reaches user mode with Z and C.
        words[0x40 / 4] = 0xE3A0_1206;
        words[0x44 / 4] = 0xE381_1010;
        words[0x48 / 4] = 0xE129_F001;
        words[0x4C / 4] = 0xE3A0_2001;
        let mut proc = Processor::with_boot_address(Memory::new(&words), 0x40);
        for _ in 0..3 {
            proc.step();
        }
        let before = proc.cpsr();
        assert_eq!(before.bits(), 0x6000_0010);

        proc.request_irq(true);
        proc.step();
        proc.request_irq(false);
        assert_eq!(proc.registers().mode(), Mode::Irq);
        assert_eq!(proc.spsr(Mode::Irq), Some(before));

        let cost = proc.step();
        assert_eq!(cost, cycles(1, 2, 0));
        assert_eq!(proc.cpsr(), before);
        assert_eq!(proc.register(Register::R15), 0x4C);
        proc.step();
        assert_eq!(proc.register(Register::R2), 1);
    }

    #[test]
    fn fiq_wins_over_irq() {
        // MSR CPSR_c, #0x13 unmasks both lines.
        let mut proc = processor(&[0xE321_F013]);
        proc.step();
        proc.request_irq(true);
        proc.request_fiq(true);
        proc.step();
        assert_eq!(proc.registers().mode(), Mode::Fiq);
        assert_eq!(proc.register(Register::R15), 0x1C);
        assert!(proc.cpsr().fiq_disable() && proc.cpsr().irq_disable());
    }

    #[test]
    fn fiq_bank_is_isolated() {
        let mut proc = processor(&[]);
        let registers = proc.registers_mut();
        registers.switch_mode(Mode::Usr);
        registers.set(Register::R13, 0x1111);
        registers.switch_mode(Mode::Fiq);
        registers.set(Register::R13, 0x2222);
        registers.switch_mode(Mode::Usr);
        assert_eq!(proc.register(Register::R13), 0x1111);
        proc.registers_mut().switch_mode(Mode::Fiq);
        assert_eq!(proc.register(Register::R13), 0x2222);
        assert_eq!(proc.user_register(Register::R13), 0x1111);
    }

    #[test]
    fn failed_condition_only_costs_a_cycle() {
        // MOVEQ R0, #1 with Z clear.
        let mut proc = processor(&[0x03A0_0001]);
        let before = proc.registers().clone();
        assert_eq!(proc.step(), cycles(0, 1, 0));
        assert_eq!(proc.register(Register::R15), 4);
        proc.registers_mut().set_pc(0);
        assert_eq!(proc.registers(), &before);
    }

    #[test]
    fn timing_follows_instruction_kind() {
        let mut proc = processor(&[
            // MOV R0, #0x100
            0xE3A0_0C01,
            // ADD R1, R0, R0, LSL R0
            0xE080_1010,
            // STR R1, [R0]
            0xE580_1000,
            // LDR R2, [R0]
            0xE590_2000,
            // MUL R3, R2, R0
            0xE003_0092,
            // B to itself
            0xEAFF_FFFE,
        ]);
        assert_eq!(proc.step(), cycles(0, 1, 0));
        assert_eq!(proc.step(), cycles(0, 1, 1));
        assert_eq!(proc.step(), cycles(2, 0, 0));
        assert_eq!(proc.step(), cycles(1, 1, 1));
        // 0x100 needs two multiplier cycles.
        assert_eq!(proc.step(), cycles(0, 1, 2));
        assert_eq!(proc.step(), cycles(1, 2, 0));
        assert_eq!(proc.register(Register::R15), 0x14);
    }

    #[test]
    fn wait_states_are_reported_separately() {
        let memory = Memory::new(&[0xE3A0_0C01, 0xE590_2000]).with_wait_states(2, 1);
        let mut proc = Processor::new(memory);
        assert_eq!(proc.step().wait, 1);
        let cost = proc.step();
        assert_eq!(cost.wait, 3);
        assert_eq!(cost.total(), 6);
    }

    #[test]
    fn reset_reinitialises_everything() {
        let mut proc = Processor::with_boot_address(Memory::new(&[0xEF00_0000]), 0);
        proc.step();
        assert_eq!(proc.register(Register::R15), 0x08);
        proc.reset();
        assert_eq!(proc.register(Register::R15), 0);
        assert_eq!(proc.cpsr().bits(), 0xD3);
        assert_eq!(proc.registers().get_physical(PhysicalRegister::SpsrSvc), 0);
        assert_eq!(proc.registers().get_physical(PhysicalRegister::R14Svc), 0);
    }

    #[test]
    fn software_interrupt_links_past_itself() {
        let mut proc = Processor::with_boot_address(Memory::new(&[0; 8]), 0x10);
        proc.bus_mut().set_word_aligned(0x10, 0xEF00_0042);
        assert_eq!(proc.step(), cycles(1, 2, 0));
        assert_eq!(proc.register(Register::R14), 0x14);
        assert_eq!(proc.register(Register::R15), 0x08);
        assert_eq!(proc.spsr(Mode::Supervisor), Some(Psr::from_bits(0xD3)));
    }

    #[test]
    fn snapshot_reflects_current_mode() {
        let mut proc = processor(&[0xE3A0_D0FF]);
        proc.step();
        let snapshot = proc.snapshot();
        assert_eq!(snapshot.mode, Mode::Supervisor);
        assert_eq!(snapshot.registers[13], 0xFF);
        assert_eq!(snapshot.user_registers[13], 0);
        assert_eq!(snapshot.registers[15], 4);
    }
}
