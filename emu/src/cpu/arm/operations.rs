use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    ArithmeticOpResult, ArmModeAluInstruction, add_with_carry, rotate_immediate, shift,
    shift_by_register, sub_with_carry,
};
use crate::cpu::arm::instructions::ArmInstruction;
use crate::cpu::arm7tdmi::{Arm7tdmi, InstructionError};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, OperandKind, Offsetting, ReadWriteKind,
    ShiftKind,
};
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

pub const SIZE_OF_INSTRUCTION: u32 = 4;

/// Control, extension, status and flags byte of a PSR, selected by MSR bits 16-19.
const PSR_FIELD_MASKS: [(u8, u32); 4] = [
    (16, 0x0000_00FF),
    (17, 0x0000_FF00),
    (18, 0x00FF_0000),
    (19, 0xFF00_0000),
];

impl Arm7tdmi {
    pub(crate) fn execute_arm(
        &mut self,
        op_code: u32,
        instruction: ArmInstruction,
    ) -> Result<(), InstructionError> {
        match instruction {
            ArmInstruction::DataProcessing(alu_instruction) => {
                self.data_processing(op_code, alu_instruction)
            }
            ArmInstruction::Mrs => {
                self.mrs(op_code);
                Ok(())
            }
            ArmInstruction::Msr => self.msr(op_code),
            ArmInstruction::BranchAndExchange => {
                self.branch_and_exchange(op_code);
                Ok(())
            }
            ArmInstruction::SingleDataSwap => {
                self.single_data_swap(op_code);
                Ok(())
            }
            ArmInstruction::Multiply => {
                self.multiply(op_code);
                Ok(())
            }
            ArmInstruction::MultiplyLong => {
                self.multiply_long(op_code);
                Ok(())
            }
            ArmInstruction::HalfwordDataTransfer => self.halfword_data_transfer(op_code),
            ArmInstruction::SingleDataTransfer => {
                self.single_data_transfer(op_code);
                Ok(())
            }
            ArmInstruction::BlockDataTransfer => {
                self.block_data_transfer(op_code);
                Ok(())
            }
            ArmInstruction::Branch => {
                self.branch(op_code);
                Ok(())
            }
            ArmInstruction::SoftwareInterrupt => {
                self.software_interrupt(op_code.get_bits(0..=23));
                Ok(())
            }
        }
    }

    fn register_field(&self, op_code: u32, lowest_bit: u8) -> u32 {
        self.registers
            .register_at(op_code.get_bits(lowest_bit..=lowest_bit + 3) as usize)
    }

    /// Value of `reg`, R15 reading `extra` bytes past its current value.
    pub(crate) fn register_with_pc_offset(&self, reg: usize, extra: u32) -> u32 {
        let value = self.registers.register_at(reg);

        if reg == REG_PROGRAM_COUNTER {
            value.wrapping_add(extra)
        } else {
            value
        }
    }

    /// Word load, misaligned addresses rotate the aligned word.
    pub(crate) fn read_word_rotated(&self, address: u32) -> u32 {
        self.bus
            .read_word(address)
            .rotate_right((address & 0b11) * 8)
    }

    /// Runs an ALU operation. Logical operations take C from `shifter_carry`.
    pub(crate) fn alu_operation(
        &self,
        alu_instruction: ArmModeAluInstruction,
        first_op: u32,
        second_op: u32,
        shifter_carry: bool,
    ) -> ArithmeticOpResult {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };

        let carry = self.cpsr.carry_flag();
        let overflow = self.cpsr.overflow_flag();

        match alu_instruction {
            And | Tst => ArithmeticOpResult::logical(first_op & second_op, shifter_carry, overflow),
            Eor | Teq => ArithmeticOpResult::logical(first_op ^ second_op, shifter_carry, overflow),
            Orr => ArithmeticOpResult::logical(first_op | second_op, shifter_carry, overflow),
            Mov => ArithmeticOpResult::logical(second_op, shifter_carry, overflow),
            Bic => ArithmeticOpResult::logical(first_op & !second_op, shifter_carry, overflow),
            Mvn => ArithmeticOpResult::logical(!second_op, shifter_carry, overflow),
            Sub | Cmp => sub_with_carry(first_op, second_op, true),
            Rsb => sub_with_carry(second_op, first_op, true),
            Add | Cmn => add_with_carry(first_op, second_op, false),
            Adc => add_with_carry(first_op, second_op, carry),
            Sbc => sub_with_carry(first_op, second_op, carry),
            Rsc => sub_with_carry(second_op, first_op, carry),
        }
    }

    /// Operand2 of data processing with the shifter carry-out.
    fn shifter_operand(&self, op_code: u32) -> ArithmeticOpResult {
        let carry = self.cpsr.carry_flag();

        match OperandKind::from(op_code.get_bit(25)) {
            OperandKind::Immediate => {
                rotate_immediate(op_code.get_bits(0..=7), op_code.get_bits(8..=11), carry)
            }
            OperandKind::Register => {
                let kind = ShiftKind::from(op_code.get_bits(5..=6));
                let rm = op_code.get_bits(0..=3) as usize;

                if op_code.get_bit(4) {
                    // The register shift takes an extra cycle, R15 has moved one more word.
                    let amount = self.register_field(op_code, 8);
                    shift_by_register(kind, amount, self.register_with_pc_offset(rm, 4), carry)
                } else {
                    shift(
                        kind,
                        op_code.get_bits(7..=11),
                        self.registers.register_at(rm),
                        carry,
                    )
                }
            }
        }
    }

    fn data_processing(
        &mut self,
        op_code: u32,
        alu_instruction: ArmModeAluInstruction,
    ) -> Result<(), InstructionError> {
        let set_conditions = op_code.get_bit(20);

        // Without S these encodings belong to MRS/MSR, the leftovers are undefined.
        if alu_instruction.is_test() && !set_conditions {
            return Err(InstructionError::InvalidOpcode);
        }

        let rn = op_code.get_bits(16..=19) as usize;
        let rd = op_code.get_bits(12..=15) as usize;
        let register_shift =
            OperandKind::from(op_code.get_bit(25)) == OperandKind::Register && op_code.get_bit(4);

        let first_op = self.register_with_pc_offset(rn, if register_shift { 4 } else { 0 });
        let shifter = self.shifter_operand(op_code);
        let outcome = self.alu_operation(alu_instruction, first_op, shifter.result, shifter.carry);

        if set_conditions {
            if rd == REG_PROGRAM_COUNTER && !alu_instruction.is_test() {
                // Exception return: the mode and state come back before the jump.
                self.restore_cpsr_from_spsr();
            } else {
                self.cpsr.set_flags(&outcome);
            }
        }

        if !alu_instruction.is_test() {
            self.write_register(rd, outcome.result);
        }

        Ok(())
    }

    fn mrs(&mut self, op_code: u32) {
        let psr = if op_code.get_bit(22) {
            self.spsr()
        } else {
            self.cpsr
        };

        self.write_register(op_code.get_bits(12..=15) as usize, psr.into());
    }

    fn msr(&mut self, op_code: u32) -> Result<(), InstructionError> {
        let operand = match OperandKind::from(op_code.get_bit(25)) {
            OperandKind::Immediate => {
                rotate_immediate(
                    op_code.get_bits(0..=7),
                    op_code.get_bits(8..=11),
                    self.cpsr.carry_flag(),
                )
                .result
            }
            OperandKind::Register => self.register_field(op_code, 0),
        };

        let mut mask = PSR_FIELD_MASKS
            .iter()
            .filter(|(bit, _)| op_code.get_bit(*bit))
            .fold(0, |mask, (_, field)| mask | field);

        // User mode can only change the flags.
        if self.cpsr.mode().canonical() == Mode::User {
            mask &= 0xFF00_0000;
        }

        if op_code.get_bit(22) {
            if !self.cpsr.mode().has_spsr() {
                return Ok(());
            }

            let value = (u32::from(self.spsr()) & !mask) | (operand & mask);
            let spsr = Psr::try_from(value).map_err(InstructionError::UndefinedMode)?;
            self.set_spsr(spsr);

            Ok(())
        } else {
            // The T bit only changes through BX and exception entry/return.
            mask.set_bit_off(5);

            let value = (u32::from(self.cpsr) & !mask) | (operand & mask);
            self.set_cpsr_raw(value)
        }
    }

    fn branch_and_exchange(&mut self, op_code: u32) {
        let target = self.register_field(op_code, 0);

        self.cpsr.set_cpu_state(CpuState::from(target.get_bit(0)));
        self.jump(target);
    }

    fn single_data_swap(&mut self, op_code: u32) {
        let address = self.register_field(op_code, 16);
        let source = self.register_field(op_code, 0);
        let rd = op_code.get_bits(12..=15) as usize;

        let loaded = match ReadWriteKind::from(op_code.get_bit(22)) {
            ReadWriteKind::Byte => {
                let loaded = u32::from(self.bus.read_byte(address));
                self.bus.write_byte(address, source as u8);
                loaded
            }
            ReadWriteKind::Word => {
                let loaded = self.read_word_rotated(address);
                self.bus.write_word(address, source);
                loaded
            }
        };

        self.write_register(rd, loaded);
    }

    fn multiply(&mut self, op_code: u32) {
        let rd = op_code.get_bits(16..=19) as usize;
        let mut result = self
            .register_field(op_code, 0)
            .wrapping_mul(self.register_field(op_code, 8));

        if op_code.get_bit(21) {
            result = result.wrapping_add(self.register_field(op_code, 12));
        }

        if op_code.get_bit(20) {
            self.cpsr.set_sign_and_zero(result);
        }

        self.write_register(rd, result);
    }

    fn multiply_long(&mut self, op_code: u32) {
        let rd_hi = op_code.get_bits(16..=19) as usize;
        let rd_lo = op_code.get_bits(12..=15) as usize;
        let rm = self.register_field(op_code, 0);
        let rs = self.register_field(op_code, 8);

        let mut result = if op_code.get_bit(22) {
            (i64::from(rm as i32) * i64::from(rs as i32)) as u64
        } else {
            u64::from(rm) * u64::from(rs)
        };

        if op_code.get_bit(21) {
            let accumulator = (u64::from(self.registers.register_at(rd_hi)) << 32)
                | u64::from(self.registers.register_at(rd_lo));
            result = result.wrapping_add(accumulator);
        }

        if op_code.get_bit(20) {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }

        self.write_register(rd_lo, result as u32);
        self.write_register(rd_hi, (result >> 32) as u32);
    }

    /// Value stored by STR/STM: R15 reads one instruction further than for ALU operands.
    fn store_value(&self, reg: usize) -> u32 {
        let extra = match self.cpsr.cpu_state() {
            CpuState::Arm => SIZE_OF_INSTRUCTION,
            CpuState::Thumb => 2,
        };

        self.register_with_pc_offset(reg, extra)
    }

    fn single_data_transfer(&mut self, op_code: u32) {
        let indexing = Indexing::from(op_code.get_bit(24));
        let offsetting = Offsetting::from(op_code.get_bit(23));
        let size = ReadWriteKind::from(op_code.get_bit(22));
        let write_back = op_code.get_bit(21);
        let load_store = LoadStoreKind::from(op_code.get_bit(20));
        let rn = op_code.get_bits(16..=19) as usize;
        let rd = op_code.get_bits(12..=15) as usize;

        // Bit 25 set selects a register offset, shifted by an immediate amount.
        let offset = if op_code.get_bit(25) {
            shift(
                ShiftKind::from(op_code.get_bits(5..=6)),
                op_code.get_bits(7..=11),
                self.register_field(op_code, 0),
                self.cpsr.carry_flag(),
            )
            .result
        } else {
            op_code.get_bits(0..=11)
        };

        let base = self.registers.register_at(rn);
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        // Post-indexed transfers always write back.
        let write_back = write_back || indexing == Indexing::Post;

        match load_store {
            LoadStoreKind::Load => {
                let value = match size {
                    ReadWriteKind::Word => self.read_word_rotated(address),
                    ReadWriteKind::Byte => u32::from(self.bus.read_byte(address)),
                };

                if write_back && rn != rd {
                    self.write_register(rn, offset_address);
                }
                self.write_register(rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.store_value(rd);

                match size {
                    ReadWriteKind::Word => self.bus.write_word(address, value),
                    ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
                }

                if write_back {
                    self.write_register(rn, offset_address);
                }
            }
        }
    }

    fn halfword_data_transfer(&mut self, op_code: u32) -> Result<(), InstructionError> {
        let kind = HalfwordTransferKind::try_from(op_code.get_bits(5..=6))
            .map_err(|()| InstructionError::InvalidOpcode)?;
        let indexing = Indexing::from(op_code.get_bit(24));
        let offsetting = Offsetting::from(op_code.get_bit(23));
        let write_back = op_code.get_bit(21) || indexing == Indexing::Post;
        let load_store = LoadStoreKind::from(op_code.get_bit(20));
        let rn = op_code.get_bits(16..=19) as usize;
        let rd = op_code.get_bits(12..=15) as usize;

        let offset = match OperandKind::from(op_code.get_bit(22)) {
            OperandKind::Immediate => (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
            OperandKind::Register => self.register_field(op_code, 0),
        };

        let base = self.registers.register_at(rn);
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };

        match load_store {
            LoadStoreKind::Load => {
                let value = self.load_halfword_kind(kind, address);

                if write_back && rn != rd {
                    self.write_register(rn, offset_address);
                }
                self.write_register(rd, value);
            }
            LoadStoreKind::Store => {
                // Signed stores do not exist on ARMv4.
                if kind != HalfwordTransferKind::UnsignedHalfwords {
                    return Err(InstructionError::InvalidOpcode);
                }

                self.bus
                    .write_half_word(address, self.store_value(rd) as u16);

                if write_back {
                    self.write_register(rn, offset_address);
                }
            }
        }

        Ok(())
    }

    /// LDRH, LDRSB and LDRSH loads, shared with Thumb.
    pub(crate) fn load_halfword_kind(&self, kind: HalfwordTransferKind, address: u32) -> u32 {
        match kind {
            HalfwordTransferKind::UnsignedHalfwords => {
                u32::from(self.bus.read_half_word(address)).rotate_right((address & 1) * 8)
            }
            HalfwordTransferKind::SignedByte => {
                u32::from(self.bus.read_byte(address)).sign_extended(8)
            }
            // A misaligned LDRSH loads the addressed byte only.
            HalfwordTransferKind::SignedHalfwords if address.get_bit(0) => {
                u32::from(self.bus.read_byte(address)).sign_extended(8)
            }
            HalfwordTransferKind::SignedHalfwords => {
                u32::from(self.bus.read_half_word(address)).sign_extended(16)
            }
        }
    }

    fn block_data_transfer(&mut self, op_code: u32) {
        let indexing = Indexing::from(op_code.get_bit(24));
        let offsetting = Offsetting::from(op_code.get_bit(23));
        let psr_or_user_bank = op_code.get_bit(22);
        let write_back = op_code.get_bit(21);
        let load_store = LoadStoreKind::from(op_code.get_bit(20));
        let rn = op_code.get_bits(16..=19) as usize;
        let register_list = op_code.get_bits(0..=15) as u16;

        // An empty list moves R15.
        let loads_pc = load_store == LoadStoreKind::Load
            && (register_list.get_bit(15) || register_list == 0);
        // S without R15 in an LDM (or any STM with S) moves the User bank.
        let user_bank = psr_or_user_bank && !loads_pc;
        let current_mode = self.cpsr.mode();
        if user_bank {
            self.change_mode(Mode::User);
        }

        let loaded_pc = self.transfer_block(
            rn,
            register_list,
            indexing,
            offsetting,
            write_back,
            load_store,
        );

        if user_bank {
            self.change_mode(current_mode);
        }

        if let Some(target) = loaded_pc {
            if psr_or_user_bank {
                self.restore_cpsr_from_spsr();
            }
            self.jump(target);
        }
    }

    /// Moves the words of a block transfer and writes the base back, shared by
    /// LDM/STM and the Thumb PUSH/POP/LDMIA/STMIA formats.
    ///
    /// Returns the word loaded into R15, the caller decides how to jump.
    pub(crate) fn transfer_block(
        &mut self,
        rn: usize,
        register_list: u16,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
    ) -> Option<u32> {
        let transfer = BlockTransfer::new(
            self.registers.register_at(rn),
            register_list,
            indexing,
            offsetting,
        );

        let mut loaded_pc = None;
        for (index, (reg, address)) in transfer.slots().enumerate() {
            match load_store {
                LoadStoreKind::Load => {
                    let value = self.bus.read_word(address);
                    if reg == REG_PROGRAM_COUNTER {
                        loaded_pc = Some(value);
                    } else {
                        self.registers.set_register_at(reg, value);
                    }
                }
                LoadStoreKind::Store => {
                    // Only a base stored first keeps its old value.
                    let value = if reg == rn && index != 0 && write_back {
                        transfer.final_base
                    } else {
                        self.store_value(reg)
                    };
                    self.bus.write_word(address, value);
                }
            }
        }

        let base_loaded = load_store == LoadStoreKind::Load && register_list.get_bit(rn as u8);
        if write_back && !base_loaded {
            self.write_register(rn, transfer.final_base);
        }

        loaded_pc
    }

    fn branch(&mut self, op_code: u32) {
        let offset = (op_code.get_bits(0..=23) << 2).sign_extended(26);
        let pc = self.registers.program_counter();

        if op_code.get_bit(24) {
            self.registers
                .set_register_at(REG_LR, pc.wrapping_sub(SIZE_OF_INSTRUCTION));
        }

        self.jump(pc.wrapping_add(offset));
    }
}

/// Addresses touched by a block transfer. Registers always go from the lowest
/// address up, whatever the direction of the base update.
struct BlockTransfer {
    registers: Vec<usize>,
    start_address: u32,
    final_base: u32,
}

impl BlockTransfer {
    /// An empty list moves R15 alone but adjusts the base as if all 16 registers
    /// were transferred.
    fn new(base: u32, register_list: u16, indexing: Indexing, offsetting: Offsetting) -> Self {
        let (registers, size) = match register_list.count_bits_on() {
            0 => (vec![REG_PROGRAM_COUNTER], 0x40),
            count => (
                (0..16)
                    .filter(|reg| register_list.get_bit(*reg as u8))
                    .collect(),
                count * 4,
            ),
        };

        let start_address = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Pre) => base.wrapping_add(4),
            (Offsetting::Up, Indexing::Post) => base,
            (Offsetting::Down, Indexing::Pre) => base.wrapping_sub(size),
            (Offsetting::Down, Indexing::Post) => base.wrapping_sub(size).wrapping_add(4),
        };

        Self {
            registers,
            start_address,
            final_base: offsetting.apply(base, size),
        }
    }

    /// Register and address of every word moved, lowest address first.
    fn slots(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.registers
            .iter()
            .zip((0..).map(|index: u32| self.start_address.wrapping_add(index * 4)))
            .map(|(reg, address)| (*reg, address))
    }
}
