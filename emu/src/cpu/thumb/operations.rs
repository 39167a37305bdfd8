use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    ArmModeAluInstruction, add_with_carry, shift, shift_by_register, sub_with_carry,
};
use crate::cpu::arm7tdmi::{Arm7tdmi, InstructionError};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, OperandKind, Offsetting, ReadWriteKind,
    ShiftKind,
};
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
};
use crate::cpu::thumb::instruction::ThumbInstruction;

pub const SIZE_OF_INSTRUCTION: u32 = 2;

/// Low register (R0-R7) held in the three bits starting at `lowest_bit`.
fn low_register(op_code: u16, lowest_bit: u8) -> usize {
    usize::from(op_code.get_bits(lowest_bit..=lowest_bit + 2))
}

impl Arm7tdmi {
    pub(crate) fn execute_thumb(
        &mut self,
        op_code: u16,
        instruction: ThumbInstruction,
    ) -> Result<(), InstructionError> {
        use ThumbInstruction::{
            AddOffsetSp, AddSubtract, AluOp, CondBranch, HiRegisterOpBx, LoadAddress,
            LoadStoreHalfword, LoadStoreImmOffset, LoadStoreRegisterOffset,
            LoadStoreSignExtByteHalfword, LongBranchLink, MoveCompareAddSubtractImm,
            MoveShiftedRegister, MultipleLoadStore, PcRelativeLoad, PushPopReg,
            SoftwareInterrupt, SpRelativeLoadStore, UncondBranch,
        };

        match instruction {
            MoveShiftedRegister => self.move_shifted_reg(op_code),
            AddSubtract => self.add_subtract(op_code),
            MoveCompareAddSubtractImm => self.move_compare_add_sub_imm(op_code),
            AluOp => self.alu_op(op_code),
            HiRegisterOpBx => self.hi_reg_operation_branch_ex(op_code),
            PcRelativeLoad => self.pc_relative_load(op_code),
            LoadStoreRegisterOffset => self.load_store_register_offset(op_code),
            LoadStoreSignExtByteHalfword => self.load_store_sign_extend_byte_halfword(op_code),
            LoadStoreImmOffset => self.load_store_immediate_offset(op_code),
            LoadStoreHalfword => self.load_store_halfword(op_code),
            SpRelativeLoadStore => self.sp_relative_load_store(op_code),
            LoadAddress => self.load_address(op_code),
            AddOffsetSp => self.add_offset_sp(op_code),
            PushPopReg => self.push_pop_register(op_code),
            MultipleLoadStore => self.multiple_load_store(op_code),
            CondBranch => self.cond_branch(op_code),
            SoftwareInterrupt => self.software_interrupt(u32::from(op_code.get_bits(0..=7))),
            UncondBranch => self.uncond_branch(op_code),
            LongBranchLink => self.long_branch_link(op_code),
        }

        Ok(())
    }

    fn move_shifted_reg(&mut self, op_code: u16) {
        let kind = ShiftKind::from(u32::from(op_code.get_bits(11..=12)));
        let offset5 = u32::from(op_code.get_bits(6..=10));
        let source = self.registers.register_at(low_register(op_code, 3));

        let r = shift(kind, offset5, source, self.cpsr.carry_flag());

        self.registers
            .set_register_at(low_register(op_code, 0), r.result);
        self.cpsr.set_carry_flag(r.carry);
        self.cpsr.set_sign_and_zero(r.result);
    }

    fn add_subtract(&mut self, op_code: u16) {
        let rs = self.registers.register_at(low_register(op_code, 3));
        let offset = match OperandKind::from(op_code.get_bit(10)) {
            OperandKind::Immediate => u32::from(op_code.get_bits(6..=8)),
            OperandKind::Register => self.registers.register_at(low_register(op_code, 6)),
        };

        let r = if op_code.get_bit(9) {
            sub_with_carry(rs, offset, true)
        } else {
            add_with_carry(rs, offset, false)
        };

        self.registers
            .set_register_at(low_register(op_code, 0), r.result);
        self.cpsr.set_flags(&r);
    }

    fn move_compare_add_sub_imm(&mut self, op_code: u16) {
        let rd = low_register(op_code, 8);
        let offset = u32::from(op_code.get_bits(0..=7));
        let rd_value = self.registers.register_at(rd);

        match ThumbImmediateOperation::from(op_code.get_bits(11..=12)) {
            ThumbImmediateOperation::Mov => {
                // Same as MOVS Rd, #offset8: C and V are untouched.
                self.registers.set_register_at(rd, offset);
                self.cpsr.set_sign_and_zero(offset);
            }
            ThumbImmediateOperation::Cmp => {
                self.cpsr.set_flags(&sub_with_carry(rd_value, offset, true));
            }
            ThumbImmediateOperation::Add => {
                let r = add_with_carry(rd_value, offset, false);
                self.registers.set_register_at(rd, r.result);
                self.cpsr.set_flags(&r);
            }
            ThumbImmediateOperation::Sub => {
                let r = sub_with_carry(rd_value, offset, true);
                self.registers.set_register_at(rd, r.result);
                self.cpsr.set_flags(&r);
            }
        }
    }

    fn alu_op(&mut self, op_code: u16) {
        let rd = low_register(op_code, 0);
        let rs = self.registers.register_at(low_register(op_code, 3));
        let rd_value = self.registers.register_at(rd);
        let carry = self.cpsr.carry_flag();

        let shift_kind = match ThumbModeAluInstruction::from(op_code.get_bits(6..=9)) {
            ThumbModeAluInstruction::Lsl => Some(ShiftKind::Lsl),
            ThumbModeAluInstruction::Lsr => Some(ShiftKind::Lsr),
            ThumbModeAluInstruction::Asr => Some(ShiftKind::Asr),
            ThumbModeAluInstruction::Ror => Some(ShiftKind::Ror),
            _ => None,
        };

        if let Some(kind) = shift_kind {
            let r = shift_by_register(kind, rs & 0xFF, rd_value, carry);
            self.registers.set_register_at(rd, r.result);
            self.cpsr.set_carry_flag(r.carry);
            self.cpsr.set_sign_and_zero(r.result);
            return;
        }

        // Everything else matches an ARM data processing operation with S set.
        let (alu_instruction, first_op, second_op) =
            match ThumbModeAluInstruction::from(op_code.get_bits(6..=9)) {
                ThumbModeAluInstruction::Mul => {
                    let result = rd_value.wrapping_mul(rs);
                    self.registers.set_register_at(rd, result);
                    self.cpsr.set_sign_and_zero(result);
                    return;
                }
                ThumbModeAluInstruction::And => (ArmModeAluInstruction::And, rd_value, rs),
                ThumbModeAluInstruction::Eor => (ArmModeAluInstruction::Eor, rd_value, rs),
                ThumbModeAluInstruction::Adc => (ArmModeAluInstruction::Adc, rd_value, rs),
                ThumbModeAluInstruction::Sbc => (ArmModeAluInstruction::Sbc, rd_value, rs),
                ThumbModeAluInstruction::Tst => (ArmModeAluInstruction::Tst, rd_value, rs),
                ThumbModeAluInstruction::Neg => (ArmModeAluInstruction::Rsb, rs, 0),
                ThumbModeAluInstruction::Cmp => (ArmModeAluInstruction::Cmp, rd_value, rs),
                ThumbModeAluInstruction::Cmn => (ArmModeAluInstruction::Cmn, rd_value, rs),
                ThumbModeAluInstruction::Orr => (ArmModeAluInstruction::Orr, rd_value, rs),
                ThumbModeAluInstruction::Bic => (ArmModeAluInstruction::Bic, rd_value, rs),
                ThumbModeAluInstruction::Mvn
                | ThumbModeAluInstruction::Lsl
                | ThumbModeAluInstruction::Lsr
                | ThumbModeAluInstruction::Asr
                | ThumbModeAluInstruction::Ror => (ArmModeAluInstruction::Mvn, rd_value, rs),
            };

        let r = self.alu_operation(alu_instruction, first_op, second_op, carry);
        self.cpsr.set_flags(&r);

        if !alu_instruction.is_test() {
            self.registers.set_register_at(rd, r.result);
        }
    }

    fn hi_reg_operation_branch_ex(&mut self, op_code: u16) {
        let rd = low_register(op_code, 0) | (usize::from(op_code.get_bit(7)) << 3);
        let rs = usize::from(op_code.get_bits(3..=6));

        // R15 reads as the address of this instruction + 4.
        let d_value = self.registers.register_at(rd);
        let s_value = self.registers.register_at(rs);

        match ThumbHighRegisterOperation::from(op_code.get_bits(8..=9)) {
            ThumbHighRegisterOperation::Add => {
                self.write_register(rd, d_value.wrapping_add(s_value));
            }
            ThumbHighRegisterOperation::Cmp => {
                self.cpsr.set_flags(&sub_with_carry(d_value, s_value, true));
            }
            ThumbHighRegisterOperation::Mov => self.write_register(rd, s_value),
            ThumbHighRegisterOperation::Bx => {
                self.cpsr.set_cpu_state(CpuState::from(s_value.get_bit(0)));
                self.jump(s_value);
            }
        }
    }

    /// R15 with bit 1 cleared, the base of PC-relative addressing.
    fn word_aligned_pc(&self) -> u32 {
        self.registers.program_counter() & !0b10
    }

    fn pc_relative_load(&mut self, op_code: u16) {
        let offset = u32::from(op_code.get_bits(0..=7)) << 2;
        let address = self.word_aligned_pc().wrapping_add(offset);

        let value = self.bus.read_word(address);
        self.registers
            .set_register_at(low_register(op_code, 8), value);
    }

    fn load_store_register_offset(&mut self, op_code: u16) {
        let ro = self.registers.register_at(low_register(op_code, 6));
        let rb = self.registers.register_at(low_register(op_code, 3));
        let address = rb.wrapping_add(ro);

        self.load_store(
            LoadStoreKind::from(op_code.get_bit(11)),
            ReadWriteKind::from(op_code.get_bit(10)),
            address,
            low_register(op_code, 0),
        );
    }

    /// Word and byte transfers of formats 7 and 9.
    fn load_store(
        &mut self,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        address: u32,
        rd: usize,
    ) {
        match (load_store, byte_word) {
            (LoadStoreKind::Store, ReadWriteKind::Byte) => {
                let value = self.registers.register_at(rd) as u8;
                self.bus.write_byte(address, value);
            }
            (LoadStoreKind::Store, ReadWriteKind::Word) => {
                let value = self.registers.register_at(rd);
                self.bus.write_word(address, value);
            }
            (LoadStoreKind::Load, ReadWriteKind::Byte) => {
                let value = u32::from(self.bus.read_byte(address));
                self.registers.set_register_at(rd, value);
            }
            (LoadStoreKind::Load, ReadWriteKind::Word) => {
                let value = self.read_word_rotated(address);
                self.registers.set_register_at(rd, value);
            }
        }
    }

    fn load_store_sign_extend_byte_halfword(&mut self, op_code: u16) {
        let offset = self.registers.register_at(low_register(op_code, 6));
        let base = self.registers.register_at(low_register(op_code, 3));
        let address = base.wrapping_add(offset);
        let rd = low_register(op_code, 0);

        // S (bit 10) and H (bit 11).
        let kind = match (op_code.get_bit(10), op_code.get_bit(11)) {
            (false, false) => {
                let value = self.registers.register_at(rd) as u16;
                self.bus.write_half_word(address, value);
                return;
            }
            (false, true) => HalfwordTransferKind::UnsignedHalfwords,
            (true, false) => HalfwordTransferKind::SignedByte,
            (true, true) => HalfwordTransferKind::SignedHalfwords,
        };

        let value = self.load_halfword_kind(kind, address);
        self.registers.set_register_at(rd, value);
    }

    fn load_store_immediate_offset(&mut self, op_code: u16) {
        let byte_word = ReadWriteKind::from(op_code.get_bit(12));
        let offset5 = u32::from(op_code.get_bits(6..=10));
        let offset = match byte_word {
            ReadWriteKind::Word => offset5 << 2,
            ReadWriteKind::Byte => offset5,
        };

        let base = self.registers.register_at(low_register(op_code, 3));

        self.load_store(
            LoadStoreKind::from(op_code.get_bit(11)),
            byte_word,
            base.wrapping_add(offset),
            low_register(op_code, 0),
        );
    }

    fn load_store_halfword(&mut self, op_code: u16) {
        let offset = u32::from(op_code.get_bits(6..=10)) << 1;
        let base = self.registers.register_at(low_register(op_code, 3));
        let address = base.wrapping_add(offset);
        let rd = low_register(op_code, 0);

        match LoadStoreKind::from(op_code.get_bit(11)) {
            LoadStoreKind::Load => {
                let value =
                    self.load_halfword_kind(HalfwordTransferKind::UnsignedHalfwords, address);
                self.registers.set_register_at(rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.registers.register_at(rd) as u16;
                self.bus.write_half_word(address, value);
            }
        }
    }

    fn sp_relative_load_store(&mut self, op_code: u16) {
        let offset = u32::from(op_code.get_bits(0..=7)) << 2;
        let address = self.registers.register_at(REG_SP).wrapping_add(offset);

        self.load_store(
            LoadStoreKind::from(op_code.get_bit(11)),
            ReadWriteKind::Word,
            address,
            low_register(op_code, 8),
        );
    }

    fn load_address(&mut self, op_code: u16) {
        let offset = u32::from(op_code.get_bits(0..=7)) << 2;
        let base = if op_code.get_bit(11) {
            self.registers.register_at(REG_SP)
        } else {
            self.word_aligned_pc()
        };

        self.registers
            .set_register_at(low_register(op_code, 8), base.wrapping_add(offset));
    }

    fn add_offset_sp(&mut self, op_code: u16) {
        let offset = u32::from(op_code.get_bits(0..=6)) << 2;
        let sp = self.registers.register_at(REG_SP);

        let new_sp = if op_code.get_bit(7) {
            sp.wrapping_sub(offset)
        } else {
            sp.wrapping_add(offset)
        };

        self.registers.set_register_at(REG_SP, new_sp);
    }

    /// PUSH is `STMDB sp!` with LR as the optional extra register, POP is
    /// `LDMIA sp!` with PC.
    fn push_pop_register(&mut self, op_code: u16) {
        let load_store = LoadStoreKind::from(op_code.get_bit(11));
        let mut register_list = op_code.get_bits(0..=7);

        let (indexing, offsetting) = match load_store {
            LoadStoreKind::Store => {
                register_list.set_bit(REG_LR as u8, op_code.get_bit(8));
                (Indexing::Pre, Offsetting::Down)
            }
            LoadStoreKind::Load => {
                register_list.set_bit(REG_PROGRAM_COUNTER as u8, op_code.get_bit(8));
                (Indexing::Post, Offsetting::Up)
            }
        };

        let loaded_pc = self.transfer_block(
            REG_SP,
            register_list,
            indexing,
            offsetting,
            true,
            load_store,
        );

        if let Some(target) = loaded_pc {
            self.jump(target);
        }
    }

    fn multiple_load_store(&mut self, op_code: u16) {
        let loaded_pc = self.transfer_block(
            low_register(op_code, 8),
            op_code.get_bits(0..=7),
            Indexing::Post,
            Offsetting::Up,
            true,
            LoadStoreKind::from(op_code.get_bit(11)),
        );

        // Only an empty list reaches R15.
        if let Some(target) = loaded_pc {
            self.jump(target);
        }
    }

    fn cond_branch(&mut self, op_code: u16) {
        let condition = Condition::from(op_code.get_bits(8..=11) as u8);

        if self.cpsr.can_execute(condition) {
            let offset = (u32::from(op_code.get_bits(0..=7)) << 1).sign_extended(9);
            let pc = self.registers.program_counter();

            self.jump(pc.wrapping_add(offset));
        }
    }

    fn uncond_branch(&mut self, op_code: u16) {
        let offset = (u32::from(op_code.get_bits(0..=10)) << 1).sign_extended(12);
        let pc = self.registers.program_counter();

        self.jump(pc.wrapping_add(offset));
    }

    fn long_branch_link(&mut self, op_code: u16) {
        let offset = u32::from(op_code.get_bits(0..=10));
        let pc = self.registers.program_counter();

        if op_code.get_bit(11) {
            let next_instruction = pc.wrapping_sub(SIZE_OF_INSTRUCTION);
            let target = self.registers.register_at(REG_LR).wrapping_add(offset << 1);

            self.registers
                .set_register_at(REG_LR, next_instruction | 1);
            self.jump(target);
        } else {
            let offset = (offset << 12).sign_extended(23);
            self.registers
                .set_register_at(REG_LR, pc.wrapping_add(offset));
        }
    }
}
