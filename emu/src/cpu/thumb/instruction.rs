//! # Thumb Instruction Decoding
//!
//! Thumb instructions are grouped into 19 formats, identified by their high bits.
//! Every discriminating bit lives in bits 15-6, so decoding is a lookup in a
//! 1024-entry table indexed by `op_code >> 6`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Thumb Instruction Formats                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Format 1:  000 xx          Move shifted register                       │
//! │  Format 2:  00011           Add/subtract                                │
//! │  Format 3:  001 xx          Move/compare/add/subtract immediate         │
//! │  Format 4:  010000          ALU operations                              │
//! │  Format 5:  010001          Hi register operations / BX                 │
//! │  Format 6:  01001           PC-relative load                            │
//! │  Format 7:  0101 xx0        Load/store with register offset             │
//! │  Format 8:  0101 xx1        Load/store sign-extended byte/halfword      │
//! │  Format 9:  011 xx          Load/store with immediate offset            │
//! │  Format 10: 1000 x          Load/store halfword                         │
//! │  Format 11: 1001 x          SP-relative load/store                      │
//! │  Format 12: 1010 x          Load address                                │
//! │  Format 13: 10110000        Add offset to stack pointer                 │
//! │  Format 14: 1011 x10x       Push/pop registers                          │
//! │  Format 15: 1100 x          Multiple load/store                         │
//! │  Format 16: 1101 xxxx       Conditional branch                          │
//! │  Format 17: 11011111        Software interrupt                          │
//! │  Format 18: 11100           Unconditional branch                        │
//! │  Format 19: 1111 x          Long branch with link                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Long Branch (BL)
//!
//! The BL instruction spans ±4MB but requires two 16-bit instructions:
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = old_PC | 1
//! ```

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbInstruction {
    MoveShiftedRegister,
    AddSubtract,
    MoveCompareAddSubtractImm,
    AluOp,
    HiRegisterOpBx,
    PcRelativeLoad,
    LoadStoreRegisterOffset,
    LoadStoreSignExtByteHalfword,
    LoadStoreImmOffset,
    LoadStoreHalfword,
    SpRelativeLoadStore,
    LoadAddress,
    AddOffsetSp,
    PushPopReg,
    MultipleLoadStore,
    CondBranch,
    SoftwareInterrupt,
    UncondBranch,
    LongBranchLink,
}

const THUMB_TABLE_SIZE: usize = 1024;

static THUMB_DECODE_TABLE: LazyLock<[Option<ThumbInstruction>; THUMB_TABLE_SIZE]> =
    LazyLock::new(|| {
        let mut table = [None; THUMB_TABLE_SIZE];

        for (key, entry) in table.iter_mut().enumerate() {
            *entry = classify((key as u16) << 6);
        }

        table
    });

/// Resolves the format of `op_code`, `None` for undefined encodings.
#[must_use]
pub fn decode(op_code: u16) -> Option<ThumbInstruction> {
    THUMB_DECODE_TABLE[usize::from(op_code >> 6)]
}

/// Classifies an opcode whose bits 5-0 are clear.
fn classify(op_code: u16) -> Option<ThumbInstruction> {
    use ThumbInstruction::{
        AddOffsetSp, AddSubtract, AluOp, CondBranch, HiRegisterOpBx, LoadAddress,
        LoadStoreHalfword, LoadStoreImmOffset, LoadStoreRegisterOffset,
        LoadStoreSignExtByteHalfword, LongBranchLink, MoveCompareAddSubtractImm,
        MoveShiftedRegister, MultipleLoadStore, PcRelativeLoad, PushPopReg, SoftwareInterrupt,
        SpRelativeLoadStore, UncondBranch,
    };

    let instruction = if op_code.get_bits(8..=15) == 0b1101_1111 {
        SoftwareInterrupt
    } else if op_code.get_bits(8..=15) == 0b1011_0000 {
        AddOffsetSp
    } else if op_code.get_bits(10..=15) == 0b01_0000 {
        AluOp
    } else if op_code.get_bits(10..=15) == 0b01_0001 {
        HiRegisterOpBx
    } else if op_code.get_bits(12..=15) == 0b1011 && op_code.get_bits(9..=10) == 0b10 {
        PushPopReg
    } else if op_code.get_bits(11..=15) == 0b00011 {
        AddSubtract
    } else if op_code.get_bits(11..=15) == 0b01001 {
        PcRelativeLoad
    } else if op_code.get_bits(12..=15) == 0b0101 {
        if op_code.get_bit(9) {
            LoadStoreSignExtByteHalfword
        } else {
            LoadStoreRegisterOffset
        }
    } else if op_code.get_bits(11..=15) == 0b11100 {
        UncondBranch
    } else if op_code.get_bits(12..=15) == 0b1000 {
        LoadStoreHalfword
    } else if op_code.get_bits(12..=15) == 0b1001 {
        SpRelativeLoadStore
    } else if op_code.get_bits(12..=15) == 0b1010 {
        LoadAddress
    } else if op_code.get_bits(12..=15) == 0b1100 {
        MultipleLoadStore
    } else if op_code.get_bits(12..=15) == 0b1101 {
        // Condition AL is not a valid branch condition here.
        if op_code.get_bits(8..=11) == 0b1110 {
            return None;
        }
        CondBranch
    } else if op_code.get_bits(12..=15) == 0b1111 {
        LongBranchLink
    } else if op_code.get_bits(13..=15) == 0b000 {
        MoveShiftedRegister
    } else if op_code.get_bits(13..=15) == 0b001 {
        MoveCompareAddSubtractImm
    } else if op_code.get_bits(13..=15) == 0b011 {
        LoadStoreImmOffset
    } else {
        // Remaining 0xBxxx space and the ARMv5 BLX suffix.
        return None;
    };

    Some(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_shifts_and_arithmetic() {
        // LSL r0, r1, #2
        assert_eq!(decode(0x0088), Some(ThumbInstruction::MoveShiftedRegister));
        // ASR r0, r1, #32
        assert_eq!(decode(0x1008), Some(ThumbInstruction::MoveShiftedRegister));
        // ADD r0, r1, r2
        assert_eq!(decode(0x1888), Some(ThumbInstruction::AddSubtract));
        // SUB r0, r1, #1
        assert_eq!(decode(0x1E48), Some(ThumbInstruction::AddSubtract));
        // MOV r0, #0xFF
        assert_eq!(decode(0x20FF), Some(ThumbInstruction::MoveCompareAddSubtractImm));
    }

    #[test]
    fn decode_alu_and_hi_register_operation() {
        // BIC r0, r1
        assert_eq!(decode(0x4388), Some(ThumbInstruction::AluOp));
        // MUL r0, r1
        assert_eq!(decode(0x4348), Some(ThumbInstruction::AluOp));
        // MOV r8, r0
        assert_eq!(decode(0x4680), Some(ThumbInstruction::HiRegisterOpBx));
        // BX lr
        assert_eq!(decode(0x4770), Some(ThumbInstruction::HiRegisterOpBx));
    }

    #[test]
    fn decode_loads_and_stores() {
        // LDR r0, [pc, #4]
        assert_eq!(decode(0x4801), Some(ThumbInstruction::PcRelativeLoad));
        // STR r0, [r1, r2]
        assert_eq!(decode(0x5088), Some(ThumbInstruction::LoadStoreRegisterOffset));
        // LDSH r0, [r1, r2]
        assert_eq!(
            decode(0x5E88),
            Some(ThumbInstruction::LoadStoreSignExtByteHalfword)
        );
        // LDRB r0, [r1, #1]
        assert_eq!(decode(0x7848), Some(ThumbInstruction::LoadStoreImmOffset));
        // STRH r0, [r1, #2]
        assert_eq!(decode(0x8048), Some(ThumbInstruction::LoadStoreHalfword));
        // LDR r0, [sp, #4]
        assert_eq!(decode(0x9801), Some(ThumbInstruction::SpRelativeLoadStore));
        // ADD r0, sp, #4
        assert_eq!(decode(0xA801), Some(ThumbInstruction::LoadAddress));
        // LDMIA r0!, {r1, r2}
        assert_eq!(decode(0xC806), Some(ThumbInstruction::MultipleLoadStore));
    }

    #[test]
    fn decode_stack_operations() {
        // ADD sp, #-8
        assert_eq!(decode(0xB082), Some(ThumbInstruction::AddOffsetSp));
        // PUSH {r0, lr}
        assert_eq!(decode(0xB501), Some(ThumbInstruction::PushPopReg));
        // POP {r0, pc}
        assert_eq!(decode(0xBD01), Some(ThumbInstruction::PushPopReg));
    }

    #[test]
    fn decode_branches() {
        // BEQ -4
        assert_eq!(decode(0xD0FE), Some(ThumbInstruction::CondBranch));
        assert_eq!(decode(0xDF00), Some(ThumbInstruction::SoftwareInterrupt));
        assert_eq!(decode(0xE7FE), Some(ThumbInstruction::UncondBranch));
        assert_eq!(decode(0xF000), Some(ThumbInstruction::LongBranchLink));
        assert_eq!(decode(0xF800), Some(ThumbInstruction::LongBranchLink));
    }

    #[test]
    fn decode_undefined() {
        assert_eq!(decode(0xDE00), None);
        assert_eq!(decode(0xB100), None);
        assert_eq!(decode(0xE800), None);
    }
}
