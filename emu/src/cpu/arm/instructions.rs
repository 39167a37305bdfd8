//! # ARM Instruction Decoding
//!
//! Decoding is a single lookup in a 4096-entry table indexed by twelve opcode bits:
//!
//! ```text
//! key = bits[27:20] ++ bits[7:4]
//!
//!  31   28 27        20 19                  8 7     4 3     0
//! ┌───────┬────────────┬─────────────────────┬───────┬───────┐
//! │ cond  │  key[11:4] │                     │key[3:0]│      │
//! └───────┴────────────┴─────────────────────┴───────┴───────┘
//! ```
//!
//! The table is built once by classifying every possible key, most specific pattern
//! first. Keys matching nothing (coprocessor space, the undefined `011x...1` slot)
//! hold `None`, which the CPU turns into an Undefined Instruction exception.
//!
//! | Key pattern (hi = bits 27-20, lo = bits 7-4) | Instruction            |
//! |-----------------------------------------------|------------------------|
//! | hi=0001_0010, lo=0001                         | BX                     |
//! | hi=0001_0B00, lo=1001                         | SWP / SWPB             |
//! | hi=0000_00AS, lo=1001                         | MUL / MLA              |
//! | hi=0000_1UAS, lo=1001                         | UMULL..SMLAL           |
//! | hi=000P_UIWL, lo=1SH1 (SH != 0)               | LDRH / STRH / LDRS*    |
//! | hi=0001_0P00, lo=0000                         | MRS                    |
//! | hi=00I1_0P10                                  | MSR                    |
//! | hi=00I_opcode_S                               | Data processing        |
//! | hi=01IP_UBWL                                  | LDR / STR              |
//! | hi=100P_USWL                                  | LDM / STM              |
//! | hi=101L_xxxx                                  | B / BL                 |
//! | hi=1111_xxxx                                  | SWI                    |

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::cpu::arm::alu_instruction::ArmModeAluInstruction;

/// Handler class resolved by the decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmInstruction {
    DataProcessing(ArmModeAluInstruction),
    Mrs,
    Msr,
    BranchAndExchange,
    SingleDataSwap,
    Multiply,
    MultiplyLong,
    HalfwordDataTransfer,
    SingleDataTransfer,
    BlockDataTransfer,
    Branch,
    SoftwareInterrupt,
}

const ARM_TABLE_SIZE: usize = 4096;

static ARM_DECODE_TABLE: LazyLock<[Option<ArmInstruction>; ARM_TABLE_SIZE]> =
    LazyLock::new(|| {
        let mut table = [None; ARM_TABLE_SIZE];

        for (key, entry) in table.iter_mut().enumerate() {
            *entry = classify(key as u32);
        }

        table
    });

/// Twelve bit key made of bits 27-20 and 7-4 of `op_code`.
#[must_use]
pub const fn decode_key(op_code: u32) -> usize {
    (((op_code >> 16) & 0xFF0) | ((op_code >> 4) & 0xF)) as usize
}

/// Resolves the handler class of `op_code`, `None` for undefined encodings.
#[must_use]
pub fn decode(op_code: u32) -> Option<ArmInstruction> {
    ARM_DECODE_TABLE[decode_key(op_code)]
}

fn classify(key: u32) -> Option<ArmInstruction> {
    let hi = key >> 4;
    let lo = key & 0xF;

    let instruction = if key == 0x121 {
        ArmInstruction::BranchAndExchange
    } else if hi & 0xFB == 0x10 && lo == 0b1001 {
        ArmInstruction::SingleDataSwap
    } else if hi & 0xFC == 0x00 && lo == 0b1001 {
        ArmInstruction::Multiply
    } else if hi & 0xF8 == 0x08 && lo == 0b1001 {
        ArmInstruction::MultiplyLong
    } else if hi & 0xE0 == 0x00 && lo & 0b1001 == 0b1001 {
        if lo & 0b0110 == 0 {
            // Multiply and swap space left over by the patterns above.
            return None;
        }
        ArmInstruction::HalfwordDataTransfer
    } else if hi & 0xFB == 0x10 && lo == 0 {
        ArmInstruction::Mrs
    } else if (hi & 0xFB == 0x12 && lo == 0) || hi & 0xFB == 0x32 {
        ArmInstruction::Msr
    } else if hi & 0xC0 == 0x00 {
        ArmInstruction::DataProcessing(ArmModeAluInstruction::from(hi >> 1))
    } else if hi & 0xE0 == 0x60 && lo & 1 == 1 {
        return None;
    } else if hi & 0xC0 == 0x40 {
        ArmInstruction::SingleDataTransfer
    } else if hi & 0xE0 == 0x80 {
        ArmInstruction::BlockDataTransfer
    } else if hi & 0xE0 == 0xA0 {
        ArmInstruction::Branch
    } else if hi & 0xF0 == 0xF0 {
        ArmInstruction::SoftwareInterrupt
    } else {
        return None;
    };

    Some(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_data_processing() {
        // MOV r0, #1
        assert_eq!(
            decode(0xE3A0_0001),
            Some(ArmInstruction::DataProcessing(ArmModeAluInstruction::Mov))
        );
        // ADDS r0, r1, r2, LSL r3
        assert_eq!(
            decode(0xE091_0312),
            Some(ArmInstruction::DataProcessing(ArmModeAluInstruction::Add))
        );
        // CMP r0, r0
        assert_eq!(
            decode(0xE150_0000),
            Some(ArmInstruction::DataProcessing(ArmModeAluInstruction::Cmp))
        );
    }

    #[test]
    fn check_special_encodings() {
        assert_eq!(decode(0xE12F_FF11), Some(ArmInstruction::BranchAndExchange));
        assert_eq!(decode(0xE101_0092), Some(ArmInstruction::SingleDataSwap));
        assert_eq!(decode(0xE000_0291), Some(ArmInstruction::Multiply));
        assert_eq!(decode(0xE0C1_0392), Some(ArmInstruction::MultiplyLong));
        assert_eq!(decode(0xE1D0_00B2), Some(ArmInstruction::HalfwordDataTransfer));
        assert_eq!(decode(0xE10F_0000), Some(ArmInstruction::Mrs));
        assert_eq!(decode(0xE129_F000), Some(ArmInstruction::Msr));
        assert_eq!(decode(0xE328_F20F), Some(ArmInstruction::Msr));
    }

    #[test]
    fn check_memory_and_branches() {
        assert_eq!(decode(0xE59F_0004), Some(ArmInstruction::SingleDataTransfer));
        assert_eq!(decode(0xE7910002), Some(ArmInstruction::SingleDataTransfer));
        assert_eq!(decode(0xE92D_4003), Some(ArmInstruction::BlockDataTransfer));
        assert_eq!(decode(0xEAFF_FFFE), Some(ArmInstruction::Branch));
        assert_eq!(decode(0xEB00_0000), Some(ArmInstruction::Branch));
        assert_eq!(decode(0xEF00_0000), Some(ArmInstruction::SoftwareInterrupt));
    }

    #[test]
    fn check_undefined() {
        assert_eq!(decode(0xE600_0010), None);
        // Coprocessor data transfer.
        assert_eq!(decode(0xED90_0000), None);
        assert_eq!(decode(0xEE00_0000), None);
    }

    #[test]
    fn check_table_is_total() {
        let defined = (0..ARM_TABLE_SIZE)
            .filter(|key| ARM_DECODE_TABLE[*key].is_some())
            .count();

        assert!(defined > 3000);
        assert!(defined < ARM_TABLE_SIZE);
    }
}
