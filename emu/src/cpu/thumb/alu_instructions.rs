use serde::{Deserialize, Serialize};

/// Format 4 operations, bits 6-9.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Lsl = 0x2,
    Lsr = 0x3,
    Asr = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Ror = 0x7,
    Tst = 0x8,
    Neg = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mul = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl ThumbModeAluInstruction {
    const TABLE: [Self; 16] = [
        Self::And,
        Self::Eor,
        Self::Lsl,
        Self::Lsr,
        Self::Asr,
        Self::Adc,
        Self::Sbc,
        Self::Ror,
        Self::Tst,
        Self::Neg,
        Self::Cmp,
        Self::Cmn,
        Self::Orr,
        Self::Mul,
        Self::Bic,
        Self::Mvn,
    ];
}

impl From<u16> for ThumbModeAluInstruction {
    /// Only the low nibble is looked at.
    fn from(alu_op_code: u16) -> Self {
        Self::TABLE[usize::from(alu_op_code & 0xF)]
    }
}

/// Format 5 operations, bits 8-9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbHighRegisterOperation {
    Add,
    Cmp,
    Mov,
    Bx,
}

impl From<u16> for ThumbHighRegisterOperation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0 => Self::Add,
            1 => Self::Cmp,
            2 => Self::Mov,
            _ => Self::Bx,
        }
    }
}

/// Format 3 operations, bits 11-12.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbImmediateOperation {
    Mov,
    Cmp,
    Add,
    Sub,
}

impl From<u16> for ThumbImmediateOperation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0 => Self::Mov,
            1 => Self::Cmp,
            2 => Self::Add,
            _ => Self::Sub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_alu_table_matches_discriminants() {
        for op_code in 0..16_u16 {
            let op = ThumbModeAluInstruction::from(op_code);
            assert_eq!(op as u16, op_code);
        }

        // Upper bits of the field are ignored.
        assert_eq!(
            ThumbModeAluInstruction::from(0x1E),
            ThumbModeAluInstruction::Bic
        );
    }

    #[test]
    fn check_high_register_and_immediate_operations() {
        assert_eq!(
            ThumbHighRegisterOperation::from(0b11),
            ThumbHighRegisterOperation::Bx
        );
        assert_eq!(
            ThumbImmediateOperation::from(0b101),
            ThumbImmediateOperation::Cmp
        );
    }
}
