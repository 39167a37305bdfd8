//! ALU opcodes, flag computation and the barrel shifter.
//!
//! Shared by ARM data processing, ARM addressing modes and the Thumb ALU formats.
//!
//! The shifter has two encodings with different edge cases:
//!
//! ```text
//!              amount  │ immediate (5 bit)      │ register (Rs & 0xFF)
//! ─────────────────────┼────────────────────────┼──────────────────────────
//!  LSL         0       │ Rm, C unchanged        │ Rm, C unchanged
//!              32      │ -                      │ 0, C = Rm[0]
//!              >32     │ -                      │ 0, C = 0
//!  LSR         0       │ means #32: 0, C=Rm[31] │ Rm, C unchanged
//!              32      │ -                      │ 0, C = Rm[31]
//!              >32     │ -                      │ 0, C = 0
//!  ASR         0       │ means #32: sign fill   │ Rm, C unchanged
//!              >=32    │ -                      │ sign fill, C = Rm[31]
//!  ROR         0       │ RRX                    │ Rm, C unchanged
//!              32*k    │ -                      │ Rm, C = Rm[31]
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only update flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    /// Only the low nibble is looked at.
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    const fn new(result: u32, carry: bool, overflow: bool) -> Self {
        Self {
            result,
            carry,
            overflow,
            sign: (result >> 31) == 1,
            zero: result == 0,
        }
    }

    /// Logical operations take C from the shifter and keep V.
    #[must_use]
    pub const fn logical(result: u32, shifter_carry: bool, overflow: bool) -> Self {
        Self::new(result, shifter_carry, overflow)
    }
}

/// `first + second + carry_in`.
#[must_use]
pub fn add_with_carry(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    let (partial, first_carry) = first_op.overflowing_add(second_op);
    let (result, second_carry) = partial.overflowing_add(u32::from(carry_in));

    // Both operands share a sign the result does not have.
    let overflow = ((first_op ^ result) & (second_op ^ result)).get_bit(31);

    ArithmeticOpResult::new(result, first_carry || second_carry, overflow)
}

/// `first - second - !carry_in`, the carry flag being an inverted borrow.
#[must_use]
pub fn sub_with_carry(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    let borrow = u32::from(!carry_in);
    let result = first_op.wrapping_sub(second_op).wrapping_sub(borrow);

    let carry = if carry_in {
        first_op >= second_op
    } else {
        first_op > second_op
    };

    // Operands with different signs and a result whose sign differs from the first.
    let overflow = ((first_op ^ second_op) & (first_op ^ result)).get_bit(31);

    ArithmeticOpResult::new(result, carry, overflow)
}

/// Shift encoded as a 5-bit immediate.
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    let (result, carry) = match (kind, shift_amount) {
        (ShiftKind::Lsl, 0) => (rm, carry),
        (ShiftKind::Lsl, amount) => (rm << amount, rm.get_bit((32 - amount) as u8)),
        // LSR#0 and ASR#0 are used to encode a shift by 32.
        (ShiftKind::Lsr, 0) => (0, rm.get_bit(31)),
        (ShiftKind::Lsr, amount) => (rm >> amount, rm.get_bit((amount - 1) as u8)),
        (ShiftKind::Asr, 0) => (((rm as i32) >> 31) as u32, rm.get_bit(31)),
        (ShiftKind::Asr, amount) => (
            ((rm as i32) >> amount) as u32,
            rm.get_bit((amount - 1) as u8),
        ),
        // ROR#0 is RRX: rotate right by one through the carry.
        (ShiftKind::Ror, 0) => ((u32::from(carry) << 31) | (rm >> 1), rm.get_bit(0)),
        (ShiftKind::Ror, amount) => (rm.rotate_right(amount), rm.get_bit((amount - 1) as u8)),
    };

    ArithmeticOpResult {
        result,
        carry,
        ..Default::default()
    }
}

/// Shift whose amount comes from the bottom byte of a register.
#[must_use]
pub fn shift_by_register(
    kind: ShiftKind,
    shift_amount: u32,
    rm: u32,
    carry: bool,
) -> ArithmeticOpResult {
    let shift_amount = shift_amount & 0xFF;

    let (result, carry) = match (kind, shift_amount) {
        (_, 0) => (rm, carry),
        (ShiftKind::Lsl, 1..=31) => (rm << shift_amount, rm.get_bit((32 - shift_amount) as u8)),
        (ShiftKind::Lsl, 32) => (0, rm.get_bit(0)),
        (ShiftKind::Lsr, 1..=31) => (rm >> shift_amount, rm.get_bit((shift_amount - 1) as u8)),
        (ShiftKind::Lsr, 32) => (0, rm.get_bit(31)),
        (ShiftKind::Lsl | ShiftKind::Lsr, _) => (0, false),
        (ShiftKind::Asr, 1..=31) => (
            ((rm as i32) >> shift_amount) as u32,
            rm.get_bit((shift_amount - 1) as u8),
        ),
        (ShiftKind::Asr, _) => (((rm as i32) >> 31) as u32, rm.get_bit(31)),
        (ShiftKind::Ror, amount) => match amount & 0x1F {
            0 => (rm, rm.get_bit(31)),
            rotation => (rm.rotate_right(rotation), rm.get_bit((rotation - 1) as u8)),
        },
    };

    ArithmeticOpResult {
        result,
        carry,
        ..Default::default()
    }
}

/// 8-bit immediate rotated right by twice the 4-bit rotate field.
/// A zero rotation leaves the carry untouched.
#[must_use]
pub fn rotate_immediate(immediate: u32, rotate: u32, carry: bool) -> ArithmeticOpResult {
    let rotation = (rotate & 0xF) * 2;
    let result = (immediate & 0xFF).rotate_right(rotation);

    ArithmeticOpResult {
        result,
        carry: if rotation == 0 {
            carry
        } else {
            result.get_bit(31)
        },
        ..Default::default()
    }
}
