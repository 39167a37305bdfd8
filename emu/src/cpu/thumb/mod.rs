//! Thumb (16-bit) instruction set: format decoding and execution.

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
pub mod instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod operations;
