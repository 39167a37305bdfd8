//! # Three-stage Pipeline
//!
//! The ARM7TDMI fetches, decodes and executes in parallel. While an instruction
//! executes, the one after it is being decoded and the next one fetched, which is why
//! R15 reads two instructions ahead (+8 in ARM, +4 in Thumb).
//!
//! ```text
//!            ┌────────┐   ┌────────┐   ┌────────┐   ┌─────────┐
//! jump ────► │ Flush  │──►│ Fetch  │──►│ Decode │──►│ Execute │──┐
//!            └────────┘   └────────┘   └────────┘   └─────────┘  │
//!                 ▲                                      ▲   └───┘
//!                 └──────────── write to R15 ────────────┘
//! ```
//!
//! The state names the most advanced stage that has valid input on the next cycle.
//! A flush leaves the pipeline empty, so two refill cycles run before execution
//! resumes at the new address.

use serde::{Deserialize, Serialize};

use crate::cpu::arm::instructions::{self as arm_instructions, ArmInstruction};
use crate::cpu::psr::CpuState;
use crate::cpu::thumb::instruction::{self as thumb_instructions, ThumbInstruction};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineState {
    #[default]
    Flush,
    Fetch,
    Decode,
    Execute,
}

/// Handler class resolved during decode, `None` when the table has no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodedInstruction {
    Arm(Option<ArmInstruction>),
    Thumb(Option<ThumbInstruction>),
}

impl Default for DecodedInstruction {
    fn default() -> Self {
        Self::Arm(None)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub state: PipelineState,
    fetched: u32,
    decoded_op_code: u32,
    decoded: DecodedInstruction,
}

impl Pipeline {
    /// Drops everything in flight.
    pub const fn flush(&mut self) {
        self.state = PipelineState::Flush;
    }

    pub const fn store_fetched(&mut self, op_code: u32) {
        self.fetched = op_code;
    }

    /// Moves the fetched opcode into the decode slot, looking it up in the table of
    /// the current instruction set.
    pub fn decode(&mut self, state: CpuState) {
        self.decoded_op_code = self.fetched;
        self.decoded = match state {
            CpuState::Arm => DecodedInstruction::Arm(arm_instructions::decode(self.fetched)),
            CpuState::Thumb => {
                DecodedInstruction::Thumb(thumb_instructions::decode(self.fetched as u16))
            }
        };
    }

    /// The opcode ready to execute and its handler class.
    #[must_use]
    pub const fn decoded(&self) -> (u32, DecodedInstruction) {
        (self.decoded_op_code, self.decoded)
    }

    /// Moves to the next state at the end of a cycle. `Execute` is stable.
    pub const fn advance(&mut self) {
        self.state = match self.state {
            PipelineState::Flush => PipelineState::Fetch,
            PipelineState::Fetch => PipelineState::Decode,
            PipelineState::Decode | PipelineState::Execute => PipelineState::Execute,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_refill_sequence() {
        let mut pipeline = Pipeline::default();
        assert_eq!(pipeline.state, PipelineState::Flush);

        pipeline.advance();
        assert_eq!(pipeline.state, PipelineState::Fetch);
        pipeline.advance();
        assert_eq!(pipeline.state, PipelineState::Decode);
        pipeline.advance();
        assert_eq!(pipeline.state, PipelineState::Execute);
        pipeline.advance();
        assert_eq!(pipeline.state, PipelineState::Execute);

        pipeline.flush();
        assert_eq!(pipeline.state, PipelineState::Flush);
    }

    #[test]
    fn check_decode_uses_instruction_set() {
        let mut pipeline = Pipeline::default();

        pipeline.store_fetched(0xEF00_0000);
        pipeline.decode(CpuState::Arm);
        assert_eq!(
            pipeline.decoded(),
            (
                0xEF00_0000,
                DecodedInstruction::Arm(Some(ArmInstruction::SoftwareInterrupt))
            )
        );

        // SWI 0
        pipeline.store_fetched(0xDF00);
        pipeline.decode(CpuState::Thumb);
        assert_eq!(
            pipeline.decoded(),
            (
                0xDF00,
                DecodedInstruction::Thumb(Some(ThumbInstruction::SoftwareInterrupt))
            )
        );
    }
}
