//! # ARM7TDMI Core
//!
//! Owns the register file, the status registers and the [`Bus`]. One call to
//! [`Arm7tdmi::cycle`] advances the three-stage [`Pipeline`] by one step:
//!
//! ```text
//! cycle:
//!   Execute state?  ── IRQ pending and CPSR.I clear ──► enter IRQ (instruction dropped)
//!                   └─ otherwise ─────────────────────► execute decoded instruction
//!   Decode state or later?  ──► decode fetched opcode
//!   Fetch state or later?   ──► fetch at R15, R15 += 4 (ARM) / 2 (Thumb)
//!   advance pipeline state
//! ```
//!
//! Instruction handlers live in [`arm::operations`](super::arm::operations) and
//! [`thumb::operations`](super::thumb::operations); both run as methods of this type.
//!
//! ## Exceptions
//!
//! | Exception   | Mode       | Vector       | LR                      |
//! |-------------|------------|--------------|-------------------------|
//! | Undefined   | Undefined  | `0x00000004` | next instruction        |
//! | SWI         | Supervisor | `0x00000008` | next instruction        |
//! | IRQ         | IRQ        | `0x00000018` | dropped instruction + 4 |

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::pipeline::{DecodedInstruction, Pipeline, PipelineState};
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP, Registers};

pub const SIZE_OF_ARM_INSTRUCTION: u32 = 4;
pub const SIZE_OF_THUMB_INSTRUCTION: u32 = 2;

const UNDEFINED_VECTOR: u32 = 0x0000_0004;
const SOFTWARE_INTERRUPT_VECTOR: u32 = 0x0000_0008;
const IRQ_VECTOR: u32 = 0x0000_0018;

const BOOT_STACK_SYSTEM: u32 = 0x0300_7F00;
const BOOT_STACK_IRQ: u32 = 0x0300_7FA0;
const BOOT_STACK_SUPERVISOR: u32 = 0x0300_7FE0;
const CARTRIDGE_ENTRY_POINT: u32 = 0x0800_0000;

/// Fault the host cannot recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// Mode bits that name no processor mode were written to a PSR.
    UndefinedMode(u32),
}

impl Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedMode(mode) => write!(f, "undefined mode {mode:#07b}"),
        }
    }
}

impl std::error::Error for CpuError {}

/// Raised by instruction handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionError {
    /// The encoding is not valid. Handled inside the machine through the
    /// Undefined Instruction exception.
    InvalidOpcode,
    /// Escalated to [`CpuError::UndefinedMode`].
    UndefinedMode(u32),
}

#[derive(Serialize, Deserialize)]
pub struct Arm7tdmi {
    pub bus: Bus,

    pub cpsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    pipeline: Pipeline,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        Self::new(Bus::default())
    }
}

impl Arm7tdmi {
    /// A core in its power-on state, see [`Arm7tdmi::reset`].
    #[must_use]
    pub fn new(bus: Bus) -> Self {
        let mut cpu = Self {
            bus,
            cpsr: Psr::default(),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            pipeline: Pipeline::default(),
        };
        cpu.reset(false);

        cpu
    }

    /// Clears every register and enters System mode with an empty pipeline.
    ///
    /// With `skip_boot` the core starts like the BIOS leaves it: stacks set for
    /// System, IRQ and Supervisor modes and R15 at the cartridge entry point.
    pub fn reset(&mut self, skip_boot: bool) {
        self.registers = Registers::default();
        self.register_bank = RegisterBank::default();
        self.cpsr = Psr::from(Mode::System);
        self.pipeline = Pipeline::default();

        if skip_boot {
            self.registers.set_register_at(REG_SP, BOOT_STACK_SYSTEM);
            self.register_bank.irq[0] = BOOT_STACK_IRQ;
            self.register_bank.svc[0] = BOOT_STACK_SUPERVISOR;
            self.registers.set_program_counter(CARTRIDGE_ENTRY_POINT);
        }
    }

    pub fn cycle(&mut self) -> Result<(), CpuError> {
        if self.pipeline.state == PipelineState::Execute {
            if self.bus.irq_pending() && !self.cpsr.irq_disable() {
                self.interrupt_request();
            } else {
                self.execute()?;
            }
        }

        if self.pipeline.state >= PipelineState::Decode {
            self.pipeline.decode(self.cpsr.cpu_state());
        }

        if self.pipeline.state >= PipelineState::Fetch {
            self.fetch();
        }

        self.pipeline.advance();

        Ok(())
    }

    #[must_use]
    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state
    }

    fn fetch(&mut self) {
        let pc = self.registers.program_counter();

        match self.cpsr.cpu_state() {
            CpuState::Arm => {
                self.pipeline.store_fetched(self.bus.read_word(pc));
                self.registers
                    .advance_program_counter(SIZE_OF_ARM_INSTRUCTION);
            }
            CpuState::Thumb => {
                self.pipeline
                    .store_fetched(u32::from(self.bus.read_half_word(pc)));
                self.registers
                    .advance_program_counter(SIZE_OF_THUMB_INSTRUCTION);
            }
        }
    }

    fn execute(&mut self) -> Result<(), CpuError> {
        let (op_code, decoded) = self.pipeline.decoded();

        let outcome = match decoded {
            DecodedInstruction::Arm(Some(instruction)) => {
                let condition = Condition::from(op_code.get_bits(28..=31) as u8);
                if self.cpsr.can_execute(condition) {
                    self.execute_arm(op_code, instruction)
                } else {
                    Ok(())
                }
            }
            DecodedInstruction::Thumb(Some(instruction)) => {
                self.execute_thumb(op_code as u16, instruction)
            }
            DecodedInstruction::Arm(None) | DecodedInstruction::Thumb(None) => {
                Err(InstructionError::InvalidOpcode)
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(InstructionError::InvalidOpcode) => {
                self.undefined_instruction(op_code);
                Ok(())
            }
            Err(InstructionError::UndefinedMode(mode)) => {
                tracing::warn!("illegal mode {mode:#07b} written to a status register");
                Err(CpuError::UndefinedMode(mode))
            }
        }
    }

    /// Flushing jump. The target is aligned to the current instruction size.
    pub fn jump(&mut self, address: u32) {
        let address = match self.cpsr.cpu_state() {
            CpuState::Arm => address & !0b11,
            CpuState::Thumb => address & !0b1,
        };

        self.registers.set_program_counter(address);
        self.pipeline.flush();
    }

    /// Register write from an instruction: R15 goes through [`Arm7tdmi::jump`].
    pub fn write_register(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.jump(value);
        } else {
            self.registers.set_register_at(reg, value);
        }
    }

    /// Swaps the banked registers and sets the CPSR mode bits.
    pub fn change_mode(&mut self, new_mode: Mode) {
        let old_mode = self.cpsr.mode();

        self.register_bank.store(old_mode, &self.registers);
        self.register_bank.restore(new_mode, &mut self.registers);

        self.cpsr.set_mode(new_mode);
    }

    /// Replaces the whole CPSR, banking registers if the mode changes.
    pub fn set_cpsr(&mut self, psr: Psr) {
        self.change_mode(psr.mode());
        self.cpsr = psr;
    }

    /// Replaces the CPSR from a raw value whose mode bits are not trusted.
    pub fn set_cpsr_raw(&mut self, value: u32) -> Result<(), InstructionError> {
        let psr = Psr::try_from(value).map_err(InstructionError::UndefinedMode)?;
        self.set_cpsr(psr);

        Ok(())
    }

    /// SPSR of the current mode. User and System have none and read the CPSR.
    #[must_use]
    pub fn spsr(&self) -> Psr {
        self.register_bank
            .spsr(self.cpsr.mode())
            .unwrap_or(self.cpsr)
    }

    /// Ignored in User and System mode.
    pub fn set_spsr(&mut self, psr: Psr) {
        if let Some(spsr) = self.register_bank.spsr_mut(self.cpsr.mode()) {
            *spsr = psr;
        }
    }

    /// Restores CPSR from the SPSR of the current mode (exception return).
    pub fn restore_cpsr_from_spsr(&mut self) {
        if self.cpsr.mode().has_spsr() {
            self.set_cpsr(self.spsr());
        }
    }

    fn enter_exception(&mut self, mode: Mode, vector: u32, return_address: u32) {
        let old_cpsr = self.cpsr;

        self.change_mode(mode);
        self.set_spsr(old_cpsr);
        self.registers.set_register_at(REG_LR, return_address);

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);

        self.jump(vector);
    }

    /// Address of the instruction after the one executing.
    fn next_instruction_address(&self) -> u32 {
        let pc = self.registers.program_counter();
        match self.cpsr.cpu_state() {
            CpuState::Arm => pc.wrapping_sub(SIZE_OF_ARM_INSTRUCTION),
            CpuState::Thumb => pc.wrapping_sub(SIZE_OF_THUMB_INSTRUCTION),
        }
    }

    pub fn undefined_instruction(&mut self, op_code: u32) {
        tracing::debug!(
            "undefined instruction {op_code:#010x} at {:#010x}",
            self.current_instruction_address()
        );

        let return_address = self.next_instruction_address();
        self.enter_exception(Mode::Undefined, UNDEFINED_VECTOR, return_address);
    }

    pub fn software_interrupt(&mut self, comment: u32) {
        tracing::debug!("swi {comment:#x}");

        let return_address = self.next_instruction_address();
        self.enter_exception(Mode::Supervisor, SOFTWARE_INTERRUPT_VECTOR, return_address);
    }

    /// The instruction about to execute is dropped and resumed on `SUBS PC, LR, #4`.
    fn interrupt_request(&mut self) {
        let return_address = self.current_instruction_address().wrapping_add(4);
        tracing::debug!("irq, returning to {:#010x}", return_address.wrapping_sub(4));

        self.enter_exception(Mode::Irq, IRQ_VECTOR, return_address);
    }

    /// Address of the instruction in the execute stage.
    #[must_use]
    pub fn current_instruction_address(&self) -> u32 {
        let pc = self.registers.program_counter();
        match self.cpsr.cpu_state() {
            CpuState::Arm => pc.wrapping_sub(2 * SIZE_OF_ARM_INSTRUCTION),
            CpuState::Thumb => pc.wrapping_sub(2 * SIZE_OF_THUMB_INSTRUCTION),
        }
    }
}
