use crate::bus::Bus;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::error::GbaError;
use crate::memory::bios::Bios;
use crate::memory::cartridge::Cartridge;

/// Receives the 240×160 frame buffer at every VBlank.
pub type FrameSink = Box<dyn FnMut(&[u32])>;

pub struct Gba {
    pub cpu: Arm7tdmi,

    frame_sink: Option<FrameSink>,
    frame_count: u64,
}

impl Gba {
    /// Builds the machine around a 16 KiB BIOS image and an optional cartridge.
    ///
    /// With `skip_boot` execution starts at the cartridge entry point with the
    /// stacks the BIOS would have set up, otherwise at the reset vector.
    pub fn new(bios: Vec<u8>, rom: Option<Vec<u8>>, skip_boot: bool) -> Result<Self, GbaError> {
        let bios = Bios::new(bios)?;
        tracing::info!("BIOS loaded");

        let cartridge = match rom {
            Some(rom) => {
                let cartridge = Cartridge::new(rom)?;
                match cartridge.detect_save_type() {
                    Some(save_type) => tracing::info!(
                        "cartridge loaded ({} bytes), backup type {save_type:?}",
                        cartridge.len()
                    ),
                    None => tracing::info!(
                        "cartridge loaded ({} bytes), no backup detected",
                        cartridge.len()
                    ),
                }
                cartridge
            }
            None => {
                tracing::info!("no cartridge inserted");
                Cartridge::default()
            }
        };

        let mut cpu = Arm7tdmi::new(Bus::new(bios, cartridge));
        cpu.reset(skip_boot);

        Ok(Self {
            cpu,
            frame_sink: None,
            frame_count: 0,
        })
    }

    pub fn set_frame_sink(&mut self, sink: FrameSink) {
        self.frame_sink = Some(sink);
    }

    /// Button states in [`GbaButton::ALL`](crate::cpu::hardware::keypad::GbaButton::ALL) order.
    pub fn update_keys(&mut self, pressed: [bool; 10]) {
        self.cpu.bus.update_keys(pressed);
    }

    /// Frames completed since power-on.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// One hardware cycle: DMA or CPU, then LCD, then timers.
    pub fn cycle(&mut self) -> Result<(), GbaError> {
        if !self.cpu.bus.step_dma() {
            self.cpu.cycle()?;
        }

        if self.cpu.bus.step_lcd() {
            self.frame_count += 1;

            if let Some(sink) = &mut self.frame_sink {
                sink(self.cpu.bus.lcd.frame_buffer());
            }
        }

        self.cpu.bus.step_timers();

        Ok(())
    }

    /// Runs until `frames` more frames have been handed to the sink.
    pub fn run_frames(&mut self, frames: u64) -> Result<(), GbaError> {
        let target = self.frame_count + frames;

        while self.frame_count < target {
            self.cycle()?;
        }

        Ok(())
    }
}

/// Runner for the test ROM convention: the program writes `0x11` at the start of
/// IWRAM when it begins, pushes its results on the stack and writes `0x22` there
/// when it is done.
pub mod test_harness {
    use std::fmt;

    use super::Gba;
    use crate::cpu::registers::REG_SP;
    use crate::error::GbaError;

    const STATUS_ADDRESS: u32 = 0x0300_0000;
    const TEST_START: u8 = 0x11;
    const TEST_END: u8 = 0x22;
    const START_TIMEOUT: usize = 100;
    const END_TIMEOUT: usize = 100_000;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HarnessError {
        /// The start marker did not show up in time.
        StartTimeout,
        /// The end marker did not show up in time.
        EndTimeout,
        Emulation(GbaError),
    }

    impl fmt::Display for HarnessError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::StartTimeout => write!(f, "test did not start within {START_TIMEOUT} cycles"),
                Self::EndTimeout => write!(f, "test did not end within {END_TIMEOUT} cycles"),
                Self::Emulation(err) => write!(f, "emulation failed: {err}"),
            }
        }
    }

    impl std::error::Error for HarnessError {}

    impl From<GbaError> for HarnessError {
        fn from(err: GbaError) -> Self {
            Self::Emulation(err)
        }
    }

    fn run_until(gba: &mut Gba, marker: u8, max_cycles: usize) -> Result<bool, GbaError> {
        for _ in 0..max_cycles {
            if gba.cpu.bus.read_byte(STATUS_ADDRESS) == marker {
                return Ok(true);
            }
            gba.cycle()?;
        }

        Ok(gba.cpu.bus.read_byte(STATUS_ADDRESS) == marker)
    }

    /// Runs the loaded program and returns its stack, oldest word first.
    pub fn run_test_program(gba: &mut Gba) -> Result<Vec<u32>, HarnessError> {
        let stack_base = gba.cpu.registers.register_at(REG_SP);

        if !run_until(gba, TEST_START, START_TIMEOUT)? {
            return Err(HarnessError::StartTimeout);
        }
        if !run_until(gba, TEST_END, END_TIMEOUT)? {
            return Err(HarnessError::EndTimeout);
        }

        let stack_pointer = gba.cpu.registers.register_at(REG_SP);

        Ok((stack_pointer..stack_base)
            .step_by(4)
            .rev()
            .map(|address| gba.cpu.bus.read_word(address))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::test_harness::{HarnessError, run_test_program};
    use super::*;
    use crate::cpu::hardware::lcd::{LCD_HEIGHT, LCD_WIDTH};
    use crate::memory::bios::BIOS_SIZE;
    use crate::memory::io_registers::KEYINPUT;
    use pretty_assertions::assert_eq;

    fn rom(program: &[u32]) -> Vec<u8> {
        program.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    fn gba_with_program(program: &[u32]) -> Gba {
        Gba::new(vec![0; BIOS_SIZE], Some(rom(program)), true).unwrap()
    }

    // Shared prologue: r1 = 0x03000000, start marker written.
    const PROLOGUE: [u32; 3] = [
        0xE3A0_1403, // MOV r1, #0x03000000
        0xE3A0_2011, // MOV r2, #0x11
        0xE5C1_2000, // STRB r2, [r1]
    ];

    const EPILOGUE: [u32; 3] = [
        0xE3A0_2022, // MOV r2, #0x22
        0xE5C1_2000, // STRB r2, [r1]
        0xEAFF_FFFE, // B .
    ];

    #[test]
    fn check_arm_subs_flags() {
        let mut program = PROLOGUE.to_vec();
        program.extend([
            0xE3A0_0000, // MOV r0, #0
            0xE050_0000, // SUBS r0, r0, r0
            0xE10F_3000, // MRS r3, cpsr
            0xE92D_0008, // STMFD sp!, {r3}
        ]);
        program.extend(EPILOGUE);

        let mut gba = gba_with_program(&program);

        assert_eq!(run_test_program(&mut gba), Ok(vec![0x6000_001F]));
    }

    const MOV_R0_1: u32 = 0xE3A0_0001;

    /// Runs `op` (writing r4) and pushes r4 followed by the NZCV bits of the CPSR.
    fn push_result_and_flags(program: &mut Vec<u32>, op: u32) {
        program.extend([
            op,
            0xE10F_3000, // MRS r3, cpsr
            0xE203_320F, // AND r3, r3, #0xF0000000
            0xE92D_0018, // STMFD sp!, {r3, r4}
        ]);
    }

    #[test]
    fn check_shifter_immediate() {
        let mut program = PROLOGUE.to_vec();
        program.extend([
            0xE3B0_6001, // MOVS r6, #1
            0xE3B0_5101, // MOVS r5, #1, ROR #2
            0xE3B0_4F01, // MOVS r4, #1, ROR #30
            0xE92D_0070, // STMFD sp!, {r4-r6}
        ]);
        program.extend(EPILOGUE);

        let mut gba = gba_with_program(&program);

        assert_eq!(
            run_test_program(&mut gba),
            Ok(vec![1, 0x4000_0000, 4])
        );
    }

    #[test]
    fn check_shifter_register_immediate() {
        let mut program = PROLOGUE.to_vec();
        program.extend([MOV_R0_1, 0xE3A0_6002]); // MOV r6, #2
        for op in [
            0xE1B0_4000, // MOVS r4, r0, LSL #0
            0xE1B0_4080, // MOVS r4, r0, LSL #1
            0xE1B0_4020, // MOVS r4, r0, LSR #32
            0xE1B0_4F86, // MOVS r4, r6, LSL #31
            0xE1B0_40A0, // MOVS r4, r0, LSR #1
            0xE1B0_4040, // MOVS r4, r0, ASR #32
            0xE1B0_40E0, // MOVS r4, r0, ROR #1
            0xE1B0_4060, // MOVS r4, r0, RRX
        ] {
            push_result_and_flags(&mut program, op);
        }
        program.extend(EPILOGUE);

        let mut gba = gba_with_program(&program);

        assert_eq!(
            run_test_program(&mut gba),
            Ok(vec![
                1,
                0,
                2,
                0,
                0,
                0x4000_0000,
                0,
                0x6000_0000,
                0,
                0x6000_0000,
                0,
                0x4000_0000,
                0x8000_0000,
                0xA000_0000,
                0x8000_0000,
                0xA000_0000,
            ])
        );
    }

    #[test]
    fn check_shifter_register_register() {
        let mut program = PROLOGUE.to_vec();
        program.push(MOV_R0_1);
        // MOVS r4, r0, <shift> r5
        for shift in [0xE1B0_4510, 0xE1B0_4530, 0xE1B0_4550, 0xE1B0_4570] {
            for amount in [0, 1, 32, 33] {
                program.push(0xE3A0_5000 | amount); // MOV r5, #amount
                push_result_and_flags(&mut program, shift);
            }
        }
        program.extend(EPILOGUE);

        let mut gba = gba_with_program(&program);

        assert_eq!(
            run_test_program(&mut gba),
            Ok(vec![
                // LSL by 0, 1, 32, 33
                1,
                0,
                2,
                0,
                0,
                0x6000_0000,
                0,
                0x4000_0000,
                // LSR
                1,
                0,
                0,
                0x6000_0000,
                0,
                0x4000_0000,
                0,
                0x4000_0000,
                // ASR
                1,
                0,
                0,
                0x6000_0000,
                0,
                0x4000_0000,
                0,
                0x4000_0000,
                // ROR
                1,
                0,
                0x8000_0000,
                0xA000_0000,
                1,
                0,
                0x8000_0000,
                0xA000_0000,
            ])
        );
    }

    #[test]
    fn check_thumb_bic() {
        let mut program = PROLOGUE.to_vec();
        program.extend([
            0xE28F_0001, // ADD r0, pc, #1
            0xE12F_FF10, // BX r0
            0x049B_2303, // MOV r3, #3 / LSL r3, r3, #18
            0x04E4_2401, // MOV r4, #1 / LSL r4, r4, #19
            0xB408_43A3, // BIC r3, r4 / PUSH {r3}
            0x700A_2222, // MOV r2, #0x22 / STRB r2, [r1]
            0x0000_E7FE, // B .
        ]);

        let mut gba = gba_with_program(&program);

        assert_eq!(run_test_program(&mut gba), Ok(vec![0x0004_0000]));
    }

    #[test]
    fn check_arm_store_then_load() {
        let mut program = PROLOGUE.to_vec();
        program.extend([
            0xE59F_3008, // LDR r3, [pc, #8]
            0xE581_3004, // STR r3, [r1, #4]
            0xE591_4004, // LDR r4, [r1, #4]
            0xEA00_0001, // B over the literal
            0xCAFE_BABE,
            0x0000_0000,
            0xE92D_0018, // STMFD sp!, {r3, r4}
        ]);
        program.extend(EPILOGUE);

        let mut gba = gba_with_program(&program);
        let stack = run_test_program(&mut gba).unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0], stack[1]);
        assert_eq!(stack[0], 0xCAFE_BABE);
    }

    #[test]
    fn check_harness_timeouts() {
        let mut gba = gba_with_program(&[0xEAFF_FFFE]);
        assert_eq!(run_test_program(&mut gba), Err(HarnessError::StartTimeout));

        let mut program = PROLOGUE.to_vec();
        program.push(0xEAFF_FFFE);
        let mut gba = gba_with_program(&program);
        assert_eq!(run_test_program(&mut gba), Err(HarnessError::EndTimeout));
    }

    #[test]
    fn check_configuration_errors() {
        assert_eq!(
            Gba::new(vec![0; 10], None, false).err(),
            Some(GbaError::InvalidBiosSize { actual: 10 })
        );
    }

    #[test]
    fn check_frame_sink() {
        let mut gba = Gba::new(vec![0; BIOS_SIZE], None, false).unwrap();
        let frames = Rc::new(Cell::new(0));
        let received = Rc::clone(&frames);

        gba.set_frame_sink(Box::new(move |frame| {
            assert_eq!(frame.len(), LCD_WIDTH * LCD_HEIGHT);
            assert!(frame.iter().all(|pixel| *pixel == 0xFF00_0000));
            received.set(received.get() + 1);
        }));

        gba.run_frames(1).unwrap();

        assert_eq!(frames.get(), 1);
        assert_eq!(gba.frame_count(), 1);
    }

    #[test]
    fn check_update_keys() {
        let mut gba = Gba::new(vec![0; BIOS_SIZE], None, false).unwrap();

        let mut pressed = [false; 10];
        pressed[0] = true;
        gba.update_keys(pressed);

        assert_eq!(gba.cpu.bus.read_half_word(KEYINPUT), 0x03FE);
    }
}
