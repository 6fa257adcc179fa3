//! 65C816 execution engine.
//!
//! `Cpu::step` fetches one opcode through the bus, dispatches it through the
//! instruction table and charges its cycle cost. Hosts compose steps into run
//! loops; see `Emulator`.

pub mod instructions;
pub mod registers;


use crate::cpu_bus::CpuBus;
use crate::error::{EmulationError, Result};

pub use instructions::{AddressingMode, Instruction};
pub use registers::{Register, Registers, StatusFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Address the opcode was fetched from.
    pub pc: u32,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub cycles: u8,
    pub(crate) operand_bytes: [u8; 3],
    pub(crate) operand_len: u8,
}

impl StepOutcome {
    /// Operand bytes that followed the opcode, as sized at fetch time.
    pub fn operands(&self) -> &[u8] {
        &self.operand_bytes[..self.operand_len as usize]
    }
}

pub struct Cpu {
    pub regs: Registers,
    cycles: u64,
    instructions: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::power_on(),
            cycles: 0,
            instructions: 0,
        }
    }

    /// Power-on register state with PC at bank 0, `reset_vector`.
    pub fn reset(&mut self, reset_vector: u16) {
        self.regs = Registers::power_on();
        self.regs.pc = reset_vector as u32;
        self.cycles = 0;
        self.instructions = 0;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Executes one instruction. On error the registers are rolled back to
    /// their values before the fetch.
    pub fn step(&mut self, bus: &mut dyn CpuBus) -> Result<StepOutcome> {
        let saved = self.regs;
        match self.execute_next(bus) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.regs = saved;
                Err(err)
            }
        }
    }

    fn execute_next(&mut self, bus: &mut dyn CpuBus) -> Result<StepOutcome> {
        let pc = self.regs.pc;
        bus.set_accumulator_16(self.regs.accumulator_is_16());

        let opcode = self.fetch_u8(bus)?;
        let instruction =
            instructions::lookup(opcode).ok_or(EmulationError::UndefinedOpcode { opcode, pc })?;

        let operand_len = instruction.mode.operand_len(&self.regs);
        let operand_bytes = self.peek_operands(bus, operand_len)?;

        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "{:06X}  {:02X} {:<8} {:<4} A:{:04X} X:{:04X} Y:{:04X} S:{:04X} D:{:04X} DB:{:02X} P:{:02X} E:{}",
                pc,
                opcode,
                format_operands(&operand_bytes[..operand_len as usize]),
                instruction.mnemonic,
                self.regs.a,
                self.regs.x,
                self.regs.y,
                self.regs.s,
                self.regs.d,
                self.regs.dbr,
                self.regs.p.bits(),
                self.regs.emulation as u8
            );
        }

        // Cost is fixed by the mode in force when the instruction starts.
        let base = (instruction.cycles)(&self.regs);
        let extra = (instruction.execute)(self, bus)?;
        let cycles = base.saturating_add(extra);

        self.cycles = self.cycles.wrapping_add(cycles as u64);
        self.instructions += 1;
        bus.instruction_retired();

        Ok(StepOutcome {
            pc,
            opcode,
            mnemonic: instruction.mnemonic,
            cycles,
            operand_bytes,
            operand_len,
        })
    }

    /// Reads the operand bytes after the opcode without moving PC.
    fn peek_operands(&self, bus: &mut dyn CpuBus, len: u8) -> Result<[u8; 3]> {
        let mut bytes = [0u8; 3];
        let mut offset = self.regs.pc_offset();
        for byte in bytes.iter_mut().take(len as usize) {
            let addr = ((self.regs.program_bank() as u32) << 16) | offset as u32;
            *byte = bus.read_u8(addr)?;
            offset = offset.wrapping_add(1);
        }
        Ok(bytes)
    }

    // --- operand fetch, post-incrementing PC inside the program bank ---

    pub(crate) fn fetch_u8(&mut self, bus: &mut dyn CpuBus) -> Result<u8> {
        let value = bus.read_u8(self.regs.pc)?;
        self.regs.set_pc_offset(self.regs.pc_offset().wrapping_add(1));
        Ok(value)
    }

    pub(crate) fn fetch_u16(&mut self, bus: &mut dyn CpuBus) -> Result<u16> {
        let lo = self.fetch_u8(bus)? as u16;
        let hi = self.fetch_u8(bus)? as u16;
        Ok((hi << 8) | lo)
    }

    pub(crate) fn fetch_u24(&mut self, bus: &mut dyn CpuBus) -> Result<u32> {
        let lo = self.fetch_u8(bus)? as u32;
        let mid = self.fetch_u8(bus)? as u32;
        let hi = self.fetch_u8(bus)? as u32;
        Ok((hi << 16) | (mid << 8) | lo)
    }

    /// Immediate operand of the accumulator or index width.
    pub(crate) fn fetch_immediate(&mut self, bus: &mut dyn CpuBus, wide: bool) -> Result<u16> {
        if wide {
            self.fetch_u16(bus)
        } else {
            Ok(self.fetch_u8(bus)? as u16)
        }
    }

    // --- stack ---

    pub(crate) fn push_u8(&mut self, bus: &mut dyn CpuBus, value: u8) -> Result<()> {
        bus.write_u8(self.regs.stack_address(), value)?;
        self.regs.stack_decrement();
        Ok(())
    }

    pub(crate) fn push_u16(&mut self, bus: &mut dyn CpuBus, value: u16) -> Result<()> {
        self.push_u8(bus, (value >> 8) as u8)?;
        self.push_u8(bus, (value & 0xFF) as u8)
    }

    // --- width-aware data access ---

    pub(crate) fn read_data(&mut self, bus: &mut dyn CpuBus, addr: u32, wide: bool) -> Result<u16> {
        if wide {
            bus.read_u16(addr)
        } else {
            Ok(bus.read_u8(addr)? as u16)
        }
    }

    pub(crate) fn write_data(
        &mut self,
        bus: &mut dyn CpuBus,
        addr: u32,
        value: u16,
        wide: bool,
    ) -> Result<()> {
        if wide {
            bus.write_u16(addr, value)
        } else {
            bus.write_u8(addr, (value & 0xFF) as u8)
        }
    }
}

pub fn format_operands(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
