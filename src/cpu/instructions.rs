//! Opcode table. Each entry carries its operand shape, a cycle-cost function
//! evaluated against the registers at fetch time, and the routine that
//! executes it. `execute` returns cycles on top of the base cost.

use std::sync::OnceLock;

use super::registers::{Register, Registers, StatusFlags};
use super::Cpu;
use crate::cpu_bus::CpuBus;
use crate::error::{EmulationError, Result};

pub type Execute = fn(&mut Cpu, &mut dyn CpuBus) -> Result<u8>;
pub type CycleCost = fn(&Registers) -> u8;

/// Operand shape following the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Immediate8,
    /// Accumulator-width immediate.
    ImmediateM,
    /// Index-width immediate.
    ImmediateX,
    Relative8,
    Absolute,
    AbsoluteLong,
    AbsoluteLongX,
    DirectIndirectLongY,
}

impl AddressingMode {
    pub fn operand_len(self, regs: &Registers) -> u8 {
        match self {
            AddressingMode::Implied => 0,
            AddressingMode::Immediate8
            | AddressingMode::Relative8
            | AddressingMode::DirectIndirectLongY => 1,
            AddressingMode::ImmediateM => 1 + regs.accumulator_is_16() as u8,
            AddressingMode::ImmediateX => 1 + regs.index_is_16() as u8,
            AddressingMode::Absolute => 2,
            AddressingMode::AbsoluteLong | AddressingMode::AbsoluteLongX => 3,
        }
    }
}

pub struct Instruction {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub mode: AddressingMode,
    pub cycles: CycleCost,
    pub execute: Execute,
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instruction")
            .field("opcode", &self.opcode)
            .field("mnemonic", &self.mnemonic)
            .field("mode", &self.mode)
            .finish()
    }
}

// --- cycle cost shapes ---

fn fixed<const N: u8>(_: &Registers) -> u8 {
    N
}

/// One more with a 16-bit accumulator.
fn plus_m<const N: u8>(regs: &Registers) -> u8 {
    N + regs.accumulator_is_16() as u8
}

/// One more with 16-bit index registers.
fn plus_x<const N: u8>(regs: &Registers) -> u8 {
    N + regs.index_is_16() as u8
}

/// One more in emulation mode.
fn plus_e<const N: u8>(regs: &Registers) -> u8 {
    N + regs.emulation as u8
}

macro_rules! op {
    ($opcode:expr, $mnemonic:expr, $mode:ident, $cycles:expr, $execute:expr) => {
        Instruction {
            opcode: $opcode,
            mnemonic: $mnemonic,
            mode: AddressingMode::$mode,
            cycles: $cycles,
            execute: $execute,
        }
    };
}

const C: u8 = StatusFlags::CARRY.bits();
const I: u8 = StatusFlags::IRQ_DISABLE.bits();
const D: u8 = StatusFlags::DECIMAL.bits();
const V: u8 = StatusFlags::OVERFLOW.bits();

pub static INSTRUCTIONS: &[Instruction] = &[
    // status bits
    op!(0x18, "CLC", Implied, fixed::<2>, clear_flag::<C>),
    op!(0x58, "CLI", Implied, fixed::<2>, clear_flag::<I>),
    op!(0xB8, "CLV", Implied, fixed::<2>, clear_flag::<V>),
    op!(0xD8, "CLD", Implied, fixed::<2>, clear_flag::<D>),
    op!(0x38, "SEC", Implied, fixed::<2>, set_flag::<C>),
    op!(0x78, "SEI", Implied, fixed::<2>, set_flag::<I>),
    op!(0xF8, "SED", Implied, fixed::<2>, set_flag::<D>),
    op!(0xC2, "REP", Immediate8, fixed::<3>, rep),
    op!(0xE2, "SEP", Immediate8, fixed::<3>, sep),
    op!(0xFB, "XCE", Implied, fixed::<2>, xce),
    // stack
    op!(0x08, "PHP", Implied, fixed::<3>, php),
    op!(0x48, "PHA", Implied, plus_m::<3>, pha),
    op!(0x8B, "PHB", Implied, fixed::<3>, phb),
    op!(0x0B, "PHD", Implied, fixed::<4>, phd),
    op!(0x4B, "PHK", Implied, fixed::<3>, phk),
    op!(0xDA, "PHX", Implied, plus_x::<3>, phx),
    op!(0x5A, "PHY", Implied, plus_x::<3>, phy),
    // control flow
    op!(0x10, "BPL", Relative8, plus_e::<2>, bpl),
    op!(0xD0, "BNE", Relative8, plus_e::<2>, bne),
    op!(0x80, "BRA", Relative8, plus_e::<3>, bra),
    op!(0x20, "JSR", Absolute, fixed::<6>, jsr),
    // transfers
    op!(0xAA, "TAX", Implied, fixed::<2>, tax),
    op!(0xA8, "TAY", Implied, fixed::<2>, tay),
    op!(0x98, "TYA", Implied, fixed::<2>, tya),
    op!(0x5B, "TCD", Implied, fixed::<2>, tcd),
    op!(0x1B, "TCS", Implied, fixed::<2>, tcs),
    // increment / decrement
    op!(0xE8, "INX", Implied, fixed::<2>, inx),
    op!(0xC8, "INY", Implied, fixed::<2>, iny),
    op!(0xCA, "DEX", Implied, fixed::<2>, dex),
    op!(0x88, "DEY", Implied, fixed::<2>, dey),
    // loads
    op!(0xA9, "LDA", ImmediateM, plus_m::<2>, lda_immediate),
    op!(0xA2, "LDX", ImmediateX, plus_x::<2>, ldx_immediate),
    op!(0xA0, "LDY", ImmediateX, plus_x::<2>, ldy_immediate),
    op!(0xB7, "LDA", DirectIndirectLongY, plus_m::<6>, lda_indirect_long_y),
    // stores
    op!(0x8D, "STA", Absolute, plus_m::<4>, sta_absolute),
    op!(0x8F, "STA", AbsoluteLong, plus_m::<5>, sta_long),
    op!(0x9C, "STZ", Absolute, plus_m::<4>, stz_absolute),
    op!(0x9F, "STX", AbsoluteLongX, plus_m::<5>, stx_long_x),
    // arithmetic
    op!(0xCD, "CMP", Absolute, plus_m::<4>, cmp_absolute),
    op!(0xE9, "SBC", ImmediateM, plus_m::<2>, sbc_immediate),
];

/// Dispatch by opcode byte. Unassigned slots are `None`.
pub fn lookup(opcode: u8) -> Option<&'static Instruction> {
    static TABLE: OnceLock<[Option<&'static Instruction>; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [None; 256];
        for instruction in INSTRUCTIONS {
            table[instruction.opcode as usize] = Some(instruction);
        }
        table
    })[opcode as usize]
}

// --- status bits ---

fn clear_flag<const FLAG: u8>(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.p.remove(StatusFlags::from_bits_retain(FLAG));
    Ok(0)
}

fn set_flag<const FLAG: u8>(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.p.insert(StatusFlags::from_bits_retain(FLAG));
    Ok(0)
}

fn rep(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let mask = cpu.fetch_u8(bus)?;
    cpu.regs.rep(mask);
    Ok(0)
}

fn sep(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let mask = cpu.fetch_u8(bus)?;
    cpu.regs.sep(mask);
    Ok(0)
}

fn xce(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.exchange_carry_emulation();
    Ok(0)
}

// --- stack ---

fn php(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let p = cpu.regs.p.bits();
    cpu.push_u8(bus, p)?;
    Ok(0)
}

fn push_register(cpu: &mut Cpu, bus: &mut dyn CpuBus, reg: Register) -> Result<u8> {
    let value = cpu.regs.get(reg);
    if cpu.regs.is_16(reg) {
        cpu.push_u16(bus, value)?;
    } else {
        cpu.push_u8(bus, value as u8)?;
    }
    Ok(0)
}

fn pha(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    push_register(cpu, bus, Register::A)
}

fn phx(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    push_register(cpu, bus, Register::X)
}

fn phy(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    push_register(cpu, bus, Register::Y)
}

fn phb(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let dbr = cpu.regs.dbr;
    cpu.push_u8(bus, dbr)?;
    Ok(0)
}

fn phd(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let d = cpu.regs.d;
    cpu.push_u16(bus, d)?;
    Ok(0)
}

fn phk(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let bank = cpu.regs.program_bank();
    cpu.push_u8(bus, bank)?;
    Ok(0)
}

// --- control flow ---

fn branch(cpu: &mut Cpu, bus: &mut dyn CpuBus, taken: bool) -> Result<u8> {
    let relative = cpu.fetch_u8(bus)? as i8;
    if !taken {
        return Ok(0);
    }
    let target = cpu.regs.pc_offset().wrapping_add(relative as u16);
    cpu.regs.set_pc_offset(target);
    Ok(1)
}

fn bpl(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let taken = !cpu.regs.p.contains(StatusFlags::NEGATIVE);
    branch(cpu, bus, taken)
}

fn bne(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let taken = !cpu.regs.p.contains(StatusFlags::ZERO);
    branch(cpu, bus, taken)
}

fn bra(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    // Always taken; the taken cycle is part of the base cost.
    branch(cpu, bus, true)?;
    Ok(0)
}

fn jsr(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let target = cpu.fetch_u16(bus)?;
    let return_addr = cpu.regs.pc_offset().wrapping_sub(1);
    cpu.push_u16(bus, return_addr)?;
    cpu.regs.set_pc_offset(target);
    Ok(0)
}

// --- transfers ---

fn tax(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    let a = cpu.regs.a;
    cpu.regs.set_register(Register::X, a);
    Ok(0)
}

fn tay(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    let a = cpu.regs.a;
    cpu.regs.set_register(Register::Y, a);
    Ok(0)
}

fn tya(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    let y = cpu.regs.y;
    cpu.regs.set_register(Register::A, y);
    Ok(0)
}

fn tcd(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    let a = cpu.regs.a;
    cpu.regs.d = a;
    cpu.regs.set_nz_16(a);
    Ok(0)
}

fn tcs(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    let a = cpu.regs.a;
    cpu.regs.s = if cpu.regs.emulation {
        0x0100 | (a & 0x00FF)
    } else {
        a
    };
    Ok(0)
}

// --- increment / decrement ---

fn inx(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.adjust_index(Register::X, true);
    Ok(0)
}

fn iny(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.adjust_index(Register::Y, true);
    Ok(0)
}

fn dex(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.adjust_index(Register::X, false);
    Ok(0)
}

fn dey(cpu: &mut Cpu, _bus: &mut dyn CpuBus) -> Result<u8> {
    cpu.regs.adjust_index(Register::Y, false);
    Ok(0)
}

// --- loads ---

fn load_immediate(cpu: &mut Cpu, bus: &mut dyn CpuBus, reg: Register) -> Result<u8> {
    let wide = cpu.regs.is_16(reg);
    let value = cpu.fetch_immediate(bus, wide)?;
    cpu.regs.set_register(reg, value);
    Ok(0)
}

fn lda_immediate(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    load_immediate(cpu, bus, Register::A)
}

fn ldx_immediate(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    load_immediate(cpu, bus, Register::X)
}

fn ldy_immediate(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    load_immediate(cpu, bus, Register::Y)
}

/// LDA [dp],Y: 24-bit pointer read from bank 0 at D+dp, then indexed by Y.
fn lda_indirect_long_y(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let dp = cpu.fetch_u8(bus)? as u16;
    let pointer = cpu.regs.d.wrapping_add(dp);
    let lo = bus.read_u8(pointer as u32)? as u32;
    let mid = bus.read_u8(pointer.wrapping_add(1) as u32)? as u32;
    let hi = bus.read_u8(pointer.wrapping_add(2) as u32)? as u32;
    let base = (hi << 16) | (mid << 8) | lo;

    let y = cpu.regs.read(Register::Y) as u32;
    let addr = base.wrapping_add(y) & 0x00FF_FFFF;

    let wide = cpu.regs.accumulator_is_16();
    let value = cpu.read_data(bus, addr, wide)?;
    cpu.regs.set_register(Register::A, value);

    // Direct page not aligned to a page boundary costs a cycle.
    Ok((cpu.regs.d & 0x00FF != 0) as u8)
}

// --- stores ---

fn sta_absolute(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let offset = cpu.fetch_u16(bus)?;
    let addr = cpu.regs.data_address(offset);
    let (a, wide) = (cpu.regs.a, cpu.regs.accumulator_is_16());
    cpu.write_data(bus, addr, a, wide)?;
    Ok(0)
}

fn sta_long(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let addr = cpu.fetch_u24(bus)?;
    let (a, wide) = (cpu.regs.a, cpu.regs.accumulator_is_16());
    cpu.write_data(bus, addr, a, wide)?;
    Ok(0)
}

fn stz_absolute(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let offset = cpu.fetch_u16(bus)?;
    let addr = cpu.regs.data_address(offset);
    let wide = cpu.regs.accumulator_is_16();
    cpu.write_data(bus, addr, 0, wide)?;
    Ok(0)
}

/// Stores X at long + X; the store width follows the accumulator.
fn stx_long_x(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let base = cpu.fetch_u24(bus)?;
    let x = cpu.regs.x;
    let addr = base.wrapping_add(x as u32) & 0x00FF_FFFF;
    let wide = cpu.regs.accumulator_is_16();
    cpu.write_data(bus, addr, x, wide)?;
    Ok(0)
}

// --- arithmetic ---

fn cmp_absolute(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let offset = cpu.fetch_u16(bus)?;
    let addr = cpu.regs.data_address(offset);
    let wide = cpu.regs.accumulator_is_16();
    let value = cpu.read_data(bus, addr, wide)?;

    let mask = cpu.regs.accumulator_mask();
    let a = cpu.regs.a & mask;
    let difference = a.wrapping_sub(value) & mask;

    let negative = cpu.regs.auto_negative(difference);
    cpu.regs.p.set(StatusFlags::NEGATIVE, negative);
    cpu.regs.p.set(StatusFlags::ZERO, a == value);
    cpu.regs.p.set(StatusFlags::CARRY, a >= value);
    Ok(0)
}

/// Binary SBC: A + !operand + C inside the accumulator width.
fn sbc_immediate(cpu: &mut Cpu, bus: &mut dyn CpuBus) -> Result<u8> {
    let wide = cpu.regs.accumulator_is_16();
    if cpu.regs.p.contains(StatusFlags::DECIMAL) && !wide {
        return Err(EmulationError::UnsupportedInstructionVariant {
            mnemonic: "SBC",
            reason: "decimal mode subtraction is not implemented",
        });
    }

    let operand = cpu.fetch_immediate(bus, wide)?;
    let mask = cpu.regs.accumulator_mask();
    let sign = cpu.regs.accumulator_sign_bit();
    let a = cpu.regs.a & mask;
    let carry = cpu.regs.p.contains(StatusFlags::CARRY) as u32;

    let unclamped = a as u32 + (!operand & mask) as u32 + carry;
    let result = (unclamped as u16) & mask;

    cpu.regs.p.set(StatusFlags::CARRY, unclamped > mask as u32);
    cpu.regs
        .p
        .set(StatusFlags::OVERFLOW, (a ^ operand) & (a ^ result) & sign != 0);

    cpu.regs.a = (cpu.regs.a & !mask) | result;
    let (negative, zero) = (cpu.regs.auto_negative(result), cpu.regs.auto_zero(result));
    cpu.regs.p.set(StatusFlags::NEGATIVE, negative);
    cpu.regs.p.set(StatusFlags::ZERO, zero);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicate_opcodes() {
        let mut seen = [false; 256];
        for instruction in INSTRUCTIONS {
            assert!(!seen[instruction.opcode as usize], "duplicate {:02X}", instruction.opcode);
            seen[instruction.opcode as usize] = true;
        }
    }

    #[test]
    fn lookup_finds_every_entry_and_nothing_else() {
        for instruction in INSTRUCTIONS {
            let found = lookup(instruction.opcode).unwrap();
            assert_eq!(found.mnemonic, instruction.mnemonic);
        }
        assert!(lookup(0xFF).is_none());
        assert!(lookup(0x00).is_none());
        assert_eq!((0..=255u8).filter(|&op| lookup(op).is_some()).count(), INSTRUCTIONS.len());
    }

    #[test]
    fn operand_lengths_track_widths() {
        let mut regs = Registers::power_on();
        assert_eq!(AddressingMode::ImmediateM.operand_len(&regs), 1);
        regs.emulation = false;
        regs.rep(0x30);
        assert_eq!(AddressingMode::ImmediateM.operand_len(&regs), 2);
        assert_eq!(AddressingMode::ImmediateX.operand_len(&regs), 2);
        assert_eq!(AddressingMode::AbsoluteLongX.operand_len(&regs), 3);
    }

    #[test]
    fn cycle_costs_follow_mode() {
        let mut regs = Registers::power_on();
        assert_eq!(plus_e::<2>(&regs), 3);
        assert_eq!(plus_m::<4>(&regs), 4);
        regs.emulation = false;
        regs.rep(0x20);
        assert_eq!(plus_e::<2>(&regs), 2);
        assert_eq!(plus_m::<4>(&regs), 5);
        assert_eq!(plus_x::<3>(&regs), 3);
    }
}
