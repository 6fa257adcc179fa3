//! Trait representing the minimal bus interface required by the 65C816 core.

use crate::error::Result;

#[inline]
pub fn next_address(addr: u32) -> u32 {
    addr.wrapping_add(1) & 0x00FF_FFFF
}

pub trait CpuBus {
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn write_u8(&mut self, addr: u32, value: u8) -> Result<()>;

    /// Two independent byte reads, low byte first.
    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        let lo = self.read_u8(addr)? as u16;
        let hi = self.read_u8(next_address(addr))? as u16;
        Ok((hi << 8) | lo)
    }

    fn write_u16(&mut self, addr: u32, value: u16) -> Result<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(next_address(addr), (value >> 8) as u8)
    }

    /// The CPU reports its accumulator width before each instruction; some
    /// I/O ports read differently under a 16-bit accumulator.
    fn set_accumulator_16(&mut self, _wide: bool) {}

    /// Called once per executed instruction.
    fn instruction_retired(&mut self) {}
}
