use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        const INDEX_8BIT = 0x10;
        const MEMORY_8BIT = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

/// Width-switching registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    A,
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Program bank in bits 16-23, offset in the low half.
    pub pc: u32,
    pub s: u16,
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub d: u16,
    pub dbr: u8,
    pub emulation: bool,
    pub p: StatusFlags,
}

impl Registers {
    pub fn power_on() -> Self {
        Self {
            pc: 0,
            s: 0x01FF,
            a: 0,
            x: 0,
            y: 0,
            d: 0,
            dbr: 0,
            emulation: true,
            p: StatusFlags::IRQ_DISABLE | StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT,
        }
    }

    #[inline]
    pub fn accumulator_is_16(&self) -> bool {
        !self.p.contains(StatusFlags::MEMORY_8BIT) && !self.emulation
    }

    #[inline]
    pub fn index_is_16(&self) -> bool {
        !self.p.contains(StatusFlags::INDEX_8BIT) && !self.emulation
    }

    pub fn is_16(&self, reg: Register) -> bool {
        match reg {
            Register::A => self.accumulator_is_16(),
            Register::X | Register::Y => self.index_is_16(),
        }
    }

    pub fn get(&self, reg: Register) -> u16 {
        match reg {
            Register::A => self.a,
            Register::X => self.x,
            Register::Y => self.y,
        }
    }

    fn slot(&mut self, reg: Register) -> &mut u16 {
        match reg {
            Register::A => &mut self.a,
            Register::X => &mut self.x,
            Register::Y => &mut self.y,
        }
    }

    /// Current value of `reg` cut to its active width.
    pub fn read(&self, reg: Register) -> u16 {
        if self.is_16(reg) {
            self.get(reg)
        } else {
            self.get(reg) & 0x00FF
        }
    }

    /// Stores `value` at the register's active width and derives N/Z from
    /// what was stored. An 8-bit store keeps the high byte.
    pub fn set_register(&mut self, reg: Register, value: u16) {
        if self.is_16(reg) {
            *self.slot(reg) = value;
            self.set_nz_16(value);
        } else {
            let low = value & 0x00FF;
            let slot = self.slot(reg);
            *slot = (*slot & 0xFF00) | low;
            self.set_nz_8(low as u8);
        }
    }

    /// ±1 on X or Y, wrapping inside the index width.
    pub fn adjust_index(&mut self, reg: Register, increment: bool) {
        let wide = self.is_16(reg);
        let slot = self.slot(reg);
        if wide {
            *slot = if increment {
                slot.wrapping_add(1)
            } else {
                slot.wrapping_sub(1)
            };
            let value = *slot;
            self.set_nz_16(value);
        } else {
            let low = if increment {
                (*slot as u8).wrapping_add(1)
            } else {
                (*slot as u8).wrapping_sub(1)
            };
            *slot = (*slot & 0xFF00) | low as u16;
            self.set_nz_8(low);
        }
    }

    pub fn set_nz_8(&mut self, value: u8) {
        self.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
        self.p.set(StatusFlags::ZERO, value == 0);
    }

    pub fn set_nz_16(&mut self, value: u16) {
        self.p.set(StatusFlags::NEGATIVE, value & 0x8000 != 0);
        self.p.set(StatusFlags::ZERO, value == 0);
    }

    pub fn accumulator_mask(&self) -> u16 {
        if self.accumulator_is_16() {
            0xFFFF
        } else {
            0x00FF
        }
    }

    pub fn accumulator_sign_bit(&self) -> u16 {
        if self.accumulator_is_16() {
            0x8000
        } else {
            0x0080
        }
    }

    pub fn auto_negative(&self, value: u16) -> bool {
        value & self.accumulator_sign_bit() != 0
    }

    pub fn auto_zero(&self, value: u16) -> bool {
        value & self.accumulator_mask() == 0
    }

    /// XCE: swap carry and emulation; entering emulation clamps the
    /// registers to their 6502 shape.
    pub fn exchange_carry_emulation(&mut self) {
        let old_e = self.emulation;
        self.emulation = self.p.contains(StatusFlags::CARRY);
        self.p.set(StatusFlags::CARRY, old_e);

        if self.emulation {
            self.p.insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
            self.s = 0x0100 | (self.s & 0x00FF);
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }

    /// REP: clear the masked status bits. M and X stay set in emulation mode.
    pub fn rep(&mut self, mask: u8) {
        self.p = StatusFlags::from_bits_retain(self.p.bits() & !mask);
        if self.emulation {
            self.p.insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
        }
    }

    /// SEP: set the masked status bits. Dropping to 8-bit index registers
    /// discards their high bytes.
    pub fn sep(&mut self, mask: u8) {
        self.p = StatusFlags::from_bits_retain(self.p.bits() | mask);
        if self.p.contains(StatusFlags::INDEX_8BIT) {
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }

    #[inline]
    pub fn program_bank(&self) -> u8 {
        (self.pc >> 16) as u8
    }

    #[inline]
    pub fn pc_offset(&self) -> u16 {
        (self.pc & 0xFFFF) as u16
    }

    /// Moves within the current program bank.
    #[inline]
    pub fn set_pc_offset(&mut self, offset: u16) {
        self.pc = (self.pc & 0x00FF_0000) | offset as u32;
    }

    /// DBR-qualified data address.
    #[inline]
    pub fn data_address(&self, offset: u16) -> u32 {
        ((self.dbr as u32) << 16) | offset as u32
    }

    /// Address of the next stack slot; pinned to page 1 in emulation mode.
    pub fn stack_address(&self) -> u32 {
        if self.emulation {
            0x0100 | (self.s & 0x00FF) as u32
        } else {
            self.s as u32
        }
    }

    pub fn stack_decrement(&mut self) {
        self.s = if self.emulation {
            0x0100 | (self.s.wrapping_sub(1) & 0x00FF)
        } else {
            self.s.wrapping_sub(1)
        };
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::power_on()
    }
}
