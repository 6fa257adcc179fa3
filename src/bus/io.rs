use bitflags::bitflags;

use crate::error::{EmulationError, Result};

pub const INIDISP: u16 = 0x2100;
pub const OBSEL: u16 = 0x2101;
pub const APUIO0: u16 = 0x2140;
pub const APUIO1: u16 = 0x2141;
pub const APUIO2: u16 = 0x2142;
pub const APUIO3: u16 = 0x2143;
pub const NMITIMEN: u16 = 0x4200;
pub const MDMAEN: u16 = 0x420B;
pub const HDMAEN: u16 = 0x420C;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DisplayControl: u8 {
        const BRIGHTNESS = 0b00001111;
        const FORCED_BLANK = 0b10000000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptEnable: u8 {
        const JOYPAD_AUTO_READ = 0b00000001;
        const H_IRQ = 0b00010000;
        const V_IRQ = 0b00100000;
        const VBLANK_NMI = 0b10000000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DmaChannels: u8 {
        const CHANNEL_0 = 0b00000001;
        const CHANNEL_1 = 0b00000010;
        const CHANNEL_2 = 0b00000100;
        const CHANNEL_3 = 0b00001000;
        const CHANNEL_4 = 0b00010000;
        const CHANNEL_5 = 0b00100000;
        const CHANNEL_6 = 0b01000000;
        const CHANNEL_7 = 0b10000000;
    }
}

/// CPU-visible hardware registers in the $2000-$5FFF window.
#[derive(Debug, Clone, Default)]
pub struct IoRegisters {
    pub inidisp: DisplayControl,
    pub obsel: u8,
    pub apu_ports: [u8; 4],
    pub nmitimen: InterruptEnable,
    pub mdmaen: DmaChannels,
    pub hdmaen: DmaChannels,
}

impl IoRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, addr: u16, value: u8) -> Result<()> {
        match addr {
            INIDISP => self.inidisp = DisplayControl::from_bits_retain(value),
            OBSEL => self.obsel = value,
            APUIO0..=APUIO3 => {
                let port = (addr - APUIO0) as usize;
                self.apu_ports[port] = value;
                log::debug!("[{}] WROTE {:02X}", port, value);
            }
            NMITIMEN => self.nmitimen = InterruptEnable::from_bits_retain(value),
            MDMAEN => self.mdmaen = DmaChannels::from_bits_retain(value),
            HDMAEN => self.hdmaen = DmaChannels::from_bits_retain(value),
            _ => {
                return Err(EmulationError::UnsupportedIoRegister {
                    address: addr,
                    write: Some(value),
                })
            }
        }
        Ok(())
    }

    pub fn read(&self, addr: u16) -> Result<u8> {
        match addr {
            APUIO0..=APUIO3 => Ok(self.apu_ports[(addr - APUIO0) as usize]),
            _ => Err(EmulationError::UnsupportedIoRegister {
                address: addr,
                write: None,
            }),
        }
    }

    /// Latch pair seen by a 16-bit accumulator read of $2140/$2141.
    pub fn read_apu_pair(&self, addr: u16) -> Option<u16> {
        match addr {
            APUIO0 | APUIO1 => {
                let port = (addr - APUIO0) as usize;
                Some(((self.apu_ports[port + 1] as u16) << 8) | self.apu_ports[port] as u16)
            }
            _ => None,
        }
    }

    pub fn brightness(&self) -> u8 {
        (self.inidisp & DisplayControl::BRIGHTNESS).bits()
    }

    pub fn forced_blank(&self) -> bool {
        self.inidisp.contains(DisplayControl::FORCED_BLANK)
    }

    /// Sprite size selection, OBSEL bits 5-7.
    pub fn obj_size(&self) -> u8 {
        self.obsel >> 5
    }

    /// Name-select gap, OBSEL bits 3-4.
    pub fn obj_gap(&self) -> u8 {
        (self.obsel >> 3) & 0x03
    }

    /// Sprite tile base, OBSEL bits 0-2.
    pub fn obj_tile_base(&self) -> u8 {
        self.obsel & 0x07
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognised_writes_land_in_named_registers() {
        let mut io = IoRegisters::new();
        io.write(INIDISP, 0x8F).unwrap();
        io.write(OBSEL, 0b101_10_011).unwrap();
        io.write(NMITIMEN, 0x81).unwrap();
        io.write(MDMAEN, 0x03).unwrap();
        io.write(HDMAEN, 0x80).unwrap();

        assert!(io.forced_blank());
        assert_eq!(io.brightness(), 0x0F);
        assert_eq!(io.obj_size(), 0b101);
        assert_eq!(io.obj_gap(), 0b10);
        assert_eq!(io.obj_tile_base(), 0b011);
        assert!(io.nmitimen.contains(InterruptEnable::VBLANK_NMI | InterruptEnable::JOYPAD_AUTO_READ));
        assert_eq!(io.mdmaen, DmaChannels::CHANNEL_0 | DmaChannels::CHANNEL_1);
        assert_eq!(io.hdmaen, DmaChannels::CHANNEL_7);
    }

    #[test]
    fn latches_read_back_individually() {
        let mut io = IoRegisters::new();
        for (i, addr) in (APUIO0..=APUIO3).enumerate() {
            io.write(addr, 0x10 + i as u8).unwrap();
        }
        assert_eq!(io.read(APUIO2).unwrap(), 0x12);
        assert_eq!(io.read_apu_pair(APUIO0), Some(0x1110));
        assert_eq!(io.read_apu_pair(APUIO1), Some(0x1211));
        assert_eq!(io.read_apu_pair(APUIO2), None);
    }

    #[test]
    fn unknown_registers_are_errors() {
        let mut io = IoRegisters::new();
        assert!(matches!(
            io.write(0x2118, 0x55),
            Err(EmulationError::UnsupportedIoRegister { address: 0x2118, write: Some(0x55) })
        ));
        assert!(matches!(
            io.read(INIDISP),
            Err(EmulationError::UnsupportedIoRegister { address: INIDISP, write: None })
        ));
    }
}
