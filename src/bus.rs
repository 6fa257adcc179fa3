pub mod io;
pub mod mapper;

use crate::cartridge::{MapMode, RomImage};
use crate::cpu_bus::CpuBus;
use crate::debug_flags;
use crate::error::{EmulationError, Result};
use crate::memory::Wram;

use io::{IoRegisters, APUIO0, APUIO1};
use mapper::Region;

/// Values the sound CPU leaves in APUIO0/APUIO1 once its boot ROM is ready.
pub const APU_READY_SIGNATURE: [u8; 2] = [0xAA, 0xBB];

pub struct Bus {
    rom: RomImage,
    map_mode: MapMode,
    wram: Wram,
    io: IoRegisters,
    accumulator_16: bool,
    apu_signature_after: Option<u64>,
    retired: u64,
}

impl Bus {
    pub fn new(rom: RomImage) -> Self {
        let after = debug_flags::apu_boot_signature();
        Bus {
            map_mode: rom.map_mode(),
            rom,
            wram: Wram::new(),
            io: IoRegisters::new(),
            accumulator_16: false,
            apu_signature_after: (after != 0).then_some(after),
            retired: 0,
        }
    }

    /// Latch the APU ready signature once `instructions` have retired.
    /// `None` leaves the ports alone.
    pub fn set_apu_boot_signature(&mut self, instructions: Option<u64>) {
        self.apu_signature_after = instructions;
    }

    pub fn rom(&self) -> &RomImage {
        &self.rom
    }

    pub fn map_mode(&self) -> MapMode {
        self.map_mode
    }

    pub fn io(&self) -> &IoRegisters {
        &self.io
    }

    pub fn wram(&self) -> &[u8] {
        self.wram.as_slice()
    }

    pub fn peek_wram(&self, index: usize) -> Option<u8> {
        self.wram.read(index)
    }

    pub fn accumulator_16(&self) -> bool {
        self.accumulator_16
    }

    pub fn instructions_retired(&self) -> u64 {
        self.retired
    }
}

impl CpuBus for Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        match mapper::decode(self.map_mode, addr)? {
            Region::Wram(index) => self
                .wram
                .read(index)
                .ok_or(EmulationError::UnmappedAddress { address: addr }),
            Region::Io(reg) => self.io.read(reg),
            Region::Rom(index) => self
                .rom
                .get(index)
                .ok_or(EmulationError::UnmappedAddress { address: addr }),
        }
    }

    fn write_u8(&mut self, addr: u32, value: u8) -> Result<()> {
        match mapper::decode(self.map_mode, addr)? {
            Region::Wram(index) => {
                if self.wram.write(index, value) {
                    Ok(())
                } else {
                    Err(EmulationError::UnmappedAddress { address: addr })
                }
            }
            Region::Io(reg) => self.io.write(reg, value),
            Region::Rom(_) => Err(EmulationError::UnmappedAddress { address: addr }),
        }
    }

    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        if self.accumulator_16 {
            if let Region::Io(reg @ (APUIO0 | APUIO1)) = mapper::decode(self.map_mode, addr)? {
                if let Some(pair) = self.io.read_apu_pair(reg) {
                    return Ok(pair);
                }
            }
        }
        let lo = self.read_u8(addr)? as u16;
        let hi = self.read_u8(crate::cpu_bus::next_address(addr))? as u16;
        Ok((hi << 8) | lo)
    }

    fn set_accumulator_16(&mut self, wide: bool) {
        self.accumulator_16 = wide;
    }

    fn instruction_retired(&mut self) {
        self.retired += 1;
        if self.apu_signature_after == Some(self.retired) {
            log::debug!("APU ready signature latched after {} instructions", self.retired);
            self.io.apu_ports[0] = APU_READY_SIGNATURE[0];
            self.io.apu_ports[1] = APU_READY_SIGNATURE[1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::tests::lorom_image;

    fn lorom_bus() -> Bus {
        let mut data = lorom_image(0x20, 0x8000);
        for (i, b) in data[..0x100].iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut bus = Bus::new(RomImage::load_from_bytes(data).unwrap());
        bus.set_apu_boot_signature(None);
        bus
    }

    #[test]
    fn wram_round_trip_on_every_system_bank() {
        let mut bus = lorom_bus();
        for bank in (0x00u32..=0x3F).chain(0x80..=0xBF) {
            for offset in [0x0000u32, 0x0100, 0x1FFF] {
                let addr = (bank << 16) | offset;
                let value = (bank as u8) ^ (offset as u8) ^ 0x5A;
                bus.write_u8(addr, value).unwrap();
                assert_eq!(bus.read_u8(addr).unwrap(), value);
            }
        }
    }

    #[test]
    fn low_wram_is_shared_with_bank_7e() {
        let mut bus = lorom_bus();
        bus.write_u8(0x00_0042, 0x99).unwrap();
        assert_eq!(bus.read_u8(0x7E_0042).unwrap(), 0x99);
        assert_eq!(bus.read_u8(0x80_0042).unwrap(), 0x99);

        bus.write_u8(0x7F_0042, 0x11).unwrap();
        assert_eq!(bus.peek_wram(0x10042), Some(0x11));
        assert_eq!(bus.read_u8(0x7E_0042).unwrap(), 0x99);
    }

    #[test]
    fn rom_reads_follow_lorom_formula() {
        let mut bus = lorom_bus();
        let rom = bus.rom().data().to_vec();
        for offset in [0x8000u16, 0x8001, 0x80FF, 0xFFC0, 0xFFFD] {
            let expected = rom[mapper::lorom_index(0, offset)];
            assert_eq!(bus.read_u8(offset as u32).unwrap(), expected);
        }
    }

    #[test]
    fn rom_reads_past_the_image_are_unmapped() {
        let mut bus = lorom_bus();
        assert!(matches!(
            bus.read_u8(0x01_8000),
            Err(EmulationError::UnmappedAddress { address: 0x01_8000 })
        ));
    }

    #[test]
    fn writes_to_rom_are_refused() {
        let mut bus = lorom_bus();
        assert!(matches!(
            bus.write_u8(0x00_8000, 0x12),
            Err(EmulationError::UnmappedAddress { address: 0x00_8000 })
        ));
    }

    #[test]
    fn sixteen_bit_access_is_little_endian() {
        let mut bus = lorom_bus();
        bus.write_u16(0x00_0010, 0xBEEF).unwrap();
        assert_eq!(bus.read_u8(0x00_0010).unwrap(), 0xEF);
        assert_eq!(bus.read_u8(0x00_0011).unwrap(), 0xBE);
        assert_eq!(bus.read_u16(0x7E_0010).unwrap(), 0xBEEF);
    }

    #[test]
    fn apu_latch_reads_depend_on_accumulator_width() {
        let mut bus = lorom_bus();
        bus.write_u8(0x00_2140, 0xAA).unwrap();
        bus.write_u8(0x00_2141, 0x77).unwrap();

        bus.set_accumulator_16(false);
        assert_eq!(bus.read_u8(0x00_2140).unwrap(), 0xAA);

        assert!(!bus.accumulator_16());
        bus.set_accumulator_16(true);
        assert!(bus.accumulator_16());
        assert_eq!(bus.read_u16(0x00_2140).unwrap(), 0x77AA);
        assert_eq!(bus.read_u8(0x00_2140).unwrap(), 0xAA);
    }

    #[test]
    fn unknown_io_is_an_error() {
        let mut bus = lorom_bus();
        assert!(matches!(
            bus.read_u8(0x00_2100),
            Err(EmulationError::UnsupportedIoRegister { address: 0x2100, write: None })
        ));
        assert!(matches!(
            bus.write_u8(0x80_4016, 1),
            Err(EmulationError::UnsupportedIoRegister { address: 0x4016, .. })
        ));
    }

    #[test]
    fn apu_signature_appears_after_configured_instructions() {
        let mut bus = lorom_bus();
        bus.set_apu_boot_signature(Some(3));
        bus.instruction_retired();
        bus.instruction_retired();
        assert_eq!(bus.io().apu_ports[0], 0);
        bus.instruction_retired();
        assert_eq!(bus.io().apu_ports[..2], APU_READY_SIGNATURE);
    }

    #[test]
    fn hirom_image_refuses_every_access() {
        let mut data = vec![0u8; 0x10000];
        data[0xFFC0 + 0x15] = 0x21;
        data[0xFFC0 + 0x3D] = 0xC0;
        let mut bus = Bus::new(RomImage::load_from_bytes(data).unwrap());
        assert_eq!(bus.map_mode(), MapMode::HiRom);
        assert!(matches!(
            bus.read_u8(0x00_0000),
            Err(EmulationError::UnsupportedAddressingScheme(MapMode::HiRom))
        ));
        assert!(matches!(
            bus.write_u8(0x7E_0000, 1),
            Err(EmulationError::UnsupportedAddressingScheme(MapMode::HiRom))
        ));
    }
}
