use crate::cartridge::MapMode;
use crate::error::{EmulationError, Result};

/// Where a 24-bit CPU address lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Wram(usize),
    Io(u16),
    Rom(usize),
}

#[inline]
pub fn split(addr: u32) -> (u8, u16) {
    (((addr >> 16) & 0xFF) as u8, (addr & 0xFFFF) as u16)
}

#[inline]
pub fn is_system_bank(bank: u8) -> bool {
    matches!(bank, 0x00..=0x3F | 0x80..=0xBF)
}

/// Decodes `addr` for the given scheme. Only LoROM is mapped; every access
/// on any other scheme is refused.
pub fn decode(mode: MapMode, addr: u32) -> Result<Region> {
    if mode != MapMode::LoRom {
        return Err(EmulationError::UnsupportedAddressingScheme(mode));
    }

    let (bank, offset) = split(addr);

    if is_system_bank(bank) {
        match offset {
            0x0000..=0x1FFF => return Ok(Region::Wram(offset as usize)),
            0x2000..=0x5FFF => return Ok(Region::Io(offset)),
            _ => {}
        }
    }

    match bank {
        0x7E => return Ok(Region::Wram(offset as usize)),
        0x7F => return Ok(Region::Wram(0x10000 + offset as usize)),
        _ => {}
    }

    if offset >= 0x8000 {
        return Ok(Region::Rom(lorom_index(bank, offset)));
    }

    Err(EmulationError::UnmappedAddress { address: addr })
}

#[inline]
pub fn lorom_index(bank: u8, offset: u16) -> usize {
    (offset as usize - 0x8000) + (bank as usize) * 0x8000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_banks_mirror_low_wram() {
        assert_eq!(decode(MapMode::LoRom, 0x00_1234).unwrap(), Region::Wram(0x1234));
        assert_eq!(decode(MapMode::LoRom, 0xBF_1FFF).unwrap(), Region::Wram(0x1FFF));
        assert_eq!(decode(MapMode::LoRom, 0x80_2140).unwrap(), Region::Io(0x2140));
        assert_eq!(decode(MapMode::LoRom, 0x3F_5FFF).unwrap(), Region::Io(0x5FFF));
    }

    #[test]
    fn wram_banks_cover_both_halves() {
        assert_eq!(decode(MapMode::LoRom, 0x7E_2140).unwrap(), Region::Wram(0x2140));
        assert_eq!(decode(MapMode::LoRom, 0x7F_0000).unwrap(), Region::Wram(0x10000));
        assert_eq!(decode(MapMode::LoRom, 0x7F_FFFF).unwrap(), Region::Wram(0x1FFFF));
    }

    #[test]
    fn rom_window_uses_32k_banks() {
        assert_eq!(decode(MapMode::LoRom, 0x00_8000).unwrap(), Region::Rom(0));
        assert_eq!(decode(MapMode::LoRom, 0x01_8000).unwrap(), Region::Rom(0x8000));
        assert_eq!(decode(MapMode::LoRom, 0x40_FFFF).unwrap(), Region::Rom(0x207FFF));
        assert_eq!(decode(MapMode::LoRom, 0x80_8000).unwrap(), Region::Rom(0x400000));
    }

    #[test]
    fn gaps_are_unmapped() {
        for addr in [0x00_6000, 0x00_7FFF, 0x40_0000, 0xC0_1000] {
            assert!(matches!(
                decode(MapMode::LoRom, addr),
                Err(EmulationError::UnmappedAddress { address }) if address == addr
            ));
        }
    }

    #[test]
    fn hirom_is_refused() {
        assert!(matches!(
            decode(MapMode::HiRom, 0x00_0000),
            Err(EmulationError::UnsupportedAddressingScheme(MapMode::HiRom))
        ));
    }
}
