use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{EmulationError, Result};

pub const LO_ROM_HEADER: usize = 0x7FC0;
pub const HI_ROM_HEADER: usize = 0xFFC0;

const COPIER_HEADER_LEN: usize = 512;
const TITLE_LEN: usize = 21;
const MAP_MODE_OFFSET: usize = 0x15;
const RESET_VECTOR_OFFSET: usize = 0x3C;
// Last byte a candidate needs is the high half of the reset vector.
const HEADER_SPAN: usize = RESET_VECTOR_OFFSET + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MapMode {
    LoRom,
    HiRom,
    ExHiRom,
    Unknown(u8),
}

impl MapMode {
    pub fn from_header_byte(byte: u8) -> Self {
        match byte & 0x0F {
            0b00 => MapMode::LoRom,
            0b01 => MapMode::HiRom,
            0b11 => MapMode::ExHiRom,
            other => MapMode::Unknown(other),
        }
    }
}

/// Winner of the header heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    pub offset: usize,
    pub score: i32,
    /// Map mode the image declares at the winning offset.
    pub declared: MapMode,
}

impl HeaderLocation {
    /// Bus decoding keys off the header position, not the declared byte.
    pub fn map_mode(&self) -> MapMode {
        if self.offset == LO_ROM_HEADER {
            MapMode::LoRom
        } else {
            MapMode::HiRom
        }
    }
}

#[derive(Debug, Clone)]
pub struct RomImage {
    data: Vec<u8>,
    header: HeaderLocation,
    title: String,
    had_copier_header: bool,
}

impl RomImage {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Self::load_from_bytes(data)
    }

    pub fn load_from_bytes(mut data: Vec<u8>) -> Result<Self> {
        let had_copier_header = data.len() % 1024 == COPIER_HEADER_LEN;
        if had_copier_header {
            data.drain(0..COPIER_HEADER_LEN);
            log::info!("Note: headered ROM, skipped {} byte copier header", COPIER_HEADER_LEN);
        }

        let header = locate_header(&data)?;
        let title = extract_title(&data[header.offset..header.offset + TITLE_LEN]);
        log::info!("Header at {:04X}, title '{}'", header.offset, title);
        if header.declared != header.map_mode() {
            log::warn!(
                "Header at {:04X} declares {:?}; decoding as {:?}",
                header.offset,
                header.declared,
                header.map_mode()
            );
        }

        Ok(RomImage {
            data,
            header,
            title,
            had_copier_header,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn header(&self) -> HeaderLocation {
        self.header
    }

    pub fn header_offset(&self) -> usize {
        self.header.offset
    }

    pub fn map_mode(&self) -> MapMode {
        self.header.map_mode()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn had_copier_header(&self) -> bool {
        self.had_copier_header
    }

    /// Read straight from the image; the bus is not involved at reset.
    pub fn reset_vector(&self) -> u16 {
        read_u16_raw(&self.data, self.header.offset + RESET_VECTOR_OFFSET)
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }
}

fn read_u16_raw(rom: &[u8], at: usize) -> u16 {
    (rom[at] as u16) | ((rom[at + 1] as u16) << 8)
}

fn fits(rom: &[u8], offset: usize) -> bool {
    offset + HEADER_SPAN <= rom.len()
}

/// Picks the header candidate that best matches the image's own map-mode byte
/// and reset vector. Ties go to LoROM.
pub fn locate_header(rom: &[u8]) -> Result<HeaderLocation> {
    if !fits(rom, LO_ROM_HEADER) {
        return Err(EmulationError::RomTooSmall {
            size: rom.len(),
            required: LO_ROM_HEADER + HEADER_SPAN,
        });
    }

    let mut winner = HeaderLocation {
        offset: LO_ROM_HEADER,
        score: score_header(rom, LO_ROM_HEADER)?,
        declared: MapMode::from_header_byte(rom[LO_ROM_HEADER + MAP_MODE_OFFSET]),
    };

    if fits(rom, HI_ROM_HEADER) {
        let other = score_header(rom, HI_ROM_HEADER)?;
        log::debug!("header scores: LoROM {} HiROM {}", winner.score, other);
        if other > winner.score {
            winner = HeaderLocation {
                offset: HI_ROM_HEADER,
                score: other,
                declared: MapMode::from_header_byte(rom[HI_ROM_HEADER + MAP_MODE_OFFSET]),
            };
        }
    }

    log::debug!("Determined winning offset: {:04X}", winner.offset);
    Ok(winner)
}

pub fn score_header(rom: &[u8], offset: usize) -> Result<i32> {
    if !fits(rom, offset) {
        return Err(EmulationError::RomTooSmall {
            size: rom.len(),
            required: offset + HEADER_SPAN,
        });
    }

    let mut score = 0;

    match MapMode::from_header_byte(rom[offset + MAP_MODE_OFFSET]) {
        MapMode::LoRom => score += if offset == LO_ROM_HEADER { 1 } else { -10 },
        MapMode::HiRom => score += if offset == HI_ROM_HEADER { 1 } else { -10 },
        MapMode::ExHiRom => {
            return Err(EmulationError::UnsupportedAddressingScheme(MapMode::ExHiRom))
        }
        MapMode::Unknown(mode) => {
            log::warn!("[{:04X}] Weird map mode {:X}", offset, mode);
            score -= 100;
        }
    }

    let reset_vector = read_u16_raw(rom, offset + RESET_VECTOR_OFFSET);
    let floor = if offset == LO_ROM_HEADER { 0x8000 } else { 0xC000 };
    if reset_vector < floor {
        score -= 10;
    }

    Ok(score)
}

fn extract_title(title_bytes: &[u8]) -> String {
    let mut title = String::with_capacity(TITLE_LEN);
    for &byte in title_bytes {
        if byte == 0x00 {
            break;
        } else if (0x20..=0x7E).contains(&byte) {
            title.push(byte as char);
        } else {
            title.push('?');
        }
    }
    title.trim_end().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 32 KiB LoROM image with the given title, map byte and reset vector.
    pub(crate) fn lorom_image(map_byte: u8, reset: u16) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[LO_ROM_HEADER..LO_ROM_HEADER + 9].copy_from_slice(b"TEST CART");
        for b in &mut rom[LO_ROM_HEADER + 9..LO_ROM_HEADER + TITLE_LEN] {
            *b = b' ';
        }
        rom[LO_ROM_HEADER + MAP_MODE_OFFSET] = map_byte;
        rom[LO_ROM_HEADER + RESET_VECTOR_OFFSET] = reset as u8;
        rom[LO_ROM_HEADER + RESET_VECTOR_OFFSET + 1] = (reset >> 8) as u8;
        rom
    }

    #[test]
    fn lorom_header_is_detected() {
        let rom = RomImage::load_from_bytes(lorom_image(0x20, 0x8000)).unwrap();
        assert_eq!(rom.header_offset(), LO_ROM_HEADER);
        assert_eq!(rom.map_mode(), MapMode::LoRom);
        assert_eq!(rom.reset_vector(), 0x8000);
        assert_eq!(rom.title(), "TEST CART");
        assert!(!rom.had_copier_header());
    }

    #[test]
    fn copier_header_is_stripped() {
        let mut data = vec![0xEEu8; COPIER_HEADER_LEN];
        data.extend(lorom_image(0x20, 0x8123));
        let rom = RomImage::load_from_bytes(data).unwrap();
        assert!(rom.had_copier_header());
        assert_eq!(rom.size(), 0x8000);
        assert_eq!(rom.reset_vector(), 0x8123);
    }

    #[test]
    fn header_position_decides_mapping_over_declared_byte() {
        // Only the LoROM candidate fits in 32 KiB, so it wins despite its byte.
        let rom = RomImage::load_from_bytes(lorom_image(0x21, 0x8000)).unwrap();
        assert_eq!(rom.header().declared, MapMode::HiRom);
        assert_eq!(rom.header().score, -10);
        assert_eq!(rom.map_mode(), MapMode::LoRom);

        let rom = RomImage::load_from_bytes(lorom_image(0x20, 0x8000)).unwrap();
        assert_eq!(rom.header().declared, MapMode::LoRom);
    }

    #[test]
    fn hirom_header_wins_when_declared() {
        let mut rom = vec![0u8; 0x10000];
        // LoROM slot: garbage map byte and low reset vector.
        rom[LO_ROM_HEADER + MAP_MODE_OFFSET] = 0x21;
        rom[HI_ROM_HEADER + MAP_MODE_OFFSET] = 0x21;
        rom[HI_ROM_HEADER + RESET_VECTOR_OFFSET + 1] = 0xC0;
        let loc = locate_header(&rom).unwrap();
        assert_eq!(loc.offset, HI_ROM_HEADER);
        assert_eq!(loc.score, 1);
        assert_eq!(loc.map_mode(), MapMode::HiRom);
    }

    #[test]
    fn ties_keep_lorom() {
        let rom = vec![0u8; 0x10000];
        // Both candidates declare LoROM with a zero vector: LoROM -9, HiROM -20.
        let loc = locate_header(&rom).unwrap();
        assert_eq!(loc.offset, LO_ROM_HEADER);
        assert_eq!(loc.score, -9);

        let mut weird = vec![0u8; 0x10000];
        weird[LO_ROM_HEADER + MAP_MODE_OFFSET] = 0x05;
        weird[HI_ROM_HEADER + MAP_MODE_OFFSET] = 0x05;
        weird[LO_ROM_HEADER + RESET_VECTOR_OFFSET + 1] = 0xC0;
        weird[HI_ROM_HEADER + RESET_VECTOR_OFFSET + 1] = 0xC0;
        let loc = locate_header(&weird).unwrap();
        assert_eq!(loc.offset, LO_ROM_HEADER);
        assert_eq!(loc.score, -100);
    }

    #[test]
    fn detection_is_deterministic() {
        let rom = lorom_image(0x30, 0x9000);
        let first = locate_header(&rom).unwrap();
        let second = locate_header(&rom).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn exhirom_is_rejected() {
        let rom = lorom_image(0x33, 0x8000);
        assert!(matches!(
            RomImage::load_from_bytes(rom),
            Err(EmulationError::UnsupportedAddressingScheme(MapMode::ExHiRom))
        ));
    }

    #[test]
    fn short_buffer_is_rejected_before_indexing() {
        assert!(matches!(
            locate_header(&[0u8; 0x100]),
            Err(EmulationError::RomTooSmall { size: 0x100, .. })
        ));
        assert!(matches!(
            RomImage::load_from_bytes(Vec::new()),
            Err(EmulationError::RomTooSmall { size: 0, .. })
        ));
    }

    #[test]
    fn title_stops_at_nul_and_masks_binary() {
        assert_eq!(extract_title(b"MARIO\0WORLD"), "MARIO");
        assert_eq!(extract_title(&[b'A', 0x81, b'B', b' ', b' ']), "A?B");
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            RomImage::load_from_file("/nonexistent/rom.sfc"),
            Err(EmulationError::Io(_))
        ));
    }
}
