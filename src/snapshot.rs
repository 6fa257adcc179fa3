use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::cpu::{Cpu, StatusFlags};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub rom_title: String,
    pub map_mode: String,
    pub cpu: CpuSnapshot,
    pub io: IoSnapshot,
    pub wram_checksum: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wram: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub pc: u32,
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub s: u16,
    pub d: u16,
    pub dbr: u8,
    pub p: u8,
    pub flags: Vec<String>,
    pub emulation_mode: bool,
    pub cycles: u64,
    pub instructions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoSnapshot {
    pub inidisp: u8,
    pub obsel: u8,
    pub apu_ports: [u8; 4],
    pub nmitimen: u8,
    pub mdmaen: u8,
    pub hdmaen: u8,
}

impl Snapshot {
    pub fn capture(cpu: &Cpu, bus: &Bus, include_wram: bool) -> Self {
        let regs = &cpu.regs;
        let io = bus.io();
        Snapshot {
            version: SNAPSHOT_VERSION,
            rom_title: bus.rom().title().to_string(),
            map_mode: format!("{:?}", bus.map_mode()),
            cpu: CpuSnapshot {
                pc: regs.pc,
                a: regs.a,
                x: regs.x,
                y: regs.y,
                s: regs.s,
                d: regs.d,
                dbr: regs.dbr,
                p: regs.p.bits(),
                flags: flag_names(regs.p),
                emulation_mode: regs.emulation,
                cycles: cpu.cycles(),
                instructions: cpu.instructions(),
            },
            io: IoSnapshot {
                inidisp: io.inidisp.bits(),
                obsel: io.obsel,
                apu_ports: io.apu_ports,
                nmitimen: io.nmitimen.bits(),
                mdmaen: io.mdmaen.bits(),
                hdmaen: io.hdmaen.bits(),
            },
            wram_checksum: checksum(bus.wram()),
            wram: include_wram.then(|| bus.wram().to_vec()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn flag_names(p: StatusFlags) -> Vec<String> {
    p.iter_names().map(|(name, _)| name.to_string()).collect()
}

/// FNV-1a over the buffer.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0x811C_9DC5u32, |hash, &byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::tests::lorom_image;
    use crate::cartridge::RomImage;
    use crate::cpu_bus::CpuBus;

    fn machine() -> (Cpu, Bus) {
        let rom = RomImage::load_from_bytes(lorom_image(0x20, 0x8000)).unwrap();
        let mut cpu = Cpu::new();
        cpu.reset(rom.reset_vector());
        (cpu, Bus::new(rom))
    }

    #[test]
    fn capture_reflects_machine_state() {
        let (mut cpu, mut bus) = machine();
        cpu.regs.a = 0x1234;
        cpu.regs.p.insert(StatusFlags::CARRY);
        bus.write_u8(0x2140, 0xAA).unwrap();
        bus.write_u8(0x2100, 0x8F).unwrap();

        let snap = Snapshot::capture(&cpu, &bus, false);

        assert_eq!(snap.rom_title, "TEST CART");
        assert_eq!(snap.map_mode, "LoRom");
        assert_eq!(snap.cpu.pc, 0x8000);
        assert_eq!(snap.cpu.a, 0x1234);
        assert!(snap.cpu.flags.iter().any(|f| f == "CARRY"));
        assert!(snap.cpu.flags.iter().any(|f| f == "MEMORY_8BIT"));
        assert!(!snap.cpu.flags.iter().any(|f| f == "ZERO"));
        assert_eq!(snap.io.apu_ports, [0xAA, 0, 0, 0]);
        assert_eq!(snap.io.inidisp, 0x8F);
        assert!(snap.wram.is_none());
    }

    #[test]
    fn wram_checksum_tracks_writes() {
        let (cpu, mut bus) = machine();
        let before = Snapshot::capture(&cpu, &bus, false).wram_checksum;
        bus.write_u8(0x7E_1000, 0x01).unwrap();
        let after = Snapshot::capture(&cpu, &bus, true);
        assert_ne!(before, after.wram_checksum);
        assert_eq!(after.wram.as_ref().map(|w| w[0x1000]), Some(0x01));
    }

    #[test]
    fn json_survives_a_reload() {
        let (cpu, bus) = machine();
        let snap = Snapshot::capture(&cpu, &bus, false);
        let json = snap.to_json().unwrap();
        assert!(json.contains("\"rom_title\": \"TEST CART\""));
        assert!(!json.contains("\"wram\":"));
        assert_eq!(Snapshot::from_json(&json).unwrap(), snap);
    }
}
