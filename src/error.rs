use thiserror::Error;

use crate::cartridge::MapMode;

#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ROM image too small: {size} bytes, header needs {required}")]
    RomTooSmall { size: usize, required: usize },
    #[error("unsupported addressing scheme: {0:?}")]
    UnsupportedAddressingScheme(MapMode),
    #[error("unmapped address {address:06X}")]
    UnmappedAddress { address: u32 },
    #[error("unsupported I/O register {address:04X}{}", fmt_write(.write))]
    UnsupportedIoRegister { address: u16, write: Option<u8> },
    #[error("undefined opcode {opcode:02X} at {pc:06X}")]
    UndefinedOpcode { opcode: u8, pc: u32 },
    #[error("{mnemonic}: {reason}")]
    UnsupportedInstructionVariant {
        mnemonic: &'static str,
        reason: &'static str,
    },
}

fn fmt_write(write: &Option<u8>) -> String {
    match write {
        Some(value) => format!(" (write {:02X})", value),
        None => String::from(" (read)"),
    }
}

pub type Result<T> = std::result::Result<T, EmulationError>;
