//! 65C816 execution core for LoROM SNES cartridges: ROM loading and header
//! detection, the CPU-visible memory bus and an opcode-table interpreter.

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod cpu_bus;
pub mod debug_flags;
pub mod debugger;
pub mod emulator;
pub mod error;
pub mod memory;
pub mod shutdown;
pub mod snapshot;

pub use cartridge::{MapMode, RomImage};
pub use cpu::{Cpu, Registers, StatusFlags, StepOutcome};
pub use emulator::{Emulator, RunReport, RunStop};
pub use error::{EmulationError, Result};
