use std::collections::{HashMap, VecDeque};

use crate::cpu::{format_operands, Registers, StatusFlags, StepOutcome};

const DEFAULT_HISTORY: usize = 64;

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub address: u32,
    pub enabled: bool,
    pub hit_count: u32,
}

#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub outcome: StepOutcome,
    /// Register file after the instruction retired.
    pub registers: Registers,
    pub cycle_count: u64,
}

pub struct Debugger {
    breakpoints: HashMap<u32, Breakpoint>,
    trace_buffer: VecDeque<TraceEntry>,
    history_size: usize,
    /// PC of the breakpoint that stopped the last run; skipped once on resume.
    resume_pc: Option<u32>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    pub fn with_history(history_size: usize) -> Self {
        Self {
            breakpoints: HashMap::new(),
            trace_buffer: VecDeque::with_capacity(history_size),
            history_size,
            resume_pc: None,
        }
    }

    // ブレークポイント管理
    pub fn add_breakpoint(&mut self, address: u32) {
        let address = address & 0x00FF_FFFF;
        self.breakpoints.insert(
            address,
            Breakpoint {
                address,
                enabled: true,
                hit_count: 0,
            },
        );
        log::debug!("Breakpoint added at 0x{:06X}", address);
    }

    pub fn remove_breakpoint(&mut self, address: u32) -> bool {
        let address = address & 0x00FF_FFFF;
        let removed = self.breakpoints.remove(&address).is_some();
        if removed {
            log::debug!("Breakpoint removed from 0x{:06X}", address);
        }
        removed
    }

    pub fn toggle_breakpoint(&mut self, address: u32) {
        let address = address & 0x00FF_FFFF;
        if let Some(bp) = self.breakpoints.get_mut(&address) {
            bp.enabled = !bp.enabled;
            log::debug!(
                "Breakpoint at 0x{:06X} {}",
                address,
                if bp.enabled { "enabled" } else { "disabled" }
            );
        }
    }

    pub fn breakpoint(&self, address: u32) -> Option<&Breakpoint> {
        self.breakpoints.get(&(address & 0x00FF_FFFF))
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    /// Checked before each step; counts a hit on an enabled breakpoint.
    pub fn check_breakpoint(&mut self, pc: u32) -> bool {
        let pc = pc & 0x00FF_FFFF;
        if let Some(bp) = self.breakpoints.get_mut(&pc) {
            if bp.enabled {
                bp.hit_count += 1;
                log::info!("Breakpoint hit at 0x{:06X} (hit count: {})", pc, bp.hit_count);
                return true;
            }
        }
        false
    }

    /// Marks `pc` as the breakpoint a run stopped on.
    pub fn set_resume_pc(&mut self, pc: u32) {
        self.resume_pc = Some(pc & 0x00FF_FFFF);
    }

    /// Clears the resume marker, reporting whether it was set for `pc`.
    pub fn take_resume_pc(&mut self, pc: u32) -> bool {
        self.resume_pc.take() == Some(pc & 0x00FF_FFFF)
    }

    // トレース記録
    pub fn record(&mut self, outcome: StepOutcome, registers: Registers, cycle_count: u64) {
        if self.history_size == 0 {
            return;
        }
        if self.trace_buffer.len() == self.history_size {
            self.trace_buffer.pop_front();
        }
        self.trace_buffer.push_back(TraceEntry {
            outcome,
            registers,
            cycle_count,
        });
    }

    pub fn trace(&self) -> impl Iterator<Item = &TraceEntry> {
        self.trace_buffer.iter()
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.trace_buffer.back()
    }

    pub fn clear_trace(&mut self) {
        self.trace_buffer.clear();
    }

    /// One-line register dump.
    pub fn format_state(regs: &Registers) -> String {
        format!(
            "PC:{:02X}:{:04X} A:{:04X} X:{:04X} Y:{:04X} S:{:04X} D:{:04X} DB:{:02X} P:{} E:{}",
            regs.program_bank(),
            regs.pc_offset(),
            regs.a,
            regs.x,
            regs.y,
            regs.s,
            regs.d,
            regs.dbr,
            format_flags(regs.p),
            regs.emulation as u8
        )
    }

    pub fn format_entry(entry: &TraceEntry) -> String {
        format!(
            "{:06X} {:02X} {:<8} {:<4} {:>2}cy | {}",
            entry.outcome.pc,
            entry.outcome.opcode,
            format_operands(entry.outcome.operands()),
            entry.outcome.mnemonic,
            entry.outcome.cycles,
            Self::format_state(&entry.registers)
        )
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

/// NVMXDIZC, upper case when set.
fn format_flags(p: StatusFlags) -> String {
    const NAMES: [(StatusFlags, char); 8] = [
        (StatusFlags::NEGATIVE, 'N'),
        (StatusFlags::OVERFLOW, 'V'),
        (StatusFlags::MEMORY_8BIT, 'M'),
        (StatusFlags::INDEX_8BIT, 'X'),
        (StatusFlags::DECIMAL, 'D'),
        (StatusFlags::IRQ_DISABLE, 'I'),
        (StatusFlags::ZERO, 'Z'),
        (StatusFlags::CARRY, 'C'),
    ];
    NAMES
        .iter()
        .map(|&(flag, name)| {
            if p.contains(flag) {
                name
            } else {
                name.to_ascii_lowercase()
            }
        })
        .collect()
}
