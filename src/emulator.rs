use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::Bus;
use crate::cartridge::RomImage;
use crate::cpu::{Cpu, StepOutcome};
use crate::debugger::Debugger;
use crate::error::Result;
use crate::snapshot::Snapshot;

/// Why a run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStop {
    BudgetExhausted,
    PredicateMet,
    /// Enabled breakpoint at this PC; the instruction there has not run.
    Breakpoint(u32),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub stop: RunStop,
    pub steps: u64,
}

pub struct Emulator {
    cpu: Cpu,
    bus: Bus,
}

impl Emulator {
    pub fn new(rom: RomImage) -> Self {
        let reset_vector = rom.reset_vector();
        let mut cpu = Cpu::new();
        cpu.reset(reset_vector);
        if !crate::debug_flags::quiet() {
            log::info!(
                "Reset: {} ({:?}, {} KiB), PC={:06X}",
                rom.title(),
                rom.map_mode(),
                rom.size() / 1024,
                cpu.regs.pc
            );
        }
        Emulator {
            cpu,
            bus: Bus::new(rom),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(RomImage::load_from_file(path)?))
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn step(&mut self) -> Result<StepOutcome> {
        self.cpu.step(&mut self.bus)
    }

    /// Executes exactly `max_steps` instructions unless one fails.
    pub fn run_for(&mut self, max_steps: u64) -> Result<RunReport> {
        for _ in 0..max_steps {
            self.step()?;
        }
        Ok(RunReport {
            stop: RunStop::BudgetExhausted,
            steps: max_steps,
        })
    }

    /// Steps until `pred` holds after an instruction, or the budget runs out.
    pub fn run_until<F>(&mut self, mut pred: F, max_steps: u64) -> Result<RunReport>
    where
        F: FnMut(&Cpu, &Bus) -> bool,
    {
        let mut steps = 0;
        while steps < max_steps {
            self.step()?;
            steps += 1;
            if pred(&self.cpu, &self.bus) {
                return Ok(RunReport {
                    stop: RunStop::PredicateMet,
                    steps,
                });
            }
        }
        Ok(RunReport {
            stop: RunStop::BudgetExhausted,
            steps,
        })
    }

    /// Debugger-driven loop. Breakpoints are checked before every step; the
    /// one that stopped the previous call is skipped once so `run` can resume.
    /// `cancel` is polled between steps; `max_steps` of `None` is unbounded.
    pub fn run(
        &mut self,
        debugger: &mut Debugger,
        cancel: &AtomicBool,
        max_steps: Option<u64>,
    ) -> Result<RunReport> {
        let mut steps = 0u64;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(RunReport {
                    stop: RunStop::Cancelled,
                    steps,
                });
            }
            if max_steps.is_some_and(|max| steps >= max) {
                return Ok(RunReport {
                    stop: RunStop::BudgetExhausted,
                    steps,
                });
            }
            let pc = self.cpu.regs.pc;
            let resuming = steps == 0 && debugger.take_resume_pc(pc);
            if !resuming && debugger.check_breakpoint(pc) {
                debugger.set_resume_pc(pc);
                log::info!("{}", Debugger::format_state(&self.cpu.regs));
                return Ok(RunReport {
                    stop: RunStop::Breakpoint(pc),
                    steps,
                });
            }

            let outcome = match self.step() {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!(
                        "Stopped after {} steps: {} | {}",
                        steps,
                        e,
                        Debugger::format_state(&self.cpu.regs)
                    );
                    return Err(e);
                }
            };
            debugger.record(outcome, self.cpu.regs, self.cpu.cycles());
            steps += 1;
        }
    }

    pub fn snapshot(&self, include_wram: bool) -> Snapshot {
        Snapshot::capture(&self.cpu, &self.bus, include_wram)
    }
}
