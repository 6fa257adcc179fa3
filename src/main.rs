use std::env;
use std::process;

use snes_core::debug_flags;
use snes_core::debugger::Debugger;
use snes_core::emulator::{Emulator, RunStop};
use snes_core::shutdown;

struct Options {
    rom: String,
    steps: Option<u64>,
    trace: bool,
    breakpoints: Vec<u32>,
    dump_state: bool,
}

fn usage(program: &str) {
    eprintln!(
        "Usage: {} [--steps N] [--trace] [--break ADDR]... [--dump-state] <rom>",
        program
    );
    eprintln!("Numbers accept decimal, 0x or $ prefixed hex. Supported formats: .sfc, .smc");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut rom = None;
    let mut steps = match debug_flags::max_steps() {
        0 => None,
        n => Some(n),
    };
    let mut trace = debug_flags::trace_cpu();
    let mut breakpoints = Vec::new();
    let mut dump_state = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--steps" => {
                let value = args.get(i + 1).ok_or("--steps requires a value")?;
                steps = Some(
                    debug_flags::parse_u64_hex_or_dec(value)
                        .ok_or_else(|| format!("--steps: invalid number '{}'", value))?,
                );
                i += 2;
            }
            "--break" => {
                let value = args.get(i + 1).ok_or("--break requires an address")?;
                let addr = debug_flags::parse_u64_hex_or_dec(value)
                    .filter(|&a| a <= 0xFF_FFFF)
                    .ok_or_else(|| format!("--break: invalid address '{}'", value))?;
                breakpoints.push(addr as u32);
                i += 2;
            }
            "--trace" => {
                trace = true;
                i += 1;
            }
            "--dump-state" => {
                dump_state = true;
                i += 1;
            }
            s if s.starts_with('-') => return Err(format!("Unknown option: {}", s)),
            s => {
                if rom.replace(s.to_string()).is_some() {
                    return Err(format!("Unexpected argument: {}", s));
                }
                i += 1;
            }
        }
    }

    Ok(Options {
        rom: rom.ok_or("ROM argument missing")?,
        steps,
        trace,
        breakpoints,
        dump_state,
    })
}

fn init_logging(trace: bool) {
    let default_filter = if trace {
        "trace"
    } else if debug_flags::quiet() {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("snes-core");
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage(program);
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{}", msg);
            usage(program);
            process::exit(2);
        }
    };

    init_logging(options.trace);
    shutdown::install();

    let mut emulator = match Emulator::from_file(&options.rom) {
        Ok(emulator) => emulator,
        Err(e) => {
            log::error!("Failed to load ROM {}: {}", options.rom, e);
            eprintln!("Failed to load ROM {}: {}", options.rom, e);
            process::exit(1);
        }
    };

    let mut debugger = Debugger::new();
    for &addr in &options.breakpoints {
        debugger.add_breakpoint(addr);
    }

    let result = emulator.run(&mut debugger, shutdown::flag(), options.steps);

    if let Some(last) = debugger.last() {
        log::debug!("Last: {}", Debugger::format_entry(last));
    }

    let code = match result {
        Ok(report) => {
            match report.stop {
                RunStop::Breakpoint(pc) => log::info!("Breakpoint at {:06X} after {} steps", pc, report.steps),
                RunStop::Cancelled => log::info!("Interrupted after {} steps", report.steps),
                RunStop::BudgetExhausted | RunStop::PredicateMet => {
                    log::info!("Ran {} steps", report.steps)
                }
            }
            0
        }
        Err(e) => {
            for entry in debugger.trace() {
                log::debug!("{}", Debugger::format_entry(entry));
            }
            eprintln!("Emulation stopped: {}", e);
            1
        }
    };

    if !debug_flags::quiet() {
        println!("{}", Debugger::format_state(&emulator.cpu().regs));
        println!(
            "Cycles: {}  Instructions: {}",
            emulator.cpu().cycles(),
            emulator.cpu().instructions()
        );
    }

    if options.dump_state {
        match emulator.snapshot(false).to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize state: {}", e);
                process::exit(1);
            }
        }
    }

    if code != 0 {
        process::exit(code);
    }
}
