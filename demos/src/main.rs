/*!
demo_host - a small reference host that loads a flat binary image, wires
it up to either a 6502/6510 or a Z80 core plus a [`cyclecore::periph::Pit`]
peripheral, and runs it for a fixed number of ticks using
[`cyclecore::scheduler`]'s helpers.

This is reference plumbing for the crate's pin-bus contract, not a real
machine: no keyboard matrix, no video decoder, no cartridge loader. See
`SPEC_FULL.md` section 1 for what those external collaborators are
expected to look like.

Usage: `demo_host <cpu> <image> [cycles]`, where `<cpu>` is `6502`,
`6510`, or `z80`, and `<image>` is a flat binary loaded at address 0.
*/

use std::env;
use std::fs;
use std::process::ExitCode;

use cyclecore::periph::Pit;
use cyclecore::peripheral::Peripheral;
use cyclecore::pins::{self, mos};
use cyclecore::scheduler::{tick_m6502, tick_z80, Bus, FlatMemory};
use cyclecore::m6502::io6510::Mos6510Config;
use cyclecore::{M6502, M6502Config, Mos6510, Pins, Z80, Z80Config};

const DEFAULT_CYCLES: u64 = 1_000_000;
const MEM_SIZE: usize = 0x1_0000;

/// The one place this workspace surfaces a `Result`: loading the flat
/// image off disk. Everything downstream of that is either a real CPU
/// behavior (silent, matches hardware) or a `panic!` on host misuse.
#[derive(Debug)]
enum DemoError {
    Io(std::io::Error),
    ImageTooLarge { len: usize, capacity: usize },
}

impl std::fmt::Display for DemoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemoError::Io(e) => write!(f, "failed to read image: {e}"),
            DemoError::ImageTooLarge { len, capacity } => {
                write!(f, "image is {len} bytes, address space only holds {capacity}")
            }
        }
    }
}

impl From<std::io::Error> for DemoError {
    fn from(e: std::io::Error) -> Self {
        DemoError::Io(e)
    }
}

fn load_image(path: &str) -> Result<FlatMemory, DemoError> {
    let image = fs::read(path)?;
    if image.len() > MEM_SIZE {
        return Err(DemoError::ImageTooLarge { len: image.len(), capacity: MEM_SIZE });
    }
    let mut mem = FlatMemory::new(MEM_SIZE);
    mem.mem[..image.len()].copy_from_slice(&image);
    Ok(mem)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: demo_host <6502|6510|z80> <image.bin> [cycles]");
        return ExitCode::FAILURE;
    }
    let kind = args[1].as_str();
    let cycles: u64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CYCLES);

    let mem = match load_image(&args[2]) {
        Ok(mem) => mem,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match kind {
        "6502" => run_6502(mem, cycles),
        "6510" => run_6510(mem, cycles),
        "z80" => run_z80(mem, cycles),
        other => {
            eprintln!("unknown cpu kind {other:?}, expected 6502, 6510, or z80");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn run_6502(mut mem: FlatMemory, cycles: u64) {
    let mut cpu = M6502::new(M6502Config::default());
    let mut pit = Pit::new();
    let mut pins: Pins = mos::RES;
    for n in 0..cycles {
        if n == 2 {
            pins = pins::clear(pins, mos::RES);
        }
        pins = tick_m6502(&mut cpu, &mut mem, &mut [&mut pit as &mut dyn Peripheral], pins);
    }
    println!(
        "6502 halted after {cycles} cycles: pc={:#06x} a={:#04x} x={:#04x} y={:#04x} p={:#04x}",
        cpu.regs.pc, cpu.regs.a, cpu.regs.x, cpu.regs.y, cpu.regs.p
    );
}

fn run_6510(mut mem: FlatMemory, cycles: u64) {
    let mut cpu = Mos6510::new(Mos6510Config::default());
    let mut pit = Pit::new();
    let mut pins: Pins = mos::RES;
    for n in 0..cycles {
        if n == 2 {
            pins = pins::clear(pins, mos::RES);
        }
        pins = cpu.tick(pins);
        pins = mem.service(pins);
        pins = pit.tick(pins);
    }
    println!("6510 halted after {cycles} cycles: pc={:#06x}", cpu.cpu().regs.pc);
}

fn run_z80(mut mem: FlatMemory, cycles: u64) {
    let mut cpu = Z80::new(Z80Config::default());
    cpu.reset();
    let mut pit = Pit::new();
    let mut io_devices: [(u8, &mut dyn Peripheral); 1] = [(0x40, &mut pit)];
    let mut pins: Pins = 0;
    for _ in 0..cycles {
        pins = tick_z80(&mut cpu, &mut mem, &mut io_devices, pins);
    }
    println!(
        "Z80 halted after {cycles} cycles: pc={:#06x} sp={:#06x} a={:#04x}",
        cpu.regs.pc, cpu.regs.sp, cpu.regs.a
    );
}
