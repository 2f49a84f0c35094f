/*!
scheduler.rs - The host-side per-tick loop that wires a CPU's pin word to
memory and to a set of peripherals.

This is reference plumbing, not a mandatory entry point: any host can
drive a CPU core directly by calling `tick` itself. `Bus` is the minimal
interface a host's memory map needs to provide; `run_tick` performs the
seven-step contract once per cycle: service the CPU's read or write,
give every peripheral a chance to run its own clock, then hand back the
resulting pins for the next cycle.
*/

use crate::peripheral::Peripheral;
use crate::pins::{self, mos, Pins};

/// What the host's address space does in response to a CPU-driven pin
/// word. Implementations decide which addresses are RAM, ROM, or mapped
/// to a peripheral's `iorq`.
pub trait Bus {
    fn service(&mut self, pins: Pins) -> Pins;
}

/// A flat RAM/ROM image with no mapped peripherals, useful for tests and
/// for the demo host binary.
pub struct FlatMemory {
    pub mem: Vec<u8>,
}

impl FlatMemory {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0; size],
        }
    }
}

impl Bus for FlatMemory {
    fn service(&mut self, pins: Pins) -> Pins {
        let addr = pins::get_addr(pins) as usize;
        if addr >= self.mem.len() {
            return pins;
        }
        if mos::is_read(pins) {
            pins::set_data(pins, self.mem[addr])
        } else {
            self.mem[addr] = pins::get_data(pins);
            pins
        }
    }
}

/// Run one 6502-family tick against `bus`. RDY stalling is the CPU's own
/// concern (driven through `pins_in` by the host, same as any other input
/// pin), not this helper's.
///
/// Step order, matching the component contract: tick the CPU, let the
/// bus service the resulting read or write, then tick every peripheral
/// (so their internal clocks advance even on cycles where they are not
/// addressed).
pub fn tick_m6502(
    cpu: &mut crate::M6502,
    bus: &mut dyn Bus,
    peripherals: &mut [&mut dyn Peripheral],
    pins_in: Pins,
) -> Pins {
    let pins = cpu.tick(pins_in);
    let pins = bus.service(pins);
    let mut pins = pins;
    for p in peripherals.iter_mut() {
        pins = p.tick(pins);
    }
    pins
}

/// Run one Z80 tick against `bus` and a fixed, statically-decoded set of
/// IO-mapped peripherals.
///
/// Z80 splits memory and IO into separate request lines (MREQ vs IORQ),
/// unlike the 6502 family's single address space, so unlike
/// `tick_m6502` this does its own address decode: MREQ cycles go to
/// `bus`, IORQ cycles go to whichever peripheral in `io_devices` claims
/// the low byte of the address bus via `select`. Every peripheral's
/// plain `tick` still runs every cycle regardless of selection.
pub fn tick_z80(
    cpu: &mut crate::Z80,
    bus: &mut dyn Bus,
    io_devices: &mut [(u8, &mut dyn Peripheral)],
    pins_in: Pins,
) -> Pins {
    let pins = cpu.tick(pins_in);
    let mut pins = if pins::z80::is_mem_read(pins) || pins::z80::is_mem_write(pins) {
        bus.service(pins)
    } else if pins::z80::is_io_read(pins) || pins::z80::is_io_write(pins) {
        let port = pins::get_addr(pins) as u8;
        match io_devices.iter_mut().find(|(sel, _)| *sel == port) {
            Some((_, dev)) => dev.iorq(pins),
            None => pins,
        }
    } else {
        pins
    };
    for (_, dev) in io_devices.iter_mut() {
        pins = dev.tick(pins);
    }
    pins
}
