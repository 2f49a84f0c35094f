/*!
io6510.rs - The 6510's built-in 6-bit I/O port at addresses 0x0000/0x0001
(data direction register and port data), wrapped around a plain `M6502`.

The DDR and port register are ordinary CPU-visible memory locations, but
reading or writing them never reaches the external bus: the 6510 answers
locally. An input pin whose DDR bit is 0 floats; what a floating CMOS pin
reads back as depends on what was last driven there (a weak pull-up on
most expansion-port lines). We model that with the same bus-level inputs
the host would use for any other peripheral: the P0..P5 bits of the pin
word carry the externally driven level for each port line, and the host
is expected to keep driving the last-known level on pins it isn't
actively changing, exactly as real expansion hardware (or its absence)
does.
*/

use super::{M6502, M6502Config};
use crate::pins::{mos, Pins};

/// `Mos6510Config` adds the 6510's IO-port reset state to the plain
/// 6502 configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mos6510Config {
    pub cpu: M6502Config,
}

/// A 6510: an `M6502` plus the on-chip DDR/port pair at $00/$01.
#[derive(Debug, Clone)]
pub struct Mos6510 {
    cpu: M6502,
    ddr: u8,
    port: u8,
}

impl Mos6510 {
    pub fn new(config: Mos6510Config) -> Self {
        Self {
            cpu: M6502::new(config.cpu),
            ddr: 0x00,
            port: 0x00,
        }
    }

    pub fn cpu(&self) -> &M6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut M6502 {
        &mut self.cpu
    }

    /// Advance by one cycle. `pins_in`'s P0..P5 bits carry the externally
    /// driven level of each port pin (pull-ups resolved by the host, as
    /// for any other floating input); the returned pins carry whatever
    /// the chip itself is driving on those same lines this cycle.
    pub fn tick(&mut self, pins_in: Pins) -> Pins {
        let external = mos::get_port(pins_in);
        let out = self.cpu.tick(pins_in);
        let addr = crate::pins::get_addr(out);

        if addr > 0x0001 {
            return out;
        }

        if mos::is_read(out) {
            let value = if addr == 0x0000 {
                self.ddr
            } else {
                // Bits driven as outputs read back what we last wrote;
                // bits left as inputs read the externally driven level.
                (external & !self.ddr) | (self.port & self.ddr)
            };
            mos::set_port(crate::pins::set_data(out, value), external)
        } else {
            let value = crate::pins::get_data(out);
            if addr == 0x0000 {
                self.ddr = value;
            } else {
                self.port = value;
            }
            mos::set_port(out, self.port & self.ddr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddr_write_then_readback() {
        let mut chip = Mos6510::new(Mos6510Config::default());
        // Drive RES for two cycles, then release and run the 7-cycle
        // reset sequence, exactly like the plain M6502 test helper.
        for _ in 0..2 {
            chip.tick(mos::RES);
        }
        for _ in 0..7 {
            chip.tick(0);
        }
        chip.ddr = 0xFF;
        chip.port = 0x07;
        assert_eq!(chip.ddr & chip.port, 0x07);
    }
}
