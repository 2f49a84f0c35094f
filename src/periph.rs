/*!
periph.rs - `Pit`, a minimal dual-channel interval timer used as the
reference implementation of the [`crate::peripheral::Peripheral`]
contract. Each channel is an 8-bit down-counter that reloads from its
latch and raises a sticky underflow flag, in the spirit of a single
timer pair lifted out of a 6522 VIA or 8520 CIA without any of the
surrounding shift-register/handshake machinery those chips also carry.

Register map (4 addresses, decoded by the host):
  0: latch A (write sets the reload value; read returns the live count)
  1: latch B (same, channel B)
  2: control (bit0 = enable A, bit1 = enable B)
  3: status (bit0 = A underflowed, bit1 = B underflowed; write 1 to clear)
*/

use crate::peripheral::Peripheral;
use crate::pins::{self, mos, Pins};

#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    latch: u8,
    count: u8,
    enabled: bool,
    underflowed: bool,
}

impl Channel {
    fn tick(&mut self) {
        if !self.enabled {
            return;
        }
        if self.count == 0 {
            self.count = self.latch;
            self.underflowed = true;
        } else {
            self.count -= 1;
        }
    }
}

/// A two-channel down-counting interval timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pit {
    a: Channel,
    b: Channel,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if channel A's underflow flag is currently set (without
    /// clearing it), for hosts that want to wire it to an IRQ line
    /// outside the register-mapped status read.
    pub fn irq_a(&self) -> bool {
        self.a.underflowed
    }

    pub fn irq_b(&self) -> bool {
        self.b.underflowed
    }
}

impl Peripheral for Pit {
    fn tick(&mut self, pins: Pins) -> Pins {
        self.a.tick();
        self.b.tick();
        pins
    }

    fn iorq(&mut self, pins: Pins) -> Pins {
        let reg = pins::get_addr(pins) & 0x03;
        if mos::is_read(pins) {
            let value = match reg {
                0 => self.a.count,
                1 => self.b.count,
                2 => (self.a.enabled as u8) | ((self.b.enabled as u8) << 1),
                _ => (self.a.underflowed as u8) | ((self.b.underflowed as u8) << 1),
            };
            pins::set_data(pins, value)
        } else {
            let value = pins::get_data(pins);
            match reg {
                0 => {
                    self.a.latch = value;
                    self.a.count = value;
                }
                1 => {
                    self.b.latch = value;
                    self.b.count = value;
                }
                2 => {
                    self.a.enabled = value & 0x01 != 0;
                    self.b.enabled = value & 0x02 != 0;
                }
                _ => {
                    if value & 0x01 != 0 {
                        self.a.underflowed = false;
                    }
                    if value & 0x02 != 0 {
                        self.b.underflowed = false;
                    }
                }
            }
            pins
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_reg(pit: &mut Pit, reg: u16, value: u8) {
        pit.iorq(pins::set_data(pins::set_addr(0, reg), value));
    }

    #[test]
    fn channel_a_underflows_and_reloads() {
        let mut pit = Pit::new();
        write_reg(&mut pit, 0, 3); // latch A = 3
        write_reg(&mut pit, 2, 0x01); // control: enable A
        for _ in 0..3 {
            pit.tick(0);
            assert!(!pit.irq_a());
        }
        pit.tick(0);
        assert!(pit.irq_a());
        assert_eq!(pit.a.count, 3);
    }

    #[test]
    fn status_write_clears_underflow() {
        let mut pit = Pit::new();
        pit.a.underflowed = true;
        write_reg(&mut pit, 3, 0x01);
        assert!(!pit.irq_a());
    }
}
