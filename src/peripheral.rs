/*!
peripheral.rs - The contract a tick-driven chip implements to sit on the
same pin bus as a CPU core.

A peripheral never initiates a bus cycle; it only reacts to the pins it
is handed. `tick` runs every clock cycle regardless of whether the chip
is selected (so internal counters and shift registers keep moving);
`iorq` runs only on the cycle where the host has decided this chip is
the target of the CPU's current memory or IO access, and is where the
chip actually drives the data bus. Both are pure functions of `(self,
pins) -> pins`: no side effects beyond the returned word and `&mut self`.
*/

use crate::pins::Pins;

/// A chip that lives on the bus and responds to ticks from the host's
/// scheduler. See [`crate::scheduler`] for how a host wires several of
/// these together with a CPU core.
pub trait Peripheral {
    /// Run one clock cycle. Chips that do not need a cycle-accurate
    /// internal clock (most simple decoders) can leave this a no-op and
    /// do all of their work in `iorq`.
    fn tick(&mut self, pins: Pins) -> Pins {
        pins
    }

    /// Service a bus access addressed to this chip: read means drive the
    /// data bus with the chip's answer, write means latch the data bus
    /// into internal state. Called only when the host's address decode
    /// has already determined this chip is selected.
    fn iorq(&mut self, pins: Pins) -> Pins;
}
