/*!
cyclecore - cycle-stepped 6502/6510 and Z80 CPU cores that communicate
with the rest of a system through a single 64-bit pin word per tick.

See [`pins`] for the bus contract, [`m6502`] and [`z80`] for the two CPU
cores, and [`peripheral`] for the trait a tick-driven chip implements to
sit on the same bus.
*/

pub mod m6502;
pub mod peripheral;
pub mod periph;
pub mod pins;
pub mod scheduler;
pub mod z80;

pub use m6502::io6510::Mos6510;
pub use m6502::{M6502, M6502Config};
pub use pins::Pins;
pub use z80::{Z80, Z80Config};
