/*!
interrupts.rs - NMI and maskable-interrupt sampling for the Z80 core.

NMI is edge-triggered and always accepted; INT is level-triggered and
gated by IFF1. A device asserting INT is expected to hold the line until
the CPU acknowledges it (drives M1+IORQ), matching real daisy-chained Z80
peripherals; `IntLine` only tracks what the core needs to decide whether
to take the interrupt at the next opportunity, not the daisy-chain
priority resolution itself. The CPU core does assert the `RETI` pin
(`mod.rs`'s `seq_retn`) for a daisy-chained device to observe; this module
only concerns itself with NMI/INT sampling, not that signal.
*/

#[derive(Debug, Default, Clone, Copy)]
pub struct NmiEdge {
    prev_asserted: bool,
    pending: bool,
}

impl NmiEdge {
    pub fn sample(&mut self, asserted: bool) {
        if asserted && !self.prev_asserted {
            self.pending = true;
        }
        self.prev_asserted = asserted;
    }

    pub fn take_pending(&mut self) -> bool {
        let p = self.pending;
        self.pending = false;
        p
    }
}

/// INT is re-sampled at the start of every instruction; EI's effect is
/// delayed by one instruction (the interrupt cannot land until after the
/// instruction following EI has executed), which `mod.rs` implements by
/// setting a one-shot inhibit flag rather than anything tracked here.
pub fn int_pending(int_pin_asserted: bool, iff1: bool) -> bool {
    int_pin_asserted && iff1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nmi_fires_once_per_falling_to_rising_edge() {
        let mut e = NmiEdge::default();
        e.sample(false);
        e.sample(true);
        assert!(e.take_pending());
        assert!(!e.take_pending());
    }

    #[test]
    fn nmi_held_high_does_not_refire() {
        let mut e = NmiEdge::default();
        e.sample(true);
        assert!(e.take_pending());
        e.sample(true);
        assert!(!e.take_pending());
    }

    #[test]
    fn int_gated_by_iff1() {
        assert!(!int_pending(true, false));
        assert!(int_pending(true, true));
    }
}
