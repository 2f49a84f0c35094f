/*!
6502/6510 cycle-stepped CPU core.

`M6502::tick` is the entire public surface for running the chip: hand it
the pins you got back from the last call (with the data bus and control
inputs set the way the rest of the system agreed to drive them), get back
the pins for the next bus cycle. No instruction ever runs to completion
inside a single call; every opcode is a short internal state machine
(`Stage`) that issues exactly one bus transaction per `tick`.
*/

pub mod addrmode;
pub mod bcd;
pub mod interrupts;
pub mod io6510;
pub mod ops;
pub mod state;
pub mod table;

use crate::pins::{self, mos, Pins};
use addrmode::{AddrMode, Next, Resolver};
use interrupts::NmiEdge;
use ops::Op;
use state::Regs;
use table::{Cond, Entry, Special};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntKind {
    Brk,
    Irq,
    Nmi,
    Reset,
}

impl IntKind {
    fn vector(self) -> u16 {
        match self {
            IntKind::Nmi => 0xFFFA,
            IntKind::Reset => 0xFFFC,
            IntKind::Brk | IntKind::Irq => 0xFFFE,
        }
    }

    /// RESET never writes to memory; the three stack-pointer decrements
    /// happen with RW held high, as on real silicon.
    fn writes_stack(self) -> bool {
        !matches!(self, IntKind::Reset)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    FetchIssued,
    Resolving {
        mode: AddrMode,
        op: Op,
        force_extra: bool,
    },
    FinalReadIssued {
        op: Op,
    },
    RmwReadIssued {
        addr: u16,
        op: Op,
    },
    RmwWriteOldIssued {
        addr: u16,
        op: Op,
        val: u8,
    },
    RmwWriteNewIssued,
    StoreWriteIssued,
    ImpliedIssued {
        special: Special,
    },
    BranchIssued {
        cond: Cond,
    },
    BranchTakenIssued {
        target: u16,
    },
    BranchFixupIssued,
    JmpAbsLoIssued,
    JmpAbsHiIssued {
        lo: u8,
    },
    JmpIndPtrLoIssued,
    JmpIndPtrHiIssued {
        ptr_lo: u8,
    },
    JmpIndLoIssued {
        ptr_lo: u8,
        ptr_hi: u8,
    },
    JmpIndHiIssued {
        target_lo: u8,
    },
    JsrLoIssued,
    JsrInternalIssued {
        lo: u8,
    },
    JsrPushHiIssued {
        lo: u8,
    },
    JsrPushLoIssued {
        lo: u8,
    },
    JsrHiIssued {
        lo: u8,
    },
    RtsDummy1Issued,
    RtsDummy2Issued,
    RtsPullLoIssued,
    RtsPullHiIssued {
        lo: u8,
    },
    RtsFinalIssued,
    RtiDummy1Issued,
    RtiDummy2Issued,
    RtiPullPIssued,
    RtiPullLoIssued,
    RtiPullHiIssued {
        lo: u8,
    },
    PushDummyIssued {
        special: Special,
    },
    PushWriteIssued,
    PullDummy1Issued {
        special: Special,
    },
    PullDummy2Issued {
        special: Special,
    },
    PullValueIssued {
        special: Special,
    },
    IntSigIssued {
        kind: IntKind,
    },
    IntPushHiIssued {
        kind: IntKind,
    },
    IntPushLoIssued {
        kind: IntKind,
    },
    IntPushPIssued {
        kind: IntKind,
    },
    IntVecLoIssued {
        kind: IntKind,
    },
    IntVecHiIssued {
        lo: u8,
    },
    Halted,
}

/// Configuration for an `M6502` instance. Plain data, no builder: every
/// field has an obvious zero value and callers set what they need.
#[derive(Debug, Clone, Copy, Default)]
pub struct M6502Config {
    /// Forces binary arithmetic even when the D flag is set, matching
    /// second-source parts (e.g. the NES's 2A03) that never wired up BCD.
    pub bcd_disabled: bool,
}

/// A cycle-stepped MOS 6502 (or NMOS-compatible second source). Drive it
/// with [`M6502::tick`].
#[derive(Debug, Clone)]
pub struct M6502 {
    pub regs: Regs,
    resolver: Resolver,
    stage: Stage,
    bcd_disabled: bool,
    nmi_edge: NmiEdge,
    reset_prev_asserted: bool,
    last_pins: Pins,
}

impl M6502 {
    pub fn new(config: M6502Config) -> Self {
        Self {
            regs: Regs::default(),
            resolver: Resolver::new(),
            stage: Stage::FetchIssued,
            bcd_disabled: config.bcd_disabled,
            nmi_edge: NmiEdge::new(),
            reset_prev_asserted: true,
            last_pins: 0,
        }
    }

    /// Advance the CPU by exactly one clock cycle.
    pub fn tick(&mut self, pins_in: Pins) -> Pins {
        let res_asserted = pins::test(pins_in, mos::RES);
        let nmi_asserted = pins::test(pins_in, mos::NMI);
        self.nmi_edge.sample(nmi_asserted);

        if res_asserted {
            self.reset_prev_asserted = true;
            return self.drive(pins::make_pins(mos::RW, self.regs.pc, 0));
        }
        if self.reset_prev_asserted {
            self.reset_prev_asserted = false;
            return self.begin_interrupt(IntKind::Reset, false);
        }

        if !pins::test(pins_in, mos::RDY) && pins::test(self.last_pins, mos::RW) {
            return self.last_pins;
        }

        let data_in = pins::get_data(pins_in);
        let irq_asserted = pins::test(pins_in, mos::IRQ);
        self.advance(data_in, irq_asserted)
    }

    fn drive(&mut self, pins: Pins) -> Pins {
        self.last_pins = pins;
        pins
    }

    fn read(&mut self, addr: u16) -> Pins {
        self.drive(pins::make_pins(mos::RW, addr, 0))
    }

    fn write(&mut self, addr: u16, val: u8) -> Pins {
        self.drive(pins::make_pins(0, addr, val))
    }

    fn issue_fetch(&mut self) -> Pins {
        let addr = self.regs.pc;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.stage = Stage::FetchIssued;
        self.drive(pins::make_pins(mos::RW | mos::SYNC, addr, 0))
    }

    fn advance(&mut self, data_in: u8, irq_asserted: bool) -> Pins {
        match self.stage {
            Stage::FetchIssued => self.on_fetch(data_in, irq_asserted),
            Stage::Resolving {
                mode,
                op,
                force_extra,
            } => self.on_resolving(mode, op, force_extra, data_in),
            Stage::FinalReadIssued { op } => {
                ops::apply_read(op, &mut self.regs, data_in, self.bcd_disabled);
                self.issue_fetch()
            }
            Stage::RmwReadIssued { addr, op } => {
                self.stage = Stage::RmwWriteOldIssued {
                    addr,
                    op,
                    val: data_in,
                };
                self.write(addr, data_in)
            }
            Stage::RmwWriteOldIssued { addr, op, val } => {
                let new_val = ops::apply_rmw(op, &mut self.regs, val);
                self.stage = Stage::RmwWriteNewIssued;
                self.write(addr, new_val)
            }
            Stage::RmwWriteNewIssued => self.issue_fetch(),
            Stage::StoreWriteIssued => self.issue_fetch(),
            Stage::ImpliedIssued { special } => {
                self.apply_special_register_op(special);
                self.issue_fetch()
            }
            Stage::BranchIssued { cond } => self.on_branch_offset(cond, data_in),
            Stage::BranchTakenIssued { target } => self.on_branch_taken(target),
            Stage::BranchFixupIssued => self.issue_fetch(),
            Stage::JmpAbsLoIssued => {
                self.stage = Stage::JmpAbsHiIssued { lo: data_in };
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            Stage::JmpAbsHiIssued { lo } => {
                self.regs.pc = u16::from_le_bytes([lo, data_in]);
                self.issue_fetch()
            }
            Stage::JmpIndPtrLoIssued => {
                self.stage = Stage::JmpIndPtrHiIssued { ptr_lo: data_in };
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            Stage::JmpIndPtrHiIssued { ptr_lo } => {
                let ptr = u16::from_le_bytes([ptr_lo, data_in]);
                self.stage = Stage::JmpIndLoIssued {
                    ptr_lo,
                    ptr_hi: data_in,
                };
                self.read(ptr)
            }
            Stage::JmpIndLoIssued { ptr_lo, ptr_hi } => {
                self.stage = Stage::JmpIndHiIssued { target_lo: data_in };
                // The classic page-wrap bug: the high byte is fetched from
                // (ptr_hi, ptr_lo + 1) with no carry into ptr_hi.
                let hi_addr = u16::from_le_bytes([ptr_lo.wrapping_add(1), ptr_hi]);
                self.read(hi_addr)
            }
            Stage::JmpIndHiIssued { target_lo } => {
                self.regs.pc = u16::from_le_bytes([target_lo, data_in]);
                self.issue_fetch()
            }
            Stage::JsrLoIssued => {
                self.stage = Stage::JsrInternalIssued { lo: data_in };
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::JsrInternalIssued { lo } => {
                self.stage = Stage::JsrPushHiIssued { lo };
                let pch = (self.regs.pc >> 8) as u8;
                let addr = 0x0100 | self.regs.s as u16;
                self.regs.s = self.regs.s.wrapping_sub(1);
                self.write(addr, pch)
            }
            Stage::JsrPushHiIssued { lo } => {
                self.stage = Stage::JsrPushLoIssued { lo };
                let pcl = (self.regs.pc & 0xFF) as u8;
                let addr = 0x0100 | self.regs.s as u16;
                self.regs.s = self.regs.s.wrapping_sub(1);
                self.write(addr, pcl)
            }
            Stage::JsrPushLoIssued { lo } => {
                self.stage = Stage::JsrHiIssued { lo };
                self.read(self.regs.pc)
            }
            Stage::JsrHiIssued { lo } => {
                self.regs.pc = u16::from_le_bytes([lo, data_in]);
                self.issue_fetch()
            }
            Stage::RtsDummy1Issued => {
                self.stage = Stage::RtsDummy2Issued;
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtsDummy2Issued => {
                self.regs.s = self.regs.s.wrapping_add(1);
                self.stage = Stage::RtsPullLoIssued;
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtsPullLoIssued => {
                self.regs.s = self.regs.s.wrapping_add(1);
                self.stage = Stage::RtsPullHiIssued { lo: data_in };
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtsPullHiIssued { lo } => {
                self.regs.pc = u16::from_le_bytes([lo, data_in]);
                self.stage = Stage::RtsFinalIssued;
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            Stage::RtsFinalIssued => self.issue_fetch(),
            Stage::RtiDummy1Issued => {
                self.stage = Stage::RtiDummy2Issued;
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtiDummy2Issued => {
                self.regs.s = self.regs.s.wrapping_add(1);
                self.stage = Stage::RtiPullPIssued;
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtiPullPIssued => {
                self.regs.p = data_in | state::UNUSED;
                self.regs.s = self.regs.s.wrapping_add(1);
                self.stage = Stage::RtiPullLoIssued;
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtiPullLoIssued => {
                self.regs.s = self.regs.s.wrapping_add(1);
                self.stage = Stage::RtiPullHiIssued { lo: data_in };
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::RtiPullHiIssued { lo } => {
                self.regs.pc = u16::from_le_bytes([lo, data_in]);
                self.issue_fetch()
            }
            Stage::PushDummyIssued { special } => {
                let val = match special {
                    Special::Pha => self.regs.a,
                    Special::Php => self.regs.p_for_push(true),
                    _ => unreachable!("PushDummyIssued only reached for PHA/PHP"),
                };
                let addr = 0x0100 | self.regs.s as u16;
                self.regs.s = self.regs.s.wrapping_sub(1);
                self.stage = Stage::PushWriteIssued;
                self.write(addr, val)
            }
            Stage::PushWriteIssued => self.issue_fetch(),
            Stage::PullDummy1Issued { special } => {
                self.stage = Stage::PullDummy2Issued { special };
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::PullDummy2Issued { special } => {
                self.regs.s = self.regs.s.wrapping_add(1);
                self.stage = Stage::PullValueIssued { special };
                self.read(0x0100 | self.regs.s as u16)
            }
            Stage::PullValueIssued { special } => {
                match special {
                    Special::Pla => {
                        self.regs.a = data_in;
                        self.regs.update_nz(data_in);
                    }
                    Special::Plp => self.regs.p = data_in | state::UNUSED,
                    _ => unreachable!("PullValueIssued only reached for PLA/PLP"),
                }
                self.issue_fetch()
            }
            Stage::IntSigIssued { kind } => {
                self.stage = Stage::IntPushHiIssued { kind };
                let pch = (self.regs.pc >> 8) as u8;
                let addr = 0x0100 | self.regs.s as u16;
                self.regs.s = self.regs.s.wrapping_sub(1);
                if kind.writes_stack() {
                    self.write(addr, pch)
                } else {
                    self.read(addr)
                }
            }
            Stage::IntPushHiIssued { kind } => {
                self.stage = Stage::IntPushLoIssued { kind };
                let pcl = (self.regs.pc & 0xFF) as u8;
                let addr = 0x0100 | self.regs.s as u16;
                self.regs.s = self.regs.s.wrapping_sub(1);
                if kind.writes_stack() {
                    self.write(addr, pcl)
                } else {
                    self.read(addr)
                }
            }
            Stage::IntPushLoIssued { kind } => {
                self.stage = Stage::IntPushPIssued { kind };
                let break_flag = kind == IntKind::Brk;
                let pval = self.regs.p_for_push(break_flag);
                let addr = 0x0100 | self.regs.s as u16;
                self.regs.s = self.regs.s.wrapping_sub(1);
                self.regs.set_flag(state::IRQ_DISABLE, true);
                if kind.writes_stack() {
                    self.write(addr, pval)
                } else {
                    self.read(addr)
                }
            }
            Stage::IntPushPIssued { kind } => {
                self.stage = Stage::IntVecLoIssued { kind };
                self.read(kind.vector())
            }
            Stage::IntVecLoIssued { kind } => {
                self.stage = Stage::IntVecHiIssued { lo: data_in };
                self.read(kind.vector().wrapping_add(1))
            }
            Stage::IntVecHiIssued { lo } => {
                self.regs.pc = u16::from_le_bytes([lo, data_in]);
                self.issue_fetch()
            }
            Stage::Halted => self.read(self.regs.pc),
        }
    }

    fn on_fetch(&mut self, opcode: u8, irq_asserted: bool) -> Pins {
        if self.nmi_edge.take_pending() {
            return self.begin_interrupt(IntKind::Nmi, false);
        }
        let entry = table::decode(opcode);
        if entry == Entry::Special(Special::Brk) {
            return self.begin_interrupt(IntKind::Brk, true);
        }
        if interrupts::irq_pending(irq_asserted, self.regs.flag(state::IRQ_DISABLE)) {
            return self.begin_interrupt(IntKind::Irq, false);
        }
        self.begin_execute(entry)
    }

    fn begin_interrupt(&mut self, kind: IntKind, consume_signature: bool) -> Pins {
        self.stage = Stage::IntSigIssued { kind };
        if consume_signature {
            let addr = self.regs.pc;
            self.regs.pc = self.regs.pc.wrapping_add(1);
            self.read(addr)
        } else {
            self.read(self.regs.pc)
        }
    }

    fn begin_execute(&mut self, entry: Entry) -> Pins {
        match entry {
            Entry::Mem(AddrMode::Immediate, op) => {
                self.stage = Stage::FinalReadIssued { op };
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            Entry::Mem(mode, op) => {
                let force_extra = op.is_store() || op.is_rmw();
                self.resolver = Resolver::new();
                self.stage = Stage::Resolving {
                    mode,
                    op,
                    force_extra,
                };
                match self
                    .resolver
                    .step(mode, 0, &mut self.regs.pc, self.regs.x, self.regs.y, force_extra)
                {
                    Next::Read(addr) => self.read(addr),
                    Next::Done { .. } => {
                        unreachable!("no addressing mode resolves in zero cycles")
                    }
                }
            }
            Entry::Special(special) => self.begin_special(special),
        }
    }

    fn on_resolving(&mut self, mode: AddrMode, op: Op, force_extra: bool, data_in: u8) -> Pins {
        match self
            .resolver
            .step(mode, data_in, &mut self.regs.pc, self.regs.x, self.regs.y, force_extra)
        {
            Next::Read(addr) => self.read(addr),
            Next::Done { addr, operand } => {
                if op.is_store() {
                    let val = ops::store_value(op, &self.regs);
                    self.stage = Stage::StoreWriteIssued;
                    self.write(addr, val)
                } else if op.is_rmw() {
                    if let Some(v) = operand {
                        self.stage = Stage::RmwWriteOldIssued { addr, op, val: v };
                        self.write(addr, v)
                    } else {
                        self.stage = Stage::RmwReadIssued { addr, op };
                        self.read(addr)
                    }
                } else if let Some(v) = operand {
                    ops::apply_read(op, &mut self.regs, v, self.bcd_disabled);
                    self.issue_fetch()
                } else {
                    self.stage = Stage::FinalReadIssued { op };
                    self.read(addr)
                }
            }
        }
    }

    fn begin_special(&mut self, special: Special) -> Pins {
        use Special::*;
        match special {
            Jam => {
                self.stage = Stage::Halted;
                self.read(self.regs.pc)
            }
            Branch(cond) => {
                self.stage = Stage::BranchIssued { cond };
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            JmpAbs => {
                self.stage = Stage::JmpAbsLoIssued;
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            JmpInd => {
                self.stage = Stage::JmpIndPtrLoIssued;
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            Jsr => {
                self.stage = Stage::JsrLoIssued;
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.read(addr)
            }
            Rts => {
                self.stage = Stage::RtsDummy1Issued;
                self.read(self.regs.pc)
            }
            Rti => {
                self.stage = Stage::RtiDummy1Issued;
                self.read(self.regs.pc)
            }
            Pha | Php => {
                self.stage = Stage::PushDummyIssued { special };
                self.read(self.regs.pc)
            }
            Pla | Plp => {
                self.stage = Stage::PullDummy1Issued { special };
                self.read(self.regs.pc)
            }
            _ => {
                // Implied register/flag ops and accumulator-mode shifts:
                // one dummy read of the next opcode byte (not consumed),
                // then the mutation happens with no further bus activity.
                self.stage = Stage::ImpliedIssued { special };
                self.read(self.regs.pc)
            }
        }
    }

    fn on_branch_offset(&mut self, cond: Cond, offset: u8) -> Pins {
        if !cond.is_taken(self.regs.p) {
            return self.issue_fetch();
        }
        let target = self.regs.pc.wrapping_add(offset as i8 as i16 as u16);
        self.stage = Stage::BranchTakenIssued { target };
        self.read(self.regs.pc)
    }

    fn on_branch_taken(&mut self, target: u16) -> Pins {
        let old_hi = (self.regs.pc >> 8) as u8;
        let new_hi = (target >> 8) as u8;
        if old_hi != new_hi {
            self.regs.pc = target;
            self.stage = Stage::BranchFixupIssued;
            let fixup_addr = u16::from_le_bytes([(target & 0xFF) as u8, old_hi]);
            self.read(fixup_addr)
        } else {
            self.regs.pc = target;
            self.issue_fetch()
        }
    }

    fn apply_special_register_op(&mut self, special: Special) {
        use Special::*;
        let r = &mut self.regs;
        match special {
            Tax => {
                r.x = r.a;
                r.update_nz(r.x);
            }
            Tay => {
                r.y = r.a;
                r.update_nz(r.y);
            }
            Txa => {
                r.a = r.x;
                r.update_nz(r.a);
            }
            Tya => {
                r.a = r.y;
                r.update_nz(r.a);
            }
            Tsx => {
                r.x = r.s;
                r.update_nz(r.x);
            }
            Txs => r.s = r.x,
            Dex => {
                r.x = r.x.wrapping_sub(1);
                r.update_nz(r.x);
            }
            Dey => {
                r.y = r.y.wrapping_sub(1);
                r.update_nz(r.y);
            }
            Inx => {
                r.x = r.x.wrapping_add(1);
                r.update_nz(r.x);
            }
            Iny => {
                r.y = r.y.wrapping_add(1);
                r.update_nz(r.y);
            }
            Clc => r.set_flag(state::CARRY, false),
            Sec => r.set_flag(state::CARRY, true),
            Cli => r.set_flag(state::IRQ_DISABLE, false),
            Sei => r.set_flag(state::IRQ_DISABLE, true),
            Clv => r.set_flag(state::OVERFLOW, false),
            Cld => r.set_flag(state::DECIMAL, false),
            Sed => r.set_flag(state::DECIMAL, true),
            NopImplied => {}
            AslAcc => r.a = ops::apply_rmw(Op::Asl, r, r.a),
            LsrAcc => r.a = ops::apply_rmw(Op::Lsr, r, r.a),
            RolAcc => r.a = ops::apply_rmw(Op::Rol, r, r.a),
            RorAcc => r.a = ops::apply_rmw(Op::Ror, r, r.a),
            _ => unreachable!("apply_special_register_op given a non-implied special"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_reset(cpu: &mut M6502) {
        // Hold RES asserted for a few cycles, then release it and run the
        // 7-cycle vector fetch sequence to completion.
        for _ in 0..2 {
            cpu.tick(mos::RES);
        }
        for _ in 0..7 {
            cpu.tick(0);
        }
    }

    #[test]
    fn reset_loads_pc_from_vector_with_floating_bus() {
        // With no memory backing the bus, reads return 0, so the vector at
        // 0xFFFC/0xFFFD resolves to 0x0000.
        let mut cpu = M6502::new(M6502Config::default());
        run_reset(&mut cpu);
        assert_eq!(cpu.regs.pc, 0x0000);
        assert!(cpu.regs.flag(state::IRQ_DISABLE));
    }

    #[test]
    fn lda_immediate_two_cycles_then_refetches() {
        let mut cpu = M6502::new(M6502Config::default());
        run_reset(&mut cpu);
        // run_reset's last internal tick already issued the opcode fetch
        // for address pc=0; this call supplies its response (LDA #imm).
        let pins = cpu.tick(pins::set_data(0, 0xA9));
        assert!(!pins::test(pins, mos::SYNC));
        // this call supplies the immediate operand byte.
        let pins = cpu.tick(pins::set_data(0, 0x42));
        assert!(pins::test(pins, mos::SYNC));
        assert_eq!(cpu.regs.a, 0x42);
    }

    #[test]
    fn branch_not_taken_is_two_cycles() {
        let mut cpu = M6502::new(M6502Config::default());
        run_reset(&mut cpu);
        cpu.regs.set_flag(state::ZERO, false);
        let pins = cpu.tick(pins::set_data(0, 0xF0)); // BEQ opcode response
        assert!(!pins::test(pins, mos::SYNC));
        let pins = cpu.tick(pins::set_data(0, 0x10)); // offset, not taken (Z clear)
        assert!(pins::test(pins, mos::SYNC));
    }
}
