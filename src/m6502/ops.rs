/*!
ops.rs - The operation performed once an addressing mode has resolved its
operand or effective address. Every opcode names one `Op`; the addressing
mode (see `addrmode.rs`) determines how the operand byte or address was
obtained, this module defines what happens with it.

Operations are grouped by the bus choreography they need:
  - `Op::apply_read`  for instructions that only read (LDA, AND, ADC, ...)
  - `Op::apply_rmw`   for read-modify-write instructions (INC, ASL, ...)
  - `Op::store_value` for pure stores (STA, STX, ...) and the illegal
    combined stores (SAX)
Illegal/undocumented opcodes are ordinary `Op` variants; the unstable ones
(SHA/SHS/SHX/SHY/LAS/JAM) are represented but their `apply_*` is a no-op,
per the "do not invent behavior" decision in DESIGN.md.
*/

use super::bcd;
use super::state::{Regs, CARRY, DECIMAL, NEGATIVE, OVERFLOW, ZERO};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lda,
    Ldx,
    Ldy,
    Sta,
    Stx,
    Sty,
    Adc,
    Sbc,
    And,
    Ora,
    Eor,
    Cmp,
    Cpx,
    Cpy,
    Bit,
    Asl,
    Lsr,
    Rol,
    Ror,
    Inc,
    Dec,
    Nop,
    // Undocumented, stable
    Slo,
    Rla,
    Sre,
    Rra,
    Lax,
    Sax,
    Dcp,
    Isb,
    Anc,
    Alr,
    Arr,
    Ane,
    Lxa,
    Sbx,
    // Undocumented, unstable on real silicon: implemented as cycle-only stubs.
    Sha,
    Shs,
    Shx,
    Shy,
    Las,
    Jam,
}

impl Op {
    /// True for opcodes whose bus choreography is "resolve address, write
    /// a value derived from registers" with no preceding data read.
    pub fn is_store(self) -> bool {
        matches!(self, Op::Sta | Op::Stx | Op::Sty | Op::Sax)
    }

    /// True for read-modify-write opcodes (two trailing write cycles).
    pub fn is_rmw(self) -> bool {
        matches!(
            self,
            Op::Asl
                | Op::Lsr
                | Op::Rol
                | Op::Ror
                | Op::Inc
                | Op::Dec
                | Op::Slo
                | Op::Rla
                | Op::Sre
                | Op::Rra
                | Op::Dcp
                | Op::Isb
        )
    }

    /// Unstable illegal opcodes with no defined effect beyond consuming
    /// their addressing-mode cycles.
    pub fn is_unstable(self) -> bool {
        matches!(
            self,
            Op::Sha | Op::Shs | Op::Shx | Op::Shy | Op::Las | Op::Jam
        )
    }
}

#[inline]
fn set(regs: &mut Regs, mask: u8, cond: bool) {
    regs.set_flag(mask, cond);
}

/// Apply a read-class operation: the operand byte was just read from
/// memory (or was the immediate byte); update registers/flags in place.
pub fn apply_read(op: Op, regs: &mut Regs, val: u8, bcd_disabled: bool) {
    match op {
        Op::Lda => {
            regs.a = val;
            regs.update_nz(val);
        }
        Op::Ldx => {
            regs.x = val;
            regs.update_nz(val);
        }
        Op::Ldy => {
            regs.y = val;
            regs.update_nz(val);
        }
        Op::Lax => {
            regs.a = val;
            regs.x = val;
            regs.update_nz(val);
        }
        Op::Adc => {
            let r = bcd::adc(regs, val, bcd_disabled);
            regs.a = r.a;
            regs.p = r.p;
        }
        Op::Sbc => {
            let r = bcd::sbc(regs, val, bcd_disabled);
            regs.a = r.a;
            regs.p = r.p;
        }
        Op::And => {
            regs.a &= val;
            regs.update_nz(regs.a);
        }
        Op::Ora => {
            regs.a |= val;
            regs.update_nz(regs.a);
        }
        Op::Eor => {
            regs.a ^= val;
            regs.update_nz(regs.a);
        }
        Op::Cmp => compare(regs, regs.a, val),
        Op::Cpx => compare(regs, regs.x, val),
        Op::Cpy => compare(regs, regs.y, val),
        Op::Bit => {
            set(regs, ZERO, (regs.a & val) == 0);
            set(regs, NEGATIVE, val & 0x80 != 0);
            set(regs, OVERFLOW, val & 0x40 != 0);
        }
        Op::Anc => {
            regs.a &= val;
            regs.update_nz(regs.a);
            set(regs, CARRY, regs.a & 0x80 != 0);
        }
        Op::Alr => {
            regs.a &= val;
            let carry = regs.a & 1 != 0;
            regs.a >>= 1;
            regs.update_nz(regs.a);
            set(regs, CARRY, carry);
        }
        Op::Arr => apply_arr(regs, val, bcd_disabled),
        Op::Ane => {
            // Highly unstable on real hardware; documented "magic constant"
            // variants exist but none is authoritative. We use the common
            // (A | 0xEE) & X & operand approximation used by several test
            // suites, acknowledging it is not bit-exact on any single chip.
            regs.a = (regs.a | 0xEE) & regs.x & val;
            regs.update_nz(regs.a);
        }
        Op::Lxa => {
            regs.a = (regs.a | 0xEE) & val;
            regs.x = regs.a;
            regs.update_nz(regs.a);
        }
        Op::Sbx => {
            let t = (regs.a & regs.x) as i32 - val as i32;
            set(regs, CARRY, t >= 0);
            regs.x = t as u8;
            regs.update_nz(regs.x);
        }
        Op::Las => {
            // Unstable: not implemented beyond consuming the cycle.
        }
        Op::Nop | Op::Jam | Op::Sha | Op::Shs | Op::Shx | Op::Shy => {}
        _ => {}
    }
}

fn compare(regs: &mut Regs, reg: u8, val: u8) {
    let result = reg.wrapping_sub(val);
    set(regs, CARRY, reg >= val);
    regs.update_nz(result);
}

/// ARR: AND A with the operand, rotate right through carry, then derive
/// flags per the exact MAME-derived formula named in the component spec.
fn apply_arr(regs: &mut Regs, val: u8, bcd_disabled: bool) {
    let t = regs.a & val;
    let carry_in = regs.flag(CARRY) as u8;
    let rotated = (t >> 1) | (carry_in << 7);
    regs.a = rotated;
    regs.update_nz(rotated);

    let decimal = !bcd_disabled && regs.flag(DECIMAL);
    if !decimal {
        set(regs, CARRY, rotated & 0x40 != 0);
        set(regs, OVERFLOW, ((rotated >> 6) ^ (rotated >> 5)) & 1 != 0);
    } else {
        set(regs, OVERFLOW, ((rotated >> 6) ^ (t >> 6)) & 1 != 0);
        let mut a = rotated;
        if (t & 0x0F) + (t & 0x01) > 5 {
            a = (a & 0xF0) | ((a.wrapping_add(6)) & 0x0F);
        }
        if (t & 0xF0) as u16 + (t & 0x10) as u16 > 0x50 {
            a = a.wrapping_add(0x60);
            set(regs, CARRY, true);
        } else {
            set(regs, CARRY, false);
        }
        regs.a = a;
    }
}

/// Apply a read-modify-write operation to `val`, returning the new value
/// to be written back. Flags are updated in place.
pub fn apply_rmw(op: Op, regs: &mut Regs, val: u8) -> u8 {
    match op {
        Op::Asl => {
            let carry = val & 0x80 != 0;
            let r = val << 1;
            regs.update_nz(r);
            set(regs, CARRY, carry);
            r
        }
        Op::Lsr => {
            let carry = val & 0x01 != 0;
            let r = val >> 1;
            regs.update_nz(r);
            set(regs, CARRY, carry);
            r
        }
        Op::Rol => {
            let carry_in = regs.flag(CARRY) as u8;
            let carry_out = val & 0x80 != 0;
            let r = (val << 1) | carry_in;
            regs.update_nz(r);
            set(regs, CARRY, carry_out);
            r
        }
        Op::Ror => {
            let carry_in = regs.flag(CARRY) as u8;
            let carry_out = val & 0x01 != 0;
            let r = (val >> 1) | (carry_in << 7);
            regs.update_nz(r);
            set(regs, CARRY, carry_out);
            r
        }
        Op::Inc => {
            let r = val.wrapping_add(1);
            regs.update_nz(r);
            r
        }
        Op::Dec => {
            let r = val.wrapping_sub(1);
            regs.update_nz(r);
            r
        }
        Op::Slo => {
            let carry = val & 0x80 != 0;
            let r = val << 1;
            set(regs, CARRY, carry);
            regs.a |= r;
            regs.update_nz(regs.a);
            r
        }
        Op::Rla => {
            let carry_in = regs.flag(CARRY) as u8;
            let carry_out = val & 0x80 != 0;
            let r = (val << 1) | carry_in;
            set(regs, CARRY, carry_out);
            regs.a &= r;
            regs.update_nz(regs.a);
            r
        }
        Op::Sre => {
            let carry = val & 0x01 != 0;
            let r = val >> 1;
            set(regs, CARRY, carry);
            regs.a ^= r;
            regs.update_nz(regs.a);
            r
        }
        Op::Rra => {
            let carry_in = regs.flag(CARRY) as u8;
            let carry_out = val & 0x01 != 0;
            let r = (val >> 1) | (carry_in << 7);
            set(regs, CARRY, carry_out);
            let adc_res = bcd::adc(regs, r, true);
            // RRA always uses binary ADC semantics for the add-back step;
            // decimal-mode RRA is not a defined combination in practice.
            regs.a = adc_res.a;
            regs.p = adc_res.p;
            r
        }
        Op::Dcp => {
            let r = val.wrapping_sub(1);
            compare(regs, regs.a, r);
            r
        }
        Op::Isb => {
            let r = val.wrapping_add(1);
            let sbc_res = bcd::sbc(regs, r, true);
            regs.a = sbc_res.a;
            regs.p = sbc_res.p;
            r
        }
        _ => val,
    }
}

/// The byte a store-class operation places on the data bus.
pub fn store_value(op: Op, regs: &Regs) -> u8 {
    match op {
        Op::Sta => regs.a,
        Op::Stx => regs.x,
        Op::Sty => regs.y,
        Op::Sax => regs.a & regs.x,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lda_sets_nz() {
        let mut r = Regs::default();
        apply_read(Op::Lda, &mut r, 0x00, false);
        assert_eq!(r.a, 0);
        assert!(r.flag(ZERO));
    }

    #[test]
    fn cmp_sets_carry_when_reg_gte_operand() {
        let mut r = Regs::default();
        r.a = 0x10;
        apply_read(Op::Cmp, &mut r, 0x05, false);
        assert!(r.flag(CARRY));
        assert!(!r.flag(ZERO));
    }

    #[test]
    fn asl_shifts_and_sets_carry_from_bit7() {
        let mut r = Regs::default();
        let out = apply_rmw(Op::Asl, &mut r, 0x80);
        assert_eq!(out, 0);
        assert!(r.flag(CARRY));
        assert!(r.flag(ZERO));
    }

    #[test]
    fn sax_stores_a_and_x() {
        let mut r = Regs::default();
        r.a = 0b1100;
        r.x = 0b1010;
        assert_eq!(store_value(Op::Sax, &r), 0b1000);
    }
}
