/*!
table.rs - The 256-entry opcode table: for every opcode byte, which
addressing mode resolves its operand and which operation (or dedicated
control-flow routine) consumes it. This is the "decoder representation"
named in the component design: a flat lookup instead of a 256-armed
per-opcode switch, but the switch the table feeds is just as exhaustive.
*/

use super::addrmode::AddrMode;
use super::ops::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Bpl,
    Bmi,
    Bvc,
    Bvs,
    Bcc,
    Bcs,
    Bne,
    Beq,
}

impl Cond {
    pub fn is_taken(self, p: u8) -> bool {
        use super::state::{CARRY, NEGATIVE, OVERFLOW, ZERO};
        match self {
            Cond::Bpl => p & NEGATIVE == 0,
            Cond::Bmi => p & NEGATIVE != 0,
            Cond::Bvc => p & OVERFLOW == 0,
            Cond::Bvs => p & OVERFLOW != 0,
            Cond::Bcc => p & CARRY == 0,
            Cond::Bcs => p & CARRY != 0,
            Cond::Bne => p & ZERO == 0,
            Cond::Beq => p & ZERO != 0,
        }
    }
}

/// Control-flow and register-only opcodes that do not fit the generic
/// "resolve address, apply op" shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Brk,
    Jsr,
    Rts,
    Rti,
    JmpAbs,
    JmpInd,
    Pha,
    Php,
    Pla,
    Plp,
    Branch(Cond),
    Tax,
    Tay,
    Txa,
    Tya,
    Tsx,
    Txs,
    Dex,
    Dey,
    Inx,
    Iny,
    Clc,
    Sec,
    Cli,
    Sei,
    Clv,
    Cld,
    Sed,
    NopImplied,
    AslAcc,
    LsrAcc,
    RolAcc,
    RorAcc,
    Jam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Mem(AddrMode, Op),
    Special(Special),
}

use AddrMode::*;
use Op::*;

/// Look up the decode table entry for `opcode`.
pub fn decode(opcode: u8) -> Entry {
    match opcode {
        // 0x00
        0x00 => Entry::Special(Special::Brk),
        0x01 => Entry::Mem(IndirectX, Ora),
        0x02 => Entry::Special(Special::Jam),
        0x03 => Entry::Mem(IndirectX, Slo),
        0x04 => Entry::Mem(ZeroPage, Nop),
        0x05 => Entry::Mem(ZeroPage, Ora),
        0x06 => Entry::Mem(ZeroPage, Asl),
        0x07 => Entry::Mem(ZeroPage, Slo),
        0x08 => Entry::Special(Special::Php),
        0x09 => Entry::Mem(Immediate, Ora),
        0x0A => Entry::Special(Special::AslAcc),
        0x0B => Entry::Mem(Immediate, Anc),
        0x0C => Entry::Mem(Absolute, Nop),
        0x0D => Entry::Mem(Absolute, Ora),
        0x0E => Entry::Mem(Absolute, Asl),
        0x0F => Entry::Mem(Absolute, Slo),
        // 0x10
        0x10 => Entry::Special(Special::Branch(Cond::Bpl)),
        0x11 => Entry::Mem(IndirectY, Ora),
        0x12 => Entry::Special(Special::Jam),
        0x13 => Entry::Mem(IndirectY, Slo),
        0x14 => Entry::Mem(ZeroPageX, Nop),
        0x15 => Entry::Mem(ZeroPageX, Ora),
        0x16 => Entry::Mem(ZeroPageX, Asl),
        0x17 => Entry::Mem(ZeroPageX, Slo),
        0x18 => Entry::Special(Special::Clc),
        0x19 => Entry::Mem(AbsoluteY, Ora),
        0x1A => Entry::Special(Special::NopImplied),
        0x1B => Entry::Mem(AbsoluteY, Slo),
        0x1C => Entry::Mem(AbsoluteX, Nop),
        0x1D => Entry::Mem(AbsoluteX, Ora),
        0x1E => Entry::Mem(AbsoluteX, Asl),
        0x1F => Entry::Mem(AbsoluteX, Slo),
        // 0x20
        0x20 => Entry::Special(Special::Jsr),
        0x21 => Entry::Mem(IndirectX, And),
        0x22 => Entry::Special(Special::Jam),
        0x23 => Entry::Mem(IndirectX, Rla),
        0x24 => Entry::Mem(ZeroPage, Bit),
        0x25 => Entry::Mem(ZeroPage, And),
        0x26 => Entry::Mem(ZeroPage, Rol),
        0x27 => Entry::Mem(ZeroPage, Rla),
        0x28 => Entry::Special(Special::Plp),
        0x29 => Entry::Mem(Immediate, And),
        0x2A => Entry::Special(Special::RolAcc),
        0x2B => Entry::Mem(Immediate, Anc),
        0x2C => Entry::Mem(Absolute, Bit),
        0x2D => Entry::Mem(Absolute, And),
        0x2E => Entry::Mem(Absolute, Rol),
        0x2F => Entry::Mem(Absolute, Rla),
        // 0x30
        0x30 => Entry::Special(Special::Branch(Cond::Bmi)),
        0x31 => Entry::Mem(IndirectY, And),
        0x32 => Entry::Special(Special::Jam),
        0x33 => Entry::Mem(IndirectY, Rla),
        0x34 => Entry::Mem(ZeroPageX, Nop),
        0x35 => Entry::Mem(ZeroPageX, And),
        0x36 => Entry::Mem(ZeroPageX, Rol),
        0x37 => Entry::Mem(ZeroPageX, Rla),
        0x38 => Entry::Special(Special::Sec),
        0x39 => Entry::Mem(AbsoluteY, And),
        0x3A => Entry::Special(Special::NopImplied),
        0x3B => Entry::Mem(AbsoluteY, Rla),
        0x3C => Entry::Mem(AbsoluteX, Nop),
        0x3D => Entry::Mem(AbsoluteX, And),
        0x3E => Entry::Mem(AbsoluteX, Rol),
        0x3F => Entry::Mem(AbsoluteX, Rla),
        // 0x40
        0x40 => Entry::Special(Special::Rti),
        0x41 => Entry::Mem(IndirectX, Eor),
        0x42 => Entry::Special(Special::Jam),
        0x43 => Entry::Mem(IndirectX, Sre),
        0x44 => Entry::Mem(ZeroPage, Nop),
        0x45 => Entry::Mem(ZeroPage, Eor),
        0x46 => Entry::Mem(ZeroPage, Lsr),
        0x47 => Entry::Mem(ZeroPage, Sre),
        0x48 => Entry::Special(Special::Pha),
        0x49 => Entry::Mem(Immediate, Eor),
        0x4A => Entry::Special(Special::LsrAcc),
        0x4B => Entry::Mem(Immediate, Alr),
        0x4C => Entry::Special(Special::JmpAbs),
        0x4D => Entry::Mem(Absolute, Eor),
        0x4E => Entry::Mem(Absolute, Lsr),
        0x4F => Entry::Mem(Absolute, Sre),
        // 0x50
        0x50 => Entry::Special(Special::Branch(Cond::Bvc)),
        0x51 => Entry::Mem(IndirectY, Eor),
        0x52 => Entry::Special(Special::Jam),
        0x53 => Entry::Mem(IndirectY, Sre),
        0x54 => Entry::Mem(ZeroPageX, Nop),
        0x55 => Entry::Mem(ZeroPageX, Eor),
        0x56 => Entry::Mem(ZeroPageX, Lsr),
        0x57 => Entry::Mem(ZeroPageX, Sre),
        0x58 => Entry::Special(Special::Cli),
        0x59 => Entry::Mem(AbsoluteY, Eor),
        0x5A => Entry::Special(Special::NopImplied),
        0x5B => Entry::Mem(AbsoluteY, Sre),
        0x5C => Entry::Mem(AbsoluteX, Nop),
        0x5D => Entry::Mem(AbsoluteX, Eor),
        0x5E => Entry::Mem(AbsoluteX, Lsr),
        0x5F => Entry::Mem(AbsoluteX, Sre),
        // 0x60
        0x60 => Entry::Special(Special::Rts),
        0x61 => Entry::Mem(IndirectX, Adc),
        0x62 => Entry::Special(Special::Jam),
        0x63 => Entry::Mem(IndirectX, Rra),
        0x64 => Entry::Mem(ZeroPage, Nop),
        0x65 => Entry::Mem(ZeroPage, Adc),
        0x66 => Entry::Mem(ZeroPage, Ror),
        0x67 => Entry::Mem(ZeroPage, Rra),
        0x68 => Entry::Special(Special::Pla),
        0x69 => Entry::Mem(Immediate, Adc),
        0x6A => Entry::Special(Special::RorAcc),
        0x6B => Entry::Mem(Immediate, Arr),
        0x6C => Entry::Special(Special::JmpInd),
        0x6D => Entry::Mem(Absolute, Adc),
        0x6E => Entry::Mem(Absolute, Ror),
        0x6F => Entry::Mem(Absolute, Rra),
        // 0x70
        0x70 => Entry::Special(Special::Branch(Cond::Bvs)),
        0x71 => Entry::Mem(IndirectY, Adc),
        0x72 => Entry::Special(Special::Jam),
        0x73 => Entry::Mem(IndirectY, Rra),
        0x74 => Entry::Mem(ZeroPageX, Nop),
        0x75 => Entry::Mem(ZeroPageX, Adc),
        0x76 => Entry::Mem(ZeroPageX, Ror),
        0x77 => Entry::Mem(ZeroPageX, Rra),
        0x78 => Entry::Special(Special::Sei),
        0x79 => Entry::Mem(AbsoluteY, Adc),
        0x7A => Entry::Special(Special::NopImplied),
        0x7B => Entry::Mem(AbsoluteY, Rra),
        0x7C => Entry::Mem(AbsoluteX, Nop),
        0x7D => Entry::Mem(AbsoluteX, Adc),
        0x7E => Entry::Mem(AbsoluteX, Ror),
        0x7F => Entry::Mem(AbsoluteX, Rra),
        // 0x80
        0x80 => Entry::Mem(Immediate, Nop),
        0x81 => Entry::Mem(IndirectX, Sta),
        0x82 => Entry::Mem(Immediate, Nop),
        0x83 => Entry::Mem(IndirectX, Sax),
        0x84 => Entry::Mem(ZeroPage, Sty),
        0x85 => Entry::Mem(ZeroPage, Sta),
        0x86 => Entry::Mem(ZeroPage, Stx),
        0x87 => Entry::Mem(ZeroPage, Sax),
        0x88 => Entry::Special(Special::Dey),
        0x89 => Entry::Mem(Immediate, Nop),
        0x8A => Entry::Special(Special::Txa),
        0x8B => Entry::Mem(Immediate, Ane),
        0x8C => Entry::Mem(Absolute, Sty),
        0x8D => Entry::Mem(Absolute, Sta),
        0x8E => Entry::Mem(Absolute, Stx),
        0x8F => Entry::Mem(Absolute, Sax),
        // 0x90
        0x90 => Entry::Special(Special::Branch(Cond::Bcc)),
        0x91 => Entry::Mem(IndirectY, Sta),
        0x92 => Entry::Special(Special::Jam),
        0x93 => Entry::Mem(IndirectY, Sha),
        0x94 => Entry::Mem(ZeroPageX, Sty),
        0x95 => Entry::Mem(ZeroPageX, Sta),
        0x96 => Entry::Mem(ZeroPageY, Stx),
        0x97 => Entry::Mem(ZeroPageY, Sax),
        0x98 => Entry::Special(Special::Tya),
        0x99 => Entry::Mem(AbsoluteY, Sta),
        0x9A => Entry::Special(Special::Txs),
        0x9B => Entry::Mem(AbsoluteY, Shs),
        0x9C => Entry::Mem(AbsoluteX, Shy),
        0x9D => Entry::Mem(AbsoluteX, Sta),
        0x9E => Entry::Mem(AbsoluteY, Shx),
        0x9F => Entry::Mem(AbsoluteY, Sha),
        // 0xA0
        0xA0 => Entry::Mem(Immediate, Ldy),
        0xA1 => Entry::Mem(IndirectX, Lda),
        0xA2 => Entry::Mem(Immediate, Ldx),
        0xA3 => Entry::Mem(IndirectX, Lax),
        0xA4 => Entry::Mem(ZeroPage, Ldy),
        0xA5 => Entry::Mem(ZeroPage, Lda),
        0xA6 => Entry::Mem(ZeroPage, Ldx),
        0xA7 => Entry::Mem(ZeroPage, Lax),
        0xA8 => Entry::Special(Special::Tay),
        0xA9 => Entry::Mem(Immediate, Lda),
        0xAA => Entry::Special(Special::Tax),
        0xAB => Entry::Mem(Immediate, Lxa),
        0xAC => Entry::Mem(Absolute, Ldy),
        0xAD => Entry::Mem(Absolute, Lda),
        0xAE => Entry::Mem(Absolute, Ldx),
        0xAF => Entry::Mem(Absolute, Lax),
        // 0xB0
        0xB0 => Entry::Special(Special::Branch(Cond::Bcs)),
        0xB1 => Entry::Mem(IndirectY, Lda),
        0xB2 => Entry::Special(Special::Jam),
        0xB3 => Entry::Mem(IndirectY, Lax),
        0xB4 => Entry::Mem(ZeroPageX, Ldy),
        0xB5 => Entry::Mem(ZeroPageX, Lda),
        0xB6 => Entry::Mem(ZeroPageY, Ldx),
        0xB7 => Entry::Mem(ZeroPageY, Lax),
        0xB8 => Entry::Special(Special::Clv),
        0xB9 => Entry::Mem(AbsoluteY, Lda),
        0xBA => Entry::Special(Special::Tsx),
        0xBB => Entry::Mem(AbsoluteY, Las),
        0xBC => Entry::Mem(AbsoluteX, Ldy),
        0xBD => Entry::Mem(AbsoluteX, Lda),
        0xBE => Entry::Mem(AbsoluteY, Ldx),
        0xBF => Entry::Mem(AbsoluteY, Lax),
        // 0xC0
        0xC0 => Entry::Mem(Immediate, Cpy),
        0xC1 => Entry::Mem(IndirectX, Cmp),
        0xC2 => Entry::Mem(Immediate, Nop),
        0xC3 => Entry::Mem(IndirectX, Dcp),
        0xC4 => Entry::Mem(ZeroPage, Cpy),
        0xC5 => Entry::Mem(ZeroPage, Cmp),
        0xC6 => Entry::Mem(ZeroPage, Dec),
        0xC7 => Entry::Mem(ZeroPage, Dcp),
        0xC8 => Entry::Special(Special::Iny),
        0xC9 => Entry::Mem(Immediate, Cmp),
        0xCA => Entry::Special(Special::Dex),
        0xCB => Entry::Mem(Immediate, Sbx),
        0xCC => Entry::Mem(Absolute, Cpy),
        0xCD => Entry::Mem(Absolute, Cmp),
        0xCE => Entry::Mem(Absolute, Dec),
        0xCF => Entry::Mem(Absolute, Dcp),
        // 0xD0
        0xD0 => Entry::Special(Special::Branch(Cond::Bne)),
        0xD1 => Entry::Mem(IndirectY, Cmp),
        0xD2 => Entry::Special(Special::Jam),
        0xD3 => Entry::Mem(IndirectY, Dcp),
        0xD4 => Entry::Mem(ZeroPageX, Nop),
        0xD5 => Entry::Mem(ZeroPageX, Cmp),
        0xD6 => Entry::Mem(ZeroPageX, Dec),
        0xD7 => Entry::Mem(ZeroPageX, Dcp),
        0xD8 => Entry::Special(Special::Cld),
        0xD9 => Entry::Mem(AbsoluteY, Cmp),
        0xDA => Entry::Special(Special::NopImplied),
        0xDB => Entry::Mem(AbsoluteY, Dcp),
        0xDC => Entry::Mem(AbsoluteX, Nop),
        0xDD => Entry::Mem(AbsoluteX, Cmp),
        0xDE => Entry::Mem(AbsoluteX, Dec),
        0xDF => Entry::Mem(AbsoluteX, Dcp),
        // 0xE0
        0xE0 => Entry::Mem(Immediate, Cpx),
        0xE1 => Entry::Mem(IndirectX, Sbc),
        0xE2 => Entry::Mem(Immediate, Nop),
        0xE3 => Entry::Mem(IndirectX, Isb),
        0xE4 => Entry::Mem(ZeroPage, Cpx),
        0xE5 => Entry::Mem(ZeroPage, Sbc),
        0xE6 => Entry::Mem(ZeroPage, Inc),
        0xE7 => Entry::Mem(ZeroPage, Isb),
        0xE8 => Entry::Special(Special::Inx),
        0xE9 => Entry::Mem(Immediate, Sbc),
        0xEA => Entry::Special(Special::NopImplied),
        0xEB => Entry::Mem(Immediate, Sbc),
        0xEC => Entry::Mem(Absolute, Cpx),
        0xED => Entry::Mem(Absolute, Sbc),
        0xEE => Entry::Mem(Absolute, Inc),
        0xEF => Entry::Mem(Absolute, Isb),
        // 0xF0
        0xF0 => Entry::Special(Special::Branch(Cond::Beq)),
        0xF1 => Entry::Mem(IndirectY, Sbc),
        0xF2 => Entry::Special(Special::Jam),
        0xF3 => Entry::Mem(IndirectY, Isb),
        0xF4 => Entry::Mem(ZeroPageX, Nop),
        0xF5 => Entry::Mem(ZeroPageX, Sbc),
        0xF6 => Entry::Mem(ZeroPageX, Inc),
        0xF7 => Entry::Mem(ZeroPageX, Isb),
        0xF8 => Entry::Special(Special::Sed),
        0xF9 => Entry::Mem(AbsoluteY, Sbc),
        0xFA => Entry::Special(Special::NopImplied),
        0xFB => Entry::Mem(AbsoluteY, Isb),
        0xFC => Entry::Mem(AbsoluteX, Nop),
        0xFD => Entry::Mem(AbsoluteX, Sbc),
        0xFE => Entry::Mem(AbsoluteX, Inc),
        0xFF => Entry::Mem(AbsoluteX, Isb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lda_immediate_decodes() {
        assert_eq!(decode(0xA9), Entry::Mem(Immediate, Lda));
    }

    #[test]
    fn brk_and_branches_are_special() {
        assert_eq!(decode(0x00), Entry::Special(Special::Brk));
        assert_eq!(decode(0xF0), Entry::Special(Special::Branch(Cond::Beq)));
    }
}
