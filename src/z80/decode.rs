/*!
decode.rs - Opcode decoding for the Z80 core.

The unprefixed and CB-prefixed tables are decoded with the standard
bit-field decomposition of a Z80 opcode byte (`x = op>>6`, `y = (op>>3)&7`,
`z = op&7`, with `p = y>>1`, `q = y&1`), the same systematic layout the
chip's designers used when assigning encodings, rather than as a literal
256/256-entry lookup table. That keeps the full unprefixed and CB opcode
spaces exact and exhaustive instead of hand-transcribed.

`(HL)` operands decode to `R8::HlInd` / a dedicated `IndHl` marker
regardless of whether a DD/FD prefix is in effect; `mod.rs` resolves the
actual address (`HL`, `IX+d`, or `IY+d`) from the CPU's current
[`super::regs::IndexMode`] at execution time, which is how real DD/FD
prefixes work (they redirect `H`, `L`, and `(HL)`, not re-encode the
instruction). ED-prefixed coverage is representative rather than
exhaustive: the commonly emulated subset (block instructions, NEG,
RETN/RETI, interrupt mode selection, `LD A,I`/`LD A,R`/`LD I,A`/`LD R,A`,
16-bit `ADC`/`SBC HL,ss`, `LD (nn),ss`/`LD ss,(nn)`, `IN r,(C)`/`OUT
(C),r`, `RRD`/`RLD`) is implemented; other ED opcodes (mostly redundant
NOPs on real silicon) decode to `Instr::EdNop`. See DESIGN.md.
*/

use super::regs::{Cond, R16, R16Stack, R8};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    Nop,
    Halt,
    Di,
    Ei,
    Im(u8),
    LdR8R8(R8, R8),
    LdR8Imm(R8),
    LdR16Imm(R16),
    LdIndBcA,
    LdIndDeA,
    LdAIndBc,
    LdAIndDe,
    LdIndNnHl,
    LdHlIndNn,
    LdIndNnA,
    LdAIndNn,
    LdSpHl,
    Push(R16Stack),
    Pop(R16Stack),
    ExDeHl,
    ExAfAf,
    Exx,
    ExSpHl,
    Alu(AluOp, R8),
    AluImm(AluOp),
    Inc8(R8),
    Dec8(R8),
    Inc16(R16),
    Dec16(R16),
    AddHl(R16),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    JpNn,
    JpCc(Cond),
    JpHl,
    JrE,
    JrCc(Cond),
    Djnz,
    CallNn,
    CallCc(Cond),
    Ret,
    RetCc(Cond),
    Rst(u8),
    OutNA,
    InAN,
    CbRot(RotOp, R8),
    CbBit(u8, R8),
    CbRes(u8, R8),
    CbSet(u8, R8),
    // ED-prefixed, representative subset.
    Neg,
    Retn,
    Reti,
    LdAI,
    LdAR,
    LdIA,
    LdRA,
    AdcHl(R16),
    SbcHl(R16),
    LdNnR16(R16),
    LdR16Nn(R16),
    InRC(R8),
    OutCR(R8),
    InFC,
    OutC0,
    Rrd,
    Rld,
    Ldi,
    Ldir,
    Ldd,
    Lddr,
    Cpi,
    Cpir,
    Cpd,
    Cpdr,
    Ini,
    Inir,
    Ind,
    Indr,
    Outi,
    Otir,
    Outd,
    Otdr,
    EdNop,
}

fn r8_of(idx: u8) -> R8 {
    match idx {
        0 => R8::B,
        1 => R8::C,
        2 => R8::D,
        3 => R8::E,
        4 => R8::H,
        5 => R8::L,
        6 => R8::HlInd,
        _ => R8::A,
    }
}

fn r16_of(p: u8) -> R16 {
    match p {
        0 => R16::Bc,
        1 => R16::De,
        2 => R16::Hl,
        _ => R16::Sp,
    }
}

fn r16stack_of(p: u8) -> R16Stack {
    match p {
        0 => R16Stack::Bc,
        1 => R16Stack::De,
        2 => R16Stack::Hl,
        _ => R16Stack::Af,
    }
}

fn cond_of(y: u8) -> Cond {
    match y {
        0 => Cond::Nz,
        1 => Cond::Z,
        2 => Cond::Nc,
        3 => Cond::C,
        4 => Cond::Po,
        5 => Cond::Pe,
        6 => Cond::P,
        _ => Cond::M,
    }
}

fn alu_of(y: u8) -> AluOp {
    match y {
        0 => AluOp::Add,
        1 => AluOp::Adc,
        2 => AluOp::Sub,
        3 => AluOp::Sbc,
        4 => AluOp::And,
        5 => AluOp::Xor,
        6 => AluOp::Or,
        _ => AluOp::Cp,
    }
}

fn rot_of(y: u8) -> RotOp {
    match y {
        0 => RotOp::Rlc,
        1 => RotOp::Rrc,
        2 => RotOp::Rl,
        3 => RotOp::Rr,
        4 => RotOp::Sla,
        5 => RotOp::Sra,
        6 => RotOp::Sll,
        _ => RotOp::Srl,
    }
}

/// Decode a non-prefixed opcode byte (also used, unchanged, for opcode
/// bytes following a DD/FD prefix - only the operand resolution differs).
pub fn decode_main(op: u8) -> Instr {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    match (x, z) {
        (0, 0) => match y {
            0 => Instr::Nop,
            1 => Instr::ExAfAf,
            2 => Instr::Djnz,
            3 => Instr::JrE,
            _ => Instr::JrCc(cond_of(y - 4)),
        },
        (0, 1) if q == 0 => Instr::LdR16Imm(r16_of(p)),
        (0, 1) => Instr::AddHl(r16_of(p)),
        (0, 2) => match (p, q) {
            (0, 0) => Instr::LdIndBcA,
            (0, 1) => Instr::LdAIndBc,
            (1, 0) => Instr::LdIndDeA,
            (1, 1) => Instr::LdAIndDe,
            (2, 0) => Instr::LdIndNnHl,
            (2, 1) => Instr::LdHlIndNn,
            (3, 0) => Instr::LdIndNnA,
            _ => Instr::LdAIndNn,
        },
        (0, 3) if q == 0 => Instr::Inc16(r16_of(p)),
        (0, 3) => Instr::Dec16(r16_of(p)),
        (0, 4) => Instr::Inc8(r8_of(y)),
        (0, 5) => Instr::Dec8(r8_of(y)),
        (0, 6) => Instr::LdR8Imm(r8_of(y)),
        (0, 7) => match y {
            0 => Instr::Rlca,
            1 => Instr::Rrca,
            2 => Instr::Rla,
            3 => Instr::Rra,
            4 => Instr::Daa,
            5 => Instr::Cpl,
            6 => Instr::Scf,
            _ => Instr::Ccf,
        },
        (1, 6) if y == 6 => Instr::Halt,
        (1, _) => Instr::LdR8R8(r8_of(y), r8_of(z)),
        (2, _) => Instr::Alu(alu_of(y), r8_of(z)),
        (3, 0) => Instr::RetCc(cond_of(y)),
        (3, 1) if q == 0 => Instr::Pop(r16stack_of(p)),
        (3, 1) => match p {
            0 => Instr::Ret,
            1 => Instr::Exx,
            2 => Instr::JpHl,
            _ => Instr::LdSpHl,
        },
        (3, 2) => Instr::JpCc(cond_of(y)),
        (3, 3) => match y {
            0 => Instr::JpNn,
            // 1 = 0xCB prefix, handled by the caller before reaching here.
            2 => Instr::OutNA,
            3 => Instr::InAN,
            4 => Instr::ExSpHl,
            5 => Instr::ExDeHl,
            6 => Instr::Di,
            _ => Instr::Ei,
        },
        (3, 4) => Instr::CallCc(cond_of(y)),
        (3, 5) if q == 0 => Instr::Push(r16stack_of(p)),
        (3, 5) if p == 0 => Instr::CallNn,
        // p = 1,2,3 with q = 1 are the DD/ED/FD prefixes, handled by the caller.
        (3, 5) => Instr::Nop,
        (3, 6) => Instr::AluImm(alu_of(y)),
        (3, 7) => Instr::Rst(y * 8),
        _ => Instr::Nop,
    }
}

pub fn decode_cb(op: u8) -> Instr {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let r = r8_of(z);
    match x {
        0 => Instr::CbRot(rot_of(y), r),
        1 => Instr::CbBit(y, r),
        2 => Instr::CbRes(y, r),
        _ => Instr::CbSet(y, r),
    }
}

/// Decode an ED-prefixed opcode. Returns `Instr::EdNop` for bytes with no
/// documented effect (real hardware burns 8 T-states and leaves state
/// unchanged).
pub fn decode_ed(op: u8) -> Instr {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    if x == 2 {
        return if y >= 4 && z <= 3 {
            block_instr(y, z)
        } else {
            Instr::EdNop
        };
    }
    if x != 1 {
        return Instr::EdNop;
    }
    match z {
        0 => match y {
            6 => Instr::InFC,
            _ => Instr::InRC(r8_of(y)),
        },
        1 => match y {
            6 => Instr::OutC0,
            _ => Instr::OutCR(r8_of(y)),
        },
        2 if q == 0 => Instr::SbcHl(r16_of(p)),
        2 => Instr::AdcHl(r16_of(p)),
        3 if q == 0 => Instr::LdNnR16(r16_of(p)),
        3 => Instr::LdR16Nn(r16_of(p)),
        4 => Instr::Neg,
        5 if y == 1 => Instr::Reti,
        5 => Instr::Retn,
        6 => Instr::Im(match y % 4 {
            0 | 1 => 0,
            2 => 1,
            _ => 2,
        }),
        7 => match y {
            0 => Instr::LdIA,
            1 => Instr::LdRA,
            2 => Instr::LdAI,
            3 => Instr::LdAR,
            4 => Instr::Rrd,
            5 => Instr::Rld,
            _ => Instr::EdNop,
        },
        _ => Instr::EdNop,
    }
}

fn block_instr(y: u8, z: u8) -> Instr {
    match (y, z) {
        (4, 0) => Instr::Ldi,
        (5, 0) => Instr::Ldd,
        (6, 0) => Instr::Ldir,
        (7, 0) => Instr::Lddr,
        (4, 1) => Instr::Cpi,
        (5, 1) => Instr::Cpd,
        (6, 1) => Instr::Cpir,
        (7, 1) => Instr::Cpdr,
        (4, 2) => Instr::Ini,
        (5, 2) => Instr::Ind,
        (6, 2) => Instr::Inir,
        (7, 2) => Instr::Indr,
        (4, 3) => Instr::Outi,
        (5, 3) => Instr::Outd,
        (6, 3) => Instr::Otir,
        (7, 3) => Instr::Otdr,
        _ => Instr::EdNop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ld_b_c() {
        // 0x41 = LD B,C
        assert_eq!(decode_main(0x41), Instr::LdR8R8(R8::B, R8::C));
    }

    #[test]
    fn decodes_halt_not_ld_hl_hl() {
        assert_eq!(decode_main(0x76), Instr::Halt);
    }

    #[test]
    fn decodes_add_a_hl_ind() {
        assert_eq!(decode_main(0x86), Instr::Alu(AluOp::Add, R8::HlInd));
    }

    #[test]
    fn decodes_cb_bit_table() {
        // 0x7E = BIT 7,(HL)
        assert_eq!(decode_cb(0x7E), Instr::CbBit(7, R8::HlInd));
    }

    #[test]
    fn decodes_ed_block_ldir() {
        assert_eq!(decode_ed(0xB0), Instr::Ldir);
    }

    #[test]
    fn decodes_ed_neg_and_im() {
        assert_eq!(decode_ed(0x44), Instr::Neg);
        assert_eq!(decode_ed(0x56), Instr::Im(1));
        assert_eq!(decode_ed(0x5E), Instr::Im(2));
    }
}
