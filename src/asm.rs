//! Assembling source programs into machine words.
//!
//! This module translates the same source-line language the simulator
//! executes ([`crate::sim`]) into 32-bit RISC-V machine words, rendered as
//! 8-digit lowercase hex. Both sides decode operands with [`crate::parse`]
//! and read opcodes, funct3, and funct7 from the shared table on
//! [`Mnemonic`], so an instruction accepted by one is encoded and executed
//! consistently by the other.
//!
//! The two-pass structure mirrors the simulator's loader: the first pass
//! assigns every non-comment line a 4-byte slot (blank lines included) and
//! collects label addresses; the second pass encodes each instruction line.
//! Data directives are not part of the assembler's input language.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{InstrFormat, Mnemonic};
use crate::parse::{self, ParseErr};

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmErr {
    /// The error.
    pub kind: AsmErrKind,
    /// The 1-indexed source line the error occurred on.
    pub line: usize,
}

impl fmt::Display for AsmErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        self.kind.help()
    }
}

/// The kinds of error that can occur during assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmErrKind {
    /// A line could not be parsed into an instruction.
    Parse(ParseErr),
    /// The mnemonic is not part of the accepted subset.
    UnknownInstr(String),
    /// An immediate does not fit the field width its format allows.
    ImmOutOfRange {
        /// The width of the immediate field, in bits.
        bits: u32,
    },
    /// A shift amount was outside `0..64`.
    ShiftOutOfRange(i64),
    /// The immediate of `lui` had a leading `-`.
    NegativeLuiImm,
    /// The immediate of `lui` was written in a radix it does not accept.
    InvalidLuiImm,
    /// A label was defined on more than one line.
    DuplicateLabel(String),
}

impl From<ParseErr> for AsmErrKind {
    fn from(e: ParseErr) -> Self {
        AsmErrKind::Parse(e)
    }
}

impl fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::UnknownInstr(name) => write!(f, "instruction {name} not found"),
            Self::ImmOutOfRange { bits } => write!(f, "value cannot be stored in {bits} bits"),
            Self::ShiftOutOfRange(n) => write!(f, "cannot shift by {n} bits"),
            Self::NegativeLuiImm => f.write_str("immediate value cannot be negative"),
            Self::InvalidLuiImm => f.write_str("wrong immediate value"),
            Self::DuplicateLabel(name) => write!(f, "multiple definitions for label {name}"),
        }
    }
}
impl std::error::Error for AsmErrKind {}
impl crate::err::Error for AsmErrKind {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            Self::Parse(e) => e.help(),
            Self::UnknownInstr(_) => Some("mnemonics are lowercase, e.g. add, lw, beq".into()),
            Self::ShiftOutOfRange(_) => Some("shift amounts are 0 to 63".into()),
            Self::NegativeLuiImm => Some("lui takes an unsigned 20-bit immediate".into()),
            Self::InvalidLuiImm => Some("lui takes a decimal or hex immediate".into()),
            _ => None,
        }
    }
}

/// Assembles a source program, producing one 8-digit lowercase hex word
/// per instruction line, in source order.
///
/// Every non-comment line occupies a 4-byte slot for addressing purposes
/// (blank and label-only lines included), so label displacements agree
/// with the simulator's line slotting; only instruction lines produce an
/// output word.
pub fn assemble(src: &str) -> Result<Vec<String>, AsmErr> {
    // pass 1: slot the lines and collect labels
    let lines: Vec<String> = src.lines()
        .filter(|raw| !raw.trim_start().starts_with(';'))
        .map(|raw| parse::strip_comment(raw).trim_end().to_string())
        .collect();

    let mut labels: HashMap<String, i64> = HashMap::new();
    for (slot, line) in lines.iter().enumerate() {
        let Some((pre, _)) = line.split_once(':') else { continue };
        let name = pre.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            continue;
        }
        if labels.insert(name.to_string(), (slot * 4) as i64).is_some() {
            return Err(AsmErr {
                kind: AsmErrKind::DuplicateLabel(name.to_string()),
                line: slot + 1,
            });
        }
    }

    // pass 2: encode
    let mut words = Vec::new();
    for (slot, line) in lines.iter().enumerate() {
        let parsed = parse::parse_line(line)
            .map_err(|e| AsmErr { kind: e.into(), line: slot + 1 })?;
        let Some((mnemonic, ops)) = parsed.instr else { continue };

        let pc = (slot * 4) as i64;
        let word = encode_instr(&mnemonic, &ops, pc, &labels)
            .map_err(|kind| AsmErr { kind, line: slot + 1 })?;
        words.push(format!("{word:08x}"));
    }
    Ok(words)
}

fn check_bits(value: i64, bits: u32) -> Result<(), AsmErrKind> {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    if value < min || value > max {
        return Err(AsmErrKind::ImmOutOfRange { bits });
    }
    Ok(())
}

/// Encodes one instruction into its 32-bit machine word.
fn encode_instr(
    mnemonic: &str,
    ops: &[parse::Operand],
    pc: i64,
    labels: &HashMap<String, i64>,
) -> Result<u32, AsmErrKind> {
    let m: Mnemonic = mnemonic.parse()
        .map_err(|_| AsmErrKind::UnknownInstr(mnemonic.to_string()))?;
    let (op, f3, f7) = (m.opcode(), m.funct3(), m.funct7());

    match m.format() {
        InstrFormat::R => {
            parse::operand_count(ops, 3)?;
            let rd = parse::register(&ops[0])?.reg_no() as u32;
            let rs1 = parse::register(&ops[1])?.reg_no() as u32;
            let rs2 = parse::register(&ops[2])?.reg_no() as u32;
            Ok(f7 << 25 | rs2 << 20 | rs1 << 15 | f3 << 12 | rd << 7 | op)
        }
        InstrFormat::IArith => {
            parse::operand_count(ops, 3)?;
            let rd = parse::register(&ops[0])?.reg_no() as u32;
            let rs1 = parse::register(&ops[1])?.reg_no() as u32;
            let imm = parse::immediate(&ops[2], pc, None)?.value;

            let field = if m.is_shift() {
                if !(0..64).contains(&imm) {
                    return Err(AsmErrKind::ShiftOutOfRange(imm));
                }
                match m {
                    // srai carries its funct7-like marker in the upper
                    // immediate bits
                    Mnemonic::Srai => (imm as u32 & 63) | (0x10 << 6),
                    _ => imm as u32,
                }
            } else {
                check_bits(imm, 12)?;
                imm as u32 & 0xFFF
            };
            Ok(field << 20 | rs1 << 15 | f3 << 12 | rd << 7 | op)
        }
        InstrFormat::Load => {
            parse::operand_count(ops, 3)?;
            let rd = parse::register(&ops[0])?.reg_no() as u32;
            let imm = parse::immediate(&ops[1], pc, None)?.value;
            let rs1 = parse::register(&ops[2])?.reg_no() as u32;
            check_bits(imm, 12)?;
            Ok((imm as u32 & 0xFFF) << 20 | rs1 << 15 | f3 << 12 | rd << 7 | op)
        }
        InstrFormat::Store => {
            parse::operand_count(ops, 3)?;
            let rs2 = parse::register(&ops[0])?.reg_no() as u32;
            let imm = parse::immediate(&ops[1], pc, None)?.value;
            let rs1 = parse::register(&ops[2])?.reg_no() as u32;
            check_bits(imm, 12)?;

            let imm = imm as u32;
            let imm_11_5 = (imm >> 5) & 0x7F;
            let imm_4_0 = imm & 0x1F;
            Ok(imm_11_5 << 25 | rs2 << 20 | rs1 << 15 | f3 << 12 | imm_4_0 << 7 | op)
        }
        InstrFormat::Branch => {
            parse::operand_count(ops, 3)?;
            let rs1 = parse::register(&ops[0])?.reg_no() as u32;
            let rs2 = parse::register(&ops[1])?.reg_no() as u32;
            let imm = parse::immediate(&ops[2], pc, Some(labels))?;
            check_bits(imm.value, 13)?;

            let enc = halve_displacement(&imm) as u32;
            let imm_12 = (enc >> 11) & 1;
            let imm_11 = (enc >> 10) & 1;
            let imm_10_5 = (enc >> 4) & 0x3F;
            let imm_4_1 = enc & 0xF;
            Ok(imm_12 << 31 | imm_10_5 << 25 | rs2 << 20 | rs1 << 15 | f3 << 12
                | imm_4_1 << 8 | imm_11 << 7 | op)
        }
        InstrFormat::Jal => {
            parse::operand_count(ops, 2)?;
            let rd = parse::register(&ops[0])?.reg_no() as u32;
            let imm = parse::immediate(&ops[1], pc, Some(labels))?;
            check_bits(imm.value, 21)?;

            let enc = halve_displacement(&imm) as u32;
            let imm_20 = (enc >> 19) & 1;
            let imm_19_12 = (enc >> 11) & 0xFF;
            let imm_11 = (enc >> 10) & 1;
            let imm_10_1 = enc & 0x3FF;
            Ok(imm_20 << 31 | imm_10_1 << 21 | imm_11 << 20 | imm_19_12 << 12 | rd << 7 | op)
        }
        InstrFormat::Lui => {
            parse::operand_count(ops, 2)?;
            let rd = parse::register(&ops[0])?.reg_no() as u32;
            let imm = parse::immediate(&ops[1], pc, None)?;
            let Some(lit) = imm.lit else {
                return Err(AsmErrKind::InvalidLuiImm);
            };
            if lit.neg {
                return Err(AsmErrKind::NegativeLuiImm);
            }
            if lit.radix == crate::parse::lex::Radix::Bin {
                return Err(AsmErrKind::InvalidLuiImm);
            }
            if lit.magnitude > 0xFFFFF {
                return Err(AsmErrKind::ImmOutOfRange { bits: 20 });
            }
            Ok((lit.magnitude as u32) << 12 | rd << 7 | op)
        }
        InstrFormat::Auipc => {
            parse::operand_count(ops, 2)?;
            let rd = parse::register(&ops[0])?.reg_no() as u32;
            let imm = parse::immediate(&ops[1], pc, None)?.value;
            if imm > 0xFFFFF || imm < -0x80000 {
                return Err(AsmErrKind::ImmOutOfRange { bits: 20 });
            }
            Ok((imm as u32 & 0xFFFFF) << 12 | rd << 7 | op)
        }
    }
}

/// Halves a branch/jump displacement into its encoded form.
///
/// Label displacements are always 4-byte multiples, so `disp / 4 * 2` is
/// exact. A numeric displacement is halved with truncating division,
/// biased one toward zero when the source literal was negative.
fn halve_displacement(imm: &parse::Imm) -> i64 {
    if imm.label_relative {
        imm.value / 4 * 2
    } else {
        let neg = imm.lit.is_some_and(|lit| lit.neg);
        (imm.value + if neg { -1 } else { 0 }) / 2
    }
}

#[cfg(test)]
mod test {
    use super::{assemble, AsmErrKind};
    use crate::parse::ParseErr;

    fn word(src: &str) -> u32 {
        let words = assemble(src).unwrap();
        assert_eq!(words.len(), 1, "expected a single instruction");
        u32::from_str_radix(&words[0], 16).unwrap()
    }

    fn kind(src: &str) -> AsmErrKind {
        assemble(src).unwrap_err().kind
    }

    // field extractors for round-trip checks
    fn i_imm(word: u32) -> i32 {
        (word as i32) >> 20
    }
    fn s_imm(word: u32) -> i32 {
        ((word as i32) >> 25 << 5 | ((word >> 7) & 0x1F) as i32) << 20 >> 20
    }
    fn b_disp(word: u32) -> i32 {
        // reassemble the halved displacement, then undo the halving
        let enc = ((word as i32) >> 31 << 11)
            | (((word >> 7) & 1) as i32) << 10
            | (((word >> 25) & 0x3F) as i32) << 4
            | (((word >> 8) & 0xF) as i32);
        enc * 2
    }

    #[test]
    fn test_r_type() {
        // add x3, x1, x2
        assert_eq!(word("add x3, x1, x2"), 0x002081B3);
        // sub keeps funct7 0100000
        assert_eq!(word("sub x3, x1, x2"), 0x402081B3);
        assert_eq!(word("sltu x5, x6, x7"), 0x0073_32B3);
    }

    #[test]
    fn test_i_type_round_trip() {
        for imm in [-2048, -1, 0, 1, 42, 2047] {
            let w = word(&format!("addi x1, x2, {imm}"));
            assert_eq!(i_imm(w), imm, "imm {imm}");
            assert_eq!(w & 0x7F, 0x13);
        }
    }

    #[test]
    fn test_shifts() {
        // slli x1, x2, 3
        let w = word("slli x1, x2, 3");
        assert_eq!((w >> 20) & 0x3F, 3);
        // srai marks the shift amount with 0x10 in the upper immediate bits
        let w = word("srai x1, x2, 3");
        assert_eq!((w >> 20) & 0x3F, 3);
        assert_eq!(w >> 26, 0x10);
        assert_eq!(kind("slli x1, x2, 64"), AsmErrKind::ShiftOutOfRange(64));
    }

    #[test]
    fn test_load_store_round_trip() {
        let w = word("lw x5, -4(x2)");
        assert_eq!(i_imm(w), -4);
        assert_eq!(w & 0x7F, 0x03);

        for imm in [-2048, -32, 0, 31, 2047] {
            let w = word(&format!("sw x5, {imm}(x2)"));
            assert_eq!(s_imm(w), imm, "imm {imm}");
            assert_eq!(w & 0x7F, 0x23);
        }
    }

    #[test]
    fn test_branch_label_round_trip() {
        // slots: beq at 0, blanks at 4/8, target at 12 -> displacement +12
        let src = "beq x1, x2, target\n\n\ntarget: add x0, x0, x0";
        let words = assemble(src).unwrap();
        assert_eq!(words.len(), 2);
        let w = u32::from_str_radix(&words[0], 16).unwrap();
        assert_eq!(b_disp(w), 12);
        assert_eq!(w & 0x7F, 0x63);
    }

    #[test]
    fn test_branch_backwards() {
        let src = "loop: add x0, x0, x0\nbne x1, x0, loop";
        let words = assemble(src).unwrap();
        let w = u32::from_str_radix(&words[1], 16).unwrap();
        assert_eq!(b_disp(w), -4);
    }

    #[test]
    fn test_jal_label() {
        // jal at slot 0, target at slot 2 -> displacement +8
        let src = "jal x1, func\nadd x0, x0, x0\nfunc: add x0, x0, x0";
        let words = assemble(src).unwrap();
        let w = u32::from_str_radix(&words[0], 16).unwrap();
        assert_eq!(w & 0x7F, 0x6F);
        assert_eq!((w >> 7) & 0x1F, 1); // rd = x1
        // imm[10:1] holds the halved displacement 4
        assert_eq!((w >> 21) & 0x3FF, 4);
    }

    #[test]
    fn test_lui_auipc() {
        let w = word("lui x2, 0x10");
        assert_eq!(w >> 12, 0x10);
        assert_eq!(w & 0xFFF, 2 << 7 | 0x37);

        let w = word("auipc x2, -1");
        assert_eq!(w >> 12, 0xFFFFF);
        assert_eq!(w & 0x7F, 0x17);

        assert_eq!(kind("lui x1, -5"), AsmErrKind::NegativeLuiImm);
        assert_eq!(kind("lui x1, 0b101"), AsmErrKind::InvalidLuiImm);
        assert_eq!(kind("lui x1, 0x100000"), AsmErrKind::ImmOutOfRange { bits: 20 });
    }

    #[test]
    fn test_errors_carry_lines() {
        let err = assemble("add x1, x2, x3\nbogus x1\n").unwrap_err();
        assert_eq!(err.kind, AsmErrKind::UnknownInstr("bogus".to_string()));
        assert_eq!(err.line, 2);

        let err = assemble("add x1, x2\n").unwrap_err();
        assert_eq!(err.kind, AsmErrKind::Parse(ParseErr::TooFewOperands));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble("a: add x0, x0, x0\na: add x0, x0, x0\n").unwrap_err();
        assert_eq!(err.kind, AsmErrKind::DuplicateLabel("a".to_string()));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_blank_lines_hold_slots_in_both_passes() {
        // the label after two blanks must land on slot 3 in the label pass
        // and the encode pass alike
        let src = "jal x0, end\n\n\nend: add x0, x0, x0";
        let words = assemble(src).unwrap();
        assert_eq!(words.len(), 2);
        let w = u32::from_str_radix(&words[0], 16).unwrap();
        assert_eq!((w >> 21) & 0x3FF, 6); // halved displacement 12/2
    }

    #[test]
    fn test_directives_rejected() {
        // the assembler's input language has no data section
        assert_eq!(kind(".data"), AsmErrKind::UnknownInstr(".data".to_string()));
    }
}
