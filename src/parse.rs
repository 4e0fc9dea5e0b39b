//! Parsing source lines into labels, mnemonics, and operands.
//!
//! The simulator executes programs one source line at a time, so the unit of
//! parsing here is a single line rather than a whole file. A line looks like:
//!
//! ```text
//! [label:] mnemonic operand [, operand]* [; comment]
//! ```
//!
//! [`parse_line`] splits a line into its label, mnemonic text, and operand
//! tokens. The operand field obeys two bracket rules: brackets may nest at
//! most one deep (`8(x2)` is fine, `8((x2))` is not), and a close bracket
//! must have a matching open. Brackets otherwise act as separators, so the
//! memory operand `8(x2)` flattens to the two tokens `8`, `x2` in order.
//!
//! Resolution of a single operand is handled by [`register`] and
//! [`immediate`]; instruction handlers check their operand count with
//! [`operand_count`] first and then resolve positionally.

pub mod lex;

use std::collections::HashMap;
use std::fmt;

use logos::Logos;

use crate::ast::Reg;
use self::lex::{LexErr, NumLit, Token};

/// An operand token produced by [`parse_line`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A register in numeric form (`x0`-`x31`).
    Reg(u8),
    /// A numeric literal.
    Num(NumLit),
    /// An identifier: a label reference or a register alias,
    /// depending on the position it appears in.
    Ident(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(n) => write!(f, "x{n}"),
            Operand::Num(lit) => lit.fmt(f),
            Operand::Ident(name) => f.write_str(name),
        }
    }
}

/// A parsed source line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    /// The label defined on this line, if any.
    pub label: Option<String>,
    /// The mnemonic text and operand tokens, if the line holds an instruction.
    ///
    /// The mnemonic is kept as source text here; mapping it to a
    /// [`Mnemonic`](crate::ast::Mnemonic) (and rejecting unknown ones)
    /// is the executor's job.
    pub instr: Option<(String, Vec<Operand>)>,
}

/// Any errors raised while parsing a source line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErr {
    /// A token could not be lexed.
    Lex(LexErr),
    /// A close bracket appeared without a matching open bracket,
    /// or an open bracket was never closed.
    MismatchedBracket,
    /// Brackets nested more than one deep.
    NestedBrackets,
    /// The instruction has fewer operands than its format requires.
    TooFewOperands,
    /// The instruction has more operands than its format allows.
    ExtraOperands,
    /// An operand in register position did not name a register.
    RegisterNotFound(String),
    /// An operand in immediate position referenced a label that is not defined.
    LabelNotFound(String),
    /// An operand in immediate position was not a numeric literal
    /// (or a label, where labels are allowed).
    InvalidImmediate,
}

impl From<LexErr> for ParseErr {
    fn from(e: LexErr) -> Self {
        ParseErr::Lex(e)
    }
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErr::Lex(e) => e.fmt(f),
            ParseErr::MismatchedBracket => f.write_str("mismatched brackets"),
            ParseErr::NestedBrackets => f.write_str("too many brackets, only one set is allowed around an argument"),
            ParseErr::TooFewOperands => f.write_str("fewer arguments than required"),
            ParseErr::ExtraOperands => f.write_str("extra arguments"),
            ParseErr::RegisterNotFound(name) => write!(f, "register {name} not found"),
            ParseErr::LabelNotFound(name) => write!(f, "label {name} not found"),
            ParseErr::InvalidImmediate => f.write_str("wrong immediate value"),
        }
    }
}
impl std::error::Error for ParseErr {}
impl crate::err::Error for ParseErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            ParseErr::Lex(e) => e.help(),
            ParseErr::MismatchedBracket => Some("memory operands are written imm(reg), e.g. 8(x2)".into()),
            ParseErr::NestedBrackets => Some("memory operands are written imm(reg), e.g. 8(x2)".into()),
            ParseErr::RegisterNotFound(_) => Some("registers are x0-x31 or an ABI alias (ra, sp, a0, ...)".into()),
            _ => None,
        }
    }
}

/// Parses one source line into its label, mnemonic, and operand tokens.
///
/// Blank lines (and comment-only lines) produce a [`Line`] with no
/// instruction. A line consisting only of a label definition produces a
/// label and no instruction.
pub fn parse_line(src: &str) -> Result<Line, ParseErr> {
    let mut rest = strip_comment(src).trim();

    // label definition: a single word before a colon
    let mut label = None;
    if let Some((pre, post)) = rest.split_once(':') {
        let name = pre.trim();
        if !name.is_empty() && !name.contains(char::is_whitespace) {
            label = Some(name.to_string());
            rest = post.trim_start();
        }
    }

    if rest.is_empty() {
        return Ok(Line { label, instr: None });
    }

    // the mnemonic runs up to the first separator; everything after is operands
    let (mnemonic, operands) = match rest.find([' ', '\t', ',']) {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, ""),
    };

    let operands = split_operands(operands)?;
    Ok(Line { label, instr: Some((mnemonic.to_string(), operands)) })
}

/// Strips the comment (everything from the first `;`) off a line.
pub fn strip_comment(src: &str) -> &str {
    match src.find(';') {
        Some(i) => &src[..i],
        None => src,
    }
}

/// Splits an operand field into its tokens, enforcing the bracket rules.
///
/// Brackets act as separators here: `8(x2)` yields the tokens `8`, `x2`.
pub fn split_operands(field: &str) -> Result<Vec<Operand>, ParseErr> {
    let mut out = Vec::new();
    let mut depth = 0u32;

    for token in Token::lexer(field) {
        match token? {
            Token::Reg(n) => out.push(Operand::Reg(n)),
            Token::Num(lit) => out.push(Operand::Num(lit)),
            Token::Ident(name) => out.push(Operand::Ident(name)),
            Token::LParen => {
                if depth > 0 {
                    return Err(ParseErr::NestedBrackets);
                }
                depth += 1;
            }
            Token::RParen => {
                depth = depth.checked_sub(1).ok_or(ParseErr::MismatchedBracket)?;
            }
            Token::Comma | Token::Comment => {}
            // a colon in the operand field has no meaning
            Token::Colon => return Err(ParseErr::Lex(LexErr::InvalidSymbol)),
        }
    }

    if depth != 0 {
        return Err(ParseErr::MismatchedBracket);
    }
    Ok(out)
}

/// Verifies an instruction has exactly `count` operands.
pub fn operand_count(operands: &[Operand], count: usize) -> Result<(), ParseErr> {
    match operands.len() {
        n if n < count => Err(ParseErr::TooFewOperands),
        n if n > count => Err(ParseErr::ExtraOperands),
        _ => Ok(()),
    }
}

/// Resolves an operand in register position.
pub fn register(operand: &Operand) -> Result<Reg, ParseErr> {
    match operand {
        Operand::Reg(n) => {
            // the lexer already range checked this
            Reg::new(*n).ok_or_else(|| ParseErr::RegisterNotFound(operand.to_string()))
        }
        Operand::Ident(name) => {
            Reg::from_name(name).ok_or_else(|| ParseErr::RegisterNotFound(name.clone()))
        }
        Operand::Num(_) => Err(ParseErr::RegisterNotFound(operand.to_string())),
    }
}

/// A resolved immediate operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imm {
    /// The immediate's value. For a label reference, this is the label's
    /// address minus `pc` (a pc-relative byte displacement).
    pub value: i64,
    /// Whether the immediate came from a label reference.
    pub label_relative: bool,
    /// The literal the immediate was written as, if it was numeric.
    pub lit: Option<NumLit>,
}

/// Resolves an operand in immediate position.
///
/// When `labels` is provided, an identifier operand is looked up as a label
/// and resolved to a pc-relative byte displacement. Otherwise identifiers
/// are rejected.
pub fn immediate(
    operand: &Operand,
    pc: i64,
    labels: Option<&HashMap<String, i64>>,
) -> Result<Imm, ParseErr> {
    match operand {
        Operand::Num(lit) => Ok(Imm { value: lit.value(), label_relative: false, lit: Some(*lit) }),
        Operand::Ident(name) => match labels {
            Some(labels) => {
                let addr = labels.get(name).copied()
                    .ok_or_else(|| ParseErr::LabelNotFound(name.clone()))?;
                Ok(Imm { value: addr - pc, label_relative: true, lit: None })
            }
            None => Err(ParseErr::InvalidImmediate),
        },
        Operand::Reg(_) => Err(ParseErr::InvalidImmediate),
    }
}

/// Parses the argument field of a data directive into its literals.
pub fn data_literals(field: &str) -> Result<Vec<NumLit>, ParseErr> {
    let mut out = Vec::new();
    for token in Token::lexer(strip_comment(field)) {
        match token? {
            Token::Num(lit) => out.push(lit),
            Token::Comma | Token::Comment => {}
            _ => return Err(ParseErr::InvalidImmediate),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::lex::{LexErr, NumLit, Radix};
    use super::{immediate, operand_count, parse_line, register, split_operands, Line, Operand, ParseErr};
    use crate::ast::Reg;

    fn num(magnitude: u64, neg: bool) -> Operand {
        Operand::Num(NumLit { magnitude, neg, radix: Radix::Dec })
    }

    #[test]
    fn test_parse_blank() {
        assert_eq!(parse_line(""), Ok(Line::default()));
        assert_eq!(parse_line("   \t "), Ok(Line::default()));
        assert_eq!(parse_line("; just a comment"), Ok(Line::default()));
    }

    #[test]
    fn test_parse_label_only() {
        assert_eq!(
            parse_line("loop:"),
            Ok(Line { label: Some("loop".to_string()), instr: None })
        );
    }

    #[test]
    fn test_parse_r_type() {
        assert_eq!(
            parse_line("add x1, x2, x3"),
            Ok(Line {
                label: None,
                instr: Some(("add".to_string(), vec![Operand::Reg(1), Operand::Reg(2), Operand::Reg(3)])),
            })
        );
    }

    #[test]
    fn test_parse_labeled_instr() {
        assert_eq!(
            parse_line("top: addi x1, x1, -1 ; count down"),
            Ok(Line {
                label: Some("top".to_string()),
                instr: Some(("addi".to_string(), vec![Operand::Reg(1), Operand::Reg(1), num(1, true)])),
            })
        );
    }

    #[test]
    fn test_memory_operand_flattens() {
        assert_eq!(
            parse_line("lw x1, 8(x2)"),
            Ok(Line {
                label: None,
                instr: Some(("lw".to_string(), vec![Operand::Reg(1), num(8, false), Operand::Reg(2)])),
            })
        );
    }

    #[test]
    fn test_bracket_rules() {
        assert_eq!(split_operands("x1, 8((x2))"), Err(ParseErr::NestedBrackets));
        assert_eq!(split_operands("x1, 8)x2("), Err(ParseErr::MismatchedBracket));
        assert_eq!(split_operands("x1, 8(x2"), Err(ParseErr::MismatchedBracket));
    }

    #[test]
    fn test_operand_count() {
        let ops = vec![Operand::Reg(1), Operand::Reg(2)];
        assert_eq!(operand_count(&ops, 2), Ok(()));
        assert_eq!(operand_count(&ops, 3), Err(ParseErr::TooFewOperands));
        assert_eq!(operand_count(&ops, 1), Err(ParseErr::ExtraOperands));
    }

    #[test]
    fn test_register_resolution() {
        assert_eq!(register(&Operand::Reg(7)), Ok(Reg::new(7).unwrap()));
        assert_eq!(register(&Operand::Ident("sp".to_string())), Ok(Reg::new(2).unwrap()));
        assert_eq!(
            register(&Operand::Ident("blah".to_string())),
            Err(ParseErr::RegisterNotFound("blah".to_string()))
        );
        assert_eq!(register(&num(3, false)), Err(ParseErr::RegisterNotFound("3".to_string())));
    }

    #[test]
    fn test_immediate_resolution() {
        let imm = immediate(&num(42, false), 0, None).unwrap();
        assert_eq!(imm.value, 42);
        assert!(!imm.label_relative);

        // labels resolve pc-relative
        let labels = HashMap::from([("target".to_string(), 24i64)]);
        let imm = immediate(&Operand::Ident("target".to_string()), 8, Some(&labels)).unwrap();
        assert_eq!(imm.value, 16);
        assert!(imm.label_relative);

        assert_eq!(
            immediate(&Operand::Ident("nope".to_string()), 8, Some(&labels)),
            Err(ParseErr::LabelNotFound("nope".to_string()))
        );
        // labels rejected where not allowed
        assert_eq!(
            immediate(&Operand::Ident("target".to_string()), 8, None),
            Err(ParseErr::InvalidImmediate)
        );
    }

    #[test]
    fn test_lex_error_propagates() {
        assert_eq!(
            split_operands("x1, 12ab"),
            Err(ParseErr::Lex(LexErr::InvalidNumeric))
        );
    }

    #[test]
    fn test_data_literals() {
        let lits = super::data_literals("1, 2, -3 ; tail").unwrap();
        assert_eq!(lits.iter().map(|l| l.value()).collect::<Vec<_>>(), vec![1, 2, -3]);
        assert_eq!(super::data_literals("1, oops"), Err(ParseErr::InvalidImmediate));
    }
}
