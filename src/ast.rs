//! The components of the RISC-V subset this crate handles.
//!
//! This module holds the vocabulary shared by the assembler ([`asm`])
//! and the simulator ([`sim`]):
//! - [`Reg`]: a register of the machine (`x0` through `x31`, or an ABI alias)
//! - [`Mnemonic`]: one of the accepted instruction mnemonics
//! - [`InstrFormat`]: the operand format a mnemonic is decoded with
//!
//! The encoding surface (opcode, funct3, funct7) lives on [`Mnemonic`] so
//! that the assembler and the simulator read from one table and cannot
//! drift apart.
//!
//! [`asm`]: crate::asm
//! [`sim`]: crate::sim

use std::fmt;
use std::str::FromStr;

/// A register of the machine. There are 32, identified as `x0` through `x31`.
///
/// `x0` is hardwired to zero: reads of it produce 0 and writes to it are
/// silently discarded (see [`RegFile`]).
///
/// [`RegFile`]: crate::sim::mem::RegFile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    /// Creates a register from its number, if it is in range (`0..32`).
    pub fn new(n: u8) -> Option<Self> {
        (n < 32).then_some(Reg(n))
    }

    /// The register number (`0..32`).
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Resolves a register from its source name.
    ///
    /// This accepts both the numeric form (`x0` through `x31`)
    /// and the ABI aliases (`zero`, `ra`, `sp`, `a0`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(digits) = name.strip_prefix('x') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return digits.parse::<u8>().ok().and_then(Reg::new);
            }
        }

        let n = match name {
            "zero" => 0,
            "ra" => 1,
            "sp" => 2,
            "gp" => 3,
            "tp" => 4,
            "t0" => 5,
            "t1" => 6,
            "t2" => 7,
            "s0" | "fp" => 8,
            "s1" => 9,
            "a0" => 10,
            "a1" => 11,
            "a2" => 12,
            "a3" => 13,
            "a4" => 14,
            "a5" => 15,
            "a6" => 16,
            "a7" => 17,
            "s2" => 18,
            "s3" => 19,
            "s4" => 20,
            "s5" => 21,
            "s6" => 22,
            "s7" => 23,
            "s8" => 24,
            "s9" => 25,
            "s10" => 26,
            "s11" => 27,
            "t3" => 28,
            "t4" => 29,
            "t5" => 30,
            "t6" => 31,
            _ => return None,
        };
        Some(Reg(n))
    }

    /// Whether this register is `x0`.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// The operand format a mnemonic is decoded with.
///
/// The format decides how many operands an instruction takes,
/// which of them are registers, and how its immediate is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrFormat {
    /// `op rd, rs1, rs2`
    R,
    /// `op rd, rs1, imm` (12-bit signed immediate, or 6-bit shift amount)
    IArith,
    /// `op rd, imm(rs1)` — memory loads, and `jalr` which shares the operand shape
    Load,
    /// `op rs2, imm(rs1)`
    Store,
    /// `op rs1, rs2, target` (label or numeric displacement)
    Branch,
    /// `jal rd, target`
    Jal,
    /// `lui rd, imm` (20-bit unsigned immediate)
    Lui,
    /// `auipc rd, imm`
    Auipc,
}

macro_rules! mnemonics {
    ($($variant:ident($text:literal): $fmt:ident, op = $op:literal, f3 = $f3:literal, f7 = $f7:literal;)*) => {
        /// An instruction mnemonic of the accepted RISC-V subset.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum Mnemonic {
            $($variant),*
        }

        impl Mnemonic {
            /// The operand format this mnemonic is decoded with.
            pub fn format(self) -> InstrFormat {
                match self {
                    $(Self::$variant => InstrFormat::$fmt),*
                }
            }

            /// The 7-bit opcode field of this mnemonic's encoding.
            pub fn opcode(self) -> u32 {
                match self {
                    $(Self::$variant => $op),*
                }
            }

            /// The funct3 field of this mnemonic's encoding.
            ///
            /// Zero for the formats that do not carry one (`lui`, `auipc`, `jal`).
            pub fn funct3(self) -> u32 {
                match self {
                    $(Self::$variant => $f3),*
                }
            }

            /// The funct7 field of this mnemonic's encoding (R format only).
            pub fn funct7(self) -> u32 {
                match self {
                    $(Self::$variant => $f7),*
                }
            }
        }

        impl FromStr for Mnemonic {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)*
                    _ => Err(())
                }
            }
        }

        impl fmt::Display for Mnemonic {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text)),*
                }
            }
        }
    }
}

mnemonics! {
    Add("add"):     R,      op = 0b0110011, f3 = 0b000, f7 = 0b0000000;
    Sub("sub"):     R,      op = 0b0110011, f3 = 0b000, f7 = 0b0100000;
    And("and"):     R,      op = 0b0110011, f3 = 0b111, f7 = 0b0000000;
    Or("or"):       R,      op = 0b0110011, f3 = 0b110, f7 = 0b0000000;
    Xor("xor"):     R,      op = 0b0110011, f3 = 0b100, f7 = 0b0000000;
    Sll("sll"):     R,      op = 0b0110011, f3 = 0b001, f7 = 0b0000000;
    Srl("srl"):     R,      op = 0b0110011, f3 = 0b101, f7 = 0b0000000;
    Sra("sra"):     R,      op = 0b0110011, f3 = 0b101, f7 = 0b0100000;
    Slt("slt"):     R,      op = 0b0110011, f3 = 0b010, f7 = 0b0000000;
    Sltu("sltu"):   R,      op = 0b0110011, f3 = 0b011, f7 = 0b0000000;

    Addi("addi"):   IArith, op = 0b0010011, f3 = 0b000, f7 = 0b0000000;
    Andi("andi"):   IArith, op = 0b0010011, f3 = 0b111, f7 = 0b0000000;
    Ori("ori"):     IArith, op = 0b0010011, f3 = 0b110, f7 = 0b0000000;
    Xori("xori"):   IArith, op = 0b0010011, f3 = 0b100, f7 = 0b0000000;
    Slli("slli"):   IArith, op = 0b0010011, f3 = 0b001, f7 = 0b0000000;
    Srli("srli"):   IArith, op = 0b0010011, f3 = 0b101, f7 = 0b0000000;
    Srai("srai"):   IArith, op = 0b0010011, f3 = 0b101, f7 = 0b0100000;
    Slti("slti"):   IArith, op = 0b0010011, f3 = 0b010, f7 = 0b0000000;
    Sltiu("sltiu"): IArith, op = 0b0010011, f3 = 0b011, f7 = 0b0000000;

    Lb("lb"):       Load,   op = 0b0000011, f3 = 0b000, f7 = 0b0000000;
    Lh("lh"):       Load,   op = 0b0000011, f3 = 0b001, f7 = 0b0000000;
    Lw("lw"):       Load,   op = 0b0000011, f3 = 0b010, f7 = 0b0000000;
    Ld("ld"):       Load,   op = 0b0000011, f3 = 0b011, f7 = 0b0000000;
    Lbu("lbu"):     Load,   op = 0b0000011, f3 = 0b100, f7 = 0b0000000;
    Lhu("lhu"):     Load,   op = 0b0000011, f3 = 0b101, f7 = 0b0000000;
    Lwu("lwu"):     Load,   op = 0b0000011, f3 = 0b110, f7 = 0b0000000;
    Jalr("jalr"):   Load,   op = 0b1100111, f3 = 0b000, f7 = 0b0000000;

    Sb("sb"):       Store,  op = 0b0100011, f3 = 0b000, f7 = 0b0000000;
    Sh("sh"):       Store,  op = 0b0100011, f3 = 0b001, f7 = 0b0000000;
    Sw("sw"):       Store,  op = 0b0100011, f3 = 0b010, f7 = 0b0000000;
    Sd("sd"):       Store,  op = 0b0100011, f3 = 0b011, f7 = 0b0000000;

    Beq("beq"):     Branch, op = 0b1100011, f3 = 0b000, f7 = 0b0000000;
    Bne("bne"):     Branch, op = 0b1100011, f3 = 0b001, f7 = 0b0000000;
    Blt("blt"):     Branch, op = 0b1100011, f3 = 0b100, f7 = 0b0000000;
    Bge("bge"):     Branch, op = 0b1100011, f3 = 0b101, f7 = 0b0000000;
    Bltu("bltu"):   Branch, op = 0b1100011, f3 = 0b110, f7 = 0b0000000;
    Bgeu("bgeu"):   Branch, op = 0b1100011, f3 = 0b111, f7 = 0b0000000;

    Jal("jal"):     Jal,    op = 0b1101111, f3 = 0b000, f7 = 0b0000000;
    Lui("lui"):     Lui,    op = 0b0110111, f3 = 0b000, f7 = 0b0000000;
    Auipc("auipc"): Auipc,  op = 0b0010111, f3 = 0b000, f7 = 0b0000000;
}

impl Mnemonic {
    /// Whether this mnemonic is a shift (and takes a 6-bit shift amount
    /// rather than the full 12-bit immediate range).
    pub fn is_shift(self) -> bool {
        matches!(self, Self::Sll | Self::Srl | Self::Sra | Self::Slli | Self::Srli | Self::Srai)
    }

    /// For memory accesses: the access width in bytes, and whether the loaded
    /// value is sign-extended. `None` for everything else (including `jalr`).
    pub fn mem_access(self) -> Option<(usize, bool)> {
        match self {
            Self::Lb | Self::Sb => Some((1, true)),
            Self::Lh | Self::Sh => Some((2, true)),
            Self::Lw | Self::Sw => Some((4, true)),
            Self::Ld | Self::Sd => Some((8, true)),
            Self::Lbu => Some((1, false)),
            Self::Lhu => Some((2, false)),
            Self::Lwu => Some((4, false)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{InstrFormat, Mnemonic, Reg};

    #[test]
    fn test_reg_numeric() {
        assert_eq!(Reg::from_name("x0"), Reg::new(0));
        assert_eq!(Reg::from_name("x31"), Reg::new(31));
        assert_eq!(Reg::from_name("x32"), None);
        assert_eq!(Reg::from_name("x99"), None);
        assert_eq!(Reg::from_name("x"), None);
        assert_eq!(Reg::from_name("x1z"), None);
    }

    #[test]
    fn test_reg_alias() {
        assert_eq!(Reg::from_name("zero"), Reg::new(0));
        assert_eq!(Reg::from_name("ra"), Reg::new(1));
        assert_eq!(Reg::from_name("sp"), Reg::new(2));
        assert_eq!(Reg::from_name("fp"), Reg::new(8));
        assert_eq!(Reg::from_name("s0"), Reg::new(8));
        assert_eq!(Reg::from_name("a7"), Reg::new(17));
        assert_eq!(Reg::from_name("t6"), Reg::new(31));
        assert_eq!(Reg::from_name("q5"), None);
    }

    #[test]
    fn test_mnemonic_lookup() {
        assert_eq!("add".parse(), Ok(Mnemonic::Add));
        assert_eq!("sltiu".parse(), Ok(Mnemonic::Sltiu));
        assert_eq!("jalr".parse(), Ok(Mnemonic::Jalr));
        assert_eq!("mul".parse::<Mnemonic>(), Err(()));
        // mnemonics are case-sensitive
        assert_eq!("ADD".parse::<Mnemonic>(), Err(()));
    }

    #[test]
    fn test_formats() {
        assert_eq!(Mnemonic::Add.format(), InstrFormat::R);
        assert_eq!(Mnemonic::Srai.format(), InstrFormat::IArith);
        // jalr shares the load operand shape
        assert_eq!(Mnemonic::Jalr.format(), InstrFormat::Load);
        assert_eq!(Mnemonic::Sd.format(), InstrFormat::Store);
        assert_eq!(Mnemonic::Bgeu.format(), InstrFormat::Branch);
    }

    #[test]
    fn test_encoding_table() {
        assert_eq!(Mnemonic::Add.opcode(), 0x33);
        assert_eq!(Mnemonic::Sub.funct7(), 0x20);
        assert_eq!(Mnemonic::Sra.funct7(), 0x20);
        assert_eq!(Mnemonic::Jalr.opcode(), 0x67);
        assert_eq!(Mnemonic::Lwu.funct3(), 0b110);
        assert_eq!(Mnemonic::Lui.opcode(), 0x37);
    }
}
