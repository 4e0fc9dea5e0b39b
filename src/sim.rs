//! Executing RISC-V assembly programs, one source line at a time.
//!
//! This module is focused on the [`Simulator`] struct, which loads a source
//! program and executes it directly from its source lines: each text line
//! occupies one 4-byte slot of the text segment, `pc / 4` selects the line
//! to execute, and the line is decoded and executed in a single step. No
//! machine code is materialized; the binary encoding of instructions is the
//! assembler's concern ([`crate::asm`]), and both read from one shared
//! instruction table ([`crate::ast::Mnemonic`]).
//!
//! Besides the execution engine, the simulator carries the debug surface
//! course tooling is built on:
//! - [`Simulator::run`] executes until completion, a fatal error, or an
//!   active breakpoint ([`Breakpoints`]),
//! - [`Simulator::step`] executes one line, ignoring breakpoints,
//! - the call stack ([`CallStack`]) tracks `jal`/`jalr` pairs with live
//!   source-line positions,
//! - loads and stores can optionally be routed through a data-cache model
//!   ([`Cache`]).
//!
//! Fatal runtime errors ([`SimErr`]) carry the 1-indexed source line they
//! occurred on and halt the machine, clearing the call stack.

pub mod cache;
pub mod debug;
pub mod frame;
pub mod mem;

use std::collections::HashMap;
use std::fmt;

use crate::ast::{InstrFormat, Mnemonic};
use crate::parse::{self, ParseErr};
use self::cache::{Cache, CacheAccessErr};
use self::debug::Breakpoints;
use self::frame::CallStack;
use self::mem::{sign_extend, Memory, OutOfBounds, RegFile, DATA_START, MEM_SIZE};

/// Errors that can occur during simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimErr {
    /// The error.
    pub kind: SimErrKind,
    /// The 1-indexed source line the error occurred on.
    pub line: usize,
}

impl fmt::Display for SimErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        self.kind.help()
    }
}

/// The kinds of error that can occur during simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimErrKind {
    /// A line could not be parsed into an instruction.
    Parse(ParseErr),
    /// The mnemonic is not part of the accepted subset.
    UnknownInstr(String),
    /// The line defines a label but holds no instruction.
    EmptyInstr,
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
    /// A branch or jump displacement with remainder 2 or 3 modulo 4.
    InvalidBranchTarget(i64),
    /// A store targeted the text segment (below [`DATA_START`]).
    SegFault(i64),
    /// A memory access fell outside the machine's memory.
    OutOfBounds(u64),
    /// A cached access straddled a cache block boundary.
    Unaligned(u64),
    /// A label was defined on more than one line.
    DuplicateLabel(String),
    /// A directive in the `.data` section is not `.byte`, `.half`,
    /// `.word`, or `.dword`.
    InvalidDataDirective(String),
    /// A value in the `.data` section is not a numeric literal.
    InvalidDataValue,
}

impl From<ParseErr> for SimErrKind {
    fn from(e: ParseErr) -> Self {
        SimErrKind::Parse(e)
    }
}
impl From<OutOfBounds> for SimErrKind {
    fn from(e: OutOfBounds) -> Self {
        SimErrKind::OutOfBounds(e.0)
    }
}
impl From<CacheAccessErr> for SimErrKind {
    fn from(e: CacheAccessErr) -> Self {
        match e {
            CacheAccessErr::Unaligned(addr) => SimErrKind::Unaligned(addr),
            CacheAccessErr::Mem(e) => e.into(),
        }
    }
}

impl fmt::Display for SimErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::UnknownInstr(name) => write!(f, "instruction {name} not found"),
            Self::EmptyInstr => f.write_str("invalid instruction"),
            Self::ImmOutOfRange { bits } => write!(f, "value cannot be stored in {bits} bits"),
            Self::ShiftOutOfRange(n) => write!(f, "cannot shift by {n} bits"),
            Self::NegativeLuiImm => f.write_str("immediate value cannot be negative"),
            Self::InvalidLuiImm => f.write_str("wrong immediate value"),
            Self::InvalidBranchTarget(n) => write!(f, "invalid branch target (displacement {n})"),
            Self::SegFault(_) => f.write_str("segmentation fault"),
            Self::OutOfBounds(addr) => write!(f, "memory address out of bounds (0x{addr:x})"),
            Self::Unaligned(addr) => write!(f, "unaligned memory access (0x{addr:x})"),
            Self::DuplicateLabel(name) => write!(f, "multiple definitions for label {name}"),
            Self::InvalidDataDirective(dir) => write!(f, "invalid data type in .data section: {dir}"),
            Self::InvalidDataValue => f.write_str("invalid value in .data section"),
        }
    }
}
impl std::error::Error for SimErrKind {}
impl crate::err::Error for SimErrKind {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            Self::Parse(e) => e.help(),
            Self::UnknownInstr(_) => Some("mnemonics are lowercase, e.g. add, lw, beq".into()),
            Self::EmptyInstr => Some("a label must share its line with an instruction".into()),
            Self::ShiftOutOfRange(_) => Some("shift amounts are 0 to 63".into()),
            Self::NegativeLuiImm => Some("lui takes an unsigned 20-bit immediate".into()),
            Self::InvalidLuiImm => Some("lui takes a decimal or hex immediate".into()),
            Self::SegFault(_) => Some(format!("stores must target the data segment (0x{DATA_START:x} and above)").into()),
            _ => None,
        }
    }
}

/// The effect of one executed instruction on control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Execution falls through to the next line.
    Fallthrough,
    /// A taken branch: jump to the target without touching the call stack.
    Branch(i64),
    /// A `jal`: jump to the target and push a call frame.
    Call(i64),
    /// A `jalr`: jump to the target and pop a call frame.
    Return(i64),
}

/// The machine's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimState {
    /// No program is loaded.
    #[default]
    Idle,
    /// A program is loaded and ready to execute.
    Ready,
    /// Execution is in progress.
    Running,
    /// Execution is paused (after a step or at a breakpoint).
    Paused,
    /// Execution has completed or aborted.
    Halted,
}

/// Why [`Simulator::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An active breakpoint was reached (before executing its line).
    Breakpoint(usize),
    /// The program counter left the text segment.
    Completed,
}

/// The result of one [`Simulator::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The given source line was executed.
    Executed(usize),
    /// A blank line was skipped over.
    Blank,
    /// The program counter had already left the text segment.
    Completed,
}

enum Exec {
    Executed(usize),
    Blank,
    Breakpoint(usize),
    Completed,
}

/// Computes an arithmetic/logical operation on two 64-bit values.
///
/// Additions and subtractions wrap. Shift amounts are taken modulo 64,
/// which also strips the upper marker bits off a composite `srai`
/// immediate. Unknown operations produce 0.
pub fn alu(v1: i64, v2: i64, op: Mnemonic) -> i64 {
    use Mnemonic::*;

    match op {
        Add | Addi => v1.wrapping_add(v2),
        Sub => v1.wrapping_sub(v2),
        And | Andi => v1 & v2,
        Or | Ori => v1 | v2,
        Xor | Xori => v1 ^ v2,
        Sll | Slli => v1.wrapping_shl((v2 & 63) as u32),
        Srl | Srli => ((v1 as u64) >> (v2 & 63)) as i64,
        Sra | Srai => v1 >> (v2 & 63),
        Slt | Slti => (v1 < v2) as i64,
        Sltu | Sltiu => ((v1 as u64) < (v2 as u64)) as i64,
        _ => 0,
    }
}

fn check_bits(value: i64, bits: u32) -> Result<(), SimErrKind> {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    if value < min || value > max {
        return Err(SimErrKind::ImmOutOfRange { bits });
    }
    Ok(())
}

/// Validates a branch or jump displacement and rounds it to an even value.
///
/// Displacements with remainder 2 or 3 modulo 4 are rejected; remainder 1
/// is rounded down by one. `%` truncates, so negative displacements have
/// non-positive remainders and always pass unchanged. This asymmetry is
/// part of the accepted input language.
fn check_target(disp: i64) -> Result<i64, SimErrKind> {
    match disp % 4 {
        2 | 3 => Err(SimErrKind::InvalidBranchTarget(disp)),
        1 => Ok(disp - 1),
        _ => Ok(disp),
    }
}

/// Executes and debugs assembly programs.
///
/// A program is loaded from source with [`Simulator::load_program`] and
/// executed with [`Simulator::run`] or [`Simulator::step`]. The machine
/// state (register file, memory, program counter, breakpoints, call stack)
/// is exposed as fields or accessors so that front ends can inspect it
/// between steps.
///
/// Source lines are 1-indexed, counting every line of the file except
/// full-line comments: the data section markers and directives first,
/// then the text lines (blank lines included, each holding a 4-byte slot).
#[derive(Debug)]
pub struct Simulator {
    /// The register file.
    pub reg_file: RegFile,

    /// The machine's memory.
    pub mem: Memory,

    /// The program counter: a byte address into the text segment,
    /// always a multiple of 4.
    pub pc: i64,

    /// The breakpoints currently set.
    pub breakpoints: Breakpoints,

    /// The call stack of the executing program.
    pub call_stack: CallStack,

    cache: Option<Cache>,
    lines: Vec<String>,
    labels: HashMap<String, i64>,
    inverse_labels: HashMap<i64, String>,
    data_lines: usize,
    state: SimState,
    // the breakpoint line we are paused on, so resuming does not re-trigger it
    paused_on: Option<usize>,
}

impl Simulator {
    /// Creates a new simulator with no program loaded.
    pub fn new() -> Self {
        Simulator {
            reg_file: RegFile::new(),
            mem: Memory::new(),
            pc: 0,
            breakpoints: Breakpoints::new(),
            call_stack: CallStack::new(),
            cache: None,
            lines: Vec::new(),
            labels: HashMap::new(),
            inverse_labels: HashMap::new(),
            data_lines: 0,
            state: SimState::Idle,
            paused_on: None,
        }
    }

    /// The machine's lifecycle state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// The labels of the loaded program, mapped to their byte addresses.
    pub fn labels(&self) -> &HashMap<String, i64> {
        &self.labels
    }

    /// The 1-indexed source line `pc` currently points at,
    /// or `None` if `pc` has left the text segment.
    pub fn current_line(&self) -> Option<usize> {
        let slot = usize::try_from(self.pc / 4).ok()?;
        (self.pc >= 0 && slot < self.lines.len()).then_some(slot + 1 + self.data_lines)
    }

    /// Routes loads and stores through a data-cache model.
    pub fn attach_cache(&mut self, cache: Cache) {
        self.cache = Some(cache);
    }

    /// Detaches the cache model, if one is attached.
    ///
    /// Dirty lines are not written back; detach after a run is complete
    /// (or flush by invalidating) if the memory image matters.
    pub fn detach_cache(&mut self) -> Option<Cache> {
        self.cache.take()
    }

    /// The attached cache model, if any.
    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    /// The attached cache model, if any.
    pub fn cache_mut(&mut self) -> Option<&mut Cache> {
        self.cache.as_mut()
    }

    /// Loads a program from assembly source, resetting the machine.
    ///
    /// The `.data`/`.text` markers switch sections; the file starts in the
    /// text section. Data directives (`.byte`, `.half`, `.word`, `.dword`)
    /// place their little-endian values consecutively from [`DATA_START`].
    /// Each text line takes one 4-byte slot, blank lines included;
    /// full-line comments take no slot and no line number.
    pub fn load_program(&mut self, src: &str) -> Result<(), SimErr> {
        self.reg_file.reset();
        self.mem.reset();
        self.pc = 0;
        self.lines.clear();
        self.labels.clear();
        self.inverse_labels.clear();
        self.call_stack.clear();
        self.paused_on = None;
        self.data_lines = 0;
        self.state = SimState::Idle;

        let mut in_data = false;
        let mut cursor = DATA_START;

        for raw in src.lines() {
            // full-line comments take no slot and no line number
            if raw.trim_start().starts_with(';') {
                continue;
            }
            let stripped = parse::strip_comment(raw);
            let text = stripped.trim();

            if text == ".data" {
                in_data = true;
                self.data_lines += 1;
                continue;
            }
            if text == ".text" {
                in_data = false;
                self.data_lines += 1;
                continue;
            }

            if in_data {
                self.data_lines += 1;
                if !text.is_empty() {
                    cursor = self.load_data_line(text, cursor)?;
                }
            } else {
                self.lines.push(stripped.trim_end().to_string());
            }
        }

        self.scan_labels()?;
        self.inverse_labels.entry(0).or_insert_with(|| "main".to_string());
        self.call_stack.seed("main", self.data_lines + 1);
        self.state = SimState::Ready;
        Ok(())
    }

    /// Processes one data directive line, returning the advanced cursor.
    fn load_data_line(&mut self, text: &str, mut cursor: u64) -> Result<u64, SimErr> {
        let line = self.data_lines;
        let err = |kind| SimErr { kind, line };

        let (directive, args) = match text.split_once(char::is_whitespace) {
            Some((d, a)) => (d, a),
            None => (text, ""),
        };
        let size: usize = match directive {
            ".byte" => 1,
            ".half" => 2,
            ".word" => 4,
            ".dword" => 8,
            _ => return Err(err(SimErrKind::InvalidDataDirective(directive.to_string()))),
        };

        let lits = parse::data_literals(args)
            .map_err(|_| err(SimErrKind::InvalidDataValue))?;
        if lits.is_empty() {
            return Err(err(SimErrKind::InvalidDataValue));
        }

        for lit in lits {
            let fits = if lit.neg {
                lit.magnitude <= 1u64 << (8 * size as u32 - 1)
            } else {
                size == 8 || lit.magnitude < 1u64 << (8 * size as u32)
            };
            if !fits {
                return Err(err(SimErrKind::ImmOutOfRange { bits: 8 * size as u32 }));
            }
            self.mem.store(cursor, size, lit.value() as u64)
                .map_err(|e| err(e.into()))?;
            cursor += size as u64;
        }
        Ok(cursor)
    }

    /// Collects label definitions from the text lines.
    fn scan_labels(&mut self) -> Result<(), SimErr> {
        for (slot, line) in self.lines.iter().enumerate() {
            let Some((pre, _)) = line.split_once(':') else { continue };
            let name = pre.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                continue;
            }

            let addr = (slot * 4) as i64;
            if self.labels.insert(name.to_string(), addr).is_some() {
                return Err(SimErr {
                    kind: SimErrKind::DuplicateLabel(name.to_string()),
                    line: slot + 1 + self.data_lines,
                });
            }
            self.inverse_labels.insert(addr, name.to_string());
        }
        Ok(())
    }

    /// Executes until completion, a fatal error, or an active breakpoint.
    ///
    /// A breakpoint pauses *before* its line executes; calling `run` again
    /// resumes past it.
    pub fn run(&mut self) -> Result<StopReason, SimErr> {
        self.state = SimState::Running;
        loop {
            match self.exec_once(false)? {
                Exec::Breakpoint(line) => return Ok(StopReason::Breakpoint(line)),
                Exec::Completed => return Ok(StopReason::Completed),
                Exec::Executed(_) | Exec::Blank => {}
            }
        }
    }

    /// Executes a single source line, ignoring breakpoints.
    pub fn step(&mut self) -> Result<StepOutcome, SimErr> {
        match self.exec_once(true)? {
            Exec::Completed => Ok(StepOutcome::Completed),
            Exec::Blank => {
                self.state = SimState::Paused;
                Ok(StepOutcome::Blank)
            }
            Exec::Executed(line) => {
                self.state = SimState::Paused;
                Ok(StepOutcome::Executed(line))
            }
            // breakpoints are not checked while stepping
            Exec::Breakpoint(_) => unreachable!("breakpoint hit while stepping"),
        }
    }

    /// Resets the processor state (registers, pc, call stack) without
    /// reloading the program. Memory and the cache are left as they are.
    pub fn reset(&mut self) {
        self.reg_file.reset();
        self.pc = 0;
        self.paused_on = None;
        self.call_stack.seed("main", self.data_lines + 1);
        self.state = if self.lines.is_empty() { SimState::Idle } else { SimState::Ready };
    }

    fn exec_once(&mut self, stepping: bool) -> Result<Exec, SimErr> {
        if self.pc < 0 || (self.pc / 4) as usize >= self.lines.len() {
            self.state = SimState::Halted;
            self.call_stack.clear();
            return Ok(Exec::Completed);
        }
        let slot = (self.pc / 4) as usize;
        let line_no = slot + 1 + self.data_lines;

        if self.lines[slot].trim().is_empty() {
            self.pc += 4;
            return Ok(Exec::Blank);
        }

        if !stepping && self.paused_on != Some(line_no) && self.breakpoints.contains(line_no) {
            self.paused_on = Some(line_no);
            self.state = SimState::Paused;
            return Ok(Exec::Breakpoint(line_no));
        }
        self.paused_on = None;

        let text = self.lines[slot].clone();
        let outcome = match self.exec_instr(&text, self.pc) {
            Ok(outcome) => outcome,
            Err(kind) => {
                self.state = SimState::Halted;
                self.call_stack.clear();
                return Err(SimErr { kind, line: line_no });
            }
        };

        match outcome {
            Outcome::Fallthrough => {
                self.call_stack.update_line(line_no);
                self.pc += 4;
            }
            Outcome::Branch(target) => {
                self.call_stack.update_line(line_no);
                self.pc = target;
            }
            Outcome::Call(target) => {
                self.call_stack.update_line(line_no);
                let name = self.inverse_labels.get(&target).cloned()
                    .unwrap_or_else(|| "?".to_string());
                let callee_line = (target / 4) as usize + 1 + self.data_lines;
                self.call_stack.push(name, callee_line);
                self.pc = target;
            }
            Outcome::Return(target) => {
                self.call_stack.pop();
                self.pc = target;
            }
        }
        Ok(Exec::Executed(line_no))
    }

    /// Decodes and executes one instruction line at the given `pc`,
    /// returning its control-flow outcome.
    fn exec_instr(&mut self, text: &str, pc: i64) -> Result<Outcome, SimErrKind> {
        let line = parse::parse_line(text)?;
        let Some((mnemonic, ops)) = line.instr else {
            // a bare label slot is not executable
            return Err(SimErrKind::EmptyInstr);
        };
        let m: Mnemonic = mnemonic.parse()
            .map_err(|_| SimErrKind::UnknownInstr(mnemonic))?;

        match m.format() {
            InstrFormat::R => {
                parse::operand_count(&ops, 3)?;
                let rd = parse::register(&ops[0])?;
                let rs1 = parse::register(&ops[1])?;
                let rs2 = parse::register(&ops[2])?;
                let value = alu(self.reg_file[rs1], self.reg_file[rs2], m);
                self.reg_file.set(rd, value);
                Ok(Outcome::Fallthrough)
            }
            InstrFormat::IArith => {
                parse::operand_count(&ops, 3)?;
                let rd = parse::register(&ops[0])?;
                let rs1 = parse::register(&ops[1])?;
                let imm = parse::immediate(&ops[2], pc, None)?.value;

                let imm = if m.is_shift() {
                    if !(0..64).contains(&imm) {
                        return Err(SimErrKind::ShiftOutOfRange(imm));
                    }
                    // srai marks its shift amount with the funct7-like
                    // upper bits; the ALU masks them back off
                    match m {
                        Mnemonic::Srai => (imm & 63) | (0x10 << 6),
                        _ => imm,
                    }
                } else {
                    check_bits(imm, 12)?;
                    imm
                };

                let value = alu(self.reg_file[rs1], imm, m);
                self.reg_file.set(rd, value);
                Ok(Outcome::Fallthrough)
            }
            InstrFormat::Load => {
                parse::operand_count(&ops, 3)?;
                let rd = parse::register(&ops[0])?;
                let imm = parse::immediate(&ops[1], pc, None)?.value;
                let rs1 = parse::register(&ops[2])?;
                check_bits(imm, 12)?;

                if m == Mnemonic::Jalr {
                    let target = self.reg_file[rs1].wrapping_add(imm);
                    self.reg_file.set(rd, pc + 4);
                    return Ok(Outcome::Return(target));
                }

                let (size, signed) = match m.mem_access() {
                    Some(access) => access,
                    None => unreachable!("load-format mnemonics are memory accesses"),
                };
                let addr = self.reg_file[rs1].wrapping_add(imm);
                if addr < 0 || addr as u64 + size as u64 > MEM_SIZE {
                    return Err(SimErrKind::OutOfBounds(addr as u64));
                }
                let raw = match &mut self.cache {
                    Some(cache) => cache.read(addr as u64, size, &mut self.mem)?,
                    None => self.mem.load(addr as u64, size)?,
                };
                let value = if signed { sign_extend(raw, 8 * size as u32) } else { raw as i64 };
                self.reg_file.set(rd, value);
                Ok(Outcome::Fallthrough)
            }
            InstrFormat::Store => {
                parse::operand_count(&ops, 3)?;
                let rs2 = parse::register(&ops[0])?;
                let imm = parse::immediate(&ops[1], pc, None)?.value;
                let rs1 = parse::register(&ops[2])?;
                check_bits(imm, 12)?;

                let (size, _) = match m.mem_access() {
                    Some(access) => access,
                    None => unreachable!("store-format mnemonics are memory accesses"),
                };
                let addr = self.reg_file[rs1].wrapping_add(imm);
                if addr < DATA_START as i64 {
                    return Err(SimErrKind::SegFault(addr));
                }
                if addr as u64 + size as u64 > MEM_SIZE {
                    return Err(SimErrKind::OutOfBounds(addr as u64));
                }
                let value = self.reg_file[rs2] as u64;
                match &mut self.cache {
                    Some(cache) => cache.write(addr as u64, size, value, &mut self.mem)?,
                    None => self.mem.store(addr as u64, size, value)?,
                }
                Ok(Outcome::Fallthrough)
            }
            InstrFormat::Branch => {
                parse::operand_count(&ops, 3)?;
                let rs1 = parse::register(&ops[0])?;
                let rs2 = parse::register(&ops[1])?;
                let disp = parse::immediate(&ops[2], pc, Some(&self.labels))?.value;
                check_bits(disp, 13)?;
                let disp = check_target(disp)?;

                let (a, b) = (self.reg_file[rs1], self.reg_file[rs2]);
                let taken = match m {
                    Mnemonic::Beq => a == b,
                    Mnemonic::Bne => a != b,
                    Mnemonic::Blt => a < b,
                    Mnemonic::Bge => a >= b,
                    Mnemonic::Bltu => (a as u64) < (b as u64),
                    Mnemonic::Bgeu => (a as u64) >= (b as u64),
                    _ => unreachable!("branch-format mnemonics are branches"),
                };
                if taken {
                    Ok(Outcome::Branch(pc + disp))
                } else {
                    Ok(Outcome::Fallthrough)
                }
            }
            InstrFormat::Jal => {
                parse::operand_count(&ops, 2)?;
                let rd = parse::register(&ops[0])?;
                let disp = parse::immediate(&ops[1], pc, Some(&self.labels))?.value;
                check_bits(disp, 21)?;
                let disp = check_target(disp)?;

                self.reg_file.set(rd, pc + 4);
                Ok(Outcome::Call(pc + disp))
            }
            InstrFormat::Lui => {
                parse::operand_count(&ops, 2)?;
                let rd = parse::register(&ops[0])?;
                let imm = parse::immediate(&ops[1], pc, None)?;
                let Some(lit) = imm.lit else {
                    return Err(SimErrKind::InvalidLuiImm);
                };
                if lit.neg {
                    return Err(SimErrKind::NegativeLuiImm);
                }
                if lit.radix == crate::parse::lex::Radix::Bin {
                    return Err(SimErrKind::InvalidLuiImm);
                }
                if lit.magnitude > 0xFFFFF {
                    return Err(SimErrKind::ImmOutOfRange { bits: 20 });
                }

                self.reg_file.set(rd, sign_extend(lit.magnitude, 20) << 12);
                Ok(Outcome::Fallthrough)
            }
            InstrFormat::Auipc => {
                parse::operand_count(&ops, 2)?;
                let rd = parse::register(&ops[0])?;
                let imm = parse::immediate(&ops[1], pc, None)?.value;
                if imm > 0xFFFFF || imm < -0x80000 {
                    return Err(SimErrKind::ImmOutOfRange { bits: 20 });
                }

                let value = pc.wrapping_add(sign_extend(imm as u64 & 0xFFFFF, 20) << 12);
                self.reg_file.set(rd, value);
                Ok(Outcome::Fallthrough)
            }
        }
    }

    /// Renders the register file, one `x<N>: 0x<value>` row per register.
    ///
    /// Values print as unpadded two's-complement hex.
    pub fn dump_registers(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for (i, value) in self.reg_file.iter().enumerate() {
            let _ = writeln!(out, "x{i}: 0x{:x}", value as u64);
        }
        out
    }

    /// Renders a window of memory starting at `addr`, one byte per row.
    pub fn dump_memory(&self, addr: u64) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        // the window is 0x3ff bytes wide
        for offset in 0..0x3ff {
            match self.mem.read_byte(addr + offset) {
                Ok(byte) => {
                    let _ = writeln!(out, "0x{:x}: 0x{byte:x}", addr + offset);
                }
                Err(_) => break,
            }
        }
        out
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
