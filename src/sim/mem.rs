//! The memory state of the machine.
//!
//! This module consists of:
//! - [`RegFile`]: the register file (`x0` through `x31`)
//! - [`Memory`]: the machine's byte-addressed memory
//!
//! Memory is a flat array of [`MEM_SIZE`] bytes. The text segment starts at
//! address 0 and the data segment at [`DATA_START`]; stores below
//! [`DATA_START`] are rejected by the executor as segmentation faults.
//! All multi-byte accesses are little-endian.

use std::ops::Index;

use crate::ast::Reg;

/// The size of the machine's memory, in bytes.
pub const MEM_SIZE: u64 = 0x50000;

/// The address where the data segment begins.
///
/// Addresses below this hold the text segment and are not writable.
pub const DATA_START: u64 = 0x10000;

/// An access to an address outside the machine's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds(pub u64);

impl std::fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory address out of bounds (0x{:x})", self.0)
    }
}
impl std::error::Error for OutOfBounds {}

/// The register file.
///
/// Registers are 64-bit and signed. Register `x0` is hardwired to zero:
/// it always reads as 0 and writes to it are silently discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile {
    regs: [i64; 32],
}

impl RegFile {
    /// Creates a new register file with all registers zeroed.
    pub fn new() -> Self {
        RegFile { regs: [0; 32] }
    }

    /// Reads a register.
    pub fn get(&self, reg: Reg) -> i64 {
        self.regs[reg.reg_no() as usize]
    }

    /// Writes a register. Writes to `x0` are discarded.
    pub fn set(&mut self, reg: Reg, value: i64) {
        if !reg.is_zero() {
            self.regs[reg.reg_no() as usize] = value;
        }
    }

    /// Zeroes every register.
    pub fn reset(&mut self) {
        self.regs = [0; 32];
    }

    /// Iterates the registers in order, `x0` first.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.regs.iter().copied()
    }
}

impl Default for RegFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Reg> for RegFile {
    type Output = i64;

    fn index(&self, reg: Reg) -> &Self::Output {
        &self.regs[reg.reg_no() as usize]
    }
}

/// The machine's memory: a flat, byte-addressed array of [`MEM_SIZE`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    data: Box<[u8]>,
}

impl Memory {
    /// Creates a new, zeroed memory.
    pub fn new() -> Self {
        Memory { data: vec![0; MEM_SIZE as usize].into_boxed_slice() }
    }

    /// Zeroes all of memory.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    fn range(&self, addr: u64, size: usize) -> Result<std::ops::Range<usize>, OutOfBounds> {
        let end = addr.checked_add(size as u64).ok_or(OutOfBounds(addr))?;
        if end > MEM_SIZE {
            return Err(OutOfBounds(addr));
        }
        Ok(addr as usize..end as usize)
    }

    /// Reads a little-endian value of `size` bytes (1 to 8) starting at `addr`.
    pub fn load(&self, addr: u64, size: usize) -> Result<u64, OutOfBounds> {
        let range = self.range(addr, size)?;
        let mut value = 0u64;
        for (i, &byte) in self.data[range].iter().enumerate() {
            value |= (byte as u64) << (8 * i);
        }
        Ok(value)
    }

    /// Writes the low `size` bytes (1 to 8) of `value` little-endian at `addr`.
    pub fn store(&mut self, addr: u64, size: usize, value: u64) -> Result<(), OutOfBounds> {
        let range = self.range(addr, size)?;
        for (i, byte) in self.data[range].iter_mut().enumerate() {
            *byte = (value >> (8 * i)) as u8;
        }
        Ok(())
    }

    /// Reads one byte.
    pub fn read_byte(&self, addr: u64) -> Result<u8, OutOfBounds> {
        self.data.get(addr as usize).copied().ok_or(OutOfBounds(addr))
    }

    /// Borrows a block of memory (used by the cache for refills).
    pub fn block(&self, base: u64, len: usize) -> Result<&[u8], OutOfBounds> {
        let range = self.range(base, len)?;
        Ok(&self.data[range])
    }

    /// Mutably borrows a block of memory (used by the cache for write-backs).
    pub fn block_mut(&mut self, base: u64, len: usize) -> Result<&mut [u8], OutOfBounds> {
        let range = self.range(base, len)?;
        Ok(&mut self.data[range])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign-extends the low `bits` bits of `value`.
pub(crate) fn sign_extend(value: u64, bits: u32) -> i64 {
    debug_assert!((1..=64).contains(&bits));
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

#[cfg(test)]
mod test {
    use super::{sign_extend, Memory, OutOfBounds, RegFile, DATA_START, MEM_SIZE};
    use crate::ast::Reg;

    #[test]
    fn test_x0_hardwired() {
        let mut regs = RegFile::new();
        let x0 = Reg::new(0).unwrap();
        regs.set(x0, 99);
        assert_eq!(regs.get(x0), 0);

        let x5 = Reg::new(5).unwrap();
        regs.set(x5, -7);
        assert_eq!(regs[x5], -7);
    }

    #[test]
    fn test_little_endian_round_trip() {
        let mut mem = Memory::new();
        mem.store(DATA_START, 4, 0x1234_5678).unwrap();
        assert_eq!(mem.read_byte(DATA_START), Ok(0x78));
        assert_eq!(mem.read_byte(DATA_START + 3), Ok(0x12));
        assert_eq!(mem.load(DATA_START, 4), Ok(0x1234_5678));
        // narrower loads see the low bytes
        assert_eq!(mem.load(DATA_START, 2), Ok(0x5678));
    }

    #[test]
    fn test_bounds() {
        let mut mem = Memory::new();
        assert_eq!(mem.load(MEM_SIZE, 1), Err(OutOfBounds(MEM_SIZE)));
        assert_eq!(mem.load(MEM_SIZE - 4, 8), Err(OutOfBounds(MEM_SIZE - 4)));
        assert_eq!(mem.store(MEM_SIZE - 4, 4, 0), Ok(()));
        // a negative effective address arrives here as a huge u64
        assert_eq!(mem.load((-4i64) as u64, 4), Err(OutOfBounds((-4i64) as u64)));
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFFF, 12), -1);
        assert_eq!(sign_extend(0x7FF, 12), 2047);
        assert_eq!(sign_extend(0x800, 12), -2048);
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(0xFFFF_FFFF, 32), -1);
    }
}
