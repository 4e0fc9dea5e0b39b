//! The data-cache model.
//!
//! The simulator can optionally route loads and stores through a
//! set-associative cache ([`Cache`]). The cache is a timing/statistics model
//! layered over [`Memory`]: it tracks hits, misses, and line state, and it
//! keeps memory coherent according to its write policy, but the values a
//! program observes are the same with or without it.
//!
//! Geometry is configured with [`CacheConfig`]: total size, block size, and
//! associativity (all powers of two). Addresses split into tag, set index,
//! and block offset fields; the address width the split is computed against
//! is derived from the memory capacity, so the tag width always accounts for
//! every cacheable address.
//!
//! Three replacement policies are modeled (LRU, FIFO, random), and two write
//! policies: write-back (allocate on write miss, mark lines dirty, write
//! memory on eviction) and write-through (no allocation on write miss,
//! memory updated on every store).

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::mem::{Memory, OutOfBounds, MEM_SIZE};

/// The number of address bits the tag/index/offset split is computed
/// against. Derived from the memory capacity.
pub const ADDR_BITS: u32 = MEM_SIZE.next_power_of_two().trailing_zeros();

/// How a set picks its victim line on a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Evict the least recently used line.
    Lru,
    /// Evict the line that was filled earliest.
    Fifo,
    /// Evict a uniformly random line.
    Random,
}

impl std::str::FromStr for ReplacePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LRU" => Ok(Self::Lru),
            "FIFO" => Ok(Self::Fifo),
            "RANDOM" => Ok(Self::Random),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ReplacePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => f.write_str("LRU"),
            Self::Fifo => f.write_str("FIFO"),
            Self::Random => f.write_str("RANDOM"),
        }
    }
}

/// When stores reach memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write-back with write-allocate: stores dirty the cache line and
    /// memory is updated when the line is evicted.
    WriteBack,
    /// Write-through with no write-allocate: every store goes to memory;
    /// a write miss does not fill a line.
    WriteThrough,
}

impl std::str::FromStr for WritePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WB" => Ok(Self::WriteBack),
            "WT" => Ok(Self::WriteThrough),
            _ => Err(()),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteBack => f.write_str("WB"),
            Self::WriteThrough => f.write_str("WT"),
        }
    }
}

/// The cache's geometry and policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total capacity in bytes.
    pub cache_size: u64,
    /// Block (line) size in bytes.
    pub block_size: u64,
    /// Lines per set. Zero means fully associative
    /// (one set spanning the whole cache).
    pub associativity: u64,
    /// The replacement policy.
    pub replacement: ReplacePolicy,
    /// The write policy.
    pub write: WritePolicy,
}

/// Any errors raised while configuring a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheConfigErr {
    /// The config text had fewer than five fields.
    MissingField,
    /// The config text had text past the fifth field.
    ExtraField(String),
    /// A numeric field could not be parsed.
    InvalidNumber(String),
    /// A size field that must be a power of two is not.
    NotPowerOfTwo(&'static str),
    /// The block size and associativity do not evenly partition the cache.
    DoesNotPartition,
    /// The geometry needs more address bits than addresses have.
    TooManyAddressBits,
    /// Unknown replacement policy name.
    UnknownReplacement(String),
    /// Unknown write policy name.
    UnknownWritePolicy(String),
}

impl fmt::Display for CacheConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => f.write_str("cache config requires size, block size, associativity, replacement policy, and write policy"),
            Self::ExtraField(s) => write!(f, "unexpected text after the write policy: {s}"),
            Self::InvalidNumber(s) => write!(f, "invalid number in cache config: {s}"),
            Self::NotPowerOfTwo(field) => write!(f, "{field} must be a power of two"),
            Self::DoesNotPartition => f.write_str("block size and associativity do not partition the cache size"),
            Self::TooManyAddressBits => f.write_str("cache geometry requires more address bits than are available"),
            Self::UnknownReplacement(s) => write!(f, "unknown replacement policy: {s}"),
            Self::UnknownWritePolicy(s) => write!(f, "unknown write policy: {s}"),
        }
    }
}
impl std::error::Error for CacheConfigErr {}
impl crate::err::Error for CacheConfigErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            Self::MissingField | Self::ExtraField(_) => Some("the config is five lines: cache size, block size, associativity, LRU|FIFO|RANDOM, WB|WT".into()),
            Self::UnknownReplacement(_) => Some("replacement policy is one of LRU, FIFO, RANDOM".into()),
            Self::UnknownWritePolicy(_) => Some("write policy is WB (write-back) or WT (write-through)".into()),
            _ => None,
        }
    }
}

impl CacheConfig {
    /// Parses the five-field cache configuration.
    ///
    /// The fields, one per line: cache size, block size, associativity
    /// (0 for fully associative), replacement policy (`LRU`, `FIFO`,
    /// `RANDOM`), write policy (`WB`, `WT`). Blank lines are ignored,
    /// but any sixth field is an error.
    pub fn parse(text: &str) -> Result<Self, CacheConfigErr> {
        let mut fields = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let mut next = || fields.next().ok_or(CacheConfigErr::MissingField);

        let cache_size = parse_field(next()?)?;
        let block_size = parse_field(next()?)?;
        let associativity = parse_field(next()?)?;
        let replacement = {
            let s = next()?;
            s.parse().map_err(|_| CacheConfigErr::UnknownReplacement(s.to_string()))?
        };
        let write = {
            let s = next()?;
            s.parse().map_err(|_| CacheConfigErr::UnknownWritePolicy(s.to_string()))?
        };
        if let Some(extra) = fields.next() {
            return Err(CacheConfigErr::ExtraField(extra.to_string()));
        }

        Ok(CacheConfig { cache_size, block_size, associativity, replacement, write })
    }
}

fn parse_field(s: &str) -> Result<u64, CacheConfigErr> {
    s.parse().map_err(|_| CacheConfigErr::InvalidNumber(s.to_string()))
}

/// An access the cache cannot service because it straddles a block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAccessErr {
    /// The access crosses a block boundary.
    Unaligned(u64),
    /// The access (or the refill/write-back it triggered) fell outside memory.
    Mem(OutOfBounds),
}

impl From<OutOfBounds> for CacheAccessErr {
    fn from(e: OutOfBounds) -> Self {
        CacheAccessErr::Mem(e)
    }
}

impl fmt::Display for CacheAccessErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unaligned(addr) => write!(f, "unaligned memory access (0x{addr:x})"),
            Self::Mem(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for CacheAccessErr {}

/// Hit/miss counters of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of accesses that hit.
    pub hits: u64,
    /// Number of accesses that missed.
    pub misses: u64,
}

impl CacheStats {
    /// Total number of accesses.
    pub fn accesses(self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of accesses that hit (0 if there were none).
    pub fn hit_rate(self) -> f64 {
        match self.accesses() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "D-cache statistics: Accesses={} ,Hit={} ,Miss={} ,Hit Rate={:.2}",
            self.accesses(), self.hits, self.misses, self.hit_rate()
        )
    }
}

#[derive(Debug, Clone)]
struct CacheLine {
    valid: bool,
    dirty: bool,
    tag: u64,
    /// Replacement stamp: last-touch time under LRU, fill time under FIFO.
    toa: u64,
    data: Box<[u8]>,
}

/// A set-associative data cache over [`Memory`].
#[derive(Debug)]
pub struct Cache {
    config: CacheConfig,
    ways: u64,
    num_sets: u64,
    offset_bits: u32,
    index_bits: u32,
    // lines laid out flat, indexed [set * ways + way]
    lines: Vec<CacheLine>,
    stats: CacheStats,
    clock: u64,
    rng: StdRng,
}

impl Cache {
    /// Creates a cache from a configuration, validating its geometry.
    pub fn new(config: CacheConfig) -> Result<Self, CacheConfigErr> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a cache from the five-field configuration text.
    pub fn from_spec(text: &str) -> Result<Self, CacheConfigErr> {
        Self::new(CacheConfig::parse(text)?)
    }

    /// Creates a cache with a caller-provided RNG for the random
    /// replacement policy. Useful for reproducible runs.
    pub fn with_rng(config: CacheConfig, rng: StdRng) -> Result<Self, CacheConfigErr> {
        let CacheConfig { cache_size, block_size, associativity, .. } = config;

        if cache_size == 0 || !cache_size.is_power_of_two() {
            return Err(CacheConfigErr::NotPowerOfTwo("cache size"));
        }
        if block_size == 0 || !block_size.is_power_of_two() {
            return Err(CacheConfigErr::NotPowerOfTwo("block size"));
        }
        // associativity 0 means fully associative
        let ways = match associativity {
            0 => cache_size / block_size,
            n => n,
        };
        if !ways.is_power_of_two() {
            return Err(CacheConfigErr::NotPowerOfTwo("associativity"));
        }
        if block_size * ways > cache_size || cache_size % (block_size * ways) != 0 {
            return Err(CacheConfigErr::DoesNotPartition);
        }

        let num_sets = cache_size / (block_size * ways);
        let offset_bits = block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        if offset_bits + index_bits > ADDR_BITS {
            return Err(CacheConfigErr::TooManyAddressBits);
        }

        let lines = vec![
            CacheLine {
                valid: false,
                dirty: false,
                tag: 0,
                toa: 0,
                data: vec![0; block_size as usize].into_boxed_slice(),
            };
            (num_sets * ways) as usize
        ];

        Ok(Cache {
            config,
            ways,
            num_sets,
            offset_bits,
            index_bits,
            lines,
            stats: CacheStats::default(),
            clock: 0,
            rng,
        })
    }

    /// The configuration this cache was built from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The number of sets.
    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }

    /// The number of lines per set.
    pub fn ways(&self) -> u64 {
        self.ways
    }

    /// The cache's hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Splits an address into its tag, set index, and block offset fields.
    pub fn split(&self, addr: u64) -> (u64, u64, u64) {
        let offset = addr & (self.config.block_size - 1);
        let set = (addr >> self.offset_bits) & (self.num_sets - 1);
        let tag = (addr & (MEM_SIZE.next_power_of_two() - 1)) >> (self.offset_bits + self.index_bits);
        (tag, set, offset)
    }

    /// Reconstructs the base address of the block a line holds.
    fn block_base(&self, tag: u64, set: u64) -> u64 {
        ((tag << self.index_bits) | set) << self.offset_bits
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn line(&self, set: u64, way: u64) -> &CacheLine {
        &self.lines[(set * self.ways + way) as usize]
    }

    fn line_mut(&mut self, set: u64, way: u64) -> &mut CacheLine {
        &mut self.lines[(set * self.ways + way) as usize]
    }

    fn lookup(&self, set: u64, tag: u64) -> Option<u64> {
        (0..self.ways).find(|&way| {
            let line = self.line(set, way);
            line.valid && line.tag == tag
        })
    }

    /// Picks the victim way for a fill: an invalid way if one exists,
    /// otherwise per the replacement policy.
    fn victim(&mut self, set: u64) -> u64 {
        if let Some(way) = (0..self.ways).find(|&w| !self.line(set, w).valid) {
            return way;
        }
        match self.config.replacement {
            ReplacePolicy::Random => self.rng.gen_range(0..self.ways),
            // LRU and FIFO both evict the smallest stamp; they differ
            // in when the stamp is refreshed
            ReplacePolicy::Lru | ReplacePolicy::Fifo => (0..self.ways)
                .min_by_key(|&w| self.line(set, w).toa)
                .unwrap_or(0),
        }
    }

    /// Evicts a line, writing it back to memory if it is dirty.
    fn evict(&mut self, set: u64, way: u64, mem: &mut Memory) -> Result<(), CacheAccessErr> {
        let (tag, valid, dirty) = {
            let line = self.line(set, way);
            (line.tag, line.valid, line.dirty)
        };
        if valid && dirty {
            let base = self.block_base(tag, set);
            let block_size = self.config.block_size as usize;
            let dst = mem.block_mut(base, block_size)?;
            dst.copy_from_slice(&self.line(set, way).data);
        }
        self.line_mut(set, way).valid = false;
        Ok(())
    }

    /// Fills a line with the block containing `addr`.
    fn fill(&mut self, set: u64, way: u64, tag: u64, addr: u64, mem: &Memory) -> Result<(), CacheAccessErr> {
        let block_size = self.config.block_size as usize;
        let base = addr & !(self.config.block_size - 1);
        let src = mem.block(base, block_size)?;

        let stamp = self.tick();
        let line = self.line_mut(set, way);
        line.data.copy_from_slice(src);
        line.tag = tag;
        line.valid = true;
        line.dirty = false;
        line.toa = stamp;
        Ok(())
    }

    fn check_aligned(&self, addr: u64, size: usize, offset: u64) -> Result<(), CacheAccessErr> {
        if offset + size as u64 > self.config.block_size {
            return Err(CacheAccessErr::Unaligned(addr));
        }
        Ok(())
    }

    /// Reads a little-endian value of `size` bytes through the cache.
    ///
    /// On a miss the containing block is fetched into the cache, evicting
    /// (and writing back, if dirty) a victim line first.
    pub fn read(&mut self, addr: u64, size: usize, mem: &mut Memory) -> Result<u64, CacheAccessErr> {
        let (tag, set, offset) = self.split(addr);
        self.check_aligned(addr, size, offset)?;

        let way = match self.lookup(set, tag) {
            Some(way) => {
                self.stats.hits += 1;
                if self.config.replacement == ReplacePolicy::Lru {
                    let stamp = self.tick();
                    self.line_mut(set, way).toa = stamp;
                }
                way
            }
            None => {
                self.stats.misses += 1;
                let way = self.victim(set);
                self.evict(set, way, mem)?;
                self.fill(set, way, tag, addr, mem)?;
                way
            }
        };

        let line = self.line(set, way);
        let mut value = 0u64;
        for i in 0..size {
            value |= (line.data[offset as usize + i] as u64) << (8 * i);
        }
        Ok(value)
    }

    /// Writes the low `size` bytes of `value` through the cache.
    ///
    /// Under write-back, a miss allocates the block and the line is marked
    /// dirty; memory is not touched until eviction. Under write-through,
    /// memory is updated on every write and a miss does not allocate.
    pub fn write(&mut self, addr: u64, size: usize, value: u64, mem: &mut Memory) -> Result<(), CacheAccessErr> {
        let (tag, set, offset) = self.split(addr);
        self.check_aligned(addr, size, offset)?;

        let way = match self.lookup(set, tag) {
            Some(way) => {
                self.stats.hits += 1;
                way
            }
            None => {
                self.stats.misses += 1;
                match self.config.write {
                    WritePolicy::WriteBack => {
                        let way = self.victim(set);
                        self.evict(set, way, mem)?;
                        self.fill(set, way, tag, addr, mem)?;
                        way
                    }
                    // no allocation on a write-through miss
                    WritePolicy::WriteThrough => {
                        mem.store(addr, size, value)?;
                        return Ok(());
                    }
                }
            }
        };

        if self.config.write == WritePolicy::WriteThrough {
            mem.store(addr, size, value)?;
        }
        if self.config.replacement == ReplacePolicy::Lru {
            let stamp = self.tick();
            self.line_mut(set, way).toa = stamp;
        }

        let write_back = self.config.write == WritePolicy::WriteBack;
        let line = self.line_mut(set, way);
        for i in 0..size {
            line.data[offset as usize + i] = (value >> (8 * i)) as u8;
        }
        if write_back {
            line.dirty = true;
        }
        Ok(())
    }

    /// Invalidates every line. Counters and configuration are kept.
    ///
    /// Dirty lines are dropped without being written back.
    pub fn invalidate(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
        }
    }

    /// Renders the valid lines of the cache, one per row, sets in
    /// ascending order.
    pub fn dump(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for set in 0..self.num_sets {
            for way in 0..self.ways {
                let line = self.line(set, way);
                if line.valid {
                    let state = if line.dirty { "Dirty" } else { "Clean" };
                    let _ = writeln!(out, "Set: 0x{set:x} ,Tag: 0x{:x}, {state}", line.tag);
                }
            }
        }
        out
    }

    /// Renders the cache's configuration.
    pub fn describe(&self) -> String {
        format!(
            "Cache Size: {}\nBlock Size: {}\nAssociativity: {}\nReplacement Policy: {}\nWrite Back Policy: {}\n",
            self.config.cache_size, self.config.block_size, self.ways, self.config.replacement, self.config.write
        )
    }
}

#[cfg(test)]
mod test {
    use super::{Cache, CacheAccessErr, CacheConfig, CacheConfigErr, ReplacePolicy, WritePolicy, ADDR_BITS};
    use crate::sim::mem::{Memory, DATA_START};

    fn config(size: u64, block: u64, assoc: u64, replacement: ReplacePolicy, write: WritePolicy) -> CacheConfig {
        CacheConfig { cache_size: size, block_size: block, associativity: assoc, replacement, write }
    }

    fn cache(size: u64, block: u64, assoc: u64, replacement: ReplacePolicy, write: WritePolicy) -> Cache {
        Cache::new(config(size, block, assoc, replacement, write)).unwrap()
    }

    #[test]
    fn test_parse_config() {
        let c = CacheConfig::parse("1024\n16\n2\nLRU\nWB\n").unwrap();
        assert_eq!(c.cache_size, 1024);
        assert_eq!(c.block_size, 16);
        assert_eq!(c.associativity, 2);
        assert_eq!(c.replacement, ReplacePolicy::Lru);
        assert_eq!(c.write, WritePolicy::WriteBack);

        assert_eq!(CacheConfig::parse("1024\n16\n2\nLRU\n"), Err(CacheConfigErr::MissingField));
        assert_eq!(
            CacheConfig::parse("1024\n16\n2\nLRU\nWB\n64\n"),
            Err(CacheConfigErr::ExtraField("64".to_string()))
        );
        assert_eq!(
            CacheConfig::parse("1024\n16\n2\nMRU\nWB\n"),
            Err(CacheConfigErr::UnknownReplacement("MRU".to_string()))
        );
        assert_eq!(
            CacheConfig::parse("1024\nx\n2\nLRU\nWB\n"),
            Err(CacheConfigErr::InvalidNumber("x".to_string()))
        );
    }

    #[test]
    fn test_geometry() {
        // 19 address bits cover the 0x50000-byte memory
        assert_eq!(ADDR_BITS, 19);

        let c = cache(1024, 16, 2, ReplacePolicy::Lru, WritePolicy::WriteBack);
        assert_eq!(c.num_sets(), 32);
        // offset 4 bits, index 5 bits
        let (tag, set, offset) = c.split(0x10234);
        assert_eq!(offset, 0x4);
        assert_eq!(set, (0x10234 >> 4) & 31);
        assert_eq!(tag, 0x10234 >> 9);
    }

    #[test]
    fn test_fully_associative() {
        // associativity 0 = one set spanning the whole cache
        let c = cache(1024, 16, 0, ReplacePolicy::Lru, WritePolicy::WriteBack);
        assert_eq!(c.num_sets(), 1);
        assert_eq!(c.ways(), 64);
    }

    #[test]
    fn test_bad_geometry() {
        let bad = config(1000, 16, 2, ReplacePolicy::Lru, WritePolicy::WriteBack);
        assert!(matches!(Cache::new(bad), Err(CacheConfigErr::NotPowerOfTwo(_))));

        let bad = config(64, 128, 1, ReplacePolicy::Lru, WritePolicy::WriteBack);
        assert!(matches!(Cache::new(bad), Err(CacheConfigErr::DoesNotPartition)));
    }

    #[test]
    fn test_direct_mapped_conflict() {
        // two blocks that map to the same set thrash a direct-mapped cache
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 1, ReplacePolicy::Lru, WritePolicy::WriteBack);
        let a = DATA_START;
        let b = DATA_START + 64; // same set, different tag

        c.read(a, 4, &mut mem).unwrap();
        c.read(b, 4, &mut mem).unwrap();
        c.read(a, 4, &mut mem).unwrap();
        assert_eq!(c.stats().hits, 0);
        assert_eq!(c.stats().misses, 3);

        // two ways absorb the conflict
        let mut c = cache(64, 16, 2, ReplacePolicy::Lru, WritePolicy::WriteBack);
        c.read(a, 4, &mut mem).unwrap();
        c.read(b, 4, &mut mem).unwrap();
        c.read(a, 4, &mut mem).unwrap();
        assert_eq!(c.stats().hits, 1);
        assert_eq!(c.stats().misses, 2);
    }

    #[test]
    fn test_lru_vs_fifo() {
        let mut mem = Memory::new();
        let a = DATA_START;
        let b = DATA_START + 64;
        let d = DATA_START + 128; // all three in set 0 of a 2-way, 64B cache

        // LRU: touching A makes B the victim, so A survives the fill of D
        let mut c = cache(64, 16, 2, ReplacePolicy::Lru, WritePolicy::WriteBack);
        for addr in [a, b, a, d, a] {
            c.read(addr, 4, &mut mem).unwrap();
        }
        assert_eq!(c.stats().hits, 2); // the re-reads of A

        // FIFO: the refresh of A does not matter, A is the oldest fill
        let mut c = cache(64, 16, 2, ReplacePolicy::Fifo, WritePolicy::WriteBack);
        for addr in [a, b, a, d, a] {
            c.read(addr, 4, &mut mem).unwrap();
        }
        assert_eq!(c.stats().hits, 1); // only the first re-read of A
        assert_eq!(c.stats().misses, 4);

        // four distinct blocks passed through, but each set still holds
        // at most `ways` valid lines
        for set in 0..c.num_sets() {
            let valid = (0..c.ways()).filter(|&way| c.line(set, way).valid).count() as u64;
            assert!(valid <= c.ways());
        }
        assert_eq!(c.dump().lines().count(), 2);
    }

    #[test]
    fn test_random_fills_invalid_ways_first() {
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 2, ReplacePolicy::Random, WritePolicy::WriteBack);
        let a = DATA_START;
        let b = DATA_START + 64;

        c.read(a, 4, &mut mem).unwrap();
        c.read(b, 4, &mut mem).unwrap();
        c.read(a, 4, &mut mem).unwrap();
        c.read(b, 4, &mut mem).unwrap();
        assert_eq!(c.stats().hits, 2);
        assert_eq!(c.stats().misses, 2);
    }

    #[test]
    fn test_write_back() {
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 1, ReplacePolicy::Lru, WritePolicy::WriteBack);
        let a = DATA_START;
        let conflict = DATA_START + 64;

        c.write(a, 4, 0xDEAD_BEEF, &mut mem).unwrap();
        // write-back: memory untouched until eviction
        assert_eq!(mem.load(a, 4), Ok(0));
        assert_eq!(c.read(a, 4, &mut mem), Ok(0xDEAD_BEEF));

        // evict the dirty line by pulling in a conflicting block
        c.read(conflict, 4, &mut mem).unwrap();
        assert_eq!(mem.load(a, 4), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn test_write_through() {
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 1, ReplacePolicy::Lru, WritePolicy::WriteThrough);
        let a = DATA_START;

        // write miss: memory updated, no allocation
        c.write(a, 4, 0x1234, &mut mem).unwrap();
        assert_eq!(mem.load(a, 4), Ok(0x1234));
        assert_eq!(c.stats().misses, 1);

        c.read(a, 4, &mut mem).unwrap(); // still a miss
        assert_eq!(c.stats().misses, 2);

        // write hit: both the line and memory are updated
        c.write(a, 4, 0x5678, &mut mem).unwrap();
        assert_eq!(c.stats().hits, 1);
        assert_eq!(mem.load(a, 4), Ok(0x5678));
        assert_eq!(c.read(a, 4, &mut mem), Ok(0x5678));
    }

    #[test]
    fn test_unaligned_access() {
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 1, ReplacePolicy::Lru, WritePolicy::WriteBack);
        // a 4-byte read at offset 14 straddles the 16-byte block boundary
        let addr = DATA_START + 14;
        assert_eq!(c.read(addr, 4, &mut mem), Err(CacheAccessErr::Unaligned(addr)));
    }

    #[test]
    fn test_invalidate() {
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 1, ReplacePolicy::Lru, WritePolicy::WriteBack);
        c.read(DATA_START, 4, &mut mem).unwrap();
        assert!(c.dump().contains("Set: 0x0"));

        c.invalidate();
        assert_eq!(c.dump(), "");
        // counters survive invalidation
        assert_eq!(c.stats().misses, 1);
    }

    #[test]
    fn test_dump_and_stats_format() {
        let mut mem = Memory::new();
        let mut c = cache(64, 16, 1, ReplacePolicy::Lru, WritePolicy::WriteBack);
        c.write(DATA_START, 4, 7, &mut mem).unwrap();
        c.read(DATA_START, 4, &mut mem).unwrap();

        let dump = c.dump();
        assert!(dump.lines().any(|l| l.starts_with("Set: 0x0 ,Tag: 0x") && l.ends_with("Dirty")));

        assert_eq!(
            c.stats().to_string(),
            "D-cache statistics: Accesses=2 ,Hit=1 ,Miss=1 ,Hit Rate=0.50"
        );
    }
}
