//! Virtualises a full 32-bit (4 GiB) address space using pages.

use std::{
    fmt::{Debug, Display},
    ops::{Index, IndexMut},
};

use crate::bus::{Bus, Cycle, Width};

/// A reference bus: a sparse, little-endian 32-bit address space.
/// The default value at every address is zero.
/// It doesn't try to reclaim memory that's reset to all-zeroes.
#[derive(Default)]
pub struct Memory {
    root: PageRoot,
    non_seq_wait: u32,
    seq_wait: u32,
}

impl Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<memory using {} x 4KiB pages>", self.count_pages())
    }
}

impl Memory {
    /// Build a memory holding the given words from address zero.
    pub fn new(data: &[u32]) -> Self {
        let mut result = Memory::default();
        for (i, item) in data.iter().enumerate() {
            result.set_word_aligned(i as u32 * 4, *item);
        }
        result
    }

    /// Every non-sequential access costs `non_seq` extra cycles,
    /// every sequential access `seq`.
    pub fn with_wait_states(mut self, non_seq: u32, seq: u32) -> Self {
        self.non_seq_wait = non_seq;
        self.seq_wait = seq;
        self
    }

    /// Copy an image into memory starting at `address`.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), LoadError> {
        let end = u64::from(address) + bytes.len() as u64;
        if end > 1 << 32 {
            return Err(LoadError { address, len: bytes.len() });
        }
        for (i, byte) in bytes.iter().enumerate() {
            self.set_byte(address + i as u32, *byte);
        }
        Ok(())
    }

    /// Access the word at a word-aligned (4-byte aligned) address.
    pub fn get_word_aligned(&self, addr: u32) -> u32 {
        let (a, b, c, _) = to_indices(addr);
        self.root[a]
            .as_ref()
            .and_then(|dir| dir[b].as_ref().map(|table| table[c]))
            .unwrap_or_default()
    }

    pub fn set_word_aligned(&mut self, addr: u32, value: u32) {
        let (a, b, c, _) = to_indices(addr);
        self.root[a].get_or_insert_default()[b].get_or_insert_default()[c] = value;
    }

    pub fn get_byte(&self, addr: u32) -> u8 {
        (self.get_word_aligned(addr) >> ((addr % 4) * 8)) as u8
    }

    pub fn set_byte(&mut self, addr: u32, value: u8) {
        let shift = (addr % 4) * 8;
        let word = self.get_word_aligned(addr) & !(0xFF << shift);
        self.set_word_aligned(addr, word | u32::from(value) << shift);
    }

    /// Halfword accessors ignore bit 0 of the address.
    pub fn get_half_word(&self, addr: u32) -> u16 {
        (self.get_word_aligned(addr) >> ((addr & 0b10) * 8)) as u16
    }

    pub fn set_half_word(&mut self, addr: u32, value: u16) {
        let shift = (addr & 0b10) * 8;
        let word = self.get_word_aligned(addr) & !(0xFFFF << shift);
        self.set_word_aligned(addr, word | u32::from(value) << shift);
    }

    /// Return the number of pages in use to represent the memory of this processor.
    pub fn count_pages(&self) -> usize {
        1 + self
            .root
            .entries
            .iter()
            .filter_map(Option::as_ref)
            .map(|dir| 1 + dir.entries.iter().filter_map(Option::as_ref).count())
            .sum::<usize>()
    }
}

impl Bus for Memory {
    fn read_byte(&mut self, address: u32) -> u8 {
        self.get_byte(address)
    }

    fn read_half_word(&mut self, address: u32) -> u16 {
        self.get_half_word(address)
    }

    fn read_word(&mut self, address: u32) -> u32 {
        self.get_word_aligned(address)
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        self.set_byte(address, value);
    }

    fn write_half_word(&mut self, address: u32, value: u16) {
        self.set_half_word(address, value);
    }

    fn write_word(&mut self, address: u32, value: u32) {
        self.set_word_aligned(address, value);
    }

    fn wait_states(&self, _address: u32, _width: Width, cycle: Cycle) -> u32 {
        match cycle {
            Cycle::NonSeq => self.non_seq_wait,
            Cycle::Seq => self.seq_wait,
            Cycle::Internal => 0,
        }
    }
}

/// An image did not fit below the top of the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub address: u32,
    pub len: usize,
}

impl Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "image of {} bytes at {:#010X} runs past the end of the address space",
            self.len, self.address
        )
    }
}

impl std::error::Error for LoadError {}

type PageTable = Page<u32>;
type PageDir = Page<Option<Box<PageTable>>>;
type PageRoot = Page<Option<Box<PageDir>>>;

struct Page<T> {
    entries: [T; 1 << 10],
}

impl<T> Default for Page<T>
where
    T: Default,
{
    fn default() -> Self {
        Self {
            entries: std::array::from_fn(|_| Default::default()),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct U10(u16);

impl<T> Index<U10> for Page<T> {
    type Output = T;

    fn index(&self, index: U10) -> &Self::Output {
        &self.entries[index.0 as usize]
    }
}

impl<T> IndexMut<U10> for Page<T> {
    fn index_mut(&mut self, index: U10) -> &mut Self::Output {
        &mut self.entries[index.0 as usize]
    }
}

/// Converts an address to its page indices, together with a final offset (either 0, 1, 2, or 3).
fn to_indices(addr: u32) -> (U10, U10, U10, u32) {
    (
        U10((addr >> 22) as u16),
        U10(((addr >> 12) & 0x3FF) as u16),
        U10(((addr >> 2) & 0x3FF) as u16),
        addr % 4,
    )
}
