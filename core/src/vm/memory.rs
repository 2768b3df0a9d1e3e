//! Paged sparse VM memory (component C).
//!
//! Grounded on `vm.h`/`vm.cpp`'s `MemAccess` and `MemoryBlock`: addresses
//! are 32-bit, pages are 256 bytes, and a single-entry page cache
//! (`_currentBlock`) avoids a map lookup on the common case of sequential
//! access within one page. Reads of an unbacked page return zero; writes
//! allocate a fresh zeroed page.

use std::collections::HashMap;

const PAGE_SIZE: u32 = 256;
const PAGE_SHIFT: u32 = 8;

fn page_of(addr: u32) -> u32 {
    addr >> PAGE_SHIFT
}

fn offset_of(addr: u32) -> usize {
    (addr & (PAGE_SIZE - 1)) as usize
}

/// Sparse, page-backed 32-bit address space.
pub struct Memory {
    pages: HashMap<u32, Box<[u8; PAGE_SIZE as usize]>>,
    /// Single-page cache of the last page touched, mirroring `_currentBlock`.
    cached_page: Option<u32>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            cached_page: None,
        }
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.cached_page = None;
    }

    fn page(&mut self, addr: u32) -> Option<&[u8; PAGE_SIZE as usize]> {
        self.cached_page = Some(page_of(addr));
        self.pages.get(&page_of(addr)).map(|b| b.as_ref())
    }

    fn page_mut(&mut self, addr: u32) -> &mut [u8; PAGE_SIZE as usize] {
        let page = page_of(addr);
        self.cached_page = Some(page);
        self.pages.entry(page).or_insert_with(|| Box::new([0u8; PAGE_SIZE as usize]))
    }

    /// Reads one byte; returns 0 if the owning page has never been written.
    pub fn get_u8(&mut self, addr: u32) -> u8 {
        match self.page(addr) {
            Some(p) => p[offset_of(addr)],
            None => 0,
        }
    }

    /// Writes one byte, allocating the owning page on first write.
    pub fn set_u8(&mut self, addr: u32, value: u8) {
        let off = offset_of(addr);
        self.page_mut(addr)[off] = value;
    }

    /// Reads a little-endian u32, stitching across a page boundary if needed.
    pub fn get_u32(&mut self, addr: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.get_u8(addr.wrapping_add(i as u32));
        }
        u32::from_le_bytes(bytes)
    }

    /// Writes a little-endian u32, stitching across a page boundary if needed.
    pub fn set_u32(&mut self, addr: u32, value: u32) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.set_u8(addr.wrapping_add(i as u32), *b);
        }
    }

    /// Copies a contiguous region into memory starting at `addr`.
    pub fn write_memory(&mut self, addr: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.set_u8(addr.wrapping_add(i as u32), *b);
        }
    }

    /// Returns a dense copy of `len` bytes starting at `addr`, zero-filled
    /// where unbacked.
    pub fn read_mem_blocks(&mut self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.get_u8(addr.wrapping_add(i as u32)))
            .collect()
    }

    /// Xors a `{pos,len}` range in place with a repeating key, used by the
    /// save/load scramble sequences (component L).
    pub fn xor_range(&mut self, pos: u32, len: u32, key: &[u8]) {
        if key.is_empty() {
            return;
        }
        for i in 0..len {
            let addr = pos.wrapping_add(i);
            let b = self.get_u8(addr) ^ key[(i as usize) % key.len()];
            self.set_u8(addr, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbacked_read_is_zero() {
        let mut m = Memory::new();
        assert_eq!(m.get_u8(12345), 0);
        assert_eq!(m.get_u32(98765), 0);
    }

    #[test]
    fn write_then_read_round_trips_across_page_boundary() {
        let mut m = Memory::new();
        // Address 254 straddles the 256-byte page boundary for a u32 write.
        m.set_u32(254, 0xDEADBEEF);
        assert_eq!(m.get_u32(254), 0xDEADBEEF);
        assert_eq!(m.get_u8(254), 0xEF);
        assert_eq!(m.get_u8(257), 0xDE);
    }

    #[test]
    fn write_memory_and_read_mem_blocks_round_trip() {
        let mut m = Memory::new();
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        m.write_memory(100, &data);
        assert_eq!(m.read_mem_blocks(100, data.len()), data.to_vec());
        // Bytes before/after the written range are zero-filled.
        assert_eq!(m.read_mem_blocks(96, 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn xor_range_is_its_own_inverse() {
        let mut m = Memory::new();
        m.write_memory(0, &[1, 2, 3, 4]);
        let key = [0xAA, 0x55];
        m.xor_range(0, 4, &key);
        m.xor_range(0, 4, &key);
        assert_eq!(m.read_mem_blocks(0, 4), vec![1, 2, 3, 4]);
    }
}
