//! Bounded byte-addressable memory with little-endian multi-byte access.
//!
//! Out-of-range accesses are not fatal: each offending byte emits a warning
//! on stderr, reads yield 0, and writes are dropped, so a multi-byte access
//! that straddles the end of memory partially completes. This keeps the
//! simulated program running with a visible diagnostic instead of tearing
//! down the whole run.

use crate::error::SimError;
use crate::hex;
use std::io::Write;
use std::path::Path;

/// Default memory size when no `-m` override is given.
pub const DEFAULT_MEM_SIZE: u32 = 0x100;

/// Memory subsystem for the simulator.
#[derive(Clone)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create a new memory of `size` bytes, rounded up to a multiple of 16.
    /// Every byte starts as the sentinel `0xa5`.
    pub fn new(size: u32) -> Self {
        let size = (size.wrapping_add(15)) & 0xffff_fff0;
        Self {
            data: vec![0xa5; size as usize],
        }
    }

    /// Create memory with the default size.
    pub fn with_default_size() -> Self {
        Self::new(DEFAULT_MEM_SIZE)
    }

    /// Get the memory size in bytes.
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Bounds check. Emits the out-of-range warning for a bad address.
    fn check_illegal(&self, addr: u32) -> bool {
        if (addr as usize) < self.data.len() {
            true
        } else {
            eprintln!("WARNING: Address out of range: {}", hex::to_hex0x32(addr));
            false
        }
    }

    /// Read a byte. Out-of-range reads return 0.
    pub fn get8(&self, addr: u32) -> u8 {
        if self.check_illegal(addr) {
            self.data[addr as usize]
        } else {
            0
        }
    }

    /// Read a little-endian halfword, composed of byte reads.
    pub fn get16(&self, addr: u32) -> u16 {
        self.get8(addr) as u16 | (self.get8(addr.wrapping_add(1)) as u16) << 8
    }

    /// Read a little-endian word, composed of halfword reads.
    pub fn get32(&self, addr: u32) -> u32 {
        self.get16(addr) as u32 | (self.get16(addr.wrapping_add(2)) as u32) << 16
    }

    /// Read a byte sign-extended to 32 bits.
    pub fn get8_sx(&self, addr: u32) -> i32 {
        self.get8(addr) as i8 as i32
    }

    /// Read a halfword sign-extended to 32 bits.
    pub fn get16_sx(&self, addr: u32) -> i32 {
        self.get16(addr) as i16 as i32
    }

    /// Read a word as a signed 32-bit value.
    pub fn get32_sx(&self, addr: u32) -> i32 {
        self.get32(addr) as i32
    }

    /// Write a byte. Out-of-range writes are dropped.
    pub fn set8(&mut self, addr: u32, val: u8) {
        if self.check_illegal(addr) {
            self.data[addr as usize] = val;
        }
    }

    /// Write a little-endian halfword, composed of byte writes.
    pub fn set16(&mut self, addr: u32, val: u16) {
        self.set8(addr, val as u8);
        self.set8(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// Write a little-endian word, composed of halfword writes.
    pub fn set32(&mut self, addr: u32, val: u32) {
        self.set16(addr, val as u16);
        self.set16(addr.wrapping_add(2), (val >> 16) as u16);
    }

    /// Load a raw program image into memory starting at offset 0.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|_| SimError::LoadFile {
            path: path.to_path_buf(),
        })?;
        if bytes.len() > self.data.len() {
            return Err(SimError::ProgramTooBig);
        }
        self.data[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Emit a hex + ASCII dump of the full memory, 16 bytes per row.
    ///
    /// Each row is the 8-digit row address, the 16 bytes as 2-digit hex with
    /// an extra space between bytes 7 and 8, then the printable-ASCII column
    /// between `*` markers. Non-printable bytes and the `0xa5` sentinel show
    /// as `.`.
    pub fn dump(&self, out: &mut dyn Write) {
        for (row, chunk) in self.data.chunks(16).enumerate() {
            let _ = write!(out, "{}:", hex::to_hex32(row as u32 * 16));
            for (i, byte) in chunk.iter().enumerate() {
                let sep = if i == 8 { "  " } else { " " };
                let _ = write!(out, "{}{}", sep, hex::to_hex8(*byte));
            }
            let _ = write!(out, " *");
            for byte in chunk {
                let c = if *byte == 0xa5 || !(0x20..=0x7e).contains(byte) {
                    '.'
                } else {
                    *byte as char
                };
                let _ = write!(out, "{}", c);
            }
            let _ = writeln!(out, "*");
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::with_default_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_rounds_up_to_16() {
        assert_eq!(Memory::new(0x100).size(), 0x100);
        assert_eq!(Memory::new(0x101).size(), 0x110);
        assert_eq!(Memory::new(1).size(), 16);
        assert_eq!(Memory::new(0).size(), 0);
    }

    #[test]
    fn test_initialized_to_sentinel() {
        let mem = Memory::new(32);
        for a in 0..32 {
            assert_eq!(mem.get8(a), 0xa5);
        }
    }

    #[test]
    fn test_round_trip_u8_u16_u32() {
        let mut mem = Memory::new(0x100);
        mem.set8(0x10, 0x7b);
        assert_eq!(mem.get8(0x10), 0x7b);
        mem.set16(0x20, 0xbeef);
        assert_eq!(mem.get16(0x20), 0xbeef);
        mem.set32(0x30, 0xdeadbeef);
        assert_eq!(mem.get32(0x30), 0xdeadbeef);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = Memory::new(0x100);
        mem.set32(0x40, 0x0403_0201);
        assert_eq!(mem.get8(0x40), 0x01);
        assert_eq!(mem.get8(0x41), 0x02);
        assert_eq!(mem.get8(0x42), 0x03);
        assert_eq!(mem.get8(0x43), 0x04);
        assert_eq!(mem.get16(0x42), 0x0403);
    }

    #[test]
    fn test_sign_extension() {
        let mut mem = Memory::new(0x100);
        mem.set8(0, 0x80);
        assert_eq!(mem.get8_sx(0), -128);
        assert_eq!(mem.get8(0), 0x80);
        mem.set16(2, 0x8000);
        assert_eq!(mem.get16_sx(2), -32768);
        mem.set32(4, 0xffff_fffe);
        assert_eq!(mem.get32_sx(4), -2);
    }

    #[test]
    fn test_out_of_range_read_returns_zero() {
        let mem = Memory::new(16);
        assert_eq!(mem.get8(16), 0);
        assert_eq!(mem.get32(0x1000), 0);
    }

    #[test]
    fn test_out_of_range_write_dropped() {
        let mut mem = Memory::new(16);
        mem.set8(16, 0xff);
        mem.set32(0x1000, 0xdeadbeef);
        assert_eq!(mem.size(), 16);
        // In-range contents untouched.
        assert_eq!(mem.get8(15), 0xa5);
    }

    #[test]
    fn test_straddling_access_is_partial() {
        let mut mem = Memory::new(16);
        // Only bytes 14 and 15 are in range.
        mem.set32(14, 0x0403_0201);
        assert_eq!(mem.get8(14), 0x01);
        assert_eq!(mem.get8(15), 0x02);
        // The in-range half reads back; the out-of-range half reads as 0.
        assert_eq!(mem.get32(14), 0x0201);
    }

    #[test]
    fn test_dump_format() {
        let mut mem = Memory::new(16);
        mem.set8(0, b'A');
        mem.set8(1, 0x00);
        let mut out = Vec::new();
        mem.dump(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "00000000: 41 00 a5 a5 a5 a5 a5 a5  a5 a5 a5 a5 a5 a5 a5 a5 *A...............*\n"
        );
    }

    #[test]
    fn test_dump_row_addresses() {
        let mem = Memory::new(48);
        let mut out = Vec::new();
        mem.dump(&mut out);
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("00000000:"));
        assert!(rows[1].starts_with("00000010:"));
        assert!(rows[2].starts_with("00000020:"));
    }
}
