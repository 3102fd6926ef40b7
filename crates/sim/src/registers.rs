//! The 32-entry general-purpose register file.
//!
//! Register x0 is hardwired to zero: reads return 0 and writes are ignored.

use crate::hex;
use std::io::Write;

/// Reset pattern for x1..x31, chosen to be recognizable in dumps.
const RESET_PATTERN: i32 = 0xf0f0_f0f0_u32 as i32;

#[derive(Clone)]
pub struct RegisterFile {
    regs: [i32; 32],
}

impl RegisterFile {
    pub fn new() -> Self {
        let mut rf = Self { regs: [0; 32] };
        rf.reset();
        rf
    }

    /// Set x0 to zero and x1..x31 to the reset pattern.
    pub fn reset(&mut self) {
        self.regs[0] = 0;
        for r in self.regs[1..].iter_mut() {
            *r = RESET_PATTERN;
        }
    }

    /// Get a register value (x0 always reads 0).
    pub fn get(&self, r: u32) -> i32 {
        if r == 0 {
            0
        } else {
            self.regs[r as usize]
        }
    }

    /// Set a register value (x0 writes are ignored).
    pub fn set(&mut self, r: u32, val: i32) {
        if r != 0 {
            self.regs[r as usize] = val;
        }
    }

    /// Emit the register dump: 4 rows of 8 registers, each row prefixed with
    /// `hdr` and the row label right-aligned in a 3-character field. An extra
    /// space separates the 4th and 5th value of each row.
    pub fn dump(&self, out: &mut dyn Write, hdr: &str) {
        for row in 0..4 {
            let label = format!("x{}", row * 8);
            let _ = write!(out, "{}{:>3} ", hdr, label);
            for i in 0..8 {
                let val = self.regs[row * 8 + i];
                let sep = match i {
                    3 => "  ",
                    7 => "",
                    _ => " ",
                };
                let _ = write!(out, "{}{}", hex::to_hex32(val as u32), sep);
            }
            let _ = writeln!(out);
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
