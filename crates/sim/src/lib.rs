//! rv32i-sim: RV32I instruction-set simulator and disassembler.
//!
//! This crate provides:
//! - A bounded byte-addressable [`Memory`] with little-endian access
//! - A 32-register file with x0 hardwired to zero
//! - A pure decoder/disassembler for the RV32I encoding space
//! - A [`Hart`] that fetches, decodes, and interprets instructions with
//!   optional per-instruction tracing and register dumps

pub mod hart;
pub mod memory;
pub mod registers;
pub mod decode;
pub mod hex;
pub mod error;

pub use hart::Hart;
pub use memory::Memory;
pub use registers::RegisterFile;
pub use decode::{disassemble, DecodedInstr, Op};
pub use error::SimError;
