//! Simulator errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Can't open file {} for reading", path.display())]
    LoadFile { path: PathBuf },

    #[error("Program too big.")]
    ProgramTooBig,
}
