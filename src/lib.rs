//! Compiler from the eight-symbol tape language to x86-64 Linux code.
//!
//! The frontend filters the source and collapses it into reduced
//! instructions with paired loop labels. The backends turn those into
//! either a NASM listing or a ready-to-run ELF executable.

use thiserror::Error;

pub mod frontend {
    pub mod loops;
    pub mod parser;
}

pub mod backend {
    pub mod elf;
    pub mod listing;
    pub mod native;
}

pub mod toolchain;

#[cfg(unix)]
#[doc(hidden)]
pub mod test_helpers;

use backend::{listing::Listing, native::NativeError};
use frontend::parser::{ParseError, Program, IR};
use toolchain::ToolchainError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Native(#[from] NativeError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Bytes reserved for the cell block.
    pub memory_size: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            memory_size: backend::listing::DEFAULT_MEMORY_SIZE,
        }
    }
}

/// Compiles `source` into a NASM listing.
pub fn compile(
    source: &str,
    options: &CompileOptions,
) -> Result<Listing, Error> {
    let program = Program::from(source);
    let ir = IR::parse(&program)?;

    Ok(backend::listing::generate(&ir, options.memory_size))
}

/// Compiles `source` into a static ELF executable without going through an
/// external assembler.
pub fn compile_native(
    source: &str,
    options: &CompileOptions,
) -> Result<Vec<u8>, Error> {
    let program = Program::from(source);
    let ir = IR::parse(&program)?;

    Ok(backend::native::compile(&ir, options.memory_size)?)
}
