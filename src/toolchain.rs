//! Runs NASM and ld over a written listing.

use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("could not run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{tool} failed with {status}")]
    Failed {
        tool: &'static str,
        status: ExitStatus,
    },
    #[error("building only works on POSIX systems")]
    Unsupported,
}

fn run(
    tool: &'static str,
    command: &mut Command,
) -> Result<(), ToolchainError> {
    let status = command
        .status()
        .map_err(|source| ToolchainError::Spawn { tool, source })?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolchainError::Failed { tool, status })
    }
}

/// Assembles `asm` into `<base>.o` and links it into the executable `base`.
/// Returns the path of the executable.
pub fn assemble_and_link(
    asm: &Path,
    base: &Path,
) -> Result<PathBuf, ToolchainError> {
    if !cfg!(unix) {
        return Err(ToolchainError::Unsupported);
    }

    let mut object = base.as_os_str().to_owned();
    object.push(".o");
    let object = PathBuf::from(object);

    run(
        "nasm",
        Command::new("nasm")
            .arg("-felf64")
            .arg("-o")
            .arg(&object)
            .arg(asm),
    )?;

    run("ld", Command::new("ld").arg("-o").arg(base).arg(&object))?;

    Ok(base.to_path_buf())
}
