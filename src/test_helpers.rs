use std::{
    fs::{File, Permissions},
    io::Write,
    os::{fd::AsRawFd, unix::fs::PermissionsExt},
    process::{Command, Output, Stdio},
    thread::sleep,
    time::Duration,
};

use tempdir::TempDir;

/// Writes `binary` to a temporary file, runs it with `stdin` piped in and
/// returns what it produced.
pub fn create_and_run_bin(binary: &[u8], stdin: &[u8]) -> Output {
    let dir = TempDir::new("bfc").unwrap();

    let elf_path = dir.path().join("elf");
    let mut elf = File::create(elf_path.clone()).unwrap();
    elf.write_all(binary).unwrap();

    elf.set_permissions(Permissions::from_mode(0o755)).unwrap();

    // Without this dance the freshly written file is often still "busy"
    // when we try to exec it.
    // See: https://github.com/rust-lang/rust/issues/114554#issue-1838269767
    sleep(Duration::from_micros(2));
    unsafe { libc::flock(elf.as_raw_fd(), libc::LOCK_EX) };

    drop(elf);

    let file = File::open(elf_path.clone()).unwrap();
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_SH) };
    drop(file);

    let mut child = Command::new(elf_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // dropping the handle closes the pipe, so reads past the input see EOF.
    // A program that exits without reading breaks the pipe, which is fine.
    let _ = child.stdin.take().unwrap().write_all(stdin);

    child.wait_with_output().unwrap()
}
