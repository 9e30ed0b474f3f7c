//! NASM listing generation.
//!
//! Register use in the generated program: `rsi` is the data pointer into the
//! `memory` block and `rdx` stays 1 so every read/write syscall moves exactly
//! one byte. Moving `rsi` outside the block is not checked.
//!
//! Counted cell updates are written as the run length modulo 256, so 258
//! `+` become `add byte [rsi], 2` rather than an out-of-range byte
//! immediate. The byte arithmetic wraps to the same value either way, and
//! pointer moves always carry the full run length.

use std::fmt;

use crate::frontend::{
    loops::LoopId,
    parser::{Instruction, IR},
};

/// Register holding the data pointer.
pub const POINTER: &str = "rsi";

pub const DEFAULT_MEMORY_SIZE: u64 = 512;

/// Appends listing lines, one reduced instruction at a time.
#[derive(Debug, Default)]
pub struct Emitter {
    lines: Vec<String>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn emit_cell(&mut self, single: &str, counted: &str, run: usize) {
        if run == 1 {
            self.push(format!("{single} byte [{POINTER}]"));
        } else {
            // byte arithmetic wraps, so only the residue matters
            self.push(format!("{counted} byte [{POINTER}], {}", run % 256));
        }
    }

    fn emit_shift(&mut self, single: &str, counted: &str, run: usize) {
        if run == 1 {
            self.push(format!("{single} {POINTER}"));
        } else {
            self.push(format!("{counted} {POINTER}, {run}"));
        }
    }

    fn emit_loop_open(&mut self, id: LoopId) {
        self.push(format!("cmp byte [{POINTER}], 0"));
        self.push(format!("je {}", id.end_label()));
        self.push(format!("{}:", id.start_label()));
    }

    fn emit_loop_close(&mut self, id: LoopId) {
        self.push(format!("cmp byte [{POINTER}], 0"));
        self.push(format!("jne {}", id.start_label()));
        self.push(format!("{}:", id.end_label()));
    }

    pub fn emit(&mut self, instr: &Instruction) {
        use Instruction as I;
        match *instr {
            I::Increment(r) => self.emit_cell("inc", "add", r),
            I::Decrement(r) => self.emit_cell("dec", "sub", r),
            I::MoveRight(r) => self.emit_shift("inc", "add", r),
            I::MoveLeft(r) => self.emit_shift("dec", "sub", r),
            I::Output => {
                self.push("mov rax, 1");
                self.push("mov rdi, 1");
                self.push("syscall");
            }
            I::Input => {
                self.push("xor rax, rax");
                self.push("xor rdi, rdi");
                self.push("syscall");
            }
            I::LoopOpen(id) => self.emit_loop_open(id),
            I::LoopClose(id) => self.emit_loop_close(id),
        }
    }

    pub fn finish(self, memory_size: u64) -> Listing {
        Listing {
            memory_size,
            body: self.lines,
        }
    }
}

/// A complete program listing. `Display` renders it as NASM source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    memory_size: u64,
    body: Vec<String>,
}

impl Listing {
    /// Lines emitted for the program itself, without preamble and epilogue.
    pub fn body(&self) -> &[String] {
        &self.body
    }

    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bits 64")?;
        writeln!(f, "global _start")?;

        writeln!(f, "section .bss")?;
        writeln!(f, "memory: resb {}", self.memory_size)?;

        writeln!(f, "section .text")?;
        writeln!(f, "_start:")?;
        writeln!(f, "mov rdx, 1")?;
        writeln!(f, "mov {POINTER}, memory")?;

        for line in &self.body {
            writeln!(f, "{line}")?;
        }

        writeln!(f, "exit:")?;
        writeln!(f, "mov rax, 60")?;
        writeln!(f, "xor rdi, rdi")?;
        writeln!(f, "syscall")
    }
}

pub fn generate(ir: &IR, memory_size: u64) -> Listing {
    let mut emitter = Emitter::new();
    for instr in ir.instructions() {
        emitter.emit(instr);
    }

    emitter.finish(memory_size)
}
