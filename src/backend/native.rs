use std::collections::HashMap;

use iced_x86::{
    code_asm::{self, CodeAssembler, CodeLabel},
    IcedError,
};
use thiserror::Error;

use crate::{
    frontend::{
        loops::LoopId,
        parser::{Instruction, IR},
    },
    segment,
};

use super::elf::{
    compile_to_elf, LabelMap, PhdrFlags, Segment, SegmentBuilder,
};

use code_asm as asm;

#[derive(Error, Debug)]
pub enum NativeError {
    #[error("could not generate asm: {0}")]
    Assemble(#[from] IcedError),
    #[error("missing label: {0}")]
    MissingLabel(&'static str),
    #[error("loop {0} is closed but was never opened")]
    UnknownLoop(LoopId),
    #[error("pointer move of {0} cells does not fit in a 32-bit immediate")]
    ShiftTooLarge(usize),
    #[error("a segment of {0} bytes does not fit in the address space")]
    MemoryTooLarge(u64),
    #[error("{0} header fields were never patched")]
    UnpatchedHeader(usize),
    #[error("ELF images can only be written on little-endian hosts")]
    BigEndianHost,
}

// dataptr = RSI, RDX = 1 for every read/write

fn emit_add(a: &mut CodeAssembler, run: usize) -> Result<(), IcedError> {
    if run == 1 {
        a.inc(asm::byte_ptr(asm::rsi))?;
    } else {
        a.add(asm::byte_ptr(asm::rsi), (run % 256) as u32)?;
    }

    Ok(())
}

fn emit_sub(a: &mut CodeAssembler, run: usize) -> Result<(), IcedError> {
    if run == 1 {
        a.dec(asm::byte_ptr(asm::rsi))?;
    } else {
        a.sub(asm::byte_ptr(asm::rsi), (run % 256) as u32)?;
    }

    Ok(())
}

fn shift_amount(run: usize) -> Result<i32, NativeError> {
    i32::try_from(run).map_err(|_| NativeError::ShiftTooLarge(run))
}

fn emit_shift_right(
    a: &mut CodeAssembler,
    run: usize,
) -> Result<(), NativeError> {
    if run == 1 {
        a.inc(asm::rsi)?;
    } else {
        a.add(asm::rsi, shift_amount(run)?)?;
    }

    Ok(())
}

fn emit_shift_left(
    a: &mut CodeAssembler,
    run: usize,
) -> Result<(), NativeError> {
    if run == 1 {
        a.dec(asm::rsi)?;
    } else {
        a.sub(asm::rsi, shift_amount(run)?)?;
    }

    Ok(())
}

fn emit_write(a: &mut CodeAssembler) -> Result<(), IcedError> {
    a.mov(asm::rax, 1u64)?;
    a.mov(asm::rdi, 1u64)?;
    a.syscall()?;

    Ok(())
}

fn emit_read(a: &mut CodeAssembler) -> Result<(), IcedError> {
    a.xor(asm::rax, asm::rax)?;
    a.xor(asm::rdi, asm::rdi)?;
    a.syscall()?;

    Ok(())
}

fn emit_jump_forward(
    a: &mut CodeAssembler,
    target: CodeLabel,
    position: &mut CodeLabel,
) -> Result<(), IcedError> {
    a.cmp(asm::byte_ptr(asm::rsi), 0)?;
    a.je(target)?;

    a.set_label(position)?;

    Ok(())
}

fn emit_jump_backward(
    a: &mut CodeAssembler,
    target: CodeLabel,
    position: &mut CodeLabel,
) -> Result<(), IcedError> {
    a.cmp(asm::byte_ptr(asm::rsi), 0)?;
    a.jne(target)?;

    a.set_label(position)?;

    Ok(())
}

struct MemorySegment {
    size: u64,
}

impl SegmentBuilder for MemorySegment {
    fn code(&self, _labels: &LabelMap) -> Result<Segment, NativeError> {
        Ok(Segment::reserved("memory", self.size))
    }

    fn flags(&self) -> PhdrFlags {
        PhdrFlags::R | PhdrFlags::W
    }
}

struct TextSegment<'a> {
    instructions: &'a IR,
}

impl SegmentBuilder for TextSegment<'_> {
    fn code(&self, labels: &LabelMap) -> Result<Segment, NativeError> {
        let mut a = CodeAssembler::new(64)?;

        let mut _start = a.create_label();
        a.set_label(&mut _start)?;

        // setup
        a.mov(asm::rdx, 1u64)?;
        a.mov(asm::rsi, labels.get("memory")?)?;

        // (start, end) for every loop still open
        let mut loops: HashMap<LoopId, (CodeLabel, CodeLabel)> =
            HashMap::new();

        for instr in self.instructions.instructions() {
            use Instruction as I;
            match *instr {
                I::Increment(r) => emit_add(&mut a, r)?,
                I::Decrement(r) => emit_sub(&mut a, r)?,
                I::MoveRight(r) => emit_shift_right(&mut a, r)?,
                I::MoveLeft(r) => emit_shift_left(&mut a, r)?,
                I::Output => emit_write(&mut a)?,
                I::Input => emit_read(&mut a)?,
                I::LoopOpen(id) => {
                    let mut start = a.create_label();
                    let end = a.create_label();
                    emit_jump_forward(&mut a, end, &mut start)?;
                    loops.insert(id, (start, end));
                }
                I::LoopClose(id) => {
                    let (start, mut end) =
                        loops.remove(&id).ok_or(NativeError::UnknownLoop(id))?;
                    emit_jump_backward(&mut a, start, &mut end)?;
                }
            }
        }

        // end!
        a.mov(asm::rax, 60u64)?;
        a.xor(asm::rdi, asm::rdi)?;
        a.syscall()?;

        Ok(segment!(a, _start))
    }

    fn flags(&self) -> PhdrFlags {
        PhdrFlags::X | PhdrFlags::R
    }
}

/// Lowers `ir` straight to a static x86-64 ELF executable whose cell block
/// is `memory_size` bytes.
pub fn compile(ir: &IR, memory_size: u64) -> Result<Vec<u8>, NativeError> {
    let memory = MemorySegment { size: memory_size };
    let text = TextSegment { instructions: ir };

    compile_to_elf(&[&memory, &text])
}
