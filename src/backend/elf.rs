use std::{collections::HashMap, iter, marker::PhantomData};

use bitflags::bitflags;
use bytemuck::{bytes_of, Pod};
use iced_x86::{
    code_asm::{CodeAssembler, CodeLabel},
    BlockEncoderOptions,
};

use super::native::NativeError;

struct BinaryBuilder {
    binary: Vec<u8>,
    outstanding_patches: usize,
}

struct Patch<T> {
    index: usize,
    phantom: PhantomData<T>,
}

impl BinaryBuilder {
    fn new() -> Self {
        BinaryBuilder {
            binary: vec![],
            outstanding_patches: 0,
        }
    }

    fn current_addr(&self) -> usize {
        self.binary.len()
    }

    fn emit(&mut self, bytes: impl Pod) {
        self.binary.extend_from_slice(bytes_of(&bytes));
    }

    fn emit_slice(&mut self, bytes: &[u8]) {
        self.binary.extend_from_slice(bytes);
    }

    fn pad(&mut self, count: usize) {
        self.binary.extend(iter::repeat(0).take(count));
    }

    fn pad_to_width(&mut self, width: usize) {
        let over = self.current_addr() % width;
        if over != 0 {
            self.pad(width - over);
        }
    }

    fn mark<T>(&mut self) -> Patch<T> {
        let patch = Patch {
            index: self.current_addr(),
            phantom: PhantomData,
        };

        self.outstanding_patches += 1;
        self.pad(size_of::<T>());

        patch
    }

    fn patch<T>(&mut self, patch: Patch<T>, bytes: T)
    where
        T: Pod,
    {
        self.outstanding_patches -= 1;

        self.binary[patch.index..patch.index + size_of::<T>()]
            .copy_from_slice(bytes_of(&bytes));
    }

    fn build(self) -> Result<Vec<u8>, NativeError> {
        if self.outstanding_patches == 0 {
            Ok(self.binary)
        } else {
            Err(NativeError::UnpatchedHeader(self.outstanding_patches))
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PhdrFlags: u32 {
        const X = 1 << 0;
        const W = 1 << 1;
        const R = 1 << 2;
    }
}

/// Virtual addresses of the labels exported by already placed segments.
#[derive(Debug, Default)]
pub struct LabelMap(HashMap<&'static str, u64>);

impl LabelMap {
    pub fn get(&self, name: &'static str) -> Result<u64, NativeError> {
        self.0
            .get(name)
            .copied()
            .ok_or(NativeError::MissingLabel(name))
    }

    fn insert(&mut self, name: &'static str, addr: u64) {
        self.0.insert(name, addr);
    }
}

pub enum Segment {
    /// Machine code, with the labels it exports to later segments.
    Code {
        code: CodeAssembler,
        labels: Vec<(&'static str, CodeLabel)>,
    },
    /// Zero-filled memory that takes no room in the file.
    Reserved { label: &'static str, size: u64 },
}

impl Segment {
    pub fn new(
        code: CodeAssembler,
        labels: Vec<(&'static str, CodeLabel)>,
    ) -> Self {
        Segment::Code { code, labels }
    }

    pub fn reserved(label: &'static str, size: u64) -> Self {
        Segment::Reserved { label, size }
    }
}

#[macro_export]
macro_rules! segment {
    ($code:expr, $($label:ident),*) => {
        $crate::backend::elf::Segment::new(
            $code,
            vec![$((stringify!($label), $label)),+]
        )
    };
}

/// Bytes stored in the file for a segment plus the size it occupies once
/// loaded.
pub struct Image {
    pub bytes: Vec<u8>,
    pub mem_size: u64,
}

pub trait SegmentBuilder {
    fn code(&self, labels: &LabelMap) -> Result<Segment, NativeError>;

    fn flags(&self) -> PhdrFlags;

    fn build(
        &self,
        ip: u64,
        labels: &mut LabelMap,
    ) -> Result<Image, NativeError> {
        match self.code(labels)? {
            Segment::Code {
                mut code,
                labels: new_labels,
            } => {
                let result = code.assemble_options(
                    ip,
                    BlockEncoderOptions::RETURN_NEW_INSTRUCTION_OFFSETS,
                )?;

                for (name, label) in new_labels {
                    labels.insert(name, result.label_ip(&label)?);
                }

                let bytes = result.inner.code_buffer;
                Ok(Image {
                    mem_size: bytes.len() as u64,
                    bytes,
                })
            }
            Segment::Reserved { label, size } => {
                labels.insert(label, ip);

                Ok(Image {
                    bytes: vec![],
                    mem_size: size,
                })
            }
        }
    }
}

const LOAD_POS: u64 = 0x08048000;
const PAGE_SIZE: u64 = 0x1000;
/// First address past the x86-64 user half with 4-level paging.
const USER_SPACE_END: u64 = 0x0000_7fff_ffff_f000;

fn page_align(size: u64) -> Option<u64> {
    size.div_ceil(PAGE_SIZE).checked_mul(PAGE_SIZE)
}

/// Lays the segments out in order, one `PT_LOAD` each, and returns a static
/// x86-64 executable entering at the `_start` label.
pub fn compile_to_elf(
    segments: &[&dyn SegmentBuilder],
) -> Result<Vec<u8>, NativeError> {
    if cfg!(target_endian = "big") {
        return Err(NativeError::BigEndianHost);
    }

    const EHDR_SIZE: u16 = 0x40; // known statically for elf64
    const PHDR_SIZE: u16 = 0x38;

    let mut b = BinaryBuilder::new();

    // === ELF HEADER ===
    b.emit(*b"\x7FELF"); // magic
    b.emit([2u8, 1, 1, 0]); // class, endian, version, abi
    b.pad(8);

    b.emit(2u16); // type
    b.emit(0x3Eu16); // machine
    b.emit(1u32); // version

    let entry_point = b.mark(); // entry point
    let prog_header_offset = b.mark(); // program header table offset
    b.emit(0u64); // section header (none)

    b.emit(0u32); // flags (none)
    b.emit(EHDR_SIZE); // elf header size
    b.emit(PHDR_SIZE); // program header size
    b.emit((segments.len()) as u16); // number of program headers

    b.emit([0u16, 0, 0]); // no section header

    b.patch(prog_header_offset, b.current_addr() as u64);

    // === PHDR HEADERS ===
    let mut seg_patches: Vec<[Patch<u64>; 4]> = Vec::new();
    for seg in segments {
        b.emit(1u32); // segment type: loadable
        b.emit(seg.flags().bits());
        let offset = b.mark();
        let vaddr = b.mark();
        b.emit(0u64); // physical memory size is ignored
        let file_size = b.mark();
        let mem_size = b.mark();
        b.emit(PAGE_SIZE);

        seg_patches.push([offset, vaddr, file_size, mem_size]);
    }

    b.pad_to_width(PAGE_SIZE as usize);

    // === SEGMENTS ===
    // zero-filled tails push later segments up in memory but not in the file
    let mut reserved = 0u64;
    let mut labels = LabelMap::default();
    for (seg, patches) in segments.iter().zip(seg_patches) {
        let [offset, vaddr, file_size, mem_size] = patches;

        let file_offset = b.current_addr() as u64;
        let vmem_offset = file_offset + LOAD_POS + reserved;
        let image = seg.build(vmem_offset, &mut labels)?;
        let stored = image.bytes.len() as u64;

        b.patch(offset, file_offset);
        b.patch(vaddr, vmem_offset);
        b.patch(file_size, stored);
        b.patch(mem_size, image.mem_size);

        let loaded = page_align(image.mem_size)
            .filter(|&loaded| {
                matches!(
                    vmem_offset.checked_add(loaded),
                    Some(end) if end <= USER_SPACE_END
                )
            })
            .ok_or(NativeError::MemoryTooLarge(image.mem_size))?;

        // code segments load exactly what they store, so this never wraps
        reserved += loaded - page_align(stored).unwrap_or(loaded);

        b.emit_slice(&image.bytes[..]);
        b.pad_to_width(PAGE_SIZE as usize);
    }

    b.patch(entry_point, labels.get("_start")?);

    b.build()
}
