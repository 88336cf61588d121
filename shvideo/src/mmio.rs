// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Volatile 32-bit register access over a mapped register block.

use std::marker::PhantomData;
use std::ptr::NonNull;

/// A borrowed view of a memory-mapped register block.
///
/// Registers are addressed by byte offset and accessed as native-endian
/// 32-bit words. Every access is a volatile load or store, so the compiler
/// neither elides nor reorders them relative to each other.
///
/// Offsets are trusted: they come from the fixed register map in
/// [`crate::regs`]. Debug builds assert alignment and bounds.
#[derive(Debug)]
pub struct Mmio<'a> {
    base: NonNull<u32>,
    words: usize,
    phantom: PhantomData<&'a mut [u32]>,
}

impl<'a> Mmio<'a> {
    /// Wraps a mapped block of `len` bytes.
    ///
    /// # Safety
    ///
    /// `base` must be 4-byte aligned and valid for volatile reads and writes
    /// of `len` bytes for the whole lifetime `'a`.
    pub(crate) unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self {
            base: base.cast(),
            words: len / 4,
            phantom: PhantomData,
        }
    }

    /// Reads the register at byte offset `offset`.
    pub fn read(&self, offset: usize) -> u32 {
        let index = self.index(offset);
        // Safety: index is inside the mapped block (see `new`).
        unsafe { self.base.as_ptr().add(index).read_volatile() }
    }

    /// Writes `value` to the register at byte offset `offset`.
    pub fn write(&mut self, offset: usize, value: u32) {
        let index = self.index(offset);
        // Safety: index is inside the mapped block (see `new`).
        unsafe { self.base.as_ptr().add(index).write_volatile(value) }
    }

    /// Read-modify-write: replaces the bits selected by `mask` with `value`.
    pub fn modify(&mut self, offset: usize, mask: u32, value: u32) {
        let current = self.read(offset);
        self.write(offset, (current & !mask) | (value & mask));
    }

    /// Size of the block in bytes.
    pub fn len(&self) -> usize {
        self.words * 4
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    fn index(&self, offset: usize) -> usize {
        debug_assert_eq!(offset % 4, 0, "unaligned register offset {offset:#x}");
        debug_assert!(
            offset / 4 < self.words,
            "register offset {offset:#x} outside {} byte block",
            self.words * 4
        );
        offset / 4
    }
}
