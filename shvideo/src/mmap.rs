// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Shared read-write mappings of device files.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::os::fd::AsFd;
use std::ptr::NonNull;

use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};
use tracing::{trace, warn};

/// An owned `MAP_SHARED` mapping, unmapped on drop.
///
/// The mapping stays valid after the descriptor it was created from is
/// closed.
#[derive(Debug)]
pub(crate) struct SharedMapping {
    ptr: NonNull<c_void>,
    len: NonZeroUsize,
}

// Safety: the mapping is plain process memory; moving the owner to another
// thread does not invalidate it. Shared access is not allowed (no Sync).
unsafe impl Send for SharedMapping {}

impl SharedMapping {
    /// Maps `len` bytes of `fd` starting at byte `offset`.
    pub(crate) fn new<F: AsFd>(fd: F, len: NonZeroUsize, offset: u64) -> nix::Result<Self> {
        let offset = nix::libc::off_t::try_from(offset).map_err(|_| nix::Error::EOVERFLOW)?;
        // Safety: no address hint is given, so the kernel picks a fresh range
        // that cannot alias any existing Rust object.
        let ptr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                offset,
            )?
        };
        trace!("mapped {} bytes at offset {:#x} -> {:p}", len, offset, ptr);
        Ok(Self { ptr, len })
    }

    pub(crate) fn len(&self) -> usize {
        self.len.get()
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr().cast()
    }

    pub(crate) fn as_non_null(&self) -> NonNull<u8> {
        self.ptr.cast()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // Safety: the range was mapped readable and lives as long as self.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len()) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety: mapped writable; &mut self guarantees no other slice exists.
        unsafe { std::slice::from_raw_parts_mut(self.as_ptr(), self.len()) }
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        // Safety: ptr/len describe exactly the range returned by mmap.
        if let Err(err) = unsafe { munmap(self.ptr, self.len.get()) } {
            warn!("munmap of {:p} failed: {}", self.ptr, err);
        }
    }
}
