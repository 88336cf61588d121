// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Mapping of numbered UIO memory regions.

use std::num::NonZeroUsize;

use nix::unistd::{SysconfVar, sysconf};
use tracing::debug;

use crate::mmap::SharedMapping;
use crate::uio::{UioDevice, parse_ulong, read_line};
use crate::{Error, Mmio, Result};

/// A UIO memory region mapped into the process.
///
/// UIO exposes region `M` of a device at mmap offset `M * page_size` of the
/// device node, whatever its physical address. The physical address reported
/// by sysfs is kept because the hardware is programmed with it.
///
/// The region is unmapped when this value is dropped.
#[derive(Debug)]
pub struct UioMap {
    index: usize,
    address: u64,
    mapping: SharedMapping,
}

impl UioMap {
    /// Reads `maps/map{index}/{addr,size}` from the device's sysfs directory
    /// and maps that many bytes of the device node.
    ///
    /// # Errors
    ///
    /// [`Error::MapFailed`] if either attribute is missing or malformed, the
    /// region is empty, or the mmap call fails.
    pub(crate) fn new(device: &UioDevice, index: usize) -> Result<Self> {
        let map_dir = device.sysfs_path().join("maps").join(format!("map{index}"));
        let attribute = |attr: &str| -> Result<u64> {
            let path = map_dir.join(attr);
            let text = read_line(&path)
                .map_err(|e| Error::map_failed(device.name(), index, format!("{}: {e}", path.display())))?;
            parse_ulong(&text).ok_or_else(|| {
                Error::map_failed(
                    device.name(),
                    index,
                    format!("{}: unparseable value \"{text}\"", path.display()),
                )
            })
        };

        let address = attribute("addr")?;
        let size = attribute("size")?;
        let len = usize::try_from(size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| Error::map_failed(device.name(), index, format!("invalid size {size}")))?;

        let offset = region_offset(index, page_size(device.name(), index)?);
        let mapping = SharedMapping::new(device.file(), len, offset)
            .map_err(|e| Error::map_failed(device.name(), index, e))?;

        debug!(
            "{} map{}: address {:#x}, {} bytes, mmap offset {:#x}",
            device.name(),
            index,
            address,
            len,
            offset
        );
        Ok(Self {
            index,
            address,
            mapping,
        })
    }

    /// Region number within its device.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Physical base address as reported by the kernel.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Size of the region in bytes.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.len() == 0
    }

    /// The region's contents.
    pub fn as_slice(&self) -> &[u8] {
        self.mapping.as_slice()
    }

    /// Mutable access to the region's contents, e.g. to stage a frame.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.mapping.as_mut_slice()
    }

    /// A volatile register view over this region.
    pub fn registers(&mut self) -> Mmio<'_> {
        // Safety: mmap returns page-aligned memory, mapped read-write for
        // self.len() bytes, and the view borrows self mutably so it cannot
        // outlive the mapping.
        unsafe { Mmio::new(self.mapping.as_non_null(), self.len()) }
    }
}

/// The mmap offset UIO assigns to region `index`.
pub(crate) fn region_offset(index: usize, page_size: u64) -> u64 {
    index as u64 * page_size
}

fn page_size(device: &str, index: usize) -> Result<u64> {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => Ok(size as u64),
        Ok(_) => Err(Error::map_failed(device, index, "page size unavailable")),
        Err(err) => Err(Error::map_failed(device, index, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_sit_on_page_multiples() {
        assert_eq!(region_offset(0, 4096), 0);
        assert_eq!(region_offset(1, 4096), 4096);
        assert_eq!(region_offset(3, 8192), 3 * 8192);
    }
}
