// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Linux framebuffer access.
//!
//! The framebuffer is the VEU's destination: the controller needs its line
//! length, resolution, depth and physical base address, and the sink clears
//! it when playback starts and stops.

use std::ffi::c_ulong;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::fd::AsRawFd;

use tracing::debug;

use crate::config::FramebufferConfig;
use crate::mmap::SharedMapping;
use crate::{Error, Result};

const FBIOGET_VSCREENINFO: u32 = 0x4600;
const FBIOGET_FSCREENINFO: u32 = 0x4602;

/// One color channel's position in a pixel (`struct fb_bitfield`).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FbBitfield {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

/// Variable screen information (`struct fb_var_screeninfo`).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FbVarScreeninfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: FbBitfield,
    pub green: FbBitfield,
    pub blue: FbBitfield,
    pub transp: FbBitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

/// Fixed screen information (`struct fb_fix_screeninfo`).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FbFixScreeninfo {
    pub id: [u8; 16],
    pub smem_start: c_ulong,
    pub smem_len: u32,
    pub type_: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

nix::ioctl_read_bad!(fbioget_vscreeninfo, FBIOGET_VSCREENINFO, FbVarScreeninfo);
nix::ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, FbFixScreeninfo);

/// Display geometry as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferGeometry {
    /// Visible width in pixels
    pub width: u32,
    /// Visible height in pixels
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Bytes per line
    pub line_length: u32,
    /// Size of display memory in bytes
    pub mem_len: u32,
    /// Physical address of display memory
    pub phys_base: u64,
}

impl FramebufferGeometry {
    pub fn from_screeninfo(var: &FbVarScreeninfo, fix: &FbFixScreeninfo) -> Self {
        Self {
            width: var.xres,
            height: var.yres,
            bits_per_pixel: var.bits_per_pixel,
            line_length: fix.line_length,
            mem_len: fix.smem_len,
            phys_base: u64::from(fix.smem_start),
        }
    }

    /// Bytes covered by the visible lines.
    pub fn visible_len(&self) -> usize {
        self.line_length as usize * self.height as usize
    }
}

/// A mapped framebuffer.
///
/// The device is closed once the memory is mapped; the mapping is released
/// on drop.
#[derive(Debug)]
pub struct Framebuffer {
    geometry: FramebufferGeometry,
    mapping: SharedMapping,
}

impl Framebuffer {
    /// Opens the framebuffer, queries its geometry, maps all of its memory
    /// and clears the visible area.
    ///
    /// # Errors
    ///
    /// - [`Error::OpenFailed`] if the device cannot be opened
    /// - [`Error::IoctlFailed`] if either screen-info query is rejected
    /// - [`Error::MapFailed`] if the memory cannot be mapped
    pub fn open(config: &FramebufferConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|source| Error::OpenFailed {
                path: config.device.clone(),
                source,
            })?;

        let mut var = FbVarScreeninfo::default();
        // Safety: var is a valid, writable fb_var_screeninfo.
        unsafe { fbioget_vscreeninfo(file.as_raw_fd(), &mut var) }.map_err(|source| {
            Error::IoctlFailed {
                request: "FBIOGET_VSCREENINFO",
                source,
            }
        })?;

        let mut fix = FbFixScreeninfo::default();
        // Safety: fix is a valid, writable fb_fix_screeninfo.
        unsafe { fbioget_fscreeninfo(file.as_raw_fd(), &mut fix) }.map_err(|source| {
            Error::IoctlFailed {
                request: "FBIOGET_FSCREENINFO",
                source,
            }
        })?;

        let geometry = FramebufferGeometry::from_screeninfo(&var, &fix);
        let device = config.device.display().to_string();
        let len = NonZeroUsize::new(fix.smem_len as usize)
            .ok_or_else(|| Error::map_failed(&device, 0, "driver reports no display memory"))?;
        let mapping =
            SharedMapping::new(&file, len, 0).map_err(|e| Error::map_failed(&device, 0, e))?;

        debug!(
            "{}: {}x{} {}bpp, line {} bytes, {} bytes at {:#x}",
            device,
            geometry.width,
            geometry.height,
            geometry.bits_per_pixel,
            geometry.line_length,
            geometry.mem_len,
            geometry.phys_base
        );

        let mut framebuffer = Self { geometry, mapping };
        framebuffer.clear();
        Ok(framebuffer)
    }

    pub fn geometry(&self) -> &FramebufferGeometry {
        &self.geometry
    }

    /// Zero-fills the visible lines.
    pub fn clear(&mut self) {
        let len = self.geometry.visible_len().min(self.mapping.len());
        self.mapping.as_mut_slice()[..len].fill(0);
    }

    /// The whole display memory.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.mapping.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screeninfo_layout_matches_kernel_abi() {
        assert_eq!(std::mem::size_of::<FbVarScreeninfo>(), 160);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<FbFixScreeninfo>(), 80);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(std::mem::size_of::<FbFixScreeninfo>(), 68);
    }

    #[test]
    fn geometry_from_screeninfo() {
        let var = FbVarScreeninfo {
            xres: 800,
            yres: 480,
            bits_per_pixel: 16,
            ..Default::default()
        };
        let fix = FbFixScreeninfo {
            smem_start: 0x0d00_0000,
            smem_len: 1600 * 480 * 2,
            line_length: 1600,
            ..Default::default()
        };
        let geometry = FramebufferGeometry::from_screeninfo(&var, &fix);
        assert_eq!(geometry.width, 800);
        assert_eq!(geometry.height, 480);
        assert_eq!(geometry.bits_per_pixel, 16);
        assert_eq!(geometry.line_length, 1600);
        assert_eq!(geometry.mem_len, 1600 * 480 * 2);
        assert_eq!(geometry.phys_base, 0x0d00_0000);
        assert_eq!(geometry.visible_len(), 1600 * 480);
    }
}
