// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! VEU controller: reset, per-format setup, blit and completion wait.
//!
//! The controller converts NV12 source frames into the RGB framebuffer:
//!
//! 1. [`Veu::open`] locates the `VEU2H` UIO device, maps its register block
//!    (region 0) and scratch memory (region 1), and resets the unit.
//! 2. [`Veu::configure`] programs scaling, cropping, destination and color
//!    conversion whenever the source format or on-screen geometry changes.
//! 3. [`Veu::blit`] points the unit at one frame's Y and C planes and starts
//!    it; [`Veu::wait_irq`] blocks until the hardware signals completion.

pub mod regs;

use std::time::Duration;

use tracing::{debug, info, trace};

use crate::config::VeuConfig;
use crate::framebuffer::FramebufferGeometry;
use crate::{Error, IrqWaker, Mmio, Result, ScaleParameters, UioDevice, UioMap, compute_scale};

/// Controller state, see [`Veu::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VeuState {
    /// Opened and reset, not yet configured
    Ready,
    /// At least one successful [`Veu::configure`]
    Configured,
}

/// Largest source or scaled extent; size fields are 16 bits wide.
pub const MAX_EXTENT: u32 = 0xffff;

/// Largest visible extent; the resize-clip fields hold 12 bits.
pub const MAX_VISIBLE_EXTENT: u32 = 0xfff;

/// The resize step is 4.12 fixed point, so at most 16x reduction.
const MAX_MANTISSA: u32 = 0xf;

/// Geometry for one [`Veu::configure`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VeuSetup {
    /// Source frame width in pixels
    pub src_width: u32,
    /// Source frame height in pixels
    pub src_height: u32,
    /// Scaled output width, before cropping to the screen
    pub dst_width: u32,
    /// Scaled output height, before cropping to the screen
    pub dst_height: u32,
    /// Destination line length in bytes
    pub dst_stride: u32,
    /// Output position on screen; rounded down to a multiple of 4
    pub pos_x: u32,
    pub pos_y: u32,
    /// Screen extent the output is cropped to
    pub dst_max_width: u32,
    pub dst_max_height: u32,
    /// Physical address of the top-left screen pixel
    pub dst_address: u64,
    pub bits_per_pixel: u32,
}

impl VeuSetup {
    /// Unscaled output at the top-left corner of the screen described by
    /// `screen`.
    pub fn fullscreen(src_width: u32, src_height: u32, screen: &FramebufferGeometry) -> Self {
        Self::at(src_width, src_height, src_width, src_height, 0, 0, screen)
    }

    /// Output scaled to `dst_width`x`dst_height` at (`pos_x`, `pos_y`) on the
    /// screen described by `screen`.
    pub fn at(
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
        pos_x: u32,
        pos_y: u32,
        screen: &FramebufferGeometry,
    ) -> Self {
        Self {
            src_width,
            src_height,
            dst_width,
            dst_height,
            dst_stride: screen.line_length,
            pos_x,
            pos_y,
            dst_max_width: screen.width,
            dst_max_height: screen.height,
            dst_address: screen.phys_base,
            bits_per_pixel: screen.bits_per_pixel,
        }
    }

    /// Derives the register values for this geometry without touching the
    /// hardware.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidGeometry`] for empty extents, a position outside the
    /// screen, a destination beyond the 32-bit physical address space, or
    /// sizes and ratios the register fields cannot hold (see [`MAX_EXTENT`]
    /// and [`MAX_VISIBLE_EXTENT`]).
    pub fn plan(&self) -> Result<VeuPlan> {
        if self.src_width == 0 || self.src_height == 0 || self.dst_width == 0 || self.dst_height == 0 {
            return Err(Error::InvalidGeometry(format!(
                "empty extent {}x{} -> {}x{}",
                self.src_width, self.src_height, self.dst_width, self.dst_height
            )));
        }
        if [self.src_width, self.src_height, self.dst_width, self.dst_height]
            .iter()
            .any(|&extent| extent > MAX_EXTENT)
        {
            return Err(Error::InvalidGeometry(format!(
                "extent {}x{} -> {}x{} exceeds {}",
                self.src_width, self.src_height, self.dst_width, self.dst_height, MAX_EXTENT
            )));
        }

        let src_stride = (self.src_width + 15) & !15;
        let pos_x = self.pos_x & !0x03;
        let pos_y = self.pos_y;

        if pos_x >= self.dst_max_width || pos_y >= self.dst_max_height {
            return Err(Error::InvalidGeometry(format!(
                "position {}x{} outside {}x{} screen",
                pos_x, pos_y, self.dst_max_width, self.dst_max_height
            )));
        }

        let cropped_width = visible_extent(self.dst_width, pos_x, self.dst_max_width)?;
        let cropped_height = visible_extent(self.dst_height, pos_y, self.dst_max_height)?;

        let dst_address = u128::from(self.dst_address)
            + u128::from(pos_x) * u128::from(self.bits_per_pixel / 8)
            + u128::from(pos_y) * u128::from(self.dst_stride);
        let dst_address = u32::try_from(dst_address).map_err(|_| {
            Error::InvalidGeometry(format!("destination {dst_address:#x} beyond 32-bit"))
        })?;

        let horizontal = compute_scale(self.src_width, self.dst_width, cropped_width);
        let vertical = compute_scale(self.src_height, self.dst_height, cropped_height);
        for (axis, scale) in [("horizontal", &horizontal), ("vertical", &vertical)] {
            if scale.mantissa > MAX_MANTISSA || scale.adjusted_size_in > MAX_EXTENT {
                return Err(Error::InvalidGeometry(format!(
                    "{axis} resize {scale:?} cannot be programmed"
                )));
            }
        }

        Ok(VeuPlan {
            src_stride,
            dst_stride: self.dst_stride,
            pos_x,
            pos_y,
            cropped_width,
            cropped_height,
            dst_address,
            horizontal,
            vertical,
        })
    }
}

/// Part of `extent` starting at `pos` that fits in `max`.
fn visible_extent(extent: u32, pos: u32, max: u32) -> Result<u32> {
    let end = extent
        .checked_add(pos)
        .ok_or_else(|| Error::InvalidGeometry(format!("extent {extent} at {pos} overflows")))?;
    let visible = if end > max { max - pos } else { extent };
    if visible > MAX_VISIBLE_EXTENT {
        return Err(Error::InvalidGeometry(format!(
            "visible extent {visible} exceeds {MAX_VISIBLE_EXTENT}"
        )));
    }
    Ok(visible)
}

/// Register values derived from a [`VeuSetup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VeuPlan {
    /// Source line length, 16-pixel aligned
    pub src_stride: u32,
    pub dst_stride: u32,
    /// Position after alignment
    pub pos_x: u32,
    pub pos_y: u32,
    /// Visible output extent
    pub cropped_width: u32,
    pub cropped_height: u32,
    /// Address of the first visible output pixel
    pub dst_address: u32,
    pub horizontal: ScaleParameters,
    pub vertical: ScaleParameters,
}

impl VeuPlan {
    /// Packed `VESSR` value: effective source height and width.
    pub fn src_size(&self) -> u32 {
        self.horizontal.adjusted_size_in | (self.vertical.adjusted_size_in << 16)
    }

    /// Packed `VRFCR` value.
    pub fn resize_scale(&self) -> u32 {
        self.horizontal.scale_field() | (self.vertical.scale_field() << 16)
    }

    /// Packed `VRFSR` value.
    pub fn resize_clip(&self) -> u32 {
        self.horizontal.clip_field(self.cropped_width)
            | (self.vertical.clip_field(self.cropped_height) << 16)
    }
}

/// An opened, reset VEU.
///
/// Dropping the controller unmaps both regions and closes the device.
#[derive(Debug)]
pub struct Veu {
    expected_name: String,
    device: UioDevice,
    mmio: UioMap,
    mem: UioMap,
    mem_address: u32,
    irq_timeout: Option<Duration>,
    plan: Option<VeuPlan>,
}

impl Veu {
    /// Locates the VEU, maps its registers and memory, and resets it.
    ///
    /// # Errors
    ///
    /// Discovery and mapping errors propagate unchanged. Anything mapped
    /// before a failure is released.
    pub fn open(config: &VeuConfig) -> Result<Self> {
        let device = UioDevice::locate(&config.device_name, &config.uio)?;
        let mut mmio = device.map(0)?;
        let mem = device.map(1)?;

        let mem_address = u32::try_from(mem.address()).map_err(|_| {
            Error::map_failed(device.name(), 1, format!("address {:#x} beyond 32-bit", mem.address()))
        })?;

        mmio.registers().write(regs::VBSRR, regs::RESET);

        info!(
            "VEU \"{}\" at {}: registers {:#x} ({} bytes), memory {:#x} ({} bytes)",
            device.name(),
            device.node_path().display(),
            mmio.address(),
            mmio.len(),
            mem.address(),
            mem.len()
        );

        Ok(Self {
            expected_name: config.device_name.clone(),
            device,
            mmio,
            mem,
            mem_address,
            irq_timeout: config.irq_timeout,
            plan: None,
        })
    }

    pub fn state(&self) -> VeuState {
        match self.plan {
            Some(_) => VeuState::Configured,
            None => VeuState::Ready,
        }
    }

    /// The plan programmed by the last successful [`Self::configure`].
    pub fn plan(&self) -> Option<&VeuPlan> {
        self.plan.as_ref()
    }

    pub fn device(&self) -> &UioDevice {
        &self.device
    }

    /// Cancels a [`Self::wait_irq`] blocked on another thread.
    pub fn irq_waker(&self) -> IrqWaker {
        self.device.irq_waker()
    }

    /// Scratch memory for frames that do not already live in physically
    /// contiguous memory.
    pub fn mem(&self) -> &UioMap {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut UioMap {
        &mut self.mem
    }

    /// Physical address of [`Self::mem`], for use with [`Self::blit`].
    pub fn mem_address(&self) -> u32 {
        self.mem_address
    }

    /// Direct register access.
    pub fn registers(&mut self) -> Mmio<'_> {
        self.mmio.registers()
    }

    /// Programs scaling, cropping, destination and color conversion.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceMismatch`] if this is not the expected accelerator,
    /// [`Error::InvalidGeometry`] if `setup` cannot be programmed.
    pub fn configure(&mut self, setup: &VeuSetup) -> Result<&VeuPlan> {
        self.check_device()?;
        let plan = setup.plan()?;

        debug!(
            "VEU setup: {}x{} -> {}x{} @{}:{} visible {}x{} stride {} -> {} addr {:#x} bpp {}",
            setup.src_width,
            setup.src_height,
            setup.dst_width,
            setup.dst_height,
            plan.pos_x,
            plan.pos_y,
            plan.cropped_width,
            plan.cropped_height,
            plan.src_stride,
            plan.dst_stride,
            plan.dst_address,
            setup.bits_per_pixel
        );

        let mut regs = self.mmio.registers();
        program(&mut regs, &plan);

        Ok(self.plan.insert(plan))
    }

    /// Starts conversion of the frame whose planes are at `y_address` and
    /// `c_address` (physical).
    ///
    /// # Errors
    ///
    /// [`Error::DeviceMismatch`] if this is not the expected accelerator,
    /// [`Error::Io`] if the UIO interrupt cannot be re-armed.
    pub fn blit(&mut self, y_address: u32, c_address: u32) -> Result<()> {
        self.check_device()?;
        trace!("blit Y {:#x} C {:#x}", y_address, c_address);

        let mut regs = self.mmio.registers();
        regs.write(regs::VSAYR, y_address);
        regs.write(regs::VSACR, c_address);

        self.device.enable_irq()?;

        self.mmio.registers().write(regs::VESTR, regs::START);
        Ok(())
    }

    /// Blocks until the running operation completes, then clears the event.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the configured timeout expires first, or
    /// [`Error::Cancelled`] after [`IrqWaker::wake`]. The event register is
    /// left untouched in both cases.
    pub fn wait_irq(&mut self) -> Result<()> {
        let count = self.device.wait_irq(self.irq_timeout)?;
        trace!("VEU interrupt, count {}", count);
        self.mmio.registers().write(regs::VEVTR, regs::EVENT_CLEAR);
        Ok(())
    }

    fn check_device(&self) -> Result<()> {
        if self.device.name() == self.expected_name {
            Ok(())
        } else {
            Err(Error::DeviceMismatch {
                expected: self.expected_name.clone(),
                found: self.device.name().to_owned(),
            })
        }
    }
}

fn program(regs: &mut Mmio<'_>, plan: &VeuPlan) {
    regs.modify(regs::VRFCR, 0x0000_ffff, plan.horizontal.scale_field());
    regs.modify(regs::VRFSR, 0x0000_ffff, plan.horizontal.clip_field(plan.cropped_width));
    regs.modify(regs::VRFCR, 0xffff_0000, plan.vertical.scale_field() << 16);
    regs.modify(regs::VRFSR, 0xffff_0000, plan.vertical.clip_field(plan.cropped_height) << 16);

    regs.write(regs::VESWR, plan.src_stride);
    regs.write(regs::VESSR, plan.src_size());
    regs.write(regs::VBSSR, 0);

    regs.write(regs::VEDWR, plan.dst_stride);
    regs.write(regs::VDAYR, plan.dst_address);
    // RGB output has no C plane
    regs.write(regs::VDACR, 0);

    regs.write(regs::VSWPR, regs::SWAP);
    regs.write(regs::VTRCR, regs::TRANSFORM_NV12_TO_RGB);

    for (row, offsets) in regs::VMCR.iter().enumerate() {
        for (col, offset) in offsets.iter().enumerate() {
            regs.write(*offset, regs::YUV_TO_RGB[row][col]);
        }
    }
    regs.write(regs::VCOFFR, regs::YUV_OFFSET);

    regs.write(regs::VEIER, regs::IRQ_ENABLE);
}
