// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! VEU register map and fixed programming values (SuperH hardware manual).

/// Start operation
pub const VESTR: usize = 0x00;
/// Source line length
pub const VESWR: usize = 0x10;
/// Source image size (height << 16 | width)
pub const VESSR: usize = 0x14;
/// Source Y/RGB plane address
pub const VSAYR: usize = 0x18;
/// Source C plane address
pub const VSACR: usize = 0x1c;
/// Bundle mode
pub const VBSSR: usize = 0x20;
/// Destination line length
pub const VEDWR: usize = 0x30;
/// Destination Y/RGB plane address
pub const VDAYR: usize = 0x34;
/// Destination C plane address
pub const VDACR: usize = 0x38;
/// Transform control
pub const VTRCR: usize = 0x50;
/// Resize scale
pub const VRFCR: usize = 0x54;
/// Resize clip
pub const VRFSR: usize = 0x58;
/// Enhance
pub const VENHR: usize = 0x5c;
/// Filter mode
pub const VFMCR: usize = 0x70;
/// Vertical lowpass
pub const VVTCR: usize = 0x74;
/// Horizontal lowpass
pub const VHTCR: usize = 0x78;
/// Color match
pub const VAPCR: usize = 0x80;
/// Color replace
pub const VECCR: usize = 0x84;
/// Fixed mode
pub const VAFXR: usize = 0x90;
/// Swap
pub const VSWPR: usize = 0x94;
/// Interrupt mask
pub const VEIER: usize = 0xa0;
/// Interrupt event
pub const VEVTR: usize = 0xa4;
/// Status
pub const VSTAR: usize = 0xb0;
/// Soft reset
pub const VBSRR: usize = 0xb4;

/// Color conversion matrix, row-major
pub const VMCR: [[usize; 3]; 3] = [
    [0x200, 0x204, 0x208],
    [0x20c, 0x210, 0x214],
    [0x218, 0x21c, 0x220],
];
/// Color conversion offset
pub const VCOFFR: usize = 0x224;
/// Color conversion clip
pub const VCBR: usize = 0x228;

/// Written to `VBSRR` to reset the unit.
pub const RESET: u32 = 0x100;
/// Written to `VEVTR` to clear the end-of-operation event.
pub const EVENT_CLEAR: u32 = 0x100;
/// Written to `VEIER` to enable the end-of-operation interrupt.
pub const IRQ_ENABLE: u32 = 1;
/// Written to `VESTR` to start an operation.
pub const START: u32 = 1;

/// Byte/word swap for little-endian NV12 in, RGB565 out.
pub const SWAP: u32 = 0x67;
/// NV12 (YCbCr 4:2:0, semi-planar) to RGB transform.
pub const TRANSFORM_NV12_TO_RGB: u32 = (6 << 16) | 2 | 4;

/// ITU-R BT.601 YCbCr to RGB coefficients, 1/2048 units, row-major.
pub const YUV_TO_RGB: [[u32; 3]; 3] = [
    [0x0cc5, 0x0950, 0x0000],
    [0x397f, 0x0950, 0x3ccd],
    [0x0000, 0x0950, 0x1023],
];
/// Y offset 16, C offset 128.
pub const YUV_OFFSET: u32 = 0x0080_0010;
