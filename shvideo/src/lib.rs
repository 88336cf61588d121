// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! # shvideo - SuperH VEU and framebuffer access
//!
//! Safe Rust access to the SuperH Video Engine Unit (VEU) through the Linux
//! Userspace I/O (UIO) framework, plus the framebuffer device it renders into.
//!
//! ## Overview
//!
//! The VEU is a DMA engine that converts NV12 frames to RGB while scaling and
//! cropping them. Its registers and a scratch memory block are exposed by a
//! UIO driver; this crate finds that driver, maps both regions, and programs
//! the hardware one frame at a time.
//!
//! ### Key Concepts
//!
//! - **UIO device**: a `/dev/uio{N}` node located by name through sysfs ([`UioDevice`])
//! - **Region**: a numbered memory window of a UIO device, mapped into the process ([`UioMap`])
//! - **Registers**: a volatile 32-bit view over a mapped register block ([`Mmio`])
//! - **VEU**: the controller tying device, registers and scratch memory together ([`Veu`])
//! - **Framebuffer**: the display memory the VEU writes RGB output into ([`Framebuffer`])
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌───────────┐
//! │    Veu    │     │Framebuffer│  (/dev/fb0)
//! └─────┬─────┘     └───────────┘
//!       │
//!       ├─► UioDevice ──► /dev/uio{N}   (irq enable / wait)
//!       ├─► UioMap #0 ──► Mmio          (registers)
//!       └─► UioMap #1                   (scratch frame memory)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use shvideo::{Framebuffer, Veu, VeuSetup, config::{FramebufferConfig, VeuConfig}};
//!
//! # fn main() -> Result<(), shvideo::Error> {
//! let fb = Framebuffer::open(&FramebufferConfig::default())?;
//! let mut veu = Veu::open(&VeuConfig::default())?;
//!
//! let geometry = fb.geometry();
//! veu.configure(&VeuSetup::fullscreen(720, 480, geometry))?;
//!
//! let base = veu.mem_address();
//! veu.blit(base, base + 720 * 480)?;
//! veu.wait_irq()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! [`Veu`] and [`Framebuffer`] are `Send` but not `Sync`. Register writes of
//! one configure/blit cycle must not interleave with another, so a single
//! owner (or an external lock) must serialise all access to one VEU.
//! [`IrqWaker`] is the exception: it is `Send + Sync` and cancels a blocked
//! [`Veu::wait_irq`] from any thread without touching the owner.

mod error;
mod mmap;
mod mmio;
mod scale;
mod uio;
mod veu;

pub mod config;
pub mod framebuffer;

pub use error::{Error, Result};
pub use framebuffer::{Framebuffer, FramebufferGeometry};
pub use mmio::Mmio;
pub use scale::{ScaleParameters, compute_scale};
pub use uio::{IrqWaker, UioDevice, map::UioMap};
pub use veu::{MAX_EXTENT, MAX_VISIBLE_EXTENT, Veu, VeuPlan, VeuSetup, VeuState, regs};
