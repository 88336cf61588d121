// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Draws NV12 color bars through the VEU onto the framebuffer.
//!
//! ```bash
//! veu_blit --width 320 --height 240 --out-width 640 --out-height 480 -x 80 -y 0
//! ```

mod common;

use std::time::{Duration, Instant};

use clap::Parser;
use shvideo::config::{FramebufferConfig, VeuConfig};
use shvideo::{Error, Framebuffer, Veu, VeuSetup};
use tracing::info;

/// BT.601 studio-range (Y, Cb, Cr) for white, yellow, cyan, green,
/// magenta, red, blue and black.
const BARS: [(u8, u8, u8); 8] = [
    (235, 128, 128),
    (210, 16, 146),
    (170, 166, 16),
    (145, 54, 34),
    (106, 202, 222),
    (81, 90, 240),
    (41, 240, 110),
    (16, 128, 128),
];

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source frame width
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Source frame height
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// On-screen width (defaults to the source width)
    #[arg(long)]
    out_width: Option<u32>,

    /// On-screen height (defaults to the source height)
    #[arg(long)]
    out_height: Option<u32>,

    /// Horizontal position on screen
    #[arg(short, default_value_t = 0)]
    x: u32,

    /// Vertical position on screen
    #[arg(short, default_value_t = 0)]
    y: u32,

    /// Framebuffer device
    #[arg(long, default_value = shvideo::config::DEFAULT_FB_DEVICE)]
    fb_device: String,

    /// UIO name of the VEU
    #[arg(long, default_value = shvideo::config::DEFAULT_VEU_NAME)]
    uio_name: String,

    /// Interrupt timeout in milliseconds, 0 waits forever
    #[arg(long, default_value_t = 1000)]
    irq_timeout_ms: u64,
}

fn main() -> Result<(), Error> {
    common::setup_logging();
    let args = Args::parse();

    let fb = Framebuffer::open(&FramebufferConfig::default().with_device(&args.fb_device))?;
    let timeout = (args.irq_timeout_ms > 0).then(|| Duration::from_millis(args.irq_timeout_ms));
    let mut veu = Veu::open(
        &VeuConfig::default()
            .with_device_name(args.uio_name.as_str())
            .with_irq_timeout(timeout),
    )?;

    let setup = VeuSetup::at(
        args.width,
        args.height,
        args.out_width.unwrap_or(args.width),
        args.out_height.unwrap_or(args.height),
        args.x,
        args.y,
        fb.geometry(),
    );
    let plan = *veu.configure(&setup)?;

    let chroma_offset = plan.src_stride * args.height;
    draw_bars(
        veu.mem_mut().as_mut_slice(),
        args.width as usize,
        args.height as usize,
        plan.src_stride as usize,
    )?;

    let base = veu.mem_address();
    let started = Instant::now();
    veu.blit(base, base + chroma_offset)?;
    veu.wait_irq()?;

    info!(
        "{}x{} -> {}x{} visible at {}:{} in {:?}",
        args.width,
        args.height,
        plan.cropped_width,
        plan.cropped_height,
        plan.pos_x,
        plan.pos_y,
        started.elapsed()
    );
    Ok(())
}

/// Renders vertical color bars as NV12 with the given luma stride; the
/// chroma plane follows `stride * height` luma bytes.
fn draw_bars(mem: &mut [u8], width: usize, height: usize, stride: usize) -> Result<(), Error> {
    let needed = stride * height * 3 / 2;
    if needed > mem.len() {
        return Err(Error::InvalidGeometry(format!(
            "{width}x{height} frame needs {needed} bytes, VEU memory has {}",
            mem.len()
        )));
    }

    let bar = |x: usize| BARS[x * BARS.len() / width];
    let (luma, chroma) = mem[..needed].split_at_mut(stride * height);

    for row in luma.chunks_exact_mut(stride) {
        for (x, pixel) in row[..width].iter_mut().enumerate() {
            *pixel = bar(x).0;
        }
    }
    for row in chroma.chunks_exact_mut(stride) {
        for (pair, cbcr) in row[..width & !1].chunks_exact_mut(2).enumerate() {
            let (_, cb, cr) = bar(pair * 2);
            cbcr[0] = cb;
            cbcr[1] = cr;
        }
    }
    Ok(())
}
