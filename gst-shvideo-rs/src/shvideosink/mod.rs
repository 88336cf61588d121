//! SH Mobile video sink
//!
//! `shvideosink` renders NV12 frames onto the framebuffer through the VEU.
//! Each buffer is copied into the VEU's scratch memory, converted and
//! scaled by the hardware, and the element waits for the completion
//! interrupt before accepting the next one. The preroll frame is shown the
//! same way, so a paused pipeline already has its first picture on screen.
//!
//! ## Properties (set before PAUSED)
//! - `width`, `height`: on-screen size, 0 lets `zoom` decide
//! - `x`, `y`: on-screen position; `x` is rounded down to a multiple of 4
//! - `zoom`: `orig`, `full`, `double` or `half`
//! - `device`: framebuffer node
//! - `uio-name`: UIO name of the VEU
//! - `irq-timeout`: completion wait in milliseconds, 0 waits forever
//!
//! ## Example Pipeline
//! ```bash
//! gst-launch-1.0 videotestsrc ! video/x-raw,format=NV12,width=320,height=240 ! \
//!     shvideosink x=160 y=120
//! ```

// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_base as gst_base;
use gstreamer_video as gst_video;

mod imp;

/// Plane copies into VEU memory and the blit itself
mod render_video;


/// Settings, zoom modes and negotiated state
mod state;

glib::wrapper! {
    pub struct ShVideoSink(ObjectSubclass<imp::ShVideoSink>) @extends gst_video::VideoSink, gst_base::BaseSink, gst::Element, gst::Object;
}

/// Registers `shvideosink` with rank NONE; it is never autoplugged.
pub fn register(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    gst::Element::register(
        Some(plugin),
        "shvideosink",
        gst::Rank::NONE,
        ShVideoSink::static_type(),
    )
}
