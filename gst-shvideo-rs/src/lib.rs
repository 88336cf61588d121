//! GStreamer plugin for the SH Mobile video engine
//!
//! Provides `shvideosink`, a sink that hands NV12 frames to the VEU (Video
//! Engine Unit) of SuperH SoCs. The VEU scales the frame, converts it to
//! RGB and writes it straight into the Linux framebuffer, so no CPU color
//! conversion takes place.
//!
//! ## Example Pipeline
//! ```bash
//! gst-launch-1.0 filesrc location=clip.yuv ! \
//!     rawvideoparse format=nv12 width=320 height=240 ! \
//!     shvideosink zoom=full
//! ```

// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::non_send_fields_in_send_ty, unused_doc_comments)]

use gst::glib;
use gstreamer as gst;

/// VEU framebuffer sink
mod shvideosink;

fn plugin_init(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    shvideosink::register(plugin)?;
    Ok(())
}

gst::plugin_define!(
    shvideo,
    env!("CARGO_PKG_DESCRIPTION"),
    plugin_init,
    concat!(env!("CARGO_PKG_VERSION"), "-", env!("COMMIT_ID")),
    "Apache-2.0",
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_REPOSITORY"),
    env!("BUILD_REL_DATE")
);
