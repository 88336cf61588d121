//! Settings and runtime state for shvideosink
//!
//! `Settings` mirrors the element properties. `State` exists between
//! `start()` and `stop()` and owns the opened framebuffer and VEU; its
//! `video` part is filled in by `set_caps()` once the frame size is known.

// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gst_video::VideoInfo;
use gstreamer as gst;
use gstreamer_video as gst_video;
use shvideo::config::{DEFAULT_FB_DEVICE, DEFAULT_VEU_NAME, FramebufferConfig, VeuConfig};
use shvideo::{Framebuffer, FramebufferGeometry, Veu, VeuSetup};
use tracing::debug;

use crate::shvideosink::imp::CAT;
use crate::shvideosink::render_video::FrameLayout;

pub(crate) const DEFAULT_WIDTH: u32 = 0;
pub(crate) const DEFAULT_HEIGHT: u32 = 0;
pub(crate) const DEFAULT_X: u32 = 0;
pub(crate) const DEFAULT_Y: u32 = 0;
pub(crate) const DEFAULT_ZOOM: Zoom = Zoom::Orig;
pub(crate) const DEFAULT_IRQ_TIMEOUT_MS: u32 = 1000;

/// How the frame is sized on screen when `width`/`height` are not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Zoom {
    /// Frame size
    Orig,
    /// Screen size
    Full,
    Double,
    Half,
}

impl Zoom {
    pub fn as_str(self) -> &'static str {
        match self {
            Zoom::Orig => "orig",
            Zoom::Full => "full",
            Zoom::Double => "double",
            Zoom::Half => "half",
        }
    }

    fn apply(self, width: u32, height: u32, screen: &FramebufferGeometry) -> (u32, u32) {
        match self {
            Zoom::Orig => (width, height),
            Zoom::Full => (screen.width, screen.height),
            Zoom::Double => (width.saturating_mul(2), height.saturating_mul(2)),
            Zoom::Half => ((width / 2).max(1), (height / 2).max(1)),
        }
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zoom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orig" => Ok(Zoom::Orig),
            "full" => Ok(Zoom::Full),
            "double" => Ok(Zoom::Double),
            "half" => Ok(Zoom::Half),
            other => Err(format!(
                "unknown zoom \"{other}\", expected orig, full, double or half"
            )),
        }
    }
}

/// Element properties.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// On-screen width, 0 follows `zoom`
    pub width: u32,
    /// On-screen height, 0 follows `zoom`
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub zoom: Zoom,
    /// Framebuffer device node
    pub device: String,
    /// UIO name of the VEU
    pub uio_name: String,
    /// Completion wait in milliseconds, 0 waits forever
    pub irq_timeout_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            x: DEFAULT_X,
            y: DEFAULT_Y,
            zoom: DEFAULT_ZOOM,
            device: DEFAULT_FB_DEVICE.to_owned(),
            uio_name: DEFAULT_VEU_NAME.to_owned(),
            irq_timeout_ms: DEFAULT_IRQ_TIMEOUT_MS,
        }
    }
}

impl Settings {
    pub fn framebuffer_config(&self) -> FramebufferConfig {
        FramebufferConfig::default().with_device(&self.device)
    }

    pub fn veu_config(&self) -> VeuConfig {
        let timeout =
            (self.irq_timeout_ms > 0).then(|| Duration::from_millis(u64::from(self.irq_timeout_ms)));
        VeuConfig::default()
            .with_device_name(self.uio_name.as_str())
            .with_irq_timeout(timeout)
    }

    /// On-screen size for a `width`x`height` frame. Explicit `width` and
    /// `height` win per axis; the other axis follows `zoom`.
    pub fn output_size(&self, width: u32, height: u32, screen: &FramebufferGeometry) -> (u32, u32) {
        let (zoomed_width, zoomed_height) = self.zoom.apply(width, height, screen);
        (
            if self.width != 0 { self.width } else { zoomed_width },
            if self.height != 0 { self.height } else { zoomed_height },
        )
    }
}

/// Hardware owned between `start()` and `stop()`.
pub(crate) struct State {
    /// Display the VEU renders into
    pub framebuffer: Framebuffer,

    pub veu: Veu,

    /// Present once caps have been negotiated and the VEU configured
    pub video: Option<VideoState>,
}

/// Negotiated format.
pub(crate) struct VideoState {
    pub info: VideoInfo,

    /// Where the planes go in VEU memory
    pub layout: FrameLayout,
}

/// The element's state, `None` while stopped.
#[derive(Default)]
pub(crate) struct Context {
    pub state: Option<State>,
}

/// Configures the VEU for frames described by `info` and records the
/// memory layout the renderer must follow.
pub(crate) fn init_state_with_video(
    state: &mut State,
    settings: &Settings,
    info: VideoInfo,
) -> Result<(), gst::LoggableError> {
    let screen = *state.framebuffer.geometry();
    let (dst_width, dst_height) = settings.output_size(info.width(), info.height(), &screen);

    let setup = VeuSetup::at(
        info.width(),
        info.height(),
        dst_width,
        dst_height,
        settings.x,
        settings.y,
        &screen,
    );
    let plan = *state
        .veu
        .configure(&setup)
        .map_err(|e| gst::loggable_error!(CAT, "Failed to configure VEU: {}", e))?;

    let layout = FrameLayout::new(info.width(), info.height(), plan.src_stride);
    debug!(
        "NV12 {}x{} -> {}x{} at {}:{} ({} zoom), {} bytes of VEU memory per frame",
        info.width(),
        info.height(),
        plan.cropped_width,
        plan.cropped_height,
        plan.pos_x,
        plan.pos_y,
        settings.zoom,
        layout.len()
    );

    state.video = Some(VideoState { info, layout });
    Ok(())
}
