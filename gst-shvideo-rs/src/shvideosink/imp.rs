//! shvideosink implementation
//!
//! - `start()` opens the framebuffer (clearing it) and the VEU
//! - `set_caps()` sizes the output and programs the VEU for the frame format
//! - `show_frame()` copies the frame into VEU memory, blits and waits; it
//!   serves both preroll and render
//! - `unlock()` cancels a blocked interrupt wait, `unlock_stop()` re-arms it
//! - `stop()` clears the framebuffer and releases both devices

// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gst_base::prelude::BaseSinkExt;
use gst_base::subclass::prelude::*;
use gst_video::subclass::prelude::*;
use gstreamer as gst;
use gstreamer_base as gst_base;
use gstreamer_video as gst_video;

use shvideo::{Framebuffer, IrqWaker, Veu};
use tracing::{trace, warn};

use std::sync::LazyLock;
use std::sync::Mutex;

use crate::shvideosink;
use crate::shvideosink::render_video;
use crate::shvideosink::state::{
    Context, DEFAULT_HEIGHT, DEFAULT_IRQ_TIMEOUT_MS, DEFAULT_WIDTH, DEFAULT_X, DEFAULT_Y,
    DEFAULT_ZOOM, Settings, State, Zoom, init_state_with_video,
};

/// Set GST_DEBUG=shvideosink:5 for per-frame logs.
pub(crate) static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "shvideosink",
        gst::DebugColorFlags::empty(),
        Some("SH Mobile VEU video sink"),
    )
});

/// Interrupt wait cancellation for flushing and stopping.
///
/// `show_frame` blocks in the VEU interrupt wait while holding the context
/// lock, so `unlock` reaches it through the waker alone.
struct IrqWait {
    /// Waker of the open VEU, if started
    waker: Option<IrqWaker>,

    /// True between unlock() and unlock_stop()
    flushing: bool,
}

impl Default for IrqWait {
    fn default() -> IrqWait {
        IrqWait {
            waker: None,
            flushing: true, // until start() runs unlock_stop()
        }
    }
}

#[derive(Default)]
pub struct ShVideoSink {
    settings: Mutex<Settings>,
    context: Mutex<Context>,
    irq_wait: Mutex<IrqWait>,
}

impl ShVideoSink {
    fn changed_uint(&self, pspec: &glib::ParamSpec, value: &glib::Value, old: u32) -> u32 {
        match value.get::<u32>() {
            Ok(new) => {
                gst::info!(
                    CAT,
                    imp = self,
                    "Changing {} from {} to {}",
                    pspec.name(),
                    old,
                    new
                );
                new
            }
            Err(_) => {
                gst::error!(CAT, imp = self, "Invalid type for {} property", pspec.name());
                old
            }
        }
    }
}

#[glib::object_subclass]
impl ObjectSubclass for ShVideoSink {
    const NAME: &'static str = "GstRsShVideoSink";
    type Type = shvideosink::ShVideoSink;
    type ParentType = gst_video::VideoSink;
}

impl ObjectImpl for ShVideoSink {
    fn properties() -> &'static [glib::ParamSpec] {
        static PROPERTIES: LazyLock<Vec<glib::ParamSpec>> = LazyLock::new(|| {
            vec![
                glib::ParamSpecUInt::builder("width")
                    .nick("Width")
                    .blurb("On-screen width, 0 follows zoom")
                    .default_value(DEFAULT_WIDTH)
                    .maximum(shvideo::MAX_EXTENT)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecUInt::builder("height")
                    .nick("Height")
                    .blurb("On-screen height, 0 follows zoom")
                    .default_value(DEFAULT_HEIGHT)
                    .maximum(shvideo::MAX_EXTENT)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecUInt::builder("x")
                    .nick("X")
                    .blurb("Horizontal position, rounded down to a multiple of 4")
                    .default_value(DEFAULT_X)
                    .maximum(shvideo::MAX_VISIBLE_EXTENT)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecUInt::builder("y")
                    .nick("Y")
                    .blurb("Vertical position")
                    .default_value(DEFAULT_Y)
                    .maximum(shvideo::MAX_VISIBLE_EXTENT)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecString::builder("zoom")
                    .nick("Zoom")
                    .blurb("Output size when width/height are 0: orig, full, double or half")
                    .default_value(DEFAULT_ZOOM.as_str())
                    .mutable_ready()
                    .build(),
                glib::ParamSpecString::builder("device")
                    .nick("Device")
                    .blurb("Framebuffer device")
                    .default_value(shvideo::config::DEFAULT_FB_DEVICE)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecString::builder("uio-name")
                    .nick("UIO name")
                    .blurb("Name the VEU is registered under with UIO")
                    .default_value(shvideo::config::DEFAULT_VEU_NAME)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecUInt::builder("irq-timeout")
                    .nick("IRQ timeout")
                    .blurb("Milliseconds to wait for the VEU to finish a frame, 0 waits forever")
                    .default_value(DEFAULT_IRQ_TIMEOUT_MS)
                    .mutable_ready()
                    .build(),
            ]
        });

        PROPERTIES.as_ref()
    }

    fn constructed(&self) {
        #[cfg(feature = "tracing")]
        {
            use tracing_subscriber::EnvFilter;
            use tracing_subscriber::filter::LevelFilter;
            use tracing_subscriber::util::SubscriberInitExt;

            let _ = tracing_subscriber::fmt()
                .compact()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(false)
                .with_env_filter(
                    EnvFilter::builder()
                        .with_default_directive(LevelFilter::INFO.into())
                        .from_env_lossy(),
                )
                .finish()
                .try_init();
        }

        self.parent_constructed();

        self.obj().set_sync(true);
    }

    fn set_property(&self, _id: usize, value: &glib::Value, pspec: &glib::ParamSpec) {
        let Ok(mut settings) = self.settings.lock() else {
            gst::error!(
                CAT,
                imp = self,
                "Settings mutex poisoned, property change ignored"
            );
            return;
        };

        match pspec.name() {
            "width" => settings.width = self.changed_uint(pspec, value, settings.width),
            "height" => settings.height = self.changed_uint(pspec, value, settings.height),
            "x" => settings.x = self.changed_uint(pspec, value, settings.x),
            "y" => settings.y = self.changed_uint(pspec, value, settings.y),
            "irq-timeout" => {
                settings.irq_timeout_ms = self.changed_uint(pspec, value, settings.irq_timeout_ms)
            }
            "zoom" => match value.get::<String>().map(|s| s.parse::<Zoom>()) {
                Ok(Ok(zoom)) => {
                    gst::info!(
                        CAT,
                        imp = self,
                        "Changing zoom from {} to {}",
                        settings.zoom,
                        zoom
                    );
                    settings.zoom = zoom;
                }
                Ok(Err(e)) => gst::error!(CAT, imp = self, "{}", e),
                Err(_) => gst::error!(CAT, imp = self, "Invalid type for zoom property"),
            },
            "device" => {
                if let Ok(device) = value.get::<String>() {
                    gst::info!(
                        CAT,
                        imp = self,
                        "Changing device from {} to {}",
                        settings.device,
                        device
                    );
                    settings.device = device;
                } else {
                    gst::error!(CAT, imp = self, "Invalid type for device property");
                }
            }
            "uio-name" => {
                if let Ok(name) = value.get::<String>() {
                    gst::info!(
                        CAT,
                        imp = self,
                        "Changing uio-name from {} to {}",
                        settings.uio_name,
                        name
                    );
                    settings.uio_name = name;
                } else {
                    gst::error!(CAT, imp = self, "Invalid type for uio-name property");
                }
            }
            other => {
                gst::error!(CAT, imp = self, "Unknown property '{}'", other);
            }
        }
    }

    fn property(&self, _id: usize, pspec: &glib::ParamSpec) -> glib::Value {
        let Ok(settings) = self.settings.lock() else {
            gst::error!(CAT, imp = self, "Settings mutex poisoned");
            return glib::Value::from(&"");
        };

        match pspec.name() {
            "width" => settings.width.to_value(),
            "height" => settings.height.to_value(),
            "x" => settings.x.to_value(),
            "y" => settings.y.to_value(),
            "zoom" => settings.zoom.as_str().to_value(),
            "device" => settings.device.to_value(),
            "uio-name" => settings.uio_name.to_value(),
            "irq-timeout" => settings.irq_timeout_ms.to_value(),
            _ => {
                gst::error!(CAT, imp = self, "Unknown property {}", pspec.name());
                glib::Value::from(&"")
            }
        }
    }
}

impl GstObjectImpl for ShVideoSink {}

impl ElementImpl for ShVideoSink {
    fn metadata() -> Option<&'static gst::subclass::ElementMetadata> {
        static ELEMENT_METADATA: LazyLock<gst::subclass::ElementMetadata> = LazyLock::new(|| {
            gst::subclass::ElementMetadata::new(
                "SH Mobile Video Sink",
                "Sink/Video",
                "Renders NV12 video to the framebuffer through the SuperH VEU",
                "Contributors to the SH Mobile Video project",
            )
        });

        Some(&*ELEMENT_METADATA)
    }

    /// NV12 only, within the VEU's input limits.
    fn pad_templates() -> &'static [gst::PadTemplate] {
        static PAD_TEMPLATES: LazyLock<Result<Vec<gst::PadTemplate>, glib::BoolError>> =
            LazyLock::new(|| {
                let caps = gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Nv12)
                    .width_range(16..=2560)
                    .height_range(16..=1920)
                    .framerate_range(gst::Fraction::new(1, 1)..=gst::Fraction::new(30, 1))
                    .build();

                let sink_pad_template = gst::PadTemplate::new(
                    "sink",
                    gst::PadDirection::Sink,
                    gst::PadPresence::Always,
                    &caps,
                )?;

                Ok(vec![sink_pad_template])
            });

        match PAD_TEMPLATES.as_ref() {
            Ok(templates) => templates,
            Err(err) => {
                trace!("Failed to create pad templates: {:?}", err);
                &[]
            }
        }
    }
}

impl BaseSinkImpl for ShVideoSink {
    fn start(&self) -> Result<(), gst::ErrorMessage> {
        let mut context = self.context.lock().map_err(|e| {
            gst::error_msg!(gst::CoreError::Failed, ["Failed to get state mutex: {}", e])
        })?;

        let settings = self
            .settings
            .lock()
            .map_err(|e| {
                gst::error_msg!(
                    gst::CoreError::Failed,
                    ["Failed to get settings mutex: {}", e]
                )
            })?
            .clone();

        let framebuffer = Framebuffer::open(&settings.framebuffer_config()).map_err(|e| {
            warn!("Failed to open framebuffer {}: {}", settings.device, e);
            gst::error_msg!(
                gst::ResourceError::OpenReadWrite,
                ["Failed to open framebuffer {}: {}", settings.device, e]
            )
        })?;

        let veu = Veu::open(&settings.veu_config()).map_err(|e| {
            warn!("Failed to open VEU {}: {}", settings.uio_name, e);
            gst::error_msg!(
                gst::ResourceError::OpenReadWrite,
                ["Failed to open VEU {}: {}", settings.uio_name, e]
            )
        })?;

        let screen = framebuffer.geometry();
        gst::info!(
            CAT,
            imp = self,
            "Started on {}x{} {}bpp screen, {} bytes of VEU memory",
            screen.width,
            screen.height,
            screen.bits_per_pixel,
            veu.mem().len()
        );

        let waker = veu.irq_waker();
        context.state = Some(State {
            framebuffer,
            veu,
            video: None,
        });

        self.irq_wait
            .lock()
            .map_err(|e| {
                gst::error_msg!(gst::CoreError::Failed, ["Failed to lock irq wait: {}", e])
            })?
            .waker = Some(waker);
        self.unlock_stop()?;

        Ok(())
    }

    fn stop(&self) -> Result<(), gst::ErrorMessage> {
        // Cancel a frame still waiting on the VEU before taking its lock
        self.unlock()?;

        let mut context = self.context.lock().map_err(|e| {
            gst::error_msg!(
                gst::CoreError::Failed,
                ["Failed to get context mutex: {}", e]
            )
        })?;

        if let Some(mut state) = context.state.take() {
            state.framebuffer.clear();
        }

        if let Ok(mut irq_wait) = self.irq_wait.lock() {
            irq_wait.waker = None;
        }

        gst::info!(CAT, imp = self, "Stopped");
        Ok(())
    }

    /// Cancels a blocked interrupt wait and sets the flushing flag.
    fn unlock(&self) -> Result<(), gst::ErrorMessage> {
        gst::debug!(CAT, imp = self, "Unlocking");

        let mut irq_wait = self.irq_wait.lock().map_err(|e| {
            gst::error_msg!(gst::CoreError::Failed, ["Failed to lock irq wait: {}", e])
        })?;

        irq_wait.flushing = true;
        if let Some(waker) = &irq_wait.waker {
            waker.wake();
        }

        Ok(())
    }

    /// Clears the flushing flag and any wake still pending.
    fn unlock_stop(&self) -> Result<(), gst::ErrorMessage> {
        gst::debug!(CAT, imp = self, "Unlock stop");

        let mut irq_wait = self.irq_wait.lock().map_err(|e| {
            gst::error_msg!(gst::CoreError::Failed, ["Failed to lock irq wait: {}", e])
        })?;

        irq_wait.flushing = false;
        if let Some(waker) = &irq_wait.waker {
            waker.clear();
        }

        Ok(())
    }

    fn set_caps(&self, caps: &gst::Caps) -> Result<(), gst::LoggableError> {
        let mut context = self
            .context
            .lock()
            .map_err(|e| gst::loggable_error!(CAT, "Failed to lock context mutex: {}", e))?;
        let state = context
            .state
            .as_mut()
            .ok_or(gst::loggable_error!(CAT, "Failed to get state"))?;

        let settings = self
            .settings
            .lock()
            .map_err(|e| gst::loggable_error!(CAT, "Failed to lock settings mutex: {}", e))?;

        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| gst::loggable_error!(CAT, "Invalid video caps: {}", e))?;
        if info.format() != gst_video::VideoFormat::Nv12 {
            return Err(gst::loggable_error!(
                CAT,
                "Unsupported format {}",
                info.format()
            ));
        }

        init_state_with_video(state, &settings, info)
    }
}

impl VideoSinkImpl for ShVideoSink {
    /// Called by the base class for the preroll buffer and for every
    /// rendered one.
    fn show_frame(&self, buffer: &gst::Buffer) -> Result<gst::FlowSuccess, gst::FlowError> {
        if self.irq_wait.lock().map_err(|_| gst::FlowError::Error)?.flushing {
            gst::debug!(CAT, imp = self, "Flushing, dropping frame");
            return Err(gst::FlowError::Flushing);
        }

        let mut context = self.context.lock().map_err(|_| gst::FlowError::Error)?;
        let state = context.state.as_mut().ok_or(gst::FlowError::Flushing)?;

        render_video::video(self, state, buffer)
    }
}
