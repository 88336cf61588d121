// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration for device discovery and interrupt handling.
//!
//! The defaults describe a stock SuperH board: the VEU registered with UIO
//! as `VEU2H` and the display on `/dev/fb0`. Paths are overridable so the
//! locator can be pointed at a different sysfs tree.

use std::path::PathBuf;
use std::time::Duration;

/// UIO name of the VEU on SH7722/SH7723 class parts.
pub const DEFAULT_VEU_NAME: &str = "VEU2H";

/// Framebuffer device the VEU renders into.
pub const DEFAULT_FB_DEVICE: &str = "/dev/fb0";

/// Sysfs class directory listing UIO instances.
pub const DEFAULT_UIO_CLASS_DIR: &str = "/sys/class/uio";

/// Directory containing the `uio{N}` device nodes.
pub const DEFAULT_DEV_DIR: &str = "/dev";

/// Upper bound for a single VEU operation to signal completion.
pub const DEFAULT_IRQ_TIMEOUT: Duration = Duration::from_secs(1);

/// Where UIO instances are enumerated and opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UioConfig {
    /// Directory holding `uio{N}/name` and `uio{N}/maps/map{M}/{addr,size}`
    pub class_dir: PathBuf,

    /// Directory holding the `uio{N}` character devices
    pub dev_dir: PathBuf,
}

impl Default for UioConfig {
    fn default() -> Self {
        UioConfig {
            class_dir: PathBuf::from(DEFAULT_UIO_CLASS_DIR),
            dev_dir: PathBuf::from(DEFAULT_DEV_DIR),
        }
    }
}

impl UioConfig {
    pub fn with_class_dir(mut self, class_dir: impl Into<PathBuf>) -> Self {
        self.class_dir = class_dir.into();
        self
    }

    pub fn with_dev_dir(mut self, dev_dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dev_dir.into();
        self
    }
}

/// VEU controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VeuConfig {
    /// Name the VEU publishes through UIO
    pub device_name: String,

    /// Discovery paths
    pub uio: UioConfig,

    /// How long [`crate::Veu::wait_irq`] waits; `None` blocks until the
    /// hardware answers.
    pub irq_timeout: Option<Duration>,
}

impl Default for VeuConfig {
    fn default() -> Self {
        VeuConfig {
            device_name: DEFAULT_VEU_NAME.to_owned(),
            uio: UioConfig::default(),
            irq_timeout: Some(DEFAULT_IRQ_TIMEOUT),
        }
    }
}

impl VeuConfig {
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_uio(mut self, uio: UioConfig) -> Self {
        self.uio = uio;
        self
    }

    pub fn with_irq_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.irq_timeout = timeout;
        self
    }
}

/// Framebuffer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferConfig {
    /// Framebuffer device node
    pub device: PathBuf,
}

impl Default for FramebufferConfig {
    fn default() -> Self {
        FramebufferConfig {
            device: PathBuf::from(DEFAULT_FB_DEVICE),
        }
    }
}

impl FramebufferConfig {
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_board() {
        let veu = VeuConfig::default();
        assert_eq!(veu.device_name, "VEU2H");
        assert_eq!(veu.uio.class_dir, PathBuf::from("/sys/class/uio"));
        assert_eq!(veu.uio.dev_dir, PathBuf::from("/dev"));
        assert_eq!(veu.irq_timeout, Some(Duration::from_secs(1)));
        assert_eq!(
            FramebufferConfig::default().device,
            PathBuf::from("/dev/fb0")
        );
    }

    #[test]
    fn builders_override_fields() {
        let veu = VeuConfig::default()
            .with_device_name("VEU3F")
            .with_uio(UioConfig::default().with_class_dir("/tmp/uio").with_dev_dir("/tmp/dev"))
            .with_irq_timeout(None);
        assert_eq!(veu.device_name, "VEU3F");
        assert_eq!(veu.uio.class_dir, PathBuf::from("/tmp/uio"));
        assert_eq!(veu.uio.dev_dir, PathBuf::from("/tmp/dev"));
        assert_eq!(veu.irq_timeout, None);
    }
}
