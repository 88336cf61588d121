// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for VEU, UIO and framebuffer operations.
//!
//! Every failure is terminal for the operation that detected it and is
//! returned unchanged to the caller; nothing in this crate retries.

use std::path::PathBuf;
use std::time::Duration;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while discovering, mapping or driving the hardware.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No UIO instance publishes the requested name.
    #[error("UIO device \"{0}\" not found")]
    DeviceNotFound(String),

    /// A device node could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A memory region could not be described (sysfs) or mapped (mmap).
    #[error("Failed to map region {index} of {device}: {reason}")]
    MapFailed {
        device: String,
        index: usize,
        reason: String,
    },

    /// A device control request was rejected.
    #[error("ioctl {request} failed: {source}")]
    IoctlFailed {
        request: &'static str,
        #[source]
        source: nix::Error,
    },

    /// The handle does not belong to the accelerator it is being used as.
    #[error("Device mismatch: expected \"{expected}\", found \"{found}\"")]
    DeviceMismatch { expected: String, found: String },

    /// The requested source/destination geometry cannot be programmed.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// No interrupt arrived within the configured wait.
    #[error("Timed out after {0:?} waiting for interrupt")]
    Timeout(Duration),

    /// The interrupt wait was interrupted through an [`crate::IrqWaker`].
    #[error("Interrupt wait cancelled")]
    Cancelled,

    /// The interrupt read/write protocol on the device node failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn map_failed(device: &str, index: usize, reason: impl ToString) -> Self {
        Error::MapFailed {
            device: device.to_owned(),
            index,
            reason: reason.to_string(),
        }
    }
}
