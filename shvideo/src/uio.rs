// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Userspace I/O device discovery and interrupt signalling.
//!
//! A UIO driver publishes each instance as `/sys/class/uio/uio{N}` with a
//! `name` file and one `maps/map{M}` directory per memory region. The
//! matching `/dev/uio{N}` node is the mmap target for those regions and
//! carries the interrupt protocol: writing a non-zero 32-bit value re-arms
//! the interrupt, reading a 32-bit value blocks until one has fired.
//!
//! A wait can be cut short from another thread through an [`IrqWaker`], a
//! self-pipe polled alongside the device node.

pub mod map;

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, trace, warn};

use crate::config::UioConfig;
use crate::{Error, Result, UioMap};

/// An open UIO instance.
///
/// Owns the `/dev/uio{N}` descriptor; it is closed when the device is
/// dropped. Regions mapped from it ([`UioMap`]) remain valid on their own.
#[derive(Debug)]
pub struct UioDevice {
    name: String,
    index: u32,
    sysfs_path: PathBuf,
    node_path: PathBuf,
    file: File,
    waker: IrqWaker,
}

impl UioDevice {
    /// Finds the UIO instance whose name starts with `name` and opens it.
    ///
    /// Instances are scanned in ascending `N` order, and only those present
    /// under the class directory, so the scan always terminates.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceNotFound`] if no instance matches
    /// - [`Error::OpenFailed`] if the matching device node cannot be opened
    pub fn locate(name: &str, config: &UioConfig) -> Result<Self> {
        let instances = list_instances(&config.class_dir);
        debug!(
            "scanning {} UIO instances under {} for \"{}\"",
            instances.len(),
            config.class_dir.display(),
            name
        );

        for index in instances {
            let sysfs_path = config.class_dir.join(format!("uio{index}"));
            let published = match read_line(&sysfs_path.join("name")) {
                Ok(line) => line,
                Err(err) => {
                    warn!("skipping {}: {}", sysfs_path.display(), err);
                    continue;
                }
            };
            if !published.starts_with(name) {
                trace!("uio{} is \"{}\"", index, published);
                continue;
            }

            let node_path = config.dev_dir.join(format!("uio{index}"));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(OFlag::O_SYNC.bits())
                .open(&node_path)
                .map_err(|source| Error::OpenFailed {
                    path: node_path.clone(),
                    source,
                })?;

            debug!(
                "found \"{}\" at {} ({})",
                published,
                sysfs_path.display(),
                node_path.display()
            );
            return Ok(Self {
                name: published,
                index,
                sysfs_path,
                node_path,
                file,
                waker: IrqWaker::new()?,
            });
        }

        Err(Error::DeviceNotFound(name.to_owned()))
    }

    /// The name the driver publishes, as read from sysfs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance number `N`.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The instance's sysfs directory, `{class_dir}/uio{N}`.
    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }

    /// The device node, `{dev_dir}/uio{N}`.
    pub fn node_path(&self) -> &Path {
        &self.node_path
    }

    /// Maps region `index` of this device. See [`UioMap`].
    pub fn map(&self, index: usize) -> Result<UioMap> {
        UioMap::new(self, index)
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Re-arms interrupt delivery in the UIO driver.
    pub fn enable_irq(&self) -> Result<()> {
        (&self.file).write_all(&1u32.to_ne_bytes())?;
        Ok(())
    }

    /// A handle that cancels [`Self::wait_irq`] from another thread.
    pub fn irq_waker(&self) -> IrqWaker {
        self.waker.clone()
    }

    /// Waits for the next interrupt and returns the driver's event count.
    ///
    /// With a timeout, expiry returns [`Error::Timeout`] without consuming
    /// anything; without one the wait lasts until the hardware signals. A
    /// pending [`IrqWaker::wake`] returns [`Error::Cancelled`] in either case.
    pub fn wait_irq(&self, timeout: Option<Duration>) -> Result<u32> {
        let poll_timeout = match timeout {
            Some(timeout) => i32::try_from(timeout.as_millis())
                .ok()
                .and_then(|ms| PollTimeout::try_from(ms).ok())
                .unwrap_or(PollTimeout::MAX),
            None => PollTimeout::NONE,
        };

        loop {
            let mut fds = [
                PollFd::new(self.file.as_fd(), PollFlags::POLLIN),
                PollFd::new(self.waker.as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, poll_timeout) {
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(std::io::Error::from(err).into()),
                Ok(_) => {}
            }

            if readable(&fds[1]) {
                debug!("interrupt wait on {} cancelled", self.node_path.display());
                return Err(Error::Cancelled);
            }
            if readable(&fds[0]) {
                break;
            }
            if let Some(timeout) = timeout {
                return Err(Error::Timeout(timeout));
            }
        }

        let mut count = [0u8; 4];
        (&self.file).read_exact(&mut count)?;
        Ok(u32::from_ne_bytes(count))
    }
}

fn readable(fd: &PollFd<'_>) -> bool {
    fd.revents()
        .is_some_and(|events| events.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP))
}

/// Cancels [`UioDevice::wait_irq`] from another thread.
///
/// Clones share one self-pipe. A wake stays pending until [`Self::clear`],
/// so a wait that starts after [`Self::wake`] returns at once.
#[derive(Debug, Clone)]
pub struct IrqWaker {
    pipe: Arc<WakePipe>,
}

#[derive(Debug)]
struct WakePipe {
    read: File,
    write: File,
}

impl IrqWaker {
    fn new() -> Result<Self> {
        let (read, write) = nix::unistd::pipe().map_err(std::io::Error::from)?;
        for fd in [&read, &write] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
                .map_err(std::io::Error::from)?;
        }
        Ok(Self {
            pipe: Arc::new(WakePipe {
                read: File::from(read),
                write: File::from(write),
            }),
        })
    }

    /// Makes current and future waits return [`Error::Cancelled`].
    pub fn wake(&self) {
        match (&self.pipe.write).write(&[1]) {
            Ok(_) => {}
            // a full pipe is already pending
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => warn!("irq wake failed: {}", err),
        }
    }

    /// Drops pending wakes so waits block again.
    pub fn clear(&self) {
        let mut buf = [0u8; 64];
        loop {
            match (&self.pipe.read).read(&mut buf) {
                Ok(n) if n == buf.len() => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                _ => break,
            }
        }
    }

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.pipe.read.as_fd()
    }
}

/// Instance numbers present under `class_dir`, ascending.
fn list_instances(class_dir: &Path) -> Vec<u32> {
    let entries = match std::fs::read_dir(class_dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot list {}: {}", class_dir.display(), err);
            return Vec::new();
        }
    };

    let mut instances: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("uio"))
                .and_then(|number| number.parse().ok())
        })
        .collect();
    instances.sort_unstable();
    instances
}

/// Reads the first line of a sysfs attribute, without the line terminator.
pub(crate) fn read_line(path: &Path) -> std::io::Result<String> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().next().unwrap_or_default().trim_end().to_owned())
}

/// Parses a sysfs number the way `strtoul(text, NULL, 0)` does:
/// `0x` prefix for hex, a leading `0` for octal, decimal otherwise.
pub(crate) fn parse_ulong(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}
