// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for discovery, mapping and the VEU controller.
//!
//! Each test builds a throwaway sysfs tree and device directory in a temp
//! dir: `class/uio{N}/name`, `class/uio{N}/maps/map{M}/{addr,size}` and a
//! regular file `dev/uio{N}` standing in for the character device. Regular
//! files are mmap-able at page offsets and always poll readable, which is
//! enough to drive the whole register protocol without hardware.

use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shvideo::config::{FramebufferConfig, UioConfig, VeuConfig};
use shvideo::{Error, Framebuffer, UioDevice, Veu, VeuSetup, VeuState, regs};
use tempfile::TempDir;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

const REG_ADDR: u64 = 0xfe92_0000;
const MEM_ADDR: u64 = 0x0e00_0000;

fn page_size() -> usize {
    nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE)
        .unwrap()
        .unwrap() as usize
}

/// A fake UIO class directory plus device directory.
struct FakeUio {
    root: TempDir,
}

impl FakeUio {
    fn new() -> Self {
        LOG_ONCE.call_once(|| {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::builder()
                        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                        .from_env_lossy(),
                )
                .init();
        });

        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("class")).unwrap();
        std::fs::create_dir(root.path().join("dev")).unwrap();
        Self { root }
    }

    fn class_dir(&self) -> PathBuf {
        self.root.path().join("class")
    }

    fn dev_dir(&self) -> PathBuf {
        self.root.path().join("dev")
    }

    fn config(&self) -> UioConfig {
        UioConfig::default()
            .with_class_dir(self.class_dir())
            .with_dev_dir(self.dev_dir())
    }

    fn veu_config(&self) -> VeuConfig {
        VeuConfig::default()
            .with_uio(self.config())
            .with_irq_timeout(Some(Duration::from_millis(100)))
    }

    /// Adds `uio{index}` publishing `name` with the given `(addr, size)`
    /// attribute texts, and a backing device file large enough for them.
    fn add(&self, index: u32, name: &str, maps: &[(&str, &str)]) -> PathBuf {
        let dir = self.class_dir().join(format!("uio{index}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("name"), format!("{name}\n")).unwrap();

        for (map, (addr, size)) in maps.iter().enumerate() {
            let map_dir = dir.join("maps").join(format!("map{map}"));
            std::fs::create_dir_all(&map_dir).unwrap();
            std::fs::write(map_dir.join("addr"), format!("{addr}\n")).unwrap();
            std::fs::write(map_dir.join("size"), format!("{size}\n")).unwrap();
        }

        let node = self.dev_dir().join(format!("uio{index}"));
        let file = std::fs::File::create(&node).unwrap();
        file.set_len((maps.len().max(1) * page_size()) as u64).unwrap();
        node
    }

    /// Adds a VEU-shaped device: one page of registers, one page of memory.
    fn add_veu(&self, index: u32, name: &str) -> PathBuf {
        let page = format!("{:#x}", page_size());
        let reg = format!("{REG_ADDR:#x}");
        let mem = format!("{MEM_ADDR:#x}");
        self.add(index, name, &[(&reg, &page), (&mem, &page)])
    }
}

fn read_word(node: &Path, offset: usize) -> u32 {
    let bytes = std::fs::read(node).unwrap();
    u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn locate_picks_matching_instance() {
    let uio = FakeUio::new();
    uio.add(0, "OTHER", &[]);
    uio.add(1, "VEU2H", &[]);
    uio.add(2, "OTHER2", &[]);

    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();
    assert_eq!(device.name(), "VEU2H");
    assert_eq!(device.index(), 1);
    assert_eq!(device.sysfs_path(), uio.class_dir().join("uio1"));
    assert_eq!(device.node_path(), uio.dev_dir().join("uio1"));
}

#[test]
fn locate_matches_name_prefix_in_numeric_order() {
    let uio = FakeUio::new();
    uio.add(10, "VEU2H", &[]);
    uio.add(2, "VEU2H-1", &[]);

    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();
    assert_eq!(device.index(), 2);
    assert_eq!(device.name(), "VEU2H-1");
}

#[test]
fn locate_reports_missing_device() {
    let uio = FakeUio::new();
    uio.add(0, "CEU", &[]);
    uio.add(1, "VPU", &[]);

    assert!(matches!(
        UioDevice::locate("VEU2H", &uio.config()),
        Err(Error::DeviceNotFound(name)) if name == "VEU2H"
    ));

    let nowhere = UioConfig::default().with_class_dir(uio.root.path().join("absent"));
    assert!(matches!(
        UioDevice::locate("VEU2H", &nowhere),
        Err(Error::DeviceNotFound(_))
    ));
}

#[test]
fn locate_reports_unopenable_node() {
    let uio = FakeUio::new();
    let node = uio.add(0, "VEU2H", &[]);
    std::fs::remove_file(&node).unwrap();

    match UioDevice::locate("VEU2H", &uio.config()) {
        Err(Error::OpenFailed { path, .. }) => assert_eq!(path, node),
        other => panic!("expected OpenFailed, got {other:?}"),
    }
}

#[test]
fn regions_map_at_page_offsets() {
    let uio = FakeUio::new();
    let node = uio.add_veu(0, "VEU2H");

    let page = page_size();
    let mut contents = std::fs::read(&node).unwrap();
    contents[..4].copy_from_slice(b"REGS");
    contents[page..page + 4].copy_from_slice(b"MEM!");
    std::fs::write(&node, contents).unwrap();

    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();
    let regs = device.map(0).unwrap();
    let mem = device.map(1).unwrap();

    assert_eq!(regs.address(), REG_ADDR);
    assert_eq!(mem.address(), MEM_ADDR);
    assert_eq!(mem.len(), page);
    assert_eq!(&regs.as_slice()[..4], b"REGS");
    assert_eq!(&mem.as_slice()[..4], b"MEM!");
}

#[test]
fn region_attributes_accept_decimal() {
    let uio = FakeUio::new();
    let page = page_size().to_string();
    uio.add(0, "VEU2H", &[("4096", &page)]);

    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();
    let region = device.map(0).unwrap();
    assert_eq!(region.address(), 4096);
    assert_eq!(region.len(), page_size());
}

#[test]
fn bad_region_attributes_fail_to_map() {
    let uio = FakeUio::new();
    uio.add(0, "VEU2H", &[("0x1000", "lots"), ("0x2000", "0")]);
    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();

    assert!(matches!(device.map(0), Err(Error::MapFailed { index: 0, .. })));
    assert!(matches!(device.map(1), Err(Error::MapFailed { index: 1, .. })));
    assert!(matches!(device.map(2), Err(Error::MapFailed { index: 2, .. })));
}

#[test]
fn veu_open_resets_unit() {
    let uio = FakeUio::new();
    let node = uio.add_veu(0, "VEU2H");

    let veu = Veu::open(&uio.veu_config()).unwrap();
    assert_eq!(veu.state(), VeuState::Ready);
    assert_eq!(u64::from(veu.mem_address()), MEM_ADDR);
    assert_eq!(veu.mem().len(), page_size());
    drop(veu);

    assert_eq!(read_word(&node, regs::VBSRR), regs::RESET);
}

#[test]
fn veu_open_fails_without_memory_region() {
    let uio = FakeUio::new();
    let page = format!("{:#x}", page_size());
    uio.add(0, "VEU2H", &[("0xfe920000", &page)]);

    assert!(matches!(
        Veu::open(&uio.veu_config()),
        Err(Error::MapFailed { index: 1, .. })
    ));
}

#[test]
fn veu_open_propagates_discovery_failure() {
    let uio = FakeUio::new();
    uio.add_veu(0, "VPU");

    assert!(matches!(
        Veu::open(&uio.veu_config()),
        Err(Error::DeviceNotFound(_))
    ));
}

#[test]
fn veu_identity_configure() {
    let uio = FakeUio::new();
    let node = uio.add_veu(0, "VEU2H");
    let fb_base: u64 = 0x0d00_0000;

    let mut veu = Veu::open(&uio.veu_config()).unwrap();
    let setup = VeuSetup {
        src_width: 720,
        src_height: 480,
        dst_width: 720,
        dst_height: 480,
        dst_stride: 1440,
        pos_x: 0,
        pos_y: 0,
        dst_max_width: 720,
        dst_max_height: 480,
        dst_address: fb_base,
        bits_per_pixel: 16,
    };
    let plan = *veu.configure(&setup).unwrap();
    assert_eq!(veu.state(), VeuState::Configured);
    assert_eq!(plan.resize_scale(), 0);

    let regs_view = veu.registers();
    assert_eq!(regs_view.read(regs::VRFCR), 0);
    assert_eq!(regs_view.read(regs::VRFSR), 720 | (480 << 16));
    assert_eq!(regs_view.read(regs::VESWR), 720);
    assert_eq!(regs_view.read(regs::VESSR), 720 | (480 << 16));
    assert_eq!(regs_view.read(regs::VEDWR), 1440);
    assert_eq!(u64::from(regs_view.read(regs::VDAYR)), fb_base);
    assert_eq!(regs_view.read(regs::VDACR), 0);
    assert_eq!(regs_view.read(regs::VBSSR), 0);
    assert_eq!(regs_view.read(regs::VEIER), 1);
    drop(veu);

    assert_eq!(read_word(&node, regs::VCOFFR), regs::YUV_OFFSET);
    assert_eq!(read_word(&node, regs::VMCR[1][0]), 0x397f);
}

#[test]
fn veu_reconfigure_replaces_plan() {
    let uio = FakeUio::new();
    uio.add_veu(0, "VEU2H");
    let mut veu = Veu::open(&uio.veu_config()).unwrap();

    let mut setup = VeuSetup {
        src_width: 360,
        src_height: 240,
        dst_width: 720,
        dst_height: 480,
        dst_stride: 1600,
        pos_x: 0,
        pos_y: 0,
        dst_max_width: 800,
        dst_max_height: 480,
        dst_address: 0x0d00_0000,
        bits_per_pixel: 16,
    };
    veu.configure(&setup).unwrap();
    assert_eq!(veu.plan().unwrap().horizontal.repeat, 1);
    assert_eq!(veu.registers().read(regs::VRFSR), (1 << 12 | 720) | ((1 << 12 | 480) << 16));

    setup.dst_width = 360;
    setup.dst_height = 240;
    setup.pos_x = 101;
    veu.configure(&setup).unwrap();
    let plan = veu.plan().unwrap();
    assert_eq!(plan.horizontal.repeat, 0);
    assert_eq!(plan.pos_x, 100);
    assert_eq!(veu.registers().read(regs::VRFCR), 0);
    assert_eq!(veu.registers().read(regs::VDAYR), 0x0d00_0000 + 200);
}

#[test]
fn veu_blit_and_wait() {
    let uio = FakeUio::new();
    let node = uio.add_veu(0, "VEU2H");
    // Offset 4 is not a VEU register; it stands in for the driver's count.
    let marker = 0x5a5a_0004u32;
    std::fs::OpenOptions::new()
        .write(true)
        .open(&node)
        .unwrap()
        .write_all_at(&marker.to_ne_bytes(), 4)
        .unwrap();
    let mut veu = Veu::open(&uio.veu_config()).unwrap();

    let base = veu.mem_address();
    veu.mem_mut().as_mut_slice()[..4].copy_from_slice(&[16, 16, 16, 16]);
    veu.blit(base, base + 720 * 480).unwrap();

    // The re-arm write advanced the node's cursor past the first word, so
    // the count is read from offset 4 rather than the VESTR store at 0.
    assert_eq!(veu.device().wait_irq(None).unwrap(), marker);

    {
        let regs_view = veu.registers();
        assert_eq!(regs_view.read(regs::VSAYR), base);
        assert_eq!(regs_view.read(regs::VSACR), base + 720 * 480);
        assert_eq!(regs_view.read(regs::VESTR), regs::START);
    }

    veu.wait_irq().unwrap();
    assert_eq!(veu.registers().read(regs::VEVTR), regs::EVENT_CLEAR);
    drop(veu);

    assert_eq!(read_word(&node, 4), marker);
    assert_eq!(std::fs::read(&node).unwrap()[page_size()], 16);
}

#[test]
fn veu_rejects_other_device() {
    let uio = FakeUio::new();
    uio.add_veu(0, "VEU2H-B");
    let mut veu = Veu::open(&uio.veu_config()).unwrap();

    let setup = VeuSetup {
        src_width: 720,
        src_height: 480,
        dst_width: 720,
        dst_height: 480,
        dst_stride: 1440,
        pos_x: 0,
        pos_y: 0,
        dst_max_width: 720,
        dst_max_height: 480,
        dst_address: 0,
        bits_per_pixel: 16,
    };
    match veu.configure(&setup) {
        Err(Error::DeviceMismatch { expected, found }) => {
            assert_eq!(expected, "VEU2H");
            assert_eq!(found, "VEU2H-B");
        }
        other => panic!("expected DeviceMismatch, got {other:?}"),
    }
    assert!(matches!(veu.blit(0, 0), Err(Error::DeviceMismatch { .. })));
    assert_eq!(veu.state(), VeuState::Ready);
    assert_eq!(veu.registers().read(regs::VESTR), 0);
}

#[test]
fn irq_wait_times_out_then_counts() {
    let uio = FakeUio::new();
    let node = uio.add(0, "VEU2H", &[]);
    std::fs::remove_file(&node).unwrap();
    nix::unistd::mkfifo(&node, nix::sys::stat::Mode::S_IRWXU).unwrap();

    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();
    assert!(matches!(
        device.wait_irq(Some(Duration::from_millis(20))),
        Err(Error::Timeout(_))
    ));

    // Loop the re-arm value back through the pipe as an event count.
    device.enable_irq().unwrap();
    assert_eq!(device.wait_irq(Some(Duration::from_millis(20))).unwrap(), 1);
}

#[test]
fn irq_wait_is_cancelled_by_waker() {
    let uio = FakeUio::new();
    let node = uio.add(0, "VEU2H", &[]);
    std::fs::remove_file(&node).unwrap();
    nix::unistd::mkfifo(&node, nix::sys::stat::Mode::S_IRWXU).unwrap();

    let device = UioDevice::locate("VEU2H", &uio.config()).unwrap();
    let waker = device.irq_waker();
    let remote = waker.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.wake();
    });

    // No timeout: only the waker can end this wait.
    assert!(matches!(device.wait_irq(None), Err(Error::Cancelled)));
    handle.join().unwrap();

    // The wake stays pending until cleared.
    assert!(matches!(device.wait_irq(None), Err(Error::Cancelled)));
    waker.clear();
    assert!(matches!(
        device.wait_irq(Some(Duration::from_millis(20))),
        Err(Error::Timeout(_))
    ));

    device.enable_irq().unwrap();
    assert_eq!(device.wait_irq(None).unwrap(), 1);
}

#[test]
fn framebuffer_open_failures() {
    let dir = tempfile::tempdir().unwrap();

    let missing = FramebufferConfig::default().with_device(dir.path().join("fb0"));
    assert!(matches!(
        Framebuffer::open(&missing),
        Err(Error::OpenFailed { .. })
    ));

    let plain = dir.path().join("not-a-framebuffer");
    std::fs::write(&plain, [0u8; 64]).unwrap();
    match Framebuffer::open(&FramebufferConfig::default().with_device(&plain)) {
        Err(Error::IoctlFailed { request, .. }) => assert_eq!(request, "FBIOGET_VSCREENINFO"),
        other => panic!("expected IoctlFailed, got {other:?}"),
    }
}
