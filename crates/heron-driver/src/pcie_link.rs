//! PCIe link quality check.
//!
//! Reads the negotiated link width and speed class from the PCI Express
//! capability and compares the relative bandwidth against the card's
//! designed capability. Purely informational: an unreadable capability
//! degrades to a zero result, and the warnings never become errors.

use crate::error::{HeronError, Result};

/// Status register offset and its capability-list flag.
const PCI_STATUS: u16 = 0x06;
const PCI_STATUS_CAP_LIST: u16 = 0x10;
/// First capability pointer.
const PCI_CAPABILITY_LIST: u16 = 0x34;
/// PCI Express capability ID.
const PCI_CAP_ID_EXP: u8 = 0x10;
/// Link status register, relative to the express capability.
const PCI_EXP_LNKSTA: u16 = 0x12;
const PCI_EXP_LNKSTA_CLS: u16 = 0x000F;
const PCI_EXP_LNKSTA_NLW: u16 = 0x03F0;

/// Byte/word reads from a device's configuration space.
///
/// `None` means the offset is unreadable (beyond the visible window,
/// device gone, access denied) — never an error.
pub trait ConfigSpace {
    /// Read one byte at `offset`.
    fn read_u8(&self, offset: u16) -> Option<u8>;

    /// Read one little-endian 16-bit word at `offset`.
    fn read_u16(&self, offset: u16) -> Option<u16>;
}

/// Find a capability by ID, returning its config-space offset.
///
/// Walks the capability list; a chain longer than the config space can
/// hold is treated as corrupt and abandoned.
#[must_use]
pub fn find_capability(cfg: &dyn ConfigSpace, cap_id: u8) -> Option<u16> {
    let status = cfg.read_u16(PCI_STATUS)?;
    if status & PCI_STATUS_CAP_LIST == 0 {
        return None;
    }

    let mut pos = u16::from(cfg.read_u8(PCI_CAPABILITY_LIST)?) & !0x3;
    // 48 caps of 2 bytes minimum is more than a 256-byte space can hold.
    for _ in 0..48 {
        if pos == 0 {
            return None;
        }
        let id = cfg.read_u8(pos)?;
        if id == cap_id {
            return Some(pos);
        }
        pos = u16::from(cfg.read_u8(pos + 1)?) & !0x3;
    }
    None
}

/// Check the negotiated PCIe link against the card's designed capability.
///
/// `full_width`/`full_speed` describe the designed link; `min_bandwidth`
/// is the minimum relative bandwidth (in `width << (speed - 1)` units)
/// for full throughput. Flags below-minimum and below-optimal links via
/// the log, informational only.
///
/// Returns the observed link width unconditionally; 0 when the express
/// capability or link status is unreadable.
pub fn check_pcie_link(
    cfg: &dyn ConfigSpace,
    full_width: u16,
    full_speed: u16,
    min_bandwidth: u32,
) -> u16 {
    let Some(cap) = find_capability(cfg, PCI_CAP_ID_EXP) else {
        return 0;
    };
    let Some(stat) = cfg.read_u16(cap + PCI_EXP_LNKSTA) else {
        return 0;
    };

    let width = (stat & PCI_EXP_LNKSTA_NLW) >> PCI_EXP_LNKSTA_NLW.trailing_zeros();
    let speed = stat & PCI_EXP_LNKSTA_CLS;

    #[cfg(debug_assertions)]
    if width == 32 {
        // Virtualized platforms report x32; on bare metal it indicates a
        // PCI problem.
        tracing::warn!(
            full_width,
            "PCI Express width is 32; fine under virtualization, \
             otherwise indicates a PCI problem"
        );
    } else if width == 0 || width > full_width {
        tracing::warn!(width, full_width, "implausible PCI Express link width");
    }

    if speed == 0 || speed > full_speed {
        tracing::warn!(speed, full_speed, "implausible PCI Express speed class");
    }
    if speed == 0 {
        return width;
    }

    let bandwidth = u32::from(width) << (speed - 1);
    let full_bandwidth = u32::from(full_width) << (full_speed - 1);

    if bandwidth < min_bandwidth && min_bandwidth != 0 {
        // Express the minimum as the speed class that meets it with 8 lanes.
        let min_speed_x8 = min_bandwidth.trailing_zeros().saturating_sub(2);
        tracing::warn!(
            width,
            speed,
            min_speed_x8,
            "link below the 8-lane-equivalent minimum for full throughput; \
             consult the motherboard documentation for a more suitable slot"
        );
    }

    if bandwidth < full_bandwidth {
        tracing::warn!(
            width,
            speed,
            full_width,
            full_speed,
            "link below the designed capability; latency will be suboptimal"
        );
    }

    width
}

/// [`ConfigSpace`] over the sysfs `config` blob.
///
/// Unprivileged processes only see the first 64 bytes, which normally
/// excludes the capability list — the link check then degrades to a
/// zero result, as designed.
#[derive(Debug)]
pub struct FileConfigSpace {
    bytes: Vec<u8>,
}

impl FileConfigSpace {
    /// Read the configuration space of the device at `pcie_address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sysfs config file cannot be read.
    pub fn from_sysfs(pcie_address: &str) -> Result<Self> {
        let path = format!("/sys/bus/pci/devices/{pcie_address}/config");
        let bytes = std::fs::read(&path)
            .map_err(|e| HeronError::query_failed(format!("cannot read {path}: {e}")))?;
        Ok(Self { bytes })
    }

    /// Wrap an already-read configuration space image.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ConfigSpace for FileConfigSpace {
    fn read_u8(&self, offset: u16) -> Option<u8> {
        self.bytes.get(offset as usize).copied()
    }

    fn read_u16(&self, offset: u16) -> Option<u16> {
        let at = offset as usize;
        let bytes = self.bytes.get(at..at + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}
