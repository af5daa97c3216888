//! Runtime device discovery.
//!
//! Scans PCIe sysfs for Heron vendor/device ids. No hardcoded device
//! lists — what exists on the bus is what gets reported.

use std::path::Path;

use heron_chip::pcie::{ALL_DEVICE_IDS, HERON_VENDOR_ID};
use heron_chip::revision::{ChipVariant, Revision};

use crate::error::{HeronError, Result};

/// Negotiated PCIe link as reported by sysfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    /// PCIe generation (1..=5).
    pub generation: u8,
    /// Lane count.
    pub lanes: u8,
}

/// One discovered Heron device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device index (0, 1, 2, ...) in bus-address order.
    pub index: usize,
    /// PCIe bus address (0000:a1:00.0, etc.)
    pub pcie_address: String,
    /// Chip variant from the device id.
    pub variant: ChipVariant,
    /// Silicon revision derived from the variant.
    pub revision: Revision,
    /// Negotiated link, when sysfs exposes it.
    pub link: Option<LinkInfo>,
}

/// Device manager for runtime discovery.
#[derive(Debug)]
pub struct DeviceManager {
    devices: Vec<DeviceInfo>,
}

impl DeviceManager {
    /// Discover all Heron devices on the system.
    ///
    /// # Errors
    ///
    /// Returns `HeronError::NoDevicesFound` if none are detected.
    pub fn discover() -> Result<Self> {
        Self::discover_under(Path::new("/sys/bus/pci/devices"))
    }

    fn discover_under(pci_devices_path: &Path) -> Result<Self> {
        tracing::info!("discovering Heron devices...");

        let entries = std::fs::read_dir(pci_devices_path).map_err(|e| {
            HeronError::query_failed(format!("cannot read PCIe devices: {e}"))
        })?;

        let mut addresses = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let vendor = read_hex_sysfs(&path.join("vendor")).ok();
            let device = read_hex_sysfs(&path.join("device")).ok();
            if let (Some(vendor), Some(device)) = (vendor, device) {
                if vendor == HERON_VENDOR_ID && ALL_DEVICE_IDS.contains(&device) {
                    addresses.push((entry.file_name().to_string_lossy().into_owned(), device));
                }
            }
        }

        // Sort for consistent indexing across runs.
        addresses.sort();

        let mut devices = Vec::new();
        for (index, (pcie_address, device_id)) in addresses.into_iter().enumerate() {
            let variant = ChipVariant::from_device_id(device_id);
            let Some(revision) = variant.revision() else {
                tracing::warn!(%pcie_address, device_id, "unrecognized Heron part, skipping");
                continue;
            };

            let link = read_link_info(pci_devices_path, &pcie_address);
            tracing::info!(
                "device {index}: {} rev {revision:?} @ {pcie_address}",
                variant.name()
            );

            devices.push(DeviceInfo {
                index,
                pcie_address,
                variant,
                revision,
                link,
            });
        }

        if devices.is_empty() {
            tracing::error!("no Heron devices found");
            return Err(HeronError::NoDevicesFound);
        }

        Ok(Self { devices })
    }

    /// Number of discovered devices.
    #[must_use]
    pub const fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// All discovered devices.
    #[must_use]
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Device info by index.
    ///
    /// # Errors
    ///
    /// Returns `HeronError::InvalidIndex` if out of range.
    pub fn device(&self, index: usize) -> Result<&DeviceInfo> {
        self.devices
            .iter()
            .find(|d| d.index == index)
            .ok_or(HeronError::InvalidIndex {
                index,
                count: self.devices.len(),
            })
    }
}

/// Read the negotiated link from sysfs; `None` when not exposed.
fn read_link_info(base: &Path, pcie_address: &str) -> Option<LinkInfo> {
    let dev = base.join(pcie_address);

    let speed = std::fs::read_to_string(dev.join("current_link_speed")).ok()?;
    // Strings like "2.5 GT/s PCIe", "5.0 GT/s", "8.0 GT/s".
    let generation = if speed.contains("2.5") {
        1
    } else if speed.contains("5.0") || speed.contains("5 GT") {
        2
    } else if speed.contains("8.0") || speed.contains("8 GT") {
        3
    } else if speed.contains("16.0") || speed.contains("16 GT") {
        4
    } else if speed.contains("32.0") || speed.contains("32 GT") {
        5
    } else {
        return None;
    };

    let lanes = std::fs::read_to_string(dev.join("current_link_width"))
        .ok()?
        .trim()
        .parse()
        .ok()?;

    Some(LinkInfo { generation, lanes })
}

/// Read a hexadecimal value from sysfs
fn read_hex_sysfs(path: &Path) -> Result<u16> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| HeronError::query_failed(format!("cannot read {}: {e}", path.display())))?;

    let trimmed = content.trim().trim_start_matches("0x");

    u16::from_str_radix(trimmed, 16)
        .map_err(|e| HeronError::query_failed(format!("invalid hex value: {e}")))
}
