//! PCIe identifiers and designed link capability.

/// Heron Networks vendor ID (PCI-SIG assigned).
pub const HERON_VENDOR_ID: u16 = 0x1AF6;

/// Device IDs for the Heron family.
pub mod device_id {
    /// HN5122 — Harrier rev A (`lspci: 1af6:5122`).
    pub const HN5122: u16 = 0x5122;
    /// HN5222 — Harrier rev B.
    pub const HN5222: u16 = 0x5222;
    /// HN5322 — Harrier rev C.
    pub const HN5322: u16 = 0x5322;
    /// HN6142 — Osprey (`lspci: 1af6:6142`).
    pub const HN6142: u16 = 0x6142;
}

/// All known Heron device IDs.
pub const ALL_DEVICE_IDS: &[u16] = &[
    device_id::HN5122,
    device_id::HN5222,
    device_id::HN5322,
    device_id::HN6142,
];

/// Designed PCIe link width (lanes) for full throughput.
pub const FULL_LINK_WIDTH: u16 = 8;

/// Designed PCIe speed class (generation) for full throughput.
pub const FULL_LINK_SPEED: u16 = 2;

/// Minimum relative bandwidth for full throughput.
///
/// Expressed in the same `width << (speed - 1)` unit used by the link
/// quality check: the equivalent of 8 lanes at Gen1.
pub const MIN_LINK_BANDWIDTH: u32 = 8;

/// Format a `vendor:device` string for use with `lspci -d`.
#[must_use]
pub fn lspci_filter() -> String {
    format!("{HERON_VENDOR_ID:04x}:{:04x}", device_id::HN6142)
}
