//! Silicon revisions and chip variants.
//!
//! Every Heron part identifies itself through its PCI device id; the
//! revision is derived from that at identification time and is immutable
//! for the life of the device. Revisions are ordered oldest to newest and
//! every catalog-membership test in the diagnostic path is an inclusive
//! range comparison on this ordinal.

use crate::pcie::device_id;

/// Hardware revision, ranked oldest → newest.
///
/// A, B and C are Harrier-architecture steppings; D is the Osprey part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Revision {
    /// HN5122 — first Harrier stepping.
    A,
    /// HN5222 — added filter tables and doorbell rework.
    B,
    /// HN5322 — last Harrier stepping, management CPU onboard.
    C,
    /// HN6142 — Osprey architecture.
    D,
}

impl Revision {
    /// All revisions, oldest first.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Whether this revision falls in the inclusive range `[min, max]`.
    #[must_use]
    pub fn in_range(self, min: Self, max: Self) -> bool {
        min <= self && self <= max
    }
}

/// Chip variant discovered at identification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipVariant {
    /// HN5122 — 2×10GbE, Harrier rev A.
    Hn5122,
    /// HN5222 — 2×10GbE, Harrier rev B.
    Hn5222,
    /// HN5322 — 2×10GbE + management CPU, Harrier rev C.
    Hn5322,
    /// HN6142 — 2×40GbE, Osprey.
    Hn6142,
    /// Unknown / future part.
    Unknown(u16),
}

impl ChipVariant {
    /// Identify variant from PCI device ID.
    #[must_use]
    pub const fn from_device_id(id: u16) -> Self {
        match id {
            device_id::HN5122 => Self::Hn5122,
            device_id::HN5222 => Self::Hn5222,
            device_id::HN5322 => Self::Hn5322,
            device_id::HN6142 => Self::Hn6142,
            other => Self::Unknown(other),
        }
    }

    /// Silicon revision of this variant, if the variant is known.
    #[must_use]
    pub const fn revision(&self) -> Option<Revision> {
        match self {
            Self::Hn5122 => Some(Revision::A),
            Self::Hn5222 => Some(Revision::B),
            Self::Hn5322 => Some(Revision::C),
            Self::Hn6142 => Some(Revision::D),
            Self::Unknown(_) => None,
        }
    }

    /// Marketing name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hn5122 => "HN5122",
            Self::Hn5222 => "HN5222",
            Self::Hn5322 => "HN5322",
            Self::Hn6142 => "HN6142",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Port count for this variant.
    #[must_use]
    pub const fn port_count(&self) -> u8 {
        match self {
            Self::Hn5122 | Self::Hn5222 | Self::Hn5322 | Self::Hn6142 => 2,
            Self::Unknown(_) => 0,
        }
    }
}
