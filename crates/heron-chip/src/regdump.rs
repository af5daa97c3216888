//! Register and table catalogs driving the diagnostic dump.
//!
//! Both catalogs are static data: every entry carries the inclusive
//! revision range for which the register or table exists on silicon, so
//! the snapshot engine never branches on a revision by name. Entries are
//! listed in dump order — the byte layout of a register dump is the
//! concatenation of scalar reads then table rows in exactly this order.
//!
//! Registers that are write-only, read-to-clear or indirect are excluded;
//! reading them would either fault or destroy state.

use crate::revision::Revision;

/// Bytes captured per scalar register (one 128-bit read).
pub const OWORD_LEN: usize = 16;

/// Widest table row captured per read. 32-byte interleaved rows are read
/// and stored as one 16-byte unit.
pub const MAX_ROW_LEN: usize = 16;

/// A scalar register that exists on revisions `min_rev..=max_rev`.
///
/// Offsets fit in 24 bits; the packed hardware encoding is not preserved
/// because these are host-side tables, not wire data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegDesc {
    /// Byte offset within the register space.
    pub offset: u32,
    /// Oldest revision carrying this register.
    pub min_rev: Revision,
    /// Newest revision carrying this register.
    pub max_rev: Revision,
}

/// A repeating on-chip table that exists on revisions `min_rev..=max_rev`.
///
/// `step` is the row stride in bytes and selects the read path (4, 8, 16
/// or 32); `rows` is the row count at these revisions. A logical table
/// whose row count differs by revision contributes one entry per
/// revision sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDesc {
    /// Byte offset of row 0 within the register space.
    pub offset: u32,
    /// Oldest revision carrying this table.
    pub min_rev: Revision,
    /// Newest revision carrying this table.
    pub max_rev: Revision,
    /// Row stride in bytes.
    pub step: u8,
    /// Row count at these revisions.
    pub rows: u32,
}

impl RegDesc {
    const fn new(offset: u32, min_rev: Revision, max_rev: Revision) -> Self {
        Self {
            offset,
            min_rev,
            max_rev,
        }
    }

    /// Whether this register exists at `rev`.
    #[must_use]
    pub fn exists_at(&self, rev: Revision) -> bool {
        rev.in_range(self.min_rev, self.max_rev)
    }
}

impl TableDesc {
    const fn new(offset: u32, min_rev: Revision, max_rev: Revision, step: u8, rows: u32) -> Self {
        Self {
            offset,
            min_rev,
            max_rev,
            step,
            rows,
        }
    }

    /// Whether this table exists at `rev`.
    #[must_use]
    pub fn exists_at(&self, rev: Revision) -> bool {
        rev.in_range(self.min_rev, self.max_rev)
    }

    /// Bytes captured per row: `min(step, 16)`.
    #[must_use]
    pub fn row_len(&self) -> usize {
        (self.step as usize).min(MAX_ROW_LEN)
    }
}

/// Harrier / Osprey register offsets appearing in the dump.
pub mod addr {
    // ── Osprey bus interface unit ────────────────────────────────────────

    /// Hardware revision ID.
    pub const BIU_HW_REV_ID: u32 = 0x0000;
    /// Management CPU doorbell, low word.
    pub const MC_DB_LWRD: u32 = 0x0008;
    /// Management CPU doorbell, high word.
    pub const MC_DB_HWRD: u32 = 0x000C;

    // ── Interrupt block ──────────────────────────────────────────────────
    // INT_ACK is WO; INT_ISR is RC — both excluded.

    /// Interrupt enable.
    pub const INT_EN: u32 = 0x0010;
    /// Interrupt status-block host address.
    pub const INT_ADR: u32 = 0x0030;

    // ── Global configuration and debug ───────────────────────────────────

    /// Hardware initialisation state.
    pub const HW_INIT: u32 = 0x00C0;
    /// User-event configuration.
    pub const USR_EV_CFG: u32 = 0x00D0;
    /// Memory BIST status.
    pub const MEM_STAT: u32 = 0x0100;
    /// Chip-scope debug mux.
    pub const CS_DEBUG: u32 = 0x0110;
    /// Silicon build ID.
    pub const BUILD_ID: u32 = 0x0120;
    /// Spare CSR bits.
    pub const CSR_SPARE: u32 = 0x0130;

    // ── NVM SPI host interface ───────────────────────────────────────────
    // Dropped from rev C, where flash access moved behind the MC.

    /// SPI host command.
    pub const NVM_SPI_HCMD: u32 = 0x0140;
    /// SPI host address.
    pub const NVM_SPI_HADR: u32 = 0x0150;
    /// SPI host data.
    pub const NVM_SPI_HDATA: u32 = 0x0160;
    /// NVM base page select.
    pub const NVM_BASE_PAGE: u32 = 0x0170;

    /// Strapping / board status.
    pub const NIC_STAT: u32 = 0x0200;
    /// GPIO control.
    pub const GPIO_CTL: u32 = 0x0210;
    /// Global block control.
    pub const GLB_CTL: u32 = 0x0220;
    /// PCIe SerDes control.
    pub const PCIE_SD_CTL: u32 = 0x0230;
    /// Datapath control.
    pub const DP_CTRL: u32 = 0x0250;

    // ── Event queues and buffer-table SRAM control ───────────────────────
    // BUF_TBL_UPD is WO — excluded.

    /// Event queue control.
    pub const EVQ_CTL: u32 = 0x0440;
    /// Event counter 1.
    pub const EVQ_CNT1: u32 = 0x0460;
    /// Event counter 2.
    pub const EVQ_CNT2: u32 = 0x0470;
    /// Buffer table configuration.
    pub const BUF_TBL_CFG: u32 = 0x0600;
    /// SRAM receive descriptor-cache base.
    pub const SRM_RX_DC_CFG: u32 = 0x0610;
    /// SRAM transmit descriptor-cache base.
    pub const SRM_TX_DC_CFG: u32 = 0x0620;
    /// SRAM configuration.
    pub const SRM_CFG: u32 = 0x0630;
    /// SRAM update event queue select.
    pub const SRM_UPD_EVQ: u32 = 0x0660;
    /// SRAM parity status.
    pub const SRAM_PARITY: u32 = 0x0670;

    // ── Receive datapath ─────────────────────────────────────────────────
    // RX_NODESC_DROP is RC — excluded; it reaches software via MAC stats.

    /// Receive datapath configuration.
    pub const RX_CFG: u32 = 0x0800;
    /// Receive filter control.
    pub const RX_FILTER_CTL: u32 = 0x0810;
    /// Receive descriptor-cache configuration.
    pub const RX_DC_CFG: u32 = 0x0840;
    /// Receive descriptor-cache prefetch watermark.
    pub const RX_DC_PF_WM: u32 = 0x0850;
    /// RSS Toeplitz key.
    pub const RX_RSS_KEY: u32 = 0x0860;
    /// RSS IPv6 key, word 1.
    pub const RX_RSS_IPV6_1: u32 = 0x0870;
    /// RSS IPv6 key, word 2.
    pub const RX_RSS_IPV6_2: u32 = 0x0880;
    /// RSS IPv6 key, word 3.
    pub const RX_RSS_IPV6_3: u32 = 0x08A0;
    /// Receive self-reset status (rev A only).
    pub const RX_SELF_RST: u32 = 0x0890;

    /// Osprey firmware status window.
    pub const FW_SFT_STATUS: u32 = 0x0900;

    // ── Transmit datapath ────────────────────────────────────────────────

    /// Transmit descriptor-cache configuration.
    pub const TX_DC_CFG: u32 = 0x0A20;
    /// Transmit checksum configuration (rev A only).
    pub const TX_CHKSM_CFG: u32 = 0x0A40;
    /// Transmit datapath configuration.
    pub const TX_CFG: u32 = 0x0A50;
    /// Reserved transmit configuration bits.
    pub const TX_RESERVED: u32 = 0x0A80;
    /// Transmit pace control.
    pub const TX_PACE: u32 = 0x0A90;
    /// Transmit IP-filter port enable.
    pub const TX_IPFIL_PORTEN: u32 = 0x0AA0;
    /// Transmit VLAN filter (rev B only).
    pub const TX_VLAN: u32 = 0x0AB0;

    // ── MDIO and MAC control ─────────────────────────────────────────────
    // MD_STAT is RC — excluded.

    /// MDIO transmit data.
    pub const MD_TXD: u32 = 0x0C00;
    /// MDIO receive data.
    pub const MD_RXD: u32 = 0x0C10;
    /// MDIO command/status.
    pub const MD_CS: u32 = 0x0C20;
    /// MDIO PHY address.
    pub const MD_PHY_ADR: u32 = 0x0C30;
    /// MDIO block ID.
    pub const MD_ID: u32 = 0x0C40;
    /// MAC statistics DMA address.
    pub const MAC_STAT_DMA: u32 = 0x0C60;
    /// MAC control.
    pub const MAC_CTRL: u32 = 0x0C80;
    /// Multicast hash filter, low half.
    pub const MAC_MC_HASH0: u32 = 0x0CA0;
    /// Multicast hash filter, high half.
    pub const MAC_MC_HASH1: u32 = 0x0CB0;
    /// MAC generation mode (rev B only).
    pub const GEN_MODE: u32 = 0x0CC0;

    // ── 10G MAC (XM) block ───────────────────────────────────────────────

    /// Station address, low word.
    pub const XM_ADR_LO: u32 = 0x1200;
    /// Station address, high word.
    pub const XM_ADR_HI: u32 = 0x1210;
    /// XM global configuration.
    pub const XM_GLB_CFG: u32 = 0x1220;
    /// XM transmit configuration.
    pub const XM_TX_CFG: u32 = 0x1230;
    /// XM receive configuration.
    pub const XM_RX_CFG: u32 = 0x1240;
    /// XM flow control.
    pub const XM_FC: u32 = 0x1250;
    /// XM pause time.
    pub const XM_PAUSE_TIME: u32 = 0x1260;

    // ── On-chip tables ───────────────────────────────────────────────────

    /// Transmit IP filter table.
    pub const TX_IPFIL_TBL: u32 = 0x8000;
    /// Transmit source-MAC filter table.
    pub const TX_SRC_MAC_TBL: u32 = 0x8400;
    /// Kernel-only receive descriptor pointer table (rev A).
    pub const RX_DESC_PTR_TBL_KER: u32 = 0xF400;
    /// Receive descriptor pointer table.
    pub const RX_DESC_PTR_TBL: u32 = 0xF400;
    /// Kernel-only transmit descriptor pointer table (rev A).
    pub const TX_DESC_PTR_TBL_KER: u32 = 0xF500;
    /// Transmit descriptor pointer table.
    pub const TX_DESC_PTR_TBL: u32 = 0xF500;
    /// Kernel-only event queue pointer table (rev A).
    pub const EVQ_PTR_TBL_KER: u32 = 0xF600;
    /// Event queue pointer table.
    pub const EVQ_PTR_TBL: u32 = 0xF600;
    /// Buffer table (full variant).
    pub const BUF_FULL_TBL: u32 = 0x1_8000;
    /// Receive MAC filter table.
    pub const RX_MAC_FILTER_TBL: u32 = 0x2_8000;
    /// Event queue timer table.
    pub const TIMER_TBL: u32 = 0x2_A000;
    /// Transmit pace table.
    pub const TX_PACE_TBL: u32 = 0x2_C000;
    /// RSS indirection table.
    pub const RX_INDIRECTION_TBL: u32 = 0x2_E000;
    /// Receive IP filter table.
    pub const RX_FILTER_TBL: u32 = 0x3_0000;
    /// Transmit MAC filter table.
    pub const TX_MAC_FILTER_TBL: u32 = 0x3_8000;
    /// Management CPU shared memory window.
    pub const MC_SMEM: u32 = 0x4_0000;
}

use self::addr as a;
use crate::revision::Revision::{A, B, C, D};

/// Scalar registers, in dump order.
pub const REGISTERS: &[RegDesc] = &[
    RegDesc::new(a::INT_EN, A, D),
    RegDesc::new(a::INT_ADR, A, D),
    RegDesc::new(a::HW_INIT, A, D),
    RegDesc::new(a::USR_EV_CFG, C, D),
    RegDesc::new(a::NVM_SPI_HCMD, A, B),
    RegDesc::new(a::NVM_SPI_HADR, A, B),
    RegDesc::new(a::NVM_SPI_HDATA, A, B),
    RegDesc::new(a::NVM_BASE_PAGE, A, B),
    RegDesc::new(a::NIC_STAT, A, B),
    RegDesc::new(a::GPIO_CTL, A, B),
    RegDesc::new(a::GLB_CTL, A, B),
    RegDesc::new(a::PCIE_SD_CTL, A, B),
    RegDesc::new(a::DP_CTRL, B, D),
    RegDesc::new(a::MEM_STAT, A, D),
    RegDesc::new(a::CS_DEBUG, A, D),
    RegDesc::new(a::BUILD_ID, A, D),
    RegDesc::new(a::CSR_SPARE, A, D),
    RegDesc::new(a::EVQ_CTL, A, D),
    RegDesc::new(a::EVQ_CNT1, A, D),
    RegDesc::new(a::EVQ_CNT2, A, D),
    RegDesc::new(a::BUF_TBL_CFG, A, D),
    RegDesc::new(a::SRM_RX_DC_CFG, A, D),
    RegDesc::new(a::SRM_TX_DC_CFG, A, D),
    RegDesc::new(a::SRM_CFG, A, D),
    RegDesc::new(a::SRM_UPD_EVQ, A, D),
    RegDesc::new(a::SRAM_PARITY, A, D),
    RegDesc::new(a::RX_CFG, A, D),
    RegDesc::new(a::RX_FILTER_CTL, B, D),
    RegDesc::new(a::RX_DC_CFG, A, D),
    RegDesc::new(a::RX_DC_PF_WM, A, D),
    RegDesc::new(a::RX_RSS_KEY, B, D),
    RegDesc::new(a::RX_SELF_RST, A, A),
    RegDesc::new(a::RX_RSS_IPV6_1, C, D),
    RegDesc::new(a::RX_RSS_IPV6_2, C, D),
    RegDesc::new(a::RX_RSS_IPV6_3, C, D),
    RegDesc::new(a::TX_DC_CFG, A, D),
    RegDesc::new(a::TX_CHKSM_CFG, A, A),
    RegDesc::new(a::TX_CFG, A, D),
    RegDesc::new(a::TX_RESERVED, A, D),
    RegDesc::new(a::TX_PACE, B, D),
    RegDesc::new(a::TX_VLAN, B, B),
    RegDesc::new(a::TX_IPFIL_PORTEN, B, D),
    RegDesc::new(a::MD_TXD, A, B),
    RegDesc::new(a::MD_RXD, A, B),
    RegDesc::new(a::MD_CS, A, B),
    RegDesc::new(a::MD_PHY_ADR, A, B),
    RegDesc::new(a::MD_ID, A, B),
    RegDesc::new(a::MAC_STAT_DMA, A, B),
    RegDesc::new(a::MAC_CTRL, A, B),
    RegDesc::new(a::GEN_MODE, B, B),
    RegDesc::new(a::MAC_MC_HASH0, A, B),
    RegDesc::new(a::MAC_MC_HASH1, A, B),
    RegDesc::new(a::XM_ADR_LO, A, B),
    RegDesc::new(a::XM_ADR_HI, A, B),
    RegDesc::new(a::XM_GLB_CFG, A, B),
    RegDesc::new(a::XM_TX_CFG, A, B),
    RegDesc::new(a::XM_RX_CFG, A, B),
    RegDesc::new(a::XM_FC, A, B),
    RegDesc::new(a::XM_PAUSE_TIME, A, B),
    RegDesc::new(a::BIU_HW_REV_ID, D, D),
    RegDesc::new(a::MC_DB_LWRD, D, D),
    RegDesc::new(a::MC_DB_HWRD, D, D),
];

/// On-chip tables, in dump order.
///
/// The full buffer table is up to 8 MB on silicon; reading 1024 rows
/// covers every entry this driver can have programmed while keeping the
/// dump bounded.
pub const TABLES: &[TableDesc] = &[
    TableDesc::new(a::TX_IPFIL_TBL, B, B, 16, 16),
    TableDesc::new(a::TX_SRC_MAC_TBL, B, B, 16, 16),
    TableDesc::new(a::RX_DESC_PTR_TBL_KER, A, A, 16, 4),
    TableDesc::new(a::RX_DESC_PTR_TBL, B, B, 16, 768),
    TableDesc::new(a::RX_DESC_PTR_TBL, C, D, 16, 1024),
    TableDesc::new(a::TX_DESC_PTR_TBL_KER, A, A, 16, 8),
    TableDesc::new(a::TX_DESC_PTR_TBL, B, B, 16, 768),
    TableDesc::new(a::TX_DESC_PTR_TBL, C, D, 16, 1024),
    TableDesc::new(a::EVQ_PTR_TBL_KER, A, A, 16, 4),
    TableDesc::new(a::EVQ_PTR_TBL, B, B, 16, 768),
    TableDesc::new(a::EVQ_PTR_TBL, C, D, 16, 1024),
    TableDesc::new(a::BUF_FULL_TBL, A, A, 8, 1024),
    TableDesc::new(a::BUF_FULL_TBL, B, D, 8, 1024),
    TableDesc::new(a::RX_MAC_FILTER_TBL, C, D, 32, 512),
    TableDesc::new(a::TIMER_TBL, B, B, 16, 768),
    TableDesc::new(a::TIMER_TBL, C, D, 16, 1024),
    TableDesc::new(a::TX_PACE_TBL, B, B, 16, 140),
    TableDesc::new(a::TX_PACE_TBL, C, D, 16, 1024),
    TableDesc::new(a::RX_INDIRECTION_TBL, B, D, 4, 128),
    TableDesc::new(a::RX_FILTER_TBL, B, D, 32, 8192),
    TableDesc::new(a::TX_MAC_FILTER_TBL, C, D, 32, 512),
    TableDesc::new(a::MC_SMEM, C, D, 4, 2048),
    TableDesc::new(a::FW_SFT_STATUS, D, D, 4, 8),
];
