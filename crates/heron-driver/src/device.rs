//! Heron device handle.
//!
//! Owns everything with device lifetime: the revision, the register
//! space backend, the channels with their self-test cells, the MAC
//! statistics image and its link-down drop correction. The handle does
//! not serialize callers — snapshot requests and statistics refresh run
//! on whatever context the caller provides, which must not race device
//! reconfiguration.

use std::sync::Arc;

use heron_chip::revision::Revision;
use heron_chip::stats::{
    full_mask, MAC_STATS, MAC_STATS_COUNT, MAC_STATS_DMA_LEN, RX_NODESC_DROP_IDX, STAT_NAME_LEN,
};

use crate::discovery::DeviceInfo;
use crate::dma::DmaBuffer;
use crate::error::{HeronError, Result};
use crate::irq::{
    event_test_start, irq_test_start, IrqHandler, IrqHandlers, IrqMode, IrqPlan, SelfTestCell,
    TestEventGenerator,
};
use crate::regio::RegisterIo;
use crate::snapshot::{fill_snapshot, snapshot_len};
use crate::stats::{describe_stats, update_stats, DropCorrection};

/// One event/interrupt channel.
#[derive(Debug)]
pub struct Channel {
    index: usize,
    line: u32,
    event_test_cpu: Arc<SelfTestCell>,
}

impl Channel {
    /// A channel on interrupt line `line`.
    #[must_use]
    pub fn new(index: usize, line: u32) -> Self {
        Self {
            index,
            line,
            event_test_cpu: Arc::new(SelfTestCell::new()),
        }
    }

    /// Channel index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Interrupt line this channel is assigned.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// The channel's "last test event seen" cell, recorded by its
    /// handler and polled by diagnostics.
    #[must_use]
    pub fn event_test_cpu(&self) -> &SelfTestCell {
        &self.event_test_cpu
    }

    /// Whether a test event has been serviced since the last arm.
    /// Only meaningful during a self-test.
    #[must_use]
    pub fn event_present(&self) -> bool {
        self.event_test_cpu.seen().is_some()
    }
}

/// Open Heron device.
pub struct HeronNic {
    info: DeviceInfo,
    io: Box<dyn RegisterIo + Send + Sync>,
    channels: Vec<Channel>,
    rx_channels: usize,
    last_irq_cpu: Arc<SelfTestCell>,
    stats_dma: DmaBuffer,
    mac_stats: Vec<u64>,
    stats_mask: Vec<u64>,
    drop_correction: DropCorrection,
}

impl std::fmt::Debug for HeronNic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeronNic")
            .field("pcie_address", &self.info.pcie_address)
            .field("revision", &self.info.revision)
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl HeronNic {
    /// Bring up a handle over an already-mapped register space.
    ///
    /// `channel_lines` assigns one interrupt line per channel in channel
    /// order; the first `rx_channels` of them are receive channels.
    ///
    /// # Errors
    ///
    /// Returns an error if the statistics DMA buffer cannot be
    /// allocated or the channel layout is inconsistent.
    pub fn new(
        info: DeviceInfo,
        io: Box<dyn RegisterIo + Send + Sync>,
        channel_lines: &[u32],
        rx_channels: usize,
    ) -> Result<Self> {
        if rx_channels > channel_lines.len() {
            return Err(HeronError::query_failed(format!(
                "{rx_channels} receive channels but only {} lines",
                channel_lines.len()
            )));
        }

        let channels = channel_lines
            .iter()
            .enumerate()
            .map(|(index, &line)| Channel::new(index, line))
            .collect();

        let stats_dma = DmaBuffer::alloc(MAC_STATS_DMA_LEN)?;

        tracing::info!(
            "opened {} rev {:?} @ {}",
            info.variant.name(),
            info.revision,
            info.pcie_address
        );

        Ok(Self {
            info,
            io,
            channels,
            rx_channels,
            last_irq_cpu: Arc::new(SelfTestCell::new()),
            stats_dma,
            mac_stats: vec![0; MAC_STATS_COUNT],
            stats_mask: full_mask(MAC_STATS_COUNT),
            drop_correction: DropCorrection::new(),
        })
    }

    /// Device information.
    #[must_use]
    pub const fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Silicon revision.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.info.revision
    }

    /// The device's channels.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// The device's "last interrupt seen on CPU" cell.
    #[must_use]
    pub fn last_irq_cpu(&self) -> &SelfTestCell {
        &self.last_irq_cpu
    }

    /// Byte length of this device's register dump.
    #[must_use]
    pub fn registers_len(&self) -> usize {
        snapshot_len(self.info.revision)
    }

    /// Dump the device's registers and tables.
    ///
    /// Allocates the exact dump size once and fills it; the caller must
    /// serialize this against device reconfiguration.
    #[must_use]
    pub fn dump_registers(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.registers_len()];
        fill_snapshot(self.io.as_ref(), self.info.revision, &mut buf);
        buf
    }

    /// Names of the statistics visible with the current enable mask.
    #[must_use]
    pub fn stat_names(&self) -> Vec<String> {
        let visible = describe_stats(MAC_STATS, &self.stats_mask, None);
        let mut slots = vec![[0u8; STAT_NAME_LEN]; visible];
        describe_stats(MAC_STATS, &self.stats_mask, Some(&mut slots));
        slots
            .iter()
            .map(|slot| {
                let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
                String::from_utf8_lossy(&slot[..end]).into_owned()
            })
            .collect()
    }

    /// The statistics DMA buffer, for handing its address to the MAC.
    pub fn stats_dma_mut(&mut self) -> &mut DmaBuffer {
        &mut self.stats_dma
    }

    /// Fold the current DMA image into the counter array and apply the
    /// link-down drop correction.
    ///
    /// Call from the periodic statistics refresh only — the correction
    /// state is single-writer and must see each sample exactly once.
    pub fn refresh_mac_stats(&mut self, link_up: bool, accumulate: bool) -> &[u64] {
        update_stats(
            MAC_STATS,
            &self.stats_mask,
            &mut self.mac_stats,
            self.stats_dma.as_slice(),
            accumulate,
        );

        let mut drops = self.mac_stats[RX_NODESC_DROP_IDX];
        self.drop_correction.apply(link_up, &mut drops);
        self.mac_stats[RX_NODESC_DROP_IDX] = drops;

        &self.mac_stats
    }

    /// Current counter values (as of the last refresh).
    #[must_use]
    pub fn mac_stats(&self) -> &[u64] {
        &self.mac_stats
    }

    /// Interrupt plan for the given mode, derived from the channel
    /// layout.
    #[must_use]
    pub fn irq_plan(&self, mode: IrqMode, legacy_line: u32, flow_steering: bool) -> IrqPlan {
        IrqPlan {
            mode,
            name: format!("heron-{}", self.info.pcie_address),
            legacy_line,
            channel_lines: self.channels.iter().map(Channel::line).collect(),
            rx_channels: self.rx_channels,
            flow_steering,
        }
    }

    /// Handlers recording the servicing CPU into the device's
    /// "last interrupt seen" cell, for hooking through
    /// [`setup_interrupts`](crate::irq::setup_interrupts).
    ///
    /// The handlers only record; event processing belongs to the data
    /// path, which the owning environment drives separately.
    #[must_use]
    pub fn irq_handlers(&self) -> IrqHandlers {
        let legacy_cell = Arc::clone(&self.last_irq_cpu);
        let channel = self
            .channels
            .iter()
            .map(|_| {
                let cell = Arc::clone(&self.last_irq_cpu);
                Arc::new(move |cpu| cell.record(cpu)) as IrqHandler
            })
            .collect();
        IrqHandlers {
            legacy: Arc::new(move |cpu| legacy_cell.record(cpu)),
            channel,
        }
    }

    /// Start an event-path self-test on `channel`.
    ///
    /// Arms the channel's cell, publishes it, then asks the device to
    /// post one synthetic event. Poll [`Channel::event_present`] with a
    /// caller-owned timeout to observe completion.
    ///
    /// # Errors
    ///
    /// Returns `HeronError::InvalidIndex` for an unknown channel.
    pub fn event_test_start(
        &mut self,
        channel: usize,
        gen: &mut dyn TestEventGenerator,
    ) -> Result<()> {
        let cell = self
            .channels
            .get(channel)
            .map(Channel::event_test_cpu)
            .ok_or(HeronError::InvalidIndex {
                index: channel,
                count: self.channels.len(),
            })?;
        event_test_start(cell, channel, gen);
        Ok(())
    }

    /// Start an interrupt-path self-test.
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses to generate the interrupt.
    pub fn irq_test_start(&mut self, gen: &mut dyn TestEventGenerator) -> Result<()> {
        irq_test_start(&self.last_irq_cpu, gen)
    }
}

impl Drop for HeronNic {
    fn drop(&mut self) {
        tracing::info!("closing device @ {}", self.info.pcie_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heron_chip::revision::ChipVariant;

    struct ZeroIo;

    impl RegisterIo for ZeroIo {
        fn read_oword(&self, _offset: u32) -> [u8; 16] {
            [0; 16]
        }
        fn read_oword_table(&self, _offset: u32, _index: u32) -> [u8; 16] {
            [0; 16]
        }
        fn read_sram_qword(&self, _offset: u32, _index: u32) -> u64 {
            0
        }
        fn read_dword(&self, _offset: u32) -> u32 {
            0
        }
    }

    fn info() -> DeviceInfo {
        DeviceInfo {
            index: 0,
            pcie_address: "0000:03:00.0".into(),
            variant: ChipVariant::Hn5322,
            revision: Revision::C,
            link: None,
        }
    }

    fn nic() -> HeronNic {
        HeronNic::new(info(), Box::new(ZeroIo), &[32, 33, 34, 35], 2).unwrap()
    }

    #[test]
    fn dump_is_exactly_the_computed_length() {
        let nic = nic();
        assert_eq!(nic.dump_registers().len(), nic.registers_len());
    }

    #[test]
    fn stat_names_match_visible_count() {
        let nic = nic();
        let names = nic.stat_names();
        let visible = describe_stats(MAC_STATS, &full_mask(MAC_STATS_COUNT), None);
        assert_eq!(names.len(), visible);
        assert!(names.iter().any(|n| n == "rx_nodesc_drop_cnt"));
    }

    #[test]
    fn refresh_applies_drop_correction() {
        let mut nic = nic();

        // Seed the DMA image with 40 raw drops.
        let offset = MAC_STATS[RX_NODESC_DROP_IDX].offset;
        nic.stats_dma_mut().as_mut_slice()[offset..offset + 4]
            .copy_from_slice(&40u32.to_le_bytes());

        // First sample ever books everything to down-time.
        let stats = nic.refresh_mac_stats(true, false);
        assert_eq!(stats[RX_NODESC_DROP_IDX], 0);

        // Steady link-up: new drops become visible.
        let offset = MAC_STATS[RX_NODESC_DROP_IDX].offset;
        nic.stats_dma_mut().as_mut_slice()[offset..offset + 4]
            .copy_from_slice(&55u32.to_le_bytes());
        let stats = nic.refresh_mac_stats(true, false);
        assert_eq!(stats[RX_NODESC_DROP_IDX], 15);
    }

    #[test]
    fn irq_plan_reflects_channel_layout() {
        let nic = nic();
        let plan = nic.irq_plan(IrqMode::MsiX, 9, true);
        assert_eq!(plan.channel_lines, vec![32, 33, 34, 35]);
        assert_eq!(plan.rx_channels, 2);
        assert_eq!(plan.legacy_line, 9);
    }

    #[test]
    fn irq_handlers_record_the_servicing_cpu() {
        let nic = nic();
        let handlers = nic.irq_handlers();
        assert_eq!(handlers.channel.len(), 4);

        (handlers.channel[2])(6);
        assert_eq!(nic.last_irq_cpu().seen(), Some(6));

        (handlers.legacy)(1);
        assert_eq!(nic.last_irq_cpu().seen(), Some(1));
    }

    #[test]
    fn unknown_channel_rejected_for_event_test() {
        struct NoGen;
        impl TestEventGenerator for NoGen {
            fn generate_test_event(&mut self, _channel: usize) {
                unreachable!()
            }
            fn generate_test_irq(&mut self) -> crate::Result<()> {
                unreachable!()
            }
        }
        let mut nic = nic();
        assert!(nic.event_test_start(9, &mut NoGen).is_err());
    }
}
