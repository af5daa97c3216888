//! Diagnostics validation against mock collaborators.
//!
//! Exercises the snapshot engine, statistics codec, drop correction,
//! link check and interrupt lifecycle through the public API only.

use std::cell::RefCell;

use heron_chip::regdump::{REGISTERS, TABLES};
use heron_chip::revision::Revision;
use heron_chip::stats::{full_mask, StatDesc, MAC_STATS, MAC_STATS_COUNT};
use heron_driver::irq::{
    setup_interrupts, IrqHandler, IrqHandlers, IrqMode, IrqPlan, IrqService, IrqToken,
};
use heron_driver::{
    check_pcie_link, describe_stats, fill_snapshot, snapshot_len, update_stats, AffinityHandle,
    ConfigSpace, DropCorrection, HeronError, RegisterIo, Result,
};

fn noop_handlers(channels: usize) -> IrqHandlers {
    IrqHandlers {
        legacy: std::sync::Arc::new(|_| {}),
        channel: (0..channels)
            .map(|_| std::sync::Arc::new(|_| {}) as IrqHandler)
            .collect(),
    }
}

/// Counts the bytes every read would produce, so the total can be
/// checked against the size computation.
#[derive(Default)]
struct CountingIo {
    bytes: RefCell<usize>,
}

impl RegisterIo for CountingIo {
    fn read_oword(&self, _offset: u32) -> [u8; 16] {
        *self.bytes.borrow_mut() += 16;
        [0x11; 16]
    }

    fn read_oword_table(&self, _offset: u32, _index: u32) -> [u8; 16] {
        *self.bytes.borrow_mut() += 16;
        [0x22; 16]
    }

    fn read_sram_qword(&self, _offset: u32, _index: u32) -> u64 {
        *self.bytes.borrow_mut() += 8;
        0x3333_3333_3333_3333
    }

    fn read_dword(&self, _offset: u32) -> u32 {
        *self.bytes.borrow_mut() += 4;
        0x4444_4444
    }
}

#[test]
fn snapshot_len_equals_bytes_filled_for_every_revision() {
    for rev in Revision::ALL {
        let io = CountingIo::default();
        let len = snapshot_len(rev);
        let mut buf = vec![0u8; len];
        fill_snapshot(&io, rev, &mut buf);
        assert_eq!(*io.bytes.borrow(), len, "revision {rev:?}");
    }
}

#[test]
fn snapshot_len_counts_every_catalog_entry_once() {
    for rev in Revision::ALL {
        let expected: usize = REGISTERS
            .iter()
            .filter(|r| r.exists_at(rev))
            .map(|_| 16)
            .sum::<usize>()
            + TABLES
                .iter()
                .filter(|t| t.exists_at(rev))
                .map(|t| t.rows as usize * t.row_len())
                .sum::<usize>();
        assert_eq!(snapshot_len(rev), expected);
    }
}

#[test]
fn describe_count_is_independent_of_name_buffer() {
    let mask = full_mask(MAC_STATS_COUNT);
    let without = describe_stats(MAC_STATS, &mask, None);
    let mut slots = vec![[0u8; heron_chip::stats::STAT_NAME_LEN]; without];
    let with = describe_stats(MAC_STATS, &mask, Some(&mut slots));
    assert_eq!(without, with);

    // Exactly the named, enabled descriptors.
    let named = MAC_STATS.iter().filter(|d| d.name.is_some()).count();
    assert_eq!(without, named);
}

#[test]
fn decode_replaces_then_accumulates() {
    let descs = [
        StatDesc {
            name: Some("a"),
            offset: 0,
            dma_width: 64,
        },
        StatDesc {
            name: Some("b"),
            offset: 8,
            dma_width: 32,
        },
    ];
    let mask = full_mask(descs.len());
    let mut stats = [0u64; 2];

    let mut first = [0u8; 12];
    first[..8].copy_from_slice(&10u64.to_le_bytes());
    first[8..].copy_from_slice(&20u32.to_le_bytes());

    let mut second = [0u8; 12];
    second[..8].copy_from_slice(&1u64.to_le_bytes());
    second[8..].copy_from_slice(&2u32.to_le_bytes());

    update_stats(&descs, &mask, &mut stats, &first, false);
    update_stats(&descs, &mask, &mut stats, &second, false);
    assert_eq!(stats, [1, 2], "store mode keeps only the second image");

    update_stats(&descs, &mask, &mut stats, &first, true);
    assert_eq!(stats, [11, 22], "accumulate mode sums");
}

#[test]
fn width_zero_descriptors_keep_sentinel_values() {
    let descs = [
        StatDesc {
            name: Some("hw"),
            offset: 0,
            dma_width: 64,
        },
        StatDesc {
            name: Some("sw"),
            offset: 0,
            dma_width: 0,
        },
    ];
    let mask = full_mask(descs.len());
    let mut stats = [0u64, 0xFEED_FACE];
    update_stats(&descs, &mask, &mut stats, &[0u8; 8], false);
    assert_eq!(stats[1], 0xFEED_FACE);
}

#[test]
fn drop_correction_matches_the_reference_sequence() {
    let mut state = DropCorrection::new();

    // Establish a baseline at raw=100 with the link up.
    let mut raw = 100;
    state.apply(true, &mut raw);
    let base = state.dropped_while_down();

    // Down: +50 booked to down-time.
    let mut raw = 150;
    state.apply(false, &mut raw);
    assert_eq!(state.dropped_while_down() - base, 50);
    assert_eq!(raw, 150 - state.dropped_while_down());

    // Still down: +20 more.
    let mut raw = 170;
    state.apply(false, &mut raw);
    assert_eq!(state.dropped_while_down() - base, 70);
    assert_eq!(raw, 170 - state.dropped_while_down());

    // First sample after link-up: delta 0 booked to down-time.
    let mut raw = 170;
    state.apply(true, &mut raw);
    assert_eq!(state.dropped_while_down() - base, 70);
    assert_eq!(raw, 170 - state.dropped_while_down());
}

struct NoCaps;

impl ConfigSpace for NoCaps {
    fn read_u8(&self, _offset: u16) -> Option<u8> {
        None
    }
    fn read_u16(&self, _offset: u16) -> Option<u16> {
        None
    }
}

#[test]
fn unreadable_config_space_degrades_to_zero_width() {
    assert_eq!(check_pcie_link(&NoCaps, 8, 2, 8), 0);
}

/// Records hooks and frees so the rollback contract can be checked.
#[derive(Default)]
struct LedgerIrq {
    hooked: Vec<u32>,
    freed: Vec<u64>,
    map_alive: bool,
    fail_at: Option<u32>,
}

impl IrqService for LedgerIrq {
    fn request_line(
        &mut self,
        line: u32,
        _shared: bool,
        _name: &str,
        _handler: IrqHandler,
    ) -> Result<IrqToken> {
        if self.fail_at == Some(line) {
            return Err(HeronError::irq_request_failed(line, "exhausted"));
        }
        self.hooked.push(line);
        Ok(IrqToken(u64::from(line)))
    }

    fn free_line(&mut self, token: IrqToken) {
        self.freed.push(token.0);
    }

    fn alloc_affinity_map(&mut self, _rx_lines: usize) -> Result<AffinityHandle> {
        self.map_alive = true;
        Ok(AffinityHandle(1))
    }

    fn affinity_map_add(&mut self, _map: AffinityHandle, _line: u32) -> Result<()> {
        Ok(())
    }

    fn free_affinity_map(&mut self, _map: AffinityHandle) {
        self.map_alive = false;
    }
}

#[test]
fn failure_at_channel_k_unhooks_exactly_k_minus_one_lines() {
    for k in 1..=4u32 {
        let lines = vec![40, 41, 42, 43];
        let mut svc = LedgerIrq {
            fail_at: Some(lines[(k - 1) as usize]),
            ..LedgerIrq::default()
        };
        let plan = IrqPlan {
            mode: IrqMode::MsiX,
            name: "heron0".into(),
            legacy_line: 7,
            channel_lines: lines.clone(),
            rx_channels: 2,
            flow_steering: true,
        };

        setup_interrupts(&mut svc, &plan, &noop_handlers(4)).unwrap_err();

        assert_eq!(svc.freed.len(), (k - 1) as usize, "failing channel {k}");
        assert!(!svc.map_alive, "affinity map leaked at channel {k}");

        // Zero residual hooked lines: everything hooked was freed.
        let mut hooked: Vec<u64> = svc.hooked.iter().map(|&l| u64::from(l)).collect();
        let mut freed = svc.freed.clone();
        hooked.sort_unstable();
        freed.sort_unstable();
        assert_eq!(hooked, freed);
    }
}

#[test]
fn successful_setup_then_teardown_leaves_nothing() {
    let mut svc = LedgerIrq::default();
    let plan = IrqPlan {
        mode: IrqMode::MsiX,
        name: "heron0".into(),
        legacy_line: 7,
        channel_lines: vec![40, 41, 42],
        rx_channels: 3,
        flow_steering: true,
    };

    let hookup = setup_interrupts(&mut svc, &plan, &noop_handlers(3)).unwrap();
    assert_eq!(hookup.channel_count(), 3);
    assert!(svc.map_alive);

    hookup.teardown(&mut svc);
    assert!(!svc.map_alive);
    assert_eq!(svc.freed.len(), svc.hooked.len());
}
