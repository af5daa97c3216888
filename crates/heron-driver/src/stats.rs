//! MAC statistics decode and correction.
//!
//! The MAC DMAs its counters into a host buffer; [`update_stats`]
//! converts that raw image into `u64` counters, either storing or
//! accumulating. [`describe_stats`] enumerates the visible counter names
//! for reporting tools — called once without a name buffer to learn how
//! many slots to allocate, then again with one.
//!
//! [`DropCorrection`] removes descriptor-drop events that occurred while
//! the link was down, so the reported counter reflects only up-time
//! drops.

use heron_chip::stats::{set_bits, StatDesc, STAT_NAME_LEN};

/// Enumerate visible statistics and optionally copy their names.
///
/// Walks the set bit positions of `mask` (bounded by `descs.len()`); for
/// each descriptor with a display name, copies a NUL-terminated,
/// truncated name into the next slot of `names` when one is supplied.
///
/// Returns the number of visible statistics whether or not `names` was
/// supplied, so callers can size the name buffer with a first call.
pub fn describe_stats(
    descs: &[StatDesc],
    mask: &[u64],
    mut names: Option<&mut [[u8; STAT_NAME_LEN]]>,
) -> usize {
    let mut visible = 0;

    for index in set_bits(mask, descs.len()) {
        let Some(name) = descs[index].name else {
            continue;
        };
        if let Some(slots) = names.as_deref_mut() {
            let slot = &mut slots[visible];
            slot.fill(0);
            let len = name.len().min(STAT_NAME_LEN - 1);
            slot[..len].copy_from_slice(&name.as_bytes()[..len]);
        }
        visible += 1;
    }

    visible
}

/// Convert a statistics DMA buffer to an array of `u64` counters.
///
/// For each enabled descriptor with a non-zero DMA width, reads the
/// little-endian field at the descriptor's byte offset in `dma_buf` and
/// stores it into `stats[index]`, or adds it when `accumulate` is set.
/// Descriptors with width 0 are skipped entirely — their output slot is
/// left untouched, so callers pre-initialize or maintain those
/// separately.
///
/// A width outside {16, 32, 64} is a programming error in the static
/// tables: it is logged and the value treated as zero rather than read
/// out of bounds.
///
/// # Panics
///
/// Panics if `stats` is shorter than `descs` or `dma_buf` does not cover
/// a descriptor's field.
pub fn update_stats(
    descs: &[StatDesc],
    mask: &[u64],
    stats: &mut [u64],
    dma_buf: &[u8],
    accumulate: bool,
) {
    for index in set_bits(mask, descs.len()) {
        let desc = &descs[index];
        if desc.dma_width == 0 {
            continue;
        }

        let at = desc.offset;
        let val = match desc.dma_width {
            16 => u64::from(u16::from_le_bytes(dma_buf[at..at + 2].try_into().unwrap())),
            32 => u64::from(u32::from_le_bytes(dma_buf[at..at + 4].try_into().unwrap())),
            64 => u64::from_le_bytes(dma_buf[at..at + 8].try_into().unwrap()),
            width => {
                tracing::error!(index, width, "unsupported DMA width in stat table");
                0
            }
        };

        if accumulate {
            stats[index] += val;
        } else {
            stats[index] = val;
        }
    }
}

/// Link-down correction state for the descriptor-drop counter.
///
/// The hardware counts descriptor drops whether or not the link is up,
/// and drops while down are expected (nothing is consuming). This state
/// splits the raw cumulative total into an up-time part and a down-time
/// bucket. Single-writer: call [`apply`](Self::apply) from the periodic
/// statistics refresh only, at most once per sample period — repeated
/// calls across a state change double-count the delta.
#[derive(Debug, Default, Clone)]
pub struct DropCorrection {
    /// Raw cumulative total last reported by hardware.
    total: u64,
    /// Cumulative drops attributed to link-down time.
    while_down: u64,
    /// Link state observed at the previous sample.
    prev_link_up: bool,
}

impl DropCorrection {
    /// Fresh state, as at device (re)initialization.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the current sample into the correction state and rewrite
    /// `raw_total` to count only drops that occurred while the link was
    /// up.
    ///
    /// The delta since the previous sample is attributed to down-time if
    /// the link is down now *or* this is the first sample since the link
    /// state changed — so the first sample after link-up still books its
    /// whole delta as down-time.
    pub fn apply(&mut self, link_up: bool, raw_total: &mut u64) {
        // Wrapping: the hardware counter is modular and may reset.
        if !link_up || !self.prev_link_up {
            self.while_down = self
                .while_down
                .wrapping_add(raw_total.wrapping_sub(self.total));
        }
        self.total = *raw_total;
        self.prev_link_up = link_up;
        *raw_total = raw_total.wrapping_sub(self.while_down);
    }

    /// Cumulative drops attributed to down-time so far.
    #[must_use]
    pub fn dropped_while_down(&self) -> u64 {
        self.while_down
    }
}
