//! Interrupt lifecycle: mode negotiation, hookup, teardown, self-test.
//!
//! Line acquisition and CPU-affinity-map registration belong to the
//! owning environment and are consumed through [`IrqService`] — the
//! lifecycle only sees opaque tokens. Three modes:
//!
//! - **Legacy** — one shared line, one handler, no partial-failure case.
//! - **MSI** — one non-shared line per channel.
//! - **MSI-X** — as MSI, plus CPU-affinity hints, plus receive-flow
//!   steering for channels in the receive range.
//!
//! [`negotiate_irq_plan`] walks that ladder top-down at bring-up,
//! settling on the best mode the environment grants vectors for.
//!
//! Channels hook in channel order. If hooking channel *k* fails, every
//! line hooked before it is released in reverse, then any affinity map,
//! and only then is the failure surfaced — a failed setup leaves
//! nothing behind.
//!
//! Handlers run in the platform's interrupt-dispatch context and must
//! not block; the self-test cells are synchronized by a fence plus
//! external polling only, with the polling side owning the timeout.

use std::sync::atomic::{fence, AtomicI32, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Interrupt delivery mode negotiated at bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqMode {
    /// One shared INTx line for the whole device.
    Legacy,
    /// One message-signaled line per channel.
    Msi,
    /// Per-channel lines with affinity hints and flow steering.
    MsiX,
}

/// Opaque token for one hooked interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqToken(pub u64);

/// Opaque handle for a CPU affinity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityHandle(pub u64);

/// Handler the environment dispatches when a hooked line fires.
///
/// Runs in the platform's interrupt-dispatch context, concurrently
/// across channels, and must not block. The argument is the servicing
/// CPU.
pub type IrqHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Interrupt services provided by the owning environment.
///
/// `request_line`/`free_line` are the line-registration service; the
/// affinity-map trio is the optional CPU-affinity service, consumed only
/// in the MSI-X + flow-steering configuration.
pub trait IrqService {
    /// Hook `line`, attaching `handler`, returning a token for release.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be acquired.
    fn request_line(
        &mut self,
        line: u32,
        shared: bool,
        name: &str,
        handler: IrqHandler,
    ) -> Result<IrqToken>;

    /// Release a previously hooked line.
    fn free_line(&mut self, token: IrqToken);

    /// Allocate an affinity map sized for `rx_lines` receive channels.
    ///
    /// # Errors
    ///
    /// Returns an error on resource exhaustion.
    fn alloc_affinity_map(&mut self, rx_lines: usize) -> Result<AffinityHandle>;

    /// Register one line with the affinity map.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be added.
    fn affinity_map_add(&mut self, map: AffinityHandle, line: u32) -> Result<()>;

    /// Release an affinity map.
    fn free_affinity_map(&mut self, map: AffinityHandle);
}

/// Message-signaled vector allocation, provided by the environment.
///
/// Consumed only during mode negotiation; the granted lines are then
/// hooked through [`IrqService`].
pub trait VectorAllocator {
    /// Enable MSI-X with `vectors` vectors, returning one line per
    /// vector.
    ///
    /// # Errors
    ///
    /// Returns an error if MSI-X cannot be enabled with that many
    /// vectors.
    fn enable_msix(&mut self, vectors: usize) -> Result<Vec<u32>>;

    /// Enable plain MSI, returning its single line.
    ///
    /// # Errors
    ///
    /// Returns an error if MSI cannot be enabled.
    fn enable_msi(&mut self) -> Result<u32>;
}

/// What to hook: produced at bring-up from the negotiated mode and the
/// channel layout.
#[derive(Debug, Clone)]
pub struct IrqPlan {
    /// Negotiated delivery mode.
    pub mode: IrqMode,
    /// Device name, used for the legacy line and as the channel-name stem.
    pub name: String,
    /// The shared line used in legacy mode.
    pub legacy_line: u32,
    /// One line per channel, in channel order.
    pub channel_lines: Vec<u32>,
    /// Channels `0..rx_channels` are receive channels.
    pub rx_channels: usize,
    /// Whether receive flow steering is enabled (MSI-X only).
    pub flow_steering: bool,
}

/// Negotiate the delivery mode for `channels` channels, falling back
/// MSI-X → MSI → legacy.
///
/// MSI-X wants one vector per channel; when the environment cannot
/// grant that, the ladder drops to single-vector MSI, and failing that
/// to the shared legacy line. Flow steering and per-channel lines only
/// survive the MSI-X rung.
pub fn negotiate_irq_plan(
    alloc: &mut dyn VectorAllocator,
    name: &str,
    legacy_line: u32,
    channels: usize,
    rx_channels: usize,
    flow_steering: bool,
) -> IrqPlan {
    match alloc.enable_msix(channels) {
        Ok(channel_lines) => {
            return IrqPlan {
                mode: IrqMode::MsiX,
                name: name.to_owned(),
                legacy_line,
                channel_lines,
                rx_channels,
                flow_steering,
            };
        }
        Err(err) => tracing::warn!(%err, channels, "could not enable MSI-X, falling back to MSI"),
    }

    match alloc.enable_msi() {
        Ok(line) => IrqPlan {
            mode: IrqMode::Msi,
            name: name.to_owned(),
            legacy_line,
            channel_lines: vec![line],
            rx_channels: rx_channels.min(1),
            flow_steering: false,
        },
        Err(err) => {
            tracing::warn!(%err, "could not enable MSI, falling back to legacy");
            IrqPlan {
                mode: IrqMode::Legacy,
                name: name.to_owned(),
                legacy_line,
                channel_lines: Vec::new(),
                rx_channels: 0,
                flow_steering: false,
            }
        }
    }
}

/// Handlers to attach at setup: the shared legacy handler plus one per
/// channel, in channel order.
#[derive(Clone)]
pub struct IrqHandlers {
    /// Handler for the shared legacy line.
    pub legacy: IrqHandler,
    /// Per-channel handlers, same order as the plan's `channel_lines`.
    pub channel: Vec<IrqHandler>,
}

/// Everything that was hooked at setup, needed to mirror it at teardown.
#[derive(Debug)]
pub struct IrqHookup {
    mode: IrqMode,
    legacy: Option<IrqToken>,
    channels: Vec<IrqToken>,
    affinity: Option<AffinityHandle>,
}

impl IrqHookup {
    /// The mode this hookup was negotiated with.
    pub fn mode(&self) -> IrqMode {
        self.mode
    }

    /// Number of hooked channel lines (0 in legacy mode).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Release everything negotiated at setup, mirroring it exactly:
    /// the affinity map first when one exists, then every line.
    pub fn teardown(self, svc: &mut dyn IrqService) {
        if let Some(map) = self.affinity {
            svc.free_affinity_map(map);
        }
        for token in self.channels {
            svc.free_line(token);
        }
        if let Some(token) = self.legacy {
            svc.free_line(token);
        }
        tracing::debug!("interrupts torn down");
    }
}

/// Hook interrupt handler(s) per `plan`.
///
/// Legacy hooks the single shared line with `handlers.legacy`. MSI and
/// MSI-X hook one line per channel in channel order with the matching
/// channel handler; MSI-X with flow steering also allocates an affinity
/// map and registers each receive channel's line with it.
///
/// # Errors
///
/// Returns the underlying failure after fully unwinding anything already
/// hooked in this attempt.
///
/// # Panics
///
/// Panics if `handlers.channel` is shorter than the plan's
/// `channel_lines`.
pub fn setup_interrupts(
    svc: &mut dyn IrqService,
    plan: &IrqPlan,
    handlers: &IrqHandlers,
) -> Result<IrqHookup> {
    if plan.mode == IrqMode::Legacy {
        let token = svc
            .request_line(plan.legacy_line, true, &plan.name, handlers.legacy.clone())
            .inspect_err(|_| {
                tracing::warn!(line = plan.legacy_line, "failed to hook legacy IRQ");
            })?;
        return Ok(IrqHookup {
            mode: plan.mode,
            legacy: Some(token),
            channels: Vec::new(),
            affinity: None,
        });
    }

    let affinity = if plan.mode == IrqMode::MsiX && plan.flow_steering {
        Some(svc.alloc_affinity_map(plan.rx_channels)?)
    } else {
        None
    };

    let mut hooked = Vec::with_capacity(plan.channel_lines.len());
    for (index, &line) in plan.channel_lines.iter().enumerate() {
        let outcome = svc
            .request_line(
                line,
                false,
                &format!("{}-{index}", plan.name),
                handlers.channel[index].clone(),
            )
            .and_then(|token| {
                hooked.push(token);
                match affinity {
                    Some(map) if index < plan.rx_channels => svc.affinity_map_add(map, line),
                    _ => Ok(()),
                }
            });

        if let Err(err) = outcome {
            tracing::warn!(line, channel = index, "failed to hook IRQ, unwinding");
            while let Some(token) = hooked.pop() {
                svc.free_line(token);
            }
            if let Some(map) = affinity {
                svc.free_affinity_map(map);
            }
            return Err(err);
        }
    }

    tracing::debug!(
        mode = ?plan.mode,
        channels = hooked.len(),
        "interrupts hooked"
    );

    Ok(IrqHookup {
        mode: plan.mode,
        legacy: None,
        channels: hooked,
        affinity,
    })
}

/// Sentinel meaning "no event/interrupt seen since the test was armed".
pub const CPU_NONE: i32 = -1;

/// "Last seen on CPU" cell shared between a handler and the self-test.
///
/// The writer arms the cell and publishes the sentinel with a fence
/// before triggering a synthetic event; the handler records the
/// servicing CPU; the diagnostic side polls [`seen`](Self::seen) with
/// its own timeout. No blocking primitive is involved.
#[derive(Debug)]
pub struct SelfTestCell(AtomicI32);

impl Default for SelfTestCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SelfTestCell {
    /// A cell in the "nothing seen" state.
    pub fn new() -> Self {
        Self(AtomicI32::new(CPU_NONE))
    }

    /// Reset to the sentinel and make that visible before the caller
    /// asks the device to generate a test event.
    pub fn arm(&self) {
        self.0.store(CPU_NONE, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    /// Record the servicing CPU. Called from interrupt context; must not
    /// block, and does not.
    pub fn record(&self, cpu: i32) {
        self.0.store(cpu, Ordering::Relaxed);
    }

    /// The CPU that serviced the test event, once one has.
    pub fn seen(&self) -> Option<i32> {
        match self.0.load(Ordering::Relaxed) {
            CPU_NONE => None,
            cpu => Some(cpu),
        }
    }
}

/// Device-side hooks that synthesize one test event or interrupt.
pub trait TestEventGenerator {
    /// Ask the device to post one synthetic event to `channel`'s queue.
    fn generate_test_event(&mut self, channel: usize);

    /// Ask the device to raise one interrupt.
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses the request.
    fn generate_test_irq(&mut self) -> Result<()>;
}

/// Arm `cell` and trigger a synthetic event on `channel`.
///
/// Completion is observed externally by polling the cell.
pub fn event_test_start(cell: &SelfTestCell, channel: usize, gen: &mut dyn TestEventGenerator) {
    cell.arm();
    gen.generate_test_event(channel);
}

/// Arm `cell` and trigger a synthetic interrupt.
///
/// # Errors
///
/// Returns an error if the device refuses to generate the interrupt.
pub fn irq_test_start(cell: &SelfTestCell, gen: &mut dyn TestEventGenerator) -> Result<()> {
    cell.arm();
    gen.generate_test_irq()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeronError;

    #[derive(Default)]
    struct MockIrq {
        next_token: u64,
        calls: Vec<String>,
        handlers: Vec<IrqHandler>,
        fail_on_line: Option<u32>,
        fail_affinity_alloc: bool,
    }

    impl IrqService for MockIrq {
        fn request_line(
            &mut self,
            line: u32,
            shared: bool,
            name: &str,
            handler: IrqHandler,
        ) -> Result<IrqToken> {
            if self.fail_on_line == Some(line) {
                self.calls.push(format!("request_fail {line}"));
                return Err(HeronError::irq_request_failed(line, "busy"));
            }
            self.next_token += 1;
            self.calls.push(format!("request {line} shared={shared} {name}"));
            self.handlers.push(handler);
            Ok(IrqToken(self.next_token))
        }

        fn free_line(&mut self, token: IrqToken) {
            self.calls.push(format!("free {}", token.0));
        }

        fn alloc_affinity_map(&mut self, rx_lines: usize) -> Result<AffinityHandle> {
            if self.fail_affinity_alloc {
                return Err(HeronError::affinity_map_failed("no memory"));
            }
            self.calls.push(format!("rmap_alloc {rx_lines}"));
            Ok(AffinityHandle(99))
        }

        fn affinity_map_add(&mut self, map: AffinityHandle, line: u32) -> Result<()> {
            self.calls.push(format!("rmap_add {} {line}", map.0));
            Ok(())
        }

        fn free_affinity_map(&mut self, map: AffinityHandle) {
            self.calls.push(format!("rmap_free {}", map.0));
        }
    }

    fn plan(mode: IrqMode) -> IrqPlan {
        IrqPlan {
            mode,
            name: "heron0".into(),
            legacy_line: 11,
            channel_lines: vec![32, 33, 34, 35],
            rx_channels: 2,
            flow_steering: true,
        }
    }

    fn noop_handlers(channels: usize) -> IrqHandlers {
        IrqHandlers {
            legacy: Arc::new(|_| {}),
            channel: (0..channels).map(|_| Arc::new(|_| {}) as IrqHandler).collect(),
        }
    }

    #[test]
    fn legacy_hooks_one_shared_line() {
        let mut svc = MockIrq::default();
        let hookup = setup_interrupts(&mut svc, &plan(IrqMode::Legacy), &noop_handlers(4)).unwrap();
        assert_eq!(svc.calls, vec!["request 11 shared=true heron0"]);
        assert_eq!(hookup.channel_count(), 0);

        hookup.teardown(&mut svc);
        assert_eq!(svc.calls.last().unwrap(), "free 1");
    }

    #[test]
    fn msi_hooks_every_channel_without_affinity() {
        let mut svc = MockIrq::default();
        let hookup = setup_interrupts(&mut svc, &plan(IrqMode::Msi), &noop_handlers(4)).unwrap();
        assert_eq!(hookup.channel_count(), 4);
        assert!(svc.calls.iter().all(|c| !c.starts_with("rmap")));
        assert!(svc.calls[0].ends_with("heron0-0"));
    }

    #[test]
    fn msix_registers_rx_channels_with_affinity_map() {
        let mut svc = MockIrq::default();
        let hookup = setup_interrupts(&mut svc, &plan(IrqMode::MsiX), &noop_handlers(4)).unwrap();
        let adds: Vec<_> = svc
            .calls
            .iter()
            .filter(|c| c.starts_with("rmap_add"))
            .collect();
        assert_eq!(adds, vec!["rmap_add 99 32", "rmap_add 99 33"]);

        hookup.teardown(&mut svc);
        // Teardown mirrors setup: map first, then the lines.
        let tail: Vec<_> = svc.calls.iter().rev().take(5).rev().collect();
        assert_eq!(tail, vec!["rmap_free 99", "free 1", "free 2", "free 3", "free 4"]);
    }

    #[test]
    fn failure_mid_hookup_unwinds_in_reverse_then_frees_map() {
        let mut svc = MockIrq {
            fail_on_line: Some(34), // channel 2 (the third)
            ..MockIrq::default()
        };
        let err =
            setup_interrupts(&mut svc, &plan(IrqMode::MsiX), &noop_handlers(4)).unwrap_err();
        assert!(matches!(err, HeronError::IrqRequestFailed { line: 34, .. }));

        // Exactly two lines were hooked, so exactly two frees, newest
        // first, then the affinity map. Nothing left hooked.
        let frees: Vec<_> = svc
            .calls
            .iter()
            .filter(|c| c.starts_with("free") || c.starts_with("rmap_free"))
            .collect();
        assert_eq!(frees, vec!["free 2", "free 1", "rmap_free 99"]);
    }

    #[test]
    fn affinity_alloc_failure_hooks_nothing() {
        let mut svc = MockIrq {
            fail_affinity_alloc: true,
            ..MockIrq::default()
        };
        let err =
            setup_interrupts(&mut svc, &plan(IrqMode::MsiX), &noop_handlers(4)).unwrap_err();
        assert!(matches!(err, HeronError::AffinityMapFailed { .. }));
        assert!(svc.calls.is_empty());
    }

    #[test]
    fn hooked_handler_is_the_one_dispatched() {
        let cell = Arc::new(SelfTestCell::new());
        let recorder = Arc::clone(&cell);
        let handlers = IrqHandlers {
            legacy: Arc::new(move |cpu| recorder.record(cpu)),
            channel: Vec::new(),
        };

        let mut svc = MockIrq::default();
        setup_interrupts(&mut svc, &plan(IrqMode::Legacy), &handlers).unwrap();

        // The environment dispatching the hooked line must reach the cell.
        (svc.handlers[0])(5);
        assert_eq!(cell.seen(), Some(5));
    }

    #[derive(Default)]
    struct MockAlloc {
        msix_grant: Option<Vec<u32>>,
        msi_grant: Option<u32>,
    }

    impl VectorAllocator for MockAlloc {
        fn enable_msix(&mut self, vectors: usize) -> Result<Vec<u32>> {
            match &self.msix_grant {
                Some(lines) if lines.len() >= vectors => Ok(lines[..vectors].to_vec()),
                _ => Err(HeronError::irq_request_failed(0, "MSI-X unavailable")),
            }
        }

        fn enable_msi(&mut self) -> Result<u32> {
            self.msi_grant
                .ok_or_else(|| HeronError::irq_request_failed(0, "MSI unavailable"))
        }
    }

    #[test]
    fn negotiation_prefers_msix() {
        let mut alloc = MockAlloc {
            msix_grant: Some(vec![60, 61, 62, 63]),
            msi_grant: Some(40),
        };
        let plan = negotiate_irq_plan(&mut alloc, "heron0", 11, 4, 2, true);
        assert_eq!(plan.mode, IrqMode::MsiX);
        assert_eq!(plan.channel_lines, vec![60, 61, 62, 63]);
        assert!(plan.flow_steering);
    }

    #[test]
    fn negotiation_falls_back_to_msi_then_legacy() {
        let mut alloc = MockAlloc {
            msix_grant: None,
            msi_grant: Some(40),
        };
        let plan = negotiate_irq_plan(&mut alloc, "heron0", 11, 4, 2, true);
        assert_eq!(plan.mode, IrqMode::Msi);
        assert_eq!(plan.channel_lines, vec![40]);
        assert!(!plan.flow_steering, "steering is MSI-X only");

        let mut alloc = MockAlloc::default();
        let plan = negotiate_irq_plan(&mut alloc, "heron0", 11, 4, 2, true);
        assert_eq!(plan.mode, IrqMode::Legacy);
        assert!(plan.channel_lines.is_empty());
        assert_eq!(plan.legacy_line, 11);
    }

    #[test]
    fn self_test_cell_round_trip() {
        let cell = SelfTestCell::new();
        assert_eq!(cell.seen(), None);
        cell.record(3);
        assert_eq!(cell.seen(), Some(3));
        cell.arm();
        assert_eq!(cell.seen(), None);
    }

    #[derive(Default)]
    struct MockGen {
        events: Vec<usize>,
        irqs: usize,
    }

    impl TestEventGenerator for MockGen {
        fn generate_test_event(&mut self, channel: usize) {
            self.events.push(channel);
        }

        fn generate_test_irq(&mut self) -> Result<()> {
            self.irqs += 1;
            Ok(())
        }
    }

    #[test]
    fn test_starts_arm_before_triggering() {
        let cell = SelfTestCell::new();
        cell.record(7);

        let mut gen = MockGen::default();
        event_test_start(&cell, 2, &mut gen);
        assert_eq!(cell.seen(), None, "armed before the trigger");
        assert_eq!(gen.events, vec![2]);

        cell.record(1);
        irq_test_start(&cell, &mut gen).unwrap();
        assert_eq!(cell.seen(), None);
        assert_eq!(gen.irqs, 1);
    }
}
