//! Userspace diagnostics driver for Heron series Ethernet controllers.
//!
//! Everything revision-specific is data: the register/table catalogs and
//! the MAC statistics layout live in [`heron_chip`], and the engines here
//! walk them. Hardware access goes through narrow traits
//! ([`RegisterIo`], [`ConfigSpace`], [`IrqService`]) so the same engines
//! run against a VFIO-mapped BAR or against mocks in tests.
//!
//! # Quick start
//!
//! ```no_run
//! use heron_driver::DeviceManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mgr = DeviceManager::discover()?;
//! for dev in mgr.devices() {
//!     println!(
//!         "{} @ {} rev {:?}",
//!         dev.variant.name(),
//!         dev.pcie_address,
//!         dev.revision
//!     );
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod device;
mod discovery;
mod dma;
mod error;
pub mod irq;
pub mod mmio;
pub mod pcie_link;
mod regio;
pub mod snapshot;
pub mod stats;

pub use device::{Channel, HeronNic};
pub use discovery::{DeviceInfo, DeviceManager, LinkInfo};
pub use dma::DmaBuffer;
pub use error::{HeronError, Result};
pub use irq::{
    negotiate_irq_plan, setup_interrupts, AffinityHandle, IrqHandler, IrqHandlers, IrqHookup,
    IrqMode, IrqPlan, IrqService, IrqToken, SelfTestCell, TestEventGenerator, VectorAllocator,
};
pub use pcie_link::{check_pcie_link, ConfigSpace, FileConfigSpace};
pub use regio::RegisterIo;
pub use snapshot::{fill_snapshot, snapshot_len};
pub use stats::{describe_stats, update_stats, DropCorrection};
