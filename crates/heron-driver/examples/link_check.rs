//! Check every discovered Heron device's link against its design.
//!
//! Run as root to see the full capability list; unprivileged runs see a
//! truncated config space and report width 0.

use heron_chip::pcie::{FULL_LINK_SPEED, FULL_LINK_WIDTH, MIN_LINK_BANDWIDTH};
use heron_driver::{check_pcie_link, DeviceManager, FileConfigSpace};

fn main() -> anyhow::Result<()> {
    let mgr = DeviceManager::discover()?;

    for info in mgr.devices() {
        let cfg = FileConfigSpace::from_sysfs(&info.pcie_address)?;
        let width = check_pcie_link(&cfg, FULL_LINK_WIDTH, FULL_LINK_SPEED, MIN_LINK_BANDWIDTH);
        println!(
            "{} @ {}: negotiated x{width} (designed x{FULL_LINK_WIDTH} Gen{FULL_LINK_SPEED})",
            info.variant.name(),
            info.pcie_address
        );
    }

    Ok(())
}
