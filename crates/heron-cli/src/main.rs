//! `heron` — command-line diagnostics for Heron NICs.
//!
//! ```text
//! USAGE:
//!   heron enumerate                 List all devices and their links
//!   heron info <device>             Detailed info for one device
//!   heron link <device>             Check link quality against design
//!   heron layout [--revision R]     Register dump layout and sizes
//!   heron stat-names                Visible MAC statistic names
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use heron_chip::pcie::{FULL_LINK_SPEED, FULL_LINK_WIDTH, MIN_LINK_BANDWIDTH};
use heron_chip::regdump::{OWORD_LEN, REGISTERS, TABLES};
use heron_chip::revision::Revision;
use heron_chip::stats::{full_mask, MAC_STATS, MAC_STATS_COUNT};
use heron_driver::{check_pcie_link, describe_stats, snapshot_len, DeviceManager, FileConfigSpace};

#[derive(Parser)]
#[command(name = "heron", about = "Heron NIC diagnostics CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List all Heron devices and their negotiated links.
    Enumerate,
    /// Print detailed information for one device.
    Info {
        /// PCIe address (e.g. 0000:03:00.0) or device index (e.g. 0).
        device: String,
    },
    /// Check one device's link against the designed capability.
    Link {
        /// PCIe address or device index.
        device: String,
        /// Minimum relative bandwidth to flag against.
        #[arg(long, default_value_t = MIN_LINK_BANDWIDTH)]
        min_bandwidth: u32,
    },
    /// Print the register dump layout and per-revision sizes.
    Layout {
        /// Restrict to one revision (A, B, C or D).
        #[arg(long)]
        revision: Option<String>,
    },
    /// Print the visible MAC statistic names.
    StatNames,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Enumerate => cmd_enumerate()?,
        Cmd::Info { device } => cmd_info(&device)?,
        Cmd::Link {
            device,
            min_bandwidth,
        } => cmd_link(&device, min_bandwidth)?,
        Cmd::Layout { revision } => cmd_layout(revision.as_deref())?,
        Cmd::StatNames => cmd_stat_names(),
    }

    Ok(())
}

fn cmd_enumerate() -> Result<()> {
    let mgr = DeviceManager::discover()?;

    println!("Heron devices: {}", mgr.device_count());
    println!();

    for info in mgr.devices() {
        println!(
            "[{}] {} rev {:?} @ {}",
            info.index,
            info.variant.name(),
            info.revision,
            info.pcie_address
        );
        match info.link {
            Some(link) => println!("     PCIe  Gen{} x{}", link.generation, link.lanes),
            None => println!("     PCIe  link not reported"),
        }
        println!();
    }

    Ok(())
}

fn resolve(mgr: &DeviceManager, device: &str) -> Result<heron_driver::DeviceInfo> {
    if let Ok(idx) = device.parse::<usize>() {
        return Ok(mgr.device(idx)?.clone());
    }
    mgr.devices()
        .iter()
        .find(|d| d.pcie_address == device)
        .cloned()
        .ok_or_else(|| anyhow!("no Heron device at {device}"))
}

fn cmd_info(device: &str) -> Result<()> {
    let mgr = DeviceManager::discover()?;
    let info = resolve(&mgr, device)?;

    println!("{} @ {}", info.variant.name(), info.pcie_address);
    println!("  revision   {:?}", info.revision);
    println!("  ports      {}", info.variant.port_count());
    println!("  dump size  {} bytes", snapshot_len(info.revision));
    if let Some(link) = info.link {
        println!("  link       Gen{} x{}", link.generation, link.lanes);
    }

    Ok(())
}

fn cmd_link(device: &str, min_bandwidth: u32) -> Result<()> {
    let mgr = DeviceManager::discover()?;
    let info = resolve(&mgr, device)?;

    let cfg = FileConfigSpace::from_sysfs(&info.pcie_address)?;
    let width = check_pcie_link(&cfg, FULL_LINK_WIDTH, FULL_LINK_SPEED, min_bandwidth);

    if width == 0 {
        println!(
            "link status unreadable (run as root to see the capability list)"
        );
    } else {
        println!(
            "negotiated width x{width} (designed x{FULL_LINK_WIDTH} Gen{FULL_LINK_SPEED})"
        );
    }

    Ok(())
}

fn cmd_layout(revision: Option<&str>) -> Result<()> {
    let revisions: Vec<Revision> = match revision {
        None => Revision::ALL.to_vec(),
        Some(s) => vec![parse_revision(s)?],
    };

    for rev in revisions {
        let regs = REGISTERS.iter().filter(|r| r.exists_at(rev)).count();
        let tables = TABLES.iter().filter(|t| t.exists_at(rev)).count();
        println!(
            "rev {rev:?}: {regs} registers ({} bytes) + {tables} tables = {} bytes total",
            regs * OWORD_LEN,
            snapshot_len(rev)
        );
    }

    Ok(())
}

fn parse_revision(s: &str) -> Result<Revision> {
    match s.to_ascii_uppercase().as_str() {
        "A" => Ok(Revision::A),
        "B" => Ok(Revision::B),
        "C" => Ok(Revision::C),
        "D" => Ok(Revision::D),
        other => Err(anyhow!("unknown revision {other:?} (expected A, B, C or D)")),
    }
}

fn cmd_stat_names() {
    let mask = full_mask(MAC_STATS_COUNT);
    let visible = describe_stats(MAC_STATS, &mask, None);
    println!("{visible} visible statistics:");
    for desc in MAC_STATS {
        if let Some(name) = desc.name {
            if desc.dma_width == 0 {
                println!("  {name} (software)");
            } else {
                println!("  {name} ({}-bit @ {:#x})", desc.dma_width, desc.offset);
            }
        }
    }
}
