//! Error types for Heron driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Heron operations
pub type Result<T> = std::result::Result<T, HeronError>;

/// Errors that can occur during Heron driver operations
#[derive(Debug, Error)]
pub enum HeronError {
    /// Device not found at the expected path
    #[error("Device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// No Heron devices detected on the system
    #[error("No Heron devices detected")]
    NoDevicesFound,

    /// Device index out of range
    #[error("Device index {index} out of range (have {count} devices)")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of available devices
        count: usize,
    },

    /// I/O error during device communication
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Interrupt line could not be acquired
    #[error("Failed to hook IRQ {line}: {reason}")]
    IrqRequestFailed {
        /// Interrupt line number
        line: u32,
        /// Reason for failure
        reason: String,
    },

    /// CPU affinity map allocation or population failed
    #[error("Affinity map failure: {reason}")]
    AffinityMapFailed {
        /// Reason for failure
        reason: String,
    },

    /// BAR region could not be queried or mapped
    #[error("Failed to map register space: {reason}")]
    RegionMapFailed {
        /// Reason for failure
        reason: String,
    },

    /// Device identification or sysfs query failed
    #[error("Failed to query device: {reason}")]
    QueryFailed {
        /// Reason for failure
        reason: String,
    },

    /// Self-test could not generate a test event or interrupt
    #[error("Self-test failed: {reason}")]
    SelfTestFailed {
        /// Reason for failure
        reason: String,
    },
}

impl HeronError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create an IRQ request failure
    pub fn irq_request_failed(line: u32, reason: impl Into<String>) -> Self {
        Self::IrqRequestFailed {
            line,
            reason: reason.into(),
        }
    }

    /// Create an affinity map failure
    pub fn affinity_map_failed(reason: impl Into<String>) -> Self {
        Self::AffinityMapFailed {
            reason: reason.into(),
        }
    }

    /// Create a region map failure
    pub fn region_map_failed(reason: impl Into<String>) -> Self {
        Self::RegionMapFailed {
            reason: reason.into(),
        }
    }

    /// Create a device query failure
    pub fn query_failed(reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            reason: reason.into(),
        }
    }
}
