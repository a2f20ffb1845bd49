// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for register access

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, TrapError>;

/// Errors that can occur while acquiring register access
///
/// Only establishing the mapping can fail. Once a port exists its word
/// reads and writes are infallible.
#[derive(Debug, Error)]
pub enum TrapError {
    /// The physical memory device could not be opened
    #[error("Cannot open {path}: {source}")]
    DeviceOpen {
        /// Device that was opened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A register page could not be mapped
    #[error("Failed to map register page {address:#010x}: {reason}")]
    MapFailed {
        /// Physical page address
        address: u64,
        /// Reason for failure
        reason: String,
    },

    /// The mapping does not cover a register word
    #[error("Mapping at {address:#010x} is {size} bytes, need {required}")]
    RegionTooSmall {
        /// Physical page address
        address: u64,
        /// Mapped length
        size: usize,
        /// Bytes needed to reach the last word
        required: usize,
    },
}

impl TrapError {
    /// Create a device open error
    pub fn device_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DeviceOpen {
            path: path.into(),
            source,
        }
    }

    /// Create a map failed error
    pub fn map_failed(address: u64, reason: impl Into<String>) -> Self {
        Self::MapFailed {
            address,
            reason: reason.into(),
        }
    }

    /// Create a region too small error
    pub fn region_too_small(address: u64, size: usize, required: usize) -> Self {
        Self::RegionTooSmall {
            address,
            size,
            required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_address() {
        let e = TrapError::map_failed(0x4120_0000, "Permission denied");
        assert_eq!(
            e.to_string(),
            "Failed to map register page 0x41200000: Permission denied"
        );

        let e = TrapError::region_too_small(0x4200_0000, 8, 12);
        assert!(e.to_string().contains("need 12"));
    }

    #[test]
    fn device_open_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e = TrapError::device_open("/dev/mem", io);
        assert!(e.to_string().starts_with("Cannot open /dev/mem"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
