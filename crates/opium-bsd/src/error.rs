//! Error types for the BSD device layer.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::device_id::{DeviceId, MajorId};

/// Which device-switch table an operation concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Byte-stream device (read/write)
    Character,
    /// Buffered device (strategy)
    Block,
}

impl DeviceKind {
    pub fn is_character(self) -> bool {
        matches!(self, DeviceKind::Character)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Character => f.write_str("character"),
            DeviceKind::Block => f.write_str("block"),
        }
    }
}

/// Errors from device-switch operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IoError {
    /// A device was added for a major with no registered switch.
    ///
    /// This is a caller bug: the switch must be registered first.
    SwitchNotRegistered {
        /// Table that was consulted
        kind: DeviceKind,
        /// Major number that had no switch
        major: MajorId,
    },

    /// The switch does not provide this operation
    NotSupported,

    /// The backing driver is already in use further up the call stack
    Busy(DeviceId),
}

impl IoError {
    /// Check if this is the "no switch registered" precondition failure.
    pub fn is_switch_not_registered(&self) -> bool {
        matches!(self, IoError::SwitchNotRegistered { .. })
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::SwitchNotRegistered { kind, major } => {
                write!(f, "{} device switch is not registered for major {}", kind, major)
            }
            IoError::NotSupported => f.write_str("operation not supported by device switch"),
            IoError::Busy(id) => write!(f, "device {} is busy", id),
        }
    }
}

/// Result alias for device-switch operations.
pub type IoResult<T> = Result<T, IoError>;
