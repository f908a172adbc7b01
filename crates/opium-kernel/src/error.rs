//! Kernel error type.

use alloc::string::String;
use core::fmt;

use opium_bsd::IoError;
use opium_iokit::IoKitError;
use opium_vfs::VfsError;

/// Errors from kernel-level operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Device-switch error
    Io(IoError),
    /// Service registry error
    IoKit(IoKitError),
    /// Filesystem error
    Vfs(VfsError),
    /// Boot configuration could not be parsed or is invalid
    Config(String),
    /// `boot` was called on a booted kernel
    AlreadyBooted,
}

impl From<IoError> for KernelError {
    fn from(e: IoError) -> Self {
        KernelError::Io(e)
    }
}

impl From<IoKitError> for KernelError {
    fn from(e: IoKitError) -> Self {
        KernelError::IoKit(e)
    }
}

impl From<VfsError> for KernelError {
    fn from(e: VfsError) -> Self {
        KernelError::Vfs(e)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Io(e) => write!(f, "io: {}", e),
            KernelError::IoKit(e) => write!(f, "iokit: {}", e),
            KernelError::Vfs(e) => write!(f, "vfs: {}", e),
            KernelError::Config(msg) => write!(f, "config: {}", msg),
            KernelError::AlreadyBooted => f.write_str("kernel already booted"),
        }
    }
}
