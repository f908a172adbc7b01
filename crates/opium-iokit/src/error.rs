//! Error types for the service registry.

use core::fmt;

use opium_bsd::IoError;

use crate::service::ServiceId;

/// Errors from registry operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IoKitError {
    /// No service with this ID is registered
    ServiceNotFound(ServiceId),

    /// The service already has a provider; detach it first
    AlreadyAttached {
        service: ServiceId,
        provider: ServiceId,
    },

    /// Attaching would make the service its own ancestor
    WouldCycle {
        service: ServiceId,
        provider: ServiceId,
    },

    /// The driver object is borrowed further up the call stack
    ServiceBusy(ServiceId),

    /// Device-switch registration failed
    Io(IoError),
}

impl From<IoError> for IoKitError {
    fn from(e: IoError) -> Self {
        IoKitError::Io(e)
    }
}

impl fmt::Display for IoKitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoKitError::ServiceNotFound(id) => write!(f, "service {} not found", id.0),
            IoKitError::AlreadyAttached { service, provider } => {
                write!(f, "service {} already attached to {}", service.0, provider.0)
            }
            IoKitError::WouldCycle { service, provider } => write!(
                f,
                "attaching service {} to {} would create a cycle",
                service.0, provider.0
            ),
            IoKitError::ServiceBusy(id) => write!(f, "service {} is busy", id.0),
            IoKitError::Io(e) => write!(f, "{}", e),
        }
    }
}
