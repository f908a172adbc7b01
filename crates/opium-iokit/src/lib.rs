//! Opium IOKit
//!
//! A registry of driver objects ("services") arranged as a provider/client
//! tree and bound into the BSD device tables:
//!
//! - **Properties**: tagged scalar dictionaries describing each service
//! - **Matching**: a service's personality selects its provider
//! - **Lifecycle**: probe, attach, start, publish
//! - **Publishing**: `IOBSDName`/`IOBSDType` services become BSD devices
//!
//! # Example
//!
//! ```text
//!   let mut registry = IoRegistry::new(hal, devices.clone());
//!   registry.add_service(IoConsole::new());
//!   registry.add_service(IoSerial::default());
//!   registry.match_and_start_devices();   // tty0 now in `devices`
//! ```

#![no_std]
extern crate alloc;

pub mod error;
pub mod invariants;
pub mod property;
pub mod registry;
pub mod service;
pub mod services;

pub use error::IoKitError;
pub use invariants::{check_registry_invariants, InvariantViolation};
pub use property::{keys, PropertyDictionary, PropertyValue};
pub use registry::{IoRegistry, PublishEvent, RegistryEntry, ServiceNode, ServiceState};
pub use service::{IoService, ServiceContext, ServiceId, ServiceRef};
pub use services::{DescriptorService, IoConsole, IoFramebuffer, IoSerial, ServiceDescriptor};
