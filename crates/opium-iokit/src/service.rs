//! The `IoService` trait and the context handed to its lifecycle hooks.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use serde::{Deserialize, Serialize};

use opium_bsd::{IoError, IoResult};

use crate::property::{keys, PropertyDictionary, PropertyValue};
use crate::registry::ServiceNode;

/// Registry-assigned service identifier. Ascending, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub u64);

/// Shared handle to a driver object.
pub type ServiceRef = Rc<RefCell<dyn IoService>>;

/// Polymorphic behaviour of a service.
///
/// Every hook has a default, so a service only implements what differs:
/// `probe`/`start` accept, `read` yields nothing, `write` discards, block
/// `strategy` is unsupported.
pub trait IoService {
    /// Declare the service's properties and personality.
    ///
    /// Called once, by `IoRegistry::add_service`, before the service gets
    /// an ID.
    fn configure(
        &mut self,
        _properties: &mut PropertyDictionary,
        _personality: &mut PropertyDictionary,
    ) {
    }

    /// Called once, right after the registry has assigned the service its ID.
    fn registered(&mut self, _id: ServiceId) {}

    /// Decide whether the service should take part in matching at all.
    fn probe(&mut self, _ctx: &mut ServiceContext<'_>) -> bool {
        true
    }

    /// Bring the service up after it has been attached to its provider.
    fn start(&mut self, _ctx: &mut ServiceContext<'_>) -> bool {
        true
    }

    /// A client process opens the service.
    fn open(&mut self, _pid: u64) -> bool {
        true
    }

    /// A client process closes the service.
    fn close(&mut self, _pid: u64) -> bool {
        true
    }

    /// Data the device offers for reading.
    fn read(&mut self) -> String {
        String::new()
    }

    /// Data written into the device.
    fn write(&mut self, _data: &str) {}

    /// Block transfer.
    fn strategy(&mut self, _buf: &mut [u8]) -> IoResult<usize> {
        Err(IoError::NotSupported)
    }
}

/// View of the registry handed to `probe`/`start`.
///
/// Gives mutable access to the service's own properties and read access to
/// every other service.
pub struct ServiceContext<'a> {
    id: ServiceId,
    properties: &'a mut PropertyDictionary,
    personality: &'a PropertyDictionary,
    registry: &'a BTreeMap<ServiceId, ServiceNode>,
}

impl<'a> ServiceContext<'a> {
    pub(crate) fn new(
        id: ServiceId,
        properties: &'a mut PropertyDictionary,
        personality: &'a PropertyDictionary,
        registry: &'a BTreeMap<ServiceId, ServiceNode>,
    ) -> Self {
        Self {
            id,
            properties,
            personality,
            registry,
        }
    }

    /// ID of the service being driven.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(String::from(key), value.into());
    }

    pub fn personality(&self) -> &PropertyDictionary {
        self.personality
    }

    /// Driver object of another service.
    pub fn service(&self, id: ServiceId) -> Option<ServiceRef> {
        self.registry.get(&id).map(|node| node.driver.clone())
    }

    /// Every other service whose `IOClass` equals `class`, in ID order.
    pub fn services_with_class(&self, class: &str) -> Vec<(ServiceId, ServiceRef)> {
        self.registry
            .iter()
            .filter(|(id, _)| **id != self.id)
            .filter(|(_, node)| {
                node.properties.get(keys::IO_CLASS).and_then(PropertyValue::as_str) == Some(class)
            })
            .map(|(id, node)| (*id, node.driver.clone()))
            .collect()
    }
}
