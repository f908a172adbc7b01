//! The service registry.
//!
//! Services live in an arena keyed by [`ServiceId`]. The provider/client tree
//! is stored as IDs: each node keeps an optional provider ID and an ordered
//! list of client IDs. The registry owns every service for the lifetime of
//! the kernel; nothing is ever removed.
//!
//! # Lifecycle
//!
//! ```text
//!   add_service ──▶ Unattached ──attach──▶ Attached ──start──▶ Started ──▶ publish
//!                        ▲                     │
//!                        └──────detach─────────┘
//! ```
//!
//! All iteration is in ascending ID order, so matching is reproducible.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use serde::{Deserialize, Serialize};

use opium_bsd::{
    BlockDeviceSwitch, CharacterDeviceSwitch, DeviceId, DeviceKind, DeviceSwitchTable,
    EventHandler, HandlerId, IoError, MajorId, MinorId,
};
use opium_hal::HalRef;

use crate::error::IoKitError;
use crate::property::{keys, PropertyDictionary, PropertyValue};
use crate::service::{IoService, ServiceContext, ServiceId, ServiceRef};

/// Where a service is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Registered, no provider
    Unattached,
    /// Has a provider, not started
    Attached,
    /// Started (and published)
    Started,
}

/// Arena entry for one service.
pub struct ServiceNode {
    pub(crate) provider: Option<ServiceId>,
    pub(crate) clients: Vec<ServiceId>,
    pub(crate) client_pids: BTreeSet<u64>,
    pub(crate) properties: PropertyDictionary,
    pub(crate) personality: PropertyDictionary,
    pub(crate) state: ServiceState,
    pub(crate) driver: ServiceRef,
}

/// Payload of the publish notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishEvent {
    pub service: ServiceId,
    /// BSD device the service was bound to, if any
    pub device: Option<DeviceId>,
}

/// Serializable view of a registry subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: ServiceId,
    pub class: Option<String>,
    pub state: ServiceState,
    pub properties: PropertyDictionary,
    pub clients: Vec<RegistryEntry>,
}

/// The synthetic root every unmatched service attaches under.
struct Root;

impl IoService for Root {
    fn configure(&mut self, properties: &mut PropertyDictionary, _: &mut PropertyDictionary) {
        properties.insert(String::from(keys::IO_CLASS), PropertyValue::from("Root"));
    }
}

/// Provider/client service tree plus the publish path into the BSD tables.
pub struct IoRegistry {
    hal: HalRef,
    devices: Rc<DeviceSwitchTable>,
    services: BTreeMap<ServiceId, ServiceNode>,
    next_id: u64,
    root: ServiceId,
    publish_notifiers: EventHandler<PublishEvent>,
}

impl IoRegistry {
    /// Create a registry containing only the root service.
    pub fn new(hal: HalRef, devices: Rc<DeviceSwitchTable>) -> Self {
        let mut registry = Self {
            hal,
            devices,
            services: BTreeMap::new(),
            next_id: 1,
            root: ServiceId(0),
            publish_notifiers: EventHandler::new(),
        };
        let (root, _) = registry.add_service(Root);
        registry.root = root;
        registry
    }

    // ========================================================================
    // Registration and queries
    // ========================================================================

    /// Register a service. The registry keeps it for its whole lifetime.
    ///
    /// Returns the new ID and a typed handle to the driver object.
    pub fn add_service<T: IoService + 'static>(
        &mut self,
        mut service: T,
    ) -> (ServiceId, Rc<RefCell<T>>) {
        let mut properties = PropertyDictionary::new();
        let mut personality = PropertyDictionary::new();
        service.configure(&mut properties, &mut personality);

        let id = ServiceId(self.next_id);
        self.next_id += 1;
        service.registered(id);

        let handle = Rc::new(RefCell::new(service));
        let driver: ServiceRef = handle.clone();
        self.services.insert(
            id,
            ServiceNode {
                provider: None,
                clients: Vec::new(),
                client_pids: BTreeSet::new(),
                properties,
                personality,
                state: ServiceState::Unattached,
                driver,
            },
        );
        (id, handle)
    }

    pub fn root(&self) -> ServiceId {
        self.root
    }

    /// Next ID that will be assigned.
    pub fn next_id(&self) -> ServiceId {
        ServiceId(self.next_id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// All service IDs in ascending order.
    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.services.keys().copied().collect()
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        self.services.contains_key(&id)
    }

    pub fn service(&self, id: ServiceId) -> Option<ServiceRef> {
        self.services.get(&id).map(|n| n.driver.clone())
    }

    pub fn provider(&self, id: ServiceId) -> Option<ServiceId> {
        self.services.get(&id).and_then(|n| n.provider)
    }

    pub fn clients(&self, id: ServiceId) -> Option<&[ServiceId]> {
        self.services.get(&id).map(|n| n.clients.as_slice())
    }

    pub fn state(&self, id: ServiceId) -> Option<ServiceState> {
        self.services.get(&id).map(|n| n.state)
    }

    pub fn properties(&self, id: ServiceId) -> Option<&PropertyDictionary> {
        self.services.get(&id).map(|n| &n.properties)
    }

    pub fn personality(&self, id: ServiceId) -> Option<&PropertyDictionary> {
        self.services.get(&id).map(|n| &n.personality)
    }

    pub fn property(&self, id: ServiceId, key: &str) -> Option<&PropertyValue> {
        self.services.get(&id).and_then(|n| n.properties.get(key))
    }

    /// Set a property. Returns false if the service is unknown.
    pub fn set_property(
        &mut self,
        id: ServiceId,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> bool {
        match self.services.get_mut(&id) {
            Some(node) => {
                node.properties.insert(String::from(key), value.into());
                true
            }
            None => false,
        }
    }

    /// Set a personality entry. Returns false if the service is unknown.
    pub fn set_personality_property(
        &mut self,
        id: ServiceId,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> bool {
        match self.services.get_mut(&id) {
            Some(node) => {
                node.personality.insert(String::from(key), value.into());
                true
            }
            None => false,
        }
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (&ServiceId, &ServiceNode)> {
        self.services.iter()
    }

    // ========================================================================
    // Matching and attachment
    // ========================================================================

    /// True if `ancestor` is `of` or lies on `of`'s provider chain.
    pub fn is_ancestor(&self, ancestor: ServiceId, of: ServiceId) -> bool {
        let mut current = Some(of);
        // The chain can never be longer than the registry.
        for _ in 0..=self.services.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.provider(id),
                None => return false,
            }
        }
        false
    }

    /// Would `client` accept `candidate` as its provider?
    ///
    /// The candidate must not be below (or equal to) the client, and every
    /// personality entry must be satisfied by the candidate's properties.
    /// `IOProviderClass` is compared against the candidate's `IOClass`.
    pub fn matches(&self, client: ServiceId, candidate: ServiceId) -> bool {
        let (Some(client_node), Some(candidate_node)) =
            (self.services.get(&client), self.services.get(&candidate))
        else {
            return false;
        };

        if self.is_ancestor(client, candidate) {
            return false;
        }

        client_node.personality.iter().all(|(key, wanted)| {
            if key == keys::IO_PROVIDER_CLASS {
                match (
                    wanted.as_str(),
                    candidate_node.properties.get(keys::IO_CLASS).and_then(PropertyValue::as_str),
                ) {
                    (Some(wanted), Some(class)) => wanted == class,
                    _ => false,
                }
            } else {
                candidate_node.properties.get(key) == Some(wanted)
            }
        })
    }

    /// First service, in ascending ID order, that `client` matches.
    pub fn find_matching_provider(&self, client: ServiceId) -> Option<ServiceId> {
        self.services
            .keys()
            .copied()
            .filter(|candidate| *candidate != client)
            .find(|candidate| self.matches(client, *candidate))
    }

    /// Attach `client` under `provider`.
    ///
    /// Fails without mutating anything if the client already has a provider
    /// or if the provider is the client itself or one of its descendants.
    pub fn attach(&mut self, client: ServiceId, provider: ServiceId) -> Result<(), IoKitError> {
        let node = self
            .services
            .get(&client)
            .ok_or(IoKitError::ServiceNotFound(client))?;
        if !self.services.contains_key(&provider) {
            return Err(IoKitError::ServiceNotFound(provider));
        }
        if let Some(current) = node.provider {
            return Err(IoKitError::AlreadyAttached {
                service: client,
                provider: current,
            });
        }
        if self.is_ancestor(client, provider) {
            return Err(IoKitError::WouldCycle {
                service: client,
                provider,
            });
        }

        if let Some(node) = self.services.get_mut(&client) {
            node.provider = Some(provider);
            if node.state == ServiceState::Unattached {
                node.state = ServiceState::Attached;
            }
        }
        if let Some(parent) = self.services.get_mut(&provider) {
            parent.clients.push(client);
        }
        Ok(())
    }

    /// Detach `client` from `provider`.
    ///
    /// Only acts if `provider` is the client's current provider. Returns
    /// whether anything changed.
    pub fn detach(&mut self, client: ServiceId, provider: ServiceId) -> bool {
        if self.provider(client) != Some(provider) {
            return false;
        }
        if let Some(parent) = self.services.get_mut(&provider) {
            parent.clients.retain(|c| *c != client);
        }
        if let Some(node) = self.services.get_mut(&client) {
            node.provider = None;
            node.state = ServiceState::Unattached;
        }
        true
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Run a driver hook with a context over this registry.
    ///
    /// The node's dictionaries are moved out for the duration of the call so
    /// the hook can mutate its own properties while reading everyone else's.
    fn with_context<R>(
        &mut self,
        id: ServiceId,
        hook: impl FnOnce(&mut dyn IoService, &mut ServiceContext<'_>) -> R,
    ) -> Result<R, IoKitError> {
        let node = self
            .services
            .get_mut(&id)
            .ok_or(IoKitError::ServiceNotFound(id))?;
        let driver = node.driver.clone();
        let mut properties = core::mem::take(&mut node.properties);
        let personality = core::mem::take(&mut node.personality);

        let result = match driver.try_borrow_mut() {
            Ok(mut service) => {
                let mut ctx =
                    ServiceContext::new(id, &mut properties, &personality, &self.services);
                Ok(hook(&mut *service, &mut ctx))
            }
            Err(_) => Err(IoKitError::ServiceBusy(id)),
        };

        if let Some(node) = self.services.get_mut(&id) {
            node.properties = properties;
            node.personality = personality;
        }
        result
    }

    /// Probe, match, attach, start and publish every service that has not
    /// been started yet, in ascending ID order.
    ///
    /// Services without a matching provider attach under the root. Returns
    /// the number of services started.
    pub fn match_and_start_devices(&mut self) -> usize {
        let mut started = 0;

        for id in self.service_ids() {
            if id == self.root || self.state(id) == Some(ServiceState::Started) {
                continue;
            }

            match self.with_context(id, |service, ctx| service.probe(ctx)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    self.hal.debug_write(&format!("[iokit:{}] Probe skipped: {}", id.0, e));
                    continue;
                }
            }

            if self.provider(id).is_none() {
                let provider = self.find_matching_provider(id).unwrap_or(self.root);
                if let Err(e) = self.attach(id, provider) {
                    self.hal.debug_write(&format!("[iokit:{}] Attach failed: {}", id.0, e));
                    continue;
                }
            }

            match self.with_context(id, |service, ctx| service.start(ctx)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    self.hal.debug_write(&format!("[iokit:{}] Start skipped: {}", id.0, e));
                    continue;
                }
            }

            if let Some(node) = self.services.get_mut(&id) {
                node.state = ServiceState::Started;
            }
            started += 1;

            if let Err(e) = self.publish_service(id) {
                self.hal.debug_write(&format!("[iokit:{}] Publish failed: {}", id.0, e));
            }
        }

        started
    }

    /// Client process `pid` opens the service.
    ///
    /// Fails if the PID already holds it open or the driver refuses.
    pub fn open_service(&mut self, id: ServiceId, pid: u64) -> bool {
        let Some(node) = self.services.get(&id) else {
            return false;
        };
        if node.client_pids.contains(&pid) {
            return false;
        }
        let accepted = match node.driver.try_borrow_mut() {
            Ok(mut service) => service.open(pid),
            Err(_) => false,
        };
        if accepted {
            if let Some(node) = self.services.get_mut(&id) {
                node.client_pids.insert(pid);
            }
        }
        accepted
    }

    /// Client process `pid` closes the service.
    ///
    /// Fails if the PID does not hold it open or the driver refuses.
    pub fn close_service(&mut self, id: ServiceId, pid: u64) -> bool {
        let Some(node) = self.services.get(&id) else {
            return false;
        };
        if !node.client_pids.contains(&pid) {
            return false;
        }
        let accepted = match node.driver.try_borrow_mut() {
            Ok(mut service) => service.close(pid),
            Err(_) => false,
        };
        if accepted {
            if let Some(node) = self.services.get_mut(&id) {
                node.client_pids.remove(&pid);
            }
        }
        accepted
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// Register a publish notifier.
    pub fn add_publish_notifier<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut(&PublishEvent) + 'static,
    {
        self.publish_notifiers.add(callback)
    }

    pub fn remove_publish_notifier(&mut self, id: HandlerId) -> bool {
        self.publish_notifiers.remove(id)
    }

    /// The device ID a service publishes under.
    ///
    /// Major defaults to the service ID and minor to 0; `IOBSDMajor` /
    /// `IOBSDMinor` override them. `None` when the service is unknown or
    /// either number does not fit in 32 bits.
    pub fn get_bsd_device_id(&self, id: ServiceId) -> Option<DeviceId> {
        let node = self.services.get(&id)?;
        let major = node
            .properties
            .get(keys::IO_BSD_MAJOR)
            .and_then(PropertyValue::as_u64)
            .unwrap_or(id.0);
        let minor = node
            .properties
            .get(keys::IO_BSD_MINOR)
            .and_then(PropertyValue::as_u64)
            .unwrap_or(0);
        let major = MajorId::try_from(major).ok()?;
        let minor = MinorId::try_from(minor).ok()?;
        Some(DeviceId::new(major, minor))
    }

    /// Bind a service into the BSD device tables, then notify subscribers.
    ///
    /// Returns the device the service was published as, or `None` when it
    /// is not a BSD device (no `IOBSDType`) or its BSD description is
    /// invalid (logged). Notifiers fire in both cases.
    pub fn publish_service(&mut self, id: ServiceId) -> Result<Option<DeviceId>, IoKitError> {
        if !self.services.contains_key(&id) {
            return Err(IoKitError::ServiceNotFound(id));
        }

        let device = self.attach_to_bsd(id)?;
        self.publish_notifiers.notify(&PublishEvent {
            service: id,
            device,
        });
        Ok(device)
    }

    fn attach_to_bsd(&self, id: ServiceId) -> Result<Option<DeviceId>, IoKitError> {
        let node = self
            .services
            .get(&id)
            .ok_or(IoKitError::ServiceNotFound(id))?;

        let Some(bsd_type) = node.properties.get(keys::IO_BSD_TYPE).and_then(PropertyValue::as_str)
        else {
            return Ok(None);
        };

        let name = match node.properties.get(keys::IO_BSD_NAME).and_then(PropertyValue::as_str) {
            Some(name) if !name.is_empty() => name,
            _ => {
                self.hal.debug_write(&format!("[iokit:{}] Empty BSD name", id.0));
                return Ok(None);
            }
        };

        let kind = match bsd_type {
            keys::BSD_TYPE_CHARACTER => DeviceKind::Character,
            keys::BSD_TYPE_BLOCK => DeviceKind::Block,
            other => {
                self.hal
                    .debug_write(&format!("[iokit:{}] Wrong BSD type ({})", id.0, other));
                return Ok(None);
            }
        };

        let Some(device_id) = self.get_bsd_device_id(id) else {
            self.hal
                .debug_write(&format!("[iokit:{}] BSD device number out of range", id.0));
            return Ok(None);
        };
        let driver = node.driver.clone();

        match kind {
            DeviceKind::Character => {
                let reader = driver.clone();
                let switch = CharacterDeviceSwitch::new()
                    .with_read(move |dev| {
                        let mut service = reader.try_borrow_mut().map_err(|_| IoError::Busy(dev))?;
                        Ok(service.read())
                    })
                    .with_write(move |dev, data| {
                        let mut service = driver.try_borrow_mut().map_err(|_| IoError::Busy(dev))?;
                        service.write(data);
                        Ok(())
                    });
                self.devices
                    .add_character_device_switch(device_id.major(), switch);
                self.devices.add_character_device(device_id, name)?;
            }
            DeviceKind::Block => {
                let switch = BlockDeviceSwitch::new().with_strategy(move |dev, buf| {
                    let mut service = driver.try_borrow_mut().map_err(|_| IoError::Busy(dev))?;
                    service.strategy(buf)
                });
                self.devices.add_block_device_switch(device_id.major(), switch);
                self.devices.add_block_device(device_id, name)?;
            }
        }

        self.hal.debug_write(&format!(
            "[iokit:{}] Published {} device {} ({})",
            id.0, kind, name, device_id
        ));
        Ok(Some(device_id))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Depth-first, pre-order dump of the subtree under `root`.
    ///
    /// One line per service: four spaces per level, the ID, then the
    /// `IOClass` in parentheses when set.
    pub fn dump_registry(&self, root: ServiceId) -> String {
        let mut out = String::new();
        self.dump_into(root, 0, &mut out);
        out
    }

    fn dump_into(&self, id: ServiceId, depth: usize, out: &mut String) {
        let Some(node) = self.services.get(&id) else {
            return;
        };
        for _ in 0..depth * 4 {
            out.push(' ');
        }
        out.push_str(&format!("{}", id.0));
        if let Some(class) = node.properties.get(keys::IO_CLASS).and_then(PropertyValue::as_str) {
            out.push_str(&format!(" ({})", class));
        }
        out.push('\n');
        for client in &node.clients {
            self.dump_into(*client, depth + 1, out);
        }
    }

    /// Serializable snapshot of the subtree under `root`.
    pub fn snapshot(&self, root: ServiceId) -> Option<RegistryEntry> {
        let node = self.services.get(&root)?;
        Some(RegistryEntry {
            id: root,
            class: node
                .properties
                .get(keys::IO_CLASS)
                .and_then(PropertyValue::as_str)
                .map(String::from),
            state: node.state,
            properties: node.properties.clone(),
            clients: node
                .clients
                .iter()
                .filter_map(|c| self.snapshot(*c))
                .collect(),
        })
    }
}
