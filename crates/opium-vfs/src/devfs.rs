//! DeviceFS: the BSD device tables as a flat directory.
//!
//! Index nodes are the source of truth, mirrored from the device tables at
//! `init` and kept current by the device event. Device nodes are built on
//! demand and cached weakly, so repeated lookups return the same node for
//! as long as somebody holds it.
//!
//! Devices are never removed from the index; the device event only reports
//! additions.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use opium_bsd::{DeviceEvent, DeviceId, DeviceKind, DeviceSwitchTable, HandlerId};
use opium_hal::HalRef;

use crate::error::VfsError;
use crate::mount::FileSystem;
use crate::node::{DirectoryEntry, VNodeOperations, VNodeRef, VNodeType, VirtualNode};

/// Registry key of DeviceFS.
pub const DEVFS_NAME: &str = "devfs";

struct IndexNode {
    kind: DeviceKind,
    device_id: DeviceId,
    cache: Weak<VirtualNode>,
}

impl IndexNode {
    fn node_type(&self) -> VNodeType {
        match self.kind {
            DeviceKind::Character => VNodeType::Character,
            DeviceKind::Block => VNodeType::Block,
        }
    }
}

struct Index {
    hal: HalRef,
    devices: Rc<DeviceSwitchTable>,
    nodes: RefCell<BTreeMap<String, IndexNode>>,
}

impl Index {
    fn add(&self, name: &str, kind: DeviceKind, device_id: DeviceId) {
        if name.is_empty() {
            return;
        }
        self.hal
            .debug_write(&format!("[devfs] Created node: {}", name));
        self.nodes.borrow_mut().insert(
            String::from(name),
            IndexNode {
                kind,
                device_id,
                cache: Weak::new(),
            },
        );
    }

    fn entries(&self) -> Vec<DirectoryEntry> {
        self.nodes
            .borrow()
            .iter()
            .map(|(name, index)| DirectoryEntry {
                name: name.clone(),
                node_type: index.node_type(),
                device_id: index.device_id,
            })
            .collect()
    }

    /// Device node for `name`, reusing the cached one while it is alive.
    fn node(&self, name: &str) -> Option<VNodeRef> {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.get_mut(name)?;
        if let Some(node) = index.cache.upgrade() {
            return Some(node);
        }
        let node = VirtualNode::new(
            index.node_type(),
            index.device_id,
            device_operations(&self.devices, index.kind),
        );
        index.cache = Rc::downgrade(&node);
        Some(node)
    }
}

/// Capabilities of a device node: forward into the switch of its major.
///
/// Block nodes only support open/close.
fn device_operations(devices: &Rc<DeviceSwitchTable>, kind: DeviceKind) -> VNodeOperations {
    match kind {
        DeviceKind::Character => {
            let (open, close, read, write) =
                (devices.clone(), devices.clone(), devices.clone(), devices.clone());
            VNodeOperations::new()
                .with_open(move |node| {
                    if let Some(switch) = open.character_switch(node.device_id.major()) {
                        let _ = switch.open(node.device_id);
                    }
                })
                .with_close(move |node| {
                    if let Some(switch) = close.character_switch(node.device_id.major()) {
                        let _ = switch.close(node.device_id);
                    }
                })
                .with_read(move |node| {
                    read.character_switch(node.device_id.major())
                        .and_then(|switch| switch.read(node.device_id).ok())
                        .unwrap_or_default()
                })
                .with_write(move |node, data| {
                    if let Some(switch) = write.character_switch(node.device_id.major()) {
                        let _ = switch.write(node.device_id, data);
                    }
                })
        }
        DeviceKind::Block => {
            let (open, close) = (devices.clone(), devices.clone());
            VNodeOperations::new()
                .with_open(move |node| {
                    if let Some(switch) = open.block_switch(node.device_id.major()) {
                        let _ = switch.open(node.device_id);
                    }
                })
                .with_close(move |node| {
                    if let Some(switch) = close.block_switch(node.device_id.major()) {
                        let _ = switch.close(node.device_id);
                    }
                })
        }
    }
}

/// Flat device directory. Every mount shares the same root.
pub struct DeviceFs {
    index: Rc<Index>,
    root: RefCell<Option<VNodeRef>>,
    hook: Cell<Option<HandlerId>>,
}

impl DeviceFs {
    pub fn new(hal: HalRef, devices: Rc<DeviceSwitchTable>) -> Self {
        Self {
            index: Rc::new(Index {
                hal,
                devices,
                nodes: RefCell::new(BTreeMap::new()),
            }),
            root: RefCell::new(None),
            hook: Cell::new(None),
        }
    }

    /// Names currently in the index, sorted.
    pub fn names(&self) -> Vec<String> {
        self.index.nodes.borrow().keys().cloned().collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.root.borrow().is_some()
    }
}

impl FileSystem for DeviceFs {
    fn name(&self) -> &str {
        DEVFS_NAME
    }

    /// Mirror the existing devices and subscribe to new ones.
    fn init(&self) {
        if self.is_initialized() {
            return;
        }

        let lookup_index = Rc::downgrade(&self.index);
        let readdir_index = Rc::downgrade(&self.index);
        let ops = VNodeOperations::new()
            .with_readdir(move |_| {
                readdir_index
                    .upgrade()
                    .map(|index| index.entries())
                    .unwrap_or_default()
            })
            .with_lookup(move |_, name| lookup_index.upgrade().and_then(|index| index.node(name)));
        *self.root.borrow_mut() = Some(VirtualNode::new(VNodeType::Directory, DeviceId(0), ops));

        let devices = &self.index.devices;
        for device in devices.block_devices() {
            self.index.add(&device.name, DeviceKind::Block, device.id);
        }
        for device in devices.character_devices() {
            self.index.add(&device.name, DeviceKind::Character, device.id);
        }

        let index = Rc::downgrade(&self.index);
        let hook = devices.subscribe(move |event: &DeviceEvent| {
            if let Some(index) = index.upgrade() {
                index.add(&event.name, event.kind, event.device_id);
            }
        });
        self.hook.set(Some(hook));
    }

    fn deinit(&self) {
        if let Some(hook) = self.hook.take() {
            self.index.devices.unsubscribe(hook);
        }
        self.root.borrow_mut().take();
    }

    fn mount(&self, _path: &str) -> Result<VNodeRef, VfsError> {
        self.root.borrow().clone().ok_or(VfsError::NotInitialized)
    }
}
