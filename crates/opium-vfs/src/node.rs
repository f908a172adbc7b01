//! Virtual nodes.
//!
//! A node is a type tag, an optional device ID and a table of independently
//! optional capabilities. A missing capability means the operation does
//! nothing (or yields an empty result); it is never an error.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use opium_bsd::DeviceId;

/// What a node represents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VNodeType {
    #[default]
    None,
    Regular,
    Directory,
    Block,
    Character,
    Link,
    Pipe,
    Socket,
    Bad,
}

/// Single entry returned by `readdir`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub node_type: VNodeType,
    /// Zero unless the entry is a device
    pub device_id: DeviceId,
}

/// Shared handle to a node.
pub type VNodeRef = Rc<VirtualNode>;

pub type NodeFn = Rc<dyn Fn(&VNodeRef)>;
pub type ReadFn = Rc<dyn Fn(&VNodeRef) -> String>;
pub type WriteFn = Rc<dyn Fn(&VNodeRef, &str)>;
pub type ReaddirFn = Rc<dyn Fn(&VNodeRef) -> Vec<DirectoryEntry>>;
pub type LookupFn = Rc<dyn Fn(&VNodeRef, &str) -> Option<VNodeRef>>;

/// Capability table. Cloning shares the callbacks.
#[derive(Clone, Default)]
pub struct VNodeOperations {
    open: Option<NodeFn>,
    close: Option<NodeFn>,
    read: Option<ReadFn>,
    write: Option<WriteFn>,
    readdir: Option<ReaddirFn>,
    lookup: Option<LookupFn>,
}

impl VNodeOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(mut self, f: impl Fn(&VNodeRef) + 'static) -> Self {
        self.open = Some(Rc::new(f));
        self
    }

    pub fn with_close(mut self, f: impl Fn(&VNodeRef) + 'static) -> Self {
        self.close = Some(Rc::new(f));
        self
    }

    pub fn with_read(mut self, f: impl Fn(&VNodeRef) -> String + 'static) -> Self {
        self.read = Some(Rc::new(f));
        self
    }

    pub fn with_write(mut self, f: impl Fn(&VNodeRef, &str) + 'static) -> Self {
        self.write = Some(Rc::new(f));
        self
    }

    pub fn with_readdir(mut self, f: impl Fn(&VNodeRef) -> Vec<DirectoryEntry> + 'static) -> Self {
        self.readdir = Some(Rc::new(f));
        self
    }

    pub fn with_lookup(
        mut self,
        f: impl Fn(&VNodeRef, &str) -> Option<VNodeRef> + 'static,
    ) -> Self {
        self.lookup = Some(Rc::new(f));
        self
    }
}

/// A node in the virtual namespace.
pub struct VirtualNode {
    pub node_type: VNodeType,
    pub device_id: DeviceId,
    operations: VNodeOperations,
}

impl VirtualNode {
    pub fn new(node_type: VNodeType, device_id: DeviceId, operations: VNodeOperations) -> VNodeRef {
        Rc::new(Self {
            node_type,
            device_id,
            operations,
        })
    }

    /// A directory node with no capabilities.
    pub fn directory() -> VNodeRef {
        Self::new(VNodeType::Directory, DeviceId(0), VNodeOperations::new())
    }

    pub fn is_directory(&self) -> bool {
        self.node_type == VNodeType::Directory
    }

    pub fn can_read(&self) -> bool {
        self.operations.read.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.operations.write.is_some()
    }

    pub fn can_lookup(&self) -> bool {
        self.operations.lookup.is_some()
    }

    /// Returns whether the node has an `open` capability.
    pub fn open(self: &Rc<Self>) -> bool {
        match &self.operations.open {
            Some(f) => {
                f(self);
                true
            }
            None => false,
        }
    }

    /// Returns whether the node has a `close` capability.
    pub fn close(self: &Rc<Self>) -> bool {
        match &self.operations.close {
            Some(f) => {
                f(self);
                true
            }
            None => false,
        }
    }

    pub fn read(self: &Rc<Self>) -> String {
        match &self.operations.read {
            Some(f) => f(self),
            None => String::new(),
        }
    }

    pub fn write(self: &Rc<Self>, data: &str) {
        if let Some(f) = &self.operations.write {
            f(self, data);
        }
    }

    pub fn readdir(self: &Rc<Self>) -> Vec<DirectoryEntry> {
        match &self.operations.readdir {
            Some(f) => f(self),
            None => Vec::new(),
        }
    }

    pub fn lookup(self: &Rc<Self>, name: &str) -> Option<VNodeRef> {
        self.operations.lookup.as_ref().and_then(|f| f(self, name))
    }
}

impl core::fmt::Debug for VirtualNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualNode")
            .field("node_type", &self.node_type)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}
