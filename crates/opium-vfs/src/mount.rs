//! Filesystem types and mount points.

use alloc::string::String;

use crate::error::VfsError;
use crate::node::VNodeRef;

/// A named filesystem type.
///
/// Hooks take `&self`; implementations keep their state behind interior
/// mutability since one filesystem may back several mount points.
pub trait FileSystem {
    /// Registry key, e.g. `"devfs"`.
    fn name(&self) -> &str;

    /// Called once, when the filesystem is registered.
    fn init(&self) {}

    /// Called once, when the filesystem is unregistered.
    fn deinit(&self) {}

    /// Produce the root node for a new mount at `path`.
    fn mount(&self, path: &str) -> Result<VNodeRef, VfsError>;

    /// A mount at `path` is going away.
    fn unmount(&self, _path: &str) {}
}

/// An entry of the mount table.
#[derive(Clone, Debug)]
pub struct MountPoint {
    pub path: String,
    /// Name of the filesystem type mounted here
    pub filesystem: String,
    root: VNodeRef,
}

impl MountPoint {
    pub fn new(path: &str, filesystem: &str, root: VNodeRef) -> Self {
        Self {
            path: String::from(path),
            filesystem: String::from(filesystem),
            root,
        }
    }

    /// Cached root node of the mount.
    pub fn root(&self) -> &VNodeRef {
        &self.root
    }
}
