//! Opium Virtual Filesystem Layer
//!
//! - **Path**: lexical normalization and longest-prefix mount routing
//! - **Nodes**: typed virtual nodes with optional capabilities
//! - **Vfs**: filesystem type registry and mount table
//! - **DeviceFS**: the BSD device tables as a flat `/dev` directory
//! - **MemoryFS**: an in-memory tree for the root mount
//!
//! # Architecture
//!
//! ```text
//!   read("/dev/tty0")
//!     │ normalize ──▶ find_mount ("/dev" beats "/")
//!     ▼
//!   devfs root ──lookup("tty0")──▶ character node ──▶ switch(major).read(id)
//! ```

#![no_std]
extern crate alloc;

pub mod devfs;
pub mod error;
pub mod memfs;
pub mod mount;
pub mod node;
pub mod path;
pub mod vfs;

pub use devfs::{DeviceFs, DEVFS_NAME};
pub use error::VfsError;
pub use memfs::{MemoryFs, ROOTFS_NAME};
pub use mount::{FileSystem, MountPoint};
pub use node::{DirectoryEntry, VNodeOperations, VNodeRef, VNodeType, VirtualNode};
pub use path::{filename, find_mount, join_path, make_relative, normalize_path, parent_path};
pub use vfs::Vfs;
