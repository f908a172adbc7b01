//! In-memory hierarchical filesystem used as the root mount.
//!
//! Entries are keyed by absolute path within the filesystem. Nodes are
//! views: each holds its path and a handle to the shared store, so a node
//! sees later changes to its entry.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use opium_bsd::DeviceId;

use crate::error::VfsError;
use crate::mount::FileSystem;
use crate::node::{DirectoryEntry, VNodeOperations, VNodeRef, VNodeType, VirtualNode};
use crate::path::{filename, join_path, normalize_path, parent_path};

/// Registry key of the in-memory root filesystem.
pub const ROOTFS_NAME: &str = "rootfs";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Entry {
    Directory,
    File(String),
}

type Store = RefCell<BTreeMap<String, Entry>>;

/// In-memory filesystem of directories and text files.
pub struct MemoryFs {
    store: Rc<Store>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create a filesystem holding only the root directory.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(String::from("/"), Entry::Directory);
        Self {
            store: Rc::new(RefCell::new(entries)),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.store.borrow().contains_key(&fs_path(path))
    }

    /// Create a directory. The parent must exist.
    pub fn mkdir(&self, path: &str) -> Result<(), VfsError> {
        let path = fs_path(path);
        self.check_new_entry(&path)?;
        self.store.borrow_mut().insert(path, Entry::Directory);
        Ok(())
    }

    /// Create a directory and any missing ancestors.
    pub fn mkdir_p(&self, path: &str) -> Result<(), VfsError> {
        let path = fs_path(path);
        let mut current = String::from("/");
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = join_path(&current, component);
            let mut store = self.store.borrow_mut();
            match store.get(&current) {
                Some(Entry::Directory) => {}
                Some(Entry::File(_)) => return Err(VfsError::NotADirectory),
                None => {
                    store.insert(current.clone(), Entry::Directory);
                }
            }
        }
        Ok(())
    }

    /// Create or replace a file. The parent must exist.
    pub fn write_file(&self, path: &str, contents: &str) -> Result<(), VfsError> {
        let path = fs_path(path);
        match self.store.borrow().get(&path) {
            Some(Entry::Directory) => return Err(VfsError::NotAFile),
            Some(Entry::File(_)) => {}
            None => self.check_new_entry(&path)?,
        }
        self.store
            .borrow_mut()
            .insert(path, Entry::File(String::from(contents)));
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Result<String, VfsError> {
        match self.store.borrow().get(&fs_path(path)) {
            Some(Entry::File(contents)) => Ok(contents.clone()),
            Some(Entry::Directory) => Err(VfsError::NotAFile),
            None => Err(VfsError::NotFound),
        }
    }

    fn check_new_entry(&self, path: &str) -> Result<(), VfsError> {
        let store = self.store.borrow();
        if store.contains_key(path) {
            return Err(VfsError::AlreadyExists);
        }
        match store.get(&parent_path(path)) {
            Some(Entry::Directory) => Ok(()),
            Some(Entry::File(_)) => Err(VfsError::NotADirectory),
            None => Err(VfsError::NotFound),
        }
    }
}

/// Paths inside the filesystem are always absolute.
fn fs_path(path: &str) -> String {
    if path.starts_with('/') {
        normalize_path(path)
    } else {
        normalize_path(&join_path("/", path))
    }
}

fn node_for(store: &Rc<Store>, path: String) -> Option<VNodeRef> {
    let entry = store.borrow().get(&path).cloned()?;
    let node = match entry {
        Entry::Directory => {
            let (lookup_store, readdir_store) = (store.clone(), store.clone());
            let (lookup_path, readdir_path) = (path.clone(), path);
            VirtualNode::new(
                VNodeType::Directory,
                DeviceId(0),
                VNodeOperations::new()
                    .with_lookup(move |_, name| {
                        node_for(&lookup_store, join_path(&lookup_path, name))
                    })
                    .with_readdir(move |_| children(&readdir_store, &readdir_path)),
            )
        }
        Entry::File(_) => {
            let (read_store, write_store) = (store.clone(), store.clone());
            let (read_path, write_path) = (path.clone(), path);
            VirtualNode::new(
                VNodeType::Regular,
                DeviceId(0),
                VNodeOperations::new()
                    .with_read(move |_| match read_store.borrow().get(&read_path) {
                        Some(Entry::File(contents)) => contents.clone(),
                        _ => String::new(),
                    })
                    .with_write(move |_, data| {
                        let mut store = write_store.borrow_mut();
                        if let Some(Entry::File(contents)) = store.get_mut(&write_path) {
                            *contents = String::from(data);
                        }
                    }),
            )
        }
    };
    Some(node)
}

fn children(store: &Store, dir: &str) -> Vec<DirectoryEntry> {
    store
        .borrow()
        .iter()
        .filter(|(path, _)| path.as_str() != "/" && parent_path(path) == dir)
        .map(|(path, entry)| DirectoryEntry {
            name: String::from(filename(path)),
            node_type: match entry {
                Entry::Directory => VNodeType::Directory,
                Entry::File(_) => VNodeType::Regular,
            },
            device_id: DeviceId(0),
        })
        .collect()
}

impl FileSystem for MemoryFs {
    fn name(&self) -> &str {
        ROOTFS_NAME
    }

    fn mount(&self, _path: &str) -> Result<VNodeRef, VfsError> {
        node_for(&self.store, String::from("/")).ok_or(VfsError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::Vfs;
    use opium_hal::TestHal;

    #[test]
    fn test_mkdir_requires_parent() {
        let fs = MemoryFs::new();
        assert_eq!(fs.mkdir("/a/b"), Err(VfsError::NotFound));
        fs.mkdir("/a").unwrap();
        fs.mkdir("a/b").unwrap();
        assert_eq!(fs.mkdir("/a"), Err(VfsError::AlreadyExists));
        assert!(fs.exists("/a/b"));
    }

    #[test]
    fn test_mkdir_p() {
        let fs = MemoryFs::new();
        fs.mkdir_p("/x/y/z").unwrap();
        assert!(fs.exists("/x/y"));
        fs.write_file("/x/f", "1").unwrap();
        assert_eq!(fs.mkdir_p("/x/f/g"), Err(VfsError::NotADirectory));
    }

    #[test]
    fn test_files() {
        let fs = MemoryFs::new();
        assert_eq!(fs.write_file("/etc/motd", "hi"), Err(VfsError::NotFound));
        fs.mkdir("/etc").unwrap();
        fs.write_file("/etc/motd", "hi").unwrap();
        fs.write_file("/etc/motd", "hello").unwrap();
        assert_eq!(fs.read_file("/etc/motd"), Ok(String::from("hello")));
        assert_eq!(fs.read_file("/etc"), Err(VfsError::NotAFile));
        assert_eq!(fs.write_file("/etc", "x"), Err(VfsError::NotAFile));
        assert_eq!(fs.read_file("/nope"), Err(VfsError::NotFound));
    }

    #[test]
    fn test_through_vfs() {
        let fs = Rc::new(MemoryFs::new());
        fs.mkdir_p("/etc/opium").unwrap();
        fs.write_file("/etc/motd", "welcome\n").unwrap();

        let mut vfs = Vfs::new(TestHal::shared());
        vfs.add_filesystem(fs.clone());
        vfs.mount("/", ROOTFS_NAME).unwrap();

        assert_eq!(vfs.read("/etc/motd"), "welcome\n");
        vfs.write("/etc/motd", "replaced\n");
        assert_eq!(fs.read_file("/etc/motd"), Ok(String::from("replaced\n")));
        // Writes to a missing file do not create it
        vfs.write("/etc/new", "x");
        assert!(!fs.exists("/etc/new"));

        let names: Vec<String> = vfs.readdir("/etc").into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["motd", "opium"]);
        let root: Vec<VNodeType> = vfs.readdir("/").into_iter().map(|e| e.node_type).collect();
        assert_eq!(root, [VNodeType::Directory]);
        assert!(vfs.readdir("/etc/motd").is_empty());
    }
}
