//! Filesystem registry and mount table.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use opium_hal::HalRef;

use crate::error::VfsError;
use crate::mount::{FileSystem, MountPoint};
use crate::node::{DirectoryEntry, VNodeRef};
use crate::path::{find_mount, make_relative, normalize_path};

struct Registered {
    fs: Rc<dyn FileSystem>,
    mount_count: usize,
}

/// Named filesystem types plus the ordered mount table.
///
/// Lookups that find nothing are not errors: `read` yields an empty string,
/// `readdir` an empty list, `write` does nothing.
pub struct Vfs {
    hal: HalRef,
    filesystems: BTreeMap<String, Registered>,
    mount_points: Vec<MountPoint>,
}

impl Vfs {
    pub fn new(hal: HalRef) -> Self {
        Self {
            hal,
            filesystems: BTreeMap::new(),
            mount_points: Vec::new(),
        }
    }

    // ========================================================================
    // Filesystem types
    // ========================================================================

    /// Register a filesystem type and run its `init` hook.
    ///
    /// A second registration under the same name is a no-op and returns
    /// false.
    pub fn add_filesystem(&mut self, fs: Rc<dyn FileSystem>) -> bool {
        let name = String::from(fs.name());
        if self.filesystems.contains_key(&name) {
            return false;
        }
        fs.init();
        self.filesystems.insert(
            name,
            Registered {
                fs,
                mount_count: 0,
            },
        );
        true
    }

    /// Unregister a filesystem type and run its `deinit` hook.
    ///
    /// Refused while any mount of it exists.
    pub fn remove_filesystem(&mut self, name: &str) -> Result<(), VfsError> {
        if let Some(mp) = self.mount_points.iter().find(|mp| mp.filesystem == name) {
            return Err(VfsError::MountPointInUse(mp.path.clone()));
        }
        let registered = self
            .filesystems
            .remove(name)
            .ok_or_else(|| VfsError::UnknownFileSystem(String::from(name)))?;
        registered.fs.deinit();
        Ok(())
    }

    pub fn filesystem(&self, name: &str) -> Option<Rc<dyn FileSystem>> {
        self.filesystems.get(name).map(|r| r.fs.clone())
    }

    /// Names of all registered filesystem types, sorted.
    pub fn filesystem_names(&self) -> Vec<String> {
        self.filesystems.keys().cloned().collect()
    }

    /// How many mount points currently use the filesystem.
    pub fn mount_count(&self, name: &str) -> Option<usize> {
        self.filesystems.get(name).map(|r| r.mount_count)
    }

    // ========================================================================
    // Mount table
    // ========================================================================

    /// Mount the filesystem registered as `fs_name` at `path`.
    ///
    /// An unknown filesystem is rejected silently. An empty path, a path
    /// ending in `/` (other than `/` itself), a path already in use or a
    /// refusing mount hook is logged and rejected. Nothing changes on
    /// failure.
    pub fn mount(&mut self, path: &str, fs_name: &str) -> Result<(), VfsError> {
        let Some(registered) = self.filesystems.get_mut(fs_name) else {
            return Err(VfsError::UnknownFileSystem(String::from(fs_name)));
        };

        if path.is_empty() || (path.ends_with('/') && path != "/") {
            self.hal
                .debug_write(&format!("[vfs] Invalid mount point: {}", path));
            return Err(VfsError::InvalidMountPoint(String::from(path)));
        }

        if self.mount_points.iter().any(|mp| mp.path == path) {
            self.hal
                .debug_write(&format!("[vfs] Mount point already in use: {}", path));
            return Err(VfsError::MountPointInUse(String::from(path)));
        }

        let root = match registered.fs.mount(path) {
            Ok(root) => root,
            Err(e) => {
                self.hal
                    .debug_write(&format!("[vfs] Mount aborted for {}: {}", path, e));
                return Err(VfsError::MountFailed(format!("{}", e)));
            }
        };

        registered.mount_count += 1;
        self.mount_points.push(MountPoint::new(path, fs_name, root));
        self.hal
            .debug_write(&format!("[vfs] Mounted {} at {}", fs_name, path));
        Ok(())
    }

    /// Remove the mount at exactly `path`.
    pub fn unmount(&mut self, path: &str) -> Result<(), VfsError> {
        let index = self
            .mount_points
            .iter()
            .position(|mp| mp.path == path)
            .ok_or_else(|| VfsError::NotMounted(String::from(path)))?;
        let mp = self.mount_points.remove(index);

        if let Some(registered) = self.filesystems.get_mut(&mp.filesystem) {
            registered.fs.unmount(path);
            registered.mount_count = registered.mount_count.saturating_sub(1);
        }
        self.hal
            .debug_write(&format!("[vfs] Unmounted {} from {}", mp.filesystem, path));
        Ok(())
    }

    /// Mount table in registration order.
    pub fn mount_points(&self) -> &[MountPoint] {
        &self.mount_points
    }

    // ========================================================================
    // Path operations
    // ========================================================================

    /// Resolve a path to a node.
    ///
    /// The path is normalized, routed to the longest matching mount and
    /// walked one component at a time through each node's `lookup`.
    pub fn lookup(&self, path: &str) -> Option<VNodeRef> {
        let path = normalize_path(path);
        let mp = &self.mount_points[find_mount(&path, &self.mount_points)?];
        let relative = make_relative(&path, &mp.path);

        let mut current = mp.root().clone();
        if relative.is_empty() {
            return Some(current);
        }
        for name in relative.split('/') {
            if !current.can_lookup() {
                return None;
            }
            current = current.lookup(name)?;
        }
        Some(current)
    }

    pub fn read(&self, path: &str) -> String {
        self.lookup(path).map(|node| node.read()).unwrap_or_default()
    }

    pub fn write(&self, path: &str, data: &str) {
        if let Some(node) = self.lookup(path) {
            node.write(data);
        }
    }

    /// Entries of a directory; empty for anything that is not one.
    pub fn readdir(&self, path: &str) -> Vec<DirectoryEntry> {
        match self.lookup(path) {
            Some(node) if node.is_directory() => node.readdir(),
            _ => Vec::new(),
        }
    }

    /// Run the node's `open` hook. Returns whether the path resolved.
    pub fn open(&self, path: &str) -> bool {
        match self.lookup(path) {
            Some(node) => {
                node.open();
                true
            }
            None => false,
        }
    }

    /// Run the node's `close` hook. Returns whether the path resolved.
    pub fn close(&self, path: &str) -> bool {
        match self.lookup(path) {
            Some(node) => {
                node.close();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{VNodeOperations, VNodeType, VirtualNode};
    use core::cell::{Cell, RefCell};
    use opium_bsd::DeviceId;
    use opium_hal::TestHal;

    /// Flat filesystem whose root lists fixed names, each a readable leaf.
    struct Fixed {
        name: &'static str,
        entries: &'static [&'static str],
        refuse: bool,
        inits: Cell<usize>,
        unmounts: RefCell<Vec<String>>,
    }

    impl Fixed {
        fn new(name: &'static str, entries: &'static [&'static str]) -> Rc<Self> {
            Rc::new(Self::plain(name, entries))
        }

        fn plain(name: &'static str, entries: &'static [&'static str]) -> Self {
            Self {
                name,
                entries,
                refuse: false,
                inits: Cell::new(0),
                unmounts: RefCell::new(Vec::new()),
            }
        }
    }

    impl FileSystem for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn init(&self) {
            self.inits.set(self.inits.get() + 1);
        }

        fn mount(&self, _path: &str) -> Result<VNodeRef, VfsError> {
            if self.refuse {
                return Err(VfsError::NotInitialized);
            }
            let label = self.name;
            let entries = self.entries;
            let ops = VNodeOperations::new()
                .with_lookup(move |_, name| {
                    entries.iter().any(|e| *e == name).then(|| {
                        let text = format!("{}:{}", label, name);
                        VirtualNode::new(
                            VNodeType::Regular,
                            DeviceId(0),
                            VNodeOperations::new().with_read(move |_| text.clone()),
                        )
                    })
                })
                .with_readdir(move |_| {
                    entries
                        .iter()
                        .map(|n| DirectoryEntry {
                            name: String::from(*n),
                            node_type: VNodeType::Regular,
                            device_id: DeviceId(0),
                        })
                        .collect()
                });
            Ok(VirtualNode::new(VNodeType::Directory, DeviceId(0), ops))
        }

        fn unmount(&self, path: &str) {
            self.unmounts.borrow_mut().push(String::from(path));
        }
    }

    fn vfs() -> Vfs {
        Vfs::new(TestHal::shared())
    }

    #[test]
    fn test_add_filesystem_once() {
        let mut vfs = vfs();
        let fs = Fixed::new("a", &[]);
        assert!(vfs.add_filesystem(fs.clone()));
        assert!(!vfs.add_filesystem(fs.clone()));
        assert_eq!(fs.inits.get(), 1);
        assert_eq!(vfs.mount_count("a"), Some(0));
    }

    #[test]
    fn test_mount_rejections_leave_table_untouched() {
        let mut vfs = vfs();
        vfs.add_filesystem(Fixed::new("devfs", &["tty0"]));

        assert_eq!(
            vfs.mount("/dev", "nope"),
            Err(VfsError::UnknownFileSystem(String::from("nope")))
        );
        assert!(matches!(vfs.mount("/dev/", "devfs"), Err(VfsError::InvalidMountPoint(_))));
        assert!(matches!(vfs.mount("", "devfs"), Err(VfsError::InvalidMountPoint(_))));
        assert!(vfs.mount_points().is_empty());

        vfs.mount("/dev", "devfs").unwrap();
        assert!(matches!(vfs.mount("/dev", "devfs"), Err(VfsError::MountPointInUse(_))));
        assert_eq!(vfs.mount_points().len(), 1);
        assert_eq!(vfs.mount_count("devfs"), Some(1));
    }

    #[test]
    fn test_refusing_mount_hook_aborts() {
        let mut vfs = vfs();
        vfs.add_filesystem(Rc::new(Fixed {
            refuse: true,
            ..Fixed::plain("bad", &[])
        }));
        assert!(matches!(vfs.mount("/mnt", "bad"), Err(VfsError::MountFailed(_))));
        assert!(vfs.mount_points().is_empty());
        assert_eq!(vfs.mount_count("bad"), Some(0));
    }

    #[test]
    fn test_longest_prefix_routing() {
        let mut vfs = vfs();
        vfs.add_filesystem(Fixed::new("rootfs", &["tty0", "etc"]));
        vfs.add_filesystem(Fixed::new("devfs", &["tty0"]));
        vfs.mount("/", "rootfs").unwrap();
        vfs.mount("/dev", "devfs").unwrap();

        assert_eq!(vfs.read("/dev/tty0"), "devfs:tty0");
        assert_eq!(vfs.read("/tty0"), "rootfs:tty0");
        assert_eq!(vfs.read("/etc/../dev/./tty0"), "devfs:tty0");
        assert!(vfs.lookup("/dev").unwrap().is_directory());
    }

    #[test]
    fn test_misses_are_empty_results() {
        let mut vfs = vfs();
        vfs.add_filesystem(Fixed::new("devfs", &["tty0"]));
        vfs.mount("/dev", "devfs").unwrap();

        assert_eq!(vfs.read("/nonexistent"), "");
        assert_eq!(vfs.read("/dev/missing"), "");
        assert!(vfs.readdir("/dev/tty0").is_empty());
        // Leaf nodes have no lookup
        assert!(vfs.lookup("/dev/tty0/deeper").is_none());
        vfs.write("/dev/missing", "dropped");
        assert!(!vfs.open("/nowhere"));
        assert!(vfs.open("/dev/tty0"));
    }

    #[test]
    fn test_readdir_lists_directory() {
        let mut vfs = vfs();
        vfs.add_filesystem(Fixed::new("devfs", &["tty0", "fb0"]));
        vfs.mount("/dev", "devfs").unwrap();
        let names: Vec<String> = vfs.readdir("/dev").into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["tty0", "fb0"]);
    }

    #[test]
    fn test_unmount() {
        let mut vfs = vfs();
        let fs = Fixed::new("devfs", &["tty0"]);
        vfs.add_filesystem(fs.clone());
        vfs.mount("/dev", "devfs").unwrap();
        vfs.mount("/mnt", "devfs").unwrap();
        assert_eq!(vfs.mount_count("devfs"), Some(2));

        assert!(matches!(vfs.remove_filesystem("devfs"), Err(VfsError::MountPointInUse(_))));
        vfs.unmount("/dev").unwrap();
        assert_eq!(vfs.unmount("/dev"), Err(VfsError::NotMounted(String::from("/dev"))));
        assert_eq!(vfs.mount_count("devfs"), Some(1));
        assert_eq!(*fs.unmounts.borrow(), ["/dev"]);
        assert_eq!(vfs.read("/dev/tty0"), "");
        assert_eq!(vfs.read("/mnt/tty0"), "devfs:tty0");

        vfs.unmount("/mnt").unwrap();
        assert_eq!(vfs.remove_filesystem("devfs"), Ok(()));
        assert!(vfs.filesystem("devfs").is_none());
    }
}
