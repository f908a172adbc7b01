//! Boot configuration.
//!
//! Every field has a default, so `{}` is a complete configuration:
//!
//! ```json
//! {
//!   "terminal_id": 100,
//!   "serial_name": "tty0",
//!   "mounts": [{ "path": "/", "filesystem": "rootfs" }, { "path": "/dev", "filesystem": "devfs" }],
//!   "services": [{ "properties": { "IOClass": "IOBus" } }],
//!   "files": [{ "path": "/etc/motd", "contents": "welcome\n" }]
//! }
//! ```

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use opium_bsd::TerminalId;
use opium_iokit::ServiceDescriptor;
use opium_vfs::{normalize_path, DEVFS_NAME, ROOTFS_NAME};

use crate::error::KernelError;

/// One entry of the boot mount list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub path: String,
    pub filesystem: String,
}

/// A file seeded into the root filesystem at boot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: String,
    #[serde(default)]
    pub contents: String,
}

/// Everything `Kernel::boot` needs to know.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// ID of the controlling terminal
    pub terminal_id: TerminalId,
    /// BSD name the serial line publishes under
    pub serial_name: String,
    /// Mounted in order; failures are logged, not fatal
    pub mounts: Vec<MountConfig>,
    /// Extra data-only services
    pub services: Vec<ServiceDescriptor>,
    pub files: Vec<FileConfig>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            terminal_id: 100,
            serial_name: String::from("tty0"),
            mounts: vec![
                MountConfig {
                    path: String::from("/"),
                    filesystem: String::from(ROOTFS_NAME),
                },
                MountConfig {
                    path: String::from("/dev"),
                    filesystem: String::from(DEVFS_NAME),
                },
            ],
            services: Vec::new(),
            files: Vec::new(),
        }
    }
}

impl BootConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(bytes: &[u8]) -> Result<Self, KernelError> {
        let config: Self = serde_json::from_slice(bytes)
            .map_err(|e| KernelError::Config(format!("{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot boot.
    ///
    /// Seeded files must be absolute, must not be `/` and must not sit where
    /// another seeded file needs a directory.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.serial_name.is_empty() {
            return Err(KernelError::Config(String::from("serial_name is empty")));
        }
        if let Some(file) = self.files.iter().find(|f| !f.path.starts_with('/')) {
            return Err(KernelError::Config(format!(
                "file path must be absolute: {}",
                file.path
            )));
        }

        let paths: Vec<String> = self.files.iter().map(|f| normalize_path(&f.path)).collect();
        for path in &paths {
            if path == "/" {
                return Err(KernelError::Config(String::from("file path must not be /")));
            }
            let prefix = format!("{}/", path);
            if let Some(nested) = paths.iter().find(|other| other.starts_with(&prefix)) {
                return Err(KernelError::Config(format!(
                    "file {} is also the parent of {}",
                    path, nested
                )));
            }
        }
        Ok(())
    }
}
