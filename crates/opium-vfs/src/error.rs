//! Error types for the VFS layer.

use alloc::string::String;
use core::fmt;

/// Errors from VFS operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VfsError {
    /// No filesystem registered under this name
    UnknownFileSystem(String),

    /// Mount path is empty or ends in `/`
    InvalidMountPoint(String),

    /// Something is already mounted at this path
    MountPointInUse(String),

    /// Nothing is mounted at this path
    NotMounted(String),

    /// The filesystem's mount hook refused
    MountFailed(String),

    /// The filesystem was used before `init`
    NotInitialized,

    /// Path not found
    NotFound,

    /// Path already exists
    AlreadyExists,

    /// Not a directory
    NotADirectory,

    /// Not a file
    NotAFile,
}

impl VfsError {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound)
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::UnknownFileSystem(name) => write!(f, "unknown filesystem: {}", name),
            VfsError::InvalidMountPoint(path) => write!(f, "invalid mount point: {}", path),
            VfsError::MountPointInUse(path) => write!(f, "mount point already in use: {}", path),
            VfsError::NotMounted(path) => write!(f, "not mounted: {}", path),
            VfsError::MountFailed(reason) => write!(f, "mount failed: {}", reason),
            VfsError::NotInitialized => f.write_str("filesystem not initialized"),
            VfsError::NotFound => f.write_str("not found"),
            VfsError::AlreadyExists => f.write_str("already exists"),
            VfsError::NotADirectory => f.write_str("not a directory"),
            VfsError::NotAFile => f.write_str("not a file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", VfsError::InvalidMountPoint(String::from("/dev/"))),
            "invalid mount point: /dev/"
        );
        assert_eq!(format!("{}", VfsError::NotFound), "not found");
    }

    #[test]
    fn test_is_not_found() {
        assert!(VfsError::NotFound.is_not_found());
        assert!(!VfsError::NotADirectory.is_not_found());
    }
}
