//! Device identifiers.
//!
//! A [`DeviceId`] packs a 32-bit major number (the driver, i.e. which
//! device switch handles it) and a 32-bit minor number (the instance) into
//! one 64-bit value: `(major << 32) | minor`.

use alloc::collections::BTreeMap;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Driver class number. Indexes the device-switch tables.
pub type MajorId = u32;

/// Instance number within a major.
pub type MinorId = u32;

/// Packed (major, minor) device identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Pack a major and minor number.
    pub const fn new(major: MajorId, minor: MinorId) -> Self {
        Self(((major as u64) << 32) | minor as u64)
    }

    /// Major number (upper 32 bits).
    pub const fn major(self) -> MajorId {
        (self.0 >> 32) as MajorId
    }

    /// Minor number (lower 32 bits).
    pub const fn minor(self) -> MinorId {
        (self.0 & 0xFFFF_FFFF) as MinorId
    }

    /// Raw 64-bit encoding.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeviceId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Hands out device numbers.
///
/// `allocate` reserves a whole new major (with minor 0); `allocate_minor`
/// hands out further instances of an existing major.
#[derive(Clone, Debug)]
pub struct DeviceIdAllocator {
    next_major: MajorId,
    next_minor: BTreeMap<MajorId, MinorId>,
}

impl Default for DeviceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceIdAllocator {
    pub fn new() -> Self {
        Self {
            next_major: 1,
            next_minor: BTreeMap::new(),
        }
    }

    /// Reserve a fresh major number and return its first device (minor 0).
    ///
    /// Majors already handed minors through `allocate_minor` are skipped, so
    /// `(major, 0)` is never issued twice.
    pub fn allocate(&mut self) -> DeviceId {
        while self.next_minor.contains_key(&self.next_major) {
            self.next_major = self.next_major.wrapping_add(1);
        }
        let major = self.next_major;
        self.next_major = self.next_major.wrapping_add(1);
        self.next_minor.insert(major, 1);
        DeviceId::new(major, 0)
    }

    /// Hand out the next minor number for `major`.
    pub fn allocate_minor(&mut self, major: MajorId) -> DeviceId {
        let slot = self.next_minor.entry(major).or_insert(0);
        let minor = *slot;
        *slot = slot.wrapping_add(1);
        DeviceId::new(major, minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_full_width() {
        let cases = [
            (0, 0),
            (3, 0),
            (1, 7),
            (0xFF, 0xFF),
            (0x100, 0x100),
            (MajorId::MAX, 0),
            (0, MinorId::MAX),
            (MajorId::MAX, MinorId::MAX),
            (0xDEAD_BEEF, 0x1234_5678),
        ];
        for (major, minor) in cases {
            let id = DeviceId::new(major, minor);
            assert_eq!(id.major(), major);
            assert_eq!(id.minor(), minor);
        }
    }

    #[test]
    fn test_layout() {
        assert_eq!(DeviceId::new(3, 0).raw(), 3 << 32);
        assert_eq!(DeviceId::new(1, 2).raw(), (1 << 32) | 2);
        assert_eq!(DeviceId::from(0x0000_0004_0000_0009).major(), 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(alloc::format!("{}", DeviceId::new(4, 1)), "4:1");
    }

    #[test]
    fn test_allocator() {
        let mut alloc = DeviceIdAllocator::new();
        let first = alloc.allocate();
        assert_eq!((first.major(), first.minor()), (1, 0));
        let second = alloc.allocate();
        assert_eq!(second.major(), 2);

        let extra = alloc.allocate_minor(1);
        assert_eq!((extra.major(), extra.minor()), (1, 1));
        assert_eq!(alloc.allocate_minor(1).minor(), 2);

        // A major that was never allocated starts at minor 0
        assert_eq!(alloc.allocate_minor(40).minor(), 0);
    }

    #[test]
    fn test_allocate_skips_majors_with_minors() {
        let mut alloc = DeviceIdAllocator::new();
        assert_eq!(alloc.allocate_minor(1), DeviceId::new(1, 0));
        assert_eq!(alloc.allocate_minor(2), DeviceId::new(2, 0));

        assert_eq!(alloc.allocate(), DeviceId::new(3, 0));
        // Counters of majors 1 and 2 are untouched
        assert_eq!(alloc.allocate_minor(1), DeviceId::new(1, 1));
        assert_eq!(alloc.allocate_minor(2), DeviceId::new(2, 1));
        assert_eq!(alloc.allocate(), DeviceId::new(4, 0));
    }
}
