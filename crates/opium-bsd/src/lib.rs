//! Opium BSD Device Layer
//!
//! The BSD layer is where drivers become addressable devices:
//!
//! - **Device IDs**: packed `(major, minor)` numbers and their allocator
//! - **Events**: an ordered callback registry used to announce new devices
//! - **IO**: per-major character/block device switches and device tables
//! - **TTY**: terminals bound to character devices
//!
//! # Architecture
//!
//! ```text
//!  IOKit publish ──▶ add_*_device_switch(major)
//!                └─▶ add_*_device(id, name) ──▶ device event ──▶ devfs
//!
//!  VFS / TTY ──▶ switch(major).read/write(id) ──▶ driver closure
//! ```

#![no_std]
extern crate alloc;

pub mod device_id;
pub mod error;
pub mod event;
pub mod io;
pub mod tty;

pub use device_id::{DeviceId, DeviceIdAllocator, MajorId, MinorId};
pub use error::{DeviceKind, IoError, IoResult};
pub use event::{EventHandler, HandlerId};
pub use io::{
    BlockDevice, BlockDeviceSwitch, CharacterDevice, CharacterDeviceSwitch, DeviceEvent,
    DeviceSwitchTable,
};
pub use tty::{Terminal, TerminalId, TerminalRef, TerminalTable};
