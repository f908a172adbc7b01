//! Device switches and device tables.
//!
//! A *device switch* is a driver's entry-point table, registered per major
//! number. A *device* binds one [`DeviceId`] and a display name to the switch
//! of its major. Every operation on a device is a straight forward into the
//! bound switch.
//!
//! ```text
//!   DeviceSwitchTable
//!   ├── character switches   major ─▶ Rc<CharacterDeviceSwitch>
//!   ├── block switches       major ─▶ Rc<BlockDeviceSwitch>
//!   ├── character devices    DeviceId ─▶ CharacterDevice { name, switch }
//!   ├── block devices        DeviceId ─▶ BlockDevice { name, switch }
//!   └── device events        fired after every successful add
//! ```
//!
//! The table uses interior mutability so that it can be shared (`Rc`) by
//! the service registry, the device filesystem and the terminals. It is not
//! `Send`: one thread owns the kernel.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::device_id::{DeviceId, DeviceIdAllocator, MajorId};
use crate::error::{DeviceKind, IoError, IoResult};
use crate::event::{EventHandler, HandlerId};

/// `open` / `close` entry point.
pub type ControlFn = Box<dyn Fn(DeviceId) -> IoResult<()>>;
/// Character `read` entry point.
pub type ReadFn = Box<dyn Fn(DeviceId) -> IoResult<String>>;
/// Character `write` entry point.
pub type WriteFn = Box<dyn Fn(DeviceId, &str) -> IoResult<()>>;
/// Block `strategy` entry point. Returns the number of bytes transferred.
pub type StrategyFn = Box<dyn Fn(DeviceId, &mut [u8]) -> IoResult<usize>>;

fn call_control(f: &Option<ControlFn>, id: DeviceId) -> IoResult<()> {
    match f {
        Some(f) => f(id),
        None => Err(IoError::NotSupported),
    }
}

// ============================================================================
// Character devices
// ============================================================================

/// Entry points of a character driver. Unset entries report `NotSupported`.
#[derive(Default)]
pub struct CharacterDeviceSwitch {
    open_fn: Option<ControlFn>,
    close_fn: Option<ControlFn>,
    read_fn: Option<ReadFn>,
    write_fn: Option<WriteFn>,
}

impl CharacterDeviceSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(mut self, f: impl Fn(DeviceId) -> IoResult<()> + 'static) -> Self {
        self.open_fn = Some(Box::new(f));
        self
    }

    pub fn with_close(mut self, f: impl Fn(DeviceId) -> IoResult<()> + 'static) -> Self {
        self.close_fn = Some(Box::new(f));
        self
    }

    pub fn with_read(mut self, f: impl Fn(DeviceId) -> IoResult<String> + 'static) -> Self {
        self.read_fn = Some(Box::new(f));
        self
    }

    pub fn with_write(mut self, f: impl Fn(DeviceId, &str) -> IoResult<()> + 'static) -> Self {
        self.write_fn = Some(Box::new(f));
        self
    }

    pub fn open(&self, id: DeviceId) -> IoResult<()> {
        call_control(&self.open_fn, id)
    }

    pub fn close(&self, id: DeviceId) -> IoResult<()> {
        call_control(&self.close_fn, id)
    }

    pub fn read(&self, id: DeviceId) -> IoResult<String> {
        match &self.read_fn {
            Some(f) => f(id),
            None => Err(IoError::NotSupported),
        }
    }

    pub fn write(&self, id: DeviceId, data: &str) -> IoResult<()> {
        match &self.write_fn {
            Some(f) => f(id, data),
            None => Err(IoError::NotSupported),
        }
    }
}

/// A character device instance bound to its major's switch.
pub struct CharacterDevice {
    pub id: DeviceId,
    pub name: String,
    switch: Rc<CharacterDeviceSwitch>,
}

impl CharacterDevice {
    pub fn open(&self) -> IoResult<()> {
        self.switch.open(self.id)
    }

    pub fn close(&self) -> IoResult<()> {
        self.switch.close(self.id)
    }

    pub fn read(&self) -> IoResult<String> {
        self.switch.read(self.id)
    }

    pub fn write(&self, data: &str) -> IoResult<()> {
        self.switch.write(self.id, data)
    }
}

// ============================================================================
// Block devices
// ============================================================================

/// Entry points of a block driver. Unset entries report `NotSupported`.
#[derive(Default)]
pub struct BlockDeviceSwitch {
    open_fn: Option<ControlFn>,
    close_fn: Option<ControlFn>,
    strategy_fn: Option<StrategyFn>,
}

impl BlockDeviceSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(mut self, f: impl Fn(DeviceId) -> IoResult<()> + 'static) -> Self {
        self.open_fn = Some(Box::new(f));
        self
    }

    pub fn with_close(mut self, f: impl Fn(DeviceId) -> IoResult<()> + 'static) -> Self {
        self.close_fn = Some(Box::new(f));
        self
    }

    pub fn with_strategy(
        mut self,
        f: impl Fn(DeviceId, &mut [u8]) -> IoResult<usize> + 'static,
    ) -> Self {
        self.strategy_fn = Some(Box::new(f));
        self
    }

    pub fn open(&self, id: DeviceId) -> IoResult<()> {
        call_control(&self.open_fn, id)
    }

    pub fn close(&self, id: DeviceId) -> IoResult<()> {
        call_control(&self.close_fn, id)
    }

    pub fn strategy(&self, id: DeviceId, buf: &mut [u8]) -> IoResult<usize> {
        match &self.strategy_fn {
            Some(f) => f(id, buf),
            None => Err(IoError::NotSupported),
        }
    }
}

/// A block device instance bound to its major's switch.
pub struct BlockDevice {
    pub id: DeviceId,
    pub name: String,
    switch: Rc<BlockDeviceSwitch>,
}

impl BlockDevice {
    pub fn open(&self) -> IoResult<()> {
        self.switch.open(self.id)
    }

    pub fn close(&self) -> IoResult<()> {
        self.switch.close(self.id)
    }

    pub fn strategy(&self, buf: &mut [u8]) -> IoResult<usize> {
        self.switch.strategy(self.id, buf)
    }
}

// ============================================================================
// Table
// ============================================================================

/// Payload of the device-published event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEvent {
    pub device_id: DeviceId,
    pub kind: DeviceKind,
    /// Display name the device was registered under
    pub name: String,
}

impl DeviceEvent {
    pub fn is_character(&self) -> bool {
        self.kind.is_character()
    }
}

/// Per-major switch registries plus the device instance registries.
#[derive(Default)]
pub struct DeviceSwitchTable {
    character_switches: RefCell<BTreeMap<MajorId, Rc<CharacterDeviceSwitch>>>,
    block_switches: RefCell<BTreeMap<MajorId, Rc<BlockDeviceSwitch>>>,
    character_devices: RefCell<BTreeMap<DeviceId, Rc<CharacterDevice>>>,
    block_devices: RefCell<BTreeMap<DeviceId, Rc<BlockDevice>>>,
    allocator: RefCell<DeviceIdAllocator>,
    events: RefCell<EventHandler<DeviceEvent>>,
}

impl DeviceSwitchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    // ========== Switches ==========

    /// Register (or silently replace) the character switch for `major`.
    pub fn add_character_device_switch(&self, major: MajorId, switch: CharacterDeviceSwitch) {
        self.character_switches
            .borrow_mut()
            .insert(major, Rc::new(switch));
    }

    /// Register (or silently replace) the block switch for `major`.
    pub fn add_block_device_switch(&self, major: MajorId, switch: BlockDeviceSwitch) {
        self.block_switches.borrow_mut().insert(major, Rc::new(switch));
    }

    pub fn character_switch(&self, major: MajorId) -> Option<Rc<CharacterDeviceSwitch>> {
        self.character_switches.borrow().get(&major).cloned()
    }

    pub fn block_switch(&self, major: MajorId) -> Option<Rc<BlockDeviceSwitch>> {
        self.block_switches.borrow().get(&major).cloned()
    }

    // ========== Devices ==========

    /// Create a character device bound to the switch of `id`'s major.
    ///
    /// Fails with [`IoError::SwitchNotRegistered`] (and inserts nothing) if
    /// no switch is registered for that major.
    pub fn add_character_device(&self, id: DeviceId, name: &str) -> IoResult<Rc<CharacterDevice>> {
        let switch = self
            .character_switch(id.major())
            .ok_or(IoError::SwitchNotRegistered {
                kind: DeviceKind::Character,
                major: id.major(),
            })?;

        let device = Rc::new(CharacterDevice {
            id,
            name: String::from(name),
            switch,
        });
        self.character_devices.borrow_mut().insert(id, device.clone());

        self.notify(DeviceEvent {
            device_id: id,
            kind: DeviceKind::Character,
            name: String::from(name),
        });
        Ok(device)
    }

    /// Create a block device bound to the switch of `id`'s major.
    ///
    /// Fails with [`IoError::SwitchNotRegistered`] (and inserts nothing) if
    /// no switch is registered for that major.
    pub fn add_block_device(&self, id: DeviceId, name: &str) -> IoResult<Rc<BlockDevice>> {
        let switch = self
            .block_switch(id.major())
            .ok_or(IoError::SwitchNotRegistered {
                kind: DeviceKind::Block,
                major: id.major(),
            })?;

        let device = Rc::new(BlockDevice {
            id,
            name: String::from(name),
            switch,
        });
        self.block_devices.borrow_mut().insert(id, device.clone());

        self.notify(DeviceEvent {
            device_id: id,
            kind: DeviceKind::Block,
            name: String::from(name),
        });
        Ok(device)
    }

    pub fn get_character_device(&self, id: DeviceId) -> Option<Rc<CharacterDevice>> {
        self.character_devices.borrow().get(&id).cloned()
    }

    pub fn get_block_device(&self, id: DeviceId) -> Option<Rc<BlockDevice>> {
        self.block_devices.borrow().get(&id).cloned()
    }

    /// All character devices, in device ID order.
    pub fn character_devices(&self) -> Vec<Rc<CharacterDevice>> {
        self.character_devices.borrow().values().cloned().collect()
    }

    /// All block devices, in device ID order.
    pub fn block_devices(&self) -> Vec<Rc<BlockDevice>> {
        self.block_devices.borrow().values().cloned().collect()
    }

    // ========== Numbering ==========

    /// Reserve a fresh major number (returns its minor-0 device ID).
    pub fn allocate_device_id(&self) -> DeviceId {
        self.allocator.borrow_mut().allocate()
    }

    /// Next free minor for an existing major.
    pub fn allocate_minor(&self, major: MajorId) -> DeviceId {
        self.allocator.borrow_mut().allocate_minor(major)
    }

    // ========== Events ==========

    /// Subscribe to device-added events.
    pub fn subscribe<F>(&self, callback: F) -> HandlerId
    where
        F: FnMut(&DeviceEvent) + 'static,
    {
        self.events.borrow_mut().add(callback)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.events.borrow_mut().remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.borrow().len()
    }

    fn notify(&self, event: DeviceEvent) {
        // Table borrows are released here, so subscribers may query devices.
        self.events.borrow_mut().notify(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    fn buffer_switch(buffer: Rc<RefCell<String>>) -> CharacterDeviceSwitch {
        let rb = buffer.clone();
        CharacterDeviceSwitch::new()
            .with_read(move |_| Ok(core::mem::take(&mut *rb.borrow_mut())))
            .with_write(move |_, data| {
                buffer.borrow_mut().push_str(data);
                Ok(())
            })
    }

    #[test]
    fn test_add_device_requires_switch() {
        let table = DeviceSwitchTable::new();
        let id = DeviceId::new(3, 0);

        let err = table.add_character_device(id, "tty0").err();
        assert_eq!(
            err,
            Some(IoError::SwitchNotRegistered {
                kind: DeviceKind::Character,
                major: 3
            })
        );
        assert!(table.get_character_device(id).is_none());

        let err = table.add_block_device(id, "disk0").err();
        assert!(err.map(|e| e.is_switch_not_registered()).unwrap_or(false));
        assert!(table.get_block_device(id).is_none());
    }

    #[test]
    fn test_character_forwarding() {
        let table = DeviceSwitchTable::new();
        let buffer = Rc::new(RefCell::new(String::new()));
        table.add_character_device_switch(3, buffer_switch(buffer.clone()));

        let dev = table.add_character_device(DeviceId::new(3, 0), "tty0").unwrap();
        dev.write("echo test\n").unwrap();
        assert_eq!(*buffer.borrow(), "echo test\n");
        assert_eq!(dev.read().unwrap(), "echo test\n");
        assert_eq!(dev.read().unwrap(), "");

        // open/close were never provided
        assert_eq!(dev.open(), Err(IoError::NotSupported));
        assert_eq!(dev.close(), Err(IoError::NotSupported));
    }

    #[test]
    fn test_switch_overwrite() {
        let table = DeviceSwitchTable::new();
        table.add_character_device_switch(
            5,
            CharacterDeviceSwitch::new().with_read(|_| Ok(String::from("old"))),
        );
        table.add_character_device_switch(
            5,
            CharacterDeviceSwitch::new().with_read(|_| Ok(String::from("new"))),
        );
        let sw = table.character_switch(5).unwrap();
        assert_eq!(sw.read(DeviceId::new(5, 0)).unwrap(), "new");
    }

    #[test]
    fn test_block_strategy() {
        let table = DeviceSwitchTable::new();
        table.add_block_device_switch(
            8,
            BlockDeviceSwitch::new()
                .with_open(|_| Ok(()))
                .with_strategy(|id, buf| {
                    for b in buf.iter_mut() {
                        *b = id.minor() as u8;
                    }
                    Ok(buf.len())
                }),
        );
        let dev = table.add_block_device(DeviceId::new(8, 2), "disk0").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(dev.strategy(&mut buf), Ok(4));
        assert_eq!(buf, [2, 2, 2, 2]);
        assert_eq!(dev.open(), Ok(()));
        assert_eq!(dev.close(), Err(IoError::NotSupported));
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let table = DeviceSwitchTable::new();
        assert!(table.get_character_device(DeviceId::new(1, 1)).is_none());
        assert!(table.get_block_device(DeviceId::new(1, 1)).is_none());
        assert!(table.character_switch(1).is_none());
    }

    #[test]
    fn test_event_fires_on_add() {
        let table = DeviceSwitchTable::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = events.clone();
        table.subscribe(move |ev: &DeviceEvent| e.borrow_mut().push(ev.clone()));

        table.add_character_device_switch(3, CharacterDeviceSwitch::new());
        table.add_block_device_switch(4, BlockDeviceSwitch::new());
        table.add_character_device(DeviceId::new(3, 0), "tty0").unwrap();
        table.add_block_device(DeviceId::new(4, 0), "disk0").unwrap();
        // Failed adds fire nothing
        let _ = table.add_character_device(DeviceId::new(9, 0), "ghost");

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_character());
        assert_eq!(events[0].name, "tty0");
        assert_eq!(events[1].kind, DeviceKind::Block);
        assert_eq!(events[1].device_id, DeviceId::new(4, 0));
    }

    #[test]
    fn test_subscriber_can_query_table() {
        let table = Rc::new(DeviceSwitchTable::new());
        let found = Rc::new(RefCell::new(false));
        let (t, f) = (Rc::downgrade(&table), found.clone());
        table.subscribe(move |ev: &DeviceEvent| {
            if let Some(t) = t.upgrade() {
                *f.borrow_mut() = t.get_character_device(ev.device_id).is_some();
            }
        });
        table.add_character_device_switch(1, CharacterDeviceSwitch::new());
        table.add_character_device(DeviceId::new(1, 0), "null").unwrap();
        assert!(*found.borrow());
    }

    #[test]
    fn test_enumeration_in_id_order() {
        let table = DeviceSwitchTable::new();
        table.add_character_device_switch(2, CharacterDeviceSwitch::new());
        table.add_character_device_switch(1, CharacterDeviceSwitch::new());
        table.add_character_device(DeviceId::new(2, 0), "b").unwrap();
        table.add_character_device(DeviceId::new(1, 5), "a").unwrap();
        let names: Vec<String> = table
            .character_devices()
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, alloc::vec![String::from("a"), String::from("b")]);
        assert_eq!(table.character_devices()[0].id.minor(), 5);
    }

    #[test]
    fn test_allocation_through_table() {
        let table = DeviceSwitchTable::new();
        let id = table.allocate_device_id();
        assert_eq!(id, DeviceId::new(1, 0));
        assert_eq!(table.allocate_minor(1), DeviceId::new(1, 1));
    }
}
