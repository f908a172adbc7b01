//! Terminals.
//!
//! A terminal is a pair of byte buffers bound to a character device. Input
//! is pushed in by whoever owns the line (usually a serial driver's receive
//! event) and drained by `read`. Output is recorded locally and forwarded to
//! the character switch of the attached device's major.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use crate::device_id::DeviceId;
use crate::error::IoResult;
use crate::io::DeviceSwitchTable;

/// Terminal identifier.
pub type TerminalId = u64;

/// Shared handle to a terminal.
pub type TerminalRef = Rc<RefCell<Terminal>>;

pub struct Terminal {
    pub id: TerminalId,
    pub session_id: u64,
    pub foreground_process_group_id: u64,
    input: String,
    output: String,
    device_id: Option<DeviceId>,
    devices: Rc<DeviceSwitchTable>,
}

impl Terminal {
    fn new(id: TerminalId, devices: Rc<DeviceSwitchTable>) -> Self {
        Self {
            id,
            session_id: 0,
            foreground_process_group_id: 0,
            input: String::new(),
            output: String::new(),
            device_id: None,
            devices,
        }
    }

    pub fn attach_device(&mut self, device: DeviceId) {
        self.device_id = Some(device);
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub fn push_input(&mut self, data: &str) {
        self.input.push_str(data);
    }

    /// Drain and return everything pushed since the last read.
    pub fn read(&mut self) -> String {
        core::mem::take(&mut self.input)
    }

    /// Record `data` and forward it to the attached device's switch.
    ///
    /// Nothing is forwarded when no device is attached or its major has no
    /// character switch; the data is still recorded. Errors from the switch
    /// (`Busy` on a re-entrant write) are returned after recording.
    pub fn write(&mut self, data: &str) -> IoResult<()> {
        self.output.push_str(data);
        let Some(device) = self.device_id else {
            return Ok(());
        };
        match self.devices.character_switch(device.major()) {
            Some(switch) => switch.write(device, data),
            None => Ok(()),
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &str {
        &self.output
    }
}

/// Terminal registry, keyed by terminal ID.
pub struct TerminalTable {
    terminals: BTreeMap<TerminalId, TerminalRef>,
    devices: Rc<DeviceSwitchTable>,
}

impl TerminalTable {
    pub fn new(devices: Rc<DeviceSwitchTable>) -> Self {
        Self {
            terminals: BTreeMap::new(),
            devices,
        }
    }

    /// Create a terminal, replacing any previous terminal with the same ID.
    pub fn create_terminal(&mut self, id: TerminalId) -> TerminalRef {
        let terminal = Rc::new(RefCell::new(Terminal::new(id, self.devices.clone())));
        self.terminals.insert(id, terminal.clone());
        terminal
    }

    pub fn get_terminal(&self, id: TerminalId) -> Option<TerminalRef> {
        self.terminals.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoError;
    use crate::io::CharacterDeviceSwitch;

    #[test]
    fn test_input_is_drained() {
        let mut table = TerminalTable::new(DeviceSwitchTable::shared());
        let tty = table.create_terminal(100);
        tty.borrow_mut().push_input("result: ");
        tty.borrow_mut().push_input("file1 file2\n");
        assert_eq!(tty.borrow_mut().read(), "result: file1 file2\n");
        assert_eq!(tty.borrow_mut().read(), "");
    }

    #[test]
    fn test_write_forwards_to_switch() {
        let devices = DeviceSwitchTable::shared();
        let line = Rc::new(RefCell::new(String::new()));
        let l = line.clone();
        devices.add_character_device_switch(
            4,
            CharacterDeviceSwitch::new().with_write(move |_, data| {
                l.borrow_mut().push_str(data);
                Ok(())
            }),
        );

        let mut table = TerminalTable::new(devices);
        let tty = table.create_terminal(1);
        tty.borrow_mut().attach_device(DeviceId::new(4, 0));
        tty.borrow_mut().write("shell> ls -la\n").unwrap();

        assert_eq!(*line.borrow(), "shell> ls -la\n");
        assert_eq!(tty.borrow().output(), "shell> ls -la\n");
    }

    #[test]
    fn test_write_without_switch_is_recorded_only() {
        let mut table = TerminalTable::new(DeviceSwitchTable::shared());
        let tty = table.create_terminal(1);
        tty.borrow_mut().attach_device(DeviceId::new(9, 0));
        assert_eq!(tty.borrow_mut().write("lost"), Ok(()));
        assert_eq!(tty.borrow().output(), "lost");
    }

    #[test]
    fn test_switch_error_is_returned() {
        let devices = DeviceSwitchTable::shared();
        let device = DeviceId::new(4, 0);
        devices.add_character_device_switch(
            4,
            CharacterDeviceSwitch::new().with_write(|dev, _| Err(IoError::Busy(dev))),
        );

        let mut table = TerminalTable::new(devices);
        let tty = table.create_terminal(1);
        tty.borrow_mut().attach_device(device);
        assert_eq!(tty.borrow_mut().write("x"), Err(IoError::Busy(device)));
        assert_eq!(tty.borrow().output(), "x");
    }

    #[test]
    fn test_create_replaces_and_get() {
        let mut table = TerminalTable::new(DeviceSwitchTable::shared());
        let first = table.create_terminal(7);
        first.borrow_mut().push_input("stale");
        table.create_terminal(7);

        let current = table.get_terminal(7).unwrap();
        assert_eq!(current.borrow_mut().read(), "");
        assert!(table.get_terminal(8).is_none());
        assert_eq!(table.len(), 1);
    }
}
