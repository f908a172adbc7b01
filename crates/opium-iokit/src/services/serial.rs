//! Serial line service.

use alloc::string::String;

use opium_bsd::EventHandler;

use crate::property::{keys, PropertyDictionary, PropertyValue};
use crate::service::{IoService, ServiceContext};

/// A serial line published as a character device.
///
/// Bytes arriving from the line are queued in the input buffer and announced
/// on `data_received`; bytes written into the device are appended to the
/// output buffer and announced on `data_sent`.
pub struct IoSerial {
    bsd_name: String,
    input: String,
    output: String,
    connected: bool,
    /// Fired with every chunk pushed from the line
    pub data_received: EventHandler<str>,
    /// Fired with every chunk written into the device
    pub data_sent: EventHandler<str>,
}

impl Default for IoSerial {
    fn default() -> Self {
        Self::new("tty0")
    }
}

impl IoSerial {
    pub fn new(bsd_name: &str) -> Self {
        Self {
            bsd_name: String::from(bsd_name),
            input: String::new(),
            output: String::new(),
            connected: false,
            data_received: EventHandler::new(),
            data_sent: EventHandler::new(),
        }
    }

    pub fn connect(&mut self) -> bool {
        self.connected = true;
        true
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Data arrived from the physical line.
    pub fn push_from_hardware(&mut self, data: &str) {
        self.input.push_str(data);
        self.data_received.notify(data);
    }

    /// Everything written into the device so far.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl IoService for IoSerial {
    fn configure(
        &mut self,
        properties: &mut PropertyDictionary,
        personality: &mut PropertyDictionary,
    ) {
        properties.insert(String::from(keys::IO_CLASS), PropertyValue::from("IOSerial"));
        personality.insert(
            String::from(keys::IO_PROVIDER_CLASS),
            PropertyValue::from("IOConsole"),
        );
    }

    fn start(&mut self, ctx: &mut ServiceContext<'_>) -> bool {
        let major = ctx.id().0;
        ctx.set_property(keys::IO_BSD_NAME, self.bsd_name.as_str());
        ctx.set_property(keys::IO_BSD_TYPE, keys::BSD_TYPE_CHARACTER);
        ctx.set_property(keys::IO_BSD_MAJOR, major);
        ctx.set_property(keys::IO_BSD_MINOR, 0u64);
        self.connect()
    }

    fn read(&mut self) -> String {
        core::mem::take(&mut self.input)
    }

    fn write(&mut self, data: &str) {
        self.output.push_str(data);
        self.data_sent.notify(data);
    }
}
