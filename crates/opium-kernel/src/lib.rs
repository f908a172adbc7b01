//! Opium Kernel
//!
//! Owns one instance of every shared table and wires them together:
//!
//! ```text
//!   Kernel
//!   ├── DeviceSwitchTable   (BSD device switches and devices)
//!   ├── IoRegistry          (service tree, publishes into the table)
//!   ├── Vfs                 (rootfs at /, devfs at /dev)
//!   └── TerminalTable       (terminal 100 on the serial line)
//! ```
//!
//! The kernel is single-threaded: the tables are `Rc`/`RefCell` shared and
//! therefore `!Send`, so the one thread that owns the `Kernel` is the only
//! writer.

#![no_std]
extern crate alloc;

pub mod config;
pub mod error;
pub mod shell;

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use opium_bsd::{DeviceSwitchTable, TerminalRef, TerminalTable};
use opium_hal::{HalRef, HAL};
use opium_iokit::{
    check_registry_invariants, DescriptorService, InvariantViolation, IoConsole, IoFramebuffer,
    IoRegistry, IoSerial, IoService, ServiceId,
};
use opium_vfs::{parent_path, DeviceFs, MemoryFs, Vfs};

pub use config::{BootConfig, FileConfig, MountConfig};
pub use error::KernelError;
pub use shell::{Command, CommandOutcome, HELP, PROMPT};

/// Handles to the stock services, kept once boot has created them.
struct Console {
    console: Rc<RefCell<IoConsole>>,
    framebuffer: Rc<RefCell<IoFramebuffer>>,
    serial: Rc<RefCell<IoSerial>>,
    serial_id: ServiceId,
    terminal: TerminalRef,
}

/// The kernel context.
pub struct Kernel<H: HAL> {
    hal: Rc<H>,
    devices: Rc<DeviceSwitchTable>,
    registry: IoRegistry,
    vfs: Vfs,
    terminals: TerminalTable,
    rootfs: Rc<MemoryFs>,
    devfs: Rc<DeviceFs>,
    console: Option<Console>,
}

impl<H: HAL> Kernel<H> {
    /// Create a kernel with empty tables and a registry holding only Root.
    pub fn new(hal: H) -> Self {
        let hal = Rc::new(hal);
        let hal_ref: HalRef = hal.clone();
        let devices = DeviceSwitchTable::shared();
        Self {
            registry: IoRegistry::new(hal_ref.clone(), devices.clone()),
            vfs: Vfs::new(hal_ref.clone()),
            terminals: TerminalTable::new(devices.clone()),
            rootfs: Rc::new(MemoryFs::new()),
            devfs: Rc::new(DeviceFs::new(hal_ref, devices.clone())),
            devices,
            hal,
            console: None,
        }
    }

    fn hal_ref(&self) -> HalRef {
        self.hal.clone()
    }

    /// Bring the system up.
    ///
    /// Seeds the root filesystem, then registers the console, framebuffer,
    /// serial line and any configured services, matches and starts them,
    /// binds the controlling terminal to the serial device, registers the
    /// filesystems and performs the configured mounts. Mount failures are
    /// logged and skipped.
    ///
    /// Every fallible step runs before the first service is registered, so
    /// an `Err` leaves the registry and device tables untouched and `boot`
    /// may be retried.
    pub fn boot(&mut self, config: &BootConfig) -> Result<(), KernelError> {
        if self.console.is_some() {
            return Err(KernelError::AlreadyBooted);
        }
        config.validate()?;
        self.hal.debug_write("[kernel] Booting");

        for file in &config.files {
            self.rootfs.mkdir_p(&parent_path(&file.path))?;
            self.rootfs.write_file(&file.path, &file.contents)?;
        }

        let (_, console) = self.registry.add_service(IoConsole::new());
        let (_, framebuffer) = self.registry.add_service(IoFramebuffer::new(self.hal_ref()));
        let (serial_id, serial) = self.registry.add_service(IoSerial::new(&config.serial_name));
        for descriptor in &config.services {
            self.registry
                .add_service(DescriptorService::new(descriptor.clone()));
        }

        let started = self.registry.match_and_start_devices();
        self.hal
            .debug_write(&format!("[kernel] Started {} services", started));

        let terminal = self.terminals.create_terminal(config.terminal_id);
        match self.registry.get_bsd_device_id(serial_id) {
            Some(device) => terminal.borrow_mut().attach_device(device),
            None => self.hal.debug_write(&format!(
                "[kernel] Serial service {} has no device number",
                serial_id.0
            )),
        }

        {
            let mut line = serial.borrow_mut();
            let input = terminal.clone();
            line.data_received
                .add(move |data: &str| input.borrow_mut().push_input(data));
            let echo = console.clone();
            line.data_sent.add(move |data: &str| {
                if let Ok(mut console) = echo.try_borrow_mut() {
                    console.write(&format!("[serial TX] {}", data));
                }
            });
        }

        self.vfs.add_filesystem(self.rootfs.clone());
        self.vfs.add_filesystem(self.devfs.clone());

        for mount in &config.mounts {
            if let Err(e) = self.vfs.mount(&mount.path, &mount.filesystem) {
                self.hal.debug_write(&format!(
                    "[kernel] Mount of {} at {} failed: {}",
                    mount.filesystem, mount.path, e
                ));
            }
        }

        console.borrow_mut().write("Kernel boot OK\n");
        self.console = Some(Console {
            console,
            framebuffer,
            serial,
            serial_id,
            terminal,
        });
        Ok(())
    }

    pub fn is_booted(&self) -> bool {
        self.console.is_some()
    }

    /// Execute one shell line.
    ///
    /// Replies travel the same way as line input: pushed in from the serial
    /// side, drained from the terminal and written back out on the line.
    /// `iotree` output bypasses the line.
    pub fn run_command(&mut self, line: &str) -> CommandOutcome {
        let mut replies: Vec<String> = Vec::new();

        match Command::parse(line) {
            Command::Exit => return CommandOutcome::exit(),
            Command::IoTree { json: false } => {
                return CommandOutcome::output(self.registry.dump_registry(self.registry.root()));
            }
            Command::IoTree { json: true } => {
                let rendered = self
                    .registry
                    .snapshot(self.registry.root())
                    .map(|tree| serde_json::to_string_pretty(&tree));
                let output = match rendered {
                    Some(Ok(json)) => json + "\n",
                    Some(Err(e)) => format!("iotree: {}\n", e),
                    None => String::new(),
                };
                return CommandOutcome::output(output);
            }
            Command::Help => replies.push(String::from(HELP)),
            Command::Ls(path) => {
                replies.push(format!("Listing: {}\n", path));
                for entry in self.vfs.readdir(path) {
                    replies.push(entry.name + "\n");
                }
            }
            Command::Cat(path) => {
                let contents = self.vfs.read(path);
                if !contents.is_empty() {
                    replies.push(contents);
                }
            }
            Command::Mounts => {
                for mp in self.vfs.mount_points() {
                    replies.push(format!("{} on {}\n", mp.filesystem, mp.path));
                }
            }
            Command::Echo(text) => replies.push(format!("{}\n", text)),
        }

        CommandOutcome::output(self.transmit(&replies))
    }

    /// Push replies through the serial line and drain the terminal.
    fn transmit(&self, replies: &[String]) -> String {
        let Some(c) = &self.console else {
            return replies.concat();
        };
        for reply in replies {
            c.serial.borrow_mut().push_from_hardware(reply);
        }
        let output = c.terminal.borrow_mut().read();
        c.serial.borrow_mut().write(&output);
        output
    }

    /// Write the prompt to the serial line.
    pub fn prompt(&self) {
        if let Some(c) = &self.console {
            c.serial.borrow_mut().write(PROMPT);
        }
    }

    /// Write straight to the console.
    pub fn console_write(&self, text: &str) {
        if let Some(c) = &self.console {
            c.console.borrow_mut().write(text);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn devices(&self) -> &Rc<DeviceSwitchTable> {
        &self.devices
    }

    pub fn registry(&self) -> &IoRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IoRegistry {
        &mut self.registry
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut Vfs {
        &mut self.vfs
    }

    pub fn terminals(&self) -> &TerminalTable {
        &self.terminals
    }

    pub fn rootfs(&self) -> &Rc<MemoryFs> {
        &self.rootfs
    }

    pub fn devfs(&self) -> &Rc<DeviceFs> {
        &self.devfs
    }

    pub fn serial(&self) -> Option<Rc<RefCell<IoSerial>>> {
        self.console.as_ref().map(|c| c.serial.clone())
    }

    pub fn serial_id(&self) -> Option<ServiceId> {
        self.console.as_ref().map(|c| c.serial_id)
    }

    pub fn framebuffer(&self) -> Option<Rc<RefCell<IoFramebuffer>>> {
        self.console.as_ref().map(|c| c.framebuffer.clone())
    }

    pub fn terminal(&self) -> Option<TerminalRef> {
        self.console.as_ref().map(|c| c.terminal.clone())
    }

    /// Check all registry invariants.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        check_registry_invariants(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opium_hal::TestHal;

    fn booted() -> Kernel<TestHal> {
        let mut kernel = Kernel::new(TestHal::new());
        kernel.boot(&BootConfig::default()).unwrap();
        kernel
    }

    #[test]
    fn test_commands_before_boot_bypass_the_line() {
        let mut kernel = Kernel::new(TestHal::new());
        assert!(!kernel.is_booted());
        assert_eq!(kernel.run_command("hi").output, "hi\n");
        assert_eq!(kernel.run_command("iotree").output, "1 (Root)\n");
    }

    #[test]
    fn test_boot_twice_fails() {
        let mut kernel = booted();
        assert_eq!(kernel.boot(&BootConfig::default()), Err(KernelError::AlreadyBooted));
    }

    #[test]
    fn test_echo_goes_out_on_the_line() {
        let mut kernel = booted();
        let outcome = kernel.run_command("hello");
        assert_eq!(outcome, CommandOutcome::output(String::from("hello\n")));

        let serial = kernel.serial().unwrap();
        assert!(serial.borrow().output().ends_with("hello\n"));
        let fb = kernel.framebuffer().unwrap();
        assert!(fb.borrow().contents().ends_with("[serial TX] hello\n"));
    }

    #[test]
    fn test_exit() {
        let mut kernel = booted();
        assert!(kernel.run_command("exit").exit);
        assert!(!kernel.run_command("exit please").exit);
    }
}
