//! Console multiplexer.

use alloc::string::String;
use alloc::vec::Vec;

use crate::property::{keys, PropertyDictionary, PropertyValue};
use crate::service::{IoService, ServiceContext, ServiceId, ServiceRef};

/// Fans every write out to its target services.
#[derive(Default)]
pub struct IoConsole {
    targets: Vec<(ServiceId, ServiceRef)>,
}

impl IoConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write target. Adding the same ID twice is a no-op.
    pub fn add_target(&mut self, id: ServiceId, service: ServiceRef) {
        if self.targets.iter().any(|(t, _)| *t == id) {
            return;
        }
        self.targets.push((id, service));
    }

    pub fn remove_target(&mut self, id: ServiceId) {
        self.targets.retain(|(t, _)| *t != id);
    }

    pub fn targets(&self) -> Vec<ServiceId> {
        self.targets.iter().map(|(id, _)| *id).collect()
    }
}

impl IoService for IoConsole {
    fn configure(&mut self, properties: &mut PropertyDictionary, _: &mut PropertyDictionary) {
        properties.insert(String::from(keys::IO_CLASS), PropertyValue::from("IOConsole"));
    }

    fn start(&mut self, ctx: &mut ServiceContext<'_>) -> bool {
        for (id, service) in ctx.services_with_class("IOFramebuffer") {
            self.add_target(id, service);
        }
        self.write("Console started\n");
        true
    }

    fn write(&mut self, data: &str) {
        for (_, target) in &self.targets {
            // A target already on the call stack is skipped.
            if let Ok(mut service) = target.try_borrow_mut() {
                service.write(data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[derive(Default)]
    struct Sink(String);

    impl IoService for Sink {
        fn write(&mut self, data: &str) {
            self.0.push_str(data);
        }
    }

    #[test]
    fn test_fan_out_dedups_targets() {
        let a = Rc::new(RefCell::new(Sink::default()));
        let b = Rc::new(RefCell::new(Sink::default()));
        let mut console = IoConsole::new();
        console.add_target(ServiceId(5), a.clone());
        console.add_target(ServiceId(5), a.clone());
        console.add_target(ServiceId(6), b.clone());

        console.write("hi");
        assert_eq!(a.borrow().0, "hi");
        assert_eq!(b.borrow().0, "hi");
        assert_eq!(console.targets(), [ServiceId(5), ServiceId(6)]);

        console.remove_target(ServiceId(5));
        console.write("!");
        assert_eq!(a.borrow().0, "hi");
        assert_eq!(b.borrow().0, "hi!");
    }

    #[test]
    fn test_busy_target_is_skipped() {
        let a = Rc::new(RefCell::new(Sink::default()));
        let mut console = IoConsole::new();
        console.add_target(ServiceId(2), a.clone());
        let held = a.borrow_mut();
        console.write("lost");
        drop(held);
        assert_eq!(a.borrow().0, "");
    }
}
