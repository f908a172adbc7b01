//! Text framebuffer service.

use alloc::format;
use alloc::string::String;

use opium_bsd::EventHandler;
use opium_hal::HalRef;

use crate::property::{keys, PropertyDictionary, PropertyValue};
use crate::service::{IoService, ServiceContext, ServiceId};

/// Accumulates drawn text. `read` returns the whole log without draining it.
pub struct IoFramebuffer {
    hal: HalRef,
    id: ServiceId,
    log: String,
    /// Fired with every chunk drawn
    pub on_draw: EventHandler<str>,
}

impl IoFramebuffer {
    pub fn new(hal: HalRef) -> Self {
        Self {
            hal,
            id: ServiceId(0),
            log: String::new(),
            on_draw: EventHandler::new(),
        }
    }

    pub fn draw_text(&mut self, text: &str) {
        self.log.push_str(text);
        self.hal
            .debug_write(&format!("[framebuffer:{}] {}", self.id.0, text.trim_end_matches('\n')));
        self.on_draw.notify(text);
    }

    pub fn contents(&self) -> &str {
        &self.log
    }
}

impl IoService for IoFramebuffer {
    fn configure(
        &mut self,
        properties: &mut PropertyDictionary,
        personality: &mut PropertyDictionary,
    ) {
        properties.insert(String::from(keys::IO_CLASS), PropertyValue::from("IOFramebuffer"));
        personality.insert(
            String::from(keys::IO_PROVIDER_CLASS),
            PropertyValue::from("IOConsole"),
        );
    }

    fn registered(&mut self, id: ServiceId) {
        self.id = id;
    }

    fn start(&mut self, _ctx: &mut ServiceContext<'_>) -> bool {
        self.draw_text("Framebuffer initialized\n");
        true
    }

    fn read(&mut self) -> String {
        self.log.clone()
    }

    fn write(&mut self, data: &str) {
        self.draw_text(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;
    use opium_hal::TestHal;

    #[test]
    fn test_read_does_not_drain() {
        let mut fb = IoFramebuffer::new(TestHal::shared());
        fb.write("one\n");
        fb.write("two\n");
        assert_eq!(fb.read(), "one\ntwo\n");
        assert_eq!(fb.read(), "one\ntwo\n");
        assert_eq!(fb.contents(), "one\ntwo\n");
    }

    #[test]
    fn test_on_draw() {
        let mut fb = IoFramebuffer::new(TestHal::shared());
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        fb.on_draw.add(move |_: &str| *c.borrow_mut() += 1);
        fb.draw_text("x");
        fb.draw_text("y");
        assert_eq!(*count.borrow(), 2);
    }
}
