//! Stock services the kernel boots with.
//!
//! ```text
//!   Root
//!   └── IOConsole ──writes──▶ every IOFramebuffer
//!       ├── IOFramebuffer
//!       └── IOSerial (tty0, character)
//! ```

mod console;
mod descriptor;
mod framebuffer;
mod serial;

pub use console::IoConsole;
pub use descriptor::{DescriptorService, ServiceDescriptor};
pub use framebuffer::IoFramebuffer;
pub use serial::IoSerial;
