//! UEFI ABI vocabulary: the wire-format types and tables this firmware core
//! publishes to the drivers and applications it runs.
//!
//! Unlike a UEFI *application*, which calls into a `SystemTable` someone else
//! built, this crate is the thing that builds the `SystemTable` — so there is
//! no `init(st, image_handle)` singleton-import here. The dispatcher
//! (`crate::dispatcher`) owns construction of the real `SystemTable` and
//! wires its function-pointer tables to this crate's own implementations.
//!
//! - [`base`]: primitive ABI types (`Handle`, `Status`, `Guid`, ...).
//! - [`table`]: `SystemTable`/`BootServices`/`RuntimeServices` layouts.
//! - [`proto`]: protocol interface structs addressable by GUID.

pub mod base;
pub mod proto;
pub mod table;

pub use base::{Boolean, Char16, Event, Guid, Handle, Status};
pub use table::{boot::BootServices, runtime::RuntimeServices, system::SystemTable};
