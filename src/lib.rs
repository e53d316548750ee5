//! # `dxe-core`
//!
//! The boot-services execution core of a UEFI-compatible firmware runtime:
//! a single-address-space, single-processor cooperative kernel that
//! multiplexes protocol-bearing handles, events, timers, task-priority
//! scheduling, and PE/TE image loading into the `BootServices`/
//! `RuntimeServices` tables firmware drivers and OS boot loaders run
//! against.
//!
//! ## Layering
//!
//! ### 1. ABI vocabulary
//! - [`uefi`]: wire-format types and table layouts (`Handle`, `Status`,
//!   `Guid`, `SystemTable`, `BootServices`, `RuntimeServices`, protocol
//!   interface structs).
//! - [`arch`]: x86_64 port I/O, interrupt enable/disable, and the serial
//!   logging sink.
//!
//! ### 2. Core subsystems (C1-C9)
//! - [`tpl`]: task-priority-level scheduler.
//! - [`memory`]: physical page allocator, pool allocator, memory map.
//! - [`event`]: event objects, event groups, timers, monotonic time.
//! - [`protocol`]: handle/protocol database, open-reference tracking,
//!   driver binding.
//! - [`config_table`]: GUID-keyed system configuration table array.
//! - [`image`]: PE32/PE32+/TE loader, relocation, runtime-image tracking.
//! - [`fv`]: firmware-volume file/section reader.
//! - [`acpi`]: RSDP/RSDT/XSDT/FADT/FACS/DSDT table manager.
//!
//! ### 3. Sequencing (C10)
//! - [`dispatcher`]: wires C1-C9 together, builds the real `SystemTable`,
//!   runs driver dispatch and `ConnectController`, and implements
//!   `ExitBootServices`.
//! - [`platform`]: the hook seam the dispatcher calls out to (timer
//!   init, watchdog, firmware-volume/device enumeration), modeled as a
//!   trait object so the whole core is exercisable on the host.
//!
//! ### Ambient stack
//! - [`error`]: the closed `Status` wire type plus the richer `CoreError`
//!   internal error type.
//! - [`logging`]: the `log`-crate front end and its serial sink.
//! - [`config`]: crate-wide constants (page size, TPL levels, well-known
//!   GUIDs, ACPI growth increments, ...).
//!
//! ## Engineering notes
//! - **`no_std`:** this crate never links `std` in a firmware build; it
//!   depends on `core` and `alloc` only. The firmware binary that embeds
//!   it supplies the `#[global_allocator]` (or enables the
//!   `lib_allocator` feature). Under `cargo test` the crate drops
//!   `no_std` so every `#[cfg(test)]` block can use ordinary host tooling
//!   while exercising the exact `core`/`alloc` logic that ships in the
//!   firmware build.
//! - **Host-testable by construction:** every stateful singleton
//!   (`TplScheduler`, `MemoryManager`, `EventTimerCore`, `ProtocolDatabase`,
//!   `AcpiTableManager`) is parametrized over [`platform::PlatformHooks`],
//!   never reaches for a bare `extern "C"` link-time symbol.
//! - **Panic policy:** contract violations (TPL ordering, double-free,
//!   malformed flag combinations) are fatal in development builds via
//!   [`panic`]; this crate never attempts unwinding.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), feature(alloc_error_handler))]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod crc32;
pub mod error;
pub mod logging;
pub mod panic;
pub mod platform;
pub mod uefi;

pub mod tpl;

pub mod memory;

pub mod event;

pub mod protocol;

pub mod config_table;

pub mod image;

pub mod fv;

pub mod acpi;

pub mod dispatcher;

pub use crate::error::{CoreError, Result};

/// Provided when the firmware binary wants this crate to own the global
/// allocator for host-side test builds; production firmware images should
/// instead route `alloc` through [`memory::pool`] directly via the
/// dispatcher's singleton.
#[cfg(feature = "lib_allocator")]
#[global_allocator]
static ALLOCATOR: memory::pool::BootServicesAllocator = memory::pool::BootServicesAllocator::new();

/// Entry point a firmware binary's own `#[panic_handler]` should delegate
/// to.
pub fn panic_handler_impl(info: &::core::panic::PanicInfo) -> ! {
    crate::panic::panic_impl(info)
}
