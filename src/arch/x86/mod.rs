//! x86_64 architecture primitives: port I/O, control registers, the
//! serial driver, and the interrupt enable/disable pair the TPL scheduler
//! brackets high-level critical sections with.

pub mod instructions;
pub mod io;
pub mod registers;
pub mod serial;

pub use instructions::{disable_interrupts, enable_interrupts, hlt, pause, set_interrupts_enabled};
pub use io::Port;
pub use registers::{flush_tlb, read_cr3, write_cr3};

/// Brings up architecture-specific resources needed before anything else
/// in the core can run: the serial port, so `crate::logging` has
/// somewhere to write to.
pub fn init() {
    serial::init_serial_early();
}
