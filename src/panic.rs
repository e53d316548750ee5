//! Fail-stop panic handler.
//!
//! Contract violations this core treats as fatal (restore-above-current
//! TPL, a flag combination with no whitelisted interpretation, a
//! double-free) reach here via an ordinary Rust `panic!`. There is nowhere
//! for a firmware core to unwind to, so the handler logs the location and
//! message to the serial sink and halts the CPU in a `hlt` loop, matching
//! the teacher's fail-stop convention for unrecoverable boot-time errors.

use core::panic::PanicInfo;

use crate::arch;

pub fn panic_impl(info: &PanicInfo) -> ! {
    crate::println!("\n*** FATAL FIRMWARE ERROR ***");

    if let Some(location) = info.location() {
        crate::println!("at: {}:{}:{}", location.file(), location.line(), location.column());
    }

    crate::println!("reason: {}", info.message());
    crate::println!("halted.");

    loop {
        arch::hlt();
    }
}
