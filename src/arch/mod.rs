//! Architecture-specific primitives (port I/O, interrupt enable/disable,
//! serial sink). The core is built for x86_64; other architectures are out
//! of this core's scope (the platform-hooks seam in `crate::platform` is
//! where a different architecture's tick/watchdog backends would plug in).

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod x86;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use x86::*;
