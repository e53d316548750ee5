//! Special CPU instructions: halt, pause, interrupt enable/disable.

/// Halts the CPU until the next interrupt. Used by the idle loop.
#[inline]
pub fn hlt() {
    #[cfg(not(test))]
    unsafe {
        core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
    }
    #[cfg(test)]
    {
        core::hint::spin_loop();
    }
}

/// Hints to the CPU that this is a spin loop.
#[inline]
pub fn pause() {
    #[cfg(not(test))]
    unsafe {
        core::arch::asm!("pause", options(nomem, nostack, preserves_flags));
    }
    #[cfg(test)]
    {
        core::hint::spin_loop();
    }
}

/// Software breakpoint (`int3`).
#[inline]
pub fn debug_break() {
    #[cfg(not(test))]
    unsafe {
        core::arch::asm!("int3", options(nomem, nostack, preserves_flags));
    }
}

/// Disables maskable interrupts (`cli`) and reports whether they were
/// enabled beforehand, so callers (`crate::tpl`) can restore the prior
/// state exactly rather than unconditionally re-enabling.
///
/// Privileged on real hardware; under `cfg(test)` this instead flips a
/// thread-local flag so host unit tests exercising the TPL scheduler don't
/// fault trying to execute `cli` in ring 3.
///
/// # Safety
/// Real hardware: must run at a privilege level that permits `cli`.
#[inline]
pub unsafe fn disable_interrupts() -> bool {
    #[cfg(not(test))]
    {
        let rflags: u64;
        core::arch::asm!("pushfq; pop {}", out(reg) rflags, options(nomem, preserves_flags));
        core::arch::asm!("cli", options(nomem, nostack, preserves_flags));
        rflags & (1 << 9) != 0
    }
    #[cfg(test)]
    {
        test_interrupts::set_enabled(false)
    }
}

/// Enables maskable interrupts (`sti`). See [`disable_interrupts`] for the
/// host-test substitution.
///
/// # Safety
/// Real hardware: must run at a privilege level that permits `sti`.
#[inline]
pub unsafe fn enable_interrupts() {
    #[cfg(not(test))]
    core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
    #[cfg(test)]
    {
        test_interrupts::set_enabled(true);
    }
}

/// Restores interrupts to a previously observed enabled/disabled state.
///
/// # Safety
/// Same requirements as `enable_interrupts`/`disable_interrupts`.
#[inline]
pub unsafe fn set_interrupts_enabled(enabled: bool) {
    if enabled {
        enable_interrupts();
    } else {
        disable_interrupts();
    }
}
