//! Platform hook seam (spec section 6, "Platform hooks consumed by the
//! core").
//!
//! Everything the core cannot do itself without board-specific knowledge —
//! arming the timer interrupt, the watchdog, enumerating firmware volumes
//! and devices — is modeled as a single trait object the dispatcher is
//! constructed with, rather than `extern "C"` link-time symbols. This
//! generalizes the teacher's `arch` module boundary (hardware access
//! isolated behind a narrow interface) into a pluggable, test-substitutable
//! seam: unit and integration tests supply [`mock::MockPlatformHooks`]
//! instead of linking real hardware.

use alloc::vec::Vec;

use crate::uefi::base::Handle;

/// Bring-up phase passed to `Initialize` (spec 6).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitPhase {
    Phase0,
    Phase1,
    Phase2,
}

/// Output of `InitializeTimers`: the interrupt number the tick fires on
/// plus the counter's native width and frequency, which
/// `crate::event::timer` uses to extend the hardware counter to a
/// monotonic 64-bit value (spec 4.3 "Tick path").
#[derive(Debug, Copy, Clone)]
pub struct TimerInit {
    pub interrupt_number: u8,
    pub frequency_hz: u64,
    pub counter_bits: u32,
}

/// Opaque identifier for a firmware volume discovered by
/// `EnumerateFirmwareVolumes`; `crate::fv` resolves it to the volume's
/// backing byte range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FirmwareVolumeId(pub u64);

/// The platform hooks consumed by `crate::dispatcher` (spec 6). A concrete
/// implementation supplies the hardware timer/watchdog backend and
/// device/volume discovery; the core never touches hardware directly
/// outside of `crate::arch`'s interrupt enable/disable pair.
pub trait PlatformHooks {
    /// Arms the periodic tick interrupt and returns its parameters.
    fn initialize_timers(&self) -> TimerInit;

    /// Reads the raw (narrower-than-64-bit) hardware tick counter.
    /// `crate::event::timer` extends this to a monotonic 64-bit value via
    /// a high-bit transition detector.
    fn read_counter(&self) -> u64;

    /// Disarms the periodic tick interrupt (spec 6 `TerminateTimers`),
    /// called during the `ExitBootServices` terminal handoff.
    fn terminate_timers(&self);

    /// Arms or disarms the watchdog (spec 6 `SetWatchdog`). `data` is the
    /// platform-specific reset payload the real `SetWatchdogTimer` passes
    /// through.
    fn set_watchdog(&self, timeout_s: usize, code: u64, data: Option<&[u16]>);

    /// Board bring-up phase hook (spec 6 `Initialize`).
    fn initialize(&self, phase: InitPhase);

    /// Discovers the firmware volumes the dispatcher's driver-dispatch
    /// fixed point opens with `crate::fv`.
    fn enumerate_firmware_volumes(&self) -> Vec<FirmwareVolumeId>;

    /// Resolves a discovered volume id to its backing byte range. Separate
    /// from `enumerate_firmware_volumes` because discovery and mapping are
    /// different platform concerns (flash geometry vs. bus enumeration).
    fn firmware_volume_bytes(&self, id: FirmwareVolumeId) -> &[u8];

    /// Discovers the root controller handles the dispatcher runs
    /// `ConnectController` over after driver dispatch completes.
    fn enumerate_devices(&self) -> Vec<Handle>;

    /// Busy-waits for `microseconds` (spec 4.8/5 `Stall`). Real hardware
    /// spins on a calibrated counter; delegated to the platform rather than
    /// spun in-core so host tests never block on real wall-clock time.
    fn stall_microseconds(&self, microseconds: usize);

    /// Hands control to the platform's boot-device-selection policy once
    /// driver dispatch and `ConnectController` have run (spec 4.8 step 9).
    /// Out of this core's depth beyond invoking it; a real platform loads
    /// and starts whatever boot option it selects through `system_table`.
    fn select_boot_device(&self, system_table: *mut crate::uefi::table::system::SystemTable);
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    //! A [`PlatformHooks`] implementation with no hardware dependency,
    //! used by this crate's own `#[cfg(test)]` blocks and by `tests/`.
    //! The tick counter is advanced explicitly by the test (`advance`)
    //! rather than by a real interrupt, so timer-expiry tests are
    //! deterministic instead of racing a wall clock.

    use alloc::vec::Vec;
    use core::cell::Cell;

    use super::{FirmwareVolumeId, InitPhase, PlatformHooks, TimerInit};
    use crate::uefi::base::Handle;

    pub struct MockPlatformHooks {
        counter: Cell<u64>,
        frequency_hz: u64,
        counter_bits: u32,
        watchdog_armed: Cell<Option<(usize, u64)>>,
        volumes: Vec<FirmwareVolumeId>,
        volume_bytes: Vec<Vec<u8>>,
        devices: Vec<Handle>,
    }

    impl MockPlatformHooks {
        /// `frequency_hz` ticks per second; `counter_bits` matches the
        /// narrow hardware counter spec 4.3 describes extending to 64
        /// bits.
        pub fn new(frequency_hz: u64, counter_bits: u32) -> Self {
            MockPlatformHooks {
                counter: Cell::new(0),
                frequency_hz,
                counter_bits,
                watchdog_armed: Cell::new(None),
                volumes: Vec::new(),
                volume_bytes: Vec::new(),
                devices: Vec::new(),
            }
        }

        pub fn with_devices(mut self, devices: Vec<Handle>) -> Self {
            self.devices = devices;
            self
        }

        /// Registers one volume image; `id` is assigned as the index into
        /// `volumes` so `firmware_volume_bytes` can look it back up.
        pub fn with_volume(mut self, bytes: Vec<u8>) -> Self {
            let id = FirmwareVolumeId(self.volumes.len() as u64);
            self.volumes.push(id);
            self.volume_bytes.push(bytes);
            self
        }

        /// Advances the mock hardware counter by `ticks`, simulating the
        /// passage of time without a real timer interrupt.
        pub fn advance(&self, ticks: u64) {
            let mask = if self.counter_bits >= 64 { u64::MAX } else { (1u64 << self.counter_bits) - 1 };
            self.counter.set(self.counter.get().wrapping_add(ticks) & mask);
        }

        pub fn counter(&self) -> u64 {
            self.counter.get()
        }

        pub fn watchdog_state(&self) -> Option<(usize, u64)> {
            self.watchdog_armed.get()
        }
    }

    impl PlatformHooks for MockPlatformHooks {
        fn initialize_timers(&self) -> TimerInit {
            TimerInit { interrupt_number: 0, frequency_hz: self.frequency_hz, counter_bits: self.counter_bits }
        }

        fn read_counter(&self) -> u64 {
            self.counter.get()
        }

        fn terminate_timers(&self) {}

        fn set_watchdog(&self, timeout_s: usize, code: u64, _data: Option<&[u16]>) {
            if timeout_s == 0 {
                self.watchdog_armed.set(None);
            } else {
                self.watchdog_armed.set(Some((timeout_s, code)));
            }
        }

        fn initialize(&self, _phase: InitPhase) {}

        fn enumerate_firmware_volumes(&self) -> Vec<FirmwareVolumeId> {
            self.volumes.clone()
        }

        fn firmware_volume_bytes(&self, id: FirmwareVolumeId) -> &[u8] {
            &self.volume_bytes[id.0 as usize]
        }

        fn enumerate_devices(&self) -> Vec<Handle> {
            self.devices.clone()
        }

        fn stall_microseconds(&self, _microseconds: usize) {}

        fn select_boot_device(&self, _system_table: *mut crate::uefi::table::system::SystemTable) {}
    }
}
