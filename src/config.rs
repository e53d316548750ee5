//! Crate-wide constants, grouped the way the teacher's `core::config`
//! groups bootloader constants into `mod meta`/`mod memory`/`mod limits` —
//! generalized here to firmware-core constants instead of bootloader ones.
//! There is no runtime-parsed config file at this layer: the source
//! firmware has none, and a config *parser* was correctly left out of
//! scope by the distillation.

pub mod meta {
    pub const NAME: &str = env!("CARGO_PKG_NAME");
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub mod memory {
    /// Native page size. UEFI defines this as 4 KiB regardless of the
    /// underlying architecture's paging granularity.
    pub const PAGE_SIZE: u64 = 4096;

    /// Pool allocator size classes, smallest to largest; a request is
    /// serviced by the smallest class that fits `payload + header`.
    pub const POOL_SIZE_CLASSES: [usize; 8] = [32, 64, 128, 256, 512, 1024, 2048, 4096];

    /// Above this size a pool request is serviced directly from page
    /// allocations rather than a free list (spec 4.2 "oversize blocks").
    pub const POOL_OVERSIZE_THRESHOLD: usize = *POOL_SIZE_CLASSES.last().unwrap();
}

pub mod tpl {
    /// TPL level constants (spec 3 "TPL value", 4.1). Ordered
    /// `application < callback < notify < high_level`.
    pub const APPLICATION: usize = 4;
    pub const CALLBACK: usize = 8;
    pub const NOTIFY: usize = 16;
    pub const HIGH_LEVEL: usize = 31;
}

pub mod timer {
    /// `SetTimer`'s `trigger_time` wire unit (spec 4.3 "SetTimer ...
    /// Converts a 100-ns trigger value to hardware ticks via the platform
    /// counter frequency").
    pub const HUNDRED_NS_PER_SECOND: u64 = 10_000_000;
}

pub mod watchdog {
    /// Default watchdog timeout armed by `StartImage` (spec 4.5), in seconds.
    pub const DEFAULT_TIMEOUT_SECONDS: usize = 5 * 60;
}

pub mod acpi {
    /// Fixed growth increment (in entries) for RSDT/XSDT reallocation once
    /// the current capacity is exceeded (spec 4.7).
    pub const TABLE_ARRAY_GROWTH_INCREMENT: usize = 8;

    pub const RSDP_REVISION: u8 = 2;
    pub const RSDT_REVISION: u8 = 1;
    pub const XSDT_REVISION: u8 = 1;
}

pub mod limits {
    /// Upper bound on the number of handles the protocol database will
    /// track; purely a sanity backstop, not a spec'd capacity.
    pub const MAX_HANDLES: usize = 4096;
}

pub mod guid {
    use crate::uefi::base::Guid;

    /// Signaled by `ExitBootServices` immediately before boot-services
    /// memory is reclaimed, so every event in this group fires exactly once
    /// regardless of which individual event a driver registered.
    pub const EVENT_GROUP_EXIT_BOOT_SERVICES: Guid = Guid::new(
        0x27abf055,
        0xb1b8,
        0x4c26,
        [0x80, 0x48, 0x74, 0x8f, 0x37, 0xba, 0xa2, 0xdf],
    );

    /// Signaled once by `SetVirtualAddressMap` so runtime-image drivers can
    /// fix up their own internal pointers.
    pub const EVENT_GROUP_VIRTUAL_ADDRESS_CHANGE: Guid = Guid::new(
        0x13fa7698,
        0xc831,
        0x49c7,
        [0x87, 0xea, 0x8f, 0x43, 0xfc, 0xc2, 0x51, 0x96],
    );

    /// Signaled by `WaitForEvent` between polling passes so a platform idle
    /// hook (power management) gets a chance to run.
    pub const EVENT_IDLE_LOOP: Guid = Guid::new(
        0x3c4e4b5e,
        0x08a4,
        0x4e0d,
        [0xa0, 0x52, 0x3e, 0xf1, 0x26, 0x6d, 0x5c, 0x71],
    );
}
