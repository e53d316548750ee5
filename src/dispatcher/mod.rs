//! Sequencing layer (spec 4.8, component C10): owns the single
//! [`CoreState`] every other subsystem gets wired into, brings it up in
//! spec order, and drives the tick path and driver dispatch.
//!
//! Generalizes the teacher's single `BootContext` singleton (one
//! `spin::Mutex`-guarded struct reached from every `extern "C"` entry
//! point) to the nine-subsystem core this crate assembles; `with_core`
//! plays the same role the teacher's own context accessor did.

mod abi;
mod tables;

use alloc::vec::Vec;

use log::info;

use crate::acpi::AcpiManager;
use crate::config_table::ConfigTableRegistry;
use crate::error::Result;
use crate::event::timer::MonotonicExtender;
use crate::event::EventTimerCore;
use crate::fv::{self, FileSectionCache};
use crate::image::loader::{self, LoadedImage};
use crate::image::runtime::RuntimeImageList;
use crate::memory::MemoryManager;
use crate::platform::PlatformHooks;
use crate::protocol::{self, ProtocolDatabase};
use crate::tpl::TplScheduler;
use crate::uefi::base::Handle;
use crate::uefi::table::boot::MemoryDescriptor;
use crate::uefi::table::system::{SystemTable, ACPI_20_TABLE_GUID};

pub use tables::build_tables;

/// FFS file type carrying a DXE/UEFI driver image (standard FFS value,
/// spec 4.6). Not defined in `crate::fv` itself since that module only
/// understands FFS layout, never file-type semantics.
const FFS_FILE_TYPE_DRIVER: u8 = 0x07;
/// Section type carrying a PE32/PE32+ image (standard FFS value).
const SECTION_TYPE_PE32: u8 = 0x10;

/// Every subsystem singleton plus the sequencing-level bookkeeping that
/// doesn't belong to any one of them (the live image list, the tick
/// extension state, the `SystemTable` pointer). Assembled once by
/// [`bring_up`] and then only ever reached through [`with_core`].
pub struct CoreState {
    pub tpl: TplScheduler,
    pub memory: MemoryManager,
    pub events: EventTimerCore,
    pub protocols: ProtocolDatabase,
    pub config_table: ConfigTableRegistry,
    pub acpi: AcpiManager,
    pub runtime_images: RuntimeImageList,
    pub loaded_images: Vec<LoadedImage>,
    pub now: u64,
    pub monotonic_extender: MonotonicExtender,
    pub timer_frequency_hz: u64,
    pub hooks: &'static dyn PlatformHooks,
    pub system_table: *mut SystemTable,
    pub boot_services_exited: bool,
    pub high_monotonic_count: u32,
}

// SAFETY: this core is single-threaded and cooperative (spec 1 "single
// address space, single processor"); `CORE` is reached only through
// `with_core`, which never overlaps one call with another. The raw
// `system_table` pointer and `&'static dyn PlatformHooks` are never
// touched off this one logical thread of execution.
unsafe impl Send for CoreState {}

static CORE: spin::Mutex<Option<CoreState>> = spin::Mutex::new(None);

/// Accessor every `extern "efiapi"` entry point and the tick path go
/// through. Panics if called before [`bring_up`] has run — every real
/// caller only gets a `SystemTable` pointer after bring-up completes, so
/// this is a contract breach, not a recoverable error.
pub fn with_core<R>(f: impl FnOnce(&mut CoreState) -> R) -> R {
    let mut guard = CORE.lock();
    let state = guard.as_mut().expect("dispatcher::with_core called before bring_up");
    f(state)
}

/// Resets the singleton so a host test harness can run [`bring_up`] more
/// than once in the same process. Exposed under `test-support` as well as
/// `cfg(test)` since external `tests/` binaries link this crate without
/// `cfg(test)` active.
#[cfg(any(test, feature = "test-support"))]
pub fn teardown_for_test() {
    *CORE.lock() = None;
}

/// Bring-up (spec 4.8): assembles every subsystem in dependency order,
/// builds the real `SystemTable`/`BootServices`/`RuntimeServices`,
/// installs the RSDP, runs driver dispatch and `ConnectController`, hands
/// off to the platform's boot-device policy, then publishes the
/// assembled state for `with_core` to reach. Returns the `SystemTable`
/// pointer a firmware entry point passes on to the next stage.
pub fn bring_up(hooks: &'static dyn PlatformHooks, initial_map: Vec<MemoryDescriptor>) -> *mut SystemTable {
    crate::logging::init();

    // Step 1: TPL scheduler.
    let tpl = TplScheduler::new();

    // Step 2: memory manager over the platform's initial map.
    let mut memory = MemoryManager::new(initial_map);

    // Step 3: timers.
    let timer_init = hooks.initialize_timers();
    let events = EventTimerCore::new();
    let monotonic_extender = MonotonicExtender::new(timer_init.counter_bits);

    // Step 4: protocol database.
    let protocols = ProtocolDatabase::new();

    // Step 5: configuration table registry + ACPI manager.
    let config_table = ConfigTableRegistry::new();
    let acpi = AcpiManager::new(&mut memory).expect("ACPI manager bring-up allocation failed");

    let mut state = CoreState {
        tpl,
        memory,
        events,
        protocols,
        config_table,
        acpi,
        runtime_images: RuntimeImageList::new(),
        loaded_images: Vec::new(),
        now: 0,
        monotonic_extender,
        timer_frequency_hz: timer_init.frequency_hz,
        hooks,
        system_table: core::ptr::null_mut(),
        boot_services_exited: false,
        high_monotonic_count: 0,
    };

    // Step 6: build the real tables, then publish the RSDP as a
    // configuration table entry so it is visible through the just-built
    // SystemTable (spec 4.7 "tables become visible to the OS when the
    // RSDP is installed as a configuration table").
    let system_table = tables::build_tables(&mut state);
    let rsdp_ptr = state.acpi.rsdp().as_ptr() as *mut core::ffi::c_void;
    state.config_table.install(ACPI_20_TABLE_GUID, rsdp_ptr).expect("installing RSDP configuration table entry");
    tables::sync_configuration_table(&mut state);

    // Step 7: FFS driver dispatch fixed point.
    dispatch_drivers(&mut state);

    // Step 8: ConnectController over every platform-enumerated root
    // device.
    connect_all(&mut state);

    // Step 9: hand off to the platform's boot-device policy.
    state.hooks.select_boot_device(system_table);

    info!("bring_up: complete, {} driver image(s) loaded", state.loaded_images.len());

    // Step 10: publish.
    *CORE.lock() = Some(state);
    system_table
}

/// Tick-path entry (spec 4.3 "Tick path"): extends the platform's raw
/// counter to a monotonic 64-bit value and services expired timers. A
/// real platform calls this from its timer interrupt handler; tests call
/// it directly after `MockPlatformHooks::advance`.
pub fn timer_tick() {
    with_core(|s| {
        let raw = s.hooks.read_counter();
        s.now = s.monotonic_extender.extend(raw);
        let CoreState { events, tpl, now, .. } = s;
        events.service_expired_timers(*now, tpl);
    });
}

/// Driver-dispatch fixed point (spec 4.8 step 7 / 4.6): opens every
/// platform-enumerated firmware volume, loads and starts every driver
/// file found, retrying files that fail a pass until a full pass makes no
/// further progress. There is no DEPEX dependency-expression evaluator in
/// this core (out of spec scope); "fixed point" here means "retry until
/// stable", which is the structurally faithful shape without actually
/// evaluating dependency expressions.
fn dispatch_drivers(state: &mut CoreState) {
    let hooks = state.hooks;
    let volumes = hooks.enumerate_firmware_volumes();

    for volume_id in volumes {
        let volume = hooks.firmware_volume_bytes(volume_id);
        let mut pending = Vec::new();
        let mut after = None;
        loop {
            match fv::next_file(volume, after) {
                Ok(Some(file)) => {
                    after = Some(file.data_end);
                    if file.file_type == FFS_FILE_TYPE_DRIVER {
                        pending.push(file);
                    }
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }

        let mut cache = FileSectionCache::new();
        loop {
            let before = pending.len();
            pending.retain(|file| try_load_and_start_driver(state, volume, *file, &mut cache).is_err());
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }
    }
}

fn try_load_and_start_driver(state: &mut CoreState, volume: &[u8], file: fv::FvFile, cache: &mut FileSectionCache) -> Result<()> {
    let section = cache.read_section(volume, file, SECTION_TYPE_PE32, 0)?;
    let bytes = &volume[section.data_start..section.data_end];

    let loaded = loader::load_image(
        bytes,
        Handle::null(),
        Handle::null(),
        core::ptr::null_mut(),
        state.system_table,
        false,
        &mut state.memory,
        &mut state.protocols,
        &mut state.events,
        &mut state.tpl,
    )?;
    state.loaded_images.push(loaded);
    let idx = state.loaded_images.len() - 1;
    let mut image = state.loaded_images.remove(idx);
    let status = loader::start_image(&mut image, state.hooks, state.system_table);
    state.loaded_images.push(image);
    status.to_result()?;
    Ok(())
}

/// `ConnectController` over every platform-enumerated root device (spec
/// 4.8 step 8), recursively so driver-created child controllers also get
/// a chance to bind.
fn connect_all(state: &mut CoreState) {
    for device in state.hooks.enumerate_devices() {
        let _ = protocol::connect_controller(&mut state.protocols, device, None, core::ptr::null_mut(), true);
    }
}
