//! Foundational ABI vocabulary shared by every table and protocol definition.
//!
//! Spec: UEFI 2.10, Section 2.3 - Data Types.

use core::{fmt, ptr::NonNull};

/// Opaque handle to a firmware object. Identity is the pointer value; the
/// real storage lives in the handle database (`crate::protocol::database`),
/// which hands out `Handle`s pointing at its own arena slots.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Handle(pub *mut core::ffi::c_void);

impl Handle {
    pub const fn null() -> Self {
        Handle(core::ptr::null_mut())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn from_ptr(ptr: *mut core::ffi::c_void) -> Option<Self> {
        NonNull::new(ptr).map(|p| Handle(p.as_ptr()))
    }

    pub fn as_ptr(&self) -> *mut core::ffi::c_void {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle({:p})", self.0)
    }
}

/// Wire-format status code. The high bit marks an error; 0 is success; any
/// other low value with the high bit clear is a warning.
///
/// This is the one canonical `Status` type for the crate — every
/// `extern "efiapi"` boot/runtime-service function returns this, and
/// `crate::error::CoreError` converts to and from it at that boundary.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Status(pub usize);

const ERROR_BIT: usize = 1 << (usize::BITS - 1);

impl Status {
    pub const SUCCESS: Status = Status(0);

    pub const WARN_UNKNOWN_GLYPH: Status = Status(1);
    pub const WARN_DELETE_FAILURE: Status = Status(2);
    pub const WARN_WRITE_FAILURE: Status = Status(3);
    pub const WARN_BUFFER_TOO_SMALL: Status = Status(4);
    pub const WARN_STALE_DATA: Status = Status(5);
    pub const WARN_FILE_SYSTEM: Status = Status(6);
    pub const WARN_RESET_REQUIRED: Status = Status(7);

    pub const LOAD_ERROR: Status = Status(1 | ERROR_BIT);
    pub const INVALID_PARAMETER: Status = Status(2 | ERROR_BIT);
    pub const UNSUPPORTED: Status = Status(3 | ERROR_BIT);
    pub const BAD_BUFFER_SIZE: Status = Status(4 | ERROR_BIT);
    pub const BUFFER_TOO_SMALL: Status = Status(5 | ERROR_BIT);
    pub const NOT_READY: Status = Status(6 | ERROR_BIT);
    pub const DEVICE_ERROR: Status = Status(7 | ERROR_BIT);
    pub const WRITE_PROTECTED: Status = Status(8 | ERROR_BIT);
    pub const OUT_OF_RESOURCES: Status = Status(9 | ERROR_BIT);
    pub const VOLUME_CORRUPTED: Status = Status(10 | ERROR_BIT);
    pub const VOLUME_FULL: Status = Status(11 | ERROR_BIT);
    pub const NO_MEDIA: Status = Status(12 | ERROR_BIT);
    pub const MEDIA_CHANGED: Status = Status(13 | ERROR_BIT);
    pub const NOT_FOUND: Status = Status(14 | ERROR_BIT);
    pub const ACCESS_DENIED: Status = Status(15 | ERROR_BIT);
    pub const NO_RESPONSE: Status = Status(16 | ERROR_BIT);
    pub const NO_MAPPING: Status = Status(17 | ERROR_BIT);
    pub const TIMEOUT: Status = Status(18 | ERROR_BIT);
    pub const NOT_STARTED: Status = Status(19 | ERROR_BIT);
    pub const ALREADY_STARTED: Status = Status(20 | ERROR_BIT);
    pub const ABORTED: Status = Status(21 | ERROR_BIT);
    pub const PROTOCOL_ERROR: Status = Status(24 | ERROR_BIT);
    pub const INCOMPATIBLE_VERSION: Status = Status(25 | ERROR_BIT);
    pub const SECURITY_VIOLATION: Status = Status(26 | ERROR_BIT);
    pub const CRC_ERROR: Status = Status(27 | ERROR_BIT);
    pub const COMPROMISED_DATA: Status = Status(33 | ERROR_BIT);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    pub fn is_error(&self) -> bool {
        (self.0 & ERROR_BIT) != 0
    }

    pub fn is_warning(&self) -> bool {
        !self.is_error() && self.0 != 0
    }

    pub fn to_result(self) -> Result<()> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    pub fn to_result_with_val<T>(self, val: T) -> Result<T> {
        if self.is_success() { Ok(val) } else { Err(self) }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Status::SUCCESS => write!(f, "SUCCESS"),
            Status::LOAD_ERROR => write!(f, "LOAD_ERROR"),
            Status::INVALID_PARAMETER => write!(f, "INVALID_PARAMETER"),
            Status::UNSUPPORTED => write!(f, "UNSUPPORTED"),
            Status::BUFFER_TOO_SMALL => write!(f, "BUFFER_TOO_SMALL"),
            Status::NOT_READY => write!(f, "NOT_READY"),
            Status::DEVICE_ERROR => write!(f, "DEVICE_ERROR"),
            Status::OUT_OF_RESOURCES => write!(f, "OUT_OF_RESOURCES"),
            Status::NOT_FOUND => write!(f, "NOT_FOUND"),
            Status::ACCESS_DENIED => write!(f, "ACCESS_DENIED"),
            Status::ALREADY_STARTED => write!(f, "ALREADY_STARTED"),
            Status::WRITE_PROTECTED => write!(f, "WRITE_PROTECTED"),
            Status::VOLUME_CORRUPTED => write!(f, "VOLUME_CORRUPTED"),
            Status::PROTOCOL_ERROR => write!(f, "PROTOCOL_ERROR"),
            Status::ABORTED => write!(f, "ABORTED"),
            Status::MEDIA_CHANGED => write!(f, "MEDIA_CHANGED"),
            Status::NO_MEDIA => write!(f, "NO_MEDIA"),
            Status::WARN_DELETE_FAILURE => write!(f, "WARN_DELETE_FAILURE"),
            Status::WARN_BUFFER_TOO_SMALL => write!(f, "WARN_BUFFER_TOO_SMALL"),
            _ => write!(f, "Status({:#x})", self.0),
        }
    }
}

/// `Result` over the wire `Status` type. Internal code should prefer
/// `crate::error::Result`, which carries richer subsystem errors; this
/// alias exists for the thin FFI boundary in `table::boot`.
pub type Result<T> = core::result::Result<T, Status>;

#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn new(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        Guid { data1: d1, data2: d2, data3: d3, data4: d4 }
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

pub type Boolean = u8;
pub const FALSE: Boolean = 0;
pub const TRUE: Boolean = 1;

pub type Char16 = u16;
pub type Char8 = u8;

/// Handle to an event object. Backed by `crate::event::EventTimerCore`.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Event(pub *mut core::ffi::c_void);

impl Event {
    pub const fn null() -> Self {
        Event(core::ptr::null_mut())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}
