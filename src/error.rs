//! Unified error hierarchy.
//!
//! Generalizes the teacher's `BootError` shape (one variant per subsystem,
//! `From` conversions into the umbrella type, `Display` for logging) from a
//! bootloader's five subsystems to this crate's nine. `Status` remains the
//! wire type at the `extern "efiapi"` boundary (spec §7); `CoreError` is
//! what internal code actually propagates with `?`.

use core::fmt;

use crate::uefi::base::Status;

pub type Result<T> = core::result::Result<T, CoreError>;

/// Umbrella error returned by every fallible internal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// A bare status propagated from a lower layer with no extra context.
    Status(Status),
    Memory(MemoryError),
    Event(EventError),
    Protocol(ProtocolError),
    Image(ImageError),
    Acpi(AcpiError),
    FirmwareVolume(FvError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    OutOfResources,
    InvalidAlignment,
    TypeMismatch,
    NotFound,
    StaleMapKey,
    BootServicesExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    InvalidFlagCombination,
    InvalidNotifyTpl,
    MissingNotifyFunction,
    NotReady,
    UnsupportedAtCurrentTpl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    AlreadyInstalled,
    NotFound,
    HandleHasOpenReferences,
    ExclusiveConflict,
    InvalidAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    UnsupportedMachine,
    MalformedHeader,
    SectionOutOfBounds,
    UnknownRelocationType,
    NotStarted,
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiError {
    DuplicateFadt,
    TableNotFound,
    ChecksumMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FvError {
    InvalidVolumeHeader,
    FileNotFound,
    SectionNotFound,
}

impl From<Status> for CoreError {
    fn from(s: Status) -> Self {
        CoreError::Status(s)
    }
}

impl From<MemoryError> for CoreError {
    fn from(e: MemoryError) -> Self {
        CoreError::Memory(e)
    }
}

impl From<EventError> for CoreError {
    fn from(e: EventError) -> Self {
        CoreError::Event(e)
    }
}

impl From<ProtocolError> for CoreError {
    fn from(e: ProtocolError) -> Self {
        CoreError::Protocol(e)
    }
}

impl From<ImageError> for CoreError {
    fn from(e: ImageError) -> Self {
        CoreError::Image(e)
    }
}

impl From<AcpiError> for CoreError {
    fn from(e: AcpiError) -> Self {
        CoreError::Acpi(e)
    }
}

impl From<FvError> for CoreError {
    fn from(e: FvError) -> Self {
        CoreError::FirmwareVolume(e)
    }
}

impl From<CoreError> for Status {
    /// Maps every internal error down to the closed status set of spec §7.
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Status(s) => s,
            CoreError::Memory(m) => match m {
                MemoryError::OutOfResources => Status::OUT_OF_RESOURCES,
                MemoryError::InvalidAlignment => Status::INVALID_PARAMETER,
                MemoryError::TypeMismatch => Status::INVALID_PARAMETER,
                MemoryError::NotFound => Status::NOT_FOUND,
                MemoryError::StaleMapKey => Status::INVALID_PARAMETER,
                MemoryError::BootServicesExited => Status::UNSUPPORTED,
            },
            CoreError::Event(ev) => match ev {
                EventError::InvalidFlagCombination => Status::INVALID_PARAMETER,
                EventError::InvalidNotifyTpl => Status::INVALID_PARAMETER,
                EventError::MissingNotifyFunction => Status::INVALID_PARAMETER,
                EventError::NotReady => Status::NOT_READY,
                EventError::UnsupportedAtCurrentTpl => Status::UNSUPPORTED,
            },
            CoreError::Protocol(p) => match p {
                ProtocolError::AlreadyInstalled => Status::INVALID_PARAMETER,
                ProtocolError::NotFound => Status::NOT_FOUND,
                ProtocolError::HandleHasOpenReferences => Status::ACCESS_DENIED,
                ProtocolError::ExclusiveConflict => Status::ACCESS_DENIED,
                ProtocolError::InvalidAttributes => Status::INVALID_PARAMETER,
            },
            CoreError::Image(i) => match i {
                ImageError::UnsupportedMachine => Status::UNSUPPORTED,
                ImageError::MalformedHeader => Status::LOAD_ERROR,
                ImageError::SectionOutOfBounds => Status::LOAD_ERROR,
                ImageError::UnknownRelocationType => Status::LOAD_ERROR,
                ImageError::NotStarted => Status::INVALID_PARAMETER,
                ImageError::AlreadyStarted => Status::ALREADY_STARTED,
            },
            CoreError::Acpi(a) => match a {
                AcpiError::DuplicateFadt => Status::ACCESS_DENIED,
                AcpiError::TableNotFound => Status::NOT_FOUND,
                AcpiError::ChecksumMismatch => Status::CRC_ERROR,
            },
            CoreError::FirmwareVolume(f) => match f {
                FvError::InvalidVolumeHeader => Status::VOLUME_CORRUPTED,
                FvError::FileNotFound => Status::NOT_FOUND,
                FvError::SectionNotFound => Status::NOT_FOUND,
            },
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Status(s) => write!(f, "status {s:?}"),
            CoreError::Memory(e) => write!(f, "memory error: {e:?}"),
            CoreError::Event(e) => write!(f, "event error: {e:?}"),
            CoreError::Protocol(e) => write!(f, "protocol error: {e:?}"),
            CoreError::Image(e) => write!(f, "image error: {e:?}"),
            CoreError::Acpi(e) => write!(f, "acpi error: {e:?}"),
            CoreError::FirmwareVolume(e) => write!(f, "firmware volume error: {e:?}"),
        }
    }
}
