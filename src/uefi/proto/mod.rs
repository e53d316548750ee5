//! Protocol interface layouts addressable by GUID through the handle
//! database. Concrete device/console/filesystem protocols are external
//! collaborators per spec scope; this module only carries the protocols the
//! core itself installs or consumes directly.
//! Reference: UEFI Spec 2.10, Section 9 and Section 11.
pub mod driver_binding;
pub mod loaded_image;
