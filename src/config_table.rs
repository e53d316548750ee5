//! EFI configuration table array (spec 4.6, component C6):
//! `InstallConfigurationTable`, keyed by vendor GUID, one entry per GUID.

use alloc::vec::Vec;
use core::ffi::c_void;

use log::debug;

use crate::error::{CoreError, Result};
use crate::uefi::base::{Guid, Status};
use crate::uefi::table::system::ConfigurationTable;

/// Owns the backing storage for `SystemTable::configuration_table` /
/// `number_of_table_entries`. A GUID may appear at most once; installing
/// `core::ptr::null_mut()` for an existing GUID removes its entry (spec
/// 4.6 "InstallConfigurationTable with a null pointer removes the entry").
pub struct ConfigTableRegistry {
    entries: Vec<ConfigurationTable>,
}

impl Default for ConfigTableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTableRegistry {
    pub fn new() -> Self {
        ConfigTableRegistry { entries: Vec::new() }
    }

    pub fn install(&mut self, guid: Guid, table: *mut c_void) -> Result<()> {
        let pos = self.entries.iter().position(|e| e.vendor_guid == guid);
        match (pos, table.is_null()) {
            (Some(i), true) => {
                self.entries.remove(i);
                debug!("InstallConfigurationTable: removed {guid:?}");
            }
            (Some(_), false) => return Err(CoreError::Status(Status::ALREADY_STARTED)),
            (None, true) => return Err(CoreError::Status(Status::NOT_FOUND)),
            (None, false) => {
                self.entries.push(ConfigurationTable { vendor_guid: guid, vendor_table: table });
                debug!("InstallConfigurationTable: installed {guid:?}");
            }
        }
        Ok(())
    }

    pub fn find(&self, guid: Guid) -> Option<*mut c_void> {
        self.entries.iter().find(|e| e.vendor_guid == guid).map(|e| e.vendor_table)
    }

    /// Current entries, for building/rebuilding `SystemTable`'s
    /// `configuration_table` pointer and `number_of_table_entries`. The
    /// dispatcher owns turning this into a stable pointer (spec 4.8).
    pub fn entries(&self) -> &[ConfigurationTable] {
        &self.entries
    }
}
