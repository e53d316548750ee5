//! Handle/protocol database and driver-binding connect/disconnect
//! (spec 4.4, component C5).

pub mod binding;
pub mod database;

pub use binding::{connect_controller, disconnect_controller};
pub use database::{InterfaceRecord, OpenRef, ProtocolDatabase};
