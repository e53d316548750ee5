//! PE/TE image loading (spec 4.5, component C4): header parsing,
//! relocation, `LoadImage`/`StartImage`/`Exit`/`UnloadImage`, and the
//! runtime-image list `SetVirtualAddressMap` walks.

pub mod loader;
pub mod pe;
pub mod relocation;
pub mod runtime;
pub mod te;

pub use loader::{LoadedImage, exit_image, load_image, start_image, unload_image};
pub use runtime::RuntimeImageList;
