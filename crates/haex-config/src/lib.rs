pub mod loader;
pub mod manifest;
pub mod model;

pub use loader::ConfigLoader;
pub use manifest::{
    DisplayMode, ExtensionManifest, ManifestLoader, PackageDescriptor, PartialManifest,
    PermissionEntry, Permissions,
};
pub use model::HaexConfig;
