//! Configuration for ferry: the items file listing repositories to mirror,
//! and the credentials for the target registry.

pub mod credentials;
pub mod items;
pub mod repository;

pub use credentials::RegistryAuth;
pub use items::{load_items, ItemSpec, Items, TagPolicy};
pub use repository::{RegistryKind, RepositoryConfig, PLATFORM_EXCLUSIONS};
