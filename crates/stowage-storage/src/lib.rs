pub mod azure;
pub mod factory;
pub mod local;
pub mod provider;

pub use factory::{BackendOptions, create_backend};
pub use provider::StorageBackend;
