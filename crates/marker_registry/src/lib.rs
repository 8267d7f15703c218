pub mod builtin;
pub mod error;
pub mod registry;

pub use builtin::{adapter_registry, scorer_registry, sink_registry};
pub use error::RegistryError;
pub use registry::Registry;
