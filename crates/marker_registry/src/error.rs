use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No factory registered under name '{0}'")]
    UnknownName(String),

    #[error("Invalid factory config for '{name}': {cause}")]
    InvalidConfig { name: String, cause: String },
}
