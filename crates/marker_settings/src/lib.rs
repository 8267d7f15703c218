pub mod database;
pub mod logging;
pub mod worker;

pub use database::DatabaseSettings;
pub use logging::init_logging;
pub use worker::{EngineSettings, WorkerSettings};
