pub mod sql;

pub use sql::error::SqlError;
pub use sql::postgres::PostgresClient;
pub use sql::traits::task::TransitionUpdate;
pub use sql::traits::{EvalSqlLogic, TaskSqlLogic};
