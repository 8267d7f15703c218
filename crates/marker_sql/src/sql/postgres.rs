use marker_settings::DatabaseSettings;
use sqlx::{postgres::PgConnectOptions, ConnectOptions, Pool, Postgres};
use tracing::log::LevelFilter;
use tracing::{debug, info, instrument};

use crate::sql::error::SqlError;
use crate::sql::traits::{EvalSqlLogic, TaskSqlLogic};

#[derive(Debug, Clone)]
pub struct PostgresClient {}

impl TaskSqlLogic for PostgresClient {}
impl EvalSqlLogic for PostgresClient {}

impl PostgresClient {
    /// Connect and run migrations.
    #[instrument(skip(settings))]
    pub async fn create_db_pool(settings: &DatabaseSettings) -> Result<Pool<Postgres>, SqlError> {
        let mut opts: PgConnectOptions = settings.connection_uri.parse()?;

        // Sqlx statement logging is noisy at debug level.
        opts = opts.log_statements(LevelFilter::Off);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(opts)
            .await?;
        info!("Connected to database");

        Self::run_migrations(&pool).await?;
        Ok(pool)
    }

    pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), SqlError> {
        info!("Running migrations");
        sqlx::migrate!("src/migrations").run(pool).await?;
        debug!("Migrations complete");
        Ok(())
    }
}
