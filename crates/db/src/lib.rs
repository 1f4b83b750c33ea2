use std::time::Duration;

use db_migration::Migrator;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

pub mod entities;
pub mod models;
pub mod query;
pub mod types;

pub use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};

pub type DbPool = DatabaseConnection;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

impl DBService {
    /// Connects to `database_url` and brings the schema up to date.
    pub async fn new(database_url: &str) -> Result<DBService, DbErr> {
        let pool = Self::create_pool(database_url).await?;
        Migrator::up(&pool, None).await?;
        tracing::debug!("Database migrations applied");
        Ok(DBService { pool })
    }

    async fn create_pool(database_url: &str) -> Result<DbPool, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .connect_timeout(CONNECT_TIMEOUT)
            .acquire_timeout(CONNECT_TIMEOUT)
            .sqlx_logging(false);
        if database_url.starts_with("sqlite:") {
            // SQLite allows a single writer at a time.
            options.max_connections(1);
        }
        Database::connect(options).await
    }
}
