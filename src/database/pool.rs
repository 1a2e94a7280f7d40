use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::{config::Config, error::Error};

pub type DbPool = Pool<Sqlite>;

/// Opens the pool described by `config` and brings the schema up to date.
pub async fn connect(config: &Config) -> Result<DbPool, Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| Error::Config(format!("Invalid DATABASE_URL: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    log::info!("Connected to {}", config.database_url);

    Ok(pool)
}

/// A private in-memory database on a single connection that is never recycled,
/// since closing it would drop the data.
pub async fn connect_in_memory() -> Result<DbPool, Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| Error::Config(format!("{e}")))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;

    Ok(pool)
}

pub async fn migrate(pool: &DbPool) -> Result<(), Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
