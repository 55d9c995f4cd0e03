//! Database migrations.
//!
//! SQLx embedded migrations for the local certificate store.

use sqlx::SqlitePool;

static SQLITE_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/sqlite");

pub async fn run_sqlite(pool: &SqlitePool) -> anyhow::Result<()> {
    SQLITE_MIGRATOR.run(pool).await?;
    Ok(())
}
