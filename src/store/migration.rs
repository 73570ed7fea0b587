//! Schema migration management.
//!
//! Migrations are validated and applied before the API starts serving
//! requests. Startup aborts when the database cannot be brought to the latest
//! schema.

use rocket_db_pools::sqlx::{self, PgPool, migrate::Migrator};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations.
///
/// Idempotent: migrations that have already been applied are skipped. The
/// CLI importer calls this too, so it works against a fresh database.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("checking database migration state");

    // `run` ensures the migrations table exists and verifies checksums before
    // applying anything pending.
    MIGRATOR.run(pool).await?;

    log::info!("database migrations up to date");
    Ok(())
}
