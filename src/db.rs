use anyhow::Result;
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait, QuerySelect,
    Select, SqlErr, sea_query::LockType,
};
use sea_orm_migration::MigratorTrait;

use crate::{error::AppError, migration::Migrator};

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);
    if database_url.starts_with("sqlite:") && database_url.contains(":memory:") {
        // every connection to an in-memory database is a separate database
        options.max_connections(1).min_connections(1);
    }
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// Apply every pending migration.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    Migrator::up(conn, None).await?;
    Ok(())
}

/// Add `FOR UPDATE` to a select on backends that support row locks.
///
/// SQLite serialises writers at the database level and has no row locks.
pub fn lock_for_update<E: EntityTrait>(select: Select<E>, backend: DbBackend) -> Select<E> {
    if backend == DbBackend::Sqlite {
        select
    } else {
        select.lock(LockType::Update)
    }
}

/// Map a write error, turning unique-constraint violations into `Conflict`.
pub fn map_write_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(detail = %detail, "unique constraint violated");
            AppError::Conflict("concurrent update detected, please retry".into())
        }
        _ => AppError::OrmError(err),
    }
}
