//! Role table: seeding and lookups.

use ff_core::error::{AppError, Result};
use ff_core::models::{role_presets, Role, DEFAULT_ROLE};
use sqlx::SqliteConnection;

use crate::{db_err, rows};

/// Creates or refreshes the preset roles. Safe to run on every start.
pub async fn insert_roles(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("UPDATE roles SET is_default = 0 WHERE name <> ?1")
        .bind(DEFAULT_ROLE)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    for (name, permissions) in role_presets() {
        sqlx::query(
            "INSERT INTO roles (name, is_default, permissions) VALUES (?1, ?2, ?3)
             ON CONFLICT (name) DO UPDATE SET is_default = excluded.is_default,
                                             permissions = excluded.permissions",
        )
        .bind(name)
        .bind(name == DEFAULT_ROLE)
        .bind(i64::from(permissions.bits()))
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }
    tracing::info!("roles seeded");
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Role> {
    let row = sqlx::query("SELECT * FROM roles WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::not_found("Role", id))?;
    rows::role(&row)
}

pub async fn by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT * FROM roles WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(rows::role).transpose()
}

pub async fn default_role(conn: &mut SqliteConnection) -> Result<Role> {
    let row = sqlx::query("SELECT * FROM roles WHERE is_default = 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::Internal("no default role; run insert_roles".into()))?;
    rows::role(&row)
}
