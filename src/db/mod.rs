use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::errors::AppError;

pub mod row_parsers;

mod audit;
mod notifications;
mod policy;
mod roles;
mod tasks;
mod users;

pub async fn init() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(pool)
}

/// SQLite implementation of every store port.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn conflict_on_unique(message: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |err| {
        let err = AppError::from(err);
        if err.is_unique_violation() {
            AppError::conflict(message)
        } else {
            err
        }
    }
}
