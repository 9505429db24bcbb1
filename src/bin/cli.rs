use sqlx::Row;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agency_crm::authz::{BuiltinRole, RoleRegistry};
use agency_crm::db::SqliteStore;
use agency_crm::services::users::UserService;
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

#[derive(Parser, Debug)]
#[command(author, version, about = "agency-crm maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new reversible migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Seed an active administrator account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Falls back to ADMIN_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let (up, down) = make_migration_files(&name)?;
            println!("Created migration: {}", up.display());
            println!("Created migration: {}", down.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            let applied = applied_versions(&pool).await?;
            let Some(target) = previous_version(&migrator, &applied) else {
                anyhow::bail!("no migrations were rolled back");
            };
            migrator
                .undo(&pool, target)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::CreateAdmin { name, email, password } => {
            let password = match password {
                Some(password) => password,
                None => std::env::var("ADMIN_PASSWORD").context("pass --password or set ADMIN_PASSWORD")?,
            };
            let pool = get_pool().await?;
            get_migrator().await?.run(&pool).await?;

            let store = Arc::new(SqliteStore::new(pool));
            let registry = Arc::new(RoleRegistry::load(store.clone()).await?);
            let users = UserService::new(store, registry);
            let admin = users
                .seed_active(&name, &email, &password, BuiltinRole::Admin.as_str())
                .await
                .context("failed to create administrator")?;
            println!("Created administrator {} <{}>", admin.id, admin.email);
        }
    }

    Ok(())
}

fn make_migration_files(name: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let dir = Path::new("migrations");
    let up = dir.join(format!("{}_{}.up.sql", timestamp, sanitized));
    let down = dir.join(format!("{}_{}.down.sql", timestamp, sanitized));

    if up.exists() || down.exists() {
        anyhow::bail!("migration already exists: {}", up.display());
    }

    fs::write(&up, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", up.display()))?;
    fs::write(&down, "-- Revert the matching .up.sql here\n")
        .with_context(|| format!("failed to create migration at {}", down.display()))?;

    Ok((up, down))
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn applied_versions(pool: &SqlitePool) -> anyhow::Result<HashSet<i64>> {
    // If the migrations table doesn't exist, nothing is applied yet
    let table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    if table.is_none() {
        return Ok(HashSet::new());
    }

    let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect())
}

/// Version to undo down to so that exactly the newest applied migration is
/// reverted; 0 reverts everything.
fn previous_version(migrator: &sqlx::migrate::Migrator, applied: &HashSet<i64>) -> Option<i64> {
    let mut versions: Vec<i64> = migrator
        .iter()
        .map(|m| m.version)
        .filter(|v| applied.contains(v))
        .collect();
    versions.sort_unstable();
    versions.dedup();
    versions.pop()?;
    Some(versions.last().copied().unwrap_or(0))
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let applied = applied_versions(pool).await?;

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    let mut seen = HashSet::new();
    for migration in migrator.iter() {
        let version = migration.version;
        if !seen.insert(version) {
            continue;
        }
        let status = if applied.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if !desc.is_empty() { desc } else { "unknown" };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root). If that
    // doesn't exist (common in containers where CWD differs), fall back to
    // the crate-local migrations folder determined by CARGO_MANIFEST_DIR.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
