use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use outage_access::accounts::{AccountStore, Session, UserAccount};
use outage_access::db::{ensure_offline, load_snapshot, save_snapshot, SnapshotKey};
use outage_access::staff::{import_csv, StaffDirectory};

#[derive(Parser, Debug)]
#[command(author, version, about = "outage-access admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create a system_admin account (the only way to get one); the server must be stopped
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Bulk-load staff ids from a CSV file (name,role,region,district,customId); the server
    /// must be stopped, use `POST /staff/import` while it runs
    ImportStaff { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
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
        Commands::CreateAdmin { email, name, password } => {
            let pool = get_pool().await?;
            ensure_offline(&pool, Utc::now()).await?;
            let users: Vec<UserAccount> = load_snapshot(&pool, SnapshotKey::Users).await?.unwrap_or_default();
            let sessions: Vec<Session> = load_snapshot(&pool, SnapshotKey::Sessions).await?.unwrap_or_default();
            let mut accounts = AccountStore::from_parts(users, sessions);

            let admin = accounts.create_system_admin(&email, &name, &password, Utc::now())?;
            save_snapshot(&pool, SnapshotKey::Users, &accounts.users_snapshot()).await?;
            println!("Created system_admin {} ({})", admin.email, admin.id);
        }
        Commands::ImportStaff { path } => {
            let pool = get_pool().await?;
            ensure_offline(&pool, Utc::now()).await?;
            let mut directory: StaffDirectory = load_snapshot(&pool, SnapshotKey::StaffIds).await?.unwrap_or_default();

            let file = fs::File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
            let report = import_csv(&mut directory, file, Utc::now());
            save_snapshot(&pool, SnapshotKey::StaffIds, &directory).await?;

            for record in &report.imported {
                println!("imported {:<12} {}", record.id, record.name);
            }
            for error in &report.errors {
                println!("line {:<5} skipped: {}", error.line, error.message);
            }
            println!("{} imported, {} skipped", report.imported.len(), report.skipped);
        }
    }

    Ok(())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
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
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
