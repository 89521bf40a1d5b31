//! Command-line and environment configuration for `journeyd`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;

/// Student journey service
#[derive(Parser, Debug, Clone)]
#[command(name = "journeyd", version, about)]
pub struct Args {
    /// SQLite database URL or file path
    #[arg(long = "db", env = "JOURNEY_DB_URL", default_value = "sqlite://journeys.sqlite3")]
    pub db_url: String,

    /// Address to listen on
    #[arg(long, env = "JOURNEY_BIND", default_value = "127.0.0.1:5740")]
    pub bind: SocketAddr,
}

impl Args {
    /// Database URL with relative file paths resolved against the working
    /// directory.
    #[must_use]
    pub fn database_url(&self) -> String {
        normalize_sqlite_url(&self.db_url)
    }
}

/// Turn `journeys.sqlite3`, `sqlite:journeys.sqlite3` or an absolute path into
/// a `sqlite://` URL. In-memory and already-absolute URLs pass through.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its parent directory exist so the first
/// connection can open it.
///
/// # Errors
///
/// Returns an error for a URL without a path or when the file cannot be
/// created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}
