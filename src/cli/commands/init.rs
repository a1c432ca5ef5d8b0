//! Implementation of the `init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::sqlite::initialize_from_config;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::config::Config;
use crate::infrastructure::config::{ConfigLoader, CONFIG_DIR};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nWrote {CONFIG_DIR}/config.yaml"));
        }
        lines.push(format!("Database ready at {}", self.database_path.display()));
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let config_dir = target_path.join(CONFIG_DIR);
    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_path = config_dir.join("config.yaml");
    let config_written = if config_path.exists() && !args.force {
        false
    } else {
        let yaml = ConfigLoader::default_yaml()?;
        fs::write(&config_path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        true
    };

    let mut database = config.database.clone();
    let database_path = resolve_under(&target_path, &database.path);
    database.path = database_path.to_string_lossy().into_owned();
    let pool = initialize_from_config(&database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    tracing::info!(path = %target_path.display(), config_written, "project initialized");

    let message = if config_written {
        "Project initialized successfully."
    } else {
        "Existing configuration kept; database migrated. Use --force to rewrite config.yaml."
    };

    output(
        &InitOutput {
            success: true,
            message: message.to_string(),
            initialized_path: target_path,
            config_written,
            database_path,
        },
        json_mode,
    );
    Ok(())
}

fn resolve_under(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };

        execute(args, &Config::default(), true).await.unwrap();

        assert!(dir.path().join(".venue/config.yaml").exists());
        assert!(dir.path().join(".venue/venue.db").exists());
        let loaded = ConfigLoader::load_from_file(dir.path().join(".venue/config.yaml")).unwrap();
        assert_eq!(loaded.scheduler.cadence, "1m");
    }

    #[tokio::test]
    async fn test_init_keeps_existing_config_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".venue");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.yaml"), "scheduler:\n  cadence: 30s\n").unwrap();

        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, &Config::default(), true).await.unwrap();

        let content = std::fs::read_to_string(config_dir.join("config.yaml")).unwrap();
        assert!(content.contains("30s"));
    }

    #[test]
    fn test_resolve_under() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_under(base, ".venue/venue.db"), PathBuf::from("/srv/app/.venue/venue.db"));
        assert_eq!(resolve_under(base, "/var/db/venue.db"), PathBuf::from("/var/db/venue.db"));
    }
}
