//! Init command implementation

use crate::cache::MediaCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::LookupIndex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// What init created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub config_path: String,
    pub db_path: String,
    pub table: String,
}

/// Write a default configuration and create the lookup table
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    let index = LookupIndex::connect(&config, MediaCache::from_config(&config.cache)).await?;
    info!("Lookup table {} ready", index.table());

    Ok(InitReport {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        table: index.table().to_string(),
    })
}

/// Print init summary to console
pub fn print_init_report(report: &InitReport) {
    println!("✓ image-credit initialized successfully");
    println!("  Config: {}", report.config_path);
    println!("  Database: {}", report.db_path);
    println!("  Table: {}", report.table);
    println!("\nNext steps:");
    println!("  1. Describe your sites under [[network.sites]] in the config file");
    println!("  2. Point [library] manifest at your media manifest");
    println!("  3. Build the index: image-credit index --network");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_table() {
        let tmp = TempDir::new().unwrap();
        let options = InitOptions {
            base_dir: tmp.path().to_path_buf(),
            config_path: tmp.path().join("config.toml"),
            force: false,
        };

        let report = cmd_init(options.clone()).await.unwrap();
        assert_eq!(report.table, "wp_ai_media_lookup");
        assert!(tmp.path().join("config.toml").exists());
        assert!(tmp.path().join("lookup.db").exists());

        let config = Config::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config.cache.ttl_secs, 86_400);

        // Refuses to clobber without --force
        assert!(cmd_init(options.clone()).await.is_err());
        assert!(cmd_init(InitOptions { force: true, ..options }).await.is_ok());
    }
}
