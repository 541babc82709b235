//! Configuration management for image-credit
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base prefix of the lookup table (`wp_` gives `wp_ai_media_lookup`)
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Resolution cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Content rewriting configuration
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Sites of the installation
    #[serde(default)]
    pub network: NetworkConfig,

    /// Media library configuration
    #[serde(default)]
    pub library: LibraryConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cached resolution in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Most entries kept before the least recently used are evicted
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

/// Content rewriting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Class token that excludes an element from every pass
    #[serde(default = "default_opt_out_class")]
    pub opt_out_class: String,

    /// Class appended to the container wrapping a credited image
    #[serde(default = "default_wrapper_class")]
    pub wrapper_class: String,

    /// Leave content untouched when rendering for a REST request
    #[serde(default = "default_skip_rest_requests")]
    pub skip_rest_requests: bool,

    /// Leave content untouched on admin screens
    #[serde(default = "default_skip_admin")]
    pub skip_admin: bool,

    /// Leave content untouched on search result pages
    #[serde(default = "default_skip_search")]
    pub skip_search: bool,
}

/// Installation layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Whether this is a multi-tenant installation
    #[serde(default)]
    pub multisite: bool,

    /// Site that owns the base uploads directory
    #[serde(default = "default_main_site_id")]
    pub main_site_id: u64,

    /// Site holding the shared ("global") media library; defaults to the main site
    #[serde(default)]
    pub global_media_site_id: Option<u64>,

    /// Whether uploads are stored in `YYYY/MM/` folders
    #[serde(default = "default_date_bucketed_uploads")]
    pub date_bucketed_uploads: bool,

    /// Known sites
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteConfig>,
}

/// A single site (tenant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site ID (the `blog_id` column)
    pub id: u64,

    /// Site path within the network (e.g. `/` or `/fr/`)
    #[serde(default = "default_site_path")]
    pub path: String,

    /// Public home URL
    #[serde(default = "default_home_url")]
    pub home_url: String,

    /// Base URL of the site's uploads directory
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
}

/// Media library configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Manifest describing the media library, used by the CLI
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for image-credit data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

fn default_sites() -> Vec<SiteConfig> {
    vec![SiteConfig::default()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            cache: CacheConfig::default(),
            rewrite: RewriteConfig::default(),
            network: NetworkConfig::default(),
            library: LibraryConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            opt_out_class: default_opt_out_class(),
            wrapper_class: default_wrapper_class(),
            skip_rest_requests: default_skip_rest_requests(),
            skip_admin: default_skip_admin(),
            skip_search: default_skip_search(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            multisite: false,
            main_site_id: default_main_site_id(),
            global_media_site_id: None,
            date_bucketed_uploads: default_date_bucketed_uploads(),
            sites: default_sites(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            id: default_main_site_id(),
            path: default_site_path(),
            home_url: default_home_url(),
            upload_base_url: default_upload_base_url(),
        }
    }
}

impl NetworkConfig {
    /// Site holding the shared media library
    pub fn resolved_global_media_site_id(&self) -> u64 {
        self.global_media_site_id.unwrap_or(self.main_site_id)
    }
}

impl Config {
    /// Get the default base directory for image-credit (~/.image-credit)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".image-credit")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("lookup.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("lookup.db"),
            base_dir: base.clone(),
        };

        // Relative manifest paths are relative to the config file
        if let Some(manifest) = config.library.manifest.as_mut() {
            if manifest.is_relative() {
                *manifest = base.join(&*manifest);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            return Self::load(&config.paths.config_file);
        }

        debug!("No config file found, using defaults");
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Full name of the lookup table
    pub fn lookup_table(&self) -> String {
        format!("{}ai_media_lookup", self.table_prefix)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(
                "table_prefix may only contain ASCII letters, digits and underscores".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(Error::Config("cache.ttl_secs must be positive".to_string()));
        }

        if self.cache.max_entries == 0 {
            return Err(Error::Config("cache.max_entries must be positive".to_string()));
        }

        let opt_out = &self.rewrite.opt_out_class;
        if opt_out.is_empty() || opt_out.chars().any(char::is_whitespace) {
            return Err(Error::Config(
                "rewrite.opt_out_class must be a single class token".to_string(),
            ));
        }

        if self.network.sites.is_empty() {
            return Err(Error::Config(
                "network.sites must contain at least one site".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for site in &self.network.sites {
            if !seen.insert(site.id) {
                return Err(Error::Config(format!("Duplicate site id: {}", site.id)));
            }
            if site.id > u64::from(u16::MAX) {
                return Err(Error::Config(format!(
                    "Site id {} does not fit the blog_id column",
                    site.id
                )));
            }
        }

        if !seen.contains(&self.network.main_site_id) {
            return Err(Error::Config(format!(
                "network.main_site_id {} is not a configured site",
                self.network.main_site_id
            )));
        }

        let global = self.network.resolved_global_media_site_id();
        if !seen.contains(&global) {
            return Err(Error::Config(format!(
                "network.global_media_site_id {} is not a configured site",
                global
            )));
        }

        Ok(())
    }
}
