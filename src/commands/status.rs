//! Status command implementation

use super::Components;
use crate::error::Result;
use crate::library::AttachmentStore;
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Per-site status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatus {
    pub site_id: u64,
    pub path: String,
    pub home_url: String,
    pub library_media: usize,
    pub indexed_media: usize,
    pub rows: usize,
}

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub table: String,
    pub manifest: Option<String>,
    pub multisite: bool,
    pub main_site_id: u64,
    pub global_media_site_id: u64,
    pub cache_ttl_secs: u64,
    pub rows: usize,
    pub sites: Vec<SiteStatus>,
}

/// Get system status
pub async fn cmd_status(components: &Components) -> Result<StatusInfo> {
    info!("Getting status");

    let config = &components.config;
    let stats = components.index().stats().await?;

    let mut sites = Vec::with_capacity(components.network.sites().len());
    for site in components.network.sites() {
        let indexed = stats.sites.iter().find(|s| s.owner_id == site.id);
        sites.push(SiteStatus {
            site_id: site.id,
            path: site.path.clone(),
            home_url: site.home_url.clone(),
            library_media: components.library.count_media(site.id).await?,
            indexed_media: indexed.map_or(0, |s| s.media),
            rows: indexed.map_or(0, |s| s.rows),
        });
    }

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        table: components.index().table().to_string(),
        manifest: config
            .library
            .manifest
            .as_ref()
            .map(|path| path.display().to_string()),
        multisite: config.network.multisite,
        main_site_id: config.network.main_site_id,
        global_media_site_id: config.network.resolved_global_media_site_id(),
        cache_ttl_secs: config.cache.ttl_secs,
        rows: stats.rows,
        sites,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 image-credit Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Lookup table: {}", status.table);
    println!(
        "Manifest: {}",
        status.manifest.as_deref().unwrap_or("(none configured)")
    );
    println!("Cache TTL: {}s", status.cache_ttl_secs);

    println!("\nNetwork:");
    println!(
        "  Mode: {}",
        if status.multisite { "multisite" } else { "single site" }
    );
    println!("  Main site: {}", status.main_site_id);
    println!("  Global media site: {}", status.global_media_site_id);

    println!("\nSites:");
    for site in &status.sites {
        println!("• {} [{}] {}", site.site_id, site.path, site.home_url);
        println!(
            "  Library: {}, Indexed: {}, Rows: {}",
            site.library_media, site.indexed_media, site.rows
        );
        if site.indexed_media < site.library_media {
            println!("  ⚠ Not fully indexed - run 'image-credit index --site {}'", site.site_id);
        }
    }

    println!("\nTotal rows: {}", status.rows);
}

/// Print site IDs with descriptions for shell completions
pub fn print_site_completions(sites: &[SiteStatus], shell: Shell) {
    for site in sites {
        let description = format!("{} ({} rows)", site.home_url, site.rows).replace('\n', " ");

        match shell {
            Shell::Zsh => println!("{}:{}", site.site_id, description.replace(':', "\\:")),
            Shell::Fish => println!("{}\t{}", site.site_id, description.replace('\t', " ")),
            _ => println!("{}", site.site_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::index::tests::setup_components;
    use crate::commands::{cmd_index, IndexOptions};

    #[tokio::test]
    async fn test_status_counts_per_site() {
        let (components, _tmp) = setup_components().await;
        cmd_index(&components, IndexOptions::default()).await.unwrap();

        let status = cmd_status(&components).await.unwrap();
        assert!(status.multisite);
        assert_eq!(status.table, "wp_ai_media_lookup");
        assert_eq!(status.rows, 4);
        assert_eq!(status.sites.len(), 2);

        let main = &status.sites[0];
        assert_eq!(main.site_id, 1);
        assert_eq!(main.library_media, 2);
        assert_eq!(main.indexed_media, 2);
        assert_eq!(main.rows, 4);

        let fr = &status.sites[1];
        assert_eq!(fr.library_media, 1);
        assert_eq!(fr.indexed_media, 0);
    }
}
