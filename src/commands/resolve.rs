//! Resolve command implementation

use super::Components;
use crate::error::Result;
use crate::models::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Where a URL led
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveReport {
    pub url: String,
    pub site_id: u64,
    pub resolution: Resolution,
    /// Indexed sizes of the resolved media item
    pub sizes: BTreeMap<String, String>,
}

/// Run the resolution cascade for one URL
pub async fn cmd_resolve(components: &Components, url: &str, site: Option<u64>) -> Result<ResolveReport> {
    let ctx = components.context(site)?;
    info!("Resolving {} on site {}", url, ctx.site_id());

    let resolution = components.resolver.resolve(url, &ctx).await;
    let sizes = match resolution.media() {
        Some(reference) => {
            components
                .index()
                .find_all_by_media(reference.media_id, reference.owner_id)
                .await?
        }
        None => BTreeMap::new(),
    };

    Ok(ResolveReport {
        url: url.to_string(),
        site_id: ctx.site_id(),
        resolution,
        sizes,
    })
}

/// Print resolution to console
pub fn print_resolve_report(report: &ResolveReport) {
    println!("URL: {}", report.url);
    println!("Site: {}", report.site_id);

    match &report.resolution {
        Resolution::Resolved(reference) => {
            println!("✓ Media {} on site {}", reference.media_id, reference.owner_id);
            println!("  Size: {}", reference.size_variant);
            if !report.sizes.is_empty() {
                println!("  Known sizes:");
                for (size, path) in &report.sizes {
                    println!("    {:<16} {}", size, path);
                }
            }
        }
        Resolution::Hotlink => println!("↗ External image (hotlink)"),
        Resolution::Miss => println!("✗ Not found in the media library"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::index::tests::setup_components;
    use crate::commands::{cmd_index, IndexOptions};
    use crate::models::MediaReference;

    #[tokio::test]
    async fn test_resolve_indexed_size() {
        let (components, _tmp) = setup_components().await;
        cmd_index(&components, IndexOptions::default()).await.unwrap();

        let report = cmd_resolve(
            &components,
            "https://site/wp-content/uploads/2024/01/photo-150x150.jpg",
            None,
        )
        .await
        .unwrap();

        assert_eq!(report.site_id, 1);
        assert_eq!(
            report.resolution,
            Resolution::Resolved(MediaReference::new(42, 1, "thumbnail"))
        );
        assert_eq!(report.sizes.len(), 3);
        assert_eq!(report.sizes["full"], "/wp-content/uploads/2024/01/photo.jpg");
    }

    #[tokio::test]
    async fn test_resolve_external_url() {
        let (components, _tmp) = setup_components().await;

        let report = cmd_resolve(&components, "https://cdn.example.com/a.jpg", Some(2))
            .await
            .unwrap();
        assert_eq!(report.site_id, 2);
        assert_eq!(report.resolution, Resolution::Hotlink);
        assert!(report.sizes.is_empty());
    }
}
