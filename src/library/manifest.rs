//! Media library described by a TOML manifest
//!
//! ```toml
//! [[media]]
//! id = 42
//! site = 1
//! file = "2024/01/photo.jpg"
//! credit = "Jane Doe / Agency"
//! caption = "Marchers crossing the bridge"
//!
//! [media.sizes]
//! thumbnail = "photo-150x150.jpg"
//! ```

use super::AttachmentStore;
use crate::credit::{CreditSource, CreditText};
use crate::error::{Error, Result};
use crate::models::DEFAULT_OWNER_ID;
use crate::normalize::url_path;
use crate::tenant::Network;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

fn default_site() -> u64 {
    DEFAULT_OWNER_ID
}

/// One media item of the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: u64,

    #[serde(default = "default_site")]
    pub site: u64,

    /// Path of the full-size file relative to the site's upload base
    pub file: String,

    /// Derivative sizes: label → file name next to the full-size file
    #[serde(default)]
    pub sizes: BTreeMap<String, String>,

    #[serde(default)]
    pub credit: Option<String>,

    #[serde(default)]
    pub caption: Option<String>,
}

impl MediaItem {
    pub fn new(id: u64, site: u64, file: impl Into<String>) -> Self {
        Self {
            id,
            site,
            file: file.into(),
            sizes: BTreeMap::new(),
            credit: None,
            caption: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>, file: impl Into<String>) -> Self {
        self.sizes.insert(size.into(), file.into());
        self
    }

    pub fn with_credit(mut self, credit: impl Into<String>) -> Self {
        self.credit = Some(credit.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    media: Vec<MediaItem>,
}

/// Attachment store and credit source backed by a manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestLibrary {
    items: BTreeMap<(u64, u64), MediaItem>,
    upload_bases: HashMap<u64, String>,
}

impl ManifestLibrary {
    /// Build from items; upload base URLs come from the network's sites
    pub fn from_items(network: &Network, items: Vec<MediaItem>) -> Self {
        let upload_bases = network
            .sites()
            .iter()
            .map(|site| {
                (
                    site.id,
                    site.upload_base_url.trim_end_matches('/').to_string(),
                )
            })
            .collect();

        let mut library = Self {
            items: BTreeMap::new(),
            upload_bases,
        };
        for item in items {
            library.insert(item);
        }
        library
    }

    /// Load a manifest file
    pub fn load(path: &Path, network: &Network) -> Result<Self> {
        debug!("Loading media manifest from {:?}", path);

        if !path.exists() {
            return Err(Error::Config(format!(
                "Media manifest not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let manifest: ManifestFile = toml::from_str(&content)?;
        Ok(Self::from_items(network, manifest.media))
    }

    /// Add or replace an item
    pub fn insert(&mut self, item: MediaItem) {
        if !self.upload_bases.contains_key(&item.site) {
            warn!(
                "Media {} belongs to unknown site {}; it will not resolve",
                item.id, item.site
            );
        }
        self.items.insert((item.site, item.id), item);
    }

    pub fn get(&self, owner_id: u64, media_id: u64) -> Option<&MediaItem> {
        self.items.get(&(owner_id, media_id))
    }

    fn site_items(&self, owner_id: u64) -> impl Iterator<Item = &MediaItem> {
        self.items
            .range((owner_id, 0)..=(owner_id, u64::MAX))
            .map(|(_, item)| item)
    }

    fn item_url(&self, item: &MediaItem) -> Option<String> {
        self.upload_bases
            .get(&item.site)
            .map(|base| format!("{}/{}", base, item.file.trim_start_matches('/')))
    }
}

#[async_trait]
impl AttachmentStore for ManifestLibrary {
    async fn full_url(&self, owner_id: u64, media_id: u64) -> Result<Option<String>> {
        Ok(self
            .get(owner_id, media_id)
            .and_then(|item| self.item_url(item)))
    }

    async fn size_variants(
        &self,
        owner_id: u64,
        media_id: u64,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self
            .get(owner_id, media_id)
            .map(|item| item.sizes.clone())
            .unwrap_or_default())
    }

    async fn find_by_url(&self, owner_id: u64, url: &str) -> Result<Option<u64>> {
        let path = url_path(url);
        Ok(self
            .site_items(owner_id)
            .find(|item| {
                self.item_url(item)
                    .is_some_and(|full| url_path(&full) == path)
            })
            .map(|item| item.id))
    }

    async fn list_media(&self, owner_id: u64, page: usize, per_page: usize) -> Result<Vec<u64>> {
        let skip = page.saturating_sub(1).saturating_mul(per_page);
        Ok(self
            .site_items(owner_id)
            .skip(skip)
            .take(per_page)
            .map(|item| item.id)
            .collect())
    }

    async fn count_media(&self, owner_id: u64) -> Result<usize> {
        Ok(self.site_items(owner_id).count())
    }
}

#[async_trait]
impl CreditSource for ManifestLibrary {
    async fn credit_text(&self, owner_id: u64, media_id: u64) -> Result<Option<CreditText>> {
        Ok(self.get(owner_id, media_id).and_then(|item| {
            item.credit.as_ref().map(|credit| CreditText {
                credit: credit.clone(),
                caption: item.caption.clone(),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::tests::multisite;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.toml");
        std::fs::write(
            &path,
            r#"
[[media]]
id = 42
file = "2024/01/photo.jpg"
credit = "Jane Doe"

[media.sizes]
thumbnail = "photo-150x150.jpg"

[[media]]
id = 7
site = 2
file = "2023/11/march.png"
"#,
        )
        .unwrap();

        let ctx = multisite(1);
        let library = ManifestLibrary::load(&path, ctx.network()).unwrap();

        assert_eq!(
            library.full_url(1, 42).await.unwrap().as_deref(),
            Some("https://site/wp-content/uploads/2024/01/photo.jpg")
        );
        assert_eq!(
            library.full_url(2, 7).await.unwrap().as_deref(),
            Some("https://site/wp-content/uploads/sites/2/2023/11/march.png")
        );
        assert_eq!(library.size_variants(1, 42).await.unwrap().len(), 1);
        assert!(library.credit_text(2, 7).await.unwrap().is_none());
        assert_eq!(
            library.credit_text(1, 42).await.unwrap().unwrap().credit,
            "Jane Doe"
        );
    }

    #[tokio::test]
    async fn test_find_by_url_matches_full_size_only() {
        let ctx = multisite(1);
        let library = ManifestLibrary::from_items(
            ctx.network(),
            vec![MediaItem::new(42, 1, "2024/01/photo.jpg").with_size("thumbnail", "photo-150x150.jpg")],
        );

        assert_eq!(
            library
                .find_by_url(1, "http://other/wp-content/uploads/2024/01/photo.jpg")
                .await
                .unwrap(),
            Some(42)
        );
        assert_eq!(
            library
                .find_by_url(1, "/wp-content/uploads/2024/01/photo-150x150.jpg")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            library
                .find_by_url(2, "/wp-content/uploads/2024/01/photo.jpg")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_paging() {
        let ctx = multisite(1);
        let items = (1..=5)
            .map(|id| MediaItem::new(id, 1, format!("2024/01/{}.jpg", id)))
            .collect();
        let library = ManifestLibrary::from_items(ctx.network(), items);

        assert_eq!(library.count_media(1).await.unwrap(), 5);
        assert_eq!(library.list_media(1, 1, 2).await.unwrap(), vec![1, 2]);
        assert_eq!(library.list_media(1, 3, 2).await.unwrap(), vec![5]);
        assert!(library.list_media(1, 4, 2).await.unwrap().is_empty());
        assert_eq!(library.count_media(2).await.unwrap(), 0);
    }
}
