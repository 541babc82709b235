//! Media library access
//!
//! The hosting framework owns attachment metadata. This module defines the
//! narrow interface the resolver needs from it, plus the size enumeration
//! built on top of that interface.

mod manifest;

pub use manifest::*;

use crate::error::Result;
use crate::models::FULL_SIZE;
use crate::normalize::{dirname, url_path};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

/// Attachment metadata store
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// URL of the full-size file of a media item
    async fn full_url(&self, owner_id: u64, media_id: u64) -> Result<Option<String>>;

    /// Recorded derivative sizes: size label → file name, relative to the
    /// directory of the full-size file
    async fn size_variants(&self, owner_id: u64, media_id: u64)
        -> Result<BTreeMap<String, String>>;

    /// Slow search for the media item served at a URL
    async fn find_by_url(&self, owner_id: u64, url: &str) -> Result<Option<u64>>;

    /// IDs of a site's images, one 1-based page at a time
    async fn list_media(&self, owner_id: u64, page: usize, per_page: usize) -> Result<Vec<u64>>;

    /// Number of images on a site
    async fn count_media(&self, owner_id: u64) -> Result<usize>;
}

/// Every known size of a media item as size label → URL path.
///
/// The full-size path comes first; sizes sharing a path with an earlier entry
/// are dropped.
pub async fn all_sizes_for_media(
    store: &dyn AttachmentStore,
    owner_id: u64,
    media_id: u64,
) -> Result<BTreeMap<String, String>> {
    let mut sizes = BTreeMap::new();

    let Some(full_url) = store.full_url(owner_id, media_id).await? else {
        return Ok(sizes);
    };

    let full = url_path(&full_url);
    let dir = dirname(&full).trim_end_matches('/').to_string();

    let mut seen = HashSet::new();
    seen.insert(full.clone());
    sizes.insert(FULL_SIZE.to_string(), full);

    for (size, file) in store.size_variants(owner_id, media_id).await? {
        if size == FULL_SIZE {
            continue;
        }
        let path = format!("{}/{}", dir, file);
        if seen.insert(path.clone()) {
            sizes.insert(size, path);
        }
    }

    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::tests::single_site;

    #[tokio::test]
    async fn test_all_sizes_for_media() {
        let library = ManifestLibrary::from_items(
            single_site().network(),
            vec![MediaItem::new(42, 1, "2024/01/photo.jpg")
                .with_size("thumbnail", "photo-150x150.jpg")
                .with_size("medium", "photo-300x200.jpg")
                .with_size("duplicate", "photo.jpg")],
        );

        let sizes = all_sizes_for_media(&library, 1, 42).await.unwrap();
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes["full"], "/wp-content/uploads/2024/01/photo.jpg");
        assert_eq!(
            sizes["thumbnail"],
            "/wp-content/uploads/2024/01/photo-150x150.jpg"
        );
        assert!(!sizes.contains_key("duplicate"));
    }

    #[tokio::test]
    async fn test_unknown_media_has_no_sizes() {
        let library = ManifestLibrary::from_items(single_site().network(), vec![]);
        assert!(all_sizes_for_media(&library, 1, 42).await.unwrap().is_empty());
    }
}
