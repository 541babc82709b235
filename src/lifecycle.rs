//! Media library lifecycle hooks
//!
//! Keeps the lookup index in step with the library: new items are indexed
//! in full, edits re-index, deletions cascade to rows and cache entries.

use crate::error::Result;
use crate::index::LookupIndex;
use crate::resolve::Resolver;
use crate::tenant::TenantContext;
use tracing::info;

/// Index maintenance driven by media library events
#[derive(Clone)]
pub struct MediaLifecycle {
    resolver: Resolver,
}

impl MediaLifecycle {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    fn index(&self) -> &LookupIndex {
        self.resolver.index()
    }

    /// A media item was added to the current site
    pub async fn created(&self, ctx: &TenantContext, media_id: u64) -> Result<usize> {
        self.resolver.index_media(ctx, media_id).await
    }

    /// A media item was edited; its sizes may have changed
    pub async fn updated(&self, ctx: &TenantContext, media_id: u64) -> Result<usize> {
        self.deleted(ctx, media_id).await?;
        self.created(ctx, media_id).await
    }

    /// A media item was removed from the current site
    pub async fn deleted(&self, ctx: &TenantContext, media_id: u64) -> Result<u64> {
        self.index().delete_by_media(media_id, ctx.site_id()).await
    }

    /// A whole site was removed
    pub async fn site_deleted(&self, site_id: u64) -> Result<u64> {
        let removed = self.index().delete_by_owner(site_id).await?;
        info!("Purged site {} from the lookup index", site_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MediaCache;
    use crate::index::tests::setup_test_index;
    use crate::library::{ManifestLibrary, MediaItem};
    use crate::models::{MediaReference, Resolution};
    use crate::tenant::tests::multisite;
    use std::sync::Arc;

    const FULL: &str = "https://site/wp-content/uploads/2024/01/photo.jpg";
    const THUMB: &str = "https://site/wp-content/uploads/2024/01/photo-150x150.jpg";

    fn items() -> Vec<MediaItem> {
        vec![
            MediaItem::new(42, 1, "2024/01/photo.jpg").with_size("thumbnail", "photo-150x150.jpg"),
            MediaItem::new(42, 2, "2024/01/photo.jpg"),
        ]
    }

    #[tokio::test]
    async fn test_created_indexes_every_size() {
        let ctx = multisite(1);
        let (index, _tmp) = setup_test_index(MediaCache::new(60)).await;
        let library = ManifestLibrary::from_items(ctx.network(), items());
        let lifecycle = MediaLifecycle::new(Resolver::new(index.clone(), Arc::new(library)));

        assert_eq!(lifecycle.created(&ctx, 42).await.unwrap(), 2);
        assert_eq!(
            index.find_by_url(THUMB).await.unwrap().map(|row| row.reference()),
            Some(MediaReference::new(42, 1, "thumbnail"))
        );

        // Rows are replaced, not duplicated
        assert_eq!(lifecycle.updated(&ctx, 42).await.unwrap(), 2);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_deleted_is_scoped_to_the_site() {
        let ctx = multisite(1);
        let (index, _tmp) = setup_test_index(MediaCache::new(60)).await;
        let library = ManifestLibrary::from_items(ctx.network(), items());
        let resolver = Resolver::new(index.clone(), Arc::new(library));
        let lifecycle = MediaLifecycle::new(resolver.clone());

        lifecycle.created(&ctx, 42).await.unwrap();
        lifecycle.created(&ctx.switch(2).unwrap(), 42).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
        assert!(resolver.resolve(FULL, &ctx).await.media().is_some());

        assert_eq!(lifecycle.deleted(&ctx, 42).await.unwrap(), 2);
        assert!(resolver.cache().get(FULL).await.is_miss());
        assert_eq!(index.count_by_owner(2).await.unwrap(), 1);

        assert_eq!(lifecycle.site_deleted(2).await.unwrap(), 1);
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(resolver.cache().get(FULL).await, Resolution::Miss);
    }
}
