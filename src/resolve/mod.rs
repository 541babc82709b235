//! Resolution cascade: URL → media reference
//!
//! Steps run cheapest first and every step is awaited in order:
//! 1. cache
//! 2. hotlink check
//! 3. index lookup (heals the sibling sizes on a hit)
//! 4. dimension suffix stripped
//! 5. `-scaled` master
//! 6. date-bucket path under the site's uploads
//! 7. primary site of a network (terminal)
//! 8. attachment store scan
//!
//! Steps 1-6 recurse on rewritten candidates; 7 and 8 run once per call, on
//! the URL as given. Storage failures degrade to "not found".

use crate::cache::MediaCache;
use crate::error::Result;
use crate::index::{IndexRow, LookupIndex};
use crate::library::{all_sizes_for_media, AttachmentStore};
use crate::models::{MediaReference, Resolution, FULL_SIZE};
use crate::normalize::{
    add_scaled_suffix, extract_date_bucket, has_date_bucket, has_dimension_suffix,
    has_scaled_suffix, strip_dimension_suffix, url_path,
};
use crate::tenant::TenantContext;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bound on nested retries of one URL
const MAX_RETRY_DEPTH: usize = 8;

/// Resolves image URLs against the cache, the lookup index and the library
#[derive(Clone)]
pub struct Resolver {
    cache: MediaCache,
    index: LookupIndex,
    attachments: Arc<dyn AttachmentStore>,
}

impl Resolver {
    /// The cache is the one the index evicts on deletes
    pub fn new(index: LookupIndex, attachments: Arc<dyn AttachmentStore>) -> Self {
        Self {
            cache: index.cache().clone(),
            index,
            attachments,
        }
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    pub fn index(&self) -> &LookupIndex {
        &self.index
    }

    pub fn attachments(&self) -> &dyn AttachmentStore {
        self.attachments.as_ref()
    }

    /// Resolve a URL on behalf of a site.
    ///
    /// `Miss` is never cached, so a later call retries the whole cascade.
    pub async fn resolve(&self, url: &str, ctx: &TenantContext) -> Resolution {
        let url = url.trim();
        if url.is_empty() {
            return Resolution::Miss;
        }

        let mut visited = HashSet::new();
        let resolution = self
            .resolve_candidate(url.to_string(), ctx, 0, &mut visited)
            .await;

        match resolution {
            Resolution::Resolved(reference) => {
                // Retries resolve a rewritten URL; remember the one asked for
                self.cache
                    .put(
                        reference.media_id,
                        &reference.size_variant,
                        url,
                        reference.owner_id,
                    )
                    .await;
                Resolution::Resolved(reference)
            }
            Resolution::Hotlink => Resolution::Hotlink,
            Resolution::Miss => {
                if ctx.network().is_multisite() && !ctx.references_own_uploads(url) {
                    return self.resolve_on_primary(url, ctx).await;
                }
                self.full_scan(url, ctx).await
            }
        }
    }

    fn resolve_candidate<'a>(
        &'a self,
        url: String,
        ctx: &'a TenantContext,
        depth: usize,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Resolution> {
        async move {
            if depth > MAX_RETRY_DEPTH || !visited.insert(url.clone()) {
                return Resolution::Miss;
            }

            let cached = self.cache.get(&url).await;
            if !cached.is_miss() {
                debug!("Cache hit for {}", url);
                return cached;
            }

            if !ctx.is_local(&url) {
                debug!("Treating {} as a hotlink", url);
                self.cache.put_hotlink(&url).await;
                return Resolution::Hotlink;
            }

            if let Some(row) = self.lookup(&url).await {
                return self.heal(&url, row, ctx).await;
            }

            if has_dimension_suffix(&url) {
                let stripped = strip_dimension_suffix(&url);
                debug!("Retrying {} without dimensions", url);
                let resolution = self
                    .resolve_candidate(stripped, ctx, depth + 1, visited)
                    .await;
                if !resolution.is_miss() {
                    return resolution;
                }
            }

            if !has_scaled_suffix(&url) {
                let scaled = add_scaled_suffix(&url);
                if scaled != url {
                    debug!("Retrying {} as {}", url, scaled);
                    let resolution = self.resolve_candidate(scaled, ctx, depth + 1, visited).await;
                    if !resolution.is_miss() {
                        return resolution;
                    }
                }
            }

            if has_date_bucket(&url, ctx.network().date_bucketed_uploads()) {
                if let Some(bucket) = extract_date_bucket(&url) {
                    let candidate = format!("{}/{}", ctx.upload_path(), bucket);
                    debug!("Retrying {} as {}", url, candidate);
                    let resolution = self
                        .resolve_candidate(candidate, ctx, depth + 1, visited)
                        .await;
                    if !resolution.is_miss() {
                        return resolution;
                    }
                }
            }

            Resolution::Miss
        }
        .boxed()
    }

    async fn lookup(&self, url: &str) -> Option<IndexRow> {
        match self.index.find_by_url(url).await {
            Ok(row) => row,
            Err(e) => {
                warn!("Index lookup failed for {}: {}", url, e);
                None
            }
        }
    }

    /// Index hit: make every size of the item resolvable, then answer
    async fn heal(&self, url: &str, row: IndexRow, ctx: &TenantContext) -> Resolution {
        let reference = row.reference();

        match ctx.switch(reference.owner_id) {
            Ok(owner) => {
                if let Err(e) = self.index_media(&owner, reference.media_id).await {
                    warn!(
                        "Failed to index sizes of media {} on site {}: {}",
                        reference.media_id, reference.owner_id, e
                    );
                }
            }
            Err(e) => warn!("Cannot switch to owner of {}: {}", url, e),
        }

        self.cache
            .put(
                reference.media_id,
                &reference.size_variant,
                url,
                reference.owner_id,
            )
            .await;

        Resolution::Resolved(reference)
    }

    /// Index and cache every known size of a media item owned by `ctx`'s
    /// site. Returns the number of rows written.
    pub async fn index_media(&self, ctx: &TenantContext, media_id: u64) -> Result<usize> {
        let owner_id = ctx.site_id();
        let sizes = all_sizes_for_media(self.attachments.as_ref(), owner_id, media_id).await?;

        let mut written = 0;
        for (size, path) in &sizes {
            if self.index.insert(media_id, owner_id, size, path).await? {
                written += 1;
            }
            self.cache.put(media_id, size, path, owner_id).await;
        }

        debug!(
            "Indexed {} of {} sizes for media {} on site {}",
            written,
            sizes.len(),
            media_id,
            owner_id
        );
        Ok(written)
    }

    /// Retry against the network's shared media site. Whatever this finds is
    /// the final answer.
    async fn resolve_on_primary(&self, url: &str, ctx: &TenantContext) -> Resolution {
        let primary = match ctx.switch(ctx.primary_site_id()) {
            Ok(primary) => primary,
            Err(e) => {
                warn!("Primary media site unavailable: {}", e);
                return Resolution::Miss;
            }
        };

        let path = rewrite_site_path(&url_path(url), &ctx.site().path, &primary.site().path);
        debug!(
            "Retrying {} on site {} as {}",
            url,
            primary.site_id(),
            path
        );

        let cached = self.cache.get(&path).await;
        if let Resolution::Resolved(reference) = cached {
            return Resolution::Resolved(reference);
        }

        match self.lookup(&path).await {
            Some(row) => {
                let reference = row.reference();
                self.cache
                    .put(
                        reference.media_id,
                        &reference.size_variant,
                        url,
                        reference.owner_id,
                    )
                    .await;
                Resolution::Resolved(reference)
            }
            None => Resolution::Miss,
        }
    }

    /// Last resort: ask the attachment store. Siblings are not indexed.
    async fn full_scan(&self, url: &str, ctx: &TenantContext) -> Resolution {
        match self.attachments.find_by_url(ctx.site_id(), url).await {
            Ok(Some(media_id)) => {
                debug!("Full scan matched {} to media {}", url, media_id);
                self.cache
                    .put(media_id, FULL_SIZE, url, ctx.site_id())
                    .await;
                Resolution::Resolved(MediaReference::new(media_id, ctx.site_id(), FULL_SIZE))
            }
            Ok(None) => Resolution::Miss,
            Err(e) => {
                warn!("Attachment scan failed for {}: {}", url, e);
                Resolution::Miss
            }
        }
    }
}

/// Move a path from one site's prefix to another's (`/fr/x` → `/x`)
fn rewrite_site_path(path: &str, from: &str, to: &str) -> String {
    if from == to {
        return path.to_string();
    }
    match path.strip_prefix(from) {
        Some(rest) => format!("{}{}", to, rest),
        None => path.to_string(),
    }
}
