//! Content filter pipeline
//!
//! Rendered content passes through prioritised filters, lowest priority
//! first and in registration order within a priority. Whole renders are
//! skipped for REST requests, admin screens and search results.

use crate::config::RewriteConfig;
use crate::rewrite::ContentRewriter;
use crate::tenant::TenantContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Priority the credit filters run at
pub const CREDIT_FILTER_PRIORITY: i32 = 99;

/// What kind of request a render belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContext {
    pub rest_request: bool,
    pub admin: bool,
    pub search: bool,
}

impl RenderContext {
    /// A plain front-end page view
    pub fn page() -> Self {
        Self::default()
    }

    /// Whether credit filters apply to this render
    pub fn should_filter(&self, config: &RewriteConfig) -> bool {
        !((self.rest_request && config.skip_rest_requests)
            || (self.admin && config.skip_admin)
            || (self.search && config.skip_search))
    }
}

/// One transform over rendered content
#[async_trait]
pub trait ContentFilter: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, content: String, ctx: &TenantContext) -> String;
}

/// `<img>` tag pass
pub struct TagFilter(pub Arc<ContentRewriter>);

#[async_trait]
impl ContentFilter for TagFilter {
    fn name(&self) -> &str {
        "image-credit-tags"
    }

    async fn apply(&self, content: String, ctx: &TenantContext) -> String {
        self.0.filter_tags(&content, ctx).await
    }
}

/// Style-block pass then inline-style pass
pub struct StyleFilter(pub Arc<ContentRewriter>);

#[async_trait]
impl ContentFilter for StyleFilter {
    fn name(&self) -> &str {
        "image-credit-styles"
    }

    async fn apply(&self, content: String, ctx: &TenantContext) -> String {
        self.0.filter_styles(&content, ctx).await
    }
}

struct Registered {
    priority: i32,
    filter: Arc<dyn ContentFilter>,
}

/// Ordered set of content filters
pub struct FilterPipeline {
    filters: Vec<Registered>,
    config: RewriteConfig,
}

impl FilterPipeline {
    pub fn new(config: RewriteConfig) -> Self {
        Self {
            filters: Vec::new(),
            config,
        }
    }

    /// Pipeline with the tag and style filters registered
    pub fn with_credit_filters(rewriter: Arc<ContentRewriter>, config: RewriteConfig) -> Self {
        let mut pipeline = Self::new(config);
        pipeline.add(CREDIT_FILTER_PRIORITY, Arc::new(TagFilter(Arc::clone(&rewriter))));
        pipeline.add(CREDIT_FILTER_PRIORITY, Arc::new(StyleFilter(rewriter)));
        pipeline
    }

    /// Register a filter; equal priorities keep registration order
    pub fn add(&mut self, priority: i32, filter: Arc<dyn ContentFilter>) {
        let at = self
            .filters
            .iter()
            .position(|registered| registered.priority > priority)
            .unwrap_or(self.filters.len());
        self.filters.insert(at, Registered { priority, filter });
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in run order
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|r| r.filter.name()).collect()
    }

    /// Run every filter over the content
    pub async fn run(&self, content: &str, ctx: &TenantContext, render: RenderContext) -> String {
        if !render.should_filter(&self.config) {
            debug!("Skipping content filters for {:?}", render);
            return content.to_string();
        }

        let mut content = content.to_string();
        for registered in &self.filters {
            content = registered.filter.apply(content, ctx).await;
        }
        content
    }
}
