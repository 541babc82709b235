//! Content rewriting: attach credit markup to images found in rendered HTML
//!
//! Three passes run in a fixed order on each render:
//! - `<img>` tags are wrapped in a container holding the credit block
//! - `<style>` blocks with a `background-image` get a credit block appended
//!   to the element they style
//! - elements with an inline `background-image` get a credit block as their
//!   first child
//!
//! Nothing here fails a render: an image that does not resolve, has no
//! credit or sits in markup that cannot be parsed is left as it was.

mod inline;
mod styles;
mod tags;

pub use tags::ParsedImage;

use crate::config::RewriteConfig;
use crate::credit::CreditFormatter;
use crate::resolve::Resolver;
use crate::tenant::TenantContext;
use std::sync::Arc;

/// Rewrites rendered content for one installation
#[derive(Clone)]
pub struct ContentRewriter {
    resolver: Resolver,
    formatter: Arc<dyn CreditFormatter>,
    opt_out_class: String,
    wrapper_class: String,
}

impl ContentRewriter {
    pub fn new(
        resolver: Resolver,
        formatter: Arc<dyn CreditFormatter>,
        config: &RewriteConfig,
    ) -> Self {
        Self {
            resolver,
            formatter,
            opt_out_class: config.opt_out_class.clone(),
            wrapper_class: config.wrapper_class.clone(),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// All passes in order
    pub async fn rewrite(&self, content: &str, ctx: &TenantContext) -> String {
        let content = self.filter_tags(content, ctx).await;
        self.filter_styles(&content, ctx).await
    }

    /// Style-block pass followed by the inline-style pass
    pub async fn filter_styles(&self, content: &str, ctx: &TenantContext) -> String {
        let content = self.filter_style_blocks(content, ctx).await;
        self.filter_inline_styles(&content, ctx).await
    }

    /// Credit markup for the image at `url`, if it resolves and has credit
    async fn credit_for(&self, url: &str, ctx: &TenantContext, include_caption: bool) -> Option<String> {
        let resolution = self.resolver.resolve(url, ctx).await;
        let reference = resolution.media()?;
        self.formatter.metadata(reference, include_caption).await
    }

    fn is_opted_out(&self, class: Option<&str>) -> bool {
        has_class(class, &self.opt_out_class)
    }
}

/// Whether a class attribute value contains a class token
pub fn has_class(class: Option<&str>, token: &str) -> bool {
    class.is_some_and(|class| class.split_whitespace().any(|c| c == token))
}

/// Drop a leading byte-order mark so every pass sees the same text
pub fn normalize_encoding(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}
