//! Render command implementation

use super::Components;
use crate::error::Result;
use crate::filter::{FilterPipeline, RenderContext};
use crate::rewrite::normalize_encoding;
use std::sync::Arc;
use tracing::{debug, info};

/// Run rendered content through the credit filters
pub async fn cmd_render(
    components: &Components,
    content: &str,
    site: Option<u64>,
    render: RenderContext,
) -> Result<String> {
    let ctx = components.context(site)?;
    let pipeline = FilterPipeline::with_credit_filters(
        Arc::new(components.rewriter()),
        components.config.rewrite.clone(),
    );
    debug!("Filters: {}", pipeline.names().join(", "));

    let output = pipeline
        .run(normalize_encoding(content), &ctx, render)
        .await;

    info!(
        "Rendered {} bytes for site {} ({} bytes out)",
        content.len(),
        ctx.site_id(),
        output.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::index::tests::setup_components;
    use crate::commands::{cmd_index, IndexOptions};

    const IMG: &str = r#"<p><img src="https://site/wp-content/uploads/2024/01/photo-300x200.jpg" class="size-medium" alt=""></p>"#;

    #[tokio::test]
    async fn test_render_adds_credit() {
        let (components, _tmp) = setup_components().await;
        cmd_index(&components, IndexOptions::default()).await.unwrap();

        let output = cmd_render(&components, IMG, None, RenderContext::page())
            .await
            .unwrap();
        assert!(output.contains("image-copyright"));
        assert!(output.contains("Jane Doe"));
        assert!(output.contains("has-caption"));
    }

    #[tokio::test]
    async fn test_render_skips_admin_screens() {
        let (components, _tmp) = setup_components().await;
        cmd_index(&components, IndexOptions::default()).await.unwrap();

        let admin = RenderContext {
            admin: true,
            ..RenderContext::page()
        };
        let output = cmd_render(&components, IMG, None, admin).await.unwrap();
        assert_eq!(output, IMG);
    }

    #[tokio::test]
    async fn test_render_without_credit_is_unchanged() {
        let (components, _tmp) = setup_components().await;
        cmd_index(&components, IndexOptions::default()).await.unwrap();

        let content = r#"<img src="https://site/wp-content/uploads/2024/02/river.jpg">"#;
        let output = cmd_render(&components, content, None, RenderContext::page())
            .await
            .unwrap();
        assert_eq!(output, content);
    }
}
