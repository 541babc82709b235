//! Credit and caption markup
//!
//! The rewriter treats the metadata block as opaque markup; it only needs to
//! know whether one exists for a resolved image.

use crate::error::Result;
use crate::models::MediaReference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Credit text recorded for a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditText {
    pub credit: String,
    pub caption: Option<String>,
}

/// Where credit text comes from
#[async_trait]
pub trait CreditSource: Send + Sync {
    async fn credit_text(&self, owner_id: u64, media_id: u64) -> Result<Option<CreditText>>;
}

/// Renders the metadata block for a resolved image.
///
/// `None` means there is nothing to show and the element is left alone.
#[async_trait]
pub trait CreditFormatter: Send + Sync {
    async fn metadata(&self, reference: &MediaReference, include_caption: bool) -> Option<String>;
}

/// Default `image-metadata` markup over a credit source
pub struct MarkupCreditFormatter<S> {
    source: S,
}

impl<S: CreditSource> MarkupCreditFormatter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Build the metadata block markup.
///
/// The caption span is hidden; themes reveal it where they want it.
pub fn render_metadata(text: &CreditText, include_caption: bool) -> String {
    let mut html = String::from(r#"<div class="image-metadata">"#);
    if include_caption {
        html.push_str(r#"<span class="image-metadataItem image-caption" style="display:none">"#);
        html.push_str(&escape_html(text.caption.as_deref().unwrap_or_default()));
        html.push_str("</span>");
    }
    html.push_str(r#"<span class="image-metadataItem image-copyright">"#);
    html.push_str(&escape_html(&text.credit));
    html.push_str("</span></div>");
    html
}

#[async_trait]
impl<S: CreditSource> CreditFormatter for MarkupCreditFormatter<S> {
    async fn metadata(&self, reference: &MediaReference, include_caption: bool) -> Option<String> {
        let text = match self
            .source
            .credit_text(reference.owner_id, reference.media_id)
            .await
        {
            Ok(text) => text?,
            Err(e) => {
                warn!(
                    "Failed to read credit for media {} on site {}: {}",
                    reference.media_id, reference.owner_id, e
                );
                return None;
            }
        };

        if text.credit.trim().is_empty() {
            return None;
        }

        Some(render_metadata(&text, include_caption))
    }
}

/// Escape text for use in element content or a quoted attribute
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedSource(Option<CreditText>);

    #[async_trait]
    impl CreditSource for FixedSource {
        async fn credit_text(&self, _owner_id: u64, _media_id: u64) -> Result<Option<CreditText>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CreditSource for FailingSource {
        async fn credit_text(&self, owner_id: u64, media_id: u64) -> Result<Option<CreditText>> {
            Err(Error::MediaNotFound(media_id, owner_id))
        }
    }

    fn text(credit: &str) -> CreditText {
        CreditText {
            credit: credit.to_string(),
            caption: Some("Bridge at dawn".to_string()),
        }
    }

    #[tokio::test]
    async fn test_credit_only_markup() {
        let formatter = MarkupCreditFormatter::new(FixedSource(Some(text("Jane <Doe>"))));
        let html = formatter
            .metadata(&MediaReference::new(42, 1, "full"), false)
            .await
            .unwrap();
        assert_eq!(
            html,
            r#"<div class="image-metadata"><span class="image-metadataItem image-copyright">Jane &lt;Doe&gt;</span></div>"#
        );
    }

    #[tokio::test]
    async fn test_caption_is_hidden() {
        let formatter = MarkupCreditFormatter::new(FixedSource(Some(text("Jane Doe"))));
        let html = formatter
            .metadata(&MediaReference::new(42, 1, "full"), true)
            .await
            .unwrap();
        assert!(html.contains(
            r#"<span class="image-metadataItem image-caption" style="display:none">Bridge at dawn</span>"#
        ));
        assert!(html.ends_with(r#"image-copyright">Jane Doe</span></div>"#));
    }

    #[tokio::test]
    async fn test_no_credit_means_no_markup() {
        let reference = MediaReference::new(42, 1, "full");
        assert!(MarkupCreditFormatter::new(FixedSource(None))
            .metadata(&reference, false)
            .await
            .is_none());
        assert!(MarkupCreditFormatter::new(FixedSource(Some(text("  "))))
            .metadata(&reference, false)
            .await
            .is_none());
        assert!(MarkupCreditFormatter::new(FailingSource)
            .metadata(&reference, false)
            .await
            .is_none());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a&b "c" 'd'"#), "a&amp;b &quot;c&quot; &#39;d&#39;");
    }
}
