//! Inline `style="background-image: url(...)"` pass

use super::ContentRewriter;
use crate::tenant::TenantContext;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

fn start_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([a-zA-Z][a-zA-Z0-9-]*)\s(?:[^>"']|"[^"]*"|'[^']*')*>"#)
            .expect("valid regex")
    })
}

/// Comments and raw-text elements, whose contents are not markup
fn opaque_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<!--.*?(?:-->|\z)|<script\b[^>]*>.*?(?:</script\s*>|\z)|<style\b[^>]*>.*?(?:</style\s*>|\z)")
            .expect("valid regex")
    })
}

/// Byte ranges of `content` outside comments, scripts and style blocks
fn markup_segments(content: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut last = 0;
    for span in opaque_span().find_iter(content) {
        if span.start() > last {
            segments.push((last, span.start()));
        }
        last = span.end();
    }
    if last < content.len() {
        segments.push((last, content.len()));
    }
    segments
}

fn style_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\sstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
    })
}

fn class_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\sclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
    })
}

fn background_image_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)background-image:\s*url\(\s*(?:&quot;|['"])?([^'")&]+?)(?:&quot;|['"])?\s*\)"#)
            .expect("valid regex")
    })
}

fn relative_position() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)position:\s*relative").expect("valid regex"))
}

/// Value of a quoted attribute matched by one of the attribute patterns,
/// with the byte offset where the value starts
fn attribute_value<'t>(re: &Regex, tag: &'t str) -> Option<(usize, &'t str)> {
    let caps = re.captures(tag)?;
    let value = caps.get(1).or_else(|| caps.get(2))?;
    Some((value.start(), value.as_str()))
}

/// A start tag carrying an inline background image
struct StyledTag {
    start: usize,
    end: usize,
    url: String,
}

impl ContentRewriter {
    /// Credit elements whose own `style` sets a background image
    pub async fn filter_inline_styles(&self, content: &str, ctx: &TenantContext) -> String {
        if !content.contains("background-image") {
            return content.to_string();
        }

        let tags = self.styled_tags(content);
        if tags.is_empty() {
            return content.to_string();
        }

        let mut credits: HashMap<String, Option<String>> = HashMap::new();
        for tag in &tags {
            if !credits.contains_key(&tag.url) {
                let credit = self.credit_for(&tag.url, ctx, false).await;
                credits.insert(tag.url.clone(), credit);
            }
        }

        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for tag in &tags {
            let Some(Some(metadata)) = credits.get(&tag.url) else {
                continue;
            };
            debug!("Crediting inline background {}", tag.url);
            out.push_str(&content[last..tag.start]);
            out.push_str(&with_relative_position(&content[tag.start..tag.end]));
            out.push_str(metadata);
            last = tag.end;
        }
        out.push_str(&content[last..]);
        out
    }

    fn styled_tags(&self, content: &str) -> Vec<StyledTag> {
        let mut tags = Vec::new();
        for (from, to) in markup_segments(content) {
            let segment = &content[from..to];
            for caps in start_tag().captures_iter(segment) {
                if let Some(tag) = self.styled_tag(&caps) {
                    tags.push(StyledTag {
                        start: from + tag.start,
                        end: from + tag.end,
                        url: tag.url,
                    });
                }
            }
        }
        tags
    }

    fn styled_tag(&self, caps: &regex::Captures<'_>) -> Option<StyledTag> {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        if name.eq_ignore_ascii_case("style") || name.eq_ignore_ascii_case("script") {
            return None;
        }

        let tag = whole.as_str();
        let (_, style) = attribute_value(style_attribute(), tag)?;
        let url = background_image_url().captures(style)?.get(1)?.as_str().trim();
        if url.is_empty() {
            return None;
        }

        let class = attribute_value(class_attribute(), tag).map(|(_, class)| class);
        if self.is_opted_out(class) {
            return None;
        }

        Some(StyledTag {
            start: whole.start(),
            end: whole.end(),
            url: url.to_string(),
        })
    }
}

/// Ensure the tag's style starts a positioning context
fn with_relative_position(tag: &str) -> String {
    match attribute_value(style_attribute(), tag) {
        Some((offset, style)) if !relative_position().is_match(style) => {
            format!("{}position:relative;{}", &tag[..offset], &tag[offset..])
        }
        _ => tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::tests::{photo, setup_rewriter, CREDIT};

    const FULL: &str = "https://site/wp-content/uploads/2024/01/photo.jpg";

    #[test]
    fn test_with_relative_position() {
        assert_eq!(
            with_relative_position(r#"<div style="background-image:url(/a.jpg)">"#),
            r#"<div style="position:relative;background-image:url(/a.jpg)">"#
        );
        assert_eq!(
            with_relative_position(r#"<div style='position: relative; background-image:url(/a.jpg)'>"#),
            r#"<div style='position: relative; background-image:url(/a.jpg)'>"#
        );
    }

    #[test]
    fn test_markup_segments_skip_comments_and_scripts() {
        let content = "a<!-- <b> -->c<script>x = '<div>';</script>d<style>.e{}</style>f";
        let segments: Vec<&str> = markup_segments(content)
            .into_iter()
            .map(|(from, to)| &content[from..to])
            .collect();
        assert_eq!(segments, vec!["a", "c", "d", "f"]);

        // An unterminated comment runs to the end
        assert_eq!(markup_segments("a<!-- b"), vec![(0, 1)]);
    }

    #[tokio::test]
    async fn test_scripts_and_comments_are_untouched() {
        let (rewriter, ctx, _tmp) = setup_rewriter(vec![photo()], &[(FULL, 42)]).await;

        let content = format!(
            concat!(
                r#"<script>var html = '<div style="background-image:url({})">';</script>"#,
                r#"<!-- <div style="background-image:url({})"></div> -->"#,
                r#"<div style="background-image:url({})"></div>"#,
            ),
            FULL, FULL, FULL
        );
        let out = rewriter.filter_inline_styles(&content, &ctx).await;

        assert_eq!(out.matches("image-metadata\"").count(), 1);
        assert!(out.starts_with(&content[..content.rfind("<div style").unwrap_or(0)]));
        assert!(out.ends_with(&format!("{}</div>", CREDIT)));
    }

    #[tokio::test]
    async fn test_credit_follows_start_tag() {
        let (rewriter, ctx, _tmp) =
            setup_rewriter(vec![photo()], &[("/uploads/x.jpg", 42)]).await;

        let content = r#"<p>a</p><div class="hero" style="background-image:url('/uploads/x.jpg')"><h1>Hi</h1></div>"#;
        let out = rewriter.filter_inline_styles(content, &ctx).await;

        assert_eq!(
            out,
            format!(
                r#"<p>a</p><div class="hero" style="position:relative;background-image:url('/uploads/x.jpg')">{}<h1>Hi</h1></div>"#,
                CREDIT
            )
        );
    }

    #[tokio::test]
    async fn test_background_after_other_declarations() {
        let (rewriter, ctx, _tmp) = setup_rewriter(vec![photo()], &[(FULL, 42)]).await;

        let content = format!(
            r#"<section data-x="a>b" style="color:red; background-image: url(&quot;{}&quot;)"></section>"#,
            FULL
        );
        let out = rewriter.filter_inline_styles(&content, &ctx).await;
        assert!(out.starts_with(r#"<section data-x="a>b" style="position:relative;color:red;"#));
        assert!(out.ends_with(&format!("{}</section>", CREDIT)));
    }

    #[tokio::test]
    async fn test_opt_out_and_unresolved_are_untouched() {
        let (rewriter, ctx, _tmp) = setup_rewriter(vec![photo()], &[(FULL, 42)]).await;

        let content = format!(
            concat!(
                r#"<div class="aiic-ignore" style="background-image:url({})"></div>"#,
                r#"<div style="background-image:url(https://elsewhere.net/cat.gif)"></div>"#,
                r#"<div style="background-image:url(/wp-content/uploads/2024/05/none.jpg)"></div>"#,
                "<style>.a{{background-image:url({})}}</style>",
            ),
            FULL, FULL
        );
        assert_eq!(rewriter.filter_inline_styles(&content, &ctx).await, content);
    }
}
