//! `<style>` block pass
//!
//! Runs over lol_html twice: once to read the style blocks, then, after the
//! URLs are resolved, once more to apply the edits. Markup outside the edited
//! elements passes through byte for byte.

use super::{has_class, normalize_encoding, ContentRewriter};
use crate::error::Result;
use crate::tenant::TenantContext;
use lol_html::html_content::{ContentType, EndTag};
use lol_html::{element, text, HandlerResult, HtmlRewriter, Settings};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn background_image_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"background-image:\s*?url\(['"]?([^'")]+)['"]?\)"#).expect("valid regex")
    })
}

/// Elements that never receive a credit block
const NON_TARGETS: &[&str] = &["style", "script", "template", "noscript"];

#[derive(Debug, Default)]
struct StyleBlock {
    ignored: bool,
    css: String,
}

/// Edits for one style block
#[derive(Debug)]
struct StyleEdit {
    css: String,
    markup: String,
}

struct Pending {
    depth: usize,
    markup: String,
}

#[derive(Default)]
struct RewriteState {
    depth: usize,
    styles_seen: usize,
    pending: Vec<Pending>,
}

impl ContentRewriter {
    /// Credit the elements styled by `<style>` blocks
    pub async fn filter_style_blocks(&self, content: &str, ctx: &TenantContext) -> String {
        if !content.contains("background-image") {
            return content.to_string();
        }

        let html = normalize_encoding(content);
        let blocks = match collect_style_blocks(html, &self.opt_out_class) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("Could not parse content for style blocks: {}", e);
                return content.to_string();
            }
        };

        let mut edits = HashMap::new();
        for (ordinal, block) in blocks.iter().enumerate() {
            if block.ignored || !block.css.contains("background-image") {
                continue;
            }
            if let Some(edit) = self.plan_style_edit(&block.css, ctx).await {
                edits.insert(ordinal, edit);
            }
        }

        if edits.is_empty() {
            return content.to_string();
        }

        debug!("Crediting {} style block(s)", edits.len());
        match apply_style_edits(html, &edits) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!("Could not rewrite style blocks: {}", e);
                content.to_string()
            }
        }
    }

    /// Resolve every `background-image` in a block. Declarations whose image
    /// has credit gain `position:relative`.
    async fn plan_style_edit(&self, css: &str, ctx: &TenantContext) -> Option<StyleEdit> {
        let declarations: Vec<(usize, String)> = background_image_url()
            .captures_iter(css)
            .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str().to_string())))
            .collect();

        let mut rewritten = String::with_capacity(css.len() + 32);
        let mut markup = String::new();
        let mut last = 0;

        for (start, url) in declarations {
            let Some(metadata) = self.credit_for(&url, ctx, true).await else {
                continue;
            };
            rewritten.push_str(&css[last..start]);
            rewritten.push_str("position:relative;");
            last = start;
            markup.push_str(&metadata);
        }

        if markup.is_empty() {
            return None;
        }

        rewritten.push_str(&css[last..]);
        Some(StyleEdit {
            css: rewritten,
            markup,
        })
    }
}

fn collect_style_blocks(html: &str, opt_out_class: &str) -> Result<Vec<StyleBlock>> {
    let blocks = Rc::new(RefCell::new(Vec::<StyleBlock>::new()));
    let on_element = Rc::clone(&blocks);
    let on_text = Rc::clone(&blocks);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("style", move |el| {
                    let class = el.get_attribute("class");
                    on_element.borrow_mut().push(StyleBlock {
                        ignored: has_class(class.as_deref(), opt_out_class),
                        css: String::new(),
                    });
                    Ok(())
                }),
                text!("style", move |chunk| {
                    if let Some(block) = on_text.borrow_mut().last_mut() {
                        block.css.push_str(chunk.as_str());
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    Ok(blocks.take())
}

fn apply_style_edits(html: &str, edits: &HashMap<usize, StyleEdit>) -> Result<String> {
    let state = Rc::new(RefCell::new(RewriteState::default()));
    let mut output = Vec::with_capacity(html.len() + 256);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                let tag = el.tag_name();
                let mut current = state.borrow_mut();
                let depth = current.depth;

                if tag == "style" {
                    let ordinal = current.styles_seen;
                    current.styles_seen += 1;
                    if let Some(edit) = edits.get(&ordinal) {
                        el.set_inner_content(&edit.css, ContentType::Html);
                        // Lands in the next element sharing the style's parent
                        current.pending.push(Pending {
                            depth,
                            markup: edit.markup.clone(),
                        });
                    }
                } else if !NON_TARGETS.contains(&tag.as_str()) {
                    let mut markup = String::new();
                    current.pending.retain(|pending| {
                        if pending.depth == depth {
                            markup.push_str(&pending.markup);
                            false
                        } else {
                            true
                        }
                    });

                    if !markup.is_empty() {
                        if el.end_tag_handlers().is_some() {
                            el.append(&markup, ContentType::Html);
                        } else {
                            el.after(&markup, ContentType::Html);
                        }
                    }
                }

                if let Some(handlers) = el.end_tag_handlers() {
                    current.depth += 1;
                    let state = Rc::clone(&state);
                    handlers.push(Box::new(move |_end: &mut EndTag| -> HandlerResult {
                        let mut current = state.borrow_mut();
                        current.depth = current.depth.saturating_sub(1);
                        let depth = current.depth;
                        current.pending.retain(|pending| pending.depth <= depth);
                        Ok(())
                    }));
                }

                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}
