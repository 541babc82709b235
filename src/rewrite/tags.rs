//! `<img>` tag pass

use super::ContentRewriter;
use crate::credit::escape_html;
use crate::models::MediaReference;
use crate::tenant::TenantContext;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use tracing::debug;

/// Attributes carried over from an `<img>` tag, besides `data-*`
const RECOGNIZED_ATTRIBUTES: &[&str] = &[
    "src",
    "id",
    "class",
    "alt",
    "srcset",
    "sizes",
    "crossorigin",
    "decoding",
    "usemap",
    "ismap",
    "width",
    "height",
    "referrerpolicy",
    "longdesc",
];

fn img_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<img\s([^>]+)>").expect("valid regex"))
}

fn identity_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s(?:id|class)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+)"#).expect("valid regex")
    })
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Attributes of one `<img>` tag and what its source resolved to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedImage {
    pub attributes: BTreeMap<String, String>,
    pub resolved: Option<MediaReference>,
}

impl ParsedImage {
    /// Parse the recognised attributes of a single `<img>` tag
    pub fn parse(tag: &str) -> Option<Self> {
        let fragment = Html::parse_fragment(tag);
        let selector = Selector::parse("img").ok()?;
        let img = fragment.select(&selector).next()?;

        let attributes = img
            .value()
            .attrs()
            .filter(|(name, _)| is_recognized(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Some(Self {
            attributes,
            resolved: None,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn src(&self) -> Option<&str> {
        self.get("src").map(str::trim).filter(|src| !src.is_empty())
    }
}

fn is_recognized(name: &str) -> bool {
    if RECOGNIZED_ATTRIBUTES.contains(&name) {
        return true;
    }
    name.strip_prefix("data-").is_some_and(|rest| {
        !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

/// Remove `id` and `class` from a tag and tidy its whitespace
fn strip_identity(tag: &str) -> String {
    let stripped = identity_attribute().replace_all(tag, "");
    whitespace().replace_all(&stripped, " ").into_owned()
}

impl ContentRewriter {
    /// Wrap every creditable `<img>` in a container with its credit block
    pub async fn filter_tags(&self, content: &str, ctx: &TenantContext) -> String {
        let tags: Vec<(usize, usize)> = img_tag()
            .find_iter(content)
            .map(|m| (m.start(), m.end()))
            .collect();

        if tags.is_empty() {
            return content.to_string();
        }

        // Identical tags share one replacement
        let mut replacements: HashMap<&str, Option<String>> = HashMap::new();
        for &(start, end) in &tags {
            let tag = &content[start..end];
            if !replacements.contains_key(tag) {
                let replacement = self.caption_tag(tag, ctx).await;
                replacements.insert(tag, replacement);
            }
        }

        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for &(start, end) in &tags {
            out.push_str(&content[last..start]);
            match replacements.get(&content[start..end]) {
                Some(Some(replacement)) => out.push_str(replacement),
                _ => out.push_str(&content[start..end]),
            }
            last = end;
        }
        out.push_str(&content[last..]);
        out
    }

    /// Replacement markup for one tag, or `None` to keep it
    async fn caption_tag(&self, tag: &str, ctx: &TenantContext) -> Option<String> {
        let mut image = ParsedImage::parse(tag)?;

        if self.is_opted_out(image.get("class")) {
            return None;
        }

        let src = image.src()?.to_string();
        let resolution = self.resolver.resolve(&src, ctx).await;
        image.resolved = resolution.media().cloned();

        let reference = image.resolved.as_ref()?;
        let metadata = self.formatter.metadata(reference, false).await?;
        debug!("Crediting <img> {} as media {}", src, reference.media_id);

        Some(self.wrap(tag, &image, &metadata))
    }

    fn wrap(&self, tag: &str, image: &ParsedImage, metadata: &str) -> String {
        let class = match image.get("class").map(str::trim) {
            Some(class) if !class.is_empty() => format!("{} {}", class, self.wrapper_class),
            _ => self.wrapper_class.clone(),
        };

        let open = match image.get("id") {
            Some(id) if !id.is_empty() => format!(
                r#"<div id="{}" class="{}">"#,
                escape_html(id),
                escape_html(&class)
            ),
            _ => format!(r#"<div class="{}">"#, escape_html(&class)),
        };

        format!("{}{}{}</div>", open, strip_identity(tag), metadata)
    }
}
