//! Filename conventions of resized and rescaled image derivatives.
//!
//! These pure transforms let the cascade walk from a derivative URL
//! (`photo-300x200.jpg`, `photo.jpg` served from a CDN, ...) back to the
//! file the library knows about.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn dimension_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d+x\d+(\.[a-zA-Z]{2,4})$").expect("valid regex"))
}

fn scaled_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-scaled\.[a-zA-Z]{2,4}$").expect("valid regex"))
}

fn extension() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\.[a-zA-Z]{2,4})$").expect("valid regex"))
}

fn date_bucket() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|/)(\d{4}/\d{2}/[^?#]*\.[a-z]{3,5})$").expect("valid regex")
    })
}

/// True if the filename ends in `-<width>x<height>.<ext>`
pub fn has_dimension_suffix(url: &str) -> bool {
    dimension_suffix().is_match(url)
}

/// Remove a `-<width>x<height>` suffix, keeping the extension
pub fn strip_dimension_suffix(url: &str) -> String {
    dimension_suffix().replace(url, "$1").into_owned()
}

/// Insert a `-<width>x<height>` suffix before the extension
pub fn add_dimension_suffix(url: &str, width: u32, height: u32) -> String {
    extension()
        .replace(url, format!("-{}x{}${{1}}", width, height).as_str())
        .into_owned()
}

/// True if `-scaled` sits immediately before the extension
pub fn has_scaled_suffix(url: &str) -> bool {
    scaled_suffix().is_match(url)
}

/// Insert `-scaled` before the extension
pub fn add_scaled_suffix(url: &str) -> String {
    extension().replace(url, "-scaled$1").into_owned()
}

/// True if uploads are date-bucketed and the URL has a `YYYY/MM/...` segment
pub fn has_date_bucket(url: &str, date_bucketed_uploads: bool) -> bool {
    date_bucketed_uploads && date_bucket().is_match(url)
}

/// The trailing `YYYY/MM/<file>` part of a URL
pub fn extract_date_bucket(url: &str) -> Option<String> {
    date_bucket()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Path component of a URL, independent of scheme and host.
///
/// Relative references (`/uploads/x.jpg`, `//cdn.host/x.jpg`) are accepted.
pub fn url_path(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(trimmed))
    });

    match parsed {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Parent directory of a path (`/a/b/c.jpg` → `/a/b`)
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}
