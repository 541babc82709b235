//! image-credit - resolve media URLs and credit images in rendered HTML
//!
//! This crate provides:
//! - A resolution cascade mapping image URLs (any size, any site of a
//!   network) to media library items, backed by a cache and a lookup index
//! - Content filters that attach credit markup to `<img>` tags, style blocks
//!   and inline background images
//! - CLI commands for building and inspecting the lookup index

pub mod cache;
pub mod commands;
pub mod config;
pub mod credit;
pub mod error;
pub mod filter;
pub mod index;
pub mod library;
pub mod lifecycle;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod resolve;
pub mod rewrite;
pub mod tenant;

pub use config::Config;
pub use error::{Error, Result};
