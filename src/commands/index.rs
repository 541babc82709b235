//! Index command implementation

use super::Components;
use crate::error::Result;
use crate::progress::{advance_progress, finish_progress, start_progress};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Media items fetched from the library per page
pub const PER_PAGE: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Index every site of the network
    pub network: bool,
    /// Drop each site's rows before indexing
    pub reindex: bool,
    /// Site to index when not indexing the whole network
    pub site: Option<u64>,
}

/// Outcome for one site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteIndexReport {
    pub site_id: u64,
    pub media_seen: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub rows_written: usize,
    pub rows_removed: u64,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub sites: Vec<SiteIndexReport>,
}

impl IndexReport {
    pub fn rows_written(&self) -> usize {
        self.sites.iter().map(|site| site.rows_written).sum()
    }
}

/// Build the lookup index for one site or the whole network
pub async fn cmd_index(components: &Components, options: IndexOptions) -> Result<IndexReport> {
    let site_ids: Vec<u64> = if options.network {
        components.network.sites().iter().map(|site| site.id).collect()
    } else {
        vec![components.context(options.site)?.site_id()]
    };

    let mut report = IndexReport::default();
    for site_id in site_ids {
        report
            .sites
            .push(index_site(components, site_id, options.reindex).await?);
    }

    info!(
        "Indexed {} site(s), {} row(s) written",
        report.sites.len(),
        report.rows_written()
    );
    Ok(report)
}

async fn index_site(components: &Components, site_id: u64, reindex: bool) -> Result<SiteIndexReport> {
    let ctx = components.context(Some(site_id))?;
    let index = components.index();
    let store = components.resolver.attachments();

    let mut report = SiteIndexReport {
        site_id,
        ..Default::default()
    };

    if reindex {
        report.rows_removed = index.delete_by_owner(site_id).await?;
        info!("Removed {} row(s) for site {}", report.rows_removed, site_id);
    }

    let total = store.count_media(site_id).await?;
    let pb = start_progress(total, format!("site {}", site_id));

    let mut page = 1;
    loop {
        let media_ids = store.list_media(site_id, page, PER_PAGE).await?;
        if media_ids.is_empty() {
            break;
        }

        for media_id in &media_ids {
            report.media_seen += 1;
            advance_progress(&pb);

            if !reindex && !index.find_all_by_media(*media_id, site_id).await?.is_empty() {
                report.skipped += 1;
                continue;
            }

            match components.resolver.index_media(&ctx, *media_id).await {
                Ok(written) => {
                    report.indexed += 1;
                    report.rows_written += written;
                }
                Err(e) => {
                    warn!("Failed to index media {} on site {}: {}", media_id, site_id, e);
                    report.errors += 1;
                }
            }
        }

        if media_ids.len() < PER_PAGE {
            break;
        }
        page += 1;
    }

    finish_progress(pb, format!("site {} done", site_id));
    Ok(report)
}

/// Print index summary to console
pub fn print_index_report(report: &IndexReport) {
    println!("\n🗂  Lookup index\n");
    for site in &report.sites {
        println!("Site {}:", site.site_id);
        if site.rows_removed > 0 {
            println!("  Rows removed: {}", site.rows_removed);
        }
        println!("  Media seen: {}", site.media_seen);
        println!("  Indexed: {}", site.indexed);
        println!("  Already indexed: {}", site.skipped);
        println!("  Rows written: {}", site.rows_written);
        if site.errors > 0 {
            println!("  ⚠ Errors: {}", site.errors);
        }
    }
    println!("\nTotal rows written: {}", report.rows_written());
}
