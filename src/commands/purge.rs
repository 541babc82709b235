//! Purge command implementation

use super::Components;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// What a site purge removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeReport {
    pub site_id: u64,
    pub rows_removed: u64,
}

/// Drop every lookup row and cache entry owned by a site
pub async fn cmd_purge_site(components: &Components, site_id: u64) -> Result<PurgeReport> {
    let rows_removed = components.lifecycle().site_deleted(site_id).await?;
    Ok(PurgeReport {
        site_id,
        rows_removed,
    })
}

pub fn print_purge_report(report: &PurgeReport) {
    println!(
        "✓ Site {} purged ({} row(s) removed)",
        report.site_id, report.rows_removed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::index::tests::setup_components;
    use crate::commands::{cmd_index, IndexOptions};

    #[tokio::test]
    async fn test_purge_site_leaves_other_sites() {
        let (components, _tmp) = setup_components().await;
        let network = IndexOptions {
            network: true,
            ..Default::default()
        };
        cmd_index(&components, network).await.unwrap();

        let report = cmd_purge_site(&components, 1).await.unwrap();
        assert_eq!(report.rows_removed, 4);
        assert_eq!(components.index().count().await.unwrap(), 1);

        // Purging a site with no rows is not an error
        let again = cmd_purge_site(&components, 1).await.unwrap();
        assert_eq!(again.rows_removed, 0);
    }
}
