//! Tenant (site) context
//!
//! The active site is an explicit value threaded through every lookup.
//! Moving to another site yields a new context; the caller's context is
//! never mutated, so there is nothing to restore afterwards.

use crate::config::{NetworkConfig, SiteConfig};
use crate::error::{Error, Result};
use crate::normalize::url_path;
use std::sync::Arc;

/// Static description of every site in the installation
#[derive(Debug, Clone)]
pub struct Network {
    sites: Vec<SiteConfig>,
    multisite: bool,
    main_site_id: u64,
    global_media_site_id: u64,
    date_bucketed_uploads: bool,
}

impl Network {
    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        let network = Self {
            sites: config.sites.clone(),
            multisite: config.multisite,
            main_site_id: config.main_site_id,
            global_media_site_id: config.resolved_global_media_site_id(),
            date_bucketed_uploads: config.date_bucketed_uploads,
        };

        network.site(network.main_site_id)?;
        network.site(network.global_media_site_id)?;
        Ok(network)
    }

    /// Look up a site by ID
    pub fn site(&self, id: u64) -> Result<&SiteConfig> {
        self.sites
            .iter()
            .find(|site| site.id == id)
            .ok_or(Error::SiteNotFound(id))
    }

    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    pub fn is_multisite(&self) -> bool {
        self.multisite
    }

    pub fn date_bucketed_uploads(&self) -> bool {
        self.date_bucketed_uploads
    }

    /// Context for one site of this network
    pub fn context(self: &Arc<Self>, site_id: u64) -> Result<TenantContext> {
        self.site(site_id)?;
        Ok(TenantContext {
            network: Arc::clone(self),
            site_id,
        })
    }
}

/// The site a lookup runs on behalf of
#[derive(Debug, Clone)]
pub struct TenantContext {
    network: Arc<Network>,
    site_id: u64,
}

impl TenantContext {
    pub fn site_id(&self) -> u64 {
        self.site_id
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Current site
    pub fn site(&self) -> &SiteConfig {
        // The constructor only hands out contexts for known sites
        self.network
            .sites
            .iter()
            .find(|site| site.id == self.site_id)
            .unwrap_or(&self.network.sites[0])
    }

    /// Context for another site of the same network
    pub fn switch(&self, site_id: u64) -> Result<TenantContext> {
        self.network.context(site_id)
    }

    /// Site holding the shared media library. On a single site this is the
    /// current site.
    pub fn primary_site_id(&self) -> u64 {
        if self.network.multisite {
            self.network.global_media_site_id
        } else {
            self.site_id
        }
    }

    pub fn home_url(&self) -> &str {
        &self.site().home_url
    }

    /// Path of the current site's uploads directory (`/wp-content/uploads/sites/2`)
    pub fn upload_path(&self) -> String {
        url_path(&self.site().upload_base_url)
            .trim_end_matches('/')
            .to_string()
    }

    /// Installation-wide uploads marker used to recognise hotlinks.
    ///
    /// This is the base uploads path (taken from the main site on a network)
    /// with its first segment dropped: `/wp-content/uploads` becomes `/uploads`.
    pub fn uploads_marker(&self) -> String {
        let base = if self.network.multisite {
            self.network
                .site(self.network.main_site_id)
                .map(|site| site.upload_base_url.as_str())
                .unwrap_or(self.site().upload_base_url.as_str())
        } else {
            self.site().upload_base_url.as_str()
        };

        let path = url_path(base);
        let trimmed = path.trim_matches('/');
        match trimmed.find('/') {
            Some(idx) => trimmed[idx..].to_string(),
            None => format!("/{}", trimmed),
        }
    }

    /// Whether a URL belongs to this installation (home URL or uploads tree)
    pub fn is_local(&self, url: &str) -> bool {
        let marker = self.uploads_marker();
        self.is_under_home(url) || (marker.len() > 1 && url.contains(&marker))
    }

    /// Home URL prefix match that stops at a host or path boundary, so
    /// `https://site` does not claim `https://site.evil.com`
    fn is_under_home(&self, url: &str) -> bool {
        let home = self.home_url().trim_end_matches('/');
        if home.is_empty() {
            return false;
        }
        url.strip_prefix(home)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
    }

    /// Whether a URL points into this site's own `/sites/<id>` upload tree
    pub fn references_own_uploads(&self, url: &str) -> bool {
        url.contains(&format!("/sites/{}", self.site_id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn single_site() -> TenantContext {
        let config = NetworkConfig {
            sites: vec![SiteConfig {
                id: 1,
                path: "/".to_string(),
                home_url: "https://site".to_string(),
                upload_base_url: "https://site/wp-content/uploads".to_string(),
            }],
            ..NetworkConfig::default()
        };
        Arc::new(Network::from_config(&config).unwrap())
            .context(1)
            .unwrap()
    }

    pub(crate) fn multisite(current: u64) -> TenantContext {
        let config = NetworkConfig {
            multisite: true,
            sites: vec![
                SiteConfig {
                    id: 1,
                    path: "/".to_string(),
                    home_url: "https://site".to_string(),
                    upload_base_url: "https://site/wp-content/uploads".to_string(),
                },
                SiteConfig {
                    id: 2,
                    path: "/fr/".to_string(),
                    home_url: "https://site/fr".to_string(),
                    upload_base_url: "https://site/wp-content/uploads/sites/2".to_string(),
                },
            ],
            ..NetworkConfig::default()
        };
        Arc::new(Network::from_config(&config).unwrap())
            .context(current)
            .unwrap()
    }

    #[test]
    fn test_uploads_marker() {
        let ctx = single_site();
        assert_eq!(ctx.upload_path(), "/wp-content/uploads");
        assert_eq!(ctx.uploads_marker(), "/uploads");

        let fr = multisite(2);
        assert_eq!(fr.upload_path(), "/wp-content/uploads/sites/2");
        assert_eq!(fr.uploads_marker(), "/uploads");
    }

    #[test]
    fn test_is_local() {
        let ctx = single_site();
        assert!(ctx.is_local("https://site/wp-content/uploads/2024/01/a.jpg"));
        assert!(ctx.is_local("/uploads/x.jpg"));
        assert!(ctx.is_local("https://cdn.example.net/wp-content/uploads/a.jpg"));
        assert!(!ctx.is_local("https://elsewhere.net/cat.gif"));
    }

    #[test]
    fn test_home_prefix_stops_at_boundary() {
        let ctx = single_site();
        assert!(ctx.is_local("https://site"));
        assert!(ctx.is_local("https://site/about/hero.jpg"));
        assert!(ctx.is_local("https://site?p=12"));
        assert!(!ctx.is_local("https://site.evil.com/x.jpg"));
        assert!(!ctx.is_local("https://siteother/x.jpg"));
    }

    #[test]
    fn test_switch_leaves_original_untouched() {
        let fr = multisite(2);
        let main = fr.switch(1).unwrap();
        assert_eq!(main.site_id(), 1);
        assert_eq!(fr.site_id(), 2);
        assert_eq!(fr.site().path, "/fr/");
        assert!(fr.switch(9).is_err());
    }

    #[test]
    fn test_primary_site() {
        assert_eq!(single_site().primary_site_id(), 1);
        assert_eq!(multisite(2).primary_site_id(), 1);
        assert!(multisite(2).references_own_uploads("/wp-content/uploads/sites/2/a.jpg"));
        assert!(!multisite(2).references_own_uploads("/wp-content/uploads/2024/01/a.jpg"));
    }
}
