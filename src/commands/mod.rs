//! CLI commands implementation

pub mod index;
pub mod init;
pub mod purge;
pub mod render;
pub mod resolve;
pub mod status;

pub use index::*;
pub use init::*;
pub use purge::*;
pub use render::*;
pub use resolve::*;
pub use status::*;

use crate::cache::MediaCache;
use crate::config::Config;
use crate::credit::MarkupCreditFormatter;
use crate::error::Result;
use crate::index::LookupIndex;
use crate::library::ManifestLibrary;
use crate::lifecycle::MediaLifecycle;
use crate::resolve::Resolver;
use crate::rewrite::ContentRewriter;
use crate::tenant::{Network, TenantContext};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a command needs, wired from the configuration
pub struct Components {
    pub config: Config,
    pub network: Arc<Network>,
    pub library: ManifestLibrary,
    pub resolver: Resolver,
}

impl Components {
    pub async fn open(config: Config) -> Result<Self> {
        let network = Arc::new(Network::from_config(&config.network)?);

        let library = match &config.library.manifest {
            Some(path) => ManifestLibrary::load(path, &network)?,
            None => {
                warn!("No media manifest configured; only indexed URLs will resolve");
                ManifestLibrary::from_items(&network, Vec::new())
            }
        };

        let cache = MediaCache::from_config(&config.cache);
        let index = LookupIndex::connect(&config, cache).await?;
        let resolver = Resolver::new(index, Arc::new(library.clone()));
        debug!("Opened lookup table {}", resolver.index().table());

        Ok(Self {
            config,
            network,
            library,
            resolver,
        })
    }

    /// Context for a site, defaulting to the main site
    pub fn context(&self, site_id: Option<u64>) -> Result<TenantContext> {
        self.network
            .context(site_id.unwrap_or(self.config.network.main_site_id))
    }

    pub fn index(&self) -> &LookupIndex {
        self.resolver.index()
    }

    pub fn lifecycle(&self) -> MediaLifecycle {
        MediaLifecycle::new(self.resolver.clone())
    }

    pub fn rewriter(&self) -> ContentRewriter {
        let formatter = Arc::new(MarkupCreditFormatter::new(self.library.clone()));
        ContentRewriter::new(self.resolver.clone(), formatter, &self.config.rewrite)
    }
}
