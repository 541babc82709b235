//! Persistent lookup index using SQLite
//!
//! One row per known size variant of a media item, keyed by a hash of the
//! URL's path so the same file resolves whatever host or scheme it is served
//! from:
//! - point lookups by path hash
//! - reverse lookups of every size of a media item
//! - cascade deletes by media item or by site

mod schema;

pub use schema::*;

use crate::cache::MediaCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::MediaReference;
use crate::normalize::url_path;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// A persisted size variant
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct IndexRow {
    pub id: i64,
    pub blog_id: i64,
    pub size: String,
    pub uri: String,
    pub hash: String,
}

impl IndexRow {
    pub fn reference(&self) -> MediaReference {
        MediaReference::new(self.id as u64, self.blog_id as u64, self.size.clone())
    }
}

/// Row counts for one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteIndexStats {
    pub owner_id: u64,
    pub rows: usize,
    pub media: usize,
}

/// Whole-index statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub rows: usize,
    pub sites: Vec<SiteIndexStats>,
}

/// Hash of a URL path, as stored in the `hash` column
pub fn path_hash(path: &str) -> String {
    format!("{:x}", md5::compute(path.as_bytes()))
}

fn db_id(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Other(format!("ID {} is out of range", value)))
}

/// Lookup index handle
#[derive(Clone)]
pub struct LookupIndex {
    pool: SqlitePool,
    table: String,
    cache: MediaCache,
}

impl LookupIndex {
    /// Connect to the index database described by the configuration
    pub async fn connect(config: &Config, cache: MediaCache) -> Result<Self> {
        Self::open(&config.paths.db_file, &config.lookup_table(), cache).await
    }

    /// Open (and create if needed) an index database at a path
    pub async fn open(db_path: &Path, table: &str, cache: MediaCache) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self {
            pool,
            table: table.to_string(),
            cache,
        };

        if !index.is_initialized().await? {
            index.init_schema().await?;
        }

        Ok(index)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing lookup table {}", self.table);
        sqlx::query(&schema_sql(&self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Check if the lookup table exists
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(&self.table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Cache evicted alongside index deletes
    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    /// Point lookup by the hash of the URL's path.
    ///
    /// A row whose stored path differs from the computed one is a hash
    /// collision and is reported as absent.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<IndexRow>> {
        let path = url_path(url);
        let sql = format!(
            "SELECT id, blog_id, size, uri, hash FROM {} WHERE hash = ? LIMIT 1",
            self.table
        );

        let row = sqlx::query_as::<_, IndexRow>(&sql)
            .bind(path_hash(&path))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.filter(|row| row.uri == path))
    }

    /// Every known size of a media item, as size → path
    pub async fn find_all_by_media(
        &self,
        media_id: u64,
        owner_id: u64,
    ) -> Result<BTreeMap<String, String>> {
        let sql = format!(
            "SELECT size, uri FROM {} WHERE id = ? AND blog_id = ?",
            self.table
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(db_id(media_id)?)
            .bind(db_id(owner_id)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// Record one size variant. Returns `false` when the URL already resolves.
    pub async fn insert(
        &self,
        media_id: u64,
        owner_id: u64,
        size_variant: &str,
        url: &str,
    ) -> Result<bool> {
        if self.find_by_url(url).await?.is_some() {
            return Ok(false);
        }

        let path = url_path(url);
        let sql = format!(
            "INSERT OR IGNORE INTO {} (id, blog_id, size, uri, hash) VALUES (?, ?, ?, ?, ?)",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(db_id(media_id)?)
            .bind(db_id(owner_id)?)
            .bind(size_variant)
            .bind(&path)
            .bind(path_hash(&path))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every size of a media item, evicting its cache entries first
    pub async fn delete_by_media(&self, media_id: u64, owner_id: u64) -> Result<u64> {
        let paths = self.find_all_by_media(media_id, owner_id).await?;
        for path in paths.values() {
            self.cache.invalidate(path).await;
        }
        self.cache.invalidate_media(media_id, owner_id).await;

        let sql = format!("DELETE FROM {} WHERE id = ? AND blog_id = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(db_id(media_id)?)
            .bind(db_id(owner_id)?)
            .execute(&self.pool)
            .await?;

        debug!(
            "Deleted {} rows for media {} on site {}",
            result.rows_affected(),
            media_id,
            owner_id
        );
        Ok(result.rows_affected())
    }

    /// Remove every row owned by a site
    pub async fn delete_by_owner(&self, owner_id: u64) -> Result<u64> {
        self.cache.invalidate_owner(owner_id).await;

        let sql = format!("DELETE FROM {} WHERE blog_id = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(db_id(owner_id)?)
            .execute(&self.pool)
            .await?;

        info!(
            "Deleted {} lookup rows for site {}",
            result.rows_affected(),
            owner_id
        );
        Ok(result.rows_affected())
    }

    /// Total number of rows
    pub async fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as usize)
    }

    /// Number of rows owned by a site
    pub async fn count_by_owner(&self, owner_id: u64) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE blog_id = ?", self.table);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(db_id(owner_id)?)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Row and media counts per site
    pub async fn stats(&self) -> Result<IndexStats> {
        let sql = format!(
            "SELECT blog_id, COUNT(*), COUNT(DISTINCT id) FROM {} GROUP BY blog_id ORDER BY blog_id",
            self.table
        );
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let sites: Vec<SiteIndexStats> = rows
            .into_iter()
            .map(|(owner_id, rows, media)| SiteIndexStats {
                owner_id: owner_id as u64,
                rows: rows as usize,
                media: media as usize,
            })
            .collect();

        Ok(IndexStats {
            rows: sites.iter().map(|s| s.rows).sum(),
            sites,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Resolution;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_index(cache: MediaCache) -> (LookupIndex, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let index = LookupIndex::connect(&config, cache).await.unwrap();
        (index, tmp)
    }

    const FULL: &str = "https://site/wp-content/uploads/2024/01/photo.jpg";
    const THUMB: &str = "https://site/wp-content/uploads/2024/01/photo-150x150.jpg";

    #[test]
    fn test_path_hash_is_md5_of_path() {
        assert_eq!(path_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(path_hash("/a.jpg").len(), 32);
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (index, _tmp) = setup_test_index(MediaCache::new(60)).await;

        assert!(index.insert(42, 1, "full", FULL).await.unwrap());
        assert!(!index.insert(42, 1, "full", FULL).await.unwrap());

        let row = index.find_by_url(FULL).await.unwrap().unwrap();
        assert_eq!(row.uri, "/wp-content/uploads/2024/01/photo.jpg");
        assert_eq!(row.reference(), MediaReference::new(42, 1, "full"));

        // Same path from another host resolves to the same row
        let other = "http://cdn.example.net/wp-content/uploads/2024/01/photo.jpg";
        assert_eq!(index.find_by_url(other).await.unwrap(), Some(row));

        assert!(index.find_by_url(THUMB).await.unwrap().is_none());
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hash_collision_reports_absent() {
        let (index, _tmp) = setup_test_index(MediaCache::new(60)).await;
        let sql = format!(
            "INSERT INTO {} (id, blog_id, size, uri, hash) VALUES (9, 1, 'full', '/other.jpg', ?)",
            index.table()
        );
        sqlx::query(&sql)
            .bind(path_hash(&url_path(FULL)))
            .execute(&index.pool)
            .await
            .unwrap();

        assert!(index.find_by_url(FULL).await.unwrap().is_none());
        // Colliding insert is absorbed rather than failing
        assert!(!index.insert(42, 1, "full", FULL).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_all_by_media() {
        let (index, _tmp) = setup_test_index(MediaCache::new(60)).await;
        index.insert(42, 1, "full", FULL).await.unwrap();
        index.insert(42, 1, "thumbnail", THUMB).await.unwrap();
        index.insert(42, 2, "full", "/wp-content/uploads/sites/2/photo.jpg").await.unwrap();

        let sizes = index.find_all_by_media(42, 1).await.unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(
            sizes.get("thumbnail").map(String::as_str),
            Some("/wp-content/uploads/2024/01/photo-150x150.jpg")
        );
    }

    #[tokio::test]
    async fn test_delete_by_media_evicts_cache() {
        let cache = MediaCache::new(60);
        let (index, _tmp) = setup_test_index(cache.clone()).await;
        index.insert(42, 1, "full", FULL).await.unwrap();
        index.insert(42, 1, "thumbnail", THUMB).await.unwrap();
        index.insert(7, 1, "full", "/wp-content/uploads/other.jpg").await.unwrap();

        cache.put(42, "full", FULL, 1).await;
        cache.put(42, "thumbnail", "/wp-content/uploads/2024/01/photo-150x150.jpg", 1).await;

        assert_eq!(index.delete_by_media(42, 1).await.unwrap(), 2);
        assert!(index.find_all_by_media(42, 1).await.unwrap().is_empty());
        assert_eq!(cache.get(FULL).await, Resolution::Miss);
        assert!(cache.is_empty().await);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_owner_and_stats() {
        let (index, _tmp) = setup_test_index(MediaCache::new(60)).await;
        index.insert(42, 1, "full", FULL).await.unwrap();
        index.insert(42, 1, "thumbnail", THUMB).await.unwrap();
        index.insert(5, 2, "full", "/wp-content/uploads/sites/2/a.jpg").await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.sites.len(), 2);
        assert_eq!(stats.sites[0].media, 1);

        assert_eq!(index.count_by_owner(1).await.unwrap(), 2);
        assert_eq!(index.delete_by_owner(1).await.unwrap(), 2);
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.count_by_owner(1).await.unwrap(), 0);
    }
}
