//! SQLite schema definition

/// SQL schema for the lookup table.
///
/// Column widths match the framework's own lookup table: `id` unsigned 64-bit, `blog_id`
/// unsigned 16-bit, `size` ≤ 50, `uri` tinytext, `hash` ≤ 255 and unique.
pub fn schema_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER NOT NULL CHECK (id >= 0),
    blog_id INTEGER NOT NULL CHECK (blog_id BETWEEN 0 AND 65535),
    size TEXT NOT NULL CHECK (length(size) <= 50),
    uri TEXT NOT NULL CHECK (length(uri) <= 255),
    hash TEXT NOT NULL CHECK (length(hash) <= 255)
);

CREATE UNIQUE INDEX IF NOT EXISTS {table}_hash ON {table}(hash);
CREATE INDEX IF NOT EXISTS {table}_id ON {table}(id);
"#
    )
}
