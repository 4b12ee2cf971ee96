//! SQL DDL for the realtime database tree.

/// One row per leaf of the JSON tree:
/// - `path` is the full `/`-separated location of the leaf
/// - `value` is the leaf serialized as JSON (scalar or array)
///
/// Objects are never stored directly; they are assembled from their leaves.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    path TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL, -- JSON
    updated_at TEXT NOT NULL -- RFC3339
);
"#;
