//! Database schema definitions and migrations

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the bookmark database
pub const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL,
    description TEXT
);

-- Bookmarks table
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT,
    description TEXT,
    webicon TEXT NOT NULL,
    icon_candidates TEXT NOT NULL DEFAULT '[]', -- JSON array
    extra_metadata TEXT, -- JSON object
    tags TEXT NOT NULL DEFAULT '[]', -- JSON array
    is_favorite BOOLEAN NOT NULL DEFAULT FALSE,
    click_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    last_used INTEGER,
    full_text_content TEXT,
    content_fetched_at INTEGER
);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_bookmarks_title ON bookmarks(title);
CREATE INDEX IF NOT EXISTS idx_bookmarks_description ON bookmarks(description);
CREATE INDEX IF NOT EXISTS idx_bookmarks_created_at ON bookmarks(created_at);
"#;

/// Migration definitions
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// List of all migrations
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: SCHEMA_SQL,
    },
];

/// Get migration by version
pub fn get_migration(version: u32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}
