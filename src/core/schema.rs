//! Centralized SQL schema definitions for the Indexed Content Store (C3).

/// Current schema version. Bump when adding a migration in `core::migration`.
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS schema_meta (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    )
";

pub const SCHEMA_STORE_META: &str = "
    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const SCHEMA_ITEMS: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        name TEXT NOT NULL,
        content TEXT NOT NULL,
        file_path TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        content_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(type, name, file_path)
    )
";

pub const SCHEMA_INDEX_ITEMS_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_items_type ON items(type)";
pub const SCHEMA_INDEX_ITEMS_FILE_PATH: &str =
    "CREATE INDEX IF NOT EXISTS idx_items_file_path ON items(file_path)";

pub const SCHEMA_EMBEDDINGS: &str = "
    CREATE TABLE IF NOT EXISTS embeddings (
        item_id TEXT PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
        dim INTEGER NOT NULL,
        vector BLOB NOT NULL
    )
";

pub const SCHEMA_GENERATED_FILES: &str = "
    CREATE TABLE IF NOT EXISTS generated_files (
        tool TEXT NOT NULL,
        file_path TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        backup_path TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        generated_at TEXT NOT NULL,
        PRIMARY KEY (tool, file_path)
    )
";

pub const SCHEMA_FILE_TIMESTAMPS: &str = "
    CREATE TABLE IF NOT EXISTS file_timestamps (
        path TEXT PRIMARY KEY,
        mtime TEXT NOT NULL,
        size INTEGER NOT NULL,
        hash TEXT NOT NULL,
        last_checked_at TEXT NOT NULL,
        git_commit TEXT
    )
";

pub const SCHEMA_SYNC_STATE: &str = "
    CREATE TABLE IF NOT EXISTS sync_state (
        tool TEXT PRIMARY KEY,
        version TEXT NOT NULL,
        user_modified INTEGER NOT NULL DEFAULT 0,
        last_checked TEXT NOT NULL,
        file_path TEXT,
        content_hash TEXT
    )
";

pub const SCHEMA_TEMPLATE_MANIFEST: &str = "
    CREATE TABLE IF NOT EXISTS template_manifest (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        k0ntext_version TEXT NOT NULL,
        template_version TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        content_normalization TEXT NOT NULL DEFAULT 'posix',
        files TEXT NOT NULL,
        extra TEXT NOT NULL DEFAULT '{}'
    )
";

/// All DDL statements, in dependency order, run once at store initialization
/// and again (idempotently, `CREATE TABLE IF NOT EXISTS`) on every open.
pub fn all_ddl() -> &'static [&'static str] {
    &[
        SCHEMA_META,
        SCHEMA_STORE_META,
        SCHEMA_ITEMS,
        SCHEMA_INDEX_ITEMS_TYPE,
        SCHEMA_INDEX_ITEMS_FILE_PATH,
        SCHEMA_EMBEDDINGS,
        SCHEMA_GENERATED_FILES,
        SCHEMA_FILE_TIMESTAMPS,
        SCHEMA_SYNC_STATE,
        SCHEMA_TEMPLATE_MANIFEST,
    ]
}
