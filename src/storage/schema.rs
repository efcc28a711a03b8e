use rusqlite::{Connection, OptionalExtension};

pub const SCHEMA_VERSION: i64 = 1;

/// Create all tables. Unlike a scratch file format this store accumulates
/// across runs, so existing rows are left alone.
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Metadata table
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Snapshots (at most one per guard window)
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY,
            taken_at_ms INTEGER NOT NULL,
            total_count INTEGER NOT NULL
        );

        -- Unique provider names - normalized; axis 0 = inference, 1 = origin
        CREATE TABLE IF NOT EXISTS providers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            axis INTEGER NOT NULL,
            UNIQUE(name, axis)
        );

        -- Per-provider model counts for each snapshot
        CREATE TABLE IF NOT EXISTS provider_counts (
            snapshot_id INTEGER NOT NULL,
            provider_id INTEGER NOT NULL,
            count INTEGER NOT NULL,
            PRIMARY KEY (snapshot_id, provider_id),
            FOREIGN KEY (snapshot_id) REFERENCES snapshots(id),
            FOREIGN KEY (provider_id) REFERENCES providers(id)
        );
        "#,
    )
}

/// Get the newest stored snapshot timestamp (what the insert guard compares
/// against)
pub fn last_snapshot_timestamp(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT taken_at_ms FROM snapshots ORDER BY taken_at_ms DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
}

/// Set a metadata key
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        [key, value],
    )?;
    Ok(())
}

/// Get a metadata key
pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
        row.get(0)
    })
    .optional()
}
