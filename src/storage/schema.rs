//! Schema of the fingerprint spillover database

use rusqlite::Connection;

/// SQL schema for the fingerprint database
pub const SCHEMA_SQL: &str = r#"
-- URI identities spilled out of memory
CREATE TABLE IF NOT EXISTS fingerprints (
    fp INTEGER PRIMARY KEY
) WITHOUT ROWID;
"#;

/// Creates the tables if they do not exist
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Removes every stored fingerprint
pub fn reset(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM fingerprints", [])?;
    Ok(())
}
