use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the database file and make sure the schema exists.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Users Table (single administrative account kind)
    // password holds "salt$hexdigest" - see auth::hash_password
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Clients Table (gym member records)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            membership_type TEXT NOT NULL,
            contact_info TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Attendance Table (append-only visit log)
    // timestamp stored as RFC 3339 UTC so lexicographic order is chronological
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id),
            timestamp TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_client ON attendance(client_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_timestamp ON attendance(timestamp)",
        [],
    )?;

    Ok(())
}

/// Whether any account has been provisioned yet.
pub fn has_users(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count > 0)
}
