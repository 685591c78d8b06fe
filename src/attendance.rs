// Attendance Ledger - append-only visit log plus aggregate queries.

use crate::clients::get_client;
use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};

#[derive(Debug, Clone)]
pub struct Attendance {
    pub id: i64,
    pub client_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// An attendance row joined with the client name for display.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

// Fixed-width RFC 3339 so string order in the store matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

/// Append a visit stamped with the current time.
///
/// The referenced client must exist; double submission is not deduplicated,
/// two near-simultaneous calls yield two rows.
pub fn mark_attendance(conn: &Connection, client_id: i64) -> Result<Attendance> {
    if get_client(conn, client_id)?.is_none() {
        return Err(AppError::Reference(format!(
            "client {client_id} does not exist"
        )));
    }

    let timestamp = Utc::now();
    conn.execute(
        "INSERT INTO attendance (client_id, timestamp) VALUES (?1, ?2)",
        params![client_id, format_timestamp(timestamp)],
    )?;

    Ok(Attendance {
        id: conn.last_insert_rowid(),
        client_id,
        timestamp,
    })
}

/// Count visits whose timestamp falls on the given calendar date (UTC).
pub fn attendance_count_for(conn: &Connection, date: NaiveDate) -> Result<i64> {
    // RFC 3339 leads with YYYY-MM-DD, so the date component is a prefix
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attendance WHERE substr(timestamp, 1, 10) = ?1",
        params![date.to_string()],
        |row| row.get(0),
    )?;

    Ok(count)
}

fn query_log(conn: &Connection, limit: i64) -> Result<Vec<AttendanceEntry>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.client_id, c.name, a.timestamp
         FROM attendance a
         JOIN clients c ON c.id = a.client_id
         ORDER BY a.timestamp DESC, a.id DESC
         LIMIT ?1",
    )?;

    let entries = stmt
        .query_map(params![limit], |row| {
            let raw: String = row.get(3)?;
            Ok(AttendanceEntry {
                id: row.get(0)?,
                client_id: row.get(1)?,
                client_name: row.get(2)?,
                timestamp: parse_timestamp(&raw)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries)
}

/// The most recent visits, newest first, at most `limit` rows.
pub fn recent_attendance(conn: &Connection, limit: u32) -> Result<Vec<AttendanceEntry>> {
    query_log(conn, i64::from(limit))
}

/// Every visit on record, newest first.
pub fn full_attendance_log(conn: &Connection) -> Result<Vec<AttendanceEntry>> {
    // SQLite treats a negative LIMIT as unbounded
    query_log(conn, -1)
}
