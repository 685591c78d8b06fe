// Client Registry - create/list/delete over gym member records.

use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub membership_type: String,
    pub contact_info: String,
}

/// Coerce a raw form value into an age. The store would reject a non-integer
/// anyway, but we want a message the user can act on.
pub fn parse_age(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|age| *age >= 0)
        .ok_or_else(|| {
            AppError::Validation(format!("age must be a non-negative number, got '{raw}'"))
        })
}

/// Persist a new client. No uniqueness constraint: two members may share a name.
pub fn add_client(
    conn: &Connection,
    name: &str,
    age: i64,
    membership_type: &str,
    contact_info: &str,
) -> Result<Client> {
    conn.execute(
        "INSERT INTO clients (name, age, membership_type, contact_info)
         VALUES (?1, ?2, ?3, ?4)",
        params![name, age, membership_type, contact_info],
    )?;

    Ok(Client {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        age,
        membership_type: membership_type.to_string(),
        contact_info: contact_info.to_string(),
    })
}

fn row_to_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        membership_type: row.get(3)?,
        contact_info: row.get(4)?,
    })
}

/// All clients in the store's natural (rowid) order.
pub fn list_clients(conn: &Connection) -> Result<Vec<Client>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, age, membership_type, contact_info FROM clients ORDER BY id",
    )?;

    let clients = stmt
        .query_map([], row_to_client)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(clients)
}

pub fn get_client(conn: &Connection, id: i64) -> Result<Option<Client>> {
    let client = conn
        .query_row(
            "SELECT id, name, age, membership_type, contact_info FROM clients WHERE id = ?1",
            params![id],
            row_to_client,
        )
        .optional()?;

    Ok(client)
}

pub fn count_clients(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;
    Ok(count)
}

/// Delete a client and, in the same transaction, every attendance row that
/// references it. A missing id is reported, not silently ignored.
pub fn delete_client(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM attendance WHERE client_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM clients WHERE id = ?1", params![id])?;

    if deleted == 0 {
        // Dropping the transaction rolls back the attendance delete
        return Err(AppError::NotFound(format!("client {id}")));
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{full_attendance_log, mark_attendance};
    use crate::db::setup_database;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("30").unwrap(), 30);
        assert_eq!(parse_age(" 18 ").unwrap(), 18);
        assert!(matches!(
            parse_age("thirty").unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(parse_age("-1").unwrap_err(), AppError::Validation(_)));
        assert!(matches!(parse_age("").unwrap_err(), AppError::Validation(_)));
    }

    #[test]
    fn test_add_and_list_clients() {
        let conn = test_conn();

        let jane = add_client(&conn, "Jane", 30, "Premium", "jane@x.com").unwrap();
        add_client(&conn, "Bob", 41, "Basic", "bob@x.com").unwrap();

        let clients = list_clients(&conn).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].id, jane.id);
        assert_eq!(clients[0].name, "Jane");
        assert_eq!(clients[0].age, 30);
        assert_eq!(clients[0].membership_type, "Premium");
        assert_eq!(count_clients(&conn).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_names_are_allowed() {
        let conn = test_conn();

        add_client(&conn, "Jane", 30, "Premium", "jane@x.com").unwrap();
        add_client(&conn, "Jane", 25, "Basic", "jane2@x.com").unwrap();

        assert_eq!(count_clients(&conn).unwrap(), 2);
    }

    #[test]
    fn test_delete_removes_exactly_one_client() {
        let mut conn = test_conn();

        let jane = add_client(&conn, "Jane", 30, "Premium", "jane@x.com").unwrap();
        let bob = add_client(&conn, "Bob", 41, "Basic", "bob@x.com").unwrap();

        delete_client(&mut conn, jane.id).unwrap();

        let remaining = list_clients(&conn).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, bob.id);
        assert!(get_client(&conn, jane.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_client_reports_not_found() {
        let mut conn = test_conn();

        let err = delete_client(&mut conn, 999).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_delete_cascades_to_attendance() {
        let mut conn = test_conn();

        let jane = add_client(&conn, "Jane", 30, "Premium", "jane@x.com").unwrap();
        let bob = add_client(&conn, "Bob", 41, "Basic", "bob@x.com").unwrap();
        mark_attendance(&conn, jane.id).unwrap();
        mark_attendance(&conn, jane.id).unwrap();
        mark_attendance(&conn, bob.id).unwrap();

        delete_client(&mut conn, jane.id).unwrap();

        // No orphaned rows: only Bob's visit survives
        let log = full_attendance_log(&conn).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].client_id, bob.id);
    }
}
