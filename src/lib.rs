// Gym Membership Tracker - Core Library
// Exposes all modules for use in the CLI, web server, and tests

pub mod attendance;
pub mod auth;
pub mod clients;
pub mod db;
pub mod error;

// Re-export commonly used types
pub use attendance::{
    attendance_count_for, full_attendance_log, mark_attendance, recent_attendance, Attendance,
    AttendanceEntry,
};
pub use auth::{
    create_user, find_user, hash_password, load_user, login, logout, verify_password, SessionStore,
    User,
};
pub use clients::{
    add_client, count_clients, delete_client, get_client, list_clients, parse_age, Client,
};
pub use db::{has_users, open_database, setup_database};
pub use error::{AppError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    // Full walkthrough: provision admin, log in, add a client, mark a visit,
    // check the numbers the dashboard renders.
    #[test]
    fn test_admin_day_one_walkthrough() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let sessions = SessionStore::new();

        let admin = create_user(&conn, "admin", "admin123").unwrap();
        let token = login(&conn, &sessions, "admin", "admin123").unwrap();
        let user_id = sessions.resolve(&token).unwrap();
        assert_eq!(user_id, admin.id);
        assert_eq!(load_user(&conn, user_id).unwrap().unwrap().username, "admin");

        let jane = add_client(&conn, "Jane", 30, "Premium", "jane@x.com").unwrap();
        mark_attendance(&conn, jane.id).unwrap();

        let today = chrono::Utc::now().date_naive();
        assert_eq!(count_clients(&conn).unwrap(), 1);
        assert_eq!(attendance_count_for(&conn, today).unwrap(), 1);

        let history = recent_attendance(&conn, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].client_name, "Jane");

        // Cleanup path: deleting Jane takes her visit with her
        delete_client(&mut conn, jane.id).unwrap();
        assert_eq!(count_clients(&conn).unwrap(), 0);
        assert!(full_attendance_log(&conn).unwrap().is_empty());

        logout(&sessions, &token);
        assert!(sessions.resolve(&token).is_none());
    }
}
