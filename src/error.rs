// Error taxonomy shared by every component.
//
// Nothing here is fatal to the process: the server surfaces each variant as a
// flash message plus a redirect, and the CLI prints it and exits.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad credentials. Deliberately does not say which field was wrong.
    #[error("Invalid username or password")]
    Auth,

    /// Malformed input (non-numeric age, duplicate username, empty fields).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Operation on an id that is not in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attendance referencing a client that does not exist.
    #[error("Unknown client: {0}")]
    Reference(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
