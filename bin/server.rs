// Gym Membership Tracker - Web Server
//
// Server-rendered pages behind a session cookie. Every protected route goes
// through the CurrentUser extractor; an unauthenticated request is redirected
// to /login rather than rejected. Errors surface as one-shot flash messages.

use axum::{
    async_trait,
    extract::{Form, FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use gym_tracker::{attendance, auth, clients, db, AppError, SessionStore, User};
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

const SESSION_COOKIE: &str = "session";
const FLASH_COOKIE: &str = "flash";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    sessions: SessionStore,
}

// ============================================================================
// Cookies & flash messages
// ============================================================================

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Redirect carrying a one-shot message for the next page render.
fn flash_redirect(to: &str, message: &str) -> Response {
    let cookie = format!(
        "{FLASH_COOKIE}={}; Path=/; HttpOnly",
        urlencoding::encode(message)
    );
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(to),
    )
        .into_response()
}

fn take_flash(headers: &HeaderMap) -> Option<String> {
    let raw = cookie_value(headers, FLASH_COOKIE)?;
    if raw.is_empty() {
        return None;
    }
    Some(urlencoding::decode(&raw).map(|s| s.into_owned()).unwrap_or(raw))
}

// ============================================================================
// Session guard
// ============================================================================

/// Per-request identity, resolved from the session cookie.
struct CurrentUser {
    user: User,
    token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, SESSION_COOKIE)
            .ok_or_else(|| Redirect::to("/login"))?;
        let user_id = state
            .sessions
            .resolve(&token)
            .ok_or_else(|| Redirect::to("/login"))?;

        let conn = state.db.lock().unwrap();
        match auth::load_user(&conn, user_id) {
            Ok(Some(user)) => Ok(CurrentUser { user, token }),
            _ => Err(Redirect::to("/login")),
        }
    }
}

// ============================================================================
// Page rendering
// ============================================================================

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wrap a page body in the shared shell and clear any pending flash cookie.
fn page(title: &str, flash: Option<String>, nav: bool, body: String) -> Response {
    let flash_html = match flash {
        Some(message) => format!("<p class=\"flash\">{}</p>", escape_html(&message)),
        None => String::new(),
    };
    let nav_html = if nav {
        "<nav><a href=\"/\">Dashboard</a> | <a href=\"/add_client\">Add Client</a> | \
         <a href=\"/view_clients\">Clients</a> | <a href=\"/mark_attendance\">Mark Attendance</a> | \
         <a href=\"/view_attendance\">Attendance Log</a> | <a href=\"/logout\">Logout</a></nav>"
    } else {
        ""
    };

    let html = format!(
        "<!DOCTYPE html>\n<html><head><title>{title} - Gym Tracker</title></head>\n\
         <body>{nav_html}{flash_html}<h1>{title}</h1>\n{body}</body></html>"
    );

    (
        AppendHeaders([(
            header::SET_COOKIE,
            format!("{FLASH_COOKIE}=; Path=/; Max-Age=0"),
        )]),
        Html(html),
    )
        .into_response()
}

// ============================================================================
// Form payloads
// ============================================================================

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ClientForm {
    name: String,
    age: String,
    membership_type: String,
    contact_info: String,
}

#[derive(Deserialize)]
struct AttendanceForm {
    client_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - dashboard (protected)
async fn dashboard(
    user: CurrentUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let conn = state.db.lock().unwrap();
    let today = chrono::Utc::now().date_naive();

    let stats = clients::count_clients(&conn).and_then(|total_clients| {
        let today_attendance = attendance::attendance_count_for(&conn, today)?;
        let history = attendance::recent_attendance(&conn, 10)?;
        Ok((total_clients, today_attendance, history))
    });

    match stats {
        Ok((total_clients, today_attendance, history)) => {
            let mut rows = String::new();
            for entry in &history {
                rows.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape_html(&entry.client_name),
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                ));
            }
            let body = format!(
                "<p>Logged in as <strong>{}</strong></p>\
                 <p>Total clients: {total_clients}</p>\
                 <p>Today's attendance: {today_attendance}</p>\
                 <h2>Recent visits</h2>\
                 <table><tr><th>Client</th><th>Time (UTC)</th></tr>{rows}</table>",
                escape_html(&user.user.username),
            );
            page("Dashboard", take_flash(&headers), true, body)
        }
        Err(e) => {
            tracing::error!("dashboard query failed: {e}");
            flash_redirect("/login", &e.to_string())
        }
    }
}

/// GET /login - credential form
async fn login_form(headers: HeaderMap) -> Response {
    let body = "<form method=\"post\" action=\"/login\">\
                <label>Username <input name=\"username\"></label><br>\
                <label>Password <input name=\"password\" type=\"password\"></label><br>\
                <button type=\"submit\">Log in</button></form>"
        .to_string();
    page("Login", take_flash(&headers), false, body)
}

/// POST /login - credential submission
async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let conn = state.db.lock().unwrap();

    match auth::login(&conn, &state.sessions, &form.username, &form.password) {
        Ok(token) => {
            tracing::info!(username = %form.username, "login succeeded");
            let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
            (
                AppendHeaders([(header::SET_COOKIE, cookie)]),
                Redirect::to("/"),
            )
                .into_response()
        }
        Err(e) => {
            tracing::info!(username = %form.username, "login rejected");
            flash_redirect("/login", &e.to_string())
        }
    }
}

/// GET /logout - session termination (protected)
async fn logout(user: CurrentUser, State(state): State<AppState>) -> Response {
    auth::logout(&state.sessions, &user.token);
    let cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly");
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to("/login"),
    )
        .into_response()
}

/// GET /add_client - form (protected)
async fn add_client_form(_user: CurrentUser, headers: HeaderMap) -> Response {
    let body = "<form method=\"post\" action=\"/add_client\">\
                <label>Name <input name=\"name\"></label><br>\
                <label>Age <input name=\"age\"></label><br>\
                <label>Membership type <input name=\"membership_type\"></label><br>\
                <label>Contact info <input name=\"contact_info\"></label><br>\
                <button type=\"submit\">Add client</button></form>"
        .to_string();
    page("Add Client", take_flash(&headers), true, body)
}

/// POST /add_client - create client (protected)
async fn add_client_submit(
    _user: CurrentUser,
    State(state): State<AppState>,
    Form(form): Form<ClientForm>,
) -> Response {
    let conn = state.db.lock().unwrap();

    let result = clients::parse_age(&form.age).and_then(|age| {
        clients::add_client(
            &conn,
            &form.name,
            age,
            &form.membership_type,
            &form.contact_info,
        )
    });

    match result {
        Ok(client) => {
            tracing::info!(id = client.id, name = %client.name, "client added");
            flash_redirect("/view_clients", "Client added successfully")
        }
        Err(e) => flash_redirect("/add_client", &e.to_string()),
    }
}

/// GET /view_clients - list clients (protected)
async fn view_clients(
    _user: CurrentUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let conn = state.db.lock().unwrap();

    match clients::list_clients(&conn) {
        Ok(clients) => {
            let mut rows = String::new();
            for client in &clients {
                rows.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                     <td><a href=\"/delete_client/{}\">delete</a></td></tr>",
                    client.id,
                    escape_html(&client.name),
                    client.age,
                    escape_html(&client.membership_type),
                    escape_html(&client.contact_info),
                    client.id,
                ));
            }
            let body = format!(
                "<table><tr><th>Id</th><th>Name</th><th>Age</th>\
                 <th>Membership</th><th>Contact</th><th></th></tr>{rows}</table>"
            );
            page("Clients", take_flash(&headers), true, body)
        }
        Err(e) => {
            tracing::error!("listing clients failed: {e}");
            flash_redirect("/", &e.to_string())
        }
    }
}

/// GET /delete_client/:id - delete client (protected)
async fn delete_client(
    _user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    let mut conn = state.db.lock().unwrap();

    match clients::delete_client(&mut conn, id) {
        Ok(()) => {
            tracing::info!(id, "client deleted");
            flash_redirect("/view_clients", "Client deleted")
        }
        Err(e) => flash_redirect("/view_clients", &e.to_string()),
    }
}

/// GET /mark_attendance - client picker (protected)
async fn mark_attendance_form(
    _user: CurrentUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let conn = state.db.lock().unwrap();

    match clients::list_clients(&conn) {
        Ok(clients) => {
            let mut options = String::new();
            for client in &clients {
                options.push_str(&format!(
                    "<option value=\"{}\">{}</option>",
                    client.id,
                    escape_html(&client.name),
                ));
            }
            let body = format!(
                "<form method=\"post\" action=\"/mark_attendance\">\
                 <label>Client <select name=\"client_id\">{options}</select></label><br>\
                 <button type=\"submit\">Mark attendance</button></form>"
            );
            page("Mark Attendance", take_flash(&headers), true, body)
        }
        Err(e) => {
            tracing::error!("listing clients failed: {e}");
            flash_redirect("/", &e.to_string())
        }
    }
}

/// POST /mark_attendance - record attendance (protected)
async fn mark_attendance_submit(
    _user: CurrentUser,
    State(state): State<AppState>,
    Form(form): Form<AttendanceForm>,
) -> Response {
    let conn = state.db.lock().unwrap();

    let result = form
        .client_id
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Validation(format!("invalid client id '{}'", form.client_id)))
        .and_then(|client_id| attendance::mark_attendance(&conn, client_id));

    match result {
        Ok(visit) => {
            tracing::info!(client_id = visit.client_id, "attendance marked");
            flash_redirect("/", "Attendance marked")
        }
        Err(e) => flash_redirect("/mark_attendance", &e.to_string()),
    }
}

/// GET /view_attendance - full attendance log (protected)
async fn view_attendance(
    _user: CurrentUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let conn = state.db.lock().unwrap();

    match attendance::full_attendance_log(&conn) {
        Ok(log) => {
            let mut rows = String::new();
            for entry in &log {
                rows.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    entry.id,
                    escape_html(&entry.client_name),
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                ));
            }
            let body = format!(
                "<table><tr><th>Id</th><th>Client</th><th>Time (UTC)</th></tr>{rows}</table>"
            );
            page("Attendance Log", take_flash(&headers), true, body)
        }
        Err(e) => {
            tracing::error!("attendance log query failed: {e}");
            flash_redirect("/", &e.to_string())
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = std::env::var("GYM_DB").unwrap_or_else(|_| "gym.db".to_string());
    let addr = std::env::var("GYM_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let conn = db::open_database(std::path::Path::new(&db_path))?;
    tracing::info!(path = %db_path, "database opened");

    if !db::has_users(&conn)? {
        tracing::warn!(
            "no accounts provisioned; run `gym-tracker create-admin <username> <password>` \
             before logging in"
        );
    }

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        sessions: SessionStore::new(),
    };

    let app = Router::new()
        .route("/", get(dashboard))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
        .route("/add_client", get(add_client_form).post(add_client_submit))
        .route("/view_clients", get(view_clients))
        .route("/delete_client/:id", get(delete_client))
        .route(
            "/mark_attendance",
            get(mark_attendance_form).post(mark_attendance_submit),
        )
        .route("/view_attendance", get(view_attendance))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session=abc-123; flash=hello%20there"),
        );

        assert_eq!(cookie_value(&headers, "session").as_deref(), Some("abc-123"));
        assert_eq!(take_flash(&headers).as_deref(), Some("hello there"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_flash_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("flash="));

        assert_eq!(take_flash(&headers), None);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"Jane\" & 'Bob'</b>"),
            "&lt;b&gt;&quot;Jane&quot; &amp; &#39;Bob&#39;&lt;/b&gt;"
        );
    }
}
