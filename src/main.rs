// Gym Membership Tracker - Admin CLI
//
// There is deliberately no default seeded account: the operator provisions
// credentials explicitly with `create-admin` before starting the server.

use anyhow::{bail, Result};
use gym_tracker::{auth, db};
use std::env;
use std::path::PathBuf;

fn db_path() -> PathBuf {
    env::var("GYM_DB").unwrap_or_else(|_| "gym.db".to_string()).into()
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(),
        Some("create-admin") => run_create_admin(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("gym-tracker {}", gym_tracker::VERSION);
    println!();
    println!("Usage:");
    println!("  gym-tracker init                              Create the database schema");
    println!("  gym-tracker create-admin <username> <password>  Provision an admin account");
    println!();
    println!("The database path is taken from GYM_DB (default: gym.db).");
}

fn run_init() -> Result<()> {
    let path = db_path();
    db::open_database(&path)?;
    println!("✓ Database initialized at {:?}", path);
    Ok(())
}

fn run_create_admin(args: &[String]) -> Result<()> {
    let [username, password] = args else {
        bail!("usage: gym-tracker create-admin <username> <password>");
    };

    let path = db_path();
    let conn = db::open_database(&path)?;
    let user = auth::create_user(&conn, username, password)?;

    println!("✓ Admin account '{}' created (id {})", user.username, user.id);
    Ok(())
}
