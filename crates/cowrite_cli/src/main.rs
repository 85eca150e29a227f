//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `cowrite_core` linkage.
//! - Walk one collaboration flow for quick local sanity checks, against the
//!   database path given as the first argument or in-memory by default.
//!
//! The flow registers fixed demo users, so a file-backed run expects a fresh
//! database.

use cowrite_core::db::{open_db, open_db_in_memory};
use cowrite_core::{
    default_log_level, init_logging, AccessGate, ArrangementService, CollabService, DesiredEntry,
    Identity, NewUser, ProjectService, SqliteArrangementRepository, SqliteProjectRepository,
    SqliteRequestRepository, SqliteSectionRepository, SqliteUserRepository,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let log_dir = std::env::temp_dir().join("cowrite-cli-logs");
    if let Some(log_dir) = log_dir.to_str() {
        // Logging is best effort here; the probe output goes to stdout.
        if let Err(err) = init_logging(default_log_level(), log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("cowrite_core ping={}", cowrite_core::ping());
    println!("cowrite_core version={}", cowrite_core::core_version());

    let conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    let users = SqliteUserRepository::try_new(&conn)?;
    users.create_user(&NewUser {
        username: "maria".to_string(),
        first_name: "Maria".to_string(),
        last_name: "Reyes".to_string(),
        email: "maria@example.com".to_string(),
    })?;
    users.create_user(&NewUser {
        username: "jo".to_string(),
        first_name: "Jo".to_string(),
        last_name: "Park".to_string(),
        email: "jo@example.com".to_string(),
    })?;
    println!("user jo registered={}", users.user_exists("jo")?);

    let sections = SqliteSectionRepository::try_new(&conn)?;
    let catalog = sections.list_sections()?;
    let names: Vec<&str> = catalog.iter().map(|section| section.name.as_str()).collect();
    println!("section catalog: {}", names.join(", "));

    let projects = ProjectService::new(SqliteProjectRepository::try_new(&conn)?);
    let project = projects.create_project("Night Drive", "maria")?;
    println!("created project id={} title={}", project.id, project.title);

    let collabs = CollabService::new(SqliteRequestRepository::try_new(&conn)?);
    let request = collabs.make_request(project.id, "maria", "jo")?;
    let request = collabs.respond(request.id, "accept")?;
    println!("request id={} state={}", request.id, request.state.as_str());

    let gate = AccessGate::try_new(&conn)?;
    gate.ensure_project_contributor(&Identity::user("jo"), project.id)?;

    let arrangements = ArrangementService::new(SqliteArrangementRepository::try_new(&conn)?);
    let rows = arrangements.reconcile(
        project.id,
        &[
            DesiredEntry::insert(Some(1), 0),
            DesiredEntry::insert(Some(2), 1),
            DesiredEntry::insert(Some(4), 2),
        ],
    )?;
    for row in &rows {
        println!(
            "entry id={} position={} section={}",
            row.id,
            row.position,
            row.section_name.as_deref().unwrap_or("(blank)")
        );
    }

    Ok(())
}
