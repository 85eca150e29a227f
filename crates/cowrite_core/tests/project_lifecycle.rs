use cowrite_core::db::open_db_in_memory;
use cowrite_core::{
    ArrangementRepository, LeaveOutcome, NewUser, Project, ProjectPatch, ProjectRepoError,
    ProjectRepository, ProjectService, ProjectServiceError, RequestRepository,
    SqliteArrangementRepository, SqliteProjectRepository, SqliteRequestRepository,
    SqliteUserRepository,
};
use rusqlite::Connection;

#[test]
fn create_project_writes_owner_membership_and_blank_entry() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");

    let project = create_project(&conn, "Night Drive", "maria");
    assert_eq!(project.title, "Night Drive");
    assert_eq!(project.owner, "maria");
    assert!(project.notes.is_none());

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let memberships = repo.memberships_for_project(project.id).unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].username, "maria");
    assert!(memberships[0].is_owner);

    let arrangements = SqliteArrangementRepository::try_new(&conn).unwrap();
    let rows = arrangements.list_for_project(project.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].section_id, None);
    assert_eq!(rows[0].section_name, None);
    assert_eq!(rows[0].position, 0);
}

#[test]
fn create_project_with_unknown_owner_leaves_no_partial_rows() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let err = repo.create_project("Orphan", "ghost").unwrap_err();
    assert!(matches!(err, ProjectRepoError::UnknownOwner(name) if name == "ghost"));

    assert_eq!(count(&conn, "projects"), 0);
    assert_eq!(count(&conn, "cowrites"), 0);
    assert_eq!(count(&conn, "arrangements"), 0);
}

#[test]
fn get_project_lists_contributors_alphabetically() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "zed");
    register(&conn, "ana");
    let project = create_project(&conn, "Night Drive", "maria");
    add_contributor(&conn, project.id, "zed");
    add_contributor(&conn, project.id, "ana");

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let details = repo.get_project(project.id).unwrap();

    assert_eq!(details.contributors, vec!["ana", "maria", "zed"]);
    assert_eq!(details.owner, "maria");
}

#[test]
fn get_project_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let err = repo.get_project(42).unwrap_err();
    assert!(matches!(err, ProjectRepoError::ProjectNotFound(42)));
}

#[test]
fn summary_projection_exposes_identity_fields_only() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    let project = create_project(&conn, "Night Drive", "maria");

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let summary = repo.get_summary(project.id).unwrap();

    assert_eq!(summary.id, project.id);
    assert_eq!(summary.title, "Night Drive");
    assert_eq!(summary.owner, "maria");
    assert_eq!(summary.updated_at, project.updated_at);
}

#[test]
fn update_applies_partial_patch_and_restamps() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    let project = create_project(&conn, "Night Drive", "maria");
    backdate_project(&conn, project.id, 1000);

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let patch = ProjectPatch {
        notes: Some("bridge needs a lift".to_string()),
        ..ProjectPatch::default()
    };
    let updated = repo.update_project(project.id, &patch).unwrap();

    assert_eq!(updated.title, "Night Drive");
    assert_eq!(updated.notes.as_deref(), Some("bridge needs a lift"));
    assert!(updated.updated_at > 1000);
}

#[test]
fn empty_patch_still_restamps_updated_at() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    let project = create_project(&conn, "Night Drive", "maria");
    backdate_project(&conn, project.id, 1000);

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let updated = repo
        .update_project(project.id, &ProjectPatch::default())
        .unwrap();

    assert!(updated.updated_at > 1000);
}

#[test]
fn update_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let err = repo
        .update_project(42, &ProjectPatch::default())
        .unwrap_err();
    assert!(matches!(err, ProjectRepoError::ProjectNotFound(42)));
}

#[test]
fn remove_project_cascades_to_dependents() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "jo");
    let project = create_project(&conn, "Night Drive", "maria");
    add_contributor(&conn, project.id, "jo");

    let requests = SqliteRequestRepository::try_new(&conn).unwrap();
    register(&conn, "sam");
    requests.make_request(project.id, "maria", "sam").unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    repo.remove_project(project.id).unwrap();

    assert_eq!(count(&conn, "projects"), 0);
    assert_eq!(count(&conn, "cowrites"), 0);
    assert_eq!(count(&conn, "arrangements"), 0);
    assert_eq!(count(&conn, "requests"), 0);
}

#[test]
fn remove_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let err = repo.remove_project(42).unwrap_err();
    assert!(matches!(err, ProjectRepoError::ProjectNotFound(42)));
}

#[test]
fn owner_leave_dissolves_whole_project() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "jo");
    let project = create_project(&conn, "Night Drive", "maria");
    add_contributor(&conn, project.id, "jo");

    let requests = SqliteRequestRepository::try_new(&conn).unwrap();
    register(&conn, "sam");
    requests.make_request(project.id, "maria", "sam").unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let outcome = repo.leave_project(project.id, "maria").unwrap();
    assert_eq!(outcome, LeaveOutcome::ProjectDissolved);

    assert_eq!(count(&conn, "projects"), 0);
    assert_eq!(count(&conn, "cowrites"), 0);
    assert_eq!(count(&conn, "arrangements"), 0);
    assert_eq!(count(&conn, "requests"), 0);
}

#[test]
fn contributor_leave_removes_one_membership_and_pending_invitations() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "jo");
    register(&conn, "sam");
    let project = create_project(&conn, "Night Drive", "maria");
    add_contributor(&conn, project.id, "jo");
    backdate_project(&conn, project.id, 1000);

    // One dangling invitation to the leaver, one unrelated pending request.
    let requests = SqliteRequestRepository::try_new(&conn).unwrap();
    requests.make_request(project.id, "maria", "jo").unwrap();
    requests.make_request(project.id, "maria", "sam").unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let outcome = repo.leave_project(project.id, "jo").unwrap();
    assert_eq!(
        outcome,
        LeaveOutcome::MembershipRemoved {
            withdrawn_requests: 1
        }
    );

    let details = repo.get_project(project.id).unwrap();
    assert_eq!(details.contributors, vec!["maria"]);
    assert!(details.updated_at > 1000);

    let arrangements = SqliteArrangementRepository::try_new(&conn).unwrap();
    assert_eq!(arrangements.list_for_project(project.id).unwrap().len(), 1);

    let remaining = requests.requests_for_project(project.id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].recipient, "sam");
}

#[test]
fn contributor_leave_keeps_resolved_requests() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "jo");
    let project = create_project(&conn, "Night Drive", "maria");

    let requests = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = requests.make_request(project.id, "maria", "jo").unwrap();
    requests.accept(request.id).unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let outcome = repo.leave_project(project.id, "jo").unwrap();
    assert_eq!(
        outcome,
        LeaveOutcome::MembershipRemoved {
            withdrawn_requests: 0
        }
    );

    // The accepted request row is history, not a dangling invitation.
    assert_eq!(count(&conn, "requests"), 1);
}

#[test]
fn leave_without_membership_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "jo");
    let project = create_project(&conn, "Night Drive", "maria");

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let err = repo.leave_project(project.id, "jo").unwrap_err();
    assert!(matches!(
        err,
        ProjectRepoError::MembershipNotFound { project_id, username }
            if project_id == project.id && username == "jo"
    ));
}

#[test]
fn projects_for_user_orders_by_most_recent_update() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");
    register(&conn, "jo");
    let older = create_project(&conn, "Older", "maria");
    let newer = create_project(&conn, "Newer", "maria");
    let joined = create_project(&conn, "Joined", "jo");
    add_contributor(&conn, joined.id, "maria");
    backdate_project(&conn, older.id, 1000);
    backdate_project(&conn, newer.id, 3000);
    backdate_project(&conn, joined.id, 2000);

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let tags = repo.projects_for_user("maria").unwrap();

    let titles: Vec<_> = tags.iter().map(|tag| tag.title.as_str()).collect();
    assert_eq!(titles, vec!["Newer", "Joined", "Older"]);
    assert!(tags[0].is_owner);
    assert!(!tags[1].is_owner);
}

#[test]
fn projects_for_unknown_user_is_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteProjectRepository::try_new(&conn).unwrap();
    let err = repo.projects_for_user("ghost").unwrap_err();
    assert!(matches!(err, ProjectRepoError::UserNotFound(name) if name == "ghost"));
}

#[test]
fn service_trims_title_and_rejects_blank() {
    let conn = open_db_in_memory().unwrap();
    register(&conn, "maria");

    let service = ProjectService::new(SqliteProjectRepository::try_new(&conn).unwrap());
    let project = service.create_project("  Night Drive  ", "maria").unwrap();
    assert_eq!(project.title, "Night Drive");

    let err = service.create_project("   ", "maria").unwrap_err();
    assert!(matches!(err, ProjectServiceError::InvalidTitle));
}

fn register(conn: &Connection, username: &str) {
    let users = SqliteUserRepository::try_new(conn).unwrap();
    users
        .create_user(&NewUser {
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{username}@example.com"),
        })
        .unwrap();
}

fn create_project(conn: &Connection, title: &str, owner: &str) -> Project {
    let repo = SqliteProjectRepository::try_new(conn).unwrap();
    repo.create_project(title, owner).unwrap()
}

fn add_contributor(conn: &Connection, project_id: i64, username: &str) {
    conn.execute(
        "INSERT INTO cowrites (project_id, username, is_owner) VALUES (?1, ?2, 0);",
        rusqlite::params![project_id, username],
    )
    .unwrap();
}

fn backdate_project(conn: &Connection, project_id: i64, updated_at: i64) {
    conn.execute(
        "UPDATE projects SET updated_at = ?1 WHERE id = ?2;",
        rusqlite::params![updated_at, project_id],
    )
    .unwrap();
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
