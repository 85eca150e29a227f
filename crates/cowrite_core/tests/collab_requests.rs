use cowrite_core::db::open_db_in_memory;
use cowrite_core::{
    CollabService, CollabServiceError, ErrorKind, NewUser, Project, ProjectRepository,
    RequestRepoError, RequestRepository, RequestResponseError, RequestState,
    SqliteProjectRepository, SqliteRequestRepository, SqliteUserRepository,
};
use rusqlite::Connection;

#[test]
fn make_request_starts_pending() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = repo.make_request(project.id, "maria", "jo").unwrap();

    assert_eq!(request.project_id, project.id);
    assert_eq!(request.sender, "maria");
    assert_eq!(request.recipient, "jo");
    assert_eq!(request.state, RequestState::Pending);
    assert!(request.sent_at > 0);
}

#[test]
fn duplicate_pending_request_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    repo.make_request(project.id, "maria", "jo").unwrap();

    let err = repo.make_request(project.id, "maria", "jo").unwrap_err();
    assert!(matches!(
        err,
        RequestRepoError::AlreadyPending {
            project_id,
            ref sender,
            ref recipient,
        } if project_id == project.id && sender == "maria" && recipient == "jo"
    ));
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.kind().as_str(), "bad_request");
}

#[test]
fn resolved_request_does_not_block_a_fresh_one() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let first = repo.make_request(project.id, "maria", "jo").unwrap();
    repo.reject(first.id).unwrap();

    let second = repo.make_request(project.id, "maria", "jo").unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.state, RequestState::Pending);
}

#[test]
fn make_request_rejects_unknown_sender() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let err = repo.make_request(project.id, "ghost", "jo").unwrap_err();
    assert!(matches!(err, RequestRepoError::UnknownSender(name) if name == "ghost"));
}

#[test]
fn make_request_rejects_unknown_recipient() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let err = repo.make_request(project.id, "maria", "ghost").unwrap_err();
    assert!(matches!(err, RequestRepoError::UnknownRecipient(name) if name == "ghost"));
}

#[test]
fn make_request_rejects_unknown_project() {
    let conn = open_db_in_memory().unwrap();
    seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let err = repo.make_request(42, "maria", "jo").unwrap_err();
    assert!(matches!(err, RequestRepoError::UnknownProject(42)));
}

#[test]
fn get_request_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let err = repo.get_request(42).unwrap_err();
    assert!(matches!(err, RequestRepoError::RequestNotFound(42)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn requests_for_user_lists_newest_first_with_project_context() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo", "sam"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let older = repo.make_request(project.id, "maria", "jo").unwrap();
    backdate_request(&conn, older.id, 1000);
    let newer = repo.make_request(project.id, "sam", "jo").unwrap();

    let inbox = repo.requests_for_user("jo").unwrap();
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].request_id, newer.id);
    assert_eq!(inbox[0].sender, "sam");
    assert_eq!(inbox[0].project_title, "Night Drive");
    assert_eq!(inbox[0].state, RequestState::Pending);
    assert_eq!(inbox[1].request_id, older.id);
    assert_eq!(inbox[1].sent_at, 1000);

    // Requests the user sent do not appear in their inbox.
    assert!(repo.requests_for_user("maria").unwrap().is_empty());
}

#[test]
fn requests_for_unknown_user_is_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let err = repo.requests_for_user("ghost").unwrap_err();
    assert!(matches!(err, RequestRepoError::UserNotFound(name) if name == "ghost"));
}

#[test]
fn requests_for_project_is_scoped_to_that_project() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo", "sam"]);
    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let other = projects.create_project("Side B", "maria").unwrap();

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let first = repo.make_request(project.id, "maria", "jo").unwrap();
    backdate_request(&conn, first.id, 1000);
    let second = repo.make_request(project.id, "maria", "sam").unwrap();
    repo.make_request(other.id, "maria", "jo").unwrap();

    let listed = repo.requests_for_project(project.id).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
    assert!(listed.iter().all(|request| request.project_id == project.id));
}

#[test]
fn requests_for_unknown_project_is_not_found() {
    let conn = open_db_in_memory().unwrap();

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let err = repo.requests_for_project(42).unwrap_err();
    assert!(matches!(err, RequestRepoError::ProjectNotFound(42)));
}

#[test]
fn accept_grants_contributor_membership_and_restamps_project() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);
    backdate_project(&conn, project.id, 1000);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = repo.make_request(project.id, "maria", "jo").unwrap();
    let resolved = repo.accept(request.id).unwrap();
    assert_eq!(resolved.state, RequestState::Accepted);

    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let memberships = projects.memberships_for_project(project.id).unwrap();
    assert_eq!(memberships.len(), 2);
    let granted = memberships
        .iter()
        .find(|membership| membership.username == "jo")
        .unwrap();
    assert!(!granted.is_owner);

    assert!(project_stamp(&conn, project.id) > 1000);
}

#[test]
fn accept_twice_is_already_resolved() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = repo.make_request(project.id, "maria", "jo").unwrap();
    repo.accept(request.id).unwrap();

    let err = repo.accept(request.id).unwrap_err();
    assert!(matches!(err, RequestRepoError::AlreadyResolved(id) if id == request.id));
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[test]
fn rejected_request_cannot_be_accepted_afterwards() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = repo.make_request(project.id, "maria", "jo").unwrap();
    repo.reject(request.id).unwrap();

    let err = repo.accept(request.id).unwrap_err();
    assert!(matches!(err, RequestRepoError::AlreadyResolved(id) if id == request.id));

    let err = repo.reject(request.id).unwrap_err();
    assert!(matches!(err, RequestRepoError::AlreadyResolved(id) if id == request.id));
}

#[test]
fn reject_resolves_without_membership_side_effect() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = repo.make_request(project.id, "maria", "jo").unwrap();
    let resolved = repo.reject(request.id).unwrap();
    assert_eq!(resolved.state, RequestState::Rejected);

    let projects = SqliteProjectRepository::try_new(&conn).unwrap();
    let memberships = projects.memberships_for_project(project.id).unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].username, "maria");
}

#[test]
fn accept_with_existing_membership_rolls_the_transition_back() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let repo = SqliteRequestRepository::try_new(&conn).unwrap();
    let request = repo.make_request(project.id, "maria", "jo").unwrap();

    // The recipient gained a membership through another path while the
    // request sat unanswered.
    conn.execute(
        "INSERT INTO cowrites (project_id, username, is_owner) VALUES (?1, 'jo', 0);",
        [project.id],
    )
    .unwrap();

    let err = repo.accept(request.id).unwrap_err();
    assert!(matches!(
        err,
        RequestRepoError::MembershipConflict { project_id, ref username }
            if project_id == project.id && username == "jo"
    ));
    assert!(err.to_string().starts_with("collaboration could not be made"));

    // The state flip must not survive the failed grant.
    let unchanged = repo.get_request(request.id).unwrap();
    assert_eq!(unchanged.state, RequestState::Pending);
}

#[test]
fn respond_maps_literals_to_transitions() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo", "sam"]);

    let service = CollabService::new(SqliteRequestRepository::try_new(&conn).unwrap());
    let invite_jo = service.make_request(project.id, "maria", "jo").unwrap();
    let invite_sam = service.make_request(project.id, "maria", "sam").unwrap();

    let accepted = service.respond(invite_jo.id, "accept").unwrap();
    assert_eq!(accepted.state, RequestState::Accepted);

    let rejected = service.respond(invite_sam.id, "reject").unwrap();
    assert_eq!(rejected.state, RequestState::Rejected);
}

#[test]
fn respond_rejects_unsupported_literals_before_touching_state() {
    let conn = open_db_in_memory().unwrap();
    let project = seeded_project(&conn, &["maria", "jo"]);

    let service = CollabService::new(SqliteRequestRepository::try_new(&conn).unwrap());
    let request = service.make_request(project.id, "maria", "jo").unwrap();

    let err = service.respond(request.id, "maybe").unwrap_err();
    assert!(matches!(
        err,
        CollabServiceError::InvalidResponse(RequestResponseError::UnsupportedResponse(ref value))
            if value == "maybe"
    ));
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = service.respond(request.id, "  ").unwrap_err();
    assert!(matches!(
        err,
        CollabServiceError::InvalidResponse(RequestResponseError::EmptyResponse)
    ));

    assert_eq!(
        service.get_request(request.id).unwrap().state,
        RequestState::Pending
    );
}

fn seeded_project(conn: &Connection, usernames: &[&str]) -> Project {
    let users = SqliteUserRepository::try_new(conn).unwrap();
    for username in usernames {
        users
            .create_user(&NewUser {
                username: username.to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: format!("{username}@example.com"),
            })
            .unwrap();
    }
    let projects = SqliteProjectRepository::try_new(conn).unwrap();
    projects
        .create_project("Night Drive", usernames[0])
        .unwrap()
}

fn backdate_request(conn: &Connection, request_id: i64, sent_at: i64) {
    conn.execute(
        "UPDATE requests SET sent_at = ?1 WHERE id = ?2;",
        rusqlite::params![sent_at, request_id],
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

fn project_stamp(conn: &Connection, project_id: i64) -> i64 {
    conn.query_row(
        "SELECT updated_at FROM projects WHERE id = ?1;",
        [project_id],
        |row| row.get(0),
    )
    .unwrap()
}
