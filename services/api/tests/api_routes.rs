//! services/api/tests/api_routes.rs
//!
//! Drives the real router over the in-memory store.

use api_lib::{
    config::Config,
    web::{auth::hash_password, build_router, state::AppState},
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::Level;
use training_den_core::domain::{NewUser, UserChanges};
use training_den_core::{DatabaseService, InMemoryStore, Role, User};
use uuid::Uuid;

//=========================================================================================
// Harness
//=========================================================================================

struct TestApp {
    router: Router,
    db: Arc<InMemoryStore>,
}

struct Caller {
    user: User,
    cookie: String,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        log_level: Level::INFO,
        cors_origin: "http://localhost:3000".to_string(),
        session_ttl_days: 30,
        cookie_secure: false,
    }
}

impl TestApp {
    fn new() -> Self {
        let db = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::new(db.clone(), Arc::new(test_config())));
        Self {
            router: build_router(state),
            db,
        }
    }

    /// Seeds an active user with password `password1` and a live session.
    async fn seed(&self, role: Role, first: &str, last: &str) -> Caller {
        let user = self
            .db
            .create_user_with_credentials(
                NewUser {
                    email: format!("{}.{}@example.com", first, last).to_lowercase(),
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    role,
                    phone: None,
                },
                &hash_password("password1").unwrap(),
            )
            .await
            .unwrap();
        let token = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&token, user.id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        Caller {
            user,
            cookie: format!("session={}", token),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json, set_cookie)
    }

    async fn get(&self, uri: &str, who: &Caller) -> (StatusCode, Value) {
        let (status, json, _) = self.send(Method::GET, uri, Some(&who.cookie), None).await;
        (status, json)
    }

    async fn post(&self, uri: &str, who: &Caller, body: Value) -> (StatusCode, Value) {
        let (status, json, _) = self
            .send(Method::POST, uri, Some(&who.cookie), Some(body))
            .await;
        (status, json)
    }
}

/// The session cookie pair (`session=...`) out of a `Set-Cookie` header.
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

/// Admin-created program owned by `manager` with one upcoming session led by `trainer`.
async fn create_program(app: &TestApp, admin: &Caller, manager: &Caller, trainer: &Caller) -> Value {
    let start = (Utc::now() + Duration::days(3)).format("%Y-%m-%dT%H:%M:%S").to_string();
    let deadline = (Utc::now() + Duration::days(10)).format("%Y-%m-%d").to_string();
    let (status, body) = app
        .post(
            "/api/training-programs",
            admin,
            json!({
                "title": "Forklift Safety",
                "manager_id": manager.user.id,
                "deadline": deadline,
                "sessions": [
                    {"session_datetime": start, "duration_minutes": 90, "trainer_id": trainer.user.id}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_live_session() {
    let app = TestApp::new();

    let (status, body, _) = app
        .send(Method::GET, "/api/training-programs", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "You must be logged in to access this resource.");

    let (status, _, _) = app
        .send(
            Method::GET,
            "/api/training-programs",
            Some("session=forged"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_accounts_are_refused_immediately() {
    let app = TestApp::new();
    let employee = app.seed(Role::Employee, "Eve", "Employee").await;

    let (status, _) = app.get("/api/employee/dashboard-stats", &employee).await;
    assert_eq!(status, StatusCode::OK);

    app.db
        .update_user(
            employee.user.id,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = app.get("/api/employee/dashboard-stats", &employee).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Your account is inactive.");
}

#[tokio::test]
async fn role_is_reread_on_every_request() {
    let app = TestApp::new();
    let user = app.seed(Role::Admin, "Ada", "Admin").await;

    let (status, _) = app.get("/api/admin/dashboard-stats", &user).await;
    assert_eq!(status, StatusCode::OK);

    app.db
        .update_user(
            user.user.id,
            UserChanges {
                role: Some(Role::Employee),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = app.get("/api/admin/dashboard-stats", &user).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to access this resource."
    );
}

#[tokio::test]
async fn signup_login_and_logout_round_trip() {
    let app = TestApp::new();

    let (status, body, set_cookie) = app
        .send(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "New.Hire@Example.com",
                "password": "hunter22",
                "first_name": "New",
                "last_name": "Hire"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["role"], "employee");
    assert_eq!(body["data"]["email"], "new.hire@example.com");
    let signup_cookie = cookie_pair(&set_cookie.unwrap());

    let (status, _, _) = app
        .send(
            Method::GET,
            "/api/employee/dashboard-stats",
            Some(&signup_cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "new.hire@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, set_cookie) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "new.hire@example.com", "password": "hunter22"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let login_cookie = cookie_pair(&set_cookie.unwrap());

    let (status, _, set_cookie) = app
        .send(Method::POST, "/api/auth/logout", Some(&login_cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(set_cookie.unwrap().contains("Max-Age=0"));

    let (status, _, _) = app
        .send(
            Method::GET,
            "/api/employee/dashboard-stats",
            Some(&login_cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_signup_is_a_bad_request() {
    let app = TestApp::new();
    app.seed(Role::Employee, "Eve", "Employee").await;

    let (status, body, _) = app
        .send(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "eve.employee@example.com",
                "password": "hunter22",
                "first_name": "Eve",
                "last_name": "Again"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new();
    let admin = app.seed(Role::Admin, "Ada", "Admin").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/training-programs")
        .header(header::COOKIE, &admin.cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
            .unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_program_scenario() {
    let app = TestApp::new();
    let admin = app.seed(Role::Admin, "Ada", "Admin").await;
    let manager = app.seed(Role::Manager, "Mia", "Manager").await;
    let trainer = app.seed(Role::Trainer, "Tom", "Trainer").await;
    let employee = app.seed(Role::Employee, "Eve", "Employee").await;

    // Only admins create programs
    let (status, _) = app
        .post("/api/training-programs", &manager, json!({"title": "Nope"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/training-programs",
            &admin,
            json!({
                "title": "Forklift Safety",
                "manager_id": manager.user.id,
                "deadline": "2030-01-01",
                "sessions": [{"duration_minutes": 60, "trainer_id": trainer.user.id}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Session 1 is missing required fields");

    let created = create_program(&app, &admin, &manager, &trainer).await;
    let program_id = created["program"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["sessions"].as_array().unwrap().len(), 1);

    // Listed with the manager's name, within the upcoming window
    let (status, body) = app.get("/api/training-programs?upcoming=true", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["managerName"], "Mia Manager");
    assert_eq!(body["data"][0]["enrollmentCount"], 0);

    // Unassigned employees cannot open it
    let uri = format!("/api/training-programs/{}", program_id);
    let (status, body) = app.get(&uri, &employee).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to access this program."
    );

    // Each role gets its own shape
    let (_, body) = app.get(&uri, &admin).await;
    assert_eq!(body["data"]["view"], "admin");
    let (_, body) = app.get(&uri, &manager).await;
    assert_eq!(body["data"]["view"], "manager");
    assert_eq!(body["data"]["availableEmployees"][0]["fullName"], "Eve Employee");
    let (_, body) = app.get(&uri, &trainer).await;
    assert_eq!(body["data"]["view"], "trainer");
    assert_eq!(body["data"]["sessions"][0]["isOwner"], true);

    // Soft delete hides it from everyone
    let (status, _, _) = app
        .send(Method::DELETE, &uri, Some(&admin.cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&uri, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Training program not found or inactive.");
}

#[tokio::test]
async fn manager_assignment_scenario() {
    let app = TestApp::new();
    let admin = app.seed(Role::Admin, "Ada", "Admin").await;
    let manager = app.seed(Role::Manager, "Mia", "Manager").await;
    let other_manager = app.seed(Role::Manager, "Otto", "Overseer").await;
    let trainer = app.seed(Role::Trainer, "Tom", "Trainer").await;
    let employee = app.seed(Role::Employee, "Eve", "Employee").await;

    let created = create_program(&app, &admin, &manager, &trainer).await;
    let program_id = created["program"]["id"].as_str().unwrap().to_string();
    let session_id = created["sessions"][0]["id"].as_str().unwrap().to_string();
    let assign_uri = format!("/api/programs/{}/assign", program_id);
    let enroll_uri = format!("/api/sessions/{}/enroll", session_id);

    // Enrollment requires an assignment
    let (status, body) = app.post(&enroll_uri, &employee, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You must be assigned to this program to enroll in sessions"
    );

    // Only the owning manager assigns
    let (status, _) = app
        .post(&assign_uri, &other_manager, json!({"employeeId": employee.user.id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&assign_uri, &manager, json!({"employeeId": employee.user.id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["employee"]["fullName"], "Eve Employee");

    // Assigning twice is rejected
    let (status, body) = app
        .post(&assign_uri, &manager, json!({"employeeId": employee.user.id}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Employee is already assigned to this program");

    // Enroll without a body
    let (status, body, _) = app
        .send(Method::POST, &enroll_uri, Some(&employee.cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["completed"], false);

    let (_, body) = app
        .get(&format!("/api/training-programs/{}", program_id), &employee)
        .await;
    assert_eq!(body["data"]["view"], "employee");
    assert_eq!(body["data"]["stats"]["enrolled"], 1);

    // Removing the assignment drops the enrollment with it
    let (status, body, _) = app
        .send(
            Method::DELETE,
            &format!("{}/{}", assign_uri, employee.user.id),
            Some(&manager.cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enrollments_removed"], 1);

    let (status, _) = app.post(&enroll_uri, &employee, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completion_cannot_be_reverted() {
    let app = TestApp::new();
    let admin = app.seed(Role::Admin, "Ada", "Admin").await;
    let manager = app.seed(Role::Manager, "Mia", "Manager").await;
    let trainer = app.seed(Role::Trainer, "Tom", "Trainer").await;
    let employee = app.seed(Role::Employee, "Eve", "Employee").await;

    let created = create_program(&app, &admin, &manager, &trainer).await;
    let program_id = created["program"]["id"].as_str().unwrap().to_string();
    let session_id = created["sessions"][0]["id"].as_str().unwrap().to_string();
    app.post(
        &format!("/api/programs/{}/assign", program_id),
        &manager,
        json!({"employeeId": employee.user.id}),
    )
    .await;
    let (_, body) = app
        .post(
            &format!("/api/sessions/{}/enroll", session_id),
            &employee,
            json!({"notes": "first row"}),
        )
        .await;
    let enrollment_uri = format!("/api/enrollments/{}", body["data"]["id"].as_str().unwrap());

    let (status, body, _) = app
        .send(
            Method::PATCH,
            &enrollment_uri,
            Some(&trainer.cookie),
            Some(json!({"completed": false})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Can only mark enrollments as complete, not incomplete"
    );

    let (status, body, _) = app
        .send(
            Method::PATCH,
            &enrollment_uri,
            Some(&trainer.cookie),
            Some(json!({"completed": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);
    assert!(body["data"]["completion_date"].is_string());
    assert_eq!(body["data"]["notes"], "first row");

    let (status, body, _) = app
        .send(
            Method::DELETE,
            &format!("/api/sessions/{}/enroll", session_id),
            Some(&employee.cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot unenroll from completed sessions");

    let (status, body) = app.get("/api/stats/completion-rates", &trainer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rate"], 100.0);
}

#[tokio::test]
async fn stats_are_scoped_to_the_caller() {
    let app = TestApp::new();
    let admin = app.seed(Role::Admin, "Ada", "Admin").await;
    let trainer = app.seed(Role::Trainer, "Tom", "Trainer").await;
    let other_trainer = app.seed(Role::Trainer, "Tess", "Tutor").await;
    let employee = app.seed(Role::Employee, "Eve", "Employee").await;

    let (status, _) = app
        .get(
            &format!("/api/stats/sessions?trainerId={}", other_trainer.user.id),
            &trainer,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .get(
            &format!("/api/stats/sessions?trainerId={}", trainer.user.id),
            &trainer,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["activeSessions"], 0);

    let (status, _) = app.get("/api/stats/programs", &employee).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/admin/dashboard-stats", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["trainers"], 2);
    assert_eq!(body["data"]["employees"], 1);
}

#[tokio::test]
async fn user_directory_and_administration() {
    let app = TestApp::new();
    let admin = app.seed(Role::Admin, "Ada", "Admin").await;
    let employee = app.seed(Role::Employee, "Eve", "Employee").await;
    app.seed(Role::Trainer, "Tom", "Trainer").await;

    let (status, body) = app.get("/api/users?search=TOM", &employee).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["initials"], "TT");

    let (status, body) = app.get("/api/users/by-role/wizard", &employee).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid role");

    let (status, _) = app
        .post(
            "/api/users",
            &employee,
            json!({"email": "x@example.com", "first_name": "X", "last_name": "Y",
                   "role": "trainer", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/users",
            &admin,
            json!({"email": "tina.teach@example.com", "first_name": "Tina", "last_name": "Teach",
                   "role": "trainer", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["role"], "trainer");

    let (status, _, _) = app
        .send(
            Method::DELETE,
            &format!("/api/users/{}", admin.user.id),
            Some(&admin.cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body, _) = app
        .send(
            Method::DELETE,
            &format!("/api/users/{}", employee.user.id),
            Some(&admin.cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, _) = app.get("/api/users", &employee).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
