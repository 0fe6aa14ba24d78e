//! End-to-end tests through the full router.
//!
//! Each test builds its own app over a fresh in-memory SQLite database and a
//! temporary video directory. A [`Browser`] keeps the cookies the server sets,
//! so separate browsers model separate visitors.

use std::{
    collections::HashMap,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    AppState, build_app,
    config::AppConfig,
    db::{DbError, DbResult, VideoRepo},
    models::{NewVideo, Video, VideoCursor},
    retention::VideoCleanup,
};

const ADMIN_EMAIL: &str = "admin@cinebaby.app";
const ADMIN_PASSWORD: &str = "admin-password";
const CRON_TOKEN: &str = "cron-token";
const PUBLIC_BASE: &str = "https://cinebaby.test";

fn admin_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| crate::auth::hash_password(ADMIN_PASSWORD).unwrap())
}

struct TestApp {
    app: Router,
    state: AppState,
    video_dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let db_id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let video_dir = TempDir::new().unwrap();

        let config_str = format!(
            r#"
[server]
public_base_url = "{PUBLIC_BASE}"

[database]
type = "sqlite"
path = "file:cinebaby_e2e_{db_id}?mode=memory&cache=shared"
create_if_missing = true
run_migrations = true
wal_mode = false
busy_timeout_ms = 5000

[storage.videos]
backend = "filesystem"

[storage.videos.filesystem]
path = "{video_path}"

[retention]
max_age_months = 3
trigger_token = "{CRON_TOKEN}"

[auth]
session_secret = "e2e-session-secret-0123456789abcdef"
secure_cookies = false

[auth.admin]
email = "{ADMIN_EMAIL}"
password_hash = "{hash}"
"#,
            video_path = video_dir.path().display(),
            hash = admin_hash(),
        );

        let config = AppConfig::from_str(&config_str).expect("test config should parse");
        let state = AppState::new(config.clone())
            .await
            .expect("state should build");
        let app = build_app(&config, state.clone());

        Self {
            app,
            state,
            video_dir,
        }
    }

    fn browser(&self) -> Browser {
        Browser {
            app: self.app.clone(),
            jar: HashMap::new(),
        }
    }

    async fn admin(&self) -> Browser {
        let mut browser = self.browser();
        let (status, _) = browser
            .post(
                "/api/auth/admin/login",
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        browser
    }

    /// Create a clinic as admin and return its id.
    async fn clinic(&self, admin: &mut Browser, email: &str) -> Uuid {
        let (status, body) = admin
            .post(
                "/api/clinics",
                json!({
                    "name": "Clínica Aurora",
                    "city": "Recife",
                    "address": "Rua das Flores, 10",
                    "phone": "81 3333-0000",
                    "email": email,
                    "password": "clinic-pass",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn clinic_browser(&self, email: &str) -> Browser {
        let mut browser = self.browser();
        let (status, body) = browser
            .post(
                "/api/auth/clinic/login",
                json!({ "email": email, "password": "clinic-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        browser
    }

    fn stored_file(&self, file_url: &str) -> std::path::PathBuf {
        let key = file_url.rsplit('/').next().unwrap();
        self.video_dir.path().join(key)
    }
}

/// A visitor with its own cookie jar.
struct Browser {
    app: Router,
    jar: HashMap<String, String>,
}

impl Browser {
    fn cookie_header(&self) -> String {
        self.jar
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn store_cookies(&mut self, response: &axum::response::Response) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = value.to_str().unwrap();
            let pair = raw.split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            let removed = value.is_empty() || raw.contains("Max-Age=0");
            if removed {
                self.jar.remove(name);
            } else {
                self.jar.insert(name.to_string(), value.to_string());
            }
        }
    }

    async fn send(&mut self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        self.store_cookies(&response);
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, self.cookie_header())
    }

    async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn delete(&mut self, uri: &str) -> (StatusCode, Value) {
        let request = self.request("DELETE", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn json(&mut self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = self
            .request(method, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json("POST", uri, body).await
    }

    async fn patch(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json("PATCH", uri, body).await
    }

    async fn upload(
        &mut self,
        patient_id: Uuid,
        title: Option<&str>,
        file: Option<(&str, &str)>,
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "cinebaby-boundary";
        let mut body = Vec::new();
        if let Some(title) = title {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: video/mp4\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = self
            .request("POST", &format!("/api/patients/{patient_id}/videos"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

async fn create_patient(browser: &mut Browser, clinic_id: Uuid, name: &str) -> Uuid {
    let (status, body) = browser
        .post(
            &format!("/api/clinics/{clinic_id}/patients"),
            json!({ "name": name, "phone": "81 99999-0000" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().parse().unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_database_and_storage() {
    let app = TestApp::new().await;
    let (status, body) = app.browser().get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["subsystems"]["storage"], "filesystem");

    let (status, _) = app.browser().get("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.browser().get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Authentication and sessions
// =============================================================================

#[tokio::test]
async fn test_admin_login_rejects_wrong_password() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    let (status, body) = browser
        .post(
            "/api/auth/admin/login",
            json!({ "email": ADMIN_EMAIL, "password": "nope" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "unauthorized");
    assert!(browser.jar.is_empty());
}

#[tokio::test]
async fn test_admin_login_and_logout() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;

    let (status, body) = admin.get("/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_clinics"], 0);

    let (status, body) = admin.post("/api/auth/admin/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect_to"], "/");

    let (status, _) = admin.get("/api/stats").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_apis_require_admin_cookie() {
    let app = TestApp::new().await;
    let (status, _) = app.browser().get("/api/clinics").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut admin = app.admin().await;
    app.clinic(&mut admin, "aurora@clinic.com").await;
    let mut clinic = app.clinic_browser("aurora@clinic.com").await;
    let (status, body) = clinic.get("/api/clinics").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "forbidden");
}

#[tokio::test]
async fn test_clinic_login_normalizes_email() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;

    let mut browser = app.browser();
    let (status, body) = browser
        .post(
            "/api/auth/clinic/login",
            json!({ "email": "  Aurora@Clinic.com ", "password": "clinic-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clinic"]["id"], clinic_id.to_string());
    assert_eq!(body["redirect_to"], "/clinica/dashboard");
    assert!(browser.jar.contains_key("clinicaLogada"));

    let (status, _) = app
        .browser()
        .post(
            "/api/auth/clinic/login",
            json!({ "email": "aurora@clinic.com", "password": "wrong-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_resolution_for_clinic() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let mut clinic = app.clinic_browser("aurora@clinic.com").await;

    let (_, body) = clinic.get("/api/session?path=/admin/dashboard").await;
    assert_eq!(body["actor"]["kind"], "clinic_session");
    assert_eq!(body["redirect_to"], "/clinica/dashboard");
    assert_eq!(body["acting_clinic_id"], clinic_id.to_string());

    let (_, body) = clinic.get("/api/session?path=/clinica/dashboard").await;
    assert_eq!(body["redirect_to"], Value::Null);

    let (_, body) = clinic.post("/api/session/logout", json!({})).await;
    assert_eq!(body["redirect_to"], "/");
    let (_, body) = clinic.get("/api/session?path=/clinica/dashboard").await;
    assert_eq!(body["actor"]["kind"], "unauthenticated");
    assert_eq!(body["redirect_to"], "/");
}

#[tokio::test]
async fn test_tampered_clinic_cookie_is_rejected() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    app.clinic(&mut admin, "aurora@clinic.com").await;
    let mut clinic = app.clinic_browser("aurora@clinic.com").await;

    let forged = clinic.jar["clinicaLogada"].replace('.', ".x");
    clinic.jar.insert("clinicaLogada".into(), forged);

    let (_, body) = clinic.get("/api/session?path=/clinica/dashboard").await;
    assert_eq!(body["actor"]["kind"], "unauthenticated");
    assert_eq!(body["redirect_to"], "/");
    assert!(!clinic.jar.contains_key("clinicaLogada"));
}

#[tokio::test]
async fn test_admin_view_as_clinic() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;

    let (status, body) = admin
        .post(&format!("/api/session/view-as/{clinic_id}"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["redirect_to"],
        format!("/admin/clinica/{clinic_id}/pacientes")
    );

    let (_, body) = admin.get("/api/session?path=/admin/clinica").await;
    assert_eq!(body["actor"]["kind"], "admin_session");
    assert_eq!(body["acting_clinic_id"], clinic_id.to_string());

    let (_, body) = admin.delete("/api/session/view-as").await;
    assert_eq!(body["redirect_to"], "/admin/dashboard");
    let (_, body) = admin.get("/api/session?path=/admin/clinica").await;
    assert_eq!(body["acting_clinic_id"], Value::Null);

    let (status, _) = admin
        .post(&format!("/api/session/view-as/{}", Uuid::new_v4()), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Clinics and patients
// =============================================================================

#[tokio::test]
async fn test_duplicate_clinic_email_conflicts() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    app.clinic(&mut admin, "aurora@clinic.com").await;

    let (status, body) = admin
        .post(
            "/api/clinics",
            json!({
                "name": "Outra",
                "city": "Olinda",
                "address": "Rua B",
                "phone": "81",
                "email": "AURORA@clinic.com",
                "password": "another",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "conflict");
}

#[tokio::test]
async fn test_clinic_validation_errors() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let (status, _) = admin
        .post(
            "/api/clinics",
            json!({
                "name": "  ",
                "city": "Recife",
                "address": "Rua",
                "phone": "81",
                "email": "not-an-email",
                "password": "123",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_clinic_password() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;

    let (status, body) = admin
        .patch(
            &format!("/api/clinics/{clinic_id}"),
            json!({ "city": "Olinda", "password": "new-secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "Olinda");

    let (status, _) = app
        .browser()
        .post(
            "/api/auth/clinic/login",
            json!({ "email": "aurora@clinic.com", "password": "new-secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_clinic_sees_only_its_own_patients() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let aurora = app.clinic(&mut admin, "aurora@clinic.com").await;
    let boreal = app.clinic(&mut admin, "boreal@clinic.com").await;

    let mut clinic = app.clinic_browser("aurora@clinic.com").await;
    let patient = create_patient(&mut clinic, aurora, "Maria Silva").await;
    create_patient(&mut clinic, aurora, "Ana Souza").await;

    let (status, _) = clinic.get(&format!("/api/clinics/{boreal}/patients")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = clinic
        .get(&format!("/api/clinics/{aurora}/patients?search=maria"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], patient.to_string());

    let (_, body) = clinic.get(&format!("/api/clinics/{aurora}/stats")).await;
    assert_eq!(body["total_patients"], 2);
    assert_eq!(body["patients_today"], 2);

    let mut other = app.clinic_browser("boreal@clinic.com").await;
    let (status, _) = other.get(&format!("/api/patients/{patient}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_and_get_patient() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;

    let (status, body) = admin
        .patch(
            &format!("/api/patients/{patient}"),
            json!({ "name": "Maria Silva" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Maria Silva");

    let (status, _) = admin.get(&format!("/api/patients/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Videos
// =============================================================================

#[tokio::test]
async fn test_upload_serve_and_delete_video() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let mut clinic = app.clinic_browser("aurora@clinic.com").await;
    let patient = create_patient(&mut clinic, clinic_id, "Maria").await;

    let (status, video) = clinic
        .upload(patient, Some("Morfológico"), Some(("scan.MP4", "fake video")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{video}");
    assert_eq!(video["title"], "Morfológico");
    assert_eq!(video["clinic_id"], clinic_id.to_string());

    let file_url = video["file_url"].as_str().unwrap();
    assert!(file_url.starts_with(&format!("{PUBLIC_BASE}/media/videos/{patient}-")));
    assert!(file_url.ends_with(".mp4"));
    let stored = app.stored_file(file_url);
    assert_eq!(std::fs::read(&stored).unwrap(), b"fake video");

    let path = file_url.trim_start_matches(PUBLIC_BASE);
    let response = app
        .app
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = clinic.get(&format!("/api/patients/{patient}/videos")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let video_id = video["id"].as_str().unwrap();
    let (status, _) = clinic.delete(&format!("/api/videos/{video_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!stored.exists());

    let (status, _) = clinic.delete(&format!("/api/videos/{video_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_requires_file() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;

    let (status, body) = admin.upload(patient, Some("Sem arquivo"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "bad_request");

    let (status, _) = admin.upload(patient, None, Some(("empty.mp4", ""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_for_other_clinic_is_forbidden() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    app.clinic(&mut admin, "aurora@clinic.com").await;
    let boreal = app.clinic(&mut admin, "boreal@clinic.com").await;
    let patient = create_patient(&mut admin, boreal, "Joana").await;

    let mut clinic = app.clinic_browser("aurora@clinic.com").await;
    let (status, _) = clinic
        .upload(patient, None, Some(("scan.mp4", "data")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(std::fs::read_dir(app.video_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_delete_patient_removes_videos() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;

    let (_, first) = admin.upload(patient, None, Some(("a.mp4", "one"))).await;
    // Object keys carry the upload millisecond.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (_, second) = admin.upload(patient, None, Some(("b.webm", "two"))).await;
    let files = [
        app.stored_file(first["file_url"].as_str().unwrap()),
        app.stored_file(second["file_url"].as_str().unwrap()),
    ];
    assert!(files.iter().all(|f| f.exists()));

    let (status, body) = admin.delete(&format!("/api/patients/{patient}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_videos"], 2);
    assert!(files.iter().all(|f| !f.exists()));

    let (status, _) = admin.get(&format!("/api/patients/{patient}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Public pages
// =============================================================================

#[tokio::test]
async fn test_public_page_requires_consent() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;
    admin
        .upload(patient, Some("Primeiro"), Some(("a.mp4", "one")))
        .await;

    let mut visitor = app.browser();
    let (status, body) = visitor.get(&format!("/api/public/patients/{patient}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "consent_required");
    assert_eq!(body["patient_name"], "Maria");
    assert_eq!(body["clinic_name"], "Clínica Aurora");
    assert!(body.get("videos").is_none());

    let (status, body) = visitor
        .get(&format!("/api/public/patients/{patient}?consent=accepted"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["videos"].as_array().unwrap().len(), 1);
    assert_eq!(body["videos"][0]["title"], "Primeiro");
}

#[tokio::test]
async fn test_public_page_unknown_patient() {
    let app = TestApp::new().await;
    let mut visitor = app.browser();
    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let (status, body) = visitor
            .get(&format!("/api/public/patients/{id}?consent=accepted"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["state"], "not_found");
    }
}

#[tokio::test]
async fn test_printable_card() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;

    let (status, body) = app
        .browser()
        .get(&format!("/api/public/patients/{patient}/card"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let public_url = format!("{PUBLIC_BASE}/paciente/{patient}");
    assert_eq!(body["public_url"], public_url);
    let qr = url::Url::parse(body["qr_code_url"].as_str().unwrap()).unwrap();
    let data = qr
        .query_pairs()
        .find(|(k, _)| k == "data")
        .map(|(_, v)| v.into_owned());
    assert_eq!(data, Some(public_url));

    let (status, _) = app
        .browser()
        .get(&format!("/api/public/patients/{}/card", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Retention trigger
// =============================================================================

#[tokio::test]
async fn test_cleanup_trigger_requires_token() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    let (status, body) = browser
        .post("/functions/cleanup-old-videos", json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_cleanup_preflight() {
    let app = TestApp::new().await;
    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/functions/cleanup-old-videos")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cleanup_browser_preflight_bypasses_server_cors() {
    let app = TestApp::new().await;
    assert!(app.state.config.server.cors.enabled);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/functions/cleanup-old-videos")
                .header(header::ORIGIN, "https://scheduler.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization, apikey")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "authorization, x-client-info, apikey, content-type"
    );
}

#[tokio::test]
async fn test_api_preflight_still_uses_server_cors() {
    let app = TestApp::new().await;
    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/session")
                .header(header::ORIGIN, "https://scheduler.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(
        response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS)
    );
}

#[tokio::test]
async fn test_cleanup_trigger_removes_old_videos() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;

    let (_, fresh) = admin
        .upload(patient, Some("Recente"), Some(("new.mp4", "new")))
        .await;

    let old_file = app.video_dir.path().join(format!("{patient}-1.mp4"));
    std::fs::write(&old_file, b"old").unwrap();
    let videos = app.state.db.as_ref().unwrap().videos();
    videos
        .create(NewVideo {
            patient_id: patient,
            clinic_id,
            title: Some("Antigo".into()),
            file_url: Some(format!("{PUBLIC_BASE}/media/videos/{patient}-1.mp4")),
            created_at: Some(Utc::now() - Duration::days(200)),
        })
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/functions/cleanup-old-videos")
        .header(header::AUTHORIZATION, format!("Bearer {CRON_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.browser().send(request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["totalFound"], 1);
    assert_eq!(body["deletedRecords"], 1);
    assert_eq!(body["deletedFiles"], 1);
    assert!(body["cutoffDate"].as_str().unwrap().ends_with('Z'));
    assert!(!old_file.exists());

    let remaining = videos.list_by_patient(patient).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id.to_string(), fresh["id"].as_str().unwrap());

    let request = Request::builder()
        .method("POST")
        .uri("/functions/cleanup-old-videos")
        .header(header::AUTHORIZATION, format!("Bearer {CRON_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = app.browser().send(request).await;
    assert_eq!(body["message"], "No old videos found");
    assert_eq!(body["totalFound"], 0);
}

/// Video repository whose retention query always fails.
struct UnreachableCandidates(Arc<dyn VideoRepo>);

#[async_trait]
impl VideoRepo for UnreachableCandidates {
    async fn create(&self, input: NewVideo) -> DbResult<Video> {
        self.0.create(input).await
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Video>> {
        self.0.get_by_id(id).await
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> DbResult<Vec<Video>> {
        self.0.list_by_patient(patient_id).await
    }

    async fn count(&self) -> DbResult<i64> {
        self.0.count().await
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        self.0.delete(id).await
    }

    async fn list_created_before(
        &self,
        _cutoff: DateTime<Utc>,
        _after: Option<VideoCursor>,
        _limit: i64,
    ) -> DbResult<Vec<Video>> {
        Err(DbError::Internal("connection refused".into()))
    }
}

#[tokio::test]
async fn test_cleanup_trigger_reports_query_failure() {
    let app = TestApp::new().await;
    let mut admin = app.admin().await;
    let clinic_id = app.clinic(&mut admin, "aurora@clinic.com").await;
    let patient = create_patient(&mut admin, clinic_id, "Maria").await;

    let old_file = app.video_dir.path().join(format!("{patient}-1.mp4"));
    std::fs::write(&old_file, b"old").unwrap();
    let videos = app.state.db.as_ref().unwrap().videos();
    videos
        .create(NewVideo {
            patient_id: patient,
            clinic_id,
            title: Some("Antigo".into()),
            file_url: Some(format!("{PUBLIC_BASE}/media/videos/{patient}-1.mp4")),
            created_at: Some(Utc::now() - Duration::days(200)),
        })
        .await
        .unwrap();

    let mut state = app.state.clone();
    state.cleanup = Some(VideoCleanup::new(
        Arc::new(UnreachableCandidates(videos.clone())),
        state.blobs.clone().unwrap(),
        state.config.retention.clone(),
    ));
    let router = build_app(&state.config, state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/functions/cleanup-old-videos")
                .header(header::AUTHORIZATION, format!("Bearer {CRON_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body,
        json!({ "success": false, "error": "Internal error: connection refused" })
    );

    assert!(old_file.exists());
    assert_eq!(videos.list_by_patient(patient).await.unwrap().len(), 1);
}
