use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use policlinico_auth::{Requirement, Role, User, evaluate};
use policlinico_client::{
    ApiClient, ApiError, AuthClient, AuthError, Locations, MemoryStore, NavigationLog,
    SessionStore, SessionVerification,
};
use policlinico_core::{Resource, UserId};
use serde_json::{Value, json};

const GOOD_TOKEN: &str = "tok-abc";

#[derive(Debug, Clone)]
struct Hit {
    path: &'static str,
    authorization: Option<String>,
    request_id: Option<String>,
}

#[derive(Clone, Default)]
struct Mock {
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl Mock {
    fn record(&self, path: &'static str, headers: &HeaderMap) -> Option<String> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let authorization = header("authorization");
        self.hits.lock().unwrap().push(Hit {
            path,
            authorization: authorization.clone(),
            request_id: header("x-request-id"),
        });
        authorization.and_then(|v| v.strip_prefix("Bearer ").map(str::to_string))
    }

    fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn user_json(with_permissions: bool) -> Value {
    let mut user = json!({
        "id": 7,
        "nombre": "Marta Rojas",
        "email": "marta@policlinico.cl",
        "rol": "admision",
        "activo": true
    });
    if with_permissions {
        user["permisos"] = json!(["patients.view", "exams.view"]);
    }
    user
}

async fn login(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    mock.record("/auth/login", &headers);
    if body["password"] == "secreto" {
        Json(json!({ "user": user_json(false), "token": GOOD_TOKEN, "expires_in": 3600 }))
            .into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Credenciales inválidas")
    }
}

async fn profile(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    match mock.record("/auth/profile", &headers).as_deref() {
        Some(GOOD_TOKEN) => Json(json!({ "user": user_json(true) })).into_response(),
        _ => error(StatusCode::UNAUTHORIZED, "Token inválido"),
    }
}

async fn verify(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let valid = mock.record("/auth/verify", &headers).as_deref() == Some(GOOD_TOKEN);
    Json(json!({ "valid": valid })).into_response()
}

async fn logout(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    mock.record("/auth/logout", &headers);
    error(StatusCode::INTERNAL_SERVER_ERROR, "base de datos no disponible")
}

async fn pacientes(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    match mock.record("/pacientes", &headers).as_deref() {
        Some(GOOD_TOKEN) => Json(json!([{ "id": 1, "nombre": "Juan Pérez" }])).into_response(),
        _ => error(StatusCode::UNAUTHORIZED, "Token expirado"),
    }
}

async fn empresas(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    mock.record("/empresas", &headers);
    error(StatusCode::FORBIDDEN, "Sin permiso para ver empresas")
}

struct TestServer {
    base_url: String,
    mock: Mock,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let mock = Mock::default();
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/profile", get(profile))
            .route("/api/auth/verify", get(verify))
            .route("/api/auth/logout", post(logout))
            .route("/api/pacientes", get(pacientes))
            .route("/api/empresas", get(empresas))
            .with_state(mock.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            mock,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Client {
    store: SessionStore,
    api: ApiClient,
    auth: AuthClient,
    log: Arc<NavigationLog>,
}

fn client(server: &TestServer) -> Client {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let api = ApiClient::new(&server.base_url, Duration::from_secs(5), store.clone()).unwrap();
    let log = Arc::new(NavigationLog::new());
    let auth = AuthClient::new(
        Arc::new(api.clone()),
        store.clone(),
        log.clone(),
        Locations::default(),
    );
    Client {
        store,
        api,
        auth,
        log,
    }
}

fn seed_session(store: &SessionStore, token: &str) {
    let user = User::new(UserId::new(7), "Marta Rojas", "marta@policlinico.cl", Role::Admission);
    store.set_session(user, token).unwrap();
}

#[tokio::test]
async fn login_loads_profile_permissions() {
    let server = TestServer::spawn().await;
    let c = client(&server);

    let session = c.auth.login("marta@policlinico.cl", "secreto").await.unwrap();

    assert_eq!(session.token, GOOD_TOKEN);
    assert_eq!(session.role(), Role::Admission);
    assert!(evaluate(&Requirement::single("patients.view"), Some(&session)));
    assert!(!evaluate(&Requirement::single("companies.view"), Some(&session)));
    assert!(c.auth.token_lifetime().is_some());

    let hits = server.mock.hits();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/auth/login");
    assert_eq!(hits[0].authorization, None);
    assert_eq!(hits[1].path, "/auth/profile");
    assert_eq!(hits[1].authorization.as_deref(), Some("Bearer tok-abc"));
    assert!(hits.iter().all(|h| h.request_id.is_some()));
    assert_ne!(hits[0].request_id, hits[1].request_id);
}

#[tokio::test]
async fn wrong_password_surfaces_server_message() {
    let server = TestServer::spawn().await;
    let c = client(&server);

    let err = c.auth.login("marta@policlinico.cl", "otra").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials(ref m) if m == "Credenciales inválidas"));
    assert!(c.store.get_session().is_none());
}

#[tokio::test]
async fn list_sends_bearer_token() {
    let server = TestServer::spawn().await;
    let c = client(&server);
    seed_session(&c.store, GOOD_TOKEN);

    let rows: Vec<Value> = c.api.list(Resource::Pacientes).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["nombre"], "Juan Pérez");
    let hits = server.mock.hits();
    assert_eq!(hits[0].authorization.as_deref(), Some("Bearer tok-abc"));
}

#[tokio::test]
async fn error_responses_carry_server_message() {
    let server = TestServer::spawn().await;
    let c = client(&server);
    seed_session(&c.store, GOOD_TOKEN);

    let err = c.api.list::<Value>(Resource::Empresas).await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(err.to_string(), "Sin permiso para ver empresas");
    // A 403 is not a reason to sign out.
    let err = c.auth.intercept(Err::<(), _>(err)).await.unwrap_err();
    assert!(!err.is_unauthorized());
    assert!(c.store.get_session().is_some());
}

#[tokio::test]
async fn unauthorized_response_signs_out() {
    let server = TestServer::spawn().await;
    let c = client(&server);
    seed_session(&c.store, "tok-expired");

    let result = c.auth.intercept(c.api.list::<Value>(Resource::Pacientes).await).await;

    assert!(matches!(result, Err(ApiError::Unauthorized { ref message }) if message == "Token expirado"));
    assert!(c.store.get_session().is_none());
    assert_eq!(c.log.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn logout_clears_when_server_fails() {
    let server = TestServer::spawn().await;
    let c = client(&server);
    seed_session(&c.store, GOOD_TOKEN);

    c.auth.logout().await;

    let hits = server.mock.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/auth/logout");
    assert_eq!(hits[0].authorization.as_deref(), Some("Bearer tok-abc"));
    assert!(c.store.get_session().is_none());
    assert_eq!(c.log.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn verify_session_round_trip() {
    let server = TestServer::spawn().await;

    let good = client(&server);
    seed_session(&good.store, GOOD_TOKEN);
    assert!(matches!(
        good.auth.verify_session().await,
        SessionVerification::Verified(_)
    ));

    let revoked = client(&server);
    seed_session(&revoked.store, "tok-revoked");
    assert_eq!(revoked.auth.verify_session().await, SessionVerification::Rejected);
    assert!(revoked.store.get_session().is_none());
}
