//! bibliond — the biblion HTTP daemon.
//!
//! Serves the catalog engine over REST:
//!
//! **Sessions:**
//! - `POST /auth/session` — exchange verified identity claims for a token
//! - `GET  /auth/me` — current user
//! - `POST /auth/logout` — invalidate the token
//!
//! **Books:**
//! - `GET    /books` — list with pagination and sort
//! - `POST   /books` — create (staff)
//! - `GET    /books/{id}` — detail with borrower attached
//! - `PUT    /books/{id}` — partial update (staff)
//! - `DELETE /books/{id}` — delete (admin)
//! - `POST   /books/{id}/checkout` — borrow, with staff override
//! - `POST   /books/{id}/checkin` — return (staff)
//! - `GET    /books/{id}/history` — checkout trail (staff)
//!
//! **AI:**
//! - `POST /ai/smart-search` — natural-language search, never fails on
//!   provider trouble
//! - `POST /ai/enrich-book` — metadata enrichment (staff)
//!
//! **Users:**
//! - `GET   /users` — list (admin)
//! - `PATCH /users/{id}/role` — reassign role (admin)
//!
//! **Health:**
//! - `GET /health` — liveness + version
//!
//! Build and run: `cargo run --features server --bin bibliond`

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use biblion::catalog::model::{
    BookId, BookPatch, BookStatus, NewBook, PublicUser, Role, UserId,
};
use biblion::catalog::query::{ListQuery, SortField, SortOrder};
use biblion::catalog::{Catalog, CatalogError, CheckoutRequest};
use biblion::config::ServiceConfig;
use biblion::error::StoreError;
use biblion::paths::BiblionPaths;

// ── Server state ──────────────────────────────────────────────────────────

struct ServerState {
    catalog: Arc<Catalog>,
    sessions: RwLock<HashMap<String, UserId>>,
    production: bool,
}

type ApiError = (StatusCode, Json<serde_json::Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": message.into() }))
}

/// Map a catalog error to its HTTP status. 500 detail is included only
/// outside production mode.
fn catalog_error(state: &ServerState, e: CatalogError) -> ApiError {
    match &e {
        CatalogError::Validation { issues } => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "message": e.to_string(), "issues": issues })),
        ),
        CatalogError::InvalidState { .. } => (StatusCode::BAD_REQUEST, error_body(e.to_string())),
        CatalogError::Unauthenticated => (StatusCode::UNAUTHORIZED, error_body(e.to_string())),
        CatalogError::Forbidden { .. } => (StatusCode::FORBIDDEN, error_body(e.to_string())),
        CatalogError::BookNotFound { .. } | CatalogError::UserNotFound { .. } => {
            (StatusCode::NOT_FOUND, error_body(e.to_string()))
        }
        CatalogError::DuplicateEmail { .. }
        | CatalogError::Store(StoreError::Conflict { .. }) => {
            (StatusCode::CONFLICT, error_body(e.to_string()))
        }
        CatalogError::Store(_) => {
            tracing::error!(error = %e, "store error while handling request");
            let message = if state.production {
                "Internal Server Error".to_string()
            } else {
                e.to_string()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(message))
        }
    }
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %e, "request task failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_body("Internal Server Error"),
    )
}

/// Run a blocking catalog operation off the async runtime.
async fn run_blocking<T, F>(state: &Arc<ServerState>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Catalog) -> Result<T, CatalogError> + Send + 'static,
{
    let catalog = Arc::clone(&state.catalog);
    let outcome = tokio::task::spawn_blocking(move || op(&catalog))
        .await
        .map_err(internal)?;
    let state = Arc::clone(state);
    outcome.map_err(move |e| catalog_error(&state, e))
}

// ── Authentication ────────────────────────────────────────────────────────

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn current_user(
    state: &Arc<ServerState>,
    headers: &HeaderMap,
) -> Result<biblion::catalog::model::User, ApiError> {
    let unauthenticated = || {
        let e = CatalogError::Unauthenticated;
        (StatusCode::UNAUTHORIZED, error_body(e.to_string()))
    };

    let token = bearer_token(headers).ok_or_else(unauthenticated)?;
    let user_id = {
        let sessions = state.sessions.read().await;
        *sessions.get(&token).ok_or_else(unauthenticated)?
    };

    run_blocking(state, move |catalog| {
        catalog
            .store()
            .get_user(user_id)
            .map_err(CatalogError::from)?
            .ok_or(CatalogError::Unauthenticated)
    })
    .await
}

fn new_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

// ── Request/response types ────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize)]
struct SessionRequest {
    email: String,
    name: String,
}

#[derive(Serialize)]
struct SessionResponse {
    token: String,
    user: PublicUser,
}

#[derive(Deserialize)]
struct ListParams {
    q: Option<String>,
    availability: Option<String>,
    genre: Option<String>,
    year: Option<i32>,
    page: Option<usize>,
    limit: Option<usize>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(Deserialize)]
struct CheckoutBody {
    user_id: Option<u64>,
    #[serde(default, rename = "override")]
    override_loan: bool,
}

#[derive(Deserialize)]
struct SmartSearchBody {
    query: Option<String>,
}

#[derive(Deserialize)]
struct EnrichBody {
    book_id: Option<u64>,
}

#[derive(Deserialize)]
struct RoleBody {
    role: String,
}

fn parse_book_id(raw: &str) -> Result<BookId, ApiError> {
    BookId::parse(raw).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            error_body(format!("invalid book id \"{raw}\"")),
        )
    })
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            error_body(format!("invalid user id \"{raw}\"")),
        )
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_session(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<SessionResponse> {
    let user = run_blocking(&state, move |catalog| {
        catalog.login_or_create_user(&req.email, &req.name)
    })
    .await?;

    let token = new_session_token();
    state.sessions.write().await.insert(token.clone(), user.id);

    Ok(Json(SessionResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

async fn me(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ApiResult<PublicUser> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(PublicUser::from(&user)))
}

async fn logout(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.write().await.remove(&token);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn list_books(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<biblion::catalog::query::Page<biblion::catalog::model::Book>> {
    let query = ListQuery {
        q: params.q,
        availability: params.availability.as_deref().and_then(BookStatus::parse),
        genre: params.genre,
        year: params.year,
        page: params.page,
        limit: params.limit,
        sort: params.sort.as_deref().map(SortField::parse).unwrap_or_default(),
        order: params.order.as_deref().map(SortOrder::parse).unwrap_or_default(),
    };
    let page = run_blocking(&state, move |catalog| catalog.list_books(&query)).await?;
    Ok(Json(page))
}

async fn create_book(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(draft): Json<NewBook>,
) -> Result<(StatusCode, Json<biblion::catalog::model::Book>), ApiError> {
    let actor = current_user(&state, &headers).await?;
    let book = run_blocking(&state, move |catalog| catalog.create_book(&actor, draft)).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn get_book(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<biblion::catalog::BookDetail> {
    let id = parse_book_id(&id)?;
    let detail = run_blocking(&state, move |catalog| catalog.book_detail(id)).await?;
    Ok(Json(detail))
}

async fn update_book(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<BookPatch>,
) -> ApiResult<biblion::catalog::model::Book> {
    let id = parse_book_id(&id)?;
    let actor = current_user(&state, &headers).await?;
    let book = run_blocking(&state, move |catalog| {
        catalog.update_book(&actor, id, patch)
    })
    .await?;
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_book_id(&id)?;
    let actor = current_user(&state, &headers).await?;
    run_blocking(&state, move |catalog| catalog.delete_book(&actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn checkout_book(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CheckoutBody>>,
) -> ApiResult<biblion::catalog::model::Book> {
    let id = parse_book_id(&id)?;
    let actor = current_user(&state, &headers).await?;
    let req = match body {
        Some(Json(body)) => CheckoutRequest {
            user_id: body.user_id.map(UserId),
            override_loan: body.override_loan,
        },
        None => CheckoutRequest::default(),
    };
    let book = run_blocking(&state, move |catalog| catalog.checkout(&actor, id, &req)).await?;
    Ok(Json(book))
}

async fn checkin_book(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<biblion::catalog::model::Book> {
    let id = parse_book_id(&id)?;
    let actor = current_user(&state, &headers).await?;
    let book = run_blocking(&state, move |catalog| catalog.checkin(&actor, id)).await?;
    Ok(Json(book))
}

async fn book_history(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Vec<biblion::catalog::model::CheckoutRecord>> {
    let id = parse_book_id(&id)?;
    let actor = current_user(&state, &headers).await?;
    let records = run_blocking(&state, move |catalog| catalog.history(&actor, id)).await?;
    Ok(Json(records))
}

async fn smart_search(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<SmartSearchBody>,
) -> ApiResult<biblion::catalog::SearchResponse> {
    let actor = current_user(&state, &headers).await?;
    let query = body.query.unwrap_or_default();
    let response = run_blocking(&state, move |catalog| {
        catalog.smart_search(Some(&actor), &query)
    })
    .await?;
    Ok(Json(response))
}

async fn enrich_book(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<EnrichBody>,
) -> ApiResult<biblion::catalog::EnrichResponse> {
    let actor = current_user(&state, &headers).await?;
    let id = match body.book_id {
        Some(n) if n > 0 => BookId(n),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                error_body("a valid book_id is required"),
            ));
        }
    };
    let response = run_blocking(&state, move |catalog| catalog.enrich_book(&actor, id)).await?;
    Ok(Json(response))
}

async fn list_users(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<PublicUser>> {
    let actor = current_user(&state, &headers).await?;
    let users = run_blocking(&state, move |catalog| catalog.list_users(&actor)).await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

async fn set_user_role(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RoleBody>,
) -> ApiResult<PublicUser> {
    let id = parse_user_id(&id)?;
    let actor = current_user(&state, &headers).await?;
    let role = Role::parse(&body.role).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            error_body(format!("invalid role \"{}\"", body.role)),
        )
    })?;
    let user = run_blocking(&state, move |catalog| {
        catalog.set_user_role(&actor, id, role)
    })
    .await?;
    Ok(Json(PublicUser::from(&user)))
}

// ── Main ──────────────────────────────────────────────────────────────────

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/session", post(create_session))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/books/{id}/checkout", post(checkout_book))
        .route("/books/{id}/checkin", post(checkin_book))
        .route("/books/{id}/history", get(book_history))
        .route("/ai/smart-search", post(smart_search))
        .route("/ai/enrich-book", post(enrich_book))
        .route("/users", get(list_users))
        .route("/users/{id}/role", patch(set_user_role))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let paths = BiblionPaths::resolve().unwrap_or_else(|e| {
        tracing::error!("failed to resolve XDG paths: {e}");
        std::process::exit(1);
    });
    if let Err(e) = paths.ensure_dirs() {
        tracing::error!("failed to create XDG directories: {e}");
        std::process::exit(1);
    }

    let config = ServiceConfig::load_or_default(&paths.config_file()).unwrap_or_else(|e| {
        tracing::error!("failed to load config: {e}");
        std::process::exit(1);
    });

    let catalog = Catalog::open(&paths, &config).unwrap_or_else(|e| {
        tracing::error!("failed to open catalog: {e}");
        std::process::exit(1);
    });

    let production = std::env::var("BIBLION_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let state = Arc::new(ServerState {
        catalog: Arc::new(catalog),
        sessions: RwLock::new(HashMap::new()),
        production,
    });

    let bind = std::env::var("BIBLION_BIND").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("BIBLION_PORT").unwrap_or_else(|_| "7070".to_string());
    let addr = format!("{bind}:{port}");

    let app = router(state);

    tracing::info!("bibliond listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    // Serve with graceful shutdown on SIGTERM/SIGINT.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to register SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
            tracing::info!("bibliond shutting down");
        })
        .await
        .expect("server error");
}
