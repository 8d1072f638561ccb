use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod storage;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthState, JwtAuthProvider};
pub use config::AppConfig;
pub use gateway::ResourceGateway;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockBlobStore, S3BlobStore, StorageState};

// --- Request Body Limits ---

/// Default for every route. Only JSON bodies travel on routes without their own limit.
pub const MAX_JSON_BYTES: usize = 64 * 1024;
/// Note, homework and submission files.
pub const MAX_DOCUMENT_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
/// Lecture videos.
pub const MAX_VIDEO_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
/// Avatar and cover images.
pub const MAX_IMAGE_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// ApiDoc
///
/// Auto-generates the OpenAPI document served at `/api-docs/openapi.json`. Every
/// handler decorated with `#[utoipa::path]` and every `ToSchema` body is listed here.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::refresh_token, handlers::current_user,
        handlers::logout, handlers::change_password, handlers::update_account,
        handlers::update_avatar, handlers::update_cover_image,
        handlers::create_classroom, handlers::list_classrooms, handlers::search_classrooms,
        handlers::join_classroom, handlers::get_classroom, handlers::update_classroom,
        handlers::delete_classroom, handlers::add_member, handlers::make_owner,
        handlers::remove_member, handlers::leave_classroom, handlers::create_module,
        handlers::list_modules, handlers::get_module, handlers::update_module,
        handlers::delete_module, handlers::add_note, handlers::delete_note,
        handlers::create_homework, handlers::list_homework, handlers::update_homework,
        handlers::delete_homework, handlers::submit_homework, handlers::create_lecture,
        handlers::list_lectures, handlers::delete_lecture, handlers::add_video,
        handlers::list_videos, handlers::delete_video
    ),
    components(
        schemas(
            models::Identity, models::BlobRef, models::Classroom, models::ClassroomSummary,
            models::Note, models::Module, models::Submission, models::Homework,
            models::Lecture, models::Video, models::CreateClassroomRequest,
            models::UpdateClassroomRequest, models::MemberRequest,
            models::JoinClassroomRequest, models::ModuleRequest, models::HomeworkForm,
            models::LectureRequest, models::VideoForm, models::Credentials,
            models::TokenPair, models::RefreshTokenRequest, models::CurrentUser,
            models::ChangePasswordRequest, models::UpdateAccountRequest,
            models::AccountDetails, models::Profile,
        )
    ),
    tags(
        (name = "classroom-api", description = "Classroom management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**: one cloneable container shared by every
/// request. The gateway owns the persistence and blob handles; handlers never reach
/// them directly.
#[derive(Clone)]
pub struct AppState {
    /// Load → authorize → mutate → persist orchestration for every resource.
    pub gateway: ResourceGateway,
    /// Credential checks and token issue/verification.
    pub auth: AuthState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repo: RepositoryState,
        blobs: StorageState,
        auth: AuthState,
    ) -> Self {
        Self {
            gateway: ResourceGateway::new(repo, blobs),
            auth,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Lets the `AuthUser` extractor pull only what it needs from the shared state.

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for `authenticated_routes`. Extracting `AuthUser` either
/// succeeds or rejects with the 401 envelope before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = match config.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            tracing::warn!(origin = ?config.cors_origin, "invalid CORS_ORIGIN, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(origin)
        .allow_headers(Any)
}

/// create_router
///
/// Assembles the routing structure under `/api/v1`, applies the scoped auth
/// middleware and the global observability layers, and registers the state.
/// Upload routes raise the body limit for themselves in `authenticated_routes`.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_JSON_BYTES))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Generates a UUID `x-request-id` for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // Wraps the request/response lifecycle in a span carrying that id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Echoes the id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, tagging it with the
/// `x-request-id` so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
