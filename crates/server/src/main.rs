use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use server_api::{
    bootstrap_admin, create_submission, create_user, current_user, delete_submission,
    delete_user, fetch_asset, get_submission, list_submissions, list_users, login,
    update_submission, update_user, ApiContext, AuthConfig,
};
use shared::{
    domain::{AssetBucket, SubmissionId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateUserRequest, LoginRequest, LoginResponse, SubmissionPayload, SubmissionRecord,
        UpdateUserRequest, UserSummary,
    },
};
use storage::{FsObjectStore, Storage};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;

use app_state::AppState;
use auth::{http_error, AuthUser, HttpError};
use config::{load_settings, prepare_database_url, Settings, TokenSecret};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.check_token_secret()? == TokenSecret::DevDefault {
        warn!(
            bind = %settings.server_bind,
            "built-in token secret in use; tokens can be forged. Set APP__TOKEN_SECRET"
        );
    }
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; \
             verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let public_base_url = settings.public_base_url();
    let assets = FsObjectStore::new(&settings.asset_root, &public_base_url).await?;
    info!(asset_root = %settings.asset_root, %public_base_url, "asset store ready");

    let api = ApiContext {
        storage,
        assets: Arc::new(assets),
        auth: AuthConfig {
            token_secret: settings.token_secret.clone(),
            token_ttl_minutes: settings.token_ttl_minutes,
        },
    };
    ensure_admin_account(&api, &settings).await?;

    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ensure_admin_account(api: &ApiContext, settings: &Settings) -> anyhow::Result<()> {
    match (
        &settings.bootstrap_admin_email,
        &settings.bootstrap_admin_password,
    ) {
        (Some(email), Some(password)) => {
            bootstrap_admin(api, &settings.bootstrap_admin_name, email, password)
                .await
                .map_err(|e| anyhow::anyhow!("bootstrap admin failed: {e}"))?;
        }
        _ => {
            if api.storage.count_users().await? == 0 {
                warn!(
                    "no user accounts exist; \
                     set APP__BOOTSTRAP_ADMIN_EMAIL and APP__BOOTSTRAP_ADMIN_PASSWORD"
                );
            }
        }
    }
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/login", post(http_login))
        .route("/auth/me", get(http_me))
        .route(
            "/submissions",
            get(http_list_submissions).post(http_create_submission),
        )
        .route(
            "/submissions/:id",
            get(http_get_submission)
                .put(http_update_submission)
                .delete(http_delete_submission),
        )
        .route("/assets/:bucket/*key", get(http_fetch_asset))
        .route("/users", get(http_list_users).post(http_create_user))
        .route("/users/:id", put(http_update_user).delete(http_delete_user))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, format!("{e:#}"))),
        )
    })?;
    Ok("ok")
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let response = login(&state.api, &req).await.map_err(http_error)?;
    Ok(Json(response))
}

async fn http_me(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<Json<UserSummary>, HttpError> {
    let user = current_user(&state.api, &actor).await.map_err(http_error)?;
    Ok(Json(user))
}

async fn http_list_submissions(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<SubmissionRecord>>, HttpError> {
    let records = list_submissions(&state.api, &actor)
        .await
        .map_err(http_error)?;
    Ok(Json(records))
}

async fn http_create_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<SubmissionPayload>,
) -> Result<(StatusCode, Json<SubmissionRecord>), HttpError> {
    let record = create_submission(&state.api, &actor, &payload)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn http_get_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<SubmissionRecord>, HttpError> {
    let record = get_submission(&state.api, &actor, SubmissionId(id))
        .await
        .map_err(http_error)?
        .ok_or_else(|| {
            http_error(ApiError::new(
                ErrorCode::NotFound,
                format!("submission {id} not found"),
            ))
        })?;
    Ok(Json(record))
}

async fn http_update_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<SubmissionPayload>,
) -> Result<Json<SubmissionRecord>, HttpError> {
    let record = update_submission(&state.api, &actor, SubmissionId(id), &payload)
        .await
        .map_err(http_error)?;
    Ok(Json(record))
}

async fn http_delete_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    delete_submission(&state.api, &actor, SubmissionId(id))
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_fetch_asset(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, HttpError> {
    let bucket = AssetBucket::from_name(&bucket).ok_or_else(|| {
        http_error(ApiError::new(
            ErrorCode::NotFound,
            format!("unknown bucket '{bucket}'"),
        ))
    })?;
    let object = fetch_asset(&state.api, bucket, &key)
        .await
        .map_err(http_error)?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok((StatusCode::OK, headers, object.bytes))
}

async fn http_list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<UserSummary>>, HttpError> {
    let users = list_users(&state.api, &actor).await.map_err(http_error)?;
    Ok(Json(users))
}

async fn http_create_user(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>), HttpError> {
    let user = create_user(&state.api, &actor, &req)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn http_update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserSummary>, HttpError> {
    let user = update_user(&state.api, &actor, UserId(id), &req)
        .await
        .map_err(http_error)?;
    Ok(Json(user))
}

async fn http_delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    delete_user(&state.api, &actor, UserId(id))
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
