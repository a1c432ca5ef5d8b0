//! Activities HTTP API.
//!
//! JSON endpoints over [`ActivityService`] plus operator controls for the
//! lifecycle scheduler.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::activity::{Activity, ActivityPatch, ActivityStatus, ActivityType, NewActivity};
use crate::domain::models::config::ServerConfig;
use crate::domain::ports::activity_repository::{ActivityFilter, ActivityRepository};
use crate::services::activity_scheduler::{ActivityScheduler, PassOutcome, SchedulerStatus};
use crate::services::activity_service::{ActivityService, TransitionOutcome};
use crate::services::ticker::Cadence;

/// Configuration for the activities HTTP server.
#[derive(Debug, Clone)]
pub struct ActivitiesHttpConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to enable CORS.
    pub enable_cors: bool,
}

impl Default for ActivitiesHttpConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ActivitiesHttpConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            enable_cors: config.enable_cors,
        }
    }
}

/// Query parameters for activity listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub place_id: Option<Uuid>,
    #[serde(default, rename = "type")]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub include_inactive: Option<bool>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StartParams {
    /// Overrides the configured cadence, e.g. `30s` or `*/5 * * * *`.
    #[serde(default)]
    pub cadence: Option<String>,
}

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn error_response(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

impl From<DomainError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: DomainError) -> Self {
        let (status, code) = match &err {
            DomainError::ActivityNotFound(_) | DomainError::ActivitySlugNotFound(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            DomainError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            DomainError::TransitionRejected(_) => (StatusCode::CONFLICT, "TRANSITION_REJECTED"),
            DomainError::DatabaseError(_) | DomainError::SerializationError(_) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        error_response(status, code, err.to_string())
    }
}

/// Shared state for the activities HTTP server.
struct AppState<R: ActivityRepository> {
    service: ActivityService<R>,
    scheduler: ActivityScheduler<R>,
}

/// Activities HTTP Server.
pub struct ActivitiesHttpServer<R: ActivityRepository + 'static> {
    config: ActivitiesHttpConfig,
    service: ActivityService<R>,
    scheduler: ActivityScheduler<R>,
}

impl<R: ActivityRepository + 'static> ActivitiesHttpServer<R> {
    pub fn new(
        service: ActivityService<R>,
        scheduler: ActivityScheduler<R>,
        config: ActivitiesHttpConfig,
    ) -> Self {
        Self {
            config,
            service,
            scheduler,
        }
    }

    /// Build the router.
    pub fn build_router(self) -> Router {
        let state = Arc::new(AppState {
            service: self.service,
            scheduler: self.scheduler,
        });

        let app = Router::new()
            // Activity CRUD
            .route("/api/v1/activities", get(list_activities::<R>).post(create_activity::<R>))
            .route(
                "/api/v1/activities/{id}",
                get(view_activity::<R>)
                    .put(update_activity::<R>)
                    .delete(delete_activity::<R>),
            )
            .route("/api/v1/activities/slug/{slug}", get(get_by_slug::<R>))
            // Collections
            .route("/api/v1/activities/upcoming", get(upcoming_activities::<R>))
            .route("/api/v1/activities/live", get(live_activities::<R>))
            .route("/api/v1/activities/featured", get(featured_activities::<R>))
            .route("/api/v1/activities/stats", get(activity_stats::<R>))
            .route("/api/v1/activities/quick-test", post(create_quick_test::<R>))
            .route("/api/v1/places/{place_id}/activities", get(place_activities::<R>))
            // Lifecycle overrides
            .route("/api/v1/activities/{id}/make-live", patch(make_live::<R>))
            .route("/api/v1/activities/{id}/complete", patch(complete::<R>))
            .route("/api/v1/activities/{id}/cancel", patch(cancel::<R>))
            .route("/api/v1/activities/{id}/toggle-featured", patch(toggle_featured::<R>))
            .route("/api/v1/activities/{id}/toggle-active", patch(toggle_active::<R>))
            // Scheduler controls
            .route("/api/v1/scheduler/status", get(scheduler_status::<R>))
            .route("/api/v1/scheduler/trigger", post(scheduler_trigger::<R>))
            .route("/api/v1/scheduler/start", post(scheduler_start::<R>))
            .route("/api/v1/scheduler/stop", post(scheduler_stop::<R>))
            // Health check
            .route("/health", get(health_check))
            .with_state(state);

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.build_router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "activities HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

fn parse_status(s: &str) -> Result<ActivityStatus, ApiError> {
    ActivityStatus::from_str(s).ok_or_else(|| {
        error_response(StatusCode::BAD_REQUEST, "INVALID_STATUS", format!("Unknown status: {s}"))
    })
}

fn parse_type(s: &str) -> Result<ActivityType, ApiError> {
    ActivityType::from_str(s).ok_or_else(|| {
        error_response(StatusCode::BAD_REQUEST, "INVALID_TYPE", format!("Unknown activity type: {s}"))
    })
}

fn transition_response(outcome: TransitionOutcome, done: &str) -> Json<ApiResponse<Activity>> {
    let message = if outcome.applied {
        done.to_string()
    } else {
        format!(
            "Activity status changed concurrently to {}; no update applied",
            outcome.activity.status
        )
    };
    ApiResponse::with_message(message, outcome.activity)
}

async fn list_activities<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Activity>> {
    let filter = ActivityFilter {
        status: params.status.as_deref().map(parse_status).transpose()?,
        place_id: params.place_id,
        activity_type: params.activity_type.as_deref().map(parse_type).transpose()?,
        is_featured: params.featured,
        include_inactive: params.include_inactive.unwrap_or(false),
        limit: params.limit,
        ..Default::default()
    };
    Ok(ApiResponse::ok(state.service.list(&filter).await?))
}

async fn create_activity<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<NewActivity>,
) -> Result<(StatusCode, Json<ApiResponse<Activity>>), ApiError> {
    let activity = state.service.create(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Activity created successfully", activity),
    ))
}

async fn view_activity<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Activity> {
    Ok(ApiResponse::ok(state.service.view(id).await?))
}

async fn get_by_slug<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(slug): Path<String>,
) -> ApiResult<Activity> {
    Ok(ApiResponse::ok(state.service.get_by_slug(&slug).await?))
}

async fn update_activity<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActivityPatch>,
) -> ApiResult<Activity> {
    let activity = state.service.update(id, req).await?;
    Ok(ApiResponse::with_message("Activity updated successfully", activity))
}

async fn delete_activity<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.service.delete(id).await?;
    Ok(ApiResponse::with_message("Activity deleted successfully", id))
}

async fn upcoming_activities<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<Activity>> {
    Ok(ApiResponse::ok(state.service.upcoming(params.limit).await?))
}

async fn live_activities<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> ApiResult<Vec<Activity>> {
    Ok(ApiResponse::ok(state.service.live().await?))
}

async fn featured_activities<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<Activity>> {
    Ok(ApiResponse::ok(state.service.featured(params.limit.or(Some(6))).await?))
}

#[derive(Debug, Serialize)]
struct StatusCount {
    status: ActivityStatus,
    count: u64,
}

async fn activity_stats<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> ApiResult<Vec<StatusCount>> {
    let counts = state.service.status_counts().await?;
    Ok(ApiResponse::ok(
        counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
    ))
}

async fn create_quick_test<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<(StatusCode, Json<ApiResponse<Activity>>), ApiError> {
    let activity = state.service.create_quick_test().await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Quick test activity created: goes live in 1 minute, completes 2 minutes later", activity),
    ))
}

async fn place_activities<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(place_id): Path<Uuid>,
) -> ApiResult<Vec<Activity>> {
    Ok(ApiResponse::ok(state.service.by_place(place_id).await?))
}

async fn make_live<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Activity>>, ApiError> {
    let outcome = state.service.make_live(id).await?;
    Ok(transition_response(outcome, "Activity is now live"))
}

async fn complete<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Activity>>, ApiError> {
    let outcome = state.service.complete(id).await?;
    Ok(transition_response(outcome, "Activity marked as completed"))
}

async fn cancel<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Activity>>, ApiError> {
    let outcome = state.service.cancel(id).await?;
    Ok(transition_response(outcome, "Activity cancelled successfully"))
}

async fn toggle_featured<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Activity> {
    let activity = state.service.toggle_featured(id).await?;
    let message = if activity.is_featured { "Activity featured" } else { "Activity unfeatured" };
    Ok(ApiResponse::with_message(message, activity))
}

async fn toggle_active<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Activity> {
    let activity = state.service.toggle_active(id).await?;
    let message = if activity.is_active { "Activity activated" } else { "Activity deactivated" };
    Ok(ApiResponse::with_message(message, activity))
}

async fn scheduler_status<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> ApiResult<SchedulerStatus> {
    Ok(ApiResponse::ok(state.scheduler.status().await))
}

async fn scheduler_trigger<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<Json<ApiResponse<PassOutcome>>, ApiError> {
    let outcome = state.scheduler.trigger_manually().await;
    let message = match &outcome {
        PassOutcome::Completed { .. } => "Status update triggered".to_string(),
        PassOutcome::Skipped => "A pass is already in flight; trigger skipped".to_string(),
        PassOutcome::Failed { rule, error, .. } => format!("Pass aborted during {rule}: {error}"),
    };
    Ok(ApiResponse::with_message(message, outcome))
}

async fn scheduler_start<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<StartParams>,
) -> ApiResult<SchedulerStatus> {
    let cadence = params
        .cadence
        .as_deref()
        .map(str::parse::<Cadence>)
        .transpose()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, "INVALID_CADENCE", e.to_string()))?;

    let started = state.scheduler.start(cadence).await;
    let message = if started { "Scheduler started" } else { "Scheduler already running" };
    Ok(ApiResponse::with_message(message, state.scheduler.status().await))
}

async fn scheduler_stop<R: ActivityRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> ApiResult<SchedulerStatus> {
    let stopped = state.scheduler.stop();
    let message = if stopped { "Scheduler stopped" } else { "Scheduler was not running" };
    Ok(ApiResponse::with_message(message, state.scheduler.status().await))
}
