mod realtime;

use axum::extract::{Extension, Path, Query, State};
use axum::{
    Json, Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tripmate_domain::chat::Chat;
use tripmate_domain::messages::{HistoryCursor, MessageKind};
use tripmate_domain::profiles::{ChatView, MessageView};
use tripmate_domain::trips::Trip;
use validator::Validate;

use crate::middleware::AuthContext;
use crate::{error::ApiError, middleware as app_middleware, observability, state::AppState, validation};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/chats/private/:user_id", post(create_private_chat))
        .route("/chats/group/:trip_id", post(create_group_chat))
        .route("/chats/user", get(list_user_chats))
        .route(
            "/chats/:chat_id/messages",
            get(list_chat_messages).post(send_chat_message),
        )
        .route("/chats/:chat_id/read", put(mark_chat_read))
        .route("/trips/:trip_id/join", post(join_trip))
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/realtime", get(realtime::upgrade))
        .merge(protected)
        .layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ));

    if !state.config.is_test() {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    realtime_sessions: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
        realtime_sessions: state.sessions.session_count().await,
    })
}

async fn metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ChatMessagesQuery {
    since_created_at_ms: Option<i64>,
    since_message_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
struct SendChatMessageRequest {
    #[validate(length(min = 1))]
    content: String,
    #[serde(rename = "type", default)]
    kind: MessageKind,
}

#[derive(Serialize)]
struct MarkReadResponse {
    marked: usize,
}

async fn create_private_chat(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ChatView>, ApiError> {
    let actor = auth.actor()?;
    let other_user_id = validation::path_id(&user_id, "user_id")?;
    let chat = state
        .chat_directory()
        .get_or_create_private_chat(&actor.user_id, &other_user_id)
        .await?;
    Ok(Json(chat_view(&state, chat).await?))
}

async fn create_group_chat(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ChatView>, ApiError> {
    let actor = auth.actor()?;
    let trip_id = validation::path_id(&trip_id, "trip_id")?;
    let chat = state
        .chat_directory()
        .get_or_create_group_chat(&trip_id, &actor.user_id)
        .await?;
    Ok(Json(chat_view(&state, chat).await?))
}

async fn list_user_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    let actor = auth.actor()?;
    let chats = state
        .chat_directory()
        .list_user_chats(&actor.user_id)
        .await?;
    let mut views = Vec::with_capacity(chats.len());
    for chat in chats {
        views.push(chat_view(&state, chat).await?);
    }
    Ok(Json(views))
}

async fn list_chat_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<ChatMessagesQuery>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let actor = auth.actor()?;
    let cursor = HistoryCursor::page(
        query.since_created_at_ms,
        query.since_message_id,
        query.limit,
    )?;
    let messages = state
        .message_store()
        .history(&chat_id, &actor.user_id, &cursor)
        .await?;
    Ok(Json(state.profiles().message_views(messages).await?))
}

/// Request/response send used when the realtime link is down. The caller renders
/// the returned message itself; nothing is pushed to the chat room.
async fn send_chat_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SendChatMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    validation::validate(&payload)?;
    let actor = auth.actor()?;
    let message = state
        .message_store()
        .append(&chat_id, &actor.user_id, &payload.content, payload.kind)
        .await?;
    tracing::info!(
        chat_id = %message.chat_id,
        message_id = %message.message_id,
        "message sent over http"
    );
    let view = state.profiles().message_view(message).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn mark_chat_read(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let actor = auth.actor()?;
    let marked = state
        .message_store()
        .mark_read(&chat_id, &actor.user_id)
        .await?;
    Ok(Json(MarkReadResponse { marked }))
}

async fn join_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Trip>, ApiError> {
    let actor = auth.actor()?;
    let trip_id = validation::path_id(&trip_id, "trip_id")?;
    let trip = state
        .trip_service()
        .join_trip(&trip_id, &actor.user_id)
        .await?;
    Ok(Json(trip))
}

async fn chat_view(state: &AppState, chat: Chat) -> Result<ChatView, ApiError> {
    let last_message = state.chat_directory().last_message(&chat).await?;
    Ok(state.profiles().chat_view(chat, last_message).await?)
}
