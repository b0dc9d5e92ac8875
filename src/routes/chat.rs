use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        chat::{
            CloseConversationRequest, ConversationResponse, OpenConversationRequest,
            SendMessageRequest, SentMessageResponse, SurfacePath,
        },
        session::ActionResponse,
        surfaces::ViewportReport,
    },
    error::AppError,
    services::chat_service,
    state::SharedState,
};

/// Conversation surfaces of courts and play sessions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/chat/open", post(open_conversation))
        .route("/chat/close", post(close_conversation))
        .route("/chat/send", post(send_message))
        .route("/chat/{key}", get(conversation))
        .route("/surfaces/{key}/viewport", put(report_viewport))
}

/// Open a conversation surface and load its history.
#[utoipa::path(
    post,
    path = "/chat/open",
    tag = "chat",
    request_body = OpenConversationRequest,
    responses(
        (status = 200, description = "Conversation loaded", body = ConversationResponse),
        (status = 401, description = "No credential")
    )
)]
pub async fn open_conversation(
    State(state): State<SharedState>,
    Json(payload): Json<OpenConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    Ok(Json(chat_service::open(&state, payload.scope).await?))
}

#[utoipa::path(
    post,
    path = "/chat/close",
    tag = "chat",
    request_body = CloseConversationRequest,
    responses(
        (status = 200, description = "Conversation closed", body = ActionResponse),
        (status = 404, description = "Conversation was not open")
    )
)]
pub async fn close_conversation(
    State(state): State<SharedState>,
    Json(payload): Json<CloseConversationRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(chat_service::close(&state, payload.scope).await?))
}

/// Current render buffer of an open conversation.
#[utoipa::path(
    get,
    path = "/chat/{key}",
    tag = "chat",
    params(("key" = String, Path, description = "Surface key such as `court-3` or `session-12`")),
    responses(
        (status = 200, description = "Conversation buffer", body = ConversationResponse),
        (status = 404, description = "Conversation is not open")
    )
)]
pub async fn conversation(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<SurfacePath>>,
) -> Result<Json<ConversationResponse>, AppError> {
    Ok(Json(chat_service::conversation(&state, &path).await?))
}

/// Report the scroll geometry of an open conversation.
#[utoipa::path(
    put,
    path = "/surfaces/{key}/viewport",
    tag = "chat",
    params(("key" = String, Path, description = "Surface key such as `court-3` or `session-12`")),
    request_body = ViewportReport,
    responses(
        (status = 200, description = "Viewport recorded", body = ActionResponse),
        (status = 404, description = "Conversation is not open")
    )
)]
pub async fn report_viewport(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<SurfacePath>>,
    Valid(Json(payload)): Valid<Json<ViewportReport>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        chat_service::report_viewport(&state, &path, payload).await?,
    ))
}

/// Send a chat message; it is appended to the open surface once the server accepts it.
#[utoipa::path(
    post,
    path = "/chat/send",
    tag = "chat",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message accepted", body = SentMessageResponse),
        (status = 400, description = "Empty or oversized message"),
        (status = 502, description = "Court service refused the message")
    )
)]
pub async fn send_message(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SendMessageRequest>>,
) -> Result<Json<SentMessageResponse>, AppError> {
    Ok(Json(chat_service::send(&state, payload).await?))
}
