//! # Negotiation Chat API
//!
//! Anonymised transcripts, posting and closing. Room ids come from the
//! engagement's negotiation.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use blindate_core::ChatRoomId;
use blindate_state::{MessageAuthor, MessageView};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::negotiation::ChatRoomResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub body: String,
}

/// One message as the caller sees it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// you, counterpart or system.
    pub author: String,
    pub display_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub is_system_message: bool,
}

impl From<MessageView> for MessageResponse {
    fn from(view: MessageView) -> Self {
        let author = match view.author {
            MessageAuthor::You => "you",
            MessageAuthor::Counterpart => "counterpart",
            MessageAuthor::System => "system",
        };
        Self {
            author: author.to_string(),
            display_name: view.display_name,
            body: view.body,
            sent_at: *view.sent_at.as_datetime(),
            is_system_message: view.is_system_message,
        }
    }
}

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/chats/{id}/messages",
            get(list_messages).post(post_message),
        )
        .route("/v1/chats/{id}/close", post(close_chat))
}

/// GET /v1/chats/{id}/messages: Anonymised transcript.
#[utoipa::path(
    get,
    path = "/v1/chats/{id}/messages",
    params(("id" = Uuid, Path, description = "Chat room ID")),
    responses(
        (status = 200, description = "Transcript, oldest first", body = Vec<MessageResponse>),
        (status = 403, description = "Not a participant", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "chat"
)]
pub(crate) async fn list_messages(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let transcript = state
        .engine
        .chat()
        .transcript(ChatRoomId::from_uuid(id), caller.user_id)
        .await?;
    Ok(Json(transcript.into_iter().map(Into::into).collect()))
}

/// POST /v1/chats/{id}/messages: Post a message.
#[utoipa::path(
    post,
    path = "/v1/chats/{id}/messages",
    params(("id" = Uuid, Path, description = "Chat room ID")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageResponse),
        (status = 409, description = "Room closed", body = crate::error::ErrorBody),
        (status = 422, description = "Empty message", body = crate::error::ErrorBody),
    ),
    tag = "chat"
)]
pub(crate) async fn post_message(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let req = extract_json(body)?;
    let view = state
        .engine
        .chat()
        .post_message(ChatRoomId::from_uuid(id), caller.user_id, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// POST /v1/chats/{id}/close: Close the room. Closing twice is a no-op.
#[utoipa::path(
    post,
    path = "/v1/chats/{id}/close",
    params(("id" = Uuid, Path, description = "Chat room ID")),
    responses(
        (status = 200, description = "Room closed", body = ChatRoomResponse),
        (status = 403, description = "Not a participant", body = crate::error::ErrorBody),
    ),
    tag = "chat"
)]
pub(crate) async fn close_chat(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatRoomResponse>, AppError> {
    let room = state
        .engine
        .chat()
        .close(ChatRoomId::from_uuid(id), caller.user_id)
        .await?;
    Ok(Json(ChatRoomResponse::from(&room)))
}
