//! # Location Negotiation API
//!
//! Venue votes, the negotiation status, manual confirmation and the
//! negotiation chat room of an engagement.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use blindate_core::{Coordinates, EngagementId, Location, ValidationError};
use blindate_state::{ChatRoom, NegotiationView};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// A venue: name, address and optional coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LocationBody {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub coordinates: Option<CoordinatesBody>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CoordinatesBody {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationBody {
    pub(crate) fn into_location(self) -> Result<Location, ValidationError> {
        let mut location = Location::new(self.name, self.address);
        if let Some(c) = self.coordinates {
            location = location.with_coordinates(Coordinates::new(c.latitude, c.longitude)?);
        }
        location.validate()?;
        Ok(location)
    }
}

impl From<&Location> for LocationBody {
    fn from(location: &Location) -> Self {
        Self {
            name: location.name.clone(),
            address: location.address.clone(),
            coordinates: location.coordinates.map(|c| CoordinatesBody {
                latitude: c.latitude,
                longitude: c.longitude,
            }),
        }
    }
}

impl Validate for LocationBody {
    fn validate(&self) -> Result<(), ValidationError> {
        self.clone().into_location().map(|_| ())
    }
}

/// The caller's view of the venue negotiation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NegotiationResponse {
    /// pending, negotiating or confirmed.
    pub status: String,
    pub has_voted: bool,
    pub other_has_voted: bool,
    pub final_location: Option<LocationBody>,
    pub chat_room_id: Option<Uuid>,
}

impl From<NegotiationView> for NegotiationResponse {
    fn from(view: NegotiationView) -> Self {
        Self {
            status: view.status.as_str().to_string(),
            has_voted: view.has_voted,
            other_has_voted: view.other_has_voted,
            final_location: view.final_location.as_ref().map(LocationBody::from),
            chat_room_id: view.chat_room_id.map(|id| *id.as_uuid()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoteResponse {
    pub negotiation: NegotiationResponse,
    /// True when this vote opened the negotiation chat.
    pub chat_room_created: bool,
}

/// A chat room summary. Messages are read separately.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatRoomResponse {
    pub id: Uuid,
    pub engagement_id: Uuid,
    /// active or closed.
    pub status: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ChatRoom> for ChatRoomResponse {
    fn from(room: &ChatRoom) -> Self {
        Self {
            id: *room.id.as_uuid(),
            engagement_id: *room.engagement_id.as_uuid(),
            status: room.status.as_str().to_string(),
            message_count: room.messages.len(),
            created_at: *room.created_at.as_datetime(),
            updated_at: *room.updated_at.as_datetime(),
        }
    }
}

/// Build the negotiation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/engagements/{id}/location/votes", post(vote))
        .route("/v1/engagements/{id}/location", get(location_status))
        .route("/v1/engagements/{id}/location/confirm", post(confirm_location))
        .route(
            "/v1/engagements/{id}/chat",
            post(initiate_chat).get(engagement_chat),
        )
}

/// POST /v1/engagements/{id}/location/votes: Vote for a venue.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/location/votes",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    request_body = LocationBody,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 409, description = "Engagement not accepted or already confirmed", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid location", body = crate::error::ErrorBody),
    ),
    tag = "negotiation"
)]
pub(crate) async fn vote(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<LocationBody>, JsonRejection>,
) -> Result<Json<VoteResponse>, AppError> {
    let location = extract_validated_json(body)?.into_location()?;
    let receipt = state
        .engine
        .negotiation()
        .vote(EngagementId::from_uuid(id), caller.user_id, location)
        .await?;
    Ok(Json(VoteResponse {
        negotiation: receipt.negotiation.into(),
        chat_room_created: receipt.chat_room_created,
    }))
}

/// GET /v1/engagements/{id}/location: Negotiation status.
#[utoipa::path(
    get,
    path = "/v1/engagements/{id}/location",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    responses(
        (status = 200, description = "Negotiation status", body = NegotiationResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "negotiation"
)]
pub(crate) async fn location_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<NegotiationResponse>, AppError> {
    let view = state
        .engine
        .negotiation()
        .get_status(EngagementId::from_uuid(id), caller.user_id)
        .await?;
    Ok(Json(view.into()))
}

/// POST /v1/engagements/{id}/location/confirm: Settle the venue directly.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/location/confirm",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    request_body = LocationBody,
    responses(
        (status = 200, description = "Venue confirmed", body = NegotiationResponse),
        (status = 409, description = "Engagement not accepted", body = crate::error::ErrorBody),
    ),
    tag = "negotiation"
)]
pub(crate) async fn confirm_location(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<LocationBody>, JsonRejection>,
) -> Result<Json<NegotiationResponse>, AppError> {
    let location = extract_validated_json(body)?.into_location()?;
    let view = state
        .engine
        .negotiation()
        .confirm_final_location(EngagementId::from_uuid(id), caller.user_id, location)
        .await?;
    Ok(Json(view.into()))
}

/// POST /v1/engagements/{id}/chat: Open the negotiation chat, or return the existing room.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/chat",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    responses(
        (status = 201, description = "Chat room", body = ChatRoomResponse),
        (status = 409, description = "Engagement not accepted", body = crate::error::ErrorBody),
    ),
    tag = "negotiation"
)]
pub(crate) async fn initiate_chat(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ChatRoomResponse>), AppError> {
    let room = state
        .engine
        .negotiation()
        .initiate_chat(EngagementId::from_uuid(id), caller.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ChatRoomResponse::from(&room))))
}

/// GET /v1/engagements/{id}/chat: The engagement's chat room.
#[utoipa::path(
    get,
    path = "/v1/engagements/{id}/chat",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    responses(
        (status = 200, description = "Chat room", body = ChatRoomResponse),
        (status = 404, description = "No chat room yet", body = crate::error::ErrorBody),
    ),
    tag = "negotiation"
)]
pub(crate) async fn engagement_chat(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatRoomResponse>, AppError> {
    let room = state
        .engine
        .chat()
        .room_for_engagement(EngagementId::from_uuid(id), caller.user_id)
        .await?;
    Ok(Json(ChatRoomResponse::from(&room)))
}
