//! # Engagement Lifecycle API
//!
//! Invitations, responses, scheduling, reviews, cancellation and video
//! links. Every response is written from the caller's point of view: the
//! other participant is "they", never an identifier.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use blindate_core::{EngagementId, Timestamp, UserId, ValidationError};
use blindate_state::{Decision, Engagement, MeetingDetailsUpdate, MeetingMode};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::routes::negotiation::{LocationBody, NegotiationResponse};
use crate::state::AppState;

// ── Requests ────────────────────────────────────────────────────────

/// Invite a user to a blind date.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEngagementRequest {
    pub invitee_id: Uuid,
}

/// Accept or decline an invitation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondRequest {
    /// "accepted" or "rejected".
    pub decision: String,
}

impl Validate for RespondRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        match Decision::parse(&self.decision)? {
            Decision::Pending => Err(ValidationError::new(
                "decision",
                "must be 'accepted' or 'rejected'",
            )),
            _ => Ok(()),
        }
    }
}

/// Partial meeting update. Absent fields keep their stored value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MeetingDetailsRequest {
    /// "online" or "offline".
    pub mode: Option<String>,
    /// RFC 3339 start time; must be in the future.
    pub scheduled_for: Option<String>,
    pub duration_minutes: Option<u32>,
    pub location: Option<LocationBody>,
}

impl MeetingDetailsRequest {
    fn into_update(self) -> Result<MeetingDetailsUpdate, ValidationError> {
        Ok(MeetingDetailsUpdate {
            mode: self.mode.as_deref().map(MeetingMode::parse).transpose()?,
            scheduled_for: self
                .scheduled_for
                .as_deref()
                .map(|s| Timestamp::parse("scheduled_for", s))
                .transpose()?,
            duration_minutes: self.duration_minutes,
            location: self.location.map(LocationBody::into_location).transpose()?,
        })
    }
}

/// A rating of the date.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// 1 to 5.
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

/// Call the date off.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

// ── Responses ───────────────────────────────────────────────────────

/// An engagement as one participant sees it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EngagementResponse {
    pub id: Uuid,
    /// pending, accepted, rejected, completed or cancelled.
    pub status: String,
    pub active: bool,
    pub you_initiated: bool,
    pub your_decision: String,
    pub their_decision: String,
    pub meeting: MeetingResponse,
    pub negotiation: NegotiationResponse,
    pub your_review: Option<ReviewResponse>,
    pub they_reviewed: bool,
    pub cancellation: Option<CancellationResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeetingResponse {
    pub mode: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub location: Option<LocationBody>,
    pub video_call_link: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub rating: u8,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancellationResponse {
    pub cancelled_by_you: bool,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoLinkResponse {
    pub video_call_link: String,
}

impl EngagementResponse {
    /// Project `engagement` for `viewer`, who must be a participant.
    pub fn for_viewer(engagement: &Engagement, viewer: UserId) -> Result<Self, AppError> {
        let other = engagement
            .counterpart(&viewer)
            .map_err(blindate_engine::BlindateError::from)?;
        let negotiation = engagement
            .negotiation_view(&viewer)
            .map_err(blindate_engine::BlindateError::from)?;
        let meeting = &engagement.meeting;

        Ok(Self {
            id: *engagement.id.as_uuid(),
            status: engagement.status.as_str().to_string(),
            active: engagement.active,
            you_initiated: engagement.initiator == viewer,
            your_decision: engagement.decision_of(&viewer).as_str().to_string(),
            their_decision: engagement.decision_of(&other).as_str().to_string(),
            meeting: MeetingResponse {
                mode: meeting.mode.as_str().to_string(),
                scheduled_for: meeting.scheduled_for.map(|t| *t.as_datetime()),
                duration_minutes: meeting.duration_minutes,
                location: meeting.location.as_ref().map(LocationBody::from),
                video_call_link: meeting.video_call_link.clone(),
            },
            negotiation: NegotiationResponse::from(negotiation),
            your_review: engagement.reviews.get(&viewer).map(|r| ReviewResponse {
                rating: r.rating,
                comment: r.comment.clone(),
                submitted_at: *r.submitted_at.as_datetime(),
            }),
            they_reviewed: engagement.reviews.contains_key(&other),
            cancellation: engagement
                .cancellation
                .as_ref()
                .map(|c| CancellationResponse {
                    cancelled_by_you: c.cancelled_by == viewer,
                    reason: c.reason.clone(),
                    cancelled_at: *c.cancelled_at.as_datetime(),
                }),
            created_at: *engagement.created_at.as_datetime(),
            updated_at: *engagement.updated_at.as_datetime(),
            version: engagement.version,
        })
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the engagement router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/engagements", post(create_engagement).get(list_engagements))
        .route("/v1/engagements/{id}", get(get_engagement))
        .route("/v1/engagements/{id}/respond", post(respond))
        .route("/v1/engagements/{id}/meeting", put(update_meeting))
        .route("/v1/engagements/{id}/reviews", post(submit_review))
        .route("/v1/engagements/{id}/cancel", post(cancel))
        .route("/v1/engagements/{id}/video-link", post(provision_video_link))
}

/// POST /v1/engagements: Invite a user, or return the pair's current engagement.
#[utoipa::path(
    post,
    path = "/v1/engagements",
    request_body = CreateEngagementRequest,
    responses(
        (status = 201, description = "Engagement created, reactivated or returned", body = EngagementResponse),
        (status = 409, description = "Pair blocked or permanently rejected", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid invitee", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn create_engagement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateEngagementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EngagementResponse>), AppError> {
    let req = extract_json(body)?;
    let engagement = state
        .engine
        .lifecycle()
        .create_or_reinvite(caller.user_id, UserId::from_uuid(req.invitee_id))
        .await?;
    let view = EngagementResponse::for_viewer(&engagement, caller.user_id)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /v1/engagements: The caller's engagements, most recent first.
#[utoipa::path(
    get,
    path = "/v1/engagements",
    responses(
        (status = 200, description = "Engagements of the caller", body = Vec<EngagementResponse>),
    ),
    tag = "engagements"
)]
pub(crate) async fn list_engagements(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<EngagementResponse>>, AppError> {
    let engagements = state.engine.lifecycle().list_for_user(caller.user_id).await?;
    let views = engagements
        .iter()
        .map(|e| EngagementResponse::for_viewer(e, caller.user_id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}

/// GET /v1/engagements/{id}: Read one engagement.
#[utoipa::path(
    get,
    path = "/v1/engagements/{id}",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    responses(
        (status = 200, description = "Engagement found", body = EngagementResponse),
        (status = 403, description = "Not a participant", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn get_engagement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<EngagementResponse>, AppError> {
    let engagement = state
        .engine
        .lifecycle()
        .get(EngagementId::from_uuid(id), caller.user_id)
        .await?;
    Ok(Json(EngagementResponse::for_viewer(&engagement, caller.user_id)?))
}

/// POST /v1/engagements/{id}/respond: Accept or decline.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/respond",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Response recorded", body = EngagementResponse),
        (status = 409, description = "Not pending", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn respond(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RespondRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let decision = Decision::parse(&req.decision)?;
    let engagement = state
        .engine
        .lifecycle()
        .respond(EngagementId::from_uuid(id), caller.user_id, decision)
        .await?;
    Ok(Json(EngagementResponse::for_viewer(&engagement, caller.user_id)?))
}

/// PUT /v1/engagements/{id}/meeting: Update meeting details.
#[utoipa::path(
    put,
    path = "/v1/engagements/{id}/meeting",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    request_body = MeetingDetailsRequest,
    responses(
        (status = 200, description = "Meeting details updated", body = EngagementResponse),
        (status = 422, description = "Invalid details", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn update_meeting(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<MeetingDetailsRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, AppError> {
    let update = extract_json(body)?.into_update()?;
    let engagement = state
        .engine
        .lifecycle()
        .update_meeting_details(EngagementId::from_uuid(id), caller.user_id, update)
        .await?;
    Ok(Json(EngagementResponse::for_viewer(&engagement, caller.user_id)?))
}

/// POST /v1/engagements/{id}/reviews: Review the date.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/reviews",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review stored", body = EngagementResponse),
        (status = 409, description = "Date not yet happened", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn submit_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, AppError> {
    let req = extract_json(body)?;
    let engagement = state
        .engine
        .lifecycle()
        .submit_review(
            EngagementId::from_uuid(id),
            caller.user_id,
            req.rating,
            &req.comment,
        )
        .await?;
    Ok(Json(EngagementResponse::for_viewer(&engagement, caller.user_id)?))
}

/// POST /v1/engagements/{id}/cancel: Call the date off.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/cancel",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Engagement cancelled", body = EngagementResponse),
        (status = 409, description = "Already terminal", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn cancel(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<EngagementResponse>, AppError> {
    let req = extract_json(body)?;
    let engagement = state
        .engine
        .lifecycle()
        .cancel(EngagementId::from_uuid(id), caller.user_id, &req.reason)
        .await?;
    Ok(Json(EngagementResponse::for_viewer(&engagement, caller.user_id)?))
}

/// POST /v1/engagements/{id}/video-link: Provision a video call link.
#[utoipa::path(
    post,
    path = "/v1/engagements/{id}/video-link",
    params(("id" = Uuid, Path, description = "Engagement ID")),
    responses(
        (status = 200, description = "Link provisioned", body = VideoLinkResponse),
        (status = 409, description = "Not an accepted online date", body = crate::error::ErrorBody),
    ),
    tag = "engagements"
)]
pub(crate) async fn provision_video_link(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoLinkResponse>, AppError> {
    let video_call_link = state
        .engine
        .lifecycle()
        .provision_video_link(EngagementId::from_uuid(id), caller.user_id)
        .await?;
    Ok(Json(VideoLinkResponse { video_call_link }))
}
