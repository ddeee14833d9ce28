//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`Authorization: Bearer <user-uuid>[:<AUTH_TOKEN>]`",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Blindate API",
        version = "0.1.0",
        description = "Blind-date engagements between verified users: invitations, scheduling, venue negotiation with an anonymised chat, reviews and grace-period completion.\n\nAll `/v1/*` endpoints require a bearer token. Health probes are unauthenticated.",
        license(name = "AGPL-3.0-or-later"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::engagements::create_engagement,
        crate::routes::engagements::list_engagements,
        crate::routes::engagements::get_engagement,
        crate::routes::engagements::respond,
        crate::routes::engagements::update_meeting,
        crate::routes::engagements::submit_review,
        crate::routes::engagements::cancel,
        crate::routes::engagements::provision_video_link,
        crate::routes::negotiation::vote,
        crate::routes::negotiation::location_status,
        crate::routes::negotiation::confirm_location,
        crate::routes::negotiation::initiate_chat,
        crate::routes::negotiation::engagement_chat,
        crate::routes::chat::list_messages,
        crate::routes::chat::post_message,
        crate::routes::chat::close_chat,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::engagements::CreateEngagementRequest,
            crate::routes::engagements::RespondRequest,
            crate::routes::engagements::MeetingDetailsRequest,
            crate::routes::engagements::ReviewRequest,
            crate::routes::engagements::CancelRequest,
            crate::routes::engagements::EngagementResponse,
            crate::routes::engagements::MeetingResponse,
            crate::routes::engagements::ReviewResponse,
            crate::routes::engagements::CancellationResponse,
            crate::routes::engagements::VideoLinkResponse,
            crate::routes::negotiation::LocationBody,
            crate::routes::negotiation::CoordinatesBody,
            crate::routes::negotiation::NegotiationResponse,
            crate::routes::negotiation::VoteResponse,
            crate::routes::negotiation::ChatRoomResponse,
            crate::routes::chat::PostMessageRequest,
            crate::routes::chat::MessageResponse,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "engagements", description = "Invitations, responses, meeting details, reviews and cancellation"),
        (name = "negotiation", description = "Venue votes, confirmation and the negotiation chat room"),
        (name = "chat", description = "Anonymised chat transcripts"),
    )
)]
pub struct ApiDoc;

/// Serves the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_has_engagement_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/engagements",
            "/v1/engagements/{id}",
            "/v1/engagements/{id}/respond",
            "/v1/engagements/{id}/meeting",
            "/v1/engagements/{id}/reviews",
            "/v1/engagements/{id}/cancel",
            "/v1/engagements/{id}/video-link",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_openapi_spec_has_negotiation_and_chat_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/engagements/{id}/location/votes",
            "/v1/engagements/{id}/location",
            "/v1/engagements/{id}/location/confirm",
            "/v1/engagements/{id}/chat",
            "/v1/chats/{id}/messages",
            "/v1/chats/{id}/close",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_openapi_spec_has_security_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let schemas = &spec.components.as_ref().unwrap().schemas;
        for name in ["ErrorBody", "EngagementResponse", "LocationBody", "MessageResponse"] {
            assert!(schemas.contains_key(name), "missing {name} schema");
        }
    }

    #[test]
    fn test_openapi_spec_serializes_to_json() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("bearer_auth"));
    }
}
