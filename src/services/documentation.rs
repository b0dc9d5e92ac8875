use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Courtside sync bridge.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::view_stream,
        crate::routes::position::submit_position,
        crate::routes::position::start_watch,
        crate::routes::position::stop_watch,
        crate::routes::position::report_unavailable,
        crate::routes::presence::presence,
        crate::routes::presence::check_in,
        crate::routes::presence::check_out,
        crate::routes::chat::open_conversation,
        crate::routes::chat::close_conversation,
        crate::routes::chat::conversation,
        crate::routes::chat::report_viewport,
        crate::routes::chat::send_message,
        crate::routes::session::login,
        crate::routes::session::logout,
        crate::routes::session::report_surfaces,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::position::PositionSampleRequest,
            crate::dto::presence::PresenceSnapshot,
            crate::dto::presence::NearbyCourt,
            crate::dto::presence::SensorStatus,
            crate::dto::presence::ManualCheckInRequest,
            crate::dto::chat::OpenConversationRequest,
            crate::dto::chat::CloseConversationRequest,
            crate::dto::chat::SendMessageRequest,
            crate::dto::chat::RenderedMessage,
            crate::dto::chat::ConversationResponse,
            crate::dto::chat::SentMessageResponse,
            crate::dto::session::LoginRequest,
            crate::dto::session::ActionResponse,
            crate::dto::surfaces::SurfaceKind,
            crate::dto::surfaces::VisibleSurface,
            crate::dto::surfaces::SurfacesReport,
            crate::dto::surfaces::ViewportReport,
            crate::dto::events::EventCategory,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RefreshEvent,
            crate::dto::sse::MessageEvent,
            crate::dto::sse::PresenceChangedEvent,
            crate::dto::sse::NoticeLevel,
            crate::dto::sse::NoticeEvent,
            crate::dao::models::ConversationScope,
            crate::dao::models::Court,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "presence", description = "Position samples and court presence"),
        (name = "chat", description = "Court and play-session conversations"),
        (name = "session", description = "Credential and visible surfaces"),
    )
)]
pub struct ApiDoc;
