use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Hub API",
        description = "Marketplace, carpooling, messaging and groups for a campus community. \
                       Every response is wrapped in `{success, data}` or `{success, error}`."
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::verify_email,
        crate::routes::auth::resend_verification,
        crate::routes::auth::me,
        crate::routes::auth::change_password,
        crate::routes::users::get_user,
        crate::routes::users::update_me,
        crate::routes::market::list_items,
        crate::routes::market::create_item,
        crate::routes::market::get_item,
        crate::routes::market::update_item,
        crate::routes::market::delete_item,
        crate::routes::market::list_comments,
        crate::routes::market::create_comment,
        crate::routes::market::delete_comment,
        crate::routes::rides::list_rides,
        crate::routes::rides::create_ride,
        crate::routes::rides::get_ride,
        crate::routes::rides::update_ride,
        crate::routes::rides::cancel_ride,
        crate::routes::rides::join_ride,
        crate::routes::rides::leave_ride,
        crate::routes::rides::list_passengers,
        crate::routes::conversations::list_conversations,
        crate::routes::conversations::create_conversation,
        crate::routes::conversations::list_messages,
        crate::routes::conversations::send_message,
        crate::routes::conversations::mark_read,
        crate::routes::groups::list_groups,
        crate::routes::groups::create_group,
        crate::routes::groups::get_group,
        crate::routes::groups::update_group,
        crate::routes::groups::delete_group,
        crate::routes::groups::join_group,
        crate::routes::groups::leave_group,
        crate::routes::groups::list_members,
        crate::routes::groups::list_messages,
        crate::routes::groups::post_message,
        crate::routes::notifications::list_notifications,
        crate::routes::notifications::get_unread_count,
        crate::routes::notifications::mark_notification_read,
        crate::routes::notifications::mark_all_read,
        crate::routes::notifications::delete_notification,
        crate::routes::admin::stats,
        crate::routes::admin::list_users,
        crate::routes::admin::update_user
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::error::ErrorBody,
            crate::models::Pagination,
            crate::models::MessageResponse,
            crate::models::BulkUpdateResponse,
            crate::routes::health::HealthResponse,
            crate::models::user::UserProfile,
            crate::models::user::UserResponse,
            crate::models::user::SessionResponse,
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            crate::models::user::VerifyEmailRequest,
            crate::models::user::ResendVerificationRequest,
            crate::models::user::ChangePasswordRequest,
            crate::models::user::UpdateProfileRequest,
            crate::models::market::MarketItem,
            crate::models::market::CreateItemRequest,
            crate::models::market::UpdateItemRequest,
            crate::models::market::ItemComment,
            crate::models::market::CreateCommentRequest,
            crate::models::carpool::Ride,
            crate::models::carpool::CreateRideRequest,
            crate::models::carpool::UpdateRideRequest,
            crate::models::carpool::JoinRideRequest,
            crate::models::carpool::RidePassenger,
            crate::models::message::ConversationSummary,
            crate::models::message::CreateConversationRequest,
            crate::models::message::DirectMessage,
            crate::models::message::SendMessageRequest,
            crate::models::group::Group,
            crate::models::group::GroupDetail,
            crate::models::group::CreateGroupRequest,
            crate::models::group::UpdateGroupRequest,
            crate::models::group::GroupMember,
            crate::models::group::GroupMessage,
            crate::models::group::PostGroupMessageRequest,
            crate::models::notification::Notification,
            crate::models::notification::UnreadCountResponse,
            crate::models::admin::DashboardStats,
            crate::models::admin::AdminUpdateUserRequest
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Registration, login and email verification"),
        (name = "Users", description = "Public profiles and profile editing"),
        (name = "Marketplace", description = "Second-hand items and their comment threads"),
        (name = "Carpool", description = "Ride offers and seat reservations"),
        (name = "Messaging", description = "One-to-one conversations"),
        (name = "Groups", description = "Interest groups and group chat"),
        (name = "Notifications", description = "User notifications"),
        (name = "Admin", description = "Dashboard statistics and account moderation")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        let mut http = Http::new(HttpAuthScheme::Bearer);
        http.bearer_format = Some("JWT".to_string());

        components
            .security_schemes
            .insert("bearerAuth".to_string(), SecurityScheme::Http(http));
    }
}
