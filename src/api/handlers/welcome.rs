pub const WELCOME_MESSAGE: &str = "Welcome to the API Server";

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Welcome banner", body = String, content_type = "text/plain")
    ),
    tag = "relay"
)]
pub async fn welcome() -> &'static str {
    WELCOME_MESSAGE
}
