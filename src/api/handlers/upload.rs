use crate::AppState;
use crate::api::error::AppError;
use axum::extract::{Multipart, State, multipart::MultipartRejection};
use utoipa::ToSchema;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded, converted and forwarded successfully";

/// Shape of the `POST /upload` form, for the OpenAPI document only.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// Audio payload, any format the converter understands
    #[schema(value_type = String, format = Binary)]
    audio_file: Vec<u8>,
    /// Passed through to the downstream service unchanged
    bridge: Option<String>,
    /// Passed through to the downstream service unchanged
    ai_type: Option<String>,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded, converted and forwarded", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed, oversized or incomplete upload", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Conversion, forwarding or local I/O failure", body = crate::api::error::ErrorResponse)
    ),
    tag = "relay"
)]
pub async fn upload_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, AppError> {
    let multipart = multipart?;
    state.pipeline.run(multipart).await?;
    Ok(UPLOAD_SUCCESS_MESSAGE)
}
