// API handlers for the web server

use super::{
    SharedConfig,
    error::ApiError,
    extract_request_data::{extract_multipart_file, has_allowed_extension},
    image_codec::{OutputFormat, decode_bytes, decode_data_url, encode_bytes, encode_data_url},
    models::*,
};
use crate::processing::{self, InpaintMethod};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::header,
    response::{Html, IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../static/index.html");

const MISSING_INPAINT_DATA: &str = "Missing image or mask data";
const MISSING_DOWNLOAD_DATA: &str = "No image data provided";
const DEFAULT_DOWNLOAD_FORMAT: &str = "PNG";

/// Runs CPU-bound image work off the async executor. A panicking or
/// cancelled task is reported as `"<operation> failed: ..."`.
async fn run_blocking<T, F>(operation: &'static str, work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        ApiError::InternalServerError(format!("{} failed: {}", operation, e))
    })?
}

// --- GET / ---
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// --- POST /upload ---
// Validates and decodes an uploaded file, echoing it back as a PNG data-URL
pub async fn upload_image(
    State(config): State<SharedConfig>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        debug!("Upload is not a multipart form: {}", rejection.body_text());
        ApiError::BadRequest("No image file provided".to_string())
    })?;

    let file = extract_multipart_file(multipart, "image").await?;

    if file.file_name.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }

    if !has_allowed_extension(&file.file_name, &config.allowed_extensions) {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type. Allowed: {}",
            config.allowed_extensions_display()
        )));
    }

    let request_id = Uuid::new_v4();
    info!(
        "Upload request: file_name={}, size={}, request_id={}",
        file.file_name,
        file.data.len(),
        request_id
    );

    let response = run_blocking("Upload", move || {
        let image = decode_bytes(&file.data).map_err(|e| {
            debug!("Upload {} is not a decodable image: {}", request_id, e);
            ApiError::BadRequest("Invalid image file".to_string())
        })?;

        let data_url = encode_data_url(&image, &OutputFormat::default())
            .map_err(|e| ApiError::InternalServerError(format!("Upload failed: {}", e)))?;

        Ok(UploadResponse {
            success: true,
            image: data_url,
            width: image.width(),
            height: image.height(),
        })
    })
    .await?;

    debug!(
        "Upload {} decoded: {}x{}",
        request_id, response.width, response.height
    );

    Ok(Json(response))
}

// --- POST /inpaint ---
// Fills the masked region of an image and returns the result as a PNG data-URL
pub async fn inpaint_image(
    payload: Result<Json<InpaintRequest>, JsonRejection>,
) -> Result<Json<InpaintResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|rejection| ApiError::from_json_rejection(rejection, MISSING_INPAINT_DATA))?;

    let (Some(image_data), Some(mask_data)) = (payload.image, payload.mask) else {
        return Err(ApiError::BadRequest(MISSING_INPAINT_DATA.to_string()));
    };

    let method = payload
        .method
        .as_deref()
        .map(InpaintMethod::from_name)
        .unwrap_or_default();

    let request_id = Uuid::new_v4();
    info!(
        "Inpaint request: method={}, request_id={}",
        method.name(),
        request_id
    );

    let result = run_blocking("Inpainting", move || {
        let (image, mask) = match (decode_data_url(&image_data), decode_data_url(&mask_data)) {
            (Ok(image), Ok(mask)) => (image, mask),
            (image, mask) => {
                debug!(
                    "Inpaint {} has undecodable input: image={:?}, mask={:?}",
                    request_id,
                    image.err(),
                    mask.err()
                );
                return Err(ApiError::BadRequest("Invalid image or mask data".to_string()));
            }
        };

        if image.dimensions() != mask.dimensions() {
            return Err(ApiError::BadRequest(format!(
                "Image and mask dimensions must match. Image: {}x{}, Mask: {}x{}",
                image.width(),
                image.height(),
                mask.width(),
                mask.height()
            )));
        }

        let started = Instant::now();
        let result = processing::remove_masked_region(&image, &mask, method)
            .map_err(|e| ApiError::InternalServerError(format!("Inpainting failed: {}", e)))?;
        debug!(
            "Inpaint {} completed: {}x{} in {} ms",
            request_id,
            result.width(),
            result.height(),
            started.elapsed().as_millis()
        );

        encode_data_url(&result, &OutputFormat::default())
            .map_err(|e| ApiError::InternalServerError(format!("Inpainting failed: {}", e)))
    })
    .await?;

    Ok(Json(InpaintResponse {
        success: true,
        result,
    }))
}

// --- POST /download ---
// Re-encodes a data-URL image into the requested format as an attachment
pub async fn download_image(
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) =
        payload.map_err(|rejection| ApiError::from_json_rejection(rejection, MISSING_DOWNLOAD_DATA))?;

    let Some(image_data) = payload.image else {
        return Err(ApiError::BadRequest(MISSING_DOWNLOAD_DATA.to_string()));
    };

    let format_name = payload
        .format
        .as_deref()
        .unwrap_or(DEFAULT_DOWNLOAD_FORMAT)
        .to_uppercase();
    debug!("Download request: format={}", format_name);

    let (format, bytes) = run_blocking("Download", move || {
        let image = decode_data_url(&image_data).map_err(|e| {
            debug!("Download payload is not a decodable image: {}", e);
            ApiError::BadRequest("Invalid image data".to_string())
        })?;

        let format = OutputFormat::from_name(&format_name)
            .map_err(|e| ApiError::InternalServerError(format!("Download failed: {}", e)))?;
        let bytes = encode_bytes(&image, &format)
            .map_err(|e| ApiError::InternalServerError(format!("Download failed: {}", e)))?;

        Ok((format, bytes))
    })
    .await?;

    let disposition = format!("attachment; filename=\"inpainted_image.{}\"", format.name());

    Ok((
        [
            (header::CONTENT_TYPE, format.mime().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
