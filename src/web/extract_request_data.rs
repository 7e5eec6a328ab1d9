use axum::extract::Multipart;
use tracing::debug;

use super::error::ApiError;

/// A file pulled out of a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Reads the first field named `field_name` from the form, ignoring the others.
pub async fn extract_multipart_file(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            debug!(
                "Ignoring multipart field: {}",
                field.name().unwrap_or("unnamed")
            );
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?.to_vec();
        debug!("Received '{}' ({} bytes)", file_name, data.len());
        return Ok(UploadedFile { file_name, data });
    }

    Err(ApiError::BadRequest("No image file provided".to_string()))
}

/// Extension after the last `.`, lower-cased. `None` when there is no dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

pub fn has_allowed_extension(file_name: &str, allowed: &[String]) -> bool {
    file_extension(file_name).is_some_and(|ext| allowed.contains(&ext))
}
