// Request and response bodies for the JSON endpoints

use serde::{Deserialize, Serialize};

/// Body of `POST /inpaint`. Fields are optional so that absence can be
/// reported with a dedicated message instead of a deserialisation error.
#[derive(Deserialize, Debug, Default)]
pub struct InpaintRequest {
    pub image: Option<String>,
    pub mask: Option<String>,
    pub method: Option<String>,
}

/// Body of `POST /download`.
#[derive(Deserialize, Debug, Default)]
pub struct DownloadRequest {
    pub image: Option<String>,
    pub format: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub success: bool,
    pub image: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InpaintResponse {
    pub success: bool,
    pub result: String,
}
