// Runtime configuration handed to the HTTP layer at startup.

use std::path::PathBuf;

/// Request bodies above this are rejected before reaching a handler.
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024; // 16MB

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

pub const DEFAULT_TEMP_DIR: &str = "temp_uploads";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_body_size: usize,
    /// Lower-case upload extensions, in the order they are listed to clients.
    pub allowed_extensions: Vec<String>,
    /// Created at startup, not written to by any handler.
    pub temp_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .into_iter()
                .map(String::from)
                .collect(),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
        }
    }
}

impl ServerConfig {
    pub fn new(max_body_size: usize, allowed_extensions: &[String], temp_dir: PathBuf) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for ext in allowed_extensions {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }

        Self {
            max_body_size,
            allowed_extensions: normalized,
            temp_dir,
        }
    }

    /// e.g. "PNG, JPG, JPEG, WEBP"
    pub fn allowed_extensions_display(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
