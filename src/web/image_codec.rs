use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbImage, codecs::jpeg::JpegEncoder};
use tracing::debug;

/// Quality used for lossy output formats.
pub const LOSSY_QUALITY: u8 = 95;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unrecognized image data: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),
    #[error("{format} encoding failed: {source}")]
    Image {
        format: String,
        #[source]
        source: image::ImageError,
    },
}

/// Output encoding chosen by name, e.g. `PNG`, `jpeg` or `WebP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    name: String,
    format: ImageFormat,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            name: "png".to_string(),
            format: ImageFormat::Png,
        }
    }
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Result<Self, EncodeError> {
        let name = name.trim().to_ascii_lowercase();
        let format = ImageFormat::from_extension(&name)
            .filter(|format| format.writing_enabled())
            .ok_or_else(|| EncodeError::UnsupportedFormat(name.to_ascii_uppercase()))?;
        Ok(Self { name, format })
    }

    /// Lower-cased name as requested, used for the MIME subtype and file extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> mime::Mime {
        format!("image/{}", self.name)
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }
}

pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let image = image::load_from_memory(bytes)?;
    debug!("Decoded {}x{} image ({:?})", image.width(), image.height(), image.color());
    Ok(image.to_rgb8())
}

/// Decodes a `data:<mime>;base64,<payload>` string, or a bare base64 payload.
pub fn decode_data_url(data_url: &str) -> Result<RgbImage, DecodeError> {
    let payload = match data_url.split(',').nth(1) {
        Some(payload) => payload,
        None => data_url,
    };
    let bytes = general_purpose::STANDARD.decode(payload.trim())?;
    decode_bytes(&bytes)
}

pub fn encode_bytes(image: &RgbImage, format: &OutputFormat) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Cursor::new(Vec::new());
    let result = match format.format {
        ImageFormat::Jpeg => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, LOSSY_QUALITY))
        }
        other => image.write_to(&mut buffer, other),
    };
    result.map_err(|source| EncodeError::Image {
        format: format.name.to_ascii_uppercase(),
        source,
    })?;
    Ok(buffer.into_inner())
}

pub fn encode_data_url(image: &RgbImage, format: &OutputFormat) -> Result<String, EncodeError> {
    let bytes = encode_bytes(image, format)?;
    Ok(format!(
        "data:image/{};base64,{}",
        format.name,
        general_purpose::STANDARD.encode(bytes)
    ))
}
