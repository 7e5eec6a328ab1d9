// Pixel pipeline behind POST /inpaint.
// Mask normalisation, two inpainting passes and the cosmetic finish.

pub mod inpaint;
pub mod mask;
pub mod postprocess;

pub use inpaint::{Inpaint, InpaintError, InpaintMethod};
pub use mask::NormalizedMask;

use image::RgbImage;
use tracing::debug;

/// Radius of the first pass, run on the dilated mask.
pub const COARSE_RADIUS: u32 = 15;

impl InpaintMethod {
    /// Radius of the second pass, run on the tight mask.
    pub fn fine_radius(&self) -> u32 {
        match self {
            InpaintMethod::Telea => 10,
            InpaintMethod::NavierStokes => 15,
        }
    }
}

/// Fills the painted region of `mask` in `image` and returns the finished result.
pub fn remove_masked_region(
    image: &RgbImage,
    mask: &RgbImage,
    method: InpaintMethod,
) -> Result<RgbImage, InpaintError> {
    let mask = NormalizedMask::from_rgb(mask);

    let mut result = image.clone();
    if mask.is_empty() {
        debug!("Mask is empty, skipping inpainting passes");
    } else {
        result.inpaint_with(method, &mask.dilated, COARSE_RADIUS)?;
        result.inpaint_with(method, &mask.binary, method.fine_radius())?;
    }

    Ok(postprocess::finish(&result, &mask.dilated))
}
