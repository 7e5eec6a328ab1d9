use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::{distance_transform::Norm, morphology};

/// Mask values above this become foreground.
pub const MASK_THRESHOLD: u8 = 127;

/// Half-width of the square structuring element (5x5).
const DILATION_RADIUS: u8 = 2;
const DILATION_ITERATIONS: usize = 2;

/// BT.601 luma weights in 14-bit fixed point, rounded at the half.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// A thresholded mask and a grown copy of it that over-covers the painted
/// region so no halo of the original stroke survives the first pass.
#[derive(Debug, Clone)]
pub struct NormalizedMask {
    pub binary: GrayImage,
    pub dilated: GrayImage,
}

impl NormalizedMask {
    pub fn from_rgb(mask: &RgbImage) -> Self {
        Self::from_gray(&luma(mask))
    }

    pub fn from_gray(mask: &GrayImage) -> Self {
        let binary = threshold(mask);
        let dilated = dilate(&binary);
        Self { binary, dilated }
    }

    pub fn is_empty(&self) -> bool {
        self.binary.as_raw().iter().all(|&v| v == 0)
    }
}

/// BT.601 grayscale (`0.299 R + 0.587 G + 0.114 B`).
pub fn luma(mask: &RgbImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let Rgb([r, g, b]) = *mask.get_pixel(x, y);
        let sum = u32::from(r) * LUMA_R + u32::from(g) * LUMA_G + u32::from(b) * LUMA_B;
        Luma([((sum + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8])
    })
}

pub fn threshold(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for p in out.iter_mut() {
        *p = if *p > MASK_THRESHOLD { 255 } else { 0 };
    }
    out
}

/// Chebyshev dilation by 2 is exactly a 5x5 square structuring element.
pub fn dilate(binary: &GrayImage) -> GrayImage {
    let mut out = binary.clone();
    for _ in 0..DILATION_ITERATIONS {
        morphology::dilate_mut(&mut out, Norm::LInf, DILATION_RADIUS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strictly_above_127() {
        let mask = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 127, 128, 255][x as usize]]));
        let binary = threshold(&mask);
        assert_eq!(binary.as_raw(), &vec![0, 0, 255, 255]);
    }

    #[test]
    fn colour_mask_collapses_to_luminance() {
        let mut mask = RgbImage::new(3, 1);
        mask.put_pixel(0, 0, Rgb([255, 255, 255]));
        mask.put_pixel(1, 0, Rgb([40, 40, 40]));
        mask.put_pixel(2, 0, Rgb([0, 0, 0]));

        let normalized = NormalizedMask::from_rgb(&mask);
        assert_eq!(normalized.binary.get_pixel(0, 0)[0], 255);
        assert_eq!(normalized.binary.get_pixel(1, 0)[0], 0);
        assert_eq!(normalized.binary.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn luma_uses_bt601_weights() {
        let mut mask = RgbImage::new(4, 1);
        mask.put_pixel(0, 0, Rgb([255, 0, 0]));
        mask.put_pixel(1, 0, Rgb([0, 255, 0]));
        mask.put_pixel(2, 0, Rgb([0, 0, 255]));
        mask.put_pixel(3, 0, Rgb([255, 255, 255]));
        assert_eq!(luma(&mask).as_raw(), &vec![76, 150, 29, 255]);
    }

    #[test]
    fn reddish_stroke_is_foreground() {
        // 0.299 * 200 + 0.587 * 100 + 0.114 * 100 = 129.9
        let mask = RgbImage::from_pixel(4, 4, Rgb([200, 100, 100]));
        let normalized = NormalizedMask::from_rgb(&mask);
        assert_eq!(luma(&mask).get_pixel(0, 0)[0], 130);
        assert!(normalized.binary.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn two_iterations_of_5x5_grow_a_point_to_9x9() {
        let mut mask = GrayImage::new(21, 21);
        mask.put_pixel(10, 10, Luma([255]));

        let normalized = NormalizedMask::from_gray(&mask);
        let covered: Vec<_> = normalized
            .dilated
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();

        assert_eq!(covered.len(), 81);
        assert!(covered.iter().all(|&(x, y)| (6..=14).contains(&x) && (6..=14).contains(&y)));
        assert_eq!(normalized.binary.as_raw().iter().filter(|&&v| v == 255).count(), 1);
    }

    #[test]
    fn empty_mask_stays_empty() {
        let normalized = NormalizedMask::from_gray(&GrayImage::new(8, 8));
        assert!(normalized.is_empty());
        assert!(normalized.dilated.as_raw().iter().all(|&v| v == 0));
    }
}
