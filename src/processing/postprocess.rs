use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::{definitions::Image, filter, map::map_subpixels};

pub const BLUR_SIGMA: f32 = 0.5;
pub const SHARPEN_WEIGHT: f32 = 0.3;

/// Border added before filtering; covers the blur and sharpen footprints.
const BORDER: u32 = 3;

#[rustfmt::skip]
pub const SHARPEN_KERNEL: [f32; 9] = [
    -0.5, -0.5, -0.5,
    -0.5,  5.0, -0.5,
    -0.5, -0.5, -0.5,
];

/// Softens seams over the whole result, then mixes a sharpened copy back in
/// wherever `dilated_mask` is zero. Pixels inside the dilated mask keep the
/// blurred inpainted value.
pub fn finish(inpainted: &RgbImage, dilated_mask: &GrayImage) -> RgbImage {
    let (width, height) = inpainted.dimensions();
    let padded = pad_reflect_101(inpainted, BORDER);
    let blurred = quantize(&filter::gaussian_blur_f32(
        &map_subpixels(&padded, |v: u8| f32::from(v)),
        BLUR_SIGMA,
    ));
    let sharpened = filter::filter3x3::<_, f32, f32>(&blurred, &SHARPEN_KERNEL);
    let blurred = imageops::crop_imm(&blurred, BORDER, BORDER, width, height).to_image();
    let sharpened = imageops::crop_imm(&sharpened, BORDER, BORDER, width, height).to_image();

    let mut out = RgbImage::new(blurred.width(), blurred.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let untouched = 255 - dilated_mask.get_pixel(x, y)[0];
        let weight = f32::from(untouched) / 255.0 * SHARPEN_WEIGHT;
        let soft = blurred.get_pixel(x, y).0;
        let sharp = sharpened.get_pixel(x, y).0;
        for c in 0..3 {
            let sharp = sharp[c].round().clamp(0.0, 255.0);
            let mixed = f32::from(soft[c]) * (1.0 - weight) + sharp * weight;
            pixel.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Mirrors `border` pixels onto every side without repeating the edge
/// (`dcb|abcd|cba`).
fn pad_reflect_101(image: &RgbImage, border: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let reflect = |i: i64, n: u32| -> u32 {
        let n = i64::from(n);
        if n == 1 {
            return 0;
        }
        let period = 2 * n - 2;
        let i = i.rem_euclid(period);
        (if i >= n { period - i } else { i }) as u32
    };
    let offset = i64::from(border);
    RgbImage::from_fn(width + 2 * border, height + 2 * border, |x, y| {
        *image.get_pixel(
            reflect(i64::from(x) - offset, width),
            reflect(i64::from(y) - offset, height),
        )
    })
}

fn quantize(image: &Image<Rgb<f32>>) -> RgbImage {
    map_subpixels(image, |v: f32| v.round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn flat_image_is_a_fixed_point() {
        let image = RgbImage::from_pixel(12, 9, Rgb([90, 140, 33]));
        let mask = GrayImage::new(12, 9);
        assert_eq!(finish(&image, &mask), image);
    }

    #[test]
    fn sharpening_only_outside_the_mask() {
        // A single bright dot: the sharpen kernel overshoots it, the blur alone does not.
        let mut image = RgbImage::from_pixel(9, 9, Rgb([100, 100, 100]));
        image.put_pixel(4, 4, Rgb([200, 200, 200]));

        let outside = finish(&image, &GrayImage::new(9, 9));
        let inside = finish(&image, &GrayImage::from_pixel(9, 9, Luma([255])));

        let blurred_only = inside.get_pixel(4, 4)[0];
        let with_sharpen = outside.get_pixel(4, 4)[0];
        assert!(blurred_only < 200);
        assert!(with_sharpen > blurred_only);
    }

    #[test]
    fn reflect_101_padding() {
        let image = RgbImage::from_fn(3, 1, |x, _| Rgb([[10, 20, 30][x as usize], 0, 0]));
        let padded = pad_reflect_101(&image, 2);
        assert_eq!(padded.dimensions(), (7, 5));
        let row: Vec<u8> = (0..7).map(|x| padded.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![30, 20, 10, 20, 30, 20, 10]);
        assert!((0..5).all(|y| padded.get_pixel(2, y)[0] == 10));
    }

    #[test]
    fn border_line_filters_like_an_interior_line() {
        let line = |at: u32| {
            RgbImage::from_fn(11, 7, |x, _| if x == at { Rgb([200, 200, 200]) } else { Rgb([0, 0, 0]) })
        };
        let mask = GrayImage::new(11, 7);
        let edge = finish(&line(0), &mask);
        let middle = finish(&line(5), &mask);

        for y in 0..7 {
            for d in 0..3 {
                assert_eq!(edge.get_pixel(d, y), middle.get_pixel(5 + d, y), "x={} y={}", d, y);
            }
        }
    }

    #[test]
    fn kernel_preserves_brightness() {
        let sum: f32 = SHARPEN_KERNEL.iter().sum();
        assert!((sum - 1.0).abs() < f32::EPSILON);
    }
}
