//! Fast-marching inpainting.
//!
//! Both methods walk the masked region from its boundary inwards in order of
//! arrival time (distance to the known region) and fill each pixel from the
//! known pixels within `radius` of it. They differ only in how those
//! neighbours are weighted:
//!
//! - [`InpaintMethod::Telea`] weights by distance, level-set proximity and
//!   alignment with the marching direction, and extrapolates each neighbour
//!   along its local image gradient.
//! - [`InpaintMethod::NavierStokes`] weights by how well the neighbour lies on
//!   an isophote (line of constant intensity) passing through the target, so
//!   edges are continued into the hole.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, RgbImage};

/// Largest neighbourhood radius honoured; larger requests are clamped.
pub const MAX_RADIUS: u32 = 100;

const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InpaintMethod {
    #[default]
    Telea,
    NavierStokes,
}

impl InpaintMethod {
    /// Maps the wire name to a method. Only `"ns"` selects Navier-Stokes,
    /// anything else falls back to Telea.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ns" => InpaintMethod::NavierStokes,
            _ => InpaintMethod::Telea,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InpaintMethod::Telea => "telea",
            InpaintMethod::NavierStokes => "ns",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InpaintError {
    #[error("mask is {mask_width}x{mask_height} but image is {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        mask_width: u32,
        mask_height: u32,
    },
}

/// In-place inpainting on RGB images. Non-zero mask pixels are reconstructed.
pub trait Inpaint {
    fn telea_inpaint(&mut self, mask: &GrayImage, radius: u32) -> Result<(), InpaintError>;
    fn navier_stokes_inpaint(&mut self, mask: &GrayImage, radius: u32) -> Result<(), InpaintError>;

    fn inpaint_with(
        &mut self,
        method: InpaintMethod,
        mask: &GrayImage,
        radius: u32,
    ) -> Result<(), InpaintError> {
        match method {
            InpaintMethod::Telea => self.telea_inpaint(mask, radius),
            InpaintMethod::NavierStokes => self.navier_stokes_inpaint(mask, radius),
        }
    }
}

impl Inpaint for RgbImage {
    fn telea_inpaint(&mut self, mask: &GrayImage, radius: u32) -> Result<(), InpaintError> {
        run(self, mask, radius, InpaintMethod::Telea)
    }

    fn navier_stokes_inpaint(&mut self, mask: &GrayImage, radius: u32) -> Result<(), InpaintError> {
        run(self, mask, radius, InpaintMethod::NavierStokes)
    }
}

fn run(
    image: &mut RgbImage,
    mask: &GrayImage,
    radius: u32,
    method: InpaintMethod,
) -> Result<(), InpaintError> {
    if image.dimensions() != mask.dimensions() {
        return Err(InpaintError::DimensionMismatch {
            width: image.width(),
            height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    let radius = radius.clamp(1, MAX_RADIUS);
    let mut field = Field::from_mask(mask);
    let mut front = field.initial_front();

    // Nothing to fill, or nothing known to fill from.
    if field.inside_count == 0 || front.is_empty() {
        return Ok(());
    }

    let window = Window::new(radius);
    let mut gradients = GradientCache::new(field.width, field.height);
    match method {
        InpaintMethod::Telea => {
            field.measure_outside(2.0 * radius as f32 + 2.0);
            field.march(&mut front, |field, x, y| {
                let value = field.telea_value(image, &window, &mut gradients, x, y);
                image.put_pixel(x as u32, y as u32, image::Rgb(value));
                gradients.invalidate_around(field, x, y);
            });
        }
        InpaintMethod::NavierStokes => {
            field.march(&mut front, |field, x, y| {
                let value = field.navier_stokes_value(image, &window, &mut gradients, x, y);
                image.put_pixel(x as u32, y as u32, image::Rgb(value));
                gradients.invalidate_around(field, x, y);
            });
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

/// Entry in the marching front, ordered so that `BinaryHeap` pops the
/// smallest arrival time first and breaks ties in insertion order.
#[derive(Debug, Clone, Copy)]
struct Front {
    time: f32,
    order: u64,
    x: usize,
    y: usize,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Precomputed offsets of the circular neighbourhood, centre excluded.
struct Window {
    offsets: Vec<(isize, isize)>,
}

impl Window {
    fn new(radius: u32) -> Self {
        let r = radius as isize;
        let mut offsets = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx, dy) != (0, 0) && dx * dx + dy * dy <= r * r {
                    offsets.push((dx, dy));
                }
            }
        }
        Self { offsets }
    }
}

type Gradient = [(f32, f32); CHANNELS];

/// Image gradients of known pixels, computed on first use. A gradient only
/// reads the pixel and its 4-neighbours, so filling a pixel stales exactly
/// those entries.
struct GradientCache {
    width: usize,
    values: Vec<Option<Gradient>>,
}

impl GradientCache {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            values: vec![None; width * height],
        }
    }

    fn get(&mut self, field: &Field, image: &RgbImage, x: usize, y: usize) -> Gradient {
        *self.values[y * self.width + x].get_or_insert_with(|| field.image_gradient(image, x, y))
    }

    fn invalidate_around(&mut self, field: &Field, x: usize, y: usize) {
        self.values[field.index(x, y)] = None;
        for (nx, ny) in field.neighbours(x, y) {
            self.values[field.index(nx, ny)] = None;
        }
    }
}

struct Field {
    width: usize,
    height: usize,
    flags: Vec<Flag>,
    time: Vec<f32>,
    inside_count: usize,
    order: u64,
}

impl Field {
    fn from_mask(mask: &GrayImage) -> Self {
        let (width, height) = (mask.width() as usize, mask.height() as usize);
        let flags: Vec<Flag> = mask
            .as_raw()
            .iter()
            .map(|&v| if v != 0 { Flag::Inside } else { Flag::Known })
            .collect();
        let inside_count = flags.iter().filter(|&&f| f == Flag::Inside).count();

        let mut field = Self {
            width,
            height,
            flags,
            time: vec![f32::INFINITY; width * height],
            inside_count,
            order: 0,
        };

        // The band is every known pixel 4-adjacent to the hole.
        for y in 0..height {
            for x in 0..width {
                let i = field.index(x, y);
                if field.flags[i] == Flag::Known
                    && field
                        .neighbours(x, y)
                        .any(|(nx, ny)| field.flags[field.index(nx, ny)] == Flag::Inside)
                {
                    field.flags[i] = Flag::Band;
                    field.time[i] = 0.0;
                }
            }
        }

        field
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    fn neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + use<> {
        let (w, h) = (self.width, self.height);
        [(0isize, -1isize), (-1, 0), (0, 1), (1, 0)]
            .into_iter()
            .filter_map(move |(dx, dy)| {
                let nx = x.checked_add_signed(dx)?;
                let ny = y.checked_add_signed(dy)?;
                (nx < w && ny < h).then_some((nx, ny))
            })
    }

    fn initial_front(&mut self) -> BinaryHeap<Front> {
        let mut heap = BinaryHeap::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.flags[self.index(x, y)] == Flag::Band {
                    heap.push(self.front(0.0, x, y));
                }
            }
        }
        heap
    }

    fn front(&mut self, time: f32, x: usize, y: usize) -> Front {
        self.order += 1;
        Front {
            time,
            order: self.order,
            x,
            y,
        }
    }

    fn offset(&self, x: usize, y: usize, dx: isize, dy: isize) -> Option<usize> {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < self.width && ny < self.height).then(|| self.index(nx, ny))
    }

    /// True when the pixel exists and is not waiting to be filled.
    fn is_known(&self, x: usize, y: usize, dx: isize, dy: isize) -> bool {
        self.offset(x, y, dx, dy)
            .is_some_and(|i| self.flags[i] != Flag::Inside)
    }

    fn known_time(&self, x: usize, y: usize, dx: isize, dy: isize) -> Option<f32> {
        let i = self.offset(x, y, dx, dy)?;
        (self.flags[i] != Flag::Inside && self.time[i].is_finite()).then_some(self.time[i])
    }

    /// First-order upwind solution of |grad T| = 1 from two orthogonal neighbours.
    fn solve(a: Option<f32>, b: Option<f32>) -> f32 {
        match (a, b) {
            (Some(t1), Some(t2)) => {
                let diff = t1 - t2;
                if diff.abs() >= 1.0 {
                    1.0 + t1.min(t2)
                } else {
                    (t1 + t2 + (2.0 - diff * diff).sqrt()) * 0.5
                }
            }
            (Some(t), None) | (None, Some(t)) => 1.0 + t,
            (None, None) => f32::INFINITY,
        }
    }

    fn arrival_time(&self, x: usize, y: usize) -> f32 {
        let up = self.known_time(x, y, 0, -1);
        let down = self.known_time(x, y, 0, 1);
        let left = self.known_time(x, y, -1, 0);
        let right = self.known_time(x, y, 1, 0);
        Self::solve(up, left)
            .min(Self::solve(down, left))
            .min(Self::solve(up, right))
            .min(Self::solve(down, right))
    }

    /// Pops the front in arrival order, computing the time of every pixel it
    /// reaches and handing it to `fill` before it joins the band.
    fn march<F>(&mut self, heap: &mut BinaryHeap<Front>, fill: F)
    where
        F: FnMut(&Field, usize, usize),
    {
        self.march_until(heap, f32::INFINITY, fill);
    }

    fn march_until<F>(&mut self, heap: &mut BinaryHeap<Front>, limit: f32, mut fill: F)
    where
        F: FnMut(&Field, usize, usize),
    {
        while let Some(Front { x, y, .. }) = heap.pop() {
            let i = self.index(x, y);
            self.flags[i] = Flag::Known;

            let neighbours: Vec<_> = self.neighbours(x, y).collect();
            for (nx, ny) in neighbours {
                let ni = self.index(nx, ny);
                if self.flags[ni] != Flag::Inside {
                    continue;
                }
                let time = self.arrival_time(nx, ny);
                if time > limit {
                    continue;
                }
                self.time[ni] = time;
                fill(self, nx, ny);
                self.flags[ni] = Flag::Band;
                let entry = self.front(time, nx, ny);
                heap.push(entry);
            }
        }
    }

    /// Marches outwards from the band through the known region and stores the
    /// result as negative times, so the time field is signed across the
    /// boundary and its gradient is defined on both sides.
    fn measure_outside(&mut self, limit: f32) {
        let mut outside = Field {
            width: self.width,
            height: self.height,
            flags: self
                .flags
                .iter()
                .map(|flag| match flag {
                    Flag::Known => Flag::Inside,
                    Flag::Band => Flag::Band,
                    Flag::Inside => Flag::Known,
                })
                .collect(),
            time: self.time.clone(),
            inside_count: 0,
            order: 0,
        };
        let mut heap = outside.initial_front();
        outside.march_until(&mut heap, limit, |_, _, _| {});

        for (i, flag) in self.flags.iter().enumerate() {
            if *flag == Flag::Known && outside.time[i].is_finite() {
                self.time[i] = -outside.time[i];
            }
        }
    }

    fn time_gradient(&self, x: usize, y: usize) -> (f32, f32) {
        let t = self.time[self.index(x, y)];
        let axis = |dx: isize, dy: isize| -> f32 {
            match (self.known_time(x, y, dx, dy), self.known_time(x, y, -dx, -dy)) {
                (Some(next), Some(prev)) => (next - prev) * 0.5,
                (Some(next), None) => next - t,
                (None, Some(prev)) => t - prev,
                (None, None) => 0.0,
            }
        };
        (axis(1, 0), axis(0, 1))
    }

    /// Gradient of every channel at a known pixel, using only known samples.
    fn image_gradient(&self, image: &RgbImage, x: usize, y: usize) -> Gradient {
        let sample = |dx: isize, dy: isize| -> Option<[f32; CHANNELS]> {
            if !self.is_known(x, y, dx, dy) {
                return None;
            }
            let px = image.get_pixel(
                (x as isize + dx) as u32,
                (y as isize + dy) as u32,
            );
            Some(px.0.map(f32::from))
        };
        let centre = image.get_pixel(x as u32, y as u32).0.map(f32::from);
        let axis = |dx: isize, dy: isize, c: usize| -> f32 {
            match (sample(dx, dy), sample(-dx, -dy)) {
                (Some(next), Some(prev)) => (next[c] - prev[c]) * 0.5,
                (Some(next), None) => next[c] - centre[c],
                (None, Some(prev)) => centre[c] - prev[c],
                (None, None) => 0.0,
            }
        };
        std::array::from_fn(|c| (axis(1, 0, c), axis(0, 1, c)))
    }

    fn telea_value(
        &self,
        image: &RgbImage,
        window: &Window,
        gradients: &mut GradientCache,
        x: usize,
        y: usize,
    ) -> [u8; CHANNELS] {
        let t = self.time[self.index(x, y)];
        let (gtx, gty) = self.time_gradient(x, y);

        let mut sum = [0.0f32; CHANNELS];
        let mut total = 0.0f32;

        for &(dx, dy) in &window.offsets {
            let Some(i) = self.offset(x, y, dx, dy) else {
                continue;
            };
            if self.flags[i] == Flag::Inside || !self.time[i].is_finite() {
                continue;
            }
            let (sx, sy) = ((x as isize + dx) as usize, (y as isize + dy) as usize);

            // Vector from the source pixel to the one being filled.
            let (rx, ry) = (-dx as f32, -dy as f32);
            let len2 = rx * rx + ry * ry;
            let dst = 1.0 / (len2 * len2.sqrt());
            let lev = 1.0 / (1.0 + (self.time[i] - t).abs());
            let mut dir = rx * gtx + ry * gty;
            if dir.abs() <= 0.01 {
                dir = 1.0e-6;
            }
            let weight = (dst * lev * dir).abs();

            let source = image.get_pixel(sx as u32, sy as u32).0;
            let gradient = gradients.get(self, image, sx, sy);
            for c in 0..CHANNELS {
                let (gx, gy) = gradient[c];
                sum[c] += weight * (f32::from(source[c]) + gx * rx + gy * ry);
            }
            total += weight;
        }

        let current = image.get_pixel(x as u32, y as u32).0;
        if total <= 0.0 {
            return current;
        }
        sum.map(|v| (v / total).round().clamp(0.0, 255.0) as u8)
    }

    fn navier_stokes_value(
        &self,
        image: &RgbImage,
        window: &Window,
        gradients: &mut GradientCache,
        x: usize,
        y: usize,
    ) -> [u8; CHANNELS] {
        let mut sum = [0.0f32; CHANNELS];
        let mut total = [0.0f32; CHANNELS];

        for &(dx, dy) in &window.offsets {
            let Some(i) = self.offset(x, y, dx, dy) else {
                continue;
            };
            if self.flags[i] == Flag::Inside {
                continue;
            }
            let (sx, sy) = ((x as isize + dx) as usize, (y as isize + dy) as usize);

            let (rx, ry) = (dx as f32, dy as f32);
            let len2 = rx * rx + ry * ry;
            let dst = 1.0 / (len2 * len2 + 1.0);

            let source = image.get_pixel(sx as u32, sy as u32).0;
            let gradient = gradients.get(self, image, sx, sy);
            for c in 0..CHANNELS {
                // Isophote direction is the gradient rotated by 90 degrees.
                let (gx, gy) = gradient[c];
                let (ix, iy) = (-gy, gx);
                let norm = (len2 * (ix * ix + iy * iy)).sqrt();
                let dir = if norm <= f32::EPSILON {
                    1.0e-6
                } else {
                    ((rx * ix + ry * iy) / norm).abs().max(1.0e-6)
                };
                let weight = dst * dir;
                sum[c] += weight * f32::from(source[c]);
                total[c] += weight;
            }
        }

        let current = image.get_pixel(x as u32, y as u32).0;
        std::array::from_fn(|c| {
            if total[c] <= 0.0 {
                current[c]
            } else {
                (sum[c] / total[c]).round().clamp(0.0, 255.0) as u8
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn square_mask(width: u32, height: u32, x0: u32, y0: u32, size: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn method_names() {
        assert_eq!(InpaintMethod::from_name("ns"), InpaintMethod::NavierStokes);
        assert_eq!(InpaintMethod::from_name("telea"), InpaintMethod::Telea);
        assert_eq!(InpaintMethod::from_name("anything"), InpaintMethod::Telea);
        assert_eq!(InpaintMethod::default(), InpaintMethod::Telea);
        assert_eq!(InpaintMethod::NavierStokes.name(), "ns");
    }

    #[test]
    fn empty_mask_leaves_image_untouched() {
        let original = RgbImage::from_fn(16, 12, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, 7]));
        let mask = GrayImage::new(16, 12);

        for method in [InpaintMethod::Telea, InpaintMethod::NavierStokes] {
            let mut image = original.clone();
            image.inpaint_with(method, &mask, 15).unwrap();
            assert_eq!(image, original);
        }
    }

    #[test]
    fn full_mask_has_nothing_to_fill_from() {
        let original = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        let mask = GrayImage::from_pixel(8, 8, Luma([255]));

        let mut image = original.clone();
        image.telea_inpaint(&mask, 5).unwrap();
        assert_eq!(image, original);
    }

    #[test]
    fn fills_hole_in_flat_image() {
        let colour = Rgb([120, 60, 200]);
        let mask = square_mask(32, 32, 10, 10, 8);

        for method in [InpaintMethod::Telea, InpaintMethod::NavierStokes] {
            let mut image = RgbImage::from_pixel(32, 32, colour);
            for (x, y, _) in mask.enumerate_pixels().filter(|(_, _, p)| p[0] != 0) {
                image.put_pixel(x, y, Rgb([0, 255, 0]));
            }

            image.inpaint_with(method, &mask, 5).unwrap();

            for pixel in image.pixels() {
                assert_eq!(*pixel, colour, "{:?} left a seam", method);
            }
        }
    }

    #[test]
    fn continues_horizontal_gradient() {
        let ramp = |x: u32| (x * 8) as u8;
        let mask = square_mask(32, 16, 12, 4, 6);
        let mut image = RgbImage::from_fn(32, 16, |x, _| Rgb([ramp(x), 0, 0]));
        for (x, y, _) in mask.enumerate_pixels().filter(|(_, _, p)| p[0] != 0) {
            image.put_pixel(x, y, Rgb([255, 255, 255]));
        }

        image.telea_inpaint(&mask, 5).unwrap();

        for x in 12..18 {
            let got = i32::from(image.get_pixel(x, 7)[0]);
            let want = i32::from(ramp(x));
            assert!((got - want).abs() <= 12, "x={} got={} want={}", x, got, want);
            assert_eq!(image.get_pixel(x, 7)[1], 0);
        }
    }

    #[test]
    fn hole_touching_the_border() {
        let colour = Rgb([10, 20, 30]);
        let mask = square_mask(20, 20, 0, 0, 5);
        let mut image = RgbImage::from_pixel(20, 20, colour);
        image.put_pixel(0, 0, Rgb([255, 255, 255]));

        image.navier_stokes_inpaint(&mask, 15).unwrap();
        assert_eq!(*image.get_pixel(0, 0), colour);
    }

    #[test]
    fn rejects_mismatched_mask() {
        let mut image = RgbImage::new(10, 10);
        let mask = GrayImage::new(5, 10);
        let err = image.telea_inpaint(&mask, 3).unwrap_err();
        assert!(err.to_string().contains("5x10"));
        assert!(err.to_string().contains("10x10"));
    }

    #[test]
    fn cached_gradient_follows_filled_pixels() {
        let mask = square_mask(8, 8, 4, 3, 2);
        let mut image = RgbImage::from_fn(8, 8, |x, _| Rgb([(x * 20) as u8, 0, 0]));
        let mut field = Field::from_mask(&mask);
        let mut gradients = GradientCache::new(8, 8);

        // (3, 3) only sees its left neighbour while (4, 3) is still inside.
        let before = gradients.get(&field, &image, 3, 3);
        assert_eq!(before[0].0, 20.0);
        assert_eq!(gradients.get(&field, &image, 3, 3), before);

        image.put_pixel(4, 3, Rgb([200, 0, 0]));
        let i = field.index(4, 3);
        field.flags[i] = Flag::Band;
        gradients.invalidate_around(&field, 4, 3);

        let after = gradients.get(&field, &image, 3, 3);
        assert_eq!(after, field.image_gradient(&image, 3, 3));
        assert_eq!(after[0].0, (200.0 - 40.0) * 0.5);
    }

    #[test]
    fn large_hole_keeps_known_pixels_and_flat_channels() {
        let mask = square_mask(48, 40, 10, 8, 24);
        let source = RgbImage::from_fn(48, 40, |x, y| Rgb([(x * 5) as u8, (y * 6) as u8, 90]));

        for method in [InpaintMethod::Telea, InpaintMethod::NavierStokes] {
            let mut image = source.clone();
            for (x, y, _) in mask.enumerate_pixels().filter(|(_, _, p)| p[0] != 0) {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }

            image.inpaint_with(method, &mask, 15).unwrap();

            for (x, y, p) in image.enumerate_pixels() {
                if mask.get_pixel(x, y)[0] == 0 {
                    assert_eq!(p, source.get_pixel(x, y));
                } else {
                    assert_eq!(p[2], 90, "{:?} at ({}, {})", method, x, y);
                }
            }
        }
    }

    #[test]
    fn front_pops_smallest_time_first() {
        let mut heap = BinaryHeap::new();
        heap.push(Front { time: 2.0, order: 1, x: 0, y: 0 });
        heap.push(Front { time: 0.5, order: 2, x: 1, y: 0 });
        heap.push(Front { time: 0.5, order: 3, x: 2, y: 0 });
        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|f| f.x).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
