//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Image filters.
//

use crate::image::{Image, PixelFormat};
use crate::utils::{self, saturate_u8};
use log::debug;


/// Maximum filter intensity; higher values are clamped.
pub const MAX_INTENSITY: i32 = 100;

/// Filters with intensity up to this value have no effect.
pub const NO_EFFECT_INTENSITY: i32 = 2;


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FilterKind {
    /// Homogeneous (box) smoothing.
    Box,
    Gaussian,
    Median,
    Bilateral,
    Sharpen,
    Contrast,
    Brightness
}


impl FilterKind {
    /// All filters in the order they are applied by `FilterPipeline`.
    pub const PIPELINE_ORDER: [FilterKind; 7] = [
        FilterKind::Box,
        FilterKind::Gaussian,
        FilterKind::Median,
        FilterKind::Bilateral,
        FilterKind::Sharpen,
        FilterKind::Contrast,
        FilterKind::Brightness
    ];


    fn get_pipeline_index(&self) -> usize {
        match self {
            FilterKind::Box        => 0,
            FilterKind::Gaussian   => 1,
            FilterKind::Median     => 2,
            FilterKind::Bilateral  => 3,
            FilterKind::Sharpen    => 4,
            FilterKind::Contrast   => 5,
            FilterKind::Brightness => 6
        }
    }
}


impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        let name = match self {
            FilterKind::Box        => "box",
            FilterKind::Gaussian   => "gaussian",
            FilterKind::Median     => "median",
            FilterKind::Bilateral  => "bilateral",
            FilterKind::Sharpen    => "sharpen",
            FilterKind::Contrast   => "contrast",
            FilterKind::Brightness => "brightness"
        };
        write!(f, "{}", name)
    }
}


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub intensity: i32
}


impl FilterSpec {
    pub fn new(kind: FilterKind, intensity: i32) -> FilterSpec {
        FilterSpec{ kind, intensity: clamp_intensity(intensity) }
    }


    pub fn has_effect(&self) -> bool {
        self.intensity > NO_EFFECT_INTENSITY
    }


    pub fn apply(&self, img: &Image) -> Image {
        apply_filter(img, self.kind, self.intensity)
    }
}


/// Filters applied in a fixed order (see `FilterKind::PIPELINE_ORDER`), one intensity per kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FilterPipeline {
    intensities: [i32; 7]
}


impl FilterPipeline {
    /// Creates a pipeline with no effect.
    pub fn new() -> FilterPipeline {
        FilterPipeline::default()
    }


    pub fn with(mut self, kind: FilterKind, intensity: i32) -> FilterPipeline {
        self.set_intensity(kind, intensity);
        self
    }


    pub fn set_intensity(&mut self, kind: FilterKind, intensity: i32) {
        self.intensities[kind.get_pipeline_index()] = clamp_intensity(intensity);
    }


    pub fn get_intensity(&self, kind: FilterKind) -> i32 {
        self.intensities[kind.get_pipeline_index()]
    }


    /// Returns the filters in application order.
    pub fn get_specs(&self) -> Vec<FilterSpec> {
        FilterKind::PIPELINE_ORDER.iter().map(|&kind| FilterSpec::new(kind, self.get_intensity(kind))).collect()
    }


    pub fn has_effect(&self) -> bool {
        self.get_specs().iter().any(|s| s.has_effect())
    }


    /// Applies all filters (in order) to `img` (`Mono8` or `RGB8`).
    pub fn apply(&self, img: &Image) -> Image {
        let mut result = img.clone();
        for spec in self.get_specs().iter().filter(|s| s.has_effect()) {
            debug!("Applying {} filter (intensity {}).", spec.kind, spec.intensity);
            result = spec.apply(&result);
        }
        result
    }
}


fn clamp_intensity(intensity: i32) -> i32 {
    intensity.max(0).min(MAX_INTENSITY)
}


/// Returns the kernel size corresponding to `intensity`.
pub fn kernel_size(intensity: i32) -> usize {
    (clamp_intensity(intensity) / 3).max(1) as usize
}


fn make_odd(k: usize) -> usize {
    if k % 2 == 0 { k + 1 } else { k }
}


/// Returns a copy of `img` (`Mono8` or `RGB8`) processed by the specified filter.
///
/// Intensity is clamped to [0, `MAX_INTENSITY`]; up to `NO_EFFECT_INTENSITY` the image is returned unchanged.
///
pub fn apply_filter(img: &Image, kind: FilterKind, intensity: i32) -> Image {
    assert!(img.get_pixel_format().is_8bit());

    let intensity = clamp_intensity(intensity);
    if intensity <= NO_EFFECT_INTENSITY {
        return img.clone();
    }

    let k = kernel_size(intensity);

    match kind {
        FilterKind::Box => apply_box_blur(img, k),
        FilterKind::Gaussian => apply_gaussian_blur(img, make_odd(k)),
        FilterKind::Median => apply_median_filter(img, make_odd(k)),
        FilterKind::Bilateral => apply_bilateral_filter(img, k, 2.0 * k as f32, k as f32 / 2.0),
        FilterKind::Sharpen => apply_unsharp_mask(img, k as f32),
        FilterKind::Contrast => map_values(img, |v| v as f32 * (1.0 + intensity as f32 / 100.0)),
        FilterKind::Brightness => map_values(img, |v| v as f32 + intensity as f32)
    }
}


/// Returns a `Mono8` copy of `img` (luminance of an `RGB8` image).
pub fn to_grayscale(img: &Image) -> Image {
    img.convert_pix_fmt(PixelFormat::Mono8)
}


fn map_values<F: Fn(u8) -> f32>(img: &Image, f: F) -> Image {
    let pixels: Vec<u8> = img.get_pixels::<u8>().iter().map(|&v| saturate_u8(f(v))).collect();
    Image::new_from_pixels(img.get_width(), img.get_height(), img.get_pixel_format(), pixels)
}


/// Computes sliding sums of a range of `length` elements over the window `[i - before, i + after]`.
///
/// `T` is `u8` or `u32`, `src` points to the range's beginning,
/// `step` is the distance between subsequent elements (in `src` and `pix_sum`).
/// Off-range neighbors are copies of the border element.
///
fn box_sum_pass<T>(src: &[T], pix_sum: &mut [u32], before: usize, after: usize, length: usize, step: usize)
    where T: Copy, u32: From<T> {

    let value_at = |i: isize| u32::from(src[utils::clamp_index(i as i32, length as i32) * step]);

    let mut sum: u32 = (-(before as isize) ..= after as isize).map(|i| value_at(i)).sum();
    pix_sum[0] = sum;

    for i in 1..length as isize {
        sum = sum - value_at(i - before as isize - 1) + value_at(i + after as isize);
        pix_sum[i as usize * step] = sum;
    }
}


/// Mean over a `k`x`k` neighborhood anchored at `k/2`.
fn apply_box_blur(img: &Image, k: usize) -> Image {
    let width = img.get_width() as usize;
    let height = img.get_height() as usize;
    let num_channels = img.get_num_channels();

    if width == 0 || height == 0 {
        return img.clone();
    }

    let before = k / 2;
    let after = k - 1 - before;

    let src = img.get_pixels::<u8>();
    let mut horz_sums = vec![0u32; src.len()];
    let mut sums = vec![0u32; src.len()];

    let vals_per_line = width * num_channels;

    for y in 0..height {
        for ch in 0..num_channels {
            let offs = y * vals_per_line + ch;
            box_sum_pass(&src[offs..], &mut horz_sums[offs..], before, after, width, num_channels);
        }
    }

    for x in 0..width {
        for ch in 0..num_channels {
            let offs = x * num_channels + ch;
            box_sum_pass(&horz_sums[offs..], &mut sums[offs..], before, after, height, vals_per_line);
        }
    }

    let area = (k * k) as u32;
    let pixels: Vec<u8> = sums.iter().map(|&s| ((s + area / 2) / area) as u8).collect();

    Image::new_from_pixels(img.get_width(), img.get_height(), img.get_pixel_format(), pixels)
}


/// Returns normalized 1D Gaussian kernel of odd size `ksize`.
///
/// If `sigma` is not positive, it is derived from `ksize`; sizes up to 7 then use the fixed binomial kernels.
///
fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        match ksize {
            1 => return vec![1.0],
            3 => return vec![0.25, 0.5, 0.25],
            5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
            7 => return vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
            _ => ()
        }
    }

    let sigma = if sigma > 0.0 { sigma } else { 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8 };

    let r = (ksize / 2) as i32;
    let mut kernel: Vec<f32> = (-r..=r).map(|i| (-sqr!(i as f32) / (2.0 * sqr!(sigma))).exp()).collect();
    let sum: f32 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    kernel
}


/// Convolves `img` with `kernel` horizontally and vertically; reflects at the borders.
fn convolve_separable(img: &Image, kernel: &[f32]) -> Vec<f32> {
    let width = img.get_width() as i32;
    let height = img.get_height() as i32;
    let num_channels = img.get_num_channels();
    let r = (kernel.len() / 2) as i32;

    let src = img.get_values_f32();
    let mut horz = vec![0.0f32; src.len()];
    let mut result = vec![0.0f32; src.len()];

    let vals_per_line = width as usize * num_channels;

    for y in 0..height as usize {
        let line = &src[range!(y * vals_per_line, vals_per_line)];
        for x in 0..width {
            for ch in 0..num_channels {
                horz[y * vals_per_line + x as usize * num_channels + ch] = kernel.iter().enumerate()
                    .map(|(i, &kv)| kv * line[utils::reflect_101(x + i as i32 - r, width) * num_channels + ch])
                    .sum();
            }
        }
    }

    for y in 0..height {
        for x in 0..width as usize {
            for ch in 0..num_channels {
                result[y as usize * vals_per_line + x * num_channels + ch] = kernel.iter().enumerate()
                    .map(|(i, &kv)| kv * horz[utils::reflect_101(y + i as i32 - r, height) * vals_per_line + x * num_channels + ch])
                    .sum();
            }
        }
    }

    result
}


fn gaussian_blur(img: &Image, ksize: usize, sigma: f32) -> Image {
    let kernel = gaussian_kernel(ksize, sigma);
    let pixels: Vec<u8> = convolve_separable(img, &kernel).iter().map(|&v| saturate_u8(v)).collect();

    Image::new_from_pixels(img.get_width(), img.get_height(), img.get_pixel_format(), pixels)
}


fn apply_gaussian_blur(img: &Image, ksize: usize) -> Image {
    gaussian_blur(img, ksize, 0.0)
}


/// Returns `1.5 * img - 0.5 * blurred`, where the blur's sigma is `sigma`.
fn apply_unsharp_mask(img: &Image, sigma: f32) -> Image {
    let ksize = 2 * (3.0 * sigma).round() as usize + 1;
    let blurred = gaussian_blur(img, ksize, sigma);

    let pixels: Vec<u8> = img.get_pixels::<u8>().iter().zip(blurred.get_pixels::<u8>())
        .map(|(&orig, &blur)| saturate_u8(1.5 * orig as f32 - 0.5 * blur as f32))
        .collect();

    Image::new_from_pixels(img.get_width(), img.get_height(), img.get_pixel_format(), pixels)
}


/// Returns the median of values counted in `histogram`; `count` is the total count.
fn histogram_median(histogram: &[u32; 256], count: u32) -> u8 {
    let mut acc = 0;
    for (value, &n) in histogram.iter().enumerate() {
        acc += n;
        if acc > count / 2 {
            return value as u8;
        }
    }
    255
}


/// Median over a `ksize`x`ksize` neighborhood (`ksize` odd) of each channel.
///
/// Uses a histogram updated incrementally along each line. Off-image neighbors
/// are copies of the border pixels.
///
fn apply_median_filter(img: &Image, ksize: usize) -> Image {
    let width = img.get_width() as i32;
    let height = img.get_height() as i32;
    let num_channels = img.get_num_channels();
    let r = (ksize / 2) as i32;
    let count = (ksize * ksize) as u32;

    if width == 0 || height == 0 {
        return img.clone();
    }

    let src = img.get_pixels::<u8>();
    let mut pixels = vec![0u8; src.len()];

    let value_at = |x: i32, y: i32, ch: usize| -> usize {
        let idx = (utils::clamp_index(y, height) * width as usize + utils::clamp_index(x, width)) * num_channels + ch;
        src[idx] as usize
    };

    for ch in 0..num_channels {
        for y in 0..height {
            let mut histogram = [0u32; 256];
            for dy in -r..=r {
                for dx in -r..=r {
                    histogram[value_at(dx, y + dy, ch)] += 1;
                }
            }

            pixels[(y * width) as usize * num_channels + ch] = histogram_median(&histogram, count);

            for x in 1..width {
                for dy in -r..=r {
                    histogram[value_at(x - r - 1, y + dy, ch)] -= 1;
                    histogram[value_at(x + r, y + dy, ch)] += 1;
                }
                pixels[(x + y * width) as usize * num_channels + ch] = histogram_median(&histogram, count);
            }
        }
    }

    Image::new_from_pixels(img.get_width(), img.get_height(), img.get_pixel_format(), pixels)
}


/// Edge-preserving smoothing over a disc of `diameter`; color distance is the sum
/// of absolute channel differences.
fn apply_bilateral_filter(img: &Image, diameter: usize, sigma_color: f32, sigma_space: f32) -> Image {
    let width = img.get_width() as i32;
    let height = img.get_height() as i32;
    let num_channels = img.get_num_channels();
    let radius = (diameter / 2) as i32;

    let color_coeff = -0.5 / sqr!(sigma_color);
    let space_coeff = -0.5 / sqr!(sigma_space);

    // Neighborhood offsets with their spatial weights
    let mut neighborhood = Vec::<(i32, i32, f32)>::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist_sq = (sqr!(dx) + sqr!(dy)) as f32;
            if dist_sq <= sqr!(radius) as f32 {
                neighborhood.push((dx, dy, (dist_sq * space_coeff).exp()));
            }
        }
    }

    let max_color_dist = 255 * num_channels;
    let color_weights: Vec<f32> = (0..=max_color_dist).map(|d| (sqr!(d as f32) * color_coeff).exp()).collect();

    let src = img.get_pixels::<u8>();
    let mut pixels = Vec::<u8>::with_capacity(src.len());
    let mut sums = vec![0.0f32; num_channels];

    for y in 0..height {
        for x in 0..width {
            let center = &src[range!((y * width + x) as usize * num_channels, num_channels)];

            for s in sums.iter_mut() { *s = 0.0; }
            let mut weight_sum = 0.0f32;

            for &(dx, dy, space_weight) in &neighborhood {
                let nx = utils::reflect_101(x + dx, width);
                let ny = utils::reflect_101(y + dy, height);
                let neighbor = &src[range!((ny * width as usize + nx) * num_channels, num_channels)];

                let color_dist: usize = center.iter().zip(neighbor)
                    .map(|(&c, &n)| (c as i32 - n as i32).abs() as usize)
                    .sum();

                let weight = space_weight * color_weights[color_dist];
                for (s, &n) in sums.iter_mut().zip(neighbor) {
                    *s += weight * n as f32;
                }
                weight_sum += weight;
            }

            pixels.extend(sums.iter().map(|&s| saturate_u8(s / weight_sum)));
        }
    }

    Image::new_from_pixels(img.get_width(), img.get_height(), img.get_pixel_format(), pixels)
}
