//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Frequency-domain visualization.
//

use crate::image::{Image, PixelFormat};
use crate::utils::saturate_u8;
use nalgebra::Complex;
use std::f64::consts::PI;


/// Performs in-place discrete Fourier transform of `length` elements spaced `step` apart.
///
/// `twiddles` holds `exp(-2*pi*i*k/length)` for `k` in `0..length`.
///
fn dft_pass(values: &mut [Complex<f64>], length: usize, step: usize, twiddles: &[Complex<f64>], buf: &mut Vec<Complex<f64>>) {
    buf.clear();
    for k in 0..length {
        let mut sum = Complex::new(0.0, 0.0);
        for n in 0..length {
            sum += values[n * step] * twiddles[(k * n) % length];
        }
        buf.push(sum);
    }

    for (k, v) in buf.iter().enumerate() {
        values[k * step] = *v;
    }
}


fn twiddle_factors(length: usize) -> Vec<Complex<f64>> {
    (0..length).map(|k| {
        let angle = -2.0 * PI * k as f64 / length as f64;
        Complex::new(angle.cos(), angle.sin())
    }).collect()
}


fn magnitude(c: &Complex<f64>) -> f64 {
    c.re.hypot(c.im)
}


/// Returns the 2D discrete Fourier transform of `values` (`width`x`height`, row-major).
fn dft_2d(values: &[f64], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut spectrum: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut buf = Vec::with_capacity(width.max(height));

    let row_twiddles = twiddle_factors(width);
    for y in 0..height {
        dft_pass(&mut spectrum[y * width..], width, 1, &row_twiddles, &mut buf);
    }

    let col_twiddles = twiddle_factors(height);
    for x in 0..width {
        dft_pass(&mut spectrum[x..], height, width, &col_twiddles, &mut buf);
    }

    spectrum
}


/// Returns a `Mono8` image of the log-magnitude spectrum of `img`, with the zero frequency at the center.
///
/// Color images are converted to luminance first. Values are normalized to the full 8-bit range.
/// For visualization only.
///
pub fn magnitude_spectrum(img: &Image) -> Image {
    let width = img.get_width() as usize;
    let height = img.get_height() as usize;

    if width == 0 || height == 0 {
        return Image::new(img.get_width(), img.get_height(), PixelFormat::Mono8);
    }

    let gray: Vec<f64> = img.convert_pix_fmt(PixelFormat::Mono32f)
                            .get_pixels::<f32>()
                            .iter()
                            .map(|&v| v as f64)
                            .collect();

    let spectrum = dft_2d(&gray, width, height);

    // Log magnitude with quadrants swapped
    let mut log_mag = vec![0.0f64; width * height];
    for y in 0..height {
        for x in 0..width {
            let dest_x = (x + width / 2) % width;
            let dest_y = (y + height / 2) % height;
            log_mag[dest_x + dest_y * width] = magnitude(&spectrum[x + y * width]).ln_1p();
        }
    }

    let min = log_mag.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = log_mag.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let scale = if max > min { 255.0 / (max - min) } else { 0.0 };

    let pixels: Vec<u8> = log_mag.iter().map(|&v| saturate_u8(((v - min) * scale) as f32)).collect();

    Image::new_from_pixels(img.get_width(), img.get_height(), PixelFormat::Mono8, pixels)
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dft_of_constant_has_only_dc() {
        let spectrum = dft_2d(&[2.0; 12], 4, 3);
        assert_relative_eq!(spectrum[0].re, 24.0, epsilon = 1e-9);
        assert!(spectrum[1..].iter().all(|c| magnitude(c) < 1e-9));
    }

    #[test]
    fn twiddles_are_unit_roots() {
        let expected = [(1.0, 0.0), (0.0, -1.0), (-1.0, 0.0), (0.0, 1.0)];
        for (w, &(re, im)) in twiddle_factors(4).iter().zip(&expected) {
            assert_relative_eq!(w.re, re, epsilon = 1e-12);
            assert_relative_eq!(w.im, im, epsilon = 1e-12);
            assert_relative_eq!(magnitude(w), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn uniform_image_spectrum_is_centered() {
        let img = Image::new_filled(8, 6, PixelFormat::RGB8, &[90u8, 30, 200]);
        let spectrum = magnitude_spectrum(&img);

        assert_eq!(spectrum.get_pixel_format(), PixelFormat::Mono8);
        assert_eq!(spectrum.get_width(), 8);
        assert_eq!(spectrum.get_height(), 6);
        for y in 0..6 {
            for x in 0..8 {
                let expected = if x == 4 && y == 3 { 255 } else { 0 };
                assert_eq!(spectrum.get_pixel::<u8>(x, y)[0], expected);
            }
        }
    }

    #[test]
    fn stripes_produce_symmetric_peaks() {
        // Period of 4 pixels along X
        let mut pixels = vec![];
        for _ in 0..8 {
            for x in 0..8 {
                pixels.push(if x % 4 < 2 { 200u8 } else { 0 });
            }
        }
        let img = Image::new_from_pixels(8, 8, PixelFormat::Mono8, pixels);
        let spectrum = magnitude_spectrum(&img);

        let left = spectrum.get_pixel::<u8>(2, 4)[0];
        let right = spectrum.get_pixel::<u8>(6, 4)[0];
        assert_eq!(left, right);
        assert!(left > 0);
        assert_eq!(spectrum.get_pixel::<u8>(4, 4)[0], 255);
        // No vertical frequencies
        assert_eq!(spectrum.get_pixel::<u8>(4, 2)[0], 0);
    }

    #[test]
    fn black_image() {
        let spectrum = magnitude_spectrum(&Image::new(5, 5, PixelFormat::Mono8));
        assert!(spectrum.get_pixels::<u8>().iter().all(|&v| v == 0));
    }
}
