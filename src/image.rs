//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Image handling.
//

use crate::defs::{CanvasBounds, Point, Rect};
use crate::utils::{self, saturate_u8};


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Mono8,
    /// Channel order: R, G, B.
    RGB8,

    /// Floating-point working format; values use the 8-bit scale (0.0 - 255.0).
    Mono32f,
    /// Floating-point working format; values use the 8-bit scale (0.0 - 255.0).
    RGB32f
}


impl PixelFormat {
    pub fn is_8bit(&self) -> bool {
        matches!(self, PixelFormat::Mono8 | PixelFormat::RGB8)
    }


    /// Returns the floating-point format with the same channel layout.
    pub fn float_equivalent(&self) -> PixelFormat {
        match self {
            PixelFormat::Mono8 | PixelFormat::Mono32f => PixelFormat::Mono32f,
            PixelFormat::RGB8 | PixelFormat::RGB32f => PixelFormat::RGB32f
        }
    }
}


pub fn get_num_channels(pix_fmt: PixelFormat) -> usize {
    match pix_fmt {
        PixelFormat::Mono8 | PixelFormat::Mono32f => 1,
        PixelFormat::RGB8 | PixelFormat::RGB32f => 3
    }
}


/// Pixel storage; the variant always corresponds to the owning image's pixel format.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    F32(Vec<f32>)
}


/// Type of a single channel value.
pub trait PixelValue: Copy + Default + PartialEq + 'static {
    fn from_buffer(buf: &PixelBuffer) -> Option<&[Self]>;

    fn from_buffer_mut(buf: &mut PixelBuffer) -> Option<&mut [Self]>;

    fn into_buffer(values: Vec<Self>) -> PixelBuffer;
}


impl PixelValue for u8 {
    fn from_buffer(buf: &PixelBuffer) -> Option<&[u8]> {
        match buf { PixelBuffer::U8(v) => Some(&v[..]), _ => None }
    }

    fn from_buffer_mut(buf: &mut PixelBuffer) -> Option<&mut [u8]> {
        match buf { PixelBuffer::U8(v) => Some(&mut v[..]), _ => None }
    }

    fn into_buffer(values: Vec<u8>) -> PixelBuffer { PixelBuffer::U8(values) }
}


impl PixelValue for f32 {
    fn from_buffer(buf: &PixelBuffer) -> Option<&[f32]> {
        match buf { PixelBuffer::F32(v) => Some(&v[..]), _ => None }
    }

    fn from_buffer_mut(buf: &mut PixelBuffer) -> Option<&mut [f32]> {
        match buf { PixelBuffer::F32(v) => Some(&mut v[..]), _ => None }
    }

    fn into_buffer(values: Vec<f32>) -> PixelBuffer { PixelBuffer::F32(values) }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pix_fmt: PixelFormat,
    pixels: PixelBuffer
}


impl Image {
    /// Creates a new zero-filled image.
    pub fn new(width: u32, height: u32, pix_fmt: PixelFormat) -> Image {
        let len = (width * height) as usize * get_num_channels(pix_fmt);
        let pixels = if pix_fmt.is_8bit() { PixelBuffer::U8(vec![0; len]) } else { PixelBuffer::F32(vec![0.0; len]) };

        Image{ width, height, pix_fmt, pixels }
    }


    /// Creates a new image using the specified storage.
    ///
    /// `pixels` must have enough elements and `T` must correspond to `pix_fmt`.
    ///
    pub fn new_from_pixels<T: PixelValue>(width: u32, height: u32, pix_fmt: PixelFormat, mut pixels: Vec<T>) -> Image {
        let len = (width * height) as usize * get_num_channels(pix_fmt);
        assert!(pixels.len() >= len);
        pixels.truncate(len);

        let buffer = T::into_buffer(pixels);
        assert!(matches!(buffer, PixelBuffer::U8(_)) == pix_fmt.is_8bit(),
                "pixel value type does not match pixel format {:?}", pix_fmt);

        Image{ width, height, pix_fmt, pixels: buffer }
    }


    /// Creates a new image with every pixel set to `value` (one element per channel).
    pub fn new_filled<T: PixelValue>(width: u32, height: u32, pix_fmt: PixelFormat, value: &[T]) -> Image {
        assert!(value.len() == get_num_channels(pix_fmt));
        let pixels: Vec<T> = value.iter().cloned().cycle().take((width * height) as usize * value.len()).collect();

        Image::new_from_pixels(width, height, pix_fmt, pixels)
    }


    pub fn get_width(&self) -> u32 {
        self.width
    }


    pub fn get_height(&self) -> u32 {
        self.height
    }


    pub fn get_pixel_format(&self) -> PixelFormat {
        self.pix_fmt
    }


    pub fn get_num_channels(&self) -> usize {
        get_num_channels(self.pix_fmt)
    }


    pub fn get_bounds(&self) -> CanvasBounds {
        CanvasBounds::new(self.width, self.height)
    }


    pub fn get_img_rect(&self) -> Rect { Rect{ x: 0, y: 0, width: self.width, height: self.height } }


    /// Returns pixels.
    ///
    /// `T` must correspond to the image's pixel format.
    ///
    pub fn get_pixels<T: PixelValue>(&self) -> &[T] {
        match T::from_buffer(&self.pixels) {
            Some(pixels) => pixels,
            None => panic!("pixel value type does not match pixel format {:?}", self.pix_fmt)
        }
    }


    /// Returns mutable pixels.
    ///
    /// `T` must correspond to the image's pixel format.
    ///
    pub fn get_pixels_mut<T: PixelValue>(&mut self) -> &mut [T] {
        let pix_fmt = self.pix_fmt;
        match T::from_buffer_mut(&mut self.pixels) {
            Some(pixels) => pixels,
            None => panic!("pixel value type does not match pixel format {:?}", pix_fmt)
        }
    }


    /// Returns image line.
    ///
    /// `T` must correspond to the image's pixel format.
    ///
    pub fn get_line<T: PixelValue>(&self, y: u32) -> &[T] {
        assert!(y < self.height);
        let vals_per_line = self.width as usize * self.get_num_channels();

        &self.get_pixels::<T>()[range!(y as usize * vals_per_line, vals_per_line)]
    }


    /// Returns mutable image line.
    ///
    /// `T` must correspond to the image's pixel format.
    ///
    pub fn get_line_mut<T: PixelValue>(&mut self, y: u32) -> &mut [T] {
        assert!(y < self.height);
        let vals_per_line = self.width as usize * self.get_num_channels();

        &mut self.get_pixels_mut::<T>()[range!(y as usize * vals_per_line, vals_per_line)]
    }


    /// Returns channel values of the pixel at `(x, y)`.
    pub fn get_pixel<T: PixelValue>(&self, x: u32, y: u32) -> &[T] {
        assert!(x < self.width);
        let num_channels = self.get_num_channels();

        &self.get_line::<T>(y)[range!(x as usize * num_channels, num_channels)]
    }


    /// Returns all channel values converted to `f32` (8-bit values are not rescaled).
    pub fn get_values_f32(&self) -> Vec<f32> {
        match &self.pixels {
            PixelBuffer::U8(v) => v.iter().map(|&x| x as f32).collect(),
            PixelBuffer::F32(v) => v.clone()
        }
    }


    /// Returns the image converted to the specified pixel format.
    ///
    /// Color to mono conversion uses luminance weights (0.299, 0.587, 0.114);
    /// float to 8-bit conversion rounds and clamps.
    ///
    pub fn convert_pix_fmt(&self, dest_pix_fmt: PixelFormat) -> Image {
        if dest_pix_fmt == self.pix_fmt {
            return self.clone();
        }

        let src_channels = self.get_num_channels();
        let dest_channels = get_num_channels(dest_pix_fmt);
        let src_vals = self.get_values_f32();

        let mut dest_vals = Vec::<f32>::with_capacity((self.width * self.height) as usize * dest_channels);

        for pix in src_vals.chunks_exact(src_channels) {
            match (src_channels, dest_channels) {
                (1, 3) => dest_vals.extend_from_slice(&[pix[0], pix[0], pix[0]]),
                (3, 1) => dest_vals.push(0.299 * pix[0] + 0.587 * pix[1] + 0.114 * pix[2]),
                _ => dest_vals.extend_from_slice(pix)
            }
        }

        if dest_pix_fmt.is_8bit() {
            let pixels: Vec<u8> = dest_vals.iter().map(|&v| saturate_u8(v)).collect();
            Image::new_from_pixels(self.width, self.height, dest_pix_fmt, pixels)
        } else {
            Image::new_from_pixels(self.width, self.height, dest_pix_fmt, dest_vals)
        }
    }


    /// Returns a copy of image's fragment. The fragment boundaries may extend outside of the image.
    ///
    /// The fragment to copy is `width`x`height` pixels and starts at `src_pos`.
    /// Fragment's areas outside of the image are zero.
    ///
    pub fn get_fragment_copy(&self,
                             src_pos: Point,
                             width: u32,
                             height: u32) -> Image {
        let mut dest_img = Image::new(width, height, self.pix_fmt);

        self.resize_and_translate_into(&mut dest_img, src_pos, width, height, Point{ x: 0, y: 0 });

        dest_img
    }


    /// Copies (with cropping) a fragment of image to another. There is no scaling.
    ///
    /// Pixel formats of source and destination must be the same.
    /// The fragment to copy is `width`x`height` pixels and starts at `src_pos` in `&self`
    /// and at `dest_pos` at `dest_img`. Areas of `dest_img` not copied on are left unchanged.
    ///
    pub fn resize_and_translate_into(
        &self,
        dest_img: &mut Image,
        src_pos: Point,
        width: u32,
        height: u32,
        dest_pos: Point) {

        assert!(self.pix_fmt == dest_img.pix_fmt);

        // Part of the fragment that exists in the source image
        let src_visible = match (Rect{ x: src_pos.x, y: src_pos.y, width, height }).intersection(&self.get_img_rect()) {
            Some(r) => r,
            None => return
        };

        let offset = dest_pos - src_pos;

        // ...and that also fits in the destination image
        let dest_rect = match (Rect{ x: src_visible.x + offset.x, y: src_visible.y + offset.y,
                                     width: src_visible.width, height: src_visible.height })
                              .intersection(&dest_img.get_img_rect()) {
            Some(r) => r,
            None => return
        };

        let src_start = dest_rect.get_pos() - offset;

        match self.pixels {
            PixelBuffer::U8(_) => copy_lines::<u8>(self, dest_img, src_start, dest_rect),
            PixelBuffer::F32(_) => copy_lines::<f32>(self, dest_img, src_start, dest_rect)
        }
    }


    /// Returns the image scaled to `width`x`height` using bilinear interpolation.
    pub fn scaled(&self, width: u32, height: u32) -> Image {
        if width == self.width && height == self.height {
            return self.clone();
        }

        let num_channels = self.get_num_channels();
        let src_vals = self.get_values_f32();

        let mut dest_vals = Vec::<f32>::with_capacity((width * height) as usize * num_channels);

        let x_scale = self.width as f32 / width as f32;
        let y_scale = self.height as f32 / height as f32;
        let x_max = (self.width - 1) as f32;
        let y_max = (self.height - 1) as f32;

        for y in 0..height {
            let srcy = ((y as f32 + 0.5) * y_scale - 0.5).max(0.0).min(y_max);
            for x in 0..width {
                let srcx = ((x as f32 + 0.5) * x_scale - 0.5).max(0.0).min(x_max);
                for ch in 0..num_channels {
                    dest_vals.push(interpolate_pixel_value(&src_vals, self.width, self.height,
                                                           srcx, srcy, ch, num_channels));
                }
            }
        }

        if self.pix_fmt.is_8bit() {
            let pixels: Vec<u8> = dest_vals.iter().map(|&v| saturate_u8(v)).collect();
            Image::new_from_pixels(width, height, self.pix_fmt, pixels)
        } else {
            Image::new_from_pixels(width, height, self.pix_fmt, dest_vals)
        }
    }
}


/// Copies `dest_rect` of `dest_img` from `src_img` starting at `src_start`; both areas must be valid.
fn copy_lines<T: PixelValue>(src_img: &Image, dest_img: &mut Image, src_start: Point, dest_rect: Rect) {
    let num_channels = src_img.get_num_channels();
    let line_copy_vals = dest_rect.width as usize * num_channels;

    for dy in 0..dest_rect.height as i32 {
        let src_line = &src_img.get_line::<T>((src_start.y + dy) as u32)
                              [range!(src_start.x as usize * num_channels, line_copy_vals)];

        let dest_line = &mut dest_img.get_line_mut::<T>((dest_rect.y + dy) as u32)
                                 [range!(dest_rect.x as usize * num_channels, line_copy_vals)];

        dest_line.copy_from_slice(src_line);
    }
}


/// Maps coordinate `x` into `[0, 2*n - 2)`; reflection without repeating the border is periodic.
fn reduce_to_reflection_period(x: f32, n: u32) -> f32 {
    if n <= 1 {
        0.0
    } else {
        x.rem_euclid(2.0 * (n - 1) as f32)
    }
}


/// Performs linear interpolation of floating-point pixel values.
///
/// Neighbors outside the image are taken by reflection (without repeating the border pixel).
///
pub fn interpolate_pixel_value(
    pixels: &[f32],
    img_width: u32,
    img_height: u32,
    x: f32,
    y: f32,
    channel: usize,
    num_channels: usize) -> f32 {

    let vals_per_line = img_width as usize * num_channels;

    let x = reduce_to_reflection_period(x, img_width);
    let y = reduce_to_reflection_period(y, img_height);

    let x0f = x.floor();
    let y0f = y.floor();
    let tx = x - x0f;
    let ty = y - y0f;

    let x0 = utils::reflect_101(x0f as i32, img_width as i32);
    let x1 = utils::reflect_101(x0f as i32 + 1, img_width as i32);
    let y0 = utils::reflect_101(y0f as i32, img_height as i32);
    let y1 = utils::reflect_101(y0f as i32 + 1, img_height as i32);

    let line_lo = &pixels[y0 * vals_per_line..];
    let line_hi = &pixels[y1 * vals_per_line..];

    let v00 = line_lo[x0 * num_channels + channel];
    let v10 = line_lo[x1 * num_channels + channel];
    let v01 = line_hi[x0 * num_channels + channel];
    let v11 = line_hi[x1 * num_channels + channel];

    (1.0 - ty) * ((1.0 - tx) * v00 + tx * v10) + ty * ((1.0 - tx) * v01 + tx * v11)
}
