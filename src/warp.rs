//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Affine triangle warping and cross-dissolve compositing.
//

use crate::defs::{PointFlt, Rect};
use crate::image::{self, Image};
use nalgebra::Matrix3;
use thiserror::Error;


#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WarpError {
    /// Source or target triangle is smaller than `MIN_TRIANGLE_AREA`.
    #[error("degenerate triangle")]
    DegenerateTriangle
}


/// 2x3 affine transform: `x' = m00*x + m01*y + m02`, `y' = m10*x + m11*y + m12`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    m: [[f64; 3]; 2]
}


impl AffineTransform {
    /// Finds the transform mapping each point of `src` to the corresponding point of `dst`.
    ///
    /// Returns `None` if either triangle is degenerate.
    ///
    pub fn from_triangles(src: &[PointFlt; 3], dst: &[PointFlt; 3]) -> Option<AffineTransform> {
        if is_degenerate(src) || is_degenerate(dst) {
            return None;
        }

        // Columns are homogeneous points; M * S = D  =>  M = D * S^-1
        let s = homogeneous_columns(src);
        let d = homogeneous_columns(dst);

        let m = d * s.try_inverse()?;

        Some(AffineTransform::from_matrix(&m))
    }


    fn from_matrix(m: &Matrix3<f64>) -> AffineTransform {
        AffineTransform{ m: [[m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                             [m[(1, 0)], m[(1, 1)], m[(1, 2)]]] }
    }


    fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.m[0][0], self.m[0][1], self.m[0][2],
                     self.m[1][0], self.m[1][1], self.m[1][2],
                     0.0,          0.0,          1.0)
    }


    pub fn inverse(&self) -> Option<AffineTransform> {
        self.to_matrix().try_inverse().map(|inv| AffineTransform::from_matrix(&inv))
    }


    pub fn apply(&self, p: PointFlt) -> PointFlt {
        let (x, y) = (p.x as f64, p.y as f64);
        PointFlt{ x: (self.m[0][0] * x + self.m[0][1] * y + self.m[0][2]) as f32,
                  y: (self.m[1][0] * x + self.m[1][1] * y + self.m[1][2]) as f32 }
    }


    fn apply_f64(&self, x: f64, y: f64) -> (f64, f64) {
        (self.m[0][0] * x + self.m[0][1] * y + self.m[0][2],
         self.m[1][0] * x + self.m[1][1] * y + self.m[1][2])
    }
}


fn homogeneous_columns(tri: &[PointFlt; 3]) -> Matrix3<f64> {
    Matrix3::new(tri[0].x as f64, tri[1].x as f64, tri[2].x as f64,
                 tri[0].y as f64, tri[1].y as f64, tri[2].y as f64,
                 1.0,             1.0,             1.0)
}


/// Returns twice the signed area of the triangle.
fn doubled_area(tri: &[PointFlt; 3]) -> f64 {
    let (ax, ay) = (tri[0].x as f64, tri[0].y as f64);
    let (bx, by) = (tri[1].x as f64, tri[1].y as f64);
    let (cx, cy) = (tri[2].x as f64, tri[2].y as f64);

    (bx - ax) * (cy - ay) - (cx - ax) * (by - ay)
}


/// Triangles with a smaller area (in pixels) cannot be warped.
pub const MIN_TRIANGLE_AREA: f64 = 0.5;


/// Returns true if the triangle's area is below `MIN_TRIANGLE_AREA`.
pub fn is_degenerate(tri: &[PointFlt; 3]) -> bool {
    0.5 * doubled_area(tri).abs() < MIN_TRIANGLE_AREA
}


/// Returns coverage mask (1.0 inside or on the border, 0.0 outside) of triangle `tri`
/// at integer pixel positions of a `width`x`height` canvas.
fn rasterize_triangle_mask(tri: &[PointFlt; 3], width: u32, height: u32) -> Vec<f32> {
    let mut mask = vec![0.0f32; (width * height) as usize];

    const EPS: f64 = 1.0e-6;

    for y in 0..height {
        for x in 0..width {
            let (u, v) = calc_barycentric_coords!(PointFlt{ x: x as f32, y: y as f32 }, tri[0], tri[1], tri[2]);
            if u >= -EPS && v >= -EPS && u + v <= 1.0 + EPS {
                mask[(x + y * width) as usize] = 1.0;
            }
        }
    }

    mask
}


fn translated(tri: &[PointFlt; 3], rect: &Rect) -> [PointFlt; 3] {
    let origin = PointFlt::new(rect.x as f32, rect.y as f32);
    [tri[0] - origin, tri[1] - origin, tri[2] - origin]
}


/// Warps `src` (cropped to `rect`) through `xform` into a `width`x`height` canvas.
///
/// Inverse mapping with bilinear interpolation; samples outside the crop are taken by reflection.
///
fn warp_crop(src: &Image, rect: &Rect, xform: &AffineTransform, width: u32, height: u32)
-> Result<Vec<f32>, WarpError> {
    let crop = src.get_fragment_copy(rect.get_pos(), rect.width, rect.height);
    let inv = xform.inverse().ok_or(WarpError::DegenerateTriangle)?;

    let num_channels = crop.get_num_channels();
    let crop_pixels = crop.get_pixels::<f32>();

    let mut warped = Vec::<f32>::with_capacity((width * height) as usize * num_channels);

    for y in 0..height {
        for x in 0..width {
            let (srcx, srcy) = inv.apply_f64(x as f64, y as f64);
            for ch in 0..num_channels {
                warped.push(image::interpolate_pixel_value(crop_pixels, crop.get_width(), crop.get_height(),
                                                           srcx as f32, srcy as f32, ch, num_channels));
            }
        }
    }

    Ok(warped)
}


/// Warps the triangles `tri_one` of `src_one` and `tri_two` of `src_two` onto `tri_target`,
/// cross-dissolves them using `alpha` and composites the result into `acc`.
///
/// All images must be in a floating-point pixel format with the same number of channels.
/// Pixels of `acc` outside the target triangle are not modified.
///
pub fn composite_triangle(
    src_one: &Image,
    src_two: &Image,
    tri_one: &[PointFlt; 3],
    tri_two: &[PointFlt; 3],
    tri_target: &[PointFlt; 3],
    alpha: f32,
    acc: &mut Image) -> Result<(), WarpError> {

    assert!(!src_one.get_pixel_format().is_8bit() && !src_two.get_pixel_format().is_8bit() &&
            !acc.get_pixel_format().is_8bit());
    assert!(src_one.get_num_channels() == acc.get_num_channels() &&
            src_two.get_num_channels() == acc.get_num_channels());

    let rect_one = Rect::bounding(tri_one);
    let rect_two = Rect::bounding(tri_two);
    let rect_target = Rect::bounding(tri_target);

    let local_one = translated(tri_one, &rect_one);
    let local_two = translated(tri_two, &rect_two);
    let local_target = translated(tri_target, &rect_target);

    let xform_one = AffineTransform::from_triangles(&local_one, &local_target).ok_or(WarpError::DegenerateTriangle)?;
    let xform_two = AffineTransform::from_triangles(&local_two, &local_target).ok_or(WarpError::DegenerateTriangle)?;

    let (w, h) = (rect_target.width, rect_target.height);

    let warped_one = warp_crop(src_one, &rect_one, &xform_one, w, h)?;
    let warped_two = warp_crop(src_two, &rect_two, &xform_two, w, h)?;
    let mask = rasterize_triangle_mask(&local_target, w, h);

    let visible = match rect_target.intersection(&acc.get_img_rect()) {
        Some(r) => r,
        None => return Ok(())
    };

    let num_channels = acc.get_num_channels();
    let acc_width = acc.get_width() as usize;
    let acc_pixels = acc.get_pixels_mut::<f32>();

    for y in visible.y .. visible.y + visible.height as i32 {
        for x in visible.x .. visible.x + visible.width as i32 {
            let local_idx = (x - rect_target.x) as usize + (y - rect_target.y) as usize * w as usize;
            let m = mask[local_idx];
            if m == 0.0 {
                continue;
            }

            let acc_idx = (x as usize + y as usize * acc_width) * num_channels;
            for ch in 0..num_channels {
                let blended = (1.0 - alpha) * warped_one[local_idx * num_channels + ch] +
                              alpha * warped_two[local_idx * num_channels + ch];

                let dest = &mut acc_pixels[acc_idx + ch];
                *dest = *dest * (1.0 - m) + blended * m;
            }
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;
    use approx::assert_relative_eq;

    fn tri(coords: [(f32, f32); 3]) -> [PointFlt; 3] {
        [PointFlt::new(coords[0].0, coords[0].1),
         PointFlt::new(coords[1].0, coords[1].1),
         PointFlt::new(coords[2].0, coords[2].1)]
    }

    /// Mono image with value `x + 10*y`.
    fn ramp(width: u32, height: u32) -> Image {
        let mut pixels = vec![];
        for y in 0..height {
            for x in 0..width {
                pixels.push((x + 10 * y) as f32);
            }
        }
        Image::new_from_pixels(width, height, PixelFormat::Mono32f, pixels)
    }

    #[test]
    fn transform_maps_correspondences() {
        let src = tri([(0.0, 0.0), (4.0, 0.0), (0.0, 2.0)]);
        let dst = tri([(1.0, 1.0), (9.0, 1.0), (1.0, 7.0)]);
        let xform = AffineTransform::from_triangles(&src, &dst).unwrap();

        for i in 0..3 {
            let p = xform.apply(src[i]);
            assert_relative_eq!(p.x, dst[i].x, epsilon = 1e-5);
            assert_relative_eq!(p.y, dst[i].y, epsilon = 1e-5);
        }

        let back = xform.inverse().unwrap().apply(PointFlt::new(5.0, 4.0));
        assert_relative_eq!(back.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(back.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn collinear_triangle_has_no_transform() {
        let good = tri([(0.0, 0.0), (4.0, 0.0), (0.0, 2.0)]);
        let flat = tri([(0.0, 0.0), (1.0, 1.0), (3.0, 3.0)]);
        assert!(AffineTransform::from_triangles(&flat, &good).is_none());
        assert!(AffineTransform::from_triangles(&good, &flat).is_none());
    }

    #[test]
    fn mask_includes_edges() {
        let mask = rasterize_triangle_mask(&tri([(0.0, 0.0), (3.0, 0.0), (0.0, 3.0)]), 4, 4);
        let expected = [1.0, 1.0, 1.0, 1.0,
                        1.0, 1.0, 1.0, 0.0,
                        1.0, 1.0, 0.0, 0.0,
                        1.0, 0.0, 0.0, 0.0];
        assert_eq!(&mask[..], &expected[..]);
    }

    #[test]
    fn identity_warp_copies_source_inside_triangle() {
        let src = ramp(12, 10);
        let t = tri([(1.0, 1.0), (10.0, 2.0), (3.0, 8.0)]);
        let mut acc = Image::new(12, 10, PixelFormat::Mono32f);

        composite_triangle(&src, &src, &t, &t, &t, 0.3, &mut acc).unwrap();

        let mask = rasterize_triangle_mask(&translated(&t, &Rect::bounding(&t)), 10, 8);
        for y in 0..10u32 {
            for x in 0..12u32 {
                let v = acc.get_pixel::<f32>(x, y)[0];
                let inside = x >= 1 && y >= 1 && x < 11 && y < 9 && mask[(x - 1 + (y - 1) * 10) as usize] == 1.0;
                if inside {
                    assert_relative_eq!(v, src.get_pixel::<f32>(x, y)[0], epsilon = 1e-3);
                } else {
                    assert_eq!(v, 0.0);
                }
            }
        }
    }

    #[test]
    fn mask_replaces_inside_and_preserves_outside() {
        let one = Image::new_filled(8, 8, PixelFormat::RGB32f, &[100.0f32, 0.0, 50.0]);
        let two = Image::new_filled(8, 8, PixelFormat::RGB32f, &[200.0f32, 40.0, 50.0]);
        let mut acc = Image::new_filled(8, 8, PixelFormat::RGB32f, &[7.0f32, 7.0, 7.0]);

        let t = tri([(0.0, 0.0), (7.0, 0.0), (0.0, 7.0)]);
        composite_triangle(&one, &two, &t, &t, &t, 0.25, &mut acc).unwrap();

        // Inside: (1-alpha)*one + alpha*two; mask and carried-over weight sum to 1
        let inside = acc.get_pixel::<f32>(2, 2);
        assert_relative_eq!(inside[0], 125.0, epsilon = 1e-3);
        assert_relative_eq!(inside[1], 10.0, epsilon = 1e-3);
        assert_relative_eq!(inside[2], 50.0, epsilon = 1e-3);

        // On the hypotenuse
        assert_relative_eq!(acc.get_pixel::<f32>(4, 3)[0], 125.0, epsilon = 1e-3);

        // Outside
        assert_eq!(acc.get_pixel::<f32>(6, 6), &[7.0, 7.0, 7.0]);
    }

    #[test]
    fn degenerate_triangle_is_reported() {
        let img = Image::new(8, 8, PixelFormat::Mono32f);
        let mut acc = Image::new(8, 8, PixelFormat::Mono32f);
        let good = tri([(0.0, 0.0), (5.0, 0.0), (0.0, 5.0)]);
        let flat = tri([(1.0, 1.0), (2.0, 2.0), (4.0, 4.0)]);

        assert_eq!(composite_triangle(&img, &img, &flat, &good, &good, 0.5, &mut acc),
                   Err(WarpError::DegenerateTriangle));
        assert_eq!(composite_triangle(&img, &img, &good, &good, &flat, 0.5, &mut acc),
                   Err(WarpError::DegenerateTriangle));
    }

    #[test]
    fn near_collinear_target_is_degenerate() {
        let src = ramp(64, 64);
        let mut acc = Image::new(64, 64, PixelFormat::Mono32f);
        let t_src = tri([(20.0, 10.0), (40.0, 10.0), (22.0, 30.0)]);
        let t_dst = tri([(20.0, 10.0), (40.0, 10.0), (22.0, 10.000001)]);

        let tstart = std::time::Instant::now();
        assert_eq!(composite_triangle(&src, &src, &t_src, &t_src, &t_dst, 0.25, &mut acc),
                   Err(WarpError::DegenerateTriangle));
        assert!(tstart.elapsed().as_secs_f64() < 1.0);
        assert!(acc.get_pixels::<f32>().iter().all(|&v| v == 0.0));

        // Half a pixel is still warped
        assert!(!is_degenerate(&tri([(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])));
        assert!(is_degenerate(&tri([(0.0, 0.0), (1.0, 0.0), (0.0, 0.99)])));
    }

    #[test]
    fn translated_triangle_is_warped() {
        // Source triangle moved by (+2, +1) in the target
        let src = ramp(16, 12);
        let t_src = tri([(1.0, 1.0), (8.0, 1.0), (1.0, 8.0)]);
        let t_dst = tri([(3.0, 2.0), (10.0, 2.0), (3.0, 9.0)]);
        let mut acc = Image::new(16, 12, PixelFormat::Mono32f);

        composite_triangle(&src, &src, &t_src, &t_src, &t_dst, 0.5, &mut acc).unwrap();

        assert_relative_eq!(acc.get_pixel::<f32>(5, 4)[0], src.get_pixel::<f32>(3, 3)[0], epsilon = 1e-3);
        assert_relative_eq!(acc.get_pixel::<f32>(4, 6)[0], src.get_pixel::<f32>(2, 5)[0], epsilon = 1e-3);
    }
}
