//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Morphing of two face images.
//

use crate::defs::{CanvasBounds, PointFlt};
use crate::error::{MorphError, Result};
use crate::image::Image;
use crate::landmarks::{self, FaceImage, LandmarkSet, NUM_BOUNDARY_LANDMARKS};
use crate::triangulation::{self, TriangleIndices};
use crate::warp::{self, WarpError};
use log::debug;
use std::fmt;


/// Identifies one of the two morphed images.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reference {
    One,
    Two
}


impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reference::One => write!(f, "one"),
            Reference::Two => write!(f, "two")
        }
    }
}


/// Reason for skipping a triangle; the output has an unfilled hole there.
#[derive(Clone, Debug, PartialEq)]
pub enum MorphDiagnostic {
    /// A source triangle vertex lies outside of its image.
    OutOfBoundsLandmark {
        triangle: TriangleIndices,
        landmark: usize,
        reference: Reference
    },

    /// A target triangle vertex lies outside of the output image.
    OutOfBoundsTarget {
        triangle: TriangleIndices,
        landmark: usize
    },

    DegenerateTriangle {
        triangle: TriangleIndices
    }
}


impl MorphDiagnostic {
    pub fn get_triangle(&self) -> TriangleIndices {
        match self {
            MorphDiagnostic::OutOfBoundsLandmark{ triangle, .. } |
            MorphDiagnostic::OutOfBoundsTarget{ triangle, .. } |
            MorphDiagnostic::DegenerateTriangle{ triangle } => *triangle
        }
    }


    pub fn is_out_of_bounds(&self) -> bool {
        !matches!(self, MorphDiagnostic::DegenerateTriangle{ .. })
    }
}


impl fmt::Display for MorphDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MorphDiagnostic::OutOfBoundsLandmark{ landmark, reference, .. } =>
                write!(f, "landmark {} not contained in reference {}", landmark, reference),

            MorphDiagnostic::OutOfBoundsTarget{ landmark, .. } =>
                write!(f, "target landmark {} not contained in the output image", landmark),

            MorphDiagnostic::DegenerateTriangle{ triangle } =>
                write!(f, "triangle {} is degenerate", triangle)
        }
    }
}


#[derive(Clone, Debug)]
pub struct MorphResult {
    /// Same dimensions and pixel format as the inputs.
    pub image: Image,

    /// Alpha-weighted landmarks (without the synthetic border points).
    pub landmarks: LandmarkSet,

    /// Skipped triangles, in triangulation order.
    pub diagnostics: Vec<MorphDiagnostic>
}


impl MorphResult {
    /// Returns true if any triangle was skipped because of an out-of-bounds landmark.
    pub fn is_bad_morph(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_out_of_bounds())
    }
}


/// Returns the first vertex of `t` not lying within `bounds`.
fn find_outside_vertex(t: &TriangleIndices, points: &[PointFlt], bounds: CanvasBounds) -> Option<usize> {
    t.as_array().iter().cloned().find(|&idx| !bounds.contains(&points[idx]))
}


fn check_triangle(
    t: &TriangleIndices,
    one: &[PointFlt],
    two: &[PointFlt],
    target: &[PointFlt],
    bounds: CanvasBounds) -> Option<MorphDiagnostic> {

    if let Some(landmark) = find_outside_vertex(t, one, bounds) {
        return Some(MorphDiagnostic::OutOfBoundsLandmark{ triangle: *t, landmark, reference: Reference::One });
    }
    if let Some(landmark) = find_outside_vertex(t, two, bounds) {
        return Some(MorphDiagnostic::OutOfBoundsLandmark{ triangle: *t, landmark, reference: Reference::Two });
    }
    if let Some(landmark) = find_outside_vertex(t, target, bounds) {
        return Some(MorphDiagnostic::OutOfBoundsTarget{ triangle: *t, landmark });
    }

    None
}


fn triangle_points(t: &TriangleIndices, points: &[PointFlt]) -> [PointFlt; 3] {
    [points[t.a], points[t.b], points[t.c]]
}


/// Morphs two face images.
///
/// Both images must have the same dimensions, the same 8-bit pixel format and
/// equal-length landmark sets. `alpha` (clamped to [0, 1]) is the weight of `ref_two`.
/// Triangles which cannot be warped are skipped and reported in `MorphResult::diagnostics`.
///
pub fn morph(ref_one: &FaceImage, ref_two: &FaceImage, alpha: f32) -> Result<MorphResult> {
    let lm_one = &ref_one.landmarks;
    let lm_two = &ref_two.landmarks;

    if lm_one.len() != lm_two.len() {
        return Err(MorphError::LandmarkMismatch{ one: lm_one.len(), two: lm_two.len() });
    }

    let bounds = ref_one.get_bounds();
    if bounds != ref_two.get_bounds() {
        return Err(MorphError::DimensionMismatch{ one: bounds, two: ref_two.get_bounds() });
    }

    let pix_fmt = ref_one.image.get_pixel_format();
    if !pix_fmt.is_8bit() {
        return Err(MorphError::UnsupportedPixelFormat(pix_fmt));
    }
    if pix_fmt != ref_two.image.get_pixel_format() {
        return Err(MorphError::PixelFormatMismatch{ one: pix_fmt, two: ref_two.image.get_pixel_format() });
    }

    let alpha = alpha.max(0.0).min(1.0);

    let averaged = landmarks::average_landmarks(lm_one, lm_two, alpha)?;
    let triangles = triangulation::triangulate(&averaged.midpoints, bounds);

    debug!("Morphing {} images (alpha = {:.2}) using {} landmarks and {} triangles.",
           bounds, alpha, lm_one.len(), triangles.len());

    let float_fmt = pix_fmt.float_equivalent();
    let src_one = ref_one.image.convert_pix_fmt(float_fmt);
    let src_two = ref_two.image.convert_pix_fmt(float_fmt);
    let mut acc = Image::new(bounds.width, bounds.height, float_fmt);

    let mut diagnostics = Vec::<MorphDiagnostic>::new();

    for t in &triangles {
        if let Some(diag) = check_triangle(t, lm_one.get_points(), lm_two.get_points(), &averaged.weighted, bounds) {
            debug!("Skipping triangle {}: {}.", t, diag);
            diagnostics.push(diag);
            continue;
        }

        match warp::composite_triangle(&src_one, &src_two,
                                       &triangle_points(t, lm_one.get_points()),
                                       &triangle_points(t, lm_two.get_points()),
                                       &triangle_points(t, &averaged.weighted),
                                       alpha, &mut acc) {
            Ok(()) => (),
            Err(WarpError::DegenerateTriangle) => {
                let diag = MorphDiagnostic::DegenerateTriangle{ triangle: *t };
                debug!("Skipping triangle {}: {}.", t, diag);
                diagnostics.push(diag);
            }
        }
    }

    let mut weighted = averaged.weighted;
    if lm_one.has_boundary_points() && lm_two.has_boundary_points() {
        let num_detected = weighted.len().saturating_sub(NUM_BOUNDARY_LANDMARKS);
        weighted.truncate(num_detected);
    }

    if !diagnostics.is_empty() {
        debug!("Morph finished with {} skipped triangle(s).", diagnostics.len());
    }

    Ok(MorphResult{ image: acc.convert_pix_fmt(pix_fmt),
                    landmarks: LandmarkSet::new(weighted),
                    diagnostics })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    fn square_face(img: Image, offset: f32) -> FaceImage {
        let lm = LandmarkSet::from_coords(&[(3.0 + offset, 3.0), (12.0, 4.0 + offset), (8.0, 11.0)]);
        let bounds = img.get_bounds();
        FaceImage::new(img, lm.with_boundary_points(bounds))
    }

    #[test]
    fn landmark_count_mismatch_is_fatal() {
        let one = FaceImage::new(Image::new(8, 8, PixelFormat::Mono8), LandmarkSet::from_coords(&[(1.0, 1.0)]));
        let two = FaceImage::new(Image::new(8, 8, PixelFormat::Mono8), LandmarkSet::default());
        assert!(matches!(morph(&one, &two, 0.5), Err(MorphError::LandmarkMismatch{ one: 1, two: 0 })));
    }

    #[test]
    fn preconditions_are_checked() {
        let lm = LandmarkSet::from_coords(&[(1.0, 1.0)]);
        let mono = FaceImage::new(Image::new(8, 8, PixelFormat::Mono8), lm.clone());
        let rgb = FaceImage::new(Image::new(8, 8, PixelFormat::RGB8), lm.clone());
        let small = FaceImage::new(Image::new(4, 8, PixelFormat::Mono8), lm.clone());
        let float = FaceImage::new(Image::new(8, 8, PixelFormat::Mono32f), lm);

        assert!(matches!(morph(&mono, &rgb, 0.5), Err(MorphError::PixelFormatMismatch{ .. })));
        assert!(matches!(morph(&mono, &small, 0.5), Err(MorphError::DimensionMismatch{ .. })));
        assert!(matches!(morph(&float, &float, 0.5), Err(MorphError::UnsupportedPixelFormat(_))));
    }

    #[test]
    fn result_landmarks_have_no_boundary_points() {
        let one = square_face(Image::new(16, 16, PixelFormat::RGB8), 0.0);
        let two = square_face(Image::new(16, 16, PixelFormat::RGB8), 1.0);

        let result = morph(&one, &two, 0.5).unwrap();
        assert_eq!(result.landmarks.len(), 3);
        assert!(!result.landmarks.has_boundary_points());
        assert_eq!(result.landmarks[0], PointFlt::new(3.5, 3.0));
        assert_eq!(result.image.get_pixel_format(), PixelFormat::RGB8);
        assert!(result.diagnostics.is_empty());
        assert!(!result.is_bad_morph());
    }

    #[test]
    fn uniform_images_are_cross_dissolved() {
        let one = square_face(Image::new_filled(16, 16, PixelFormat::Mono8, &[40u8]), 0.0);
        let two = square_face(Image::new_filled(16, 16, PixelFormat::Mono8, &[140u8]), 0.0);

        let result = morph(&one, &two, 0.25).unwrap();
        assert!(result.image.get_pixels::<u8>().iter().all(|&v| v == 65));
    }

    #[test]
    fn collapsed_target_triangle_is_skipped() {
        // Midpoint mesh is a proper triangle; at alpha 0.25 the third vertex lands
        // (almost) on the base line
        let one = FaceImage::new(Image::new_filled(16, 16, PixelFormat::Mono8, &[90u8]),
                                 LandmarkSet::from_coords(&[(2.0, 8.0), (12.0, 8.0), (7.0, 10.0)]));
        let two = FaceImage::new(Image::new_filled(16, 16, PixelFormat::Mono8, &[90u8]),
                                 LandmarkSet::from_coords(&[(2.0, 8.0), (12.0, 8.0), (7.0, 2.00002)]));

        let tstart = std::time::Instant::now();
        let result = morph(&one, &two, 0.25).unwrap();
        assert!(tstart.elapsed().as_secs_f64() < 1.0);

        assert_eq!(result.diagnostics.len(), 1);
        let t = result.diagnostics[0].get_triangle();
        assert!(t.contains(0) && t.contains(1) && t.contains(2));
        assert_eq!(result.diagnostics[0], MorphDiagnostic::DegenerateTriangle{ triangle: t });
        assert!(!result.is_bad_morph());
        assert!(result.image.get_pixels::<u8>().iter().all(|&v| v == 0));
    }

    #[test]
    fn diagnostic_messages() {
        let t = TriangleIndices{ a: 0, b: 4, c: 2 };
        let d = MorphDiagnostic::OutOfBoundsLandmark{ triangle: t, landmark: 4, reference: Reference::Two };
        assert_eq!(d.to_string(), "landmark 4 not contained in reference two");
        assert!(d.is_out_of_bounds());
        assert_eq!(d.get_triangle(), t);

        let d = MorphDiagnostic::DegenerateTriangle{ triangle: t };
        assert_eq!(d.to_string(), "triangle [0, 4, 2] is degenerate");
        assert!(!d.is_out_of_bounds());
    }

    #[test]
    fn first_offending_vertex_is_reported() {
        let bounds = CanvasBounds::new(10, 10);
        let t = TriangleIndices{ a: 0, b: 1, c: 2 };
        let inside = [PointFlt::new(1.0, 1.0), PointFlt::new(5.0, 1.0), PointFlt::new(1.0, 5.0)];
        let outside = [PointFlt::new(1.0, 1.0), PointFlt::new(10.0, 1.0), PointFlt::new(-1.0, 5.0)];

        assert_eq!(check_triangle(&t, &inside, &inside, &inside, bounds), None);
        assert_eq!(check_triangle(&t, &inside, &outside, &outside, bounds),
                   Some(MorphDiagnostic::OutOfBoundsLandmark{ triangle: t, landmark: 1, reference: Reference::Two }));
        assert_eq!(check_triangle(&t, &inside, &inside, &outside, bounds),
                   Some(MorphDiagnostic::OutOfBoundsTarget{ triangle: t, landmark: 1 }));
    }
}
