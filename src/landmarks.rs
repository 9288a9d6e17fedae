//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Facial landmarks and their averaging.
//

use crate::defs::{CanvasBounds, Point, PointFlt};
use crate::error::{MorphError, Result};
use crate::image::Image;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::ops::Index;


/// Number of landmarks produced by the detector.
pub const NUM_DETECTED_LANDMARKS: usize = 68;

/// Number of synthetic points appended at the image border (corners and edge midpoints).
pub const NUM_BOUNDARY_LANDMARKS: usize = 8;


/// Ordered facial landmarks of one image.
///
/// Index `i` denotes the same anatomical feature in every set of equal length.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<PointFlt>,

    /// True if the last `NUM_BOUNDARY_LANDMARKS` points are the synthetic border points.
    has_boundary_points: bool
}


impl LandmarkSet {
    pub fn new(points: Vec<PointFlt>) -> LandmarkSet {
        LandmarkSet{ points, has_boundary_points: false }
    }


    pub fn from_coords(coords: &[(f32, f32)]) -> LandmarkSet {
        LandmarkSet::new(coords.iter().map(|&(x, y)| PointFlt::new(x, y)).collect())
    }


    pub fn len(&self) -> usize {
        self.points.len()
    }


    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }


    pub fn get_points(&self) -> &[PointFlt] {
        &self.points
    }


    pub fn has_boundary_points(&self) -> bool {
        self.has_boundary_points
    }


    /// Appends the 4 corners and 4 edge midpoints of `bounds` (unless already present).
    pub fn with_boundary_points(mut self, bounds: CanvasBounds) -> LandmarkSet {
        if self.has_boundary_points {
            return self;
        }

        let w = bounds.width as i32;
        let h = bounds.height as i32;

        let boundary: [Point; NUM_BOUNDARY_LANDMARKS] = [
            Point{ x: 0,     y: 0 },     // top-left
            Point{ x: w - 1, y: 0 },     // top-right
            Point{ x: 0,     y: h - 1 }, // bottom-left
            Point{ x: w - 1, y: h - 1 }, // bottom-right
            Point{ x: 0,     y: h / 2 }, // mid-left
            Point{ x: w / 2, y: 0 },     // mid-top
            Point{ x: w - 1, y: h / 2 }, // mid-right
            Point{ x: w / 2, y: h - 1 }  // mid-bottom
        ];

        self.points.extend(boundary.iter().map(|&p| PointFlt::from(p)));
        self.has_boundary_points = true;
        self
    }


    /// Removes the synthetic border points (if present).
    pub fn without_boundary_points(mut self) -> LandmarkSet {
        if self.has_boundary_points {
            let new_len = self.points.len().saturating_sub(NUM_BOUNDARY_LANDMARKS);
            self.points.truncate(new_len);
            self.has_boundary_points = false;
        }
        self
    }


    /// Returns indices of landmarks lying outside of `bounds`.
    pub fn find_outside(&self, bounds: CanvasBounds) -> Vec<usize> {
        self.points.iter()
            .enumerate()
            .filter(|(_, p)| !bounds.contains(p))
            .map(|(i, _)| i)
            .collect()
    }


    pub fn is_contained_in(&self, bounds: CanvasBounds) -> bool {
        self.points.iter().all(|p| bounds.contains(p))
    }
}


impl Index<usize> for LandmarkSet {
    type Output = PointFlt;

    fn index(&self, idx: usize) -> &PointFlt {
        &self.points[idx]
    }
}


/// Source of facial landmarks (e.g. a shape predictor run on a detected face).
pub trait LandmarkDetector {
    /// Returns `NUM_DETECTED_LANDMARKS` points in a fixed anatomical order,
    /// or `MorphError::NoFaceDetected`.
    fn detect(&self, img: &Image) -> Result<LandmarkSet>;
}


/// An image together with its landmarks.
#[derive(Clone, Debug)]
pub struct FaceImage {
    pub image: Image,
    pub landmarks: LandmarkSet
}


impl FaceImage {
    pub fn new(image: Image, landmarks: LandmarkSet) -> FaceImage {
        FaceImage{ image, landmarks }
    }


    /// Prepares an image for morphing: scales it to `bounds`, detects landmarks
    /// and appends the border points.
    pub fn admit(image: &Image, detector: &dyn LandmarkDetector, bounds: CanvasBounds) -> Result<FaceImage> {
        let scaled = image.scaled(bounds.width, bounds.height);
        let landmarks = detector.detect(&scaled)?;

        if landmarks.len() < NUM_DETECTED_LANDMARKS {
            warn!("Failed to get {} facial landmarks (got {}).", NUM_DETECTED_LANDMARKS, landmarks.len());
        }

        let landmarks = landmarks.with_boundary_points(bounds);
        debug!("Admitted {} image with {} landmarks.", bounds, landmarks.len());

        Ok(FaceImage{ image: scaled, landmarks })
    }


    pub fn get_bounds(&self) -> CanvasBounds {
        self.image.get_bounds()
    }


    /// Returns true if any landmark lies outside of the image; morphs using
    /// such an image will have unwarped holes.
    pub fn has_bad_landmarks(&self) -> bool {
        !self.landmarks.is_contained_in(self.image.get_bounds())
    }
}


/// Landmark sequences derived from two landmark sets.
#[derive(Clone, Debug, PartialEq)]
pub struct AveragedLandmarks {
    /// Per-index midpoints rounded down; used only for triangulation.
    pub midpoints: Vec<Point>,

    /// Per-index `(1 - alpha) * one + alpha * two`; target positions for warping.
    pub weighted: Vec<PointFlt>
}


/// Computes the midpoint and alpha-weighted sequences of two equal-length landmark sets.
pub fn average_landmarks(one: &LandmarkSet, two: &LandmarkSet, alpha: f32) -> Result<AveragedLandmarks> {
    if one.len() != two.len() {
        return Err(MorphError::LandmarkMismatch{ one: one.len(), two: two.len() });
    }

    let alpha = alpha.max(0.0).min(1.0);

    let mut midpoints = Vec::with_capacity(one.len());
    let mut weighted = Vec::with_capacity(one.len());

    for (p1, p2) in one.get_points().iter().zip(two.get_points()) {
        midpoints.push(((*p1 + *p2) * 0.5).floor());
        weighted.push(*p1 * (1.0 - alpha) + *p2 * alpha);
    }

    Ok(AveragedLandmarks{ midpoints, weighted })
}


#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Vec<(f32, f32)>);

    impl LandmarkDetector for FixedDetector {
        fn detect(&self, _img: &Image) -> Result<LandmarkSet> {
            if self.0.is_empty() {
                Err(MorphError::NoFaceDetected)
            } else {
                Ok(LandmarkSet::from_coords(&self.0))
            }
        }
    }

    #[test]
    fn boundary_points_order() {
        let set = LandmarkSet::from_coords(&[(5.0, 5.0)]).with_boundary_points(CanvasBounds::new(10, 7));
        assert_eq!(set.len(), 1 + NUM_BOUNDARY_LANDMARKS);
        assert!(set.has_boundary_points());
        let expected = [(0.0, 0.0), (9.0, 0.0), (0.0, 6.0), (9.0, 6.0),
                        (0.0, 3.0), (5.0, 0.0), (9.0, 3.0), (5.0, 6.0)];
        for (i, &(x, y)) in expected.iter().enumerate() {
            assert_eq!(set[i + 1], PointFlt::new(x, y));
        }
        assert!(set.is_contained_in(CanvasBounds::new(10, 7)));
    }

    #[test]
    fn boundary_points_are_added_once_and_stripped() {
        let bounds = CanvasBounds::new(8, 8);
        let set = LandmarkSet::from_coords(&[(1.0, 2.0), (3.0, 4.0)])
            .with_boundary_points(bounds)
            .with_boundary_points(bounds);
        assert_eq!(set.len(), 10);

        let stripped = set.without_boundary_points();
        assert_eq!(stripped.len(), 2);
        assert!(!stripped.has_boundary_points());
        assert_eq!(stripped.clone().without_boundary_points(), stripped);
    }

    #[test]
    fn averaging() {
        let one = LandmarkSet::from_coords(&[(0.0, 0.0), (3.0, 5.0), (-5.0, -5.0)]);
        let two = LandmarkSet::from_coords(&[(10.0, 20.0), (4.0, 8.0), (4.0, 4.0)]);

        let avg = average_landmarks(&one, &two, 0.25).unwrap();
        assert_eq!(avg.midpoints, vec![Point{ x: 5, y: 10 }, Point{ x: 3, y: 6 }, Point{ x: -1, y: -1 }]);
        assert_eq!(avg.weighted[0], PointFlt::new(2.5, 5.0));
        assert_eq!(avg.weighted[1], PointFlt::new(3.25, 5.75));
    }

    #[test]
    fn averaging_extremes_reproduce_inputs() {
        let one = LandmarkSet::from_coords(&[(1.0, 2.0), (7.5, 3.25)]);
        let two = LandmarkSet::from_coords(&[(9.0, 4.0), (0.5, 8.0)]);

        assert_eq!(average_landmarks(&one, &two, 0.0).unwrap().weighted, one.get_points());
        assert_eq!(average_landmarks(&one, &two, 1.0).unwrap().weighted, two.get_points());
        // Midpoints do not depend on alpha
        assert_eq!(average_landmarks(&one, &two, 0.1).unwrap().midpoints,
                   average_landmarks(&one, &two, 0.9).unwrap().midpoints);
    }

    #[test]
    fn averaging_length_mismatch() {
        let one = LandmarkSet::from_coords(&[(0.0, 0.0)]);
        let two = LandmarkSet::from_coords(&[(0.0, 0.0), (1.0, 1.0)]);
        match average_landmarks(&one, &two, 0.5) {
            Err(MorphError::LandmarkMismatch{ one: 1, two: 2 }) => (),
            other => panic!("unexpected result: {:?}", other)
        }
    }

    #[test]
    fn admission_scales_and_augments() {
        let img = Image::new(40, 30, crate::image::PixelFormat::RGB8);
        let detector = FixedDetector(vec![(5.0, 5.0); NUM_DETECTED_LANDMARKS]);
        let face = FaceImage::admit(&img, &detector, CanvasBounds::new(20, 15)).unwrap();

        assert_eq!(face.get_bounds(), CanvasBounds::new(20, 15));
        assert_eq!(face.landmarks.len(), NUM_DETECTED_LANDMARKS + NUM_BOUNDARY_LANDMARKS);
        assert!(!face.has_bad_landmarks());
    }

    #[test]
    fn admission_without_face() {
        let img = Image::new(10, 10, crate::image::PixelFormat::Mono8);
        let res = FaceImage::admit(&img, &FixedDetector(vec![]), CanvasBounds::new(10, 10));
        assert!(matches!(res, Err(MorphError::NoFaceDetected)));
    }

    #[test]
    fn bad_landmarks() {
        let img = Image::new(10, 10, crate::image::PixelFormat::Mono8);
        let face = FaceImage::new(img, LandmarkSet::from_coords(&[(2.0, 2.0), (-5.0, -5.0), (10.0, 3.0)]));
        assert!(face.has_bad_landmarks());
        assert_eq!(face.landmarks.find_outside(face.get_bounds()), vec![1, 2]);
    }
}
