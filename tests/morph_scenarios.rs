//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   End-to-end morphing scenarios.
//

use fmg::batch::{BatchEntry, BatchMorphProc};
use fmg::defs::{CanvasBounds, Point, ProcessingError, ProcessingPhase};
use fmg::filters::{FilterKind, FilterPipeline};
use fmg::image::{Image, PixelFormat};
use fmg::landmarks::{FaceImage, LandmarkDetector, LandmarkSet, NUM_DETECTED_LANDMARKS};
use fmg::morph::{morph, MorphDiagnostic, Reference};
use fmg::settings::MorphSettings;
use fmg::triangulation::triangulate;
use fmg::MorphError;


fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}


fn gradient(width: u32, height: u32, seed: u32) -> Image {
    let mut pixels = Vec::<u8>::new();
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x * 13 + y * 3 + seed) % 256) as u8);
            pixels.push(((x * 2 + y * 11 + 2 * seed) % 256) as u8);
            pixels.push(((x * 7 + y * 5 + 3 * seed) % 256) as u8);
        }
    }
    Image::new_from_pixels(width, height, PixelFormat::RGB8, pixels)
}


fn face(img: Image, coords: &[(f32, f32)]) -> FaceImage {
    let bounds = img.get_bounds();
    FaceImage::new(img, LandmarkSet::from_coords(coords).with_boundary_points(bounds))
}


fn max_abs_diff(a: &Image, b: &Image) -> i32 {
    a.get_pixels::<u8>().iter()
        .zip(b.get_pixels::<u8>())
        .map(|(&p, &q)| (p as i32 - q as i32).abs())
        .max()
        .unwrap_or(0)
}


const COORDS_ONE: [(f32, f32); 3] = [(5.0, 5.0), (10.0, 6.0), (7.0, 11.0)];
const COORDS_TWO: [(f32, f32); 3] = [(6.0, 5.0), (11.0, 7.0), (8.0, 10.0)];


#[test]
fn alpha_zero_reproduces_first_image() {
    init_logging();
    let one = face(gradient(16, 16, 0), &COORDS_ONE);
    let two = face(gradient(16, 16, 77), &COORDS_TWO);

    let result = morph(&one, &two, 0.0).unwrap();
    assert!(result.diagnostics.is_empty());
    assert!(max_abs_diff(&result.image, &one.image) <= 1);
}


#[test]
fn alpha_one_reproduces_second_image() {
    init_logging();
    let one = face(gradient(16, 16, 0), &COORDS_ONE);
    let two = face(gradient(16, 16, 77), &COORDS_TWO);

    let result = morph(&one, &two, 1.0).unwrap();
    assert!(result.diagnostics.is_empty());
    assert!(max_abs_diff(&result.image, &two.image) <= 1);
}


#[test]
fn red_and_blue_give_purple() {
    init_logging();
    let one = face(Image::new_filled(24, 20, PixelFormat::RGB8, &[255u8, 0, 0]), &COORDS_ONE);
    let two = face(Image::new_filled(24, 20, PixelFormat::RGB8, &[0u8, 0, 255]), &COORDS_ONE);

    let result = morph(&one, &two, 0.5).unwrap();

    assert_eq!(result.image.get_width(), 24);
    assert_eq!(result.image.get_height(), 20);
    for pix in result.image.get_pixels::<u8>().chunks(3) {
        assert!(pix[0] == 127 || pix[0] == 128);
        assert_eq!(pix[1], 0);
        assert!(pix[2] == 127 || pix[2] == 128);
    }
}


#[test]
fn out_of_bounds_landmark_is_reported() {
    init_logging();
    let one = face(Image::new_filled(20, 20, PixelFormat::Mono8, &[50u8]),
                   &[(-5.0, -5.0), (12.0, 6.0), (8.0, 14.0)]);
    let two = face(Image::new_filled(20, 20, PixelFormat::Mono8, &[150u8]),
                   &[(15.0, 15.0), (12.0, 6.0), (8.0, 14.0)]);
    assert!(one.has_bad_landmarks());
    assert!(!two.has_bad_landmarks());

    let result = morph(&one, &two, 0.5).unwrap();

    assert!(result.is_bad_morph());
    assert!(!result.diagnostics.is_empty());
    for diag in &result.diagnostics {
        assert_eq!(diag, &MorphDiagnostic::OutOfBoundsLandmark{ triangle: diag.get_triangle(),
                                                               landmark: 0,
                                                               reference: Reference::One });
        assert!(diag.get_triangle().contains(0));
    }
    assert_eq!(result.diagnostics[0].to_string(), "landmark 0 not contained in reference one");

    // Triangles not using the bad landmark are still warped
    assert!(result.image.get_pixels::<u8>().iter().any(|&v| v == 100));
}


struct GridDetector;


impl LandmarkDetector for GridDetector {
    fn detect(&self, img: &Image) -> fmg::Result<LandmarkSet> {
        if img.get_width() < 40 {
            return Err(MorphError::NoFaceDetected);
        }
        let coords: Vec<(f32, f32)> = (0..NUM_DETECTED_LANDMARKS)
            .map(|i| (4.0 + (i % 9) as f32 * 5.0, 4.0 + (i / 9) as f32 * 5.0))
            .collect();
        Ok(LandmarkSet::from_coords(&coords))
    }
}


#[test]
fn detected_landmarks_pass_through_morph() {
    init_logging();
    let bounds = CanvasBounds::new(50, 48);
    let one = FaceImage::admit(&gradient(100, 96, 1), &GridDetector, bounds).unwrap();
    let two = FaceImage::admit(&gradient(60, 60, 9), &GridDetector, bounds).unwrap();

    assert_eq!(one.get_bounds(), bounds);
    assert_eq!(one.landmarks.len(), NUM_DETECTED_LANDMARKS + 8);

    let result = morph(&one, &two, 0.3).unwrap();
    assert_eq!(result.landmarks.len(), NUM_DETECTED_LANDMARKS);
    assert!(result.diagnostics.is_empty());

    assert!(matches!(FaceImage::admit(&gradient(30, 30, 0), &GridDetector, CanvasBounds::new(30, 30)),
                     Err(MorphError::NoFaceDetected)));
}


#[test]
fn contrast_and_brightness_after_morph() {
    init_logging();
    let one = face(Image::new_filled(16, 16, PixelFormat::Mono8, &[40u8]), &COORDS_ONE);
    let two = face(Image::new_filled(16, 16, PixelFormat::Mono8, &[80u8]), &COORDS_TWO);

    let result = morph(&one, &two, 0.5).unwrap();
    assert!(result.image.get_pixels::<u8>().iter().all(|&v| v == 60));

    let pipeline = FilterPipeline::new().with(FilterKind::Contrast, 50).with(FilterKind::Brightness, 10);
    let filtered = pipeline.apply(&result.image);
    assert!(filtered.get_pixels::<u8>().iter().all(|&v| v == 100));

    // No-effect intensities
    let weak = FilterPipeline::new().with(FilterKind::Median, 2).with(FilterKind::Gaussian, 1);
    assert!(!weak.has_effect());
    assert_eq!(weak.apply(&result.image), result.image);
}


#[test]
fn triangulation_is_deterministic() {
    let bounds = CanvasBounds::new(64, 64);
    let mut state = 12345u32;
    let mut points = vec![];
    for _ in 0..60 {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        let x = (state >> 16) % 64;
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        let y = (state >> 16) % 64;
        points.push(Point{ x: x as i32, y: y as i32 });
    }

    let first = triangulate(&points, bounds);
    let second = triangulate(&points, bounds);

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert!(first.iter().all(|t| t.as_array().iter().all(|&i| i < points.len())));
}


#[test]
fn batch_of_three_faces() {
    init_logging();
    let entries: Vec<BatchEntry> = (0..3u8)
        .map(|i| BatchEntry::new(&format!("f{}", i),
                                 face(Image::new_filled(16, 16, PixelFormat::RGB8, &[i * 50, 0, 0]), &COORDS_ONE)))
        .collect();

    let mut proc = BatchMorphProc::init(entries, MorphSettings::default());
    loop {
        match proc.step() {
            Ok(()) => (),
            Err(ProcessingError::NoMoreSteps) => break,
            Err(err) => panic!("{}", err)
        }
    }

    let outputs = proc.into_outputs();
    assert_eq!(outputs.len(), 6);
    assert_eq!(outputs[0].file_name, "f0_f1.jpg");
    assert!(outputs[0].image.get_pixels::<u8>().chunks(3).all(|p| p == [25, 0, 0]));
}
