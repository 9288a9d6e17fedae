//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Library root.
//

#[macro_use]
mod utils;

pub mod batch;
pub mod defs;
pub mod error;
pub mod filters;
pub mod fourier;
pub mod image;
pub mod landmarks;
pub mod morph;
pub mod settings;
pub mod triangulation;
pub mod warp;

pub use defs::{CanvasBounds, Point, PointFlt, ProcessingError, ProcessingPhase};
pub use error::{MorphError, Result};
pub use image::{Image, PixelFormat};
pub use landmarks::{FaceImage, LandmarkDetector, LandmarkSet};
pub use morph::{morph, MorphDiagnostic, MorphResult};
