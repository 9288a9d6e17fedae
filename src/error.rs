//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Error types.
//

use crate::defs::CanvasBounds;
use crate::image::PixelFormat;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum MorphError {
    #[error("landmark count mismatch: reference one has {one}, reference two has {two}")]
    LandmarkMismatch {
        one: usize,
        two: usize
    },

    #[error("image dimensions differ: {one} vs. {two}")]
    DimensionMismatch {
        one: CanvasBounds,
        two: CanvasBounds
    },

    #[error("pixel formats differ: {one:?} vs. {two:?}")]
    PixelFormatMismatch {
        one: PixelFormat,
        two: PixelFormat
    },

    #[error("unsupported pixel format: {0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    #[error("no face detected")]
    NoFaceDetected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String)
}


pub type Result<T> = std::result::Result<T, MorphError>;
