//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Morphing settings.
//

use crate::defs::CanvasBounds;
use crate::error::{MorphError, Result};
use crate::filters::{FilterKind, FilterPipeline};
use log::info;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fs;
use std::path::Path;


/// Transform applied to morph results after filtering.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Transform {
    None,
    Grayscale
}


impl From<i32> for Transform {
    fn from(value: i32) -> Transform {
        if value > 0 { Transform::Grayscale } else { Transform::None }
    }
}


impl From<Transform> for i32 {
    fn from(t: Transform) -> i32 {
        match t {
            Transform::None => 0,
            Transform::Grayscale => 1
        }
    }
}


#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum OutputFormat {
    /// Lossy compressed.
    Jpeg,
    /// Lossless compressed.
    Png
}


impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png"
        }
    }
}


impl TryFrom<i32> for OutputFormat {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<OutputFormat, String> {
        match value {
            0 => Ok(OutputFormat::Jpeg),
            1 => Ok(OutputFormat::Png),
            _ => Err(format!("unknown output format {}", value))
        }
    }
}


impl From<OutputFormat> for i32 {
    fn from(f: OutputFormat) -> i32 {
        match f {
            OutputFormat::Jpeg => 0,
            OutputFormat::Png => 1
        }
    }
}


/// Settings of a morphing session; every key is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MorphSettings {
    /// Output width and height; (-1, -1) means the smallest input dimensions.
    pub resolution: [i32; 2],

    /// Weight of the second image.
    pub alpha: f32,

    /// Homogeneous (box) smoothing intensity.
    pub h_filter: i32,
    pub g_filter: i32,
    pub m_filter: i32,
    /// Bilateral smoothing intensity (values up to 50 recommended).
    pub b_filter: i32,

    pub transform: Transform,

    pub sharpness: i32,
    pub contrast: i32,
    pub brightness: i32,

    /// If true, morphs with out-of-bounds landmarks are kept.
    pub allow_bad_morphs: bool,

    pub format: OutputFormat
}


impl Default for MorphSettings {
    fn default() -> MorphSettings {
        MorphSettings{
            resolution: [-1, -1],
            alpha: 0.5,
            h_filter: 0,
            g_filter: 0,
            m_filter: 0,
            b_filter: 0,
            transform: Transform::None,
            sharpness: 0,
            contrast: 0,
            brightness: 0,
            allow_bad_morphs: false,
            format: OutputFormat::Jpeg
        }
    }
}


/// Reads settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<MorphSettings> {
    let contents = fs::read_to_string(path)?;
    let settings = MorphSettings::from_json(&contents)?;
    info!("Loaded settings from {}.", path.display());
    Ok(settings)
}


impl MorphSettings {
    /// Parses settings; alpha is clamped to [0, 1].
    pub fn from_json(json: &str) -> Result<MorphSettings> {
        let mut settings: MorphSettings = serde_json::from_str(json)?;

        settings.alpha = settings.alpha.max(0.0).min(1.0);

        match settings.resolution {
            [-1, -1] => (),
            [w, h] if w > 0 && h > 0 => (),
            [w, h] => return Err(MorphError::InvalidSettings(format!("invalid resolution {}x{}", w, h)))
        }

        Ok(settings)
    }


    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }


    /// Returns the output dimensions: the configured resolution, or the smallest width
    /// and the smallest height among `inputs`.
    pub fn resolve_bounds(&self, inputs: &[CanvasBounds]) -> Result<CanvasBounds> {
        match self.resolution {
            [w, h] if w > 0 && h > 0 => Ok(CanvasBounds::new(w as u32, h as u32)),
            _ => {
                let width = inputs.iter().map(|b| b.width).min();
                let height = inputs.iter().map(|b| b.height).min();
                match (width, height) {
                    (Some(w), Some(h)) if w > 0 && h > 0 => Ok(CanvasBounds::new(w, h)),
                    _ => Err(MorphError::InvalidSettings("cannot derive resolution without input images".to_string()))
                }
            }
        }
    }


    pub fn filter_pipeline(&self) -> FilterPipeline {
        FilterPipeline::new()
            .with(FilterKind::Box, self.h_filter)
            .with(FilterKind::Gaussian, self.g_filter)
            .with(FilterKind::Median, self.m_filter)
            .with(FilterKind::Bilateral, self.b_filter)
            .with(FilterKind::Sharpen, self.sharpness)
            .with(FilterKind::Contrast, self.contrast)
            .with(FilterKind::Brightness, self.brightness)
    }


    pub fn log_summary(&self) {
        match self.resolution {
            [-1, -1] => info!("Resolution: smallest input"),
            [w, h] => info!("Resolution: {}x{}", w, h)
        }
        info!("Alpha: {:.2}", self.alpha);
        info!("Smoothing (homogeneous/gaussian/median/bilateral): {}/{}/{}/{}",
              self.h_filter, self.g_filter, self.m_filter, self.b_filter);
        info!("Sharpness/contrast/brightness: {}/{}/{}", self.sharpness, self.contrast, self.brightness);
        info!("Transform: {:?}", self.transform);
        info!("Allow bad morphs: {}", self.allow_bad_morphs);
        info!("Output format: {}", self.format.extension());
    }
}
