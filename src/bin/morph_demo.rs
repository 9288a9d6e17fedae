//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Example showing basic usage of fmg: batch morphing of synthetic faces.
//

use clap::Parser;
use fmg::batch::{BatchEntry, BatchMorphProc};
use fmg::defs::{ProcessingError, ProcessingPhase};
use fmg::fourier;
use fmg::image::{Image, PixelFormat};
use fmg::landmarks::{FaceImage, LandmarkDetector, LandmarkSet};
use fmg::settings::{self, MorphSettings};
use log::{error, info};
use std::f32::consts::PI;
use std::path::PathBuf;


#[derive(Parser, Debug)]
#[command(name = "morph_demo")]
#[command(author, version, about = "Morphs all pairs of generated face images", long_about = None)]
struct Args {
    /// Settings file (JSON)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Width of the first generated image
    #[arg(long, default_value = "160")]
    width: u32,

    /// Height of the first generated image
    #[arg(long, default_value = "200")]
    height: u32,

    /// Number of generated faces
    #[arg(long, default_value = "3")]
    faces: usize
}


/// Places 68 landmarks (jaw, brows, nose, eyes, mouth) relative to the image size.
struct SyntheticDetector {
    eye_spread: f32,
    mouth_width: f32
}


impl LandmarkDetector for SyntheticDetector {
    fn detect(&self, img: &Image) -> fmg::Result<LandmarkSet> {
        let w = img.get_width() as f32;
        let h = img.get_height() as f32;
        let (cx, cy) = (w / 2.0, h / 2.0);

        let mut points = Vec::<(f32, f32)>::with_capacity(68);

        // Jaw
        for i in 0..17 {
            let t = PI * i as f32 / 16.0;
            points.push((cx - 0.4 * w * t.cos(), cy + 0.05 * h + 0.4 * h * t.sin()));
        }

        // Brows
        for &side in &[-1.0f32, 1.0] {
            for i in 0..5 {
                let x = cx + side * (0.08 + 0.05 * i as f32) * w * self.eye_spread;
                points.push((x, cy - 0.22 * h - 0.02 * h * (2.0 - (i as f32 - 2.0).abs())));
            }
        }

        // Nose bridge and base
        for i in 0..4 {
            points.push((cx, cy - 0.12 * h + 0.05 * h * i as f32));
        }
        for i in 0..5 {
            points.push((cx + (i as f32 - 2.0) * 0.04 * w, cy + 0.1 * h));
        }

        // Eyes
        for &side in &[-1.0f32, 1.0] {
            let (ex, ey) = (cx + side * 0.18 * w * self.eye_spread, cy - 0.1 * h);
            for k in 0..6 {
                let t = PI / 3.0 * k as f32;
                points.push((ex + 0.07 * w * t.cos(), ey + 0.03 * h * t.sin()));
            }
        }

        // Mouth, outer and inner contour
        let (mx, my) = (cx, cy + 0.25 * h);
        for k in 0..12 {
            let t = PI / 6.0 * k as f32;
            points.push((mx + self.mouth_width * w * t.cos(), my + 0.05 * h * t.sin()));
        }
        for k in 0..8 {
            let t = PI / 4.0 * k as f32;
            points.push((mx + 0.6 * self.mouth_width * w * t.cos(), my + 0.02 * h * t.sin()));
        }

        Ok(LandmarkSet::from_coords(&points))
    }
}


/// Returns an RGB image of an elliptical "face" on a gray background.
fn generate_face(width: u32, height: u32, tint: [u8; 3]) -> Image {
    let mut pixels = Vec::<u8>::with_capacity((width * height * 3) as usize);
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

    for y in 0..height {
        for x in 0..width {
            let dx = (x as f32 - cx) / (0.42 * width as f32);
            let dy = (y as f32 - cy) / (0.48 * height as f32);
            let r = (dx * dx + dy * dy).sqrt();
            if r < 1.0 {
                let shade = 1.0 - 0.4 * r;
                pixels.extend(tint.iter().map(|&c| (c as f32 * shade) as u8));
            } else {
                pixels.extend_from_slice(&[96, 96, 96]);
            }
        }
    }

    Image::new_from_pixels(width, height, PixelFormat::RGB8, pixels)
}


/// Returns false on failure.
fn execute_processing_phase(phase_processor: &mut dyn ProcessingPhase) -> bool {
    loop {
        match phase_processor.step() {
            Err(ProcessingError::NoMoreSteps) => break,
            Err(err) => { error!("Error during processing: {}", err); return false; },
            Ok(()) => ()
        }
    }

    true
}


fn time_elapsed_str(tstart: std::time::Instant) -> String {
    format!("{:.*}", 3, tstart.elapsed().as_secs_f64())
}


fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => match settings::load_settings(path) {
            Ok(s) => s,
            Err(err) => { error!("Cannot load settings: {}", err); return; }
        },
        None => MorphSettings::default()
    };
    settings.log_summary();

    let tstart0 = std::time::Instant::now();

    let tints = [[224u8, 172, 140], [198, 134, 96], [240, 200, 170], [141, 85, 54]];
    let sources: Vec<Image> = (0..args.faces)
        .map(|i| generate_face(args.width + 8 * i as u32, args.height + 6 * i as u32, tints[i % tints.len()]))
        .collect();

    let bounds = match settings.resolve_bounds(&sources.iter().map(|img| img.get_bounds()).collect::<Vec<_>>()) {
        Ok(b) => b,
        Err(err) => { error!("{}", err); return; }
    };
    info!("Working resolution: {}", bounds);

    let mut entries = Vec::<BatchEntry>::new();
    for (i, src) in sources.iter().enumerate() {
        let detector = SyntheticDetector{ eye_spread: 0.9 + 0.1 * i as f32, mouth_width: 0.1 + 0.02 * i as f32 };
        match FaceImage::admit(src, &detector, bounds) {
            Ok(face) => entries.push(BatchEntry::new(&format!("face{}", i + 1), face)),
            Err(err) => error!("Image {} rejected: {}", i + 1, err)
        }
    }

    let mut batch = BatchMorphProc::init(entries, settings);
    info!("Morphing {} pairs...", batch.pair_count());

    let tstart = std::time::Instant::now();
    if !execute_processing_phase(&mut batch) {
        return;
    }
    info!("Morphing done in {} s ({} rejected).", time_elapsed_str(tstart), batch.get_num_rejected());

    if let Some(img) = batch.get_curr_img() {
        let spectrum = fourier::magnitude_spectrum(img);
        let mean = spectrum.get_pixels::<u8>().iter().map(|&v| v as f64).sum::<f64>() /
                   spectrum.get_pixels::<u8>().len().max(1) as f64;
        info!("Spectrum of the last result: {}x{}, mean level {:.1}.",
              spectrum.get_width(), spectrum.get_height(), mean);
    }

    for output in batch.get_outputs() {
        info!("{}: {} landmarks, {} skipped triangle(s)",
              output.file_name, output.landmarks.len(), output.diagnostics.len());
        for diag in &output.diagnostics {
            info!("    {}", diag);
        }
    }

    info!("Total time: {} s", time_elapsed_str(tstart0));
}
