//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Morphing of all image pairs.
//

use crate::defs::{ProcessingError, ProcessingPhase};
use crate::filters::{self, FilterPipeline};
use crate::image::Image;
use crate::landmarks::{FaceImage, LandmarkSet};
use crate::morph::{self, MorphDiagnostic};
use crate::settings::{MorphSettings, OutputFormat, Transform};
use log::{debug, info, warn};


/// Input image of a batch.
#[derive(Clone, Debug)]
pub struct BatchEntry {
    pub title: String,
    pub face: FaceImage
}


impl BatchEntry {
    pub fn new(title: &str, face: FaceImage) -> BatchEntry {
        BatchEntry{ title: title.to_string(), face }
    }
}


/// Filtered morph of one image pair.
#[derive(Clone, Debug)]
pub struct BatchOutput {
    pub title_one: String,
    pub title_two: String,

    /// Suggested file name of the result.
    pub file_name: String,

    pub image: Image,
    pub landmarks: LandmarkSet,
    pub diagnostics: Vec<MorphDiagnostic>
}


/// Returns `"<title_one>_<title_two>.<ext>"`, prefixed with `"g_"` for grayscale results.
pub fn output_file_name(title_one: &str, title_two: &str, transform: Transform, format: OutputFormat) -> String {
    let prefix = match transform {
        Transform::Grayscale => "g_",
        Transform::None => ""
    };

    format!("{}{}_{}.{}", prefix, title_one, title_two, format.extension())
}


/// Morphs every ordered pair of distinct images; each step processes one pair.
pub struct BatchMorphProc {
    entries: Vec<BatchEntry>,

    settings: MorphSettings,

    pipeline: FilterPipeline,

    /// Indices (in `entries`) of the images to morph, in processing order.
    pairs: Vec<(usize, usize)>,

    next_pair: usize,

    num_rejected: usize,

    outputs: Vec<BatchOutput>
}


impl BatchMorphProc {
    /// Prepares morphing of all pairs of `entries`.
    ///
    /// Unless `settings.allow_bad_morphs` is set, images with landmarks outside
    /// of the image are excluded.
    ///
    pub fn init(entries: Vec<BatchEntry>, settings: MorphSettings) -> BatchMorphProc {
        let usable: Vec<usize> = entries.iter()
            .enumerate()
            .filter(|(_, e)| {
                let is_bad = e.face.has_bad_landmarks();
                if is_bad && !settings.allow_bad_morphs {
                    warn!("Image \"{}\" has landmarks outside of the image and will be skipped.", e.title);
                }
                !is_bad || settings.allow_bad_morphs
            })
            .map(|(i, _)| i)
            .collect();

        let mut pairs = Vec::<(usize, usize)>::with_capacity(usable.len() * usable.len());
        for &i in &usable {
            for &j in &usable {
                if i != j {
                    pairs.push((i, j));
                }
            }
        }

        info!("Batch of {} images ({} usable): {} morphs to generate.", entries.len(), usable.len(), pairs.len());

        let pipeline = settings.filter_pipeline();

        BatchMorphProc{ entries, settings, pipeline, pairs, next_pair: 0, num_rejected: 0, outputs: vec![] }
    }


    /// Returns the total number of pairs to morph.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }


    pub fn get_num_processed(&self) -> usize {
        self.next_pair
    }


    /// Returns the number of morphs discarded because of out-of-bounds landmarks.
    pub fn get_num_rejected(&self) -> usize {
        self.num_rejected
    }


    pub fn is_complete(&self) -> bool {
        self.next_pair >= self.pairs.len()
    }


    pub fn get_outputs(&self) -> &[BatchOutput] {
        &self.outputs
    }


    pub fn into_outputs(self) -> Vec<BatchOutput> {
        self.outputs
    }
}


impl ProcessingPhase for BatchMorphProc {
    fn step(&mut self) -> Result<(), ProcessingError> {
        let (i, j) = match self.pairs.get(self.next_pair) {
            Some(&pair) => pair,
            None => return Err(ProcessingError::NoMoreSteps)
        };
        self.next_pair += 1;

        let one = &self.entries[i];
        let two = &self.entries[j];

        let result = morph::morph(&one.face, &two.face, self.settings.alpha)?;

        if result.is_bad_morph() && !self.settings.allow_bad_morphs {
            warn!("Morph of \"{}\" and \"{}\" has unfilled areas and will be discarded.", one.title, two.title);
            for diag in &result.diagnostics {
                debug!("  {}", diag);
            }
            self.num_rejected += 1;
            return Ok(());
        }

        let mut image = self.pipeline.apply(&result.image);
        if self.settings.transform == Transform::Grayscale {
            image = filters::to_grayscale(&image);
        }

        let file_name = output_file_name(&one.title, &two.title, self.settings.transform, self.settings.format);
        debug!("Morphed pair {}/{}: {}.", self.next_pair, self.pairs.len(), file_name);

        self.outputs.push(BatchOutput{
            title_one: one.title.clone(),
            title_two: two.title.clone(),
            file_name,
            image,
            landmarks: result.landmarks,
            diagnostics: result.diagnostics
        });

        Ok(())
    }


    /// Returns the image of the last stored output; rejected morphs do not replace it.
    fn get_curr_img(&self) -> Option<&Image> {
        self.outputs.last().map(|o| &o.image)
    }
}
