use std::path::{Path, PathBuf};

use crate::artifact::{Artifact, WorkDir, unique_name};
use crate::error::PipelineError;
use crate::settings::CameraSettings;

use super::compress;
use super::geometry;
use super::retro::{self, CpuEffectEngine, EffectEngine, EffectOutcome, Seed, SkipReason};

#[derive(Debug, Clone, PartialEq)]
/// What the effect stage did for a processed photo.
pub enum EffectReport {
    Applied,
    Disabled,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ProcessedPhoto {
    pub artifact: Artifact,
    pub quality: f32,
    pub effect: EffectReport,
}

/// resize → retro effect (optional, best effort) → compress.
pub struct PhotoPipeline {
    work: WorkDir,
    output_dir: PathBuf,
    engine: Box<dyn EffectEngine>,
}

impl PhotoPipeline {
    pub fn new(work: WorkDir, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            work,
            output_dir: output_dir.into(),
            engine: Box::new(CpuEffectEngine),
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn EffectEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Turns a captured frame into the final retro JPEG.
    ///
    /// Decode, resize and encode failures are returned; effect failures fall
    /// back to the plain resized frame. Intermediate files are removed on
    /// every path out of this function.
    pub fn process_photo(
        &self,
        source: &Path,
        settings: &CameraSettings,
        seed: Seed,
    ) -> Result<ProcessedPhoto, PipelineError> {
        let resized = geometry::normalize(source, settings.resolution, &self.work)?;

        let outcome = retro::run(
            self.engine.as_ref(),
            resized.artifact(),
            settings,
            seed,
            &self.work,
        );
        let (to_compress, effect) = match &outcome {
            EffectOutcome::Applied(out) => (out.artifact(), EffectReport::Applied),
            EffectOutcome::Skipped(SkipReason::Disabled) => {
                (resized.artifact(), EffectReport::Disabled)
            }
            EffectOutcome::Skipped(SkipReason::Failed(msg)) => {
                (resized.artifact(), EffectReport::Failed(msg.clone()))
            }
        };

        let quality = compress::derive_quality(settings);
        let dest = self.output_dir.join(unique_name("retro", "jpg"));
        let artifact = compress::compress(to_compress, quality, &dest)?;

        tracing::info!(
            source = %source.display(),
            output = %artifact.path.display(),
            width = artifact.width,
            height = artifact.height,
            quality,
            effect = ?effect,
            "processed photo"
        );
        Ok(ProcessedPhoto {
            artifact,
            quality,
            effect,
        })
    }
}
