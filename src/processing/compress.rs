use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use crate::artifact::Artifact;
use crate::error::PipelineError;
use crate::settings::CameraSettings;

pub const MIN_QUALITY: f32 = 0.05;
pub const MAX_QUALITY: f32 = 0.7;

/// Output quality factor in [`MIN_QUALITY`, `MAX_QUALITY`].
///
/// Full effect intensity scales the base quality down to 40% of its value.
pub fn derive_quality(settings: &CameraSettings) -> f32 {
    let level = settings.compression_quality * (0.4 + 0.6 * (1.0 - settings.effect_intensity));
    if level.is_nan() {
        return MIN_QUALITY;
    }
    level.clamp(MIN_QUALITY, MAX_QUALITY)
}

/// Maps a [0,1] quality factor onto the JPEG encoder's 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Re-encodes `input` as a baseline JPEG at `quality` into `dest`.
pub fn compress(input: &Artifact, quality: f32, dest: &Path) -> Result<Artifact, PipelineError> {
    let img = image::open(&input.path)
        .map_err(|e| PipelineError::Encode(format!("reading {} failed: {e}", input.path.display())))?
        .to_rgb8();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::Encode(format!("create {} failed: {e}", parent.display())))?;
    }
    let file = fs::File::create(dest)
        .map_err(|e| PipelineError::Encode(format!("create {} failed: {e}", dest.display())))?;
    if let Err(e) = encode_jpeg(&img, quality, BufWriter::new(file)) {
        discard_partial(dest);
        return Err(PipelineError::Encode(format!(
            "jpeg encode failed {}: {e}",
            dest.display()
        )));
    }

    tracing::debug!(dest = %dest.display(), quality, "compressed output");
    Ok(Artifact::new(dest.to_path_buf(), img.width(), img.height()))
}

/// Encodes into `writer` and flushes it; a buffered write error is an error here.
fn encode_jpeg<W: Write>(img: &RgbImage, quality: f32, mut writer: W) -> Result<(), String> {
    let encoder = JpegEncoder::new_with_quality(&mut writer, jpeg_quality(quality));
    img.write_with_encoder(encoder).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

fn discard_partial(dest: &Path) {
    if !dest.is_file() {
        return;
    }
    if let Err(e) = fs::remove_file(dest) {
        tracing::warn!(dest = %dest.display(), error = %e, "failed to remove partial output");
    }
}
