use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;

use crate::artifact::{Artifact, ScratchArtifact, WorkDir};
use crate::error::PipelineError;
use crate::metadata;
use crate::settings::Resolution;
use crate::source;

/// Decodes `source_path`, uprights it, and resizes it to exactly `resolution`.
///
/// The result is written as a lossless PNG scratch artifact.
pub fn normalize(
    source_path: &Path,
    resolution: Resolution,
    work: &WorkDir,
) -> Result<ScratchArtifact, PipelineError> {
    let img = source::open_image(source_path).map_err(|e| {
        PipelineError::Decode(format!("{}: {e:#}", source_path.display()))
    })?;
    let meta = metadata::read(source_path).unwrap_or_default();
    let img = metadata::apply_orientation(img, meta.orientation.unwrap_or(1));

    let resized = resize_to(&img, resolution)?;
    let (width, height) = resolution.dimensions();

    let dest = work
        .scratch_path("resized", "png")
        .map_err(|e| PipelineError::Resize(format!("scratch dir unavailable: {e}")))?;
    let scratch = ScratchArtifact::new(Artifact::new(dest, width, height));
    resized
        .save_with_format(&scratch.artifact().path, image::ImageFormat::Png)
        .map_err(|e| PipelineError::Resize(format!("writing resized frame failed: {e}")))?;

    tracing::debug!(
        source = %source_path.display(),
        make = ?meta.camera_make,
        model = ?meta.camera_model,
        taken = ?meta.date_taken,
        from = ?(img.width(), img.height()),
        to = ?(width, height),
        "normalized frame"
    );
    Ok(scratch)
}

/// Stretches `img` to the exact resolution, ignoring the source aspect ratio.
pub fn resize_to(img: &DynamicImage, resolution: Resolution) -> Result<DynamicImage, PipelineError> {
    let (width, height) = resolution.dimensions();
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::Resize(format!(
            "source has no pixels ({}x{})",
            img.width(),
            img.height()
        )));
    }

    let out = DynamicImage::ImageRgb8(
        img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8(),
    );
    if out.width() != width || out.height() != height {
        return Err(PipelineError::Resize(format!(
            "resize produced {}x{}, expected {}x{}",
            out.width(),
            out.height(),
            width,
            height
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, ImageBuffer, Rgb};

    use super::{normalize, resize_to};
    use crate::artifact::WorkDir;
    use crate::artifact::testing::{temp_dir, write_jpeg};
    use crate::error::PipelineError;
    use crate::settings::Resolution;

    #[test]
    fn output_matches_every_supported_resolution() {
        let dir = temp_dir("normalize-dims");
        let src = write_jpeg(&dir, "src.jpg", 100, 90);
        let work = WorkDir::new(dir.join("work"));
        for r in Resolution::ALL {
            let out = normalize(&src, r, &work).unwrap();
            let (w, h) = r.dimensions();
            assert_eq!(out.artifact().dimensions(), (w, h));
            assert_eq!(image::image_dimensions(&out.artifact().path).unwrap(), (w, h));
        }
    }

    #[test]
    fn undecodable_source_is_a_decode_error() {
        let dir = temp_dir("normalize-garbage");
        let src = dir.join("broken.jpg");
        std::fs::write(&src, b"definitely not a jpeg").unwrap();
        let err = normalize(&src, Resolution::R320x240, &WorkDir::new(dir.join("work")))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn empty_image_is_a_resize_error() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, _>::new(0, 0));
        let err = resize_to(&img, Resolution::R640x480).unwrap_err();
        assert!(matches!(err, PipelineError::Resize(_)));
    }

    #[test]
    fn upscales_small_sources() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(10, 10, Rgb([9, 9, 9])));
        let out = resize_to(&img, Resolution::R640x480).unwrap();
        assert_eq!((out.width(), out.height()), (640, 480));
    }
}
