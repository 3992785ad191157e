use std::path::Path;

use image::DynamicImage;

static RAW_EXTS: &[&str] = &["raf", "dng", "nef", "cr2", "arw"];
static SUPPORTED_IMAGE_EXTS: &[&str] = &[
    "jpg", "jpeg", "png", "tiff", "tif", "webp", "bmp", "raf", "dng", "nef", "cr2", "arw",
];

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

pub fn is_raw_image(path: &Path) -> bool {
    has_extension(path, RAW_EXTS)
}

/// Returns `true` if the path has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, SUPPORTED_IMAGE_EXTS)
}

/// Open a captured frame, falling back to raw decoding for RAW extensions.
pub fn open_image(path: &Path) -> anyhow::Result<DynamicImage> {
    open_image_with_hooks(path, |p: &Path| Ok(image::open(p)?), develop_raw)
}

fn open_image_with_hooks<FStd, FRaw>(
    path: &Path,
    open_standard: FStd,
    open_raw: FRaw,
) -> anyhow::Result<DynamicImage>
where
    FStd: Fn(&Path) -> anyhow::Result<DynamicImage>,
    FRaw: Fn(&Path) -> anyhow::Result<DynamicImage>,
{
    match open_standard(path) {
        Ok(img) => Ok(img),
        Err(e) if !is_raw_image(path) => Err(e),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "standard decode failed; developing raw");
            open_raw(path)
        }
    }
}

fn develop_raw(path: &Path) -> anyhow::Result<DynamicImage> {
    let raw = rawler::decode_file(path)?;
    let develop = rawler::imgop::develop::RawDevelop::default();
    let intermediate = develop.develop_intermediate(&raw)?;
    intermediate
        .to_dynamic_image()
        .ok_or_else(|| anyhow::anyhow!("raw develop produced invalid image"))
}
