use std::path::PathBuf;

use anyhow::Context;

use crate::source;

/// A frame handed over by the capture surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Anything that can produce a captured frame on request.
pub trait CaptureSource {
    fn capture(&mut self) -> anyhow::Result<RawCapture>;
}

/// Treats an existing image file as the captured frame.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureSource for FileCapture {
    fn capture(&mut self) -> anyhow::Result<RawCapture> {
        let (width, height) = match image::image_dimensions(&self.path) {
            Ok(dims) => dims,
            Err(_) if source::is_raw_image(&self.path) => {
                let img = source::open_image(&self.path)
                    .with_context(|| format!("cannot read frame {}", self.path.display()))?;
                (img.width(), img.height())
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("cannot read frame {}", self.path.display()));
            }
        };
        tracing::debug!(path = %self.path.display(), width, height, "captured frame");
        Ok(RawCapture {
            path: self.path.clone(),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CaptureSource, FileCapture};
    use crate::artifact::testing::{temp_dir, write_jpeg};

    #[test]
    fn file_capture_reports_original_dimensions() {
        let dir = temp_dir("file-capture");
        let path = write_jpeg(&dir, "frame.jpg", 1280, 960);
        let raw = FileCapture::new(&path).capture().unwrap();
        assert_eq!((raw.width, raw.height), (1280, 960));
        assert_eq!(raw.path, path);
    }

    #[test]
    fn missing_file_fails_capture() {
        let dir = temp_dir("file-capture-missing");
        assert!(FileCapture::new(dir.join("none.jpg")).capture().is_err());
    }
}
