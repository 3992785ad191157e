use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Encoded image bytes on disk at known dimensions.
pub struct Artifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Artifact {
    pub fn new(path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            path,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// An intermediate artifact whose file is removed when dropped.
#[derive(Debug)]
pub struct ScratchArtifact {
    artifact: Artifact,
}

impl ScratchArtifact {
    pub fn new(artifact: Artifact) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.artifact.path) {
            Ok(()) => tracing::trace!(path = %self.artifact.path.display(), "removed scratch artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.artifact.path.display(),
                error = %e,
                "failed to remove scratch artifact"
            ),
        }
    }
}

/// Directory holding intermediate artifacts of pipeline runs.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default scratch location under the system temp dir.
    pub fn system_default() -> Self {
        Self::new(std::env::temp_dir().join("retrocam"))
    }

    /// Returns a fresh, unused path in the work dir, creating the dir if needed.
    pub fn scratch_path(&self, prefix: &str, ext: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        Ok(self.root.join(unique_name(prefix, ext)))
    }
}

/// `<prefix>_<millis>_<counter>.<ext>`, unique within the process.
pub fn unique_name(prefix: &str, ext: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{millis}_{n}.{ext}")
}

#[cfg(test)]
pub mod testing {
    use std::path::{Path, PathBuf};

    use image::{ImageBuffer, Rgb, RgbImage};

    /// Creates an empty per-test directory under the system temp dir.
    pub fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "retrocam-test-{}-{}",
            name,
            super::unique_name("t", "d")
        ));
        std::fs::create_dir_all(&dir).expect("create test dir");
        dir
    }

    /// Horizontal gradient so resizes and effects have something to chew on.
    pub fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            Rgb([r, g, 128])
        })
    }

    pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        gradient(width, height).save(&path).expect("write fixture");
        path
    }

    pub fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|rd| rd.flatten().count()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::temp_dir;
    use super::*;

    #[test]
    fn scratch_artifact_removes_file_on_drop() {
        let dir = temp_dir("scratch-drop");
        let path = dir.join("a.png");
        std::fs::write(&path, b"x").unwrap();
        {
            let _scratch = ScratchArtifact::new(Artifact::new(path.clone(), 1, 1));
        }
        assert!(!path.exists());
    }

    #[test]
    fn unique_names_do_not_collide() {
        let a = unique_name("retro", "jpg");
        let b = unique_name("retro", "jpg");
        assert_ne!(a, b);
        assert!(a.starts_with("retro_") && a.ends_with(".jpg"));
    }

    #[test]
    fn scratch_path_creates_work_dir() {
        let root = temp_dir("workdir").join("nested");
        let work = WorkDir::new(&root);
        let p = work.scratch_path("resized", "png").unwrap();
        assert!(root.is_dir());
        assert_eq!(p.parent(), Some(root.as_path()));
    }
}
