use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::artifact::Artifact;
use crate::error::{PipelineError, SAVE_FAILED_MESSAGE};
use crate::source::is_supported_image;

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub modified: Option<SystemTime>,
}

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Directory-backed photo gallery.
#[derive(Debug, Clone)]
pub struct Gallery {
    dir: PathBuf,
}

impl Gallery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies the finished photo into the gallery. The artifact itself is
    /// left untouched so a failed save can be retried. An existing photo with
    /// the same name is never overwritten; the copy gets a numeric suffix.
    pub fn save_photo_to_gallery(&self, artifact: &Artifact) -> Result<PathBuf, PipelineError> {
        let Some(name) = artifact.path.file_name() else {
            tracing::error!(path = %artifact.path.display(), "artifact has no file name");
            return Err(PipelineError::Save(SAVE_FAILED_MESSAGE.to_string()));
        };
        match self.copy_into(&artifact.path, Path::new(name)) {
            Ok(dest) => {
                tracing::info!(dest = %dest.display(), "saved photo to gallery");
                Ok(dest)
            }
            Err(e) => {
                tracing::error!(
                    source = %artifact.path.display(),
                    dir = %self.dir.display(),
                    error = %e,
                    "failed to save photo to gallery"
                );
                Err(PipelineError::Save(SAVE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    fn copy_into(&self, source: &Path, name: &Path) -> io::Result<PathBuf> {
        let mut input = File::open(source)?;
        fs::create_dir_all(&self.dir)?;
        let (dest, mut output) = self.create_unique(name)?;
        if let Err(e) = io::copy(&mut input, &mut output).and_then(|_| output.sync_all()) {
            drop(output);
            let _ = fs::remove_file(&dest);
            return Err(e);
        }
        Ok(dest)
    }

    /// Atomically claims `name`, or `<stem>_<n>.<ext>` when it is taken.
    fn create_unique(&self, name: &Path) -> io::Result<(PathBuf, File)> {
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = name.extension().map(|e| e.to_string_lossy().into_owned());
        for n in 0..MAX_NAME_ATTEMPTS {
            let candidate = match (n, &ext) {
                (0, _) => name.to_path_buf(),
                (n, Some(ext)) => PathBuf::from(format!("{stem}_{n}.{ext}")),
                (n, None) => PathBuf::from(format!("{stem}_{n}")),
            };
            let dest = self.dir.join(candidate);
            match OpenOptions::new().write(true).create_new(true).open(&dest) {
                Ok(file) => return Ok((dest, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for {}", name.display()),
        ))
    }

    /// Saved photos, newest first. Hidden files and non-images are skipped.
    pub fn list(&self) -> anyhow::Result<Vec<GalleryEntry>> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for entry in rd.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !path.is_file() || !is_supported_image(&path) {
                continue;
            }
            let modified = entry.metadata().and_then(|m| m.modified()).ok();
            entries.push(GalleryEntry {
                name,
                modified,
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(entries)
    }

    /// Deletes a saved photo by file name.
    pub fn delete(&self, name: &str) -> anyhow::Result<()> {
        let candidate = Path::new(name);
        let plain_name = candidate.file_name().map(|n| n == candidate.as_os_str());
        if plain_name != Some(true) {
            anyhow::bail!("'{name}' is not a gallery entry");
        }
        let path = self.dir.join(candidate);
        fs::remove_file(&path)
            .map_err(|e| anyhow::anyhow!("failed to delete {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "deleted photo");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::testing::{temp_dir, write_jpeg};

    #[test]
    fn save_copies_and_keeps_artifact() {
        let dir = temp_dir("gallery-save");
        let src = write_jpeg(&dir, "retro_1.jpg", 8, 8);
        let gallery = Gallery::new(dir.join("gallery"));

        let saved = gallery
            .save_photo_to_gallery(&Artifact::new(src.clone(), 8, 8))
            .unwrap();

        assert!(saved.exists());
        assert!(src.exists());
        assert_eq!(saved, dir.join("gallery").join("retro_1.jpg"));
    }

    #[test]
    fn save_never_overwrites_an_existing_photo() {
        let dir = temp_dir("gallery-collide");
        let gallery_dir = dir.join("gallery");
        std::fs::create_dir_all(&gallery_dir).unwrap();
        std::fs::write(gallery_dir.join("retro_1.jpg"), b"earlier photo").unwrap();
        let src = write_jpeg(&dir, "retro_1.jpg", 8, 8);
        let gallery = Gallery::new(&gallery_dir);

        let first = gallery
            .save_photo_to_gallery(&Artifact::new(src.clone(), 8, 8))
            .unwrap();
        let second = gallery
            .save_photo_to_gallery(&Artifact::new(src.clone(), 8, 8))
            .unwrap();

        assert_eq!(first, gallery_dir.join("retro_1_1.jpg"));
        assert_eq!(second, gallery_dir.join("retro_1_2.jpg"));
        assert_eq!(
            std::fs::read(gallery_dir.join("retro_1.jpg")).unwrap(),
            b"earlier photo"
        );
        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&src).unwrap());
    }

    #[test]
    fn missing_artifact_is_a_save_error() {
        let dir = temp_dir("gallery-missing");
        let gallery = Gallery::new(dir.join("gallery"));
        let err = gallery
            .save_photo_to_gallery(&Artifact::new(dir.join("nope.jpg"), 1, 1))
            .unwrap_err();
        assert_eq!(err, PipelineError::Save(SAVE_FAILED_MESSAGE.to_string()));
    }

    #[test]
    fn list_skips_hidden_and_non_images() {
        let dir = temp_dir("gallery-list");
        write_jpeg(&dir, "a.jpg", 4, 4);
        write_jpeg(&dir, ".hidden.jpg", 4, 4);
        std::fs::write(dir.join("notes.txt"), "x").unwrap();

        let names: Vec<String> = Gallery::new(&dir)
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.jpg".to_string()]);
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = temp_dir("gallery-none").join("absent");
        assert!(Gallery::new(dir).list().unwrap().is_empty());
    }

    #[test]
    fn delete_rejects_paths_outside_gallery() {
        let dir = temp_dir("gallery-delete");
        let gallery = Gallery::new(dir.join("gallery"));
        assert!(gallery.delete("../escape.jpg").is_err());
        assert!(gallery.delete("/etc/passwd").is_err());

        let src = write_jpeg(&dir, "retro_2.jpg", 4, 4);
        let saved = gallery
            .save_photo_to_gallery(&Artifact::new(src, 4, 4))
            .unwrap();
        gallery.delete("retro_2.jpg").unwrap();
        assert!(!saved.exists());
    }
}
