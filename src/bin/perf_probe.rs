use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;

#[path = "../artifact.rs"]
mod artifact;
#[path = "../error.rs"]
mod error;
#[path = "../metadata.rs"]
mod metadata;
#[path = "../processing/mod.rs"]
mod processing;
#[path = "../settings.rs"]
mod settings;
#[path = "../source.rs"]
mod source;

use artifact::WorkDir;
use processing::pipeline::PhotoPipeline;
use processing::retro::{self, RetroParams, Seed};
use settings::{CameraSettings, Resolution};

fn list_images(dir: &Path, limit: usize) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read_dir failed for {}", dir.display()))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && source::is_supported_image(p))
        .collect();
    files.sort();
    if files.len() > limit {
        files.truncate(limit);
    }
    Ok(files)
}

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args();
    let _bin = args.next();
    let dir = args
        .next()
        .map(PathBuf::from)
        .context("usage: perf_probe <image-dir> [count]")?;
    let count = args
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20);

    let files = list_images(&dir, count)?;
    if files.is_empty() {
        anyhow::bail!("No images found in {}", dir.display());
    }
    eprintln!("Using {} images from {}", files.len(), dir.display());

    let settings = CameraSettings::default();
    let params = RetroParams::from_settings(&settings, Seed::Random.resolve());

    // Effect only, on frames already at the target size.
    let mut effect_samples = Vec::with_capacity(files.len());
    for path in &files {
        let img = source::open_image(path)
            .with_context(|| format!("open failed for {}", path.display()))?;
        let frame = processing::geometry::resize_to(&img, Resolution::R640x480)?.to_rgb8();
        let t0 = Instant::now();
        let _out = retro::apply(&frame, &params);
        effect_samples.push(t0.elapsed().as_secs_f64() * 1000.0);
    }

    let run_dir = std::env::temp_dir().join(format!(
        "retrocam-perf-probe-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    ));
    let out_dir = run_dir.join("out");
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create_dir_all {}", out_dir.display()))?;
    let pipeline = PhotoPipeline::new(WorkDir::new(run_dir.join("work")), &out_dir);

    let export_start = Instant::now();
    files.par_iter().try_for_each(|path| -> Result<()> {
        pipeline
            .process_photo(path, &settings, Seed::Random)
            .with_context(|| format!("pipeline failed for {}", path.display()))?;
        Ok(())
    })?;
    let export_wall_s = export_start.elapsed().as_secs_f64();
    let images_per_sec = files.len() as f64 / export_wall_s.max(1e-9);

    println!("METRIC file_count={}", files.len());
    println!("METRIC effect_ms_median={:.2}", median_ms(&effect_samples));
    println!("METRIC pipeline_wall_s={:.2}", export_wall_s);
    println!("METRIC pipeline_images_per_sec={:.3}", images_per_sec);
    println!("METRIC pipeline_out_dir={}", out_dir.display());

    Ok(())
}
