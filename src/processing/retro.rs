use image::{ImageBuffer, Rgb, RgbImage};
use rayon::prelude::*;

use crate::artifact::{Artifact, ScratchArtifact, WorkDir};
use crate::error::PipelineError;
use crate::settings::CameraSettings;

/// Seed for the per-image noise hash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Seed {
    /// Drawn once per invocation.
    Random,
    Fixed(f32),
}

impl Seed {
    pub fn resolve(self) -> f32 {
        match self {
            Seed::Random => rand::random::<f32>() * 1000.0,
            Seed::Fixed(seed) => seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Effect strengths derived from a settings snapshot.
pub struct RetroParams {
    pub noise_strength: f32,
    pub vignette_strength: f32,
    pub color_shift: f32,
    pub seed: f32,
}

impl RetroParams {
    pub fn from_settings(settings: &CameraSettings, seed: f32) -> Self {
        let intensity = settings.effect_intensity.clamp(0.0, 1.0);
        Self {
            noise_strength: if settings.noise_enabled {
                intensity * 0.1
            } else {
                0.0
            },
            vignette_strength: if settings.vignette_enabled {
                intensity * 0.5
            } else {
                0.0
            },
            color_shift: intensity * 0.4,
            seed,
        }
    }
}

/// Why the effect stage produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Disabled,
    Failed(String),
}

/// Result of the effect stage; `Skipped` means "use the resized frame".
#[derive(Debug)]
pub enum EffectOutcome {
    Applied(ScratchArtifact),
    Skipped(SkipReason),
}

/// Backend that renders the retro look into a new artifact.
pub trait EffectEngine: Send + Sync {
    fn render(
        &self,
        input: &Artifact,
        params: &RetroParams,
        work: &WorkDir,
    ) -> Result<ScratchArtifact, PipelineError>;
}

/// Runs the transform on the CPU, rows in parallel.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuEffectEngine;

impl EffectEngine for CpuEffectEngine {
    fn render(
        &self,
        input: &Artifact,
        params: &RetroParams,
        work: &WorkDir,
    ) -> Result<ScratchArtifact, PipelineError> {
        let src = image::open(&input.path)
            .map_err(|e| PipelineError::EffectEngine(format!("decode failed: {e}")))?
            .to_rgb8();
        if src.dimensions() != input.dimensions() {
            return Err(PipelineError::EffectEngine(format!(
                "input is {:?}, expected {:?}",
                src.dimensions(),
                input.dimensions()
            )));
        }

        let out = apply(&src, params);

        let dest = work
            .scratch_path("retro", "png")
            .map_err(|e| PipelineError::EffectEngine(format!("scratch dir unavailable: {e}")))?;
        let scratch = ScratchArtifact::new(Artifact::new(dest, out.width(), out.height()));
        out.save_with_format(&scratch.artifact().path, image::ImageFormat::Png)
            .map_err(|e| PipelineError::EffectEngine(format!("write failed: {e}")))?;
        Ok(scratch)
    }
}

/// Runs the effect stage if enabled, mapping any engine failure to a skip.
pub fn run(
    engine: &dyn EffectEngine,
    input: &Artifact,
    settings: &CameraSettings,
    seed: Seed,
    work: &WorkDir,
) -> EffectOutcome {
    if !settings.effects_enabled() {
        return EffectOutcome::Skipped(SkipReason::Disabled);
    }
    let params = RetroParams::from_settings(settings, seed.resolve());
    match engine.render(input, &params, work) {
        Ok(out) => EffectOutcome::Applied(out),
        Err(e) => {
            tracing::warn!(input = %input.path.display(), error = %e, "retro effect failed; keeping resized frame");
            EffectOutcome::Skipped(SkipReason::Failed(e.to_string()))
        }
    }
}

/// Applies the retro transform to every pixel of `src`.
pub fn apply(src: &RgbImage, params: &RetroParams) -> RgbImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }
    let row_len = width as usize * 3;
    let mut out = src.clone().into_raw();
    let res = (width as f32, height as f32);

    out.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let frag = (x as f32 + 0.5, y as f32 + 0.5);
                let uv = (frag.0 / res.0, frag.1 / res.1);
                let rgb = [
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ];
                let [r, g, b] = transform_pixel(rgb, frag, uv, params);
                px[0] = to_u8(r);
                px[1] = to_u8(g);
                px[2] = to_u8(b);
            }
        });

    ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, out)
        .unwrap_or_else(|| src.clone())
}

/// Retro look for one pixel. `frag` is the pixel centre, `uv` in [0,1]².
pub fn transform_pixel(
    rgb: [f32; 3],
    frag: (f32, f32),
    uv: (f32, f32),
    params: &RetroParams,
) -> [f32; 3] {
    let [mut r, mut g, mut b] = rgb;

    if params.noise_strength > 0.0 {
        let n = (hash(frag, params.seed) - 0.5) * params.noise_strength;
        r = (r + n).clamp(0.0, 1.0);
        g = (g + n).clamp(0.0, 1.0);
        b = (b + n).clamp(0.0, 1.0);
    }

    if params.vignette_strength > 0.0 {
        let (dx, dy) = (uv.0 - 0.5, uv.1 - 0.5);
        let dist = (dx * dx + dy * dy).sqrt() * 2.0;
        let vignette = smoothstep(0.4 + params.vignette_strength * 0.4, 1.2, dist);
        let k = 1.0 - vignette * params.vignette_strength;
        r *= k;
        g *= k;
        b *= k;
    }

    if params.color_shift > 0.0 {
        g = (g * (1.0 + params.color_shift * 0.18)).clamp(0.0, 1.0);
        b = (b * (1.0 - params.color_shift * 0.12)).clamp(0.0, 1.0);
    }

    tone_curve([r, g, b])
}

const SHADOW_LUMA: f32 = 0.25;
const HIGHLIGHT_LUMA: f32 = 0.85;

/// Crushes shadows and lifts highlights based on mean channel luminance.
///
/// The channel sum is compared against three times each threshold in f64,
/// where both sides are exact, so a mean sitting on a threshold is untouched.
pub fn tone_curve(rgb: [f32; 3]) -> [f32; 3] {
    let sum: f64 = rgb.iter().map(|&c| f64::from(c)).sum();
    if sum < 3.0 * f64::from(SHADOW_LUMA) {
        rgb.map(|c| c * 0.6)
    } else if sum > 3.0 * f64::from(HIGHLIGHT_LUMA) {
        rgb.map(|c| (c * 1.15).min(1.0))
    } else {
        rgb
    }
}

/// Fractional sine hash in [0,1); f64 keeps it stable for large arguments.
pub fn hash(co: (f32, f32), seed: f32) -> f32 {
    let seed = seed as f64;
    let dot = co.0 as f64 * (12.9898 + seed) + co.1 as f64 * (78.233 + seed);
    let v = dot.sin() * 43758.5453;
    let f = v - v.floor();
    (f as f32).min(0.999_999_94)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
