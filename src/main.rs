mod artifact;
mod capture;
mod config;
mod error;
mod gallery;
mod metadata;
mod processing;
mod session;
mod settings;
mod source;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use capture::FileCapture;
use config::AppConfig;
use gallery::Gallery;
use processing::pipeline::{EffectReport, PhotoPipeline};
use processing::retro::Seed;
use session::CaptureSession;
use settings::{CameraFacing, CameraSettings, FlashMode, Resolution, SettingsStore};

#[derive(Parser)]
#[command(name = "retrocam")]
#[command(about = "Y2K digital camera look for your photos")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the retro pipeline on an image and print the output path
    Process {
        input: PathBuf,
        /// Directory for the finished JPEG
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Fixed noise seed for reproducible output
        #[arg(long)]
        seed: Option<f32>,
        /// Also copy the result into the gallery
        #[arg(long)]
        save: bool,
    },
    /// Capture an image file through a capture session and save it
    Capture {
        input: PathBuf,
        #[arg(long)]
        seed: Option<f32>,
        /// Drop the processed photo instead of saving it
        #[arg(long)]
        discard: bool,
    },
    /// Show or change camera settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Inspect the photo gallery
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
    /// Show the app config, or update it with the given values
    Config {
        #[arg(long)]
        gallery_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Seconds to wait for a capture before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Reset,
    Set {
        #[arg(long, value_parser = parse_resolution)]
        resolution: Option<Resolution>,
        /// Base compression quality in (0, 1]
        #[arg(long)]
        quality: Option<f32>,
        /// Effect intensity in [0, 1]
        #[arg(long)]
        intensity: Option<f32>,
        #[arg(long)]
        vignette: Option<bool>,
        #[arg(long)]
        noise: Option<bool>,
        #[arg(long, value_parser = parse_camera)]
        camera: Option<CameraFacing>,
        #[arg(long, value_parser = parse_flash)]
        flash: Option<FlashMode>,
    },
}

#[derive(Subcommand)]
enum GalleryAction {
    List,
    Delete { name: String },
}

fn parse_resolution(value: &str) -> Result<Resolution, String> {
    Resolution::parse(value).ok_or_else(|| format!("unsupported resolution '{value}'"))
}

fn parse_camera(value: &str) -> Result<CameraFacing, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "back" | "rear" => Ok(CameraFacing::Back),
        "front" | "selfie" => Ok(CameraFacing::Front),
        _ => Err(format!("unknown camera '{value}'")),
    }
}

fn parse_flash(value: &str) -> Result<FlashMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(FlashMode::Auto),
        "on" => Ok(FlashMode::On),
        "off" => Ok(FlashMode::Off),
        _ => Err(format!("unknown flash mode '{value}'")),
    }
}

fn seed_from(arg: Option<f32>) -> Seed {
    arg.map(Seed::Fixed).unwrap_or(Seed::Random)
}

fn settings_store() -> Result<SettingsStore> {
    SettingsStore::open_default().context("no user data directory available for settings")
}

fn describe_effect(effect: &EffectReport) -> String {
    match effect {
        EffectReport::Applied => "retro effect applied".to_string(),
        EffectReport::Disabled => "retro effect disabled".to_string(),
        EffectReport::Failed(reason) => format!("retro effect skipped ({reason})"),
    }
}

fn print_settings(settings: &CameraSettings) {
    println!("resolution          {}", settings.resolution.label());
    println!("compression quality {:.2}", settings.compression_quality);
    println!("effect intensity    {:.2}", settings.effect_intensity);
    println!("vignette            {}", settings.vignette_enabled);
    println!("noise               {}", settings.noise_enabled);
    println!("default camera      {:?}", settings.default_camera);
    println!("flash               {:?}", settings.flash_mode);
}

fn run_process(
    config: &AppConfig,
    input: PathBuf,
    output_dir: Option<PathBuf>,
    seed: Option<f32>,
    save: bool,
) -> Result<()> {
    let settings = settings_store()?.load();
    let pipeline = PhotoPipeline::new(
        config.work_dir(),
        output_dir.unwrap_or_else(|| config.output_dir()),
    );
    let photo = pipeline
        .process_photo(&input, &settings, seed_from(seed))
        .with_context(|| format!("failed to process {}", input.display()))?;

    eprintln!(
        "retrocam: {}x{} at quality {:.2}, {}",
        photo.artifact.width,
        photo.artifact.height,
        photo.quality,
        describe_effect(&photo.effect)
    );
    if save {
        let saved = Gallery::new(config.gallery_dir()).save_photo_to_gallery(&photo.artifact)?;
        println!("{}", saved.display());
    } else {
        println!("{}", photo.artifact.path.display());
    }
    Ok(())
}

fn run_capture(config: &AppConfig, input: PathBuf, seed: Option<f32>, discard: bool) -> Result<()> {
    let settings = settings_store()?.load();
    let pipeline = PhotoPipeline::new(config.work_dir(), config.output_dir());
    let mut session = CaptureSession::new(pipeline);
    let mut camera = FileCapture::new(input);

    session.begin_capture(&mut camera, settings, seed_from(seed))?;
    let photo = session.wait(config.capture_timeout())?;
    eprintln!(
        "retrocam: captured {}x{}, {}",
        photo.artifact.width,
        photo.artifact.height,
        describe_effect(&photo.effect)
    );

    if discard {
        session.discard()?;
        eprintln!("retrocam: photo discarded");
        return Ok(());
    }
    let saved = session.save(&Gallery::new(config.gallery_dir()))?;
    println!("{}", saved.display());
    Ok(())
}

fn run_settings(action: SettingsAction) -> Result<()> {
    let store = settings_store()?;
    match action {
        SettingsAction::Show => print_settings(&store.load()),
        SettingsAction::Reset => {
            store.save(&CameraSettings::default())?;
            print_settings(&CameraSettings::default());
        }
        SettingsAction::Set {
            resolution,
            quality,
            intensity,
            vignette,
            noise,
            camera,
            flash,
        } => {
            let mut settings = store.load();
            if let Some(v) = resolution {
                settings.resolution = v;
            }
            if let Some(v) = quality {
                settings.compression_quality = v;
            }
            if let Some(v) = intensity {
                settings.effect_intensity = v;
            }
            if let Some(v) = vignette {
                settings.vignette_enabled = v;
            }
            if let Some(v) = noise {
                settings.noise_enabled = v;
            }
            if let Some(v) = camera {
                settings.default_camera = v;
            }
            if let Some(v) = flash {
                settings.flash_mode = v;
            }
            let settings = settings.sanitized();
            store
                .save(&settings)
                .with_context(|| format!("failed to write {}", store.path().display()))?;
            print_settings(&settings);
        }
    }
    Ok(())
}

fn run_gallery(config: &AppConfig, action: GalleryAction) -> Result<()> {
    let gallery = Gallery::new(config.gallery_dir());
    match action {
        GalleryAction::List => {
            let entries = gallery.list()?;
            if entries.is_empty() {
                eprintln!("retrocam: no photos in {}", gallery.dir().display());
            }
            for entry in entries {
                println!("{}", entry.name);
            }
        }
        GalleryAction::Delete { name } => gallery.delete(&name)?,
    }
    Ok(())
}

fn run_config(
    mut config: AppConfig,
    gallery_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    timeout: Option<u64>,
) -> Result<()> {
    let changed = gallery_dir.is_some() || output_dir.is_some() || timeout.is_some();
    if let Some(dir) = gallery_dir {
        config.gallery_dir = Some(dir);
    }
    if let Some(dir) = output_dir {
        config.output_dir = Some(dir);
    }
    if let Some(secs) = timeout {
        config.capture_timeout_secs = Some(secs);
    }
    if changed {
        config.save();
    }

    if let Some(path) = AppConfig::config_path() {
        println!("config file     {}", path.display());
    }
    println!("gallery         {}", config.gallery_dir().display());
    println!("output          {}", config.output_dir().display());
    println!("capture timeout {}s", config.capture_timeout().as_secs());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load();

    match cli.command {
        Command::Process {
            input,
            output_dir,
            seed,
            save,
        } => run_process(&config, input, output_dir, seed, save),
        Command::Capture {
            input,
            seed,
            discard,
        } => run_capture(&config, input, seed, discard),
        Command::Settings { action } => run_settings(action),
        Command::Gallery { action } => run_gallery(&config, action),
        Command::Config {
            gallery_dir,
            output_dir,
            timeout,
        } => run_config(config, gallery_dir, output_dir, timeout),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, parse_camera, parse_flash, parse_resolution};
    use crate::settings::{CameraFacing, FlashMode, Resolution};

    #[test]
    fn parsers_accept_supported_values() {
        assert_eq!(parse_resolution("320x240"), Ok(Resolution::R320x240));
        assert_eq!(parse_camera("Front"), Ok(CameraFacing::Front));
        assert_eq!(parse_flash("off"), Ok(FlashMode::Off));
    }

    #[test]
    fn parsers_reject_unknown_values() {
        assert!(parse_resolution("800x600").is_err());
        assert!(parse_camera("side").is_err());
        assert!(parse_flash("strobe").is_err());
    }

    #[test]
    fn process_command_parses_seed_and_save() {
        let cli = Cli::try_parse_from(["retrocam", "process", "in.jpg", "--seed", "4.5", "--save"])
            .unwrap();
        match cli.command {
            Command::Process { input, seed, save, output_dir } => {
                assert_eq!(input.to_str(), Some("in.jpg"));
                assert_eq!(seed, Some(4.5));
                assert!(save);
                assert!(output_dir.is_none());
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn config_command_parses_timeout() {
        let cli = Cli::try_parse_from(["retrocam", "config", "--timeout", "12"]).unwrap();
        match cli.command {
            Command::Config { timeout, gallery_dir, .. } => {
                assert_eq!(timeout, Some(12));
                assert!(gallery_dir.is_none());
            }
            _ => panic!("expected config command"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
