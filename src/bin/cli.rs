use anyhow::{anyhow, bail, Context, Result};
use pitchcam::exposure::{MeteringZone, ShootingPreset};
use pitchcam::format::{select_format, FormatCatalog, SelectionCriteria};
use pitchcam::platform::SimulatedBackend;
use pitchcam::recording::read_sidecar;
use pitchcam::timing::format_duration;
use pitchcam::{
    AspectRatioTarget, CameraService, FovMode, LensIdentity, PitchCamConfig, PublishedState,
    SessionBackend,
};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: pitchcam-cli <command> [options]

Commands:
  list-formats  [--lens <lens>]
  select        [--lens <lens>] [--aspect <16:9|4:3>] [--fov <standard|max>] [--fps <n>]
  snapshot      [--lens <lens>] [--aspect <16:9|4:3>] [--fov <standard|max>]
  record        [--seconds <n>] [--preset <name>] [--zone <zone>] [--output <dir>] [--no-audio]
                [--lens <lens>] [--aspect <16:9|4:3>] [--fov <standard|max>]
  show-sidecar  <path>
  presets

Global options:
  --config <path>   TOML configuration (default: pitchcam.toml)
  --json            machine-readable output";

/// Parsed `--flag value` options shared by every command.
#[derive(Default)]
struct Options {
    positional: Vec<String>,
    config: Option<PathBuf>,
    lens: Option<LensIdentity>,
    aspect: Option<AspectRatioTarget>,
    fov: Option<FovMode>,
    fps: Option<f64>,
    seconds: Option<u64>,
    preset: Option<ShootingPreset>,
    zone: Option<MeteringZone>,
    output: Option<PathBuf>,
    no_audio: bool,
    json: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options::default();
        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "--config" => options.config = Some(PathBuf::from(take_value(args, &mut i)?)),
                "--lens" => {
                    let v = take_value(args, &mut i)?;
                    options.lens = Some(
                        LensIdentity::parse(v).ok_or_else(|| anyhow!("unknown lens '{}'", v))?,
                    );
                }
                "--aspect" => {
                    let v = take_value(args, &mut i)?;
                    options.aspect = Some(
                        AspectRatioTarget::parse(v)
                            .ok_or_else(|| anyhow!("unknown aspect ratio '{}'", v))?,
                    );
                }
                "--fov" => {
                    let v = take_value(args, &mut i)?;
                    options.fov =
                        Some(FovMode::parse(v).ok_or_else(|| anyhow!("unknown FOV mode '{}'", v))?);
                }
                "--fps" => {
                    options.fps = Some(take_value(args, &mut i)?.parse().context("invalid --fps")?)
                }
                "--seconds" => {
                    options.seconds =
                        Some(take_value(args, &mut i)?.parse().context("invalid --seconds")?)
                }
                "--preset" => {
                    let v = take_value(args, &mut i)?;
                    options.preset = Some(
                        ShootingPreset::parse(v).ok_or_else(|| anyhow!("unknown preset '{}'", v))?,
                    );
                }
                "--zone" => {
                    let v = take_value(args, &mut i)?;
                    options.zone = Some(
                        MeteringZone::parse(v)
                            .ok_or_else(|| anyhow!("unknown metering zone '{}'", v))?,
                    );
                }
                "--output" => options.output = Some(PathBuf::from(take_value(args, &mut i)?)),
                "--no-audio" => options.no_audio = true,
                "--json" => options.json = true,
                other if other.starts_with("--") => bail!("unknown option '{}'", other),
                other => options.positional.push(other.to_string()),
            }
            i += 1;
        }
        Ok(options)
    }

    fn load_config(&self) -> Result<PitchCamConfig> {
        let config = match &self.config {
            Some(path) => PitchCamConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PitchCamConfig::load_or_default(),
        };
        Ok(config)
    }
}

/// Advance past a flag and return its value.
fn take_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn main() -> Result<()> {
    pitchcam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let options = Options::parse(&args[2..])?;
    match command {
        "list-formats" => cmd_list_formats(&options),
        "select" => cmd_select(&options),
        "snapshot" => cmd_snapshot(&options),
        "record" => cmd_record(&options),
        "show-sidecar" => cmd_show_sidecar(&options),
        "presets" => cmd_presets(&options),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn cmd_list_formats(options: &Options) -> Result<()> {
    let lens = options.lens.unwrap_or(LensIdentity::UltraWide);
    let backend = SimulatedBackend::iphone();
    let catalog = FormatCatalog::query(&backend, lens)?;

    if options.json {
        println!("{}", serde_json::to_string(&catalog.iter().collect::<Vec<_>>())?);
    } else {
        println!("{} ({} formats)", lens.label(), catalog.len());
        for format in &catalog {
            println!("  {}", format);
        }
    }
    Ok(())
}

fn cmd_select(options: &Options) -> Result<()> {
    let config = options.load_config()?;
    let lens = options.lens.unwrap_or(config.capture.default_lens);
    let criteria = SelectionCriteria::new(
        options.fps.unwrap_or(config.capture.target_frame_rate),
        options.aspect.unwrap_or(config.capture.default_aspect),
        options.fov.unwrap_or(config.capture.default_fov_mode),
    )
    .with_tolerance(config.capture.aspect_tolerance);

    let backend = SimulatedBackend::iphone();
    let catalog = FormatCatalog::query(&backend, lens)?;
    let selection = select_format(&catalog, &criteria).ok_or_else(|| {
        anyhow!(
            "no {} format reaches {}fps",
            lens.label(),
            criteria.min_frame_rate
        )
    })?;

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "lens": lens,
                "format": selection.format,
                "frameRate": selection.frame_rate,
                "fallbacks": selection.fallbacks,
            })
        );
    } else {
        println!("Selected {} at {}fps", selection.format, selection.frame_rate);
        if let Some(fallbacks) = selection.describe_fallbacks() {
            println!("Degraded: {}", fallbacks);
        }
    }
    Ok(())
}

/// Spawn the session worker and apply the requested lens/FOV/aspect.
fn configured_service(options: &Options, config: &PitchCamConfig) -> Result<CameraService> {
    let backend = SimulatedBackend::iphone();
    if !backend.has_device(config.capture.default_lens) {
        bail!("{} lens not available", config.capture.default_lens);
    }
    let service = CameraService::spawn(backend, config)?;
    service.setup();
    if let Some(lens) = options.lens {
        service.select_lens(lens);
    }
    if let Some(mode) = options.fov {
        service.set_fov_mode(mode);
    }
    if let Some(aspect) = options.aspect {
        service.set_aspect_ratio(aspect);
    }
    let state = service.sync(Duration::from_secs(5))?;
    if let Some(error) = state.current_error {
        bail!("session configuration failed: {}", error);
    }
    Ok(service)
}

fn print_state(state: &PublishedState, json: bool) -> Result<()> {
    let snapshot = state
        .snapshot
        .as_ref()
        .ok_or_else(|| anyhow!("session has no active configuration"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        println!("Session: {}", state.session_state);
        for line in snapshot.lines() {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn cmd_snapshot(options: &Options) -> Result<()> {
    let config = options.load_config()?;
    let service = configured_service(options, &config)?;
    let state = service.sync(Duration::from_secs(5))?;
    print_state(&state, options.json)?;
    service.shutdown()?;
    Ok(())
}

fn cmd_record(options: &Options) -> Result<()> {
    let mut config = options.load_config()?;
    if let Some(output) = &options.output {
        config.recording.output_directory = output.display().to_string();
    }
    if options.no_audio {
        config.recording.audio_enabled = false;
    }
    let seconds = options.seconds.unwrap_or(10);
    let mut preset = options.preset.unwrap_or(ShootingPreset::Daylight).settings();
    if let Some(zone) = options.zone {
        preset = preset.with_metering_zone(zone);
    }

    let service = configured_service(options, &config)?;
    if !options.json {
        print_state(&service.state(), false)?;
        println!();
        println!("Recording {} preset... (press Ctrl+C to stop early)", preset.label);
    }
    service.start_recording(preset);
    let state = service.sync(Duration::from_secs(5))?;
    if let Some(error) = state.current_error {
        bail!("recording did not start: {}", error);
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let target = Duration::from_secs(seconds);
    while start.elapsed() < target {
        if stop_flag.load(Ordering::SeqCst) {
            if !options.json {
                println!();
                println!("Stopping early...");
            }
            break;
        }
        if !options.json {
            print!("\rRecording: {}", format_duration(service.state().recording_duration));
            std::io::Write::flush(&mut std::io::stdout())?;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    if !options.json {
        println!();
    }

    service.stop_recording();
    let state = service.sync(Duration::from_secs(5))?;
    let state = if state.last_recording.is_none() && state.current_error.is_none() {
        // Completion can trail the stop request by a frame.
        std::thread::sleep(Duration::from_millis(100));
        service.sync(Duration::from_secs(5))?
    } else {
        state
    };
    service.shutdown()?;

    if let Some(error) = state.current_error {
        bail!("recording failed: {}", error);
    }
    let completed = state
        .last_recording
        .ok_or_else(|| anyhow!("recording did not report completion"))?;
    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "id": completed.id,
                "media": completed.media,
                "sidecar": completed.sidecar,
                "durationSeconds": completed.duration.as_secs_f64(),
                "metadata": completed.metadata,
            })
        );
    } else {
        println!("Video saved: {}", completed.media.display());
        match &completed.sidecar {
            Some(sidecar) => println!("Metadata: {}", sidecar.display()),
            None => println!("Metadata: not written"),
        }
    }
    Ok(())
}

fn cmd_show_sidecar(options: &Options) -> Result<()> {
    let path = options
        .positional
        .first()
        .map(Path::new)
        .ok_or_else(|| anyhow!("Usage: pitchcam-cli show-sidecar <path>"))?;
    let metadata = read_sidecar(path).with_context(|| format!("reading {}", path.display()))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        println!("Preset: {}", metadata.preset);
        println!("Exposure bias: {:+.1} EV", metadata.exposure_bias);
        println!("ISO: {}", metadata.iso);
        println!("White balance: {}K", metadata.white_balance);
        println!("Metering zone: {}", metadata.metering_zone);
        println!("Recorded at: {}", metadata.recorded_at.to_rfc3339());
        if let Some(lens) = metadata.lens {
            println!("Lens: {}", lens.label());
        }
        if let Some(max_fov) = metadata.max_fov {
            println!("Max FOV: {}", if max_fov { "on" } else { "off" });
        }
        if let Some(aspect) = &metadata.aspect_ratio {
            println!("Aspect ratio: {}", aspect);
        }
        match (metadata.audio_enabled, &metadata.audio_input_name) {
            (Some(true), Some(name)) => println!("Audio: {}", name),
            (Some(true), None) => println!("Audio: on"),
            (Some(false), _) => println!("Audio: off"),
            (None, _) => {}
        }
    }
    Ok(())
}

fn cmd_presets(options: &Options) -> Result<()> {
    let presets: Vec<_> = ShootingPreset::all().iter().map(|p| p.settings()).collect();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
    } else {
        for settings in presets {
            println!(
                "{:<11} bias {:+.1} EV, ISO {}, {}K, metering {}",
                settings.label,
                settings.exposure_bias,
                settings.iso,
                settings.white_balance,
                settings.metering_zone
            );
        }
    }
    Ok(())
}
