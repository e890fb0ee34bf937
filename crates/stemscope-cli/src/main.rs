//! Stemscope - stacked waveform visuals for multi-track song audio
//!
//! Headless front-end: renders each input file into a stacked per-instrument
//! waveform composite and writes it next to the source (or into --out).
//!
//! ## Command line flags
//!
//! - `--out <dir>`: write composites into a directory instead of next to sources
//! - `--png`: write PNG instead of JPEG
//! - `--hq`: scan every sample when computing peaks
//! - `--no-legend`, `--no-labels`, `--no-outline`: view toggles
//! - `--size <WxH>`: canvas size (default from config)
//! - `--upload`: upload the last composite and print the URL

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use stemscope_core::config::{default_config_path, load_config};
use stemscope_core::controller::Analyzer;
use stemscope_core::events::RenderEvent;
use stemscope_core::export;

const USAGE: &str = "usage: stemscope [--out DIR] [--png] [--hq] [--no-legend] \
                     [--no-labels] [--no-outline] [--size WxH] [--upload] FILE...";

struct Options {
    inputs: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    png: bool,
    upload: bool,
}

fn parse_args(config: &mut stemscope_core::config::ViewConfig) -> Result<Options> {
    let mut args = std::env::args().skip(1);
    let mut options = Options {
        inputs: Vec::new(),
        out_dir: None,
        png: false,
        upload: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => {
                let dir = args.next().context("--out needs a directory")?;
                options.out_dir = Some(PathBuf::from(dir));
            }
            "--png" => options.png = true,
            "--hq" => config.high_quality = true,
            "--no-legend" => config.show_legend = false,
            "--no-labels" => config.track_labels = false,
            "--no-outline" => config.outline = false,
            "--size" => {
                let size = args.next().context("--size needs WxH")?;
                let (w, h) = size
                    .split_once('x')
                    .context("--size expects WxH, e.g. 1280x720")?;
                config.canvas_width = w.parse().context("bad canvas width")?;
                config.canvas_height = h.parse().context("bad canvas height")?;
            }
            "--upload" => options.upload = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag '{}'\n{}", flag, USAGE),
            path => options.inputs.push(PathBuf::from(path)),
        }
    }

    if options.inputs.is_empty() {
        bail!("no input files\n{}", USAGE);
    }
    Ok(options)
}

fn output_path(input: &std::path::Path, options: &Options) -> PathBuf {
    let default = export::default_export_path(input);
    let mut path = match &options.out_dir {
        Some(dir) => dir.join(
            default
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("composite.jpg")),
        ),
        None => default,
    };
    if options.png {
        path.set_extension("png");
    }
    path
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut config = load_config(&default_config_path());
    let options = parse_args(&mut config)?;

    if let Some(dir) = &options.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {:?}", dir))?;
    }

    let mut analyzer = Analyzer::new(config);
    let events = analyzer.events();

    analyzer
        .load_inputs(options.inputs.clone())
        .context("failed to queue inputs")?;

    let mut failures = 0usize;
    loop {
        match events.recv().context("engine workers stopped")? {
            RenderEvent::FileStarted { path, index, total } => {
                log::info!("[{}/{}] rendering {:?}", index + 1, total, path);
            }
            RenderEvent::FileCompleted { path, composite } => {
                let out = output_path(&path, &options);
                let saved = if options.png {
                    export::save_png(&composite, &out)
                } else {
                    export::save_jpeg(&composite, &out)
                };
                match saved {
                    Ok(()) => println!(
                        "{} -> {} ({} tracks, {}x{})",
                        path.display(),
                        out.display(),
                        composite.bands.len(),
                        composite.width(),
                        composite.height()
                    ),
                    Err(e) => {
                        failures += 1;
                        eprintln!("failed to save {}: {}", out.display(), e);
                    }
                }
            }
            RenderEvent::FileFailed { path, error } => {
                failures += 1;
                eprintln!("{}: {}", path.display(), error);
            }
            RenderEvent::BatchCompleted { rendered, failed } => {
                log::info!("batch done: {} rendered, {} failed", rendered, failed);
                break;
            }
            RenderEvent::UploadCompleted { .. } | RenderEvent::UploadFailed { .. } => {}
        }
    }

    if options.upload {
        analyzer.upload_composite().context("upload rejected")?;
        loop {
            match events.recv().context("engine workers stopped")? {
                RenderEvent::UploadCompleted { url } => {
                    println!("uploaded: {}", url);
                    break;
                }
                RenderEvent::UploadFailed { error } => {
                    failures += 1;
                    eprintln!("upload failed: {}", error);
                    break;
                }
                _ => {}
            }
        }
    }

    if failures > 0 {
        bail!("{} operation(s) failed", failures);
    }
    Ok(())
}
