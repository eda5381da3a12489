use assetgen::batch::{BatchDriver, BatchEvent, BatchReport};
use assetgen::catalog::Catalog;
use assetgen::config::{self, ToolConfig};
use assetgen::imaging::{RustCodec, is_supported_image};
use assetgen::naming::{Namer, RetinaScale};
use assetgen::watch::{RegenerateMode, WatchCoordinator, WatchRegenerator, WatchSession};
use assetgen::{appiconset, output};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

/// Shared flags for commands that produce a catalog.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the generation cache and re-encode every output
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "assetgen")]
#[command(about = "Generate iOS icons, launch images and retina siblings")]
#[command(long_about = "\
Generate iOS icons, launch images and retina siblings

Catalogs write a fixed set of sizes into an output directory:

  assetgen icons icon.png              # AppIcon.appiconset + Contents.json
  assetgen launch bg.png --foreground logo.png

Retina and preview derivatives are written next to their source:

  button@2x.png  →  button.png, button@3x.png
  photo.jpg      →  photo-m.jpg

'assetgen watch' keeps those siblings in sync while sources change.

Run 'assetgen gen-config' to print a documented assetgen.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (defaults to ./assetgen.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the app icon set from a square source
    Icons {
        source: PathBuf,
        /// Output directory (overrides output.icon_dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Generate launch images from a background and optional emblem
    Launch {
        background: PathBuf,
        /// Emblem centered on each launch image
        #[arg(long)]
        foreground: Option<PathBuf>,
        /// Output directory (overrides output.launch_dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Derive the missing retina scales of each file
    Retina {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Scale unsuffixed sources are authored at (overrides retina.template)
        #[arg(long)]
        template: Option<RetinaScale>,
    },
    /// Write a downscaled preview next to each image
    Preview {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Crop to the exact preview size instead of fitting inside it
        #[arg(long)]
        cut: bool,
    },
    /// Regenerate retina or preview siblings as sources change
    Watch {
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// Generate previews instead of retina scales
        #[arg(long, conflicts_with = "template")]
        preview: bool,
        /// Template scale for retina mode (overrides retina.template)
        #[arg(long)]
        template: Option<RetinaScale>,
    },
    /// Print a stock assetgen.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let config = config::load_config(cli.config.as_deref(), &cwd)?;
    init_thread_pool(&config.processing);

    match cli.command {
        Command::Icons {
            source,
            out_dir,
            cache,
        } => {
            let catalog = config.icon_catalog()?;
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.output.icon_dir));
            let report = with_printer(|tx| {
                driver(&config, !cache.no_cache, Some(tx)).generate(&source, &catalog, &out_dir)
            })?;
            let contents = appiconset::write_contents_json(&out_dir)?;
            println!("Wrote {}", contents.display());
            finish(&report, true)?;
        }
        Command::Launch {
            background,
            foreground,
            out_dir,
            cache,
        } => {
            let catalog = match foreground {
                Some(_) => Catalog::launch_images(),
                None => Catalog::launch_images_plain(),
            };
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.output.launch_dir));
            let report = with_printer(|tx| {
                driver(&config, !cache.no_cache, Some(tx)).generate_with_emblem(
                    &background,
                    foreground.as_deref(),
                    &catalog,
                    &out_dir,
                )
            })?;
            finish(&report, true)?;
        }
        Command::Retina { files, template } => {
            let template = template.unwrap_or(config.retina.template);
            let report = with_printer(|tx| {
                driver(&config, false, Some(tx)).derive_retina_all(&files, template)
            })?;
            finish(&report, false)?;
        }
        Command::Preview { paths, cut } => {
            let mut settings = config.preview.clone();
            settings.crop |= cut;
            let namer = Namer::preview(settings.suffix.clone());
            let sources = collect_sources(&paths, &namer);
            let report = with_printer(|tx| {
                driver(&config, false, Some(tx)).generate_previews(&sources, &settings)
            })?;
            finish(&report, false)?;
        }
        Command::Watch {
            roots,
            preview,
            template,
        } => {
            let mode = if preview {
                RegenerateMode::Preview(config.preview.clone())
            } else {
                RegenerateMode::Retina {
                    template: template.unwrap_or(config.retina.template),
                }
            };
            watch(&config, &roots, mode)?;
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "assetgen=debug" } else { "assetgen=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores; config can lower it, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn driver(
    config: &ToolConfig,
    use_cache: bool,
    events: Option<Sender<BatchEvent>>,
) -> BatchDriver<RustCodec> {
    let driver = BatchDriver::new(RustCodec::new())
        .with_quality(config.quality())
        .with_cache(use_cache);
    match events {
        Some(tx) => driver.with_events(tx),
        None => driver,
    }
}

/// Run `work` while a printer thread drains its batch events.
///
/// The sender handed to `work` must be dropped by the time it returns,
/// otherwise the printer never finishes.
fn with_printer<T>(
    work: impl FnOnce(Sender<BatchEvent>) -> T,
) -> Result<T, Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_batch_event(&event);
        }
    });
    let result = work(tx);
    printer.join().map_err(|_| "output thread panicked")?;
    Ok(result)
}

/// Print the summary; any failed output makes the command fail.
fn finish(report: &BatchReport, show_cache: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    output::print_report_summary(report);
    if show_cache {
        println!("Cache: {}", report.cache_stats());
    }
    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} output(s) failed", report.failed.len()).into())
    }
}

/// Expand directories into the images they contain, skipping files that are
/// themselves previews.
fn collect_sources(paths: &[PathBuf], namer: &Namer) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            sources.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| is_preview_source(p, namer)),
            );
        } else if namer.is_own_derivative(path) {
            warn!(path = %path.display(), "skipping generated preview");
        } else {
            sources.push(path.clone());
        }
    }
    sources
}

fn is_preview_source(path: &Path, namer: &Namer) -> bool {
    is_supported_image(path) && !namer.is_own_derivative(path)
}

fn watch(
    config: &ToolConfig,
    roots: &[PathBuf],
    mode: RegenerateMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = WatchSession::new()?;
    for root in roots {
        if let Err(e) = session.subscribe(root) {
            warn!(error = %e, "not watching");
        }
    }
    if session.active_roots().is_empty() {
        return Err("no directory could be watched".into());
    }

    let regenerator = WatchRegenerator::new(driver(config, false, None), mode);
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for outcome in rx {
            output::print_watch_outcome(&outcome);
        }
    });
    let shutdown = session.shutdown_handle();
    ctrlc::set_handler(move || shutdown.shutdown())
        .map_err(|e| format!("cannot install Ctrl-C handler: {e}"))?;

    let stats = {
        let coordinator =
            WatchCoordinator::new(regenerator.namer(), regenerator).with_outcomes(tx);
        coordinator.initial_sync(&mut session);
        coordinator.run(&mut session)
    };
    session.close();
    printer.join().map_err(|_| "output thread panicked")?;
    output::print_watch_stats(&stats);
    Ok(())
}
