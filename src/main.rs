use clap::{Parser, Subcommand};
use imgset::picture::{PictureAttrs, render_picture};
use imgset::resolve::{Resolved, Resolver};
use imgset::{config, output, process, scan, verify};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgset")]
#[command(about = "Responsive image derivatives for static sites")]
#[command(long_about = "\
Responsive image derivatives for static sites

`optimize` writes every JPEG/PNG under the source root as a set of
width × format derivatives; `resolve` maps a path written in markup to the
matching <picture> candidates. Both follow one naming contract:

  public/images/a.png
  public/optimized/images/a-w320.avif     ← /optimized/images/a-w320.avif
  public/optimized/images/a-w320.webp     ← /optimized/images/a-w320.webp
  public/optimized/images/a-w320.png      ← /optimized/images/a-w320.png
  public/optimized/images/a-w640.avif
  ...

Widths wider than the source are never produced. Files under the size
threshold (100 KB by default) are left alone. A file that fails to decode
is reported and skipped; the rest of the batch continues.

Run 'imgset gen-config' to generate a documented imgset.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file [default: imgset.toml, used only if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Source asset root (overrides config)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Derivative output root (overrides config)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG wins if set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate derivatives for every source image
    Optimize {
        /// Write the run summary as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the candidate set for an image path
    Resolve {
        /// Image path as written in markup, e.g. /images/a.png
        src: String,
        /// Comma-separated widths [default: configured widths]
        #[arg(long, value_delimiter = ',')]
        widths: Vec<u32>,
        /// Print <picture> markup instead of JSON
        #[arg(long)]
        html: bool,
        /// Reject inputs that have no derivatives instead of passing them through
        #[arg(long)]
        strict: bool,
        /// `alt` text for --html
        #[arg(long, default_value = "")]
        alt: String,
        /// `sizes` attribute for --html
        #[arg(long)]
        sizes: Option<String>,
    },
    /// Check that every resolver URL has a derivative on disk
    Verify,
    /// List which sources would be processed or skipped, without encoding
    Check,
    /// Print a stock imgset.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let pipeline = load_pipeline_config(&cli)?;

    match cli.command {
        Command::Optimize { report } => {
            init_thread_pool(&pipeline.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = process::process(&pipeline, Some(tx))?;
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_run_summary(&summary);
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&summary)?;
                std::fs::write(&path, json)?;
            }
        }
        Command::Resolve {
            src,
            widths,
            html,
            strict,
            alt,
            sizes,
        } => {
            let resolver = Resolver::new(pipeline.resolver_config());
            let resolved = if strict {
                Resolved::Candidates(resolver.resolve_strict(&src, &widths)?)
            } else {
                resolver.resolve(&src, &widths)
            };
            if html {
                let attrs = PictureAttrs {
                    alt,
                    sizes,
                    ..PictureAttrs::default()
                };
                println!("{}", render_picture(&resolved, &attrs).into_string());
            } else {
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            }
        }
        Command::Verify => {
            let report = verify::verify(&pipeline)?;
            output::print_verify_report(&report);
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
        Command::Check => {
            let sources = scan::scan(&pipeline.source, &pipeline.output, &pipeline.include)?;
            output::print_check_output(&sources, pipeline.images.min_bytes);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Load the config file and apply CLI overrides.
///
/// An explicit `--config` must exist; the default `imgset.toml` is optional.
fn load_pipeline_config(cli: &Cli) -> Result<config::PipelineConfig, Box<dyn std::error::Error>> {
    let path = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path.clone(),
        None => PathBuf::from(config::CONFIG_FILENAME),
    };
    let mut pipeline = config::load_config(&path)?;
    if let Some(source) = &cli.source {
        pipeline.source = source.clone();
    }
    if let Some(output) = &cli.output {
        pipeline.output = output.clone();
    }
    Ok(pipeline)
}

/// Log to stderr so stdout stays clean for JSON and markup.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
