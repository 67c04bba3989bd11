use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::io::Read;
use std::path::{Path, PathBuf};

use thumbnailer::{catalog, event, upload, LocalStore, Notification, Pipeline, ThumbnailerConfig};

#[derive(Parser)]
#[command(name = "thumbnailer")]
#[command(about = "Derive square JPEG thumbnails from uploaded images", long_about = None)]
#[command(version)]
struct Args {
    /// Directory backing the object store
    #[arg(long, value_name = "DIR", default_value = "./store", global = true)]
    store_dir: PathBuf,

    /// JSON config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_name = "BUCKET", global = true)]
    inbound_bucket: Option<String>,

    #[arg(long, value_name = "BUCKET", global = true)]
    outbound_bucket: Option<String>,

    /// Thumbnail edge length in pixels
    #[arg(long, value_name = "PIXELS", global = true)]
    size: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(long, value_name = "QUALITY", global = true)]
    quality: Option<u8>,

    /// Verbose output
    #[arg(short, long, default_value_t, global = true)]
    verbose: bool,

    /// Quiet mode (no log output)
    #[arg(short, long, default_value_t, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline on a notification payload
    Process {
        /// Event JSON file, or `-` for stdin
        #[arg(value_name = "EVENT")]
        event: PathBuf,
    },
    /// Put a local image into the inbound bucket
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Derive the thumbnail right away
        #[arg(long, default_value_t)]
        process: bool,
    },
    /// List derived thumbnails
    List,
    /// Thumbnail a local file without touching the store
    Thumbnail {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose, args.quiet)?;

    let config = build_config(&args)?;

    match &args.command {
        Command::Process { event } => {
            let payload = read_event(event)?;
            let pipeline = Pipeline::new(open_store(&args.store_dir)?, config);
            let summary = pipeline
                .handle_event(&payload)
                .context("Invalid notification payload")?;
            print_json(&summary.to_json())?;
        }
        Command::Upload { file, process } => {
            let store = open_store(&args.store_dir)?;
            let data = std::fs::read(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            let receipt = upload::upload(
                &store,
                &config,
                &filename,
                data,
                upload::content_type_for(&filename),
            )?;

            if *process {
                let payload = event::to_payload(&[Notification::new(
                    receipt.bucket.as_str(),
                    receipt.key.as_str(),
                )]);
                let pipeline = Pipeline::new(store, config);
                let summary = pipeline.handle_event(&payload.to_string())?;
                print_json(&serde_json::json!({
                    "upload": receipt,
                    "summary": summary.to_json(),
                }))?;
            } else {
                print_json(&serde_json::to_value(&receipt)?)?;
            }
        }
        Command::List => {
            let store = open_store(&args.store_dir)?;
            let thumbnails = catalog::list_thumbnails(&store, &config)
                .context("Failed to list thumbnails")?;
            print_json(&serde_json::to_value(thumbnails)?)?;
        }
        Command::Thumbnail { input, output } => {
            let data = std::fs::read(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let filename = input.to_string_lossy();

            let thumbnail =
                thumbnailer::derive_thumbnail(&data, upload::content_type_for(&filename), &config)
                    .with_context(|| format!("Failed to thumbnail {}", input.display()))?;

            std::fs::write(output, &thumbnail.data)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            log::info!(
                "Done: {} ({}x{})",
                output.display(),
                thumbnail.dimensions.0,
                thumbnail.dimensions.1
            );
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let Some(level) = default_level(verbose, quiet) else {
        return Ok(());
    };

    // library code logs through `log`; route it into tracing
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

/// `None` means no subscriber at all
fn default_level(verbose: bool, quiet: bool) -> Option<&'static str> {
    match (quiet, verbose) {
        (true, _) => None,
        (false, true) => Some("debug"),
        (false, false) => Some("info"),
    }
}

/// File, then environment, then flags
fn build_config(args: &Args) -> Result<ThumbnailerConfig> {
    let config = match &args.config {
        Some(path) => ThumbnailerConfig::load(path)?,
        None => ThumbnailerConfig::default(),
    };
    let mut config = config.with_env_overrides();

    if let Some(bucket) = &args.inbound_bucket {
        config.inbound_bucket = bucket.clone();
    }
    if let Some(bucket) = &args.outbound_bucket {
        config.outbound_bucket = bucket.clone();
    }
    if let Some(size) = args.size {
        config.thumbnail_size = size;
    }
    if let Some(quality) = args.quality {
        config.encode_quality = quality;
    }

    config.validate()?;
    log::debug!("Using config: {config:?}");
    Ok(config)
}

fn open_store(dir: &Path) -> Result<LocalStore> {
    LocalStore::open(dir).with_context(|| format!("Failed to open store at {}", dir.display()))
}

fn read_event(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut payload = String::new();
        std::io::stdin()
            .read_to_string(&mut payload)
            .context("Failed to read event from stdin")?;
        return Ok(payload);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_installs_no_logger() {
        assert_eq!(default_level(false, true), None);
        assert_eq!(default_level(true, true), None);
        assert_eq!(default_level(true, false), Some("debug"));
        assert_eq!(default_level(false, false), Some("info"));
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "thumbnailer",
            "--size",
            "64",
            "--outbound-bucket",
            "thumbs",
            "list",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.thumbnail_size, 64);
        assert_eq!(config.outbound_bucket, "thumbs");
    }

    #[test]
    fn oversized_flag_is_rejected() {
        let args = Args::parse_from(["thumbnailer", "--size", "70000", "list"]);
        assert!(build_config(&args).is_err());
    }
}
