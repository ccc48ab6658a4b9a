//! Command-line interface for hyperspectral data preparation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{NormalizerKind, Region, SourceConfig};
use crate::core::header::EnviHeader;
use crate::core::writers::{save_endmembers_json, save_estimates, write_matrix_npy};
use crate::processors::{load_and_reshape, HyperspectralDataset};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "hsi-prep")]
#[command(about = "Hyperspectral cube preparation for unmixing experiments", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Source and region overrides shared by the data commands.
#[derive(clap::Args, Debug, Default)]
struct SourceArgs {
    /// Directory holding the flight line files
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Flight line identifier used to derive file names
    #[arg(long)]
    flight_line: Option<String>,
    /// Line range as start:end (half-open)
    #[arg(long, value_parser = parse_range)]
    rows: Option<(usize, usize)>,
    /// Sample range as start:end (half-open)
    #[arg(long, value_parser = parse_range)]
    cols: Option<(usize, usize)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset and optionally export placeholder estimates
    Prepare {
        #[command(flatten)]
        source: SourceArgs,
        /// Number of placeholder endmembers
        #[arg(short = 'p', long)]
        endmembers: Option<usize>,
        /// Seed for placeholder endmembers
        #[arg(long)]
        seed: Option<u64>,
        /// Rescale Y and endmembers to [0, 1]
        #[arg(long)]
        normalize: bool,
        /// Write labelled endmembers to this JSON file
        #[arg(long)]
        json: Option<PathBuf>,
        /// Write estimates.npz into the configured output directory
        #[arg(long)]
        bundle: bool,
    },

    /// Reshape and calibrate a region, writing Y to a .npy file
    Reshape {
        #[command(flatten)]
        source: SourceArgs,
        /// Output .npy file
        #[arg(short, long, default_value = "Y.npy")]
        output: PathBuf,
    },

    /// Print the parsed fields of an ENVI header
    Header {
        /// Header file
        path: PathBuf,
    },

    /// Write the default configuration to a YAML file
    InitConfig {
        /// Destination file
        #[arg(default_value = "hsi-prep.yaml")]
        path: PathBuf,
    },
}

/// Parse a half-open `start:end` range.
fn parse_range(s: &str) -> std::result::Result<(usize, usize), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected start:end, got '{s}'"))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid range start '{start}'"))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid range end '{end}'"))?;
    if start >= end {
        return Err(format!("range start {start} must be below end {end}"));
    }
    Ok((start, end))
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{head}...")
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let result = match cli.command {
        Commands::Prepare {
            source,
            endmembers,
            seed,
            normalize,
            json,
            bundle,
        } => {
            let mut config = apply_source_args(config, &source);
            if let Some(p) = endmembers {
                config.dataset.endmembers = p;
            }
            if seed.is_some() {
                config.dataset.seed = seed;
            }
            if normalize {
                config.dataset.normalizer = NormalizerKind::GlobalMinMax;
            }
            cmd_prepare(&config, json, bundle)
        }
        Commands::Reshape { source, output } => {
            let config = apply_source_args(config, &source);
            cmd_reshape(&config.source, &config.region, &output)
        }
        Commands::Header { path } => cmd_header(&path),
        Commands::InitConfig { path } => cmd_init_config(&config, &path),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Overlay command-line source and region options onto the configuration.
fn apply_source_args(mut config: PipelineConfig, args: &SourceArgs) -> PipelineConfig {
    if let Some(flight_line) = &args.flight_line {
        let base_dir = args
            .base_dir
            .clone()
            .unwrap_or_else(|| config.source.base_dir.clone());
        config.source = SourceConfig::for_flight_line(base_dir, flight_line);
    } else if let Some(base_dir) = &args.base_dir {
        config.source.base_dir = base_dir.clone();
    }
    if let Some(rows) = args.rows {
        config.region.rows = rows;
    }
    if let Some(cols) = args.cols {
        config.region.cols = cols;
    }
    config
}

fn cmd_prepare(config: &PipelineConfig, json: Option<PathBuf>, bundle: bool) -> Result<()> {
    let start = Instant::now();

    println!("Preparing dataset...");
    println!("Header: {}", config.source.header_path().display());
    println!("Rows: {:?}, Cols: {:?}", config.region.rows, config.region.cols);

    let spinner = create_spinner("Loading and reshaping cube...");
    let loaded = HyperspectralDataset::load(config);
    spinner.finish_and_clear();
    let hsi = loaded.context("Failed to build dataset")?;

    println!("{hsi}");

    let mut items = vec![
        ("Dataset", hsi.name().to_string()),
        ("Bands (L)", hsi.l().to_string()),
        ("Pixels (N)", format!("{} ({} x {})", hsi.n(), hsi.h(), hsi.w())),
        ("Endmembers (p)", hsi.p().to_string()),
        ("Gain applied", hsi.gain_applied().to_string()),
        ("Wavelengths", hsi.wavelengths().is_some().to_string()),
    ];

    // No unmixing happens here; the placeholders stand in for estimates.
    if let Some(json_path) = json {
        save_endmembers_json(&json_path, hsi.scaled_e(), &hsi)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
        items.push(("Endmembers JSON", json_path.display().to_string()));
    }
    if bundle {
        let path = save_estimates(&config.output.dir, hsi.scaled_e(), hsi.a(), &hsi)
            .context("Failed to write estimates bundle")?;
        items.push(("Estimates", path.display().to_string()));
    }

    items.push(("Duration", format!("{:.2?}", start.elapsed())));
    print_summary("Prepare Complete", &items);
    Ok(())
}

fn cmd_reshape(source: &SourceConfig, region: &Region, output: &Path) -> Result<()> {
    let start = Instant::now();

    println!("Reshaping region...");
    println!("Image: {}", source.image_path().display());
    println!("Output: {}", output.display());

    let spinner = create_spinner("Reading sub-region...");
    let reshaped = load_and_reshape(source, region);
    spinner.finish_and_clear();
    let reshaped = reshaped.context("Reshape failed")?;

    write_matrix_npy(output, &reshaped.y)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_summary(
        "Reshape Complete",
        &[
            ("Y shape", format!("({}, {})", reshaped.l, reshaped.n)),
            ("Region", format!("{} x {}", reshaped.h, reshaped.w)),
            ("Gain applied", reshaped.gain_applied.to_string()),
            ("Output", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_header(path: &Path) -> Result<()> {
    let header = EnviHeader::from_path(path)
        .with_context(|| format!("Failed to read header {}", path.display()))?;

    let mut items = vec![
        ("Samples", header.samples.to_string()),
        ("Lines", header.lines.to_string()),
        ("Bands", header.bands.to_string()),
        ("Data type", format!("{:?} ({})", header.data_type, header.data_type.code())),
        ("Interleave", header.interleave.as_str().to_string()),
        ("Byte order", format!("{:?}", header.byte_order)),
        ("Header offset", header.header_offset.to_string()),
        (
            "Expected size",
            header
                .expected_file_len()
                .map_or_else(|| "overflow".to_string(), |len| format!("{len} bytes")),
        ),
    ];
    if let Some(wavelengths) = &header.wavelengths {
        if let (Some(first), Some(last)) = (wavelengths.first(), wavelengths.last()) {
            items.push(("Wavelengths", format!("{first} .. {last}")));
        }
    }
    if let Some(description) = &header.description {
        items.push(("Description", description.clone()));
    }

    print_summary("ENVI Header", &items);
    Ok(())
}

fn cmd_init_config(config: &PipelineConfig, path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    config
        .to_yaml(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("1000:1500"), Ok((1000, 1500)));
        assert_eq!(parse_range(" 0 : 5 "), Ok((0, 5)));
        assert!(parse_range("5:5").is_err());
        assert!(parse_range("7:3").is_err());
        assert!(parse_range("12").is_err());
        assert!(parse_range("a:3").is_err());
    }

    #[test]
    fn test_cli_parses_prepare() {
        let cli = Cli::try_parse_from([
            "hsi-prep", "-vv", "prepare", "--rows", "0:10", "--cols", "5:25", "-p", "4", "--bundle",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Prepare {
                source,
                endmembers,
                bundle,
                normalize,
                ..
            } => {
                assert_eq!(source.rows, Some((0, 10)));
                assert_eq!(source.cols, Some((5, 25)));
                assert_eq!(endmembers, Some(4));
                assert!(bundle);
                assert!(!normalize);
            }
            _ => panic!("Expected prepare command"),
        }
    }

    #[test]
    fn test_apply_source_args() {
        let args = SourceArgs {
            base_dir: Some(PathBuf::from("/data")),
            flight_line: Some("run10".to_string()),
            rows: Some((0, 4)),
            cols: None,
        };

        let config = apply_source_args(PipelineConfig::default(), &args);

        assert_eq!(config.source.gain_path(), PathBuf::from("/data/run10.gain"));
        assert_eq!(config.region.rows, (0, 4));
        assert_eq!(config.region.cols, Region::default().cols);
    }

    #[test]
    fn test_base_dir_override_keeps_file_names() {
        let args = SourceArgs {
            base_dir: Some(PathBuf::from("/mnt")),
            ..Default::default()
        };

        let config = apply_source_args(PipelineConfig::default(), &args);

        assert_eq!(config.source.header, SourceConfig::default().header);
        assert_eq!(config.source.base_dir, PathBuf::from("/mnt"));
    }
}
