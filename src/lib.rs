//! Hyperspectral cube preparation for spectral-unmixing experiments.
//!
//! This crate provides tools for:
//! - Parsing ENVI headers and reading rectangular regions of raw cubes
//! - Reshaping a region into the band-major (bands x pixels) matrix
//! - Gain calibration and wavelength recovery from two-column tables
//! - A dataset container with placeholder endmembers and abundances
//! - Writing estimates to NPZ and labelled endmembers to JSON
//!
//! # Example
//!
//! ```no_run
//! use hsi_prep::{HyperspectralDataset, PipelineConfig};
//!
//! let config = PipelineConfig::from_yaml("hsi-prep.yaml").unwrap();
//! let hsi = HyperspectralDataset::load(&config).unwrap();
//! println!("{hsi}");
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{DatasetConfig, NormalizerKind, OutputConfig, PipelineConfig, Region, SourceConfig};
pub use processors::dataset::{HyperspectralDataset, Representation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
