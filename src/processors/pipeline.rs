//! Reshape/calibrate pipeline.
//!
//! Crops a region from an ENVI cube, reshapes it to the band-major (L, N)
//! matrix, divides by the per-band gain when a gain table is present, and
//! attaches band wavelengths when a spectral-response table is present.
//!
//! Either table may be missing; the pipeline then proceeds uncalibrated or
//! without wavelengths. The header and image files are mandatory.

use log::{info, warn};
use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::config::{Region, SourceConfig};
use crate::core::loaders::{load_gain_factors, load_wavelengths, read_subregion, LoaderError};
use crate::core::transforms::{apply_gain, check_wavelengths, cube_to_band_major, TransformError};

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Output of the pipeline.
#[derive(Debug, Clone)]
pub struct Reshaped {
    /// Band-major data matrix, shape (L, N).
    pub y: Array2<f64>,
    /// Region height (lines).
    pub h: usize,
    /// Region width (samples).
    pub w: usize,
    /// Number of bands.
    pub l: usize,
    /// Number of pixels, `h * w`.
    pub n: usize,
    /// Band centres in nm, if a spectral-response table was found.
    pub wavelengths: Option<Array1<f64>>,
    /// Whether gain correction was applied.
    pub gain_applied: bool,
}

impl Reshaped {
    /// The `(Y, H, W, L, N)` tuple.
    pub fn into_parts(self) -> (Array2<f64>, usize, usize, usize, usize) {
        (self.y, self.h, self.w, self.l, self.n)
    }
}

/// Run the pipeline for one region of the configured source.
///
/// # Arguments
///
/// * `source` - Paths of the cube and calibration tables
/// * `region` - Half-open row/column window to extract
///
/// # Errors
///
/// Fails if the header or image is missing or malformed, the region is out
/// of bounds, a present calibration table cannot be parsed, or a table does
/// not have one entry per band.
pub fn load_and_reshape(source: &SourceConfig, region: &Region) -> Result<Reshaped> {
    let cube = read_subregion(source.header_path(), source.image_path(), region)?;

    let (h, w, l) = cube.dim();
    let n = h * w;
    let mut y = cube_to_band_major(&cube);
    drop(cube);

    info!(
        "Extracted rows {:?} cols {:?}: {} lines x {} samples x {} bands ({} pixels)",
        region.rows, region.cols, h, w, l, n
    );

    let gain_path = source.gain_path();
    let gain_applied = if gain_path.exists() {
        let gain = load_gain_factors(&gain_path)?;
        apply_gain(&mut y, gain.view())?;
        info!("Applied gain correction from {}", gain_path.display());
        true
    } else {
        warn!(
            "Gain file {} not found, continuing without gain correction",
            gain_path.display()
        );
        false
    };

    let spc_path = source.spectral_response_path();
    let wavelengths = if spc_path.exists() {
        let wavelengths = load_wavelengths(&spc_path)?;
        check_wavelengths(wavelengths.view(), l)?;
        info!("Loaded band wavelengths from {}", spc_path.display());
        Some(wavelengths)
    } else {
        warn!(
            "Spectral response file {} not found, wavelengths unavailable",
            spc_path.display()
        );
        None
    };

    Ok(Reshaped {
        y,
        h,
        w,
        l,
        n,
        wavelengths,
        gain_applied,
    })
}
