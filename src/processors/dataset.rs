//! Dataset container for unmixing experiments.
//!
//! Holds the band-major data matrix produced by the pipeline together with
//! placeholder endmembers and abundances. The cube carries no ground truth,
//! so the placeholders only give the container the same slots as
//! ground-truthed datasets:
//! - `E`: (L, p) uniform random values in [0, 1)
//! - `A`: (p, N) with every entry `1/p`

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::normalizers::{self, Normalizer};
use super::pipeline::{self, PipelineError, Reshaped};
use crate::config::PipelineConfig;
use crate::core::transforms::value_range;

/// Errors that can occur while building a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("number of endmembers must be at least 1")]
    NoEndmembers,

    #[error("failed to create figures directory '{path}': {source}")]
    FiguresDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Output encoding for [`HyperspectralDataset::matrices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// `f64` arrays, as stored.
    #[default]
    Native,
    /// Contiguous row-major `f32` arrays, ready for tensor libraries.
    Tensor,
}

/// Owned copies of (Y, E, A).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrices<T> {
    pub y: Array2<T>,
    pub e: Array2<T>,
    pub a: Array2<T>,
}

/// (Y, E, A) in the requested representation.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetMatrices {
    Native(Matrices<f64>),
    Tensor(Matrices<f32>),
}

/// Band-major hyperspectral data with placeholder ground truth.
#[derive(Debug, Clone)]
pub struct HyperspectralDataset {
    y: Array2<f64>,
    e: Array2<f64>,
    a: Array2<f64>,
    scaled_e: Array2<f64>,
    l: usize,
    h: usize,
    w: usize,
    n: usize,
    p: usize,
    labels: Vec<String>,
    wavelengths: Option<Array1<f64>>,
    gain_applied: bool,
    name: String,
    figs_dir: PathBuf,
}

impl HyperspectralDataset {
    /// Build the dataset described by `config`, using the normalizer it
    /// selects.
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let normalizer = normalizers::from_kind(config.dataset.normalizer);
        Self::load_with(config, normalizer.as_deref())
    }

    /// Build the dataset described by `config` with an explicit normalizer.
    /// `None` leaves the data unscaled.
    pub fn load_with(config: &PipelineConfig, normalizer: Option<&dyn Normalizer>) -> Result<Self> {
        let reshaped = pipeline::load_and_reshape(&config.source, &config.region)?;
        Self::from_reshaped(
            reshaped,
            config.dataset.endmembers,
            normalizer,
            config.dataset.seed,
            &config.dataset.figs_dir,
            &config.dataset.name,
        )
    }

    /// Build the dataset from pipeline output.
    ///
    /// # Arguments
    ///
    /// * `reshaped` - Pipeline output
    /// * `p` - Number of placeholder endmembers
    /// * `normalizer` - Applied to Y and E (giving scaledE) when present
    /// * `seed` - Seed for placeholder endmembers; entropy when `None`
    /// * `figs_dir` - Created if missing
    /// * `name` - Display name
    pub fn from_reshaped(
        reshaped: Reshaped,
        p: usize,
        normalizer: Option<&dyn Normalizer>,
        seed: Option<u64>,
        figs_dir: &Path,
        name: &str,
    ) -> Result<Self> {
        if p == 0 {
            return Err(DatasetError::NoEndmembers);
        }

        let Reshaped {
            y,
            h,
            w,
            l,
            n,
            wavelengths,
            gain_applied,
        } = reshaped;

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let e = Array2::from_shape_fn((l, p), |_| rng.gen::<f64>());
        let a = Array2::from_elem((p, n), 1.0 / p as f64);

        let (y, scaled_e) = match normalizer {
            Some(normalizer) => (normalizer.transform(&y), normalizer.transform(&e)),
            None => (y, e.clone()),
        };

        let labels = (1..=p).map(|i| format!("Material_{i}")).collect();

        fs::create_dir_all(figs_dir).map_err(|source| DatasetError::FiguresDirectory {
            path: figs_dir.to_path_buf(),
            source,
        })?;
        debug!("Figures directory: {}", figs_dir.display());

        let dataset = Self {
            y,
            e,
            a,
            scaled_e,
            l,
            h,
            w,
            n,
            p,
            labels,
            wavelengths,
            gain_applied,
            name: name.to_string(),
            figs_dir: figs_dir.to_path_buf(),
        };
        info!("Built dataset {}: {} bands, {} pixels, {} endmembers", dataset.name, l, n, p);

        Ok(dataset)
    }

    /// Copies of (Y, E, A) in the requested representation.
    ///
    /// Every call returns fresh storage; mutating the result never affects
    /// the dataset.
    pub fn matrices(&self, representation: Representation) -> DatasetMatrices {
        match representation {
            Representation::Native => DatasetMatrices::Native(Matrices {
                y: self.y.clone(),
                e: self.e.clone(),
                a: self.a.clone(),
            }),
            Representation::Tensor => DatasetMatrices::Tensor(Matrices {
                y: self.y.mapv(|v| v as f32),
                e: self.e.mapv(|v| v as f32),
                a: self.a.mapv(|v| v as f32),
            }),
        }
    }

    /// Data matrix (L, N).
    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    /// Placeholder endmembers (L, p), before normalization.
    pub fn e(&self) -> &Array2<f64> {
        &self.e
    }

    /// Placeholder abundances (p, N).
    pub fn a(&self) -> &Array2<f64> {
        &self.a
    }

    /// Placeholder endmembers after normalization.
    pub fn scaled_e(&self) -> &Array2<f64> {
        &self.scaled_e
    }

    /// Number of bands.
    pub fn l(&self) -> usize {
        self.l
    }

    /// Region height.
    pub fn h(&self) -> usize {
        self.h
    }

    /// Region width.
    pub fn w(&self) -> usize {
        self.w
    }

    /// Number of pixels.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of endmembers.
    pub fn p(&self) -> usize {
        self.p
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn wavelengths(&self) -> Option<&Array1<f64>> {
        self.wavelengths.as_ref()
    }

    pub fn gain_applied(&self) -> bool {
        self.gain_applied
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn figs_dir(&self) -> &Path {
        &self.figs_dir
    }
}

impl fmt::Display for HyperspectralDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hyperspectral dataset => {}", self.name)?;
        writeln!(f, "---------------------")?;
        writeln!(f, "{} bands,", self.l)?;
        writeln!(f, "{} lines, {} samples, ({} pixels),", self.h, self.w, self.n)?;
        writeln!(f, "{} endmembers (placeholders for blind unmixing)", self.p)?;
        match value_range(&self.y) {
            Some((lo, hi)) => writeln!(f, "Y range: [{lo:.3}, {hi:.3}]"),
            None => writeln!(f, "Y range: [n/a]"),
        }
    }
}
