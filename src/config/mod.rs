//! Configuration types for the preparation pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Half-open row/column window of a cube, `(start, end)` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Line range
    pub rows: (usize, usize),
    /// Sample range
    pub cols: (usize, usize),
}

impl Region {
    /// Number of lines covered.
    #[inline]
    pub fn height(&self) -> usize {
        self.rows.1.saturating_sub(self.rows.0)
    }

    /// Number of samples covered.
    #[inline]
    pub fn width(&self) -> usize {
        self.cols.1.saturating_sub(self.cols.0)
    }
}

impl Default for Region {
    /// A 500x500 window starting at line 1000, sample 100.
    fn default() -> Self {
        Self {
            rows: (1000, 1500),
            cols: (100, 600),
        }
    }
}

/// Location of the cube and its calibration tables.
///
/// Fields missing from a config file fall back to the default flight line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding all files of one flight line
    pub base_dir: PathBuf,

    /// ENVI header file name
    pub header: PathBuf,

    /// Raw image file name
    pub image: PathBuf,

    /// Gain table file name (optional on disk)
    pub gain: PathBuf,

    /// Spectral-response table file name (optional on disk)
    pub spectral_response: PathBuf,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Default AVIRIS flight line identifier.
pub const DEFAULT_FLIGHT_LINE: &str = "f100517t01p00r11rdn_b";

impl SourceConfig {
    /// File names following the AVIRIS distribution layout for `flight_line`:
    /// `<run>_sc01_ort_img.hdr`, `<run>_sc01_ort_img`, `<run>.gain`, `<run>.spc`.
    pub fn for_flight_line<P: AsRef<Path>>(base_dir: P, flight_line: &str) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            header: PathBuf::from(format!("{flight_line}_sc01_ort_img.hdr")),
            image: PathBuf::from(format!("{flight_line}_sc01_ort_img")),
            gain: PathBuf::from(format!("{flight_line}.gain")),
            spectral_response: PathBuf::from(format!("{flight_line}.spc")),
        }
    }

    pub fn header_path(&self) -> PathBuf {
        self.base_dir.join(&self.header)
    }

    pub fn image_path(&self) -> PathBuf {
        self.base_dir.join(&self.image)
    }

    pub fn gain_path(&self) -> PathBuf {
        self.base_dir.join(&self.gain)
    }

    pub fn spectral_response_path(&self) -> PathBuf {
        self.base_dir.join(&self.spectral_response)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::for_flight_line(default_base_dir(), DEFAULT_FLIGHT_LINE)
    }
}

/// Normalizer applied to Y and the placeholder endmembers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    /// Leave the data as loaded.
    #[default]
    None,
    /// Rescale to [0, 1] using the matrix-wide minimum and maximum.
    GlobalMinMax,
}

/// Configuration for the dataset container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Number of placeholder endmembers
    #[serde(default = "default_endmembers")]
    pub endmembers: usize,

    /// Display name, used in summaries and file naming
    #[serde(default = "default_name")]
    pub name: String,

    /// Directory for figures (created if missing)
    #[serde(default = "default_figs_dir")]
    pub figs_dir: PathBuf,

    /// Seed for placeholder endmembers; random when unset
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub normalizer: NormalizerKind,
}

fn default_endmembers() -> usize {
    3
}

fn default_name() -> String {
    "AVIRIS_Oil_detection".to_string()
}

fn default_figs_dir() -> PathBuf {
    PathBuf::from("./figs")
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            endmembers: default_endmembers(),
            name: default_name(),
            figs_dir: default_figs_dir(),
            seed: None,
            normalizer: NormalizerKind::None,
        }
    }
}

/// Configuration for exported results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `estimates.npz`
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Labelled endmember document path
    #[serde(default = "default_endmembers_json")]
    pub endmembers_json: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_endmembers_json() -> PathBuf {
    PathBuf::from(crate::core::writers::DEFAULT_ENDMEMBERS_FILENAME)
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            endmembers_json: default_endmembers_json(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub region: Region,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
