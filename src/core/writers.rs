//! Result writers for unmixing estimates.
//!
//! This module serializes estimates alongside the placeholder ground truth
//! carried by a [`HyperspectralDataset`]:
//! - an NPZ bundle (`estimates.npz`) with `Ehat`, `Egt`, `Ahat`, `Agt`, `H`, `W`
//! - a pretty-printed JSON document of labelled endmember spectra
//! - a single matrix as `.npy`

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use ndarray::{arr0, Array0, Array2};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, WriteNpyError, WriteNpyExt, WriteNpzError};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::processors::dataset::HyperspectralDataset;

/// Fixed file name of the estimates bundle. Reruns overwrite it.
pub const ESTIMATES_FILENAME: &str = "estimates.npz";

/// Default file name of the labelled endmember document.
pub const DEFAULT_ENDMEMBERS_FILENAME: &str = "endmembers.json";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// NPZ container error.
    #[error("NPZ write error for '{path}': {source}")]
    Npz {
        path: String,
        #[source]
        source: WriteNpzError,
    },

    /// NPY serialization error.
    #[error("NPY write error for '{path}': {source}")]
    Npy {
        path: String,
        #[source]
        source: WriteNpyError,
    },

    /// JSON serialization error.
    #[error("JSON write error for '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Matrix does not have the shape the dataset implies.
    #[error("{name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Errors that can occur when reading an estimates bundle back.
#[derive(Error, Debug)]
pub enum ReadEstimatesError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("NPZ read error for '{path}': {source}")]
    Npz {
        path: String,
        #[source]
        source: ReadNpzError,
    },

    #[error("'{path}' has no entry named '{name}'")]
    MissingEntry { path: String, name: &'static str },
}

/// Contents of an estimates bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    /// Estimated endmembers (L, p).
    pub ehat: Array2<f64>,
    /// Reference endmembers (L, p).
    pub egt: Array2<f64>,
    /// Estimated abundances (p, N).
    pub ahat: Array2<f64>,
    /// Reference abundances (p, N).
    pub agt: Array2<f64>,
    pub h: usize,
    pub w: usize,
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })
}

fn check_shape(name: &'static str, m: &Array2<f64>, expected: (usize, usize)) -> Result<()> {
    if m.dim() != expected {
        return Err(WriteError::ShapeMismatch {
            name,
            expected,
            found: m.dim(),
        });
    }
    Ok(())
}

/// Write estimates and the dataset's reference matrices to
/// `<out_dir>/estimates.npz`.
///
/// Entries: `Ehat`, `Egt` (scaled reference endmembers), `Ahat`, `Agt`,
/// and the scalars `H`, `W`. An existing bundle is overwritten.
///
/// # Arguments
///
/// * `out_dir` - Output directory (created if needed)
/// * `ehat` - Estimated endmembers, shape (L, p)
/// * `ahat` - Estimated abundances, shape (p, N)
/// * `hsi` - Dataset supplying reference matrices and dimensions
///
/// # Returns
///
/// Path of the written bundle.
pub fn save_estimates(
    out_dir: &Path,
    ehat: &Array2<f64>,
    ahat: &Array2<f64>,
    hsi: &HyperspectralDataset,
) -> Result<PathBuf> {
    check_shape("Ehat", ehat, (hsi.l(), hsi.p()))?;
    check_shape("Ahat", ahat, (hsi.p(), hsi.n()))?;

    let path = out_dir.join(ESTIMATES_FILENAME);
    ensure_parent_dirs(&path)?;
    let path_str = path.display().to_string();
    let npz_err = |source| WriteError::Npz {
        path: path_str.clone(),
        source,
    };

    let mut npz = NpzWriter::new(create_file(&path)?);
    npz.add_array("Ehat", ehat).map_err(npz_err)?;
    npz.add_array("Egt", hsi.scaled_e()).map_err(npz_err)?;
    npz.add_array("Ahat", ahat).map_err(npz_err)?;
    npz.add_array("Agt", hsi.a()).map_err(npz_err)?;
    npz.add_array("H", &arr0(hsi.h() as u64)).map_err(npz_err)?;
    npz.add_array("W", &arr0(hsi.w() as u64)).map_err(npz_err)?;
    npz.finish().map_err(npz_err)?;

    info!("Saved estimates to {}", path.display());
    Ok(path)
}

/// Read an estimates bundle written by [`save_estimates`].
pub fn load_estimates(path: &Path) -> std::result::Result<Estimates, ReadEstimatesError> {
    let path_str = path.display().to_string();
    let npz_err = |source| ReadEstimatesError::Npz {
        path: path_str.clone(),
        source,
    };

    let file = File::open(path).map_err(|source| ReadEstimatesError::Open {
        path: path_str.clone(),
        source,
    })?;
    let mut npz = NpzReader::new(file).map_err(npz_err)?;
    let names = npz.names().map_err(npz_err)?;

    // Entry names may or may not carry the `.npy` suffix.
    let entry = |name: &'static str| {
        names
            .iter()
            .find(|n| n.as_str() == name || n.strip_suffix(".npy") == Some(name))
            .cloned()
            .ok_or_else(|| ReadEstimatesError::MissingEntry {
                path: path_str.clone(),
                name,
            })
    };

    let ehat: Array2<f64> = npz.by_name(&entry("Ehat")?).map_err(npz_err)?;
    let egt: Array2<f64> = npz.by_name(&entry("Egt")?).map_err(npz_err)?;
    let ahat: Array2<f64> = npz.by_name(&entry("Ahat")?).map_err(npz_err)?;
    let agt: Array2<f64> = npz.by_name(&entry("Agt")?).map_err(npz_err)?;
    let h: Array0<u64> = npz.by_name(&entry("H")?).map_err(npz_err)?;
    let w: Array0<u64> = npz.by_name(&entry("W")?).map_err(npz_err)?;

    Ok(Estimates {
        ehat,
        egt,
        ahat,
        agt,
        h: h[()] as usize,
        w: w[()] as usize,
    })
}

/// Wavelength axis of the endmember document: real band centres when a
/// spectral-response table was loaded, band indices otherwise.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WavelengthAxis {
    Nanometers(Vec<f64>),
    BandIndex(Vec<usize>),
}

#[derive(Debug, Serialize)]
struct EndmemberDocument<'a> {
    labels: &'a [String],
    wavelengths: WavelengthAxis,
    /// Keyed by label, in label order.
    endmembers: Map<String, Value>,
}

/// Write labelled endmember spectra as pretty-printed JSON.
///
/// Document layout:
///
/// ```json
/// {
///   "labels": ["Material_1", "Material_2"],
///   "wavelengths": [0, 1, 2],
///   "endmembers": { "Material_1": [...], "Material_2": [...] }
/// }
/// ```
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `ehat` - Endmember matrix (L, p); column `i` is the spectrum of label `i`
/// * `hsi` - Dataset supplying labels and wavelengths
pub fn save_endmembers_json(path: &Path, ehat: &Array2<f64>, hsi: &HyperspectralDataset) -> Result<()> {
    check_shape("Ehat", ehat, (hsi.l(), hsi.labels().len()))?;

    let wavelengths = match hsi.wavelengths() {
        Some(wl) => WavelengthAxis::Nanometers(wl.to_vec()),
        None => WavelengthAxis::BandIndex((0..hsi.l()).collect()),
    };

    let endmembers = hsi
        .labels()
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.clone(), Value::from(ehat.column(idx).to_vec())))
        .collect();

    let document = EndmemberDocument {
        labels: hsi.labels(),
        wavelengths,
        endmembers,
    };

    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();
    let mut writer = BufWriter::new(create_file(path)?);

    serde_json::to_writer_pretty(&mut writer, &document).map_err(|e| WriteError::Json {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    info!("Saved endmembers to {}", path.display());
    Ok(())
}

/// Write a single matrix as a `.npy` file.
pub fn write_matrix_npy(path: &Path, m: &Array2<f64>) -> Result<()> {
    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();
    let mut writer = BufWriter::new(create_file(path)?);

    m.write_npy(&mut writer).map_err(|e| WriteError::Npy {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::pipeline::Reshaped;
    use ndarray::{array, Array1};
    use ndarray_npy::ReadNpyExt;
    use tempfile::tempdir;

    fn create_test_dataset(wavelengths: Option<Array1<f64>>, figs_dir: &Path) -> HyperspectralDataset {
        let reshaped = Reshaped {
            y: Array2::from_shape_fn((3, 6), |(b, px)| (b * 10 + px) as f64),
            h: 2,
            w: 3,
            l: 3,
            n: 6,
            wavelengths,
            gain_applied: false,
        };
        HyperspectralDataset::from_reshaped(reshaped, 2, None, Some(7), figs_dir, "test").unwrap()
    }

    #[test]
    fn test_endmembers_json_index_axis() {
        let dir = tempdir().unwrap();
        let hsi = create_test_dataset(None, &dir.path().join("figs"));
        let path = dir.path().join("endmembers.json");
        let ehat = array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]];

        save_endmembers_json(&path, &ehat, &hsi).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["wavelengths"], serde_json::json!([0, 1, 2]));
        assert_eq!(doc["labels"], serde_json::json!(["Material_1", "Material_2"]));

        let endmembers = doc["endmembers"].as_object().unwrap();
        let mut keys: Vec<&String> = endmembers.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["Material_1", "Material_2"]);
        assert_eq!(endmembers["Material_2"], serde_json::json!([0.2, 0.4, 0.6]));
    }

    #[test]
    fn test_endmembers_json_real_wavelengths_and_indent() {
        let dir = tempdir().unwrap();
        let hsi = create_test_dataset(Some(array![400.5, 500.0, 600.0]), &dir.path().join("figs"));
        let path = dir.path().join("nested").join("spectra.json");
        let ehat = Array2::<f64>::zeros((3, 2));

        save_endmembers_json(&path, &ehat, &hsi).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n  \"labels\""));
        let doc: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["wavelengths"], serde_json::json!([400.5, 500.0, 600.0]));
    }

    #[test]
    fn test_endmembers_json_keeps_label_order() {
        let dir = tempdir().unwrap();
        let reshaped = Reshaped {
            y: Array2::zeros((2, 4)),
            h: 2,
            w: 2,
            l: 2,
            n: 4,
            wavelengths: None,
            gain_applied: false,
        };
        let hsi =
            HyperspectralDataset::from_reshaped(reshaped, 12, None, Some(1), dir.path(), "t").unwrap();
        let path = dir.path().join("endmembers.json");
        let ehat = Array2::from_shape_fn((2, 12), |(_, j)| j as f64);

        save_endmembers_json(&path, &ehat, &hsi).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let endmembers = doc["endmembers"].as_object().unwrap();
        let keys: Vec<&str> = endmembers.keys().map(String::as_str).collect();
        let labels: Vec<&str> = hsi.labels().iter().map(String::as_str).collect();
        assert_eq!(keys, labels);
        assert_eq!(keys[9], "Material_10");
        assert_eq!(endmembers["Material_10"], serde_json::json!([9.0, 9.0]));
    }

    #[test]
    fn test_endmembers_json_shape_mismatch() {
        let dir = tempdir().unwrap();
        let hsi = create_test_dataset(None, &dir.path().join("figs"));
        let path = dir.path().join("endmembers.json");

        let err = save_endmembers_json(&path, &Array2::zeros((3, 5)), &hsi).unwrap_err();

        match err {
            WriteError::ShapeMismatch { expected, found, .. } => {
                assert_eq!(expected, (3, 2));
                assert_eq!(found, (3, 5));
            }
            _ => panic!("Expected ShapeMismatch error"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_save_and_load_estimates() {
        let dir = tempdir().unwrap();
        let hsi = create_test_dataset(None, &dir.path().join("figs"));
        let ehat = Array2::from_elem((3, 2), 0.25);
        let ahat = Array2::from_elem((2, 6), 0.5);

        let path = save_estimates(dir.path(), &ehat, &ahat, &hsi).unwrap();
        assert_eq!(path, dir.path().join(ESTIMATES_FILENAME));

        let estimates = load_estimates(&path).unwrap();
        assert_eq!(estimates.ehat, ehat);
        assert_eq!(estimates.ahat, ahat);
        assert_eq!(&estimates.egt, hsi.scaled_e());
        assert_eq!(&estimates.agt, hsi.a());
        assert_eq!((estimates.h, estimates.w), (2, 3));
    }

    #[test]
    fn test_save_estimates_overwrites() {
        let dir = tempdir().unwrap();
        let hsi = create_test_dataset(None, &dir.path().join("figs"));
        let ahat = Array2::from_elem((2, 6), 0.5);

        save_estimates(dir.path(), &Array2::zeros((3, 2)), &ahat, &hsi).unwrap();
        save_estimates(dir.path(), &Array2::ones((3, 2)), &ahat, &hsi).unwrap();

        let estimates = load_estimates(&dir.path().join(ESTIMATES_FILENAME)).unwrap();
        assert_eq!(estimates.ehat, Array2::<f64>::ones((3, 2)));
    }

    #[test]
    fn test_save_estimates_rejects_bad_abundances() {
        let dir = tempdir().unwrap();
        let hsi = create_test_dataset(None, &dir.path().join("figs"));

        let err = save_estimates(dir.path(), &Array2::zeros((3, 2)), &Array2::zeros((2, 5)), &hsi)
            .unwrap_err();

        assert!(matches!(err, WriteError::ShapeMismatch { name: "Ahat", .. }));
    }

    #[test]
    fn test_write_matrix_npy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("y.npy");
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];

        write_matrix_npy(&path, &m).unwrap();

        let read = Array2::<f64>::read_npy(File::open(&path).unwrap()).unwrap();
        assert_eq!(read, m);
    }
}
