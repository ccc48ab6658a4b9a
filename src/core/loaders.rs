//! Data loaders for ENVI cubes and two-column calibration tables.
//!
//! This module provides:
//! - Region-of-interest extraction from a memory-mapped ENVI image
//! - Gain-factor tables (`*.gain`, column 0 = per-band divisor)
//! - Spectral-response tables (`*.spc`, column 0 = band centre in nm)

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;
use memmap2::Mmap;
use ndarray::{Array1, Array3};
use thiserror::Error;

use super::header::{DataType, Endian, EnviHeader, HeaderError};
use crate::config::Region;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read ENVI header '{path}': {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },

    #[error("image '{path}' is truncated: expected at least {expected} bytes, found {found}")]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("region rows {rows:?} cols {cols:?} outside cube of {lines} lines x {samples} samples")]
    RegionOutOfBounds {
        rows: (usize, usize),
        cols: (usize, usize),
        lines: usize,
        samples: usize,
    },

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("{path}: line {line} has no column {column}")]
    MissingColumn {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("{path}: line {line}: '{token}' is not a number")]
    Parse {
        path: PathBuf,
        line: usize,
        token: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Decodes one raw sample into `f64`.
type SampleDecoder = fn(&[u8]) -> f64;

fn decoder_for<B: ByteOrder>(data_type: DataType) -> SampleDecoder {
    match data_type {
        DataType::U8 => |b: &[u8]| b[0] as f64,
        DataType::I16 => |b: &[u8]| B::read_i16(b) as f64,
        DataType::U16 => |b: &[u8]| B::read_u16(b) as f64,
        DataType::I32 => |b: &[u8]| B::read_i32(b) as f64,
        DataType::U32 => |b: &[u8]| B::read_u32(b) as f64,
        DataType::F32 => |b: &[u8]| B::read_f32(b) as f64,
        DataType::F64 => |b: &[u8]| B::read_f64(b),
        DataType::I64 => |b: &[u8]| B::read_i64(b) as f64,
        DataType::U64 => |b: &[u8]| B::read_u64(b) as f64,
    }
}

fn sample_decoder(data_type: DataType, endian: Endian) -> SampleDecoder {
    match endian {
        Endian::Little => decoder_for::<LittleEndian>(data_type),
        Endian::Big => decoder_for::<BigEndian>(data_type),
    }
}

/// Read and parse the ENVI header at `path`.
pub fn open_header<P: AsRef<Path>>(path: P) -> Result<EnviHeader> {
    let path = path.as_ref();
    EnviHeader::from_path(path).map_err(|source| LoaderError::Header {
        path: path.to_path_buf(),
        source,
    })
}

/// Check a region against the cube extent. Ranges are half-open and must be
/// non-empty.
pub fn validate_region(header: &EnviHeader, region: &Region) -> Result<()> {
    let empty = region.height() == 0 || region.width() == 0;
    if empty || region.rows.1 > header.lines || region.cols.1 > header.samples {
        return Err(LoaderError::RegionOutOfBounds {
            rows: region.rows,
            cols: region.cols,
            lines: header.lines,
            samples: header.samples,
        });
    }
    Ok(())
}

/// Extract a rectangular sub-region from an ENVI cube.
///
/// The image file is memory-mapped so only the pages covering the requested
/// region are touched.
///
/// # Arguments
///
/// * `header_path` - Path to the `.hdr` file
/// * `image_path` - Path to the raw image file
/// * `region` - Half-open row/column ranges
///
/// # Returns
///
/// An array of shape (lines, samples, bands) for the region, samples widened
/// to `f64`.
///
/// # Errors
///
/// Returns an error if either file is missing or malformed, the image is
/// shorter than the header implies, or the region exceeds the cube.
pub fn read_subregion<P: AsRef<Path>, Q: AsRef<Path>>(
    header_path: P,
    image_path: Q,
    region: &Region,
) -> Result<Array3<f64>> {
    let header = open_header(header_path)?;
    read_subregion_with_header(&header, image_path, region)
}

/// Like [`read_subregion`] for an already parsed header.
pub fn read_subregion_with_header<P: AsRef<Path>>(
    header: &EnviHeader,
    image_path: P,
    region: &Region,
) -> Result<Array3<f64>> {
    let path = image_path.as_ref();
    validate_region(header, region)?;

    let io_err = |source: std::io::Error| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let expected = header
        .checked_file_len()
        .map_err(|source| LoaderError::Header {
            path: path.to_path_buf(),
            source,
        })?;

    let file = File::open(path).map_err(io_err)?;
    let found = usize::try_from(file.metadata().map_err(io_err)?.len()).unwrap_or(usize::MAX);
    if found < expected {
        return Err(LoaderError::Truncated {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }

    // SAFETY: the map is read-only and dropped before returning; the image is
    // not expected to be modified while it is being read.
    let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;

    let (r0, c0) = (region.rows.0, region.cols.0);
    let shape = (region.height(), region.width(), header.bands);
    let size = header.data_type.size();
    let decode = sample_decoder(header.data_type, header.byte_order);

    debug!(
        "Reading {}x{}x{} region ({} interleave, {:?}) from {}",
        shape.0,
        shape.1,
        shape.2,
        header.interleave.as_str(),
        header.data_type,
        path.display()
    );

    let mut cube = Array3::<f64>::zeros(shape);
    for ((line, sample, band), value) in cube.indexed_iter_mut() {
        let offset = header.offset_of(r0 + line, c0 + sample, band);
        *value = decode(&mmap[offset..offset + size]);
    }

    Ok(cube)
}

/// Read one column of a whitespace-delimited numeric table.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_table_column<P: AsRef<Path>>(path: P, column: usize) -> Result<Array1<f64>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut values = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let token = line
            .split_whitespace()
            .nth(column)
            .ok_or_else(|| LoaderError::MissingColumn {
                path: path.to_path_buf(),
                line: idx + 1,
                column,
            })?;
        let value: f64 = token.parse().map_err(|_| LoaderError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            token: token.to_string(),
        })?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(Array1::from(values))
}

/// Load per-band gain factors (column 0 of a `.gain` file).
///
/// The second column holds channel numbers and is ignored.
pub fn load_gain_factors<P: AsRef<Path>>(path: P) -> Result<Array1<f64>> {
    let gain = load_table_column(path.as_ref(), 0)?;
    debug!("Loaded {} gain factors from {}", gain.len(), path.as_ref().display());
    Ok(gain)
}

/// Load band centre wavelengths in nanometres (column 0 of a `.spc` file).
pub fn load_wavelengths<P: AsRef<Path>>(path: P) -> Result<Array1<f64>> {
    let wavelengths = load_table_column(path.as_ref(), 0)?;
    debug!(
        "Loaded {} wavelengths from {}",
        wavelengths.len(),
        path.as_ref().display()
    );
    Ok(wavelengths)
}
