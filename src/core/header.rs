//! ENVI header parsing.
//!
//! An ENVI header is a plain-text companion to a raw binary cube. It starts
//! with the magic line `ENVI` followed by `key = value` pairs. Values wrapped
//! in braces may span several lines:
//!
//! ```text
//! ENVI
//! samples = 677
//! lines   = 11000
//! bands   = 224
//! data type = 2
//! interleave = bip
//! byte order = 1
//! wavelength = { 365.9298, 375.5940,
//!  385.2625 }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Errors raised while parsing an ENVI header.
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an ENVI header (missing 'ENVI' magic line)")]
    MissingMagic,

    #[error("missing required header field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("unterminated '{{' in field '{0}'")]
    UnterminatedBrace(String),

    #[error("unsupported ENVI data type {0}")]
    UnsupportedDataType(u32),

    #[error("cube of {lines} lines x {samples} samples x {bands} bands does not fit in memory addressing")]
    SizeOverflow {
        lines: usize,
        samples: usize,
        bands: usize,
    },
}

/// Result type for header parsing.
pub type Result<T> = std::result::Result<T, HeaderError>;

/// Sample encoding as given by the ENVI `data type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
    U32,
    I64,
    U64,
}

impl DataType {
    /// Map an ENVI `data type` code. Complex types (6, 9) are not supported.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(DataType::U8),
            2 => Ok(DataType::I16),
            3 => Ok(DataType::I32),
            4 => Ok(DataType::F32),
            5 => Ok(DataType::F64),
            12 => Ok(DataType::U16),
            13 => Ok(DataType::U32),
            14 => Ok(DataType::I64),
            15 => Ok(DataType::U64),
            other => Err(HeaderError::UnsupportedDataType(other)),
        }
    }

    /// ENVI code for this data type.
    pub fn code(self) -> u32 {
        match self {
            DataType::U8 => 1,
            DataType::I16 => 2,
            DataType::I32 => 3,
            DataType::F32 => 4,
            DataType::F64 => 5,
            DataType::U16 => 12,
            DataType::U32 => 13,
            DataType::I64 => 14,
            DataType::U64 => 15,
        }
    }

    /// Size of one sample in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }
}

/// Storage order of the three cube axes in the image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Band sequential: band, line, sample.
    Bsq,
    /// Band interleaved by line: line, band, sample.
    Bil,
    /// Band interleaved by pixel: line, sample, band.
    Bip,
}

impl Interleave {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bsq" => Ok(Interleave::Bsq),
            "bil" => Ok(Interleave::Bil),
            "bip" => Ok(Interleave::Bip),
            other => Err(HeaderError::InvalidValue {
                field: "interleave".to_string(),
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interleave::Bsq => "bsq",
            Interleave::Bil => "bil",
            Interleave::Bip => "bip",
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Parsed ENVI header.
#[derive(Debug, Clone)]
pub struct EnviHeader {
    /// Number of samples (columns) per line.
    pub samples: usize,
    /// Number of lines (rows).
    pub lines: usize,
    /// Number of spectral bands.
    pub bands: usize,
    /// Bytes to skip at the start of the image file.
    pub header_offset: usize,
    pub data_type: DataType,
    pub interleave: Interleave,
    pub byte_order: Endian,
    pub description: Option<String>,
    pub wavelength_units: Option<String>,
    /// Band centre wavelengths, if the header carries them.
    pub wavelengths: Option<Vec<f64>>,
    /// All raw fields, keyed by lowercase name.
    pub fields: HashMap<String, String>,
}

impl EnviHeader {
    /// Read and parse a header file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse header text.
    pub fn parse(text: &str) -> Result<Self> {
        let fields = parse_fields(text)?;

        let samples = required_usize(&fields, "samples")?;
        let lines = required_usize(&fields, "lines")?;
        let bands = required_usize(&fields, "bands")?;
        let code = required_usize(&fields, "data type")? as u32;
        let data_type = DataType::from_code(code)?;

        let header_offset = optional_usize(&fields, "header offset")?.unwrap_or(0);

        let interleave = match fields.get("interleave") {
            Some(value) => Interleave::parse(value)?,
            None => Interleave::Bsq,
        };

        let byte_order = match optional_usize(&fields, "byte order")? {
            None | Some(0) => Endian::Little,
            Some(1) => Endian::Big,
            Some(other) => {
                return Err(HeaderError::InvalidValue {
                    field: "byte order".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let wavelengths = match fields.get("wavelength") {
            Some(value) => Some(parse_float_list("wavelength", value)?),
            None => None,
        };

        let header = EnviHeader {
            samples,
            lines,
            bands,
            header_offset,
            data_type,
            interleave,
            byte_order,
            description: fields.get("description").cloned(),
            wavelength_units: fields.get("wavelength units").cloned(),
            wavelengths,
            fields,
        };
        header.checked_file_len()?;

        Ok(header)
    }

    /// Total number of samples in the cube, `None` on overflow.
    #[inline]
    pub fn num_values(&self) -> Option<usize> {
        self.lines.checked_mul(self.samples)?.checked_mul(self.bands)
    }

    /// Minimum image file size in bytes implied by this header, `None` on
    /// overflow.
    pub fn expected_file_len(&self) -> Option<usize> {
        self.num_values()?
            .checked_mul(self.data_type.size())?
            .checked_add(self.header_offset)
    }

    /// Like [`expected_file_len`](Self::expected_file_len), with overflow as
    /// an error.
    pub fn checked_file_len(&self) -> Result<usize> {
        self.expected_file_len().ok_or(HeaderError::SizeOverflow {
            lines: self.lines,
            samples: self.samples,
            bands: self.bands,
        })
    }

    /// Byte offset of sample (line, sample, band) within the image file.
    ///
    /// Indices must lie inside the cube and [`checked_file_len`](Self::checked_file_len)
    /// must have succeeded; every intermediate value is then below the file length.
    #[inline]
    pub fn offset_of(&self, line: usize, sample: usize, band: usize) -> usize {
        let index = match self.interleave {
            Interleave::Bsq => (band * self.lines + line) * self.samples + sample,
            Interleave::Bil => (line * self.bands + band) * self.samples + sample,
            Interleave::Bip => (line * self.samples + sample) * self.bands + band,
        };
        self.header_offset + index * self.data_type.size()
    }
}

/// Split header text into lowercase-keyed fields, joining braced values.
fn parse_fields(text: &str) -> Result<HashMap<String, String>> {
    let mut lines = text.lines();

    let magic = lines.next().map(str::trim).unwrap_or("");
    if magic != "ENVI" {
        return Err(HeaderError::MissingMagic);
    }

    let mut fields = HashMap::new();
    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let mut value = value.trim().to_string();

        if value.starts_with('{') {
            while !value.contains('}') {
                let next = lines
                    .next()
                    .ok_or_else(|| HeaderError::UnterminatedBrace(key.clone()))?;
                value.push(' ');
                value.push_str(next.trim());
            }
            let inner = value
                .trim_start_matches('{')
                .split('}')
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            value = inner;
        }

        fields.insert(key, value);
    }

    Ok(fields)
}

fn required_usize(fields: &HashMap<String, String>, name: &'static str) -> Result<usize> {
    optional_usize(fields, name)?.ok_or(HeaderError::MissingField(name))
}

fn optional_usize(fields: &HashMap<String, String>, name: &str) -> Result<Option<usize>> {
    match fields.get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HeaderError::InvalidValue {
                field: name.to_string(),
                value: value.clone(),
            }),
        None => Ok(None),
    }
}

fn parse_float_list(field: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| HeaderError::InvalidValue {
                field: field.to_string(),
                value: tok.to_string(),
            })
        })
        .collect()
}
