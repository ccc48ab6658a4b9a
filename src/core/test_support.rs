//! Synthetic ENVI fixtures shared by unit tests.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use ndarray::Array3;

use super::header::{DataType, Endian, Interleave};

/// Cube whose value encodes its own position: `100*line + 10*sample + band + 1`.
pub(crate) fn synthetic_cube(lines: usize, samples: usize, bands: usize) -> Array3<f64> {
    Array3::from_shape_fn((lines, samples, bands), |(l, s, b)| {
        (100 * l + 10 * s + b + 1) as f64
    })
}

fn write_sample<B: ByteOrder, W: Write>(out: &mut W, value: f64, data_type: DataType) {
    match data_type {
        DataType::U8 => out.write_u8(value as u8),
        DataType::I16 => out.write_i16::<B>(value as i16),
        DataType::U16 => out.write_u16::<B>(value as u16),
        DataType::I32 => out.write_i32::<B>(value as i32),
        DataType::U32 => out.write_u32::<B>(value as u32),
        DataType::F32 => out.write_f32::<B>(value as f32),
        DataType::F64 => out.write_f64::<B>(value),
        DataType::I64 => out.write_i64::<B>(value as i64),
        DataType::U64 => out.write_u64::<B>(value as u64),
    }
    .unwrap();
}

/// Write `cube` (lines, samples, bands) as an ENVI header/image pair named
/// `<name>.hdr` / `<name>` inside `dir`.
pub(crate) fn write_envi(
    dir: &Path,
    name: &str,
    cube: &Array3<f64>,
    data_type: DataType,
    interleave: Interleave,
    endian: Endian,
) -> (PathBuf, PathBuf) {
    let (lines, samples, bands) = cube.dim();
    let hdr = dir.join(format!("{name}.hdr"));
    let img = dir.join(name);

    let byte_order = match endian {
        Endian::Little => 0,
        Endian::Big => 1,
    };
    fs::write(
        &hdr,
        format!(
            "ENVI\nsamples = {samples}\nlines = {lines}\nbands = {bands}\nheader offset = 0\n\
             data type = {}\ninterleave = {}\nbyte order = {byte_order}\n",
            data_type.code(),
            interleave.as_str()
        ),
    )
    .unwrap();

    let mut out = BufWriter::new(File::create(&img).unwrap());
    let mut put = |v: f64| match endian {
        Endian::Little => write_sample::<LittleEndian, _>(&mut out, v, data_type),
        Endian::Big => write_sample::<BigEndian, _>(&mut out, v, data_type),
    };
    match interleave {
        Interleave::Bsq => {
            for b in 0..bands {
                for l in 0..lines {
                    for s in 0..samples {
                        put(cube[[l, s, b]]);
                    }
                }
            }
        }
        Interleave::Bil => {
            for l in 0..lines {
                for b in 0..bands {
                    for s in 0..samples {
                        put(cube[[l, s, b]]);
                    }
                }
            }
        }
        Interleave::Bip => {
            for l in 0..lines {
                for s in 0..samples {
                    for b in 0..bands {
                        put(cube[[l, s, b]]);
                    }
                }
            }
        }
    }
    out.flush().unwrap();

    (hdr, img)
}

/// Write a two-column table (`value index`) as found in `.gain` / `.spc` files.
pub(crate) fn write_table(path: &Path, column0: &[f64]) {
    let body: String = column0
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{v} {}\n", i + 1))
        .collect();
    fs::write(path, body).unwrap();
}
