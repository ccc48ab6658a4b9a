//! Cube reshaping and radiometric calibration.
//!
//! This module converts cubes between the image layout (line, sample, band)
//! and the band-major matrix layout used by unmixing code, and applies
//! per-band gain correction.
//!
//! Pixel ordering is fixed: column `line * W + sample` of the matrix holds
//! the spectrum of pixel (line, sample).

use ndarray::{Array2, Array3, ArrayView1, Axis};
use thiserror::Error;

/// Errors that can occur while reshaping or calibrating.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    /// Gain table does not have one factor per band.
    #[error("gain table has {found} factors but the cube has {expected} bands")]
    GainLengthMismatch { expected: usize, found: usize },

    /// Spectral-response table does not have one wavelength per band.
    #[error("spectral response table has {found} wavelengths but the cube has {expected} bands")]
    WavelengthLengthMismatch { expected: usize, found: usize },

    /// Matrix column count does not match the requested image size.
    #[error("matrix has {columns} columns, cannot reshape to {lines} x {samples} pixels")]
    PixelCountMismatch {
        columns: usize,
        lines: usize,
        samples: usize,
    },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Reshape a (H, W, L) cube into an (L, H*W) band-major matrix.
///
/// Equivalent to flattening the first two axes in row-major order into
/// (N, L) and transposing.
///
/// # Example
///
/// ```
/// use hsi_prep::core::transforms::cube_to_band_major;
/// use ndarray::Array3;
///
/// let cube = Array3::<f64>::zeros((4, 5, 3));
/// let y = cube_to_band_major(&cube);
/// assert_eq!(y.dim(), (3, 20));
/// ```
pub fn cube_to_band_major(cube: &Array3<f64>) -> Array2<f64> {
    let (h, w, l) = cube.dim();
    Array2::from_shape_fn((l, h * w), |(band, pixel)| cube[[pixel / w, pixel % w, band]])
}

/// Inverse of [`cube_to_band_major`]: rebuild a (H, W, L) cube from an
/// (L, H*W) matrix.
///
/// # Errors
///
/// Returns an error if the matrix does not have exactly `lines * samples`
/// columns.
pub fn band_major_to_cube(y: &Array2<f64>, lines: usize, samples: usize) -> Result<Array3<f64>> {
    let (l, n) = y.dim();
    if n != lines * samples {
        return Err(TransformError::PixelCountMismatch {
            columns: n,
            lines,
            samples,
        });
    }
    Ok(Array3::from_shape_fn((lines, samples, l), |(line, sample, band)| {
        y[[band, line * samples + sample]]
    }))
}

/// Divide every band of an (L, N) matrix by its gain factor, in place.
///
/// The factor vector is broadcast as an (L, 1) column so band `i` of every
/// pixel is divided by `gain[i]`.
///
/// # Errors
///
/// Returns [`TransformError::GainLengthMismatch`] if `gain.len() != L`. The
/// matrix is left untouched in that case.
pub fn apply_gain(y: &mut Array2<f64>, gain: ArrayView1<f64>) -> Result<()> {
    let bands = y.nrows();
    if gain.len() != bands {
        return Err(TransformError::GainLengthMismatch {
            expected: bands,
            found: gain.len(),
        });
    }

    *y /= &gain.insert_axis(Axis(1));
    Ok(())
}

/// Check that a wavelength vector has one entry per band.
pub fn check_wavelengths(wavelengths: ArrayView1<f64>, bands: usize) -> Result<()> {
    if wavelengths.len() != bands {
        return Err(TransformError::WavelengthLengthMismatch {
            expected: bands,
            found: wavelengths.len(),
        });
    }
    Ok(())
}

/// Minimum and maximum of a matrix, ignoring NaN. `None` for an empty matrix.
pub fn value_range(m: &Array2<f64>) -> Option<(f64, f64)> {
    m.iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::synthetic_cube;
    use ndarray::{array, Array1};

    #[test]
    fn test_band_major_shape() {
        for (h, w, l) in [(1, 1, 1), (4, 5, 3), (7, 2, 11)] {
            let y = cube_to_band_major(&synthetic_cube(h, w, l));
            assert_eq!(y.dim(), (l, h * w));
        }
    }

    #[test]
    fn test_band_major_column_order() {
        let cube = synthetic_cube(4, 5, 3);
        let y = cube_to_band_major(&cube);

        // Column index = line * W + sample
        for line in 0..4 {
            for sample in 0..5 {
                for band in 0..3 {
                    assert_eq!(y[[band, line * 5 + sample]], cube[[line, sample, band]]);
                }
            }
        }
    }

    #[test]
    fn test_matches_reshape_then_transpose() {
        let cube = synthetic_cube(3, 4, 2);
        let flat = cube.clone().into_shape((12, 2)).unwrap();
        let expected = flat.t().to_owned();

        assert_eq!(cube_to_band_major(&cube), expected);
    }

    #[test]
    fn test_round_trip() {
        let cube = synthetic_cube(6, 3, 5);
        let y = cube_to_band_major(&cube);

        let rebuilt = band_major_to_cube(&y, 6, 3).unwrap();
        assert_eq!(rebuilt, cube);
    }

    #[test]
    fn test_band_major_to_cube_mismatch() {
        let y = Array2::<f64>::zeros((3, 20));
        let err = band_major_to_cube(&y, 3, 5).unwrap_err();
        assert_eq!(
            err,
            TransformError::PixelCountMismatch {
                columns: 20,
                lines: 3,
                samples: 5
            }
        );
    }

    #[test]
    fn test_apply_unit_gain_is_identity() {
        let mut y = cube_to_band_major(&synthetic_cube(4, 5, 3));
        let original = y.clone();

        apply_gain(&mut y, Array1::ones(3).view()).unwrap();
        assert_eq!(y, original);
    }

    #[test]
    fn test_apply_gain_per_band() {
        let mut y = array![[10.0, 20.0], [30.0, 60.0], [8.0, 4.0]];

        apply_gain(&mut y, array![10.0, 30.0, 4.0].view()).unwrap();

        assert_eq!(y, array![[1.0, 2.0], [1.0, 2.0], [2.0, 1.0]]);
    }

    #[test]
    fn test_apply_gain_length_mismatch() {
        let mut y = Array2::<f64>::ones((3, 4));

        let err = apply_gain(&mut y, array![1.0, 2.0].view()).unwrap_err();

        assert_eq!(
            err,
            TransformError::GainLengthMismatch {
                expected: 3,
                found: 2
            }
        );
        assert_eq!(y, Array2::<f64>::ones((3, 4)));
    }

    #[test]
    fn test_check_wavelengths() {
        assert!(check_wavelengths(array![400.0, 500.0].view(), 2).is_ok());
        assert!(matches!(
            check_wavelengths(array![400.0].view(), 2),
            Err(TransformError::WavelengthLengthMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_value_range() {
        let m = array![[3.0, f64::NAN], [-1.0, 7.5]];
        assert_eq!(value_range(&m), Some((-1.0, 7.5)));
        assert_eq!(value_range(&Array2::<f64>::zeros((0, 0))), None);
    }
}
