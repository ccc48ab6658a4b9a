//! Matrix normalizers applied to the data and placeholder endmembers.

use ndarray::Array2;

use crate::config::NormalizerKind;
use crate::core::transforms::value_range;

/// A transform applied to a whole matrix.
pub trait Normalizer {
    fn transform(&self, m: &Array2<f64>) -> Array2<f64>;
}

/// Rescale a matrix to [0, 1] using its global minimum and maximum.
///
/// A constant matrix maps to zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalMinMax;

impl Normalizer for GlobalMinMax {
    fn transform(&self, m: &Array2<f64>) -> Array2<f64> {
        match value_range(m) {
            Some((lo, hi)) if hi > lo => m.mapv(|v| (v - lo) / (hi - lo)),
            Some(_) => Array2::zeros(m.raw_dim()),
            None => m.clone(),
        }
    }
}

/// Build the normalizer selected in the configuration. `None` means identity.
pub fn from_kind(kind: NormalizerKind) -> Option<Box<dyn Normalizer>> {
    match kind {
        NormalizerKind::None => None,
        NormalizerKind::GlobalMinMax => Some(Box::new(GlobalMinMax)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_global_min_max() {
        let m = array![[2.0, 4.0], [6.0, 10.0]];

        let scaled = GlobalMinMax.transform(&m);

        assert_eq!(scaled, array![[0.0, 0.25], [0.5, 1.0]]);
        // Input untouched
        assert_eq!(m[[1, 1]], 10.0);
    }

    #[test]
    fn test_global_min_max_constant() {
        let m = Array2::from_elem((2, 3), 7.0);
        assert_eq!(GlobalMinMax.transform(&m), Array2::<f64>::zeros((2, 3)));
    }

    #[test]
    fn test_from_kind() {
        assert!(from_kind(NormalizerKind::None).is_none());
        let normalizer = from_kind(NormalizerKind::GlobalMinMax).unwrap();
        assert_eq!(normalizer.transform(&array![[1.0, 3.0]]), array![[0.0, 1.0]]);
    }
}
