//! Core data types and I/O operations.

pub mod header;
pub mod loaders;
pub mod transforms;
pub mod writers;

#[cfg(test)]
pub(crate) mod test_support;

pub use header::{DataType, Endian, EnviHeader, HeaderError, Interleave};
pub use loaders::{load_gain_factors, load_wavelengths, read_subregion, LoaderError};
pub use transforms::{apply_gain, band_major_to_cube, cube_to_band_major, TransformError};
pub use writers::{save_endmembers_json, save_estimates, Estimates, WriteError};
