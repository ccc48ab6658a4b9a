//! Data processing modules.

pub mod dataset;
pub mod normalizers;
pub mod pipeline;

// Re-export key types for convenience
pub use dataset::{DatasetError, DatasetMatrices, HyperspectralDataset, Matrices, Representation};
pub use normalizers::{GlobalMinMax, Normalizer};
pub use pipeline::{load_and_reshape, PipelineError, Reshaped};
