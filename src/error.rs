//! Error types for rasterization, solving and export.

use thiserror::Error;

/// Errors raised while building or exporting a terrain.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// The solver reached a level whose rasterized seed data was never produced.
    /// This is an ordering bug in the caller and invalidates the whole solve.
    #[error("no rasterized data for grid width {width}")]
    MissingRasterizedLevel { width: usize },

    #[error("invalid spline: {0}")]
    InvalidSpline(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("raw buffer holds {actual} bytes, expected {expected}")]
    RawSizeMismatch { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scene parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, TerrainError>;
