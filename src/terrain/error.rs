use thiserror::Error;

/// Errors reported by the terrain core.
///
/// Every fallible operation leaves the grid store in its last valid state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TerrainError {
    /// A resolution or world size with a non-positive (or non-finite) axis.
    #[error("invalid {what}: {x} x {y} (both axes must be positive)")]
    InvalidDimension { what: &'static str, x: f64, y: f64 },

    /// A replacement grid whose shape differs from the store's resolution.
    #[error("grid is {actual:?} cells but the store expects {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, TerrainError>;
