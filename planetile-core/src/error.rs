//! Error types for planetile-core.

use thiserror::Error;

use crate::dtype::DType;

/// Result type alias for planetile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
///
/// Every variant is a data or configuration validation failure. None of
/// them is retryable: the inputs are immutable records, so the caller
/// decides whether to skip the record or abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `shape`, `offsets` and `deltas` do not have the same length.
    #[error("shape/offsets/deltas must have the same length ({shape}, {offsets}, {deltas})")]
    DimensionMismatch {
        shape: usize,
        offsets: usize,
        deltas: usize,
    },

    /// A dimension breaks `0 <= offset <= offset + delta <= shape`.
    #[error(
        "dimension {dimension}: 0 <= {offset} <= {offset} + {delta} <= {shape} is false"
    )]
    BoundaryViolation {
        dimension: usize,
        offset: usize,
        delta: usize,
        shape: usize,
    },

    /// The byte blob length does not match `product(deltas) * width`.
    #[error("unexpected data size ({actual} != {expected})")]
    SizeMismatch { expected: usize, actual: usize },

    /// Unknown scalar type tag.
    #[error("unsupported dtype: {0:?}")]
    UnsupportedDType(String),

    /// Dimension order is not a permutation of `XYZCT`.
    #[error("dimension order must be a permutation of \"XYZCT\", got {0:?}")]
    InvalidDimensionOrder(String),

    /// Decoded array rank does not match the dimension order.
    #[error("expected a {expected}-dimensional array, got {actual} dimensions")]
    RankMismatch { expected: usize, actual: usize },

    /// The record spans more than one Z/C/T position.
    #[error("data is not flat along the zct dimensions (dz={z}, dc={c}, dt={t})")]
    NonFlatPlane { z: usize, c: usize, t: usize },

    /// Typed access with a scalar type that differs from the buffer's.
    #[error("buffer holds {actual} values, requested {expected}")]
    TypeMismatch { expected: DType, actual: DType },

    /// The plane has no pixels along X or Y.
    #[error("plane has no pixels ({size_x} x {size_y})")]
    EmptyPlane { size_x: usize, size_y: usize },

    /// Resolved tile size is smaller than 1 x 1.
    #[error("smallest tile size is 1 x 1, got {width} x {height}")]
    InvalidTileSize { width: usize, height: usize },

    /// Resolved tile stride is smaller than 1.
    #[error("smallest distance between tiles is 1, got dx={dx}, dy={dy}")]
    InvalidStride { dx: usize, dy: usize },
}

impl Error {
    /// Returns true for errors caused by the input record rather than by
    /// the caller's tiling configuration.
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        !matches!(
            self,
            Error::InvalidTileSize { .. } | Error::InvalidStride { .. } | Error::TypeMismatch { .. }
        )
    }
}
