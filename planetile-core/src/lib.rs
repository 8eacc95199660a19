//! planetile-core: Decoding and tiling of serialized image planes.
//!
//! This crate turns a serialized sub-block of a 5-D (X, Y, Z, C, T)
//! image volume into a typed 2-D plane and splits that plane into tiles
//! for feature computation:
//!
//! - [`ScalarCodec`] - byte-order-aware scalar decoding for eight dtypes
//! - [`slice::decode`] - validated reconstruction of an N-d buffer
//! - [`Plane::extract`] - single-plane check and X/Y view
//! - [`gen_tiles`] - lazy, zero-copy tiling of a 2-D view
//! - [`TileSummary`] - distinct values across tile descriptors
//!
//! All operations are pure and synchronous; planes from different records
//! can be processed from different threads without coordination.

pub mod dtype;
pub mod error;
pub mod pixels;
pub mod plane;
pub mod slice;
pub mod summary;
pub mod tiles;

pub use dtype::{DType, Scalar, ScalarCodec};
pub use error::{Error, Result};
pub use pixels::{PixelArray, PixelView2, PixelVisitor};
pub use plane::{Dimension, DimensionOrder, Plane, RawPlaneRecord};
pub use slice::{decode, DecodedArray, RawArraySlice};
pub use summary::TileSummary;
pub use tiles::{
    gen_tiles, tile_records, Tile, TileGeometry, TileParams, TilePositions, TileRecord, Tiles,
};
