//! Raw array slices and their decoding into typed buffers.
//!
//! A [`RawArraySlice`] describes a dense sub-block of a larger logical
//! volume: `shape` is the extent of the volume, `offsets` the position of
//! the sub-block inside it and `deltas` the extent of the sub-block. The
//! `data` blob holds the sub-block in row-major order.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use ndarray::{ArrayD, ArrayViewD};

use crate::dtype::{DType, Scalar, ScalarCodec};
use crate::error::{Error, Result};
use crate::pixels::PixelArray;

/// Serialized N-dimensional sub-block, as produced by a container reader.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawArraySlice {
    /// Full extent of each dimension in the logical volume.
    pub shape: Vec<usize>,
    /// Start of the sub-block along each dimension.
    pub offsets: Vec<usize>,
    /// Extent of the sub-block along each dimension.
    pub deltas: Vec<usize>,
    /// Scalar type tag, e.g. `"UINT16"` (case-insensitive).
    pub dtype: String,
    /// Byte order of multi-byte scalars in `data`.
    pub little_endian: bool,
    /// Row-major scalar data of the sub-block.
    pub data: Vec<u8>,
}

impl RawArraySlice {
    /// Serializes a typed array as a sub-block of a volume of extent
    /// `shape` starting at `offsets`.
    ///
    /// # Errors
    /// Fails with the same errors as [`decode`] if the array does not fit
    /// the volume.
    pub fn encode(
        pixels: &PixelArray,
        shape: Vec<usize>,
        offsets: Vec<usize>,
        little_endian: bool,
    ) -> Result<Self> {
        let deltas = pixels.shape().to_vec();
        check_boundaries(&shape, &offsets, &deltas)?;
        let data = ScalarCodec::new(pixels.dtype(), little_endian).encode(pixels)?;
        Ok(Self {
            shape,
            offsets,
            deltas,
            dtype: pixels.dtype().name().to_string(),
            little_endian,
            data,
        })
    }

    /// Serializes an array that spans a whole volume (all offsets zero).
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] only if the codec and buffer
    /// disagree, which cannot happen for a freshly built array.
    pub fn encode_whole(pixels: &PixelArray, little_endian: bool) -> Result<Self> {
        let shape = pixels.shape().to_vec();
        let offsets = vec![0; shape.len()];
        Self::encode(pixels, shape, offsets, little_endian)
    }
}

/// Checks that `shape`, `offsets` and `deltas` describe a valid sub-block.
///
/// Dimensions are checked in ascending order, so the reported dimension is
/// always the first offending one.
fn check_boundaries(shape: &[usize], offsets: &[usize], deltas: &[usize]) -> Result<()> {
    if offsets.len() != shape.len() || deltas.len() != shape.len() {
        return Err(Error::DimensionMismatch {
            shape: shape.len(),
            offsets: offsets.len(),
            deltas: deltas.len(),
        });
    }
    for (dimension, ((&s, &o), &d)) in shape.iter().zip(offsets).zip(deltas).enumerate() {
        let fits = o.checked_add(d).is_some_and(|end| end <= s);
        if !fits {
            return Err(Error::BoundaryViolation {
                dimension,
                offset: o,
                delta: d,
                shape: s,
            });
        }
    }
    Ok(())
}

/// A validated, typed sub-block shaped exactly as its `deltas`.
///
/// The pixel buffer is owned and does not borrow the raw bytes it was
/// decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    shape: Vec<usize>,
    offsets: Vec<usize>,
    deltas: Vec<usize>,
    little_endian: bool,
    pixels: PixelArray,
}

impl DecodedArray {
    /// Validates and decodes a raw slice. See [`decode`].
    ///
    /// # Errors
    /// See [`decode`].
    pub fn decode(raw: &RawArraySlice) -> Result<Self> {
        check_boundaries(&raw.shape, &raw.offsets, &raw.deltas)?;
        let codec = ScalarCodec::from_tag(&raw.dtype, raw.little_endian)?;
        let pixels = codec.decode(&raw.data, &raw.deltas)?;
        log::debug!(
            "decoded {} slice: shape={:?} offsets={:?} deltas={:?}",
            codec.dtype(),
            raw.shape,
            raw.offsets,
            raw.deltas
        );
        Ok(Self {
            shape: raw.shape.clone(),
            offsets: raw.offsets.clone(),
            deltas: raw.deltas.clone(),
            little_endian: raw.little_endian,
            pixels,
        })
    }

    /// Builds a decoded array from a typed block placed at `offsets`
    /// inside a volume of extent `shape`. Byte order defaults to little
    /// endian.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] or [`Error::BoundaryViolation`].
    pub fn from_block<T: Scalar>(
        block: ArrayD<T>,
        shape: Vec<usize>,
        offsets: Vec<usize>,
    ) -> Result<Self> {
        let deltas = block.shape().to_vec();
        check_boundaries(&shape, &offsets, &deltas)?;
        Ok(Self {
            shape,
            offsets,
            deltas,
            little_endian: true,
            pixels: block.into(),
        })
    }

    /// Full extent of each dimension in the logical volume.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Start of the sub-block along each dimension.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Extent of the sub-block along each dimension.
    #[must_use]
    pub fn deltas(&self) -> &[usize] {
        &self.deltas
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.deltas.len()
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.pixels.dtype()
    }

    #[must_use]
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    /// The decoded buffer.
    #[must_use]
    pub fn pixels(&self) -> &PixelArray {
        &self.pixels
    }

    /// Typed view of the decoded buffer.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if `T` is not the decoded type.
    pub fn as_array<T: Scalar>(&self) -> Result<ArrayViewD<'_, T>> {
        self.pixels.view_as()
    }

    /// Consumes the array and returns the typed buffer.
    #[must_use]
    pub fn into_pixels(self) -> PixelArray {
        self.pixels
    }

    /// Re-serializes the array with its original byte order.
    ///
    /// # Errors
    /// Cannot fail for an array built by [`decode`]; the result type is
    /// shared with [`RawArraySlice::encode`].
    pub fn encode(&self) -> Result<RawArraySlice> {
        RawArraySlice::encode(
            &self.pixels,
            self.shape.clone(),
            self.offsets.clone(),
            self.little_endian,
        )
    }
}

/// Validates a raw slice and materializes it as a typed buffer.
///
/// Checks run in this order: dimension count, per-dimension boundaries
/// (ascending), scalar type tag, byte length.
///
/// # Errors
/// [`Error::DimensionMismatch`], [`Error::BoundaryViolation`],
/// [`Error::UnsupportedDType`] or [`Error::SizeMismatch`].
pub fn decode(raw: &RawArraySlice) -> Result<DecodedArray> {
    DecodedArray::decode(raw)
}
