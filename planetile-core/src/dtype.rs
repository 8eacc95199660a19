//! Scalar type tags and the byte-order-aware scalar codec.
//!
//! The set of scalar types is closed: [`DType`] is matched exhaustively,
//! so the only place an unknown type tag can appear is when parsing the
//! tag string of an incoming record.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array, ArrayD, ArrayView2, Dimension, IxDyn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pixels::{dispatch_pixels, PixelArray, PixelView2};

/// Scalar type of the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum DType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DType {
    /// All supported scalar types.
    pub const ALL: [DType; 8] = [
        DType::Int8,
        DType::UInt8,
        DType::Int16,
        DType::UInt16,
        DType::Int32,
        DType::UInt32,
        DType::Float32,
        DType::Float64,
    ];

    /// Size of one scalar in bytes.
    #[must_use]
    pub const fn byte_width(self) -> usize {
        match self {
            DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Float64 => 8,
        }
    }

    /// Canonical (upper case) tag, as found in plane records.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DType::Int8 => "INT8",
            DType::UInt8 => "UINT8",
            DType::Int16 => "INT16",
            DType::UInt16 => "UINT16",
            DType::Int32 => "INT32",
            DType::UInt32 => "UINT32",
            DType::Float32 => "FLOAT32",
            DType::Float64 => "FLOAT64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = Error;

    /// Parses a type tag, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        DType::ALL
            .into_iter()
            .find(|dtype| dtype.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedDType(s.to_string()))
    }
}

impl TryFrom<String> for DType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DType> for String {
    fn from(dtype: DType) -> Self {
        dtype.name().to_string()
    }
}

/// A fixed-width scalar that can be read from and written to raw bytes.
pub trait Scalar: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    /// Type tag of this scalar.
    const DTYPE: DType;

    /// Decodes a dense run of scalars. `bytes.len()` must be a multiple of
    /// the byte width; a trailing partial scalar is ignored.
    fn decode_all(bytes: &[u8], little_endian: bool) -> Vec<Self>;

    /// Appends the byte representation of `self` to `out`.
    fn encode_into(self, little_endian: bool, out: &mut Vec<u8>);

    /// Lossless widening to `f64`.
    fn to_f64(self) -> f64;

    /// Wraps a typed array into the dynamically typed container.
    fn wrap<D: Dimension>(array: Array<Self, D>) -> PixelArray<D>;

    /// Borrows the typed array if `pixels` holds this scalar type.
    fn peek<D: Dimension>(pixels: &PixelArray<D>) -> Option<&Array<Self, D>>;

    /// Wraps a typed 2-D view into the dynamically typed view.
    fn wrap_view(view: ArrayView2<'_, Self>) -> PixelView2<'_>;

    /// Unwraps the typed view if `view` holds this scalar type.
    fn peek_view(view: PixelView2<'_>) -> Option<ArrayView2<'_, Self>>;
}

macro_rules! impl_scalar {
    ($ty:ty, $dtype:ident) => {
        impl Scalar for $ty {
            const DTYPE: DType = DType::$dtype;

            fn decode_all(bytes: &[u8], little_endian: bool) -> Vec<Self> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                bytes
                    .chunks_exact(WIDTH)
                    .map(|chunk| {
                        let mut buf = [0u8; WIDTH];
                        buf.copy_from_slice(chunk);
                        if little_endian {
                            <$ty>::from_le_bytes(buf)
                        } else {
                            <$ty>::from_be_bytes(buf)
                        }
                    })
                    .collect()
            }

            #[inline]
            fn encode_into(self, little_endian: bool, out: &mut Vec<u8>) {
                if little_endian {
                    out.extend_from_slice(&self.to_le_bytes());
                } else {
                    out.extend_from_slice(&self.to_be_bytes());
                }
            }

            #[inline]
            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            fn wrap<D: Dimension>(array: Array<Self, D>) -> PixelArray<D> {
                PixelArray::$dtype(array)
            }

            fn peek<D: Dimension>(pixels: &PixelArray<D>) -> Option<&Array<Self, D>> {
                match pixels {
                    PixelArray::$dtype(array) => Some(array),
                    _ => None,
                }
            }

            fn wrap_view(view: ArrayView2<'_, Self>) -> PixelView2<'_> {
                PixelView2::$dtype(view)
            }

            fn peek_view(view: PixelView2<'_>) -> Option<ArrayView2<'_, Self>> {
                match view {
                    PixelView2::$dtype(view) => Some(view),
                    _ => None,
                }
            }
        }
    };
}

impl_scalar!(i8, Int8);
impl_scalar!(u8, UInt8);
impl_scalar!(i16, Int16);
impl_scalar!(u16, UInt16);
impl_scalar!(i32, Int32);
impl_scalar!(u32, UInt32);
impl_scalar!(f32, Float32);
impl_scalar!(f64, Float64);

/// Decode/encode rule for one `(dtype, byte order)` pair.
///
/// For one-byte types the byte order has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarCodec {
    dtype: DType,
    little_endian: bool,
}

impl ScalarCodec {
    /// Creates a codec for the given scalar type and byte order.
    #[must_use]
    pub fn new(dtype: DType, little_endian: bool) -> Self {
        Self {
            dtype,
            little_endian,
        }
    }

    /// Creates a codec from a record's type tag.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedDType`] if the tag is unknown.
    pub fn from_tag(tag: &str, little_endian: bool) -> Result<Self> {
        Ok(Self::new(tag.parse()?, little_endian))
    }

    /// Scalar type handled by this codec.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// True if multi-byte scalars are stored least significant byte first.
    #[must_use]
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    /// Size of one scalar in bytes.
    #[must_use]
    pub fn byte_width(&self) -> usize {
        self.dtype.byte_width()
    }

    /// Number of bytes needed for a dense array of the given shape, or
    /// `None` on overflow.
    #[must_use]
    pub fn expected_len(&self, shape: &[usize]) -> Option<usize> {
        shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .and_then(|n| n.checked_mul(self.byte_width()))
    }

    /// Decodes `bytes` as a dense row-major array of the given shape.
    ///
    /// The returned array owns its buffer and does not borrow `bytes`.
    ///
    /// # Errors
    /// Returns [`Error::SizeMismatch`] if `bytes` does not hold exactly
    /// `product(shape)` scalars.
    pub fn decode(&self, bytes: &[u8], shape: &[usize]) -> Result<PixelArray> {
        let expected = self.expected_len(shape).unwrap_or(usize::MAX);
        if bytes.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        match self.dtype {
            DType::Int8 => self.decode_typed::<i8>(bytes, shape),
            DType::UInt8 => self.decode_typed::<u8>(bytes, shape),
            DType::Int16 => self.decode_typed::<i16>(bytes, shape),
            DType::UInt16 => self.decode_typed::<u16>(bytes, shape),
            DType::Int32 => self.decode_typed::<i32>(bytes, shape),
            DType::UInt32 => self.decode_typed::<u32>(bytes, shape),
            DType::Float32 => self.decode_typed::<f32>(bytes, shape),
            DType::Float64 => self.decode_typed::<f64>(bytes, shape),
        }
    }

    fn decode_typed<T: Scalar>(&self, bytes: &[u8], shape: &[usize]) -> Result<PixelArray> {
        let values = T::decode_all(bytes, self.little_endian);
        let actual = bytes.len();
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(T::wrap)
            .map_err(|_| Error::SizeMismatch {
                expected: self.expected_len(shape).unwrap_or(usize::MAX),
                actual,
            })
    }

    /// Encodes `pixels` in logical (row-major) order.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if `pixels` does not hold this
    /// codec's scalar type.
    pub fn encode<D: Dimension>(&self, pixels: &PixelArray<D>) -> Result<Vec<u8>> {
        if pixels.dtype() != self.dtype {
            return Err(Error::TypeMismatch {
                expected: self.dtype,
                actual: pixels.dtype(),
            });
        }
        let mut out = Vec::with_capacity(pixels.len() * self.byte_width());
        dispatch_pixels!(pixels, array => {
            for &value in array {
                value.encode_into(self.little_endian, &mut out);
            }
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("uint16".parse::<DType>().unwrap(), DType::UInt16);
        assert_eq!("Float32".parse::<DType>().unwrap(), DType::Float32);
        assert_eq!("INT8".parse::<DType>().unwrap(), DType::Int8);
    }

    #[test]
    fn test_unknown_tag() {
        let err = "COMPLEX64".parse::<DType>().unwrap_err();
        assert_eq!(err, Error::UnsupportedDType("COMPLEX64".into()));
        assert!(ScalarCodec::from_tag("bool", true).is_err());
    }

    #[test]
    fn test_byte_widths() {
        let widths: Vec<usize> = DType::ALL.iter().map(|d| d.byte_width()).collect();
        assert_eq!(widths, vec![1, 1, 2, 2, 4, 4, 4, 8]);
    }

    #[test]
    fn test_byte_order() {
        let bytes = [0x01, 0x02];
        assert_eq!(u16::decode_all(&bytes, true), vec![0x0201]);
        assert_eq!(u16::decode_all(&bytes, false), vec![0x0102]);
    }

    #[test]
    fn test_single_byte_ignores_byte_order() {
        let bytes = [0xff, 0x7f, 0x80];
        assert_eq!(i8::decode_all(&bytes, true), i8::decode_all(&bytes, false));
        assert_eq!(i8::decode_all(&bytes, true), vec![-1, 127, -128]);
    }

    #[test]
    fn test_float_big_endian() {
        let mut bytes = Vec::new();
        1.5f32.encode_into(false, &mut bytes);
        assert_eq!(bytes, vec![0x3f, 0xc0, 0x00, 0x00]);
        assert_eq!(f32::decode_all(&bytes, false), vec![1.5]);
    }

    #[test]
    fn test_decode_size_mismatch() {
        let codec = ScalarCodec::new(DType::Int32, true);
        let err = codec.decode(&[0u8; 7], &[2]).unwrap_err();
        assert_eq!(
            err,
            Error::SizeMismatch {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_decode_shape() {
        let codec = ScalarCodec::new(DType::UInt8, true);
        let pixels = codec.decode(&[1, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let array = u8::peek(&pixels).unwrap();
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array[IxDyn(&[1, 0])], 4);
    }

    #[test]
    fn test_encode_wrong_type() {
        let codec = ScalarCodec::new(DType::UInt8, true);
        let pixels = ScalarCodec::new(DType::UInt16, true)
            .decode(&[0, 1], &[1])
            .unwrap();
        assert!(matches!(
            codec.encode(&pixels),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
