//! Dynamically typed pixel containers.
//!
//! [`PixelArray`] owns an N-dimensional buffer of one of the eight
//! supported scalar types; [`PixelView2`] borrows a 2-D view of one.
//! Generic code reaches the typed data through [`PixelVisitor`].

use ndarray::{Array, ArrayView, ArrayView2, Dimension, Ix2, IxDyn};

use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};

/// Runs `$body` with `$array` bound to the typed payload of `$pixels`.
macro_rules! dispatch_pixels {
    ($pixels:expr, $array:ident => $body:expr) => {
        match $pixels {
            $crate::pixels::PixelArray::Int8($array) => $body,
            $crate::pixels::PixelArray::UInt8($array) => $body,
            $crate::pixels::PixelArray::Int16($array) => $body,
            $crate::pixels::PixelArray::UInt16($array) => $body,
            $crate::pixels::PixelArray::Int32($array) => $body,
            $crate::pixels::PixelArray::UInt32($array) => $body,
            $crate::pixels::PixelArray::Float32($array) => $body,
            $crate::pixels::PixelArray::Float64($array) => $body,
        }
    };
}
pub(crate) use dispatch_pixels;

/// Owned pixel buffer of one of the supported scalar types.
///
/// Decoded sub-blocks are `PixelArray<IxDyn>`; extracted planes are
/// `PixelArray<Ix2>`.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray<D: Dimension = IxDyn> {
    Int8(Array<i8, D>),
    UInt8(Array<u8, D>),
    Int16(Array<i16, D>),
    UInt16(Array<u16, D>),
    Int32(Array<i32, D>),
    UInt32(Array<u32, D>),
    Float32(Array<f32, D>),
    Float64(Array<f64, D>),
}

impl<D: Dimension> PixelArray<D> {
    /// Scalar type of the buffer.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            PixelArray::Int8(_) => DType::Int8,
            PixelArray::UInt8(_) => DType::UInt8,
            PixelArray::Int16(_) => DType::Int16,
            PixelArray::UInt16(_) => DType::UInt16,
            PixelArray::Int32(_) => DType::Int32,
            PixelArray::UInt32(_) => DType::UInt32,
            PixelArray::Float32(_) => DType::Float32,
            PixelArray::Float64(_) => DType::Float64,
        }
    }

    /// Extent of each axis.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        dispatch_pixels!(self, array => array.shape())
    }

    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        dispatch_pixels!(self, array => array.len())
    }

    /// Returns true if the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view of the buffer.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if `T` is not the buffer's scalar type.
    pub fn view_as<T: Scalar>(&self) -> Result<ArrayView<'_, T, D>> {
        T::peek(self)
            .map(Array::view)
            .ok_or(Error::TypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype(),
            })
    }

    /// Copies the buffer into an `f64` array.
    #[must_use]
    pub fn to_f64(&self) -> Array<f64, D> {
        dispatch_pixels!(self, array => array.mapv(Scalar::to_f64))
    }
}

impl PixelArray<Ix2> {
    /// Borrowed 2-D view of the buffer.
    #[must_use]
    pub fn view(&self) -> PixelView2<'_> {
        dispatch_pixels!(self, array => Scalar::wrap_view(array.view()))
    }
}

impl<T: Scalar, D: Dimension> From<Array<T, D>> for PixelArray<D> {
    fn from(array: Array<T, D>) -> Self {
        T::wrap(array)
    }
}

/// Callback that receives a typed 2-D view.
///
/// Implement this to run scalar-generic code (tiling, statistics,
/// conversion for a feature engine) on a plane of any type.
pub trait PixelVisitor<'a> {
    /// Value produced by the visit.
    type Output;

    /// Called once with the typed view.
    fn visit<T: Scalar>(self, view: ArrayView2<'a, T>) -> Self::Output;
}

/// Borrowed 2-D view of a pixel buffer.
#[derive(Debug, Clone, Copy)]
pub enum PixelView2<'a> {
    Int8(ArrayView2<'a, i8>),
    UInt8(ArrayView2<'a, u8>),
    Int16(ArrayView2<'a, i16>),
    UInt16(ArrayView2<'a, u16>),
    Int32(ArrayView2<'a, i32>),
    UInt32(ArrayView2<'a, u32>),
    Float32(ArrayView2<'a, f32>),
    Float64(ArrayView2<'a, f64>),
}

macro_rules! dispatch_view {
    ($view:expr, $inner:ident => $body:expr) => {
        match $view {
            PixelView2::Int8($inner) => $body,
            PixelView2::UInt8($inner) => $body,
            PixelView2::Int16($inner) => $body,
            PixelView2::UInt16($inner) => $body,
            PixelView2::Int32($inner) => $body,
            PixelView2::UInt32($inner) => $body,
            PixelView2::Float32($inner) => $body,
            PixelView2::Float64($inner) => $body,
        }
    };
}

macro_rules! map_view {
    ($view:expr, $inner:ident => $body:expr) => {
        match $view {
            PixelView2::Int8($inner) => PixelView2::Int8($body),
            PixelView2::UInt8($inner) => PixelView2::UInt8($body),
            PixelView2::Int16($inner) => PixelView2::Int16($body),
            PixelView2::UInt16($inner) => PixelView2::UInt16($body),
            PixelView2::Int32($inner) => PixelView2::Int32($body),
            PixelView2::UInt32($inner) => PixelView2::UInt32($body),
            PixelView2::Float32($inner) => PixelView2::Float32($body),
            PixelView2::Float64($inner) => PixelView2::Float64($body),
        }
    };
}

impl<'a> PixelView2<'a> {
    /// Scalar type of the view.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            PixelView2::Int8(_) => DType::Int8,
            PixelView2::UInt8(_) => DType::UInt8,
            PixelView2::Int16(_) => DType::Int16,
            PixelView2::UInt16(_) => DType::UInt16,
            PixelView2::Int32(_) => DType::Int32,
            PixelView2::UInt32(_) => DType::UInt32,
            PixelView2::Float32(_) => DType::Float32,
            PixelView2::Float64(_) => DType::Float64,
        }
    }

    /// `(rows, columns)` of the view.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        dispatch_view!(self, view => view.dim())
    }

    /// Swaps rows and columns without copying.
    #[must_use]
    pub fn reversed_axes(self) -> Self {
        map_view!(self, view => view.reversed_axes())
    }

    /// Typed access to the view.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if `T` is not the view's scalar type.
    pub fn typed<T: Scalar>(self) -> Result<ArrayView2<'a, T>> {
        let actual = self.dtype();
        T::peek_view(self).ok_or(Error::TypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }

    /// Hands the typed view to `visitor`.
    pub fn visit<V: PixelVisitor<'a>>(self, visitor: V) -> V::Output {
        dispatch_view!(self, view => visitor.visit(view))
    }
}
