//! Plane extraction from 5-D (X, Y, Z, C, T) image records.
#![allow(clippy::module_name_repetitions)]

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayD, ArrayView2, Axis, Ix2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};
use crate::pixels::{dispatch_pixels, PixelArray, PixelView2};
use crate::slice::{DecodedArray, RawArraySlice};

/// One serialized image plane, as produced by a container reader.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawPlaneRecord {
    /// Image name.
    pub name: String,
    /// Axis order of `pixel_data`, a permutation of `"XYZCT"`.
    pub dimension_order: String,
    /// Series index within the source image file.
    pub series: u32,
    /// The pixel sub-block.
    pub pixel_data: RawArraySlice,
}

/// The five logical axes of an image volume, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    X,
    Y,
    Z,
    C,
    T,
}

impl Dimension {
    /// Canonical axis order.
    pub const CANONICAL: [Dimension; 5] = [
        Dimension::X,
        Dimension::Y,
        Dimension::Z,
        Dimension::C,
        Dimension::T,
    ];

    /// Axis letter.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Dimension::X => 'X',
            Dimension::Y => 'Y',
            Dimension::Z => 'Z',
            Dimension::C => 'C',
            Dimension::T => 'T',
        }
    }
}

/// A validated permutation of `XYZCT` with its axis positions resolved.
///
/// `indices()[k]` is the position of canonical axis `k` (X, Y, Z, C, T)
/// within the order string. It is computed once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionOrder {
    order: [u8; 5],
    indices: [usize; 5],
}

impl DimensionOrder {
    /// The canonical order, `XYZCT`.
    pub const CANONICAL: &'static str = "XYZCT";

    /// Position of each canonical axis, in X, Y, Z, C, T order.
    #[must_use]
    pub fn indices(&self) -> [usize; 5] {
        self.indices
    }

    /// Position of `dim` within the order.
    #[must_use]
    pub fn index_of(&self, dim: Dimension) -> usize {
        self.indices[dim as usize]
    }

    /// Positions of the Z, C and T axes.
    #[must_use]
    pub fn zct_indices(&self) -> [usize; 3] {
        [self.indices[2], self.indices[3], self.indices[4]]
    }

    /// True if the Y axis comes before the X axis, i.e. a 2-D view of the
    /// plane has rows along Y.
    #[must_use]
    pub fn is_row_major_yx(&self) -> bool {
        self.indices[1] < self.indices[0]
    }

    /// The order as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII axis letters are ever stored.
        std::str::from_utf8(&self.order).unwrap_or(Self::CANONICAL)
    }
}

impl FromStr for DimensionOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDimensionOrder(s.to_string());
        let bytes: [u8; 5] = s.as_bytes().try_into().map_err(|_| invalid())?;
        let mut indices = [0usize; 5];
        for (k, dim) in Dimension::CANONICAL.iter().enumerate() {
            let letter = dim.letter() as u8;
            indices[k] = bytes.iter().position(|&b| b == letter).ok_or_else(invalid)?;
        }
        // Five distinct letters found in five bytes: a permutation.
        Ok(Self {
            order: bytes,
            indices,
        })
    }
}

impl fmt::Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single 2-D optical plane with its Z/C/T coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    name: String,
    series: u32,
    order: DimensionOrder,
    z: usize,
    c: usize,
    t: usize,
    shape: Vec<usize>,
    offsets: Vec<usize>,
    deltas: Vec<usize>,
    pixels: PixelArray<Ix2>,
}

impl Plane {
    /// Decodes a record and checks that it holds exactly one plane.
    ///
    /// # Errors
    /// [`Error::InvalidDimensionOrder`], any decode error from
    /// [`crate::slice::decode`], [`Error::RankMismatch`] if the array does
    /// not have five axes, or [`Error::NonFlatPlane`].
    pub fn extract(record: &RawPlaneRecord) -> Result<Self> {
        let order: DimensionOrder = record.dimension_order.parse()?;
        let array = DecodedArray::decode(&record.pixel_data)?;
        Self::from_decoded(record.name.clone(), record.series, order, array)
    }

    /// Wraps an already decoded array.
    ///
    /// # Errors
    /// [`Error::RankMismatch`] or [`Error::NonFlatPlane`].
    pub fn from_decoded(
        name: String,
        series: u32,
        order: DimensionOrder,
        array: DecodedArray,
    ) -> Result<Self> {
        if array.ndim() != Dimension::CANONICAL.len() {
            return Err(Error::RankMismatch {
                expected: Dimension::CANONICAL.len(),
                actual: array.ndim(),
            });
        }
        let [iz, ic, it] = order.zct_indices();
        let deltas = array.deltas();
        if deltas[iz] != 1 || deltas[ic] != 1 || deltas[it] != 1 {
            return Err(Error::NonFlatPlane {
                z: deltas[iz],
                c: deltas[ic],
                t: deltas[it],
            });
        }
        let offsets = array.offsets();
        let (z, c, t) = (offsets[iz], offsets[ic], offsets[it]);
        let shape = array.shape().to_vec();
        let offsets = offsets.to_vec();
        let deltas = deltas.to_vec();
        let mut fixed = [iz, ic, it];
        fixed.sort_unstable();
        let pixels = dispatch_pixels!(array.into_pixels(), block => {
            PixelArray::from(drop_axes(block, fixed)?)
        });
        log::debug!("plane {name}: order={order} z={z} c={c} t={t}");
        Ok(Self {
            name,
            series,
            order,
            z,
            c,
            t,
            shape,
            offsets,
            deltas,
            pixels,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn series(&self) -> u32 {
        self.series
    }

    #[must_use]
    pub fn dimension_order(&self) -> &DimensionOrder {
        &self.order
    }

    /// Position of X, Y, Z, C, T within the dimension order.
    #[must_use]
    pub fn indices(&self) -> [usize; 5] {
        self.order.indices()
    }

    /// Absolute Z coordinate within the volume.
    #[must_use]
    pub fn z(&self) -> usize {
        self.z
    }

    /// Absolute channel index within the volume.
    #[must_use]
    pub fn c(&self) -> usize {
        self.c
    }

    /// Absolute time point within the volume.
    #[must_use]
    pub fn t(&self) -> usize {
        self.t
    }

    /// Extent of the plane along X.
    #[must_use]
    pub fn size_x(&self) -> usize {
        self.deltas[self.order.index_of(Dimension::X)]
    }

    /// Extent of the plane along Y.
    #[must_use]
    pub fn size_y(&self) -> usize {
        self.deltas[self.order.index_of(Dimension::Y)]
    }

    /// Full extent of the source volume, in dimension order.
    #[must_use]
    pub fn volume_shape(&self) -> &[usize] {
        &self.shape
    }

    /// Position of the plane's sub-block in the volume, in dimension order.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Extent of the plane's sub-block, in dimension order.
    #[must_use]
    pub fn deltas(&self) -> &[usize] {
        &self.deltas
    }

    /// Scalar type of the pixels.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.pixels.dtype()
    }

    /// The 2-D pixel buffer, axes as in [`Plane::xy_view`].
    #[must_use]
    pub fn pixels(&self) -> &PixelArray<Ix2> {
        &self.pixels
    }

    /// Per-plane tag, `"{name}-z{z:04}-c{c:04}-t{t:04}"`.
    #[must_use]
    pub fn tag(&self) -> String {
        format!(
            "{}-z{:04}-c{:04}-t{:04}",
            self.name, self.z, self.c, self.t
        )
    }

    /// 2-D view over the X and Y axes, in the order they appear in the
    /// dimension order. Rows run along X when X precedes Y.
    #[must_use]
    pub fn xy_view(&self) -> PixelView2<'_> {
        self.pixels.view()
    }

    /// 2-D view with rows along Y and columns along X, whatever the
    /// dimension order.
    #[must_use]
    pub fn yx_view(&self) -> PixelView2<'_> {
        let view = self.xy_view();
        if self.order.is_row_major_yx() {
            view
        } else {
            view.reversed_axes()
        }
    }

    /// Typed version of [`Plane::xy_view`].
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if `T` is not the plane's scalar type.
    pub fn xy<T: Scalar>(&self) -> Result<ArrayView2<'_, T>> {
        self.xy_view().typed()
    }
}

/// Drops the Z, C and T axes (each of extent 1, positions ascending)
/// from a 5-D block, keeping the X/Y axes in their original order. The
/// buffer is reused, not copied.
fn drop_axes<T>(block: ArrayD<T>, fixed: [usize; 3]) -> Result<Array2<T>> {
    let mut reduced = block;
    for &axis in fixed.iter().rev() {
        reduced = reduced.index_axis_move(Axis(axis), 0);
    }
    let actual = reduced.ndim();
    reduced
        .into_dimensionality::<Ix2>()
        .map_err(|_| Error::RankMismatch {
            expected: 2,
            actual,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn record(order: &str, shape: &[usize], offsets: &[usize], deltas: &[usize]) -> RawPlaneRecord {
        let n: usize = deltas.iter().product();
        let block = ArrayD::from_shape_vec(IxDyn(deltas), (0..n).map(|v| v as u16).collect())
            .unwrap();
        RawPlaneRecord {
            name: "foo".into(),
            dimension_order: order.into(),
            series: 2,
            pixel_data: RawArraySlice::encode(
                &block.into(),
                shape.to_vec(),
                offsets.to_vec(),
                false,
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_dimension_order_indices() {
        let order: DimensionOrder = "XYTZC".parse().unwrap();
        assert_eq!(order.indices(), [0, 1, 3, 4, 2]);
        assert_eq!(order.index_of(Dimension::T), 2);
        assert_eq!(order.to_string(), "XYTZC");
    }

    #[test]
    fn test_invalid_dimension_orders() {
        for bad in ["", "XYZC", "XYZCTT", "XYZCC", "xyzct", "XYZCQ", "ABCDE"] {
            assert_eq!(
                bad.parse::<DimensionOrder>().unwrap_err(),
                Error::InvalidDimensionOrder(bad.to_string()),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_non_flat_then_flat() {
        let shape = [32, 16, 2, 3, 4];
        let offsets = [4, 8, 1, 2, 1];
        let r = record("XYTZC", &shape, &offsets, &[10, 6, 1, 1, 2]);
        assert_eq!(
            Plane::extract(&r).unwrap_err(),
            Error::NonFlatPlane { z: 1, c: 2, t: 1 }
        );

        let r = record("XYTZC", &shape, &offsets, &[10, 6, 1, 1, 1]);
        let plane = Plane::extract(&r).unwrap();
        assert_eq!(plane.name(), "foo");
        assert_eq!(plane.series(), 2);
        assert_eq!(plane.dimension_order().as_str(), "XYTZC");
        assert_eq!((plane.z(), plane.c(), plane.t()), (2, 1, 1));
        assert_eq!((plane.size_x(), plane.size_y()), (10, 6));
        assert_eq!(plane.tag(), "foo-z0002-c0001-t0001");
    }

    #[test]
    fn test_order_checked_before_decoding() {
        let mut r = record("XYZCT", &[4, 4, 1, 1, 1], &[0, 0, 0, 0, 0], &[4, 4, 1, 1, 1]);
        r.dimension_order = "XYZ".into();
        r.pixel_data.data.clear();
        assert!(matches!(
            Plane::extract(&r),
            Err(Error::InvalidDimensionOrder(_))
        ));
    }

    #[test]
    fn test_rank_mismatch() {
        let r = record("XYZCT", &[4, 4, 1, 1], &[0, 0, 0, 0], &[4, 4, 1, 1]);
        assert_eq!(
            Plane::extract(&r).unwrap_err(),
            Error::RankMismatch {
                expected: 5,
                actual: 4
            }
        );
    }

    #[test]
    fn test_xy_view_keeps_original_axis_order() {
        // X first: rows of the view run along X.
        let r = record("XYZCT", &[3, 2, 1, 1, 1], &[0, 0, 0, 0, 0], &[3, 2, 1, 1, 1]);
        let plane = Plane::extract(&r).unwrap();
        let xy = plane.xy::<u16>().unwrap();
        assert_eq!(xy.dim(), (3, 2));
        assert_eq!(xy[[2, 1]], 5);

        let yx = plane.yx_view().typed::<u16>().unwrap();
        assert_eq!(yx.dim(), (2, 3));
        assert_eq!(yx[[1, 2]], 5);
    }

    #[test]
    fn test_axes_interleaved_with_zct() {
        // Z sits between Y and X: deltas [Z=1, Y=2, C=1, X=3, T=1].
        let r = record("ZYCXT", &[5, 2, 2, 3, 7], &[4, 0, 1, 0, 6], &[1, 2, 1, 3, 1]);
        let plane = Plane::extract(&r).unwrap();
        assert_eq!((plane.z(), plane.c(), plane.t()), (4, 1, 6));
        assert!(plane.dimension_order().is_row_major_yx());
        let yx = plane.yx_view().typed::<u16>().unwrap();
        assert_eq!(yx.dim(), (2, 3));
        assert_eq!(yx.row(1).to_vec(), vec![3, 4, 5]);
    }

    #[test]
    fn test_wrong_scalar_type() {
        let r = record("XYZCT", &[2, 2, 1, 1, 1], &[0, 0, 0, 0, 0], &[2, 2, 1, 1, 1]);
        let plane = Plane::extract(&r).unwrap();
        assert_eq!(
            plane.xy::<f32>().unwrap_err(),
            Error::TypeMismatch {
                expected: DType::Float32,
                actual: DType::UInt16
            }
        );
    }
}
