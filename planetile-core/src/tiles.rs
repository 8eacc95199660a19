//! Tile generation over 2-D planes.
//!
//! Tile origins follow a fixed grid: rows start at `oy, oy + dy, ...`
//! while below `min(H, H - h + dy)`, columns at `ox, ox + dx, ...` while
//! below `min(W, W - w + dx)`. Tiles that would cross the far edge are
//! clipped. With a stride larger than the tile, the grid can leave gaps
//! and an uncovered tail.
#![allow(clippy::module_name_repetitions)]

use ndarray::{s, ArrayView2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dtype::Scalar;
use crate::error::{Error, Result};
use crate::pixels::PixelVisitor;
use crate::plane::Plane;

/// Tiling configuration. Unset fields fall back to a single tile
/// covering the whole plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileParams {
    /// Tile width (default and upper limit: plane width).
    pub width: Option<usize>,
    /// Tile height (default and upper limit: plane height).
    pub height: Option<usize>,
    /// Horizontal distance between tile origins (default: tile width).
    pub dx: Option<usize>,
    /// Vertical distance between tile origins (default: tile height).
    pub dy: Option<usize>,
    /// Column of the first tile (default: 0).
    pub ox: Option<usize>,
    /// Row of the first tile (default: 0).
    pub oy: Option<usize>,
}

impl TileParams {
    /// Whole-plane tiling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tile size.
    #[must_use]
    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the distance between consecutive tile origins.
    #[must_use]
    pub fn with_stride(mut self, dx: usize, dy: usize) -> Self {
        self.dx = Some(dx);
        self.dy = Some(dy);
        self
    }

    /// Set the origin of the first tile.
    #[must_use]
    pub fn with_offset(mut self, ox: usize, oy: usize) -> Self {
        self.ox = Some(ox);
        self.oy = Some(oy);
        self
    }

    /// Resolves defaults against a plane of `rows` x `cols` pixels.
    ///
    /// # Errors
    /// [`Error::InvalidTileSize`] if the resolved tile is smaller than
    /// 1 x 1, [`Error::InvalidStride`] if a resolved stride is 0.
    pub fn resolve(&self, rows: usize, cols: usize) -> Result<TileGeometry> {
        let width = self.width.filter(|&w| w <= cols).unwrap_or(cols);
        let height = self.height.filter(|&h| h <= rows).unwrap_or(rows);
        let dx = self.dx.unwrap_or(width);
        let dy = self.dy.unwrap_or(height);
        if width < 1 || height < 1 {
            return Err(Error::InvalidTileSize { width, height });
        }
        if dx < 1 || dy < 1 {
            return Err(Error::InvalidStride { dx, dy });
        }
        Ok(TileGeometry {
            rows,
            cols,
            width,
            height,
            dx,
            dy,
            ox: self.ox.unwrap_or(0),
            oy: self.oy.unwrap_or(0),
        })
    }
}

/// Fully resolved tiling of a `rows` x `cols` plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub rows: usize,
    pub cols: usize,
    pub width: usize,
    pub height: usize,
    pub dx: usize,
    pub dy: usize,
    pub ox: usize,
    pub oy: usize,
}

impl TileGeometry {
    /// Exclusive upper bound on tile row origins.
    #[must_use]
    pub fn row_bound(&self) -> usize {
        self.rows
            .min(self.rows.saturating_sub(self.height).saturating_add(self.dy))
    }

    /// Exclusive upper bound on tile column origins.
    #[must_use]
    pub fn col_bound(&self) -> usize {
        self.cols
            .min(self.cols.saturating_sub(self.width).saturating_add(self.dx))
    }

    /// Number of tile rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        steps(self.oy, self.row_bound(), self.dy)
    }

    /// Number of tile columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        steps(self.ox, self.col_bound(), self.dx)
    }

    /// Total number of tiles.
    #[must_use]
    pub fn count(&self) -> usize {
        self.n_rows() * self.n_cols()
    }

    /// Tile origins `(row, col)` in row-major order.
    #[must_use]
    pub fn positions(&self) -> TilePositions {
        TilePositions {
            geometry: *self,
            row: self.oy,
            col: self.ox,
        }
    }

    /// Number of plane rows covered by at least one tile.
    #[must_use]
    pub fn covered_rows(&self) -> usize {
        axis_coverage(self.oy, self.row_bound(), self.dy, self.height, self.rows)
    }

    /// Number of plane columns covered by at least one tile.
    #[must_use]
    pub fn covered_cols(&self) -> usize {
        axis_coverage(self.ox, self.col_bound(), self.dx, self.width, self.cols)
    }

    /// Number of plane pixels covered by at least one tile. The grid is
    /// separable, so this is covered rows times covered columns.
    #[must_use]
    pub fn covered_pixels(&self) -> u128 {
        self.covered_rows() as u128 * self.covered_cols() as u128
    }

    /// Fraction of the plane covered by at least one tile.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self) -> f64 {
        let rows = self.covered_rows() as f64 / self.rows.max(1) as f64;
        let cols = self.covered_cols() as f64 / self.cols.max(1) as f64;
        rows * cols
    }

    /// Clipped `(height, width)` of the tile at `(row, col)`.
    #[must_use]
    pub fn tile_dim(&self, row: usize, col: usize) -> (usize, usize) {
        (
            self.height.min(self.rows - row),
            self.width.min(self.cols - col),
        )
    }
}

/// Number of values `start, start + step, ...` below `bound`.
fn steps(start: usize, bound: usize, step: usize) -> usize {
    if start >= bound {
        0
    } else {
        (bound - start - 1) / step + 1
    }
}

/// Length of the union of `[i, min(i + len, extent))` over the tile
/// origins `i = start, start + step, ...` below `bound`.
fn axis_coverage(start: usize, bound: usize, step: usize, len: usize, extent: usize) -> usize {
    let n = steps(start, bound, step);
    if n == 0 {
        return 0;
    }
    let last = start + (n - 1) * step;
    if len >= step {
        // Consecutive tiles touch or overlap: one run.
        last.saturating_add(len).min(extent) - start
    } else {
        // Disjoint tiles; only the last one can reach the far edge.
        (n - 1) * len + len.min(extent - last)
    }
}

/// Iterator over tile origins, see [`TileGeometry::positions`].
#[derive(Debug, Clone)]
pub struct TilePositions {
    geometry: TileGeometry,
    row: usize,
    col: usize,
}

impl Iterator for TilePositions {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let g = &self.geometry;
        if self.row >= g.row_bound() || g.ox >= g.col_bound() {
            return None;
        }
        let position = (self.row, self.col);
        self.col = self.col.saturating_add(g.dx);
        if self.col >= g.col_bound() {
            self.col = g.ox;
            self.row = self.row.saturating_add(g.dy);
        }
        Some(position)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let g = &self.geometry;
        let rows_left = steps(self.row, g.row_bound(), g.dy);
        let remaining = if rows_left == 0 {
            0
        } else {
            (rows_left - 1) * g.n_cols() + steps(self.col, g.col_bound(), g.dx)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TilePositions {}

/// A rectangular window into a plane.
///
/// `pixels` borrows the plane's buffer; copy it (e.g. with `to_owned`)
/// to keep it beyond the plane's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct Tile<'a, T> {
    /// Row of the tile's top-left pixel.
    pub row_offset: usize,
    /// Column of the tile's top-left pixel.
    pub col_offset: usize,
    /// The tile's pixels.
    pub pixels: ArrayView2<'a, T>,
}

impl<T> Tile<'_, T> {
    /// `(height, width)` of the tile after clipping.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }
}

/// Lazy tile sequence over a 2-D view, see [`gen_tiles`].
#[derive(Debug, Clone)]
pub struct Tiles<'a, T> {
    source: ArrayView2<'a, T>,
    geometry: TileGeometry,
    positions: TilePositions,
}

impl<T> Tiles<'_, T> {
    /// Resolved tiling parameters.
    #[must_use]
    pub fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }
}

impl<'a, T> Iterator for Tiles<'a, T> {
    type Item = Tile<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let (i, j) = self.positions.next()?;
        let (h, w) = self.geometry.tile_dim(i, j);
        Some(Tile {
            row_offset: i,
            col_offset: j,
            pixels: self.source.slice_move(s![i..i + h, j..j + w]),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<T> ExactSizeIterator for Tiles<'_, T> {}

/// Splits a `H` x `W` view into tiles, in row-major order of their origins.
///
/// Parameters are resolved by [`TileParams::resolve`] before any tile is
/// produced. The sequence is deterministic: calling again with the same
/// arguments yields the same tiles.
///
/// # Errors
/// [`Error::InvalidTileSize`] or [`Error::InvalidStride`].
pub fn gen_tiles<'a, T>(plane: ArrayView2<'a, T>, params: &TileParams) -> Result<Tiles<'a, T>> {
    let (rows, cols) = plane.dim();
    let geometry = params.resolve(rows, cols)?;
    Ok(Tiles {
        source: plane,
        geometry,
        positions: geometry.positions(),
    })
}

/// Tile descriptor handed to a feature-computation engine: the plane's
/// identifying metadata plus the tile's position and size.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileRecord {
    pub name: String,
    pub series: u32,
    pub z: usize,
    pub c: usize,
    pub t: usize,
    /// Column offset of the tile.
    pub x: usize,
    /// Row offset of the tile.
    pub y: usize,
    pub w: usize,
    pub h: usize,
    /// Row-major copy of the tile's pixels, if requested.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub pixels: Option<Vec<f64>>,
}

struct RecordVisitor<'p> {
    plane: &'p Plane,
    params: &'p TileParams,
    with_pixels: bool,
}

impl<'a> PixelVisitor<'a> for RecordVisitor<'_> {
    type Output = Result<Vec<TileRecord>>;

    fn visit<T: Scalar>(self, view: ArrayView2<'a, T>) -> Self::Output {
        let tiles = gen_tiles(view, self.params)?;
        Ok(tiles
            .map(|tile| {
                let (h, w) = tile.dim();
                TileRecord {
                    name: self.plane.name().to_string(),
                    series: self.plane.series(),
                    z: self.plane.z(),
                    c: self.plane.c(),
                    t: self.plane.t(),
                    x: tile.col_offset,
                    y: tile.row_offset,
                    w,
                    h,
                    pixels: self
                        .with_pixels
                        .then(|| tile.pixels.iter().map(|&v| v.to_f64()).collect()),
                }
            })
            .collect())
    }
}

/// Tiles a plane oriented with rows along Y and columns along X and
/// describes each tile.
///
/// # Errors
/// [`Error::EmptyPlane`] if the plane has no pixels, otherwise
/// [`Error::InvalidTileSize`] or [`Error::InvalidStride`].
pub fn tile_records(
    plane: &Plane,
    params: &TileParams,
    with_pixels: bool,
) -> Result<Vec<TileRecord>> {
    if plane.size_x() == 0 || plane.size_y() == 0 {
        return Err(Error::EmptyPlane {
            size_x: plane.size_x(),
            size_y: plane.size_y(),
        });
    }
    let records = plane.yx_view().visit(RecordVisitor {
        plane,
        params,
        with_pixels,
    })?;
    log::debug!("{}: {} tiles", plane.tag(), records.len());
    Ok(records)
}
