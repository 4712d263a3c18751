use std::fmt;
use std::ops::Range;

use ndarray::Array1;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;

use super::Index;
use super::IndexingExtent;
use crate::error::NdlocaleError;
use crate::error::Result;

/// One side of an axis: the low-index side or the high-index side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Lo,
    Hi,
}

impl Side {
    pub fn all() -> [Side; 2] {
        [Side::Lo, Side::Hi]
    }

    /// Column of this side in a `ndim x 2` halo matrix.
    pub fn col(self) -> usize {
        match self {
            Side::Lo => 0,
            Side::Hi => 1,
        }
    }
}

/// Halo widths as accepted from configuration: a single count applied to
/// every axis and side, a per-axis count applied to both sides, or the
/// full per-axis per-side matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HaloSpec {
    Uniform(Index),
    PerAxis(Vec<Index>),
    PerSide(Vec<[Index; 2]>),
}

impl Default for HaloSpec {
    fn default() -> Self {
        HaloSpec::Uniform(0)
    }
}

impl From<Index> for HaloSpec {
    fn from(width: Index) -> Self {
        HaloSpec::Uniform(width)
    }
}

impl From<Vec<[Index; 2]>> for HaloSpec {
    fn from(matrix: Vec<[Index; 2]>) -> Self {
        HaloSpec::PerSide(matrix)
    }
}

impl HaloSpec {
    /// Normalises to a `ndim x 2` matrix, column 0 the low side and
    /// column 1 the high side. Rejects negative widths and axis-count
    /// mismatches.
    pub fn to_matrix(&self, ndim: usize) -> Result<Array2<Index>> {
        let mut matrix = Array2::zeros((ndim, 2));
        match self {
            HaloSpec::Uniform(w) => {
                matrix.fill(*w);
            }
            HaloSpec::PerAxis(widths) => {
                if widths.len() != ndim {
                    return Err(NdlocaleError::config(
                        0,
                        format!("halo has {} axes, extent has {}", widths.len(), ndim),
                    ));
                }
                for (a, &w) in widths.iter().enumerate() {
                    matrix[[a, 0]] = w;
                    matrix[[a, 1]] = w;
                }
            }
            HaloSpec::PerSide(rows) => {
                if rows.len() != ndim {
                    return Err(NdlocaleError::config(
                        0,
                        format!("halo has {} axes, extent has {}", rows.len(), ndim),
                    ));
                }
                for (a, row) in rows.iter().enumerate() {
                    matrix[[a, 0]] = row[0];
                    matrix[[a, 1]] = row[1];
                }
            }
        }
        if matrix.iter().any(|&w| w < 0) {
            return Err(NdlocaleError::config(
                0,
                format!("halo widths must be non-negative, got {:?}", self),
            ));
        }
        Ok(matrix)
    }
}

/// An [`IndexingExtent`] augmented with per-axis, per-side ghost-element
/// counts. The box itself is the interior ("no halo") region; the derived
/// `_h` views include the ghost elements.
#[derive(Clone, PartialEq)]
pub struct HaloIndexingExtent {
    extent: IndexingExtent,
    halo: Array2<Index>,
}

impl HaloIndexingExtent {
    pub fn new(extent: IndexingExtent, halo: Array2<Index>) -> Self {
        assert_eq!(
            halo.nrows(),
            extent.ndim(),
            "halo matrix must have one row per extent axis"
        );
        assert_eq!(halo.ncols(), 2);
        Self { extent, halo }
    }

    pub fn zero_halo(extent: IndexingExtent) -> Self {
        let halo = Array2::zeros((extent.ndim(), 2));
        Self { extent, halo }
    }

    pub fn interior(&self) -> &IndexingExtent {
        &self.extent
    }

    pub fn halo(&self) -> &Array2<Index> {
        &self.halo
    }

    pub fn ndim(&self) -> usize {
        self.extent.ndim()
    }

    pub fn start_n(&self) -> &Array1<Index> {
        self.extent.start()
    }

    pub fn stop_n(&self) -> &Array1<Index> {
        self.extent.stop()
    }

    pub fn shape_n(&self) -> Array1<Index> {
        self.extent.shape()
    }

    pub fn start_h(&self) -> Array1<Index> {
        self.extent.start() - &self.halo.column(0)
    }

    pub fn stop_h(&self) -> Array1<Index> {
        self.extent.stop() + &self.halo.column(1)
    }

    pub fn shape_h(&self) -> Array1<Index> {
        &self.stop_h() - &self.start_h()
    }

    pub fn size_n(&self) -> Index {
        self.extent.num_elements()
    }

    pub fn size_h(&self) -> Index {
        self.shape_h().iter().map(|&s| s.max(0)).product()
    }

    /// The extent including ghost elements.
    pub fn extent_h(&self) -> IndexingExtent {
        IndexingExtent::from_arrays(self.start_h(), self.stop_h())
    }

    pub fn to_slices_n(&self) -> Vec<Range<Index>> {
        self.extent.to_slices()
    }

    pub fn to_slices_h(&self) -> Vec<Range<Index>> {
        self.extent_h().to_slices()
    }

    /// Globale index to locale index in the with-halo frame.
    pub fn globale_to_locale_h(&self, gidx: &Array1<Index>) -> Array1<Index> {
        gidx - &self.start_h()
    }

    /// Locale index in the with-halo frame to globale index.
    pub fn locale_to_globale_h(&self, lidx: &Array1<Index>) -> Array1<Index> {
        lidx + &self.start_h()
    }

    /// Globale index to locale index in the no-halo frame.
    pub fn globale_to_locale_n(&self, gidx: &Array1<Index>) -> Array1<Index> {
        gidx - self.start_n()
    }

    /// Locale index in the no-halo frame to globale index.
    pub fn locale_to_globale_n(&self, lidx: &Array1<Index>) -> Array1<Index> {
        lidx + self.start_n()
    }

    /// Translates a globale-frame extent into this extent's with-halo
    /// locale frame.
    pub fn globale_to_locale_extent_h(&self, gext: &IndexingExtent) -> IndexingExtent {
        IndexingExtent::from_arrays(
            self.globale_to_locale_h(gext.start()),
            self.globale_to_locale_h(gext.stop()),
        )
    }

    /// Translates a with-halo locale-frame extent back to the globale
    /// frame.
    pub fn locale_to_globale_extent_h(&self, lext: &IndexingExtent) -> IndexingExtent {
        IndexingExtent::from_arrays(
            self.locale_to_globale_h(lext.start()),
            self.locale_to_globale_h(lext.stop()),
        )
    }

    /// The slab of ghost elements flush against the named side of the
    /// with-halo extent along `axis`, spanning the with-halo extent on
    /// every other axis.
    pub fn halo_slab_extent(&self, axis: usize, side: Side) -> IndexingExtent {
        let mut start = self.start_h();
        let mut stop = self.stop_h();
        match side {
            Side::Lo => stop[axis] = start[axis] + self.halo[[axis, 0]],
            Side::Hi => start[axis] = stop[axis] - self.halo[[axis, 1]],
        }
        IndexingExtent::from_arrays(start, stop)
    }

    /// The with-halo extent with the halo stripped on `axis` only; halos
    /// on the other axes are kept.
    pub fn no_halo_extent(&self, axis: usize) -> IndexingExtent {
        let mut start = self.start_h();
        let mut stop = self.stop_h();
        start[axis] += self.halo[[axis, 0]];
        stop[axis] -= self.halo[[axis, 1]];
        IndexingExtent::from_arrays(start, stop)
    }
}

impl fmt::Debug for HaloIndexingExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HaloIndexingExtent(start={:?}, stop={:?}, halo={:?})",
            self.start_n().as_slice().unwrap(),
            self.stop_n().as_slice().unwrap(),
            self.halo
        )
    }
}
