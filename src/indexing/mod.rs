mod halo;

use std::fmt;
use std::ops::Range;

use ndarray::Array1;
use ndarray::Zip;

pub use halo::HaloIndexingExtent;
pub use halo::HaloSpec;
pub use halo::Side;

/// Globale array indices are signed 64-bit, matching the widest practical
/// array extents and allowing halo starts below zero during arithmetic.
pub type Index = i64;

/// Half-open axis-aligned box `[beg, end)` describing the index range of a
/// single tile of a domain decomposition.
///
/// An extent with `beg[i] == end[i]` on any axis is empty. Intersections
/// that would come out empty are reported as `None` rather than as an
/// empty extent.
#[derive(Clone, PartialEq, Eq)]
pub struct IndexingExtent {
    beg: Array1<Index>,
    end: Array1<Index>,
}

impl IndexingExtent {
    /// Per-axis start and stop indices.
    pub fn from_start_stop(start: &[Index], stop: &[Index]) -> Self {
        assert_eq!(
            start.len(),
            stop.len(),
            "start and stop must have the same number of axes"
        );
        Self {
            beg: Array1::from_vec(start.to_vec()),
            end: Array1::from_vec(stop.to_vec()),
        }
    }

    /// Extent starting at the origin with the given shape.
    pub fn from_shape(shape: &[Index]) -> Self {
        Self {
            beg: Array1::zeros(shape.len()),
            end: Array1::from_vec(shape.to_vec()),
        }
    }

    /// Per-axis index ranges.
    pub fn from_slices(slices: &[Range<Index>]) -> Self {
        Self {
            beg: slices.iter().map(|s| s.start).collect(),
            end: slices.iter().map(|s| s.end).collect(),
        }
    }

    pub(crate) fn from_arrays(beg: Array1<Index>, end: Array1<Index>) -> Self {
        assert_eq!(beg.len(), end.len());
        Self { beg, end }
    }

    pub fn start(&self) -> &Array1<Index> {
        &self.beg
    }

    pub fn stop(&self) -> &Array1<Index> {
        &self.end
    }

    pub fn shape(&self) -> Array1<Index> {
        &self.end - &self.beg
    }

    pub fn ndim(&self) -> usize {
        self.beg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beg
            .iter()
            .zip(self.end.iter())
            .any(|(&b, &e)| b >= e)
    }

    pub fn num_elements(&self) -> Index {
        self.shape().iter().map(|&s| s.max(0)).product()
    }

    /// True when `other` lies entirely within this extent.
    pub fn contains_extent(&self, other: &IndexingExtent) -> bool {
        self.beg
            .iter()
            .zip(other.beg.iter())
            .all(|(&s, &o)| s <= o)
            && self
                .end
                .iter()
                .zip(other.end.iter())
                .all(|(&s, &o)| o <= s)
    }

    /// Overlap of this extent with `other`, or `None` when the extents are
    /// disjoint. Commutative.
    pub fn intersection(&self, other: &IndexingExtent) -> Option<IndexingExtent> {
        assert_eq!(
            self.ndim(),
            other.ndim(),
            "intersection of extents with different dimension"
        );
        let beg = Zip::from(&self.beg)
            .and(&other.beg)
            .map_collect(|&a, &b| a.max(b));
        let end = Zip::from(&self.end)
            .and(&other.end)
            .map_collect(|&a, &b| a.min(b));
        if beg.iter().zip(end.iter()).any(|(&b, &e)| b >= e) {
            None
        } else {
            Some(IndexingExtent { beg, end })
        }
    }

    /// Cuts this extent in two along `axis` at coordinate `index`.
    ///
    /// A cut at or before the start yields `(None, whole)`, a cut at or
    /// past the stop yields `(whole, None)`.
    pub fn split(
        &self,
        axis: usize,
        index: Index,
    ) -> (Option<IndexingExtent>, Option<IndexingExtent>) {
        if index <= self.beg[axis] {
            (None, Some(self.clone()))
        } else if index >= self.end[axis] {
            (Some(self.clone()), None)
        } else {
            let mut lo = self.clone();
            let mut hi = self.clone();
            lo.end[axis] = index;
            hi.beg[axis] = index;
            (Some(lo), Some(hi))
        }
    }

    /// Decomposes this extent with respect to `other`.
    ///
    /// Returns `(leftovers, intersection)` where `leftovers` is a minimal
    /// tiling of `self \ intersection` by up to `2 * ndim` boxes. When the
    /// extents do not intersect the result is `(vec![], None)`; the caller
    /// already holds the whole of `self`.
    ///
    /// The emission order is canonical: walking axes in increasing order,
    /// the below-intersection box is emitted before the above-intersection
    /// box, and the remaining middle band is carried to the next axis.
    pub fn intersection_split(
        &self,
        other: &IndexingExtent,
    ) -> (Vec<IndexingExtent>, Option<IndexingExtent>) {
        let intersection = match self.intersection(other) {
            Some(i) => i,
            None => return (Vec::new(), None),
        };
        let mut leftovers = Vec::with_capacity(2 * self.ndim());
        let mut current = self.clone();
        for axis in 0..self.ndim() {
            let (lo, rest) = current.split(axis, intersection.beg[axis]);
            if let Some(lo) = lo {
                leftovers.push(lo);
            }
            let rest = rest.expect("intersection lies within self");
            let (mid, hi) = rest.split(axis, intersection.end[axis]);
            if let Some(hi) = hi {
                leftovers.push(hi);
            }
            current = mid.expect("intersection lies within self");
        }
        debug_assert_eq!(current, intersection);
        (leftovers, Some(intersection))
    }

    /// Per-axis `[beg, end)` ranges equivalent to this extent.
    pub fn to_slices(&self) -> Vec<Range<Index>> {
        self.beg
            .iter()
            .zip(self.end.iter())
            .map(|(&b, &e)| b..e)
            .collect()
    }
}

impl fmt::Debug for IndexingExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndexingExtent(start={:?}, stop={:?})",
            self.beg.as_slice().unwrap(),
            self.end.as_slice().unwrap()
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::IndexingExtent;

    fn extent(ranges: &[std::ops::Range<i64>]) -> IndexingExtent {
        IndexingExtent::from_slices(ranges)
    }

    #[test]
    fn shape_and_slices() {
        let e = extent(&[2..5, 0..7]);
        assert_eq!(e.ndim(), 2);
        assert_eq!(e.shape().as_slice().unwrap(), &[3, 7]);
        assert_eq!(e.num_elements(), 21);
        assert_eq!(e.to_slices(), vec![2..5, 0..7]);
        assert!(!e.is_empty());
        assert!(extent(&[2..2, 0..7]).is_empty());
    }

    #[test]
    fn intersection_symmetry_and_idempotence() {
        let a = extent(&[0..10, 0..10]);
        let b = extent(&[3..12, 5..6]);
        assert_eq!(a.intersection(&b), b.intersection(&a));
        assert_eq!(a.intersection(&b).unwrap(), extent(&[3..10, 5..6]));
        assert_eq!(a.intersection(&a).unwrap(), a);
    }

    #[test]
    fn intersection_disjoint_is_none() {
        let a = extent(&[0..10]);
        assert!(a.intersection(&extent(&[10..20])).is_none());
        assert!(a.intersection(&extent(&[-5..0])).is_none());
        // Disjoint on one axis only is still disjoint.
        let a = extent(&[0..10, 0..10]);
        assert!(a.intersection(&extent(&[2..4, 10..14])).is_none());
    }

    #[test]
    fn split_edge_cases() {
        let a = extent(&[3..9]);
        let (lo, hi) = a.split(0, 3);
        assert_eq!((lo, hi), (None, Some(a.clone())));
        let (lo, hi) = a.split(0, 9);
        assert_eq!((lo, hi), (Some(a.clone()), None));
        let (lo, hi) = a.split(0, 5);
        assert_eq!(lo.unwrap(), extent(&[3..5]));
        assert_eq!(hi.unwrap(), extent(&[5..9]));
    }

    #[test]
    fn intersection_split_canonical_order() {
        let this = extent(&[0..10, 0..10]);
        let other = extent(&[3..7, 2..8]);
        let (leftovers, intersection) = this.intersection_split(&other);
        assert_eq!(intersection.unwrap(), extent(&[3..7, 2..8]));
        assert_eq!(
            leftovers,
            vec![
                extent(&[0..3, 0..10]),
                extent(&[7..10, 0..10]),
                extent(&[3..7, 0..2]),
                extent(&[3..7, 8..10]),
            ]
        );
    }

    #[test]
    fn intersection_split_without_overlap() {
        let this = extent(&[0..4, 0..4]);
        let other = extent(&[4..8, 0..4]);
        let (leftovers, intersection) = this.intersection_split(&other);
        assert!(leftovers.is_empty());
        assert!(intersection.is_none());
    }

    #[test]
    fn intersection_split_contained_other() {
        let this = extent(&[0..4]);
        let other = extent(&[1..3]);
        let (leftovers, intersection) = this.intersection_split(&other);
        assert_eq!(intersection.unwrap(), extent(&[1..3]));
        assert_eq!(leftovers, vec![extent(&[0..1]), extent(&[3..4])]);
        // The dual: self contained in other leaves nothing over.
        let (leftovers, intersection) = other.intersection_split(&this);
        assert_eq!(intersection.unwrap(), extent(&[1..3]));
        assert!(leftovers.is_empty());
    }

    fn assert_disjoint(a: &IndexingExtent, b: &IndexingExtent) {
        assert!(
            a.intersection(b).is_none(),
            "{:?} intersects {:?}",
            a,
            b
        );
    }

    #[test]
    fn intersection_split_tiles_self() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let ndim = rng.gen_range(1..4);
            let random_extent = |rng: &mut StdRng| {
                let ranges: Vec<_> = (0..ndim)
                    .map(|_| {
                        let b = rng.gen_range(-5..15);
                        b..b + rng.gen_range(1..10)
                    })
                    .collect();
                IndexingExtent::from_slices(&ranges)
            };
            let this = random_extent(&mut rng);
            let other = random_extent(&mut rng);
            let (leftovers, intersection) = this.intersection_split(&other);
            let mut pieces = leftovers.clone();
            if let Some(i) = intersection.clone() {
                pieces.push(i);
            } else {
                assert!(leftovers.is_empty());
                continue;
            }
            // Pairwise disjoint, contained in self, and summing to self.
            for (i, a) in pieces.iter().enumerate() {
                assert!(this.contains_extent(a));
                for b in pieces.iter().skip(i + 1) {
                    assert_disjoint(a, b);
                }
            }
            let total: i64 = pieces.iter().map(|p| p.num_elements()).sum();
            assert_eq!(total, this.num_elements());
        }
    }
}
