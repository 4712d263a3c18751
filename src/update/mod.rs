use std::collections::HashMap;

use log::debug;

use crate::communication::Rank;
use crate::distribution::CartLocaleExtent;
use crate::distribution::Distribution;
use crate::indexing::Index;
use crate::indexing::IndexingExtent;
use crate::indexing::Side;

/// One transfer unit of a halo-exchange plan: copy the elements of
/// `overlap_extent` (globale frame) out of the interior region of
/// `src_extent` into the halo region of `dst_extent`.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRecord {
    pub dst_extent: CartLocaleExtent,
    pub src_extent: CartLocaleExtent,
    pub overlap_extent: IndexingExtent,
}

/// Static halo-exchange plan for a single destination locale: for every
/// `(axis, side)`, the transfer units that fill that side's halo slab
/// from the interiors of neighbouring locales.
///
/// The planner holds no mutable state across plans; one plan per
/// destination.
pub struct HalosUpdate {
    dst_rank: Rank,
    updates: Vec<[Vec<UpdateRecord>; 2]>,
}

impl HalosUpdate {
    /// Plans the halo updates for the locale with cartesian
    /// rank `dst_rank`. `extents` is the full distribution, indexed by
    /// cartesian rank.
    pub fn new(dst_rank: Rank, extents: &[CartLocaleExtent]) -> Self {
        Self::with_max_update_elements(dst_rank, extents, None)
    }

    /// Like [`HalosUpdate::new`], additionally subdividing every transfer
    /// unit so that no unit covers more than `max_elements` elements.
    /// Subdivision preserves the union of covered indices exactly.
    pub fn with_max_update_elements(
        dst_rank: Rank,
        extents: &[CartLocaleExtent],
        max_elements: Option<Index>,
    ) -> Self {
        let coord_to_extent: HashMap<&[Index], &CartLocaleExtent> = extents
            .iter()
            .map(|e| (e.cart_coord().as_slice().unwrap(), e))
            .collect();
        let dst = &extents[dst_rank as usize];
        debug_assert_eq!(dst.cart_rank(), dst_rank);
        let ndim = dst.ndim();
        let mut updates: Vec<[Vec<UpdateRecord>; 2]> =
            (0..ndim).map(|_| [Vec::new(), Vec::new()]).collect();
        for side in Side::all() {
            for axis in 0..ndim {
                let steps: Box<dyn Iterator<Item = Index>> = match side {
                    Side::Lo => Box::new((1..=dst.cart_coord()[axis]).map(|i| -i)),
                    Side::Hi => {
                        Box::new(1..dst.cart_shape()[axis] - dst.cart_coord()[axis])
                    }
                };
                let slab = dst.halo_slab_extent(axis, side);
                for step in steps {
                    let mut src_coord = dst.cart_coord().to_vec();
                    src_coord[axis] += step;
                    let src = coord_to_extent[src_coord.as_slice()];
                    match slab.intersection(&src.no_halo_extent(axis)) {
                        Some(overlap) => {
                            assert!(
                                !overlap.is_empty(),
                                "planner produced an empty overlap for \
                                 dst {:?} and src {:?}",
                                dst,
                                src
                            );
                            let pieces = match max_elements {
                                Some(max) => split_to_max_elements(&overlap, max),
                                None => vec![overlap],
                            };
                            updates[axis][side.col()].extend(pieces.into_iter().map(
                                |overlap_extent| UpdateRecord {
                                    dst_extent: dst.clone(),
                                    src_extent: src.clone(),
                                    overlap_extent,
                                },
                            ));
                        }
                        // Under a block partition any neighbour past the
                        // first non-intersecting one is farther away and
                        // equally non-intersecting.
                        None => break,
                    }
                }
            }
        }
        debug!(
            "planned {} halo updates for cart rank {}",
            updates
                .iter()
                .flat_map(|by_side| by_side.iter())
                .map(|u| u.len())
                .sum::<usize>(),
            dst_rank
        );
        Self { dst_rank, updates }
    }

    pub fn dst_rank(&self) -> Rank {
        self.dst_rank
    }

    /// Transfer units filling the halo slab on the given side of the
    /// given axis.
    pub fn updates(&self, axis: usize, side: Side) -> &[UpdateRecord] {
        &self.updates[axis][side.col()]
    }

    /// All transfer units of the plan, walked in `(side, axis)` planning
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = &UpdateRecord> {
        self.updates
            .iter()
            .flat_map(|by_side| by_side.iter().flatten())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl Distribution<CartLocaleExtent> {
    /// Halo-exchange plan for the locale with the given inter-locale
    /// rank.
    pub fn halo_updates_for(&self, inter_locale_rank: Rank) -> HalosUpdate {
        HalosUpdate::new(inter_locale_rank, self.locale_extents())
    }
}

/// Tiles `extent` into boxes of at most `max_elements` elements by
/// repeatedly halving the widest axis.
fn split_to_max_elements(extent: &IndexingExtent, max_elements: Index) -> Vec<IndexingExtent> {
    assert!(max_elements > 0, "max_elements must be positive");
    if extent.num_elements() <= max_elements {
        return vec![extent.clone()];
    }
    let shape = extent.shape();
    let axis = (0..extent.ndim())
        .max_by_key(|&a| (shape[a], std::cmp::Reverse(a)))
        .expect("extent has at least one axis");
    let cut = extent.start()[axis] + shape[axis] / 2;
    let (lo, hi) = extent.split(axis, cut);
    let (lo, hi) = (
        lo.expect("split point inside extent"),
        hi.expect("split point inside extent"),
    );
    let mut pieces = split_to_max_elements(&lo, max_elements);
    pieces.extend(split_to_max_elements(&hi, max_elements));
    pieces
}
