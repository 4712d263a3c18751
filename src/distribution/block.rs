use std::collections::HashMap;

use log::debug;
use ndarray::Array1;

use super::CartLocaleExtent;
use super::Distribution;
use super::GlobaleExtent;
use crate::communication::Rank;
use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::HaloSpec;
use crate::indexing::Index;
use crate::split::shape_split;
use crate::split::tile_index;
use crate::split::unravel_index;

/// Block partition of the globale extent over a cartesian grid of
/// locales.
pub struct BlockPartition;

impl BlockPartition {
    /// Carves `globale_extent` into `prod(dims)` tiles, one per cartesian
    /// coordinate, each halo-trimmed against the globale bounds. The tile
    /// at coordinate `c` is assigned to the locale whose cartesian rank
    /// is `cart_coord_to_cart_rank[c]`.
    ///
    /// With a single locale the cartesian topology is not consulted: the
    /// one extent equals the globale extent, promoted to a
    /// [`CartLocaleExtent`] at the grid origin.
    pub fn new(
        globale_extent: GlobaleExtent,
        dims: &Array1<Index>,
        cart_coord_to_cart_rank: &HashMap<Vec<Index>, Rank>,
        halo: &HaloSpec,
        inter_locale_rank_to_rank: Option<Vec<Rank>>,
    ) -> Result<Distribution<CartLocaleExtent>> {
        let ndim = globale_extent.ndim();
        if dims.len() != ndim {
            return Err(NdlocaleError::config(
                0,
                format!(
                    "grid dims {:?} do not match globale extent dimension {}",
                    dims.as_slice().unwrap(),
                    ndim
                ),
            ));
        }
        if dims.iter().any(|&d| d < 1) {
            return Err(NdlocaleError::config(
                0,
                format!(
                    "grid dims must be positive, got {:?}",
                    dims.as_slice().unwrap()
                ),
            ));
        }
        let halo_matrix = halo.to_matrix(ndim)?;
        let num_locales = dims.iter().product::<Index>() as usize;
        debug!(
            "partitioning globale extent {:?} over {} locales on grid {:?}",
            globale_extent.interior(),
            num_locales,
            dims.as_slice().unwrap()
        );

        if num_locales == 1 {
            let rank = inter_locale_rank_to_rank
                .as_ref()
                .map(|m| m[0])
                .unwrap_or(0);
            let extent = CartLocaleExtent::new(
                Some(rank),
                0,
                Array1::zeros(ndim),
                Array1::ones(ndim),
                &globale_extent,
                globale_extent.interior().clone(),
                &halo_matrix,
            );
            return Distribution::from_parts(
                globale_extent,
                vec![extent],
                halo_matrix,
                inter_locale_rank_to_rank,
            );
        }

        let tiles = shape_split(
            globale_extent.start_n(),
            &globale_extent.shape_n(),
            dims,
        );
        let mut locale_extents: Vec<Option<CartLocaleExtent>> = vec![None; num_locales];
        for (coord, &cart_rank) in cart_coord_to_cart_rank {
            if coord.len() != ndim || (cart_rank as usize) >= num_locales {
                return Err(NdlocaleError::config(
                    0,
                    format!(
                        "cartesian map entry {:?} -> {} does not fit grid {:?}",
                        coord,
                        cart_rank,
                        dims.as_slice().unwrap()
                    ),
                ));
            }
            let interior = tiles[tile_index(coord, dims)].clone();
            let rank = inter_locale_rank_to_rank
                .as_ref()
                .map(|m| m[cart_rank as usize]);
            locale_extents[cart_rank as usize] = Some(CartLocaleExtent::new(
                rank,
                cart_rank,
                Array1::from_vec(coord.clone()),
                dims.clone(),
                &globale_extent,
                interior,
                &halo_matrix,
            ));
        }
        let locale_extents = locale_extents
            .into_iter()
            .enumerate()
            .map(|(r, e)| {
                e.ok_or_else(|| {
                    NdlocaleError::config(
                        0,
                        format!("cartesian coordinate map assigns no coordinate to rank {}", r),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Distribution::from_parts(
            globale_extent,
            locale_extents,
            halo_matrix,
            inter_locale_rank_to_rank,
        )
    }
}

/// Row-major coordinate map for a grid of shape `dims`; the layout used
/// when no reordered cartesian communicator supplies its own.
pub fn row_major_coord_map(dims: &Array1<Index>) -> HashMap<Vec<Index>, Rank> {
    let num = dims.iter().product::<Index>() as usize;
    (0..num)
        .map(|rank| (unravel_index(rank, dims), rank as Rank))
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;
    use ndarray::arr2;

    use super::row_major_coord_map;
    use super::BlockPartition;
    use super::GlobaleExtent;
    use crate::indexing::HaloSpec;
    use crate::indexing::IndexingExtent;

    #[test]
    fn one_dimensional_partition_with_clamped_halos() {
        let dims = arr1(&[4]);
        let d = BlockPartition::new(
            GlobaleExtent::from_shape(&[12]),
            &dims,
            &row_major_coord_map(&dims),
            &HaloSpec::Uniform(2),
            Some(vec![0, 1, 2, 3]),
        )
        .unwrap();
        let interiors: Vec<_> = d
            .locale_extents()
            .iter()
            .map(|e| e.interior().clone())
            .collect();
        assert_eq!(
            interiors,
            vec![
                IndexingExtent::from_start_stop(&[0], &[3]),
                IndexingExtent::from_start_stop(&[3], &[6]),
                IndexingExtent::from_start_stop(&[6], &[9]),
                IndexingExtent::from_start_stop(&[9], &[12]),
            ]
        );
        assert_eq!(d.locale_extent(0).halo(), &arr2(&[[0, 2]]));
        assert_eq!(d.locale_extent(1).halo(), &arr2(&[[2, 2]]));
        assert_eq!(d.locale_extent(3).halo(), &arr2(&[[2, 0]]));
        assert_eq!(d.get_rank(2), Some(2));
    }

    #[test]
    fn two_dimensional_partition_covers_and_is_disjoint() {
        let dims = arr1(&[2, 2]);
        let d = BlockPartition::new(
            GlobaleExtent::from_shape(&[10, 10]),
            &dims,
            &row_major_coord_map(&dims),
            &HaloSpec::PerSide(vec![[1, 2], [2, 1]]),
            None,
        )
        .unwrap();
        assert_eq!(d.num_locales(), 4);
        let expected = [
            IndexingExtent::from_start_stop(&[0, 0], &[5, 5]),
            IndexingExtent::from_start_stop(&[0, 5], &[5, 10]),
            IndexingExtent::from_start_stop(&[5, 0], &[10, 5]),
            IndexingExtent::from_start_stop(&[5, 5], &[10, 10]),
        ];
        for (e, want) in d.locale_extents().iter().zip(&expected) {
            assert_eq!(e.interior(), want);
        }
        assert_eq!(d.locale_extent(0).halo(), &arr2(&[[0, 2], [0, 1]]));
        // Interiors are pairwise disjoint and cover the globale extent.
        let total: i64 = d
            .locale_extents()
            .iter()
            .map(|e| e.interior().num_elements())
            .sum();
        assert_eq!(total, 100);
        for (i, a) in d.locale_extents().iter().enumerate() {
            for b in d.locale_extents().iter().skip(i + 1) {
                assert!(a.interior().intersection(b.interior()).is_none());
            }
            // Halo clamp: the with-halo extent stays within the globale.
            assert!(d
                .globale_extent()
                .interior()
                .contains_extent(&a.extent_h()));
        }
    }

    #[test]
    fn single_locale_fast_path_promotes_globale_extent() {
        let dims = arr1(&[1]);
        let d = BlockPartition::new(
            GlobaleExtent::from_shape(&[100]),
            &dims,
            &row_major_coord_map(&dims),
            &HaloSpec::Uniform(0),
            None,
        )
        .unwrap();
        assert_eq!(d.num_locales(), 1);
        let e = d.locale_extent(0);
        assert_eq!(e.interior(), &IndexingExtent::from_shape(&[100]));
        assert_eq!(e.halo(), &arr2(&[[0, 0]]));
        assert_eq!(e.rank(), Some(0));
        assert_eq!(e.cart_rank(), 0);
        assert_eq!(e.cart_coord(), &arr1(&[0]));
        assert_eq!(e.cart_shape(), &arr1(&[1]));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let dims = arr1(&[2, 2]);
        let err = BlockPartition::new(
            GlobaleExtent::from_shape(&[12]),
            &dims,
            &row_major_coord_map(&dims),
            &HaloSpec::Uniform(0),
            None,
        );
        assert!(err.is_err());
    }
}
