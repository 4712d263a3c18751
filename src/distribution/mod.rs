mod block;
mod extents;

use ndarray::Array2;

pub use block::row_major_coord_map;
pub use block::BlockPartition;
pub use extents::CartLocaleExtent;
pub use extents::GlobaleExtent;
pub use extents::HaloSubExtent;
pub use extents::LocaleExtent;

use crate::communication::Rank;
use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::HaloSpec;
use crate::indexing::Index;
use crate::indexing::IndexingExtent;

/// Apportionment of the globale extent amongst locales.
///
/// Immutable once built: a shape or halo change means constructing a
/// fresh distribution. `locale_extents[r]` is the extent assigned to the
/// locale with inter-locale rank `r`.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution<E> {
    globale_extent: GlobaleExtent,
    locale_extents: Vec<E>,
    halo: Array2<Index>,
    inter_locale_rank_to_rank: Option<Vec<Rank>>,
}

impl<E> Distribution<E> {
    pub(crate) fn from_parts(
        globale_extent: GlobaleExtent,
        locale_extents: Vec<E>,
        halo: Array2<Index>,
        inter_locale_rank_to_rank: Option<Vec<Rank>>,
    ) -> Result<Self> {
        if let Some(map) = &inter_locale_rank_to_rank {
            if map.len() != locale_extents.len() {
                return Err(NdlocaleError::config(
                    0,
                    format!(
                        "rank map has {} entries for {} locales",
                        map.len(),
                        locale_extents.len()
                    ),
                ));
            }
        }
        Ok(Self {
            globale_extent,
            locale_extents,
            halo,
            inter_locale_rank_to_rank,
        })
    }

    pub fn globale_extent(&self) -> &GlobaleExtent {
        &self.globale_extent
    }

    pub fn locale_extents(&self) -> &[E] {
        &self.locale_extents
    }

    pub fn locale_extent(&self, inter_locale_rank: Rank) -> &E {
        &self.locale_extents[inter_locale_rank as usize]
    }

    /// The resolved halo request, before per-locale clamping.
    pub fn halo(&self) -> &Array2<Index> {
        &self.halo
    }

    pub fn num_locales(&self) -> usize {
        self.locale_extents.len()
    }

    /// Flat-communicator rank of the representative of the given locale,
    /// when a rank translation map is attached.
    pub fn get_rank(&self, inter_locale_rank: Rank) -> Option<Rank> {
        self.inter_locale_rank_to_rank
            .as_ref()
            .map(|m| m[inter_locale_rank as usize])
    }

    pub fn inter_locale_rank_to_rank(&self) -> Option<&[Rank]> {
        self.inter_locale_rank_to_rank.as_deref()
    }
}

impl Distribution<LocaleExtent> {
    /// Every locale holds the full globale extent; used for replicated
    /// data. The halo clamps to zero since no locale extends past the
    /// globale bounds.
    pub fn cloned(
        globale_extent: GlobaleExtent,
        num_locales: usize,
        halo: &HaloSpec,
    ) -> Result<Self> {
        let halo = halo.to_matrix(globale_extent.ndim())?;
        let locale_extents = (0..num_locales)
            .map(|r| {
                LocaleExtent::new(
                    None,
                    r as Rank,
                    &globale_extent,
                    globale_extent.interior().clone(),
                    &halo,
                )
            })
            .collect();
        Self::from_parts(globale_extent, locale_extents, halo, None)
    }

    /// One named locale holds the full globale extent; every other locale
    /// holds an empty extent anchored at `globale.start_n`.
    pub fn single_locale(
        globale_extent: GlobaleExtent,
        num_locales: usize,
        inter_locale_rank: Rank,
        halo: &HaloSpec,
    ) -> Result<Self> {
        if (inter_locale_rank as usize) >= num_locales {
            return Err(NdlocaleError::config(
                0,
                format!(
                    "inter_locale_rank {} out of range for {} locales",
                    inter_locale_rank, num_locales
                ),
            ));
        }
        let halo = halo.to_matrix(globale_extent.ndim())?;
        let anchor = globale_extent.start_n().clone();
        let locale_extents = (0..num_locales)
            .map(|r| {
                let interior = if r as Rank == inter_locale_rank {
                    globale_extent.interior().clone()
                } else {
                    IndexingExtent::from_arrays(anchor.clone(), anchor.clone())
                };
                LocaleExtent::new(None, r as Rank, &globale_extent, interior, &halo)
            })
            .collect();
        Self::from_parts(globale_extent, locale_extents, halo, None)
    }
}
