use std::fmt;

use derive_more::Deref;
use derive_more::DerefMut;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Zip;

use crate::communication::Rank;
use crate::indexing::HaloIndexingExtent;
use crate::indexing::Index;
use crate::indexing::IndexingExtent;

/// The indexing extent of the entire array. Carries no halo of its own;
/// globale borders are an explicit non-goal.
#[derive(Clone, Debug, PartialEq, Deref)]
pub struct GlobaleExtent(HaloIndexingExtent);

impl GlobaleExtent {
    pub fn new(extent: IndexingExtent) -> Self {
        Self(HaloIndexingExtent::zero_halo(extent))
    }

    pub fn from_shape(shape: &[Index]) -> Self {
        Self::new(IndexingExtent::from_shape(shape))
    }
}

/// A halo extent embedded in a [`GlobaleExtent`]. Construction trims the
/// requested halo so that the with-halo extent never strays outside the
/// globale bounds:
///
/// `halo[a, s] = max(0, min(requested[a, s], distance to the globale
/// boundary on side s))`
#[derive(Clone, Debug, PartialEq, Deref, DerefMut)]
pub struct HaloSubExtent(HaloIndexingExtent);

impl HaloSubExtent {
    pub fn new(
        globale_extent: &GlobaleExtent,
        interior: IndexingExtent,
        halo: &Array2<Index>,
    ) -> Self {
        assert_eq!(
            interior.ndim(),
            globale_extent.ndim(),
            "locale extent dimension must match the globale extent"
        );
        let lo_room = interior.start() - &globale_extent.start_h();
        let hi_room = &globale_extent.stop_h() - interior.stop();
        let mut clamped = halo.clone();
        Zip::from(clamped.column_mut(0))
            .and(&lo_room)
            .for_each(|h, &room| *h = (*h).min(room).max(0));
        Zip::from(clamped.column_mut(1))
            .and(&hi_room)
            .for_each(|h, &room| *h = (*h).min(room).max(0));
        Self(HaloIndexingExtent::new(interior, clamped))
    }
}

/// Extent of the array region residing on one locale, identified by the
/// flat-communicator rank of the locale's representative process and by
/// its inter-locale rank.
#[derive(Clone, PartialEq, Deref)]
pub struct LocaleExtent {
    #[deref]
    extent: HaloSubExtent,
    rank: Option<Rank>,
    inter_locale_rank: Rank,
}

impl LocaleExtent {
    pub fn new(
        rank: Option<Rank>,
        inter_locale_rank: Rank,
        globale_extent: &GlobaleExtent,
        interior: IndexingExtent,
        halo: &Array2<Index>,
    ) -> Self {
        Self {
            extent: HaloSubExtent::new(globale_extent, interior, halo),
            rank,
            inter_locale_rank,
        }
    }

    /// Flat-communicator rank of the representative process, when the
    /// rank translation map was available at construction.
    pub fn rank(&self) -> Option<Rank> {
        self.rank
    }

    pub fn inter_locale_rank(&self) -> Rank {
        self.inter_locale_rank
    }
}

impl fmt::Debug for LocaleExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LocaleExtent(start={:?}, stop={:?}, halo={:?}, rank={:?}, inter_locale_rank={})",
            self.start_n().as_slice().unwrap(),
            self.stop_n().as_slice().unwrap(),
            self.halo(),
            self.rank,
            self.inter_locale_rank
        )
    }
}

/// A [`LocaleExtent`] placed on a cartesian grid of locales.
#[derive(Clone, PartialEq, Deref)]
pub struct CartLocaleExtent {
    #[deref]
    locale_extent: LocaleExtent,
    cart_coord: Array1<Index>,
    cart_shape: Array1<Index>,
}

impl CartLocaleExtent {
    pub fn new(
        rank: Option<Rank>,
        inter_locale_rank: Rank,
        cart_coord: Array1<Index>,
        cart_shape: Array1<Index>,
        globale_extent: &GlobaleExtent,
        interior: IndexingExtent,
        halo: &Array2<Index>,
    ) -> Self {
        assert_eq!(cart_coord.len(), cart_shape.len());
        Self {
            locale_extent: LocaleExtent::new(
                rank,
                inter_locale_rank,
                globale_extent,
                interior,
                halo,
            ),
            cart_coord,
            cart_shape,
        }
    }

    /// Rank in the cartesian communicator; equal to the inter-locale rank
    /// by construction.
    pub fn cart_rank(&self) -> Rank {
        self.inter_locale_rank()
    }

    pub fn cart_coord(&self) -> &Array1<Index> {
        &self.cart_coord
    }

    pub fn cart_shape(&self) -> &Array1<Index> {
        &self.cart_shape
    }
}

impl fmt::Debug for CartLocaleExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CartLocaleExtent(start={:?}, stop={:?}, halo={:?}, rank={:?}, \
             inter_locale_rank={}, cart_coord={:?}, cart_shape={:?})",
            self.start_n().as_slice().unwrap(),
            self.stop_n().as_slice().unwrap(),
            self.halo(),
            self.rank(),
            self.inter_locale_rank(),
            self.cart_coord.as_slice().unwrap(),
            self.cart_shape.as_slice().unwrap()
        )
    }
}
