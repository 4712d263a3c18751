use std::collections::HashMap;

use log::debug;
use ndarray::Array1;

use super::CartCommunicator;
use super::Rank;
use super::SizedCommunicator;
use super::TopologyCommunicator;
use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::Index;
use crate::split::resolve_dims;

/// A process's place in the topology: the inter-locale rank of its
/// locale and the flat rank of the locale's representative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThisLocaleInfo {
    pub inter_locale_rank: Rank,
    pub rank: Rank,
}

/// The three communicators of the hierarchical topology: the flat
/// communicator covering every process, the intra-locale communicator of
/// processes sharing memory, and (on intra-locale leaders only) the
/// inter-locale communicator of locale representatives.
pub struct LocaleComms<C> {
    comm: C,
    intra_locale_comm: C,
    inter_locale_comm: Option<C>,
    num_locales: usize,
}

impl<C: TopologyCommunicator> LocaleComms<C> {
    pub fn new(comm: C) -> Result<Self> {
        Self::with_comms(comm, None, None)
    }

    /// Builds the topology, reusing pre-split communicators when the
    /// caller already holds them. Every process of `comm` must enter
    /// this constructor; it is a sequence of collectives.
    pub fn with_comms(
        comm: C,
        intra_locale_comm: Option<C>,
        inter_locale_comm: Option<C>,
    ) -> Result<Self> {
        let intra_locale_comm = match intra_locale_comm {
            Some(intra) => intra,
            None => {
                debug!("BEG: splitting flat communicator by shared-memory type");
                let intra = comm.split_shared();
                debug!("END: splitting flat communicator by shared-memory type");
                intra
            }
        };
        let is_leader = intra_locale_comm.rank() == 0;
        debug!("BEG: all-reduce to count locales");
        let num_locales = comm.all_reduce_sum(is_leader as i64) as usize;
        debug!("END: all-reduce to count locales, got {}", num_locales);

        let inter_locale_comm = if num_locales > 1 {
            match inter_locale_comm {
                Some(inter) => Some(inter),
                None => {
                    debug!("BEG: coloured split to form inter-locale communicator");
                    let inter = comm.split_by_color(if is_leader { Some(0) } else { None });
                    debug!("END: coloured split to form inter-locale communicator");
                    inter
                }
            }
        } else if inter_locale_comm.is_some() {
            return Err(NdlocaleError::config(
                comm.rank(),
                "got an inter-locale communicator with num_locales <= 1",
            ));
        } else {
            None
        };

        Ok(Self {
            comm,
            intra_locale_comm,
            inter_locale_comm,
            num_locales,
        })
    }

    /// Number of locales the flat communicator was split into.
    pub fn num_locales(&self) -> usize {
        self.num_locales
    }

    /// The flat communicator, a super-set of the intra- and inter-locale
    /// communicators.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn intra_locale_comm(&self) -> &C {
        &self.intra_locale_comm
    }

    /// `None` on processes that are not their locale's representative,
    /// and everywhere when there is a single locale.
    pub fn inter_locale_comm(&self) -> Option<&C> {
        self.inter_locale_comm.as_ref()
    }

    /// Inter-locale rank to flat rank, computed on leaders by group
    /// translation.
    pub fn inter_locale_rank_to_rank_map(&self) -> Option<Vec<Rank>> {
        self.inter_locale_comm
            .as_ref()
            .map(|inter| inter.translate_ranks_to(&self.comm))
    }

    pub fn this_locale_rank_info(&self) -> Option<ThisLocaleInfo> {
        self.inter_locale_comm.as_ref().map(|inter| ThisLocaleInfo {
            inter_locale_rank: inter.rank(),
            rank: self.comm.rank(),
        })
    }
}

/// A [`LocaleComms`] with a cartesian grid laid over the inter-locale
/// communicator.
///
/// The cartesian communicator is owned by this instance and must outlive
/// every distribution referring to it.
pub struct CartLocaleComms<C: TopologyCommunicator> {
    locale_comms: LocaleComms<C>,
    dims: Array1<Index>,
    cart_comm: Option<C::Cart>,
}

impl<C: TopologyCommunicator> CartLocaleComms<C> {
    /// Builds the cartesian topology. One of `ndims` or `dims` must be
    /// given; zero entries of `dims` are filled so the grid has exactly
    /// one cell per locale.
    pub fn new(
        ndims: Option<usize>,
        dims: Option<&[Index]>,
        comm: C,
        intra_locale_comm: Option<C>,
        inter_locale_comm: Option<C>,
    ) -> Result<Self> {
        let ndims = match (ndims, dims) {
            (None, None) => {
                return Err(NdlocaleError::config(
                    comm.rank(),
                    "must specify one of dims or ndims for a cartesian topology",
                ))
            }
            (Some(n), Some(d)) if d.len() != n => {
                return Err(NdlocaleError::config(
                    comm.rank(),
                    format!("length of dims (len(dims)={}) not equal to ndims={}", d.len(), n),
                ))
            }
            (Some(n), _) => n,
            (None, Some(d)) => d.len(),
        };
        let locale_comms = LocaleComms::with_comms(comm, intra_locale_comm, inter_locale_comm)?;
        let rank = locale_comms.comm().rank();
        let zeros = vec![0; ndims];
        let dims = resolve_dims(dims.unwrap_or(&zeros), locale_comms.num_locales())
            .map_err(|err| err.on_rank(rank))?;

        let cart_comm = match locale_comms.inter_locale_comm() {
            Some(inter) if locale_comms.num_locales() > 1 => {
                debug!(
                    "BEG: creating cartesian topology with dims {:?}",
                    dims.as_slice().unwrap()
                );
                let cart = inter.create_cartesian(dims.as_slice().unwrap())?;
                debug!("END: creating cartesian topology");
                Some(cart)
            }
            _ => None,
        };
        Ok(Self {
            locale_comms,
            dims,
            cart_comm,
        })
    }

    /// The number of partitions along each array axis.
    pub fn dims(&self) -> &Array1<Index> {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn num_locales(&self) -> usize {
        self.locale_comms.num_locales()
    }

    pub fn comm(&self) -> &C {
        self.locale_comms.comm()
    }

    pub fn intra_locale_comm(&self) -> &C {
        self.locale_comms.intra_locale_comm()
    }

    pub fn inter_locale_comm(&self) -> Option<&C> {
        self.locale_comms.inter_locale_comm()
    }

    pub fn cart_comm(&self) -> Option<&C::Cart> {
        self.cart_comm.as_ref()
    }

    pub fn have_valid_cart_comm(&self) -> bool {
        self.cart_comm.is_some()
    }

    /// Cartesian coordinate to cartesian rank, known on leaders.
    pub fn cart_coord_to_cart_rank_map(&self) -> Option<HashMap<Vec<Index>, Rank>> {
        self.cart_comm.as_ref().map(|cart| {
            (0..cart.size() as Rank)
                .map(|cart_rank| (cart.rank_to_coords(cart_rank), cart_rank))
                .collect()
        })
    }

    /// Cartesian rank to flat rank, known on leaders.
    pub fn inter_locale_rank_to_rank_map(&self) -> Option<Vec<Rank>> {
        self.cart_comm
            .as_ref()
            .map(|cart| cart.translate_ranks_to(self.locale_comms.comm()))
    }

    pub fn this_locale_rank_info(&self) -> ThisLocaleInfo {
        match &self.cart_comm {
            Some(cart) => ThisLocaleInfo {
                inter_locale_rank: cart.rank(),
                rank: self.comm().rank(),
            },
            None => ThisLocaleInfo {
                inter_locale_rank: 0,
                rank: 0,
            },
        }
    }
}
