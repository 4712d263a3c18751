mod local;
mod locale_comms;

#[cfg(feature = "mpi")]
mod mpi_world;

#[cfg(test)]
pub(crate) use local::run_spmd;

pub use local::get_local_communicators;
pub use local::get_local_communicators_on_nodes;
pub use local::LocalCartCommunicator;
pub use local::LocalCommunicator;
pub use locale_comms::CartLocaleComms;
pub use locale_comms::LocaleComms;
pub use locale_comms::ThisLocaleInfo;

#[cfg(feature = "mpi")]
pub use mpi_world::MpiCartCommunicator;
#[cfg(feature = "mpi")]
pub use mpi_world::MpiCommunicator;

#[cfg(feature = "mpi")]
pub type Rank = mpi::Rank;
#[cfg(not(feature = "mpi"))]
pub type Rank = i32;

use crate::error::Result;
use crate::indexing::Index;

pub trait SizedCommunicator {
    fn rank(&self) -> Rank;

    fn size(&self) -> usize;
}

/// The communicator operations the topology construction consumes. The
/// crate treats communicators as opaque handles; it never duplicates or
/// frees them.
///
/// Splits that exclude the calling process return `None`, the
/// null-communicator sentinel.
pub trait TopologyCommunicator: SizedCommunicator + Sized {
    type Cart: CartCommunicator<Base = Self>;

    /// Splits into groups of processes that can share memory.
    fn split_shared(&self) -> Self;

    /// Coloured split keyed by the caller's rank. `None` as colour means
    /// the caller takes no part in any resulting communicator.
    fn split_by_color(&self, color: Option<i32>) -> Option<Self>;

    /// Integer-sum all-reduce over every process of this communicator.
    fn all_reduce_sum(&self, value: i64) -> i64;

    /// Lays a non-periodic cartesian topology of shape `dims` over this
    /// communicator, reordering ranks if the implementation wants to.
    /// `prod(dims)` must equal the communicator size.
    fn create_cartesian(&self, dims: &[Index]) -> Result<Self::Cart>;

    /// Translates every rank of this communicator into the rank space of
    /// `target`, whose group must contain all of this communicator's
    /// processes.
    fn translate_ranks_to(&self, target: &Self) -> Vec<Rank>;

    /// Broadcasts `data` from `root` to every process of this
    /// communicator. Every caller must pass a buffer of the same length.
    fn broadcast_i64s(&self, root: Rank, data: &mut [i64]);
}

/// A communicator with a cartesian topology attached.
pub trait CartCommunicator: SizedCommunicator {
    type Base: TopologyCommunicator;

    fn dims(&self) -> Vec<Index>;

    fn coords_to_rank(&self, coords: &[Index]) -> Rank;

    fn rank_to_coords(&self, rank: Rank) -> Vec<Index>;

    /// See [`TopologyCommunicator::translate_ranks_to`].
    fn translate_ranks_to(&self, target: &Self::Base) -> Vec<Rank>;
}
