use log::debug;
use mpi::collective::SystemOperation;
use mpi::topology::CartesianCommunicator;
use mpi::topology::Color;
use mpi::topology::SystemCommunicator;
use mpi::topology::UserCommunicator;
use mpi::traits::*;

use super::CartCommunicator;
use super::Rank;
use super::SizedCommunicator;
use super::TopologyCommunicator;
use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::Index;

/// An MPI communicator handle, either the world communicator or one
/// produced by a split. The crate never frees the world communicator;
/// split communicators are released when dropped, after every
/// distribution referring to them.
pub enum MpiCommunicator {
    World(SystemCommunicator),
    User(UserCommunicator),
}

impl MpiCommunicator {
    /// The world communicator. MPI must have been initialised by the
    /// caller, who owns the `Universe` for the lifetime of the program.
    pub fn world() -> Self {
        Self::World(SystemCommunicator::world())
    }

    fn group(&self) -> mpi::topology::UserGroup {
        match self {
            Self::World(c) => c.group(),
            Self::User(c) => c.group(),
        }
    }
}

impl SizedCommunicator for MpiCommunicator {
    fn rank(&self) -> Rank {
        match self {
            Self::World(c) => c.rank(),
            Self::User(c) => c.rank(),
        }
    }

    fn size(&self) -> usize {
        let size = match self {
            Self::World(c) => c.size(),
            Self::User(c) => c.size(),
        };
        size as usize
    }
}

impl TopologyCommunicator for MpiCommunicator {
    type Cart = MpiCartCommunicator;

    fn split_shared(&self) -> Self {
        let key = self.rank();
        let split = match self {
            Self::World(c) => c.split_shared(key),
            Self::User(c) => c.split_shared(key),
        };
        Self::User(split)
    }

    fn split_by_color(&self, color: Option<i32>) -> Option<Self> {
        let color = match color {
            Some(c) => Color::with_value(c),
            None => Color::undefined(),
        };
        let key = self.rank();
        let split = match self {
            Self::World(c) => c.split_by_color_with_key(color, key),
            Self::User(c) => c.split_by_color_with_key(color, key),
        };
        split.map(Self::User)
    }

    fn all_reduce_sum(&self, value: i64) -> i64 {
        let mut sum = 0;
        match self {
            Self::World(c) => c.all_reduce_into(&value, &mut sum, SystemOperation::sum()),
            Self::User(c) => c.all_reduce_into(&value, &mut sum, SystemOperation::sum()),
        }
        sum
    }

    fn create_cartesian(&self, dims: &[Index]) -> Result<MpiCartCommunicator> {
        let dims: Vec<mpi::Count> = dims.iter().map(|&d| d as mpi::Count).collect();
        let periods = vec![false; dims.len()];
        debug!("creating cartesian communicator with dims {:?}", dims);
        let cart = match self {
            Self::World(c) => c.create_cartesian_communicator(&dims, &periods, true),
            Self::User(c) => c.create_cartesian_communicator(&dims, &periods, true),
        };
        cart.map(MpiCartCommunicator).ok_or_else(|| NdlocaleError::Topology {
            rank: self.rank(),
            reason: format!("cartesian topology creation over dims {:?} failed", dims),
        })
    }

    fn translate_ranks_to(&self, target: &Self) -> Vec<Rank> {
        let own_group = self.group();
        let target_group = target.group();
        (0..self.size() as Rank)
            .map(|r| {
                own_group
                    .translate_rank(r, &target_group)
                    .expect("target group contains all members")
            })
            .collect()
    }

    fn broadcast_i64s(&self, root: Rank, data: &mut [i64]) {
        match self {
            Self::World(c) => c.process_at_rank(root).broadcast_into(data),
            Self::User(c) => c.process_at_rank(root).broadcast_into(data),
        }
    }
}

/// A cartesian MPI communicator; coordinate translation is delegated to
/// MPI so a reordered topology keeps its own layout.
pub struct MpiCartCommunicator(CartesianCommunicator);

impl SizedCommunicator for MpiCartCommunicator {
    fn rank(&self) -> Rank {
        self.0.rank()
    }

    fn size(&self) -> usize {
        self.0.size() as usize
    }
}

impl CartCommunicator for MpiCartCommunicator {
    type Base = MpiCommunicator;

    fn dims(&self) -> Vec<Index> {
        self.0
            .get_layout()
            .dims
            .iter()
            .map(|&d| d as Index)
            .collect()
    }

    fn coords_to_rank(&self, coords: &[Index]) -> Rank {
        let coords: Vec<mpi::Count> = coords.iter().map(|&c| c as mpi::Count).collect();
        self.0.coordinates_to_rank(&coords)
    }

    fn rank_to_coords(&self, rank: Rank) -> Vec<Index> {
        self.0
            .rank_to_coordinates(rank)
            .iter()
            .map(|&c| c as Index)
            .collect()
    }

    fn translate_ranks_to(&self, target: &MpiCommunicator) -> Vec<Rank> {
        let own_group = self.0.group();
        let target_group = target.group();
        (0..self.size() as Rank)
            .map(|r| {
                own_group
                    .translate_rank(r, &target_group)
                    .expect("target group contains all members")
            })
            .collect()
    }
}
