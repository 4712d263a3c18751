use thiserror::Error;

use crate::communication::Rank;
use crate::indexing::Index;

/// Errors surfaced while building topologies and distributions.
///
/// Nothing at this layer is retried or swallowed: either the topology is
/// built and a plan exists, or construction fails with one of these.
/// Internal-consistency violations are bugs and panic with a diagnostic
/// instead of returning an error.
#[derive(Debug, Error)]
pub enum NdlocaleError {
    #[error("invalid configuration on rank {rank}: {reason}")]
    Config { rank: Rank, reason: String },
    #[error("topology construction failed on rank {rank}: {reason}")]
    Topology { rank: Rank, reason: String },
    #[error("cannot fill dims {dims:?} to a grid of exactly {num_locales} locales")]
    GeometricImpossibility {
        dims: Vec<Index>,
        num_locales: usize,
    },
}

impl NdlocaleError {
    /// Configuration error triggered on the given rank.
    pub fn config(rank: Rank, reason: impl Into<String>) -> Self {
        Self::Config {
            rank,
            reason: reason.into(),
        }
    }

    /// Restamps the triggering rank onto this error.
    ///
    /// Validation below the communicator layer runs identically on every
    /// rank and raises with rank 0; the collective entry points restamp
    /// the calling rank before the error reaches the user.
    pub fn on_rank(mut self, rank: Rank) -> Self {
        match &mut self {
            Self::Config { rank: r, .. } | Self::Topology { rank: r, .. } => *r = rank,
            Self::GeometricImpossibility { .. } => {}
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, NdlocaleError>;
