pub mod communication;
pub mod distribution;
pub mod error;
pub mod factory;
pub mod indexing;
pub mod logging;
pub mod split;
pub mod update;

pub mod prelude {
    pub use crate::communication::CartLocaleComms;
    pub use crate::communication::LocaleComms;
    pub use crate::communication::Rank;
    pub use crate::communication::SizedCommunicator;
    pub use crate::communication::TopologyCommunicator;
    pub use crate::distribution::BlockPartition;
    pub use crate::distribution::Distribution;
    pub use crate::distribution::GlobaleExtent;
    pub use crate::error::NdlocaleError;
    pub use crate::factory::create_block_distribution;
    pub use crate::factory::create_distribution;
    pub use crate::factory::DistribType;
    pub use crate::factory::LocaleType;
    pub use crate::indexing::HaloSpec;
    pub use crate::indexing::IndexingExtent;
    pub use crate::update::HalosUpdate;
}
