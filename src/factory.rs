use std::collections::HashMap;
use std::str::FromStr;

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::communication::CartCommunicator;
use crate::communication::CartLocaleComms;
use crate::communication::Rank;
use crate::communication::SizedCommunicator;
use crate::communication::ThisLocaleInfo;
use crate::communication::TopologyCommunicator;
use crate::distribution::BlockPartition;
use crate::distribution::CartLocaleExtent;
use crate::distribution::Distribution;
use crate::distribution::GlobaleExtent;
use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::HaloSpec;
use crate::indexing::Index;

/// How the globale extent is carved over the locale grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistribType {
    /// General cartesian block partition.
    Block,
    /// All grid axes collapsed to one partition except `axis`, which is
    /// split across every locale.
    Slab { axis: usize },
}

impl FromStr for DistribType {
    type Err = NdlocaleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "slab" => Ok(Self::Slab { axis: 0 }),
            _ => Err(NdlocaleError::config(
                0,
                format!("invalid distrib_type={}, valid types are: block, slab", s),
            )),
        }
    }
}

/// What counts as a locale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocaleType {
    /// Processes sharing memory form one locale (typically a NUMA node).
    Node,
    /// Every process is its own locale.
    Process,
}

impl FromStr for LocaleType {
    type Err = NdlocaleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(Self::Node),
            "process" => Ok(Self::Process),
            _ => Err(NdlocaleError::config(
                0,
                format!("invalid locale_type={}, valid types are: node, process", s),
            )),
        }
    }
}

/// Everything a process needs to work with a distributed array: the
/// topology, the distribution, and its own place in it.
pub struct CommsAndDistribution<C: TopologyCommunicator> {
    pub locale_comms: CartLocaleComms<C>,
    pub distribution: Distribution<CartLocaleExtent>,
    pub this_locale: ThisLocaleInfo,
}

impl<C: TopologyCommunicator> CommsAndDistribution<C> {
    /// A fresh distribution of `new_shape` with `new_halo` over the
    /// existing topology. Distributions are immutable values; changing
    /// shape or halo means building a new one. The rank maps are reused,
    /// so no collective is involved; the grid dimension must stay the
    /// same.
    pub fn rebuild(
        &self,
        new_shape: &[Index],
        new_halo: &HaloSpec,
    ) -> Result<Distribution<CartLocaleExtent>> {
        let rank = self.locale_comms.comm().rank();
        if new_shape.len() != self.locale_comms.ndim() {
            return Err(NdlocaleError::config(
                rank,
                format!(
                    "cannot rebuild a {}-dimensional topology for shape {:?}",
                    self.locale_comms.ndim(),
                    new_shape
                ),
            ));
        }
        let coord_map: HashMap<Vec<Index>, Rank> = self
            .distribution
            .locale_extents()
            .iter()
            .map(|e| (e.cart_coord().to_vec(), e.cart_rank()))
            .collect();
        BlockPartition::new(
            GlobaleExtent::from_shape(new_shape),
            self.locale_comms.dims(),
            &coord_map,
            new_halo,
            self.distribution
                .inter_locale_rank_to_rank()
                .map(|m| m.to_vec()),
        )
        .map_err(|err| err.on_rank(rank))
    }
}

/// Builds a block distribution of `shape` over the locales of `comm`.
///
/// Every process of `comm` must call this collectively. Leaders compute
/// the cartesian maps; followers receive them over the intra-locale
/// communicator, so on return every process knows the full topology.
pub fn create_block_distribution<C: TopologyCommunicator>(
    shape: &[Index],
    locale_type: LocaleType,
    dims: Option<&[Index]>,
    halo: &HaloSpec,
    comm: C,
    intra_locale_comm: Option<C>,
    inter_locale_comm: Option<C>,
) -> Result<CommsAndDistribution<C>> {
    let intra_locale_comm = match locale_type {
        LocaleType::Process => {
            if let Some(intra) = &intra_locale_comm {
                if intra.size() > 1 {
                    return Err(NdlocaleError::config(
                        comm.rank(),
                        format!(
                            "locale_type=process, but intra_locale_comm has size {}",
                            intra.size()
                        ),
                    ));
                }
            }
            // A self-communicator per process makes every process a
            // locale leader.
            let own_rank = comm.rank();
            Some(
                comm.split_by_color(Some(own_rank))
                    .expect("every process keeps its own colour"),
            )
        }
        LocaleType::Node => intra_locale_comm,
    };

    let zeros = vec![0; shape.len()];
    let dims = dims.unwrap_or(&zeros);
    let locale_comms = CartLocaleComms::new(
        None,
        Some(dims),
        comm,
        intra_locale_comm,
        inter_locale_comm,
    )?;

    let topology = fan_out_topology(&locale_comms, shape.len())?;
    debug!(
        "topology known on rank {}: this_locale={:?}",
        locale_comms.comm().rank(),
        topology.this_locale
    );

    let rank = locale_comms.comm().rank();
    let distribution = BlockPartition::new(
        GlobaleExtent::from_shape(shape),
        locale_comms.dims(),
        &topology.cart_coord_to_cart_rank,
        halo,
        topology.inter_locale_rank_to_rank,
    )
    .map_err(|err| err.on_rank(rank))?;
    Ok(CommsAndDistribution {
        locale_comms,
        distribution,
        this_locale: topology.this_locale,
    })
}

/// Builds a distribution of `shape` with the given partitioning policy.
pub fn create_distribution<C: TopologyCommunicator>(
    shape: &[Index],
    distrib_type: DistribType,
    locale_type: LocaleType,
    dims: Option<&[Index]>,
    halo: &HaloSpec,
    comm: C,
) -> Result<CommsAndDistribution<C>> {
    match distrib_type {
        DistribType::Block => {
            create_block_distribution(shape, locale_type, dims, halo, comm, None, None)
        }
        DistribType::Slab { axis } => {
            if axis >= shape.len() {
                return Err(NdlocaleError::config(
                    comm.rank(),
                    format!(
                        "slab axis {} out of range for a {}-dimensional shape",
                        axis,
                        shape.len()
                    ),
                ));
            }
            if dims.is_some() {
                return Err(NdlocaleError::config(
                    comm.rank(),
                    "dims cannot be combined with a slab distribution",
                ));
            }
            let mut slab_dims = vec![1; shape.len()];
            slab_dims[axis] = 0;
            create_block_distribution(
                shape,
                locale_type,
                Some(&slab_dims),
                halo,
                comm,
                None,
                None,
            )
        }
    }
}

struct Topology {
    this_locale: ThisLocaleInfo,
    cart_coord_to_cart_rank: HashMap<Vec<Index>, Rank>,
    inter_locale_rank_to_rank: Option<Vec<Rank>>,
}

/// Leaders read the maps off the cartesian communicator; everyone else
/// receives them in one intra-locale broadcast. Wire layout, all i64:
/// `[inter_locale_rank, leader_rank, rank_map, coords of cart rank 0,
/// coords of cart rank 1, ...]`.
fn fan_out_topology<C: TopologyCommunicator>(
    locale_comms: &CartLocaleComms<C>,
    ndim: usize,
) -> Result<Topology> {
    let num_locales = locale_comms.num_locales();
    if num_locales == 1 {
        return Ok(Topology {
            this_locale: ThisLocaleInfo {
                inter_locale_rank: 0,
                rank: 0,
            },
            cart_coord_to_cart_rank: HashMap::from([(vec![0; ndim], 0)]),
            inter_locale_rank_to_rank: None,
        });
    }
    let mut buffer = vec![0_i64; 2 + num_locales * (ndim + 1)];
    if let Some(cart) = locale_comms.cart_comm() {
        let this_locale = locale_comms.this_locale_rank_info();
        buffer[0] = this_locale.inter_locale_rank as i64;
        buffer[1] = this_locale.rank as i64;
        let rank_map = cart.translate_ranks_to(locale_comms.comm());
        for (r, &flat) in rank_map.iter().enumerate() {
            buffer[2 + r] = flat as i64;
        }
        for cart_rank in 0..num_locales {
            let coords = cart.rank_to_coords(cart_rank as Rank);
            let offset = 2 + num_locales + cart_rank * ndim;
            buffer[offset..offset + ndim].copy_from_slice(&coords);
        }
    }
    debug!("BEG: broadcasting topology maps over the intra-locale communicator");
    locale_comms.intra_locale_comm().broadcast_i64s(0, &mut buffer);
    debug!("END: broadcasting topology maps over the intra-locale communicator");

    let this_locale = ThisLocaleInfo {
        inter_locale_rank: buffer[0] as Rank,
        rank: buffer[1] as Rank,
    };
    let inter_locale_rank_to_rank = buffer[2..2 + num_locales]
        .iter()
        .map(|&r| r as Rank)
        .collect();
    let cart_coord_to_cart_rank = (0..num_locales)
        .map(|cart_rank| {
            let offset = 2 + num_locales + cart_rank * ndim;
            (buffer[offset..offset + ndim].to_vec(), cart_rank as Rank)
        })
        .collect();
    Ok(Topology {
        this_locale,
        cart_coord_to_cart_rank,
        inter_locale_rank_to_rank: Some(inter_locale_rank_to_rank),
    })
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::create_block_distribution;
    use super::create_distribution;
    use super::DistribType;
    use super::LocaleType;
    use crate::communication::get_local_communicators;
    use crate::communication::get_local_communicators_on_nodes;
    use crate::communication::run_spmd;
    use crate::communication::SizedCommunicator;
    use crate::communication::TopologyCommunicator;
    use crate::error::NdlocaleError;
    use crate::indexing::HaloSpec;
    use crate::indexing::IndexingExtent;

    #[test]
    fn distrib_and_locale_types_parse() {
        assert_eq!("block".parse::<DistribType>().unwrap(), DistribType::Block);
        assert_eq!(
            "Slab".parse::<DistribType>().unwrap(),
            DistribType::Slab { axis: 0 }
        );
        assert!("pencil".parse::<DistribType>().is_err());
        assert_eq!("node".parse::<LocaleType>().unwrap(), LocaleType::Node);
        assert_eq!("PROCESS".parse::<LocaleType>().unwrap(), LocaleType::Process);
        assert!("socket".parse::<LocaleType>().is_err());
    }

    #[test]
    fn single_locale_no_halo() {
        let results = run_spmd(get_local_communicators(1), |comm| {
            create_block_distribution(
                &[100],
                LocaleType::Node,
                None,
                &HaloSpec::Uniform(0),
                comm,
                None,
                None,
            )
            .unwrap()
        });
        let built = &results[0];
        assert_eq!(built.distribution.num_locales(), 1);
        let extent = built.distribution.locale_extent(0);
        assert_eq!(extent.interior(), &IndexingExtent::from_shape(&[100]));
        assert_eq!(extent.halo().sum(), 0);
        assert!(built.distribution.halo_updates_for(0).is_empty());
        assert_eq!(built.this_locale.inter_locale_rank, 0);
        assert_eq!(built.this_locale.rank, 0);
    }

    #[test]
    fn four_process_locales_with_halo() {
        let results = run_spmd(get_local_communicators(4), |comm| {
            create_block_distribution(
                &[12],
                LocaleType::Process,
                None,
                &HaloSpec::Uniform(2),
                comm,
                None,
                None,
            )
            .unwrap()
        });
        for (rank, built) in results.iter().enumerate() {
            let d = &built.distribution;
            assert_eq!(d.num_locales(), 4);
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
            assert_eq!(d.get_rank(1), Some(1));
            assert_eq!(built.this_locale.inter_locale_rank, rank as i32);
            assert_eq!(built.this_locale.rank, rank as i32);
        }
    }

    #[test]
    fn followers_learn_the_topology_from_their_leader() {
        // Two locales of two processes each; ranks 1 and 3 are
        // followers and only see the maps through the broadcast.
        let comms = get_local_communicators_on_nodes(&[0, 0, 1, 1]);
        let results = run_spmd(comms, |comm| {
            let rank = comm.rank();
            let built = create_block_distribution(
                &[12],
                LocaleType::Node,
                None,
                &HaloSpec::Uniform(1),
                comm,
                None,
                None,
            )
            .unwrap();
            (rank, built)
        });
        for (rank, built) in &results {
            let d = &built.distribution;
            assert_eq!(d.num_locales(), 2);
            assert_eq!(
                d.locale_extent(0).interior(),
                &IndexingExtent::from_start_stop(&[0], &[6])
            );
            assert_eq!(
                d.locale_extent(1).interior(),
                &IndexingExtent::from_start_stop(&[6], &[12])
            );
            // Representatives are flat ranks 0 and 2.
            assert_eq!(d.inter_locale_rank_to_rank(), Some(&[0, 2][..]));
            let expected_locale = if *rank < 2 { 0 } else { 1 };
            assert_eq!(built.this_locale.inter_locale_rank, expected_locale);
            assert_eq!(built.this_locale.rank, expected_locale * 2);
        }
    }

    #[test]
    fn slab_distribution_partitions_one_axis() {
        let results = run_spmd(get_local_communicators(4), |comm| {
            create_distribution(
                &[8, 8, 8],
                DistribType::Slab { axis: 1 },
                LocaleType::Process,
                None,
                &HaloSpec::Uniform(0),
                comm,
            )
            .unwrap()
        });
        for built in &results {
            assert_eq!(built.locale_comms.dims(), &arr1(&[1, 4, 1]));
            for (r, extent) in built.distribution.locale_extents().iter().enumerate() {
                assert_eq!(extent.shape_n(), arr1(&[8, 2, 8]));
                assert_eq!(extent.start_n(), &arr1(&[0, 2 * r as i64, 0]));
            }
        }
    }

    #[test]
    fn slab_axis_and_dims_are_validated() {
        let results = run_spmd(get_local_communicators(2), |comm| {
            create_distribution(
                &[8, 8],
                DistribType::Slab { axis: 5 },
                LocaleType::Process,
                None,
                &HaloSpec::Uniform(0),
                comm,
            )
            .err()
        });
        assert!(results.iter().all(|e| e.is_some()));
    }

    #[test]
    fn process_locale_type_rejects_wide_intra_comm() {
        let comms = get_local_communicators_on_nodes(&[0, 0]);
        let results = run_spmd(comms, |comm| {
            let rank = comm.rank();
            let wide = comm.split_by_color(Some(0)).unwrap();
            let err = create_block_distribution(
                &[8],
                LocaleType::Process,
                None,
                &HaloSpec::Uniform(0),
                comm,
                Some(wide),
                None,
            )
            .err();
            (rank, err)
        });
        for (rank, err) in results {
            assert!(matches!(err, Some(NdlocaleError::Config { rank: r, .. }) if r == rank));
        }
    }

    #[test]
    fn configuration_errors_carry_the_triggering_rank() {
        // A bad halo is only noticed below the communicator layer; the
        // factory restamps the error with the calling rank.
        let results = run_spmd(get_local_communicators(3), |comm| {
            let rank = comm.rank();
            let err = create_block_distribution(
                &[9],
                LocaleType::Process,
                None,
                &HaloSpec::Uniform(-1),
                comm,
                None,
                None,
            )
            .err()
            .expect("negative halo widths must be rejected");
            (rank, err)
        });
        for (rank, err) in results {
            assert!(matches!(err, NdlocaleError::Config { rank: r, .. } if r == rank));
        }
    }

    #[test]
    fn rebuild_reuses_the_topology_for_a_new_shape() {
        let results = run_spmd(get_local_communicators(4), |comm| {
            let built = create_block_distribution(
                &[12],
                LocaleType::Process,
                None,
                &HaloSpec::Uniform(2),
                comm,
                None,
                None,
            )
            .unwrap();
            let rebuilt = built.rebuild(&[20], &HaloSpec::Uniform(1)).unwrap();
            assert!(built.rebuild(&[4, 4], &HaloSpec::Uniform(0)).is_err());
            rebuilt
        });
        for rebuilt in &results {
            assert_eq!(rebuilt.num_locales(), 4);
            assert_eq!(
                rebuilt.locale_extent(2).interior(),
                &IndexingExtent::from_start_stop(&[10], &[15])
            );
            assert_eq!(rebuilt.get_rank(3), Some(3));
        }
    }

    #[test]
    fn one_node_holding_every_process_is_one_locale() {
        let comms = get_local_communicators_on_nodes(&[0, 0, 0]);
        let results = run_spmd(comms, |comm| {
            create_block_distribution(
                &[10],
                LocaleType::Node,
                None,
                &HaloSpec::Uniform(1),
                comm,
                None,
                None,
            )
            .unwrap()
        });
        for built in &results {
            assert_eq!(built.distribution.num_locales(), 1);
            assert_eq!(
                built.distribution.locale_extent(0).interior(),
                &IndexingExtent::from_shape(&[10])
            );
            assert_eq!(built.this_locale.inter_locale_rank, 0);
            assert!(built.distribution.halo_updates_for(0).is_empty());
        }
    }

    #[test]
    fn explicit_grid_dims_are_respected() {
        let results = run_spmd(get_local_communicators(6), |comm| {
            create_block_distribution(
                &[6, 6],
                LocaleType::Process,
                Some(&[2, 3]),
                &HaloSpec::Uniform(1),
                comm,
                None,
                None,
            )
            .unwrap()
        });
        for built in &results {
            assert_eq!(built.locale_comms.dims(), &arr1(&[2, 3]));
            let total: i64 = built
                .distribution
                .locale_extents()
                .iter()
                .map(|e| e.interior().num_elements())
                .sum();
            assert_eq!(total, 36);
        }
    }
}
