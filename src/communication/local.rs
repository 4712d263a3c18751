use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;

use super::CartCommunicator;
use super::Rank;
use super::SizedCommunicator;
use super::TopologyCommunicator;
use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::Index;

const COLOR_UNDEFINED: i64 = i64::MIN;

/// An in-process communicator: every "process" is a thread holding one
/// handle onto shared collective state. Collectives are rendezvous
/// points; every member thread must enter them in the same order, as in
/// real SPMD code.
///
/// Used to run the full topology construction without an MPI
/// installation, in tests and single-machine tools.
pub struct LocalCommunicator {
    shared: Arc<SharedState>,
    rank: Rank,
    split_seq: AtomicU64,
}

struct SharedState {
    size: usize,
    /// Simulated shared-memory node of each member rank.
    node_ids: Vec<i32>,
    /// World rank of each member; the basis of group translation.
    world_ranks: Vec<Rank>,
    round: Mutex<Round>,
    round_cond: Condvar,
    subcomms: Mutex<HashMap<(u64, i64), SubEntry>>,
    subcomm_cond: Condvar,
}

struct Round {
    deposited: usize,
    drained: usize,
    collecting_done: bool,
    data: Vec<Option<Vec<i64>>>,
}

struct SubEntry {
    shared: Arc<SharedState>,
    taken: usize,
}

impl SharedState {
    fn new(node_ids: Vec<i32>, world_ranks: Vec<Rank>) -> Self {
        let size = node_ids.len();
        Self {
            size,
            node_ids,
            world_ranks,
            round: Mutex::new(Round {
                deposited: 0,
                drained: 0,
                collecting_done: false,
                data: vec![None; size],
            }),
            round_cond: Condvar::new(),
            subcomms: Mutex::new(HashMap::new()),
            subcomm_cond: Condvar::new(),
        }
    }
}

/// Handles for `num_ranks` threads, each rank its own simulated
/// shared-memory node (so a locale is a single process).
pub fn get_local_communicators(num_ranks: usize) -> Vec<LocalCommunicator> {
    get_local_communicators_on_nodes(&(0..num_ranks as i32).collect::<Vec<_>>())
}

/// Handles for `node_ids.len()` threads; ranks with equal node ids end
/// up in the same intra-locale communicator under
/// [`TopologyCommunicator::split_shared`].
pub fn get_local_communicators_on_nodes(node_ids: &[i32]) -> Vec<LocalCommunicator> {
    let world_ranks = (0..node_ids.len() as Rank).collect();
    let shared = Arc::new(SharedState::new(node_ids.to_vec(), world_ranks));
    (0..node_ids.len() as Rank)
        .map(|rank| LocalCommunicator {
            shared: shared.clone(),
            rank,
            split_seq: AtomicU64::new(0),
        })
        .collect()
}

impl LocalCommunicator {
    /// One payload in, everybody's payloads out. The single primitive all
    /// other collectives are built from.
    fn all_gather(&self, payload: Vec<i64>) -> Vec<Vec<i64>> {
        if self.shared.size == 1 {
            return vec![payload];
        }
        let mut round = self.shared.round.lock().unwrap();
        // A fresh collective may not start until the previous round has
        // been drained by every member.
        while round.collecting_done {
            round = self.shared.round_cond.wait(round).unwrap();
        }
        round.data[self.rank as usize] = Some(payload);
        round.deposited += 1;
        if round.deposited == self.shared.size {
            round.collecting_done = true;
            self.shared.round_cond.notify_all();
        }
        while !round.collecting_done {
            round = self.shared.round_cond.wait(round).unwrap();
        }
        let result = round
            .data
            .iter()
            .map(|d| d.clone().expect("every member deposited"))
            .collect();
        round.drained += 1;
        if round.drained == self.shared.size {
            round.deposited = 0;
            round.drained = 0;
            round.collecting_done = false;
            for slot in round.data.iter_mut() {
                *slot = None;
            }
            self.shared.round_cond.notify_all();
        }
        result
    }

    fn make_subcommunicator(&self, split_id: u64, color: i64, members: &[usize]) -> Self {
        let new_rank = members
            .iter()
            .position(|&r| r == self.rank as usize)
            .expect("caller is a member") as Rank;
        let key = (split_id, color);
        if new_rank == 0 {
            let node_ids = members.iter().map(|&r| self.shared.node_ids[r]).collect();
            let world_ranks = members
                .iter()
                .map(|&r| self.shared.world_ranks[r])
                .collect();
            let shared = Arc::new(SharedState::new(node_ids, world_ranks));
            let mut subcomms = self.shared.subcomms.lock().unwrap();
            subcomms.insert(key, SubEntry { shared, taken: 0 });
            self.shared.subcomm_cond.notify_all();
        }
        let mut subcomms = self.shared.subcomms.lock().unwrap();
        loop {
            if let Some(entry) = subcomms.get_mut(&key) {
                let shared = entry.shared.clone();
                entry.taken += 1;
                if entry.taken == shared.size {
                    subcomms.remove(&key);
                }
                return LocalCommunicator {
                    shared,
                    rank: new_rank,
                    split_seq: AtomicU64::new(0),
                };
            }
            subcomms = self.shared.subcomm_cond.wait(subcomms).unwrap();
        }
    }
}

impl SizedCommunicator for LocalCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }
}

impl TopologyCommunicator for LocalCommunicator {
    type Cart = LocalCartCommunicator;

    fn split_shared(&self) -> Self {
        let node_id = self.shared.node_ids[self.rank as usize];
        self.split_by_color(Some(node_id))
            .expect("every process belongs to its own node group")
    }

    fn split_by_color(&self, color: Option<i32>) -> Option<Self> {
        let split_id = self.split_seq.fetch_add(1, Ordering::Relaxed);
        let my_color = color.map(|c| c as i64).unwrap_or(COLOR_UNDEFINED);
        let colors = self.all_gather(vec![my_color]);
        let color = color? as i64;
        let members: Vec<usize> = colors
            .iter()
            .enumerate()
            .filter(|(_, c)| c[0] == color)
            .map(|(r, _)| r)
            .collect();
        Some(self.make_subcommunicator(split_id, color, &members))
    }

    fn all_reduce_sum(&self, value: i64) -> i64 {
        self.all_gather(vec![value]).iter().map(|v| v[0]).sum()
    }

    fn create_cartesian(&self, dims: &[Index]) -> Result<LocalCartCommunicator> {
        let product: Index = dims.iter().product();
        if product != self.size() as Index {
            return Err(NdlocaleError::Topology {
                rank: self.rank,
                reason: format!(
                    "cartesian dims {:?} do not cover communicator of size {}",
                    dims,
                    self.size()
                ),
            });
        }
        // Keeps rank order; a reorder is permitted but never required.
        let base = self
            .split_by_color(Some(0))
            .expect("all members share the colour");
        Ok(LocalCartCommunicator {
            base,
            dims: dims.to_vec(),
        })
    }

    fn translate_ranks_to(&self, target: &Self) -> Vec<Rank> {
        self.shared
            .world_ranks
            .iter()
            .map(|w| {
                target
                    .shared
                    .world_ranks
                    .iter()
                    .position(|t| t == w)
                    .expect("target group contains all members") as Rank
            })
            .collect()
    }

    fn broadcast_i64s(&self, root: Rank, data: &mut [i64]) {
        let all = self.all_gather(data.to_vec());
        let from_root = &all[root as usize];
        assert_eq!(
            from_root.len(),
            data.len(),
            "broadcast buffers must have equal lengths on every rank"
        );
        data.copy_from_slice(from_root);
    }
}

/// A [`LocalCommunicator`] with a row-major cartesian layout attached.
pub struct LocalCartCommunicator {
    base: LocalCommunicator,
    dims: Vec<Index>,
}

impl SizedCommunicator for LocalCartCommunicator {
    fn rank(&self) -> Rank {
        self.base.rank()
    }

    fn size(&self) -> usize {
        self.base.size()
    }
}

impl CartCommunicator for LocalCartCommunicator {
    type Base = LocalCommunicator;

    fn dims(&self) -> Vec<Index> {
        self.dims.clone()
    }

    fn coords_to_rank(&self, coords: &[Index]) -> Rank {
        assert_eq!(coords.len(), self.dims.len());
        let mut rank = 0;
        for (a, &c) in coords.iter().enumerate() {
            debug_assert!(c >= 0 && c < self.dims[a]);
            rank = rank * self.dims[a] + c;
        }
        rank as Rank
    }

    fn rank_to_coords(&self, rank: Rank) -> Vec<Index> {
        let mut coords = vec![0; self.dims.len()];
        let mut rest = rank as Index;
        for a in (0..self.dims.len()).rev() {
            coords[a] = rest % self.dims[a];
            rest /= self.dims[a];
        }
        debug_assert_eq!(rest, 0);
        coords
    }

    fn translate_ranks_to(&self, target: &LocalCommunicator) -> Vec<Rank> {
        self.base.translate_ranks_to(target)
    }
}

#[cfg(test)]
pub(crate) fn run_spmd<R, F>(comms: Vec<LocalCommunicator>, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalCommunicator) -> R + Send + Sync,
{
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| scope.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("spmd thread panicked"))
            .collect()
    })
}
