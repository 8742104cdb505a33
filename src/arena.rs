use tracing::{debug, error};

use crate::env::Env;
use crate::value::{Cell, CellId, EnvId};

/// Number of slots in one pool: one bit per slot in a u64 mask.
pub const POOL_SIZE: usize = 64;

/// Mask of a pool with every slot free. A set bit means a free slot.
pub const POOL_EMPTY: u64 = u64::MAX;

/// Default bucket count for scopes allocated without a size hint. Prime.
pub const ENV_DEFAULT_BUCKETS: usize = 1021;

/// A fixed block of cell slots with an in-band free/used bitmask.
struct CellPool {
    slots: Vec<Cell>,
    mask: u64,
}

impl CellPool {
    fn new() -> Self {
        CellPool {
            slots: vec![Cell::None; POOL_SIZE],
            mask: POOL_EMPTY,
        }
    }
}

/// A fixed block of scope slots with an in-band free/used bitmask.
struct EnvPool {
    slots: Vec<Env>,
    mask: u64,
}

impl EnvPool {
    fn new() -> Self {
        EnvPool {
            slots: vec![Env::default(); POOL_SIZE],
            mask: POOL_EMPTY,
        }
    }
}

/// Pool counts and free-slot totals, for lifecycle logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub cell_pools: usize,
    pub env_pools: usize,
    pub free_cells: usize,
    pub free_envs: usize,
}

/// Owns all storage for cells and scopes. Pools are created lazily on
/// demand and grow monotonically; slot reuse happens only after the
/// collector frees a bit.
pub struct Arena {
    cells: Vec<CellPool>,
    envs: Vec<EnvPool>,
}

impl Arena {
    pub fn new() -> Self {
        let arena = Arena {
            cells: Vec::new(),
            envs: Vec::new(),
        };
        debug!("arena: created");
        arena
    }

    /// Allocate a cell slot and move `cell` into it.
    ///
    /// Pools are scanned newest-first and the least-significant free bit of
    /// the first non-full mask wins, reproducing the prepend-and-scan-head
    /// order of the original allocator. Resetting the slot before the write
    /// drops any string backing storage left behind by the sweep.
    pub fn alloc_cell(&mut self, cell: Cell) -> CellId {
        let (pool_idx, pos) = match find_free_slot(self.cells.iter().map(|p| p.mask)) {
            Some(found) => found,
            None => {
                self.cells.push(CellPool::new());
                debug!(pool = self.cells.len() - 1, "arena: created cell pool");
                (self.cells.len() - 1, 0)
            }
        };
        let pool = &mut self.cells[pool_idx];
        pool.mask &= !(1u64 << pos);
        pool.slots[pos] = cell;
        CellId((pool_idx * POOL_SIZE + pos) as u32)
    }

    /// Allocate a scope slot. A fresh slot gets a bucket array sized `hint`
    /// (0 means the default); a reused slot keeps the bucket array it was
    /// born with and only has its chains cleared.
    pub fn alloc_env(&mut self, hint: usize) -> EnvId {
        let (pool_idx, pos) = match find_free_slot(self.envs.iter().map(|p| p.mask)) {
            Some(found) => found,
            None => {
                self.envs.push(EnvPool::new());
                debug!(pool = self.envs.len() - 1, "arena: created env pool");
                (self.envs.len() - 1, 0)
            }
        };
        let pool = &mut self.envs[pool_idx];
        pool.mask &= !(1u64 << pos);
        let env = &mut pool.slots[pos];
        if env.buckets.is_empty() {
            let size = if hint == 0 { ENV_DEFAULT_BUCKETS } else { hint };
            env.init_buckets(size);
            debug!(buckets = size, "arena: created env");
        } else {
            env.reset();
            debug!(buckets = env.buckets.len(), "arena: reusing env");
        }
        EnvId((pool_idx * POOL_SIZE + pos) as u32)
    }

    /// Set every pool's mask to all-free, both lists. This is the sweep
    /// phase's bulk reclaim: O(number of pools), not O(live objects).
    pub fn reset_to_empty(&mut self) {
        for pool in &mut self.cells {
            pool.mask = POOL_EMPTY;
        }
        for pool in &mut self.envs {
            pool.mask = POOL_EMPTY;
        }
    }

    /// Range check: does this handle point into an allocated pool slot?
    pub fn contains_cell(&self, id: CellId) -> bool {
        (id.0 as usize) < self.cells.len() * POOL_SIZE
    }

    pub fn contains_env(&self, id: EnvId) -> bool {
        (id.0 as usize) < self.envs.len() * POOL_SIZE
    }

    /// Is this slot marked in-use? A handle outside every pool is a
    /// programmer error, not a recoverable condition.
    pub fn is_cell_used(&self, id: CellId) -> bool {
        debug_assert!(self.contains_cell(id), "foreign cell handle {:?}", id);
        if !self.contains_cell(id) {
            error!(?id, "arena: cell handle outside every pool");
            return false;
        }
        let (pool, pos) = split(id.0);
        self.cells[pool].mask & (1u64 << pos) == 0
    }

    pub fn is_env_used(&self, id: EnvId) -> bool {
        debug_assert!(self.contains_env(id), "foreign env handle {:?}", id);
        if !self.contains_env(id) {
            error!(?id, "arena: env handle outside every pool");
            return false;
        }
        let (pool, pos) = split(id.0);
        self.envs[pool].mask & (1u64 << pos) == 0
    }

    /// Clear the slot's free bit (mark phase).
    pub fn mark_cell_used(&mut self, id: CellId) {
        debug_assert!(self.contains_cell(id), "foreign cell handle {:?}", id);
        if !self.contains_cell(id) {
            error!(?id, "arena: cell handle outside every pool");
            return;
        }
        let (pool, pos) = split(id.0);
        self.cells[pool].mask &= !(1u64 << pos);
    }

    pub fn mark_env_used(&mut self, id: EnvId) {
        debug_assert!(self.contains_env(id), "foreign env handle {:?}", id);
        if !self.contains_env(id) {
            error!(?id, "arena: env handle outside every pool");
            return;
        }
        let (pool, pos) = split(id.0);
        self.envs[pool].mask &= !(1u64 << pos);
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        let (pool, pos) = split(id.0);
        &self.cells[pool].slots[pos]
    }

    pub(crate) fn env(&self, id: EnvId) -> &Env {
        let (pool, pos) = split(id.0);
        &self.envs[pool].slots[pos]
    }

    pub(crate) fn env_mut(&mut self, id: EnvId) -> &mut Env {
        let (pool, pos) = split(id.0);
        &mut self.envs[pool].slots[pos]
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            cell_pools: self.cells.len(),
            env_pools: self.envs.len(),
            free_cells: self.cells.iter().map(|p| p.mask.count_ones() as usize).sum(),
            free_envs: self.envs.iter().map(|p| p.mask.count_ones() as usize).sum(),
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

fn split(raw: u32) -> (usize, usize) {
    (raw as usize / POOL_SIZE, raw as usize % POOL_SIZE)
}

/// First pool (newest-first) with a free bit, and the lowest such bit.
fn find_free_slot(masks: impl DoubleEndedIterator<Item = u64> + ExactSizeIterator) -> Option<(usize, usize)> {
    for (idx, mask) in masks.enumerate().rev() {
        if mask != 0 {
            return Some((idx, mask.trailing_zeros() as usize));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn allocation_takes_lowest_free_bit_first() {
        let mut arena = Arena::new();
        let a = arena.alloc_cell(Cell::Int(1));
        let b = arena.alloc_cell(Cell::Int(2));
        assert_eq!(a, CellId(0));
        assert_eq!(b, CellId(1));
        assert_eq!(arena.cells[0].mask, POOL_EMPTY & !0b11);
    }

    #[test]
    fn full_pool_grows_a_new_one() {
        let mut arena = Arena::new();
        for j in 0..POOL_SIZE {
            arena.alloc_cell(Cell::Int(j as i64));
        }
        assert_eq!(arena.cells.len(), 1);
        assert_eq!(arena.cells[0].mask, 0);

        let next = arena.alloc_cell(Cell::Int(64));
        assert_eq!(arena.cells.len(), 2);
        assert_eq!(next, CellId(POOL_SIZE as u32));
    }

    #[test]
    fn reset_and_remark_yields_exact_mask() {
        let mut arena = Arena::new();
        let ids: Vec<CellId> = (0..POOL_SIZE)
            .map(|j| arena.alloc_cell(Cell::Int(j as i64)))
            .collect();
        assert_eq!(arena.cells[0].mask, 0);

        arena.reset_to_empty();
        assert_eq!(arena.cells[0].mask, POOL_EMPTY);

        arena.mark_cell_used(ids[1]);
        arena.mark_cell_used(ids[6]);
        arena.mark_cell_used(ids[6]); // marking is idempotent
        assert_eq!(arena.cells[0].mask, POOL_EMPTY & !(1 << 1) & !(1 << 6));

        assert!(arena.is_cell_used(ids[1]));
        assert!(arena.is_cell_used(ids[6]));
        assert!(!arena.is_cell_used(ids[0]));
    }

    #[test]
    fn reuse_after_reset_starts_at_slot_zero() {
        let mut arena = Arena::new();
        for j in 0..3 {
            arena.alloc_cell(Cell::Int(j));
        }
        arena.reset_to_empty();
        let id = arena.alloc_cell(Cell::Int(7));
        assert_eq!(id, CellId(0));
    }

    #[test]
    fn slot_reuse_replaces_string_contents() {
        let mut arena = Arena::new();
        let id = arena.alloc_cell(Cell::Str("gone after sweep".into()));
        arena.reset_to_empty();
        let reused = arena.alloc_cell(Cell::Int(3));
        assert_eq!(reused, id);
        assert!(matches!(arena.cell(reused), Cell::Int(3)));
    }

    #[test]
    fn foreign_handle_is_distinguishable_from_unmarked() {
        let arena = Arena::new();
        assert!(!arena.contains_cell(CellId(0)));
        assert!(!arena.contains_env(EnvId(0)));
    }

    #[test]
    #[should_panic(expected = "foreign cell handle")]
    fn marking_a_foreign_handle_asserts() {
        let mut arena = Arena::new();
        arena.alloc_cell(Cell::Int(1));
        arena.mark_cell_used(CellId(9999));
    }

    #[test]
    fn env_slot_reuse_keeps_bucket_array() {
        let mut arena = Arena::new();
        let env = arena.alloc_env(4);
        assert_eq!(arena.env(env).buckets.len(), 4);

        arena.reset_to_empty();
        // Reused with a different hint: the original bucket array survives.
        let reused = arena.alloc_env(99);
        assert_eq!(reused, env);
        assert_eq!(arena.env(reused).buckets.len(), 4);
        assert!(arena.env(reused).parent.is_none());
    }

    #[test]
    fn env_default_bucket_count() {
        let mut arena = Arena::new();
        let env = arena.alloc_env(0);
        assert_eq!(arena.env(env).buckets.len(), ENV_DEFAULT_BUCKETS);
    }

    proptest! {
        #[test]
        fn remark_of_any_subset_matches_its_mask(
            subset in proptest::collection::hash_set(0usize..POOL_SIZE, 0..POOL_SIZE)
        ) {
            let mut arena = Arena::new();
            let ids: Vec<CellId> = (0..POOL_SIZE)
                .map(|j| arena.alloc_cell(Cell::Int(j as i64)))
                .collect();
            arena.reset_to_empty();

            for &slot in &subset {
                arena.mark_cell_used(ids[slot]);
            }

            let mut expected = POOL_EMPTY;
            for &slot in &subset {
                expected &= !(1u64 << slot);
            }
            prop_assert_eq!(arena.cells[0].mask, expected);
        }
    }
}
