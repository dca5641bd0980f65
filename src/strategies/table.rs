//! Transposition tables.
//!
//! Both tables are fixed-size arrays indexed by the low bits of the
//! position key, so memory is capped up front. An entry only answers a
//! query for the same full key, the same node role, and a requested depth
//! no deeper than the one it was searched to.

use super::util::{from_table, to_table};
use crate::interface::*;
use parking_lot::Mutex;
use serde::Deserialize;
use std::cmp::{max, min};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum EntryFlag {
    Exact,
    Upperbound,
    Lowerbound,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Strategies for when to overwrite entries in the transposition table.
pub enum Replacement {
    Always,
    DepthPreferred,
    TwoTier,
}

#[derive(Copy, Clone)]
pub(super) struct Entry<M> {
    pub(super) hash: u64,
    pub(super) role: Role,
    pub(super) value: Evaluation,
    pub(super) depth: u8,
    pub(super) flag: EntryFlag,
    pub(super) generation: u8,
    pub(super) best_move: Option<M>,
}

impl<M> Entry<M> {
    fn empty() -> Self {
        Entry {
            hash: 0,
            role: Role::Maximize,
            value: 0,
            depth: 0,
            flag: EntryFlag::Exact,
            generation: 0,
            best_move: None,
        }
    }

    fn matches(&self, hash: u64, role: Role) -> bool {
        self.hash == hash && self.role == role && self.best_move.is_some()
    }
}

// Spread the role into the index so a position searched under two roles
// doesn't fight over one slot.
fn slot(hash: u64, role: Role, mask: usize) -> usize {
    let salt = match role {
        Role::Maximize => 0,
        Role::Minimize => 0x9e37_79b9_7f4a_7c15,
        Role::Expect => 0xc2b2_ae3d_27d4_eb4f,
    };
    ((hash ^ salt) as usize) & mask
}

fn bound_flag(alpha_orig: Evaluation, beta_orig: Evaluation, best: Evaluation) -> EntryFlag {
    if best <= alpha_orig {
        EntryFlag::Upperbound
    } else if best >= beta_orig {
        EntryFlag::Lowerbound
    } else {
        EntryFlag::Exact
    }
}

// A trait for a transposition table. The methods are mutual exclusion, but
// the idea is that an implementation can wrap a shared concurrent table.
pub(super) trait Table<M: Copy> {
    fn lookup(&self, hash: u64, role: Role) -> Option<Entry<M>>;
    fn store(&self, entry: Entry<M>);
    fn advance_generation(&self);
    fn generation(&self) -> u8;

    // Check and update search state based on any transposition table hit.
    // Returns Some(value) when the entry settles this node.
    // Returns None, updating mutable arguments, if the search should continue to explore this node.
    fn check(
        &self, hash: u64, role: Role, depth: u8, ply: u8, good_move: &mut Option<M>,
        alpha: &mut Evaluation, beta: &mut Evaluation,
    ) -> Option<Evaluation> {
        let entry = self.lookup(hash, role)?;
        *good_move = entry.best_move;
        if entry.depth < depth {
            // Too shallow to answer; only the move hint is usable.
            return None;
        }
        let value = from_table(entry.value, ply);
        match entry.flag {
            EntryFlag::Exact => return Some(value),
            EntryFlag::Lowerbound => *alpha = max(*alpha, value),
            EntryFlag::Upperbound => *beta = min(*beta, value),
        }
        if *alpha >= *beta {
            return Some(value);
        }
        None
    }

    // Update table based on search results. Expectation nodes always
    // search every child with a full window, so their value is exact.
    #[allow(clippy::too_many_arguments)]
    fn update(
        &self, hash: u64, role: Role, alpha_orig: Evaluation, beta_orig: Evaluation, depth: u8,
        ply: u8, best: Evaluation, best_move: M,
    ) {
        let flag =
            if role.prunes() { bound_flag(alpha_orig, beta_orig, best) } else { EntryFlag::Exact };
        self.store(Entry {
            hash,
            role,
            value: to_table(best, ply),
            depth,
            flag,
            generation: self.generation(),
            best_move: Some(best_move),
        });
    }

    // After finishing a search, populate the principal variation as deep as
    // the table remembers it.
    fn populate_pv<V>(&self, pv: &mut Vec<M>, v: &mut V, role_of: impl Fn(&V) -> Role, mut depth: u8)
    where
        V: GameView<Action = M>,
    {
        pv.clear();
        while let Some(entry) = self.lookup(v.position_key(), role_of(v)) {
            let m = match entry.best_move {
                Some(m) => m,
                None => break,
            };
            if v.apply(m).is_err() {
                break;
            }
            pv.push(m);
            // Prevent cyclical PVs from being infinitely long.
            if depth == 0 || v.is_terminal() {
                break;
            }
            depth -= 1;
        }
        // Restore state.
        for m in pv.iter().rev() {
            v.undo(*m);
        }
    }
}

impl<M: Copy, T: Table<M>> Table<M> for Arc<T> {
    fn lookup(&self, hash: u64, role: Role) -> Option<Entry<M>> {
        (**self).lookup(hash, role)
    }
    fn store(&self, entry: Entry<M>) {
        (**self).store(entry)
    }
    fn advance_generation(&self) {
        (**self).advance_generation()
    }
    fn generation(&self) -> u8 {
        (**self).generation()
    }
}

/// Single-threaded table with a selectable replacement strategy.
pub(super) struct TranspositionTable<M> {
    table: Vec<std::cell::Cell<Entry<M>>>,
    mask: usize,
    // Incremented for each decision. Values from old generations are
    // always overwritten.
    generation: std::cell::Cell<u8>,
    strategy: Replacement,
}

impl<M: Copy> TranspositionTable<M> {
    pub(super) fn new(table_byte_size: usize, strategy: Replacement) -> Self {
        let size = (table_byte_size / std::mem::size_of::<Entry<M>>()).next_power_of_two().max(2);
        let mask = if strategy == Replacement::TwoTier { (size - 1) & !1 } else { size - 1 };
        let table = (0..size).map(|_| std::cell::Cell::new(Entry::empty())).collect();
        Self { table, mask, generation: std::cell::Cell::new(0), strategy }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.table.len()
    }
}

impl<M: Copy> Table<M> for TranspositionTable<M> {
    fn lookup(&self, hash: u64, role: Role) -> Option<Entry<M>> {
        let index = slot(hash, role, self.mask);
        let entry = self.table[index].get();
        if entry.matches(hash, role) {
            return Some(entry);
        }
        if self.strategy == Replacement::TwoTier {
            let entry = self.table[index + 1].get();
            if entry.matches(hash, role) {
                return Some(entry);
            }
        }
        None
    }

    fn store(&self, new_entry: Entry<M>) {
        let index = slot(new_entry.hash, new_entry.role, self.mask);
        let current = self.table[index].get();
        let replaceable =
            current.generation != new_entry.generation || current.depth <= new_entry.depth;
        let dest = match self.strategy {
            Replacement::Always => Some(index),
            Replacement::DepthPreferred => replaceable.then_some(index),
            // index points to the first of a pair of entries, the
            // depth-preferred entry and the always-replace entry.
            Replacement::TwoTier => Some(if replaceable { index } else { index + 1 }),
        };
        if let Some(dest) = dest {
            self.table[dest].set(new_entry);
        }
    }

    fn advance_generation(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        trace!(generation = self.generation.get(), "advanced table generation");
    }

    fn generation(&self) -> u8 {
        self.generation.get()
    }
}

/// A table shared between threads. Each slot sits behind its own mutex so a
/// (depth, value, flag) write is never observed half-done.
pub(super) struct ShardedTable<M> {
    table: Vec<Mutex<Entry<M>>>,
    mask: usize,
    generation: AtomicU8,
}

impl<M: Copy> ShardedTable<M> {
    pub(super) fn new(table_byte_size: usize) -> Self {
        let size =
            (table_byte_size / std::mem::size_of::<Mutex<Entry<M>>>()).next_power_of_two().max(2);
        let mask = (size - 1) & !1;
        let table = (0..size).map(|_| Mutex::new(Entry::empty())).collect();
        Self { table, mask, generation: AtomicU8::new(0) }
    }
}

impl<M: Copy> Table<M> for ShardedTable<M> {
    fn lookup(&self, hash: u64, role: Role) -> Option<Entry<M>> {
        let index = slot(hash, role, self.mask);
        for i in index..index + 2 {
            let entry = self.table[i].lock();
            if entry.matches(hash, role) {
                return Some(*entry);
            }
        }
        None
    }

    fn store(&self, new_entry: Entry<M>) {
        // index points to the first of a pair of entries, the depth-preferred entry and the always-replace entry.
        let index = slot(new_entry.hash, new_entry.role, self.mask);
        {
            let mut entry = self.table[index].lock();
            if entry.generation != new_entry.generation || entry.depth <= new_entry.depth {
                *entry = new_entry;
                return;
            }
        }
        // Otherwise, always overwrite second entry.
        *self.table[index + 1].lock() = new_entry;
    }

    fn advance_generation(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        trace!(generation, "advanced shared table generation");
    }

    fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: u64, role: Role, depth: u8, value: Evaluation, generation: u8) -> Entry<u32> {
        Entry {
            hash,
            role,
            value,
            depth,
            flag: EntryFlag::Exact,
            generation,
            best_move: Some(hash as u32),
        }
    }

    #[test]
    fn shallow_entry_never_answers_deeper_query() {
        let table = TranspositionTable::<u32>::new(4096, Replacement::TwoTier);
        table.store(entry(42, Role::Maximize, 2, 10, table.generation()));
        let (mut alpha, mut beta) = (WORST_EVAL, BEST_EVAL);
        let mut hint = None;
        assert_eq!(table.check(42, Role::Maximize, 3, 0, &mut hint, &mut alpha, &mut beta), None);
        // The move hint still comes through.
        assert_eq!(hint, Some(42));
        assert_eq!(
            table.check(42, Role::Maximize, 2, 0, &mut hint, &mut alpha, &mut beta),
            Some(10)
        );
    }

    #[test]
    fn role_is_part_of_the_key() {
        let table = TranspositionTable::<u32>::new(4096, Replacement::Always);
        table.store(entry(7, Role::Minimize, 4, -3, 0));
        assert!(table.lookup(7, Role::Maximize).is_none());
        assert!(table.lookup(7, Role::Expect).is_none());
        assert_eq!(table.lookup(7, Role::Minimize).map(|e| e.value), Some(-3));
    }

    #[test]
    fn bounds_narrow_the_window() {
        let table = TranspositionTable::<u32>::new(4096, Replacement::Always);
        let mut lower = entry(9, Role::Maximize, 3, 20, 0);
        lower.flag = EntryFlag::Lowerbound;
        table.store(lower);
        let (mut alpha, mut beta) = (0, 100);
        let mut hint = None;
        assert_eq!(table.check(9, Role::Maximize, 3, 0, &mut hint, &mut alpha, &mut beta), None);
        assert_eq!((alpha, beta), (20, 100));
        let (mut alpha, mut beta) = (0, 15);
        assert_eq!(
            table.check(9, Role::Maximize, 3, 0, &mut hint, &mut alpha, &mut beta),
            Some(20)
        );
    }

    #[test]
    fn wins_are_stored_by_distance_from_the_node() {
        let table = TranspositionTable::<u32>::new(4096, Replacement::Always);
        // Win found 4 plies below a node at ply 2.
        table.update(5, Role::Minimize, WORST_EVAL, BEST_EVAL, 4, 2, BEST_EVAL - 6, 1);
        let (mut alpha, mut beta) = (WORST_EVAL, BEST_EVAL);
        assert_eq!(
            table.check(5, Role::Minimize, 4, 4, &mut None, &mut alpha, &mut beta),
            Some(BEST_EVAL - 8)
        );
    }

    #[test]
    fn depth_preferred_keeps_deeper_entry_within_generation() {
        let table = TranspositionTable::<u32>::new(64, Replacement::DepthPreferred);
        let n = table.len() as u64;
        table.store(entry(1, Role::Maximize, 5, 1, 0));
        // Same slot, shallower: rejected.
        table.store(entry(1 + n, Role::Maximize, 2, 2, 0));
        assert_eq!(table.lookup(1, Role::Maximize).map(|e| e.value), Some(1));
        table.advance_generation();
        table.store(entry(1 + n, Role::Maximize, 2, 2, table.generation()));
        assert_eq!(table.lookup(1 + n, Role::Maximize).map(|e| e.value), Some(2));
    }

    #[test]
    fn sharded_table_is_shareable() {
        use rayon::prelude::*;
        let table = ShardedTable::<u32>::new(1 << 16);
        (0..1000u64).into_par_iter().for_each(|i| table.store(entry(i, Role::Expect, 3, i as i32, 0)));
        let found = (0..1000u64).filter(|&i| table.lookup(i, Role::Expect).is_some()).count();
        assert!(found > 0);
        for i in 0..1000u64 {
            if let Some(e) = table.lookup(i, Role::Expect) {
                assert_eq!(e.value, i as i32);
                assert_eq!(e.depth, 3);
            }
        }
    }
}
