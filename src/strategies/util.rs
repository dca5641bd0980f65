use crate::error::SearchError;
use crate::interface::*;

use std::cmp::{max, min};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{sleep, spawn};
use std::time::Duration;

// Sentinels are pulled toward zero by their distance in plies from the root.
// A win in 3 plies (BEST-3) will be chosen over a win in 5 plies (BEST-5).
// A loss in 5 plies (WORST+5) will be chosen over a loss in 3 plies (WORST+3).
pub(super) fn at_ply(value: Evaluation, ply: u8) -> Evaluation {
    let ply = min(ply as Evaluation, SENTINEL_BAND - 1);
    if value == BEST_EVAL {
        value - ply
    } else if value == WORST_EVAL {
        value + ply
    } else {
        value
    }
}

// The table holds sentinel distances relative to the node, so a position
// reached at another ply reads back its own distance.
pub(super) fn to_table(value: Evaluation, ply: u8) -> Evaluation {
    let ply = ply as Evaluation;
    if value > BEST_EVAL - SENTINEL_BAND {
        value.saturating_add(ply)
    } else if value < WORST_EVAL + SENTINEL_BAND {
        max(value - ply, WORST_EVAL)
    } else {
        value
    }
}

pub(super) fn from_table(value: Evaluation, ply: u8) -> Evaluation {
    let ply = ply as Evaluation;
    if value > BEST_EVAL - SENTINEL_BAND {
        max(value - ply, BEST_EVAL - SENTINEL_BAND + 1)
    } else if value < WORST_EVAL + SENTINEL_BAND {
        min(value + ply, WORST_EVAL + SENTINEL_BAND - 1)
    } else {
        value
    }
}

// Undo the distance adjustment: anything in a sentinel band is proven.
pub(super) fn unclamp_value(value: Evaluation) -> Evaluation {
    if value > BEST_EVAL - SENTINEL_BAND {
        BEST_EVAL
    } else if value < WORST_EVAL + SENTINEL_BAND {
        WORST_EVAL
    } else {
        value
    }
}

// Arithmetic mean without overflow. Exact sentinels survive when every
// child agrees on them.
pub(super) fn mean(sum: i64, n: usize) -> Evaluation {
    (sum / n as i64) as Evaluation
}

// Return a unique id for humans for this action.
pub(super) fn action_id<V: GameView>(v: &V, a: Option<V::Action>) -> String {
    match a {
        Some(a) => v.notation(a).unwrap_or_else(|| format!("{:?}", a)),
        None => "none".to_string(),
    }
}

pub(super) fn move_to_front<M: Eq>(m: M, moves: &mut [M]) {
    for i in 0..moves.len() {
        if moves[i] == m {
            moves[0..i + 1].rotate_right(1);
            break;
        }
    }
}

// Stable sort so equal priorities keep enumeration order.
pub(super) fn order_actions<V: GameView, P: MovePriority<V>>(
    v: &V, actions: &mut [V::Action], priority: &P,
) {
    actions.sort_by_cached_key(|&a| std::cmp::Reverse(priority.priority(v, a)));
}

pub(super) fn timeout_signal(dur: Duration) -> Arc<AtomicBool> {
    // One sleeping thread per armed deadline.
    let signal = Arc::new(AtomicBool::new(false));
    let signal2 = signal.clone();
    spawn(move || {
        sleep(dur);
        signal2.store(true, Ordering::Relaxed);
    });
    signal
}

// Why a recursion stopped early. Only `Failed` is reported to callers; a
// spent budget unwinds to the last completed iteration.
pub(super) enum Abort {
    Budget,
    Failed(SearchError),
}

impl From<SearchError> for Abort {
    fn from(e: SearchError) -> Self {
        Abort::Failed(e)
    }
}

// Apply with the view's own legality check, then run `f` and always undo.
pub(super) fn with_applied<V: GameView, T>(
    v: &mut V, a: V::Action, f: impl FnOnce(&mut V) -> Result<T, Abort>,
) -> Result<T, Abort> {
    v.apply(a)?;
    let result = f(v);
    v.undo(a);
    result
}

// Best (value, action) seen at the root. The parallel search keeps one behind a mutex.
pub(super) struct ValueMove<M> {
    pub(super) value: Evaluation,
    pub(super) m: M,
    // Position in canonical enumeration order, for tie-breaks.
    pub(super) index: usize,
}

impl<M> ValueMove<M> {
    pub(super) fn new(value: Evaluation, m: M, index: usize) -> Self {
        Self { value, m, index }
    }

    pub(super) fn max(&mut self, value: Evaluation, m: M, index: usize) {
        if value > self.value || (value == self.value && index < self.index) {
            self.value = value;
            self.m = m;
            self.index = index;
        }
    }

    pub(super) fn into_inner(self) -> (Evaluation, M) {
        (self.value, self.m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_carry_distance() {
        assert_eq!(at_ply(BEST_EVAL, 3), BEST_EVAL - 3);
        assert_eq!(at_ply(WORST_EVAL, 5), WORST_EVAL + 5);
        assert_eq!(at_ply(17, 9), 17);
        assert!(at_ply(BEST_EVAL, 3) > at_ply(BEST_EVAL, 5));
        assert!(at_ply(WORST_EVAL, 5) > at_ply(WORST_EVAL, 3));
        assert_eq!(unclamp_value(at_ply(BEST_EVAL, 250)), BEST_EVAL);
        assert_eq!(unclamp_value(at_ply(WORST_EVAL, 7)), WORST_EVAL);
    }

    #[test]
    fn table_values_are_node_relative() {
        // A win 5 plies from the root, stored at ply 2, read back at ply 4.
        let stored = to_table(BEST_EVAL - 5, 2);
        assert_eq!(stored, BEST_EVAL - 3);
        assert_eq!(from_table(stored, 4), BEST_EVAL - 7);
        assert_eq!(from_table(to_table(WORST_EVAL + 6, 6), 1), WORST_EVAL + 1);
        assert_eq!(to_table(-40, 9), -40);
        assert_eq!(from_table(-40, 9), -40);
    }

    #[test]
    fn mean_keeps_unanimous_sentinel() {
        assert_eq!(mean(3 * BEST_EVAL as i64, 3), BEST_EVAL);
        assert_eq!(mean(BEST_EVAL as i64 + WORST_EVAL as i64, 2), 0);
        assert_eq!(mean(7, 2), 3);
    }

    #[test]
    fn move_to_front_rotates() {
        let mut moves = [1, 2, 3, 4];
        move_to_front(3, &mut moves);
        assert_eq!(moves, [3, 1, 2, 4]);
        move_to_front(9, &mut moves);
        assert_eq!(moves, [3, 1, 2, 4]);
    }

    #[test]
    fn value_move_prefers_earlier_index_on_ties() {
        let mut vm = ValueMove::new(5, 'b', 1);
        vm.max(5, 'c', 2);
        assert_eq!(vm.into_inner(), (5, 'b'));
        let mut vm = ValueMove::new(5, 'b', 1);
        vm.max(5, 'a', 0);
        vm.max(4, 'z', 0);
        assert_eq!(vm.into_inner(), (5, 'a'));
    }
}
