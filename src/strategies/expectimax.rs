//! Expectimax: the iterative search with chance nodes in place of the
//! adversary.
//!
//! Wherever an agent other than the searching one acts, the node's value is
//! the mean of all its children. Chance nodes need every child, so they are
//! never pruned and always get a full window; cutoffs still happen at the
//! searching agent's own nodes below them.

use super::iterative::{IterativeSearch, Opponent, SearchOptions};
use crate::interface::*;

/// Search that treats the other agents as uniformly random.
pub type ExpectimaxSearch<E, P = NaturalOrder> = IterativeSearch<E, P>;

impl<E: Evaluator> IterativeSearch<E> {
    pub fn expectimax(eval: E, opts: SearchOptions) -> Self {
        Self::with_opponent(eval, NaturalOrder, Opponent::Stochastic, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SearchError};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    // A fixed tree. Node i has children[i]; leaves carry a score. Agent 0
    // acts at even plies and agent 1 at odd plies.
    #[derive(Clone)]
    struct Tree {
        children: &'static [&'static [usize]],
        scores: &'static [Evaluation],
        path: Vec<usize>,
    }

    impl Tree {
        fn node(&self) -> usize {
            self.path.last().copied().unwrap_or(0)
        }
    }

    impl GameView for Tree {
        type Action = usize;
        type Agent = u8;

        fn legal_actions(&self, actions: &mut Vec<usize>) {
            actions.extend_from_slice(self.children[self.node()]);
        }

        fn apply(&mut self, action: usize) -> Result<()> {
            if !self.children[self.node()].contains(&action) {
                return Err(SearchError::InvalidAction(action.to_string()));
            }
            self.path.push(action);
            Ok(())
        }

        fn undo(&mut self, _: usize) {
            self.path.pop();
        }

        fn is_terminal(&self) -> bool {
            false
        }

        fn outcome(&self, _: u8) -> Outcome {
            Outcome::Draw
        }

        fn to_move(&self) -> u8 {
            (self.path.len() % 2) as u8
        }

        fn position_key(&self) -> u64 {
            let mut hasher = DefaultHasher::new();
            self.path.hash(&mut hasher);
            hasher.finish()
        }
    }

    struct Leaf;

    impl Evaluator for Leaf {
        type V = Tree;
        fn evaluate(&self, t: &Tree, agent: u8) -> Evaluation {
            let score = t.scores[t.node()];
            if agent == 0 { score } else { -score }
        }
    }

    fn tree(children: &'static [&'static [usize]], scores: &'static [Evaluation]) -> Tree {
        Tree { children, scores, path: Vec::new() }
    }

    #[test]
    fn single_branch_matches_minimax() {
        // 0 -> 1 -> 2 -> 3 -> 4, one action per ply.
        let t = tree(&[&[1], &[2], &[3], &[4], &[]], &[0, 5, -7, 11, 13]);
        for depth in 1..=4 {
            let mut ab = IterativeSearch::new(Leaf, SearchOptions::new());
            let mut em = IterativeSearch::expectimax(Leaf, SearchOptions::new());
            ab.set_max_depth(depth);
            em.set_max_depth(depth);
            let a = ab.search(&t).unwrap();
            let e = em.search(&t).unwrap();
            assert_eq!(a, e);
            assert_eq!(ab.evaluate_root(&t, depth), em.evaluate_root(&t, depth));
        }
    }

    #[test]
    fn chance_nodes_average() {
        // Root picks 1 or 2; the opponent then picks a leaf.
        // Minimax prefers 2 (worst case 8); expectimax prefers 1 (mean 15).
        let t = tree(
            &[&[1, 2], &[3, 4], &[5, 6], &[], &[], &[], &[]],
            &[0, 0, 0, 0, 30, 8, 10],
        );
        let mut ab = IterativeSearch::new(Leaf, SearchOptions::new());
        ab.set_max_depth(2);
        let a = ab.search(&t).unwrap();
        assert_eq!((a.action, a.value), (2, 8));

        let mut em = IterativeSearch::expectimax(Leaf, SearchOptions::new());
        em.set_max_depth(2);
        let e = em.search(&t).unwrap();
        assert_eq!((e.action, e.value), (1, 15));
    }

    #[test]
    fn maximizing_nodes_still_prune_below_chance() {
        let t = tree(
            &[&[1, 2], &[3, 4], &[5, 6], &[7, 8], &[9, 10], &[11, 12], &[13, 14], &[], &[], &[], &[], &[], &[], &[], &[]],
            &[0, 0, 0, 0, 0, 0, 0, 4, 9, -2, 6, 1, 1, 20, -20],
        );
        let mut pruned = IterativeSearch::expectimax(Leaf, SearchOptions::new());
        let mut full = IterativeSearch::expectimax(Leaf, SearchOptions::new().with_pruning(false));
        for depth in 1..=3 {
            assert_eq!(pruned.evaluate_root(&t, depth), full.evaluate_root(&t, depth));
        }
        pruned.set_max_depth(3);
        full.set_max_depth(3);
        assert_eq!(pruned.search(&t).unwrap(), full.search(&t).unwrap());
    }
}
