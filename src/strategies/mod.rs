//! Strategy implementations.

pub mod expectimax;
pub mod iterative;
pub mod montecarlo;
pub mod parallel;
mod table;
mod util;

use crate::interface::Evaluation;
use std::fmt;
use std::time::Duration;

pub use iterative::{IterativeSearch, Opponent, SearchOptions};
pub use montecarlo::{MonteCarlo, RiskEstimate, RiskReport, Sampled};
pub use parallel::{ParallelOptions, ParallelSearch};
pub use table::Replacement;

/// The action a search settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice<A> {
    pub action: A,
    /// Value of `action` for the deciding agent.
    pub value: Evaluation,
    /// Deepest fully completed iteration; zero for a fallback.
    pub depth: u8,
    /// Set when no iteration completed and the move-ordering heuristic chose.
    pub fallback: bool,
}

/// Runtime stats for the last decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    // Maximum depth used to produce the action.
    pub depth: u8,
    // Nodes visited by completed iterations.
    pub nodes_explored: u64,
    // Nodes visited by the iteration the budget cut short.
    pub interrupted_nodes: u64,
    pub table_hits: u64,
    pub wall_time: Duration,
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "depth {} in {}ms: {} nodes, {} interrupted, {} table hits",
            self.depth,
            self.wall_time.as_millis(),
            self.nodes_explored,
            self.interrupted_nodes,
            self.table_hits
        )
    }
}
