//! Line counting for connect-four style grids.

use crate::interface::*;
use std::marker::PhantomData;

/// A rectangular board of cells that may be owned by an agent.
pub trait Grid: GameView {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    /// Owner of the cell at (`row`, `col`), row 0 at the bottom.
    fn owner(&self, row: usize, col: usize) -> Option<Self::Agent>;
    /// The agent `agent` is playing against.
    fn opponent(&self, agent: Self::Agent) -> Self::Agent;
}

// Horizontal, vertical and both diagonals, as (row step, col step).
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Runs of one agent's cells within every window that fits on the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineSummary {
    /// Longest run starting at any cell.
    pub longest: i32,
    /// Runs one cell short of filling their window.
    pub potential_wins: i32,
    /// Whether some window is entirely owned.
    pub complete: bool,
}

/// Walk every cell and every direction in which a `window`-long line fits,
/// and measure the contiguous run of `agent`'s cells starting there.
pub fn summarize<G: Grid>(grid: &G, agent: G::Agent, window: usize) -> LineSummary {
    let mut summary = LineSummary::default();
    let (rows, cols) = (grid.rows() as isize, grid.cols() as isize);
    let reach = window as isize - 1;
    for row in 0..rows {
        for col in 0..cols {
            for &(dr, dc) in DIRECTIONS.iter() {
                let (end_row, end_col) = (row + dr * reach, col + dc * reach);
                if end_row < 0 || end_row >= rows || end_col < 0 || end_col >= cols {
                    continue;
                }
                let run = (0..window as isize)
                    .take_while(|&i| {
                        grid.owner((row + dr * i) as usize, (col + dc * i) as usize) == Some(agent)
                    })
                    .count();
                summary.longest = summary.longest.max(run as i32);
                if run + 1 >= window {
                    if run == window {
                        summary.complete = true;
                    } else {
                        summary.potential_wins += 1;
                    }
                }
            }
        }
    }
    summary
}

/// Scores a grid by comparing both agents' line summaries.
///
/// The score is `weight * (longest run difference + potential win
/// difference)`. A completed line is a decided game and gets the sentinel.
#[derive(Debug)]
pub struct LineEvaluator<G> {
    window: usize,
    weight: i32,
    grid: PhantomData<fn(&G)>,
}

impl<G> Clone for LineEvaluator<G> {
    fn clone(&self) -> Self {
        LineEvaluator { window: self.window, weight: self.weight, grid: PhantomData }
    }
}

impl<G: Grid> LineEvaluator<G> {
    pub fn new(window: usize) -> Self {
        LineEvaluator { window: window.max(1), weight: 1, grid: PhantomData }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl<G: Grid> Evaluator for LineEvaluator<G> {
    type V = G;

    fn evaluate(&self, grid: &G, agent: G::Agent) -> Evaluation {
        let own = summarize(grid, agent, self.window);
        if own.complete {
            return BEST_EVAL;
        }
        let theirs = summarize(grid, grid.opponent(agent), self.window);
        if theirs.complete {
            return WORST_EVAL;
        }
        let raw = (own.longest - theirs.longest) + (own.potential_wins - theirs.potential_wins);
        let limit = BEST_EVAL - SENTINEL_BAND - 1;
        raw.saturating_mul(self.weight).clamp(-limit, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::connect4::{Board, Disc};

    fn board(diagram: &str) -> Board {
        Board::from_diagram(diagram, Disc::Red).unwrap()
    }

    #[test]
    fn counts_runs_and_threats() {
        let b = board(
            ".......\n\
             .......\n\
             .......\n\
             .......\n\
             Y......\n\
             RRRYY..",
        );
        let red = summarize(&b, Disc::Red, 4);
        assert_eq!(red.longest, 3);
        // Only the window starting at column 0 holds the run of three.
        assert_eq!(red.potential_wins, 1);
        assert!(!red.complete);
        let yellow = summarize(&b, Disc::Yellow, 4);
        assert_eq!(yellow.longest, 2);
        assert_eq!(yellow.potential_wins, 0);

        let eval = LineEvaluator::<Board>::new(4);
        assert_eq!(eval.evaluate(&b, Disc::Red), (3 - 2) + (1 - 0));
        assert_eq!(eval.evaluate(&b, Disc::Yellow), -2);
        assert_eq!(eval.clone().with_weight(10).evaluate(&b, Disc::Red), 20);
    }

    #[test]
    fn windows_must_fit() {
        // No window of five fits on a four by four board.
        let b = Board::new(4, 4).unwrap();
        assert_eq!(summarize(&b, Disc::Red, 5), LineSummary::default());
    }

    #[test]
    fn completed_line_is_a_sentinel() {
        let b = board(
            ".......\n\
             .......\n\
             R......\n\
             R......\n\
             RY.....\n\
             RYY....",
        );
        let eval = LineEvaluator::<Board>::new(4);
        assert_eq!(eval.evaluate(&b, Disc::Red), BEST_EVAL);
        assert_eq!(eval.evaluate(&b, Disc::Yellow), WORST_EVAL);
    }

    #[test]
    fn evaluation_is_pure() {
        let b = board(
            ".......\n\
             .......\n\
             .......\n\
             ..Y....\n\
             ..RY...\n\
             .RRYR..",
        );
        let eval = LineEvaluator::<Board>::new(4);
        let first = eval.evaluate(&b, Disc::Yellow);
        assert_eq!(eval.evaluate(&b, Disc::Yellow), first);
        assert_eq!(b, board(
            ".......\n\
             .......\n\
             .......\n\
             ..Y....\n\
             ..RY...\n\
             .RRYR..",
        ));
    }
}
