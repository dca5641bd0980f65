//! Minesweeper with hidden mines that can be re-sampled from what is visible.

use crate::error::{Result, SearchError};
use crate::interface::*;
use crate::strategies::montecarlo::Sampled;

use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Reveal the square at (`row`, `col`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub fn new(row: usize, col: usize) -> Self {
        Square { row: row as u8, col: col as u8 }
    }
}

// Stop enumerating frontier layouts after this many assignments.
const SAMPLE_STEPS: usize = 200_000;

#[derive(Clone, PartialEq, Eq)]
pub struct Minefield {
    rows: usize,
    cols: usize,
    mines: Vec<bool>,
    revealed: Vec<bool>,
    mine_count: usize,
    exploded: Option<Square>,
    // Cells uncovered by each applied action, for undo.
    history: Vec<Vec<usize>>,
}

impl Minefield {
    /// A covered field with `mine_count` mines placed uniformly at random.
    pub fn new<R: Rng + ?Sized>(
        rows: usize, cols: usize, mine_count: usize, rng: &mut R,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 || rows > 255 || cols > 255 || mine_count >= rows * cols {
            return Err(SearchError::InvalidConfig(format!(
                "{} mines do not fit a {}x{} field",
                mine_count, rows, cols
            )));
        }
        let mut mines = vec![false; rows * cols];
        for i in rand::seq::index::sample(rng, rows * cols, mine_count) {
            mines[i] = true;
        }
        Ok(Minefield::from_parts(rows, cols, mines, vec![false; rows * cols]))
    }

    /// Parse a field drawn one row per line: `*` is a covered mine, `#` a
    /// covered safe square and `.` an uncovered safe square.
    pub fn from_layout(layout: &str) -> Result<Self> {
        let lines = layout.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>();
        let cols = lines.first().map_or(0, |l| l.chars().count());
        let (mut mines, mut revealed) = (Vec::new(), Vec::new());
        for line in lines.iter() {
            if line.chars().count() != cols {
                return Err(SearchError::InvalidConfig("ragged minefield".into()));
            }
            for ch in line.chars() {
                let (mine, open) = match ch {
                    '*' => (true, false),
                    '#' => (false, false),
                    '.' => (false, true),
                    other => {
                        return Err(SearchError::InvalidConfig(format!("unknown square {:?}", other)))
                    }
                };
                mines.push(mine);
                revealed.push(open);
            }
        }
        if mines.is_empty() || mines.iter().all(|&m| m) {
            return Err(SearchError::InvalidConfig("minefield has no safe squares".into()));
        }
        Ok(Minefield::from_parts(lines.len(), cols, mines, revealed))
    }

    fn from_parts(rows: usize, cols: usize, mines: Vec<bool>, revealed: Vec<bool>) -> Self {
        let mine_count = mines.iter().filter(|&&m| m).count();
        Minefield { rows, cols, mines, revealed, mine_count, exploded: None, history: Vec::new() }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_revealed(&self, sq: Square) -> bool {
        self.revealed[self.index(sq)]
    }

    /// Mines next to `sq`; the number shown once it is uncovered.
    pub fn adjacent_mines(&self, sq: Square) -> usize {
        self.neighbors(self.index(sq)).filter(|&n| self.mines[n]).count()
    }

    fn index(&self, sq: Square) -> usize {
        sq.row as usize * self.cols + sq.col as usize
    }

    fn square(&self, i: usize) -> Square {
        Square::new(i / self.cols, i % self.cols)
    }

    fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> {
        let (rows, cols) = (self.rows as isize, self.cols as isize);
        let (row, col) = ((i / self.cols) as isize, (i % self.cols) as isize);
        (-1..=1)
            .flat_map(move |dr| (-1..=1).map(move |dc| (row + dr, col + dc)))
            .filter(move |&(r, c)| (r, c) != (row, col) && r >= 0 && c >= 0 && r < rows && c < cols)
            .map(move |(r, c)| (r * cols + c) as usize)
    }

    // Uncover `start`, flooding through squares with no adjacent mines.
    fn uncover(&mut self, start: usize) -> Vec<usize> {
        let mut opened = Vec::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            if self.revealed[i] {
                continue;
            }
            self.revealed[i] = true;
            opened.push(i);
            if !self.mines[i] && self.neighbors(i).all(|n| !self.mines[n]) {
                stack.extend(self.neighbors(i).filter(|&n| !self.revealed[n]));
            }
        }
        opened
    }

    /// A mine layout drawn from every layout consistent with the uncovered
    /// numbers, each equally likely.
    ///
    /// The covered squares bordering uncovered ones are enumerated
    /// exhaustively. A frontier assignment that leaves `r` mines for the
    /// `interior` other covered squares stands for C(interior, r) full
    /// layouts, so it is kept with that weight; the `r` mines are then
    /// scattered uniformly over the interior.
    fn sample_mines<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<bool>> {
        let n = self.mines.len();
        // Uncovered squares and the numbers they show.
        let clues = (0..n)
            .filter(|&i| self.revealed[i])
            .map(|i| (i, self.neighbors(i).filter(|&j| self.mines[j]).count()))
            .collect::<Vec<_>>();
        let frontier = (0..n)
            .filter(|&i| !self.revealed[i] && self.neighbors(i).any(|j| self.revealed[j]))
            .collect::<Vec<_>>();
        let interior =
            (0..n).filter(|&i| !self.revealed[i] && !frontier.contains(&i)).collect::<Vec<_>>();

        let mut search = LayoutSearch {
            field: self,
            clues: &clues,
            need: vec![0; n],
            open: vec![0; n],
            mines: vec![false; n],
            placed: 0,
            total: self.mine_count,
            log_ways: log_binomials(interior.len(), self.mine_count),
            log_weight: f64::NEG_INFINITY,
            chosen: None,
            steps: 0,
        };
        for &(i, shown) in clues.iter() {
            search.need[i] = shown;
            search.open[i] = self.neighbors(i).filter(|&j| !self.revealed[j]).count();
        }
        search.enumerate(&frontier, 0, rng);
        if search.steps > SAMPLE_STEPS {
            debug!(frontier = frontier.len(), "layout enumeration cut short");
        }
        let (mut mines, placed) = search.chosen.ok_or_else(|| {
            SearchError::InconsistentView("no mine layout matches the uncovered numbers".into())
        })?;
        let remaining = self.mine_count - placed;
        for k in rand::seq::index::sample(rng, interior.len(), remaining) {
            mines[interior[k]] = true;
        }
        Ok(mines)
    }
}

// ln C(n, r) for r in 0..=min(n, k).
fn log_binomials(n: usize, k: usize) -> Vec<f64> {
    let mut table = vec![0.0];
    for r in 1..=n.min(k) {
        let prev = table[r - 1];
        table.push(prev + ((n - r + 1) as f64).ln() - (r as f64).ln());
    }
    table
}

// ln(e^a + e^b)
fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    let hi = a.max(b);
    hi + ((a - hi).exp() + (b - hi).exp()).ln()
}

struct LayoutSearch<'a> {
    field: &'a Minefield,
    clues: &'a [(usize, usize)],
    // Per clue square: mines still to place around it, and covered
    // neighbours not yet decided.
    need: Vec<usize>,
    open: Vec<usize>,
    mines: Vec<bool>,
    placed: usize,
    total: usize,
    log_ways: Vec<f64>,
    // Weighted reservoir of one: total log weight seen so far and the
    // frontier assignment currently held, with its mine count.
    log_weight: f64,
    chosen: Option<(Vec<bool>, usize)>,
    steps: usize,
}

impl<'a> LayoutSearch<'a> {
    fn enumerate<R: Rng + ?Sized>(&mut self, frontier: &[usize], k: usize, rng: &mut R) {
        self.steps += 1;
        if self.steps > SAMPLE_STEPS {
            return;
        }
        if k == frontier.len() {
            self.offer(rng);
            return;
        }
        let cell = frontier[k];
        for &mine in &[false, true] {
            if mine && self.placed == self.total {
                continue;
            }
            if self.fits(cell, mine) {
                self.set(cell, mine, true);
                self.enumerate(frontier, k + 1, rng);
                self.set(cell, mine, false);
            }
        }
    }

    // A complete frontier assignment replaces the held one with probability
    // proportional to the number of layouts it stands for.
    fn offer<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let left = self.total - self.placed;
        if left >= self.log_ways.len() || self.clues.iter().any(|&(i, _)| self.need[i] != 0) {
            return;
        }
        let weight = self.log_ways[left];
        self.log_weight = log_add(self.log_weight, weight);
        if rng.gen::<f64>() < (weight - self.log_weight).exp() {
            self.chosen = Some((self.mines.clone(), self.placed));
        }
    }

    // Whether deciding `cell` keeps every neighbouring clue satisfiable.
    fn fits(&self, cell: usize, mine: bool) -> bool {
        self.field.neighbors(cell).filter(|&j| self.field.revealed[j]).all(|j| {
            let need = self.need[j];
            if mine {
                need >= 1
            } else {
                // The remaining covered neighbours must still be able to hold `need`.
                self.open[j] > need
            }
        })
    }

    fn set(&mut self, cell: usize, mine: bool, on: bool) {
        for j in self.field.neighbors(cell).filter(|&j| self.field.revealed[j]).collect::<Vec<_>>() {
            if on {
                self.open[j] -= 1;
                if mine {
                    self.need[j] -= 1;
                }
            } else {
                self.open[j] += 1;
                if mine {
                    self.need[j] += 1;
                }
            }
        }
        self.mines[cell] = mine && on;
        if mine {
            if on {
                self.placed += 1;
            } else {
                self.placed -= 1;
            }
        }
    }
}

impl Display for Minefield {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let sq = Square::new(row, col);
                let ch = if !self.is_revealed(sq) {
                    '#'
                } else if self.mines[self.index(sq)] {
                    '*'
                } else {
                    match self.adjacent_mines(sq) {
                        0 => '.',
                        n => char::from(b'0' + n as u8),
                    }
                };
                write!(f, "{}", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Minefield {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl GameView for Minefield {
    type Action = Square;
    type Agent = ();

    fn legal_actions(&self, actions: &mut Vec<Square>) {
        if self.is_terminal() {
            return;
        }
        actions.extend((0..self.revealed.len()).filter(|&i| !self.revealed[i]).map(|i| self.square(i)));
    }

    fn apply(&mut self, action: Square) -> Result<()> {
        let (row, col) = (action.row as usize, action.col as usize);
        if self.is_terminal() || row >= self.rows || col >= self.cols || self.is_revealed(action) {
            return Err(SearchError::InvalidAction(format!("({}, {})", row, col)));
        }
        let i = self.index(action);
        let opened = self.uncover(i);
        if self.mines[i] {
            self.exploded = Some(action);
        }
        self.history.push(opened);
        Ok(())
    }

    fn undo(&mut self, action: Square) {
        if let Some(opened) = self.history.pop() {
            for i in opened {
                self.revealed[i] = false;
            }
        }
        if self.exploded == Some(action) {
            self.exploded = None;
        }
    }

    fn is_terminal(&self) -> bool {
        self.exploded.is_some()
            || self.revealed.iter().zip(self.mines.iter()).all(|(&open, &mine)| open || mine)
    }

    fn outcome(&self, _: ()) -> Outcome {
        if self.exploded.is_some() { Outcome::Loss } else { Outcome::Win }
    }

    fn to_move(&self) {}

    fn position_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.revealed.hash(&mut hasher);
        self.exploded.hash(&mut hasher);
        hasher.finish()
    }

    fn notation(&self, action: Square) -> Option<String> {
        Some(format!("({}, {})", action.row, action.col))
    }
}

impl Sampled for Minefield {
    fn sample<R: Rng + ?Sized>(&self, action: Square, rng: &mut R) -> Result<Self> {
        let mut next = self.clone();
        next.mines = self.sample_mines(rng)?;
        next.apply(action)?;
        Ok(next)
    }

    fn is_adverse(&self, action: Square) -> bool {
        self.exploded == Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn flood_fill_and_undo() {
        let mut m = Minefield::from_layout(
            "####\n\
             ####\n\
             ###*",
        )
        .unwrap();
        let start = m.clone();
        m.apply(Square::new(0, 0)).unwrap();
        // Every safe square opens; the mine stays covered.
        assert!(m.is_revealed(Square::new(2, 2)));
        assert_eq!(m.adjacent_mines(Square::new(2, 2)), 1);
        assert!(!m.is_revealed(Square::new(2, 3)));
        assert!(m.is_terminal());
        assert_eq!(m.outcome(()), Outcome::Win);
        m.undo(Square::new(0, 0));
        assert_eq!(m, start);
    }

    #[test]
    fn stepping_on_a_mine_loses() {
        let mut m = Minefield::from_layout("#*\n##").unwrap();
        assert!(matches!(m.apply(Square::new(5, 0)), Err(SearchError::InvalidAction(_))));
        m.apply(Square::new(0, 1)).unwrap();
        assert!(m.is_terminal());
        assert_eq!(m.outcome(()), Outcome::Loss);
        assert!(m.is_adverse(Square::new(0, 1)));
        m.undo(Square::new(0, 1));
        assert!(!m.is_terminal());
    }

    #[test]
    fn samples_agree_with_uncovered_numbers() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut m = Minefield::new(9, 9, 10, &mut rng).unwrap();
        let first = (0..81).map(|i| Square::new(i / 9, i % 9)).find(|&s| !m.mines[m.index(s)]).unwrap();
        m.apply(first).unwrap();
        for _ in 0..20 {
            let mines = m.sample_mines(&mut rng).unwrap();
            assert_eq!(mines.iter().filter(|&&x| x).count(), 10);
            for i in (0..81).filter(|&i| m.revealed[i]) {
                assert!(!mines[i]);
                let shown = m.neighbors(i).filter(|&j| m.mines[j]).count();
                assert_eq!(m.neighbors(i).filter(|&j| mines[j]).count(), shown);
            }
        }
    }

    #[test]
    fn layouts_follow_the_posterior() {
        // Both numbers show one. Either the mine sits between them and the
        // other lies among six interior squares, or both mines flank them:
        // six layouts against one.
        let m = Minefield::from_layout("#.*.####*##").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let trials = 7000;
        let (mut between, mut flanking) = (0, 0);
        for _ in 0..trials {
            let mines = m.sample_mines(&mut rng).unwrap();
            assert_eq!(mines.iter().filter(|&&x| x).count(), 2);
            match (mines[0], mines[2], mines[4]) {
                (false, true, false) => between += 1,
                (true, false, true) => flanking += 1,
                other => panic!("inconsistent layout {:?}", other),
            }
        }
        assert_eq!(between + flanking, trials);
        let p = between as f64 / trials as f64;
        assert!((p - 6.0 / 7.0).abs() < 0.03, "p = {}", p);
    }

    #[test]
    fn log_binomials_match_exact_counts() {
        let table = log_binomials(6, 10);
        assert_eq!(table.len(), 7);
        for (r, &exact) in [1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0].iter().enumerate() {
            assert!((table[r].exp() - exact).abs() < 1e-9);
        }
        assert_eq!(log_binomials(0, 3), vec![0.0]);
    }

    #[test]
    fn rejects_overfull_fields() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(Minefield::new(3, 3, 9, &mut rng), Err(SearchError::InvalidConfig(_))));
        assert!(matches!(Minefield::from_layout("**\n**"), Err(SearchError::InvalidConfig(_))));
    }
}
