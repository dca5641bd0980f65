//! Connect Four on a configurable grid, for use in tests, benchmarks and demos.

use crate::error::{Result, SearchError};
use crate::evaluators::lines::Grid;
use crate::interface::*;

use std::fmt::{self, Display, Formatter};

/// Discs in a row needed to win.
pub const CONNECT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Disc {
    Red,
    Yellow,
}

impl Disc {
    pub fn other(self) -> Disc {
        match self {
            Disc::Red => Disc::Yellow,
            Disc::Yellow => Disc::Red,
        }
    }

    fn symbol(self) -> char {
        match self {
            Disc::Red => 'R',
            Disc::Yellow => 'Y',
        }
    }
}

/// Drop a disc into a column, numbered from 0 on the left.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Column(pub u8);

impl Column {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<Column> for i32 {
    fn from(c: Column) -> i32 {
        c.0 as i32
    }
}

// Position keys are xors of one pseudo-random word per (cell, disc).
fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn disc_key(cell: usize, disc: Disc) -> u64 {
    splitmix((cell as u64) << 1 | (disc == Disc::Yellow) as u64)
}

const YELLOW_TO_MOVE: u64 = 0x5bd1_e995_5bd1_e995;

#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    // Row-major from the bottom row.
    cells: Vec<Option<Disc>>,
    heights: Vec<usize>,
    to_move: Disc,
    winner: Option<Disc>,
    num_moves: usize,
    hash: u64,
}

impl Default for Board {
    fn default() -> Board {
        Board::empty(6, 7)
    }
}

impl Board {
    /// An empty board. Grids too small to hold a line of four are rejected.
    pub fn new(rows: usize, cols: usize) -> Result<Board> {
        if rows < CONNECT || cols < CONNECT || rows > u8::MAX as usize || cols > u8::MAX as usize {
            return Err(SearchError::InvalidConfig(format!(
                "a {}x{} board cannot hold a line of {}",
                rows, cols, CONNECT
            )));
        }
        Ok(Board::empty(rows, cols))
    }

    fn empty(rows: usize, cols: usize) -> Board {
        Board {
            rows,
            cols,
            cells: vec![None; rows * cols],
            heights: vec![0; cols],
            to_move: Disc::Red,
            winner: None,
            num_moves: 0,
            hash: 0,
        }
    }

    /// Parse a board drawn top row first, with `R`, `Y` and `.` for an
    /// empty cell. Discs may not float above empty cells.
    pub fn from_diagram(diagram: &str, to_move: Disc) -> Result<Board> {
        let lines = diagram.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>();
        let cols = lines.first().map_or(0, |l| l.chars().count());
        let mut board = Board::new(lines.len(), cols)?;
        for (i, line) in lines.iter().enumerate() {
            let row = board.rows - 1 - i;
            if line.chars().count() != cols {
                return Err(SearchError::InvalidConfig(format!("ragged row {}", row)));
            }
            for (col, ch) in line.chars().enumerate() {
                let disc = match ch {
                    '.' => continue,
                    'R' => Disc::Red,
                    'Y' => Disc::Yellow,
                    other => {
                        return Err(SearchError::InvalidConfig(format!("unknown cell {:?}", other)))
                    }
                };
                board.place(row, col, disc);
            }
        }
        for col in 0..cols {
            let height = (0..board.rows).take_while(|&r| board.cell(r, col).is_some()).count();
            if (height..board.rows).any(|r| board.cell(r, col).is_some()) {
                return Err(SearchError::InvalidConfig(format!("floating disc in column {}", col)));
            }
            board.heights[col] = height;
        }
        board.set_to_move(to_move);
        let index = (0..board.cells.len()).find(|&i| board.wins_through(i / cols, i % cols));
        board.winner = index.and_then(|i| board.cells[i]);
        Ok(board)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Disc> {
        self.cells[row * self.cols + col]
    }

    pub fn winner(&self) -> Option<Disc> {
        self.winner
    }

    /// Columns nearest the middle first.
    pub fn center_first(&self) -> CenterFirst {
        CenterFirst { center: (self.cols as i32 - 1) / 2 }
    }

    fn place(&mut self, row: usize, col: usize, disc: Disc) {
        let i = row * self.cols + col;
        self.cells[i] = Some(disc);
        self.hash ^= disc_key(i, disc);
        self.num_moves += 1;
    }

    fn set_to_move(&mut self, disc: Disc) {
        if self.to_move != disc {
            self.to_move = disc;
            self.hash ^= YELLOW_TO_MOVE;
        }
    }

    // Whether the disc at (row, col) is part of a line of CONNECT.
    fn wins_through(&self, row: usize, col: usize) -> bool {
        let disc = match self.cell(row, col) {
            Some(d) => d,
            None => return false,
        };
        let run = |dr: isize, dc: isize| {
            (1..CONNECT as isize)
                .take_while(|&i| {
                    let (r, c) = (row as isize + dr * i, col as isize + dc * i);
                    r >= 0
                        && c >= 0
                        && (r as usize) < self.rows
                        && (c as usize) < self.cols
                        && self.cell(r as usize, c as usize) == Some(disc)
                })
                .count()
        };
        [(0, 1), (1, 0), (1, 1), (1, -1)]
            .iter()
            .any(|&(dr, dc)| 1 + run(dr, dc) + run(-dr, -dc) >= CONNECT)
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for row in (0..self.rows).rev() {
            for col in 0..self.cols {
                write!(f, "{}", self.cell(row, col).map_or('.', Disc::symbol))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl GameView for Board {
    type Action = Column;
    type Agent = Disc;

    fn legal_actions(&self, actions: &mut Vec<Column>) {
        if self.is_terminal() {
            return;
        }
        actions.extend((0..self.cols).filter(|&c| self.heights[c] < self.rows).map(|c| Column(c as u8)));
    }

    fn apply(&mut self, action: Column) -> Result<()> {
        let col = action.index();
        if self.winner.is_some() || col >= self.cols || self.heights[col] >= self.rows {
            return Err(SearchError::InvalidAction(format!("column {}", col)));
        }
        let row = self.heights[col];
        let disc = self.to_move;
        self.place(row, col, disc);
        self.heights[col] += 1;
        if self.wins_through(row, col) {
            self.winner = Some(disc);
        }
        self.set_to_move(disc.other());
        Ok(())
    }

    fn undo(&mut self, action: Column) {
        let col = action.index();
        self.heights[col] -= 1;
        let i = self.heights[col] * self.cols + col;
        if let Some(disc) = self.cells[i].take() {
            self.hash ^= disc_key(i, disc);
            self.set_to_move(disc);
        }
        self.num_moves -= 1;
        // Play stops at the first line, so the undone disc made any win.
        self.winner = None;
    }

    fn is_terminal(&self) -> bool {
        self.winner.is_some() || self.num_moves == self.cells.len()
    }

    fn outcome(&self, agent: Disc) -> Outcome {
        match self.winner {
            Some(w) if w == agent => Outcome::Win,
            Some(_) => Outcome::Loss,
            None => Outcome::Draw,
        }
    }

    fn to_move(&self) -> Disc {
        self.to_move
    }

    fn position_key(&self) -> u64 {
        self.hash
    }

    fn notation(&self, action: Column) -> Option<String> {
        Some(format!("col {}", action.0))
    }
}

impl Grid for Board {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn owner(&self, row: usize, col: usize) -> Option<Disc> {
        self.cell(row, col)
    }

    fn opponent(&self, agent: Disc) -> Disc {
        agent.other()
    }
}
