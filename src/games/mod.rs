//! Small reference games, used by tests, benchmarks and demos.

pub mod connect4;
pub mod hilo;
pub mod minesweeper;
