//! Utility functions for testing.

use crate::error::Result;
use crate::interface::{GameView, Outcome, Strategy};

/// Play a game to the end from `start` with the two provided strategies.
///
/// The first strategy moves for whichever agent acts at `start`, the second
/// for everyone else. Returns `None` if the game ends in a draw, or
/// `Some(0)`, `Some(1)` if the first or second strategy won, respectively.
pub fn play_match<V, S1, S2>(start: &V, s1: &mut S1, s2: &mut S2) -> Result<Option<usize>>
where
    V: GameView,
    S1: Strategy<V>,
    S2: Strategy<V>,
{
    let mut view = start.clone();
    let first = view.to_move();
    while !view.is_terminal() {
        let action = if view.to_move() == first {
            s1.choose_action(&view)?
        } else {
            s2.choose_action(&view)?
        };
        view.apply(action)?;
    }
    Ok(match view.outcome(first) {
        Outcome::Win => Some(0),
        Outcome::Loss => Some(1),
        Outcome::Draw => None,
    })
}
