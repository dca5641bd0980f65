//! A heads-up high/low betting game, for exercising expectimax.
//!
//! Each seat holds two private cards and five shared cards are revealed over
//! three streets (three, one, one). On every street the seats alternate
//! calling or raising a fixed amount, with at most two raises; a seat facing
//! a raise may fold. The best hand tier at showdown takes the pot.

use crate::error::{Result, SearchError};
use crate::evaluators::hand::{classify, Card, HandTier, PokerView, Suit};
use crate::interface::*;

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub fn other(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Bet {
    Fold,
    Call,
    Raise,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Street {
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Street {
    fn next(self) -> Street {
        match self {
            Street::PreFlop => Street::Flop,
            Street::Flop => Street::Turn,
            Street::Turn => Street::River,
            Street::River | Street::Showdown => Street::Showdown,
        }
    }

    fn revealed(self) -> usize {
        match self {
            Street::PreFlop => 0,
            Street::Flop => 3,
            Street::Turn => 4,
            Street::River | Street::Showdown => 5,
        }
    }

    fn raise_size(self) -> u32 {
        if self >= Street::Turn { 2 } else { 1 }
    }
}

const MAX_RAISES: u8 = 2;
const ANTE: u32 = 1;

// Everything an action can change; pushed before each action for undo.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct Betting {
    street: Street,
    to_move: Seat,
    committed: [u32; 2],
    raises: u8,
    // Actions since the last raise or the start of the street.
    acted: u8,
    folded: Option<Seat>,
    raise_count: [u8; 2],
    action_count: [u8; 2],
}

#[derive(Clone, Debug)]
pub struct HiLo {
    hole: [[Card; 2]; 2],
    board: [Card; 5],
    betting: Betting,
    history: Vec<Betting>,
}

impl HiLo {
    pub fn new(hole: [[Card; 2]; 2], board: [Card; 5]) -> Self {
        HiLo {
            hole,
            board,
            betting: Betting {
                street: Street::PreFlop,
                to_move: Seat::First,
                committed: [ANTE; 2],
                raises: 0,
                acted: 0,
                folded: None,
                raise_count: [0; 2],
                action_count: [0; 2],
            },
            history: Vec::new(),
        }
    }

    /// Shuffle a full deck and deal from it.
    pub fn deal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Suit::ALL
            .iter()
            .flat_map(|&suit| (2..=14).map(move |rank| Card::new(rank, suit)))
            .collect::<Vec<_>>();
        deck.shuffle(rng);
        let hole = [[deck[0], deck[1]], [deck[2], deck[3]]];
        let board = [deck[4], deck[5], deck[6], deck[7], deck[8]];
        HiLo::new(hole, board)
    }

    pub fn street(&self) -> Street {
        self.betting.street
    }

    pub fn pot(&self) -> u32 {
        self.betting.committed.iter().sum()
    }

    fn to_call(&self, seat: Seat) -> u32 {
        let b = &self.betting;
        b.committed[seat.other().index()].saturating_sub(b.committed[seat.index()])
    }

    fn tier(&self, seat: Seat) -> HandTier {
        let mut cards = self.hole[seat.index()].to_vec();
        cards.extend_from_slice(self.board_cards());
        classify(&cards)
    }
}

impl GameView for HiLo {
    type Action = Bet;
    type Agent = Seat;

    fn legal_actions(&self, actions: &mut Vec<Bet>) {
        if self.is_terminal() {
            return;
        }
        if self.to_call(self.betting.to_move) > 0 {
            actions.push(Bet::Fold);
        }
        actions.push(Bet::Call);
        if self.betting.raises < MAX_RAISES {
            actions.push(Bet::Raise);
        }
    }

    fn apply(&mut self, action: Bet) -> Result<()> {
        let mut legal = Vec::with_capacity(3);
        self.legal_actions(&mut legal);
        if !legal.contains(&action) {
            return Err(SearchError::InvalidAction(format!("{:?} on {:?}", action, self.street())));
        }
        self.history.push(self.betting);
        let seat = self.betting.to_move;
        let to_call = self.to_call(seat);
        let b = &mut self.betting;
        b.action_count[seat.index()] += 1;
        match action {
            Bet::Fold => b.folded = Some(seat),
            Bet::Call => {
                b.committed[seat.index()] += to_call;
                b.acted += 1;
                b.to_move = seat.other();
                if b.acted >= 2 {
                    b.street = b.street.next();
                    b.to_move = Seat::First;
                    b.acted = 0;
                    b.raises = 0;
                }
            }
            Bet::Raise => {
                b.committed[seat.index()] += to_call + b.street.raise_size();
                b.raises += 1;
                b.acted = 1;
                b.raise_count[seat.index()] += 1;
                b.to_move = seat.other();
            }
        }
        Ok(())
    }

    fn undo(&mut self, _: Bet) {
        if let Some(prev) = self.history.pop() {
            self.betting = prev;
        }
    }

    fn is_terminal(&self) -> bool {
        self.betting.folded.is_some() || self.betting.street == Street::Showdown
    }

    fn outcome(&self, agent: Seat) -> Outcome {
        if let Some(folded) = self.betting.folded {
            return if folded == agent { Outcome::Loss } else { Outcome::Win };
        }
        match self.tier(agent).cmp(&self.tier(agent.other())) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Less => Outcome::Loss,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    fn to_move(&self) -> Seat {
        self.betting.to_move
    }

    fn position_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hole.hash(&mut hasher);
        self.board.hash(&mut hasher);
        self.betting.hash(&mut hasher);
        hasher.finish()
    }

    fn notation(&self, action: Bet) -> Option<String> {
        Some(format!("{:?}", action).to_lowercase())
    }
}

impl PokerView for HiLo {
    fn hole_cards(&self, agent: Seat) -> &[Card] {
        &self.hole[agent.index()]
    }

    fn board_cards(&self) -> &[Card] {
        &self.board[..self.betting.street.revealed()]
    }

    fn pot_odds(&self, agent: Seat) -> f64 {
        let pot = self.pot() as f64;
        pot / (pot + self.to_call(agent) as f64)
    }

    fn aggression(&self, agent: Seat) -> f64 {
        let other = agent.other().index();
        match self.betting.action_count[other] {
            0 => 0.0,
            n => self.betting.raise_count[other] as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game() -> HiLo {
        let c = Card::new;
        HiLo::new(
            [[c(14, Suit::Spades), c(14, Suit::Hearts)], [c(7, Suit::Clubs), c(2, Suit::Diamonds)]],
            [
                c(14, Suit::Clubs),
                c(9, Suit::Diamonds),
                c(5, Suit::Hearts),
                c(12, Suit::Spades),
                c(3, Suit::Clubs),
            ],
        )
    }

    #[test]
    fn streets_advance_after_both_call() {
        let mut g = game();
        assert!(g.board_cards().is_empty());
        g.apply(Bet::Call).unwrap();
        assert_eq!(g.street(), Street::PreFlop);
        assert_eq!(g.to_move(), Seat::Second);
        g.apply(Bet::Call).unwrap();
        assert_eq!(g.street(), Street::Flop);
        assert_eq!(g.board_cards().len(), 3);
        assert_eq!(g.to_move(), Seat::First);
    }

    #[test]
    fn raises_are_capped_and_fold_needs_a_bet() {
        let mut g = game();
        let mut actions = Vec::new();
        g.legal_actions(&mut actions);
        assert_eq!(actions, vec![Bet::Call, Bet::Raise]);
        g.apply(Bet::Raise).unwrap();
        g.apply(Bet::Raise).unwrap();
        actions.clear();
        g.legal_actions(&mut actions);
        assert_eq!(actions, vec![Bet::Fold, Bet::Call]);
        assert!(matches!(g.apply(Bet::Raise), Err(SearchError::InvalidAction(_))));
        assert_eq!(g.pot(), 2 * ANTE + 1 + 2);
        assert_eq!(g.aggression(Seat::First), 1.0);
        assert_eq!(g.pot_odds(Seat::First), 5.0 / 6.0);
    }

    #[test]
    fn fold_and_showdown_outcomes() {
        let mut g = game();
        g.apply(Bet::Raise).unwrap();
        g.apply(Bet::Fold).unwrap();
        assert!(g.is_terminal());
        assert_eq!(g.outcome(Seat::First), Outcome::Win);
        g.undo(Bet::Fold);
        g.undo(Bet::Raise);
        assert_eq!(g.betting, game().betting);

        for _ in 0..8 {
            g.apply(Bet::Call).unwrap();
        }
        assert_eq!(g.street(), Street::Showdown);
        // Trip aces against ace-high.
        assert_eq!(g.outcome(Seat::First), Outcome::Win);
        assert_eq!(g.outcome(Seat::Second), Outcome::Loss);
    }

    #[test]
    fn deal_uses_distinct_cards() {
        let g = HiLo::deal(&mut StdRng::seed_from_u64(3));
        let mut cards = g.hole.iter().flatten().chain(g.board.iter()).collect::<Vec<_>>();
        cards.sort();
        cards.dedup();
        assert_eq!(cards.len(), 9);
    }
}
