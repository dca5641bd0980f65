//! Hand strength for card games.

use crate::interface::*;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

/// A playing card. Ranks run from 2 to 14, with the ace high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card {
    pub rank: u8,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: u8, suit: Suit) -> Self {
        Card { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.rank {
            10 => f.write_str("T")?,
            11 => f.write_str("J")?,
            12 => f.write_str("Q")?,
            13 => f.write_str("K")?,
            14 => f.write_str("A")?,
            // Ranks outside 2..=14 print as plain numbers.
            r => write!(f, "{}", r)?,
        }
        let suit = match self.suit {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        };
        write!(f, "{}", suit)
    }
}

/// Discrete strength of the best five cards in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandTier {
    HighCard = 0,
    Pair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
}

/// Classify private and shared cards together by rank and suit frequency.
/// Straights and flushes need five cards, taken from anywhere in the set.
pub fn classify(cards: &[Card]) -> HandTier {
    let mut rank_counts = [0u8; 15];
    let mut suit_counts = [0u8; 4];
    for card in cards {
        rank_counts[card.rank as usize % 15] += 1;
        suit_counts[card.suit as usize] += 1;
    }
    let mut groups = rank_counts.iter().copied().filter(|&n| n >= 2).collect::<Vec<_>>();
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let flush = suit_counts.iter().any(|&n| n >= 5);
    // The ace also plays low, below the two.
    let present = |rank: usize| rank_counts[if rank == 1 { 14 } else { rank }] > 0;
    let straight = (1..=10).any(|low| (low..low + 5).all(present));

    match (groups.first().copied(), groups.get(1).copied()) {
        (Some(n), _) if n >= 4 => HandTier::FourOfAKind,
        (Some(3), Some(_)) => HandTier::FullHouse,
        _ if flush => HandTier::Flush,
        _ if straight => HandTier::Straight,
        (Some(3), None) => HandTier::ThreeOfAKind,
        (Some(2), Some(2)) => HandTier::TwoPair,
        (Some(2), None) => HandTier::Pair,
        _ => HandTier::HighCard,
    }
}

/// A card game view exposing what one agent can see.
pub trait PokerView: GameView {
    fn hole_cards(&self, agent: Self::Agent) -> &[Card];
    fn board_cards(&self) -> &[Card];
    /// Share of the pot `agent` stands to win relative to what is at stake, in [0, 1].
    fn pot_odds(&self, agent: Self::Agent) -> f64;
    /// How aggressively the other agents have bet so far, in [0, 1].
    fn aggression(&self, agent: Self::Agent) -> f64;
}

/// Weighted blend of hand tier, pot odds and opponent aggression.
///
/// This never proves an outcome; it is purely heuristic.
#[derive(Debug)]
pub struct HandStrengthEvaluator<V> {
    scale: f64,
    view: PhantomData<fn(&V)>,
}

impl<V> Clone for HandStrengthEvaluator<V> {
    fn clone(&self) -> Self {
        HandStrengthEvaluator { scale: self.scale, view: PhantomData }
    }
}

impl<V: PokerView> HandStrengthEvaluator<V> {
    const TIER_WEIGHT: f64 = 0.5;
    const ODDS_WEIGHT: f64 = 0.3;
    const AGGRESSION_WEIGHT: f64 = 0.2;

    pub fn new() -> Self {
        HandStrengthEvaluator { scale: 100.0, view: PhantomData }
    }

    /// Multiplier from the blended score to an integer evaluation.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

impl<V: PokerView> Default for HandStrengthEvaluator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PokerView> Evaluator for HandStrengthEvaluator<V> {
    type V = V;

    fn evaluate(&self, view: &V, agent: V::Agent) -> Evaluation {
        let mut cards = view.hole_cards(agent).to_vec();
        cards.extend_from_slice(view.board_cards());
        let tier = classify(&cards) as i32 as f64;
        let score = tier * Self::TIER_WEIGHT
            + view.pot_odds(agent) * Self::ODDS_WEIGHT
            + view.aggression(agent) * Self::AGGRESSION_WEIGHT;
        let limit = (BEST_EVAL - SENTINEL_BAND - 1) as f64;
        (score * self.scale).round().clamp(-limit, limit) as Evaluation
    }
}
