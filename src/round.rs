use crate::pack::Symbol;
use rand::seq::SliceRandom;
use rand::Rng;

/// One memorize-then-reproduce challenge.
#[derive(Debug, Clone)]
pub struct Round {
    /// Distinct symbols on the board this round.
    pub active_pool: Vec<Symbol>,
    /// The sequence to reproduce; may repeat symbols from the pool.
    pub target: Vec<Symbol>,
    /// Taps recorded so far, in strict arrival order.
    pub taps: Vec<Symbol>,
}

impl Round {
    /// Samples `pool_size` distinct symbols and draws a target sequence of
    /// `sequence_length` from them with replacement.
    ///
    /// Panics if `pool` holds fewer than `pool_size` symbols: the pack
    /// provider contract guarantees at least 20, and silently truncating
    /// would break the distinct-pool invariant.
    pub fn generate(
        pool: &[Symbol],
        pool_size: usize,
        sequence_length: usize,
        rng: &mut impl Rng,
    ) -> Self {
        assert!(
            pool.len() >= pool_size,
            "symbol pool holds {} symbols but the round needs {}",
            pool.len(),
            pool_size
        );

        let active_pool: Vec<Symbol> = pool
            .choose_multiple(rng, pool_size)
            .cloned()
            .collect();

        let target = (0..sequence_length)
            .map(|_| active_pool.choose(rng).cloned().unwrap())
            .collect();

        Self {
            active_pool,
            target,
            taps: Vec::new(),
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.active_pool.iter().any(|s| s == symbol)
    }

    /// Records one tap. Returns the position it landed in.
    pub fn push_tap(&mut self, symbol: Symbol) -> usize {
        debug_assert!(self.taps.len() < self.target.len());
        self.taps.push(symbol);
        self.taps.len() - 1
    }

    /// The position the next tap will fill.
    pub fn next_position(&self) -> usize {
        self.taps.len()
    }

    pub fn is_complete(&self) -> bool {
        self.taps.len() == self.target.len()
    }

    /// Position-exact per-position marks. Unanswered positions are marked
    /// wrong, so a timed-out round still reports a full vector.
    pub fn verify(&self) -> Vec<bool> {
        self.target
            .iter()
            .enumerate()
            .map(|(i, expected)| self.taps.get(i) == Some(expected))
            .collect()
    }

    /// Correct iff every position matches. Order matters: a permutation of
    /// the right multiset still fails.
    pub fn is_correct(&self) -> bool {
        self.taps.len() == self.target.len() && self.verify().iter().all(|&m| m)
    }
}
