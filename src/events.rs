use crate::pack::Symbol;
use crate::session::ScoreBreakdown;
use std::fmt;

/// Why a round was judged failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// Some position did not match the target.
    Mismatch,
    /// The input window closed before the sequence was complete.
    TooSlow,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Mismatch => write!(f, "WHOOPS!"),
            FailReason::TooSlow => write!(f, "TOO SLOW!"),
        }
    }
}

/// Notifications emitted by the engine for the presentation layer. Drained
/// once per loop iteration; the engine never calls into the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A countdown tick: "3", "2", "1", then "GO!" or an override label.
    CountdownTick { text: String },
    /// One symbol of the target sequence is being shown.
    SymbolShown { symbol: Symbol, index: usize },
    /// The shown symbol was hidden again.
    SymbolHidden,
    /// The input window opened with this many seconds on the clock.
    InputOpened { seconds: u32 },
    /// One second elapsed on the input clock.
    TimerTick { remaining: u32 },
    /// A tap was accepted into the given position.
    TapAccepted {
        symbol: Symbol,
        position: usize,
        points: u32,
        combo: u32,
    },
    FrenzyStarted,
    FrenzyEnded,
    /// Per-position marks for the finished round, in target order.
    Verified { marks: Vec<bool>, correct: bool },
    /// Completion bonus for a cleared standard round.
    RoundWon { bonus: u32, frenzy_bonus: u32 },
    LevelUp { level: u32 },
    BossStarted { level: u32 },
    /// A boss phase is being dealt (phase is 0-based).
    BossPhaseStarted { phase: u8 },
    BossCleared { bonus: u32 },
    LifeLost { reason: FailReason, lives: u32 },
    GameOver {
        score: u32,
        breakdown: ScoreBreakdown,
        new_high_score: bool,
    },
}
