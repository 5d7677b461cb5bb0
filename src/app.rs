use crate::engine::{Engine, Phase};
use crate::events::GameEvent;
use crate::session::ScoreBreakdown;
use std::time::Duration;

/// Keyboard layout for the tap grid: four rows of five, matching the
/// five-column board. Key i taps active-pool symbol i.
pub const KEY_GRID: &str = "12345qwertasdfgzxcvb";

/// What the center of the board is showing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Empty,
    Countdown(String),
    Symbol(String),
}

/// Snapshot carried into the game-over screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverView {
    pub score: u32,
    pub breakdown: ScoreBreakdown,
    pub new_high_score: bool,
}

/// View state over the engine: translates the engine's event stream into
/// what the renderer shows and key presses into taps.
pub struct App {
    pub engine: Engine,
    pub pack_name: String,
    pub now: Duration,
    pub stage: Stage,
    pub banner: Option<String>,
    pub marks: Option<Vec<bool>>,
    pub last_points: Option<u32>,
    pub game_over: Option<GameOverView>,
}

impl App {
    pub fn new(engine: Engine, pack_name: String) -> Self {
        Self {
            engine,
            pack_name,
            now: Duration::ZERO,
            stage: Stage::Empty,
            banner: None,
            marks: None,
            last_points: None,
            game_over: None,
        }
    }

    pub fn start(&mut self, now: Duration) {
        self.now = now;
        self.engine.start(now);
        self.drain();
    }

    pub fn on_tick(&mut self, now: Duration) {
        self.now = now;
        self.engine.on_tick(now);
        self.drain();
    }

    /// Routes a grid key to a tap on the matching board symbol.
    pub fn on_key(&mut self, key: char, now: Duration) {
        self.now = now;
        let symbol = KEY_GRID.find(key).and_then(|index| {
            self.engine
                .round()
                .and_then(|round| round.active_pool.get(index))
                .cloned()
        });
        if let Some(symbol) = symbol {
            self.engine.on_tap(&symbol, now);
            self.drain();
        }
    }

    pub fn toggle_pause(&mut self, now: Duration) {
        if self.engine.is_paused() {
            self.engine.resume(now);
        } else {
            self.engine.pause(now);
        }
    }

    pub fn restart(&mut self, now: Duration) {
        self.now = now;
        self.stage = Stage::Empty;
        self.banner = None;
        self.marks = None;
        self.last_points = None;
        self.game_over = None;
        self.engine.restart(now);
        self.drain();
    }

    fn drain(&mut self) {
        for event in self.engine.drain_events() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: GameEvent) {
        match event {
            GameEvent::CountdownTick { text } => {
                self.stage = Stage::Countdown(text);
            }
            GameEvent::SymbolShown { symbol, .. } => {
                self.stage = Stage::Symbol(symbol);
            }
            GameEvent::SymbolHidden => {
                self.stage = Stage::Empty;
            }
            GameEvent::InputOpened { .. } => {
                self.stage = Stage::Empty;
                self.banner = None;
                self.marks = None;
                self.last_points = None;
            }
            GameEvent::TimerTick { .. } => {}
            GameEvent::TapAccepted { points, .. } => {
                self.last_points = Some(points);
            }
            GameEvent::FrenzyStarted => {
                self.banner = Some("FRENZY!".to_string());
            }
            GameEvent::FrenzyEnded => {}
            GameEvent::Verified { marks, .. } => {
                self.marks = Some(marks);
            }
            GameEvent::RoundWon { bonus, .. } => {
                self.banner = Some(format!("+{bonus}"));
            }
            GameEvent::LevelUp { .. } => {
                self.banner = Some("LEVEL UP!".to_string());
            }
            GameEvent::BossStarted { .. } => {
                self.banner = Some("⚠ BOSS INCOMING ⚠".to_string());
            }
            GameEvent::BossPhaseStarted { .. } => {
                self.marks = None;
            }
            GameEvent::BossCleared { bonus } => {
                self.banner = Some(format!("BOSS DOWN! +{bonus}"));
            }
            GameEvent::LifeLost { reason, .. } => {
                self.banner = Some(reason.to_string());
            }
            GameEvent::GameOver {
                score,
                breakdown,
                new_high_score,
            } => {
                self.game_over = Some(GameOverView {
                    score,
                    breakdown,
                    new_high_score,
                });
            }
        }
    }

    pub fn is_over(&self) -> bool {
        self.engine.phase() == Phase::GameOver
    }
}
