use std::time::Duration;

pub const MAX_LIVES: u32 = 3;

/// Gap between taps that still counts as "fast". Exactly 600 ms is slow.
pub const COMBO_WINDOW: Duration = Duration::from_millis(600);

/// Heat gained per fast tap and shed per slow tap.
pub const HEAT_GAIN: f64 = 0.15;
pub const HEAT_DECAY: f64 = 0.05;

/// How long a frenzy burns once heat maxes out.
pub const FRENZY_DURATION: Duration = Duration::from_secs(10);

/// Running totals per point source, reported at game over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub tap_streak: u32,
    pub level_base: u32,
    pub speed_bonus: u32,
    pub boss_bonus: u32,
    pub frenzy_bonus: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.tap_streak + self.level_base + self.speed_bonus + self.boss_bonus + self.frenzy_bonus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapPace {
    Fast,
    Slow,
}

/// One active play-through: lives, level, score and the combo/heat meters.
///
/// Timestamps are durations since the engine epoch, supplied by the caller,
/// which keeps every timing rule reproducible in tests.
#[derive(Debug, Clone)]
pub struct Session {
    pub lives: u32,
    pub level: u32,
    pub score: u32,
    pub combo: u32,
    pub heat: f64,
    pub breakdown: ScoreBreakdown,
    last_tap: Option<Duration>,
    frenzy_until: Option<Duration>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            lives: MAX_LIVES,
            level: 1,
            score: 0,
            combo: 0,
            heat: 0.0,
            breakdown: ScoreBreakdown::default(),
            last_tap: None,
            frenzy_until: None,
        }
    }

    /// Updates combo and heat for a tap at `now`, before any points are
    /// computed. A tap with no predecessor counts as fast.
    pub fn register_tap(&mut self, now: Duration) -> TapPace {
        let fast = match self.last_tap {
            Some(prev) => now.saturating_sub(prev) < COMBO_WINDOW,
            None => true,
        };
        self.last_tap = Some(now);

        if fast {
            self.combo += 1;
            self.heat = (self.heat + HEAT_GAIN).min(1.0);
            TapPace::Fast
        } else {
            self.combo = 0;
            self.heat = (self.heat - HEAT_DECAY).max(0.0);
            TapPace::Slow
        }
    }

    /// Starts a frenzy window if heat is maxed and none is running.
    /// Returns true when a new frenzy began.
    pub fn try_start_frenzy(&mut self, now: Duration) -> bool {
        if self.heat >= 1.0 && !self.frenzy_active(now) {
            self.frenzy_until = Some(now + FRENZY_DURATION);
            true
        } else {
            false
        }
    }

    pub fn frenzy_active(&self, now: Duration) -> bool {
        matches!(self.frenzy_until, Some(until) if now < until)
    }

    /// Clears an expired frenzy window. Heat drops back to zero. Returns
    /// true when a frenzy just ended.
    pub fn expire_frenzy(&mut self, now: Duration) -> bool {
        match self.frenzy_until {
            Some(until) if now >= until => {
                self.frenzy_until = None;
                self.heat = 0.0;
                true
            }
            _ => false,
        }
    }

    /// Remaining frenzy time, for display.
    pub fn frenzy_remaining(&self, now: Duration) -> Option<Duration> {
        self.frenzy_until
            .and_then(|until| until.checked_sub(now))
            .filter(|d| !d.is_zero())
    }

    /// Shifts pending tap/frenzy clocks forward after an external pause.
    pub fn shift_clocks(&mut self, delta: Duration) {
        if let Some(t) = self.last_tap.as_mut() {
            *t += delta;
        }
        if let Some(t) = self.frenzy_until.as_mut() {
            *t += delta;
        }
    }

    pub fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
    }

    pub fn is_game_over(&self) -> bool {
        self.lives == 0
    }
}
