use crate::ads::AdGate;
use crate::boss::{
    self, BossEncounter, BOSS_INPUT_SECONDS, BOSS_POOL_SIZE, BOSS_SEQUENCE_LENGTH,
};
use crate::difficulty::{config_for, DifficultyConfig};
use crate::events::{FailReason, GameEvent};
use crate::pack::Symbol;
use crate::round::Round;
use crate::scheduler::Scheduler;
use crate::scoring;
use crate::session::Session;
use crate::stats::{TapStat, TapStatsDb};
use crate::store::{Progress, ProgressStore};
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// The pack provider guarantees at least this many distinct symbols, which
/// covers the largest configured pool.
pub const MIN_POOL_SIZE: usize = 20;

/// Seconds of input time per level on standard rounds.
pub const SECONDS_PER_LEVEL: u32 = 7;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
const SEQUENCE_LEAD_IN: Duration = Duration::from_millis(500);
const SYMBOL_STEP: Duration = Duration::from_millis(1200);
const SYMBOL_VISIBLE: Duration = Duration::from_millis(800);
const VERIFY_REVEAL_STEP: Duration = Duration::from_millis(700);
const VERIFY_SETTLE: Duration = Duration::from_millis(500);
const BANNER_DURATION: Duration = Duration::from_millis(1400);
const BOSS_INTRO_DURATION: Duration = Duration::from_millis(1500);

/// Where the state machine currently is. Input is only accepted in
/// `Accepting`; everything else is a timed gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    BossIntro,
    Countdown,
    Showing,
    Accepting,
    Verifying,
    Interlude,
    GameOver,
}

/// Delayed steps owned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    CountdownTick,
    FinishCountdown,
    ShowSymbol(usize),
    HideSymbol,
    BeginInputCountdown,
    Resolve,
    NextRound,
    BossIntroDone,
}

/// What a finished countdown gates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterCountdown {
    ShowSequence,
    OpenInput,
    Verify,
}

/// The round/level progression engine. Single-threaded: the host calls
/// `on_tick` frequently with a monotonic `now` and routes taps through
/// `on_tap`; all waits are deadlines, so every transition is reproducible
/// under test-supplied clocks.
pub struct Engine {
    session: Session,
    phase: Phase,
    round: Option<Round>,
    boss: Option<BossEncounter>,
    config: Option<DifficultyConfig>,

    scheduler: Scheduler<Step>,
    countdown_left: u32,
    countdown_final: String,
    after_countdown: AfterCountdown,

    remaining: u32,
    remaining_at_close: u32,
    next_second: Option<Duration>,
    tap_mark: Duration,
    paused_at: Option<Duration>,

    pool: Vec<Symbol>,
    rng: StdRng,
    events: Vec<GameEvent>,

    progress: Progress,
    store: Box<dyn ProgressStore>,
    ads: Box<dyn AdGate>,
    stats: Option<TapStatsDb>,
}

impl Engine {
    pub fn new(
        pool: Vec<Symbol>,
        seed: Option<u64>,
        store: Box<dyn ProgressStore>,
        ads: Box<dyn AdGate>,
        stats: Option<TapStatsDb>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let progress = store.load();

        Self {
            session: Session::new(),
            phase: Phase::Idle,
            round: None,
            boss: None,
            config: None,
            scheduler: Scheduler::new(),
            countdown_left: 0,
            countdown_final: String::new(),
            after_countdown: AfterCountdown::ShowSequence,
            remaining: 0,
            remaining_at_close: 0,
            next_second: None,
            tap_mark: Duration::ZERO,
            paused_at: None,
            pool,
            rng,
            events: Vec::new(),
            progress,
            store,
            ads,
            stats,
        }
    }

    // ---- read-only surface for the presentation layer ----

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn current_config(&self) -> Option<&DifficultyConfig> {
        self.config.as_ref()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    pub fn in_boss_encounter(&self) -> bool {
        self.boss.is_some()
    }

    pub fn boss_phase(&self) -> Option<u8> {
        self.boss.map(|b| b.phase())
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Takes every notification emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- lifecycle ----

    /// Begins the first round. Panics if the pack provider broke the
    /// minimum-pool contract; truncating would corrupt every later round.
    pub fn start(&mut self, now: Duration) {
        assert!(
            self.pool.len() >= MIN_POOL_SIZE,
            "symbol pool holds {} symbols, need at least {MIN_POOL_SIZE}",
            self.pool.len()
        );
        self.ads.preload();
        self.start_round(now);
    }

    /// Full reset: fresh session, every pending step cancelled, stale
    /// events dropped, straight into round one.
    pub fn restart(&mut self, now: Duration) {
        self.scheduler.cancel_all();
        self.events.clear();
        self.session = Session::new();
        self.round = None;
        self.boss = None;
        self.config = None;
        self.next_second = None;
        self.paused_at = None;
        self.remaining = 0;
        self.remaining_at_close = 0;
        self.start_round(now);
    }

    /// Freezes the clock (ad presentation, app background). Taps and timer
    /// ticks are ignored until `resume`.
    pub fn pause(&mut self, now: Duration) {
        if self.paused_at.is_none() && self.phase != Phase::GameOver {
            self.paused_at = Some(now);
        }
    }

    /// Unfreezes, pushing every pending deadline out by the paused span so
    /// the game resumes exactly where it was interrupted.
    pub fn resume(&mut self, now: Duration) {
        if let Some(paused_at) = self.paused_at.take() {
            let delta = now.saturating_sub(paused_at);
            self.scheduler.shift_by(delta);
            self.session.shift_clocks(delta);
            self.tap_mark += delta;
            if let Some(deadline) = self.next_second.as_mut() {
                *deadline += delta;
            }
        }
    }

    /// Advances every due deadline: scheduled steps, the 1 Hz input timer,
    /// frenzy expiry. Safe to call at any cadence.
    pub fn on_tick(&mut self, now: Duration) {
        if self.paused_at.is_some() || self.phase == Phase::GameOver {
            return;
        }

        if self.session.expire_frenzy(now) {
            self.emit(GameEvent::FrenzyEnded);
        }

        loop {
            let due = self.scheduler.pop_due(now);
            if due.is_empty() {
                break;
            }
            for step in due {
                self.handle_step(step, now);
            }
        }

        while self.phase == Phase::Accepting {
            match self.next_second {
                Some(deadline) if now >= deadline => {
                    self.remaining = self.remaining.saturating_sub(1);
                    self.emit(GameEvent::TimerTick {
                        remaining: self.remaining,
                    });
                    if self.remaining == 0 {
                        self.next_second = None;
                        self.fail(FailReason::TooSlow, now);
                    } else {
                        self.next_second = Some(deadline + COUNTDOWN_TICK);
                    }
                }
                _ => break,
            }
        }
    }

    /// Feeds one tap into the current round. Ignored outside the input
    /// window, while paused, and for symbols not on the board.
    pub fn on_tap(&mut self, symbol: &str, now: Duration) {
        if self.paused_at.is_some() || self.phase != Phase::Accepting {
            return;
        }
        let Some(round) = self.round.as_mut() else {
            return;
        };
        if !round.contains(symbol) {
            return;
        }

        let reaction = now.saturating_sub(self.tap_mark);
        self.tap_mark = now;

        self.session.register_tap(now);
        let points = scoring::award_tap(&mut self.session);
        let position = round.push_tap(symbol.to_string());
        let correct_here = round.target[position] == symbol;

        if let Some(db) = &self.stats {
            let _ = db.record_tap(&TapStat {
                symbol: symbol.to_string(),
                reaction_ms: reaction.as_millis() as u64,
                was_correct: correct_here,
                level: self.session.level,
                timestamp: Local::now(),
            });
        }

        self.emit(GameEvent::TapAccepted {
            symbol: symbol.to_string(),
            position,
            points,
            combo: self.session.combo,
        });

        if self.session.try_start_frenzy(now) {
            self.emit(GameEvent::FrenzyStarted);
        }

        if self.round.as_ref().is_some_and(|r| r.is_complete()) {
            self.remaining_at_close = self.remaining;
            self.next_second = None;
            self.begin_countdown(now, 0, "...".to_string(), AfterCountdown::Verify);
        }
    }

    // ---- internal transitions ----

    fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    fn start_round(&mut self, now: Duration) {
        self.scheduler.cancel_all();
        self.next_second = None;

        if self.boss.is_some() {
            self.start_boss_phase(now);
        } else if boss::is_boss_level(self.session.level) {
            self.begin_boss(now);
        } else {
            let config = config_for(self.session.level, &mut self.rng);
            self.round = Some(Round::generate(
                &self.pool,
                config.pool_size,
                config.sequence_length,
                &mut self.rng,
            ));
            self.config = Some(config);
            self.begin_countdown(now, 3, "GO!".to_string(), AfterCountdown::ShowSequence);
        }
    }

    fn begin_boss(&mut self, now: Duration) {
        self.boss = Some(BossEncounter::new());
        self.config = None;
        self.emit(GameEvent::BossStarted {
            level: self.session.level,
        });
        self.phase = Phase::BossIntro;
        self.scheduler
            .schedule_in(now, BOSS_INTRO_DURATION, Step::BossIntroDone);
    }

    fn start_boss_phase(&mut self, now: Duration) {
        let phase = self.boss.map(|b| b.phase()).unwrap_or(0);
        self.round = Some(Round::generate(
            &self.pool,
            BOSS_POOL_SIZE,
            BOSS_SEQUENCE_LENGTH,
            &mut self.rng,
        ));
        self.emit(GameEvent::BossPhaseStarted { phase });
        self.begin_countdown(
            now,
            2,
            format!("ATTACK {}!", phase + 1),
            AfterCountdown::ShowSequence,
        );
    }

    fn begin_countdown(
        &mut self,
        now: Duration,
        from: u32,
        final_label: String,
        next: AfterCountdown,
    ) {
        self.phase = Phase::Countdown;
        self.countdown_left = from;
        self.countdown_final = final_label;
        self.after_countdown = next;
        self.scheduler.schedule_at(now, Step::CountdownTick);
    }

    fn handle_step(&mut self, step: Step, now: Duration) {
        match step {
            Step::CountdownTick => {
                if self.countdown_left > 0 {
                    self.emit(GameEvent::CountdownTick {
                        text: self.countdown_left.to_string(),
                    });
                    self.countdown_left -= 1;
                    self.scheduler
                        .schedule_in(now, COUNTDOWN_TICK, Step::CountdownTick);
                } else {
                    self.emit(GameEvent::CountdownTick {
                        text: self.countdown_final.clone(),
                    });
                    self.scheduler
                        .schedule_in(now, COUNTDOWN_TICK, Step::FinishCountdown);
                }
            }
            Step::FinishCountdown => match self.after_countdown {
                AfterCountdown::ShowSequence => self.show_sequence(now),
                AfterCountdown::OpenInput => self.open_input(now),
                AfterCountdown::Verify => self.verify(now),
            },
            Step::ShowSymbol(index) => {
                if let Some(symbol) = self
                    .round
                    .as_ref()
                    .and_then(|r| r.target.get(index))
                    .cloned()
                {
                    self.emit(GameEvent::SymbolShown { symbol, index });
                }
            }
            Step::HideSymbol => self.emit(GameEvent::SymbolHidden),
            Step::BeginInputCountdown => {
                self.begin_countdown(now, 2, "GO!".to_string(), AfterCountdown::OpenInput);
            }
            Step::Resolve => self.resolve(now),
            Step::NextRound => self.start_round(now),
            Step::BossIntroDone => self.start_boss_phase(now),
        }
    }

    /// Presents the target one symbol at a time. Input is ignored here; the
    /// phase only moves forward on the scheduled deadlines.
    fn show_sequence(&mut self, now: Duration) {
        self.phase = Phase::Showing;
        let length = self.round.as_ref().map(|r| r.target.len()).unwrap_or(0);

        for index in 0..length {
            let at = now + SEQUENCE_LEAD_IN + SYMBOL_STEP * index as u32;
            self.scheduler.schedule_at(at, Step::ShowSymbol(index));
            self.scheduler.schedule_at(at + SYMBOL_VISIBLE, Step::HideSymbol);
        }

        self.scheduler.schedule_at(
            now + SEQUENCE_LEAD_IN + SYMBOL_STEP * length as u32,
            Step::BeginInputCountdown,
        );
    }

    fn open_input(&mut self, now: Duration) {
        self.phase = Phase::Accepting;
        self.remaining = if self.boss.is_some() {
            BOSS_INPUT_SECONDS
        } else {
            SECONDS_PER_LEVEL * self.session.level
        };
        self.remaining_at_close = 0;
        self.next_second = Some(now + COUNTDOWN_TICK);
        self.tap_mark = now;
        self.emit(GameEvent::InputOpened {
            seconds: self.remaining,
        });
    }

    fn verify(&mut self, now: Duration) {
        self.phase = Phase::Verifying;
        let Some(round) = self.round.as_ref() else {
            return;
        };

        let marks = round.verify();
        let correct = round.is_correct();
        let reveal = VERIFY_REVEAL_STEP * marks.len() as u32 + VERIFY_SETTLE;
        self.emit(GameEvent::Verified { marks, correct });
        self.scheduler.schedule_in(now, reveal, Step::Resolve);
    }

    fn resolve(&mut self, now: Duration) {
        let correct = self.round.as_ref().is_some_and(|r| r.is_correct());
        if !correct {
            self.fail(FailReason::Mismatch, now);
            return;
        }

        self.round = None;
        if let Some(mut encounter) = self.boss.take() {
            if encounter.advance() {
                let bonus = scoring::award_boss(&mut self.session, self.remaining_at_close);
                self.emit(GameEvent::BossCleared { bonus });
                self.progress.add_coins(bonus);
                let _ = self.store.save(&self.progress);
                self.level_up(now);
                self.ads.on_round_boundary();
            } else {
                // Intermediate phase: no completion bonus, straight on.
                self.boss = Some(encounter);
                self.phase = Phase::Interlude;
                self.scheduler
                    .schedule_in(now, BANNER_DURATION, Step::NextRound);
            }
        } else {
            let frenzy = self.session.frenzy_active(now);
            let award = scoring::award_round(&mut self.session, self.remaining_at_close, frenzy);
            self.emit(GameEvent::RoundWon {
                bonus: award.total(),
                frenzy_bonus: award.frenzy,
            });
            self.progress.add_coins(award.total());
            let _ = self.store.save(&self.progress);
            self.level_up(now);
        }
    }

    fn level_up(&mut self, now: Duration) {
        self.session.level += 1;
        self.emit(GameEvent::LevelUp {
            level: self.session.level,
        });
        self.phase = Phase::Interlude;
        self.scheduler
            .schedule_in(now, BANNER_DURATION, Step::NextRound);
    }

    /// Shared failure path for mismatch and timeout. Combo and heat are
    /// deliberately left alone; only the round itself is discarded. A boss
    /// encounter keeps its phase counter for the retry.
    fn fail(&mut self, reason: FailReason, now: Duration) {
        self.round = None;
        self.session.lose_life();
        self.emit(GameEvent::LifeLost {
            reason,
            lives: self.session.lives,
        });

        if self.session.is_game_over() {
            self.game_over();
        } else {
            self.phase = Phase::Interlude;
            self.scheduler
                .schedule_in(now, BANNER_DURATION, Step::NextRound);
        }
    }

    fn game_over(&mut self) {
        self.scheduler.cancel_all();
        self.next_second = None;
        self.phase = Phase::GameOver;

        let new_high_score = self.progress.record_score(self.session.score);
        let _ = self.store.save(&self.progress);

        self.emit(GameEvent::GameOver {
            score: self.session.score,
            breakdown: self.session.breakdown,
            new_high_score,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::NoAds;
    use crate::store::MemoryProgressStore;
    use assert_matches::assert_matches;

    fn pool() -> Vec<Symbol> {
        (0..24).map(|i| format!("s{i}")).collect()
    }

    fn engine() -> Engine {
        Engine::new(
            pool(),
            Some(7),
            Box::new(MemoryProgressStore::default()),
            Box::new(NoAds),
            None,
        )
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    /// Ticks at 50 ms granularity until the engine reaches `phase`.
    fn advance_until(engine: &mut Engine, now: &mut Duration, phase: Phase) {
        for _ in 0..4000 {
            if engine.phase() == phase {
                return;
            }
            *now += Duration::from_millis(50);
            engine.on_tick(*now);
        }
        panic!("engine never reached {phase:?}, stuck in {:?}", engine.phase());
    }

    /// Taps the whole target sequence with fast gaps.
    fn tap_target(engine: &mut Engine, now: &mut Duration) {
        let target = engine.round().unwrap().target.clone();
        for symbol in target {
            *now += Duration::from_millis(100);
            engine.on_tap(&symbol, *now);
        }
    }

    #[test]
    #[should_panic(expected = "symbol pool holds")]
    fn test_start_rejects_small_pool() {
        let mut engine = Engine::new(
            (0..10).map(|i| format!("s{i}")).collect(),
            Some(1),
            Box::new(MemoryProgressStore::default()),
            Box::new(NoAds),
            None,
        );
        engine.start(Duration::ZERO);
    }

    #[test]
    fn test_round_one_flow_to_level_two() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);

        assert_eq!(engine.phase(), Phase::Countdown);
        advance_until(&mut engine, &mut now, Phase::Accepting);

        // Level 1: one symbol, seven seconds on the clock.
        assert_eq!(engine.round().unwrap().target.len(), 1);
        assert_eq!(engine.remaining_seconds(), 7);

        tap_target(&mut engine, &mut now);
        advance_until(&mut engine, &mut now, Phase::Interlude);

        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Verified { correct: true, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::RoundWon { bonus: 45, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::LevelUp { level: 2 })));

        // Tap points (first tap, combo 1) + base 10 + speed 7*5.
        assert_eq!(engine.session().score, 7 + 45);
        assert_eq!(engine.session().level, 2);

        // Coins were credited with the completion bonus.
        assert_eq!(engine.progress().coins, 45);
    }

    #[test]
    fn test_input_ignored_outside_accepting() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);

        // Countdown phase: taps must not land.
        engine.on_tap("s0", now);
        advance_until(&mut engine, &mut now, Phase::Showing);
        let shown = engine.round().unwrap().target[0].clone();
        engine.on_tap(&shown, now);

        advance_until(&mut engine, &mut now, Phase::Accepting);
        assert!(engine.round().unwrap().taps.is_empty());

        // Symbols off the board are ignored too.
        engine.on_tap("not-a-symbol", now);
        assert!(engine.round().unwrap().taps.is_empty());
    }

    #[test]
    fn test_timeout_is_a_too_slow_failure() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);
        engine.drain_events();

        // Let the whole window elapse without tapping.
        for _ in 0..(7 * 20 + 5) {
            now += Duration::from_millis(50);
            engine.on_tick(now);
        }

        let events = engine.drain_events();
        assert_matches!(
            events
                .iter()
                .find(|e| matches!(e, GameEvent::LifeLost { .. })),
            Some(GameEvent::LifeLost {
                reason: FailReason::TooSlow,
                lives: 2
            })
        );
        assert_eq!(engine.session().lives, 2);
        assert_eq!(engine.session().level, 1);

        // Same level retried with a fresh round.
        advance_until(&mut engine, &mut now, Phase::Accepting);
        assert!(engine.round().unwrap().taps.is_empty());
    }

    #[test]
    fn test_mismatch_reports_marks_and_costs_a_life() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);
        engine.drain_events();

        let target = engine.round().unwrap().target[0].clone();
        let wrong = engine
            .round()
            .unwrap()
            .active_pool
            .iter()
            .find(|s| **s != target)
            .unwrap()
            .clone();
        now += Duration::from_millis(100);
        engine.on_tap(&wrong, now);

        advance_until(&mut engine, &mut now, Phase::Interlude);
        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Verified { correct: false, marks } if marks == &vec![false])));
        assert_matches!(
            events
                .iter()
                .find(|e| matches!(e, GameEvent::LifeLost { .. })),
            Some(GameEvent::LifeLost {
                reason: FailReason::Mismatch,
                lives: 2
            })
        );
    }

    #[test]
    fn test_three_failures_end_the_session() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);

        for lost in 1..=3 {
            advance_until(&mut engine, &mut now, Phase::Accepting);
            engine.drain_events();
            for _ in 0..(7 * 20 + 5) {
                now += Duration::from_millis(50);
                engine.on_tick(now);
            }
            if lost < 3 {
                assert_eq!(engine.session().lives, 3 - lost);
            }
        }

        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.session().lives, 0);
        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::GameOver { score: 0, .. })));

        // The clock is dead: nothing else fires.
        engine.on_tick(now + secs(60.0));
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_high_score_persisted_at_game_over() {
        let store = MemoryProgressStore::default();
        let mut engine = Engine::new(pool(), Some(7), Box::new(store), Box::new(NoAds), None);
        let mut now = Duration::ZERO;
        engine.start(now);

        // Win one round for some points, then lose three.
        advance_until(&mut engine, &mut now, Phase::Accepting);
        tap_target(&mut engine, &mut now);
        for _ in 0..3 {
            advance_until(&mut engine, &mut now, Phase::Accepting);
            for _ in 0..(7 * engine.session().level * 20 + 5) {
                now += Duration::from_millis(50);
                engine.on_tick(now);
            }
        }

        assert_eq!(engine.phase(), Phase::GameOver);
        let score = engine.session().score;
        assert!(score > 0);
        assert_eq!(engine.progress().high_score, score);
        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::GameOver { new_high_score: true, .. })));
    }

    #[test]
    fn test_boss_encounter_full_clear() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        engine.session.level = 5;
        engine.reenter_round_start(now);

        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::BossStarted { level: 5 })));

        let boss_score_before = engine.session().breakdown.boss_bonus;
        for phase in 0..3u8 {
            advance_until(&mut engine, &mut now, Phase::Accepting);
            assert_eq!(engine.boss_phase(), Some(phase));
            assert_eq!(engine.round().unwrap().target.len(), 4);
            assert_eq!(engine.round().unwrap().active_pool.len(), 12);
            assert_eq!(engine.remaining_seconds(), 10);
            tap_target(&mut engine, &mut now);
            advance_until(&mut engine, &mut now, Phase::Interlude);
        }

        let events = engine.drain_events();
        // Exactly one bonus: level 5 x 20 + 10 unused seconds x 10.
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, GameEvent::BossCleared { .. }))
                .count(),
            1
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::BossCleared { bonus: 200 })));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::LevelUp { level: 6 })));
        assert_eq!(
            engine.session().breakdown.boss_bonus - boss_score_before,
            200
        );
        assert!(!engine.in_boss_encounter());

        // Level 6 is a standard round again.
        advance_until(&mut engine, &mut now, Phase::Accepting);
        assert_eq!(engine.round().unwrap().target.len(), 5);
    }

    #[test]
    fn test_failed_boss_phase_is_retried_not_reset() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        engine.session.level = 5;
        engine.reenter_round_start(now);

        // Clear phase 0.
        advance_until(&mut engine, &mut now, Phase::Accepting);
        tap_target(&mut engine, &mut now);
        advance_until(&mut engine, &mut now, Phase::Interlude);
        assert_eq!(engine.boss_phase(), Some(1));

        // Time out phase 1.
        advance_until(&mut engine, &mut now, Phase::Accepting);
        for _ in 0..(10 * 20 + 5) {
            now += Duration::from_millis(50);
            engine.on_tick(now);
        }
        assert_eq!(engine.session().lives, 2);
        assert_eq!(engine.boss_phase(), Some(1));
        assert_eq!(engine.session().level, 5);

        // The retry deals a fresh sequence for the same phase.
        advance_until(&mut engine, &mut now, Phase::Accepting);
        assert_eq!(engine.boss_phase(), Some(1));
        assert!(engine.round().unwrap().taps.is_empty());
    }

    #[test]
    fn test_frenzy_doubles_round_bonus() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);
        engine.drain_events();

        // Prime the meter so the next fast tap maxes it out.
        engine.session.heat = 0.9;
        tap_target(&mut engine, &mut now);

        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::FrenzyStarted)));

        advance_until(&mut engine, &mut now, Phase::Interlude);
        let events = engine.drain_events();
        // Base 10 + speed 35, doubled inside the frenzy window.
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::RoundWon { bonus: 90, frenzy_bonus: 45 })));
        assert_eq!(engine.session().breakdown.frenzy_bonus, 45);
    }

    #[test]
    fn test_frenzy_expires_and_resets_heat() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);

        engine.session.heat = 0.9;
        tap_target(&mut engine, &mut now);
        engine.drain_events();

        for _ in 0..220 {
            now += Duration::from_millis(50);
            engine.on_tick(now);
        }

        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::FrenzyEnded)));
        assert_eq!(engine.session().heat, 0.0);
    }

    #[test]
    fn test_pause_freezes_timer_and_taps() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);
        let remaining = engine.remaining_seconds();

        engine.pause(now);
        let target = engine.round().unwrap().target.clone();
        engine.on_tap(&target[0], now);
        assert!(engine.round().unwrap().taps.is_empty());

        // Five paused seconds: no ticks counted.
        for _ in 0..100 {
            now += Duration::from_millis(50);
            engine.on_tick(now);
        }
        assert_eq!(engine.remaining_seconds(), remaining);

        engine.resume(now);
        // After resume the next second lands a full second later.
        now += Duration::from_millis(950);
        engine.on_tick(now);
        assert_eq!(engine.remaining_seconds(), remaining);
        now += Duration::from_millis(100);
        engine.on_tick(now);
        assert_eq!(engine.remaining_seconds(), remaining - 1);
    }

    #[test]
    fn test_restart_is_atomic() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);
        tap_target(&mut engine, &mut now);
        advance_until(&mut engine, &mut now, Phase::Accepting);

        engine.restart(now);
        assert_eq!(engine.session().level, 1);
        assert_eq!(engine.session().score, 0);
        assert_eq!(engine.session().lives, 3);
        assert_eq!(engine.phase(), Phase::Countdown);

        // No stale step from the old session may fire: the new round's own
        // countdown is the only pending work.
        let mut countdowns = 0;
        for _ in 0..30 {
            now += Duration::from_millis(200);
            engine.on_tick(now);
            for event in engine.drain_events() {
                match event {
                    GameEvent::CountdownTick { .. } => countdowns += 1,
                    GameEvent::TimerTick { .. } => panic!("stale input timer fired"),
                    _ => {}
                }
            }
        }
        assert!(countdowns >= 4);
    }

    #[test]
    fn test_combo_carries_across_round_failure() {
        let mut engine = engine();
        let mut now = Duration::ZERO;
        engine.start(now);
        advance_until(&mut engine, &mut now, Phase::Accepting);

        engine.session.heat = 0.5;
        engine.drain_events();
        for _ in 0..(7 * 20 + 5) {
            now += Duration::from_millis(50);
            engine.on_tick(now);
        }

        // Failure forgives neither heat nor combo.
        assert!((engine.session().heat - 0.5).abs() < 1e-9);
    }

    impl Engine {
        /// Re-enters the round-start decision point, as if the previous
        /// round had just resolved.
        fn reenter_round_start(&mut self, now: Duration) {
            self.scheduler.cancel_all();
            self.round = None;
            self.next_second = None;
            self.start_round(now);
        }
    }
}
