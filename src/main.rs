use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::{Duration, Instant},
};

use memorandum::{
    ads::NoAds,
    app::App,
    engine::Engine,
    pack::{available_packs, SymbolPack},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    stats::TapStatsDb,
    store::{FileProgressStore, ProgressStore},
};

const TICK_RATE_MS: u64 = 50;

/// memory-sequence arcade for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Watch the emoji flash, then tap them back in order before the clock runs out. \
Every fifth level is a three-phase boss battle, and chaining fast taps charges a heat meter \
that erupts into a double-points frenzy."
)]
pub struct Cli {
    /// symbol pack to play with (must be unlocked)
    #[clap(short = 'p', long, default_value = "standard")]
    pack: String,

    /// seed the round generator for reproducible games
    #[clap(short = 's', long)]
    seed: Option<u64>,

    /// spend banked coins to unlock the named pack, then exit
    #[clap(long)]
    unlock: Option<String>,

    /// list symbol packs with their costs and exit
    #[clap(long)]
    packs: bool,

    /// print per-symbol tap statistics and exit
    #[clap(long)]
    stats: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = FileProgressStore::new();

    if cli.packs {
        print_packs(&store);
        return Ok(());
    }

    if cli.stats {
        print_stats()?;
        return Ok(());
    }

    if let Some(id) = &cli.unlock {
        unlock_pack(&store, id)?;
        return Ok(());
    }

    let mut progress = store.load();
    let pack = match SymbolPack::load(&cli.pack) {
        Ok(pack) => pack,
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
        }
    };
    if !progress.select_pack(&cli.pack.to_lowercase()) {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::InvalidValue,
            format!(
                "pack '{}' is locked ({} coins); unlock it with --unlock {}",
                pack.name, pack.cost, cli.pack
            ),
        )
        .exit();
    }
    store.save(&progress)?;

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let engine = Engine::new(
        pack.symbols,
        cli.seed,
        Box::new(store),
        Box::new(NoAds),
        TapStatsDb::new().ok(),
    );
    let mut app = App::new(engine, pack.name);

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let started = Instant::now();
    app.start(started.elapsed());

    loop {
        terminal.draw(|f| ui(app, f))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(started.elapsed()),
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if !handle_key(app, key, started.elapsed()) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Returns false when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent, now: Duration) -> bool {
    match key.code {
        KeyCode::Esc => return false,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
        KeyCode::Char(' ') => app.toggle_pause(now),
        KeyCode::Char(c) if app.is_over() => match c {
            'r' => app.restart(now),
            'q' => return false,
            _ => {}
        },
        KeyCode::Enter if app.is_over() => app.restart(now),
        KeyCode::Char(c) => app.on_key(c, now),
        _ => {}
    }
    true
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn print_packs(store: &FileProgressStore) {
    let progress = store.load();
    println!("symbol packs ({} coins banked):", progress.coins);
    for id in available_packs() {
        if let Ok(pack) = SymbolPack::load(&id) {
            let status = if progress.is_unlocked(&id) {
                if progress.selected_pack == id {
                    "selected"
                } else {
                    "unlocked"
                }
            } else {
                "locked"
            };
            println!(
                "  {id:<10} {:<16} {:>4} coins  [{status}]  {}…",
                pack.name,
                pack.cost,
                pack.symbols[..5].join(" ")
            );
        }
    }
}

fn print_stats() -> Result<(), Box<dyn Error>> {
    let db = TapStatsDb::new()?;
    let summary = db.summary()?;
    if summary.is_empty() {
        println!("no taps recorded yet; play a round first");
        return Ok(());
    }

    println!("{:<6} {:>12} {:>10} {:>9}", "symbol", "avg react ms", "miss %", "taps");
    for row in summary {
        println!(
            "{:<6} {:>12.0} {:>10.1} {:>9}",
            row.symbol, row.avg_reaction_ms, row.miss_rate, row.attempts
        );
    }
    Ok(())
}

fn unlock_pack(store: &FileProgressStore, id: &str) -> Result<(), Box<dyn Error>> {
    let pack = SymbolPack::load(id)?;
    let mut progress = store.load();
    let id = id.to_lowercase();

    if progress.is_unlocked(&id) {
        println!("'{}' is already unlocked", pack.name);
    } else if progress.unlock_pack(&id, pack.cost) {
        store.save(&progress)?;
        println!(
            "unlocked '{}' for {} coins ({} left)",
            pack.name, pack.cost, progress.coins
        );
    } else {
        println!(
            "not enough coins for '{}': costs {}, you have {}",
            pack.name, pack.cost, progress.coins
        );
    }
    Ok(())
}
