use chrono::{DateTime, Local};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PACK: &str = "standard";

/// Everything that outlives a session: best score, coin balance, which
/// symbol packs are owned and which one is on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub high_score: u32,
    pub coins: u32,
    pub unlocked_packs: Vec<String>,
    pub selected_pack: String,
    pub last_played: Option<DateTime<Local>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            high_score: 0,
            coins: 0,
            unlocked_packs: vec![DEFAULT_PACK.to_string()],
            selected_pack: DEFAULT_PACK.to_string(),
            last_played: None,
        }
    }
}

impl Progress {
    pub fn add_coins(&mut self, amount: u32) {
        self.coins += amount;
    }

    /// Update-if-greater. Returns true when `score` became the new best.
    pub fn record_score(&mut self, score: u32) -> bool {
        self.last_played = Some(Local::now());
        if score > self.high_score {
            self.high_score = score;
            true
        } else {
            false
        }
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked_packs.iter().any(|p| p == id)
    }

    /// Debits `cost` coins and unlocks the pack. Returns false (and leaves
    /// the balance alone) when coins are short.
    pub fn unlock_pack(&mut self, id: &str, cost: u32) -> bool {
        if self.is_unlocked(id) {
            return true;
        }
        if self.coins < cost {
            return false;
        }
        self.coins -= cost;
        self.unlocked_packs.push(id.to_string());
        true
    }

    /// Puts an unlocked pack on the board. Returns false if it isn't owned.
    pub fn select_pack(&mut self, id: &str) -> bool {
        if self.is_unlocked(id) {
            self.selected_pack = id.to_string();
            true
        } else {
            false
        }
    }
}

pub trait ProgressStore {
    fn load(&self) -> Progress;
    fn save(&self, progress: &Progress) -> std::io::Result<()>;
}

/// JSON file under the platform config directory.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "memorandum") {
            pd.config_dir().join("progress.json")
        } else {
            PathBuf::from("memorandum_progress.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self) -> Progress {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(progress) = serde_json::from_slice::<Progress>(&bytes) {
                return progress;
            }
        }
        Progress::default()
    }

    fn save(&self, progress: &Progress) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(progress).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

/// In-memory store for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    progress: std::cell::RefCell<Progress>,
}

impl MemoryProgressStore {
    pub fn with_progress(progress: Progress) -> Self {
        Self {
            progress: std::cell::RefCell::new(progress),
        }
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self) -> Progress {
        self.progress.borrow().clone()
    }

    fn save(&self, progress: &Progress) -> std::io::Result<()> {
        *self.progress.borrow_mut() = progress.clone();
        Ok(())
    }
}
