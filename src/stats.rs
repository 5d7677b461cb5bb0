use chrono::{DateTime, Local};
use directories::ProjectDirs;
use rusqlite::{params, Connection, Result};
use std::path::PathBuf;

/// One accepted tap, as recorded for long-term symbol statistics.
#[derive(Debug, Clone)]
pub struct TapStat {
    pub symbol: String,
    /// Gap since the previous tap (or since the input window opened for the
    /// first tap of a round).
    pub reaction_ms: u64,
    pub was_correct: bool,
    pub level: u32,
    pub timestamp: DateTime<Local>,
}

/// Per-symbol aggregate for the stats report.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSummary {
    pub symbol: String,
    pub avg_reaction_ms: f64,
    pub miss_rate: f64,
    pub attempts: i64,
}

/// SQLite-backed tap history. Absence of the database is non-fatal for the
/// engine; it simply records nothing.
#[derive(Debug)]
pub struct TapStatsDb {
    conn: Connection,
}

impl TapStatsDb {
    /// Opens (and migrates) the default on-disk database.
    pub fn new() -> Result<Self> {
        let db_path = Self::db_path().unwrap_or_else(|| PathBuf::from("memorandum_stats.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("failed to create stats directory: {e}")),
                )
            })?;
        }

        Self::with_connection(Connection::open(&db_path)?)
    }

    /// Private database for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS tap_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                reaction_ms INTEGER NOT NULL,
                was_correct BOOLEAN NOT NULL,
                level INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tap_stats_symbol ON tap_stats(symbol)",
            [],
        )?;

        Ok(TapStatsDb { conn })
    }

    /// Database file under $HOME/.local/state/memorandum.
    fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("memorandum")
                    .join("stats.db"),
            )
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "memorandum") {
            Some(proj_dirs.data_local_dir().join("stats.db"))
        } else {
            None
        }
    }

    pub fn record_tap(&self, stat: &TapStat) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO tap_stats (symbol, reaction_ms, was_correct, level, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                stat.symbol,
                stat.reaction_ms,
                stat.was_correct,
                stat.level,
                stat.timestamp.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Average reaction time over correct taps of a symbol, if any exist.
    pub fn avg_reaction_ms(&self, symbol: &str) -> Result<Option<f64>> {
        let mut stmt = self.conn.prepare(
            "SELECT AVG(reaction_ms) FROM tap_stats WHERE symbol = ?1 AND was_correct = 1",
        )?;

        let avg: Option<f64> = stmt.query_row([symbol], |row| row.get(0))?;
        Ok(avg)
    }

    /// Percentage (0–100) of taps on a symbol that were wrong for their
    /// position.
    pub fn miss_rate(&self, symbol: &str) -> Result<f64> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                COUNT(*) as total,
                SUM(CASE WHEN was_correct = 0 THEN 1 ELSE 0 END) as incorrect
            FROM tap_stats
            WHERE symbol = ?1
            "#,
        )?;

        let (total, incorrect): (i64, Option<i64>) =
            stmt.query_row([symbol], |row| Ok((row.get(0)?, row.get(1)?)))?;

        if total == 0 {
            Ok(0.0)
        } else {
            Ok(incorrect.unwrap_or(0) as f64 / total as f64 * 100.0)
        }
    }

    /// One row per symbol ever tapped, slowest first.
    pub fn summary(&self) -> Result<Vec<SymbolSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                symbol,
                COALESCE(AVG(CASE WHEN was_correct = 1 THEN reaction_ms END), 0.0) as avg_ms,
                SUM(CASE WHEN was_correct = 0 THEN 1 ELSE 0 END) * 100.0 / COUNT(*) as miss,
                COUNT(*) as attempts
            FROM tap_stats
            GROUP BY symbol
            ORDER BY avg_ms DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SymbolSummary {
                symbol: row.get(0)?,
                avg_reaction_ms: row.get(1)?,
                miss_rate: row.get(2)?,
                attempts: row.get(3)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(symbol: &str, reaction_ms: u64, was_correct: bool) -> TapStat {
        TapStat {
            symbol: symbol.to_string(),
            reaction_ms,
            was_correct,
            level: 3,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn test_record_and_average() {
        let db = TapStatsDb::open_in_memory().unwrap();
        db.record_tap(&stat("🐶", 200, true)).unwrap();
        db.record_tap(&stat("🐶", 400, true)).unwrap();
        db.record_tap(&stat("🐶", 999, false)).unwrap();

        let avg = db.avg_reaction_ms("🐶").unwrap().unwrap();
        assert!((avg - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_avg_for_unknown_symbol_is_none() {
        let db = TapStatsDb::open_in_memory().unwrap();
        assert!(db.avg_reaction_ms("🦀").unwrap().is_none());
    }

    #[test]
    fn test_miss_rate() {
        let db = TapStatsDb::open_in_memory().unwrap();
        db.record_tap(&stat("🍕", 100, true)).unwrap();
        db.record_tap(&stat("🍕", 100, false)).unwrap();
        db.record_tap(&stat("🍕", 100, false)).unwrap();
        db.record_tap(&stat("🍕", 100, true)).unwrap();

        let miss = db.miss_rate("🍕").unwrap();
        assert!((miss - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_miss_rate_without_data() {
        let db = TapStatsDb::open_in_memory().unwrap();
        assert_eq!(db.miss_rate("👻").unwrap(), 0.0);
    }

    #[test]
    fn test_summary_orders_slowest_first() {
        let db = TapStatsDb::open_in_memory().unwrap();
        db.record_tap(&stat("🐌", 900, true)).unwrap();
        db.record_tap(&stat("⚡", 100, true)).unwrap();
        db.record_tap(&stat("⚡", 100, false)).unwrap();

        let summary = db.summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].symbol, "🐌");
        assert_eq!(summary[0].attempts, 1);
        assert_eq!(summary[1].symbol, "⚡");
        assert_eq!(summary[1].attempts, 2);
        assert!((summary[1].miss_rate - 50.0).abs() < f64::EPSILON);
    }
}
