//! Single-table SQLite file remembering how far into each external feed the bot has announced.
//! Lets a restart pick up where it left off instead of re-announcing old events.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::{path::PathBuf, sync::Mutex};

const LEDGER_PATH_REL_HOME: &str = ".config/cogbot/earthquake.sqlite3";

pub struct FeedLedger {
    conn: Mutex<Connection>,
}

impl FeedLedger {
    fn ledger_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(LEDGER_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub fn open() -> Result<Self> {
        let path = Self::ledger_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow!(
                    "Could not create directory `{}`: {}",
                    parent.to_string_lossy(),
                    e
                )
            })?;
        }
        let conn = Connection::open(&path).map_err(|e| {
            anyhow!(
                "Could not open feed ledger at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS feed_cursor (
                feed TEXT PRIMARY KEY,
                last_event_ms INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Feed ledger lock poisoned"))
    }

    /// Time (ms since epoch) of the newest announced event, if the feed was ever read.
    pub fn cursor(&self, feed: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let cursor = conn
            .query_row(
                "SELECT last_event_ms FROM feed_cursor WHERE feed = ?1",
                params![feed],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cursor)
    }

    /// Move the cursor forward.  Never moves it back.
    pub fn advance(&self, feed: &str, last_event_ms: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feed_cursor (feed, last_event_ms) VALUES (?1, ?2)
             ON CONFLICT(feed) DO UPDATE SET last_event_ms = MAX(last_event_ms, excluded.last_event_ms)",
            params![feed, last_event_ms],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_starts_empty_and_only_moves_forward() {
        let ledger = FeedLedger::in_memory().unwrap();
        assert_eq!(ledger.cursor("usgs").unwrap(), None);

        ledger.advance("usgs", 1_000).unwrap();
        assert_eq!(ledger.cursor("usgs").unwrap(), Some(1_000));

        ledger.advance("usgs", 500).unwrap();
        assert_eq!(ledger.cursor("usgs").unwrap(), Some(1_000));

        ledger.advance("usgs", 2_000).unwrap();
        assert_eq!(ledger.cursor("usgs").unwrap(), Some(2_000));
        assert_eq!(ledger.cursor("other").unwrap(), None);
    }
}
