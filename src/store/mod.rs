mod models;
mod queries;

pub use models::*;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config;

pub struct Store {
    pub conn: Connection,
}

impl Store {
    pub fn open() -> Result<Self> {
        let db_path = config::db_path()?;
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Store { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                description TEXT,
                notes TEXT,
                category TEXT,
                tags TEXT,
                length TEXT,
                todos TEXT,
                timestamp TEXT
            );

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                notifications INTEGER NOT NULL DEFAULT 1,
                session_end_sound TEXT NOT NULL DEFAULT 'default',
                weekly_goal INTEGER NOT NULL DEFAULT 20,
                default_category TEXT NOT NULL DEFAULT '',
                default_end_rule TEXT NOT NULL DEFAULT 'manual'
            );

            INSERT OR IGNORE INTO settings (id) VALUES (1);
            ",
        )?;
        Ok(())
    }
}
