mod agent;
mod cameras;
mod images;
mod jobs;
pub mod types;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// SQLite-backed persistence for cameras, the agent row, pending jobs and
/// retrieved image metadata. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Connection::open(db_path)?;
        db.pragma_update(None, "journal_mode", "WAL")?;
        init_schema(&db)?;
        info!("Opened camsync database at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        init_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

fn init_schema(db: &Connection) -> Result<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS cameras (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            manufacturer TEXT NOT NULL DEFAULT 'none',
            address TEXT NOT NULL DEFAULT '',
            username TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL DEFAULT '',
            update_day_night_mode_enabled INTEGER NOT NULL DEFAULT 0,
            next_day_night_schedule_id TEXT NOT NULL DEFAULT '',
            next_clear_overlay_schedule_id TEXT NOT NULL DEFAULT '',
            plates_seen INTEGER NOT NULL DEFAULT 0,
            latest_processed_plate_uuid TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS agent (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            latitude REAL NOT NULL DEFAULT 0,
            longitude REAL NOT NULL DEFAULT 0,
            image_compression_enabled INTEGER NOT NULL DEFAULT 0,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    db.execute("INSERT OR IGNORE INTO agent (id) VALUES (1)", [])?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS pending_jobs (
            handle TEXT PRIMARY KEY,
            spec TEXT NOT NULL,
            due_at TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS plate_groups (
            openalpr_uuid TEXT PRIMARY KEY,
            plate_coordinates TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS plate_images (
            openalpr_uuid TEXT PRIMARY KEY,
            plate_path TEXT NOT NULL,
            vehicle_path TEXT NOT NULL,
            is_compressed INTEGER NOT NULL DEFAULT 0,
            scraped_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_cameras_day_night ON cameras(update_day_night_mode_enabled)",
        [],
    )?;

    Ok(())
}
