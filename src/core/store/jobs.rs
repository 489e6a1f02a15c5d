use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::warn;

use super::Store;
use super::types::PendingJobRecord;
use crate::core::jobs::JobHandle;

impl Store {
    pub async fn insert_pending_job(
        &self,
        handle: &JobHandle,
        spec_json: &str,
        due_at: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO pending_jobs (handle, spec, due_at) VALUES (?1, ?2, ?3)",
            params![handle.as_str(), spec_json, due_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn delete_pending_job(&self, handle: &JobHandle) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM pending_jobs WHERE handle = ?1",
            params![handle.as_str()],
        )?;
        Ok(rows > 0)
    }

    pub async fn is_pending_job(&self, handle: &JobHandle) -> Result<bool> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM pending_jobs WHERE handle = ?1",
            params![handle.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn list_pending_jobs(&self) -> Result<Vec<PendingJobRecord>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT handle, spec, due_at FROM pending_jobs ORDER BY due_at")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (handle, spec, due_at) = row?;
            let Some(handle) = JobHandle::from_stored(handle) else {
                continue;
            };
            let due_at = match DateTime::parse_from_rfc3339(&due_at) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    warn!("Pending job {} has unreadable due time '{}': {}", handle, due_at, e);
                    Utc::now()
                }
            };
            results.push(PendingJobRecord {
                handle,
                spec,
                due_at,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn pending_job_lifecycle() {
        let store = Store::open_in_memory().unwrap();
        let handle = JobHandle::new();
        let due = Utc::now() + Duration::seconds(30);
        store
            .insert_pending_job(&handle, r#"{"kind":"resync_day_night"}"#, due)
            .await
            .unwrap();

        assert!(store.is_pending_job(&handle).await.unwrap());
        let rows = store.list_pending_jobs().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].handle, handle);
        assert_eq!(rows[0].due_at.timestamp(), due.timestamp());

        assert!(store.delete_pending_job(&handle).await.unwrap());
        assert!(!store.delete_pending_job(&handle).await.unwrap());
        assert!(!store.is_pending_job(&handle).await.unwrap());
    }
}
