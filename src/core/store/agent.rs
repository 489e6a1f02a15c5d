use anyhow::Result;
use rusqlite::params;

use super::Store;
use super::types::AgentRecord;

impl Store {
    pub async fn get_agent(&self) -> Result<AgentRecord> {
        let db = self.db.lock().await;
        let agent = db.query_row(
            "SELECT latitude, longitude, image_compression_enabled FROM agent WHERE id = 1",
            [],
            |row| {
                Ok(AgentRecord {
                    latitude: row.get(0)?,
                    longitude: row.get(1)?,
                    image_compression_enabled: row.get::<_, i32>(2)? != 0,
                })
            },
        )?;
        Ok(agent)
    }

    pub async fn update_agent(&self, agent: &AgentRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agent (id, latitude, longitude, image_compression_enabled, updated_at)
             VALUES (1, ?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                image_compression_enabled = excluded.image_compression_enabled,
                updated_at = CURRENT_TIMESTAMP",
            params![
                agent.latitude,
                agent.longitude,
                agent.image_compression_enabled as i32
            ],
        )?;
        Ok(())
    }
}
