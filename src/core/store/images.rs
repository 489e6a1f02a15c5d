use anyhow::Result;
use rusqlite::params;

use super::Store;
use super::types::PlateImageRecord;

impl Store {
    pub async fn upsert_plate_group(&self, openalpr_uuid: &str, plate_coordinates: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO plate_groups (openalpr_uuid, plate_coordinates) VALUES (?1, ?2)",
            params![openalpr_uuid, plate_coordinates],
        )?;
        Ok(())
    }

    pub async fn plate_coordinates(&self, openalpr_uuid: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT plate_coordinates FROM plate_groups WHERE openalpr_uuid = ?1")?;
        let mut rows = stmt.query_map(params![openalpr_uuid], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn record_plate_images(&self, record: &PlateImageRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO plate_images (openalpr_uuid, plate_path, vehicle_path, is_compressed, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.openalpr_uuid,
                record.plate_path,
                record.vehicle_path,
                record.is_compressed as i32,
                record.scraped_at
            ],
        )?;
        Ok(())
    }

    pub async fn get_plate_images(&self, openalpr_uuid: &str) -> Result<Option<PlateImageRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT openalpr_uuid, plate_path, vehicle_path, is_compressed, scraped_at
             FROM plate_images WHERE openalpr_uuid = ?1",
        )?;
        let mut rows = stmt.query_map(params![openalpr_uuid], |row| {
            Ok(PlateImageRecord {
                openalpr_uuid: row.get(0)?,
                plate_path: row.get(1)?,
                vehicle_path: row.get(2)?,
                is_compressed: row.get::<_, i32>(3)? != 0,
                scraped_at: row.get(4)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}
