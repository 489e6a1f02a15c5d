use anyhow::Result;
use rusqlite::{Row, params};

use super::Store;
use super::types::CameraRecord;
use crate::core::device::Manufacturer;
use crate::core::error::CoreError;
use crate::core::jobs::JobHandle;

const CAMERA_COLUMNS: &str = "id, name, manufacturer, address, username, password, \
     update_day_night_mode_enabled, next_day_night_schedule_id, \
     next_clear_overlay_schedule_id, plates_seen, latest_processed_plate_uuid";

fn camera_from_row(row: &Row<'_>) -> rusqlite::Result<CameraRecord> {
    let manufacturer: String = row.get(2)?;
    Ok(CameraRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        manufacturer: Manufacturer::parse(&manufacturer),
        address: row.get(3)?,
        username: row.get(4)?,
        password: row.get(5)?,
        update_day_night_mode_enabled: row.get::<_, i32>(6)? != 0,
        next_day_night_schedule_id: JobHandle::from_stored(row.get(7)?),
        next_clear_overlay_schedule_id: JobHandle::from_stored(row.get(8)?),
        plates_seen: row.get(9)?,
        latest_processed_plate_uuid: row.get(10)?,
    })
}

fn handle_column(handle: Option<&JobHandle>) -> &str {
    handle.map(JobHandle::as_str).unwrap_or("")
}

impl Store {
    pub async fn get_camera(&self, id: &str) -> Result<Option<CameraRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM cameras WHERE id = ?1",
            CAMERA_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], camera_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Like [`Store::get_camera`] but a missing row is `CoreError::UnknownCamera`.
    pub async fn require_camera(&self, id: &str) -> Result<CameraRecord> {
        match self.get_camera(id).await? {
            Some(camera) => Ok(camera),
            None => Err(CoreError::UnknownCamera(id.to_string()).into()),
        }
    }

    pub async fn list_cameras(&self) -> Result<Vec<CameraRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM cameras ORDER BY created_at, id",
            CAMERA_COLUMNS
        ))?;
        let rows = stmt.query_map([], camera_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn list_day_night_cameras(&self) -> Result<Vec<CameraRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM cameras WHERE update_day_night_mode_enabled = 1 ORDER BY created_at, id",
            CAMERA_COLUMNS
        ))?;
        let rows = stmt.query_map([], camera_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Insert or update a camera's configuration. Schedule handles and
    /// counters are owned by the scheduling core and left untouched.
    pub async fn upsert_camera(&self, camera: &CameraRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO cameras (id, name, manufacturer, address, username, password, update_day_night_mode_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                manufacturer = excluded.manufacturer,
                address = excluded.address,
                username = excluded.username,
                password = excluded.password,
                update_day_night_mode_enabled = excluded.update_day_night_mode_enabled",
            params![
                camera.id,
                camera.name,
                camera.manufacturer.as_str(),
                camera.address,
                camera.username,
                camera.password,
                camera.update_day_night_mode_enabled as i32,
            ],
        )?;
        Ok(())
    }

    pub async fn set_day_night_handle(&self, id: &str, handle: Option<&JobHandle>) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE cameras SET next_day_night_schedule_id = ?2 WHERE id = ?1",
            params![id, handle_column(handle)],
        )?;
        Ok(())
    }

    pub async fn set_clear_overlay_handle(
        &self,
        id: &str,
        handle: Option<&JobHandle>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE cameras SET next_clear_overlay_schedule_id = ?2 WHERE id = ?1",
            params![id, handle_column(handle)],
        )?;
        Ok(())
    }

    /// Bookkeeping written at the end of an overlay dispatch: the new clear
    /// handle, plus the seen-counter and latest-plate marker when `count_plate`.
    pub async fn record_overlay_dispatch(
        &self,
        id: &str,
        clear_handle: Option<&JobHandle>,
        count_plate: bool,
        latest_plate_uuid: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        if count_plate {
            db.execute(
                "UPDATE cameras SET
                    next_clear_overlay_schedule_id = ?2,
                    plates_seen = plates_seen + 1,
                    latest_processed_plate_uuid = ?3
                 WHERE id = ?1",
                params![id, handle_column(clear_handle), latest_plate_uuid],
            )?;
        } else {
            db.execute(
                "UPDATE cameras SET next_clear_overlay_schedule_id = ?2 WHERE id = ?1",
                params![id, handle_column(clear_handle)],
            )?;
        }
        Ok(())
    }
}
